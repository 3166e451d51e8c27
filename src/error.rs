use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("neither <{primary}> nor <{fallback}> holds a usable date")]
    MissingDate {
        primary: &'static str,
        fallback: &'static str,
    },

    #[error("no root element to attach <{0}> to")]
    MissingAnchor(String),

    #[error("backup already exists: {}", .0.display())]
    BackupExists(PathBuf),

    #[error("{} is outside the library root", .0.display())]
    OutsideRoot(PathBuf),

    #[error("invalid time of day '{0}', expected HH:MM:SS")]
    InvalidTime(String),

    #[error("library root {} is not a directory", .0.display())]
    InvalidRoot(PathBuf),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
