use chrono::NaiveTime;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_TIME_OF_DAY: &str = "12:00:00";
pub const METADATA_EXTENSION: &str = "nfo";
pub const DESCRIPTOR_NAME: &str = "movie.xml";
pub const BACKUP_DIR_NAME: &str = ".dateadded-backups";
pub const LOG_FILE_NAME: &str = "dateadded.log";

/// Regional certificates folded into a single US rating by `run --remap-ratings`
const DEFAULT_RATING_MAP: &[(&str, &str)] = &[("12A", "PG-13"), ("12", "PG-13"), ("15", "PG-13")];

/// Everything the run needs to know about the library, built once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub time_of_day: NaiveTime,
    pub metadata_extension: String,
    pub descriptor_name: String,
    pub backup_dir_name: String,
    pub log_file_name: String,
    pub rating_map: HashMap<String, String>,
}

impl Settings {
    pub fn new(root: impl Into<PathBuf>, time_of_day: NaiveTime) -> Self {
        Settings {
            root: root.into(),
            time_of_day,
            metadata_extension: METADATA_EXTENSION.to_string(),
            descriptor_name: DESCRIPTOR_NAME.to_string(),
            backup_dir_name: BACKUP_DIR_NAME.to_string(),
            log_file_name: LOG_FILE_NAME.to_string(),
            rating_map: HashMap::new(),
        }
    }

    pub fn with_default_rating_map(mut self) -> Self {
        self.rating_map = DEFAULT_RATING_MAP
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::InvalidRoot(self.root.clone()));
        }
        Ok(())
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(&self.backup_dir_name)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(&self.log_file_name)
    }

    /// True for files the scanner should treat as movie metadata
    pub fn is_metadata_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.metadata_extension))
            .unwrap_or(false)
    }
}

/// Parse an `HH:MM:SS` (or `HH:MM`) time of day
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| Error::InvalidTime(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(
            parse_time_of_day("13:52:00").unwrap(),
            NaiveTime::from_hms_opt(13, 52, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day(" 07:05 ").unwrap(),
            NaiveTime::from_hms_opt(7, 5, 0).unwrap()
        );
        assert!(matches!(parse_time_of_day("noon"), Err(Error::InvalidTime(_))));
        assert!(parse_time_of_day("25:00:00").is_err());
    }

    #[test]
    fn test_is_metadata_file() {
        let settings = Settings::new("/movies", NaiveTime::MIN);
        assert!(settings.is_metadata_file(Path::new("/movies/Heat (1995)/movie.nfo")));
        assert!(settings.is_metadata_file(Path::new("/movies/Heat (1995)/MOVIE.NFO")));
        assert!(!settings.is_metadata_file(Path::new("/movies/Heat (1995)/movie.xml")));
        assert!(!settings.is_metadata_file(Path::new("/movies/Heat (1995)/nfo")));
    }

    #[test]
    fn test_rating_map_is_opt_in() {
        let settings = Settings::new("/movies", NaiveTime::MIN);
        assert!(settings.rating_map.is_empty());

        let settings = settings.with_default_rating_map();
        assert_eq!(settings.rating_map.get("12A").map(String::as_str), Some("PG-13"));
        assert_eq!(settings.rating_map.get("15").map(String::as_str), Some("PG-13"));
        assert!(!settings.rating_map.contains_key("PG"));
    }
}
