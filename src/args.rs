use anyhow::{anyhow, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::{parse_time_of_day, Settings, DEFAULT_TIME_OF_DAY};

#[derive(Debug, Parser)]
#[command(
    name = "movie_dateadded",
    version,
    about = "Set each movie's date added to its release date",
    after_help = "Examples:\n  movie_dateadded --root /volume1/media/movies run\n  movie_dateadded --root /volume1/media/movies restore"
)]
pub struct Args {
    /// Library root to scan for movie folders
    #[arg(long, global = true, env = "MOVIE_DATEADDED_ROOT")]
    pub root: Option<PathBuf>,

    /// Time of day attached to every release date (HH:MM:SS)
    #[arg(long, global = true, env = "MOVIE_DATEADDED_TIME", default_value = DEFAULT_TIME_OF_DAY)]
    pub time: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Back up and rewrite <dateadded> and <Added> for every movie
    Run {
        /// Also fold regional ratings (12, 12A, 15) into PG-13
        #[arg(long)]
        remap_ratings: bool,

        /// Report what would change without backing up or writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Copy the most recent backup set back over the library
    Restore,
    /// List backup sets
    ListBackups,
}

/// What the command line asked for
#[derive(Debug)]
pub enum Invocation {
    /// Print this text and exit successfully
    Help(String),
    Execute(Args),
}

impl Args {
    /// Parse the process arguments. Anything unrecognised falls back to help.
    pub fn parse() -> Invocation {
        Self::parse_from_args(std::env::args_os())
    }

    pub fn parse_from_args<I, T>(args: I) -> Invocation
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Args::try_parse_from(args) {
            Ok(args) if args.command.is_some() => Invocation::Execute(args),
            Ok(_) => Invocation::Help(usage()),
            Err(e) if e.kind() == ErrorKind::DisplayVersion => Invocation::Help(e.to_string()),
            Err(_) => Invocation::Help(usage()),
        }
    }

    /// Build and validate the run settings
    pub fn settings(&self) -> Result<Settings> {
        let root = self.root.clone().ok_or_else(|| {
            anyhow!("Library root must be given with --root or MOVIE_DATEADDED_ROOT")
        })?;
        let time_of_day = parse_time_of_day(&self.time)?;

        let mut settings = Settings::new(root, time_of_day);
        if let Some(Command::Run {
            remap_ratings: true,
            ..
        }) = self.command
        {
            settings = settings.with_default_rating_map();
        }

        settings.validate()?;
        Ok(settings)
    }
}

pub fn usage() -> String {
    Args::command().render_help().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execute(args: &[&str]) -> Args {
        match Args::parse_from_args(args) {
            Invocation::Execute(args) => args,
            Invocation::Help(text) => panic!("expected a command, got help:\n{}", text),
        }
    }

    #[test]
    fn test_no_arguments_is_help() {
        assert!(matches!(
            Args::parse_from_args(["movie_dateadded"]),
            Invocation::Help(_)
        ));
    }

    #[test]
    fn test_unknown_arguments_are_help() {
        for args in [
            vec!["movie_dateadded", "frobnicate"],
            vec!["movie_dateadded", "--bogus"],
            vec!["movie_dateadded", "help"],
            vec!["movie_dateadded", "-h"],
        ] {
            match Args::parse_from_args(&args) {
                Invocation::Help(text) => assert!(text.contains("restore"), "{:?}", args),
                Invocation::Execute(parsed) => panic!("{:?} parsed as {:?}", args, parsed),
            }
        }
    }

    #[test]
    fn test_run_and_restore() {
        let args = execute(&["movie_dateadded", "--root", "/movies", "run"]);
        assert_eq!(
            args.command,
            Some(Command::Run {
                remap_ratings: false,
                dry_run: false
            })
        );
        assert_eq!(args.root, Some(PathBuf::from("/movies")));

        let args = execute(&["movie_dateadded", "run", "--dry-run", "--remap-ratings"]);
        assert_eq!(
            args.command,
            Some(Command::Run {
                remap_ratings: true,
                dry_run: true
            })
        );

        let args = execute(&["movie_dateadded", "restore", "--root", "/movies"]);
        assert_eq!(args.command, Some(Command::Restore));
    }

    #[test]
    fn test_settings_require_existing_root() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_str().unwrap();

        let args = execute(&["movie_dateadded", "--root", root, "--time", "13:52:00", "run", "--remap-ratings"]);
        let settings = args.settings().unwrap();
        assert_eq!(settings.time_of_day.to_string(), "13:52:00");
        assert!(!settings.rating_map.is_empty());

        let missing = temp.path().join("nope");
        let args = execute(&["movie_dateadded", "--root", missing.to_str().unwrap(), "run"]);
        assert!(args.settings().is_err());

        let args = execute(&["movie_dateadded", "--root", root, "--time", "late", "run"]);
        assert!(args.settings().is_err());
    }
}
