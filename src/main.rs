use anyhow::Context;
use movie_dateadded::args::{Args, Command, Invocation};
use movie_dateadded::logging;
use movie_dateadded::processor::Processor;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when any file could not be processed
fn run() -> anyhow::Result<bool> {
    let args = match Args::parse() {
        Invocation::Help(text) => {
            println!("{}", text);
            return Ok(true);
        }
        Invocation::Execute(args) => args,
    };

    let settings = args.settings()?;
    logging::init(&settings.log_path()).context("Failed to open log file")?;

    match args.command {
        Some(Command::Run { dry_run, .. }) => {
            let mut processor = Processor::new(settings, dry_run);
            Ok(!processor.run().has_failures())
        }
        Some(Command::Restore) => {
            let report = Processor::new(settings, false).restore()?;
            Ok(report.failed.is_empty())
        }
        Some(Command::ListBackups) => {
            Processor::new(settings, false).list_backups()?;
            Ok(true)
        }
        None => {
            println!("{}", movie_dateadded::args::usage());
            Ok(true)
        }
    }
}
