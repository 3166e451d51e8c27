pub mod args;
pub mod backup;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod processor;
pub mod writer;
pub mod xml;
