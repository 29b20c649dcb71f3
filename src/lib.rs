pub mod cli;
pub mod config;
pub mod contract;
pub mod convert;
pub mod domain;
pub mod error;
pub mod export;
pub mod load_config;
pub mod merge;
pub mod python;
pub mod record;
pub mod registry;
pub mod rename;
pub mod rpc;
pub mod scaffold;
pub mod xml;

pub use cli::{run, Cli, Commands};
pub use export::{export, ExportOptions, ExportReport};
