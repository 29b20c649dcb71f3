use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{AdHocModel, OutputFormat, SchemaVersion};
use crate::export::{export, ExportOptions};
use crate::load_config::{load_config, load_default_config};
use crate::rpc::JsonRpcSource;

/// CLI for odoo-export: turn database customizations into module sources.
#[derive(Parser)]
#[clap(
    name = "odoo-export",
    version,
    about = "Export Odoo records into python, XML and CSV module files, merging into existing trees"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the records of a database into one module per owning module
    Export(ExportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Path to an alternative YAML export config file
    #[clap(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Destination addons directory
    #[clap(long, default_value = ".")]
    pub path: PathBuf,

    /// Target version of the exported modules (e.g. 17.0, saas~17.2, master)
    #[clap(long = "version", short = 'V', value_name = "SERIES", default_value = "master")]
    pub version: String,

    /// Comma-separated list of modules to export
    #[clap(long, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Export this model only
    #[clap(long, short = 'm')]
    pub model: Option<String>,

    /// Domain filtering the records of --model
    #[clap(long, short = 'd')]
    pub domain: Option<String>,

    /// Comma-separated fields of --model to export
    #[clap(long, short = 'F', value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Output format of --model (xml, csv or py)
    #[clap(long, short = 't')]
    pub format: Option<OutputFormat>,

    /// Create an importable, data-only module
    #[clap(long, short = 'i')]
    pub importable: bool,

    /// Do not migrate the manual / studio fields into python fields
    #[clap(long, short = 'M')]
    pub no_migrate_code: bool,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Export(args) => run_export(args).await,
    }
}

async fn run_export(args: ExportArgs) -> Result<()> {
    let version: SchemaVersion = args.version.parse()?;
    let loaded = match &args.config {
        Some(path) => load_config(path, args.importable)?,
        None => load_default_config(args.importable)?,
    };

    let mut config = loaded.export;
    match &args.model {
        Some(model) => config.restrict_to(&AdHocModel {
            model: model.clone(),
            domain: args.domain.clone(),
            fields: args.fields.clone(),
            format: args.format,
        })?,
        None if args.domain.is_some() || !args.fields.is_empty() || args.format.is_some() => {
            bail!("--domain, --fields and --format only apply together with --model");
        }
        None => {}
    }
    config.validate()?;

    let options = ExportOptions {
        destination: args.path,
        modules: args.modules,
        importable: args.importable,
        version,
        migrate_code: !args.no_migrate_code,
    };

    println!("Export starting...");
    let source = JsonRpcSource::connect(&loaded.connection).await?;
    match export(&source, &config, &options).await {
        Ok(report) => {
            println!("Export complete.\nReport:");
            println!("{:#?}", report);
            Ok(())
        }
        Err(e) => {
            eprintln!("[ERROR] Export failed: {}", e);
            Err(anyhow::Error::new(e))
        }
    }
}
