use crate::core::csv_io::ExportKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "health-store")]
#[command(about = "School health-check data store: requests, CSV import/export, backups and migration")]
pub struct Cli {
    /// Path to TOML configuration file (defaults to an in-memory local store)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one request through the adapter, e.g. `request GET tables/students?limit=5`
    Request {
        method: String,
        path: String,
        /// JSON body for POST / PUT / PATCH
        #[arg(long)]
        body: Option<String>,
        /// Give up waiting after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Bulk-register students or teachers from a CSV file
    ImportCsv {
        /// students or teachers
        #[arg(long)]
        table: String,
        file: PathBuf,
    },
    /// Write a CSV export (students, teachers or the consultation report)
    ExportCsv {
        #[arg(long, value_enum)]
        kind: ExportKind,
        /// Output file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Dump every table as a JSON snapshot
    ExportJson {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Restore tables from a JSON snapshot
    ImportJson { file: PathBuf },
    /// Copy every table into the store described by another config file
    Migrate {
        #[arg(long)]
        to_config: PathBuf,
    },
    /// Check that the configured backend is reachable
    Ping,
    /// Replace every table with the sample data
    Reset,
}
