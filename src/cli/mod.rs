//! CLI command definitions.
//!
//! `Cli` is the entry point; running without a subcommand starts the API server.

pub mod export;

use crate::format::OutputFormat;
use crate::types::StaffRole;
use clap::{Args, Parser, Subcommand, ValueEnum};
use export::ExportArgs;

/// Customer onboarding tracker server and operator tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Directory for uploaded files (overrides config)
    #[arg(short, long, global = true)]
    pub blob_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename (relative to the log dir)
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Port for the HTTP API (overrides config)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server (default if no subcommand given)
    Serve,

    /// Export the database to a structured JSON snapshot
    Export(ExportArgs),

    /// Print the portfolio overview
    Summary(SummaryArgs),

    /// Register a staff member (works on an empty database)
    AddStaff(AddStaffArgs),
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct AddStaffArgs {
    /// Login email
    #[arg(long)]
    pub email: String,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// Role
    #[arg(long, value_enum, default_value_t = RoleArg::Om)]
    pub role: RoleArg,
}

/// Staff role as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Admin,
    Om,
}

impl From<RoleArg> for StaffRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => StaffRole::Admin,
            RoleArg::Om => StaffRole::Om,
        }
    }
}
