use std::path::PathBuf;

use birdbox_fixture::ServerMode;
use clap::{Parser, ValueEnum, command};

/// Database kinds the suite has snapshot fixtures for.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Athena,
    Bigquery,
}

impl DbType {
    /// Name used for logging and as the snapshot fixture suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Athena => "athena",
            DbType::Bigquery => "bigquery",
        }
    }
}

/// Server start modes accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Docker,
    Cli,
    Local,
}

impl From<Mode> for ServerMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Docker => ServerMode::Docker,
            Mode::Cli => ServerMode::Cli,
            Mode::Local => ServerMode::Local,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[clap(
        long = "type",
        value_enum,
        help = "Database the server under test is configured against."
    )]
    pub db_type: DbType,

    #[clap(
        long,
        visible_alias = "envFile",
        help = "Path to a .env file with database credentials and server configuration."
    )]
    pub env_file: PathBuf,

    #[clap(
        long,
        value_enum,
        default_value = "docker",
        help = "How to stand up the server."
    )]
    pub mode: Mode,
}

#[must_use]
pub fn parse_args() -> Args {
    Args::parse()
}
