use clap::{Parser, Subcommand, ValueEnum};
use postern_core::codegen;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "POSTERN_STORAGE_BACKEND";
pub const JOURNAL_PATH_ENV: &str = "POSTERN_JOURNAL_PATH";
pub const SQLITE_URL_ENV: &str = "POSTERN_SQLITE_URL";
pub const CODE_LENGTH_ENV: &str = "POSTERN_CODE_LENGTH";

pub const DEFAULT_JOURNAL_PATH: &str = "postern.jsonl";
pub const DEFAULT_SQLITE_URL: &str = "sqlite://postern.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "journal")]
    Journal,
    #[value(name = "sqlite")]
    Sqlite,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Memory => write!(f, "memory"),
            StorageBackendArg::Journal => write!(f, "journal"),
            StorageBackendArg::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "postern")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Journal
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = JOURNAL_PATH_ENV, default_value = DEFAULT_JOURNAL_PATH)]
    pub journal_path: PathBuf,

    #[arg(long, env = SQLITE_URL_ENV, default_value = DEFAULT_SQLITE_URL)]
    pub sqlite_url: String,

    #[arg(long, env = CODE_LENGTH_ENV, default_value_t = codegen::DEFAULT_CODE_LENGTH)]
    pub code_length: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one or more URLs for an owner.
    Create {
        #[arg(long)]
        owner: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Resolve a short code to its original URL.
    Resolve { short: String },
    /// List live mappings for an owner.
    List {
        #[arg(long)]
        owner: String,
    },
    /// Soft-delete short codes owned by an owner.
    Delete {
        #[arg(long)]
        owner: String,
        #[arg(required = true)]
        shorts: Vec<String>,
    },
    /// Probe the storage backend.
    Ping,
}
