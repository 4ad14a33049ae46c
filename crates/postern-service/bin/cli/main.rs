mod cli;

use crate::cli::{Command, StorageBackendArg, CLI};
use clap::Parser;
use postern_core::Store;
use postern_service::MappingService;
use postern_storage::{JournalStore, MemoryStore, SqliteStore};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = CLI::try_parse()?;

    info!(storage_backend = %config.storage, "starting postern");

    match config.storage {
        StorageBackendArg::Memory => run(MemoryStore::new(), config).await,
        StorageBackendArg::Journal => {
            let store = JournalStore::open(&config.journal_path)?;
            run(store, config).await
        }
        StorageBackendArg::Sqlite => {
            let store = SqliteStore::connect(&config.sqlite_url).await?;
            run(store, config).await
        }
    }
}

async fn run<S: Store>(store: S, config: CLI) -> anyhow::Result<()> {
    let service = MappingService::new(store).with_code_length(config.code_length);

    match config.command {
        Command::Create { owner, urls } => {
            if let [url] = urls.as_slice() {
                let record = service.create_one(&owner, url).await?;
                println!("{} -> {}", record.short, record.original);
            } else {
                match service.create_batch(&owner, urls).await {
                    Ok(records) => {
                        for record in &records {
                            println!("{} -> {}", record.short, record.original);
                        }
                    }
                    Err(partial) => {
                        for record in &partial.committed {
                            println!("{} -> {}", record.short, record.original);
                        }
                        service.close().await?;
                        return Err(partial.into());
                    }
                }
            }
        }
        Command::Resolve { short } => {
            println!("{}", service.resolve(&short).await?);
        }
        Command::List { owner } => {
            for record in service.list_owned(&owner).await? {
                println!("{} -> {}", record.short, record.original);
            }
        }
        Command::Delete { owner, shorts } => {
            let report = service.delete_owned(&owner, shorts).await?;
            println!("deleted in {} chunks", report.chunks_completed);
        }
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        }
    }

    service.close().await?;
    Ok(())
}
