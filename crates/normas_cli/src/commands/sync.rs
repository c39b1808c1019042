//! The sync command: mirror a slice of the corpus into a local directory.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use normas::repository::FileDocumentRepository;
use normas::saij::SaijClient;
use normas::source::Search;
use normas::sync::{SyncEngine, SyncOptions, default_checkpoint_path};

use crate::SyncArgs;
use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::shutdown::shutdown_flag;

/// Where poison records land, next to the workflow that consumes them.
const ERROR_DIR: &str = ".github/.normas";

pub async fn handle_sync(
    args: SyncArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let query = Search {
        tipo: args.tipo,
        jurisdiccion: args.jurisdiccion,
        provincia: args.provincia,
        filters: args.filtros.iter().cloned().collect(),
    };

    let dir = args.dir.clone().unwrap_or_else(|| config.directory());
    let client = Arc::new(SaijClient::new(&config.base_url())?);
    let repository = Arc::new(FileDocumentRepository::new(&dir)?);

    // CI runners get a fresh temp dir per job, so a checkpoint there
    // would never be found again.
    let checkpoint = if env::var_os("CI").is_some() {
        None
    } else {
        Some(default_checkpoint_path())
    };

    let options = SyncOptions {
        query,
        page_size: config.sync.page_size,
        concurrency: if args.serial {
            1
        } else {
            config.sync.concurrency
        },
        skip: args.skip,
        top: args.top,
        force: args.force,
        resume: args.resume,
        checkpoint,
        error_dir: Some(PathBuf::from(ERROR_DIR)),
        max_attempts: config.sync.max_attempts,
        ..SyncOptions::default()
    };

    let reporter = Arc::new(ProgressReporter::new());
    let engine = SyncEngine::new(client, repository, options);
    let result = engine
        .run(shutdown_flag(), Some(reporter.as_callback()))
        .await;
    reporter.finish();

    // Printed, not traced: interactive runs have no tracing subscriber.
    if let Some(path) = &args.changelog {
        result.summary.save(path, args.appendlog)?;
        println!("Changelog escrito en {}", path.display());
    } else {
        println!("\n{}", result.summary.to_report());
    }

    // Poisoned documents are recorded for the next run; they do not fail
    // this one.
    if !result.poisoned.is_empty() {
        eprintln!("{}", poison_notice(result.poisoned.len()));
    }

    Ok(())
}

fn poison_notice(count: usize) -> String {
    format!(
        "No se pudieron sincronizar {} documento(s); registros en {}",
        count, ERROR_DIR
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poison_notice_names_the_error_dir() {
        let notice = poison_notice(3);

        assert!(notice.contains("3 documento"));
        assert!(notice.contains(ERROR_DIR));
    }
}
