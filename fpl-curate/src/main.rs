//! fpl-curate - Curation pipeline command line
//!
//! Loads the working curations folder of a launcher install and keeps it in
//! sync with disk, validates curations, and imports or exports them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fpl_common::config::{default_config_path, load_toml_config, resolve_root_folder};
use fpl_curate::services::{
    index_content_folder, ContentTreeNode, ImportOptions, ImportOutcome, CONTENT_FOLDER,
};
use fpl_curate::state::CurationAction;
use fpl_curate::{AppState, CurateError};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for fpl-curate
#[derive(Parser, Debug)]
#[command(name = "fpl-curate")]
#[command(about = "Curation pipeline for the launcher")]
#[command(version)]
struct Args {
    /// Launcher root folder
    #[arg(short, long)]
    root_folder: Option<String>,

    /// TOML config file (defaults to the user config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the working set and reconcile it with disk until Ctrl-C
    Watch,
    /// Print the manifest of a curation folder or archive
    Index { path: PathBuf },
    /// Extract a curation archive into the working folder
    Load { archive: PathBuf },
    /// Print the warnings and install collisions of a curation
    Validate { key: String },
    /// Pack a curation into an archive, overwriting `destination`
    Export { key: String, destination: PathBuf },
    /// Import one curation into the install
    Import {
        key: String,
        /// Keep a copy of the curation after importing
        #[arg(long)]
        save: bool,
    },
    /// Import every curation of the working set, one at a time
    ImportAll {
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = load_toml_config(&config_path);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    info!("Root folder: {}", root_folder.display());

    let mut state = AppState::new(root_folder, config);

    match args.command {
        Command::Watch => {
            let count = state.load_working_set().await;
            info!("Watching {} ({} curations)", state.curations_root().display(), count);
            state
                .watch(shutdown_signal())
                .await
                .context("Watcher failed")?;
        }
        Command::Index { path } => index(&state, &path).await?,
        Command::Load { archive } => {
            let key = state.load_archive(&archive).await?;
            println!("Loaded {} as {}", archive.display(), state.loader.folder_of(&key).display());
        }
        Command::Validate { key } => {
            add_to_store(&state, &key).await?;
            let curation = state
                .store
                .get(&key)
                .await
                .with_context(|| format!("Curation {} left the working set", key))?;
            let warnings = state.warning_context().generate(&curation).await;
            let collisions = state.existing_collisions(&key).await;
            if warnings.is_empty() && collisions.is_empty() {
                println!("{}: no warnings", key);
            }
            for warning in &warnings.written {
                println!("{}: [{}] {}", key, warning.name(), warning);
            }
            for collision in &collisions {
                println!("{}: [collision] {} exists at {}", key, collision.path, collision.destination.display());
            }
        }
        Command::Export { key, destination } => {
            add_to_store(&state, &key).await?;
            let entries = state
                .pipeline(Arc::new(state.install_importer()))
                .export(&key, &destination)
                .await?;
            println!("Exported {} ({} entries) to {}", key, entries, destination.display());
        }
        Command::Import { key, save } => {
            add_to_store(&state, &key).await?;
            let pipeline = state.pipeline(Arc::new(state.install_importer()));
            for warning in &pipeline.warnings(&key).await?.written {
                warn!(key = %key, "{}", warning);
            }
            for collision in state.existing_collisions(&key).await {
                warn!(key = %key, destination = %collision.destination.display(), "Overwriting {}", collision.path);
            }
            match pipeline.import(&key, options(save)).await {
                ImportOutcome::Imported => println!("Imported {}", key),
                ImportOutcome::Failed(error) => return Err(CurateError::ImportRejected(error).into()),
                ImportOutcome::Skipped(reason) => bail!("Import of {} skipped: {:?}", key, reason),
            }
        }
        Command::ImportAll { save } => {
            state.load_working_set().await;
            let summary = state
                .pipeline(Arc::new(state.install_importer()))
                .import_all(options(save))
                .await;
            println!(
                "Imported {} of {} ({} failed, {} skipped)",
                summary.imported, summary.total, summary.failed, summary.skipped
            );
        }
    }

    Ok(())
}

fn options(save: bool) -> ImportOptions {
    ImportOptions {
        log: true,
        date: None,
        save_curation: save,
    }
}

async fn add_to_store(state: &AppState, key: &str) -> Result<()> {
    let curation = state
        .loader
        .load_curation_folder(key)
        .await
        .with_context(|| format!("Failed to load curation {}", key))?;
    state.store.dispatch(CurationAction::AddCuration(curation)).await;
    Ok(())
}

/// Print the manifest, content tree and meta of a folder or archive
async fn index(state: &AppState, path: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;

    let report = if metadata.is_dir() {
        let content_folder = path.join(CONTENT_FOLDER);
        let content = index_content_folder(&content_folder).await;
        let meta = state.loader.read_meta(path).await.map(|parsed| parsed.meta);
        serde_json::json!({
            "content": content,
            "tree": ContentTreeNode::from_entries(&content),
            "meta": meta,
            "errors": Vec::<String>::new(),
        })
    } else {
        let index = state.archive_tool.index(path).await?;
        serde_json::json!({
            "content": index.content,
            "tree": ContentTreeNode::from_entries(&index.content),
            "meta": index.meta.map(|parsed| parsed.meta),
            "errors": index.errors,
        })
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Completes on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
