use clap::{Parser, Subcommand};
use quire_apiserver::{ApiServer, AppState, Config as ApiConfig};
use quire_client::{Backend, VcsFactory, DEFAULT_SERVER_URL};
use quire_core::ChangesetNum;
use quire_versioning::VersioningEngine;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "quire", about = "Quire changeset-oriented file versioning")]
struct Cli {
    /// Server to talk to for client commands
    #[arg(long, global = true, env = "QUIRE_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the versioning server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:7878")]
        bind: String,
        /// Path to the redb database file
        #[arg(long, default_value = "./quire.redb")]
        data_dir: PathBuf,
    },
    /// Create a staging changeset
    NewChangeset,
    /// Stage a write of CONTENT to PATH
    Write {
        path: String,
        content: String,
        /// Changeset to stage the write under
        #[arg(long, short)]
        changeset: Option<u64>,
    },
    /// Stage removal of PATH
    Delete {
        path: String,
        /// Changeset to stage the delete under
        #[arg(long, short)]
        changeset: Option<u64>,
    },
    /// Drop the association and staged change of PATH in a changeset
    Revert { changeset: u64, path: String },
    /// Associate PATH with a changeset
    Associate { changeset: u64, path: String },
    /// Remove the association of PATH with a changeset
    Disassociate { changeset: u64, path: String },
    /// Freeze the associated files of a changeset
    Finalize { changeset: u64 },
    /// Show the files of a changeset
    Files {
        changeset: u64,
        /// Show staged writes without requiring finalization
        #[arg(long)]
        pending: bool,
    },
    /// Show a changeset
    Show { changeset: u64 },
    /// Commit a changeset
    Commit {
        changeset: u64,
        /// Apply every staged write even if the changeset is not finalized
        #[arg(long)]
        force: bool,
    },
    /// Print the committed content of PATH
    Read { path: String },
    /// List committed revisions of PATH, newest first
    Versions {
        path: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, data_dir } => run_serve(&bind, data_dir).await,
        command => run_client(&cli.server, command).await,
    }
}

/// Run the API server until ctrl-c
async fn run_serve(bind: &str, data_dir: PathBuf) -> miette::Result<()> {
    info!("Starting quire server");

    let engine = VersioningEngine::open(&data_dir).map_err(|e| {
        miette::miette!("Failed to open storage at '{}': {}", data_dir.display(), e)
    })?;
    let state = Arc::new(AppState::new(Arc::new(engine)));

    let config = ApiConfig {
        listen_addr: bind
            .parse()
            .map_err(|e| miette::miette!("Invalid bind address '{}': {}", bind, e))?,
    };

    let token = CancellationToken::new();
    let server = ApiServer::new(config, state);
    let server_token = token.clone();
    let server_handle = tokio::spawn(async move {
        tokio::select! {
            result = server.run() => {
                if let Err(e) = result {
                    error!("API server error: {}", e);
                }
            }
            _ = server_token.cancelled() => {
                info!("API server shutting down");
            }
        }
        server_token.cancel();
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;
            info!("Shutting down gracefully...");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }

    let shutdown_timeout = std::time::Duration::from_secs(5);
    let _ = tokio::time::timeout(shutdown_timeout, server_handle).await;

    info!("Shutdown complete");
    Ok(())
}

/// Run one client command against a server
async fn run_client(server: &str, command: Commands) -> miette::Result<()> {
    let vcs = VcsFactory::new(Backend::Remote {
        base_url: server.to_string(),
    })
    .build()?;

    match command {
        Commands::NewChangeset => print_json(&vcs.new_staging_changeset().await?),
        Commands::Write {
            path,
            content,
            changeset,
        } => {
            let written = vcs
                .write_file(&path, content.as_bytes(), changeset.map(ChangesetNum::new))
                .await?;
            print_json(&quire_core::FileInfo::from(&written))
        }
        Commands::Delete { path, changeset } => {
            let staged = vcs
                .delete_file(&path, changeset.map(ChangesetNum::new))
                .await?;
            print_json(&quire_core::FileInfo::from(&staged))
        }
        Commands::Revert { changeset, path } => {
            print_json(&vcs.revert_file(ChangesetNum::new(changeset), &path).await?)
        }
        Commands::Associate { changeset, path } => {
            print_json(&vcs.associate_file(ChangesetNum::new(changeset), &path).await?)
        }
        Commands::Disassociate { changeset, path } => {
            print_json(&vcs.disassociate_file(ChangesetNum::new(changeset), &path).await?)
        }
        Commands::Finalize { changeset } => {
            print_json(&vcs.finalize_associated_files(ChangesetNum::new(changeset)).await?)
        }
        Commands::Files { changeset, pending } => {
            let num = ChangesetNum::new(changeset);
            if pending {
                print_json(&vcs.list_files(num).await?)
            } else {
                print_json(&vcs.get_files(num).await?)
            }
        }
        Commands::Show { changeset } => {
            print_json(&vcs.get_changeset(ChangesetNum::new(changeset)).await?)
        }
        Commands::Commit { changeset, force } => {
            print_json(&vcs.commit(ChangesetNum::new(changeset), force).await?)
        }
        Commands::Read { path } => {
            let record = vcs.read_file(&path).await?;
            std::io::stdout()
                .write_all(&record.content)
                .map_err(|e| miette::miette!("Failed to write to stdout: {}", e))
        }
        Commands::Versions { path, limit } => {
            print_json(&vcs.get_file_versions(&path, limit).await?)
        }
        Commands::Serve { .. } => Err(miette::miette!("serve is not a client command")),
    }
}

fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| miette::miette!("Failed to encode output: {}", e))?;
    println!("{}", json);
    Ok(())
}
