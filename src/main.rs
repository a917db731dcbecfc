//! AddRemarks command-line client.
//!
//! `upload` drives a file through the processing backend, `serve` runs the
//! offline caching proxy in front of the web app, `manifest` prints the
//! installable-app descriptor.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use addremarks::backend::http_backend::HttpBackend;
use addremarks::backend::traits::Backend;
use addremarks::config::{AppConfig, ClientConfig, WorkerConfig, BACKEND_URL_ENV};
use addremarks::controller::session::{FileOrigin, SelectedFile, UploadStatus};
use addremarks::controller::upload::UploadController;
use addremarks::manifest::AppManifest;
use addremarks::server::handler::OfflineProxy;
use addremarks::telemetry::init_tracing;
use addremarks::worker::lifecycle::ServiceWorker;
use addremarks::worker::network::HttpNetwork;
use addremarks::worker::storage::MemoryCacheStorage;

#[derive(Parser, Debug)]
#[command(name = "addremarks")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "ADDREMARKS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a CSV/Excel file and wait for the processed result
    Upload {
        file: PathBuf,

        /// Backend base URL
        #[arg(long, env = BACKEND_URL_ENV)]
        backend_url: Option<String>,

        /// Where to save the processed file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Reject files that are not CSV or Excel, as a drop target does
        #[arg(long)]
        strict_type: bool,
    },

    /// Run the offline caching proxy in front of the web app
    Serve {
        /// Origin of the web app
        #[arg(long)]
        origin: Option<String>,

        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: SocketAddr,
    },

    /// Print the installable-app manifest
    Manifest,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let app = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig {
            client: ClientConfig::from_env(),
            worker: WorkerConfig::default(),
        },
    };

    match cli.command {
        Command::Upload {
            file,
            backend_url,
            output,
            strict_type,
        } => {
            let mut client = app.client;
            if let Some(url) = backend_url {
                client.backend_url = url;
            }
            let origin = if strict_type {
                FileOrigin::DragDrop
            } else {
                FileOrigin::Picker
            };
            upload(&client, &file, origin, output.as_deref()).await
        }
        Command::Serve { origin, listen } => {
            let mut worker = app.worker;
            if let Some(origin) = origin {
                worker.origin = origin;
            }
            serve(&worker, listen).await
        }
        Command::Manifest => {
            println!("{}", AppManifest::default().to_json()?);
            Ok(())
        }
    }
}

async fn upload(
    config: &ClientConfig,
    path: &Path,
    origin: FileOrigin,
    output: Option<&Path>,
) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(config));
    let controller = Arc::new(UploadController::new(backend.clone(), config));

    let file = SelectedFile::from_path(path).await?;
    controller
        .select_file(file, origin)
        .map_err(|e| anyhow!(e.user_message()))?;

    let mut updates = controller.subscribe();
    let render = tokio::spawn(async move {
        let mut last = None;
        while updates.changed().await.is_ok() {
            let snap = updates.borrow_and_update().clone();
            let line = (snap.status, snap.progress, snap.message.clone());
            if last.as_ref() != Some(&line) {
                eprintln!("[{:>3}%] {:<10} {}", snap.progress, snap.status, snap.message);
                last = Some(line);
            }
        }
    });

    let result = controller.start_upload().await;
    drop(controller);
    let _ = render.await;

    if result.status != UploadStatus::Completed {
        return Err(anyhow!(result.message));
    }

    match (result.download_url, output) {
        (Some(url), Some(dest)) => {
            let data = backend
                .download(&url)
                .await
                .map_err(|e| anyhow!("download failed: {}", e))?;
            tokio::fs::write(dest, &data)
                .await
                .map_err(|e| anyhow!("failed to write {}: {}", dest.display(), e))?;
            info!("saved {} bytes to {}", data.len(), dest.display());
        }
        (Some(url), None) => println!("{}", url),
        (None, _) => info!("backend supplied no download link"),
    }
    Ok(())
}

async fn serve(config: &WorkerConfig, listen: SocketAddr) -> Result<()> {
    let network = Arc::new(HttpNetwork::new()?);
    let storage = Arc::new(MemoryCacheStorage::new());
    let worker = Arc::new(ServiceWorker::new(config, network, storage)?);

    let proxy = OfflineProxy::start_on(worker.clone(), listen).await?;
    info!("open {} in a browser; ctrl-c to stop", proxy.url("/"));

    tokio::signal::ctrl_c().await?;

    proxy.shutdown();
    worker.settle().await;
    worker.retire();
    info!("router stats: {:?}", worker.stats());
    Ok(())
}
