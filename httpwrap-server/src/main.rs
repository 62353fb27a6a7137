use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueHint};
use httpwrap_api::api::Config;
use log::LevelFilter;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigSource, JsonFileSource};

mod config;
mod process;
mod routes;

/// Time in-flight requests get to finish after a shutdown signal.
const GRACE_PERIOD: Duration = Duration::from_secs(5);

const EXIT_MISSING_CONFIG_PATH: u8 = 1;
const EXIT_INVALID_CONFIG: u8 = 2;
const EXIT_SERVER_ERROR: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .filter(Some("tower_http"), LevelFilter::Debug)
        .filter(Some("httpwrap_server"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    let CliArgs { config } = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version are printed to stdout and are no failure.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_MISSING_CONFIG_PATH)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let Some(path) = config else {
        log::error!("CONFIG_FILE_PATH environment variable or --config must be set");
        return ExitCode::from(EXIT_MISSING_CONFIG_PATH);
    };

    log::info!(version = env!("CARGO_PKG_VERSION"); "initializing server");

    let source = JsonFileSource::new(path);
    let config = match source.config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(EXIT_INVALID_CONFIG);
        }
    };
    log::info!(
        path:debug = source.path(),
        endpoints = config.endpoints.len();
        "loaded config"
    );

    match serve(&config, shutdown_signal()).await {
        Ok(()) => {
            log::info!("successfully shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("got error from HTTP server: {e}");
            ExitCode::from(EXIT_SERVER_ERROR)
        }
    }
}

#[derive(Parser)]
struct CliArgs {
    /// Path of the JSON file describing the endpoints.
    #[arg(
        long,
        value_name = "FILE",
        value_hint = ValueHint::FilePath,
        env = "CONFIG_FILE_PATH",
    )]
    config: Option<PathBuf>,
}

/// Binds the configured address and serves until `shutdown` completes.
///
/// After `shutdown`, in-flight requests get [`GRACE_PERIOD`] to finish.
/// Remaining commands are killed afterwards and this returns without waiting for their connections.
async fn serve(
    config: &Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    // Cancelled when the grace period is over, kills all still running commands.
    let cancel = CancellationToken::new();
    let graceful = CancellationToken::new();

    let router = routes::routes(&config.endpoints, &cancel).layer(TraceLayer::new_for_http());

    let host = if config.listen_address.is_empty() {
        "0.0.0.0"
    } else {
        config.listen_address.as_str()
    };
    let listener = tokio::net::TcpListener::bind((host, config.listen_port)).await?;
    let addr = listener.local_addr()?;
    log::info!(addr:display; "listening on TCP");

    tokio::spawn({
        let graceful = graceful.clone();
        let cancel = cancel.clone();
        async move {
            shutdown.await;
            log::info!(
                grace_secs = GRACE_PERIOD.as_secs();
                "shutting down, waiting for in-flight requests"
            );
            graceful.cancel();
            tokio::time::sleep(GRACE_PERIOD).await;
            cancel.cancel();
        }
    });

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(graceful.cancelled_owned())
        .into_future();

    tokio::select! {
        result = server => result,
        () = cancel.cancelled() => {
            log::warn!("grace period elapsed, closing remaining connections");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install SIGINT (ctrl+c) handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => log::info!("received SIGINT (ctrl+c)"),
        () = terminate => log::info!("received SIGTERM"),
    }
}
