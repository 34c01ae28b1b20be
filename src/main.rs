//! credprov plugin binary entry point.
//!
//! Resolves the configuration snapshot, initializes logging on stderr
//! (stdout is the protocol channel), and runs the stdio request loop until
//! `Close`, transport EOF, or an interrupt — whichever fires first.

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use credprov::config::{PluginConfig, Verbosity};
use credprov::protocol::{Request, RequestEnvelope, ResponseEnvelope};
use credprov::session::PluginSession;

#[derive(Debug, Parser)]
#[command(name = "credprov", about = "Credential provider plugin for package feeds")]
struct Cli {
    /// Marker the package manager passes when launching in plugin mode.
    #[arg(long)]
    plugin: bool,

    /// Override the configured verbosity.
    #[arg(long)]
    verbosity: Option<Verbosity>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = PluginConfig::from_env();
    if let Some(verbosity) = cli.verbosity {
        config.verbosity = verbosity;
    }

    let initial_filter = match std::env::var("RUST_LOG") {
        Ok(spec) => tracing_subscriber::EnvFilter::new(spec),
        Err(_) => tracing_subscriber::EnvFilter::new(config.verbosity.level_filter().to_string()),
    };
    let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(initial_filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    if !cli.plugin {
        tracing::debug!("running without the plugin marker; serving stdio anyway");
    }

    let session = Arc::new(
        PluginSession::new(Arc::new(config)).with_level_sink(move |level| {
            let _ = reload_handle.reload(tracing_subscriber::EnvFilter::new(level.to_string()));
        }),
    );

    if let Err(error) = run(session).await {
        tracing::error!(%error, "plugin loop failed");
        std::process::exit(1);
    }
}

/// Stdio request loop.
///
/// Each stdin line is a request envelope; handlers run concurrently and
/// their responses funnel through a single writer task. The loop exits on
/// `Close`, EOF, or ctrl-c.
async fn run(session: Arc<PluginSession>) -> credprov::error::Result<()> {
    let shutdown = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<String>(32);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut result = Ok(());

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!("transport closed, shutting down");
                    break;
                }
                Err(error) => {
                    tracing::warn!(%error, "transport fault, shutting down");
                    result = Err(error.into());
                    break;
                }
            },
        };

        if line.trim().is_empty() {
            continue;
        }

        let envelope: RequestEnvelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!(%error, "discarding malformed request line");
                continue;
            }
        };

        let is_close = matches!(envelope.request, Request::Close);
        dispatch(session.clone(), envelope, tx.clone(), &shutdown);
        if is_close {
            shutdown.cancel();
        }
    }

    // Resolve any in-flight handlers promptly, then drain the writer.
    shutdown.cancel();
    drop(tx);
    let _ = writer.await;
    result
}

/// Handle one request on its own task so pipelined requests interleave.
fn dispatch(
    session: Arc<PluginSession>,
    envelope: RequestEnvelope,
    tx: mpsc::Sender<String>,
    shutdown: &CancellationToken,
) {
    let cancel = shutdown.child_token();

    tokio::spawn(async move {
        let request_id = envelope.request_id;

        // The timeout negotiated by Initialize bounds each request. The
        // watchdog fires the request token so in-flight helper processes
        // are torn down, and is aborted as soon as the handler resolves.
        let watchdog = session.request_timeout().map(|limit| {
            let deadline = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::warn!(request_id, "request exceeded the negotiated timeout");
                deadline.cancel();
            })
        });

        let handled = session.handle(envelope.request, &cancel).await;

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let Some(payload) = handled else {
            return; // Close sends no response.
        };

        let response = ResponseEnvelope {
            request_id,
            payload,
        };
        match serde_json::to_string(&response) {
            Ok(line) => {
                let _ = tx.send(line).await;
            }
            Err(error) => {
                tracing::error!(request_id, %error, "failed to encode response");
            }
        }
    });
}
