mod config;
mod engine;
#[cfg(test)]
mod fixtures;
mod handlers;
mod health;
mod metrics;
mod pod;
mod rules;
mod tls;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as HttpBuilder;
use hyper_util::service::TowerToHyperService;
use prometheus_client::registry::Registry;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "k8s-image-validator",
    about = "Validating admission webhook for pod images, resources and security context"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(
        long,
        default_value = "/etc/image-validator/config.yaml",
        env = "VALIDATOR_CONFIG"
    )]
    config: String,
}

async fn shutdown_signal(shutdown_tx: watch::Sender<()>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => info!("received CTRL+C, starting graceful shutdown"),
                _ = sigterm.recv() => info!("received SIGTERM, starting graceful shutdown"),
            },
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                let _ = ctrl_c.await;
                info!("received CTRL+C, starting graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("received CTRL+C, starting graceful shutdown");
    }

    let _ = shutdown_tx.send(());
}

async fn run_https_server(
    listener: TcpListener,
    tls_acceptor: TlsAcceptor,
    router: Router,
    ready: Arc<AtomicBool>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    ready.store(true, Ordering::Relaxed);

    loop {
        let (tcp_stream, remote_addr) = tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("failed to accept TCP connection: {e}");
                        continue;
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                info!("HTTPS server shutting down");
                ready.store(false, Ordering::Relaxed);
                break;
            }
        };

        let tls_acceptor = tls_acceptor.clone();
        let router = router.clone();

        // One task per connection. A client that hangs up mid-request just
        // drops the task; nothing is shared between requests.
        tokio::spawn(async move {
            let tls_stream = match tls_acceptor.accept(tcp_stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!(%remote_addr, "TLS handshake failed: {e}");
                    return;
                }
            };

            let io = TokioIo::new(tls_stream);
            let service = TowerToHyperService::new(router.into_service());

            if let Err(e) = HttpBuilder::new(hyper_util::rt::TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                error!(%remote_addr, "error serving connection: {e}");
            }
        });
    }
}

async fn run_http_server(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: watch::Receiver<()>,
) {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            info!("HTTP server shutting down");
        })
        .await
        .unwrap_or_else(|e| error!("HTTP server error: {e}"));
}

fn exit_with(message: String) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        exit_with("failed to install default CryptoProvider".to_string());
    }

    let cli = Cli::parse();

    let config = config::ValidatorConfig::load(&cli.config)
        .unwrap_or_else(|e| exit_with(format!("Failed to load config from {}: {e}", cli.config)));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        listen_addr = %config.listen_addr,
        metrics_addr = %config.metrics_addr,
        self_namespace = %config.self_namespace,
        approved_registries = ?config.rules.approved_registries,
        blocked_tags = ?config.rules.blocked_tags,
        "k8s-image-validator starting"
    );

    let tls_config = tls::load_server_config(&config.tls_cert_path, &config.tls_key_path)
        .unwrap_or_else(|e| exit_with(format!("Failed to load TLS config: {e}")));
    let tls_acceptor = TlsAcceptor::from(tls_config);

    let mut registry = Registry::default();
    let validator_metrics = metrics::ValidatorMetrics::new(&mut registry);
    let registry = Arc::new(registry);

    let app_state = Arc::new(handlers::AppState {
        validator: engine::Validator::new(config.rules.clone(), config.self_namespace.clone()),
        metrics: validator_metrics,
    });

    let webhook_router = Router::new()
        .route("/validate", post(handlers::handle_validate))
        .route("/health", get(health::health))
        .route("/", get(health::root))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(app_state);

    let ready = Arc::new(AtomicBool::new(false));
    let health_state = Arc::new(health::HealthState {
        registry,
        ready: ready.clone(),
    });

    let metrics_router = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics_handler))
        .with_state(health_state);

    let listen_addr: SocketAddr = config.listen_addr.parse().unwrap_or_else(|e| {
        exit_with(format!("Invalid listen_addr '{}': {e}", config.listen_addr))
    });
    let metrics_addr: SocketAddr = config.metrics_addr.parse().unwrap_or_else(|e| {
        exit_with(format!("Invalid metrics_addr '{}': {e}", config.metrics_addr))
    });

    let https_listener = TcpListener::bind(listen_addr)
        .await
        .unwrap_or_else(|e| exit_with(format!("failed to bind HTTPS on {listen_addr}: {e}")));
    info!(%listen_addr, "HTTPS webhook server listening");

    let http_listener = TcpListener::bind(metrics_addr)
        .await
        .unwrap_or_else(|e| exit_with(format!("failed to bind HTTP on {metrics_addr}: {e}")));
    info!(%metrics_addr, "HTTP metrics/health server listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let https_shutdown_rx = shutdown_rx.clone();
    let http_shutdown_rx = shutdown_rx;

    tokio::spawn(shutdown_signal(shutdown_tx));

    tokio::join!(
        run_https_server(https_listener, tls_acceptor, webhook_router, ready, https_shutdown_rx),
        run_http_server(http_listener, metrics_router, http_shutdown_rx),
    );

    info!("k8s-image-validator shut down gracefully");
}
