use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;

use scim_proxy::config::AppConfig;
use scim_proxy::proxy::client::UpstreamClient;
use scim_proxy::proxy::service::ProxyService;
use scim_proxy::startup;

#[derive(Parser, Debug)]
#[command(name = "scim-proxy")]
#[command(about = "Protocol-upgrading proxy for SCIM 2.0 legacy services")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Host to bind to (overrides PROXY_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PROXY_PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    let mut config = AppConfig::from_env()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config);

    let client = UpstreamClient::new(&config.upstream)?;
    let proxy = Arc::new(ProxyService::new(Arc::new(client), config.clone()));
    let app = startup::build_app(proxy, config.clone());

    let host: IpAddr = config
        .server
        .host
        .parse()
        .map_err(|_| format!("Invalid bind address: {}", config.server.host))?;
    let addr = SocketAddr::from((host, config.server.port));

    println!("🚀 SCIM Proxy v{}", env!("CARGO_PKG_VERSION"));
    println!("📍 Listening on {}", addr);
    println!("🔗 Upstream: {}", config.upstream.base_url);
    if config.cache.enabled {
        println!(
            "💾 Cache: {} entries, TTL {}s",
            config.cache.max_entries, config.cache.ttl_secs
        );
    } else {
        println!("💾 Cache: disabled");
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("✅ Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            println!("\n📛 Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            println!("\n📛 Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
