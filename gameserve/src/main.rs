//! Gameserve - local development server for the Particle Hand Game
//!
//! Serves the game files that sit next to the executable, with the
//! cross-origin isolation headers the hand tracker needs, and opens a
//! browser tab pointed at the game.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use gameserve_core::config::ServerConfig;
use gameserve_core::server::HttpServer;
use gameserve_static::FileServer;
use http::{HeaderName, HeaderValue};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fixed port; the game's URLs assume it
const PORT: u16 = 3000;

/// Added to every response. Both are required for cross-origin isolation,
/// which the game needs for SharedArrayBuffer-backed hand tracking.
const EXTRA_HEADERS: &[(&str, &str)] = &[
    ("cross-origin-embedder-policy", "require-corp"),
    ("cross-origin-opener-policy", "same-origin"),
];

/// The generic extension table maps .ts to video/mp2t and some platforms
/// register stale types for .js, either of which breaks module loading.
const MIME_OVERRIDES: &[(&str, &str)] = &[
    ("ts", "application/typescript"),
    ("js", "application/javascript"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let root = exe_dir().context("failed to resolve the directory containing the executable")?;
    let config = build_config(root);
    let handler = FileServer::new(&config);
    let server = HttpServer::bind(config, handler).await?;

    println!("🎮 Particle Hand Game Server");
    println!("🌐 Server running at http://localhost:{PORT}");
    println!("📱 Make sure to allow camera access!");
    println!("🛑 Press Ctrl+C to stop");

    let url = format!("http://localhost:{PORT}");
    if let Err(e) = open::that(&url) {
        tracing::debug!("could not open a browser for {}: {}", url, e);
    }

    server.run_until(shutdown_signal()).await?;

    println!("\n🛑 Server stopped");
    Ok(())
}

/// Resolves when Ctrl+C arrives. If the handler cannot even be installed
/// there is no shutdown path, so keep serving.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

fn exe_dir() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .context("executable has no parent directory")?;
    Ok(dir.to_path_buf())
}

fn build_config(root: PathBuf) -> ServerConfig {
    let addr = SocketAddr::from(([0, 0, 0, 0], PORT));
    let mut config = ServerConfig::new(addr, root);
    for &(name, value) in EXTRA_HEADERS {
        config = config.with_header(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    for &(ext, mime) in MIME_OVERRIDES {
        config = config.with_mime_override(ext, mime);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_carries_isolation_headers_and_overrides() {
        let config = build_config(PathBuf::from("."));

        assert_eq!(config.addr.port(), PORT);
        assert_eq!(config.extra_headers.len(), 2);
        assert!(config
            .extra_headers
            .iter()
            .any(|(n, v)| n.as_str() == "cross-origin-embedder-policy"
                && v == "require-corp"));
        assert_eq!(
            config.mime_overrides.get("ts").map(String::as_str),
            Some("application/typescript")
        );
        assert_eq!(
            config.mime_overrides.get("js").map(String::as_str),
            Some("application/javascript")
        );
    }
}
