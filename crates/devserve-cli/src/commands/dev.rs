//! `devserve` command implementation.
//!
//! Resolves the effective configuration (defaults, then config file, then
//! CLI flags), starts the [`DevServer`] and runs until Ctrl-C or SIGTERM.

use devserve_core::config::load_config;
use devserve_core::DevConfig;
use devserve_server::DevServer;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Dev server action.
#[derive(Debug, Clone)]
pub struct DevAction {
    /// Project root.
    pub root: PathBuf,
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
    /// Open browser automatically.
    pub open: bool,
    /// Explicit config file path (overrides auto-discovery).
    pub config: Option<PathBuf>,
}

/// Run the dev server.
pub async fn run(action: DevAction) -> Result<()> {
    let root = dunce::canonicalize(&action.root).into_diagnostic()?;
    let config = effective_config(&action, &root)?;

    let port = config.port;
    let open = config.open;
    let url = format!("http://{}:{port}", config.host);

    let resolved = config.resolve().into_diagnostic()?;
    info!(
        plugins = ?resolved.plugins.plugin_names(),
        extensions = ?resolved.plugins.module_extensions(),
        "Plugins loaded"
    );

    let mut server = DevServer::new(resolved);
    server.listen(port).await.into_diagnostic()?;

    println!();
    println!("  Dev server running at {url}");
    println!("  Serving {}", server.root().display());
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    if open {
        if let Err(e) = open_browser(&url) {
            warn!(error = %e, "Failed to open browser");
        }
    }

    shutdown_signal().await;
    info!("Shutting down");
    server.close().await;

    Ok(())
}

/// Defaults, then the config file, then CLI flags.
fn effective_config(action: &DevAction, root: &Path) -> Result<DevConfig> {
    let mut config = DevConfig::new(root);

    if let Some((path, file)) = load_config(root, action.config.as_deref()).into_diagnostic()? {
        let rel_path = path.strip_prefix(root).unwrap_or(&path);
        info!(config = %rel_path.display(), "Loaded config");
        let dir = path.parent().unwrap_or(root);
        config = config.apply_file(file, dir);
    }

    Ok(config.apply_cli(action.port, &action.host, action.open))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Open a URL in the default browser.
fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }
    Ok(())
}
