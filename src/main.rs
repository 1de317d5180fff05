use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use logrouter::config::{self, LogConfig};
use logrouter::logging::{ErrorViewer, Level, LogRouter, RouterLayer};
use logrouter::viewer;

/// Lines of the live log printed at startup
const TAIL_LINES: usize = 20;

fn main() -> Result<()> {
    let config = LogConfig::load()?;
    config::ensure_directories(&config)?;

    let errors = Arc::new(ErrorViewer::default());
    let router = Arc::new(LogRouter::new(config).with_error_sink(errors.clone()));
    router.initialize(true)?;

    // Route dependency events through the router, filtered by RUST_LOG
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(RouterLayer::new(Arc::clone(&router)))
        .init();

    let path = router.current_log_file_path();
    router.log(&format!("Logging to: {}", path.display()), Level::Message);

    for line in viewer::tail(&path, TAIL_LINES, Level::Message)? {
        println!("{}", line);
    }

    if !errors.is_empty() {
        router.log(
            &format!("{} error(s) reported this session", errors.len()),
            Level::Warning,
        );
    }

    router.close();
    Ok(())
}
