//! Embedding service — entry point.
//!
//! ```text
//! embed-service                       Run one host session and exit
//! embed-service --hold                Keep the session up until Ctrl-C
//! embed-service --target-display <id> Attach a surface control for display <id>
//! embed-service --config <path>       Load a custom config TOML
//! embed-service --gen-config          Write default config to stdout
//! embed-service --init-config         Write default config to --config path
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use embed_core::surface::DisplayId;
use embed_service::config::ServiceConfig;
use embed_service::service::EmbeddingRunner;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "embed-service", about = "Remote view embedding and display mirroring service")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "embed-service.toml")]
    config: PathBuf,

    /// Display to attach under the host's control surface. Defaults to
    /// the service's own display (drawn child); any other id is mirrored.
    #[arg(short, long)]
    target_display: Option<u32>,

    /// Keep the embedded content up until Ctrl-C.
    #[arg(long)]
    hold: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to `--config` and exit.
    #[arg(long)]
    init_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ServiceConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // --init-config: bootstrap a config file and exit.
    if cli.init_config {
        ServiceConfig::write_default(&cli.config)?;
        println!("Wrote {}", cli.config.display());
        return Ok(());
    }

    // Load config.
    let config = ServiceConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let target = DisplayId(cli.target_display.unwrap_or(config.display.own_display));
    info!("embed-service v{}", env!("CARGO_PKG_VERSION"));
    info!("own display: {}", config.display.own_display);
    info!("target display: {target}");
    info!("displays: {}", config.display.displays.len());

    let runner = EmbeddingRunner::new(config, target);
    let stop = runner.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    let report = runner.run(cli.hold).await?;
    info!(
        attached = report.attached,
        surface = ?report.during.surface_kind,
        delivery_failures = report.after.delivery_failures,
        "session complete"
    );

    Ok(())
}
