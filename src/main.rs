use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use relwatch::app::context::{AppContext, Shutdown};
use relwatch::app::supervisor;
use relwatch::infra::config::ConfigLoader;
use relwatch::infra::logging::{init_logging, level_name, BootError};
use relwatch::infra::random::MutexRng;
use relwatch::infra::reqwest_http::ReqwestHttp;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Watches release endpoints for version changes and notifies push/chat/webhook targets"
)]
struct Args {
    /// Path to the config file.
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    /// Print the fully-resolved config and exit.
    #[arg(long)]
    config_check: bool,

    /// 0 = error, 1 = warn, 2 = info, 3 = verbose, 4 = debug.
    #[arg(long, default_value_t = 2)]
    loglevel: u8,

    /// Prefix log lines with timestamps.
    #[arg(long)]
    timestamps: bool,
}

#[tokio::main]
async fn main() -> Result<(), BootError> {
    let args = Args::parse();

    let level = level_name(args.loglevel).ok_or_else(|| {
        BootError::Fatal(format!(
            "loglevel should be between 0 and 4 (inclusive), got {}",
            args.loglevel
        ))
    })?;

    // config-check keeps stdout clean for the dump.
    if !args.config_check {
        init_logging(level, args.timestamps);
    }

    let cfg = ConfigLoader::load(&args.config).await.map_err(|e| {
        BootError::Fatal(format!(
            "failed loading config from '{}': {e}",
            args.config.display()
        ))
    })?;

    if args.config_check {
        let rendered =
            serde_yaml::to_string(&cfg).map_err(|e| BootError::Fatal(e.to_string()))?;
        print!("{rendered}");
        return Ok(());
    }

    if cfg.service_count() == 0 {
        return Err(BootError::Fatal(format!(
            "no services to monitor were found in '{}'",
            args.config.display()
        )));
    }

    info!(
        monitors = cfg.monitors.len(),
        services = cfg.service_count(),
        "Monitoring targets"
    );
    for monitor in &cfg.monitors {
        if monitor.services.len() == 1 {
            info!("  - {}", monitor.services[0].id);
        } else {
            info!("  - {}:", monitor.id);
            for service in &monitor.services {
                info!("      - {}", service.id);
            }
        }
    }

    let http = Arc::new(ReqwestHttp::new().map_err(|e| BootError::Fatal(e.to_string()))?);
    let (handle, shutdown) = Shutdown::new();
    let ctx = AppContext {
        cfg: Arc::new(cfg),
        http,
        rng: Arc::new(MutexRng::new()),
        shutdown,
    };

    let trackers = tokio::spawn(supervisor::run(ctx));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed waiting for the shutdown signal");
    }
    info!("Shutdown signal received");
    handle.trigger();
    let _ = trackers.await;

    Ok(())
}
