use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Maps the CLI's numeric level onto tracing levels.
///
/// 0 = error, 1 = warn, 2 = info, 3 = verbose, 4 = debug; verbose and debug
/// land on tracing's `debug` and `trace`.
pub fn level_name(level: u8) -> Option<&'static str> {
    match level {
        0 => Some("error"),
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        4 => Some("trace"),
        _ => None,
    }
}

pub fn init_logging(level: &str, timestamps: bool) {
    // Base level from the CLI, still overridable via RUST_LOG.
    let default = format!("{level},relwatch={level},reqwest=warn,hyper=warn");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    if timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}
