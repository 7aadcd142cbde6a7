use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `info` by default, `debug` when verbose; `RUST_LOG` wins over both.
/// `log` records are forwarded into the same subscriber.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_file(false),
        )
        .try_init();

    if let Err(e) = initialized {
        eprintln!("Logging already initialized: {e}");
    }
    if verbose {
        tracing::info!("Verbose logging enabled");
    }
}
