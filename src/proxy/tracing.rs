use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing: human-readable output on stdout, plus a plain-text
/// copy in the file named by `MIMIC_GATEWAY_LOG` when it is set.
///
/// Filtering follows `RUST_LOG` and defaults to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer().with_target(false).with_level(true);

    let file_layer = std::env::var("MIMIC_GATEWAY_LOG")
        .ok()
        .and_then(|log_path| match std::fs::File::create(&log_path) {
            Ok(file) => Some(file),
            Err(err) => {
                eprintln!("Warning: Failed to create log file {}: {}", log_path, err);
                None
            }
        })
        .map(|file| {
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}
