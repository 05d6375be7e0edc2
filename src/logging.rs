use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatted `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive` (e.g. `"info"` or
/// `"mini_toolflow=debug"`). Calling this more than once is harmless; only
/// the first subscriber is kept.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
