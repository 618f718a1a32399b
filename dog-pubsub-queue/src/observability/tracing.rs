//! Optional subscriber setup for binaries and examples embedding the driver.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the driver logs at `debug` when
/// `debug` is true and at `info` otherwise. Returns `false` if a global
/// subscriber was already installed.
pub fn init_tracing(debug: bool) -> bool {
    let fallback = if debug {
        "dog_pubsub_queue=debug"
    } else {
        "dog_pubsub_queue=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
