//! Logging setup for hosting processes.

/// Install the global `tracing` subscriber.
///
/// Honors `RUST_LOG`; defaults to INFO. Safe to call more than once, later
/// calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}
