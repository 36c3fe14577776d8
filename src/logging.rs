use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `REPLAY_LOG` first, then `RUST_LOG`,
/// then `default_level`.
///
/// Field contract: `job_id` on every job event, `slice_id` on manifest
/// writes, `generation` on resets.
pub fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .try_init();
}

pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("REPLAY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}
