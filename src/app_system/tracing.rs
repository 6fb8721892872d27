/// Configure tracing once at application startup.
///
/// `RUST_LOG` controls verbosity (`info` when unset); spans carry built-in
/// timing and the compact formatter keeps output readable under concurrency.
pub fn setup_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .compact()
        .init();
}
