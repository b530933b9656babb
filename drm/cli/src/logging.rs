use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,drm_fairplay=debug";

/**
    Install a stderr subscriber. `RUST_LOG` wins over the built-in filter;
    `--verbose` raises everything to `debug`.
*/
pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
