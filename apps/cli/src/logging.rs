use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub(crate) fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "warn,omv_monitor=debug,omv_monitor_core=debug"
    } else {
        "warn,omv_monitor=info,omv_monitor_core=info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(default_directive(verbose)).is_ok());
        }
    }
}
