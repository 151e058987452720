// SPDX-License-Identifier: GPL-3.0-only

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Diagnostics go to stderr; only errors unless `--debug` or `RUST_LOG` says otherwise
pub(crate) fn init(debug: bool) {
    let env_filter = if debug {
        EnvFilter::new(directive(true))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(false)))
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "error" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_by_default() {
        assert_eq!(directive(false), "error");
        assert_eq!(directive(true), "debug");
    }
}
