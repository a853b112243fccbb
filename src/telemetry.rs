use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the JSON subscriber. `RUST_LOG` overrides `default_level`.
/// Records emitted through the `log` crate are forwarded as well.
///
/// A second call is a no-op, so test binaries may call it freely.
pub fn init_telemetry(default_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialization_is_harmless() {
        init_telemetry("debug");
        init_telemetry("info");
        tracing::info!("telemetry ready");
    }
}
