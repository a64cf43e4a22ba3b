//! Logging configuration

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const WORKSPACE_TARGETS: [&str; 6] = [
    "secretbox",
    "secretbox_cli",
    "secretbox_fhe",
    "secretbox_contracts",
    "secretbox_storage",
    "secretbox_primitives",
];

/// Directive applying `level` to workspace crates and `warn` to dependencies
pub fn default_directive(level: &str) -> String {
    let mut directive = String::from("warn");
    for target in WORKSPACE_TARGETS {
        directive.push_str(&format!(",{target}={level}"));
    }
    directive
}

/// Initialize logging; `RUST_LOG` overrides `level`
pub fn init(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .map_err(|e| anyhow::anyhow!("Invalid log level {level:?}: {e}"))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;
    } else {
        subscriber
            .with(fmt::layer().with_target(false).compact())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;
    }

    Ok(())
}
