//! Logging and tracing initialization.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Log targets of the framestitch crates and the `framestitch` binary.
const FRAMESTITCH_TARGETS: &[&str] = &[
    "framestitch",
    "framestitch_common",
    "framestitch_sequence_model",
    "framestitch_engine",
];

/// Filter used when `RUST_LOG` is unset: our crates log at `level`, every
/// other crate only at `warn`.
fn default_directives(level: &str) -> String {
    let mut directives: Vec<String> = FRAMESTITCH_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    directives.push("warn".to_string());
    directives.join(",")
}

/// Initialize the tracing subscriber on stderr, keeping stdout for command output.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    if config.json {
        let subscriber = builder.json().finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = builder.with_target(false).finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}
