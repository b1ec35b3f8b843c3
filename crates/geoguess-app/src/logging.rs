use crate::config::LoggingConfig;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber on stderr, leaving stdout to the game.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(logging: &LoggingConfig) {
    let level = logging.level().unwrap_or(Level::WARN);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr);

    // A subscriber installed earlier in the process stays in charge.
    if logging.json {
        let _ = tracing::subscriber::set_global_default(
            builder.json().with_current_span(false).finish(),
        );
    } else {
        let _ = tracing::subscriber::set_global_default(builder.with_target(false).finish());
    }
}
