use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
///
/// Logs go to stderr so they do not interleave with the command prompt output.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(default_level: &str, json: bool) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder
            .json()
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .finish()
            .try_init()?;
    } else {
        builder
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .finish()
            .try_init()?;
    }

    Ok(())
}
