use crate::core::config::LogFormat;
use crate::core::error::DmregError;

/// Environment variable read for the tracing filter directive.
pub const LOG_ENV: &str = "DMREG_LOG";

/// Install the global tracing subscriber. Logs go to stderr so stdout stays
/// clean for command output.
pub fn init_logging(format: LogFormat) -> Result<(), DmregError> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Json => subscriber.json().try_init(),
        LogFormat::Text => subscriber.try_init(),
    };
    installed.map_err(|e| DmregError::ConfigError(format!("logging init failed: {e}")))
}
