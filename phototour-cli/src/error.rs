//! CLI error types.

use std::fmt;

use phototour::config::ConfigError;
use phototour::route::RouteError;

/// Errors surfaced to the terminal user.
#[derive(Debug)]
pub enum CliError {
    /// Route file could not be loaded.
    Route(RouteError),

    /// Config file could not be loaded or validated.
    Config(ConfigError),

    /// Neither a local export directory nor storage credentials were given.
    MissingSource,

    /// The loaded route has no usable waypoints.
    EmptyRoute,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Route(e) => write!(f, "Failed to load route: {}", e),
            CliError::Config(e) => write!(f, "Failed to load config: {}", e),
            CliError::MissingSource => write!(
                f,
                "No image source: pass --export-dir for local files, or \
                 --storage-url and --service-key for private storage"
            ),
            CliError::EmptyRoute => write!(f, "Route has no waypoints with a GPS fix"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Route(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::MissingSource | CliError::EmptyRoute => None,
        }
    }
}

impl From<RouteError> for CliError {
    fn from(e: RouteError) -> Self {
        CliError::Route(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_display() {
        let err = CliError::MissingSource;
        assert!(err.to_string().contains("--export-dir"));
    }

    #[test]
    fn test_route_error_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CliError = RouteError::from(io).into();
        assert!(err.to_string().contains("Failed to load route"));
    }
}
