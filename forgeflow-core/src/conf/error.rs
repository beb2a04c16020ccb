use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    //-------------------------------------------------------------------------
    // IO / Parsing
    //-------------------------------------------------------------------------
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {path}\n\n{source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: hcl::Error,
    },

    #[error("{validation_errors}")]
    Validation { validation_errors: ValidationErrors },

    //-------------------------------------------------------------------------
    // Logging
    //-------------------------------------------------------------------------
    #[error("invalid log level '{level}'")]
    InvalidLogLevel { level: String },

    //-------------------------------------------------------------------------
    // Circuit breakers
    //-------------------------------------------------------------------------
    #[error("invalid circuit breaker config for '{breaker}': {reason}")]
    InvalidCircuitBreaker { breaker: String, reason: String },

    //-------------------------------------------------------------------------
    // Health monitor
    //-------------------------------------------------------------------------
    #[error("invalid health monitor setting '{field}': {reason}")]
    InvalidMonitor { field: &'static str, reason: String },

    #[error("invalid {resource} threshold {value}: must be within (0, 100]")]
    InvalidThreshold { resource: &'static str, value: f64 },

    #[error("unknown alert channel '{channel}'")]
    InvalidAlertChannel { channel: String },

    #[error("invalid component '{component}': {reason}")]
    InvalidComponent { component: String, reason: String },

    //-------------------------------------------------------------------------
    // Degradation
    //-------------------------------------------------------------------------
    #[error("invalid degradation setting '{field}': {reason}")]
    InvalidDegradation { field: &'static str, reason: String },

    #[error("invalid degradation levels: {reason}")]
    InvalidLevels { reason: String },

    #[error("strategy for '{component}' has no actions")]
    EmptyStrategy { component: String },

    #[error("invalid strategy for '{component}': {reason}")]
    InvalidStrategy { component: String, reason: String },
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: hcl::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}

/// Every semantic error found in one validation pass.
#[derive(Debug, Error)]
pub struct ValidationErrors(pub Vec<ConfigError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration validation failed ({} errors)", self.0.len())
    }
}

#[derive(Default)]
pub struct ValidationCtx {
    errors: Vec<ConfigError>,
}

impl ValidationCtx {
    pub fn push(&mut self, err: ConfigError) {
        self.errors.push(err);
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}
