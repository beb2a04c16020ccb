mod error;
mod loader;
mod lower;
pub mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use error::{ConfigError, ValidationCtx, ValidationErrors};
pub use loader::{load_config, parse_config};
pub use lower::{
    ResourceSamplingParams, RuntimeParams, lower_breaker, lower_breaker_override, lower_config,
    lower_degradation, lower_health_monitor,
};
pub use types::{ForgeFlowConfig, LogFormat, LoggingConfig};
pub use validation::validate_config;
