use crate::conf::error::ConfigError;
use crate::conf::types::ForgeFlowConfig;
use crate::conf::validation::validate_config;
use std::fs;
use std::path::Path;

/// Reads, parses and validates a configuration file.
pub fn load_config(path: &Path) -> Result<ForgeFlowConfig, ConfigError> {
    //--------------------------------------------------------------------------
    // Hard fail: IO
    //--------------------------------------------------------------------------
    let src = fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    parse_config(&src, path)
}

/// Parses and validates configuration source. `origin` is only used in errors.
pub fn parse_config(src: &str, origin: &Path) -> Result<ForgeFlowConfig, ConfigError> {
    //--------------------------------------------------------------------------
    // Hard fail: parsing
    //--------------------------------------------------------------------------
    let cfg: ForgeFlowConfig = hcl::from_str(src).map_err(|e| ConfigError::parse(origin, e))?;

    //--------------------------------------------------------------------------
    // Semantic validation (aggregate all semantic errors)
    //--------------------------------------------------------------------------
    validate_config(&cfg).map_err(|errs| ConfigError::Validation {
        validation_errors: errs,
    })?;

    Ok(cfg)
}
