use crate::conf::{ConfigError, ForgeFlowConfig, load_config, lower_config};
use owo_colors::OwoColorize;
use std::collections::BTreeSet;
use std::path::Path;

pub fn check(path: &Path, plain: bool) -> anyhow::Result<()> {
    match load_config(path).and_then(|cfg| lower_config(&cfg).map(|_| cfg)) {
        Ok(cfg) => {
            print_summary(&cfg, plain);
            Ok(())
        }
        Err(err) => {
            print_config_error(&err, path, plain);
            std::process::exit(1);
        }
    }
}

fn print_summary(cfg: &ForgeFlowConfig, plain: bool) {
    let levels = if cfg.degradation.levels.is_empty() {
        "5 (built-in)".to_string()
    } else {
        cfg.degradation.levels.len().to_string()
    };
    let lines = [
        "Config loaded successfully".to_string(),
        format!("{} breaker overrides", cfg.breakers.len()),
        format!("{} components configured", cfg.health_monitor.components.len()),
        format!("{levels} degradation levels"),
        format!("{} fallback strategies", cfg.degradation.strategies.len()),
        format!(
            "{} core components",
            cfg.degradation.emergency.core_components.len()
        ),
    ];

    for line in lines {
        if plain {
            println!("ok: {line}");
        } else {
            println!("{} {line}", "✔".green());
        }
    }
}

fn print_config_error(err: &ConfigError, path: &Path, plain: bool) {
    let errors: Vec<&ConfigError> = match err {
        ConfigError::Validation { validation_errors } => validation_errors.0.iter().collect(),
        other => vec![other],
    };

    if plain {
        for e in &errors {
            eprintln!("{}:error: {e}", path.display());
        }
    } else {
        eprintln!();
        eprintln!(
            "{} ({} errors)\n",
            "configuration check failed".bold(),
            errors.len()
        );
        eprintln!("{}", path.display());
        for e in &errors {
            eprintln!("  {}: {e}", "error".red().bold());
        }
    }

    let hints: BTreeSet<&'static str> = errors.iter().filter_map(|e| config_error_hint(e)).collect();
    for hint in hints {
        eprintln!();
        eprintln!("{hint}");
    }
}

pub fn config_error_hint(err: &ConfigError) -> Option<&'static str> {
    match err {
        ConfigError::InvalidCircuitBreaker { .. } => Some(
            "Breaker thresholds must be greater than zero, rates within (0, 1]\n\
             and timeout_ms at least 1000.\n\
             \n\
             Example:\n\
             \n\
             circuit_breaker = {\n\
             \x20 failure_threshold = 5\n\
             \x20 timeout_ms        = 60000\n\
             }",
        ),

        ConfigError::InvalidAlertChannel { .. } => Some(
            "Supported alert channels are \"log\" and \"event\".",
        ),

        ConfigError::InvalidLevels { .. } => Some(
            "Level ids must be contiguous from 0 and health ranges must not overlap,\n\
             with level 0 covering the best health.\n\
             \n\
             Example:\n\
             \n\
             levels = [\n\
             \x20 { id = 0, name = \"optimal\", min_health = 90, max_health = 100 },\n\
             \x20 { id = 1, name = \"reduced\", min_health = 0,  max_health = 89 },\n\
             ]",
        ),

        ConfigError::EmptyStrategy { .. } | ConfigError::InvalidStrategy { .. } => Some(
            "Fallback strategies need at least one action of a known type:\n\
             redirect, cache, mock, disable, isolate, backup_service, reduced_functionality.",
        ),

        _ => None,
    }
}
