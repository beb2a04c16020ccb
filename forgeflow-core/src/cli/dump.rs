use crate::conf::{load_config, lower_config};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

pub fn dump(path: &Path, repr: RepresentationFormat) -> anyhow::Result<()> {
    println!("{}", render(path, repr)?);
    Ok(())
}

/// Pretty JSON of the file with defaults applied, or of the effective
/// degradation level table.
pub fn render(path: &Path, repr: RepresentationFormat) -> anyhow::Result<String> {
    let cfg = load_config(path)?;
    match repr {
        RepresentationFormat::Config => to_json(&cfg),
        RepresentationFormat::Levels => {
            let params = lower_config(&cfg)?;
            to_json(&params.degradation.levels.levels())
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepresentationFormat {
    Config,
    Levels,
}

impl FromStr for RepresentationFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(Self::Config),
            "levels" => Ok(Self::Levels),
            _ => Err(anyhow::anyhow!("invalid output format: {}", s)),
        }
    }
}
