use crate::cli::{RepresentationFormat, render};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::str::FromStr;
use tempfile::tempdir;

#[test]
fn levels_dump_lists_built_in_table_for_empty_file() {
    // Arrange
    let dir = tempdir().unwrap();
    let path = dir.path().join("forgeflow.hcl");
    fs::write(&path, "").unwrap();

    // Act
    let out = render(&path, RepresentationFormat::Levels).unwrap();

    // Assert
    let levels: Value = serde_json::from_str(&out).unwrap();
    let names: Vec<&str> = levels
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["optimal", "minor", "degraded", "critical", "emergency"]
    );
    assert_eq!(levels[4]["actions"][0]["type"], "enter_emergency_mode");
}

#[test]
fn config_dump_fills_defaults() {
    // Arrange
    let dir = tempdir().unwrap();
    let path = dir.path().join("forgeflow.hcl");
    fs::write(&path, "logging = {\n  level = \"debug\"\n}\n").unwrap();

    // Act
    let out = render(&path, RepresentationFormat::Config).unwrap();

    // Assert
    let cfg: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(cfg["logging"]["level"], "debug");
    assert_eq!(cfg["circuit_breaker"]["failure_threshold"], 5);
}

#[test]
fn unknown_representation_is_rejected() {
    assert!(RepresentationFormat::from_str("yaml").is_err());
    assert_eq!(
        RepresentationFormat::from_str("levels").unwrap(),
        RepresentationFormat::Levels
    );
}
