//! Value types and validators shared by several entities

use crate::error::{Result, StackError};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static ENV_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("valid env key regex"));

static LABEL_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_./-]*$").expect("valid label regex"));

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(\.[0-9]+)?(ns|us|ms|s|m|h))+$").expect("valid duration regex")
});

static BYTE_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+(\.[0-9]+)?([bBkKmMgGtT][bB]?)?$").expect("valid byte size regex")
});

/// Whether a network or volume is managed outside the stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum External {
    /// `external: true`
    Flag(bool),
    /// External resource with a different engine-side name
    Named { name: String },
}

impl External {
    /// Whether the resource is external at all
    pub fn is_external(&self) -> bool {
        match self {
            External::Flag(flag) => *flag,
            External::Named { .. } => true,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let External::Named { name } = self {
            if name.trim().is_empty() {
                return Err(StackError::missing("external", "name"));
            }
        }
        Ok(())
    }
}

/// Resource scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Local,
    Global,
    Swarm,
}

impl Scope {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "local" => Ok(Scope::Local),
            "global" => Ok(Scope::Global),
            "swarm" => Ok(Scope::Swarm),
            other => Err(StackError::shape(
                "scope",
                format!("unknown scope '{}' (expected local, global or swarm)", other),
            )),
        }
    }
}

/// Validate an environment variable name
pub fn validate_env_key(key: &str) -> Result<()> {
    if !ENV_KEY_RE.is_match(key) {
        return Err(StackError::shape(
            "environment",
            format!("'{}' is not a valid variable name", key),
        ));
    }
    Ok(())
}

/// Insert a validated label
pub fn insert_label(labels: &mut IndexMap<String, String>, key: &str, value: &str) -> Result<()> {
    if !LABEL_KEY_RE.is_match(key) {
        return Err(StackError::shape(
            "label",
            format!("'{}' is not a valid label key", key),
        ));
    }
    labels.insert(key.to_string(), value.to_string());
    Ok(())
}

/// Validate a driver option or address key such as `com.docker.network.mtu`
pub fn validate_option_key(field: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StackError::missing(field, "key"));
    }
    if !LABEL_KEY_RE.is_match(key) {
        return Err(StackError::shape(
            field,
            format!("'{}' is not a valid option key", key),
        ));
    }
    Ok(())
}

/// Validate a duration such as `30s` or `1m30s`
pub fn validate_duration(field: &str, value: &str) -> Result<()> {
    if !DURATION_RE.is_match(value) {
        return Err(StackError::shape(
            field,
            format!("'{}' is not a duration (e.g. 30s, 1m30s)", value),
        ));
    }
    Ok(())
}

/// Validate a byte size such as `512M` or `1.5g`
pub fn validate_byte_size(field: &str, value: &str) -> Result<()> {
    if !BYTE_SIZE_RE.is_match(value) {
        return Err(StackError::shape(
            field,
            format!("'{}' is not a byte size (e.g. 512M, 2g)", value),
        ));
    }
    Ok(())
}

/// Validate an absolute container path
pub fn validate_container_path(field: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(StackError::missing(field, "path"));
    }
    if !path.starts_with('/') {
        return Err(StackError::shape(
            field,
            format!("'{}' must be an absolute path", path),
        ));
    }
    Ok(())
}

/// Validate a string that must be non-empty and free of whitespace
pub fn validate_token(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StackError::missing(field, "value"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(StackError::shape(
            field,
            format!("'{}' must not contain whitespace", value),
        ));
    }
    Ok(())
}

/// Parse `"true"` / `"false"`
pub fn parse_bool(field: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(StackError::shape(
            field,
            format!("expected true or false, got '{}'", other),
        )),
    }
}
