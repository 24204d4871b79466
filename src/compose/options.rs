//! Driver option tables
//!
//! Logging and volume drivers take free-form `key: value` options in
//! definition documents. [`OptionReader`] consumes them key by key for one
//! driver variant and rejects whatever the variant does not declare.

use crate::error::{Result, StackError};
use indexmap::IndexMap;

/// Consumes the option map of a single driver
#[derive(Debug)]
pub struct OptionReader {
    context: String,
    options: IndexMap<String, String>,
}

impl OptionReader {
    /// `context` names the driver in error messages, e.g. `logging driver 'gelf'`
    pub fn new(context: impl Into<String>, options: &IndexMap<String, String>) -> Self {
        Self {
            context: context.into(),
            options: options.clone(),
        }
    }

    /// Take a key the driver requires
    pub fn required(&mut self, key: &str) -> Result<String> {
        match self.options.shift_remove(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(StackError::missing(self.context.clone(), key)),
        }
    }

    /// Take an optional key
    pub fn optional(&mut self, key: &str) -> Option<String> {
        self.options.shift_remove(key)
    }

    /// Fail if any option was not consumed
    pub fn finish(self) -> Result<()> {
        if let Some(key) = self.options.keys().next() {
            return Err(StackError::shape(
                format!("{} option", self.context),
                format!("'{}' is not a valid option for this driver", key),
            ));
        }
        Ok(())
    }
}

/// Require a non-empty typed field
pub fn require_field(context: &str, key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StackError::missing(context, key));
    }
    Ok(())
}

/// Push `(key, value)` when the value is set
pub fn push_opt(out: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        out.push((key, value.clone()));
    }
}
