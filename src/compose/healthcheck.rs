//! Service healthchecks

use super::common::validate_duration;
use super::config::HealthcheckSpec;
use crate::command::Command;
use crate::error::{Result, StackError};

/// Healthcheck configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Healthcheck {
    test: Option<Command>,
    interval: Option<String>,
    timeout: Option<String>,
    start_period: Option<String>,
    retries: Option<u32>,
    disable: bool,
}

impl Healthcheck {
    /// Healthcheck running `test`
    pub fn new(test: impl Into<Command>) -> Result<Self> {
        let test = test.into();
        test.validate("healthcheck test")?;
        Ok(Self {
            test: Some(test),
            ..Self::default()
        })
    }

    /// Disable the image's healthcheck
    pub fn disabled() -> Self {
        Self {
            disable: true,
            ..Self::default()
        }
    }

    pub fn interval(mut self, interval: &str) -> Result<Self> {
        validate_duration("healthcheck interval", interval)?;
        self.interval = Some(interval.to_string());
        Ok(self)
    }

    pub fn timeout(mut self, timeout: &str) -> Result<Self> {
        validate_duration("healthcheck timeout", timeout)?;
        self.timeout = Some(timeout.to_string());
        Ok(self)
    }

    pub fn start_period(mut self, period: &str) -> Result<Self> {
        validate_duration("healthcheck start_period", period)?;
        self.start_period = Some(period.to_string());
        Ok(self)
    }

    pub fn retries(mut self, retries: u32) -> Result<Self> {
        if retries == 0 {
            return Err(StackError::range("healthcheck retries", "must be at least 1"));
        }
        self.retries = Some(retries);
        Ok(self)
    }

    pub fn from_spec(spec: &HealthcheckSpec) -> Result<Self> {
        if spec.disable {
            let extra = spec.test.is_some()
                || spec.interval.is_some()
                || spec.timeout.is_some()
                || spec.start_period.is_some()
                || spec.retries.is_some();
            if extra {
                return Err(StackError::shape(
                    "healthcheck",
                    "a disabled healthcheck cannot carry other settings",
                ));
            }
            return Ok(Self::disabled());
        }

        let test = spec
            .test
            .clone()
            .ok_or_else(|| StackError::missing("healthcheck", "test"))?;
        let mut check = Self::new(test)?;
        if let Some(interval) = &spec.interval {
            check = check.interval(interval)?;
        }
        if let Some(timeout) = &spec.timeout {
            check = check.timeout(timeout)?;
        }
        if let Some(period) = &spec.start_period {
            check = check.start_period(period)?;
        }
        if let Some(retries) = spec.retries {
            check = check.retries(retries)?;
        }
        Ok(check)
    }

    /// Test in the engine's array form: `CMD ...` or `CMD-SHELL ...`
    pub fn test_args(&self) -> Option<Vec<String>> {
        self.test.as_ref().map(|test| match test {
            Command::Exec(args) => {
                let mut out = Vec::with_capacity(args.len() + 1);
                out.push("CMD".to_string());
                out.extend(args.iter().cloned());
                out
            }
            Command::Shell(cmd) => vec!["CMD-SHELL".to_string(), cmd.clone()],
        })
    }

    pub fn is_disabled(&self) -> bool {
        self.disable
    }

    pub fn interval_value(&self) -> Option<&str> {
        self.interval.as_deref()
    }

    pub fn timeout_value(&self) -> Option<&str> {
        self.timeout.as_deref()
    }

    pub fn start_period_value(&self) -> Option<&str> {
        self.start_period.as_deref()
    }

    pub fn retries_value(&self) -> Option<u32> {
        self.retries
    }
}
