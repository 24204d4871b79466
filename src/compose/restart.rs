//! Service restart policy

use super::config::RestartSpec;
use crate::error::{Result, StackError};
use std::fmt;

/// Retry count used when `on-failure` is given without one
pub const DEFAULT_ON_FAILURE_TIMES: u8 = 5;

/// Allowed `on-failure` retry counts
pub const ON_FAILURE_TIMES: std::ops::RangeInclusive<u32> = 1..=10;

/// Restart policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Always,
    UnlessStopped,
    No,
    OnFailure { times: u8 },
}

impl RestartPolicy {
    /// `on-failure` with an optional retry count (default 5)
    pub fn on_failure(times: Option<u32>) -> Result<Self> {
        let times = times.unwrap_or(u32::from(DEFAULT_ON_FAILURE_TIMES));
        if !ON_FAILURE_TIMES.contains(&times) {
            return Err(StackError::range(
                "restart times",
                format!("{} is outside 1..=10", times),
            ));
        }
        // Bounded by ON_FAILURE_TIMES above
        Ok(RestartPolicy::OnFailure { times: times as u8 })
    }

    /// Parse a policy name; `times` is only accepted with `on-failure`
    pub fn parse(policy: &str, times: Option<u32>) -> Result<Self> {
        let simple = match policy {
            "always" => RestartPolicy::Always,
            "unless-stopped" => RestartPolicy::UnlessStopped,
            "no" => RestartPolicy::No,
            "on-failure" => return Self::on_failure(times),
            other => {
                return Err(StackError::shape(
                    "restart",
                    format!(
                        "unknown policy '{}' (expected always, unless-stopped, no or on-failure)",
                        other
                    ),
                ))
            }
        };
        if times.is_some() {
            return Err(StackError::shape(
                "restart",
                format!("'times' is only valid with on-failure, not '{}'", policy),
            ));
        }
        Ok(simple)
    }

    pub fn from_spec(spec: &RestartSpec) -> Result<Self> {
        match spec {
            RestartSpec::Policy(policy) => Self::parse(policy, None),
            RestartSpec::Detailed { policy, times } => Self::parse(policy, *times),
        }
    }

    /// Policy name
    pub fn name(&self) -> &'static str {
        match self {
            RestartPolicy::Always => "always",
            RestartPolicy::UnlessStopped => "unless-stopped",
            RestartPolicy::No => "no",
            RestartPolicy::OnFailure { .. } => "on-failure",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::OnFailure { times } => write!(f, "on-failure:{}", times),
            other => write!(f, "{}", other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_failure_default_times() {
        let policy = RestartPolicy::parse("on-failure", None).unwrap();
        assert_eq!(policy, RestartPolicy::OnFailure { times: 5 });
    }

    #[test]
    fn test_on_failure_range() {
        assert!(RestartPolicy::on_failure(Some(1)).is_ok());
        assert!(RestartPolicy::on_failure(Some(10)).is_ok());
        assert!(matches!(
            RestartPolicy::on_failure(Some(0)),
            Err(StackError::Range { .. })
        ));
        assert!(matches!(
            RestartPolicy::on_failure(Some(11)),
            Err(StackError::Range { .. })
        ));
    }

    #[test]
    fn test_unknown_policy() {
        assert!(matches!(
            RestartPolicy::parse("sometimes", None),
            Err(StackError::Shape { .. })
        ));
        assert!(matches!(
            RestartPolicy::parse("always", Some(3)),
            Err(StackError::Shape { .. })
        ));
    }

    #[test]
    fn test_from_spec() {
        let spec = RestartSpec::Detailed {
            policy: "on-failure".to_string(),
            times: Some(3),
        };
        assert_eq!(
            RestartPolicy::from_spec(&spec).unwrap(),
            RestartPolicy::OnFailure { times: 3 }
        );
        assert_eq!(
            RestartPolicy::from_spec(&RestartSpec::Policy("unless-stopped".to_string())).unwrap(),
            RestartPolicy::UnlessStopped
        );
    }
}
