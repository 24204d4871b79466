//! Service deployment settings

use super::common::{insert_label, validate_byte_size, validate_duration};
use super::config::{DeployRestartSpec, DeploySpec, ResourceSpec, ResourcesSpec};
use crate::error::{Result, StackError};
use indexmap::IndexMap;
use std::fmt;

/// Deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    Replicated,
    Global,
}

impl DeployMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "replicated" => Ok(DeployMode::Replicated),
            "global" => Ok(DeployMode::Global),
            other => Err(StackError::shape(
                "deploy mode",
                format!("unknown mode '{}' (expected replicated or global)", other),
            )),
        }
    }
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployMode::Replicated => write!(f, "replicated"),
            DeployMode::Global => write!(f, "global"),
        }
    }
}

/// CPU and memory amounts; either may be absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceAmounts {
    cpus: Option<String>,
    memory: Option<String>,
}

impl ResourceAmounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fractional CPU count, e.g. `0.5`
    pub fn cpus(mut self, cpus: &str) -> Result<Self> {
        match cpus.parse::<f64>() {
            Ok(value) if value > 0.0 && value.is_finite() => {}
            Ok(_) => {
                return Err(StackError::range(
                    "cpus",
                    format!("'{}' must be greater than zero", cpus),
                ))
            }
            Err(_) => {
                return Err(StackError::shape(
                    "cpus",
                    format!("'{}' is not a decimal number", cpus),
                ))
            }
        }
        self.cpus = Some(cpus.to_string());
        Ok(self)
    }

    pub fn memory(mut self, memory: &str) -> Result<Self> {
        validate_byte_size("memory", memory)?;
        self.memory = Some(memory.to_string());
        Ok(self)
    }

    fn from_spec(spec: &ResourceSpec) -> Result<Self> {
        let mut amounts = Self::new();
        if let Some(cpus) = &spec.cpus {
            amounts = amounts.cpus(cpus)?;
        }
        if let Some(memory) = &spec.memory {
            amounts = amounts.memory(memory)?;
        }
        Ok(amounts)
    }

    pub fn cpus_value(&self) -> Option<&str> {
        self.cpus.as_deref()
    }

    pub fn memory_value(&self) -> Option<&str> {
        self.memory.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.memory.is_none()
    }
}

/// Resource limits and reservations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub limits: Option<ResourceAmounts>,
    pub reservations: Option<ResourceAmounts>,
}

impl Resources {
    fn from_spec(spec: &ResourcesSpec) -> Result<Self> {
        Ok(Self {
            limits: spec.limits.as_ref().map(ResourceAmounts::from_spec).transpose()?,
            reservations: spec
                .reservations
                .as_ref()
                .map(ResourceAmounts::from_spec)
                .transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.limits.as_ref().map_or(true, ResourceAmounts::is_empty)
            && self.reservations.as_ref().map_or(true, ResourceAmounts::is_empty)
    }
}

/// Restart condition for deployed tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartCondition {
    None,
    OnFailure,
    Any,
}

impl RestartCondition {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(RestartCondition::None),
            "on-failure" => Ok(RestartCondition::OnFailure),
            "any" => Ok(RestartCondition::Any),
            other => Err(StackError::shape(
                "deploy restart condition",
                format!("unknown condition '{}' (expected none, on-failure or any)", other),
            )),
        }
    }
}

impl fmt::Display for RestartCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartCondition::None => write!(f, "none"),
            RestartCondition::OnFailure => write!(f, "on-failure"),
            RestartCondition::Any => write!(f, "any"),
        }
    }
}

/// Restart policy for deployed tasks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployRestartPolicy {
    pub condition: Option<RestartCondition>,
    pub delay: Option<String>,
    pub max_attempts: Option<u32>,
    pub window: Option<String>,
}

impl DeployRestartPolicy {
    fn from_spec(spec: &DeployRestartSpec) -> Result<Self> {
        if let Some(delay) = &spec.delay {
            validate_duration("deploy restart delay", delay)?;
        }
        if let Some(window) = &spec.window {
            validate_duration("deploy restart window", window)?;
        }
        Ok(Self {
            condition: spec
                .condition
                .as_deref()
                .map(RestartCondition::parse)
                .transpose()?,
            delay: spec.delay.clone(),
            max_attempts: spec.max_attempts,
            window: spec.window.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.condition.is_none()
            && self.delay.is_none()
            && self.max_attempts.is_none()
            && self.window.is_none()
    }
}

/// Deployment settings for a service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDeployment {
    mode: Option<DeployMode>,
    replicas: Option<u32>,
    resources: Option<Resources>,
    restart_policy: Option<DeployRestartPolicy>,
    placement: Vec<String>,
    labels: IndexMap<String, String>,
}

impl ServiceDeployment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: DeployMode) -> Result<()> {
        if mode == DeployMode::Global && self.replicas.is_some() {
            return Err(StackError::shape(
                "deploy",
                "replicas cannot be combined with global mode",
            ));
        }
        self.mode = Some(mode);
        Ok(())
    }

    pub fn set_replicas(&mut self, replicas: u32) -> Result<()> {
        if self.mode == Some(DeployMode::Global) {
            return Err(StackError::shape(
                "deploy",
                "replicas cannot be combined with global mode",
            ));
        }
        self.replicas = Some(replicas);
        Ok(())
    }

    pub fn set_resources(&mut self, resources: Resources) {
        self.resources = Some(resources);
    }

    pub fn set_restart_policy(&mut self, policy: DeployRestartPolicy) -> Result<()> {
        if let Some(delay) = &policy.delay {
            validate_duration("deploy restart delay", delay)?;
        }
        if let Some(window) = &policy.window {
            validate_duration("deploy restart window", window)?;
        }
        self.restart_policy = Some(policy);
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: &str) -> Result<()> {
        if constraint.trim().is_empty() {
            return Err(StackError::missing("deploy placement", "constraint"));
        }
        if !constraint.contains("==") && !constraint.contains("!=") {
            return Err(StackError::shape(
                "deploy placement",
                format!("'{}' must compare with == or !=", constraint),
            ));
        }
        self.placement.push(constraint.to_string());
        Ok(())
    }

    pub fn add_label(&mut self, key: &str, value: &str) -> Result<()> {
        insert_label(&mut self.labels, key, value)
    }

    pub fn from_spec(spec: &DeploySpec) -> Result<Self> {
        let mut deploy = Self::new();
        if let Some(mode) = &spec.mode {
            deploy.set_mode(DeployMode::parse(mode)?)?;
        }
        if let Some(replicas) = spec.replicas {
            deploy.set_replicas(replicas)?;
        }
        if let Some(resources) = &spec.resources {
            deploy.set_resources(Resources::from_spec(resources)?);
        }
        if let Some(policy) = &spec.restart_policy {
            deploy.restart_policy = Some(DeployRestartPolicy::from_spec(policy)?);
        }
        for constraint in &spec.placement {
            deploy.add_constraint(constraint)?;
        }
        for (key, value) in &spec.labels {
            deploy.add_label(key, value)?;
        }
        Ok(deploy)
    }

    pub fn mode(&self) -> Option<DeployMode> {
        self.mode
    }

    pub fn replicas(&self) -> Option<u32> {
        self.replicas
    }

    pub fn resources(&self) -> Option<&Resources> {
        self.resources.as_ref().filter(|r| !r.is_empty())
    }

    pub fn restart_policy(&self) -> Option<&DeployRestartPolicy> {
        self.restart_policy.as_ref().filter(|p| !p.is_empty())
    }

    pub fn placement(&self) -> &[String] {
        &self.placement
    }

    pub fn labels(&self) -> &IndexMap<String, String> {
        &self.labels
    }

    /// Nothing would be rendered
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.replicas.is_none()
            && self.resources().is_none()
            && self.restart_policy().is_none()
            && self.placement.is_empty()
            && self.labels.is_empty()
    }
}
