//! Stack definition types
//!
//! These are the raw, unvalidated inputs accepted by `Stack::create_*` and
//! deserialized from stack definition files. Validation happens when they
//! are applied to an entity.

use crate::command::Command;
use crate::compose::common::External;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Stack definition file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackDefinition {
    /// Stack name
    #[serde(default)]
    pub name: Option<String>,
    /// Environment shared by every service
    #[serde(default)]
    pub environment: IndexMap<String, String>,
    /// Env files shared by every service
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Services
    #[serde(default)]
    pub services: IndexMap<String, ServiceSpec>,
    /// Networks
    #[serde(default)]
    pub networks: IndexMap<String, NetworkSpec>,
    /// Volumes
    #[serde(default)]
    pub volumes: IndexMap<String, VolumeSpec>,
    /// Secrets
    #[serde(default)]
    pub secrets: IndexMap<String, SecretSpec>,
    /// Configs
    #[serde(default)]
    pub configs: IndexMap<String, ConfigSpec>,
}

/// Service definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    /// Render this service first
    #[serde(default)]
    pub main: bool,
    /// Image reference
    #[serde(default)]
    pub image: Option<String>,
    /// Build configuration
    #[serde(default)]
    pub build: Option<BuildSpec>,
    /// Port mappings
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    /// Volume mounts
    #[serde(default)]
    pub volumes: Vec<ServiceVolumeSpec>,
    /// Environment variables
    #[serde(default)]
    pub environment: IndexMap<String, String>,
    /// Env files
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Entrypoint
    #[serde(default)]
    pub entrypoint: Option<Command>,
    /// Command
    #[serde(default)]
    pub command: Option<Command>,
    /// Service dependencies
    #[serde(default)]
    pub depends_on: Vec<DependsOnSpec>,
    /// Networks to join
    #[serde(default)]
    pub networks: Vec<String>,
    /// Network mode (exclusive with networks)
    #[serde(default)]
    pub network_mode: Option<String>,
    /// User
    #[serde(default)]
    pub user: Option<String>,
    /// Restart policy
    #[serde(default)]
    pub restart: Option<RestartSpec>,
    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingSpec>,
    /// Healthcheck
    #[serde(default)]
    pub healthcheck: Option<HealthcheckSpec>,
    /// Links to containers outside the stack
    #[serde(default)]
    pub external_links: Vec<String>,
    /// Secret names
    #[serde(default)]
    pub secrets: Vec<String>,
    /// Config references
    #[serde(default)]
    pub configs: Vec<ConfigRefSpec>,
    /// Deploy configuration
    #[serde(default)]
    pub deploy: Option<DeploySpec>,
    /// Security options
    #[serde(default)]
    pub security_opt: Vec<String>,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSpec {
    /// Context path only
    Context(String),
    /// Full build configuration
    Full(BuildSpecFull),
}

/// Full build configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSpecFull {
    /// Build context
    #[serde(default)]
    pub context: Option<String>,
    /// Build file path
    #[serde(default)]
    pub dockerfile: Option<String>,
    /// Target stage
    #[serde(default)]
    pub target: Option<String>,
    /// Build arguments
    #[serde(default)]
    pub args: IndexMap<String, String>,
    /// SSH keys by id
    #[serde(default)]
    pub ssh: IndexMap<String, String>,
}

/// Port mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortSpec {
    /// Container port
    pub internal: u32,
    /// Host port
    #[serde(default)]
    pub external: Option<u32>,
    /// Expose to linked services only
    #[serde(default)]
    pub internal_only: bool,
}

/// Service volume mount; the kind is picked by which of `name` and
/// `host_path` is present
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceVolumeSpec {
    /// Named volume
    #[serde(default)]
    pub name: Option<String>,
    /// Host path for bind mounts
    #[serde(default)]
    pub host_path: Option<String>,
    /// Mount point in the container
    #[serde(default)]
    pub container_path: Option<String>,
    /// Read only
    #[serde(default)]
    pub read_only: Option<bool>,
}

/// Service dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOnSpec {
    /// Service name
    Name(String),
    /// Service with start condition
    Conditional {
        service: String,
        #[serde(default)]
        condition: Option<String>,
    },
}

impl DependsOnSpec {
    /// Referenced service name
    pub fn service(&self) -> &str {
        match self {
            DependsOnSpec::Name(name) => name,
            DependsOnSpec::Conditional { service, .. } => service,
        }
    }
}

/// Restart policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RestartSpec {
    /// `always`, `unless-stopped`, `no` or `on-failure`
    Policy(String),
    /// Policy with retry count
    Detailed {
        policy: String,
        #[serde(default)]
        times: Option<u32>,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSpec {
    /// Driver name
    pub driver: String,
    /// Driver options
    #[serde(default)]
    pub options: IndexMap<String, String>,
}

/// Healthcheck configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthcheckSpec {
    /// Test command
    #[serde(default)]
    pub test: Option<Command>,
    /// Interval
    #[serde(default)]
    pub interval: Option<String>,
    /// Timeout
    #[serde(default)]
    pub timeout: Option<String>,
    /// Retries
    #[serde(default)]
    pub retries: Option<u32>,
    /// Start period
    #[serde(default)]
    pub start_period: Option<String>,
    /// Disable the image's healthcheck
    #[serde(default)]
    pub disable: bool,
}

/// Config reference in a service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigRefSpec {
    /// Config name
    pub source: String,
    /// Mount path in the container
    #[serde(default)]
    pub target: Option<String>,
    /// Access mode
    #[serde(default)]
    pub mode: Option<ModeSpec>,
}

/// Permission bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Exec,
}

/// Access mode as permission subsets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeSpec {
    #[serde(default)]
    pub owner: Vec<Permission>,
    #[serde(default)]
    pub group: Vec<Permission>,
    #[serde(default)]
    pub others: Vec<Permission>,
}

/// Deploy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploySpec {
    /// `replicated` or `global`
    #[serde(default)]
    pub mode: Option<String>,
    /// Number of replicas
    #[serde(default)]
    pub replicas: Option<u32>,
    /// Resource limits and reservations
    #[serde(default)]
    pub resources: Option<ResourcesSpec>,
    /// Restart policy
    #[serde(default)]
    pub restart_policy: Option<DeployRestartSpec>,
    /// Placement constraints
    #[serde(default)]
    pub placement: Vec<String>,
    /// Labels
    #[serde(default)]
    pub labels: IndexMap<String, String>,
}

/// Resources configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcesSpec {
    #[serde(default)]
    pub limits: Option<ResourceSpec>,
    #[serde(default)]
    pub reservations: Option<ResourceSpec>,
}

/// CPU and memory amounts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    #[serde(default)]
    pub cpus: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

/// Deploy restart policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployRestartSpec {
    /// `none`, `on-failure` or `any`
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub delay: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub window: Option<String>,
}

/// Network definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSpec {
    /// Driver
    #[serde(default)]
    pub driver: Option<String>,
    /// Driver options
    #[serde(default)]
    pub driver_opts: IndexMap<String, String>,
    /// IPAM configuration
    #[serde(default)]
    pub ipam: Option<IpamSpec>,
    /// Internal network
    #[serde(default)]
    pub internal: Option<bool>,
    /// Attachable
    #[serde(default)]
    pub attachable: Option<bool>,
    /// Enable IPv6
    #[serde(default)]
    pub enable_ipv6: Option<bool>,
    /// External network
    #[serde(default)]
    pub external: Option<External>,
    /// Labels
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    /// Scope
    #[serde(default)]
    pub scope: Option<String>,
}

/// IPAM configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpamSpec {
    /// Driver
    #[serde(default)]
    pub driver: Option<String>,
    /// Address pools
    #[serde(default)]
    pub config: Vec<IpamPoolSpec>,
}

/// IPAM pool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpamPoolSpec {
    /// Subnet in CIDR form
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub ip_range: Option<String>,
    #[serde(default)]
    pub aux_addresses: IndexMap<String, String>,
}

/// Volume definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeSpec {
    /// Driver type (local, nfs, tmpfs, azurefile, rexray, glusterfs, ceph, digitalocean)
    #[serde(default)]
    pub driver: Option<String>,
    /// Driver options
    #[serde(default)]
    pub driver_opts: IndexMap<String, String>,
    /// External volume
    #[serde(default)]
    pub external: Option<External>,
    /// Labels
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    /// Scope
    #[serde(default)]
    pub scope: Option<String>,
    /// `rw` or `ro`
    #[serde(default)]
    pub access_mode: Option<String>,
    /// Back the volume with tmpfs
    #[serde(default)]
    pub tmpfs: bool,
    /// Size (tmpfs)
    #[serde(default)]
    pub size: Option<String>,
}

/// Secret definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretSpec {
    /// Source file
    #[serde(default)]
    pub file: Option<String>,
    /// Managed outside the stack
    #[serde(default)]
    pub external: Option<bool>,
}

/// Config file definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSpec {
    /// Source file
    #[serde(default)]
    pub file: Option<String>,
}
