//! Service entity
//!
//! A service is created through [`Service::new`] (or `Stack::create_service`)
//! and mutated only through validated setters. Setters that reference other
//! entities take an [`EntityLookup`] and fail immediately when the reference
//! does not resolve.

use super::build::ServiceBuild;
use super::common::{validate_container_path, validate_env_key, validate_token};
use super::config::{ConfigRefSpec, DependsOnSpec, PortSpec, ServiceSpec, ServiceVolumeSpec};
use super::deploy::ServiceDeployment;
use super::healthcheck::Healthcheck;
use super::logging::Logging;
use super::lookup::EntityLookup;
use super::permissions::FileMode;
use super::registry::{validate_name, Named};
use super::restart::RestartPolicy;
use crate::command::Command;
use crate::error::{EntityKind, Result, StackError};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;

/// Port published by a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    internal: u16,
    external: Option<u16>,
    internal_only: bool,
}

impl PortMapping {
    /// Host-mapped port; the host side reuses `internal`
    pub fn new(internal: u32) -> Result<Self> {
        Ok(Self {
            internal: port_number("internal port", internal)?,
            external: None,
            internal_only: false,
        })
    }

    /// Host-mapped port with a distinct host side
    pub fn mapped(internal: u32, external: u32) -> Result<Self> {
        Ok(Self {
            internal: port_number("internal port", internal)?,
            external: Some(port_number("external port", external)?),
            internal_only: false,
        })
    }

    /// Port reachable from other services only
    pub fn internal_only(internal: u32) -> Result<Self> {
        Ok(Self {
            internal: port_number("internal port", internal)?,
            external: None,
            internal_only: true,
        })
    }

    pub fn from_spec(spec: &PortSpec) -> Result<Self> {
        match (spec.internal_only, spec.external) {
            (true, Some(_)) => Err(StackError::shape(
                "port",
                format!(
                    "internal-only port {} cannot bind a host port",
                    spec.internal
                ),
            )),
            (true, None) => Self::internal_only(spec.internal),
            (false, Some(external)) => Self::mapped(spec.internal, external),
            (false, None) => Self::new(spec.internal),
        }
    }

    pub fn internal(&self) -> u16 {
        self.internal
    }

    /// Host port, if the port is published
    pub fn host_port(&self) -> Option<u16> {
        if self.internal_only {
            None
        } else {
            Some(self.external.unwrap_or(self.internal))
        }
    }

    pub fn is_internal_only(&self) -> bool {
        self.internal_only
    }
}

fn port_number(field: &str, port: u32) -> Result<u16> {
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(StackError::range(
            field,
            format!("{} is outside 1..=65535", port),
        )),
    }
}

/// Mount access mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl AccessMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "rw" => Ok(AccessMode::ReadWrite),
            "ro" => Ok(AccessMode::ReadOnly),
            other => Err(StackError::shape(
                "access mode",
                format!("unknown mode '{}' (expected rw or ro)", other),
            )),
        }
    }

    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::ReadWrite => write!(f, "rw"),
            AccessMode::ReadOnly => write!(f, "ro"),
        }
    }
}

/// Volume mounted into a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceVolume {
    /// Anonymous volume at a container path
    Anonymous { container_path: String },
    /// Stack volume; `mode` falls back to the volume's access mode
    Named {
        name: String,
        container_path: String,
        mode: Option<AccessMode>,
    },
    /// Host directory
    Bind {
        host_path: String,
        container_path: String,
        mode: AccessMode,
    },
}

impl ServiceVolume {
    pub fn anonymous(container_path: &str) -> Self {
        ServiceVolume::Anonymous {
            container_path: container_path.to_string(),
        }
    }

    pub fn named(name: &str, container_path: &str) -> Self {
        ServiceVolume::Named {
            name: name.to_string(),
            container_path: container_path.to_string(),
            mode: None,
        }
    }

    pub fn bind(host_path: &str, container_path: &str, read_only: bool) -> Self {
        ServiceVolume::Bind {
            host_path: host_path.to_string(),
            container_path: container_path.to_string(),
            mode: AccessMode::from_read_only(read_only),
        }
    }

    /// Pick the variant from which of `name` / `host_path` is set
    pub fn from_spec(spec: &ServiceVolumeSpec) -> Result<Self> {
        let container_path = spec
            .container_path
            .clone()
            .ok_or_else(|| StackError::missing("service volume", "container_path"))?;
        match (&spec.name, &spec.host_path) {
            (Some(_), Some(_)) => Err(StackError::shape(
                "service volume",
                "'name' and 'host_path' are mutually exclusive",
            )),
            (Some(name), None) => Ok(ServiceVolume::Named {
                name: name.clone(),
                container_path,
                mode: spec.read_only.map(AccessMode::from_read_only),
            }),
            (None, Some(host_path)) => Ok(ServiceVolume::Bind {
                host_path: host_path.clone(),
                container_path,
                mode: AccessMode::from_read_only(spec.read_only.unwrap_or(false)),
            }),
            (None, None) => {
                if spec.read_only.is_some() {
                    return Err(StackError::shape(
                        "service volume",
                        "anonymous volumes do not take 'read_only'",
                    ));
                }
                Ok(ServiceVolume::Anonymous { container_path })
            }
        }
    }

    pub fn container_path(&self) -> &str {
        match self {
            ServiceVolume::Anonymous { container_path }
            | ServiceVolume::Named { container_path, .. }
            | ServiceVolume::Bind { container_path, .. } => container_path,
        }
    }
}

/// Start condition of a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyCondition {
    Started,
    Healthy,
    CompletedSuccessfully,
}

impl DependencyCondition {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "service_started" => Ok(DependencyCondition::Started),
            "service_healthy" => Ok(DependencyCondition::Healthy),
            "service_completed_successfully" => Ok(DependencyCondition::CompletedSuccessfully),
            other => Err(StackError::shape(
                "depends_on condition",
                format!("unknown condition '{}'", other),
            )),
        }
    }
}

impl fmt::Display for DependencyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyCondition::Started => write!(f, "service_started"),
            DependencyCondition::Healthy => write!(f, "service_healthy"),
            DependencyCondition::CompletedSuccessfully => {
                write!(f, "service_completed_successfully")
            }
        }
    }
}

/// Network mode, exclusive with joining networks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    Bridge,
    Host,
    None,
    /// Share another stack service's network stack
    Service(String),
    /// Share a container's network stack
    Container(String),
}

impl NetworkMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "bridge" => Ok(NetworkMode::Bridge),
            "host" => Ok(NetworkMode::Host),
            "none" => Ok(NetworkMode::None),
            other => {
                if let Some(service) = other.strip_prefix("service:") {
                    validate_token("network_mode service", service)?;
                    Ok(NetworkMode::Service(service.to_string()))
                } else if let Some(container) = other.strip_prefix("container:") {
                    validate_token("network_mode container", container)?;
                    Ok(NetworkMode::Container(container.to_string()))
                } else {
                    Err(StackError::shape(
                        "network_mode",
                        format!("unknown mode '{}'", other),
                    ))
                }
            }
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkMode::Bridge => write!(f, "bridge"),
            NetworkMode::Host => write!(f, "host"),
            NetworkMode::None => write!(f, "none"),
            NetworkMode::Service(name) => write!(f, "service:{}", name),
            NetworkMode::Container(id) => write!(f, "container:{}", id),
        }
    }
}

/// Config file mounted into a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfigRef {
    source: String,
    target: Option<String>,
    mode: Option<FileMode>,
}

impl ServiceConfigRef {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            target: None,
            mode: None,
        }
    }

    pub fn target(mut self, target: &str) -> Result<Self> {
        validate_container_path("config target", target)?;
        self.target = Some(target.to_string());
        Ok(self)
    }

    pub fn mode(mut self, mode: FileMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn from_spec(spec: &ConfigRefSpec) -> Result<Self> {
        let mut config = Self::new(&spec.source);
        if let Some(target) = &spec.target {
            config = config.target(target)?;
        }
        if let Some(mode) = &spec.mode {
            config = config.mode(FileMode::from(mode));
        }
        Ok(config)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target_path(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn file_mode(&self) -> Option<FileMode> {
        self.mode
    }
}

/// Where a service's image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Image(String),
    Build(ServiceBuild),
}

/// Service definition
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    source: Option<ImageSource>,
    ports: Vec<PortMapping>,
    volumes: Vec<ServiceVolume>,
    environment: IndexMap<String, String>,
    env_files: Vec<String>,
    entrypoint: Option<Command>,
    command: Option<Command>,
    depends_on: IndexMap<String, Option<DependencyCondition>>,
    networks: Vec<String>,
    network_mode: Option<NetworkMode>,
    user: Option<String>,
    restart: Option<RestartPolicy>,
    logging: Option<Logging>,
    healthcheck: Option<Healthcheck>,
    external_links: Vec<String>,
    secrets: Vec<String>,
    configs: Vec<ServiceConfigRef>,
    deploy: Option<ServiceDeployment>,
    security_opt: Vec<String>,
}

impl Named for Service {
    const KIND: EntityKind = EntityKind::Service;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Service {
    /// Create an empty service
    pub fn new(name: &str) -> Result<Self> {
        validate_name(EntityKind::Service, name)?;
        Ok(Self {
            name: name.to_string(),
            source: None,
            ports: Vec::new(),
            volumes: Vec::new(),
            environment: IndexMap::new(),
            env_files: Vec::new(),
            entrypoint: None,
            command: None,
            depends_on: IndexMap::new(),
            networks: Vec::new(),
            network_mode: None,
            user: None,
            restart: None,
            logging: None,
            healthcheck: None,
            external_links: Vec::new(),
            secrets: Vec::new(),
            configs: Vec::new(),
            deploy: None,
            security_opt: Vec::new(),
        })
    }

    /// Build a service from a definition. `depends_on` entries are applied
    /// too, so every referenced service must already exist.
    pub fn from_spec(name: &str, spec: &ServiceSpec, lookup: &dyn EntityLookup) -> Result<Self> {
        let mut service = Self::new(name)?;
        if let Some(image) = &spec.image {
            service.set_image(image)?;
        }
        if let Some(build) = &spec.build {
            service.set_build(ServiceBuild::from_spec(build, lookup)?)?;
        }
        for port in &spec.ports {
            service.add_port(PortMapping::from_spec(port)?)?;
        }
        for volume in &spec.volumes {
            service.add_volume(ServiceVolume::from_spec(volume)?, lookup)?;
        }
        for (key, value) in &spec.environment {
            service.set_env(key, value)?;
        }
        for path in &spec.env_files {
            service.add_env_file(path, lookup)?;
        }
        if let Some(entrypoint) = &spec.entrypoint {
            service.set_entrypoint(entrypoint.clone())?;
        }
        if let Some(command) = &spec.command {
            service.set_command(command.clone())?;
        }
        for dependency in &spec.depends_on {
            service.add_dependency_spec(dependency, lookup)?;
        }
        for network in &spec.networks {
            service.add_network(network, lookup)?;
        }
        if let Some(mode) = &spec.network_mode {
            service.set_network_mode(NetworkMode::parse(mode)?, lookup)?;
        }
        if let Some(user) = &spec.user {
            service.set_user(user)?;
        }
        if let Some(restart) = &spec.restart {
            service.set_restart(RestartPolicy::from_spec(restart)?);
        }
        if let Some(logging) = &spec.logging {
            service.set_logging(Logging::from_spec(logging)?)?;
        }
        if let Some(healthcheck) = &spec.healthcheck {
            service.set_healthcheck(Healthcheck::from_spec(healthcheck)?);
        }
        for link in &spec.external_links {
            service.add_external_link(link)?;
        }
        for secret in &spec.secrets {
            service.add_secret(secret, lookup)?;
        }
        for config in &spec.configs {
            service.add_config(ServiceConfigRef::from_spec(config)?, lookup)?;
        }
        if let Some(deploy) = &spec.deploy {
            service.set_deploy(ServiceDeployment::from_spec(deploy)?);
        }
        for opt in &spec.security_opt {
            service.add_security_opt(opt)?;
        }
        Ok(service)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pull `image` (exclusive with a build)
    pub fn set_image(&mut self, image: &str) -> Result<()> {
        validate_token("image", image)?;
        if let Some(ImageSource::Build(_)) = self.source {
            return Err(StackError::shape(
                "image",
                format!("service '{}' already has a build; image and build are mutually exclusive", self.name),
            ));
        }
        self.source = Some(ImageSource::Image(image.to_string()));
        Ok(())
    }

    /// Build the image (exclusive with a pulled image)
    pub fn set_build(&mut self, build: ServiceBuild) -> Result<()> {
        if let Some(ImageSource::Image(_)) = self.source {
            return Err(StackError::shape(
                "build",
                format!("service '{}' already has an image; image and build are mutually exclusive", self.name),
            ));
        }
        self.source = Some(ImageSource::Build(build));
        Ok(())
    }

    pub fn source(&self) -> Option<&ImageSource> {
        self.source.as_ref()
    }

    /// Add a port; two ports cannot claim the same host port
    pub fn add_port(&mut self, port: PortMapping) -> Result<()> {
        if self.ports.contains(&port) {
            tracing::warn!(
                "Service {} already exposes port {}; ignoring duplicate",
                self.name,
                port.internal()
            );
            return Ok(());
        }
        if let Some(host) = port.host_port() {
            if self.ports.iter().any(|p| p.host_port() == Some(host)) {
                return Err(StackError::duplicate(EntityKind::Port, host.to_string()));
            }
        }
        self.ports.push(port);
        Ok(())
    }

    pub fn ports(&self) -> &[PortMapping] {
        &self.ports
    }

    /// Mount a volume; named volumes must exist in the stack
    pub fn add_volume(&mut self, volume: ServiceVolume, lookup: &dyn EntityLookup) -> Result<()> {
        validate_container_path("service volume", volume.container_path())?;
        match &volume {
            ServiceVolume::Named { name, .. } => {
                if !lookup.has_volume(name) {
                    return Err(StackError::unknown(self.owner(), EntityKind::Volume, name.as_str()));
                }
            }
            ServiceVolume::Bind { host_path, .. } => {
                if host_path.trim().is_empty() {
                    return Err(StackError::missing("service volume", "host_path"));
                }
            }
            ServiceVolume::Anonymous { .. } => {}
        }
        if self
            .volumes
            .iter()
            .any(|v| v.container_path() == volume.container_path())
        {
            return Err(StackError::duplicate(
                EntityKind::Volume,
                format!("{} mount at {}", self.name, volume.container_path()),
            ));
        }
        self.volumes.push(volume);
        Ok(())
    }

    pub fn volumes(&self) -> &[ServiceVolume] {
        &self.volumes
    }

    /// Set an environment variable; the last write wins
    pub fn set_env(&mut self, key: &str, value: &str) -> Result<()> {
        validate_env_key(key)?;
        self.environment.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn environment(&self) -> &IndexMap<String, String> {
        &self.environment
    }

    /// Add an env file; the file must exist and repeats are ignored
    pub fn add_env_file(&mut self, path: &str, lookup: &dyn EntityLookup) -> Result<()> {
        if path.trim().is_empty() {
            return Err(StackError::missing("env_file", "path"));
        }
        if !lookup.path_exists(Path::new(path)) {
            return Err(StackError::unknown(self.owner(), EntityKind::File, path));
        }
        if !self.env_files.iter().any(|p| p == path) {
            self.env_files.push(path.to_string());
        }
        Ok(())
    }

    pub fn env_files(&self) -> &[String] {
        &self.env_files
    }

    pub fn set_entrypoint(&mut self, entrypoint: Command) -> Result<()> {
        entrypoint.validate("entrypoint")?;
        self.entrypoint = Some(entrypoint);
        Ok(())
    }

    pub fn entrypoint(&self) -> Option<&Command> {
        self.entrypoint.as_ref()
    }

    pub fn set_command(&mut self, command: Command) -> Result<()> {
        command.validate("command")?;
        self.command = Some(command);
        Ok(())
    }

    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    /// Depend on another stack service
    pub fn add_dependency(
        &mut self,
        service: &str,
        condition: Option<DependencyCondition>,
        lookup: &dyn EntityLookup,
    ) -> Result<()> {
        if service == self.name {
            return Err(StackError::shape(
                "depends_on",
                format!("service '{}' cannot depend on itself", self.name),
            ));
        }
        if !lookup.has_service(service) {
            return Err(StackError::unknown(self.owner(), EntityKind::Service, service));
        }
        self.depends_on.insert(service.to_string(), condition);
        Ok(())
    }

    pub(crate) fn add_dependency_spec(
        &mut self,
        spec: &DependsOnSpec,
        lookup: &dyn EntityLookup,
    ) -> Result<()> {
        let condition = match spec {
            DependsOnSpec::Name(_) => None,
            DependsOnSpec::Conditional { condition, .. } => condition
                .as_deref()
                .map(DependencyCondition::parse)
                .transpose()?,
        };
        self.add_dependency(spec.service(), condition, lookup)
    }

    pub fn depends_on(&self) -> &IndexMap<String, Option<DependencyCondition>> {
        &self.depends_on
    }

    /// Join a stack network (exclusive with a network mode)
    pub fn add_network(&mut self, network: &str, lookup: &dyn EntityLookup) -> Result<()> {
        if self.network_mode.is_some() {
            return Err(StackError::shape(
                "networks",
                format!("service '{}' has a network_mode; networks and network_mode are mutually exclusive", self.name),
            ));
        }
        if !lookup.has_network(network) {
            return Err(StackError::unknown(self.owner(), EntityKind::Network, network));
        }
        if !self.networks.iter().any(|n| n == network) {
            self.networks.push(network.to_string());
        }
        Ok(())
    }

    pub fn networks(&self) -> &[String] {
        &self.networks
    }

    /// Set the network mode (exclusive with joined networks)
    pub fn set_network_mode(&mut self, mode: NetworkMode, lookup: &dyn EntityLookup) -> Result<()> {
        if !self.networks.is_empty() {
            return Err(StackError::shape(
                "network_mode",
                format!("service '{}' joins networks; networks and network_mode are mutually exclusive", self.name),
            ));
        }
        if let NetworkMode::Service(target) = &mode {
            if target == &self.name {
                return Err(StackError::shape(
                    "network_mode",
                    format!("service '{}' cannot share its own network stack", self.name),
                ));
            }
            if !lookup.has_service(target) {
                return Err(StackError::unknown(self.owner(), EntityKind::Service, target.as_str()));
            }
        }
        self.network_mode = Some(mode);
        Ok(())
    }

    pub fn network_mode(&self) -> Option<&NetworkMode> {
        self.network_mode.as_ref()
    }

    /// `user`, `user:group`, `uid` or `uid:gid`
    pub fn set_user(&mut self, user: &str) -> Result<()> {
        validate_token("user", user)?;
        if user.split(':').count() > 2 || user.split(':').any(str::is_empty) {
            return Err(StackError::shape(
                "user",
                format!("'{}' must be user or user:group", user),
            ));
        }
        self.user = Some(user.to_string());
        Ok(())
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn set_restart(&mut self, policy: RestartPolicy) {
        self.restart = Some(policy);
    }

    pub fn restart(&self) -> Option<RestartPolicy> {
        self.restart
    }

    pub fn set_logging(&mut self, logging: Logging) -> Result<()> {
        logging.validate()?;
        self.logging = Some(logging);
        Ok(())
    }

    pub fn logging(&self) -> Option<&Logging> {
        self.logging.as_ref()
    }

    pub fn set_healthcheck(&mut self, healthcheck: Healthcheck) {
        self.healthcheck = Some(healthcheck);
    }

    pub fn healthcheck(&self) -> Option<&Healthcheck> {
        self.healthcheck.as_ref()
    }

    /// `container` or `container:alias`
    pub fn add_external_link(&mut self, link: &str) -> Result<()> {
        validate_token("external_links", link)?;
        if link.split(':').count() > 2 || link.split(':').any(str::is_empty) {
            return Err(StackError::shape(
                "external_links",
                format!("'{}' must be container or container:alias", link),
            ));
        }
        if !self.external_links.iter().any(|l| l == link) {
            self.external_links.push(link.to_string());
        }
        Ok(())
    }

    pub fn external_links(&self) -> &[String] {
        &self.external_links
    }

    pub fn add_secret(&mut self, secret: &str, lookup: &dyn EntityLookup) -> Result<()> {
        if !lookup.has_secret(secret) {
            return Err(StackError::unknown(self.owner(), EntityKind::Secret, secret));
        }
        if !self.secrets.iter().any(|s| s == secret) {
            self.secrets.push(secret.to_string());
        }
        Ok(())
    }

    pub fn secrets(&self) -> &[String] {
        &self.secrets
    }

    pub fn add_config(&mut self, config: ServiceConfigRef, lookup: &dyn EntityLookup) -> Result<()> {
        if !lookup.has_config(config.source()) {
            return Err(StackError::unknown(self.owner(), EntityKind::Config, config.source()));
        }
        if self.configs.iter().any(|c| c.source() == config.source()) {
            return Err(StackError::duplicate(
                EntityKind::Config,
                format!("{} in service {}", config.source(), self.name),
            ));
        }
        self.configs.push(config);
        Ok(())
    }

    pub fn configs(&self) -> &[ServiceConfigRef] {
        &self.configs
    }

    pub fn set_deploy(&mut self, deploy: ServiceDeployment) {
        self.deploy = Some(deploy);
    }

    pub fn deploy(&self) -> Option<&ServiceDeployment> {
        self.deploy.as_ref()
    }

    /// Security option such as `no-new-privileges:true` or `label:type:svirt_t`
    pub fn add_security_opt(&mut self, opt: &str) -> Result<()> {
        validate_token("security_opt", opt)?;
        if !self.security_opt.iter().any(|o| o == opt) {
            self.security_opt.push(opt.to_string());
        }
        Ok(())
    }

    pub fn security_opt(&self) -> &[String] {
        &self.security_opt
    }

    /// Re-resolve every cross-entity reference against `lookup`
    pub fn check_references(&self, lookup: &dyn EntityLookup) -> Result<()> {
        for volume in &self.volumes {
            if let ServiceVolume::Named { name, .. } = volume {
                if !lookup.has_volume(name) {
                    return Err(StackError::unknown(self.owner(), EntityKind::Volume, name.as_str()));
                }
            }
        }
        if let Some(path) = self.env_files.iter().find(|p| !lookup.path_exists(Path::new(p))) {
            return Err(StackError::unknown(self.owner(), EntityKind::File, path.as_str()));
        }
        if let Some(service) = self.depends_on.keys().find(|s| !lookup.has_service(s)) {
            return Err(StackError::unknown(self.owner(), EntityKind::Service, service.as_str()));
        }
        if let Some(network) = self.networks.iter().find(|n| !lookup.has_network(n)) {
            return Err(StackError::unknown(self.owner(), EntityKind::Network, network.as_str()));
        }
        if let Some(NetworkMode::Service(target)) = &self.network_mode {
            if !lookup.has_service(target) {
                return Err(StackError::unknown(self.owner(), EntityKind::Service, target.as_str()));
            }
        }
        if let Some(secret) = self.secrets.iter().find(|s| !lookup.has_secret(s)) {
            return Err(StackError::unknown(self.owner(), EntityKind::Secret, secret.as_str()));
        }
        if let Some(config) = self.configs.iter().find(|c| !lookup.has_config(c.source())) {
            return Err(StackError::unknown(self.owner(), EntityKind::Config, config.source()));
        }
        Ok(())
    }

    fn owner(&self) -> String {
        format!("service '{}'", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::lookup::tests::FakeLookup;

    #[test]
    fn test_port_validation() {
        assert!(matches!(PortMapping::new(0), Err(StackError::Range { .. })));
        assert!(matches!(
            PortMapping::mapped(80, 70000),
            Err(StackError::Range { .. })
        ));
        let spec = PortSpec {
            internal: 9000,
            external: Some(9000),
            internal_only: true,
        };
        assert!(matches!(
            PortMapping::from_spec(&spec),
            Err(StackError::Shape { .. })
        ));
        assert_eq!(PortMapping::new(3000).unwrap().host_port(), Some(3000));
        assert_eq!(PortMapping::internal_only(9000).unwrap().host_port(), None);
    }

    #[test]
    fn test_host_port_collision() {
        let mut service = Service::new("web").unwrap();
        service.add_port(PortMapping::mapped(3000, 8080).unwrap()).unwrap();
        assert!(matches!(
            service.add_port(PortMapping::mapped(4000, 8080).unwrap()),
            Err(StackError::DuplicateName {
                kind: EntityKind::Port,
                ..
            })
        ));
        service.add_port(PortMapping::internal_only(9000).unwrap()).unwrap();
        assert_eq!(service.ports().len(), 2);
    }

    #[test]
    fn test_image_and_build_exclusive() {
        let mut service = Service::new("api").unwrap();
        service.set_image("node:18").unwrap();
        assert!(matches!(
            service.set_build(ServiceBuild::new("./api").unwrap()),
            Err(StackError::Shape { .. })
        ));

        let mut service = Service::new("api").unwrap();
        service.set_build(ServiceBuild::new("./api").unwrap()).unwrap();
        assert!(service.set_image("node:18").is_err());
    }

    #[test]
    fn test_named_volume_must_exist() {
        let mut service = Service::new("db").unwrap();
        let empty = FakeLookup::default();
        assert!(matches!(
            service.add_volume(ServiceVolume::named("data", "/var/lib/db"), &empty),
            Err(StackError::ReferentialIntegrity {
                kind: EntityKind::Volume,
                ..
            })
        ));

        let lookup = FakeLookup::default().with_volume("data");
        service
            .add_volume(ServiceVolume::named("data", "/var/lib/db"), &lookup)
            .unwrap();
        assert_eq!(service.volumes().len(), 1);
    }

    #[test]
    fn test_volume_spec_discrimination() {
        let both = ServiceVolumeSpec {
            name: Some("data".to_string()),
            host_path: Some("./data".to_string()),
            container_path: Some("/data".to_string()),
            read_only: None,
        };
        assert!(ServiceVolume::from_spec(&both).is_err());

        let bind = ServiceVolumeSpec {
            host_path: Some("./src".to_string()),
            container_path: Some("/app".to_string()),
            read_only: Some(true),
            ..Default::default()
        };
        assert_eq!(
            ServiceVolume::from_spec(&bind).unwrap(),
            ServiceVolume::bind("./src", "/app", true)
        );

        let relative = ServiceVolume::anonymous("data");
        let mut service = Service::new("web").unwrap();
        assert!(service.add_volume(relative, &FakeLookup::default()).is_err());
    }

    #[test]
    fn test_dependencies() {
        let lookup = FakeLookup::default().with_service("db");
        let mut service = Service::new("web").unwrap();
        service.add_dependency("db", None, &lookup).unwrap();
        assert!(matches!(
            service.add_dependency("cache", None, &lookup),
            Err(StackError::ReferentialIntegrity {
                kind: EntityKind::Service,
                ..
            })
        ));
        assert!(matches!(
            service.add_dependency("web", None, &lookup),
            Err(StackError::Shape { .. })
        ));
    }

    #[test]
    fn test_networks_and_mode_exclusive() {
        let lookup = FakeLookup::default().with_network("front").with_service("vpn");
        let mut service = Service::new("web").unwrap();
        service.add_network("front", &lookup).unwrap();
        assert!(service.set_network_mode(NetworkMode::Host, &lookup).is_err());

        let mut service = Service::new("web").unwrap();
        service
            .set_network_mode(NetworkMode::parse("service:vpn").unwrap(), &lookup)
            .unwrap();
        assert!(service.add_network("front", &lookup).is_err());

        let mut service = Service::new("web").unwrap();
        assert!(matches!(
            service.set_network_mode(NetworkMode::parse("service:ghost").unwrap(), &lookup),
            Err(StackError::ReferentialIntegrity { .. })
        ));
        assert!(matches!(
            NetworkMode::parse("overlay-ish"),
            Err(StackError::Shape { .. })
        ));
    }

    #[test]
    fn test_secrets_configs_and_env_files() {
        let lookup = FakeLookup::default()
            .with_secret("db_password")
            .with_config("nginx_conf")
            .with_path("./web.env");
        let mut service = Service::new("web").unwrap();

        service.add_secret("db_password", &lookup).unwrap();
        assert!(service.add_secret("api_key", &lookup).is_err());

        service
            .add_config(ServiceConfigRef::new("nginx_conf"), &lookup)
            .unwrap();
        assert!(matches!(
            service.add_config(ServiceConfigRef::new("nginx_conf"), &lookup),
            Err(StackError::DuplicateName { .. })
        ));

        service.add_env_file("./web.env", &lookup).unwrap();
        service.add_env_file("./web.env", &lookup).unwrap();
        assert_eq!(service.env_files(), &["./web.env".to_string()]);
        assert!(matches!(
            service.add_env_file("./missing.env", &lookup),
            Err(StackError::ReferentialIntegrity {
                kind: EntityKind::File,
                ..
            })
        ));
    }

    #[test]
    fn test_scalar_setters() {
        let mut service = Service::new("web").unwrap();
        assert!(service.set_env("BAD KEY", "x").is_err());
        service.set_env("PORT", "3000").unwrap();
        service.set_env("PORT", "4000").unwrap();
        assert_eq!(service.environment()["PORT"], "4000");

        service.set_user("node:node").unwrap();
        assert!(service.set_user("a:b:c").is_err());
        assert!(service.add_external_link("redis:cache").is_ok());
        assert!(service.add_external_link("redis:").is_err());
        assert!(service.set_command(Command::from("")).is_err());
    }

    #[test]
    fn test_from_spec_applies_everything() {
        let lookup = FakeLookup::default().with_service("db").with_volume("data");
        let spec = ServiceSpec {
            image: Some("node:18".to_string()),
            ports: vec![PortSpec {
                internal: 3000,
                external: Some(80),
                internal_only: false,
            }],
            volumes: vec![ServiceVolumeSpec {
                name: Some("data".to_string()),
                container_path: Some("/data".to_string()),
                ..Default::default()
            }],
            depends_on: vec![DependsOnSpec::Conditional {
                service: "db".to_string(),
                condition: Some("service_healthy".to_string()),
            }],
            command: Some(Command::from(["npm", "start"])),
            ..Default::default()
        };
        let service = Service::from_spec("web", &spec, &lookup).unwrap();
        assert_eq!(
            service.source(),
            Some(&ImageSource::Image("node:18".to_string()))
        );
        assert_eq!(service.ports()[0].host_port(), Some(80));
        assert_eq!(
            service.depends_on()["db"],
            Some(DependencyCondition::Healthy)
        );
    }
}
