//! Stack: the composition root
//!
//! A [`Stack`] owns one registry per entity kind plus the stack-wide
//! environment. Entities are created and edited only through it, and it is
//! the [`EntityLookup`] their setters consult for cross-entity references.

use super::common::validate_env_key;
use super::config::{ConfigSpec, NetworkSpec, SecretSpec, ServiceSpec, VolumeSpec};
use super::lookup::EntityLookup;
use super::manifest::ManifestSerializer;
use super::registry::Registry;
use super::service::Service;
use crate::error::{EntityKind, Result, StackError};
use crate::fs::{ArtifactWriter, FsPathOracle, PathOracle};
use crate::network::Network;
use crate::render::RenderState;
use crate::storage::{ConfigFile, Secret, Volume};
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;

/// Multi-service stack
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    environment: IndexMap<String, String>,
    env_files: Vec<String>,
    services: Registry<Service>,
    networks: Registry<Network>,
    volumes: Registry<Volume>,
    secrets: Registry<Secret>,
    configs: Registry<ConfigFile>,
    main_service: Option<String>,
    oracle: Arc<dyn PathOracle>,
    render_state: RenderState,
}

impl Stack {
    /// Create a stack that checks referenced files on the real filesystem
    pub fn new(name: &str) -> Result<Self> {
        Self::with_oracle(name, Arc::new(FsPathOracle::new()))
    }

    /// Create a stack with a custom path oracle
    pub fn with_oracle(name: &str, oracle: Arc<dyn PathOracle>) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(StackError::missing("stack", "name"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(StackError::shape(
                "stack name",
                format!("'{}' must not contain whitespace", name),
            ));
        }
        tracing::debug!("Creating stack {}", name);
        Ok(Self {
            name: name.to_string(),
            environment: IndexMap::new(),
            env_files: Vec::new(),
            services: Registry::new(),
            networks: Registry::new(),
            volumes: Registry::new(),
            secrets: Registry::new(),
            configs: Registry::new(),
            main_service: None,
            oracle,
            render_state: RenderState::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a stack-wide environment variable; the last write wins
    pub fn set_env(&mut self, key: &str, value: &str) -> Result<()> {
        validate_env_key(key)?;
        self.environment.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn environment(&self) -> &IndexMap<String, String> {
        &self.environment
    }

    /// Add a stack-wide env file; the file must exist
    pub fn add_env_file(&mut self, path: &str) -> Result<()> {
        if path.trim().is_empty() {
            return Err(StackError::missing("env_file", "path"));
        }
        if !self.oracle.exists(Path::new(path)) {
            return Err(StackError::unknown(
                format!("stack '{}'", self.name),
                EntityKind::File,
                path,
            ));
        }
        if self.env_files.iter().any(|p| p == path) {
            tracing::warn!("Env file {} already added to stack {}", path, self.name);
            return Ok(());
        }
        self.env_files.push(path.to_string());
        Ok(())
    }

    pub fn env_files(&self) -> &[String] {
        &self.env_files
    }

    /// Create a service. `spec.main` claims the main-service slot.
    pub fn create_service(&mut self, name: &str, spec: &ServiceSpec) -> Result<&Service> {
        self.services.ensure_vacant(name)?;
        if spec.main {
            self.ensure_main_vacant(name)?;
        }
        let service = Service::from_spec(name, spec, &*self)?;
        if spec.main {
            self.main_service = Some(name.to_string());
        }
        tracing::debug!("Created service {} in stack {}", name, self.name);
        self.services.insert(service)
    }

    /// Register a service built through its own setters. Its references are
    /// resolved again against this stack.
    pub fn add_service(&mut self, service: Service) -> Result<&Service> {
        self.services.ensure_vacant(service.name())?;
        service.check_references(&*self)?;
        tracing::debug!("Adding service {} to stack {}", service.name(), self.name);
        self.services.insert(service)
    }

    pub fn create_network(&mut self, name: &str, spec: &NetworkSpec) -> Result<&Network> {
        self.networks.ensure_vacant(name)?;
        let network = Network::from_spec(name, spec)?;
        tracing::debug!("Created network {} in stack {}", name, self.name);
        self.networks.insert(network)
    }

    pub fn create_volume(&mut self, name: &str, spec: &VolumeSpec) -> Result<&Volume> {
        self.volumes.ensure_vacant(name)?;
        let volume = Volume::from_spec(name, spec)?;
        tracing::debug!("Created volume {} in stack {}", name, self.name);
        self.volumes.insert(volume)
    }

    pub fn create_secret(&mut self, name: &str, spec: &SecretSpec) -> Result<&Secret> {
        self.secrets.ensure_vacant(name)?;
        let secret = Secret::from_spec(name, spec, &*self)?;
        tracing::debug!("Created secret {} in stack {}", name, self.name);
        self.secrets.insert(secret)
    }

    pub fn create_config(&mut self, name: &str, spec: &ConfigSpec) -> Result<&ConfigFile> {
        self.configs.ensure_vacant(name)?;
        let config = ConfigFile::from_spec(name, spec, &*self)?;
        tracing::debug!("Created config {} in stack {}", name, self.name);
        self.configs.insert(config)
    }

    /// Edit a service through its setters. The closure works on a copy that
    /// is committed only if it returns `Ok`.
    pub fn update_service<R, F>(&mut self, name: &str, edit: F) -> Result<R>
    where
        F: FnOnce(&mut Service, &dyn EntityLookup) -> Result<R>,
    {
        let mut service = self
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| self.unknown(EntityKind::Service, name))?;
        let out = edit(&mut service, &*self)?;
        service.check_references(&*self)?;
        self.services.replace(service)?;
        tracing::debug!("Updated service {} in stack {}", name, self.name);
        Ok(out)
    }

    /// Edit a network; see [`Stack::update_service`]
    pub fn update_network<R, F>(&mut self, name: &str, edit: F) -> Result<R>
    where
        F: FnOnce(&mut Network) -> Result<R>,
    {
        let mut network = self
            .networks
            .get(name)
            .cloned()
            .ok_or_else(|| self.unknown(EntityKind::Network, name))?;
        let out = edit(&mut network)?;
        self.networks.replace(network)?;
        tracing::debug!("Updated network {} in stack {}", name, self.name);
        Ok(out)
    }

    /// Edit a volume; see [`Stack::update_service`]
    pub fn update_volume<R, F>(&mut self, name: &str, edit: F) -> Result<R>
    where
        F: FnOnce(&mut Volume) -> Result<R>,
    {
        let mut volume = self
            .volumes
            .get(name)
            .cloned()
            .ok_or_else(|| self.unknown(EntityKind::Volume, name))?;
        let out = edit(&mut volume)?;
        self.volumes.replace(volume)?;
        tracing::debug!("Updated volume {} in stack {}", name, self.name);
        Ok(out)
    }

    /// Mark an existing service as the main one
    pub fn set_main_service(&mut self, name: &str) -> Result<()> {
        if !self.services.contains(name) {
            return Err(self.unknown(EntityKind::Service, name));
        }
        self.ensure_main_vacant(name)?;
        self.main_service = Some(name.to_string());
        Ok(())
    }

    pub fn main_service(&self) -> Option<&Service> {
        self.main_service
            .as_deref()
            .and_then(|name| self.services.get(name))
    }

    pub fn services(&self) -> &Registry<Service> {
        &self.services
    }

    pub fn networks(&self) -> &Registry<Network> {
        &self.networks
    }

    pub fn volumes(&self) -> &Registry<Volume> {
        &self.volumes
    }

    pub fn secrets(&self) -> &Registry<Secret> {
        &self.secrets
    }

    pub fn configs(&self) -> &Registry<ConfigFile> {
        &self.configs
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.get(name)
    }

    pub fn volume(&self, name: &str) -> Option<&Volume> {
        self.volumes.get(name)
    }

    /// Services in render order: the main service first, then the rest in
    /// creation order
    pub fn services_in_render_order(&self) -> Vec<&Service> {
        let main = self.main_service();
        main.into_iter()
            .chain(
                self.services
                    .iter()
                    .filter(|s| Some(s.name()) != main.map(|m| m.name())),
            )
            .collect()
    }

    /// Render the orchestration manifest
    pub fn render_manifest(&self) -> Result<String> {
        let _guard = self
            .render_state
            .begin(&format!("manifest of stack '{}'", self.name))?;
        let manifest = ManifestSerializer::new(self).render()?;
        tracing::info!(
            "Rendered manifest for stack {} ({} services)",
            self.name,
            self.services.len()
        );
        Ok(manifest)
    }

    /// Render the manifest and hand it to `writer`
    pub fn write_manifest(&self, writer: &dyn ArtifactWriter, path: &Path) -> Result<()> {
        let manifest = self.render_manifest()?;
        writer.write(path, &manifest)?;
        tracing::info!("Wrote manifest for stack {} to {}", self.name, path.display());
        Ok(())
    }

    fn ensure_main_vacant(&self, name: &str) -> Result<()> {
        match &self.main_service {
            Some(current) if current != name => Err(StackError::duplicate(
                EntityKind::MainService,
                format!("'{}' is already the main service; cannot also mark '{}'", current, name),
            )),
            _ => Ok(()),
        }
    }

    fn unknown(&self, kind: EntityKind, name: &str) -> StackError {
        StackError::unknown(format!("stack '{}'", self.name), kind, name)
    }
}

impl EntityLookup for Stack {
    fn has_service(&self, name: &str) -> bool {
        self.services.contains(name)
    }

    fn has_network(&self, name: &str) -> bool {
        self.networks.contains(name)
    }

    fn has_volume(&self, name: &str) -> bool {
        self.volumes.contains(name)
    }

    fn has_secret(&self, name: &str) -> bool {
        self.secrets.contains(name)
    }

    fn has_config(&self, name: &str) -> bool {
        self.configs.contains(name)
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.oracle.exists(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::{PortSpec, ServiceVolumeSpec};
    use crate::compose::service::{PortMapping, ServiceVolume};
    use crate::fs::StaticPathOracle;

    fn stack() -> Stack {
        Stack::with_oracle("shop", Arc::new(StaticPathOracle::allow_all())).unwrap()
    }

    fn image(image: &str) -> ServiceSpec {
        ServiceSpec {
            image: Some(image.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_names_per_kind() {
        let mut stack = stack();
        stack.create_service("web", &image("nginx")).unwrap();
        assert!(matches!(
            stack.create_service("web", &image("nginx")),
            Err(StackError::DuplicateName {
                kind: EntityKind::Service,
                ..
            })
        ));

        stack.create_network("front", &NetworkSpec::default()).unwrap();
        assert!(matches!(
            stack.create_network("front", &NetworkSpec::default()),
            Err(StackError::DuplicateName {
                kind: EntityKind::Network,
                ..
            })
        ));

        stack.create_volume("data", &VolumeSpec::default()).unwrap();
        assert!(stack.create_volume("data", &VolumeSpec::default()).is_err());

        let secret = SecretSpec {
            external: Some(true),
            ..Default::default()
        };
        stack.create_secret("token", &secret).unwrap();
        assert!(stack.create_secret("token", &secret).is_err());

        let config = ConfigSpec {
            file: Some("./app.conf".to_string()),
        };
        stack.create_config("app", &config).unwrap();
        assert!(stack.create_config("app", &config).is_err());
    }

    #[test]
    fn test_volume_reference_resolves_after_creation() {
        let mut stack = stack();
        let spec = ServiceSpec {
            image: Some("postgres:16".to_string()),
            volumes: vec![ServiceVolumeSpec {
                name: Some("data".to_string()),
                container_path: Some("/var/lib/db".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            stack.create_service("db", &spec),
            Err(StackError::ReferentialIntegrity {
                kind: EntityKind::Volume,
                ..
            })
        ));
        assert!(!stack.has_service("db"));

        stack.create_volume("data", &VolumeSpec::default()).unwrap();
        assert!(stack.create_service("db", &spec).is_ok());
    }

    #[test]
    fn test_single_main_service() {
        let mut stack = stack();
        let main = ServiceSpec {
            main: true,
            ..image("nginx")
        };
        stack.create_service("web", &main).unwrap();
        assert!(matches!(
            stack.create_service("admin", &main),
            Err(StackError::DuplicateName {
                kind: EntityKind::MainService,
                ..
            })
        ));
        stack.create_service("worker", &image("busybox")).unwrap();
        assert!(stack.set_main_service("worker").is_err());
        assert!(stack.set_main_service("web").is_ok());

        let order: Vec<&str> = stack
            .services_in_render_order()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(order, vec!["web", "worker"]);
    }

    #[test]
    fn test_main_service_renders_first() {
        let mut stack = stack();
        stack.create_service("worker", &image("busybox")).unwrap();
        stack.create_service("web", &image("nginx")).unwrap();
        stack.set_main_service("web").unwrap();
        let order: Vec<&str> = stack
            .services_in_render_order()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(order, vec!["web", "worker"]);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut stack = stack();
        stack.create_service("web", &image("nginx")).unwrap();

        let result = stack.update_service("web", |service, lookup| {
            service.add_port(PortMapping::new(8080)?)?;
            service.add_network("missing", lookup)
        });
        assert!(result.is_err());
        assert!(stack.service("web").unwrap().ports().is_empty());

        stack
            .update_service("web", |service, _| service.add_port(PortMapping::new(8080)?))
            .unwrap();
        assert_eq!(stack.service("web").unwrap().ports().len(), 1);

        assert!(matches!(
            stack.update_service("ghost", |_, _| Ok(())),
            Err(StackError::ReferentialIntegrity { .. })
        ));
    }

    #[test]
    fn test_added_service_references_resolve_in_this_stack() {
        let mut other = stack();
        other.create_volume("ghost", &VolumeSpec::default()).unwrap();
        let mut service = Service::new("db").unwrap();
        service.set_image("postgres:16").unwrap();
        service
            .add_volume(ServiceVolume::named("ghost", "/d"), &other)
            .unwrap();

        let mut shop = stack();
        assert!(matches!(
            shop.add_service(service.clone()),
            Err(StackError::ReferentialIntegrity {
                kind: EntityKind::Volume,
                ..
            })
        ));
        assert!(shop.services().is_empty());

        shop.create_volume("ghost", &VolumeSpec::default()).unwrap();
        shop.add_service(service.clone()).unwrap();
        let manifest = shop.render_manifest().unwrap();
        assert!(manifest.contains("      - ghost:/d:rw\n"));
        assert!(manifest.contains("\nvolumes:\n  ghost:"));
        assert!(matches!(
            shop.add_service(service),
            Err(StackError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_update_rejects_references_from_another_lookup() {
        let mut other = stack();
        other.create_network("back", &NetworkSpec::default()).unwrap();
        let mut shop = stack();
        shop.create_service("web", &image("nginx")).unwrap();

        let result = shop.update_service("web", |service, _| service.add_network("back", &other));
        assert!(matches!(
            result,
            Err(StackError::ReferentialIntegrity {
                kind: EntityKind::Network,
                ..
            })
        ));
        assert!(shop.service("web").unwrap().networks().is_empty());
    }

    #[test]
    fn test_env_files_checked_and_deduplicated() {
        let mut stack =
            Stack::with_oracle("shop", Arc::new(StaticPathOracle::new(["./.env"]))).unwrap();
        stack.add_env_file("./.env").unwrap();
        stack.add_env_file("./.env").unwrap();
        assert_eq!(stack.env_files().len(), 1);
        assert!(matches!(
            stack.add_env_file("./prod.env"),
            Err(StackError::ReferentialIntegrity {
                kind: EntityKind::File,
                ..
            })
        ));
    }

    #[test]
    fn test_secret_file_goes_through_oracle() {
        let mut stack =
            Stack::with_oracle("shop", Arc::new(StaticPathOracle::new(["./db.txt"]))).unwrap();
        let present = SecretSpec {
            file: Some("./db.txt".to_string()),
            ..Default::default()
        };
        let missing = SecretSpec {
            file: Some("./api.txt".to_string()),
            ..Default::default()
        };
        assert!(stack.create_secret("db", &present).is_ok());
        assert!(stack.create_secret("api", &missing).is_err());
    }

    #[test]
    fn test_failed_create_leaves_registry_untouched() {
        let mut stack = stack();
        let spec = ServiceSpec {
            image: Some("nginx".to_string()),
            ports: vec![PortSpec {
                internal: 0,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(stack.create_service("web", &spec).is_err());
        assert!(stack.services().is_empty());
    }
}
