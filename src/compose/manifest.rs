//! Orchestration manifest rendering
//!
//! Sections render in a fixed order: services, volumes, networks, secrets,
//! configs. Empty collections never produce a key.

use super::common::External;
use super::deploy::{ResourceAmounts, ServiceDeployment};
use super::restart::RestartPolicy;
use super::service::{DependencyCondition, ImageSource, NetworkMode, PortMapping, Service, ServiceVolume};
use super::stack::Stack;
use crate::command::Command;
use crate::error::{EntityKind, Result, StackError};
use crate::network::Network;
use crate::render::yaml;
use crate::render::Emitter;
use crate::storage::{ConfigFile, Secret, SecretSource, Volume};
use indexmap::IndexMap;

/// Renders one [`Stack`] into manifest text
pub struct ManifestSerializer<'a> {
    stack: &'a Stack,
    out: Emitter,
}

impl<'a> ManifestSerializer<'a> {
    pub fn new(stack: &'a Stack) -> Self {
        Self {
            stack,
            out: Emitter::new(),
        }
    }

    pub fn render(mut self) -> Result<String> {
        if self.stack.services().is_empty() {
            return Err(StackError::State(format!(
                "stack '{}' has no services to render",
                self.stack.name()
            )));
        }
        let stack = self.stack;

        self.out.block("services", |out| {
            for service in stack.services_in_render_order() {
                render_service(out, stack, service)?;
            }
            Ok(())
        })?;

        if !stack.volumes().is_empty() {
            self.out.block("volumes", |out| {
                for volume in stack.volumes().iter() {
                    render_volume(out, volume)?;
                }
                Ok(())
            })?;
        }

        if !stack.networks().is_empty() {
            self.out.block("networks", |out| {
                for network in stack.networks().iter() {
                    render_network(out, network)?;
                }
                Ok(())
            })?;
        }

        if !stack.secrets().is_empty() {
            self.out.block("secrets", |out| {
                for secret in stack.secrets().iter() {
                    render_secret(out, secret)?;
                }
                Ok(())
            })?;
        }

        if !stack.configs().is_empty() {
            self.out.block("configs", |out| {
                for config in stack.configs().iter() {
                    render_config(out, config)?;
                }
                Ok(())
            })?;
        }

        Ok(self.out.finish())
    }
}

fn render_service(out: &mut Emitter, stack: &Stack, service: &Service) -> Result<()> {
    out.block(service.name(), |out| {
        match service.source() {
            Some(ImageSource::Image(image)) => out.scalar("image", image),
            Some(ImageSource::Build(build)) => {
                if build.dockerfile_path().is_none()
                    && build.target_stage().is_none()
                    && build.args().is_empty()
                    && build.ssh().is_empty()
                {
                    out.scalar("build", build.context());
                } else {
                    out.block("build", |out| {
                        out.scalar("context", build.context());
                        if let Some(dockerfile) = build.dockerfile_path() {
                            out.scalar("dockerfile", dockerfile);
                        }
                        if let Some(target) = build.target_stage() {
                            out.scalar("target", target);
                        }
                        if !build.args().is_empty() {
                            out.quoted_map("args", build.args())?;
                        }
                        if !build.ssh().is_empty() {
                            out.block("ssh", |out| {
                                for (id, path) in build.ssh() {
                                    out.item(&format!("{}={}", id, path));
                                }
                                Ok(())
                            })?;
                        }
                        Ok(())
                    })?;
                }
            }
            None => {
                return Err(StackError::missing(
                    format!("service '{}'", service.name()),
                    "image or build",
                ))
            }
        }

        if let Some(user) = service.user() {
            out.quoted("user", user);
        }
        if let Some(entrypoint) = service.entrypoint() {
            render_command(out, "entrypoint", entrypoint);
        }
        if let Some(command) = service.command() {
            render_command(out, "command", command);
        }
        if let Some(restart) = service.restart() {
            render_restart(out, restart)?;
        }
        render_depends_on(out, service)?;
        render_environment(out, stack, service)?;
        render_env_files(out, stack, service)?;
        render_ports(out, service)?;
        render_service_volumes(out, stack, service)?;

        if !service.networks().is_empty() {
            out.block("networks", |out| {
                for network in service.networks() {
                    out.item(network);
                }
                Ok(())
            })?;
        } else if let Some(mode) = service.network_mode() {
            render_network_mode(out, mode);
        }

        if !service.external_links().is_empty() {
            out.block("external_links", |out| {
                for link in service.external_links() {
                    out.item(link);
                }
                Ok(())
            })?;
        }
        if !service.secrets().is_empty() {
            out.block("secrets", |out| {
                for secret in service.secrets() {
                    out.item(secret);
                }
                Ok(())
            })?;
        }
        if !service.configs().is_empty() {
            out.block("configs", |out| {
                for config in service.configs() {
                    out.item_block(|out| {
                        out.scalar("source", config.source());
                        if let Some(target) = config.target_path() {
                            out.scalar("target", target);
                        }
                        if let Some(mode) = config.file_mode() {
                            out.comment(format!("mode {}: {}", mode.octal(), mode.describe()));
                            out.raw("mode", mode.octal());
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }
        if let Some(healthcheck) = service.healthcheck() {
            out.block("healthcheck", |out| {
                if healthcheck.is_disabled() {
                    out.raw("disable", true);
                    return Ok(());
                }
                if let Some(test) = healthcheck.test_args() {
                    out.raw("test", yaml::flow_list(&test));
                }
                if let Some(interval) = healthcheck.interval_value() {
                    out.scalar("interval", interval);
                }
                if let Some(timeout) = healthcheck.timeout_value() {
                    out.scalar("timeout", timeout);
                }
                if let Some(retries) = healthcheck.retries_value() {
                    out.raw("retries", retries);
                }
                if let Some(start_period) = healthcheck.start_period_value() {
                    out.scalar("start_period", start_period);
                }
                Ok(())
            })?;
        }
        if let Some(logging) = service.logging() {
            out.block("logging", |out| {
                out.scalar("driver", logging.driver());
                let options = logging.options();
                if !options.is_empty() {
                    out.block("options", |out| {
                        for (key, value) in &options {
                            out.quoted(key, value);
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }
        if let Some(deploy) = service.deploy().filter(|d| !d.is_empty()) {
            render_deploy(out, deploy)?;
        }
        if !service.security_opt().is_empty() {
            out.block("security_opt", |out| {
                for opt in service.security_opt() {
                    out.item(opt);
                }
                Ok(())
            })?;
        }
        Ok(())
    })
}

fn render_command(out: &mut Emitter, key: &str, command: &Command) {
    match command {
        Command::Shell(cmd) => out.scalar(key, cmd),
        Command::Exec(args) => out.raw(key, yaml::flow_list(args)),
    }
}

fn render_restart(out: &mut Emitter, restart: RestartPolicy) -> Result<()> {
    match restart {
        RestartPolicy::OnFailure { times } => out.block("restart", |out| {
            out.scalar("policy", restart.name());
            out.raw("times", times);
            Ok(())
        }),
        simple => {
            out.scalar("restart", simple.name());
            Ok(())
        }
    }
}

fn render_depends_on(out: &mut Emitter, service: &Service) -> Result<()> {
    let depends_on = service.depends_on();
    if depends_on.is_empty() {
        return Ok(());
    }
    let long_form = depends_on.values().any(Option::is_some);
    out.block("depends_on", |out| {
        for (name, condition) in depends_on {
            if long_form {
                out.block(name, |out| {
                    let condition = condition.unwrap_or(DependencyCondition::Started);
                    out.raw("condition", condition);
                    Ok(())
                })?;
            } else {
                out.item(name);
            }
        }
        Ok(())
    })
}

/// Stack-wide variables first, service variables override them in place
fn render_environment(out: &mut Emitter, stack: &Stack, service: &Service) -> Result<()> {
    let mut merged: IndexMap<&String, &String> = stack.environment().iter().collect();
    for (key, value) in service.environment() {
        merged.insert(key, value);
    }
    if merged.is_empty() {
        return Ok(());
    }
    out.quoted_map("environment", merged)
}

/// Service env files, then stack env files not already listed
fn render_env_files(out: &mut Emitter, stack: &Stack, service: &Service) -> Result<()> {
    let mut files: Vec<&str> = Vec::new();
    for path in service.env_files().iter().chain(stack.env_files()) {
        if !files.contains(&path.as_str()) {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Ok(());
    }
    out.block("env_file", |out| {
        for path in files {
            out.item(path);
        }
        Ok(())
    })
}

fn render_ports(out: &mut Emitter, service: &Service) -> Result<()> {
    let (exposed, published): (Vec<&PortMapping>, Vec<&PortMapping>) = service
        .ports()
        .iter()
        .partition(|port| port.is_internal_only());
    if !published.is_empty() {
        out.block("ports", |out| {
            for port in &published {
                let host = port.host_port().unwrap_or(port.internal());
                out.quoted_item(&format!("{}:{}", host, port.internal()));
            }
            Ok(())
        })?;
    }
    if !exposed.is_empty() {
        out.block("expose", |out| {
            for port in &exposed {
                out.quoted_item(&port.internal().to_string());
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn render_service_volumes(out: &mut Emitter, stack: &Stack, service: &Service) -> Result<()> {
    if service.volumes().is_empty() {
        return Ok(());
    }
    out.block("volumes", |out| {
        for volume in service.volumes() {
            let line = match volume {
                ServiceVolume::Anonymous { container_path } => container_path.clone(),
                ServiceVolume::Named {
                    name,
                    container_path,
                    mode,
                } => {
                    let mode = match mode {
                        Some(mode) => *mode,
                        None => stack
                            .volume(name)
                            .map(Volume::access_mode)
                            .ok_or_else(|| {
                                StackError::unknown(
                                    format!("service '{}'", service.name()),
                                    EntityKind::Volume,
                                    name.as_str(),
                                )
                            })?,
                    };
                    format!("{}:{}:{}", name, container_path, mode)
                }
                ServiceVolume::Bind {
                    host_path,
                    container_path,
                    mode,
                } => format!("{}:{}:{}", host_path, container_path, mode),
            };
            out.item(&line);
        }
        Ok(())
    })
}

fn render_network_mode(out: &mut Emitter, mode: &NetworkMode) {
    out.scalar("network_mode", &mode.to_string());
}

fn render_deploy(out: &mut Emitter, deploy: &ServiceDeployment) -> Result<()> {
    out.block("deploy", |out| {
        if let Some(mode) = deploy.mode() {
            out.raw("mode", mode);
        }
        if let Some(replicas) = deploy.replicas() {
            out.raw("replicas", replicas);
        }
        if let Some(resources) = deploy.resources() {
            out.block("resources", |out| {
                let sections = [
                    ("limits", resources.limits.as_ref()),
                    ("reservations", resources.reservations.as_ref()),
                ];
                for (key, amounts) in sections {
                    if let Some(amounts) = amounts.filter(|a| !a.is_empty()) {
                        render_amounts(out, key, amounts)?;
                    }
                }
                Ok(())
            })?;
        }
        if let Some(policy) = deploy.restart_policy() {
            out.block("restart_policy", |out| {
                if let Some(condition) = policy.condition {
                    out.raw("condition", condition);
                }
                if let Some(delay) = &policy.delay {
                    out.scalar("delay", delay);
                }
                if let Some(max_attempts) = policy.max_attempts {
                    out.raw("max_attempts", max_attempts);
                }
                if let Some(window) = &policy.window {
                    out.scalar("window", window);
                }
                Ok(())
            })?;
        }
        if !deploy.placement().is_empty() {
            out.block("placement", |out| {
                out.block("constraints", |out| {
                    for constraint in deploy.placement() {
                        out.item(constraint);
                    }
                    Ok(())
                })
            })?;
        }
        if !deploy.labels().is_empty() {
            out.quoted_map("labels", deploy.labels())?;
        }
        Ok(())
    })
}

fn render_amounts(out: &mut Emitter, key: &str, amounts: &ResourceAmounts) -> Result<()> {
    out.block(key, |out| {
        if let Some(cpus) = amounts.cpus_value() {
            out.quoted("cpus", cpus);
        }
        if let Some(memory) = amounts.memory_value() {
            out.scalar("memory", memory);
        }
        Ok(())
    })
}

fn render_volume(out: &mut Emitter, volume: &Volume) -> Result<()> {
    let driver = volume.explicit_driver();
    if volume.external().is_none() && driver.is_none() && volume.labels().is_empty() {
        out.key(volume.name());
        return Ok(());
    }
    out.block(volume.name(), |out| {
        if let Some(external) = volume.external() {
            render_external(out, external);
            return Ok(());
        }
        if let Some(driver) = driver {
            out.scalar("driver", driver.engine_driver());
            let options = driver.engine_options();
            if !options.is_empty() {
                out.block("driver_opts", |out| {
                    for (key, value) in &options {
                        out.quoted(key, value);
                    }
                    Ok(())
                })?;
            }
        }
        if !volume.labels().is_empty() {
            out.quoted_map("labels", volume.labels())?;
        }
        Ok(())
    })
}

fn render_network(out: &mut Emitter, network: &Network) -> Result<()> {
    out.block(network.name(), |out| {
        if let Some(external) = network.external() {
            render_external(out, external);
            return Ok(());
        }
        out.raw("driver", network.driver());
        if !network.driver_opts().is_empty() {
            out.quoted_map("driver_opts", network.driver_opts())?;
        }
        if let Some(ipam) = network.ipam() {
            out.block("ipam", |out| {
                if let Some(driver) = ipam.driver_name() {
                    out.scalar("driver", driver);
                }
                if !ipam.pools().is_empty() {
                    out.block("config", |out| {
                        for pool in ipam.pools() {
                            out.item_block(|out| {
                                out.scalar("subnet", pool.subnet());
                                if let Some(gateway) = pool.gateway_address() {
                                    out.scalar("gateway", gateway);
                                }
                                if let Some(range) = pool.ip_range_value() {
                                    out.scalar("ip_range", range);
                                }
                                if !pool.aux_addresses().is_empty() {
                                    out.quoted_map("aux_addresses", pool.aux_addresses())?;
                                }
                                Ok(())
                            })?;
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }
        if let Some(internal) = network.internal() {
            out.raw("internal", internal);
        }
        if let Some(attachable) = network.attachable() {
            out.raw("attachable", attachable);
        }
        if let Some(enable_ipv6) = network.enable_ipv6() {
            out.raw("enable_ipv6", enable_ipv6);
        }
        if !network.labels().is_empty() {
            out.quoted_map("labels", network.labels())?;
        }
        Ok(())
    })
}

fn render_external(out: &mut Emitter, external: &External) {
    if let External::Named { name } = external {
        out.scalar("name", name);
    }
    out.raw("external", true);
}

fn render_secret(out: &mut Emitter, secret: &Secret) -> Result<()> {
    out.block(secret.name(), |out| {
        match secret.source() {
            SecretSource::File(path) => out.scalar("file", path),
            SecretSource::External => out.raw("external", true),
        }
        Ok(())
    })
}

fn render_config(out: &mut Emitter, config: &ConfigFile) -> Result<()> {
    out.block(config.name(), |out| {
        out.scalar("file", config.file());
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::{
        ConfigRefSpec, ConfigSpec, DependsOnSpec, LoggingSpec, ModeSpec, NetworkSpec, Permission,
        PortSpec, RestartSpec, SecretSpec, ServiceSpec, ServiceVolumeSpec, VolumeSpec,
    };
    use crate::compose::service::PortMapping;
    use crate::fs::StaticPathOracle;
    use std::sync::Arc;

    fn stack() -> Stack {
        Stack::with_oracle("shop", Arc::new(StaticPathOracle::allow_all())).unwrap()
    }

    fn image(image: &str) -> ServiceSpec {
        ServiceSpec {
            image: Some(image.to_string()),
            ..Default::default()
        }
    }

    fn reparse(manifest: &str) -> serde_yaml::Value {
        serde_yaml::from_str(manifest).unwrap()
    }

    #[test]
    fn test_main_service_with_port() {
        let mut stack = stack();
        let spec = ServiceSpec {
            main: true,
            ports: vec![PortSpec {
                internal: 3000,
                ..Default::default()
            }],
            ..image("node:18")
        };
        stack.create_service("web", &spec).unwrap();

        let manifest = stack.render_manifest().unwrap();
        assert_eq!(
            manifest,
            "services:\n  web:\n    image: node:18\n    ports:\n      - \"3000:3000\"\n"
        );
        assert!(!manifest.contains("volumes:"));
        assert!(!manifest.contains("networks:"));
    }

    #[test]
    fn test_named_volume_mount() {
        let mut stack = stack();
        stack.create_volume("data", &VolumeSpec::default()).unwrap();
        let spec = ServiceSpec {
            volumes: vec![ServiceVolumeSpec {
                name: Some("data".to_string()),
                container_path: Some("/var/lib/db".to_string()),
                ..Default::default()
            }],
            ..image("postgres:16")
        };
        stack.create_service("db", &spec).unwrap();

        let manifest = stack.render_manifest().unwrap();
        assert!(manifest.contains("    volumes:\n      - data:/var/lib/db:rw\n"));
        assert!(manifest.contains("\nvolumes:\n  data:\n"));

        let doc = reparse(&manifest);
        assert!(doc["volumes"].get("data").is_some());
    }

    #[test]
    fn test_named_mount_inherits_volume_mode() {
        let mut stack = stack();
        let read_only = VolumeSpec {
            access_mode: Some("ro".to_string()),
            ..Default::default()
        };
        stack.create_volume("assets", &read_only).unwrap();
        let spec = ServiceSpec {
            volumes: vec![ServiceVolumeSpec {
                name: Some("assets".to_string()),
                container_path: Some("/srv/assets".to_string()),
                ..Default::default()
            }],
            ..image("nginx")
        };
        stack.create_service("web", &spec).unwrap();
        assert!(stack
            .render_manifest()
            .unwrap()
            .contains("- assets:/srv/assets:ro\n"));
    }

    #[test]
    fn test_on_failure_restart_block() {
        let mut stack = stack();
        let spec = ServiceSpec {
            restart: Some(RestartSpec::Policy("on-failure".to_string())),
            ..image("worker")
        };
        stack.create_service("jobs", &spec).unwrap();
        let manifest = stack.render_manifest().unwrap();
        assert!(manifest.contains("    restart:\n      policy: on-failure\n      times: 5\n"));

        let mut stack = self::stack();
        let spec = ServiceSpec {
            restart: Some(RestartSpec::Policy("always".to_string())),
            ..image("worker")
        };
        stack.create_service("jobs", &spec).unwrap();
        assert!(stack.render_manifest().unwrap().contains("    restart: always\n"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut stack = stack();
        stack.set_env("TZ", "UTC").unwrap();
        stack.create_network("front", &NetworkSpec::default()).unwrap();
        let spec = ServiceSpec {
            networks: vec!["front".to_string()],
            ..image("nginx")
        };
        stack.create_service("web", &spec).unwrap();
        let first = stack.render_manifest().unwrap();
        let second = stack.render_manifest().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_stack_is_rejected() {
        let stack = stack();
        assert!(matches!(stack.render_manifest(), Err(StackError::State(_))));
    }

    #[test]
    fn test_service_without_source_fails_at_render() {
        let mut stack = stack();
        stack.create_service("web", &ServiceSpec::default()).unwrap();
        assert!(matches!(
            stack.render_manifest(),
            Err(StackError::MissingField { .. })
        ));
    }

    #[test]
    fn test_expose_and_environment_merge() {
        let mut stack = stack();
        stack.set_env("LOG_LEVEL", "info").unwrap();
        stack.set_env("TZ", "UTC").unwrap();
        stack.add_env_file("./common.env").unwrap();
        stack.create_service("api", &image("node:18")).unwrap();
        stack
            .update_service("api", |service, lookup| {
                service.set_env("LOG_LEVEL", "debug")?;
                service.add_env_file("./api.env", lookup)?;
                service.add_env_file("./common.env", lookup)?;
                service.add_port(PortMapping::internal_only(9229)?)?;
                service.add_port(PortMapping::mapped(3000, 80)?)
            })
            .unwrap();

        let manifest = stack.render_manifest().unwrap();
        assert!(manifest.contains(
            "    environment:\n      LOG_LEVEL: \"debug\"\n      TZ: \"UTC\"\n"
        ));
        assert!(manifest.contains("    env_file:\n      - ./api.env\n      - ./common.env\n    ports:"));
        assert!(manifest.contains("    ports:\n      - \"80:3000\"\n    expose:\n      - \"9229\"\n"));
        // root env files stay out of the manifest
        assert!(!manifest.starts_with("env_file"));
    }

    #[test]
    fn test_depends_on_forms() {
        let mut stack = stack();
        stack.create_service("db", &image("postgres")).unwrap();
        stack.create_service("cache", &image("redis")).unwrap();
        let short = ServiceSpec {
            depends_on: vec![
                DependsOnSpec::Name("db".to_string()),
                DependsOnSpec::Name("cache".to_string()),
            ],
            ..image("node")
        };
        stack.create_service("api", &short).unwrap();
        let manifest = stack.render_manifest().unwrap();
        assert!(manifest.contains("    depends_on:\n      - db\n      - cache\n"));

        stack
            .update_service("api", |service, lookup| {
                service.add_dependency("db", Some(DependencyCondition::Healthy), lookup)
            })
            .unwrap();
        let manifest = stack.render_manifest().unwrap();
        assert!(manifest.contains(
            "    depends_on:\n      db:\n        condition: service_healthy\n      cache:\n        condition: service_started\n"
        ));
    }

    #[test]
    fn test_config_mode_and_secrets() {
        let mut stack = stack();
        stack
            .create_config(
                "nginx_conf",
                &ConfigSpec {
                    file: Some("./nginx.conf".to_string()),
                },
            )
            .unwrap();
        stack
            .create_secret(
                "db_password",
                &SecretSpec {
                    external: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        let spec = ServiceSpec {
            secrets: vec!["db_password".to_string()],
            configs: vec![ConfigRefSpec {
                source: "nginx_conf".to_string(),
                target: Some("/etc/nginx/nginx.conf".to_string()),
                mode: Some(ModeSpec {
                    owner: vec![Permission::Read, Permission::Write],
                    group: vec![Permission::Read],
                    others: vec![],
                }),
            }],
            ..image("nginx")
        };
        stack.create_service("web", &spec).unwrap();

        let manifest = stack.render_manifest().unwrap();
        assert!(manifest.contains(
            "    configs:\n      - source: nginx_conf\n        target: /etc/nginx/nginx.conf\n        # mode 0640: owner=rw- group=r-- others=---\n        mode: 0640\n"
        ));
        assert!(manifest.contains("\nsecrets:\n  db_password:\n    external: true\n"));
        assert!(manifest.contains("\nconfigs:\n  nginx_conf:\n    file: ./nginx.conf\n"));

        let doc = reparse(&manifest);
        assert_eq!(
            doc["services"]["web"]["configs"][0]["source"].as_str(),
            Some("nginx_conf")
        );
    }

    #[test]
    fn test_section_order() {
        let mut stack = stack();
        stack
            .create_config(
                "app",
                &ConfigSpec {
                    file: Some("./app.conf".to_string()),
                },
            )
            .unwrap();
        stack.create_network("back", &NetworkSpec::default()).unwrap();
        stack.create_volume("data", &VolumeSpec::default()).unwrap();
        stack.create_service("web", &image("nginx")).unwrap();

        let manifest = stack.render_manifest().unwrap();
        let services = manifest.find("services:").unwrap();
        let volumes = manifest.find("\nvolumes:").unwrap();
        let networks = manifest.find("\nnetworks:").unwrap();
        let configs = manifest.find("\nconfigs:").unwrap();
        assert!(services < volumes && volumes < networks && networks < configs);
        assert!(!manifest.contains("\nsecrets:"));
    }

    #[test]
    fn test_logging_options_only_when_set() {
        let mut stack = stack();
        let spec = ServiceSpec {
            logging: Some(LoggingSpec {
                driver: "journald".to_string(),
                options: IndexMap::new(),
            }),
            ..image("nginx")
        };
        stack.create_service("web", &spec).unwrap();
        let manifest = stack.render_manifest().unwrap();
        assert!(manifest.contains("    logging:\n      driver: journald\n"));
        assert!(!manifest.contains("options:"));
    }

    #[test]
    fn test_output_is_valid_yaml() {
        let mut stack = stack();
        stack.set_env("GREETING", "hello: \"world\"").unwrap();
        stack
            .create_volume(
                "cache",
                &VolumeSpec {
                    tmpfs: true,
                    size: Some("128m".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let spec = ServiceSpec {
            command: Some(Command::from(["npm", "run", "start"])),
            ..image("node:18")
        };
        stack.create_service("web", &spec).unwrap();

        let doc = reparse(&stack.render_manifest().unwrap());
        assert_eq!(
            doc["services"]["web"]["environment"]["GREETING"].as_str(),
            Some("hello: \"world\"")
        );
        assert_eq!(doc["services"]["web"]["command"][2].as_str(), Some("start"));
        assert_eq!(doc["volumes"]["cache"]["driver_opts"]["o"].as_str(), Some("size=128m"));
    }
}
