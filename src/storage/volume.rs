//! Volume configuration
//!
//! Each volume driver is a variant of [`VolumeDriverOptions`] with its own
//! option table. Several drivers are expressed through the engine's `local`
//! driver when rendered (nfs, tmpfs); the rest map to their plugin names.

use crate::compose::common::{insert_label, validate_byte_size, External, Scope};
use crate::compose::config::VolumeSpec;
use crate::compose::options::{push_opt, require_field, OptionReader};
use crate::compose::registry::{validate_name, Named};
use crate::compose::service::AccessMode;
use crate::error::{EntityKind, Result, StackError};
use indexmap::IndexMap;

/// `local` driver options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalOptions {
    pub fs_type: Option<String>,
    pub device: Option<String>,
    pub o: Option<String>,
}

/// NFS export mounted through the local driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NfsOptions {
    pub server: String,
    pub share: String,
    pub options: Option<String>,
}

/// tmpfs mounted through the local driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TmpfsOptions {
    pub size: Option<String>,
    pub uid: Option<String>,
}

/// Azure file share
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AzureFileOptions {
    pub share_name: String,
    pub storage_account_name: String,
}

/// REX-Ray EBS volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RexrayOptions {
    pub size: Option<String>,
    pub volume_type: Option<String>,
    pub iops: Option<String>,
}

/// GlusterFS volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlusterfsOptions {
    pub servers: String,
    pub volume: String,
}

/// Ceph RBD volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CephOptions {
    pub monitors: String,
    pub pool: String,
    pub user: Option<String>,
    pub secret_file: Option<String>,
}

/// DigitalOcean block storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigitalOceanOptions {
    pub size: String,
    pub region: Option<String>,
}

/// Volume driver with its options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeDriverOptions {
    Local(LocalOptions),
    Nfs(NfsOptions),
    Tmpfs(TmpfsOptions),
    AzureFile(AzureFileOptions),
    Rexray(RexrayOptions),
    Glusterfs(GlusterfsOptions),
    Ceph(CephOptions),
    DigitalOcean(DigitalOceanOptions),
}

impl Default for VolumeDriverOptions {
    fn default() -> Self {
        VolumeDriverOptions::Local(LocalOptions::default())
    }
}

impl VolumeDriverOptions {
    /// Driver type as written in definitions
    pub fn kind(&self) -> &'static str {
        match self {
            VolumeDriverOptions::Local(_) => "local",
            VolumeDriverOptions::Nfs(_) => "nfs",
            VolumeDriverOptions::Tmpfs(_) => "tmpfs",
            VolumeDriverOptions::AzureFile(_) => "azurefile",
            VolumeDriverOptions::Rexray(_) => "rexray",
            VolumeDriverOptions::Glusterfs(_) => "glusterfs",
            VolumeDriverOptions::Ceph(_) => "ceph",
            VolumeDriverOptions::DigitalOcean(_) => "digitalocean",
        }
    }

    /// Driver name as the engine knows it
    pub fn engine_driver(&self) -> &'static str {
        match self {
            VolumeDriverOptions::Local(_)
            | VolumeDriverOptions::Nfs(_)
            | VolumeDriverOptions::Tmpfs(_) => "local",
            VolumeDriverOptions::AzureFile(_) => "azure_file",
            VolumeDriverOptions::Rexray(_) => "rexray/ebs",
            VolumeDriverOptions::Glusterfs(_) => "glusterfs",
            VolumeDriverOptions::Ceph(_) => "rexray/rbd",
            VolumeDriverOptions::DigitalOcean(_) => "rexray/dobs",
        }
    }

    /// Parse a driver type and its option map
    pub fn from_options(driver: &str, options: &IndexMap<String, String>) -> Result<Self> {
        let mut reader = OptionReader::new(format!("volume driver '{}'", driver), options);
        let parsed = match driver {
            "local" => VolumeDriverOptions::Local(LocalOptions {
                fs_type: reader.optional("type"),
                device: reader.optional("device"),
                o: reader.optional("o"),
            }),
            "nfs" => VolumeDriverOptions::Nfs(NfsOptions {
                server: reader.required("server")?,
                share: reader.required("share")?,
                options: reader.optional("options"),
            }),
            "tmpfs" => VolumeDriverOptions::Tmpfs(TmpfsOptions {
                size: reader.optional("size"),
                uid: reader.optional("uid"),
            }),
            "azurefile" => VolumeDriverOptions::AzureFile(AzureFileOptions {
                share_name: reader.required("share_name")?,
                storage_account_name: reader.required("storage_account_name")?,
            }),
            "rexray" => VolumeDriverOptions::Rexray(RexrayOptions {
                size: reader.optional("size"),
                volume_type: reader.optional("volumetype"),
                iops: reader.optional("iops"),
            }),
            "glusterfs" => VolumeDriverOptions::Glusterfs(GlusterfsOptions {
                servers: reader.required("servers")?,
                volume: reader.required("volume")?,
            }),
            "ceph" => VolumeDriverOptions::Ceph(CephOptions {
                monitors: reader.required("monitors")?,
                pool: reader.required("pool")?,
                user: reader.optional("user"),
                secret_file: reader.optional("secretfile"),
            }),
            "digitalocean" => VolumeDriverOptions::DigitalOcean(DigitalOceanOptions {
                size: reader.required("size")?,
                region: reader.optional("region"),
            }),
            other => {
                return Err(StackError::shape(
                    "volume driver",
                    format!("unknown driver '{}'", other),
                ))
            }
        };
        reader.finish()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check required options and value formats of this variant
    pub fn validate(&self) -> Result<()> {
        let context = format!("volume driver '{}'", self.kind());
        match self {
            VolumeDriverOptions::Local(_) => {}
            VolumeDriverOptions::Nfs(opts) => {
                require_field(&context, "server", &opts.server)?;
                require_field(&context, "share", &opts.share)?;
                if !opts.share.starts_with('/') {
                    return Err(StackError::shape(
                        "nfs share",
                        format!("'{}' must be an absolute export path", opts.share),
                    ));
                }
            }
            VolumeDriverOptions::Tmpfs(opts) => {
                if let Some(size) = &opts.size {
                    validate_byte_size("tmpfs size", size)?;
                }
                if let Some(uid) = &opts.uid {
                    uid.parse::<u32>().map_err(|_| {
                        StackError::shape("tmpfs uid", format!("'{}' is not a numeric uid", uid))
                    })?;
                }
            }
            VolumeDriverOptions::AzureFile(opts) => {
                require_field(&context, "share_name", &opts.share_name)?;
                require_field(&context, "storage_account_name", &opts.storage_account_name)?;
            }
            VolumeDriverOptions::Rexray(opts) => {
                if let Some(size) = &opts.size {
                    positive_number("rexray size", size)?;
                }
                if let Some(iops) = &opts.iops {
                    positive_number("rexray iops", iops)?;
                }
            }
            VolumeDriverOptions::Glusterfs(opts) => {
                require_field(&context, "servers", &opts.servers)?;
                require_field(&context, "volume", &opts.volume)?;
            }
            VolumeDriverOptions::Ceph(opts) => {
                require_field(&context, "monitors", &opts.monitors)?;
                require_field(&context, "pool", &opts.pool)?;
            }
            VolumeDriverOptions::DigitalOcean(opts) => {
                require_field(&context, "size", &opts.size)?;
                positive_number("digitalocean size", &opts.size)?;
            }
        }
        Ok(())
    }

    /// `driver_opts` as rendered in the manifest
    pub fn engine_options(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        match self {
            VolumeDriverOptions::Local(opts) => {
                push_opt(&mut out, "type", &opts.fs_type);
                push_opt(&mut out, "device", &opts.device);
                push_opt(&mut out, "o", &opts.o);
            }
            VolumeDriverOptions::Nfs(opts) => {
                let mut o = format!("addr={}", opts.server);
                if let Some(extra) = &opts.options {
                    o.push(',');
                    o.push_str(extra);
                }
                out.push(("type", "nfs".to_string()));
                out.push(("o", o));
                out.push(("device", format!(":{}", opts.share)));
            }
            VolumeDriverOptions::Tmpfs(opts) => {
                out.push(("type", "tmpfs".to_string()));
                out.push(("device", "tmpfs".to_string()));
                let o: Vec<String> = [("size", &opts.size), ("uid", &opts.uid)]
                    .into_iter()
                    .filter_map(|(key, value)| value.as_ref().map(|v| format!("{}={}", key, v)))
                    .collect();
                if !o.is_empty() {
                    out.push(("o", o.join(",")));
                }
            }
            VolumeDriverOptions::AzureFile(opts) => {
                out.push(("share_name", opts.share_name.clone()));
                out.push(("storage_account_name", opts.storage_account_name.clone()));
            }
            VolumeDriverOptions::Rexray(opts) => {
                push_opt(&mut out, "size", &opts.size);
                push_opt(&mut out, "volumetype", &opts.volume_type);
                push_opt(&mut out, "iops", &opts.iops);
            }
            VolumeDriverOptions::Glusterfs(opts) => {
                out.push(("voluri", format!("{}:{}", opts.servers, opts.volume)));
            }
            VolumeDriverOptions::Ceph(opts) => {
                out.push(("monitors", opts.monitors.clone()));
                out.push(("pool", opts.pool.clone()));
                push_opt(&mut out, "user", &opts.user);
                push_opt(&mut out, "secretfile", &opts.secret_file);
            }
            VolumeDriverOptions::DigitalOcean(opts) => {
                out.push(("size", opts.size.clone()));
                push_opt(&mut out, "region", &opts.region);
            }
        }
        out
    }

    fn is_default_local(&self) -> bool {
        matches!(self, VolumeDriverOptions::Local(opts) if *opts == LocalOptions::default())
    }
}

fn positive_number(field: &str, value: &str) -> Result<()> {
    match value.parse::<u64>() {
        Ok(n) if n >= 1 => Ok(()),
        Ok(_) => Err(StackError::range(field, "must be at least 1")),
        Err(_) => Err(StackError::shape(
            field,
            format!("'{}' is not a whole number", value),
        )),
    }
}

/// Stack volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    name: String,
    driver: VolumeDriverOptions,
    external: Option<External>,
    labels: IndexMap<String, String>,
    scope: Scope,
    access_mode: AccessMode,
}

impl Named for Volume {
    const KIND: EntityKind = EntityKind::Volume;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Volume {
    /// Create a volume on the default local driver
    pub fn new(name: &str) -> Result<Self> {
        validate_name(EntityKind::Volume, name)?;
        Ok(Self {
            name: name.to_string(),
            driver: VolumeDriverOptions::default(),
            external: None,
            labels: IndexMap::new(),
            scope: Scope::default(),
            access_mode: AccessMode::default(),
        })
    }

    pub fn from_spec(name: &str, spec: &VolumeSpec) -> Result<Self> {
        let mut volume = Self::new(name)?;
        if let Some(external) = &spec.external {
            volume.set_external(external.clone())?;
        }
        if spec.tmpfs {
            if let Some(driver) = spec.driver.as_deref().filter(|d| *d != "tmpfs") {
                return Err(StackError::shape(
                    "tmpfs",
                    format!("tmpfs volumes cannot use driver '{}'", driver),
                ));
            }
            let mut options = spec.driver_opts.clone();
            if let Some(size) = &spec.size {
                if options.insert("size".to_string(), size.clone()).is_some() {
                    return Err(StackError::shape(
                        "size",
                        "set either 'size' or driver_opts.size, not both",
                    ));
                }
            }
            volume.set_driver(VolumeDriverOptions::from_options("tmpfs", &options)?)?;
        } else {
            if spec.size.is_some() {
                return Err(StackError::shape(
                    "size",
                    "'size' only applies to tmpfs volumes",
                ));
            }
            if spec.driver.is_some() || !spec.driver_opts.is_empty() {
                let driver = spec.driver.as_deref().unwrap_or("local");
                volume.set_driver(VolumeDriverOptions::from_options(driver, &spec.driver_opts)?)?;
            }
        }
        for (key, value) in &spec.labels {
            volume.add_label(key, value)?;
        }
        if let Some(scope) = &spec.scope {
            volume.set_scope(Scope::parse(scope)?);
        }
        if let Some(mode) = &spec.access_mode {
            volume.set_access_mode(AccessMode::parse(mode)?);
        }
        Ok(volume)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_driver(&mut self, driver: VolumeDriverOptions) -> Result<()> {
        if self.external().is_some() {
            return Err(StackError::shape(
                "driver",
                format!("volume '{}' is external", self.name),
            ));
        }
        driver.validate()?;
        self.driver = driver;
        Ok(())
    }

    pub fn driver(&self) -> &VolumeDriverOptions {
        &self.driver
    }

    /// Driver settings worth rendering; the bare local driver is implied
    pub fn explicit_driver(&self) -> Option<&VolumeDriverOptions> {
        if self.driver.is_default_local() {
            None
        } else {
            Some(&self.driver)
        }
    }

    pub fn is_tmpfs(&self) -> bool {
        matches!(self.driver, VolumeDriverOptions::Tmpfs(_))
    }

    /// Back the volume with tmpfs of an optional size
    pub fn set_tmpfs(&mut self, size: Option<&str>) -> Result<()> {
        self.set_driver(VolumeDriverOptions::Tmpfs(TmpfsOptions {
            size: size.map(str::to_string),
            uid: None,
        }))
    }

    pub fn set_external(&mut self, external: External) -> Result<()> {
        external.validate()?;
        if external.is_external() && (!self.driver.is_default_local() || !self.labels.is_empty()) {
            return Err(StackError::shape(
                "external",
                format!(
                    "volume '{}' already has driver settings; external volumes cannot carry them",
                    self.name
                ),
            ));
        }
        self.external = Some(external);
        Ok(())
    }

    pub fn external(&self) -> Option<&External> {
        self.external.as_ref().filter(|e| e.is_external())
    }

    pub fn add_label(&mut self, key: &str, value: &str) -> Result<()> {
        if self.external().is_some() {
            return Err(StackError::shape(
                "labels",
                format!("volume '{}' is external", self.name),
            ));
        }
        insert_label(&mut self.labels, key, value)
    }

    pub fn labels(&self) -> &IndexMap<String, String> {
        &self.labels
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn set_access_mode(&mut self, mode: AccessMode) {
        self.access_mode = mode;
    }

    /// Default mode for service mounts of this volume
    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_required_options_per_driver() {
        assert!(matches!(
            VolumeDriverOptions::from_options("nfs", &opts(&[("server", "10.0.0.5")])),
            Err(StackError::MissingField { ref field, .. }) if field == "share"
        ));
        assert!(VolumeDriverOptions::from_options(
            "azurefile",
            &opts(&[("share_name", "media"), ("storage_account_name", "acct")])
        )
        .is_ok());
        assert!(VolumeDriverOptions::from_options("glusterfs", &opts(&[("volume", "gv0")])).is_err());
        assert!(VolumeDriverOptions::from_options("ceph", &opts(&[("monitors", "mon1")])).is_err());
        assert!(matches!(
            VolumeDriverOptions::from_options("digitalocean", &opts(&[("size", "0")])),
            Err(StackError::Range { .. })
        ));
    }

    #[test]
    fn test_foreign_option_rejected() {
        let result = VolumeDriverOptions::from_options(
            "rexray",
            &opts(&[("size", "20"), ("share_name", "media")]),
        );
        assert!(matches!(result, Err(StackError::Shape { .. })));
        assert!(VolumeDriverOptions::from_options("zfs", &IndexMap::new()).is_err());
    }

    #[test]
    fn test_nfs_renders_through_local() {
        let nfs = VolumeDriverOptions::from_options(
            "nfs",
            &opts(&[("server", "10.0.0.5"), ("share", "/exports/data"), ("options", "nfsvers=4")]),
        )
        .unwrap();
        assert_eq!(nfs.engine_driver(), "local");
        assert_eq!(
            nfs.engine_options(),
            vec![
                ("type", "nfs".to_string()),
                ("o", "addr=10.0.0.5,nfsvers=4".to_string()),
                ("device", ":/exports/data".to_string()),
            ]
        );
    }

    #[test]
    fn test_tmpfs_from_spec() {
        let spec = VolumeSpec {
            tmpfs: true,
            size: Some("64m".to_string()),
            ..Default::default()
        };
        let volume = Volume::from_spec("scratch", &spec).unwrap();
        assert!(volume.is_tmpfs());
        assert_eq!(
            volume.driver().engine_options(),
            vec![
                ("type", "tmpfs".to_string()),
                ("device", "tmpfs".to_string()),
                ("o", "size=64m".to_string()),
            ]
        );

        let sized = VolumeSpec {
            size: Some("64m".to_string()),
            ..Default::default()
        };
        assert!(Volume::from_spec("scratch", &sized).is_err());
    }

    #[test]
    fn test_external_excludes_driver() {
        let mut volume = Volume::new("shared").unwrap();
        volume.set_external(External::Flag(true)).unwrap();
        assert!(volume.set_tmpfs(None).is_err());
        assert!(volume.explicit_driver().is_none());
        assert!(matches!(
            volume.add_label("com.example.backup", "daily"),
            Err(StackError::Shape { .. })
        ));
        assert!(volume.labels().is_empty());

        let mut volume = Volume::new("shared").unwrap();
        volume.add_label("com.example.backup", "daily").unwrap();
        assert!(volume.set_external(External::Flag(true)).is_err());
        assert!(volume.external().is_none());
    }

    #[test]
    fn test_access_mode() {
        let spec = VolumeSpec {
            access_mode: Some("ro".to_string()),
            ..Default::default()
        };
        let volume = Volume::from_spec("assets", &spec).unwrap();
        assert_eq!(volume.access_mode(), AccessMode::ReadOnly);

        let bad = VolumeSpec {
            access_mode: Some("rwx".to_string()),
            ..Default::default()
        };
        assert!(Volume::from_spec("assets", &bad).is_err());
    }
}
