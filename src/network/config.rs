//! Network configuration

use crate::compose::common::{insert_label, validate_option_key, External, Scope};
use crate::compose::config::{IpamPoolSpec, IpamSpec, NetworkSpec};
use crate::compose::registry::{validate_name, Named};
use crate::error::{EntityKind, Result, StackError};
use indexmap::IndexMap;
use std::net::{IpAddr, Ipv4Addr};

/// Network driver types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetworkDriver {
    /// Bridge network (default)
    #[default]
    Bridge,
    /// Host network
    Host,
    /// No networking
    None,
    /// Overlay network (for Swarm)
    Overlay,
    /// Macvlan network
    Macvlan,
    /// IPvlan network
    Ipvlan,
}

impl NetworkDriver {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "bridge" => Ok(NetworkDriver::Bridge),
            "host" => Ok(NetworkDriver::Host),
            "none" => Ok(NetworkDriver::None),
            "overlay" => Ok(NetworkDriver::Overlay),
            "macvlan" => Ok(NetworkDriver::Macvlan),
            "ipvlan" => Ok(NetworkDriver::Ipvlan),
            other => Err(StackError::shape(
                "network driver",
                format!("unknown driver '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for NetworkDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkDriver::Bridge => write!(f, "bridge"),
            NetworkDriver::Host => write!(f, "host"),
            NetworkDriver::None => write!(f, "none"),
            NetworkDriver::Overlay => write!(f, "overlay"),
            NetworkDriver::Macvlan => write!(f, "macvlan"),
            NetworkDriver::Ipvlan => write!(f, "ipvlan"),
        }
    }
}

/// Parsed `address/prefix`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    pub address: IpAddr,
    pub prefix: u8,
}

impl Cidr {
    pub fn parse(field: &str, value: &str) -> Result<Self> {
        let (address, prefix) = value.split_once('/').ok_or_else(|| {
            StackError::shape(field, format!("'{}' is not in CIDR form (a.b.c.d/n)", value))
        })?;
        let address: IpAddr = address
            .parse()
            .map_err(|_| StackError::shape(field, format!("'{}' is not an IP address", address)))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| StackError::shape(field, format!("'{}' is not a prefix length", prefix)))?;
        let max = if address.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(StackError::range(
                field,
                format!("prefix /{} exceeds /{}", prefix, max),
            ));
        }
        Ok(Self { address, prefix })
    }

    /// Whether an IPv4 address lies inside this IPv4 block. Mixed families
    /// never match.
    pub fn contains_v4(&self, ip: Ipv4Addr) -> bool {
        match self.address {
            IpAddr::V4(base) => {
                let mask = if self.prefix == 0 {
                    0
                } else {
                    u32::MAX << (32 - u32::from(self.prefix))
                };
                u32::from(base) & mask == u32::from(ip) & mask
            }
            IpAddr::V6(_) => false,
        }
    }
}

fn parse_ip(field: &str, value: &str) -> Result<IpAddr> {
    value
        .parse()
        .map_err(|_| StackError::shape(field, format!("'{}' is not an IP address", value)))
}

/// IPAM pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpamPool {
    subnet: String,
    gateway: Option<String>,
    ip_range: Option<String>,
    aux_addresses: IndexMap<String, String>,
}

impl IpamPool {
    pub fn new(subnet: &str) -> Result<Self> {
        Cidr::parse("ipam subnet", subnet)?;
        Ok(Self {
            subnet: subnet.to_string(),
            gateway: None,
            ip_range: None,
            aux_addresses: IndexMap::new(),
        })
    }

    /// Set gateway; an IPv4 gateway must lie inside the subnet
    pub fn gateway(mut self, gateway: &str) -> Result<Self> {
        let ip = parse_ip("ipam gateway", gateway)?;
        let subnet = Cidr::parse("ipam subnet", &self.subnet)?;
        if let (IpAddr::V4(v4), IpAddr::V4(_)) = (ip, subnet.address) {
            if !subnet.contains_v4(v4) {
                return Err(StackError::range(
                    "ipam gateway",
                    format!("{} is outside subnet {}", gateway, self.subnet),
                ));
            }
        }
        self.gateway = Some(gateway.to_string());
        Ok(self)
    }

    pub fn ip_range(mut self, range: &str) -> Result<Self> {
        Cidr::parse("ipam ip_range", range)?;
        self.ip_range = Some(range.to_string());
        Ok(self)
    }

    pub fn aux_address(mut self, host: &str, address: &str) -> Result<Self> {
        validate_option_key("ipam aux_addresses", host)?;
        parse_ip("ipam aux_addresses", address)?;
        self.aux_addresses
            .insert(host.to_string(), address.to_string());
        Ok(self)
    }

    fn from_spec(spec: &IpamPoolSpec) -> Result<Self> {
        let subnet = spec
            .subnet
            .as_deref()
            .ok_or_else(|| StackError::missing("ipam config", "subnet"))?;
        let mut pool = Self::new(subnet)?;
        if let Some(gateway) = &spec.gateway {
            pool = pool.gateway(gateway)?;
        }
        if let Some(range) = &spec.ip_range {
            pool = pool.ip_range(range)?;
        }
        for (host, address) in &spec.aux_addresses {
            pool = pool.aux_address(host, address)?;
        }
        Ok(pool)
    }

    pub fn subnet(&self) -> &str {
        &self.subnet
    }

    pub fn gateway_address(&self) -> Option<&str> {
        self.gateway.as_deref()
    }

    pub fn ip_range_value(&self) -> Option<&str> {
        self.ip_range.as_deref()
    }

    pub fn aux_addresses(&self) -> &IndexMap<String, String> {
        &self.aux_addresses
    }
}

/// IPAM configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ipam {
    driver: Option<String>,
    pools: Vec<IpamPool>,
}

impl Ipam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver(mut self, driver: &str) -> Result<Self> {
        if driver.trim().is_empty() {
            return Err(StackError::missing("ipam", "driver"));
        }
        self.driver = Some(driver.to_string());
        Ok(self)
    }

    pub fn pool(mut self, pool: IpamPool) -> Result<Self> {
        if self.pools.iter().any(|p| p.subnet == pool.subnet) {
            return Err(StackError::shape(
                "ipam config",
                format!("subnet {} listed twice", pool.subnet),
            ));
        }
        self.pools.push(pool);
        Ok(self)
    }

    fn from_spec(spec: &IpamSpec) -> Result<Self> {
        let mut ipam = Self::new();
        if let Some(driver) = &spec.driver {
            ipam = ipam.driver(driver)?;
        }
        for pool in &spec.config {
            ipam = ipam.pool(IpamPool::from_spec(pool)?)?;
        }
        Ok(ipam)
    }

    pub fn driver_name(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    pub fn pools(&self) -> &[IpamPool] {
        &self.pools
    }

    pub fn is_empty(&self) -> bool {
        self.driver.is_none() && self.pools.is_empty()
    }
}

/// Stack network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    name: String,
    driver: NetworkDriver,
    driver_opts: IndexMap<String, String>,
    ipam: Option<Ipam>,
    internal: Option<bool>,
    attachable: Option<bool>,
    enable_ipv6: Option<bool>,
    external: Option<External>,
    labels: IndexMap<String, String>,
    scope: Scope,
}

impl Named for Network {
    const KIND: EntityKind = EntityKind::Network;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Network {
    /// Create a bridge network
    pub fn new(name: &str) -> Result<Self> {
        validate_name(EntityKind::Network, name)?;
        Ok(Self {
            name: name.to_string(),
            driver: NetworkDriver::default(),
            driver_opts: IndexMap::new(),
            ipam: None,
            internal: None,
            attachable: None,
            enable_ipv6: None,
            external: None,
            labels: IndexMap::new(),
            scope: Scope::default(),
        })
    }

    pub fn from_spec(name: &str, spec: &NetworkSpec) -> Result<Self> {
        let mut network = Self::new(name)?;
        if let Some(external) = &spec.external {
            network.set_external(external.clone())?;
        }
        if let Some(driver) = &spec.driver {
            network.set_driver(NetworkDriver::parse(driver)?)?;
        }
        for (key, value) in &spec.driver_opts {
            network.set_driver_opt(key, value)?;
        }
        if let Some(ipam) = &spec.ipam {
            network.set_ipam(Ipam::from_spec(ipam)?)?;
        }
        if let Some(internal) = spec.internal {
            network.set_internal(internal)?;
        }
        if let Some(attachable) = spec.attachable {
            network.set_attachable(attachable)?;
        }
        if let Some(enable_ipv6) = spec.enable_ipv6 {
            network.set_enable_ipv6(enable_ipv6)?;
        }
        for (key, value) in &spec.labels {
            network.add_label(key, value)?;
        }
        if let Some(scope) = &spec.scope {
            network.set_scope(Scope::parse(scope)?);
        }
        Ok(network)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_driver(&mut self, driver: NetworkDriver) -> Result<()> {
        self.reject_if_external("driver")?;
        self.driver = driver;
        Ok(())
    }

    pub fn driver(&self) -> NetworkDriver {
        self.driver
    }

    pub fn set_driver_opt(&mut self, key: &str, value: &str) -> Result<()> {
        self.reject_if_external("driver_opts")?;
        validate_option_key("driver_opts", key)?;
        self.driver_opts.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn driver_opts(&self) -> &IndexMap<String, String> {
        &self.driver_opts
    }

    pub fn set_ipam(&mut self, ipam: Ipam) -> Result<()> {
        self.reject_if_external("ipam")?;
        self.ipam = Some(ipam);
        Ok(())
    }

    pub fn ipam(&self) -> Option<&Ipam> {
        self.ipam.as_ref().filter(|ipam| !ipam.is_empty())
    }

    pub fn set_internal(&mut self, internal: bool) -> Result<()> {
        self.reject_if_external("internal")?;
        self.internal = Some(internal);
        Ok(())
    }

    pub fn internal(&self) -> Option<bool> {
        self.internal
    }

    pub fn set_attachable(&mut self, attachable: bool) -> Result<()> {
        self.reject_if_external("attachable")?;
        self.attachable = Some(attachable);
        Ok(())
    }

    pub fn attachable(&self) -> Option<bool> {
        self.attachable
    }

    pub fn set_enable_ipv6(&mut self, enable_ipv6: bool) -> Result<()> {
        self.reject_if_external("enable_ipv6")?;
        self.enable_ipv6 = Some(enable_ipv6);
        Ok(())
    }

    pub fn enable_ipv6(&self) -> Option<bool> {
        self.enable_ipv6
    }

    /// Mark the network as managed outside the stack. External networks
    /// render only their name, so they cannot carry any other setting.
    pub fn set_external(&mut self, external: External) -> Result<()> {
        external.validate()?;
        if external.is_external()
            && (!self.driver_opts.is_empty()
                || self.ipam.is_some()
                || self.driver != NetworkDriver::default()
                || self.internal.is_some()
                || self.attachable.is_some()
                || self.enable_ipv6.is_some()
                || !self.labels.is_empty())
        {
            return Err(StackError::shape(
                "external",
                format!(
                    "network '{}' already has driver settings; external networks cannot carry them",
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
        self.reject_if_external("labels")?;
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

    fn reject_if_external(&self, field: &str) -> Result<()> {
        if self.external().is_some() {
            return Err(StackError::shape(
                field,
                format!("network '{}' is external", self.name),
            ));
        }
        Ok(())
    }
}
