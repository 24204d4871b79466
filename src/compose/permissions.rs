//! Octal access modes for mounted config files

use super::config::{ModeSpec, Permission};
use std::fmt;

/// A `{read, write, exec}` subset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}

impl Permissions {
    pub const NONE: Permissions = Permissions {
        read: false,
        write: false,
        exec: false,
    };

    pub fn from_bits(bits: &[Permission]) -> Self {
        let mut perms = Self::NONE;
        for bit in bits {
            match bit {
                Permission::Read => perms.read = true,
                Permission::Write => perms.write = true,
                Permission::Exec => perms.exec = true,
            }
        }
        perms
    }

    /// `read=4 | write=2 | exec=1`
    pub fn digit(&self) -> u8 {
        let mut digit = 0;
        if self.read {
            digit |= 4;
        }
        if self.write {
            digit |= 2;
        }
        if self.exec {
            digit |= 1;
        }
        digit
    }

    /// `rwx`-style triple
    pub fn symbolic(&self) -> String {
        format!(
            "{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.exec { 'x' } else { '-' }
        )
    }
}

/// Owner, group and others permission subsets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileMode {
    pub owner: Permissions,
    pub group: Permissions,
    pub others: Permissions,
}

impl FileMode {
    pub fn new(owner: Permissions, group: Permissions, others: Permissions) -> Self {
        Self {
            owner,
            group,
            others,
        }
    }

    /// Octal string with a leading zero, e.g. `0640`
    pub fn octal(&self) -> String {
        format!(
            "0{}{}{}",
            self.owner.digit(),
            self.group.digit(),
            self.others.digit()
        )
    }

    /// Human-readable form, e.g. `owner=rw- group=r-- others=---`
    pub fn describe(&self) -> String {
        format!(
            "owner={} group={} others={}",
            self.owner.symbolic(),
            self.group.symbolic(),
            self.others.symbolic()
        )
    }
}

impl From<&ModeSpec> for FileMode {
    fn from(spec: &ModeSpec) -> Self {
        Self {
            owner: Permissions::from_bits(&spec.owner),
            group: Permissions::from_bits(&spec.group),
            others: Permissions::from_bits(&spec.others),
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.octal())
    }
}
