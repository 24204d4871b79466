//! Predefined package-manager macros
//!
//! Macros expand to fixed `RUN` commands from a static table. A version pin
//! runs before the stage's own commands, a dependency install after them.

use crate::error::{Result, StackError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Semver or dist-tag such as `9.1.0`, `1.22.22` or `latest`
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z][0-9A-Za-z.+-]*$").expect("valid version regex"));

/// Supported package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageManager::Npm => write!(f, "npm"),
            PackageManager::Yarn => write!(f, "yarn"),
            PackageManager::Pnpm => write!(f, "pnpm"),
        }
    }
}

/// Install command and its production-only flag
struct InstallFlags {
    manager: PackageManager,
    command: &'static str,
    production: &'static str,
}

const INSTALL_TABLE: &[InstallFlags] = &[
    InstallFlags {
        manager: PackageManager::Npm,
        command: "npm ci --no-audit --no-fund",
        production: "--omit=dev",
    },
    InstallFlags {
        manager: PackageManager::Yarn,
        command: "yarn install --frozen-lockfile --non-interactive",
        production: "--production",
    },
    InstallFlags {
        manager: PackageManager::Pnpm,
        command: "pnpm install --frozen-lockfile",
        production: "--prod",
    },
];

/// When a macro runs relative to the stage's own commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroPhase {
    BeforeCommands,
    AfterCommands,
}

/// Predefined command macro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "macro", rename_all = "snake_case", deny_unknown_fields)]
pub enum Macro {
    /// Pin the package manager to a version
    PinVersion {
        manager: PackageManager,
        version: String,
    },
    /// Install dependencies from the lockfile
    Install {
        manager: PackageManager,
        #[serde(default)]
        production: bool,
    },
}

impl Macro {
    /// Name used in duplicate errors
    pub fn kind(&self) -> &'static str {
        match self {
            Macro::PinVersion { .. } => "pin_version",
            Macro::Install { .. } => "install",
        }
    }

    pub fn phase(&self) -> MacroPhase {
        match self {
            Macro::PinVersion { .. } => MacroPhase::BeforeCommands,
            Macro::Install { .. } => MacroPhase::AfterCommands,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Macro::PinVersion { version, .. } = self {
            if version.is_empty() {
                return Err(StackError::missing("pin_version macro", "version"));
            }
            if !VERSION_RE.is_match(version) {
                return Err(StackError::shape(
                    "pin_version macro",
                    format!("'{}' is not a version", version),
                ));
            }
        }
        Ok(())
    }

    /// Shell command the macro expands to
    pub fn command(&self) -> String {
        match self {
            Macro::PinVersion {
                manager: PackageManager::Npm,
                version,
            } => format!("npm install --global npm@{}", version),
            Macro::PinVersion { manager, version } => format!(
                "corepack enable && corepack prepare {}@{} --activate",
                manager, version
            ),
            Macro::Install {
                manager,
                production,
            } => {
                let flags = INSTALL_TABLE
                    .iter()
                    .find(|entry| entry.manager == *manager)
                    .map(|entry| (entry.command, entry.production));
                match (flags, production) {
                    (Some((command, flag)), true) => format!("{} {}", command, flag),
                    (Some((command, _)), false) => command.to_string(),
                    (None, _) => format!("{} install", manager),
                }
            }
        }
    }
}
