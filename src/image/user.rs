//! Build and service users
//!
//! A [`UserSpec`] names the account a stage switches to. Existence checks are
//! opt-in; when any is requested the bootstrap `RUN` branches on the base
//! image's package tooling (BusyBox `addgroup`/`adduser` on Alpine, shadow
//! `groupadd`/`useradd` elsewhere).

use super::instruction::BuildInstruction;
use crate::error::{Result, StackError};
use regex::Regex;
use std::sync::LazyLock;

static ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9_.-]*$").expect("valid account regex"));

const ALPINE_CHECK: &str = "if command -v apk >/dev/null 2>&1; then";

fn validate_account(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StackError::missing(field, "name"));
    }
    if !ACCOUNT_RE.is_match(value) {
        return Err(StackError::shape(
            field,
            format!("'{}' is not a valid account name", value),
        ));
    }
    Ok(())
}

/// User a stage runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpec {
    name: String,
    group: Option<String>,
    ensure_group: bool,
    ensure_user: bool,
    assign_group: bool,
}

impl UserSpec {
    pub fn new(name: &str) -> Result<Self> {
        validate_account("user", name)?;
        Ok(Self {
            name: name.to_string(),
            group: None,
            ensure_group: false,
            ensure_user: false,
            assign_group: false,
        })
    }

    pub fn with_group(mut self, group: &str) -> Result<Self> {
        validate_account("group", group)?;
        self.group = Some(group.to_string());
        Ok(self)
    }

    /// Create the group if it is missing
    pub fn ensure_group(mut self) -> Result<Self> {
        self.require_group("ensure_group")?;
        self.ensure_group = true;
        Ok(self)
    }

    /// Create the user if it is missing
    pub fn ensure_user(mut self) -> Self {
        self.ensure_user = true;
        self
    }

    /// Add the user to the group
    pub fn assign_group(mut self) -> Result<Self> {
        self.require_group("assign_group")?;
        self.assign_group = true;
        Ok(self)
    }

    fn require_group(&self, flag: &str) -> Result<()> {
        if self.group.is_none() {
            return Err(StackError::missing(format!("user '{}' {}", self.name, flag), "group"));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Whether any existence check was requested
    pub fn needs_detection(&self) -> bool {
        self.ensure_group || self.ensure_user || self.assign_group
    }

    /// `user:group` or `user`, as used by chown
    pub fn owner(&self) -> String {
        match &self.group {
            Some(group) => format!("{}:{}", self.name, group),
            None => self.name.clone(),
        }
    }

    /// `USER` switch
    pub fn switch(&self) -> BuildInstruction {
        BuildInstruction::User {
            user: self.name.clone(),
            group: self.group.clone(),
        }
    }

    /// OS-detecting bootstrap, if any check was requested
    pub fn bootstrap(&self) -> Option<BuildInstruction> {
        if !self.needs_detection() {
            return None;
        }
        let mut lines = vec![ALPINE_CHECK.to_string()];
        push_branch(&mut lines, self.alpine_steps());
        lines.push("else".to_string());
        push_branch(&mut lines, self.debian_steps());
        lines.push("fi".to_string());
        Some(BuildInstruction::Run { lines })
    }

    fn alpine_steps(&self) -> Vec<String> {
        let user = &self.name;
        let mut steps = Vec::new();
        if let (true, Some(group)) = (self.ensure_group, &self.group) {
            steps.push(format!("({} || addgroup -S {})", group_exists(group), group));
        }
        if self.ensure_user {
            let adduser = match &self.group {
                Some(group) => format!("adduser -S -D -G {} {}", group, user),
                None => format!("adduser -S -D {}", user),
            };
            steps.push(format!("({} || {})", user_exists(user), adduser));
        }
        if let (true, Some(group)) = (self.assign_group, &self.group) {
            steps.push(format!("addgroup {} {}", user, group));
        }
        steps
    }

    fn debian_steps(&self) -> Vec<String> {
        let user = &self.name;
        let mut steps = Vec::new();
        if let (true, Some(group)) = (self.ensure_group, &self.group) {
            steps.push(format!("({} || groupadd -r {})", group_exists(group), group));
        }
        if self.ensure_user {
            let useradd = match &self.group {
                Some(group) => format!("useradd -r -m -g {} {}", group, user),
                None => format!("useradd -r -m {}", user),
            };
            steps.push(format!("({} || {})", user_exists(user), useradd));
        }
        if let (true, Some(group)) = (self.assign_group, &self.group) {
            steps.push(format!("usermod -aG {} {}", group, user));
        }
        steps
    }
}

fn group_exists(group: &str) -> String {
    format!("grep -q '^{}:' /etc/group", group)
}

fn user_exists(user: &str) -> String {
    format!("id -u {} >/dev/null 2>&1", user)
}

fn push_branch(lines: &mut Vec<String>, steps: Vec<String>) {
    let last = steps.len().saturating_sub(1);
    for (i, step) in steps.into_iter().enumerate() {
        let sep = if i == last { ";" } else { " &&" };
        lines.push(format!("  {}{}", step, sep));
    }
}
