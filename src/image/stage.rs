//! Build stages
//!
//! A [`Stage`] collects instruction groups through validated setters and
//! renders them in a fixed order, regardless of the order the setters were
//! called in:
//!
//! 1. global arguments, `FROM`
//! 2. user bootstrap, local arguments, environment
//! 3. exposed ports, volumes, working directory, copies
//! 4. pre-command macros, `RUN` commands, ownership fix, service user
//! 5. post-command macros, `ENTRYPOINT`, `CMD`

use super::instruction::{BuildInstruction, Protocol};
use super::macros::{Macro, MacroPhase};
use super::user::UserSpec;
use crate::command::Command;
use crate::compose::common::{validate_container_path, validate_env_key, validate_token};
use crate::compose::registry::{validate_name, Named};
use crate::error::{EntityKind, Result, StackError};
use crate::render::RenderState;
use indexmap::IndexMap;

/// One `COPY`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCopy {
    src: Vec<String>,
    dest: String,
    from: Option<String>,
    chown: Option<String>,
}

impl FileCopy {
    pub fn new<I, S>(src: I, dest: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let src: Vec<String> = src.into_iter().map(Into::into).collect();
        if src.is_empty() {
            return Err(StackError::missing("copy", "src"));
        }
        for path in &src {
            validate_token("copy src", path)?;
        }
        validate_token("copy dest", dest)?;
        Ok(Self {
            src,
            dest: dest.to_string(),
            from: None,
            chown: None,
        })
    }

    /// Copy out of an earlier stage or image
    pub fn from_stage(mut self, stage: &str) -> Result<Self> {
        validate_token("copy from", stage)?;
        self.from = Some(stage.to_string());
        Ok(self)
    }

    pub fn chown(mut self, owner: &str) -> Result<Self> {
        validate_token("copy chown", owner)?;
        self.chown = Some(owner.to_string());
        Ok(self)
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    fn instruction(&self) -> BuildInstruction {
        BuildInstruction::Copy {
            src: self.src.clone(),
            dest: self.dest.clone(),
            from: self.from.clone(),
            chown: self.chown.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BaseImage {
    image: String,
    alias: Option<String>,
}

/// One stage of a multi-stage build
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    base: bool,
    global_args: IndexMap<String, Option<String>>,
    from: Option<BaseImage>,
    build_user: Option<UserSpec>,
    service_user: Option<UserSpec>,
    args: IndexMap<String, Option<String>>,
    env: IndexMap<String, String>,
    expose: Vec<(u16, Protocol)>,
    volumes: Vec<String>,
    workdir: Option<String>,
    copies: Vec<FileCopy>,
    runs: Vec<String>,
    macros: Vec<Macro>,
    entrypoint: Option<Command>,
    cmd: Option<Command>,
    render_state: RenderState,
}

impl Named for Stage {
    const KIND: EntityKind = EntityKind::Stage;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Stage {
    pub fn new(name: &str) -> Result<Self> {
        validate_name(EntityKind::Stage, name)?;
        Ok(Self {
            name: name.to_string(),
            base: false,
            global_args: IndexMap::new(),
            from: None,
            build_user: None,
            service_user: None,
            args: IndexMap::new(),
            env: IndexMap::new(),
            expose: Vec::new(),
            volumes: Vec::new(),
            workdir: None,
            copies: Vec::new(),
            runs: Vec::new(),
            macros: Vec::new(),
            entrypoint: None,
            cmd: None,
            render_state: RenderState::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base stages are only built upon, so they may omit ENTRYPOINT and CMD
    pub fn base(&mut self, base: bool) -> &mut Self {
        self.base = base;
        self
    }

    pub fn is_base(&self) -> bool {
        self.base
    }

    /// `ARG` emitted before `FROM`
    pub fn arg_before_from(&mut self, name: &str, default: Option<&str>) -> Result<&mut Self> {
        validate_env_key(name)?;
        default.map(|d| single_line("arg", d)).transpose()?;
        self.global_args
            .insert(name.to_string(), default.map(str::to_string));
        Ok(self)
    }

    pub fn from_image(&mut self, image: &str) -> Result<&mut Self> {
        self.set_from(image, None)
    }

    pub fn from_image_as(&mut self, image: &str, alias: &str) -> Result<&mut Self> {
        validate_name(EntityKind::Stage, alias)?;
        self.set_from(image, Some(alias))
    }

    fn set_from(&mut self, image: &str, alias: Option<&str>) -> Result<&mut Self> {
        validate_token("from", image)?;
        if self.from.is_some() {
            return Err(StackError::duplicate(
                EntityKind::Instruction,
                format!("FROM in stage '{}'", self.name),
            ));
        }
        self.from = Some(BaseImage {
            image: image.to_string(),
            alias: alias.map(str::to_string),
        });
        Ok(self)
    }

    /// User the build commands run as
    pub fn build_user(&mut self, user: UserSpec) -> &mut Self {
        self.build_user = Some(user);
        self
    }

    /// User the container runs as; files are chowned to it
    pub fn service_user(&mut self, user: UserSpec) -> &mut Self {
        self.service_user = Some(user);
        self
    }

    /// `ARG` emitted after `FROM`
    pub fn arg(&mut self, name: &str, default: Option<&str>) -> Result<&mut Self> {
        validate_env_key(name)?;
        default.map(|d| single_line("arg", d)).transpose()?;
        self.args.insert(name.to_string(), default.map(str::to_string));
        Ok(self)
    }

    pub fn env(&mut self, key: &str, value: &str) -> Result<&mut Self> {
        validate_env_key(key)?;
        single_line("env", value)?;
        self.env.insert(key.to_string(), value.to_string());
        Ok(self)
    }

    pub fn expose(&mut self, port: u32) -> Result<&mut Self> {
        self.expose_with(port, Protocol::Tcp)
    }

    pub fn expose_with(&mut self, port: u32, protocol: Protocol) -> Result<&mut Self> {
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| StackError::range("expose", format!("port {} is outside 1-65535", port)))?;
        if !self.expose.contains(&(port, protocol)) {
            self.expose.push((port, protocol));
        }
        Ok(self)
    }

    pub fn volume(&mut self, path: &str) -> Result<&mut Self> {
        validate_container_path("volume", path)?;
        single_line("volume", path)?;
        if !self.volumes.iter().any(|v| v == path) {
            self.volumes.push(path.to_string());
        }
        Ok(self)
    }

    pub fn workdir(&mut self, path: &str) -> Result<&mut Self> {
        validate_container_path("workdir", path)?;
        single_line("workdir", path)?;
        self.workdir = Some(path.to_string());
        Ok(self)
    }

    pub fn copy(&mut self, copy: FileCopy) -> &mut Self {
        self.copies.push(copy);
        self
    }

    pub fn run(&mut self, command: &str) -> Result<&mut Self> {
        if command.trim().is_empty() {
            return Err(StackError::missing("run", "command"));
        }
        single_line("run", command)?;
        self.runs.push(command.to_string());
        Ok(self)
    }

    /// Add a predefined macro; each kind at most once
    pub fn predefined(&mut self, command: Macro) -> Result<&mut Self> {
        command.validate()?;
        if self.macros.iter().any(|m| m.kind() == command.kind()) {
            return Err(StackError::duplicate(
                EntityKind::Instruction,
                format!("{} macro in stage '{}'", command.kind(), self.name),
            ));
        }
        self.macros.push(command);
        Ok(self)
    }

    pub fn entrypoint(&mut self, command: impl Into<Command>) -> Result<&mut Self> {
        let command = command.into();
        command.validate("entrypoint")?;
        shell_single_line("entrypoint", &command)?;
        if self.entrypoint.is_some() {
            return Err(StackError::duplicate(
                EntityKind::Instruction,
                format!("ENTRYPOINT in stage '{}'", self.name),
            ));
        }
        self.entrypoint = Some(command);
        Ok(self)
    }

    pub fn cmd(&mut self, command: impl Into<Command>) -> Result<&mut Self> {
        let command = command.into();
        command.validate("cmd")?;
        shell_single_line("cmd", &command)?;
        if self.cmd.is_some() {
            return Err(StackError::duplicate(
                EntityKind::Instruction,
                format!("CMD in stage '{}'", self.name),
            ));
        }
        self.cmd = Some(command);
        Ok(self)
    }

    /// Instruction sequence in emission order
    pub fn instructions(&self) -> Result<Vec<BuildInstruction>> {
        let from = self
            .from
            .as_ref()
            .ok_or_else(|| StackError::missing(format!("stage '{}'", self.name), "from"))?;
        if !self.base && self.entrypoint.is_none() && self.cmd.is_none() {
            return Err(StackError::State(format!(
                "stage '{}' has neither an entrypoint nor a command",
                self.name
            )));
        }

        let mut out = Vec::new();
        out.extend(arg_instructions(&self.global_args));
        out.push(BuildInstruction::From {
            image: from.image.clone(),
            alias: from.alias.clone(),
        });

        out.extend(self.build_user.iter().filter_map(UserSpec::bootstrap));
        out.extend(self.service_user.iter().filter_map(UserSpec::bootstrap));
        if let Some(user) = &self.build_user {
            out.push(user.switch());
        }

        out.extend(arg_instructions(&self.args));
        out.extend(self.env.iter().map(|(key, value)| BuildInstruction::Env {
            key: key.clone(),
            value: value.clone(),
        }));
        out.extend(
            self.expose
                .iter()
                .map(|&(port, protocol)| BuildInstruction::Expose { port, protocol }),
        );
        if !self.volumes.is_empty() {
            out.push(BuildInstruction::Volume {
                paths: self.volumes.clone(),
            });
        }
        if let Some(path) = &self.workdir {
            out.push(BuildInstruction::Workdir { path: path.clone() });
        }
        out.extend(self.copies.iter().map(FileCopy::instruction));

        out.extend(self.macro_runs(MacroPhase::BeforeCommands));
        out.extend(self.runs.iter().map(BuildInstruction::run));

        if let Some(user) = &self.service_user {
            let targets = self.ownership_targets();
            if !targets.is_empty() {
                if self.build_user.is_some() {
                    out.push(BuildInstruction::User {
                        user: "root".to_string(),
                        group: None,
                    });
                }
                out.push(BuildInstruction::run(format!(
                    "chown -R {} {}",
                    user.owner(),
                    targets.join(" ")
                )));
            }
            out.push(user.switch());
        }

        out.extend(self.macro_runs(MacroPhase::AfterCommands));
        if let Some(command) = &self.entrypoint {
            out.push(BuildInstruction::Entrypoint(command.clone()));
        }
        if let Some(command) = &self.cmd {
            out.push(BuildInstruction::Cmd(command.clone()));
        }
        Ok(out)
    }

    /// Render the stage as build-script text
    pub fn render(&self) -> Result<String> {
        let _guard = self
            .render_state
            .begin(&format!("stage '{}'", self.name))?;
        let instructions = self.instructions()?;
        let mut out = String::new();
        for instruction in &instructions {
            out.push_str(&instruction.to_string());
            out.push('\n');
        }
        tracing::debug!(
            "Rendered stage {} ({} instructions)",
            self.name,
            instructions.len()
        );
        Ok(out)
    }

    fn macro_runs(&self, phase: MacroPhase) -> impl Iterator<Item = BuildInstruction> + '_ {
        self.macros
            .iter()
            .filter(move |m| m.phase() == phase)
            .map(|m| BuildInstruction::run(m.command()))
    }

    fn ownership_targets(&self) -> Vec<String> {
        if let Some(workdir) = &self.workdir {
            return vec![workdir.clone()];
        }
        let mut targets: Vec<String> = Vec::new();
        for copy in &self.copies {
            if !targets.iter().any(|t| t == copy.dest()) {
                targets.push(copy.dest().to_string());
            }
        }
        targets
    }
}

/// Each instruction is one script line; exec arrays are JSON-escaped instead
fn single_line(field: &str, value: &str) -> Result<()> {
    if value.chars().any(char::is_control) {
        return Err(StackError::shape(
            field,
            format!("{:?} must not contain line breaks or control characters", value),
        ));
    }
    Ok(())
}

fn shell_single_line(field: &str, command: &Command) -> Result<()> {
    match command {
        Command::Shell(cmd) => single_line(field, cmd),
        Command::Exec(_) => Ok(()),
    }
}

fn arg_instructions(
    args: &IndexMap<String, Option<String>>,
) -> impl Iterator<Item = BuildInstruction> + '_ {
    args.iter().map(|(name, default)| BuildInstruction::Arg {
        name: name.clone(),
        default: default.clone(),
    })
}
