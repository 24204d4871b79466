//! Build definition documents
//!
//! A build definition is a YAML document with an ordered `stages` map. Each
//! entry goes through the same [`Stage`] setters as programmatic use.

use super::instruction::Protocol;
use super::macros::Macro;
use super::stage::{FileCopy, Stage};
use super::template::Template;
use super::user::UserSpec;
use crate::command::Command;
use crate::error::{Result, StackError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default build definition file names
pub const DEFAULT_BUILD_FILES: &[&str] = &["build.yaml", "build.yml"];

/// Top-level build definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDefinition {
    #[serde(default)]
    pub stages: IndexMap<String, StageDefinition>,
}

/// One stage entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageDefinition {
    pub from: Option<String>,
    pub alias: Option<String>,
    #[serde(default)]
    pub base: bool,
    #[serde(default)]
    pub global_args: IndexMap<String, Option<String>>,
    #[serde(default)]
    pub args: IndexMap<String, Option<String>>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default)]
    pub expose: Vec<ExposeSpec>,
    #[serde(default)]
    pub volumes: Vec<String>,
    pub workdir: Option<String>,
    #[serde(default)]
    pub copy: Vec<CopyDefinition>,
    #[serde(default)]
    pub run: Vec<String>,
    #[serde(default)]
    pub macros: Vec<Macro>,
    pub build_user: Option<UserDefinition>,
    pub service_user: Option<UserDefinition>,
    pub entrypoint: Option<Command>,
    pub cmd: Option<Command>,
}

/// Exposed port: `3000` or `{ port: 53, protocol: udp }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExposeSpec {
    Port(u32),
    Detailed {
        port: u32,
        #[serde(default)]
        protocol: Protocol,
    },
}

/// Copy source list: a single path or several
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CopySource {
    One(String),
    Many(Vec<String>),
}

impl CopySource {
    fn paths(&self) -> Vec<String> {
        match self {
            CopySource::One(path) => vec![path.clone()],
            CopySource::Many(paths) => paths.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyDefinition {
    pub src: CopySource,
    pub dest: String,
    pub from: Option<String>,
    pub chown: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserDefinition {
    pub name: String,
    pub group: Option<String>,
    #[serde(default)]
    pub ensure_group: bool,
    #[serde(default)]
    pub ensure_user: bool,
    #[serde(default)]
    pub assign_group: bool,
}

impl UserDefinition {
    fn to_spec(&self) -> Result<UserSpec> {
        let mut user = UserSpec::new(&self.name)?;
        if let Some(group) = &self.group {
            user = user.with_group(group)?;
        }
        if self.ensure_group {
            user = user.ensure_group()?;
        }
        if self.ensure_user {
            user = user.ensure_user();
        }
        if self.assign_group {
            user = user.assign_group()?;
        }
        Ok(user)
    }
}

impl StageDefinition {
    /// Apply every field to `stage` through its setters
    pub fn apply(&self, stage: &mut Stage) -> Result<()> {
        stage.base(self.base);
        for (name, default) in &self.global_args {
            stage.arg_before_from(name, default.as_deref())?;
        }
        match (&self.from, &self.alias) {
            (Some(image), Some(alias)) => {
                stage.from_image_as(image, alias)?;
            }
            (Some(image), None) => {
                stage.from_image(image)?;
            }
            (None, Some(_)) => {
                return Err(StackError::missing(format!("stage '{}'", stage.name()), "from"));
            }
            (None, None) => {}
        }
        if let Some(user) = &self.build_user {
            stage.build_user(user.to_spec()?);
        }
        if let Some(user) = &self.service_user {
            stage.service_user(user.to_spec()?);
        }
        for (name, default) in &self.args {
            stage.arg(name, default.as_deref())?;
        }
        for (key, value) in &self.env {
            stage.env(key, value)?;
        }
        for expose in &self.expose {
            match *expose {
                ExposeSpec::Port(port) => stage.expose(port)?,
                ExposeSpec::Detailed { port, protocol } => stage.expose_with(port, protocol)?,
            };
        }
        for path in &self.volumes {
            stage.volume(path)?;
        }
        if let Some(path) = &self.workdir {
            stage.workdir(path)?;
        }
        for copy in &self.copy {
            let mut file_copy = FileCopy::new(copy.src.paths(), &copy.dest)?;
            if let Some(from) = &copy.from {
                file_copy = file_copy.from_stage(from)?;
            }
            if let Some(owner) = &copy.chown {
                file_copy = file_copy.chown(owner)?;
            }
            stage.copy(file_copy);
        }
        for command in &self.run {
            stage.run(command)?;
        }
        for command in &self.macros {
            stage.predefined(command.clone())?;
        }
        if let Some(command) = &self.entrypoint {
            stage.entrypoint(command.clone())?;
        }
        if let Some(command) = &self.cmd {
            stage.cmd(command.clone())?;
        }
        Ok(())
    }
}

/// Build definition parser
pub struct TemplateParser;

impl TemplateParser {
    /// Find a build definition in `dir`
    pub fn find_build_file(dir: &Path) -> Option<PathBuf> {
        DEFAULT_BUILD_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    pub fn parse_file(path: &Path) -> Result<BuildDefinition> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Parsing build definition {}", path.display());
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> Result<BuildDefinition> {
        serde_yaml::from_str(content)
            .map_err(|e| StackError::shape("build definition", e.to_string()))
    }

    /// Build a template; stages keep their document order
    pub fn build(definition: &BuildDefinition) -> Result<Template> {
        let mut template = Template::new();
        for (name, stage_definition) in &definition.stages {
            let mut stage = Stage::new(name)?;
            stage_definition.apply(&mut stage)?;
            template.insert(stage)?;
        }
        Ok(template)
    }

    pub fn load(path: &Path) -> Result<Template> {
        Self::build(&Self::parse_file(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityKind;

    const NODE_APP: &str = r#"
stages:
  deps:
    base: true
    from: node:18-alpine
    alias: deps
    workdir: /app
    copy:
      - src: [package.json, yarn.lock]
        dest: ./
    macros:
      - macro: pin_version
        manager: yarn
        version: "1.22.22"
      - macro: install
        manager: yarn
        production: true
  runtime:
    global_args:
      NODE_TAG: "18"
    from: node:${NODE_TAG}-alpine
    env:
      PORT: "3000"
    expose:
      - 3000
      - port: 9229
        protocol: udp
    workdir: /app
    copy:
      - src: /app/node_modules
        dest: ./node_modules
        from: deps
      - src: .
        dest: .
    service_user:
      name: app
      group: app
      ensure_group: true
      ensure_user: true
    cmd: ["node", "index.js"]
"#;

    #[test]
    fn test_parse_and_build() {
        let definition = TemplateParser::parse_str(NODE_APP).unwrap();
        let template = TemplateParser::build(&definition).unwrap();
        let names: Vec<&str> = template.stages().map(|s| s.name()).collect();
        assert_eq!(names, vec!["deps", "runtime"]);
        assert!(template.stage("deps").unwrap().is_base());

        let script = template.render().unwrap();
        assert!(script.contains(
            "FROM node:18-alpine AS deps\n\
WORKDIR /app\n\
COPY package.json yarn.lock ./\n\
RUN corepack enable && corepack prepare yarn@1.22.22 --activate\n\
RUN yarn install --frozen-lockfile --non-interactive --production\n"
        ));
        assert!(script.contains("ARG NODE_TAG=18\nFROM node:${NODE_TAG}-alpine\n"));
        assert!(script.contains("EXPOSE 3000\nEXPOSE 9229/udp\n"));
        assert!(script.contains("COPY --from=deps /app/node_modules ./node_modules\n"));
        assert!(script.ends_with("RUN chown -R app:app /app\nUSER app:app\nCMD [\"node\",\"index.js\"]\n"));
    }

    #[test]
    fn test_definition_errors() {
        assert!(matches!(
            TemplateParser::parse_str("stages:\n  app:\n    image: alpine\n"),
            Err(StackError::Shape { .. })
        ));

        let twice = r#"
stages:
  app:
    from: alpine
    cmd: sh
    macros:
      - macro: install
        manager: npm
      - macro: install
        manager: npm
        production: true
"#;
        let definition = TemplateParser::parse_str(twice).unwrap();
        assert!(matches!(
            TemplateParser::build(&definition),
            Err(StackError::DuplicateName {
                kind: EntityKind::Instruction,
                ..
            })
        ));

        let aliased = "stages:\n  app:\n    alias: app\n    cmd: sh\n";
        let definition = TemplateParser::parse_str(aliased).unwrap();
        assert!(matches!(
            TemplateParser::build(&definition),
            Err(StackError::MissingField { .. })
        ));
    }

    #[test]
    fn test_find_and_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TemplateParser::find_build_file(dir.path()).is_none());
        std::fs::write(
            dir.path().join("build.yaml"),
            "stages:\n  app:\n    from: alpine:3.20\n    cmd: [\"sh\"]\n",
        )
        .unwrap();
        let path = TemplateParser::find_build_file(dir.path()).unwrap();
        let template = TemplateParser::load(&path).unwrap();
        assert_eq!(
            template.render().unwrap(),
            "# ---- stage: app ----\nFROM alpine:3.20\nCMD [\"sh\"]\n"
        );
    }
}
