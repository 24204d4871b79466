//! Multi-stage build templates

use super::instruction::BuildInstruction;
use super::stage::Stage;
use crate::compose::registry::Registry;
use crate::error::{Result, StackError};
use crate::fs::ArtifactWriter;
use crate::render::RenderState;
use std::path::Path;

/// Ordered, name-unique collection of stages
#[derive(Debug, Clone, Default)]
pub struct Template {
    stages: Registry<Stage>,
    render_state: RenderState,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register an empty stage
    pub fn add_stage(&mut self, name: &str) -> Result<&mut Stage> {
        self.insert(Stage::new(name)?)?;
        self.stages
            .get_mut(name)
            .ok_or_else(|| StackError::State(format!("stage '{}' vanished after insert", name)))
    }

    /// Register a prepared stage; names are compared case-sensitively
    pub fn insert(&mut self, stage: Stage) -> Result<()> {
        tracing::debug!("Adding stage {}", stage.name());
        self.stages.insert(stage)?;
        Ok(())
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name)
    }

    pub fn stage_mut(&mut self, name: &str) -> Option<&mut Stage> {
        self.stages.get_mut(name)
    }

    /// Stages in declaration order
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Render every stage under a banner, separated by blank lines
    pub fn render(&self) -> Result<String> {
        let _guard = self.render_state.begin("template")?;
        if self.stages.is_empty() {
            return Err(StackError::State("template has no stages".to_string()));
        }
        let mut out = String::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let banner = BuildInstruction::Comment(format!("---- stage: {} ----", stage.name()));
            out.push_str(&banner.to_string());
            out.push('\n');
            out.push_str(&stage.render()?);
        }
        tracing::info!("Rendered build template ({} stages)", self.stages.len());
        Ok(out)
    }

    /// Render and hand the script to `writer`; nothing is written on error
    pub fn write(&self, writer: &dyn ArtifactWriter, path: &Path) -> Result<()> {
        let script = self.render()?;
        writer.write(path, &script)?;
        tracing::info!("Wrote build script to {}", path.display());
        Ok(())
    }
}
