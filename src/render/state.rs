//! Reentrancy guard for renderers
//!
//! Every renderer owns one [`RenderState`]. Starting a render moves it from
//! `Idle` to `Rendering`; the returned [`RenderGuard`] moves it back when it
//! goes out of scope, whether the render succeeded or not.

use crate::error::{Result, StackError};
use std::cell::Cell;

/// Render phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderPhase {
    #[default]
    Idle,
    Rendering,
}

/// Two-state render machine
#[derive(Debug, Default)]
pub struct RenderState {
    phase: Cell<RenderPhase>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    pub fn phase(&self) -> RenderPhase {
        self.phase.get()
    }

    /// Enter `Rendering`, failing if a render is already in progress
    pub fn begin(&self, target: &str) -> Result<RenderGuard<'_>> {
        if self.phase.get() == RenderPhase::Rendering {
            return Err(StackError::State(format!(
                "{} is already being rendered",
                target
            )));
        }
        self.phase.set(RenderPhase::Rendering);
        Ok(RenderGuard { state: self })
    }
}

// A copied entity starts idle: the guard belongs to the original.
impl Clone for RenderState {
    fn clone(&self) -> Self {
        Self::default()
    }
}

/// Scoped `Rendering` phase
#[derive(Debug)]
pub struct RenderGuard<'a> {
    state: &'a RenderState,
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.state.phase.set(RenderPhase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejects_reentry() {
        let state = RenderState::new();
        let guard = state.begin("manifest").unwrap();
        assert_eq!(state.phase(), RenderPhase::Rendering);

        let err = state.begin("manifest").unwrap_err();
        assert!(matches!(err, StackError::State(_)));

        drop(guard);
        assert_eq!(state.phase(), RenderPhase::Idle);
        assert!(state.begin("manifest").is_ok());
    }

    #[test]
    fn test_guard_released_on_error_path() {
        fn failing(state: &RenderState) -> Result<()> {
            let _guard = state.begin("stage")?;
            Err(StackError::State("boom".to_string()))
        }

        let state = RenderState::new();
        assert!(failing(&state).is_err());
        assert_eq!(state.phase(), RenderPhase::Idle);
    }

    #[test]
    fn test_clone_is_idle() {
        let state = RenderState::new();
        let _guard = state.begin("template").unwrap();
        assert_eq!(state.clone().phase(), RenderPhase::Idle);
    }
}
