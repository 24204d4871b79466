//! Text rendering primitives shared by the manifest serializer and the
//! image-build compiler.

pub mod emitter;
pub mod state;
pub mod yaml;

pub use emitter::Emitter;
pub use state::{RenderGuard, RenderPhase, RenderState};
