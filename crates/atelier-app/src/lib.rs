//! Window runner and frame loop for the Atelier engine.
//!
//! Wires the GPU context, presenter, frame ring, and descriptor heaps to a
//! winit window and drives the per-frame state machine.

pub mod app;
pub mod context;
pub mod frame;
pub mod runner;

pub use app::AtelierApp;
pub use context::AppContext;
pub use frame::{FrameContext, FramePhase};
pub use runner::{run_app, AppConfig};
