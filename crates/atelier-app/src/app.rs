//! Application trait driven by the runner.

use crate::context::AppContext;
use crate::frame::FrameContext;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};

/// An application hosted by the Atelier runner.
///
/// The runner owns the window, GPU context, and frame loop; the app records
/// rendering commands into the per-frame command buffer and reacts to
/// events.
pub trait AtelierApp: Sized {
    /// Create the application once the GPU context and window exist.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Advance simulation state.
    fn update(&mut self, _ctx: &AppContext, _dt: f32) {}

    /// Record rendering commands for this frame.
    fn render(&mut self, ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()>;

    /// Called after the swapchain has been recreated.
    fn on_resize(&mut self, _ctx: &mut AppContext, _width: u32, _height: u32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Window event hook; return true to consume the event.
    fn on_event(&mut self, _event: &WindowEvent) -> bool {
        false
    }

    /// Raw device event hook.
    fn on_device_event(&mut self, _device_id: DeviceId, _event: &DeviceEvent) {}

    /// Release app-owned GPU resources; the GPU is idle when this runs.
    fn cleanup(&mut self, _ctx: &mut AppContext) {}
}
