//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ash::vk;
use atelier_gpu::{FenceOps, FrameConstants, GpuContextBuilder, GpuError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::app::AtelierApp;
use crate::context::AppContext;
use crate::frame::{FrameContext, FramePhase};

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Frames recorded ahead of the GPU (0 picks the engine default).
    pub frames_in_flight: usize,
    /// Accept a software rasterizer if no hardware adapter exists.
    pub allow_software_adapter: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Atelier".to_string(),
            width: 1280,
            height: 720,
            target_fps: None,
            vsync: true,
            validation: cfg!(debug_assertions),
            frames_in_flight: 0,
            allow_software_adapter: false,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Allow selecting a software rasterizer.
    pub fn with_software_adapter(mut self, allow: bool) -> Self {
        self.allow_software_adapter = allow;
        self
    }
}

/// Run an AtelierApp with the given configuration.
///
/// Initializes logging, creates the window and GPU context, and runs the
/// event loop until the application exits.
pub fn run_app<A: AtelierApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
    };

    if let Err(e) = event_loop.run_app(&mut runner) {
        error!("Event loop error: {e}");
    }

    Ok(())
}

/// Errors the frame loop cannot recover from: a lost device, a fence that
/// stopped advancing, or a broken frame-ring invariant. Everything else
/// (e.g. an out-of-date swapchain) is retried on the next redraw.
fn is_fatal_render_error(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<GpuError>(),
        Some(
            GpuError::SynchronizationTimeout { .. }
                | GpuError::InvalidState(_)
                | GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST)
        )
    )
}

/// Internal application runner that implements winit's ApplicationHandler.
struct AppRunner<A: AtelierApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
}

/// Internal application state.
struct AppState<A: AtelierApp> {
    ctx: AppContext,
    app: A,
    target_frame_time: Option<Duration>,
    // FPS tracking
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
}

impl<A: AtelierApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let mut fatal = false;
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.render_frame() {
                        if is_fatal_render_error(&e) {
                            error!("Fatal render error: {e}");
                            fatal = true;
                        } else {
                            error!("Render error: {e}");
                            // A failed frame may bail mid-phase; start the
                            // next redraw from a clean state.
                            state.ctx.phase = FramePhase::Idle;
                        }
                    }
                    if !fatal {
                        state.ctx.window.request_redraw();
                    }
                }
                if fatal {
                    if let Some(mut state) = self.state.take() {
                        state.cleanup();
                    }
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.handle_resize(size.width, size.height) {
                        error!("Resize error: {e}");
                    }
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let Some(state) = &mut self.state {
            state.app.on_device_event(device_id, &event);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }
}

impl<A: AtelierApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        // Create window
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);

        // Create GPU context
        let gpu = GpuContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .allow_software(self.config.allow_software_adapter)
            .build()?;

        info!("GPU: {}", gpu.adapter().summary());

        // Create app context
        let mut ctx = unsafe {
            AppContext::new(window, gpu, self.config.vsync, self.config.frames_in_flight)?
        };

        // Initialize the application
        let app = A::init(&mut ctx)?;

        let target_frame_time = self
            .config
            .target_fps
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)));

        Ok(AppState {
            ctx,
            app,
            target_frame_time,
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
        })
    }
}

impl<A: AtelierApp> AppState<A> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let frame_start = Instant::now();

        // Calculate delta time
        let now = Instant::now();
        let dt = now.duration_since(self.ctx.last_frame_time).as_secs_f32();
        self.ctx.last_frame_time = now;

        // Update FPS tracking
        if dt > 0.0 {
            let fps = 1.0 / f64::from(dt);
            self.min_fps = self.min_fps.min(fps);
            self.max_fps = self.max_fps.max(fps);
            self.fps_sum += fps;
        }

        // Update the application
        self.app.update(&self.ctx, dt);

        // Acquire the next frame slot. The ring waits on the fence value
        // recorded against the slot's last submission, so by the time the
        // token exists the allocator and constants region are free.
        let slot = self.ctx.ring.acquire(&self.ctx.fence)?;

        // Acquire a back buffer. Out-of-date here means the window changed
        // under us; the slot token is dropped unsubmitted and the next
        // redraw goes through the recreated swapchain.
        let image_available = self.ctx.image_available[slot.index()];
        let back_buffer_index = match unsafe {
            self.ctx.presenter.acquire(&self.ctx.surface, image_available)
        } {
            Ok(index) => index,
            Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR)) => {
                drop(slot);
                let size = self.ctx.window.inner_size();
                self.handle_resize(size.width, size.height)?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // Begin recording; this resets the slot's command allocator.
        self.ctx.phase = self.ctx.phase.advance(FramePhase::Recording)?;
        let command_buffer = unsafe { self.ctx.submit.begin(self.ctx.gpu.device(), &slot)? };

        let mut frame = FrameContext {
            command_buffer,
            slot_index: slot.index(),
            back_buffer_index,
            back_buffer: self.ctx.presenter.back_buffer(back_buffer_index),
            rtv: self
                .ctx
                .presenter
                .rtv(back_buffer_index)
                .ok_or_else(|| anyhow::anyhow!("no render target view for back buffer"))?,
            dsv: self
                .ctx
                .presenter
                .dsv()
                .ok_or_else(|| anyhow::anyhow!("no depth-stencil view"))?,
            extent: self.ctx.presenter.extent(),
            constants: FrameConstants {
                time_seconds: self.ctx.start_time.elapsed().as_secs_f32(),
                frame_number: self.ctx.frame_number.0 as u32,
                ..Default::default()
            },
            dt,
            frame_number: self.ctx.frame_number.0,
        };

        // Record rendering commands
        self.app.render(&self.ctx, &mut frame)?;

        // Upload this frame's constants into the slot's region
        self.ctx.constants.write(&slot, &frame.constants)?;

        // Submit, then signal the fence and record the value in the ring
        let render_finished = self.ctx.render_finished[back_buffer_index as usize];
        unsafe {
            self.ctx.submit.submit(
                self.ctx.gpu.device(),
                &slot,
                Some(image_available),
                Some(render_finished),
            )?;
        }
        self.ctx.phase = self.ctx.phase.advance(FramePhase::Submitted)?;

        let fence_value = match self.ctx.fence.signal() {
            Ok(value) => value,
            Err(e) => {
                // The command buffer reached the queue but no fence value
                // covers it. Park the slot behind the value that would have
                // been signaled so it can never be handed back out, then
                // surface the failure (device-lost-grade, fatal).
                let value = self.ctx.fence.last_signaled() + 1;
                self.ctx.ring.submit(slot, value);
                return Err(e.into());
            }
        };
        self.ctx.ring.submit(slot, fence_value);

        // Present the back buffer
        let needs_recreate = unsafe {
            self.ctx.presenter.present(
                &self.ctx.surface,
                self.ctx.submit.queue(),
                &[render_finished],
            )?
        };
        self.ctx.phase = self.ctx.phase.advance(FramePhase::Idle)?;
        self.ctx.frame_number = self.ctx.frame_number.next();

        if needs_recreate {
            let size = self.ctx.window.inner_size();
            self.handle_resize(size.width, size.height)?;
        }

        // Frame pacing
        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn handle_resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        // Minimized windows report a zero extent; keep the old buffers and
        // resume when the window comes back.
        if width == 0 || height == 0 {
            return Ok(());
        }

        let recreated = self.ctx.resize(width, height)?;
        if !recreated {
            return Ok(());
        }

        // Notify the application
        self.app.on_resize(&mut self.ctx, width, height)?;

        info!("Resized to {}x{}", width, height);
        Ok(())
    }

    fn cleanup(&mut self) {
        // Print FPS statistics
        if self.ctx.frame_number.0 > 0 {
            let avg_fps = self.fps_sum / self.ctx.frame_number.0 as f64;
            info!("FPS Statistics:");
            info!("  Min: {:.1}", self.min_fps);
            info!("  Max: {:.1}", self.max_fps);
            info!("  Avg: {:.1}", avg_fps);
            info!("  Total frames: {}", self.ctx.frame_number.0);
        }

        info!("Starting cleanup...");
        unsafe {
            // Let the app cleanup first; AppContext::cleanup flushes the
            // fence and waits for the device before destroying anything.
            if let Err(e) = self.ctx.gpu.wait_idle() {
                error!("Failed to wait idle: {e}");
            }
            self.app.cleanup(&mut self.ctx);
            self.ctx.cleanup();
        }
        info!("Cleanup complete");
    }
}
