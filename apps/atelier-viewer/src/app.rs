//! Viewer application implementation.

use ash::vk;
use glam::{Mat4, Vec3, Vec4};
use tracing::info;
use winit::event::WindowEvent;
use winit::keyboard::{Key, NamedKey};

use atelier_app::{AppContext, AtelierApp, FrameContext};
use atelier_gpu::command::transition_image;
use atelier_scene::{Capabilities, ObjectKind, Scene, SceneObject};

/// Camera orbit radius in world units.
const ORBIT_RADIUS: f32 = 8.0;

/// Orbit speed in radians per second.
const ORBIT_SPEED: f32 = 0.4;

/// Vertical field of view in radians.
const FOV_Y: f32 = std::f32::consts::FRAC_PI_3;

/// Viewer application state.
pub struct Viewer {
    /// Demo scene contents.
    scene: Scene,
    /// Orbit angle around the scene origin.
    orbit_angle: f32,
    /// Freeze the orbit (toggled with Space).
    paused: bool,
}

impl Viewer {
    fn build_scene() -> Scene {
        let mut scene = Scene::new();

        let mut pedestal = SceneObject::new("pedestal", ObjectKind::GameObject);
        pedestal.transform.scale = Vec3::new(4.0, 0.5, 4.0);
        let pedestal_id = scene.add(pedestal, None);

        let mut statue = SceneObject::new("statue", ObjectKind::GameObject);
        statue.transform.translation = Vec3::new(0.0, 1.5, 0.0);
        statue.capabilities |= Capabilities::SELECTABLE;
        scene.add(statue, Some(pedestal_id));

        let mut sun = SceneObject::new("sun", ObjectKind::DirectionalLight);
        sun.transform.translation = Vec3::new(0.0, 20.0, 0.0);
        scene.add(sun, None);

        let mut lamp = SceneObject::new("lamp", ObjectKind::PointLight);
        lamp.transform.translation = Vec3::new(3.0, 2.0, 3.0);
        if let Some(light) = lamp.light.as_mut() {
            light.color = Vec3::new(1.0, 0.8, 0.6);
            light.range = 12.0;
        }
        scene.add(lamp, None);

        scene
    }

    fn camera_position(&self) -> Vec3 {
        Vec3::new(
            ORBIT_RADIUS * self.orbit_angle.cos(),
            3.0,
            ORBIT_RADIUS * self.orbit_angle.sin(),
        )
    }
}

impl AtelierApp for Viewer {
    fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
        let scene = Self::build_scene();
        let lights = scene.with_capability(Capabilities::EMITS_LIGHT).count();
        info!("Demo scene: {} objects ({} lights)", scene.len(), lights);

        Ok(Self {
            scene,
            orbit_angle: 0.0,
            paused: false,
        })
    }

    fn update(&mut self, _ctx: &AppContext, dt: f32) {
        if !self.paused {
            self.orbit_angle = (self.orbit_angle + ORBIT_SPEED * dt) % std::f32::consts::TAU;
        }
    }

    fn render(&mut self, ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()> {
        // Fill the camera block of the per-frame constants; the runner
        // uploads them after this returns.
        let eye = self.camera_position();
        let view = Mat4::look_at_rh(eye, Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let proj = Mat4::perspective_rh(FOV_Y, ctx.aspect_ratio(), 0.1, 100.0);
        frame.constants.view = view;
        frame.constants.proj = proj;
        frame.constants.view_proj = proj * view;
        frame.constants.camera_position = Vec4::from((eye, 1.0));

        // Clear the back buffer to a slowly shifting color.
        let t = frame.constants.time_seconds;
        let clear = vk::ClearColorValue {
            float32: [
                0.1 + 0.05 * (t * 0.7).sin(),
                0.12,
                0.2 + 0.05 * (t * 0.3).cos(),
                1.0,
            ],
        };

        let device = ctx.gpu.device();
        unsafe {
            transition_image(
                device,
                frame.command_buffer,
                frame.back_buffer,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                (
                    vk::PipelineStageFlags2::TOP_OF_PIPE,
                    vk::AccessFlags2::empty(),
                ),
                (
                    vk::PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_WRITE,
                ),
            );

            let range = vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .level_count(1)
                .layer_count(1);
            device.cmd_clear_color_image(
                frame.command_buffer,
                frame.back_buffer,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &clear,
                std::slice::from_ref(&range),
            );

            transition_image(
                device,
                frame.command_buffer,
                frame.back_buffer,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
                (
                    vk::PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_WRITE,
                ),
                (
                    vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
                    vk::AccessFlags2::empty(),
                ),
            );
        }

        Ok(())
    }

    fn on_event(&mut self, event: &WindowEvent) -> bool {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            if event.state.is_pressed() && event.logical_key == Key::Named(NamedKey::Space) {
                self.paused = !self.paused;
                info!("Orbit {}", if self.paused { "paused" } else { "resumed" });
                return true;
            }
            if event.state.is_pressed() && event.logical_key == Key::Named(NamedKey::Tab) {
                let world = self.scene.world_transforms();
                for (id, object) in self.scene.with_capability(Capabilities::SELECTABLE) {
                    let position = world[id.0 as usize].transform_point3(Vec3::ZERO);
                    info!("{} at {:?}", object.name, position);
                }
                return true;
            }
        }
        false
    }
}
