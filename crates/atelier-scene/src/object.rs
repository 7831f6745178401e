//! Scene object records.

use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// What an object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A plain renderable object.
    GameObject,
    /// A light with a direction but no position.
    DirectionalLight,
    /// A light radiating from a point.
    PointLight,
    /// A cone-shaped light.
    SpotLight,
}

impl ObjectKind {
    /// Default capabilities for this kind.
    pub fn default_capabilities(self) -> Capabilities {
        match self {
            Self::GameObject => Capabilities::RENDERABLE | Capabilities::CASTS_SHADOWS,
            Self::DirectionalLight | Self::PointLight | Self::SpotLight => {
                Capabilities::EMITS_LIGHT
            }
        }
    }

    /// Returns true for the light kinds.
    pub fn is_light(self) -> bool {
        !matches!(self, Self::GameObject)
    }
}

bitflags! {
    /// Capability set checked explicitly by consumers instead of
    /// downcasting through a class hierarchy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Capabilities: u32 {
        /// Submitted to the render list.
        const RENDERABLE = 1 << 0;
        /// Contributes to lighting.
        const EMITS_LIGHT = 1 << 1;
        /// Casts shadows.
        const CASTS_SHADOWS = 1 << 2;
        /// Selectable in the editor.
        const SELECTABLE = 1 << 3;
    }
}

/// Local transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Local transform matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Light parameters, present only on light kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightParams {
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Attenuation range (point and spot lights).
    pub range: f32,
    /// Cone angle in radians (spot lights).
    pub cone_angle: f32,
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            cone_angle: std::f32::consts::FRAC_PI_4,
        }
    }
}

/// A single scene object record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub capabilities: Capabilities,
    pub transform: Transform,
    /// Present when `kind` is a light.
    pub light: Option<LightParams>,
}

impl SceneObject {
    /// Create an object with the defaults for its kind.
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            capabilities: kind.default_capabilities(),
            transform: Transform::default(),
            light: kind.is_light().then(LightParams::default),
        }
    }

    /// Explicit capability check; consumers branch on this instead of on
    /// the concrete kind.
    pub fn has(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lights_carry_light_params() {
        let light = SceneObject::new("sun", ObjectKind::DirectionalLight);
        assert!(light.kind.is_light());
        assert!(light.light.is_some());
        assert!(light.has(Capabilities::EMITS_LIGHT));
        assert!(!light.has(Capabilities::RENDERABLE));
    }

    #[test]
    fn game_objects_have_no_light_params() {
        let object = SceneObject::new("crate", ObjectKind::GameObject);
        assert!(object.light.is_none());
        assert!(object.has(Capabilities::RENDERABLE));
        assert!(object.has(Capabilities::CASTS_SHADOWS));
    }

    #[test]
    fn capabilities_are_overridable() {
        let mut object = SceneObject::new("gizmo", ObjectKind::GameObject);
        object.capabilities -= Capabilities::CASTS_SHADOWS;
        object.capabilities |= Capabilities::SELECTABLE;
        assert!(!object.has(Capabilities::CASTS_SHADOWS));
        assert!(object.has(Capabilities::SELECTABLE));
    }

    #[test]
    fn transform_matrix_applies_translation() {
        let mut transform = Transform::default();
        transform.translation = Vec3::new(1.0, 2.0, 3.0);
        let m = transform.matrix();
        let p = m.transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }
}
