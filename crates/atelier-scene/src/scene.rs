//! Flat scene storage with parent links.

use crate::object::{Capabilities, SceneObject};
use glam::Mat4;
use serde::{Deserialize, Serialize};

/// Index of an object within a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ObjectId(pub u32);

/// Flat object list plus parent indices.
///
/// Parents always precede their children, so world transforms resolve in a
/// single forward pass.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Scene {
    objects: Vec<SceneObject>,
    parents: Vec<Option<ObjectId>>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the scene holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Add an object under an optional parent. The parent must already be
    /// in the scene.
    pub fn add(&mut self, object: SceneObject, parent: Option<ObjectId>) -> ObjectId {
        if let Some(parent) = parent {
            assert!(
                (parent.0 as usize) < self.objects.len(),
                "parent {} not in scene",
                parent.0
            );
        }
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        self.parents.push(parent);
        id
    }

    /// Look up an object.
    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id.0 as usize)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id.0 as usize)
    }

    /// Iterate objects with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(index, object)| (ObjectId(index as u32), object))
    }

    /// Iterate objects with a given capability.
    pub fn with_capability(
        &self,
        capability: Capabilities,
    ) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.iter().filter(move |(_, object)| object.has(capability))
    }

    /// Resolve world transforms for every object in one pass.
    pub fn world_transforms(&self) -> Vec<Mat4> {
        let mut world = Vec::with_capacity(self.objects.len());
        for (index, object) in self.objects.iter().enumerate() {
            let local = object.transform.matrix();
            let matrix = match self.parents[index] {
                Some(parent) => world[parent.0 as usize] * local,
                None => local,
            };
            world.push(matrix);
        }
        world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectKind, SceneObject};
    use glam::Vec3;

    #[test]
    fn child_inherits_parent_transform() {
        let mut scene = Scene::new();

        let mut parent = SceneObject::new("parent", ObjectKind::GameObject);
        parent.transform.translation = Vec3::new(10.0, 0.0, 0.0);
        let parent_id = scene.add(parent, None);

        let mut child = SceneObject::new("child", ObjectKind::GameObject);
        child.transform.translation = Vec3::new(0.0, 5.0, 0.0);
        scene.add(child, Some(parent_id));

        let world = scene.world_transforms();
        let p = world[1].transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(10.0, 5.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn capability_filter_selects_lights() {
        let mut scene = Scene::new();
        scene.add(SceneObject::new("crate", ObjectKind::GameObject), None);
        scene.add(SceneObject::new("sun", ObjectKind::DirectionalLight), None);
        scene.add(SceneObject::new("lamp", ObjectKind::PointLight), None);

        let lights: Vec<_> = scene.with_capability(Capabilities::EMITS_LIGHT).collect();
        assert_eq!(lights.len(), 2);
        assert!(lights.iter().all(|(_, object)| object.kind.is_light()));
    }

    #[test]
    #[should_panic(expected = "not in scene")]
    fn parent_must_exist() {
        let mut scene = Scene::new();
        scene.add(
            SceneObject::new("orphan", ObjectKind::GameObject),
            Some(ObjectId(7)),
        );
    }
}
