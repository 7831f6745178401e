//! Scene object records for the Atelier engine.
//!
//! Objects are flat records with a kind tag and a capability set instead of
//! an inheritance tree; light parameters live in an optional field checked
//! explicitly by consumers.

pub mod object;
pub mod scene;

pub use object::{Capabilities, LightParams, ObjectKind, SceneObject, Transform};
pub use scene::{ObjectId, Scene};
