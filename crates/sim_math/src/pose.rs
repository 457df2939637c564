//! Pose component.
//!
//! [`Pose`] is an entity's position and orientation relative to its parent
//! frame (the world frame for top-level entities).

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use sim_component::Component;

/// Position and orientation of an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Pose {
    /// Position in the parent frame.
    pub position: Vec3,
    /// Orientation as a unit quaternion.
    pub rotation: Quat,
}

impl Pose {
    /// Origin, no rotation.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// The 4×4 matrix mapping this pose's local frame into its parent frame.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    /// Rotate a local-frame direction into the parent frame.
    #[must_use]
    pub fn rotate_vector(&self, local: Vec3) -> Vec3 {
        self.rotation * local
    }

    /// Translate the pose by the given offset.
    #[must_use]
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.position += offset;
        self
    }

    /// Apply an additional rotation in the parent frame.
    #[must_use]
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation * self.rotation;
        self
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Pose {
    fn type_name() -> &'static str {
        "sim.components.Pose"
    }
}
