//! Axis convention mapping between BehaviorMate and the scene.
//!
//! BehaviorMate sends `(x, y, z)` with `y` running along the track and `z` as
//! altitude. The scene is y-up, so the last two axes swap on the way in. The
//! same swap applies to positions, euler rotations and scales.

use crate::message::CueSpec;

pub const fn to_engine(external: [f32; 3]) -> [f32; 3] {
    [external[0], external[2], external[1]]
}

/// Cue transform in scene axes. Unset components keep the prefab defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CueTransform {
    pub position: Option<[f32; 3]>,
    /// Euler angles in degrees.
    pub rotation: Option<[f32; 3]>,
    pub scale: Option<[f32; 3]>,
}

impl CueTransform {
    pub fn from_spec(spec: &CueSpec) -> Self {
        Self {
            position: spec.position.map(to_engine),
            rotation: spec.rotation.map(to_engine),
            scale: spec.scale.map(to_engine),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.rotation.is_none() && self.scale.is_none()
    }
}
