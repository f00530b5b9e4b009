use super::placement;
use crate::message::{FogUpdate, PositionUpdate, ViewUpdate};

/// Mouse viewpoint and display frustum as last set by BehaviorMate.
///
/// Values are kept in the sender's convention; unset fields leave whatever
/// the scene had. Every update is a direct set, never a delta.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewpoint {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
    pub top: Option<f32>,
    pub bottom: Option<f32>,
    pub left: Option<f32>,
    pub right: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
    pub rotation: Option<f32>,
    pub elevation: Option<f32>,
    pub orientation: Option<f32>,
}

impl Viewpoint {
    /// Returns `true` if any field changed.
    pub fn apply_position(&mut self, update: &PositionUpdate) -> bool {
        let mut changed = false;
        changed |= set(&mut self.x, update.x);
        changed |= set(&mut self.y, update.y);
        changed |= set(&mut self.z, update.z);
        changed
    }

    pub fn apply_view(&mut self, update: &ViewUpdate) -> bool {
        let mut changed = false;
        changed |= set(&mut self.top, update.top);
        changed |= set(&mut self.bottom, update.bottom);
        changed |= set(&mut self.left, update.left);
        changed |= set(&mut self.right, update.right);
        changed |= set(&mut self.near, update.near);
        changed |= set(&mut self.far, update.far);
        changed |= set(&mut self.rotation, update.rotation);
        changed |= set(&mut self.elevation, update.elevation);
        changed |= set(&mut self.orientation, update.orientation);
        changed
    }

    /// Mouse position in scene axes, if all three axes have been set.
    pub fn engine_position(&self) -> Option<[f32; 3]> {
        match (self.x, self.y, self.z) {
            (Some(x), Some(y), Some(z)) => Some(placement::to_engine([x, y, z])),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogSettings {
    pub enabled: bool,
    pub start: f32,
    pub end: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            start: 0.0,
            end: 300.0,
        }
    }
}

impl FogSettings {
    pub fn apply(&mut self, update: &FogUpdate) -> bool {
        let before = *self;
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(start) = update.start {
            self.start = start;
        }
        if let Some(end) = update.end {
            self.end = end;
        }
        before != *self
    }

    pub fn disable(&mut self) -> bool {
        std::mem::replace(&mut self.enabled, false)
    }
}

fn set(field: &mut Option<f32>, value: Option<f32>) -> bool {
    match value {
        Some(value) if *field != Some(value) => {
            *field = Some(value);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_update_only_touches_present_axes() {
        let mut view = Viewpoint::default();
        assert!(view.apply_position(&PositionUpdate {
            x: Some(0.0),
            y: Some(10.0),
            z: Some(1.5)
        }));
        assert!(view.apply_position(&PositionUpdate {
            y: Some(12.0),
            ..Default::default()
        }));

        assert_eq!(view.x, Some(0.0));
        assert_eq!(view.y, Some(12.0));
        assert_eq!(view.engine_position(), Some([0.0, 1.5, 12.0]));
        assert!(!view.apply_position(&PositionUpdate {
            y: Some(12.0),
            ..Default::default()
        }));
    }

    #[test]
    fn far_plane_is_set_independently_of_near() {
        let mut view = Viewpoint::default();
        view.apply_view(&ViewUpdate {
            near: Some(0.1),
            ..Default::default()
        });
        view.apply_view(&ViewUpdate {
            far: Some(500.0),
            ..Default::default()
        });
        assert_eq!(view.near, Some(0.1));
        assert_eq!(view.far, Some(500.0));
    }

    #[test]
    fn fog_updates_merge() {
        let mut fog = FogSettings::default();
        assert!(fog.apply(&FogUpdate {
            enabled: Some(true),
            start: Some(10.0),
            end: None
        }));
        assert!(fog.enabled);
        assert_eq!(fog.end, 300.0);
        assert!(fog.disable());
        assert!(!fog.disable());
    }
}
