use crate::scene::{CameraKind, SceneBackend};

/// Which way the cameras were swapped during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraTransition {
    /// Main camera off, stopped view on.
    Stopped,
    /// Stopped view off, main camera back on.
    Resumed,
}

/// Run/stop state of the rig plus the scene-load countdown.
///
/// The rig is either running or stopped, and independently may be waiting
/// out a load delay after a scene or skybox switch. While a delay is pending
/// `start` does not resume the rig; the resume is applied when the delay
/// expires instead.
#[derive(Debug, Clone)]
pub struct RunState {
    current_scene_context: Option<String>,
    camera_stopped: bool,
    scene_load_delay: Option<u32>,
    main_camera_active: bool,
    delay_armed_this_tick: bool,
    tick: u64,
    load_delay_ticks: u32,
}

impl RunState {
    pub fn new(load_delay_ticks: u32) -> Self {
        Self {
            current_scene_context: None,
            camera_stopped: false,
            scene_load_delay: None,
            main_camera_active: true,
            delay_armed_this_tick: false,
            tick: 0,
            load_delay_ticks,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn current_scene_context(&self) -> Option<&str> {
        self.current_scene_context.as_deref()
    }

    pub fn camera_stopped(&self) -> bool {
        self.camera_stopped
    }

    pub fn main_camera_active(&self) -> bool {
        self.main_camera_active
    }

    pub fn scene_load_delay(&self) -> Option<u32> {
        self.scene_load_delay
    }

    pub fn begin_tick(&mut self) -> u64 {
        self.tick += 1;
        self.delay_armed_this_tick = false;
        self.tick
    }

    pub fn set_scene_owner(&mut self, context: &str) {
        if self.current_scene_context.as_deref() != Some(context) {
            self.current_scene_context = Some(context.to_string());
        }
    }

    /// Called whenever a scene or skybox switch was actually issued.
    pub fn arm_load_delay(&mut self) {
        self.scene_load_delay = Some(self.load_delay_ticks);
        self.delay_armed_this_tick = true;
    }

    /// A successful `start` wants the rig running. Deferred to the delay
    /// countdown if a switch was issued earlier in this tick.
    pub fn request_resume(&mut self) {
        if !self.delay_armed_this_tick {
            self.camera_stopped = false;
        }
    }

    /// Stops the rig if `context` owns the current scene. Returns whether it did.
    pub fn request_stop(&mut self, context: &str) -> bool {
        if self.current_scene_context.as_deref() != Some(context) {
            return false;
        }
        self.camera_stopped = true;
        self.current_scene_context = None;
        if self.scene_load_delay.take().is_some() {
            log::debug!("[engine] stop of {context} cancels pending scene resume");
        }
        true
    }

    pub fn reconcile_camera<B: SceneBackend>(&mut self, backend: &mut B) -> Option<CameraTransition> {
        if self.camera_stopped && self.main_camera_active {
            backend.set_camera_active(CameraKind::Stopped, true);
            backend.set_camera_active(CameraKind::Main, false);
            self.main_camera_active = false;
            Some(CameraTransition::Stopped)
        } else if !self.camera_stopped && !self.main_camera_active {
            backend.set_camera_active(CameraKind::Stopped, false);
            backend.set_camera_active(CameraKind::Main, true);
            self.main_camera_active = true;
            Some(CameraTransition::Resumed)
        } else {
            None
        }
    }

    /// Counts the load delay down by one tick. Returns `true` on the tick the
    /// delay expires and the rig resumes.
    pub fn advance_delay(&mut self) -> bool {
        match self.scene_load_delay {
            Some(0) => {
                self.scene_load_delay = None;
                self.camera_stopped = false;
                true
            }
            Some(remaining) => {
                self.scene_load_delay = Some(remaining - 1);
                false
            }
            None => false,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(1)
    }
}
