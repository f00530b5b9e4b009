mod registry;

pub use registry::{ContextRegistry, StartOutcome};

use crate::message::CueSpec;
use crate::scene::{CueHandle, FilterHandle, SceneBackend, SceneError, SkyboxRef};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context {0} is not registered")]
    UnknownContext(String),
    #[error("context {context} has no cue {cue}")]
    UnknownCue { context: String, cue: String },
    #[error("no filter named {0} in the scene")]
    UnknownFilter(String),
    #[error("unreadable {kind} edit: {reason}")]
    InvalidEdit { kind: String, reason: String },
    #[error("unrecognized edit type {0}")]
    UnrecognizedEdit(String),
    #[error("unrecognized action {0}")]
    UnrecognizedAction(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

pub type ContextResult<T> = Result<T, ContextError>;

/// A placed object. Vectors stay in the sender's axis convention; the scene
/// receives the remapped values.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub id: String,
    pub kind: String,
    pub position: Option<[f32; 3]>,
    pub rotation: Option<[f32; 3]>,
    pub scale: Option<[f32; 3]>,
    pub material: Option<String>,
    handle: CueHandle,
}

impl Cue {
    pub fn handle(&self) -> CueHandle {
        self.handle
    }

    pub fn to_spec(&self) -> CueSpec {
        CueSpec {
            id: self.id.clone(),
            kind: self.kind.clone(),
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
            material: self.material.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachedFilter {
    pub id: String,
    pub handle: FilterHandle,
}

/// Named bundle of scene binding, skybox, filters and cues that BehaviorMate
/// edits while inactive and then starts as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    id: String,
    scene: Option<String>,
    skybox: Option<SkyboxRef>,
    filters: Vec<AttachedFilter>,
    cues: Vec<Cue>,
    active: bool,
}

impl Context {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scene: None,
            skybox: None,
            filters: Vec::new(),
            cues: Vec::new(),
            active: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    pub fn skybox(&self) -> Option<&SkyboxRef> {
        self.skybox.as_ref()
    }

    pub fn filters(&self) -> &[AttachedFilter] {
        &self.filters
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn cue(&self, id: &str) -> Option<&Cue> {
        self.cues.iter().find(|cue| cue.id == id)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn cue_mut(&mut self, id: &str) -> Option<&mut Cue> {
        self.cues.iter_mut().find(|cue| cue.id == id)
    }

    fn attach_filter(&mut self, id: &str, handle: FilterHandle) {
        if !self.filters.iter().any(|filter| filter.handle == handle) {
            self.filters.push(AttachedFilter {
                id: id.to_string(),
                handle,
            });
        }
    }

    fn set_active<B: SceneBackend>(&mut self, active: bool, backend: &mut B) {
        self.active = active;
        for cue in &self.cues {
            if let Err(err) = backend.set_cue_active(cue.handle, active) {
                log::warn!("[context] {}: cue {} lost its scene object: {err}", self.id, cue.id);
            }
        }
    }

    fn teardown<B: SceneBackend>(self, backend: &mut B) {
        for filter in &self.filters {
            backend.set_filter_enabled(filter.handle, false);
        }
        for cue in self.cues {
            if let Err(err) = backend.destroy_cue_tree(cue.handle) {
                log::warn!("[context] {}: failed to destroy cue {}: {err}", self.id, cue.id);
            }
        }
    }
}
