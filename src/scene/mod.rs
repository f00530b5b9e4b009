pub mod document;
pub mod placement;
mod recording;
pub mod view;

pub use document::SceneDocument;
pub use placement::CueTransform;
pub use recording::{CueRecord, RecordingSceneBackend, SceneCall, SceneCatalogue};
pub use view::{FogSettings, Viewpoint};

use std::fmt;
use thiserror::Error;

/// Generation-checked reference to a cue object owned by the scene backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CueHandle {
    index: u32,
    generation: u32,
}

impl CueHandle {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FilterHandle(pub u32);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SkyboxRef(String);

impl SkyboxRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SkyboxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CameraKind {
    /// The camera following the mouse viewpoint.
    Main,
    /// Static view shown while the rig is stopped or loading.
    Stopped,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("no prefab named {0}")]
    UnknownPrefab(String),
    #[error("cue handle {0:?} is not alive in this scene")]
    StaleHandle(CueHandle),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// The live 3D environment the controller drives. Implementations own asset
/// loading and rendering; the controller only issues these calls.
pub trait SceneBackend {
    fn label(&self) -> &'static str;

    fn load_scene(&mut self, name: &str);
    fn active_scene(&self) -> Option<&str>;

    fn find_skybox(&self, name: &str) -> Option<SkyboxRef>;
    fn set_skybox(&mut self, skybox: &SkyboxRef);
    fn skybox(&self) -> Option<&SkyboxRef>;

    fn instantiate_cue(&mut self, kind: &str, id: &str) -> SceneResult<CueHandle>;
    fn destroy_cue_tree(&mut self, handle: CueHandle) -> SceneResult<()>;
    fn set_cue_transform(&mut self, handle: CueHandle, transform: &CueTransform)
    -> SceneResult<()>;
    fn set_cue_position(&mut self, handle: CueHandle, position: [f32; 3]) -> SceneResult<()>;
    fn set_cue_material(&mut self, handle: CueHandle, material: &str) -> SceneResult<()>;
    fn set_cue_active(&mut self, handle: CueHandle, active: bool) -> SceneResult<()>;

    fn find_filter(&mut self, id: &str) -> Option<FilterHandle>;
    fn set_filter_enabled(&mut self, handle: FilterHandle, enabled: bool);
    fn set_filter_param(&mut self, handle: FilterHandle, name: &str, value: f32);

    fn set_fog(&mut self, fog: &FogSettings);
    fn set_camera_active(&mut self, camera: CameraKind, active: bool);
    fn apply_viewpoint(&mut self, viewpoint: &Viewpoint);
}
