use super::{
    CameraKind, CueHandle, CueTransform, FilterHandle, FogSettings, SceneBackend, SceneError,
    SceneResult, SkyboxRef, Viewpoint,
};
use std::collections::{HashMap, HashSet};

/// Every call the controller made, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCall {
    LoadScene(String),
    SetSkybox(String),
    InstantiateCue {
        kind: String,
        id: String,
        handle: CueHandle,
    },
    DestroyCue(CueHandle),
    SetCueTransform(CueHandle, CueTransform),
    SetCuePosition(CueHandle, [f32; 3]),
    SetCueMaterial(CueHandle, String),
    SetCueActive(CueHandle, bool),
    SetFilterEnabled(FilterHandle, bool),
    SetFilterParam(FilterHandle, String, f32),
    SetFog(FogSettings),
    SetCameraActive(CameraKind, bool),
    ApplyViewpoint(Viewpoint),
}

/// Assets the backend knows about. `None` accepts any name.
#[derive(Debug, Clone, Default)]
pub struct SceneCatalogue {
    pub prefabs: Option<HashSet<String>>,
    pub skyboxes: Option<HashSet<String>>,
    pub filters: Option<Vec<String>>,
}

impl SceneCatalogue {
    pub fn strict<P, S, F>(prefabs: P, skyboxes: S, filters: F) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            prefabs: Some(prefabs.into_iter().map(Into::into).collect()),
            skyboxes: Some(skyboxes.into_iter().map(Into::into).collect()),
            filters: Some(filters.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CueRecord {
    pub kind: String,
    pub id: String,
    pub transform: CueTransform,
    pub material: Option<String>,
    pub active: bool,
}

#[derive(Default)]
struct CueSlot {
    generation: u32,
    record: Option<CueRecord>,
}

#[derive(Debug, Clone)]
struct FilterState {
    id: String,
    enabled: bool,
    params: HashMap<String, f32>,
}

/// In-memory scene used by the headless binary and by tests.
pub struct RecordingSceneBackend {
    catalogue: SceneCatalogue,
    slots: Vec<CueSlot>,
    free_list: Vec<u32>,
    active_scene: Option<String>,
    skybox: Option<SkyboxRef>,
    filters: Vec<FilterState>,
    fog: FogSettings,
    main_camera: bool,
    stopped_camera: bool,
    viewpoint: Viewpoint,
    calls: Vec<SceneCall>,
}

impl Default for RecordingSceneBackend {
    fn default() -> Self {
        Self::with_catalogue(SceneCatalogue::default())
    }
}

impl RecordingSceneBackend {
    pub fn with_catalogue(catalogue: SceneCatalogue) -> Self {
        let filters = catalogue
            .filters
            .iter()
            .flatten()
            .map(|id| FilterState {
                id: id.clone(),
                enabled: false,
                params: HashMap::new(),
            })
            .collect();
        Self {
            catalogue,
            slots: Vec::new(),
            free_list: Vec::new(),
            active_scene: None,
            skybox: None,
            filters,
            fog: FogSettings::default(),
            main_camera: true,
            stopped_camera: false,
            viewpoint: Viewpoint::default(),
            calls: Vec::new(),
        }
    }

    pub fn with_active_scene(mut self, name: impl Into<String>) -> Self {
        self.active_scene = Some(name.into());
        self
    }

    pub fn calls(&self) -> &[SceneCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<SceneCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn count_calls(&self, predicate: impl Fn(&SceneCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(*call)).count()
    }

    pub fn cue(&self, handle: CueHandle) -> Option<&CueRecord> {
        self.slot(handle).and_then(|slot| slot.record.as_ref())
    }

    pub fn live_cues(&self) -> impl Iterator<Item = (CueHandle, &CueRecord)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.record
                .as_ref()
                .map(|record| (CueHandle::new(index as u32, slot.generation), record))
        })
    }

    pub fn find_cue_by_id(&self, id: &str) -> Option<&CueRecord> {
        self.live_cues()
            .map(|(_, record)| record)
            .find(|record| record.id == id)
    }

    pub fn filter_enabled(&self, id: &str) -> bool {
        self.filters
            .iter()
            .any(|filter| filter.id == id && filter.enabled)
    }

    pub fn filter_param(&self, id: &str, name: &str) -> Option<f32> {
        self.filters
            .iter()
            .find(|filter| filter.id == id)
            .and_then(|filter| filter.params.get(name).copied())
    }

    pub fn fog(&self) -> FogSettings {
        self.fog
    }

    pub fn camera_active(&self, camera: CameraKind) -> bool {
        match camera {
            CameraKind::Main => self.main_camera,
            CameraKind::Stopped => self.stopped_camera,
        }
    }

    pub fn viewpoint(&self) -> &Viewpoint {
        &self.viewpoint
    }

    fn slot(&self, handle: CueHandle) -> Option<&CueSlot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation() && slot.record.is_some())
    }

    fn record_mut(&mut self, handle: CueHandle) -> SceneResult<&mut CueRecord> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.record.as_mut())
            .ok_or(SceneError::StaleHandle(handle))
    }

    fn filter_mut(&mut self, handle: FilterHandle) -> Option<&mut FilterState> {
        self.filters.get_mut(handle.0 as usize)
    }
}

impl SceneBackend for RecordingSceneBackend {
    fn label(&self) -> &'static str {
        "Recording Scene Backend"
    }

    fn load_scene(&mut self, name: &str) {
        self.calls.push(SceneCall::LoadScene(name.to_string()));
        self.active_scene = Some(name.to_string());
    }

    fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }

    fn find_skybox(&self, name: &str) -> Option<SkyboxRef> {
        match &self.catalogue.skyboxes {
            Some(known) if !known.contains(name) => None,
            _ => Some(SkyboxRef::new(name)),
        }
    }

    fn set_skybox(&mut self, skybox: &SkyboxRef) {
        self.calls.push(SceneCall::SetSkybox(skybox.name().to_string()));
        self.skybox = Some(skybox.clone());
    }

    fn skybox(&self) -> Option<&SkyboxRef> {
        self.skybox.as_ref()
    }

    fn instantiate_cue(&mut self, kind: &str, id: &str) -> SceneResult<CueHandle> {
        if let Some(known) = &self.catalogue.prefabs {
            if !known.contains(kind) {
                return Err(SceneError::UnknownPrefab(kind.to_string()));
            }
        }

        let record = CueRecord {
            kind: kind.to_string(),
            id: id.to_string(),
            transform: CueTransform::default(),
            material: None,
            active: true,
        };
        let handle = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            CueHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(CueSlot {
                generation: 0,
                record: Some(record),
            });
            CueHandle::new(index, 0)
        };

        self.calls.push(SceneCall::InstantiateCue {
            kind: kind.to_string(),
            id: id.to_string(),
            handle,
        });
        Ok(handle)
    }

    fn destroy_cue_tree(&mut self, handle: CueHandle) -> SceneResult<()> {
        self.record_mut(handle)?;
        let slot = &mut self.slots[handle.index() as usize];
        slot.record = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index());
        self.calls.push(SceneCall::DestroyCue(handle));
        Ok(())
    }

    fn set_cue_transform(
        &mut self,
        handle: CueHandle,
        transform: &CueTransform,
    ) -> SceneResult<()> {
        let record = self.record_mut(handle)?;
        if let Some(position) = transform.position {
            record.transform.position = Some(position);
        }
        if let Some(rotation) = transform.rotation {
            record.transform.rotation = Some(rotation);
        }
        if let Some(scale) = transform.scale {
            record.transform.scale = Some(scale);
        }
        self.calls.push(SceneCall::SetCueTransform(handle, *transform));
        Ok(())
    }

    fn set_cue_position(&mut self, handle: CueHandle, position: [f32; 3]) -> SceneResult<()> {
        self.record_mut(handle)?.transform.position = Some(position);
        self.calls.push(SceneCall::SetCuePosition(handle, position));
        Ok(())
    }

    fn set_cue_material(&mut self, handle: CueHandle, material: &str) -> SceneResult<()> {
        self.record_mut(handle)?.material = Some(material.to_string());
        self.calls
            .push(SceneCall::SetCueMaterial(handle, material.to_string()));
        Ok(())
    }

    fn set_cue_active(&mut self, handle: CueHandle, active: bool) -> SceneResult<()> {
        self.record_mut(handle)?.active = active;
        self.calls.push(SceneCall::SetCueActive(handle, active));
        Ok(())
    }

    fn find_filter(&mut self, id: &str) -> Option<FilterHandle> {
        if let Some(index) = self.filters.iter().position(|filter| filter.id == id) {
            return Some(FilterHandle(index as u32));
        }
        if self.catalogue.filters.is_some() {
            return None;
        }
        self.filters.push(FilterState {
            id: id.to_string(),
            enabled: false,
            params: HashMap::new(),
        });
        Some(FilterHandle((self.filters.len() - 1) as u32))
    }

    fn set_filter_enabled(&mut self, handle: FilterHandle, enabled: bool) {
        if let Some(filter) = self.filter_mut(handle) {
            filter.enabled = enabled;
            self.calls.push(SceneCall::SetFilterEnabled(handle, enabled));
        } else {
            log::warn!("[scene] unknown filter handle {handle:?}");
        }
    }

    fn set_filter_param(&mut self, handle: FilterHandle, name: &str, value: f32) {
        if let Some(filter) = self.filter_mut(handle) {
            filter.params.insert(name.to_string(), value);
            self.calls
                .push(SceneCall::SetFilterParam(handle, name.to_string(), value));
        } else {
            log::warn!("[scene] unknown filter handle {handle:?}");
        }
    }

    fn set_fog(&mut self, fog: &FogSettings) {
        self.fog = *fog;
        self.calls.push(SceneCall::SetFog(*fog));
    }

    fn set_camera_active(&mut self, camera: CameraKind, active: bool) {
        match camera {
            CameraKind::Main => self.main_camera = active,
            CameraKind::Stopped => self.stopped_camera = active,
        }
        self.calls.push(SceneCall::SetCameraActive(camera, active));
    }

    fn apply_viewpoint(&mut self, viewpoint: &Viewpoint) {
        self.viewpoint = *viewpoint;
        self.calls.push(SceneCall::ApplyViewpoint(*viewpoint));
    }
}
