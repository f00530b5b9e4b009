use super::{Context, ContextError, ContextResult, Cue};
use crate::engine::RunState;
use crate::message::{ContextEdit, CreatePolicy, CueSpec};
use crate::scene::{CueTransform, FogSettings, SceneBackend, SceneDocument, placement};
use std::collections::BTreeMap;

/// Scene-facing effects of a successful start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOutcome {
    pub scene_switched: bool,
    pub skybox_switched: bool,
}

#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: BTreeMap<String, Context>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.contexts.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Context> {
        self.contexts.get(id)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.contexts.keys().map(String::as_str)
    }

    pub fn active_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.contexts
            .values()
            .filter(|context| context.is_active())
            .map(Context::id)
    }

    /// Looks up `id`, registering a new inactive context first when the
    /// policy allows it.
    pub fn get_or_create(&mut self, id: &str, policy: CreatePolicy) -> Option<&mut Context> {
        if policy == CreatePolicy::Create && !self.contexts.contains_key(id) {
            log::debug!("[context] registering {id}");
            self.contexts.insert(id.to_string(), Context::new(id));
        }
        self.contexts.get_mut(id)
    }

    pub fn edit<B: SceneBackend>(
        &mut self,
        id: &str,
        edit: ContextEdit,
        backend: &mut B,
    ) -> ContextResult<()> {
        let Some(context) = self.get_or_create(id, edit.create_policy()) else {
            return Err(ContextError::UnknownContext(id.to_string()));
        };

        match edit {
            ContextEdit::Cue(spec) => add_cue(context, spec, backend),
            ContextEdit::MoveCue {
                id: cue_id,
                position,
            } => {
                let Some(cue) = context.cue_mut(&cue_id) else {
                    return Err(ContextError::UnknownCue {
                        context: id.to_string(),
                        cue: cue_id,
                    });
                };
                backend.set_cue_position(cue.handle, placement::to_engine(position))?;
                cue.position = Some(position);
                Ok(())
            }
            ContextEdit::Skybox(name) => {
                context.skybox = backend.find_skybox(&name);
                if context.skybox.is_none() {
                    log::warn!("[context] {id}: skybox {name} not found, binding cleared");
                }
                Ok(())
            }
            ContextEdit::Scene(scene) => {
                context.scene = scene.filter(|name| !name.is_empty());
                Ok(())
            }
            ContextEdit::Filter {
                id: filter_id,
                value,
            } => {
                let handle = backend
                    .find_filter(&filter_id)
                    .ok_or_else(|| ContextError::UnknownFilter(filter_id.clone()))?;
                context.attach_filter(&filter_id, handle);
                if let Some(value) = value {
                    backend.set_filter_param(handle, "value", value);
                }
                Ok(())
            }
            ContextEdit::Invalid { kind, reason } => Err(ContextError::InvalidEdit { kind, reason }),
            ContextEdit::Unrecognized(kind) => Err(ContextError::UnrecognizedEdit(kind)),
        }
    }

    /// Applies a context's scene, skybox and filters and makes its cues
    /// visible. Switches are only issued when they differ from what the
    /// scene already shows.
    pub fn start<B: SceneBackend>(
        &mut self,
        id: &str,
        run_state: &mut RunState,
        backend: &mut B,
    ) -> ContextResult<StartOutcome> {
        let context = self
            .contexts
            .get_mut(id)
            .ok_or_else(|| ContextError::UnknownContext(id.to_string()))?;
        let mut outcome = StartOutcome::default();

        if let Some(scene) = context.scene.as_deref() {
            run_state.set_scene_owner(id);
            if backend.active_scene() != Some(scene) {
                log::info!("[context] {id}: loading scene {scene}");
                backend.load_scene(scene);
                run_state.arm_load_delay();
                outcome.scene_switched = true;
            }
        }

        if let Some(skybox) = &context.skybox {
            if backend.skybox() != Some(skybox) {
                log::debug!("[context] {id}: switching skybox to {skybox}");
                backend.set_skybox(skybox);
                run_state.arm_load_delay();
                outcome.skybox_switched = true;
            }
        }

        for filter in &context.filters {
            backend.set_filter_enabled(filter.handle, true);
        }

        run_state.request_resume();
        context.set_active(true, backend);
        Ok(outcome)
    }

    /// Deactivates a context. Returns `true` if it owned the current scene and
    /// the rig was stopped.
    pub fn stop<B: SceneBackend>(
        &mut self,
        id: &str,
        run_state: &mut RunState,
        backend: &mut B,
    ) -> ContextResult<bool> {
        let context = self
            .contexts
            .get_mut(id)
            .ok_or_else(|| ContextError::UnknownContext(id.to_string()))?;
        let stopped = run_state.request_stop(id);
        context.set_active(false, backend);
        Ok(stopped)
    }

    /// Disables fog, then tears the context down if it exists. Returns whether
    /// a context was removed.
    pub fn clear<B: SceneBackend>(&mut self, id: &str, fog: &mut FogSettings, backend: &mut B) -> bool {
        fog.disable();
        match self.contexts.remove(id) {
            Some(context) => {
                log::debug!(
                    "[context] clearing {id} ({} cues, {} filters)",
                    context.cues.len(),
                    context.filters.len()
                );
                context.teardown(backend);
                true
            }
            None => false,
        }
    }

    /// Snapshot of a context as a replayable document, cues ordered by id.
    pub fn export_document(&self, id: &str) -> Option<SceneDocument> {
        let context = self.contexts.get(id)?;
        let mut objects: Vec<CueSpec> = context.cues.iter().map(Cue::to_spec).collect();
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        Some(SceneDocument {
            objects,
            skybox: context.skybox.as_ref().map(|skybox| skybox.name().to_string()),
            apply_filter: context.filters.last().map(|filter| filter.id.clone()),
        })
    }
}

fn add_cue<B: SceneBackend>(context: &mut Context, spec: CueSpec, backend: &mut B) -> ContextResult<()> {
    if context.cue(&spec.id).is_some() {
        log::debug!("[context] {}: cue {} already exists", context.id, spec.id);
        return Ok(());
    }

    let handle = backend.instantiate_cue(&spec.kind, &spec.id)?;
    let transform = CueTransform::from_spec(&spec);
    if !transform.is_empty() {
        backend.set_cue_transform(handle, &transform)?;
    }
    if let Some(material) = &spec.material {
        backend.set_cue_material(handle, material)?;
    }
    backend.set_cue_active(handle, context.active)?;

    context.cues.push(Cue {
        id: spec.id,
        kind: spec.kind,
        position: spec.position,
        rotation: spec.rotation,
        scale: spec.scale,
        material: spec.material,
        handle,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{RecordingSceneBackend, SceneCall, SceneCatalogue, SceneError};
    use proptest::prelude::*;

    fn cue_edit(id: &str, position: [f32; 3]) -> ContextEdit {
        ContextEdit::Cue(CueSpec::new(id, "Cube").at(position))
    }

    #[test]
    fn move_cue_never_creates_a_context() {
        let mut registry = ContextRegistry::new();
        let mut scene = RecordingSceneBackend::default();

        let result = registry.edit(
            "ghost",
            ContextEdit::MoveCue {
                id: "a".to_string(),
                position: [1.0, 2.0, 3.0],
            },
            &mut scene,
        );
        assert!(matches!(result, Err(ContextError::UnknownContext(_))));
        assert!(registry.is_empty());
        assert!(scene.calls().is_empty());
    }

    #[test]
    fn cue_edit_creates_one_inactive_context() {
        let mut registry = ContextRegistry::new();
        let mut scene = RecordingSceneBackend::default();

        registry.edit("cues", cue_edit("a", [0.0, 10.0, 0.0]), &mut scene).unwrap();
        registry.edit("cues", cue_edit("b", [0.0, 20.0, 0.0]), &mut scene).unwrap();

        assert_eq!(registry.len(), 1);
        let context = registry.get("cues").unwrap();
        assert!(!context.is_active());
        assert_eq!(context.cues().len(), 2);
        let record = scene.find_cue_by_id("a").unwrap();
        assert!(!record.active);
        assert_eq!(record.transform.position, Some([0.0, 0.0, 10.0]));
    }

    #[test]
    fn duplicate_cue_keeps_first_writer() {
        let mut registry = ContextRegistry::new();
        let mut scene = RecordingSceneBackend::default();

        registry.edit("cues", cue_edit("a", [1.0, 1.0, 1.0]), &mut scene).unwrap();
        registry.edit("cues", cue_edit("a", [9.0, 9.0, 9.0]), &mut scene).unwrap();

        let context = registry.get("cues").unwrap();
        assert_eq!(context.cues().len(), 1);
        assert_eq!(context.cue("a").unwrap().position, Some([1.0, 1.0, 1.0]));
        assert_eq!(
            scene.count_calls(|call| matches!(call, SceneCall::InstantiateCue { .. })),
            1
        );
    }

    #[test]
    fn moved_cue_lands_in_scene_axes() {
        let mut registry = ContextRegistry::new();
        let mut scene = RecordingSceneBackend::default();
        let mut state = RunState::default();

        registry.edit("cues", cue_edit("a", [1.0, 2.0, 3.0]), &mut scene).unwrap();
        registry
            .edit(
                "cues",
                ContextEdit::MoveCue {
                    id: "a".to_string(),
                    position: [4.0, 5.0, 6.0],
                },
                &mut scene,
            )
            .unwrap();
        registry.start("cues", &mut state, &mut scene).unwrap();

        let handle = registry.get("cues").unwrap().cue("a").unwrap().handle();
        let record = scene.cue(handle).unwrap();
        assert_eq!(record.transform.position, Some([4.0, 6.0, 5.0]));
        assert!(record.active);
    }

    #[test]
    fn unknown_prefab_still_registers_context() {
        let mut registry = ContextRegistry::new();
        let mut scene =
            RecordingSceneBackend::with_catalogue(SceneCatalogue::strict(["Cube"], ["Night"], ["blur"]));

        let result = registry.edit(
            "cues",
            ContextEdit::Cue(CueSpec::new("a", "Dragon")),
            &mut scene,
        );
        assert!(matches!(
            result,
            Err(ContextError::Scene(SceneError::UnknownPrefab(_)))
        ));
        assert!(registry.contains("cues"));
        assert!(registry.get("cues").unwrap().cues().is_empty());
    }

    #[test]
    fn start_switches_scene_only_when_different() {
        let mut registry = ContextRegistry::new();
        let mut scene = RecordingSceneBackend::default().with_active_scene("Hallway");
        let mut state = RunState::default();

        registry
            .edit("track", ContextEdit::Scene(Some("Hallway".to_string())), &mut scene)
            .unwrap();
        let outcome = registry.start("track", &mut state, &mut scene).unwrap();
        assert!(!outcome.scene_switched);
        assert_eq!(state.current_scene_context(), Some("track"));

        registry
            .edit("track", ContextEdit::Scene(Some("Forest".to_string())), &mut scene)
            .unwrap();
        state.begin_tick();
        assert!(registry.start("track", &mut state, &mut scene).unwrap().scene_switched);
        assert_eq!(state.scene_load_delay(), Some(1));

        state.begin_tick();
        assert_eq!(
            registry.start("track", &mut state, &mut scene).unwrap(),
            StartOutcome::default()
        );
        assert_eq!(
            scene.count_calls(|call| matches!(call, SceneCall::LoadScene(_))),
            1
        );
    }

    #[test]
    fn stop_on_non_owner_only_deactivates() {
        let mut registry = ContextRegistry::new();
        let mut scene = RecordingSceneBackend::default();
        let mut state = RunState::default();

        registry
            .edit("track", ContextEdit::Scene(Some("Forest".to_string())), &mut scene)
            .unwrap();
        registry.edit("cues", cue_edit("a", [0.0, 0.0, 0.0]), &mut scene).unwrap();
        registry.start("track", &mut state, &mut scene).unwrap();
        registry.start("cues", &mut state, &mut scene).unwrap();

        assert!(!registry.stop("cues", &mut state, &mut scene).unwrap());
        assert_eq!(state.current_scene_context(), Some("track"));
        assert!(!registry.get("cues").unwrap().is_active());
        assert!(!scene.find_cue_by_id("a").unwrap().active);

        assert!(registry.stop("track", &mut state, &mut scene).unwrap());
        assert!(state.camera_stopped());
    }

    #[test]
    fn clear_disables_filters_and_removes_context() {
        let mut registry = ContextRegistry::new();
        let mut scene = RecordingSceneBackend::default();
        let mut state = RunState::default();
        let mut fog = FogSettings {
            enabled: true,
            ..FogSettings::default()
        };

        registry
            .edit(
                "dots",
                ContextEdit::Filter {
                    id: "blur".to_string(),
                    value: Some(0.5),
                },
                &mut scene,
            )
            .unwrap();
        registry.edit("dots", cue_edit("a", [0.0, 0.0, 0.0]), &mut scene).unwrap();
        registry.start("dots", &mut state, &mut scene).unwrap();
        assert!(scene.filter_enabled("blur"));
        assert_eq!(scene.filter_param("blur", "value"), Some(0.5));

        assert!(registry.clear("dots", &mut fog, &mut scene));
        assert!(!fog.enabled);
        assert!(!registry.contains("dots"));
        assert!(!scene.filter_enabled("blur"));
        assert_eq!(scene.live_cues().count(), 0);

        assert!(matches!(
            registry.start("dots", &mut state, &mut scene),
            Err(ContextError::UnknownContext(_))
        ));
        assert!(!registry.clear("dots", &mut fog, &mut scene));
    }

    #[test]
    fn unknown_filter_and_edit_types_are_reported() {
        let mut registry = ContextRegistry::new();
        let mut scene =
            RecordingSceneBackend::with_catalogue(SceneCatalogue::strict(["Cube"], ["Night"], ["blur"]));

        let result = registry.edit(
            "dots",
            ContextEdit::Filter {
                id: "warp".to_string(),
                value: None,
            },
            &mut scene,
        );
        assert!(matches!(result, Err(ContextError::UnknownFilter(name)) if name == "warp"));

        let result = registry.edit("other", ContextEdit::Unrecognized("lights".to_string()), &mut scene);
        assert!(matches!(result, Err(ContextError::UnrecognizedEdit(kind)) if kind == "lights"));
        assert!(registry.contains("other"));
    }

    #[test]
    fn unreadable_cue_registers_context_then_fails() {
        let mut registry = ContextRegistry::new();
        let mut scene = RecordingSceneBackend::default();

        let result = registry.edit(
            "ctx",
            ContextEdit::Invalid {
                kind: "cue".to_string(),
                reason: "missing field `type`".to_string(),
            },
            &mut scene,
        );
        assert!(matches!(result, Err(ContextError::InvalidEdit { kind, .. }) if kind == "cue"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("ctx").unwrap().cues().is_empty());
        assert!(scene.calls().is_empty());
    }

    #[test]
    fn export_sorts_cues_by_id() {
        let mut registry = ContextRegistry::new();
        let mut scene = RecordingSceneBackend::default();

        registry.edit("cues", cue_edit("b", [0.0, 2.0, 0.0]), &mut scene).unwrap();
        registry.edit("cues", cue_edit("a", [0.0, 1.0, 0.0]), &mut scene).unwrap();
        registry.edit("cues", cue_edit("B", [0.0, 3.0, 0.0]), &mut scene).unwrap();
        registry
            .edit("cues", ContextEdit::Skybox("Night".to_string()), &mut scene)
            .unwrap();

        let document = registry.export_document("cues").unwrap();
        let ids: Vec<&str> = document.objects.iter().map(|cue| cue.id.as_str()).collect();
        assert_eq!(ids, ["B", "a", "b"]);
        assert_eq!(document.objects[1].position, Some([0.0, 1.0, 0.0]));
        assert_eq!(document.skybox.as_deref(), Some("Night"));
        assert!(registry.export_document("missing").is_none());
    }

    #[derive(Debug, Clone)]
    enum FieldWrite {
        Scene(Option<String>),
        Skybox(String),
    }

    fn field_write() -> impl Strategy<Value = FieldWrite> {
        prop_oneof![
            proptest::option::of("[A-C]").prop_map(FieldWrite::Scene),
            "[X-Z]".prop_map(FieldWrite::Skybox),
        ]
    }

    proptest! {
        #[test]
        fn start_shows_last_written_fields(writes in proptest::collection::vec(field_write(), 1..16)) {
            let mut registry = ContextRegistry::new();
            let mut scene = RecordingSceneBackend::default();
            let mut state = RunState::default();

            let mut expected_scene = None;
            let mut expected_skybox = None;
            for write in &writes {
                let edit = match write.clone() {
                    FieldWrite::Scene(scene) => {
                        expected_scene = scene.clone();
                        ContextEdit::Scene(scene)
                    }
                    FieldWrite::Skybox(name) => {
                        expected_skybox = Some(name.clone());
                        ContextEdit::Skybox(name)
                    }
                };
                registry.edit("ctx", edit, &mut scene).unwrap();
            }

            registry.start("ctx", &mut state, &mut scene).unwrap();
            let context = registry.get("ctx").unwrap();
            prop_assert_eq!(context.scene(), expected_scene.as_deref());
            prop_assert_eq!(scene.active_scene(), expected_scene.as_deref());
            prop_assert_eq!(
                scene.skybox().map(|skybox| skybox.name().to_string()),
                expected_skybox
            );
            prop_assert_eq!(registry.len(), 1);
        }
    }
}
