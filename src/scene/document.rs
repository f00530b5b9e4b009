use crate::message::{ContextEdit, CueSpec};
use serde::{Deserialize, Serialize};

/// Saved cue layout: the same records a live feed would send as `cue` edits,
/// plus scene-wide skybox and filter settings applied after them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub objects: Vec<CueSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skybox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_filter: Option<String>,
}

impl SceneDocument {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Context id used when replaying a document loaded from `path`.
    pub fn context_name(path: &str) -> String {
        path.replace('/', "_")
    }

    /// Edits in replay order: cues, then skybox, then filter.
    pub fn edits(&self) -> Vec<ContextEdit> {
        let mut edits: Vec<ContextEdit> = self.objects.iter().cloned().map(ContextEdit::Cue).collect();
        if let Some(skybox) = &self.skybox {
            edits.push(ContextEdit::Skybox(skybox.clone()));
        }
        if let Some(filter) = &self.apply_filter {
            edits.push(ContextEdit::Filter {
                id: filter.clone(),
                value: None,
            });
        }
        edits
    }
}
