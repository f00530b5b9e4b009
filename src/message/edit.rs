use super::{ParseError, optional_f32};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const EDIT_CUE: &str = "cue";
pub const EDIT_MOVE_CUE: &str = "move_cue";
pub const EDIT_SKYBOX: &str = "skybox";
pub const EDIT_SCENE: &str = "scene";
pub const EDIT_FILTER: &str = "filter";

/// Placement record for one cue, in the sender's axis convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "Position", default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
    #[serde(rename = "Rotation", default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 3]>,
    #[serde(rename = "Scale", default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

impl CueSpec {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            position: None,
            rotation: None,
            scale: None,
            material: None,
        }
    }

    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.position = Some(position);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct MoveCueSpec {
    id: String,
    #[serde(rename = "Position")]
    position: [f32; 3],
}

/// Whether an edit may register a context that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePolicy {
    Create,
    Existing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextEdit {
    Cue(CueSpec),
    MoveCue { id: String, position: [f32; 3] },
    Skybox(String),
    /// `None` removes the scene binding.
    Scene(Option<String>),
    Filter { id: String, value: Option<f32> },
    /// A known edit type whose payload could not be read. The context is
    /// still registered before the edit is refused.
    Invalid { kind: String, reason: String },
    Unrecognized(String),
}

impl ContextEdit {
    pub fn create_policy(&self) -> CreatePolicy {
        match self {
            ContextEdit::MoveCue { .. } => CreatePolicy::Existing,
            _ => CreatePolicy::Create,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ContextEdit::Cue(_) => EDIT_CUE,
            ContextEdit::MoveCue { .. } => EDIT_MOVE_CUE,
            ContextEdit::Skybox(_) => EDIT_SKYBOX,
            ContextEdit::Scene(_) => EDIT_SCENE,
            ContextEdit::Filter { .. } => EDIT_FILTER,
            ContextEdit::Invalid { kind, .. } => kind,
            ContextEdit::Unrecognized(kind) => kind,
        }
    }

    fn invalid(kind: &str, err: ParseError) -> Self {
        let reason = match err {
            ParseError::InvalidEdit { reason, .. } => reason,
            other => other.to_string(),
        };
        ContextEdit::Invalid {
            kind: kind.to_string(),
            reason,
        }
    }

    pub(crate) fn from_fields(fields: &Map<String, Value>) -> Result<Self, ParseError> {
        let kind = match fields.get("type") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => {
                return Err(ParseError::InvalidField {
                    field: "type".to_string(),
                    reason: format!("expected a string, found {other}"),
                });
            }
            None => {
                return Err(ParseError::InvalidEdit {
                    kind: "editContext".to_string(),
                    reason: "missing `type`".to_string(),
                });
            }
        };

        match kind {
            EDIT_CUE => Ok(required(fields, kind, "object")
                .and_then(|object| {
                    serde_json::from_value::<CueSpec>(object.clone())
                        .map_err(|err| invalid_edit(kind, err.to_string()))
                })
                .map_or_else(|err| ContextEdit::invalid(kind, err), ContextEdit::Cue)),
            EDIT_MOVE_CUE => {
                let object = required(fields, kind, "object")?;
                let spec: MoveCueSpec = serde_json::from_value(object.clone())
                    .map_err(|err| invalid_edit(kind, err.to_string()))?;
                Ok(ContextEdit::MoveCue {
                    id: spec.id,
                    position: spec.position,
                })
            }
            EDIT_SKYBOX => Ok(match required(fields, kind, "skybox") {
                Ok(Value::String(name)) => ContextEdit::Skybox(name.clone()),
                Ok(other) => ContextEdit::invalid(
                    kind,
                    invalid_edit(kind, format!("`skybox` must be a string, found {other}")),
                ),
                Err(err) => ContextEdit::invalid(kind, err),
            }),
            EDIT_SCENE => match fields.get("scene") {
                None | Some(Value::Null) => Ok(ContextEdit::Scene(None)),
                Some(Value::String(name)) if name.is_empty() => Ok(ContextEdit::Scene(None)),
                Some(Value::String(name)) => Ok(ContextEdit::Scene(Some(name.clone()))),
                Some(other) => Err(invalid_edit(kind, format!("`scene` must be a string, found {other}"))),
            },
            EDIT_FILTER => {
                let id = match required(fields, kind, "id") {
                    Ok(Value::String(id)) => id.clone(),
                    Ok(other) => {
                        let err = invalid_edit(kind, format!("`id` must be a string, found {other}"));
                        return Ok(ContextEdit::invalid(kind, err));
                    }
                    Err(err) => return Ok(ContextEdit::invalid(kind, err)),
                };
                Ok(match optional_f32(fields, "value") {
                    Ok(value) => ContextEdit::Filter { id, value },
                    Err(err) => ContextEdit::invalid(kind, err),
                })
            }
            other => Ok(ContextEdit::Unrecognized(other.to_string())),
        }
    }
}

fn required<'a>(
    fields: &'a Map<String, Value>,
    kind: &str,
    field: &str,
) -> Result<&'a Value, ParseError> {
    match fields.get(field) {
        Some(Value::Null) | None => Err(invalid_edit(kind, format!("missing `{field}`"))),
        Some(value) => Ok(value),
    }
}

fn invalid_edit(kind: &str, reason: String) -> ParseError {
    ParseError::InvalidEdit {
        kind: kind.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn edit(value: Value) -> Result<ContextEdit, ParseError> {
        match value {
            Value::Object(fields) => ContextEdit::from_fields(&fields),
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn cue_edit_decodes_full_object() {
        let parsed = edit(json!({
            "type": "cue",
            "object": {
                "id": "tower",
                "type": "Cylinder",
                "Position": [1.0, 2.0, 3.0],
                "Rotation": [0.0, 90.0, 0.0],
                "Scale": [1.0, 1.0, 4.0],
                "material": "Stripes"
            }
        }))
        .expect("valid cue edit");

        let ContextEdit::Cue(spec) = parsed else {
            panic!("expected cue edit");
        };
        assert_eq!(spec.id, "tower");
        assert_eq!(spec.kind, "Cylinder");
        assert_eq!(spec.position, Some([1.0, 2.0, 3.0]));
        assert_eq!(spec.rotation, Some([0.0, 90.0, 0.0]));
        assert_eq!(spec.scale, Some([1.0, 1.0, 4.0]));
        assert_eq!(spec.material.as_deref(), Some("Stripes"));
    }

    #[test]
    fn unreadable_cue_still_registers_context() {
        for payload in [
            json!({"type": "cue", "object": {"type": "Cube"}}),
            json!({"type": "cue", "object": {"id": "A", "Position": [1, 2, 3]}}),
            json!({"type": "cue"}),
        ] {
            let parsed = edit(payload).expect("cue payload errors are deferred");
            assert!(matches!(&parsed, ContextEdit::Invalid { kind, .. } if kind == "cue"));
            assert_eq!(parsed.create_policy(), CreatePolicy::Create);
        }
    }

    #[test]
    fn move_cue_requires_position() {
        let ok = edit(json!({
            "type": "move_cue",
            "object": {"id": "A", "Position": [4, 5, 6]}
        }))
        .expect("valid move");
        assert_eq!(
            ok,
            ContextEdit::MoveCue {
                id: "A".to_string(),
                position: [4.0, 5.0, 6.0]
            }
        );
        assert_eq!(ok.create_policy(), CreatePolicy::Existing);

        assert!(edit(json!({"type": "move_cue", "object": {"id": "A"}})).is_err());
    }

    #[test]
    fn scene_edit_accepts_clearing() {
        assert_eq!(
            edit(json!({"type": "scene", "scene": "Track"})).unwrap(),
            ContextEdit::Scene(Some("Track".to_string()))
        );
        assert_eq!(
            edit(json!({"type": "scene", "scene": ""})).unwrap(),
            ContextEdit::Scene(None)
        );
        assert_eq!(edit(json!({"type": "scene"})).unwrap(), ContextEdit::Scene(None));
    }

    #[test]
    fn filter_value_accepts_numeric_strings() {
        assert_eq!(
            edit(json!({"type": "filter", "id": "blur", "value": "0.5"})).unwrap(),
            ContextEdit::Filter {
                id: "blur".to_string(),
                value: Some(0.5)
            }
        );
        assert!(matches!(
            edit(json!({"type": "filter", "id": "blur", "value": "lots"})).unwrap(),
            ContextEdit::Invalid { ref kind, .. } if kind == "filter"
        ));
    }

    #[test]
    fn unknown_type_is_kept_for_logging() {
        let parsed = edit(json!({"type": "teleport"})).unwrap();
        assert_eq!(parsed, ContextEdit::Unrecognized("teleport".to_string()));
        assert_eq!(parsed.kind(), "teleport");
        assert_eq!(parsed.create_policy(), CreatePolicy::Create);
    }
}
