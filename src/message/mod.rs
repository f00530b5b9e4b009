pub mod edit;

pub use edit::{ContextEdit, CreatePolicy, CueSpec};

use serde_json::{Map, Value};
use thiserror::Error;

/// Context id used when an action names no context.
pub const CURRENT_CONTEXT: &str = "_current";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not a json object")]
    NotAnObject,
    #[error("field `{field}` {reason}")]
    InvalidField { field: String, reason: String },
    #[error("invalid {kind} edit: {reason}")]
    InvalidEdit { kind: String, reason: String },
}

/// One decoded BehaviorMate message: at most one primary command plus an
/// optional fog block that is applied alongside it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub command: Option<Command>,
    pub fog: Option<FogUpdate>,
}

impl Message {
    pub fn is_empty(&self) -> bool {
        self.command.is_none() && self.fog.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Position(PositionUpdate),
    Action { context: String, action: Action },
    View(ViewUpdate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Start,
    Stop,
    Clear,
    EditContext(ContextEdit),
    Unrecognized(String),
}

impl Action {
    pub fn label(&self) -> &str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Clear => "clear",
            Action::EditContext(_) => "editContext",
            Action::Unrecognized(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionUpdate {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewUpdate {
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

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FogUpdate {
    /// `Some(true)` for `start`, `Some(false)` for `stop`.
    pub enabled: Option<bool>,
    pub start: Option<f32>,
    pub end: Option<f32>,
}

pub fn parse(text: &str) -> Result<Message, ParseError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(fields) = value else {
        return Err(ParseError::NotAnObject);
    };

    let command = if let Some(position) = present(&fields, "position") {
        let position = object(position, "position")?;
        Some(Command::Position(PositionUpdate {
            x: optional_f32(position, "x")?,
            y: optional_f32(position, "y")?,
            z: optional_f32(position, "z")?,
        }))
    } else if let Some(action) = present(&fields, "action") {
        Some(parse_action(&fields, action)?)
    } else if let Some(view) = present(&fields, "view") {
        let view = object(view, "view")?;
        Some(Command::View(ViewUpdate {
            top: optional_f32(view, "top")?,
            bottom: optional_f32(view, "bottom")?,
            left: optional_f32(view, "left")?,
            right: optional_f32(view, "right")?,
            near: optional_f32(view, "near")?,
            far: optional_f32(view, "far")?,
            rotation: optional_f32(view, "rotation")?,
            elevation: optional_f32(view, "elevation")?,
            orientation: optional_f32(view, "orientation")?,
        }))
    } else {
        None
    };

    let fog = match present(&fields, "fog") {
        Some(fog) => Some(parse_fog(object(fog, "fog")?)?),
        None => None,
    };

    Ok(Message { command, fog })
}

fn parse_action(fields: &Map<String, Value>, action: &Value) -> Result<Command, ParseError> {
    let Value::String(name) = action else {
        return Err(invalid_field("action", format!("expected a string, found {action}")));
    };
    let context = match present(fields, "context") {
        None => CURRENT_CONTEXT.to_string(),
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        Some(other) => {
            return Err(invalid_field("context", format!("expected a string, found {other}")));
        }
    };

    let action = match name.as_str() {
        "start" => Action::Start,
        "stop" => Action::Stop,
        "clear" => Action::Clear,
        "editContext" => Action::EditContext(ContextEdit::from_fields(fields)?),
        other => Action::Unrecognized(other.to_string()),
    };
    Ok(Command::Action { context, action })
}

fn parse_fog(fog: &Map<String, Value>) -> Result<FogUpdate, ParseError> {
    let enabled = match present(fog, "action") {
        Some(Value::String(action)) if action == "start" => Some(true),
        Some(Value::String(action)) if action == "stop" => Some(false),
        Some(other) => {
            log::debug!("[message] ignoring fog action {other}");
            None
        }
        None => None,
    };
    Ok(FogUpdate {
        enabled,
        start: optional_f32(fog, "start")?,
        end: optional_f32(fog, "end")?,
    })
}

/// Treats explicit `null` the same as a missing key.
fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|value| !value.is_null())
}

fn object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, ParseError> {
    value
        .as_object()
        .ok_or_else(|| invalid_field(field, format!("expected an object, found {value}")))
}

/// Reads a number that may also arrive as a numeric string.
pub(crate) fn optional_f32(
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Option<f32>, ParseError> {
    match present(fields, key) {
        None => Ok(None),
        Some(Value::Number(number)) => number
            .as_f64()
            .map(|value| Some(value as f32))
            .ok_or_else(|| invalid_field(key, format!("is not representable: {number}"))),
        Some(Value::String(text)) => text
            .trim()
            .parse::<f32>()
            .map(Some)
            .map_err(|_| invalid_field(key, format!("is not a number: {text:?}"))),
        Some(other) => Err(invalid_field(key, format!("expected a number, found {other}"))),
    }
}

fn invalid_field(field: &str, reason: String) -> ParseError {
    ParseError::InvalidField {
        field: field.to_string(),
        reason,
    }
}
