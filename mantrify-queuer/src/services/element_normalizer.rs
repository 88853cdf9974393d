//! Element normalizer
//!
//! Turns a submission (uploaded CSV name or inline array) into a validated,
//! order-preserving element sequence. Every element is checked and all
//! problems are reported together.

use mantrify_common::{Error, Result, ValidationIssue};
use serde_json::{Map, Value};
use std::path::Path;

use crate::models::{Element, MeditationRequest, Numeric};
use crate::services::csv_files;

/// Validated submission ready to be enqueued
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub user_id: i64,
    pub elements: Vec<Element>,
}

/// Validate a request body and load its elements
///
/// CSV names resolve under `user_request_dir`.
pub fn normalize_request(
    request: &MeditationRequest,
    user_request_dir: &Path,
) -> Result<NormalizedRequest> {
    let user_id = parse_user_id(request.user_id.as_ref())?;

    let filename = match &request.filename_csv {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) if name.trim().is_empty() => None,
        Some(Value::String(name)) => Some(name.trim()),
        Some(_) => return Err(Error::validation("filenameCsv must be a string")),
    };
    let array = match &request.meditation_array {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(items),
        Some(_) => return Err(Error::validation("meditationArray must be an array")),
    };

    let elements = match (filename, array) {
        (Some(_), Some(_)) => {
            return Err(Error::validation(
                "Cannot provide both filenameCsv and meditationArray",
            ))
        }
        (None, None) => {
            return Err(Error::validation(
                "Either filenameCsv or meditationArray must be provided",
            ))
        }
        (Some(name), None) => load_request_csv(user_request_dir, name)?,
        (None, Some(items)) => normalize_values(items, "meditationArray")?,
    };

    Ok(NormalizedRequest { user_id, elements })
}

fn parse_user_id(value: Option<&Value>) -> Result<i64> {
    match value {
        None | Some(Value::Null) => Err(Error::validation("userId is required")),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(id) if id > 0 => Ok(id),
            _ => Err(Error::validation("userId must be a positive number")),
        },
        Some(_) => Err(Error::validation("userId must be a positive number")),
    }
}

/// Read and validate an uploaded request file
///
/// The name must be a bare file name; anything that could escape the upload
/// directory is rejected before touching the filesystem.
pub fn load_request_csv(user_request_dir: &Path, filename: &str) -> Result<Vec<Element>> {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(Error::validation(format!(
            "filenameCsv must be a plain file name: {}",
            filename
        )));
    }

    let path = user_request_dir.join(filename);
    tracing::info!(path = %path.display(), "Reading request CSV");
    let rows = csv_files::read_element_rows(&path).map_err(|e| match e {
        Error::NotFound(_) => Error::NotFound(format!("CSV file not found: {}", filename)),
        other => other,
    })?;

    normalize_values(&rows, "filenameCsv")
}

/// Validate raw elements, aggregating every problem into one error
pub fn normalize_values(items: &[Value], source: &str) -> Result<Vec<Element>> {
    if items.is_empty() {
        return Err(Error::validation(format!("{} cannot be empty", source)));
    }

    let mut elements = Vec::with_capacity(items.len());
    let mut issues = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match normalize_element(item) {
            Ok(element) => elements.push(element),
            Err(messages) => issues.extend(
                messages
                    .into_iter()
                    .map(|message| ValidationIssue::new(index, message)),
            ),
        }
    }

    if !issues.is_empty() {
        return Err(Error::Validation {
            message: format!("{} validation failed", source),
            details: issues,
        });
    }

    Ok(elements)
}

/// Validate one raw element, collecting all of its problems
fn normalize_element(item: &Value) -> std::result::Result<Element, Vec<String>> {
    let Some(fields) = item.as_object() else {
        return Err(vec!["Element must be an object".to_string()]);
    };

    let Some(id) = identifier(fields.get("id")) else {
        return Err(vec!["Element is missing required field: id".to_string()]);
    };

    let mut problems = Vec::new();

    let text = text_field(fields, "text", &mut problems);
    let voice_id = text_field(fields, "voice_id", &mut problems);
    let sound_file = text_field(fields, "sound_file", &mut problems);
    let speed = numeric_field(fields, "speed", &mut problems);
    let pause_duration = numeric_field(fields, "pause_duration", &mut problems);

    let has_pause = pause_duration.is_some() || is_present(fields.get("pause_duration"));
    let has_speed = speed.is_some() || is_present(fields.get("speed"));

    if text.is_none() && !has_pause && sound_file.is_none() {
        problems.push(
            "Element must have at least one of: text, pause_duration, or sound_file".to_string(),
        );
    }

    if sound_file.is_some() && (text.is_some() || voice_id.is_some() || has_speed || has_pause) {
        problems.push(
            "sound_file cannot be used with text, voice_id, speed, or pause_duration in the same element"
                .to_string(),
        );
    }

    if !problems.is_empty() {
        return Err(problems);
    }

    Ok(Element {
        id,
        text,
        voice_id,
        speed,
        pause_duration,
        sound_file,
    })
}

/// Ids may be strings or numbers
fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-blank values count as present even when they are invalid
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn text_field(fields: &Map<String, Value>, name: &str, problems: &mut Vec<String>) -> Option<String> {
    match fields.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(_) => {
            problems.push(format!("{} must be a string", name));
            None
        }
    }
}

fn numeric_field(
    fields: &Map<String, Value>,
    name: &str,
    problems: &mut Vec<String>,
) -> Option<Numeric> {
    let raw = match fields.get(name) {
        None | Some(Value::Null) => return None,
        Some(Value::String(s)) if s.trim().is_empty() => return None,
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => {
            problems.push(format!("{} must be a number", name));
            return None;
        }
    };

    let parsed = Numeric::parse(&raw);
    if parsed.is_none() {
        problems.push(format!("{} must be a number", name));
    }
    parsed
}
