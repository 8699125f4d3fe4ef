// src/ingest/normalize.rs
//! Raw event file → `NormalizedEvent`.
//!
//! Raw files are untrusted JSON. The record may be wrapped as
//! `{ "payload": {...}, "receivedAt": ... }` or be the payload itself.
//! Field extraction never fails: missing, `null` or incompatible values
//! become `None`. Only an unreadable document rejects the source.

use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

use super::types::NormalizedEvent;
use crate::error::{PipelineError, Result};

const PAYLOAD_KEY: &str = "payload";
const RECEIVED_AT_KEY: &str = "receivedAt";

#[derive(Error, Debug)]
pub enum RejectReason {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("top-level value is not an object")]
    NotAnObject,
    #[error("`payload` is present but is not an object")]
    PayloadNotAnObject,
}

/// Parse and normalize the bytes of one source file.
pub fn parse_source(path: &Path, bytes: &[u8]) -> Result<NormalizedEvent> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(RejectReason::from)
        .map_err(|e| reject(path, e))?;
    normalize_record(&value).map_err(|e| reject(path, e))
}

fn reject(path: &Path, reason: RejectReason) -> PipelineError {
    PipelineError::SourceParse {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Normalize one already-parsed record.
pub fn normalize_record(record: &Value) -> std::result::Result<NormalizedEvent, RejectReason> {
    let envelope = record.as_object().ok_or(RejectReason::NotAnObject)?;
    let payload = match envelope.get(PAYLOAD_KEY) {
        Some(Value::Object(inner)) => inner,
        Some(_) => return Err(RejectReason::PayloadNotAnObject),
        None => envelope,
    };

    let timestamp = match payload.get("timestamp") {
        Some(ts) => text(Some(ts)),
        None => text(envelope.get(RECEIVED_AT_KEY)),
    };

    Ok(NormalizedEvent {
        user_id: text(payload.get("user_id")),
        session_id: text(payload.get("session_id")),
        timestamp,
        exercise_id: text(payload.get("exercise_id")),
        exercise_key: key(payload),
        sets: whole(payload.get("sets")),
        reps: whole(payload.get("reps")),
        weight_kg: real(payload.get("weight_kg")),
        rpe: real(payload.get("rpe")),
        duration_min: real(payload.get("duration_min")),
        completed: flag(payload.get("completed")),
    })
}

/// Aggregation keys are stored trimmed so the log and the aggregate table
/// agree on one spelling.
fn key(payload: &Map<String, Value>) -> Option<String> {
    let raw = text(payload.get("exercise_key"))?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn whole(value: Option<&Value>) -> Option<u32> {
    let f = match value {
        Some(Value::Number(n)) => {
            if let Some(u) = n.as_u64() {
                return u32::try_from(u).ok();
            }
            n.as_f64()?
        }
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}

fn real(value: Option<&Value>) -> Option<f64> {
    let f = match value {
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

fn flag(value: Option<&Value>) -> Option<bool> {
    match value {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
