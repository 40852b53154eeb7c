//! Field resolver: maps the schema-free upstream document onto `NormalizedPrediction`.
//!
//! Each canonical field owns an ordered list of candidate JSON paths. The first path
//! that resolves to a non-null value wins; absent fields fall back to fixed defaults.

use serde_json::Value;

use crate::prediction::{
    clamp_confidence, default_message, Gender, ModelInfo, NormalizedPrediction, FALLBACK_AGE,
    FALLBACK_CONFIDENCE, FALLBACK_FACES_COUNT, MODEL_SCALING_FACTOR,
};

/// Canonical fields the resolver knows how to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    Age,
    Confidence,
    Gender,
    RawPrediction,
    Timestamp,
    FacesCount,
    Message,
    ModelInfo,
}

impl CanonicalField {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Confidence => "confidence",
            Self::Gender => "gender",
            Self::RawPrediction => "raw_prediction",
            Self::Timestamp => "timestamp",
            Self::FacesCount => "faces_count",
            Self::Message => "message",
            Self::ModelInfo => "model_info",
        }
    }
}

type Path = &'static [&'static str];

/// One row of the resolver table.
pub struct FieldRule {
    pub field: CanonicalField,
    pub candidates: &'static [Path],
}

/// Lookup order per field: top level, then nested under `result`, then aliases.
pub const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field: CanonicalField::Age,
        candidates: &[
            &["age"],
            &["result", "age"],
            &["predicted_age"],
            &["result", "predicted_age"],
        ],
    },
    FieldRule {
        field: CanonicalField::Confidence,
        candidates: &[&["confidence"], &["result", "confidence"]],
    },
    FieldRule {
        field: CanonicalField::Gender,
        candidates: &[&["gender"], &["result", "gender"]],
    },
    FieldRule {
        field: CanonicalField::RawPrediction,
        candidates: &[&["raw_prediction"], &["result", "raw_prediction"]],
    },
    FieldRule {
        field: CanonicalField::Timestamp,
        candidates: &[&["timestamp"], &["result", "timestamp"]],
    },
    FieldRule {
        field: CanonicalField::FacesCount,
        candidates: &[&["faces_count"], &["result", "faces_count"]],
    },
    FieldRule {
        field: CanonicalField::Message,
        candidates: &[&["message"], &["result", "message"]],
    },
    FieldRule {
        field: CanonicalField::ModelInfo,
        candidates: &[&["model_info"], &["result", "model_info"]],
    },
];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ResolveError {
    #[error("Upstream response is not a JSON object")]
    NotAnObject,
    #[error("Upstream field '{field}' has unusable value {found}")]
    InvalidField { field: &'static str, found: String },
}

/// Follow `path` through nested objects. Null counts as absent.
fn lookup<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = doc;
    for key in path {
        current = current.as_object()?.get(*key)?;
    }
    (!current.is_null()).then_some(current)
}

/// First non-null candidate for `field`, in table order.
pub fn resolve(doc: &Value, field: CanonicalField) -> Option<&Value> {
    FIELD_RULES
        .iter()
        .find(|rule| rule.field == field)
        .and_then(|rule| rule.candidates.iter().find_map(|path| lookup(doc, path)))
}

/// Numbers, and strings that parse as numbers.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn invalid(field: CanonicalField, value: &Value) -> ResolveError {
    let found: String = value.to_string().chars().take(64).collect();
    ResolveError::InvalidField {
        field: field.name(),
        found,
    }
}

fn resolve_number(doc: &Value, field: CanonicalField) -> Result<Option<f64>, ResolveError> {
    match resolve(doc, field) {
        None => Ok(None),
        Some(value) => as_number(value).map(Some).ok_or_else(|| invalid(field, value)),
    }
}

fn resolve_string(doc: &Value, field: CanonicalField) -> Option<String> {
    resolve(doc, field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Canonical payload already present at the top level or under `result`.
fn canonical_passthrough(doc: &Value) -> Option<NormalizedPrediction> {
    [Some(doc), doc.get("result")]
        .into_iter()
        .flatten()
        .find_map(|candidate| serde_json::from_value::<NormalizedPrediction>(candidate.clone()).ok())
}

/// Reshape an upstream document into the canonical prediction.
pub fn normalize(doc: &Value) -> Result<NormalizedPrediction, ResolveError> {
    if !doc.is_object() {
        return Err(ResolveError::NotAnObject);
    }

    if let Some(mut prediction) = canonical_passthrough(doc) {
        prediction.confidence = clamp_confidence(prediction.confidence);
        prediction.derive_range();
        return Ok(prediction);
    }

    let age = match resolve_number(doc, CanonicalField::Age)? {
        Some(raw) if raw >= 0.0 => raw.round() as u32,
        Some(_) => {
            let value = resolve(doc, CanonicalField::Age).unwrap_or(&Value::Null);
            return Err(invalid(CanonicalField::Age, value));
        }
        None => FALLBACK_AGE,
    };

    let confidence = resolve_number(doc, CanonicalField::Confidence)?.unwrap_or(FALLBACK_CONFIDENCE);

    let mut prediction = NormalizedPrediction::new(age, confidence);

    prediction.gender = resolve_string(doc, CanonicalField::Gender)
        .as_deref()
        .and_then(Gender::parse);

    prediction.raw_prediction = resolve_number(doc, CanonicalField::RawPrediction)?
        .unwrap_or(f64::from(age) / MODEL_SCALING_FACTOR);

    if let Some(timestamp) = resolve_string(doc, CanonicalField::Timestamp) {
        prediction.timestamp = timestamp;
    }

    prediction.faces_count = match resolve_number(doc, CanonicalField::FacesCount)? {
        Some(count) if count >= 0.0 => count.round() as u32,
        Some(_) => 0,
        None => FALLBACK_FACES_COUNT,
    };

    prediction.message =
        resolve_string(doc, CanonicalField::Message).unwrap_or_else(|| default_message(age));

    prediction.model_info = resolve(doc, CanonicalField::ModelInfo)
        .and_then(|v| serde_json::from_value::<ModelInfo>(v.clone()).ok())
        .unwrap_or_default();

    prediction.derive_range();
    Ok(prediction)
}
