//! Canonical prediction shape consumed by the UI, whatever the upstream returned.

use serde::{Deserialize, Serialize};

/// Fixed half-width of the displayed age range.
pub const AGE_MARGIN: u32 = 3;

/// Age reported when the upstream response carries no age-like field.
pub const FALLBACK_AGE: u32 = 25;

/// Confidence reported when the upstream response carries none.
pub const FALLBACK_CONFIDENCE: f64 = 0.8;

/// Face count reported when the upstream response carries none.
pub const FALLBACK_FACES_COUNT: u32 = 1;

/// Input resolution (square edge, px) the upstream model is documented to use.
pub const MODEL_INPUT_SIZE: u32 = 224;

/// Factor the model's raw output is multiplied by to obtain years.
pub const MODEL_SCALING_FACTOR: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Lenient parse used for upstream values ("M", "female", "Man", ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "man" => Some(Self::Male),
            "female" | "f" | "woman" => Some(Self::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub input_size: u32,
    pub scaling_factor: f64,
    pub margin: u32,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            input_size: MODEL_INPUT_SIZE,
            scaling_factor: MODEL_SCALING_FACTOR,
            margin: AGE_MARGIN,
        }
    }
}

/// The single result schema the UI renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizedPrediction {
    pub age: u32,
    pub age_min: u32,
    pub age_max: u32,
    pub age_range: String,
    pub confidence: f64,
    pub raw_prediction: f64,
    pub gender: Option<Gender>,
    pub message: String,
    pub model_info: ModelInfo,
    pub timestamp: String,
    pub faces_count: u32,
}

impl NormalizedPrediction {
    /// Build a prediction whose range fields are derived from `age`.
    pub fn new(age: u32, confidence: f64) -> Self {
        let mut prediction = Self {
            age,
            age_min: 0,
            age_max: 0,
            age_range: String::new(),
            confidence: clamp_confidence(confidence),
            raw_prediction: f64::from(age) / MODEL_SCALING_FACTOR,
            gender: None,
            message: default_message(age),
            model_info: ModelInfo::default(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            faces_count: FALLBACK_FACES_COUNT,
        };
        prediction.derive_range();
        prediction
    }

    /// Recompute `age_min`, `age_max` and `age_range` from `age`.
    ///
    /// Always applied, including to upstream payloads that already carry a range.
    pub fn derive_range(&mut self) {
        let (min, max) = age_bounds(self.age);
        self.age_min = min;
        self.age_max = max;
        self.age_range = format!("{min}-{max}");
        self.model_info.margin = AGE_MARGIN;
    }
}

/// `[age - margin, age + margin]`, floored at zero.
pub fn age_bounds(age: u32) -> (u32, u32) {
    (age.saturating_sub(AGE_MARGIN), age.saturating_add(AGE_MARGIN))
}

pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn default_message(age: u32) -> String {
    format!("Estimated age: {age} years")
}

/// Envelope returned by `POST /api/detect-age`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<NormalizedPrediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl DetectResponse {
    pub fn ok(result: NormalizedPrediction) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
