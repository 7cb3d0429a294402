//! Request-level overrides: raw string/number coercion and range checks.
//!
//! Form posts deliver every field as text while JSON bodies may send either
//! numbers or strings. [`RawOverrides`] accepts both shapes; parsing it into
//! [`SamplingOverrides`] coerces each value to its numeric type and enforces
//! the profile ranges. Blank strings count as absent, anything else that does
//! not parse (including JSON booleans, arrays and objects) is an error naming
//! the field.

use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::params::Role;

/// A field value as it arrived on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(serde_json::Number),
    Text(String),
    /// Any other JSON value. Always rejected during coercion.
    Other(serde_json::Value),
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{n}"),
            RawValue::Text(t) => f.write_str(t),
            RawValue::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_owned())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(RawValue::Number)
            .unwrap_or_else(|| RawValue::Text(value.to_string()))
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value.into())
    }
}

/// Override fields before coercion. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawOverrides {
    #[serde(default)]
    pub role: Option<RawValue>,
    #[serde(default, alias = "modelPath")]
    pub model_path: Option<RawValue>,
    #[serde(default)]
    pub temperature: Option<RawValue>,
    #[serde(default, alias = "maxTokens")]
    pub max_tokens: Option<RawValue>,
    #[serde(default, alias = "topP")]
    pub top_p: Option<RawValue>,
    #[serde(default, alias = "topK")]
    pub top_k: Option<RawValue>,
    #[serde(default)]
    pub seed: Option<RawValue>,
    #[serde(default, alias = "stopSequences")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Coerced and range-checked overrides.
///
/// Integer fields are kept as `i64` so a negative input reaches the range
/// check instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct SamplingOverrides {
    #[validate(range(min = 0.0, message = "must be greater than or equal to 0"))]
    pub temperature: Option<f32>,
    #[validate(range(min = 1i64, max = 4294967295i64, message = "must be a positive integer"))]
    pub max_tokens: Option<i64>,
    #[validate(range(min = 0.0, max = 1.0, message = "must be between 0 and 1"))]
    pub top_p: Option<f32>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "must be a non-negative integer"))]
    pub top_k: Option<i64>,
    #[validate(range(max = 4294967295i64, message = "must fit in 32 bits"))]
    pub seed: Option<i64>,
    pub model_path: Option<String>,
    pub stop_sequences: Option<Vec<String>>,
}

impl SamplingOverrides {
    /// Check the profile ranges. Used for values that did not come through
    /// [`RawOverrides::parse`], such as admin profile edits.
    pub fn validated(self) -> Result<Self, OverrideError> {
        for (field, value) in [("temperature", self.temperature), ("top_p", self.top_p)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(OverrideError::OutOfRange {
                    field: field.to_owned(),
                    reason: "must be a finite number".to_owned(),
                });
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens.and_then(|v| u32::try_from(v).ok())
    }

    pub fn top_k(&self) -> Option<u32> {
        self.top_k.and_then(|v| u32::try_from(v).ok())
    }

    /// Requested seed. `Some(None)` asks for a random seed explicitly, which
    /// still takes precedence over a profile seed.
    pub fn seed(&self) -> Option<Option<u32>> {
        self.seed.map(|v| u32::try_from(v).ok())
    }

    pub fn model_path(&self) -> Option<&str> {
        self.model_path.as_deref()
    }

    pub fn stop_sequences(&self) -> Option<&[String]> {
        self.stop_sequences.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OverrideError {
    #[error("{field}: expected {expected}, got '{value}'")]
    InvalidValue {
        field: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{field}: {reason}")]
    OutOfRange { field: String, reason: String },

    #[error("role: unknown role '{0}'")]
    UnknownRole(String),
}

impl From<ValidationErrors> for OverrideError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        match fields.into_iter().next() {
            Some((field, errs)) => {
                let reason = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "out of range".to_owned());
                OverrideError::OutOfRange {
                    field: field.to_string(),
                    reason,
                }
            }
            None => OverrideError::OutOfRange {
                field: "overrides".to_owned(),
                reason: errors.to_string(),
            },
        }
    }
}

impl RawOverrides {
    /// Split out the role and coerce the remaining fields.
    pub fn parse(self) -> Result<(Role, SamplingOverrides), OverrideError> {
        let role = match coerce_text("role", self.role)? {
            Some(r) => r.parse::<Role>().map_err(|_| OverrideError::UnknownRole(r))?,
            None => Role::default(),
        };

        let overrides = SamplingOverrides {
            temperature: coerce_float("temperature", self.temperature)?,
            max_tokens: coerce_int("max_tokens", self.max_tokens)?,
            top_p: coerce_float("top_p", self.top_p)?,
            top_k: coerce_int("top_k", self.top_k)?,
            seed: coerce_int("seed", self.seed)?,
            model_path: coerce_text("model_path", self.model_path)?,
            stop_sequences: self.stop_sequences.filter(|s| !s.is_empty()),
        };

        Ok((role, overrides.validated()?))
    }
}

/// A validated prompt plus the role and overrides to resolve it with.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationInput {
    pub prompt: String,
    pub role: Role,
    pub overrides: SamplingOverrides,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("Prompt is required")]
    EmptyPrompt,

    #[error(transparent)]
    Override(#[from] OverrideError),
}

impl GenerationInput {
    /// Validate the prompt first, then the overrides. The prompt is trimmed.
    pub fn parse(prompt: Option<&str>, raw: RawOverrides) -> Result<Self, InputError> {
        let prompt = prompt.map(str::trim).unwrap_or_default();
        if prompt.is_empty() {
            return Err(InputError::EmptyPrompt);
        }

        let (role, overrides) = raw.parse()?;
        Ok(Self {
            prompt: prompt.to_owned(),
            role,
            overrides,
        })
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn coerce_text(field: &'static str, raw: Option<RawValue>) -> Result<Option<String>, OverrideError> {
    match raw {
        None => Ok(None),
        Some(RawValue::Text(t)) => {
            let t = t.trim();
            Ok((!t.is_empty()).then(|| t.to_owned()))
        }
        Some(other) => Err(OverrideError::InvalidValue {
            field,
            expected: "a string",
            value: other.to_string(),
        }),
    }
}

fn coerce_float(field: &'static str, raw: Option<RawValue>) -> Result<Option<f32>, OverrideError> {
    let invalid = |value: String| OverrideError::InvalidValue {
        field,
        expected: "a number",
        value,
    };

    let value = match raw {
        None => return Ok(None),
        Some(RawValue::Number(n)) => n.as_f64().ok_or_else(|| invalid(n.to_string()))?,
        Some(RawValue::Text(t)) => {
            let t = t.trim();
            if t.is_empty() {
                return Ok(None);
            }
            t.parse::<f64>().map_err(|_| invalid(t.to_owned()))?
        }
        Some(other) => return Err(invalid(other.to_string())),
    };

    // 1e39 is a finite f64 but overflows f32.
    let narrowed = value as f32;
    if !narrowed.is_finite() {
        return Err(invalid(value.to_string()));
    }
    Ok(Some(narrowed))
}

fn coerce_int(field: &'static str, raw: Option<RawValue>) -> Result<Option<i64>, OverrideError> {
    let invalid = |value: String| OverrideError::InvalidValue {
        field,
        expected: "an integer",
        value,
    };

    match raw {
        None => Ok(None),
        Some(RawValue::Number(n)) => match n.as_i64() {
            Some(v) => Ok(Some(v)),
            // 200.0 is accepted, 200.5 is not.
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                _ => Err(invalid(n.to_string())),
            },
        },
        Some(RawValue::Text(t)) => {
            let t = t.trim();
            if t.is_empty() {
                return Ok(None);
            }
            t.parse::<i64>().map(Some).map_err(|_| invalid(t.to_owned()))
        }
        Some(other) => Err(invalid(other.to_string())),
    }
}
