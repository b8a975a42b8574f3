//! Export request values

use serde_json::Value;

/// Gain used when a track has no usable volume
pub const DEFAULT_VOLUME: f64 = 1.0;

/// Outcome of reading one entry of the `volumes` object
///
/// Unusable values do not fail the export: they fall back to
/// [`DEFAULT_VOLUME`] and the caller logs the rejected value.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeSetting {
    /// A finite number, given as a JSON number or a numeric string
    Explicit(f64),
    /// No entry (or `null`) for this track
    Default,
    /// Present but unusable; holds the rejected value for logging
    Fallback(String),
}

impl VolumeSetting {
    pub fn parse(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => VolumeSetting::Default,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v.is_finite() => VolumeSetting::Explicit(v),
                _ => VolumeSetting::Fallback(n.to_string()),
            },
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => VolumeSetting::Explicit(v),
                _ => VolumeSetting::Fallback(s.clone()),
            },
            Some(other) => VolumeSetting::Fallback(other.to_string()),
        }
    }

    /// Linear gain to apply
    pub fn gain(&self) -> f64 {
        match self {
            VolumeSetting::Explicit(v) => *v,
            VolumeSetting::Default | VolumeSetting::Fallback(_) => DEFAULT_VOLUME,
        }
    }
}
