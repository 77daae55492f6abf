//! Sampling parameter adjustments: per-model rules and range clamping.

use serde_json::{Number, Value};

use super::body::RequestBody;
use super::stage::{StageError, StageReport};

/// Adjustment applied to a request for a specific model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Upstream rejects `temperature` and `top_p` together for this model.
    DropTopPWhenTemperatureSet,
}

#[derive(Debug, Clone, Copy)]
pub struct ParameterRule {
    pub model: &'static str,
    pub action: RuleAction,
}

pub const PARAMETER_RULES: &[ParameterRule] = &[ParameterRule {
    model: "claude-opus-4-1-20250805",
    action: RuleAction::DropTopPWhenTemperatureSet,
}];

/// Apply every rule matching the request's model.
pub fn apply_parameter_rules(
    body: &mut RequestBody,
    rules: &[ParameterRule],
) -> Result<StageReport, StageError> {
    let Some(model) = body.model_name().filter(|m| !m.is_empty()) else {
        return Ok(StageReport::Unchanged);
    };
    let model = model.to_string();

    let mut applied = Vec::new();
    for rule in rules.iter().filter(|r| r.model == model) {
        match rule.action {
            RuleAction::DropTopPWhenTemperatureSet => {
                if body.temperature.is_some() && body.top_p.take().is_some() {
                    applied.push(format!("removed top_p alongside temperature for {model}"));
                }
            }
        }
    }

    if applied.is_empty() {
        Ok(StageReport::Unchanged)
    } else {
        Ok(StageReport::Changed(applied.join("; ")))
    }
}

/// Inclusive range a sampling parameter is held to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

pub const TEMPERATURE_BOUNDS: Bounds = Bounds { min: 0.0, max: 1.0 };
pub const TOP_P_BOUNDS: Bounds = Bounds { min: 0.0, max: 1.0 };
pub const MAX_TOKENS_BOUNDS: Bounds = Bounds {
    min: 4096.0,
    max: 64000.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampOutcome {
    Absent,
    InRange,
    Raised,
    Lowered,
    /// Non-numeric value replaced by the upper bound.
    Coerced,
}

/// Hold `slot` within `bounds`.
///
/// In-range numbers are left exactly as written. Anything that is not a
/// number becomes the upper bound.
pub fn clamp_field(slot: &mut Option<Value>, bounds: Bounds) -> ClampOutcome {
    let Some(value) = slot.as_mut() else {
        return ClampOutcome::Absent;
    };

    let outcome = match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f < bounds.min => ClampOutcome::Raised,
            Some(f) if f > bounds.max => ClampOutcome::Lowered,
            Some(_) => ClampOutcome::InRange,
            // Beyond f64 range; only the sign is meaningful.
            None if n.to_string().starts_with('-') => ClampOutcome::Raised,
            None => ClampOutcome::Lowered,
        },
        _ => ClampOutcome::Coerced,
    };

    match outcome {
        ClampOutcome::Raised => *value = bound_value(bounds.min),
        ClampOutcome::Lowered | ClampOutcome::Coerced => *value = bound_value(bounds.max),
        ClampOutcome::Absent | ClampOutcome::InRange => {}
    }
    outcome
}

/// Whole-number bounds are written as JSON integers.
fn bound_value(bound: f64) -> Value {
    if bound.fract() == 0.0 && bound.abs() < i64::MAX as f64 {
        Value::from(bound as i64)
    } else {
        Number::from_f64(bound).map_or(Value::Null, Value::Number)
    }
}
