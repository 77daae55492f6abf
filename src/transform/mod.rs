//! Request body rewriting.
//!
//! Turns a caller's messages request into one that looks like it came from
//! the first-party CLI. Stages run in a fixed order:
//!
//! ```text
//! parse -> validate -> repair* -> parameter rules* -> metadata
//!       -> system rewrite -> clamp -> serialize
//! ```
//!
//! Stages marked `*` are best-effort: a failure is logged and the body
//! continues unchanged. Every other failure aborts the request.

pub mod body;
pub mod params;
pub mod repair;
pub mod stage;
pub mod system;

use serde_json::{json, Value};
use thiserror::Error;

use crate::prompts::PromptRegistry;

pub use body::RequestBody;
pub use params::{
    ClampOutcome, ParameterRule, RuleAction, MAX_TOKENS_BOUNDS, PARAMETER_RULES,
    TEMPERATURE_BOUNDS, TOP_P_BOUNDS,
};
pub use stage::{StageError, StageNote, StageReport};
pub use system::{SystemMessage, SystemRewrite, CLI_SYSTEM_TEXT, INJECTION_SIZE_THRESHOLD};

use params::clamp_field;
use stage::PipelineRun;

/// Fatal transformation failures.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("malformed body: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("malformed body: top-level value is not a JSON object")]
    NotAnObject,

    /// `system` is present but not an array. Reported to callers exactly
    /// like an authentication failure.
    #[error("format anomaly: `system` must be an array")]
    FormatAnomaly,

    #[error("failed to serialize body: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Result of a successful transformation.
#[derive(Debug)]
pub struct Transformed {
    pub body: Vec<u8>,
    pub notes: Vec<StageNote>,
}

/// Rewrites request bodies using the prompt registry and gateway identity.
#[derive(Clone)]
pub struct BodyTransformer {
    prompts: PromptRegistry,
    user_id: String,
    rules: &'static [ParameterRule],
}

impl BodyTransformer {
    pub fn new(prompts: PromptRegistry, user_id: impl Into<String>) -> Self {
        Self {
            prompts,
            user_id: user_id.into(),
            rules: PARAMETER_RULES,
        }
    }

    pub fn transform(&self, raw: &[u8]) -> Result<Transformed, TransformError> {
        let value: Value = serde_json::from_slice(raw).map_err(TransformError::Malformed)?;
        let Value::Object(map) = value else {
            return Err(TransformError::NotAnObject);
        };

        let mut body = RequestBody::from_map(map).inspect_err(|_| {
            tracing::error!("`system` field is not an array");
        })?;
        let mut run = PipelineRun::default();

        run.best_effort("repair", &mut body, repair::repair_placeholder_content);
        run.best_effort("parameter_rules", &mut body, |body| {
            params::apply_parameter_rules(body, self.rules)
        });

        body.metadata = Some(json!({ "user_id": self.user_id }));

        let rewrite =
            system::rewrite_system(&mut body, &self.prompts).map_err(TransformError::Serialize)?;
        run.changed("system", rewrite.describe());

        for (field, slot, bounds) in [
            ("temperature", &mut body.temperature, TEMPERATURE_BOUNDS),
            ("top_p", &mut body.top_p, TOP_P_BOUNDS),
            ("max_tokens", &mut body.max_tokens, MAX_TOKENS_BOUNDS),
        ] {
            let outcome = clamp_field(slot, bounds);
            if !matches!(outcome, ClampOutcome::Absent | ClampOutcome::InRange) {
                run.changed("clamp", format!("{field}: {outcome:?}"));
            }
        }

        let body = serde_json::to_vec(&body).map_err(TransformError::Serialize)?;
        Ok(Transformed {
            body,
            notes: run.into_notes(),
        })
    }
}
