//! Best-effort stage plumbing.
//!
//! Repair and parameter rules must never fail a request. They return a
//! report or a [`StageError`]; [`PipelineRun`] logs either and moves on,
//! keeping a note of what happened for the caller.

use thiserror::Error;

use super::body::RequestBody;

/// What a stage did to the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageReport {
    Unchanged,
    Changed(String),
}

/// A non-fatal stage failure. The field involved is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("`{field}` has unexpected shape, expected {expected}")]
    UnexpectedShape {
        field: &'static str,
        expected: &'static str,
    },
}

/// Outcome of one stage, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNote {
    pub stage: &'static str,
    pub outcome: Result<String, StageError>,
}

#[derive(Debug, Default)]
pub struct PipelineRun {
    notes: Vec<StageNote>,
}

impl PipelineRun {
    /// Run a stage whose failure is logged and skipped.
    pub fn best_effort<F>(&mut self, stage: &'static str, body: &mut RequestBody, f: F)
    where
        F: FnOnce(&mut RequestBody) -> Result<StageReport, StageError>,
    {
        match f(body) {
            Ok(StageReport::Unchanged) => {}
            Ok(StageReport::Changed(detail)) => self.changed(stage, detail),
            Err(err) => {
                tracing::warn!(stage, error = %err, "stage failed, continuing");
                self.notes.push(StageNote {
                    stage,
                    outcome: Err(err),
                });
            }
        }
    }

    /// Record a change made by a mandatory stage.
    pub fn changed(&mut self, stage: &'static str, detail: String) {
        tracing::debug!(stage, %detail, "stage applied");
        self.notes.push(StageNote {
            stage,
            outcome: Ok(detail),
        });
    }

    pub fn into_notes(self) -> Vec<StageNote> {
        self.notes
    }
}
