//! Best-effort artifact capture around every step.
//!
//! After each step body, successful or not, the capturer writes a
//! screenshot to `{dir}/{index}-{name}.png` and a dump of visible
//! interactive elements to `{dir}/{index}-{name}.json`. Capture problems
//! become notes on the step; they never change its outcome.

use crate::driver::{InteractiveElement, PageDriver};
use crate::report::{StepOutput, StepResult};
use crate::resolver::elapsed_ms;
use crate::result::VerificarError;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Maximum number of elements kept in a dump
pub const DEFAULT_MAX_ELEMENTS: usize = 50;

/// Deterministic artifact file name
#[must_use]
pub fn artifact_name(index: usize, step_name: &str, extension: &str) -> String {
    format!("{index}-{step_name}.{extension}")
}

#[derive(Serialize)]
struct ElementDump<'a> {
    step: &'a str,
    index: usize,
    total_visible: usize,
    truncated: bool,
    elements: &'a [InteractiveElement],
}

/// Wraps step bodies and collects artifacts
pub struct DiagnosticsCapturer<'a> {
    page: &'a dyn PageDriver,
    artifact_dir: PathBuf,
    next_index: usize,
    max_elements: usize,
}

impl std::fmt::Debug for DiagnosticsCapturer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsCapturer")
            .field("artifact_dir", &self.artifact_dir)
            .field("next_index", &self.next_index)
            .field("max_elements", &self.max_elements)
            .finish_non_exhaustive()
    }
}

impl<'a> DiagnosticsCapturer<'a> {
    /// Create a capturer writing into `artifact_dir`; indices start at 1
    #[must_use]
    pub fn new(page: &'a dyn PageDriver, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            page,
            artifact_dir: artifact_dir.into(),
            next_index: 1,
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }

    /// Cap the element dump
    #[must_use]
    pub const fn with_max_elements(mut self, max: usize) -> Self {
        self.max_elements = max;
        self
    }

    /// Index the next wrapped step will get
    #[must_use]
    pub const fn next_index(&self) -> usize {
        self.next_index
    }

    /// Artifact directory
    #[must_use]
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Run `body`, then capture artifacts whatever it returned.
    pub async fn wrap<F>(&mut self, step_name: &str, body: F) -> StepResult
    where
        F: Future<Output = StepOutput>,
    {
        let index = self.next_index;
        self.next_index += 1;

        let start = Instant::now();
        let output = body.await;
        let mut result = StepResult::from_output(index, step_name, output, elapsed_ms(start));

        let (paths, notes) = self.capture(index, step_name).await;
        result.artifact_paths = paths;
        result.notes.extend(notes);
        tracing::debug!(index, step = step_name, outcome = %result.outcome, "step finished");
        result
    }

    async fn capture(&self, index: usize, step_name: &str) -> (Vec<PathBuf>, Vec<String>) {
        let mut paths = Vec::new();
        let mut notes = Vec::new();

        if let Err(e) = tokio::fs::create_dir_all(&self.artifact_dir).await {
            notes.push(capture_note(index, step_name, "artifact directory", &e));
            return (paths, notes);
        }

        let png = self.artifact_dir.join(artifact_name(index, step_name, "png"));
        match self.page.screenshot(&png).await {
            Ok(()) => paths.push(png),
            Err(e) => notes.push(capture_note(index, step_name, "screenshot", &e)),
        }

        let json = self.artifact_dir.join(artifact_name(index, step_name, "json"));
        match self.dump_elements(index, step_name, &json).await {
            Ok(()) => paths.push(json),
            Err(e) => notes.push(capture_note(index, step_name, "element dump", &e)),
        }

        (paths, notes)
    }

    async fn dump_elements(
        &self,
        index: usize,
        step_name: &str,
        path: &Path,
    ) -> Result<(), VerificarError> {
        let elements = self.page.list_interactive_elements().await?;
        let kept = &elements[..elements.len().min(self.max_elements)];
        let dump = ElementDump {
            step: step_name,
            index,
            total_visible: elements.len(),
            truncated: kept.len() < elements.len(),
            elements: kept,
        };
        tokio::fs::write(path, serde_json::to_vec_pretty(&dump)?).await?;
        Ok(())
    }
}

fn capture_note(index: usize, step_name: &str, what: &str, err: &dyn std::fmt::Display) -> String {
    let err = VerificarError::DiagnosticsCapture {
        message: format!("{what}: {err}"),
    };
    tracing::warn!(index, step = step_name, error = %err, "diagnostics capture failed");
    err.to_string()
}
