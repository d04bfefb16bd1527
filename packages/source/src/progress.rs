//! Progress reporting for the update pipeline.
//!
//! The ingest stages report through [`ProgressCallback`] so the library
//! crates never depend on a terminal renderer. The CLI plugs in `indicatif`
//! bars; tests and dry runs use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a long-running stage.
pub trait ProgressCallback: Send + Sync {
    /// Announces how many units the stage will process.
    fn set_total(&self, total: u64);

    /// Records `delta` more units done.
    fn inc(&self, delta: u64);

    /// Replaces the label shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Ends the stage, leaving `msg` as its summary.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _: u64) {}
    fn inc(&self, _: u64) {}
    fn set_message(&self, _: String) {}
    fn finish(&self, _: String) {}
}

/// A [`NullProgress`] behind the shared handle the pipeline expects.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
