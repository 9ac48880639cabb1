//! Progress reporting service
//!
//! Keeps progress concerns out of the pipeline so each embedding (mobile
//! bridge, server, test) can decide how to surface them.

use crate::types::ProcessingTimings;
use instant::Instant;

/// Stages of one background replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Initializing the mask provider
    Initialization,
    /// Reading and decoding both sources
    ImageLoading,
    /// Downsampling and orientation resolution
    Normalization,
    /// Checking that the background covers the subject
    DimensionValidation,
    /// Generating the foreground mask
    Segmentation,
    /// Cropping or cover-scaling the background
    BackgroundFitting,
    /// Per-pixel alpha compositing
    Compositing,
    /// Encoding the composite
    Encoding,
    /// Writing or inlining the encoded output
    Persisting,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Initialization => "Initializing mask provider",
            Self::ImageLoading => "Loading subject and background",
            Self::Normalization => "Normalizing image buffers",
            Self::DimensionValidation => "Validating background dimensions",
            Self::Segmentation => "Segmenting subject",
            Self::BackgroundFitting => "Fitting background to subject",
            Self::Compositing => "Compositing background",
            Self::Encoding => "Encoding output image",
            Self::Persisting => "Writing output",
            Self::Completed => "Processing completed",
        }
    }

    /// Get the approximate progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            Self::Initialization => 5,
            Self::ImageLoading => 15,
            Self::Normalization => 25,
            Self::DimensionValidation => 35,
            Self::Segmentation => 55,
            Self::BackgroundFitting => 70,
            Self::Compositing => 85,
            Self::Encoding => 95,
            Self::Persisting => 98,
            Self::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Receiver of progress events
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: ProcessingTimings);

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Progress reporter that emits `tracing` events
pub struct TracingProgressReporter {
    verbose: bool,
}

impl TracingProgressReporter {
    /// `verbose` adds elapsed times and the per-stage timing breakdown
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for TracingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            tracing::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            tracing::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        tracing::info!("✅ Background replaced in {}ms", timings.total_ms);
        if self.verbose {
            tracing::info!("  📊 {}", timings.summary());
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        tracing::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

/// Tracks the current stage and elapsed time for one reporter
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Box::new(NoOpProgressReporter))
    }

    #[must_use]
    pub fn tracing(verbose: bool) -> Self {
        Self::new(Box::new(TracingProgressReporter::new(verbose)))
    }

    /// Restart the clock for a new request
    pub fn restart(&mut self) {
        self.start_time = Instant::now();
        self.current_stage = None;
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report completion with final timings
    pub fn report_completion(&self, timings: ProcessingTimings) {
        self.reporter.report_completion(timings);
    }

    /// Report an error against the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::Initialization);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Test progress reporter that captures reports for verification
    #[derive(Default, Clone)]
    struct TestProgressReporter {
        progress_updates: Arc<Mutex<Vec<ProgressUpdate>>>,
        completions: Arc<Mutex<Vec<ProcessingTimings>>>,
        errors: Arc<Mutex<Vec<(ProcessingStage, String)>>>,
    }

    impl ProgressReporter for TestProgressReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.progress_updates.lock().unwrap().push(update);
        }

        fn report_completion(&self, timings: ProcessingTimings) {
            self.completions.lock().unwrap().push(timings);
        }

        fn report_error(&self, stage: ProcessingStage, error: &str) {
            self.errors.lock().unwrap().push((stage, error.to_string()));
        }
    }

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            ProcessingStage::Initialization,
            ProcessingStage::ImageLoading,
            ProcessingStage::Normalization,
            ProcessingStage::DimensionValidation,
            ProcessingStage::Segmentation,
            ProcessingStage::BackgroundFitting,
            ProcessingStage::Compositing,
            ProcessingStage::Encoding,
            ProcessingStage::Persisting,
            ProcessingStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
        assert_eq!(ProcessingStage::Completed.progress_percentage(), 100);
    }

    #[test]
    fn test_progress_update_creation() {
        let update = ProgressUpdate::new(ProcessingStage::Compositing, Instant::now());
        assert_eq!(update.progress, 85);
        assert_eq!(update.description, "Compositing background");
        assert!(update.elapsed_ms < 100);
    }

    #[test]
    fn test_tracker_reports_to_reporter() {
        let reporter = TestProgressReporter::default();
        let mut tracker = ProgressTracker::new(Box::new(reporter.clone()));

        tracker.report_error("too early");
        tracker.report_stage(ProcessingStage::ImageLoading);
        tracker.report_stage(ProcessingStage::Segmentation);
        tracker.report_error("model crashed");
        tracker.report_completion(ProcessingTimings {
            total_ms: 12,
            ..ProcessingTimings::default()
        });

        let updates = reporter.progress_updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].stage, ProcessingStage::Segmentation);
        assert_eq!(tracker.current_stage(), Some(ProcessingStage::Segmentation));

        let errors = reporter.errors.lock().unwrap();
        assert_eq!(errors[0].0, ProcessingStage::Initialization);
        assert_eq!(errors[1], (ProcessingStage::Segmentation, "model crashed".to_string()));
        assert_eq!(reporter.completions.lock().unwrap()[0].total_ms, 12);
    }

    #[test]
    fn test_tracker_restart_clears_stage() {
        let mut tracker = ProgressTracker::no_op();
        tracker.report_stage(ProcessingStage::Encoding);
        tracker.restart();
        assert!(tracker.current_stage().is_none());
    }

    #[test]
    fn test_tracing_reporter_does_not_panic() {
        let reporter = TracingProgressReporter::new(true);
        reporter.report_progress(ProgressUpdate::new(ProcessingStage::Encoding, Instant::now()));
        reporter.report_completion(ProcessingTimings::default());
        reporter.report_error(ProcessingStage::Persisting, "disk full");
    }
}
