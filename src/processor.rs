//! Background replacement processor
//!
//! Orchestrates one composite end to end: load → normalize → validate →
//! (segment ∥ fit background) → composite → encode → persist. Every stage
//! fails fast with a typed error; nothing is retried and no partial result is
//! returned.

use crate::{
    compositor::AlphaCompositor,
    config::CompositeConfig,
    error::{CompositeError, Result},
    segmentation::MaskProvider,
    services::{ImageIOService, OutputFormatHandler, ProcessingStage, ProgressReporter, ProgressTracker},
    types::{CompositeRequest, CompositeResult, ImageSink, ImageSource, PixelBuffer, ProcessingMetadata, ProcessingTimings},
    utils::{BackgroundFitter, BufferNormalizer, DimensionValidator},
};
use instant::Instant;
use tracing::{debug, info, instrument, span, warn, Level};

/// Composites backgrounds behind selfies using a pluggable mask provider
///
/// A processor owns its provider, so one processor handles one request at a
/// time; independent processors never share state.
pub struct CompositeProcessor {
    config: CompositeConfig,
    provider: Box<dyn MaskProvider>,
    compositor: AlphaCompositor,
    progress: Option<ProgressTracker>,
    initialized: bool,
    pending_init_ms: u64,
}

impl CompositeProcessor {
    /// Create a processor; the provider is initialized lazily
    ///
    /// # Errors
    /// - `InvalidConfig` if `config` fails validation
    pub fn new(config: CompositeConfig, provider: Box<dyn MaskProvider>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            compositor: AlphaCompositor::from_config(&config)?,
            config,
            provider,
            progress: None,
            initialized: false,
            pending_init_ms: 0,
        })
    }

    /// Attach a progress reporter
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.progress = Some(ProgressTracker::new(reporter));
        self
    }

    /// Initialize the mask provider
    ///
    /// Called automatically by the first `process*` call.
    ///
    /// # Errors
    /// - `SegmentationError` if the provider fails to load
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.report(ProcessingStage::Initialization);

        let name = self.provider.name().to_string();
        let load_time = self
            .provider
            .initialize()
            .map_err(|e| CompositeError::segmentation(name.clone(), e))?;

        if let Some(duration) = load_time {
            self.pending_init_ms = duration.as_millis() as u64;
            info!("🧠 Mask provider '{}' ready in {}ms", name, self.pending_init_ms);
        }
        self.initialized = true;
        Ok(())
    }

    /// Composite `request` and return the finished buffer
    ///
    /// # Errors
    /// - `LoadFailure`, `DimensionMismatch`, `SegmentationError` or
    ///   `FormatError` from the stage that failed
    pub fn process(&mut self, request: CompositeRequest) -> Result<CompositeResult> {
        let total_start = Instant::now();
        let outcome = self.run_request(request);
        self.finish(outcome, total_start)
    }

    /// Composite `request`, then encode and store it per the configured target
    pub fn process_to_sink(&mut self, request: CompositeRequest) -> Result<ImageSink> {
        let total_start = Instant::now();
        let mut sink = None;
        let outcome = self.run_request(request).and_then(|mut result| {
            sink = Some(self.write_output(&mut result)?);
            Ok(result)
        });

        self.finish(outcome, total_start)?;
        sink.ok_or_else(|| CompositeError::internal("composite finished without an output sink"))
    }

    /// Composite already-decoded buffers
    ///
    /// `subject` is consumed and reused as the output buffer. Both buffers are
    /// expected to be normalized already (upright, BGRA8).
    pub fn composite_buffers(
        &mut self,
        subject: PixelBuffer,
        background: &PixelBuffer,
    ) -> Result<CompositeResult> {
        let total_start = Instant::now();
        let outcome = self.initialize().and_then(|()| {
            let mut timings = ProcessingTimings::default();
            self.composite_normalized(subject, background, &mut timings)
        });
        self.finish(outcome, total_start)
    }

    /// Encode `result` and store it according to the configured target
    pub fn write_output(&mut self, result: &mut CompositeResult) -> Result<ImageSink> {
        self.report(ProcessingStage::Encoding);
        let encode_start = Instant::now();
        let bytes = OutputFormatHandler::encode(
            &result.image,
            self.config.output_format,
            self.config.jpeg_quality,
        )?;
        result.metadata.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);

        self.report(ProcessingStage::Persisting);
        ImageIOService::persist(&bytes, self.config.output_format, &self.config.output_target)
    }

    #[instrument(skip_all, fields(provider = %self.provider.name()))]
    fn run_request(&mut self, request: CompositeRequest) -> Result<CompositeResult> {
        self.initialize()?;
        if let Some(tracker) = self.progress.as_mut() {
            tracker.restart();
        }

        let mut timings = ProcessingTimings::default();
        let max_dimension = self.config.effective_max_dimension(request.max_dimension);

        self.report(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let subject = ImageIOService::load(request.subject, "subject")?;
        let background = ImageIOService::load(request.background, "background")?;
        timings.image_decode_ms = decode_start.elapsed().as_millis() as u64;

        self.report(ProcessingStage::Normalization);
        let normalize_start = Instant::now();
        let (subject, background) = {
            let _span = span!(Level::DEBUG, "normalization", max_dimension = ?max_dimension).entered();
            (
                BufferNormalizer::normalize(&subject.image, subject.orientation, max_dimension)?,
                BufferNormalizer::normalize(&background.image, background.orientation, max_dimension)?,
            )
        };
        timings.normalization_ms = normalize_start.elapsed().as_millis() as u64;
        debug!(
            "Normalized subject {}x{}, background {}x{}",
            subject.width(),
            subject.height(),
            background.width(),
            background.height()
        );

        self.composite_normalized(subject, &background, &mut timings)
    }

    fn composite_normalized(
        &mut self,
        mut subject: PixelBuffer,
        background: &PixelBuffer,
        timings: &mut ProcessingTimings,
    ) -> Result<CompositeResult> {
        self.report(ProcessingStage::DimensionValidation);
        DimensionValidator::validate(&subject, background)?;

        self.report(ProcessingStage::Segmentation);
        let provider_name = self.provider.name().to_string();
        let target = subject.dimensions();
        let fit = self.config.background_fit;
        let anchor = self.config.crop_anchor;
        let provider = &mut self.provider;
        let subject_ref = &subject;

        let ((mask, segmentation_ms), (fitted, fit_ms)) = rayon::join(
            || {
                let start = Instant::now();
                let mask = provider.segment(subject_ref);
                (mask, start.elapsed().as_millis() as u64)
            },
            || {
                let start = Instant::now();
                let fitted = BackgroundFitter::fit(background, target, fit, anchor);
                (fitted, start.elapsed().as_millis() as u64)
            },
        );
        timings.segmentation_ms = segmentation_ms;
        timings.background_fit_ms = fit_ms;

        let mut mask = mask.map_err(|e| CompositeError::segmentation(provider_name.clone(), e))?;
        self.report(ProcessingStage::BackgroundFitting);
        let fitted = fitted?;

        if self.config.debug {
            let out_of_range = mask.out_of_range_count();
            if out_of_range > 0 {
                warn!(
                    "Mask from '{}' has {} values outside [0, 1]",
                    provider_name, out_of_range
                );
            }
        }
        if let Some(threshold) = self.config.foreground_threshold {
            debug!(threshold, "Binarizing mask");
            mask = mask.binarize(threshold);
        }

        self.report(ProcessingStage::Compositing);
        let composite_start = Instant::now();
        self.compositor.composite(&mut subject, &fitted.buffer, &mask)?;
        timings.compositing_ms = composite_start.elapsed().as_millis() as u64;

        let mut metadata = ProcessingMetadata::new(provider_name);
        metadata.subject_dimensions = subject.dimensions();
        metadata.background_dimensions = background.dimensions();
        metadata.crop_offset = fitted.offset;
        metadata.mask_coverage = mask.coverage();
        metadata.timings = timings.clone();

        Ok(CompositeResult::new(subject, mask, metadata))
    }

    /// Stamp totals, report completion or the error, and hand the outcome back
    fn finish(&mut self, outcome: Result<CompositeResult>, total_start: Instant) -> Result<CompositeResult> {
        match outcome {
            Ok(mut result) => {
                let timings = &mut result.metadata.timings;
                timings.provider_init_ms = std::mem::take(&mut self.pending_init_ms);
                timings.total_ms = total_start.elapsed().as_millis() as u64;
                info!("✅ Background replaced: {}", timings.summary());

                self.report(ProcessingStage::Completed);
                if let Some(tracker) = self.progress.as_ref() {
                    tracker.report_completion(result.metadata.timings.clone());
                }
                Ok(result)
            },
            Err(e) => {
                warn!(kind = %e.kind(), "Background replacement failed: {}", e);
                if let Some(tracker) = self.progress.as_ref() {
                    tracker.report_error(&e.to_string());
                }
                Err(e)
            },
        }
    }

    fn report(&mut self, stage: ProcessingStage) {
        if let Some(tracker) = self.progress.as_mut() {
            tracker.report_stage(stage);
        }
    }

    #[must_use]
    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl std::fmt::Debug for CompositeProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeProcessor")
            .field("config", &self.config)
            .field("provider", &self.provider.name())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

/// Convenience for building a request from anything convertible
impl CompositeProcessor {
    pub fn process_sources<S, B>(&mut self, subject: S, background: B) -> Result<CompositeResult>
    where
        S: Into<ImageSource>,
        B: Into<ImageSource>,
    {
        self.process(CompositeRequest::new(subject, background))
    }
}
