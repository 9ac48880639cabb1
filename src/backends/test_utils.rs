//! Mock mask providers for testing the pipeline without a model

use crate::segmentation::{MaskProvider, SegmentationError};
use crate::types::{Mask, PixelBuffer};
use instant::Duration;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum MockBehavior {
    /// Constant weight sized to the subject
    Uniform(f32),
    /// Weight computed per pixel
    Pattern(fn(u32, u32) -> f32),
    /// Mask one pixel wider than the subject
    WrongSize,
    /// `segment` fails
    FailSegment,
}

/// Configurable mask provider that records every call
#[derive(Debug, Clone)]
pub struct MockMaskProvider {
    behavior: MockBehavior,
    initialized: bool,
    requires_initialize: bool,
    should_fail_init: bool,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockMaskProvider {
    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            initialized: false,
            requires_initialize: false,
            should_fail_init: false,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn uniform(value: f32) -> Self {
        Self::with_behavior(MockBehavior::Uniform(value))
    }

    #[must_use]
    pub fn pattern(f: fn(u32, u32) -> f32) -> Self {
        Self::with_behavior(MockBehavior::Pattern(f))
    }

    #[must_use]
    pub fn wrong_size() -> Self {
        Self::with_behavior(MockBehavior::WrongSize)
    }

    #[must_use]
    pub fn failing_segment() -> Self {
        Self::with_behavior(MockBehavior::FailSegment)
    }

    /// Provider whose `initialize` fails
    #[must_use]
    pub fn failing_init() -> Self {
        let mut provider = Self::uniform(1.0);
        provider.requires_initialize = true;
        provider.should_fail_init = true;
        provider
    }

    /// Reject `segment` until `initialize` has run
    #[must_use]
    pub fn requiring_initialize(mut self) -> Self {
        self.requires_initialize = true;
        self
    }

    /// Shared handle to the call log, usable after the provider is moved
    #[must_use]
    pub fn history_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    fn record_call(&self, call: String) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call);
        }
    }
}

impl MaskProvider for MockMaskProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn initialize(&mut self) -> Result<Option<Duration>, SegmentationError> {
        self.record_call("initialize".to_string());
        if self.should_fail_init {
            return Err(SegmentationError::model_load("Mock model file is corrupt"));
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(5)))
    }

    fn segment(&mut self, image: &PixelBuffer) -> Result<Mask, SegmentationError> {
        self.record_call(format!("segment {}x{}", image.width(), image.height()));

        if self.requires_initialize && !self.initialized {
            return Err(SegmentationError::NotInitialized);
        }

        match self.behavior {
            MockBehavior::Uniform(value) => Ok(Mask::filled(image.width(), image.height(), value)),
            MockBehavior::Pattern(f) => Ok(Mask::from_fn(image.width(), image.height(), f)),
            MockBehavior::WrongSize => Ok(Mask::filled(image.width() + 1, image.height(), 1.0)),
            MockBehavior::FailSegment => {
                Err(SegmentationError::inference("Mock inference exploded"))
            },
        }
    }

    fn is_initialized(&self) -> bool {
        !self.requires_initialize || self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mut provider = MockMaskProvider::uniform(0.5).requiring_initialize();
        let handle = provider.history_handle();
        let image = PixelBuffer::new(2, 2).unwrap();

        assert!(matches!(provider.segment(&image), Err(SegmentationError::NotInitialized)));
        provider.initialize().unwrap();
        assert!(provider.segment(&image).is_ok());

        let history = handle.lock().unwrap().clone();
        assert_eq!(history, vec!["segment 2x2", "initialize", "segment 2x2"]);
        assert_eq!(provider.call_history(), history);
    }

    #[test]
    fn test_mock_failure_modes() {
        let image = PixelBuffer::new(3, 3).unwrap();
        assert!(MockMaskProvider::failing_init().initialize().is_err());
        assert!(MockMaskProvider::failing_segment().segment(&image).is_err());
        let mask = MockMaskProvider::wrong_size().segment(&image).unwrap();
        assert_eq!(mask.dimensions(), (4, 3));
    }
}
