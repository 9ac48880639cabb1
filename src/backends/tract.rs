//! Tract backend for selfie segmentation models
//!
//! Runs an ONNX person-segmentation model (MediaPipe selfie segmentation and
//! models with the same input/output contract) with Tract, a pure Rust
//! inference engine. The subject is resized to the model's input size,
//! normalized per channel, and the single-channel output is resized back to
//! the subject's grid with bilinear filtering.

use crate::segmentation::{MaskProvider, SegmentationError};
use crate::types::{Mask, PixelBuffer};
use crate::utils::validation::NumericValidator;
use image::imageops::FilterType;
use instant::{Duration, Instant};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, instrument};
use tract_onnx::prelude::*;

/// Type alias for the optimized, runnable Tract plan
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Memory layout of the model's input and output tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorLayout {
    /// Batch, height, width, channels
    Nhwc,
    /// Batch, channels, height, width
    Nchw,
}

/// Input/output contract of a segmentation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterModel {
    /// Model input (width, height)
    pub input_size: (u32, u32),
    /// Tensor layout for both input and output
    pub layout: TensorLayout,
    /// Per-channel mean subtracted from RGB values in [0, 1]
    pub mean: [f32; 3],
    /// Per-channel standard deviation applied after mean subtraction
    pub std: [f32; 3],
    /// Output channel holding the foreground probability
    pub output_channel: usize,
    /// Output holds logits rather than probabilities
    pub apply_sigmoid: bool,
}

impl SegmenterModel {
    /// MediaPipe selfie segmentation (general model): 256×256 RGB in [0, 1],
    /// NHWC, one probability channel
    #[must_use]
    pub fn mediapipe_selfie() -> Self {
        Self {
            input_size: (256, 256),
            layout: TensorLayout::Nhwc,
            mean: [0.0; 3],
            std: [1.0; 3],
            output_channel: 0,
            apply_sigmoid: false,
        }
    }

    /// MediaPipe selfie segmentation (landscape model): 256×144
    #[must_use]
    pub fn mediapipe_selfie_landscape() -> Self {
        Self {
            input_size: (256, 144),
            ..Self::mediapipe_selfie()
        }
    }

    /// Check that the contract describes a usable model input
    pub fn validate(&self) -> crate::Result<()> {
        NumericValidator::validate_positive(self.input_size.0, "Model input width")?;
        NumericValidator::validate_positive(self.input_size.1, "Model input height")?;
        NumericValidator::validate_normalization_params(&self.mean, &self.std, 3)
    }

    fn input_shape(&self) -> [usize; 4] {
        let (width, height) = (self.input_size.0 as usize, self.input_size.1 as usize);
        match self.layout {
            TensorLayout::Nhwc => [1, height, width, 3],
            TensorLayout::Nchw => [1, 3, height, width],
        }
    }
}

impl Default for SegmenterModel {
    fn default() -> Self {
        Self::mediapipe_selfie()
    }
}

#[derive(Debug, Clone)]
enum ModelSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// Mask provider backed by an ONNX model running on Tract
pub struct TractSegmenter {
    source: ModelSource,
    spec: SegmenterModel,
    model: Option<TractModel>,
}

impl TractSegmenter {
    /// Segmenter for the ONNX file at `path`, loaded on `initialize`
    pub fn from_path<P: Into<PathBuf>>(path: P, spec: SegmenterModel) -> Self {
        Self {
            source: ModelSource::File(path.into()),
            spec,
            model: None,
        }
    }

    /// Segmenter for an in-memory ONNX model
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, spec: SegmenterModel) -> Self {
        Self {
            source: ModelSource::Bytes(bytes),
            spec,
            model: None,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &SegmenterModel {
        &self.spec
    }

    fn load_model(&mut self) -> Result<Duration, SegmentationError> {
        let start = Instant::now();
        self.spec
            .validate()
            .map_err(|e| SegmentationError::model_load(e.to_string()))?;

        let bytes = match &self.source {
            ModelSource::File(path) => std::fs::read(path).map_err(|e| {
                SegmentationError::model_load(format!(
                    "Failed to read model file '{}': {}",
                    path.display(),
                    e
                ))
            })?,
            ModelSource::Bytes(bytes) => bytes.clone(),
        };

        info!("🚀 Initializing Tract segmenter");
        info!(
            "🧠 Input: {}x{} ({:?}), model size {:.2} MB",
            self.spec.input_size.0,
            self.spec.input_size.1,
            self.spec.layout,
            bytes.len() as f64 / (1024.0 * 1024.0)
        );

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .map_err(|e| SegmentationError::model_load(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact(self.spec.input_shape()).into())
            .map_err(|e| SegmentationError::model_load(format!("Failed to fix input shape: {e}")))?
            .into_optimized()
            .map_err(|e| SegmentationError::model_load(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                SegmentationError::model_load(format!("Failed to create runnable model: {e}"))
            })?;

        self.model = Some(model);
        let elapsed = start.elapsed();
        info!("✅ Tract segmenter initialized in {}ms", elapsed.as_millis());
        Ok(elapsed)
    }

    /// Resize and normalize the subject into the model's input tensor
    fn preprocess(&self, image: &PixelBuffer) -> Tensor {
        let (width, height) = self.spec.input_size;
        let resized = image::imageops::resize(&image.to_rgba_image(), width, height, FilterType::Triangle);
        let spec = &self.spec;
        let normalized = |y: usize, x: usize, c: usize| -> f32 {
            let value = resized
                .get_pixel_checked(x as u32, y as u32)
                .map_or(0.0, |p| f32::from(p.0[c]) / 255.0);
            (value - spec.mean[c]) / spec.std[c]
        };

        let array = match spec.layout {
            TensorLayout::Nhwc => tract_ndarray::Array4::from_shape_fn(
                (1, height as usize, width as usize, 3),
                |(_, y, x, c)| normalized(y, x, c),
            ),
            TensorLayout::Nchw => tract_ndarray::Array4::from_shape_fn(
                (1, 3, height as usize, width as usize),
                |(_, c, y, x)| normalized(y, x, c),
            ),
        };
        Tensor::from(array)
    }
}

/// Pull the foreground channel out of a raw model output
///
/// Accepts `[1, H, W, C]` / `[1, C, H, W]` per `spec.layout`, or a bare
/// `[1, H, W]` map. Values are passed through a sigmoid when requested and
/// clamped to [0, 1]; NaN becomes background.
fn mask_from_output(
    output: &tract_ndarray::ArrayViewD<'_, f32>,
    spec: &SegmenterModel,
) -> Result<Mask, SegmentationError> {
    let shape = output.shape().to_vec();
    let channel = spec.output_channel;
    let (height, width) = match (spec.layout, shape.as_slice()) {
        (TensorLayout::Nhwc, &[1, h, w, c]) if channel < c => (h, w),
        (TensorLayout::Nchw, &[1, c, h, w]) if channel < c => (h, w),
        (_, &[1, h, w]) => (h, w),
        _ => {
            return Err(SegmentationError::invalid_output(format!(
                "Unexpected output shape {:?} for {:?} layout, channel {}",
                shape, spec.layout, channel
            )))
        },
    };

    let mut data = Vec::with_capacity(height * width);
    for y in 0..height {
        for x in 0..width {
            let raw = match (shape.len(), spec.layout) {
                (3, _) => output.get(&[0, y, x][..]),
                (_, TensorLayout::Nhwc) => output.get(&[0, y, x, channel][..]),
                (_, TensorLayout::Nchw) => output.get(&[0, channel, y, x][..]),
            }
            .copied()
            .unwrap_or(0.0);

            let probability = if spec.apply_sigmoid {
                1.0 / (1.0 + (-raw).exp())
            } else {
                raw
            };
            data.push(if probability.is_nan() {
                0.0
            } else {
                probability.clamp(0.0, 1.0)
            });
        }
    }

    Mask::new(width as u32, height as u32, data)
        .map_err(|e| SegmentationError::invalid_output(e.to_string()))
}

impl std::fmt::Debug for TractSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractSegmenter")
            .field("source", &self.source)
            .field("spec", &self.spec)
            .field("loaded", &self.model.is_some())
            .finish()
    }
}

impl MaskProvider for TractSegmenter {
    fn name(&self) -> &str {
        "tract"
    }

    fn initialize(&mut self) -> Result<Option<Duration>, SegmentationError> {
        if self.model.is_some() {
            return Ok(None);
        }
        self.load_model().map(Some)
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn segment(&mut self, image: &PixelBuffer) -> Result<Mask, SegmentationError> {
        let model = self.model.as_ref().ok_or(SegmentationError::NotInitialized)?;
        let start = Instant::now();

        let input = self.preprocess(image);
        let outputs = model
            .run(tvec![input.into()])
            .map_err(|e| SegmentationError::inference(format!("Tract inference failed: {e}")))?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SegmentationError::invalid_output("No output tensor found"))?
            .into_arc_tensor();
        let view = output.to_array_view::<f32>().map_err(|e| {
            SegmentationError::invalid_output(format!("Failed to read output tensor: {e}"))
        })?;

        let mask = mask_from_output(&view, &self.spec)?;
        debug!(
            "Tract inference completed in {}ms, raw mask {}x{}",
            start.elapsed().as_millis(),
            mask.width(),
            mask.height()
        );
        Ok(mask.resized(image.width(), image.height()))
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mediapipe_preset() {
        let spec = SegmenterModel::mediapipe_selfie();
        assert_eq!(spec.input_shape(), [1, 256, 256, 3]);
        assert!(spec.validate().is_ok());
        assert_eq!(SegmenterModel::mediapipe_selfie_landscape().input_shape(), [1, 144, 256, 3]);
    }

    #[test]
    fn test_invalid_spec_is_rejected() {
        let spec = SegmenterModel {
            std: [0.0, 1.0, 1.0],
            ..SegmenterModel::default()
        };
        assert!(spec.validate().is_err());

        let mut segmenter = TractSegmenter::from_bytes(Vec::new(), spec);
        assert!(matches!(
            segmenter.initialize(),
            Err(SegmentationError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_missing_model_file() {
        let mut segmenter =
            TractSegmenter::from_path("/nonexistent/selfie.onnx", SegmenterModel::default());
        assert!(!segmenter.is_initialized());
        let err = segmenter.initialize().unwrap_err();
        assert!(err.to_string().contains("selfie.onnx"));
    }

    #[test]
    fn test_segment_before_initialize() {
        let mut segmenter = TractSegmenter::from_bytes(Vec::new(), SegmenterModel::default());
        let image = PixelBuffer::new(4, 4).unwrap();
        assert!(matches!(
            segmenter.segment(&image),
            Err(SegmentationError::NotInitialized)
        ));
    }

    #[test]
    fn test_preprocess_layouts() {
        let image = PixelBuffer::new(10, 20).unwrap();
        let nhwc = TractSegmenter::from_bytes(Vec::new(), SegmenterModel::default());
        assert_eq!(nhwc.preprocess(&image).shape(), &[1, 256, 256, 3]);

        let spec = SegmenterModel {
            input_size: (32, 16),
            layout: TensorLayout::Nchw,
            mean: [0.5; 3],
            std: [0.5; 3],
            ..SegmenterModel::default()
        };
        let nchw = TractSegmenter::from_bytes(Vec::new(), spec);
        let tensor = nchw.preprocess(&image);
        assert_eq!(tensor.shape(), &[1, 3, 16, 32]);
        // black input maps to -1 after (0 - 0.5) / 0.5
        let view = tensor.to_array_view::<f32>().unwrap();
        assert!(view.iter().all(|&v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_mask_from_nhwc_output() {
        let output = tract_ndarray::ArrayD::from_shape_vec(
            vec![1, 2, 2, 2],
            vec![0.1, 0.9, 0.2, 1.5, 0.3, -0.5, 0.4, f32::NAN],
        )
        .unwrap();
        let spec = SegmenterModel {
            output_channel: 1,
            ..SegmenterModel::default()
        };
        let mask = mask_from_output(&output.view(), &spec).unwrap();
        assert_eq!(mask.dimensions(), (2, 2));
        assert_eq!(mask.row(0), Some(&[0.9, 1.0][..]));
        assert_eq!(mask.row(1), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn test_mask_from_nchw_logits() {
        let output =
            tract_ndarray::ArrayD::from_shape_vec(vec![1, 1, 1, 2], vec![0.0, 100.0]).unwrap();
        let spec = SegmenterModel {
            layout: TensorLayout::Nchw,
            apply_sigmoid: true,
            ..SegmenterModel::default()
        };
        let mask = mask_from_output(&output.view(), &spec).unwrap();
        assert!((mask.value(0, 0).unwrap() - 0.5).abs() < 1e-6);
        assert!((mask.value(1, 0).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mask_from_unexpected_shape() {
        let output = tract_ndarray::ArrayD::from_shape_vec(vec![2, 2], vec![0.0; 4]).unwrap();
        let err = mask_from_output(&output.view(), &SegmenterModel::default()).unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidOutput(_)));

        let spec = SegmenterModel {
            output_channel: 3,
            ..SegmenterModel::default()
        };
        let output = tract_ndarray::ArrayD::from_shape_vec(vec![1, 1, 1, 1], vec![0.0]).unwrap();
        assert!(mask_from_output(&output.view(), &spec).is_err());
    }
}
