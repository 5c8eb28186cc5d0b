use std::path::PathBuf;

use east_net::EastNet;

pub mod decode;
pub mod draw;
pub mod east_net;
mod error;
pub mod nms;
mod result;
pub mod util;

pub use decode::{decode, GeometryMap, EAST_STRIDE};
pub use error::{EastError, Result};
use image::DynamicImage;
pub use nms::{suppress, suppress_indices, DEFAULT_OVERLAP_THRESHOLD};
pub use result::*;
use tracing::instrument;
use util::{check_input_size, scale_exact, scale_normalized};

pub use ort as runtime;

/// Memory layout of the image input and the score/geometry outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// Batch, channels, rows, columns. What OpenCV's DNN module produces.
    Nchw,
    /// Batch, rows, columns, channels. What a TensorFlow export keeps.
    #[default]
    Nhwc,
}

/// Tensor names the detector feeds and reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSignature {
    pub input: String,
    pub score_output: String,
    pub geometry_output: String,
    pub layout: TensorLayout,
}

impl Default for ModelSignature {
    fn default() -> Self {
        Self {
            input: "input_images:0".to_string(),
            score_output: "feature_fusion/Conv_7/Sigmoid:0".to_string(),
            geometry_output: "feature_fusion/concat_3:0".to_string(),
            layout: TensorLayout::Nhwc,
        }
    }
}

pub struct TextDetectorBuilder {
    threads: usize,
    model_path: Option<PathBuf>,
    signature: ModelSignature,
    input_width: u32,
    input_height: u32,
    cache_path: Option<PathBuf>,
    execution_providers: Vec<ExecutionProvider>,
}

impl TextDetectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn model(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Network input size. Both sides must be multiples of 32.
    pub fn input_size(mut self, width: u32, height: u32) -> Self {
        self.input_width = width;
        self.input_height = height;
        self
    }

    pub fn input_name(mut self, name: impl Into<String>) -> Self {
        self.signature.input = name.into();
        self
    }

    pub fn output_names(
        mut self,
        score_output: impl Into<String>,
        geometry_output: impl Into<String>,
    ) -> Self {
        self.signature.score_output = score_output.into();
        self.signature.geometry_output = geometry_output.into();
        self
    }

    pub fn layout(mut self, layout: TensorLayout) -> Self {
        self.signature.layout = layout;
        self
    }

    pub fn with_engine_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_execution_providers(
        mut self,
        providers: impl IntoIterator<Item = ExecutionProvider>,
    ) -> Self {
        self.execution_providers = providers.into_iter().collect();
        self
    }

    #[instrument(skip(self))]
    pub fn build(mut self) -> Result<TextDetector> {
        check_input_size(self.input_width, self.input_height)?;
        let model_path = self
            .model_path
            .take()
            .unwrap_or_else(|| "models/frozen_east_text_detection.onnx".into());
        let model = EastNet::init(
            model_path,
            self.signature,
            self.threads,
            self.input_width.max(self.input_height),
            &self.execution_providers,
            self.cache_path,
        )?;
        Ok(TextDetector {
            model,
            input_width: self.input_width,
            input_height: self.input_height,
        })
    }
}

impl Default for TextDetectorBuilder {
    fn default() -> Self {
        Self {
            threads: 4,
            model_path: None,
            signature: ModelSignature::default(),
            input_width: 320,
            input_height: 320,
            cache_path: None,
            execution_providers: DEFAULT_PROVIDERS.to_vec(),
        }
    }
}

pub struct TextDetector {
    model: EastNet,
    input_width: u32,
    input_height: u32,
}

impl TextDetector {
    /// Finds text boxes in `image`, in its own pixel coordinates, ordered by
    /// score descending.
    #[instrument(skip(self, image))]
    pub fn detect(&self, image: &DynamicImage, options: DetectionOptions) -> Result<Vec<TextBox>> {
        let DetectionOptions {
            max_side_len,
            min_confidence,
            overlap_threshold,
        } = options;
        let scale = if max_side_len > 0 {
            scale_normalized(image, max_side_len)?
        } else {
            scale_exact(image, self.input_width, self.input_height)?
        };
        self.model
            .get_text_boxes(image, scale, min_confidence, overlap_threshold)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DetectionOptions {
    /// When non-zero, resize keeping the aspect ratio with the long side
    /// capped here instead of using the builder's fixed input size.
    pub max_side_len: u32,
    pub min_confidence: f32,
    pub overlap_threshold: f32,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            max_side_len: 0,
            min_confidence: 0.5,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Default,
    #[cfg(feature = "tensorrt")]
    TensorRT,
    #[cfg(feature = "coreml")]
    CoreML,
    #[cfg(feature = "cuda")]
    Cuda,
    #[cfg(feature = "directml")]
    DirectML,
}

const DEFAULT_PROVIDERS: &[ExecutionProvider] = &[
    #[cfg(feature = "tensorrt")]
    ExecutionProvider::TensorRT,
    #[cfg(feature = "coreml")]
    ExecutionProvider::CoreML,
    #[cfg(feature = "directml")]
    ExecutionProvider::DirectML,
    #[cfg(feature = "cuda")]
    ExecutionProvider::Cuda,
    ExecutionProvider::Default,
];
