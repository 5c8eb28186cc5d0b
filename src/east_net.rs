use std::path::PathBuf;

use image::DynamicImage;
use ndarray::{ArrayView2, ArrayView3, ArrayView4, ArrayViewD, Axis, Ix4};
use ort::{inputs, ExecutionProviderDispatch, GraphOptimizationLevel, Session};
use tracing::instrument;

use crate::{
    decode::{decode, GeometryMap, EAST_STRIDE},
    error::{EastError, Result},
    nms::suppress,
    util::{self, subtract_mean, EAST_MEAN_VALUES},
    ExecutionProvider, ModelSignature, TensorLayout, TextBox,
};

pub struct EastNet {
    session: Session,
    signature: ModelSignature,
}

#[cfg(feature = "tensorrt")]
fn setup_tensorrt(
    cache_path: PathBuf,
    signature: &ModelSignature,
    max_side_len: u32,
) -> ExecutionProviderDispatch {
    use ort::TensorRTExecutionProvider;

    let shape = |height: u32, width: u32| match signature.layout {
        TensorLayout::Nchw => format!("{}:1x3x{height}x{width}", signature.input),
        TensorLayout::Nhwc => format!("{}:1x{height}x{width}x3", signature.input),
    };
    TensorRTExecutionProvider::default()
        .with_profile_min_shapes(shape(32, 32))
        .with_profile_max_shapes(shape(max_side_len, max_side_len))
        .with_profile_opt_shapes(shape(max_side_len, max_side_len))
        .with_engine_cache(true)
        .with_engine_cache_path(cache_path.to_string_lossy())
        .with_timing_cache(true)
        .with_builder_optimization_level(5)
        .with_detailed_build_log(true)
        .build()
}

#[cfg(feature = "cuda")]
fn setup_cuda() -> ExecutionProviderDispatch {
    use ort::CUDAExecutionProvider;

    CUDAExecutionProvider::default().build()
}

#[cfg(feature = "directml")]
fn setup_directml() -> ExecutionProviderDispatch {
    use ort::DirectMLExecutionProvider;

    DirectMLExecutionProvider::default().build()
}

#[cfg(feature = "coreml")]
fn setup_coreml() -> ExecutionProviderDispatch {
    use ort::CoreMLExecutionProvider;

    CoreMLExecutionProvider::default().build()
}

impl EastNet {
    #[instrument(level = "debug")]
    pub fn init(
        path: PathBuf,
        signature: ModelSignature,
        num_threads: usize,
        max_side_len: u32,
        execution_providers: &[ExecutionProvider],
        cache_path: Option<PathBuf>,
    ) -> Result<Self> {
        #[cfg(feature = "directml")]
        let parallel = execution_providers.contains(&ExecutionProvider::DirectML);
        #[cfg(not(feature = "directml"))]
        let parallel = true;

        #[cfg(feature = "tensorrt")]
        let trt_cache_path = cache_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|parent| parent.join(".cache"))
                .unwrap_or_else(|| PathBuf::from(".cache"))
        });

        let execution_providers = execution_providers
            .iter()
            .filter_map(|provider| -> Option<ExecutionProviderDispatch> {
                match provider {
                    ExecutionProvider::Default => None,
                    #[cfg(feature = "tensorrt")]
                    ExecutionProvider::TensorRT => Some(setup_tensorrt(
                        trt_cache_path.clone(),
                        &signature,
                        max_side_len,
                    )),
                    #[cfg(feature = "coreml")]
                    ExecutionProvider::CoreML => Some(setup_coreml()),
                    #[cfg(feature = "cuda")]
                    ExecutionProvider::Cuda => Some(setup_cuda()),
                    #[cfg(feature = "directml")]
                    ExecutionProvider::DirectML => Some(setup_directml()),
                }
            })
            .collect::<Vec<_>>();

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_memory_pattern(parallel)?
            .with_parallel_execution(parallel)?
            .with_inter_threads(num_threads)?
            .with_intra_threads(num_threads)?
            .with_execution_providers(execution_providers)?
            .commit_from_file(path)?;

        log::debug!("EAST session inputs: {:?}", session.inputs);
        log::debug!("EAST session outputs: {:?}", session.outputs);

        Ok(Self { session, signature })
    }

    #[instrument(skip(self, image), level = "debug")]
    pub fn get_text_boxes(
        &self,
        image: &DynamicImage,
        scale: util::Scale,
        min_confidence: f32,
        overlap_threshold: f32,
    ) -> Result<Vec<TextBox>> {
        let ModelSignature {
            input,
            score_output,
            geometry_output,
            layout,
        } = &self.signature;

        let input_values = subtract_mean(image, scale, &EAST_MEAN_VALUES, *layout);
        let outputs = self
            .session
            .run(inputs![input.as_str() => input_values]?)?;

        let scores = outputs
            .get(score_output.as_str())
            .ok_or_else(|| EastError::MissingOutput(score_output.clone()))?
            .try_extract_tensor::<f32>()?;
        let geometry = outputs
            .get(geometry_output.as_str())
            .ok_or_else(|| EastError::MissingOutput(geometry_output.clone()))?
            .try_extract_tensor::<f32>()?;
        log::trace!(
            "Score tensor {:?}, geometry tensor {:?}",
            scores.shape(),
            geometry.shape()
        );

        let (score_map, channels) = split_outputs(scores.view(), geometry.view(), *layout)?;
        find_text_boxes(
            score_map,
            &GeometryMap::from_channels(channels)?,
            scale,
            min_confidence,
            overlap_threshold,
        )
    }
}

/// Takes the first batch item of the raw score and geometry tensors and
/// returns the `(rows, cols)` score map and the `(channels, rows, cols)`
/// geometry channels.
pub fn split_outputs<'a>(
    scores: ArrayViewD<'a, f32>,
    geometry: ArrayViewD<'a, f32>,
    layout: TensorLayout,
) -> Result<(ArrayView2<'a, f32>, ArrayView3<'a, f32>)> {
    let scores = to_4d("score tensor", scores)?;
    let geometry = to_4d("geometry tensor", geometry)?;

    let score_channel_axis = match layout {
        TensorLayout::Nchw => 1,
        TensorLayout::Nhwc => 3,
    };
    if geometry.len_of(Axis(0)) == 0 {
        return Err(EastError::DimensionMismatch {
            grid: "geometry tensor",
            expected: vec![1],
            found: vec![0],
        });
    }
    if scores.len_of(Axis(0)) == 0 || scores.len_of(Axis(score_channel_axis)) != 1 {
        return Err(EastError::DimensionMismatch {
            grid: "score tensor",
            expected: match layout {
                TensorLayout::Nchw => vec![1, 1, scores.shape()[2], scores.shape()[3]],
                TensorLayout::Nhwc => vec![1, scores.shape()[1], scores.shape()[2], 1],
            },
            found: scores.shape().to_vec(),
        });
    }

    let scores = scores.index_axis_move(Axis(0), 0);
    let geometry = geometry.index_axis_move(Axis(0), 0);
    Ok(match layout {
        TensorLayout::Nchw => (scores.index_axis_move(Axis(0), 0), geometry),
        TensorLayout::Nhwc => (
            scores.index_axis_move(Axis(2), 0),
            geometry.permuted_axes([2, 0, 1]),
        ),
    })
}

fn to_4d<'a>(
    grid: &'static str,
    tensor: ArrayViewD<'a, f32>,
) -> Result<ArrayView4<'a, f32>> {
    let rank = tensor.ndim();
    tensor
        .into_dimensionality::<Ix4>()
        .map_err(|_| EastError::DimensionMismatch {
            grid,
            expected: vec![4],
            found: vec![rank],
        })
}

/// Decodes, suppresses and rescales boxes to original image pixels.
#[instrument(skip(score_map, geometry), level = "trace")]
pub fn find_text_boxes(
    score_map: ArrayView2<f32>,
    geometry: &GeometryMap,
    util::Scale {
        factor_x, factor_y, ..
    }: util::Scale,
    min_confidence: f32,
    overlap_threshold: f32,
) -> Result<Vec<TextBox>> {
    let candidates = decode(score_map, geometry, min_confidence, EAST_STRIDE)?;
    let boxes = suppress(&candidates, overlap_threshold)?
        .into_iter()
        .map(|candidate| candidate.scaled(factor_x, factor_y))
        .collect::<Vec<_>>();
    log::debug!(
        "{} text boxes survived suppression out of {} candidates",
        boxes.len(),
        candidates.len()
    );
    Ok(boxes)
}
