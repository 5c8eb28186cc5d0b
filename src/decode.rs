//! Decoding of EAST score and geometry maps into candidate boxes.
//!
//! The network predicts, for every cell of a grid downsampled by
//! [`EAST_STRIDE`], a text probability plus five geometry channels: the
//! distances from the cell anchor to the top, right, bottom and left sides of
//! the box, and the box rotation in radians.

use ndarray::{ArrayView2, ArrayView3, Axis};
use tracing::instrument;

use crate::{
    error::{EastError, Result},
    Candidate,
};

/// Downsampling factor between the EAST output grid and its input image.
pub const EAST_STRIDE: u32 = 4;

/// Number of channels in the EAST geometry output.
pub const GEOMETRY_CHANNELS: usize = 5;

/// The five geometry grids predicted alongside the score map.
#[derive(Debug, Clone, Copy)]
pub struct GeometryMap<'a> {
    pub top: ArrayView2<'a, f32>,
    pub right: ArrayView2<'a, f32>,
    pub bottom: ArrayView2<'a, f32>,
    pub left: ArrayView2<'a, f32>,
    pub angle: ArrayView2<'a, f32>,
}

impl<'a> GeometryMap<'a> {
    pub fn new(
        top: ArrayView2<'a, f32>,
        right: ArrayView2<'a, f32>,
        bottom: ArrayView2<'a, f32>,
        left: ArrayView2<'a, f32>,
        angle: ArrayView2<'a, f32>,
    ) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
            angle,
        }
    }

    /// Splits a `(5, rows, cols)` view into its channels, in the model's
    /// output order: top, right, bottom, left, angle.
    pub fn from_channels(channels: ArrayView3<'a, f32>) -> Result<Self> {
        let (count, rows, cols) = channels.dim();
        if count != GEOMETRY_CHANNELS {
            return Err(EastError::DimensionMismatch {
                grid: "geometry channels",
                expected: vec![GEOMETRY_CHANNELS, rows, cols],
                found: vec![count, rows, cols],
            });
        }
        let channel = |index| channels.index_axis_move(Axis(0), index);
        Ok(Self::new(
            channel(0),
            channel(1),
            channel(2),
            channel(3),
            channel(4),
        ))
    }

    fn grids(&self) -> [(&'static str, &ArrayView2<'a, f32>); GEOMETRY_CHANNELS] {
        [
            ("top", &self.top),
            ("right", &self.right),
            ("bottom", &self.bottom),
            ("left", &self.left),
            ("angle", &self.angle),
        ]
    }
}

/// Turns every score map cell at or above `min_confidence` into a candidate.
///
/// Cells are visited row by row. For a cell at `(y, x)` the anchor sits at
/// `(x * stride, y * stride)` and the box corners follow the model's encoding:
///
/// ```text
/// end_x   = anchor_x + round(cos * right + sin * bottom)
/// end_y   = anchor_y - round(sin * right - cos * bottom)
/// start_x = end_x - round(right + left)
/// start_y = end_y - round(top + bottom)
/// ```
///
/// Only `right` and `bottom` enter the corner terms while the size uses all
/// four distances; this matches how the geometry targets were encoded at
/// training time and must not be changed independently of the model.
///
/// Fails if any geometry grid differs in shape from `score_map`, if
/// `min_confidence` is outside `[0, 1]`, if `stride` is zero, or if a kept
/// cell has non-finite geometry or decodes outside the `i32` pixel range.
/// An empty result is valid and means no text was found.
#[instrument(skip(score_map, geometry), level = "debug")]
pub fn decode(
    score_map: ArrayView2<f32>,
    geometry: &GeometryMap,
    min_confidence: f32,
    stride: u32,
) -> Result<Vec<Candidate>> {
    if !(0.0..=1.0).contains(&min_confidence) {
        return Err(EastError::InvalidParameter(format!(
            "minimum confidence must be within [0, 1], got {min_confidence}"
        )));
    }
    if stride == 0 {
        return Err(EastError::InvalidParameter(
            "stride must be positive".to_string(),
        ));
    }

    let (rows, cols) = score_map.dim();
    for (grid, values) in geometry.grids() {
        if values.dim() != (rows, cols) {
            let (found_rows, found_cols) = values.dim();
            return Err(EastError::DimensionMismatch {
                grid,
                expected: vec![rows, cols],
                found: vec![found_rows, found_cols],
            });
        }
    }

    let candidates = score_map
        .indexed_iter()
        .filter(|(_, confidence)| !confidence.is_nan() && **confidence >= min_confidence)
        .map(|((y, x), &confidence)| {
            let [start_x, start_y, end_x, end_y] = decode_cell(geometry, y, x, stride)
                .ok_or_else(|| {
                    EastError::InvalidParameter(format!(
                        "box at cell ({y}, {x}) with stride {stride} does not fit in i32 pixel coordinates"
                    ))
                })?;
            Ok(Candidate {
                start_x,
                start_y,
                end_x,
                end_y,
                confidence,
                cell: (y, x),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::trace!(
        "Decoded {} candidates from a {rows}x{cols} grid at min confidence {min_confidence}",
        candidates.len()
    );
    Ok(candidates)
}

/// Corners of the box at `(y, x)` as `[start_x, start_y, end_x, end_y]`, or
/// `None` if a geometry value is not finite or a coordinate leaves `i32`.
fn decode_cell(geometry: &GeometryMap, y: usize, x: usize, stride: u32) -> Option<[i32; 4]> {
    let offset_x = i64::try_from(x).ok()?.checked_mul(i64::from(stride))?;
    let offset_y = i64::try_from(y).ok()?.checked_mul(i64::from(stride))?;

    let angle = geometry.angle[[y, x]];
    let (sin, cos) = angle.sin_cos();

    let top = geometry.top[[y, x]];
    let right = geometry.right[[y, x]];
    let bottom = geometry.bottom[[y, x]];
    let left = geometry.left[[y, x]];

    let end_x = offset_x.checked_add(round_pixels(cos * right + sin * bottom)?)?;
    let end_y = offset_y.checked_sub(round_pixels(sin * right - cos * bottom)?)?;
    let start_x = end_x.checked_sub(round_pixels(right + left)?)?;
    let start_y = end_y.checked_sub(round_pixels(top + bottom)?)?;

    Some([
        i32::try_from(start_x).ok()?,
        i32::try_from(start_y).ok()?,
        i32::try_from(end_x).ok()?,
        i32::try_from(end_y).ok()?,
    ])
}

// Saturates at the i64 bounds; the checked arithmetic after it rejects those.
fn round_pixels(value: f32) -> Option<i64> {
    value.is_finite().then(|| value.round() as i64)
}
