use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;
use tracing::instrument;

use crate::{
    error::{EastError, Result},
    TensorLayout,
};

/// Per-channel RGB means subtracted from the EAST input.
pub const EAST_MEAN_VALUES: [f32; 3] = [123.68, 116.78, 103.94];

/// EAST input sides must be multiples of this.
pub const INPUT_ALIGNMENT: u32 = 32;

/// Resizes to the network input and lays the pixels out as a batch of one,
/// with `mean_vals` subtracted per RGB channel and no further scaling.
#[instrument(level = "debug", skip(image))]
pub fn subtract_mean(
    image: &DynamicImage,
    scale: Scale,
    mean_vals: &[f32; 3],
    layout: TensorLayout,
) -> Array4<f32> {
    let image = image
        .resize_exact(scale.target_width, scale.target_height, FilterType::Triangle)
        .to_rgb8();
    let (width, height) = (image.width() as usize, image.height() as usize);
    let value = |ch: usize, y: usize, x: usize| {
        image.get_pixel(x as u32, y as u32).0[ch] as f32 - mean_vals[ch]
    };
    match layout {
        TensorLayout::Nchw => {
            Array4::<f32>::from_shape_fn((1, 3, height, width), |(_, ch, y, x)| value(ch, y, x))
        }
        TensorLayout::Nhwc => {
            Array4::<f32>::from_shape_fn((1, height, width, 3), |(_, y, x, ch)| value(ch, y, x))
        }
    }
}

/// How an image maps onto the network input.
///
/// `factor_x` and `factor_y` are original size divided by target size, so
/// multiplying network-space coordinates by them gives original pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub factor_x: f32,
    pub factor_y: f32,
    pub target_width: u32,
    pub target_height: u32,
}

/// Rejects network input sides that are zero or not multiples of 32.
pub fn check_input_size(width: u32, height: u32) -> Result<()> {
    for (name, side) in [("width", width), ("height", height)] {
        if side == 0 || side % INPUT_ALIGNMENT != 0 {
            return Err(EastError::InvalidParameter(format!(
                "input {name} must be a positive multiple of {INPUT_ALIGNMENT}, got {side}"
            )));
        }
    }
    Ok(())
}

/// Plans a resize to exactly `target_width` x `target_height`.
pub fn scale_exact(image: &DynamicImage, target_width: u32, target_height: u32) -> Result<Scale> {
    check_input_size(target_width, target_height)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(EastError::InvalidParameter("image has no pixels".to_string()));
    }
    Ok(Scale {
        factor_x: image.width() as f32 / target_width as f32,
        factor_y: image.height() as f32 / target_height as f32,
        target_width,
        target_height,
    })
}

/// Plans a resize keeping the aspect ratio, with the long side at most
/// `target_size` and both sides floored to a multiple of 32.
pub fn scale_normalized(image: &DynamicImage, target_size: u32) -> Result<Scale> {
    if image.width() == 0 || image.height() == 0 {
        return Err(EastError::InvalidParameter("image has no pixels".to_string()));
    }
    let aspect_ratio = image.width() as f32 / image.height() as f32;
    let (mut target_width, mut target_height) = if aspect_ratio >= 1.0 {
        let width = image.width().min(target_size);
        let height = (width as f32 / aspect_ratio) as u32;
        (width, height)
    } else {
        let height = image.height().min(target_size);
        let width = (height as f32 * aspect_ratio) as u32;
        (width, height)
    };
    if target_width % INPUT_ALIGNMENT != 0 {
        let new_width = (target_width / INPUT_ALIGNMENT * INPUT_ALIGNMENT).max(INPUT_ALIGNMENT);
        log::debug!(
            "Target width of {target_width} wasn't a multiple of 32, flooring to {new_width}."
        );
        target_width = new_width;
    }
    if target_height % INPUT_ALIGNMENT != 0 {
        let new_height = (target_height / INPUT_ALIGNMENT * INPUT_ALIGNMENT).max(INPUT_ALIGNMENT);
        log::debug!(
            "Target height of {target_height} wasn't a multiple of 32, flooring to {new_height}."
        );
        target_height = new_height;
    }
    let scale = scale_exact(image, target_width, target_height)?;
    log::debug!("Resize will change image dimensions from (w: {}, h: {}) to (w: {target_width}, h: {target_height}) with scaling factor ({}, {}).", image.width(), image.height(), scale.factor_x, scale.factor_y);
    Ok(scale)
}
