use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::TextBox;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: u32 = 2;

/// Outlines every box on `image`. Boxes partially outside the image are
/// clipped.
pub fn draw_text_boxes(image: &mut RgbImage, boxes: &[TextBox]) {
    for text_box in boxes {
        let min = text_box.rect.min();
        let max = text_box.rect.max();
        let (x, y) = (min.x as i32, min.y as i32);
        let width = (max.x as i32 - x).max(1) as u32;
        let height = (max.y as i32 - y).max(1) as u32;
        log::trace!("Drawing box at ({x}, {y}) sized {width}x{height}");

        for inset in 0..BOX_THICKNESS {
            if width <= 2 * inset || height <= 2 * inset {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32)
                .of_size(width - 2 * inset, height - 2 * inset);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }
    }
}
