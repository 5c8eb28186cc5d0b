use geo::{coord, Coord, Rect, Scale};

/// A decoded box at network input resolution.
///
/// Coordinates are integer pixels; `start` is the upper-left corner and `end`
/// the lower-right one. `cell` is the `(row, col)` of the score map cell the
/// box was decoded from and `confidence` is that cell's score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub confidence: f32,
    pub cell: (usize, usize),
}

impl Candidate {
    /// Maps the box back to original image pixels with the resize ratios.
    pub fn scaled(&self, factor_x: f32, factor_y: f32) -> TextBox {
        let rect = Rect::new(
            coord! { x: self.start_x as f32, y: self.start_y as f32 },
            coord! { x: self.end_x as f32, y: self.end_y as f32 },
        );
        TextBox {
            score: self.confidence,
            rect: rect.scale_around_point(factor_x, factor_y, Coord::zero()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextBox {
    pub score: f32,
    pub rect: Rect<f32>,
}
