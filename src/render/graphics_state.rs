//! Graphics state for content stream interpretation.
//!
//! One [`GraphicsState`] value holds everything the painting operators
//! read: the CTM, colors, stroke properties and the text state. The
//! interpreter keeps a stack of these; `q` pushes a full value copy and
//! `Q` pops, so nothing is shared between nesting levels.

/// A 2D affine transform as the PDF six-tuple [a b c d e f]:
///
/// ```text
/// | a b 0 |
/// | c d 0 |
/// | e f 1 |
/// ```
pub type Matrix = [f64; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `other` applied first, then `m` (PDF operand order for `cm`).
pub fn matrix_multiply(other: &Matrix, m: &Matrix) -> Matrix {
    let [a1, b1, c1, d1, e1, f1] = *other;
    let [a2, b2, c2, d2, e2, f2] = *m;
    [
        a1 * a2 + b1 * c2,
        a1 * b2 + b1 * d2,
        c1 * a2 + d1 * c2,
        c1 * b2 + d1 * d2,
        e1 * a2 + f1 * c2 + e2,
        e1 * b2 + f1 * d2 + f2,
    ]
}

/// Transforms a point.
pub fn matrix_apply(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Line cap style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    ProjectingSquare,
}

/// Line join style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Stroke parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeProps {
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub dash_array: Vec<f64>,
    pub dash_phase: f64,
}

impl Default for StrokeProps {
    fn default() -> Self {
        StrokeProps {
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            dash_array: Vec::new(),
            dash_phase: 0.0,
        }
    }
}

/// Color in one of the device color spaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
}

impl Color {
    pub fn black() -> Self {
        Color::Gray(0.0)
    }

    /// RGBA8 conversion; CMYK through the usual naive transform.
    pub fn to_rgba8(self, alpha: f64) -> (u8, u8, u8, u8) {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        let quantize = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        match self {
            Color::Gray(g) => {
                let v = quantize(g);
                (v, v, v, a)
            }
            Color::Rgb(r, g, b) => (quantize(r), quantize(g), quantize(b), a),
            Color::Cmyk(c, m, y, k) => (
                quantize((1.0 - c.clamp(0.0, 1.0)) * (1.0 - k.clamp(0.0, 1.0))),
                quantize((1.0 - m.clamp(0.0, 1.0)) * (1.0 - k.clamp(0.0, 1.0))),
                quantize((1.0 - y.clamp(0.0, 1.0)) * (1.0 - k.clamp(0.0, 1.0))),
                a,
            ),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::black()
    }
}

/// Text rendering mode (Tr operand).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRenderMode {
    #[default]
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    FillClip,
    StrokeClip,
    FillStrokeClip,
    Clip,
}

impl TextRenderMode {
    pub fn from_value(v: i64) -> TextRenderMode {
        match v {
            1 => TextRenderMode::Stroke,
            2 => TextRenderMode::FillStroke,
            3 => TextRenderMode::Invisible,
            4 => TextRenderMode::FillClip,
            5 => TextRenderMode::StrokeClip,
            6 => TextRenderMode::FillStrokeClip,
            7 => TextRenderMode::Clip,
            _ => TextRenderMode::Fill,
        }
    }

    pub fn paints(self) -> bool {
        !matches!(self, TextRenderMode::Invisible | TextRenderMode::Clip)
    }
}

/// Fill rule for painting and clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// Everything the painting operators read, value-copied on q/Q.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub stroke_color: Color,
    pub fill_color: Color,
    pub stroke_alpha: f64,
    pub fill_alpha: f64,
    pub stroke_props: StrokeProps,

    // Text state
    pub font_name: Option<String>,
    pub font_size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// Percentage, 100 = unscaled.
    pub horizontal_scale: f64,
    pub leading: f64,
    pub text_rise: f64,
    pub render_mode: TextRenderMode,
    pub text_matrix: Matrix,
    pub text_line_matrix: Matrix,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: IDENTITY,
            stroke_color: Color::black(),
            fill_color: Color::black(),
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
            stroke_props: StrokeProps::default(),
            font_name: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 100.0,
            leading: 0.0,
            text_rise: 0.0,
            render_mode: TextRenderMode::default(),
            text_matrix: IDENTITY,
            text_line_matrix: IDENTITY,
        }
    }
}

impl GraphicsState {
    /// Concatenates a matrix onto the CTM (`cm`).
    pub fn concat(&mut self, m: &Matrix) {
        self.ctm = matrix_multiply(m, &self.ctm);
    }
}
