//! tiny-skia rendering backend.
//!
//! Owns a mutable view over the output pixels and a stack of
//! transform+clip states mirroring the interpreter's q/Q nesting. All
//! drawing is anti-aliased; output is deterministic for identical input.

use tiny_skia::{
    FillRule as SkFillRule, LineCap as SkLineCap, LineJoin as SkLineJoin, Mask, Paint as SkPaint,
    PathBuilder, Pixmap, PixmapMut, PixmapPaint, Stroke, StrokeDash, Transform,
};

use crate::core::error::{PdfError, PdfResult};
use crate::render::device::{Device, ImageData, PaintMode, Rgba};
use crate::render::graphics_state::{FillRule, LineCap, LineJoin, Matrix, StrokeProps};
use crate::render::path::{Path, PathElement};

fn to_sk_transform(m: &Matrix) -> Transform {
    Transform::from_row(
        m[0] as f32,
        m[1] as f32,
        m[2] as f32,
        m[3] as f32,
        m[4] as f32,
        m[5] as f32,
    )
}

fn to_sk_fill_rule(rule: FillRule) -> SkFillRule {
    match rule {
        FillRule::NonZero => SkFillRule::Winding,
        FillRule::EvenOdd => SkFillRule::EvenOdd,
    }
}

fn to_sk_paint(color: Rgba) -> SkPaint<'static> {
    let mut paint = SkPaint::default();
    paint.set_color_rgba8(color.0, color.1, color.2, color.3);
    paint.anti_alias = true;
    paint
}

fn to_sk_stroke(props: &StrokeProps) -> Stroke {
    let dash = if props.dash_array.is_empty() {
        None
    } else {
        // tiny-skia wants an even-length pattern; PDF repeats odd ones.
        let mut pattern: Vec<f32> = props.dash_array.iter().map(|&v| v as f32).collect();
        if pattern.len() % 2 != 0 {
            let copy = pattern.clone();
            pattern.extend(copy);
        }
        StrokeDash::new(pattern, props.dash_phase as f32)
    };

    Stroke {
        // A zero line width means "thinnest renderable"; keep it visible.
        width: (props.line_width.max(0.1)) as f32,
        miter_limit: props.miter_limit as f32,
        line_cap: match props.line_cap {
            LineCap::Butt => SkLineCap::Butt,
            LineCap::Round => SkLineCap::Round,
            LineCap::ProjectingSquare => SkLineCap::Square,
        },
        line_join: match props.line_join {
            LineJoin::Miter => SkLineJoin::Miter,
            LineJoin::Round => SkLineJoin::Round,
            LineJoin::Bevel => SkLineJoin::Bevel,
        },
        dash,
    }
}

fn to_sk_path(path: &Path) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathElement::MoveTo(x, y) => builder.move_to(x as f32, y as f32),
            PathElement::LineTo(x, y) => builder.line_to(x as f32, y as f32),
            PathElement::CurveTo(x1, y1, x2, y2, x3, y3) => builder.cubic_to(
                x1 as f32, y1 as f32, x2 as f32, y2 as f32, x3 as f32, y3 as f32,
            ),
            PathElement::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

#[derive(Clone)]
struct DeviceState {
    transform: Transform,
    clip: Option<Mask>,
}

/// Raster device writing into caller-owned RGBA memory.
pub struct SkiaDevice<'a> {
    pixmap: PixmapMut<'a>,
    states: Vec<DeviceState>,
}

impl<'a> SkiaDevice<'a> {
    /// Wraps a pixel buffer. `base` is the user-space → device-space page
    /// transform; the buffer is filled opaque white first (blank page
    /// background).
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        base: &Matrix,
    ) -> PdfResult<SkiaDevice<'a>> {
        // Opaque white page background. White is identical premultiplied
        // and straight, so the buffer can be prefilled bytewise.
        data.fill(0xFF);
        let pixmap = PixmapMut::from_bytes(data, width, height).ok_or(
            PdfError::SurfaceSizeMismatch {
                expected: (width, height),
                actual: (0, 0),
            },
        )?;

        Ok(SkiaDevice {
            pixmap,
            states: vec![DeviceState {
                transform: to_sk_transform(base),
                clip: None,
            }],
        })
    }

    fn state(&self) -> &DeviceState {
        self.states.last().expect("device state stack underflow")
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        self.states.last_mut().expect("device state stack underflow")
    }
}

/// Converts premultiplied RGBA bytes to straight RGBA in place. Run once
/// over the surface after the device has been dropped.
pub fn demultiply_in_place(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a != 0 && a != 255 {
            for channel in px.iter_mut().take(3) {
                *channel = ((*channel as u32 * 255 + a / 2) / a).min(255) as u8;
            }
        }
    }
}

impl Device for SkiaDevice<'_> {
    fn save_state(&mut self) {
        let copy = self.state().clone();
        self.states.push(copy);
    }

    fn restore_state(&mut self) {
        if self.states.len() > 1 {
            self.states.pop();
        }
    }

    fn concat_matrix(&mut self, m: &Matrix) {
        let t = to_sk_transform(m);
        let state = self.state_mut();
        state.transform = state.transform.pre_concat(t);
    }

    fn draw_path(
        &mut self,
        path: &Path,
        mode: PaintMode,
        fill: Rgba,
        stroke: Rgba,
        stroke_props: &StrokeProps,
    ) -> PdfResult<()> {
        let sk_path = match to_sk_path(path) {
            Some(p) => p,
            None => return Ok(()),
        };
        let transform = self.state().transform;
        let clip = self.state().clip.clone();

        match mode {
            PaintMode::Fill(rule) => {
                self.pixmap.fill_path(
                    &sk_path,
                    &to_sk_paint(fill),
                    to_sk_fill_rule(rule),
                    transform,
                    clip.as_ref(),
                );
            }
            PaintMode::Stroke => {
                self.pixmap.stroke_path(
                    &sk_path,
                    &to_sk_paint(stroke),
                    &to_sk_stroke(stroke_props),
                    transform,
                    clip.as_ref(),
                );
            }
            PaintMode::FillStroke(rule) => {
                self.pixmap.fill_path(
                    &sk_path,
                    &to_sk_paint(fill),
                    to_sk_fill_rule(rule),
                    transform,
                    clip.as_ref(),
                );
                self.pixmap.stroke_path(
                    &sk_path,
                    &to_sk_paint(stroke),
                    &to_sk_stroke(stroke_props),
                    transform,
                    clip.as_ref(),
                );
            }
        }
        Ok(())
    }

    fn clip_path(&mut self, path: &Path, rule: FillRule) -> PdfResult<()> {
        let sk_path = match to_sk_path(path) {
            Some(p) => p,
            None => return Ok(()),
        };
        let transform = self.state().transform;
        let (w, h) = (self.pixmap.width(), self.pixmap.height());

        let state = self.state_mut();
        match &mut state.clip {
            Some(mask) => {
                mask.intersect_path(&sk_path, to_sk_fill_rule(rule), true, transform);
            }
            None => {
                let mut mask = match Mask::new(w, h) {
                    Some(m) => m,
                    None => return Ok(()),
                };
                mask.fill_path(&sk_path, to_sk_fill_rule(rule), true, transform);
                state.clip = Some(mask);
            }
        }
        Ok(())
    }

    fn draw_glyph_quad(&mut self, quad: [(f64, f64); 4], color: Rgba) -> PdfResult<()> {
        let mut builder = PathBuilder::new();
        builder.move_to(quad[0].0 as f32, quad[0].1 as f32);
        for corner in &quad[1..] {
            builder.line_to(corner.0 as f32, corner.1 as f32);
        }
        builder.close();
        let sk_path = match builder.finish() {
            Some(p) => p,
            None => return Ok(()),
        };

        let transform = self.state().transform;
        let clip = self.state().clip.clone();
        self.pixmap.fill_path(
            &sk_path,
            &to_sk_paint(color),
            SkFillRule::Winding,
            transform,
            clip.as_ref(),
        );
        Ok(())
    }

    fn draw_image(&mut self, image: &ImageData, placement: &Matrix) -> PdfResult<()> {
        if image.width == 0 || image.height == 0 {
            return Ok(());
        }
        let expected = image.width as usize * image.height as usize * 4;
        if image.rgba.len() != expected {
            return Err(PdfError::syntax("image sample buffer size mismatch"));
        }

        // Premultiply into a pixmap tiny-skia can blit.
        let mut pixmap = Pixmap::new(image.width, image.height)
            .ok_or_else(|| PdfError::syntax("image dimensions unusable"))?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.rgba.chunks(4)) {
            let c = tiny_skia::ColorU8::from_rgba(src[0], src[1], src[2], src[3]);
            *dst = c.premultiply();
        }

        let transform = self.state().transform.pre_concat(to_sk_transform(placement));
        let clip = self.state().clip.clone();
        let paint = PixmapPaint::default();
        self.pixmap
            .draw_pixmap(0, 0, pixmap.as_ref(), &paint, transform, clip.as_ref());
        Ok(())
    }
}
