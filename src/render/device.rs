//! Device seam between the interpreter and the rasterizer.
//!
//! The interpreter drives a [`Device`]: paths and glyph quads arrive in
//! user space, the device applies its transform stack (mirroring q/Q/cm)
//! and renders. Backends: the tiny-skia raster device for real output and
//! a recording device for interpreter tests.

use crate::core::error::PdfResult;
use crate::render::graphics_state::{FillRule, Matrix, StrokeProps};
use crate::render::path::Path;

/// Straight (non-premultiplied) RGBA color.
pub type Rgba = (u8, u8, u8, u8);

/// How a painting operator draws the current path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintMode {
    Fill(FillRule),
    Stroke,
    FillStroke(FillRule),
}

/// Decoded image samples ready for drawing.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Straight RGBA8, row-major, top row first.
    pub rgba: Vec<u8>,
}

/// Rendering backend.
pub trait Device {
    /// Pushes a copy of the device transform/clip state (`q`).
    fn save_state(&mut self);

    /// Pops the device state (`Q`). Unbalanced pops are ignored.
    fn restore_state(&mut self);

    /// Concatenates onto the current transform (`cm`).
    fn concat_matrix(&mut self, m: &Matrix);

    /// Paints a user-space path.
    fn draw_path(
        &mut self,
        path: &Path,
        mode: PaintMode,
        fill: Rgba,
        stroke: Rgba,
        stroke_props: &StrokeProps,
    ) -> PdfResult<()>;

    /// Intersects the clip region with a user-space path.
    fn clip_path(&mut self, path: &Path, rule: FillRule) -> PdfResult<()>;

    /// Paints one greeked glyph cell, corners in user space.
    fn draw_glyph_quad(&mut self, quad: [(f64, f64); 4], color: Rgba) -> PdfResult<()>;

    /// Draws an image; `placement` maps image pixel space into user space.
    fn draw_image(&mut self, image: &ImageData, placement: &Matrix) -> PdfResult<()>;
}

/// Records operations as strings; used to test the interpreter without
/// rasterizing.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    state_depth: usize,
    ops: Vec<String>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        RecordingDevice::default()
    }

    pub fn ops(&self) -> &[String] {
        &self.ops
    }
}

impl Device for RecordingDevice {
    fn save_state(&mut self) {
        self.state_depth += 1;
        self.ops.push("save".into());
    }

    fn restore_state(&mut self) {
        if self.state_depth > 0 {
            self.state_depth -= 1;
        }
        self.ops.push("restore".into());
    }

    fn concat_matrix(&mut self, m: &Matrix) {
        self.ops.push(format!("concat{m:?}"));
    }

    fn draw_path(
        &mut self,
        path: &Path,
        mode: PaintMode,
        _fill: Rgba,
        _stroke: Rgba,
        _stroke_props: &StrokeProps,
    ) -> PdfResult<()> {
        self.ops
            .push(format!("path[{} els] {mode:?}", path.elements().len()));
        Ok(())
    }

    fn clip_path(&mut self, path: &Path, rule: FillRule) -> PdfResult<()> {
        self.ops
            .push(format!("clip[{} els] {rule:?}", path.elements().len()));
        Ok(())
    }

    fn draw_glyph_quad(&mut self, quad: [(f64, f64); 4], _color: Rgba) -> PdfResult<()> {
        self.ops.push(format!(
            "glyph({:.1},{:.1})",
            quad[0].0, quad[0].1
        ));
        Ok(())
    }

    fn draw_image(&mut self, image: &ImageData, _placement: &Matrix) -> PdfResult<()> {
        self.ops
            .push(format!("image {}x{}", image.width, image.height));
        Ok(())
    }
}
