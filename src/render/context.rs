//! Content stream interpretation.
//!
//! Executes scanned operations against a graphics-state stack and a
//! [`Device`]. Operator failures are local: bad operands and unsupported
//! features are logged and skipped, and the rest of the page still
//! renders. Form XObjects recurse with a depth cap; image XObjects are
//! decoded when the sample format is one we carry (8-bit gray/RGB,
//! Flate or raw), otherwise skipped.

use crate::core::content_stream::{scan_operations, OpCode, Operation};
use crate::core::error::{PdfError, PdfResult};
use crate::core::font::Font;
use crate::core::page::Page;
use crate::core::parser::{Dict, Object};
use crate::core::xref::XRef;
use crate::render::device::{Device, ImageData, PaintMode, Rgba};
use crate::render::graphics_state::{
    matrix_apply, matrix_multiply, Color, FillRule, GraphicsState, LineCap, LineJoin, Matrix,
    TextRenderMode, IDENTITY,
};
use crate::render::path::Path;

/// Form XObjects referencing forms referencing forms… stop here.
const MAX_FORM_DEPTH: usize = 16;

/// Vertical extent of a greeked glyph cell, as a fraction of the em
/// square (roughly cap height).
const GREEK_CELL_HEIGHT: f64 = 0.72;

/// Horizontal inset of a greeked glyph cell on each side.
const GREEK_CELL_INSET: f64 = 0.08;

/// Renders a page's content streams into a device.
pub fn render_page_content<D: Device>(
    xref: &mut XRef,
    page: &Page,
    device: &mut D,
) -> PdfResult<()> {
    let content = concatenated_content(xref, page)?;
    let ops = scan_operations(&content)?;

    let mut interp = Interpreter {
        xref,
        device,
        states: vec![GraphicsState::default()],
        path: Path::new(),
        pending_clip: None,
        current_font: None,
    };
    interp.run(&ops, &page.resources, 0)
}

/// Joins a page's content streams with newline separators, decoding each.
fn concatenated_content(xref: &mut XRef, page: &Page) -> PdfResult<Vec<u8>> {
    let contents = match page.contents() {
        Some(c) => xref.resolve(c)?,
        None => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    let mut append = |xref: &mut XRef, obj: &Object| -> PdfResult<()> {
        if let Object::Stream(s) = obj {
            match xref.decoded_stream_data(s) {
                Ok(data) => {
                    if !out.is_empty() {
                        out.push(b'\n');
                    }
                    out.extend_from_slice(&data);
                }
                Err(e) => {
                    log::warn!("skipping undecodable content stream: {e}");
                }
            }
        }
        Ok(())
    };

    match contents {
        Object::Stream(_) => append(xref, &contents)?,
        Object::Array(items) => {
            for item in items {
                let resolved = xref.resolve(&item)?;
                append(xref, &resolved)?;
            }
        }
        _ => {}
    }
    Ok(out)
}

struct Interpreter<'a, D: Device> {
    xref: &'a mut XRef,
    device: &'a mut D,
    states: Vec<GraphicsState>,
    path: Path,
    pending_clip: Option<FillRule>,
    current_font: Option<Font>,
}

impl<D: Device> Interpreter<'_, D> {
    fn state(&self) -> &GraphicsState {
        self.states.last().expect("graphics state stack underflow")
    }

    fn state_mut(&mut self) -> &mut GraphicsState {
        self.states.last_mut().expect("graphics state stack underflow")
    }

    fn fill_rgba(&self) -> Rgba {
        let s = self.state();
        s.fill_color.to_rgba8(s.fill_alpha)
    }

    fn stroke_rgba(&self) -> Rgba {
        let s = self.state();
        s.stroke_color.to_rgba8(s.stroke_alpha)
    }

    fn run(&mut self, ops: &[Operation], resources: &Option<Dict>, depth: usize) -> PdfResult<()> {
        for op in ops {
            if let Err(e) = self.execute(op, resources, depth) {
                // Operator-local damage: log and keep rendering.
                log::warn!("operator {:?} failed: {e}", op.op);
            }
        }
        Ok(())
    }

    fn execute(&mut self, op: &Operation, resources: &Option<Dict>, depth: usize) -> PdfResult<()> {
        use OpCode::*;
        let args = &op.operands;

        match op.op {
            // -- graphics state --------------------------------------------
            Save => {
                let copy = self.state().clone();
                self.states.push(copy);
                self.device.save_state();
            }
            Restore => {
                if self.states.len() > 1 {
                    self.states.pop();
                    self.device.restore_state();
                } else {
                    log::warn!("Q with empty graphics state stack, ignoring");
                }
            }
            Transform => {
                let m = matrix_args(args)?;
                self.state_mut().concat(&m);
                self.device.concat_matrix(&m);
            }
            SetLineWidth => self.state_mut().stroke_props.line_width = num(args, 0)?,
            SetLineCap => {
                self.state_mut().stroke_props.line_cap = match num(args, 0)? as i32 {
                    1 => LineCap::Round,
                    2 => LineCap::ProjectingSquare,
                    _ => LineCap::Butt,
                }
            }
            SetLineJoin => {
                self.state_mut().stroke_props.line_join = match num(args, 0)? as i32 {
                    1 => LineJoin::Round,
                    2 => LineJoin::Bevel,
                    _ => LineJoin::Miter,
                }
            }
            SetMiterLimit => self.state_mut().stroke_props.miter_limit = num(args, 0)?,
            SetDash => {
                let pattern = args
                    .first()
                    .and_then(Object::as_array)
                    .map(|a| a.iter().filter_map(Object::as_number).collect())
                    .unwrap_or_default();
                let phase = num(args, 1).unwrap_or(0.0);
                let props = &mut self.state_mut().stroke_props;
                props.dash_array = pattern;
                props.dash_phase = phase;
            }
            SetExtGState => self.apply_ext_gstate(args, resources)?,
            SetRenderingIntent | SetFlatness => {}

            // -- path construction -----------------------------------------
            MoveTo => {
                let (x, y) = (num(args, 0)?, num(args, 1)?);
                self.path.move_to(x, y);
            }
            LineTo => {
                let (x, y) = (num(args, 0)?, num(args, 1)?);
                self.path.line_to(x, y);
            }
            CurveTo => {
                let c = nums::<6>(args)?;
                self.path.curve_to(c[0], c[1], c[2], c[3], c[4], c[5]);
            }
            CurveToInitial => {
                let c = nums::<4>(args)?;
                let (cx, cy) = self.path.current_point().unwrap_or((c[0], c[1]));
                self.path.curve_to(cx, cy, c[0], c[1], c[2], c[3]);
            }
            CurveToFinal => {
                let c = nums::<4>(args)?;
                self.path.curve_to(c[0], c[1], c[2], c[3], c[2], c[3]);
            }
            ClosePath => self.path.close(),
            Rectangle => {
                let c = nums::<4>(args)?;
                self.path.rect(c[0], c[1], c[2], c[3]);
            }

            // -- path painting ---------------------------------------------
            Stroke => self.paint(Some(PaintMode::Stroke))?,
            CloseStroke => {
                self.path.close();
                self.paint(Some(PaintMode::Stroke))?;
            }
            Fill => self.paint(Some(PaintMode::Fill(FillRule::NonZero)))?,
            EvenOddFill => self.paint(Some(PaintMode::Fill(FillRule::EvenOdd)))?,
            FillStroke => self.paint(Some(PaintMode::FillStroke(FillRule::NonZero)))?,
            EvenOddFillStroke => self.paint(Some(PaintMode::FillStroke(FillRule::EvenOdd)))?,
            CloseFillStroke => {
                self.path.close();
                self.paint(Some(PaintMode::FillStroke(FillRule::NonZero)))?;
            }
            CloseEvenOddFillStroke => {
                self.path.close();
                self.paint(Some(PaintMode::FillStroke(FillRule::EvenOdd)))?;
            }
            EndPath => self.paint(None)?,

            // -- clipping --------------------------------------------------
            Clip => self.pending_clip = Some(FillRule::NonZero),
            EvenOddClip => self.pending_clip = Some(FillRule::EvenOdd),

            // -- color -----------------------------------------------------
            SetStrokeGray => self.state_mut().stroke_color = Color::Gray(num(args, 0)?),
            SetFillGray => self.state_mut().fill_color = Color::Gray(num(args, 0)?),
            SetStrokeRgb => {
                let c = nums::<3>(args)?;
                self.state_mut().stroke_color = Color::Rgb(c[0], c[1], c[2]);
            }
            SetFillRgb => {
                let c = nums::<3>(args)?;
                self.state_mut().fill_color = Color::Rgb(c[0], c[1], c[2]);
            }
            SetStrokeCmyk => {
                let c = nums::<4>(args)?;
                self.state_mut().stroke_color = Color::Cmyk(c[0], c[1], c[2], c[3]);
            }
            SetFillCmyk => {
                let c = nums::<4>(args)?;
                self.state_mut().fill_color = Color::Cmyk(c[0], c[1], c[2], c[3]);
            }
            SetStrokeColor | SetStrokeColorN => {
                if let Some(color) = color_from_components(args) {
                    self.state_mut().stroke_color = color;
                }
            }
            SetFillColor | SetFillColorN => {
                if let Some(color) = color_from_components(args) {
                    self.state_mut().fill_color = color;
                }
            }
            SetStrokeColorSpace | SetFillColorSpace => {
                // Device spaces are implied by the component count at
                // SC/SCN time; named spaces beyond that are approximated.
            }

            // -- text ------------------------------------------------------
            BeginText => {
                let state = self.state_mut();
                state.text_matrix = IDENTITY;
                state.text_line_matrix = IDENTITY;
            }
            EndText => {}
            SetCharSpacing => self.state_mut().char_spacing = num(args, 0)?,
            SetWordSpacing => self.state_mut().word_spacing = num(args, 0)?,
            SetHorizontalScale => self.state_mut().horizontal_scale = num(args, 0)?,
            SetLeading => self.state_mut().leading = num(args, 0)?,
            SetTextRise => self.state_mut().text_rise = num(args, 0)?,
            SetTextRenderMode => {
                self.state_mut().render_mode = TextRenderMode::from_value(num(args, 0)? as i64)
            }
            SetFont => self.set_font(args, resources)?,
            MoveText => {
                let (tx, ty) = (num(args, 0)?, num(args, 1)?);
                self.translate_text_line(tx, ty);
            }
            MoveTextSetLeading => {
                let (tx, ty) = (num(args, 0)?, num(args, 1)?);
                self.state_mut().leading = -ty;
                self.translate_text_line(tx, ty);
            }
            SetTextMatrix => {
                let m = matrix_args(args)?;
                let state = self.state_mut();
                state.text_matrix = m;
                state.text_line_matrix = m;
            }
            NextLine => {
                let leading = self.state().leading;
                self.translate_text_line(0.0, -leading);
            }
            ShowText => {
                if let Some(bytes) = args.first().and_then(Object::as_string_bytes) {
                    let bytes = bytes.to_vec();
                    self.show_text(&bytes)?;
                }
            }
            ShowTextAdjusted => {
                let items = match args.first().and_then(Object::as_array) {
                    Some(a) => a.to_vec(),
                    None => return Ok(()),
                };
                for item in items {
                    match item {
                        Object::String(ref b) | Object::HexString(ref b) => {
                            let b = b.clone();
                            self.show_text(&b)?;
                        }
                        Object::Number(adj) => {
                            let state = self.state();
                            let tx = -adj / 1000.0
                                * state.font_size
                                * (state.horizontal_scale / 100.0);
                            self.translate_text(tx);
                        }
                        _ => {}
                    }
                }
            }
            NextLineShowText => {
                let leading = self.state().leading;
                self.translate_text_line(0.0, -leading);
                if let Some(bytes) = args.first().and_then(Object::as_string_bytes) {
                    let bytes = bytes.to_vec();
                    self.show_text(&bytes)?;
                }
            }
            NextLineShowTextSpacing => {
                let (aw, ac) = (num(args, 0)?, num(args, 1)?);
                self.state_mut().word_spacing = aw;
                self.state_mut().char_spacing = ac;
                let leading = self.state().leading;
                self.translate_text_line(0.0, -leading);
                if let Some(bytes) = args.get(2).and_then(Object::as_string_bytes) {
                    let bytes = bytes.to_vec();
                    self.show_text(&bytes)?;
                }
            }

            // -- XObjects --------------------------------------------------
            PaintXObject => self.paint_xobject(args, resources, depth)?,

            // Parsed but deliberately inert.
            ShadingFill | SetCharWidth | SetCharWidthAndBounds | MarkPoint | MarkPointProps
            | BeginMarkedContent | BeginMarkedContentProps | EndMarkedContent | BeginCompat
            | EndCompat | BeginInlineImage => {}
        }
        Ok(())
    }

    /// Flushes the current path: paint (if any), apply a pending clip,
    /// reset.
    fn paint(&mut self, mode: Option<PaintMode>) -> PdfResult<()> {
        if let Some(mode) = mode {
            if !self.path.is_empty() {
                let fill = self.fill_rgba();
                let stroke = self.stroke_rgba();
                let props = self.state().stroke_props.clone();
                self.device.draw_path(&self.path, mode, fill, stroke, &props)?;
            }
        }
        if let Some(rule) = self.pending_clip.take() {
            if !self.path.is_empty() {
                self.device.clip_path(&self.path, rule)?;
            }
        }
        self.path.clear();
        Ok(())
    }

    fn apply_ext_gstate(
        &mut self,
        args: &[Object],
        resources: &Option<Dict>,
    ) -> PdfResult<()> {
        let name = match args.first().and_then(Object::as_name) {
            Some(n) => n.to_string(),
            None => return Ok(()),
        };
        let gs = match self.resource_entry(resources, "ExtGState", &name)? {
            Some(Object::Dictionary(d)) => d,
            _ => {
                log::warn!("/ExtGState /{name} not found");
                return Ok(());
            }
        };

        if let Some(v) = gs.get("LW").and_then(Object::as_number) {
            self.state_mut().stroke_props.line_width = v;
        }
        if let Some(v) = gs.get("LC").and_then(Object::as_int) {
            self.state_mut().stroke_props.line_cap = match v {
                1 => LineCap::Round,
                2 => LineCap::ProjectingSquare,
                _ => LineCap::Butt,
            };
        }
        if let Some(v) = gs.get("LJ").and_then(Object::as_int) {
            self.state_mut().stroke_props.line_join = match v {
                1 => LineJoin::Round,
                2 => LineJoin::Bevel,
                _ => LineJoin::Miter,
            };
        }
        if let Some(v) = gs.get("ML").and_then(Object::as_number) {
            self.state_mut().stroke_props.miter_limit = v;
        }
        if let Some(Object::Array(dash)) = gs.get("D").map(|d| self.xref.resolve(d)).transpose()? {
            if let (Some(Object::Array(pattern)), Some(phase)) =
                (dash.first(), dash.get(1).and_then(Object::as_number))
            {
                let props = &mut self.state_mut().stroke_props;
                props.dash_array = pattern.iter().filter_map(Object::as_number).collect();
                props.dash_phase = phase;
            }
        }
        if let Some(v) = gs.get("CA").and_then(Object::as_number) {
            self.state_mut().stroke_alpha = v.clamp(0.0, 1.0);
        }
        if let Some(v) = gs.get("ca").and_then(Object::as_number) {
            self.state_mut().fill_alpha = v.clamp(0.0, 1.0);
        }
        Ok(())
    }

    // -- text ---------------------------------------------------------------

    fn set_font(&mut self, args: &[Object], resources: &Option<Dict>) -> PdfResult<()> {
        let name = match args.first().and_then(Object::as_name) {
            Some(n) => n.to_string(),
            None => return Ok(()),
        };
        let size = num(args, 1).unwrap_or(0.0);

        let font = match self.resource_entry(resources, "Font", &name)? {
            Some(font_obj) => Font::load(self.xref, &font_obj)?,
            None => {
                log::warn!("font resource /{name} not found, using fallback metrics");
                Font::fallback()
            }
        };

        let state = self.state_mut();
        state.font_name = Some(name);
        state.font_size = size;
        self.current_font = Some(font);
        Ok(())
    }

    /// Translates the text line matrix and resets the text matrix to it.
    fn translate_text_line(&mut self, tx: f64, ty: f64) {
        let state = self.state_mut();
        let t = [1.0, 0.0, 0.0, 1.0, tx, ty];
        state.text_line_matrix = matrix_multiply(&t, &state.text_line_matrix);
        state.text_matrix = state.text_line_matrix;
    }

    /// Translates only the text matrix (within-line advances).
    fn translate_text(&mut self, tx: f64) {
        let state = self.state_mut();
        let t = [1.0, 0.0, 0.0, 1.0, tx, 0.0];
        state.text_matrix = matrix_multiply(&t, &state.text_matrix);
    }

    /// Shows a string: advances per glyph, greeked quads for present
    /// glyphs. Missing glyphs contribute their (possibly zero) missing
    /// width and paint nothing.
    fn show_text(&mut self, bytes: &[u8]) -> PdfResult<()> {
        let font = match &self.current_font {
            Some(f) => f.clone(),
            None => {
                log::warn!("text shown before Tf, using fallback metrics");
                Font::fallback()
            }
        };

        for code in font.codes(bytes) {
            let state = self.state();
            let font_size = state.font_size;
            let h_scale = state.horizontal_scale / 100.0;
            let w0 = font.advance(code) / 1000.0;

            // Anything with a real advance paints a greeked cell; blanks
            // and zero-width (missing) glyphs only move the cursor.
            let paints = state.render_mode.paints() && w0 > 0.0 && !font.is_blank(code);

            if paints {
                // Glyph cell in text space: baseline at y = 0, cap height
                // up, advance wide, slightly inset.
                let x0 = w0 * GREEK_CELL_INSET;
                let x1 = w0 * (1.0 - GREEK_CELL_INSET);
                let y1 = GREEK_CELL_HEIGHT;
                // Parameter matrix: font size, horizontal scale, rise.
                let params = [
                    font_size * h_scale,
                    0.0,
                    0.0,
                    font_size,
                    0.0,
                    state.text_rise,
                ];
                let trm = matrix_multiply(&params, &state.text_matrix);
                let quad = [
                    matrix_apply(&trm, x0, 0.0),
                    matrix_apply(&trm, x1, 0.0),
                    matrix_apply(&trm, x1, y1),
                    matrix_apply(&trm, x0, y1),
                ];
                let color = self.fill_rgba();
                self.device.draw_glyph_quad(quad, color)?;
            }

            let state = self.state();
            let word_space = if font.is_word_space(code) {
                state.word_spacing
            } else {
                0.0
            };
            let tx = (w0 * font_size + state.char_spacing + word_space) * h_scale;
            self.translate_text(tx);
        }
        Ok(())
    }

    // -- XObjects -----------------------------------------------------------

    fn paint_xobject(
        &mut self,
        args: &[Object],
        resources: &Option<Dict>,
        depth: usize,
    ) -> PdfResult<()> {
        let name = match args.first().and_then(Object::as_name) {
            Some(n) => n.to_string(),
            None => return Ok(()),
        };
        let xobject = match self.resource_entry(resources, "XObject", &name)? {
            Some(Object::Stream(s)) => s,
            _ => {
                log::warn!("/XObject /{name} not found");
                return Ok(());
            }
        };

        let subtype = xobject.dict.get("Subtype").and_then(Object::as_name);
        match subtype {
            Some("Form") => self.run_form_xobject(&xobject, resources, depth),
            Some("Image") => self.draw_image_xobject(&xobject),
            other => {
                log::warn!("unsupported XObject subtype {other:?}, skipping");
                Ok(())
            }
        }
    }

    fn run_form_xobject(
        &mut self,
        stream: &crate::core::parser::StreamObject,
        parent_resources: &Option<Dict>,
        depth: usize,
    ) -> PdfResult<()> {
        if depth >= MAX_FORM_DEPTH {
            log::warn!("form XObject nesting exceeds depth limit, skipping");
            return Ok(());
        }
        let dict = &stream.dict;

        let data = self.xref.decoded_stream_data(stream)?;
        let ops = scan_operations(&data)?;

        // Forms without their own /Resources draw against the caller's.
        let form_resources = match dict.get("Resources") {
            Some(r) => match self.xref.resolve(r)? {
                Object::Dictionary(d) => Some(d),
                _ => None,
            },
            None => None,
        }
        .or_else(|| parent_resources.clone());

        // Implicit q around the form.
        let copy = self.state().clone();
        self.states.push(copy);
        self.device.save_state();

        if let Some(m_obj) = dict.get("Matrix") {
            if let Some(arr) = self.xref.resolve(m_obj)?.as_array() {
                if let Ok(m) = matrix_args(arr) {
                    self.state_mut().concat(&m);
                    self.device.concat_matrix(&m);
                }
            }
        }

        // Clip to /BBox when present.
        if let Some(bbox) = dict.get("BBox") {
            if let Some(arr) = self.xref.resolve(bbox)?.as_array() {
                if arr.len() >= 4 {
                    let v: Vec<f64> = arr.iter().take(4).filter_map(Object::as_number).collect();
                    if v.len() == 4 {
                        let mut clip = Path::new();
                        clip.rect(
                            v[0].min(v[2]),
                            v[1].min(v[3]),
                            (v[2] - v[0]).abs(),
                            (v[3] - v[1]).abs(),
                        );
                        self.device.clip_path(&clip, FillRule::NonZero)?;
                    }
                }
            }
        }

        let result = self.run(&ops, &form_resources, depth + 1);

        if self.states.len() > 1 {
            self.states.pop();
        }
        self.device.restore_state();
        result
    }

    fn draw_image_xobject(
        &mut self,
        stream: &crate::core::parser::StreamObject,
    ) -> PdfResult<()> {
        let image = match self.decode_image(stream) {
            Ok(Some(img)) => img,
            Ok(None) => return Ok(()),
            Err(e) => {
                log::warn!("skipping undecodable image: {e}");
                return Ok(());
            }
        };

        // Image space: unit square in user space, rows top-down.
        let placement: Matrix = [
            1.0 / image.width as f64,
            0.0,
            0.0,
            -1.0 / image.height as f64,
            0.0,
            1.0,
        ];
        self.device.draw_image(&image, &placement)
    }

    /// Decodes an image XObject when it is in a format we carry: 8 bits
    /// per component, DeviceGray or DeviceRGB, raw or Flate-compressed.
    fn decode_image(
        &mut self,
        stream: &crate::core::parser::StreamObject,
    ) -> PdfResult<Option<ImageData>> {
        let dict = &stream.dict;
        let width = dict.get("Width").and_then(Object::as_int).unwrap_or(0);
        let height = dict.get("Height").and_then(Object::as_int).unwrap_or(0);
        if width <= 0 || height <= 0 || width > 1 << 16 || height > 1 << 16 {
            log::warn!("image with unusable dimensions {width}x{height}");
            return Ok(None);
        }
        let (width, height) = (width as usize, height as usize);

        if dict.get("ImageMask").and_then(Object::as_bool) == Some(true) {
            log::warn!("image masks not supported, skipping");
            return Ok(None);
        }
        let bpc = dict
            .get("BitsPerComponent")
            .and_then(Object::as_int)
            .unwrap_or(8);
        if bpc != 8 {
            log::warn!("{bpc}-bit image samples not supported, skipping");
            return Ok(None);
        }

        let colorspace = match dict.get("ColorSpace") {
            Some(cs) => self.xref.resolve(cs)?,
            None => Object::Name("DeviceGray".into()),
        };
        let components = match colorspace.as_name() {
            Some("DeviceGray" | "CalGray" | "G") => 1,
            Some("DeviceRGB" | "CalRGB" | "RGB") => 3,
            other => {
                log::warn!("unsupported image color space {other:?}, skipping");
                return Ok(None);
            }
        };

        let samples = self.xref.decoded_stream_data(stream)?;
        let expected = width * height * components;
        if samples.len() < expected {
            log::warn!(
                "image data short: {} of {expected} bytes, skipping",
                samples.len()
            );
            return Ok(None);
        }

        let mut rgba = Vec::with_capacity(width * height * 4);
        match components {
            1 => {
                for &g in &samples[..expected] {
                    rgba.extend_from_slice(&[g, g, g, 255]);
                }
            }
            _ => {
                for px in samples[..expected].chunks(3) {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
            }
        }

        Ok(Some(ImageData {
            width: width as u32,
            height: height as u32,
            rgba,
        }))
    }

    // -- resources ----------------------------------------------------------

    /// Looks up /<category> /<name> in a resources dictionary, resolving
    /// references along the way.
    fn resource_entry(
        &mut self,
        resources: &Option<Dict>,
        category: &str,
        name: &str,
    ) -> PdfResult<Option<Object>> {
        let resources = match resources {
            Some(r) => r,
            None => return Ok(None),
        };
        let category_obj = match resources.get(category) {
            Some(c) => c.clone(),
            None => return Ok(None),
        };
        let category_dict = match self.xref.resolve(&category_obj)? {
            Object::Dictionary(d) => d,
            _ => return Ok(None),
        };
        match category_dict.get(name) {
            Some(entry) => Ok(Some(self.xref.resolve(&entry.clone())?)),
            None => Ok(None),
        }
    }
}

// -- operand helpers ---------------------------------------------------------

fn num(args: &[Object], index: usize) -> PdfResult<f64> {
    args.get(index)
        .and_then(Object::as_number)
        .ok_or_else(|| PdfError::syntax(format!("operand {index} is not a number")))
}

fn nums<const N: usize>(args: &[Object]) -> PdfResult<[f64; N]> {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = num(args, i)?;
    }
    Ok(out)
}

fn matrix_args(args: &[Object]) -> PdfResult<Matrix> {
    let v = nums::<6>(args)?;
    Ok(v)
}

/// SC/SCN operand count picks the color model; pattern names are ignored.
fn color_from_components(args: &[Object]) -> Option<Color> {
    let numbers: Vec<f64> = args.iter().filter_map(Object::as_number).collect();
    match numbers.len() {
        1 => Some(Color::Gray(numbers[0])),
        3 => Some(Color::Rgb(numbers[0], numbers[1], numbers[2])),
        4 => Some(Color::Cmyk(numbers[0], numbers[1], numbers[2], numbers[3])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::page::tests::build_pdf;
    use crate::core::page::PageTree;
    use crate::render::device::RecordingDevice;

    fn run_content(content_body: &str, extra: &[(u32, &str)]) -> Vec<String> {
        let mut objects: Vec<(u32, String)> = vec![
            (1, "<< /Type /Catalog /Pages 2 0 R >>".into()),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".into()),
            (
                3,
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] \
                 /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> \
                 /XObject << /Fm1 6 0 R >> >> >>"
                    .into(),
            ),
            (
                4,
                format!(
                    "<< /Length {} >>\nstream\n{}\nendstream",
                    content_body.len(),
                    content_body
                ),
            ),
            (
                5,
                "<< /Type /Font /Subtype /Type1 /BaseFont /F /FirstChar 65 \
                 /LastChar 90 /Widths [500 500 500 500 500 500 500 500 500 500 \
                 500 500 500 500 500 500 500 500 500 500 500 500 500 500 500 500] >>"
                    .into(),
            ),
        ];
        objects.extend(extra.iter().map(|(n, s)| (*n, s.to_string())));
        let refs: Vec<(u32, &str)> = objects.iter().map(|(n, s)| (*n, s.as_str())).collect();
        let pdf = build_pdf(&refs);

        let mut xref = crate::core::xref::XRef::parse(pdf).unwrap();
        let tree = PageTree::load(&mut xref).unwrap();
        let page = tree.page(&mut xref, 0).unwrap();
        let mut device = RecordingDevice::new();
        render_page_content(&mut xref, &page, &mut device).unwrap();
        device.ops().to_vec()
    }

    #[test]
    fn paints_a_filled_rectangle() {
        let ops = run_content("10 10 100 50 re f", &[]);
        assert_eq!(ops.len(), 1);
        assert!(ops[0].contains("Fill"), "got {:?}", ops);
    }

    #[test]
    fn q_and_cm_reach_the_device() {
        let ops = run_content("q 2 0 0 2 0 0 cm 0 0 10 10 re S Q", &[]);
        assert_eq!(ops[0], "save");
        assert!(ops[1].starts_with("concat"));
        assert!(ops[2].contains("Stroke"));
        assert_eq!(ops[3], "restore");
    }

    #[test]
    fn unknown_operator_does_not_stop_rendering() {
        let ops = run_content("0 0 5 5 re f 1 2 frobnicate 0 0 7 7 re f", &[]);
        assert_eq!(
            ops.iter().filter(|o| o.contains("Fill")).count(),
            2,
            "both fills must survive the unknown operator: {ops:?}"
        );
    }

    #[test]
    fn text_emits_glyph_quads() {
        let ops = run_content("BT /F1 12 Tf 20 100 Td (ABC) Tj ET", &[]);
        let glyphs: Vec<&String> = ops.iter().filter(|o| o.starts_with("glyph")).collect();
        assert_eq!(glyphs.len(), 3);
        // First glyph cell starts near x = 20 (plus inset).
        assert!(glyphs[0].starts_with("glyph(20."), "got {}", glyphs[0]);
    }

    #[test]
    fn invisible_text_advances_without_painting() {
        let ops = run_content("BT /F1 12 Tf 3 Tr (AB) Tj ET", &[]);
        assert!(ops.iter().all(|o| !o.starts_with("glyph")), "{ops:?}");
    }

    #[test]
    fn missing_font_resource_still_renders_text_region() {
        // /F9 is not in resources: fallback metrics paint greeked cells.
        let ops = run_content("BT /F9 10 Tf (Hi) Tj ET 0 0 5 5 re f", &[]);
        assert!(ops.iter().any(|o| o.contains("Fill")));
    }

    #[test]
    fn clip_is_applied_at_paint_time() {
        let ops = run_content("0 0 50 50 re W n 0 0 100 100 re f", &[]);
        assert!(ops[0].starts_with("clip"), "{ops:?}");
        assert!(ops[1].contains("Fill"));
    }

    #[test]
    fn form_xobject_executes_with_state_isolation() {
        let ops = run_content(
            "q /Fm1 Do Q 0 0 9 9 re f",
            &[(
                6,
                "<< /Type /XObject /Subtype /Form /BBox [0 0 50 50] \
                 /Matrix [2 0 0 2 0 0] /Length 16 >>\nstream\n0 0 10 10 re f\n \nendstream",
            )],
        );
        // save (q), save (form), clip (bbox), fill (form), restore, restore, fill.
        assert!(ops.iter().filter(|o| o.contains("Fill")).count() >= 2, "{ops:?}");
        assert_eq!(ops.iter().filter(|o| *o == "save").count(), 2);
        assert_eq!(ops.iter().filter(|o| *o == "restore").count(), 2);
    }

    #[test]
    fn unbalanced_restore_is_tolerated() {
        let ops = run_content("Q Q 0 0 5 5 re f", &[]);
        assert!(ops.iter().any(|o| o.contains("Fill")));
    }
}
