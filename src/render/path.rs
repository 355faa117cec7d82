//! Path accumulation for the interpreter.
//!
//! Path construction operators build up a [`Path`] in user space; the
//! painting operator that follows hands it to the device and resets it.

/// One path segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathElement {
    /// Starts a new subpath.
    MoveTo(f64, f64),
    LineTo(f64, f64),
    /// Cubic Bézier: two control points then the endpoint.
    CurveTo(f64, f64, f64, f64, f64, f64),
    ClosePath,
}

/// An accumulated path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    elements: Vec<PathElement>,
    current_point: Option<(f64, f64)>,
    subpath_start: Option<(f64, f64)>,
}

impl Path {
    pub fn new() -> Self {
        Path::default()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.current_point = None;
        self.subpath_start = None;
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.elements.push(PathElement::MoveTo(x, y));
        self.current_point = Some((x, y));
        self.subpath_start = Some((x, y));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        if self.current_point.is_none() {
            // Line with no current point: implicit move, as viewers do.
            self.move_to(x, y);
            return;
        }
        self.elements.push(PathElement::LineTo(x, y));
        self.current_point = Some((x, y));
    }

    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        if self.current_point.is_none() {
            self.move_to(x1, y1);
        }
        self.elements.push(PathElement::CurveTo(x1, y1, x2, y2, x3, y3));
        self.current_point = Some((x3, y3));
    }

    /// `re`: a closed rectangle subpath.
    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.move_to(x, y);
        self.line_to(x + w, y);
        self.line_to(x + w, y + h);
        self.line_to(x, y + h);
        self.close();
    }

    pub fn close(&mut self) {
        if !self.elements.is_empty() {
            self.elements.push(PathElement::ClosePath);
            self.current_point = self.subpath_start;
        }
    }

    pub fn current_point(&self) -> Option<(f64, f64)> {
        self.current_point
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
