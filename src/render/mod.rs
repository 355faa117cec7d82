//! Rasterization layer: graphics state, path model, device abstraction,
//! the tiny-skia backend and the content stream interpreter.

pub mod context;
pub mod device;
pub mod graphics_state;
pub mod path;
pub mod skia_device;
pub mod surface;

pub use context::render_page_content;
pub use device::{Device, ImageData, PaintMode, RecordingDevice, Rgba};
pub use graphics_state::{
    Color, FillRule, GraphicsState, LineCap, LineJoin, Matrix, StrokeProps, TextRenderMode,
};
pub use path::{Path, PathElement};
pub use skia_device::SkiaDevice;
pub use surface::{output_dimensions, page_transform, PixelSurface};
