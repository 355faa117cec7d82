//! Rasterization behavior through the public API.

mod common;

use common::{build_pdf, one_page_with_content, stream_object};
use pdf_raster::Document;

#[test]
fn blank_page_renders_opaque_white() {
    let pdf = one_page_with_content("[0 0 50 40]", b"");
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();
    assert_eq!((surface.width(), surface.height()), (50, 40));
    assert!(surface
        .data()
        .iter()
        .all(|&b| b == 255), "blank page must be opaque white");
}

#[test]
fn filled_rectangle_has_requested_color() {
    let pdf = one_page_with_content(
        "[0 0 100 100]",
        b"1 0 0 rg 10 10 80 80 re f",
    );
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();

    // Center is pure red, corners stay white.
    assert_eq!(surface.pixel(50, 50).unwrap(), (255, 0, 0, 255));
    assert_eq!(surface.pixel(2, 2).unwrap(), (255, 255, 255, 255));
    assert_eq!(surface.pixel(97, 97).unwrap(), (255, 255, 255, 255));
}

#[test]
fn gray_and_cmyk_color_operators() {
    let pdf = one_page_with_content(
        "[0 0 60 60]",
        b"0.5 g 0 0 30 60 re f 0 0 0 1 k 30 0 30 60 re f",
    );
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();

    let (r, g, b, _) = surface.pixel(15, 30).unwrap();
    assert_eq!(r, g);
    assert_eq!(g, b);
    assert!((120..=135).contains(&r), "mid gray expected, got {r}");

    assert_eq!(surface.pixel(45, 30).unwrap(), (0, 0, 0, 255));
}

#[test]
fn scale_doubles_output_dimensions() {
    let pdf = one_page_with_content("[0 0 100 50]", b"0 0 0 rg 0 0 100 50 re f");
    let mut doc = Document::open(pdf, None).unwrap();

    let s1 = doc.render_page(0, 1.0).unwrap();
    assert_eq!((s1.width(), s1.height()), (100, 50));

    let s2 = doc.render_page(0, 2.0).unwrap();
    assert_eq!((s2.width(), s2.height()), (200, 100));
    // Fully covered page is black at both scales.
    assert_eq!(s2.pixel(100, 50).unwrap(), (0, 0, 0, 255));
}

#[test]
fn fractional_dimensions_round_up() {
    let pdf = one_page_with_content("[0 0 99.2 50.5]", b"");
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();
    assert_eq!((surface.width(), surface.height()), (100, 51));
}

#[test]
fn rotation_rotates_content() {
    // Bottom-left quadrant filled black on a 100x200 page.
    let content = b"0 0 0 rg 0 0 50 100 re f";
    let base = build_pdf(&[
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec()),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 200] /Contents 4 0 R /Rotate 90 >>"
                .to_vec(),
        ),
        (4, stream_object("", content)),
    ]);
    let mut doc = Document::open(base, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();
    assert_eq!((surface.width(), surface.height()), (200, 100));

    // Under the 90-degree transform x' = y, y' = x, the filled user
    // region [0,50]x[0,100] lands at device [0,100]x[0,50].
    assert_eq!(surface.pixel(50, 25).unwrap(), (0, 0, 0, 255));
    assert_eq!(surface.pixel(150, 75).unwrap(), (255, 255, 255, 255));
}

#[test]
fn unknown_operator_still_renders_rest_of_page() {
    let pdf = one_page_with_content(
        "[0 0 100 100]",
        b"0 0 0 rg 0 0 40 40 re f 7 42 notAnOperator 60 60 40 40 re f",
    );
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();

    // Both rectangles painted despite the bogus operator between them.
    assert_eq!(surface.pixel(20, 80).unwrap(), (0, 0, 0, 255));
    assert_eq!(surface.pixel(80, 20).unwrap(), (0, 0, 0, 255));
}

#[test]
fn clipping_limits_painting() {
    let pdf = one_page_with_content(
        "[0 0 100 100]",
        b"0 0 50 100 re W n 0 0 0 rg 0 0 100 100 re f",
    );
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();

    // Left half clipped in, right half clipped out.
    assert_eq!(surface.pixel(25, 50).unwrap(), (0, 0, 0, 255));
    assert_eq!(surface.pixel(75, 50).unwrap(), (255, 255, 255, 255));
}

#[test]
fn graphics_state_stack_isolates_colors() {
    let pdf = one_page_with_content(
        "[0 0 100 100]",
        b"1 0 0 rg q 0 0 1 rg 0 0 50 50 re f Q 50 50 50 50 re f",
    );
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();

    // Inner fill is blue (bottom-left quadrant -> top-left in device).
    assert_eq!(surface.pixel(25, 75).unwrap(), (0, 0, 255, 255));
    // After Q the red fill color is restored.
    assert_eq!(surface.pixel(75, 25).unwrap(), (255, 0, 0, 255));
}

#[test]
fn text_paints_greeked_glyphs_and_missing_glyphs_advance_empty() {
    let pdf = build_pdf(&[
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec()),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] /Contents 4 0 R \
              /Resources << /Font << /F1 5 0 R >> >> >>"
                .to_vec(),
        ),
        (
            4,
            stream_object("", b"BT /F1 24 Tf 10 40 Td (AA) Tj ET"),
        ),
        // Only 'A' (65) has a width; every other code is missing with
        // /MissingWidth 0.
        (
            5,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /X /FirstChar 65 /LastChar 65 \
              /Widths [600] >>"
                .to_vec(),
        ),
    ]);
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();

    // Some non-white pixels exist where the glyph cells were greeked
    // (baseline y=40, cell up to ~57; device y around 45..60).
    let mut dark = 0;
    for x in 10..40 {
        for y in 45..60 {
            let (r, _, _, _) = surface.pixel(x, y).unwrap();
            if r < 128 {
                dark += 1;
            }
        }
    }
    assert!(dark > 20, "expected greeked glyph coverage, got {dark}");
}

#[test]
fn image_xobject_draws_pixels() {
    // 2x2 RGB image scaled across the whole 40x40 page.
    let samples: Vec<u8> = vec![
        255, 0, 0, /**/ 0, 255, 0, // top row
        0, 0, 255, /**/ 255, 255, 255, // bottom row
    ];
    let pdf = build_pdf(&[
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec()),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 40 40] /Contents 4 0 R \
              /Resources << /XObject << /Im0 5 0 R >> >> >>"
                .to_vec(),
        ),
        (4, stream_object("", b"q 40 0 0 40 0 0 cm /Im0 Do Q")),
        (
            5,
            stream_object(
                "/Type /XObject /Subtype /Image /Width 2 /Height 2 \
                 /ColorSpace /DeviceRGB /BitsPerComponent 8",
                &samples,
            ),
        ),
    ]);
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();

    // Image rows are top-down in image space: red ends up top-left.
    assert_eq!(surface.pixel(10, 10).unwrap(), (255, 0, 0, 255));
    assert_eq!(surface.pixel(30, 10).unwrap(), (0, 255, 0, 255));
    assert_eq!(surface.pixel(10, 30).unwrap(), (0, 0, 255, 255));
    assert_eq!(surface.pixel(30, 30).unwrap(), (255, 255, 255, 255));
}

#[test]
fn flate_compressed_content_stream_renders() {
    use std::io::Write;
    let mut enc =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(b"0 0 0 rg 0 0 100 100 re f").unwrap();
    let compressed = enc.finish().unwrap();

    let pdf = build_pdf(&[
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec()),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] /Contents 4 0 R >>".to_vec(),
        ),
        (4, stream_object("/Filter /FlateDecode", &compressed)),
    ]);
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();
    assert_eq!(surface.pixel(50, 50).unwrap(), (0, 0, 0, 255));
}
