//! Document lifecycle and structure-level behavior through the public API.

mod common;

use common::{build_pdf, one_page_with_content};
use pdf_raster::{Document, PdfError};

fn three_page_doc() -> Vec<u8> {
    build_pdf(&[
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3 /MediaBox [0 0 612 792] >>"
                .to_vec(),
        ),
        (3, b"<< /Type /Page /Parent 2 0 R >>".to_vec()),
        (
            4,
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 300 150] >>".to_vec(),
        ),
        (
            5,
            b"<< /Type /Page /Parent 2 0 R /Rotate 270 >>".to_vec(),
        ),
    ])
}

#[test]
fn page_count_matches_leaves() {
    let mut doc = Document::open(three_page_doc(), None).unwrap();
    assert_eq!(doc.page_count().unwrap(), 3);
}

#[test]
fn page_size_inherits_media_box_from_ancestor() {
    let mut doc = Document::open(three_page_doc(), None).unwrap();
    // Page 0 inherits the /Pages node's MediaBox.
    assert_eq!(doc.page_size(0).unwrap(), (612.0, 792.0));
    // Page 1 declares its own.
    assert_eq!(doc.page_size(1).unwrap(), (300.0, 150.0));
}

#[test]
fn rotated_page_reports_swapped_size() {
    let mut doc = Document::open(three_page_doc(), None).unwrap();
    assert_eq!(doc.page_size(2).unwrap(), (792.0, 612.0));
}

#[test]
fn page_index_one_past_end_is_out_of_range() {
    let mut doc = Document::open(three_page_doc(), None).unwrap();
    assert!(matches!(
        doc.page_size(3),
        Err(PdfError::IndexOutOfRange { index: 3, count: 3 })
    ));
    assert!(matches!(
        doc.render_page(3, 1.0),
        Err(PdfError::IndexOutOfRange { .. })
    ));
    assert!(matches!(
        doc.links(3),
        Err(PdfError::IndexOutOfRange { .. })
    ));
}

#[test]
fn close_then_use_fails_with_closed_handle() {
    let mut doc = Document::open(three_page_doc(), None).unwrap();
    assert!(doc.is_valid());
    doc.close();
    assert!(!doc.is_valid());
    assert!(matches!(doc.page_count(), Err(PdfError::ClosedHandle)));
    assert!(matches!(doc.unlock("x"), Err(PdfError::ClosedHandle)));
    // Closing again is fine.
    doc.close();
    assert!(!doc.is_valid());
}

#[test]
fn kids_cycle_fails_with_document_corrupt() {
    let pdf = build_pdf(&[
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec()),
        (
            3,
            b"<< /Type /Pages /Parent 2 0 R /Kids [2 0 R] /Count 1 >>".to_vec(),
        ),
    ]);
    let mut doc = Document::open(pdf, None).unwrap();
    assert!(matches!(
        doc.page_count(),
        Err(PdfError::DocumentCorrupt(_))
    ));
}

#[test]
fn unparseable_bytes_fail_with_document_corrupt() {
    assert!(matches!(
        Document::open(b"BM not even close".to_vec(), None),
        Err(PdfError::DocumentCorrupt(_))
    ));
}

#[test]
fn damaged_startxref_recovers_by_scanning() {
    let mut pdf = three_page_doc();
    let pos = pdf.windows(9).rposition(|w| w == b"startxref").unwrap();
    // Truncate everything after the keyword: no usable offset at all.
    pdf.truncate(pos);

    let mut doc = Document::open(pdf, None).unwrap();
    assert_eq!(doc.page_count().unwrap(), 3);
    assert_eq!(doc.page_size(1).unwrap(), (300.0, 150.0));
}

#[test]
fn render_dimensions_scale_and_rotate() {
    let mut doc = Document::open(three_page_doc(), None).unwrap();
    assert_eq!(doc.render_dimensions(0, 1.0).unwrap(), (612, 792));
    assert_eq!(doc.render_dimensions(0, 0.5).unwrap(), (306, 396));
    // Rotated page: swapped axes.
    assert_eq!(doc.render_dimensions(2, 1.0).unwrap(), (792, 612));
}

#[test]
fn render_into_wrong_size_surface_fails_and_leaves_surface_untouched() {
    let mut doc = Document::open(three_page_doc(), None).unwrap();
    let mut surface = pdf_raster::PixelSurface::new(10, 10);
    let before = surface.data().to_vec();

    let err = doc.render_page_into(0, &mut surface, 1.0).unwrap_err();
    match err {
        PdfError::SurfaceSizeMismatch { expected, actual } => {
            assert_eq!(expected, (612, 792));
            assert_eq!(actual, (10, 10));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(surface.data(), &before[..], "failed render must not draw");
}

#[test]
fn rendering_same_page_twice_is_byte_identical() {
    let content = b"0.9 0.1 0.1 rg 20 20 200 100 re f 0 0 1 RG 4 w 50 50 m 250 150 l S";
    let pdf = one_page_with_content("[0 0 300 200]", content);

    let mut doc = Document::open(pdf.clone(), None).unwrap();
    let first = doc.render_page(0, 1.5).unwrap();
    let second = doc.render_page(0, 1.5).unwrap();
    assert_eq!(first.data(), second.data());

    // And across a fresh handle over the same bytes.
    let mut doc2 = Document::open(pdf, None).unwrap();
    let third = doc2.render_page(0, 1.5).unwrap();
    assert_eq!(first.data(), third.data());
}

#[test]
fn contents_array_is_concatenated() {
    // Two content streams: the second continues the path state of a fresh
    // interpreter run but must still paint.
    let pdf = build_pdf(&[
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec()),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] /Contents [4 0 R 5 0 R] >>"
                .to_vec(),
        ),
        (4, common::stream_object("", b"0 0 0 rg 10 10 30 30 re")),
        (5, common::stream_object("", b"f")),
    ]);
    let mut doc = Document::open(pdf, None).unwrap();
    let surface = doc.render_page(0, 1.0).unwrap();
    // Center of the rectangle is black only if both streams executed as
    // one program.
    let (r, g, b, _) = surface.pixel(25, 75).unwrap();
    assert_eq!((r, g, b), (0, 0, 0));
}
