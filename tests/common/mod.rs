//! Shared helpers: synthetic in-memory PDFs for the integration suites.
#![allow(dead_code)]

/// Assembles a PDF from numbered object bodies, generating the xref table
/// and trailer. Object numbers must start at 1 and may have gaps.
pub fn build_pdf(objects: &[(u32, Vec<u8>)]) -> Vec<u8> {
    build_pdf_with_trailer(objects, "")
}

/// Same, with extra key/value text spliced into the trailer dictionary.
pub fn build_pdf_with_trailer(objects: &[(u32, Vec<u8>)], trailer_extra: &str) -> Vec<u8> {
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.5\n");
    let max_num = objects.iter().map(|(n, _)| *n).max().unwrap_or(0) as usize;
    let mut offsets = vec![None; max_num + 1];
    for (num, body) in objects {
        offsets[*num as usize] = Some(pdf.len());
        pdf.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }
    let xref_at = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", max_num + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets.iter().skip(1) {
        match offset {
            Some(o) => pdf.extend_from_slice(format!("{o:010} 00000 n \n").as_bytes()),
            None => pdf.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R {trailer_extra} >>\n",
            max_num + 1
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());
    pdf
}

/// A stream object body with an explicit /Length and optional extra dict
/// entries.
pub fn stream_object(dict_extra: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!("<< /Length {} {dict_extra} >>\nstream\n", data.len()).as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

/// One-page document with the given content stream and no resources.
pub fn one_page_with_content(media_box: &str, content: &[u8]) -> Vec<u8> {
    build_pdf(&[
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec()),
        (
            3,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox {media_box} /Contents 4 0 R >>"
            )
            .into_bytes(),
        ),
        (4, stream_object("", content)),
    ])
}
