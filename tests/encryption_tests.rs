//! Password handling through the public API, against a genuinely
//! encrypted document (standard security handler, R3 / RC4-128).

mod common;

use common::{build_pdf_with_trailer, one_page_with_content};
use pdf_raster::core::crypto::{legacy_file_key, legacy_user_check, md5, pad_password, rc4};
use pdf_raster::{Document, PdfError};

const FILE_ID: &[u8; 16] = b"0123456789ABCDEF";
const PERMISSIONS: u32 = 0xFFFF_FFFC;
const CONTENT: &[u8] = b"0 0 0 rg 10 10 80 80 re f";

fn hex_string(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + 2);
    out.push('<');
    for b in data {
        out.push_str(&format!("{b:02X}"));
    }
    out.push('>');
    out
}

/// /O entry per Algorithm 3: the padded user password RC4-encrypted under
/// a key derived from the owner password.
fn make_o_entry(user_pw: &[u8], owner_pw: &[u8]) -> Vec<u8> {
    let mut hash = md5(&pad_password(owner_pw)).to_vec();
    for _ in 0..50 {
        hash = md5(&hash).to_vec();
    }
    hash.truncate(16);

    let mut o = pad_password(user_pw).to_vec();
    for i in 0..20u8 {
        let derived: Vec<u8> = hash.iter().map(|b| b ^ i).collect();
        o = rc4(&derived, &o);
    }
    o
}

/// Per-object key for legacy encryption (object 4, generation 0 here).
fn object_key(file_key: &[u8], num: u32, gen: u32) -> Vec<u8> {
    let mut input = file_key.to_vec();
    input.extend_from_slice(&num.to_le_bytes()[..3]);
    input.extend_from_slice(&gen.to_le_bytes()[..2]);
    md5(&input)[..16].to_vec()
}

/// Builds a one-page encrypted document whose content stream is really
/// RC4-encrypted.
fn encrypted_doc(user_pw: &[u8], owner_pw: &[u8]) -> Vec<u8> {
    let o = make_o_entry(user_pw, owner_pw);
    let file_key = legacy_file_key(user_pw, &o, PERMISSIONS, FILE_ID, 3, 16, true);
    let mut u = legacy_user_check(&file_key, FILE_ID, 3);
    u.resize(32, 0);

    let encrypted_content = rc4(&object_key(&file_key, 4, 0), CONTENT);

    let mut content_obj = Vec::new();
    content_obj.extend_from_slice(
        format!("<< /Length {} >>\nstream\n", encrypted_content.len()).as_bytes(),
    );
    content_obj.extend_from_slice(&encrypted_content);
    content_obj.extend_from_slice(b"\nendstream");

    let trailer_extra = format!(
        "/Encrypt << /Filter /Standard /V 2 /R 3 /Length 128 /P -4 /O {} /U {} >> \
         /ID [{} {}]",
        hex_string(&o),
        hex_string(&u),
        hex_string(FILE_ID),
        hex_string(FILE_ID),
    );

    build_pdf_with_trailer(
        &[
            (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
            (2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec()),
            (
                3,
                b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] /Contents 4 0 R >>"
                    .to_vec(),
            ),
            (4, content_obj),
        ],
        &trailer_extra,
    )
}

#[test]
fn open_without_password_is_password_required() {
    assert!(matches!(
        Document::open(encrypted_doc(b"secret", b"owner"), None),
        Err(PdfError::PasswordRequired)
    ));
}

#[test]
fn open_with_wrong_password_is_invalid_password() {
    assert!(matches!(
        Document::open(encrypted_doc(b"secret", b"owner"), Some("nope")),
        Err(PdfError::InvalidPassword)
    ));
}

#[test]
fn user_password_opens_and_decrypts() {
    let mut doc = Document::open(encrypted_doc(b"secret", b"owner"), Some("secret")).unwrap();
    assert_eq!(doc.page_count().unwrap(), 1);
    assert_eq!(doc.page_size(0).unwrap(), (100.0, 100.0));

    let surface = doc.render_page(0, 1.0).unwrap();
    // The decrypted content paints a black square.
    assert_eq!(surface.pixel(50, 50).unwrap(), (0, 0, 0, 255));
}

#[test]
fn owner_password_opens_too() {
    let mut doc = Document::open(encrypted_doc(b"secret", b"owner"), Some("owner")).unwrap();
    assert_eq!(doc.page_count().unwrap(), 1);
}

#[test]
fn decrypted_render_matches_unencrypted_equivalent() {
    let mut encrypted =
        Document::open(encrypted_doc(b"secret", b"owner"), Some("secret")).unwrap();
    let mut plain =
        Document::open(one_page_with_content("[0 0 100 100]", CONTENT), None).unwrap();

    let a = encrypted.render_page(0, 1.0).unwrap();
    let b = plain.render_page(0, 1.0).unwrap();
    assert_eq!(a.data(), b.data());
}

#[test]
fn locked_document_supports_password_retry_without_reparse() {
    let mut doc = Document::open_locked(encrypted_doc(b"secret", b"owner")).unwrap();
    assert!(doc.is_locked());

    // Structure calls are gated while locked.
    assert!(matches!(doc.page_count(), Err(PdfError::PasswordRequired)));
    assert!(matches!(
        doc.render_page(0, 1.0),
        Err(PdfError::PasswordRequired)
    ));

    // Wrong, wrong, right — same handle throughout.
    assert!(matches!(
        doc.unlock("guess one"),
        Err(PdfError::InvalidPassword)
    ));
    assert!(matches!(
        doc.unlock("guess two"),
        Err(PdfError::InvalidPassword)
    ));
    doc.unlock("secret").unwrap();
    assert!(!doc.is_locked());
    assert_eq!(doc.page_count().unwrap(), 1);

    // Unlocking again is a no-op.
    doc.unlock("anything").unwrap();
}

#[test]
fn blank_user_password_opens_transparently() {
    // Owner-only protection: empty user password, real owner password.
    let mut doc = Document::open(encrypted_doc(b"", b"owner"), None).unwrap();
    assert!(!doc.is_locked());
    assert_eq!(doc.page_count().unwrap(), 1);
    let surface = doc.render_page(0, 1.0).unwrap();
    assert_eq!(surface.pixel(50, 50).unwrap(), (0, 0, 0, 255));
}

#[test]
fn wrong_then_right_on_fresh_handles() {
    let bytes = encrypted_doc(b"secret", b"owner");
    assert!(matches!(
        Document::open(bytes.clone(), Some("bad")),
        Err(PdfError::InvalidPassword)
    ));
    let mut doc = Document::open(bytes, Some("secret")).unwrap();
    assert_eq!(doc.page_count().unwrap(), 1);
}
