//! Font metrics for text interpretation.
//!
//! The interpreter needs advance widths to position text correctly; glyph
//! outlines are out of scope (text is greeked by the raster device). Widths
//! come from /Widths + /FirstChar on simple fonts, from /W and /DW on the
//! descendant of a Type0 font, and from /MissingWidth for codes outside
//! those ranges. A code with no width information anywhere advances by the
//! missing width, possibly zero — a missing glyph never fails the page.

use rustc_hash::FxHashMap;

use crate::core::error::PdfResult;
use crate::core::parser::{Dict, Object};
use crate::core::xref::XRef;

/// Fallback advance (glyph-space units) for non-embedded fonts that declare
/// no widths at all, e.g. bare references to the standard 14.
const STANDARD_FONT_FALLBACK_WIDTH: f64 = 500.0;

/// Width model for one font resource.
#[derive(Debug, Clone)]
pub struct Font {
    pub base_font: String,
    pub subtype: String,
    /// Character code → advance width in glyph space (1/1000 em).
    widths: FxHashMap<u32, f64>,
    /// Advance for codes with no entry.
    missing_width: f64,
    /// Type0 fonts consume two-byte codes.
    two_byte_codes: bool,
}

impl Font {
    /// Builds the width model from a /Font resource dictionary.
    pub fn load(xref: &mut XRef, font_obj: &Object) -> PdfResult<Font> {
        let dict = match xref.resolve(font_obj)? {
            Object::Dictionary(d) => d,
            _ => return Ok(Font::fallback()),
        };

        let subtype = dict
            .get("Subtype")
            .and_then(Object::as_name)
            .unwrap_or("")
            .to_string();
        let base_font = dict
            .get("BaseFont")
            .and_then(Object::as_name)
            .unwrap_or("Unknown")
            .to_string();

        if subtype == "Type0" {
            return Self::load_type0(xref, &dict, base_font);
        }

        let mut widths = FxHashMap::default();
        let first_char = dict.get("FirstChar").and_then(Object::as_int).unwrap_or(0);
        if let Some(arr) = match dict.get("Widths") {
            Some(w) => xref.resolve(w)?.as_array().map(<[Object]>::to_vec),
            None => None,
        } {
            for (i, w) in arr.iter().enumerate() {
                if let Some(w) = w.as_number() {
                    widths.insert(first_char as u32 + i as u32, w);
                }
            }
        }

        let missing_width = Self::descriptor_missing_width(xref, &dict)?;

        let missing_width = if widths.is_empty() && missing_width == 0.0 {
            // No metrics anywhere: a standard-14-style reference. Advance
            // half an em so text layout stays readable.
            STANDARD_FONT_FALLBACK_WIDTH
        } else {
            missing_width
        };

        Ok(Font {
            base_font,
            subtype,
            widths,
            missing_width,
            two_byte_codes: false,
        })
    }

    fn load_type0(xref: &mut XRef, dict: &Dict, base_font: String) -> PdfResult<Font> {
        let descendant = match dict.get("DescendantFonts") {
            Some(d) => match xref.resolve(d)? {
                Object::Array(a) => match a.first() {
                    Some(first) => xref.resolve(first)?,
                    None => Object::Null,
                },
                other => other,
            },
            None => Object::Null,
        };
        let desc_dict = match descendant {
            Object::Dictionary(d) => d,
            _ => Dict::default(),
        };

        let default_width = desc_dict
            .get("DW")
            .and_then(Object::as_number)
            .unwrap_or(1000.0);

        let mut widths = FxHashMap::default();
        if let Some(w_obj) = desc_dict.get("W") {
            if let Object::Array(entries) = xref.resolve(w_obj)? {
                Self::parse_cid_widths(&entries, &mut widths);
            }
        }

        Ok(Font {
            base_font,
            subtype: "Type0".into(),
            widths,
            missing_width: default_width,
            two_byte_codes: true,
        })
    }

    /// /W array format: `c [w1 w2 ...]` assigns consecutive widths starting
    /// at CID c; `c_first c_last w` assigns one width to a range.
    fn parse_cid_widths(entries: &[Object], widths: &mut FxHashMap<u32, f64>) {
        let mut i = 0;
        while i < entries.len() {
            let start = match entries[i].as_int() {
                Some(n) if n >= 0 => n as u32,
                _ => break,
            };
            match entries.get(i + 1) {
                Some(Object::Array(list)) => {
                    for (j, w) in list.iter().enumerate() {
                        if let Some(w) = w.as_number() {
                            widths.insert(start + j as u32, w);
                        }
                    }
                    i += 2;
                }
                Some(end_obj) => {
                    let end = match end_obj.as_int() {
                        Some(n) if n >= start as i64 => n as u32,
                        _ => break,
                    };
                    let w = match entries.get(i + 2).and_then(Object::as_number) {
                        Some(w) => w,
                        None => break,
                    };
                    // Range cap keeps a forged [0 4294967295 w] harmless.
                    for cid in start..=end.min(start + 65_535) {
                        widths.insert(cid, w);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    fn descriptor_missing_width(xref: &mut XRef, dict: &Dict) -> PdfResult<f64> {
        let descriptor = match dict.get("FontDescriptor") {
            Some(d) => xref.resolve(d)?,
            None => return Ok(0.0),
        };
        Ok(descriptor
            .as_dict()
            .and_then(|d| d.get("MissingWidth"))
            .and_then(Object::as_number)
            .unwrap_or(0.0))
    }

    /// Used when a /Tf names a font the resources don't contain.
    pub fn fallback() -> Font {
        Font {
            base_font: "Unknown".into(),
            subtype: String::new(),
            widths: FxHashMap::default(),
            missing_width: STANDARD_FONT_FALLBACK_WIDTH,
            two_byte_codes: false,
        }
    }

    /// Splits a show-text string into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte_codes {
            bytes
                .chunks(2)
                .map(|c| {
                    if c.len() == 2 {
                        ((c[0] as u32) << 8) | c[1] as u32
                    } else {
                        c[0] as u32
                    }
                })
                .collect()
        } else {
            bytes.iter().map(|&b| b as u32).collect()
        }
    }

    /// Whether this code has an explicit width (a present glyph).
    pub fn has_glyph(&self, code: u32) -> bool {
        self.widths.contains_key(&code)
    }

    /// Codes that advance but never paint: spaces and control codes in
    /// single-byte fonts.
    pub fn is_blank(&self, code: u32) -> bool {
        !self.two_byte_codes && code <= 0x20
    }

    /// Advance width in glyph space for a code.
    pub fn advance(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.missing_width)
    }

    /// Whether a code maps to the word-spacing-eligible single byte 32.
    pub fn is_word_space(&self, code: u32) -> bool {
        !self.two_byte_codes && code == 32
    }
}
