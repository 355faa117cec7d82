//! Stream filter decoding.
//!
//! Covers the filters a rendering core meets in practice: FlateDecode with
//! PNG/TIFF predictors, ASCIIHexDecode, ASCII85Decode and RunLengthDecode.
//! Image-compression filters (DCTDecode, JPXDecode, JBIG2Decode, CCITT) are
//! reported as unsupported; callers skip the object and keep rendering.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::core::error::{PdfError, PdfResult};
use crate::core::parser::{Dict, Object};

/// Decompresses a FlateDecode stream body.
///
/// PDF Flate bodies are zlib-wrapped; some generators emit raw deflate, so
/// that is tried as a fallback before giving up.
pub fn decode_flate(data: &[u8]) -> PdfResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut decoder = ZlibDecoder::new(data);
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(_) => {
            out.clear();
            let mut raw = flate2::read::DeflateDecoder::new(data);
            raw.read_to_end(&mut out)
                .map_err(|e| PdfError::syntax(format!("flate decode failed: {e}")))?;
            Ok(out)
        }
    }
}

/// Reverses PNG row predictors (predictor values 10-15).
///
/// `colors * bit_depth / 8` bytes per pixel, `columns` pixels per row, one
/// tag byte per row selecting the per-row filter.
pub fn decode_png_predictor(
    data: &[u8],
    colors: usize,
    bit_depth: usize,
    columns: usize,
) -> PdfResult<Vec<u8>> {
    let bpp = ((colors * bit_depth) + 7) / 8;
    let row_len = (columns * colors * bit_depth + 7) / 8;
    if row_len == 0 {
        return Ok(Vec::new());
    }

    let stride = row_len + 1;
    let mut out = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_len];

    for chunk in data.chunks(stride) {
        if chunk.len() < 2 {
            break;
        }
        let tag = chunk[0];
        let row = &chunk[1..];
        let mut decoded = vec![0u8; row.len()];

        for i in 0..row.len() {
            let raw = row[i];
            let left = if i >= bpp { decoded[i - bpp] } else { 0 };
            let up = if i < prev_row.len() { prev_row[i] } else { 0 };
            let up_left = if i >= bpp && i - bpp < prev_row.len() {
                prev_row[i - bpp]
            } else {
                0
            };

            decoded[i] = match tag {
                0 => raw,
                1 => raw.wrapping_add(left),
                2 => raw.wrapping_add(up),
                3 => raw.wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => {
                    // Paeth
                    let p = left as i16 + up as i16 - up_left as i16;
                    let pa = (p - left as i16).abs();
                    let pb = (p - up as i16).abs();
                    let pc = (p - up_left as i16).abs();
                    let predictor = if pa <= pb && pa <= pc {
                        left
                    } else if pb <= pc {
                        up
                    } else {
                        up_left
                    };
                    raw.wrapping_add(predictor)
                }
                _ => {
                    return Err(PdfError::syntax(format!("unknown PNG row filter {tag}")));
                }
            };
        }

        out.extend_from_slice(&decoded);
        prev_row.clear();
        prev_row.extend_from_slice(&decoded);
        prev_row.resize(row_len, 0);
    }

    Ok(out)
}

/// ASCIIHexDecode: hex pairs, whitespace ignored, '>' terminates.
pub fn decode_ascii_hex(data: &[u8]) -> PdfResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut first: Option<u8> = None;

    for &b in data {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            b'>' => break,
            b if (b as i32) <= 0x20 => continue,
            _ => {
                return Err(PdfError::syntax(format!(
                    "invalid ASCIIHex byte {b:#04x}"
                )))
            }
        };
        match first.take() {
            None => first = Some(digit),
            Some(hi) => out.push((hi << 4) | digit),
        }
    }

    if let Some(hi) = first {
        // Odd digit count: final digit is padded with zero.
        out.push(hi << 4);
    }
    Ok(out)
}

/// ASCII85Decode: base-85 groups, 'z' shorthand for four zero bytes, '~>'
/// terminates.
pub fn decode_ascii85(data: &[u8]) -> PdfResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut group = [0u8; 5];
    let mut count = 0;

    let mut iter = data.iter().peekable();
    while let Some(&b) = iter.next() {
        match b {
            b'~' => break,
            b'z' if count == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = b - b'!';
                count += 1;
                if count == 5 {
                    let mut value: u32 = 0;
                    for &g in &group {
                        value = value
                            .checked_mul(85)
                            .and_then(|v| v.checked_add(g as u32))
                            .ok_or_else(|| PdfError::syntax("ASCII85 group overflow"))?;
                    }
                    out.extend_from_slice(&value.to_be_bytes());
                    count = 0;
                }
            }
            b if (b as i32) <= 0x20 => {}
            _ => return Err(PdfError::syntax(format!("invalid ASCII85 byte {b:#04x}"))),
        }
    }

    if count == 1 {
        return Err(PdfError::syntax("dangling single ASCII85 digit"));
    }
    if count > 1 {
        // Partial group: pad with 'u' (84), emit count-1 bytes.
        for slot in group.iter_mut().skip(count) {
            *slot = 84;
        }
        let mut value: u32 = 0;
        for &g in &group {
            value = value
                .checked_mul(85)
                .and_then(|v| v.checked_add(g as u32))
                .ok_or_else(|| PdfError::syntax("ASCII85 group overflow"))?;
        }
        let bytes = value.to_be_bytes();
        out.extend_from_slice(&bytes[..count - 1]);
    }

    Ok(out)
}

/// RunLengthDecode: length byte < 128 copies, > 128 repeats, 128 ends.
pub fn decode_run_length(data: &[u8]) -> PdfResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let len = data[i];
        i += 1;
        match len {
            0..=127 => {
                let count = len as usize + 1;
                if i + count > data.len() {
                    return Err(PdfError::syntax("run-length literal overruns data"));
                }
                out.extend_from_slice(&data[i..i + count]);
                i += count;
            }
            128 => break,
            129..=255 => {
                if i >= data.len() {
                    return Err(PdfError::syntax("run-length repeat overruns data"));
                }
                let count = 257 - len as usize;
                out.extend(std::iter::repeat(data[i]).take(count));
                i += 1;
            }
        }
    }
    Ok(out)
}

fn predictor_params(parms: Option<&Dict>) -> (i64, usize, usize, usize) {
    let get = |key: &str, default: i64| -> i64 {
        parms
            .and_then(|d| d.get(key))
            .and_then(Object::as_int)
            .unwrap_or(default)
    };
    (
        get("Predictor", 1),
        get("Colors", 1).max(1) as usize,
        get("BitsPerComponent", 8).max(1) as usize,
        get("Columns", 1).max(1) as usize,
    )
}

/// Applies one named filter.
pub fn apply_filter(name: &str, data: &[u8], parms: Option<&Dict>) -> PdfResult<Vec<u8>> {
    match name {
        "FlateDecode" | "Fl" => {
            let decoded = decode_flate(data)?;
            let (predictor, colors, bits, columns) = predictor_params(parms);
            if predictor >= 10 {
                decode_png_predictor(&decoded, colors, bits, columns)
            } else if predictor == 2 {
                Err(PdfError::syntax("TIFF predictor 2 not supported"))
            } else {
                Ok(decoded)
            }
        }
        "ASCIIHexDecode" | "AHx" => decode_ascii_hex(data),
        "ASCII85Decode" | "A85" => decode_ascii85(data),
        "RunLengthDecode" | "RL" => decode_run_length(data),
        other => Err(PdfError::syntax(format!("unsupported filter {other}"))),
    }
}

/// Decodes a stream body through its full `/Filter` pipeline.
///
/// `/Filter` may be a single name or an array applied left to right;
/// `/DecodeParms` mirrors its shape.
pub fn decode_stream(dict: &Dict, data: &[u8]) -> PdfResult<Vec<u8>> {
    let filter = match dict.get("Filter") {
        None => return Ok(data.to_vec()),
        Some(f) => f,
    };

    let parms = dict.get("DecodeParms").or_else(|| dict.get("DP"));

    match filter {
        Object::Name(name) => {
            let p = parms.and_then(Object::as_dict);
            apply_filter(name, data, p)
        }
        Object::Array(filters) => {
            let mut current = data.to_vec();
            for (i, f) in filters.iter().enumerate() {
                let name = f
                    .as_name()
                    .ok_or_else(|| PdfError::syntax("filter array entry is not a name"))?;
                let p = parms
                    .and_then(Object::as_array)
                    .and_then(|a| a.get(i))
                    .and_then(Object::as_dict);
                current = apply_filter(name, &current, p)?;
            }
            Ok(current)
        }
        _ => Err(PdfError::syntax("/Filter is neither name nor array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn flate_round_trip() {
        let original = b"BT /F1 12 Tf (Hello) Tj ET".repeat(10);
        assert_eq!(decode_flate(&deflate(&original)).unwrap(), original);
    }

    #[test]
    fn flate_rejects_garbage() {
        assert!(decode_flate(b"definitely not zlib").is_err());
    }

    #[test]
    fn ascii_hex() {
        assert_eq!(decode_ascii_hex(b"48 65 6C 6c 6F>").unwrap(), b"Hello");
        // Odd digit padded with zero.
        assert_eq!(decode_ascii_hex(b"7>").unwrap(), vec![0x70]);
        assert!(decode_ascii_hex(b"zz").is_err());
    }

    #[test]
    fn ascii85() {
        // "Man " encodes to "9jqo^" in base85.
        assert_eq!(decode_ascii85(b"9jqo^~>").unwrap(), b"Man ");
        assert_eq!(decode_ascii85(b"z~>").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn run_length() {
        // 2 literals "ab", then 'c' repeated 4 times (257-253), then EOD.
        let encoded = [1, b'a', b'b', 253, b'c', 128];
        assert_eq!(decode_run_length(&encoded).unwrap(), b"abcccc");
    }

    #[test]
    fn png_predictor_up_filter() {
        // Two rows of 3 bytes, both tagged "Up" (2); second row adds to first.
        let data = [2, 10, 20, 30, 2, 1, 1, 1];
        let out = decode_png_predictor(&data, 1, 8, 3).unwrap();
        assert_eq!(out, vec![10, 20, 30, 11, 21, 31]);
    }

    #[test]
    fn pipeline_applies_filters_in_order() {
        let payload = b"content stream data";
        let flated = deflate(payload);
        let hex: String = flated.iter().map(|b| format!("{b:02x}")).collect();

        let mut dict = Dict::default();
        dict.insert(
            "Filter".into(),
            Object::Array(vec![
                Object::Name("ASCIIHexDecode".into()),
                Object::Name("FlateDecode".into()),
            ]),
        );
        let decoded = decode_stream(&dict, format!("{hex}>").as_bytes()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn unsupported_filter_is_an_error() {
        let mut dict = Dict::default();
        dict.insert("Filter".into(), Object::Name("DCTDecode".into()));
        assert!(decode_stream(&dict, b"\xff\xd8").is_err());
    }
}
