//! PDF object model and object parser.
//!
//! The parser assembles [`Object`] values from lexer tokens. A two-token
//! lookahead buffer lets it recognize the patterns that need more than one
//! token of context: indirect references (`N G R`) and stream objects
//! (a dictionary immediately followed by the `stream` keyword).

use rustc_hash::FxHashMap;

use crate::core::error::{PdfError, PdfResult};
use crate::core::lexer::{Lexer, Token};

/// An indirect object reference: object number + generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub num: u32,
    pub gen: u32,
}

impl ObjectRef {
    pub fn new(num: u32, gen: u32) -> Self {
        ObjectRef { num, gen }
    }
}

/// Dictionary type used throughout the crate.
pub type Dict = FxHashMap<String, Object>;

/// A stream object: its dictionary plus the raw (still encoded, possibly
/// encrypted) body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamObject {
    pub dict: Dict,
    pub data: Vec<u8>,
}

/// The complete set of PDF primitive objects.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Number(f64),
    /// Literal string bytes.
    String(Vec<u8>),
    /// Hex string bytes.
    HexString(Vec<u8>),
    Name(String),
    Array(Vec<Object>),
    Dictionary(Dict),
    Stream(StreamObject),
    Reference(ObjectRef),
    /// Bare keyword. Only meaningful inside content streams, where it
    /// separates operators from operands.
    Keyword(String),
    Eof,
}

impl Object {
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, Object::Eof)
    }

    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, Object::Keyword(k) if k == kw)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_number().map(|n| n as i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    /// String bytes from either literal or hex form.
    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Object::String(b) | Object::HexString(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&StreamObject> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }
}

/// Object parser with two-token lookahead.
pub struct Parser {
    lexer: Lexer,
    buf1: Token,
    buf2: Token,
    /// Byte offset the lexer stood at before `buf2` was read. Lets
    /// inline-image handling rewind past the token lookahead.
    buf2_start: usize,
    /// One-shot stream length override, consumed by the first stream body.
    /// Set when a caller has resolved an indirect `/Length` out of band and
    /// re-parses the object with the now-known size.
    length_override: Option<usize>,
}

/// Pulls the next token, skipping over locally-damaged ones. Every lex
/// error consumes at least one byte, so this terminates at EOF.
fn read_token(lexer: &mut Lexer) -> Token {
    loop {
        match lexer.next_token() {
            Ok(t) => return t,
            Err(e) => {
                log::debug!("skipping unlexable byte run: {e}");
            }
        }
    }
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> PdfResult<Self> {
        let buf1 = read_token(&mut lexer);
        let buf2_start = lexer.position();
        let buf2 = read_token(&mut lexer);
        Ok(Parser {
            lexer,
            buf1,
            buf2,
            buf2_start,
            length_override: None,
        })
    }

    /// Supplies a resolved stream length for the next stream body.
    pub fn with_length_override(mut self, length: Option<usize>) -> Self {
        self.length_override = length;
        self
    }

    pub fn has_more(&self) -> bool {
        !matches!(self.buf1, Token::Eof)
    }

    /// Whether the next object to come out of the parser is this keyword.
    pub fn peek_is_keyword(&self, kw: &str) -> bool {
        matches!(&self.buf1, Token::Keyword(k) if k == kw)
    }

    fn shift(&mut self) {
        self.buf2_start = self.lexer.position();
        self.buf1 = std::mem::replace(&mut self.buf2, read_token(&mut self.lexer));
    }

    /// Skips an inline-image payload. Call with the `ID` keyword in the
    /// lookahead (`peek_is_keyword("ID")`): the lexer rewinds to just past
    /// `ID`, raw-scans for a whitespace-delimited `EI`, and token reading
    /// resumes after it. Returns false when no terminator exists.
    pub fn skip_inline_image_payload(&mut self) -> bool {
        debug_assert!(self.peek_is_keyword("ID"));
        // buf2 was tokenized from payload bytes; rewind to where it began,
        // which is at (or just inside leading whitespace of) the payload.
        self.lexer.rewind_to(self.buf2_start);

        let mut prev2 = 0x20u8; // the whitespace that followed ID
        let mut prev1 = 0x20u8;
        let mut found = false;
        loop {
            let b = match self.lexer.next_raw_byte() {
                Some(b) => b,
                None => break,
            };
            let ws_before = prev2.is_ascii_whitespace() || prev2 == 0x00;
            if ws_before && prev1 == b'E' && b == b'I' {
                match self.lexer.next_raw_byte() {
                    None => {
                        found = true;
                        break;
                    }
                    Some(next) if next.is_ascii_whitespace() || next == 0x00 => {
                        found = true;
                        break;
                    }
                    Some(next) => {
                        prev2 = b'I';
                        prev1 = next;
                        continue;
                    }
                }
            }
            prev2 = prev1;
            prev1 = b;
        }

        self.buf1 = read_token(&mut self.lexer);
        self.buf2_start = self.lexer.position();
        self.buf2 = read_token(&mut self.lexer);
        found
    }

    /// Parses the next object.
    pub fn next_object(&mut self) -> PdfResult<Object> {
        match self.buf1.clone() {
            Token::ArrayStart => {
                self.shift();
                self.parse_array()
            }
            Token::DictStart => {
                self.shift();
                self.parse_dictionary()
            }
            Token::ArrayEnd => {
                self.shift();
                Err(PdfError::syntax("unexpected ']'"))
            }
            Token::DictEnd => {
                self.shift();
                Err(PdfError::syntax("unexpected '>>'"))
            }
            Token::Number(n) => {
                self.shift();
                // N G R pattern detection.
                if let (Token::Number(g), Token::Keyword(kw)) = (&self.buf1, &self.buf2) {
                    if kw == "R" && n >= 0.0 && *g >= 0.0 {
                        let r = ObjectRef::new(n as u32, *g as u32);
                        self.shift();
                        self.shift();
                        return Ok(Object::Reference(r));
                    }
                }
                Ok(Object::Number(n))
            }
            Token::Eof => Ok(Object::Eof),
            Token::Boolean(b) => {
                self.shift();
                Ok(Object::Boolean(b))
            }
            Token::Null => {
                self.shift();
                Ok(Object::Null)
            }
            Token::String(s) => {
                self.shift();
                Ok(Object::String(s))
            }
            Token::HexString(s) => {
                self.shift();
                Ok(Object::HexString(s))
            }
            Token::Name(n) => {
                self.shift();
                Ok(Object::Name(n))
            }
            Token::Keyword(k) => {
                self.shift();
                Ok(Object::Keyword(k))
            }
        }
    }

    fn parse_array(&mut self) -> PdfResult<Object> {
        let mut items = Vec::new();
        loop {
            match &self.buf1 {
                Token::ArrayEnd => {
                    self.shift();
                    break;
                }
                Token::Eof => {
                    return Err(PdfError::syntax("unterminated array"));
                }
                _ => match self.next_object() {
                    Ok(obj) => items.push(obj),
                    Err(e) => {
                        // A damaged element becomes null; keep going so one
                        // bad entry cannot take out the whole array.
                        log::warn!("recovering from bad array element: {e}");
                        items.push(Object::Null);
                    }
                },
            }
        }
        Ok(Object::Array(items))
    }

    fn parse_dictionary(&mut self) -> PdfResult<Object> {
        let mut dict = Dict::default();

        loop {
            match &self.buf1 {
                Token::DictEnd => break,
                Token::Eof => return Err(PdfError::syntax("unterminated dictionary")),
                Token::Name(_) => {}
                Token::Keyword(_) => {
                    // Keys written without the slash show up in damaged
                    // files; accept them.
                }
                _ => {
                    // Not a usable key: drop the token and resync.
                    self.shift();
                    continue;
                }
            }

            let key = match &self.buf1 {
                Token::Name(n) | Token::Keyword(n) => n.clone(),
                _ => break,
            };
            self.shift();

            match &self.buf1 {
                Token::Eof => return Err(PdfError::syntax("dictionary ends after key")),
                Token::DictEnd => {
                    dict.insert(key, Object::Null);
                    break;
                }
                _ => {}
            }

            let value = match self.next_object() {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("recovering from bad value for key '{key}': {e}");
                    Object::Null
                }
            };
            dict.insert(key, value);
        }

        // At this point buf1 is '>>'. If buf2 is the `stream` keyword, the
        // dictionary heads a stream object and the lexer sits right after
        // the keyword — hand over to the raw body reader before the token
        // buffer can swallow binary data.
        if matches!(&self.buf2, Token::Keyword(kw) if kw == "stream") {
            return self.parse_stream_body(dict);
        }

        self.shift();
        Ok(Object::Dictionary(dict))
    }

    /// Reads a stream body. `/Length` is authoritative whenever it resolves
    /// to an in-bounds value; otherwise the body extends to the nearest
    /// following `endstream` keyword with one trailing EOL trimmed.
    fn parse_stream_body(&mut self, dict: Dict) -> PdfResult<Object> {
        self.lexer.skip_to_next_line();

        let length = match (self.length_override.take(), dict.get("Length")) {
            (Some(len), _) => Some(len),
            (None, Some(Object::Number(n))) if *n >= 0.0 => Some(*n as usize),
            (None, Some(Object::Reference(r))) => {
                // Not resolvable from inside the parser; the xref re-parses
                // with an override once it has fetched the value.
                log::debug!(
                    "stream /Length {} {} R not yet resolvable, scanning for endstream",
                    r.num,
                    r.gen
                );
                None
            }
            _ => None,
        };

        let data = match length {
            Some(len) => {
                let data = self.lexer.raw_bytes(len);
                if data.len() < len {
                    return Err(PdfError::syntax("stream body truncated"));
                }
                data
            }
            None => self.scan_to_endstream()?,
        };

        // Refill the lookahead; the next tokens should be `endstream` and
        // `endobj`, consumed by whoever reads past this object.
        self.buf1 = read_token(&mut self.lexer);
        self.buf2_start = self.lexer.position();
        self.buf2 = read_token(&mut self.lexer);

        // When /Length was used the cursor sits before `endstream`; eat it
        // so callers see the same token stream on both paths.
        if matches!(&self.buf1, Token::Keyword(kw) if kw == "endstream") {
            self.shift();
        }

        Ok(Object::Stream(StreamObject { dict, data }))
    }

    fn scan_to_endstream(&mut self) -> PdfResult<Vec<u8>> {
        const MARKER: &[u8] = b"endstream";
        let mut data = Vec::new();
        let mut matched = 0;

        loop {
            match self.lexer.next_raw_byte() {
                Some(b) => {
                    data.push(b);
                    if b == MARKER[matched] {
                        matched += 1;
                        if matched == MARKER.len() {
                            data.truncate(data.len() - MARKER.len());
                            // Trim the EOL that separates body from keyword.
                            if data.last() == Some(&b'\n') {
                                data.pop();
                            }
                            if data.last() == Some(&b'\r') {
                                data.pop();
                            }
                            return Ok(data);
                        }
                    } else {
                        matched = if b == MARKER[0] { 1 } else { 0 };
                    }
                }
                None => return Err(PdfError::syntax("unterminated stream (no endstream)")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stream::Stream;

    fn parse(input: &[u8]) -> PdfResult<Object> {
        let lexer = Lexer::new(Box::new(Stream::from_bytes(input.to_vec())));
        Parser::new(lexer)?.next_object()
    }

    #[test]
    fn simple_objects() {
        assert_eq!(parse(b"42").unwrap(), Object::Number(42.0));
        assert_eq!(parse(b"true").unwrap(), Object::Boolean(true));
        assert_eq!(parse(b"null").unwrap(), Object::Null);
        assert_eq!(parse(b"(hi)").unwrap(), Object::String(b"hi".to_vec()));
        assert_eq!(parse(b"/Type").unwrap(), Object::Name("Type".into()));
    }

    #[test]
    fn references() {
        assert_eq!(
            parse(b"5 0 R").unwrap(),
            Object::Reference(ObjectRef::new(5, 0))
        );
        assert_eq!(
            parse(b"[5 0 R 10 2 R]").unwrap(),
            Object::Array(vec![
                Object::Reference(ObjectRef::new(5, 0)),
                Object::Reference(ObjectRef::new(10, 2)),
            ])
        );
        // Two numbers not followed by R stay numbers.
        assert_eq!(parse(b"[5 0 7]").unwrap().as_array().unwrap().len(), 3);
    }

    #[test]
    fn dictionaries() {
        let obj = parse(b"<< /Type /Page /Count 3 /Parent 2 0 R >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name(), Some("Page"));
        assert_eq!(dict.get("Count").unwrap().as_int(), Some(3));
        assert_eq!(
            dict.get("Parent").unwrap().as_reference(),
            Some(ObjectRef::new(2, 0))
        );
    }

    #[test]
    fn nested_structures() {
        let obj = parse(b"<< /Kids [<< /A 1 >> << /B [2 3] >>] >>").unwrap();
        let kids = obj.as_dict().unwrap().get("Kids").unwrap();
        assert_eq!(kids.as_array().unwrap().len(), 2);
    }

    #[test]
    fn stream_with_explicit_length() {
        let obj = parse(b"<< /Length 5 >>\nstream\nABCDE\nendstream").unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data, b"ABCDE");
        assert_eq!(stream.dict.get("Length").unwrap().as_int(), Some(5));
    }

    #[test]
    fn stream_without_length_scans_for_endstream() {
        let obj = parse(b"<< /Foo /Bar >>\nstream\nsome body bytes\nendstream").unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data, b"some body bytes");
    }

    #[test]
    fn stream_length_overrides_embedded_endstream_text() {
        // The body literally contains "endstream"; a resolvable /Length must
        // win over the scan heuristic.
        let body = b"xxendstreamxx";
        let input = format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            body.len(),
            std::str::from_utf8(body).unwrap()
        );
        let obj = parse(input.as_bytes()).unwrap();
        assert_eq!(obj.as_stream().unwrap().data, body);
    }

    #[test]
    fn unterminated_structures_fail() {
        assert!(parse(b"[1 2 3").is_err());
        assert!(parse(b"<< /Type /Font").is_err());
        assert!(parse(b"<< /Length 99 >>\nstream\nshort").is_err());
    }

    #[test]
    fn damaged_array_element_is_dropped() {
        // The stray ')' cannot be tokenized; the survivors still parse.
        let obj = parse(b"[1 ) 3]").unwrap();
        let items = obj.as_array().unwrap();
        assert_eq!(items, &[Object::Number(1.0), Object::Number(3.0)]);
    }

    #[test]
    fn multiple_objects_in_sequence() {
        let lexer = Lexer::new(Box::new(Stream::from_bytes(b"1 0 obj 42 endobj".to_vec())));
        let mut parser = Parser::new(lexer).unwrap();
        assert_eq!(parser.next_object().unwrap(), Object::Number(1.0));
        assert_eq!(parser.next_object().unwrap(), Object::Number(0.0));
        assert!(parser.next_object().unwrap().is_keyword("obj"));
        assert_eq!(parser.next_object().unwrap(), Object::Number(42.0));
        assert!(parser.next_object().unwrap().is_keyword("endobj"));
        assert!(parser.next_object().unwrap().is_eof());
    }
}
