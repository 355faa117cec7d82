//! PDF syntax tokenizer.
//!
//! Turns raw bytes into tokens: numbers, strings, names, keywords and
//! structure delimiters. The lexer is deliberately forgiving: comments and
//! irregular whitespace are skipped, malformed numbers degrade the way
//! Adobe's viewer treats them, and binary stream bodies are never tokenized
//! (the parser switches to raw byte reads between `stream`/`endstream`).

use crate::core::error::{PdfError, PdfResult};
use crate::core::stream::BaseStream;

/// PDF token kinds produced by [`Lexer::next_token`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of input.
    Eof,
    Boolean(bool),
    Null,
    /// Integers and reals are both carried as f64, as in the file format.
    Number(f64),
    /// Literal string contents, escapes resolved: (hello)
    String(Vec<u8>),
    /// Hex string contents: <48656c6c6f>
    HexString(Vec<u8>),
    /// Name with # escapes resolved: /Type
    Name(String),
    /// Bare keyword: obj, endobj, stream, R, or a content-stream operator.
    Keyword(String),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
}

// PDF whitespace: NUL TAB LF FF CR SPACE.
fn is_whitespace(ch: i32) -> bool {
    matches!(ch, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

// PDF delimiters: ( ) < > [ ] { } / %
fn is_delimiter(ch: i32) -> bool {
    matches!(
        ch,
        0x28 | 0x29 | 0x3C | 0x3E | 0x5B | 0x5D | 0x7B | 0x7D | 0x2F | 0x25
    )
}

fn is_regular(ch: i32) -> bool {
    ch >= 0 && !is_whitespace(ch) && !is_delimiter(ch)
}

fn hex_digit(ch: i32) -> i32 {
    match ch {
        0x30..=0x39 => ch & 0x0F,
        0x41..=0x46 | 0x61..=0x66 => (ch & 0x0F) + 9,
        _ => -1,
    }
}

/// Tokenizer over a byte stream.
///
/// Keeps a one-character lookahead; `-1` marks end of input so the match
/// arms stay in byte space.
pub struct Lexer {
    stream: Box<dyn BaseStream>,
    current: i32,
    buf: Vec<u8>,
}

impl Lexer {
    pub fn new(mut stream: Box<dyn BaseStream>) -> Self {
        let current = Self::read(&mut stream);
        Lexer {
            stream,
            current,
            buf: Vec::new(),
        }
    }

    fn read(stream: &mut Box<dyn BaseStream>) -> i32 {
        match stream.get_byte() {
            Ok(b) => b as i32,
            Err(_) => -1,
        }
    }

    fn advance(&mut self) -> i32 {
        self.current = Self::read(&mut self.stream);
        self.current
    }

    fn peek(&mut self) -> i32 {
        match self.stream.peek_byte() {
            Ok(b) => b as i32,
            Err(_) => -1,
        }
    }

    /// Byte offset of the lookahead character within the stream.
    pub fn position(&self) -> usize {
        if self.current >= 0 {
            self.stream.pos() - 1
        } else {
            self.stream.pos()
        }
    }

    /// Moves the cursor to an absolute byte offset, discarding lookahead.
    pub fn rewind_to(&mut self, pos: usize) {
        self.stream.set_pos(pos);
        self.current = Self::read(&mut self.stream);
    }

    /// Reads one raw byte at the current position, bypassing tokenization.
    /// Used for stream bodies and inline-image payloads.
    pub fn next_raw_byte(&mut self) -> Option<u8> {
        if self.current < 0 {
            return None;
        }
        let b = self.current as u8;
        self.advance();
        Some(b)
    }

    /// Copies `count` raw bytes starting at the current position.
    pub fn raw_bytes(&mut self, count: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            match self.next_raw_byte() {
                Some(b) => out.push(b),
                None => break,
            }
        }
        out
    }

    /// Skips to the byte following the next EOL (CR, LF, or CRLF).
    /// Positions the cursor at the first byte of a stream body.
    pub fn skip_to_next_line(&mut self) {
        loop {
            match self.current {
                -1 => break,
                0x0D => {
                    if self.advance() == 0x0A {
                        self.advance();
                    }
                    break;
                }
                0x0A => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        let mut in_comment = false;
        loop {
            let ch = self.current;
            if ch < 0 {
                break;
            }
            if in_comment {
                if ch == 0x0A || ch == 0x0D {
                    in_comment = false;
                }
            } else if ch == 0x25 {
                in_comment = true;
            } else if !is_whitespace(ch) {
                break;
            }
            self.advance();
        }
    }

    /// Produces the next token.
    pub fn next_token(&mut self) -> PdfResult<Token> {
        self.skip_whitespace_and_comments();

        let ch = self.current;
        if ch < 0 {
            return Ok(Token::Eof);
        }

        match ch {
            // 0-9 + - .
            0x30..=0x39 | 0x2B | 0x2D | 0x2E => self.lex_number(),
            0x28 => self.lex_literal_string(),
            0x2F => self.lex_name(),
            0x5B => {
                self.advance();
                Ok(Token::ArrayStart)
            }
            0x5D => {
                self.advance();
                Ok(Token::ArrayEnd)
            }
            0x3C => {
                if self.advance() == 0x3C {
                    self.advance();
                    Ok(Token::DictStart)
                } else {
                    self.lex_hex_string()
                }
            }
            0x3E => {
                if self.advance() == 0x3E {
                    self.advance();
                    Ok(Token::DictEnd)
                } else {
                    Err(PdfError::syntax("stray '>' outside hex string"))
                }
            }
            0x29 => {
                self.advance();
                Err(PdfError::syntax("stray ')' outside string"))
            }
            0x7B | 0x7D => {
                // PostScript procedure braces appear in Type4 functions only;
                // treat as one-character keywords so callers can skip them.
                self.advance();
                Ok(Token::Keyword((ch as u8 as char).to_string()))
            }
            _ => self.lex_keyword(),
        }
    }

    /// Number parsing with the usual real-world tolerances: sign doubling,
    /// embedded minus signs, trailing garbage, and exponent notation.
    fn lex_number(&mut self) -> PdfResult<Token> {
        let mut ch = self.current;
        let mut sign = 1.0;
        let mut divide_by = 0.0;
        let mut e_notation = false;
        let mut power = 0i32;
        let mut power_sign = 1i32;

        if ch == 0x2D {
            sign = -1.0;
            ch = self.advance();
            if ch == 0x2D {
                // Double negative, seen in the wild; collapse it.
                ch = self.advance();
            }
        } else if ch == 0x2B {
            ch = self.advance();
        }

        if ch == 0x0A || ch == 0x0D {
            // Line break between sign and digits.
            while ch == 0x0A || ch == 0x0D {
                ch = self.advance();
            }
        }

        if ch == 0x2E {
            divide_by = 10.0;
            ch = self.advance();
        }

        if !(0x30..=0x39).contains(&ch) {
            // A bare sign or dot followed by a delimiter reads as zero.
            if is_whitespace(ch) || ch == -1 || is_delimiter(ch) {
                return Ok(Token::Number(0.0));
            }
            return Err(PdfError::syntax(format!("invalid number start: {ch:#x}")));
        }

        let mut value = (ch - 0x30) as f64;

        loop {
            ch = self.advance();
            match ch {
                0x30..=0x39 => {
                    if e_notation {
                        power = power * 10 + (ch - 0x30);
                    } else {
                        if divide_by != 0.0 {
                            divide_by *= 10.0;
                        }
                        value = value * 10.0 + (ch - 0x30) as f64;
                    }
                }
                0x2E => {
                    if divide_by == 0.0 {
                        divide_by = 1.0;
                    } else {
                        break;
                    }
                }
                0x2D => {
                    // Minus in the middle of a number: ignored for
                    // compatibility with Adobe.
                }
                0x45 | 0x65 => {
                    let next = self.peek();
                    if next == 0x2B || next == 0x2D {
                        power_sign = if next == 0x2D { -1 } else { 1 };
                        self.advance();
                    } else if !(0x30..=0x39).contains(&next) {
                        // 'E' starts the next keyword, not an exponent.
                        break;
                    }
                    e_notation = true;
                }
                _ => break,
            }
        }

        let mut result = value;
        if divide_by != 0.0 {
            result /= divide_by;
        }
        if e_notation {
            result *= 10f64.powi(power_sign * power);
        }
        Ok(Token::Number(sign * result))
    }

    fn lex_literal_string(&mut self) -> PdfResult<Token> {
        self.buf.clear();
        let mut depth = 1;
        let mut ch = self.advance();
        let mut terminated = false;

        loop {
            let mut buffered = false;
            match ch {
                -1 => break,
                0x28 => {
                    depth += 1;
                    self.buf.push(b'(');
                }
                0x29 => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        terminated = true;
                        break;
                    }
                    self.buf.push(b')');
                }
                0x5C => {
                    ch = self.advance();
                    match ch {
                        -1 => break,
                        0x6E => self.buf.push(b'\n'),
                        0x72 => self.buf.push(b'\r'),
                        0x74 => self.buf.push(b'\t'),
                        0x62 => self.buf.push(0x08),
                        0x66 => self.buf.push(0x0C),
                        0x5C | 0x28 | 0x29 => self.buf.push(ch as u8),
                        0x30..=0x37 => {
                            // Octal escape, 1-3 digits.
                            let mut v = (ch & 0x0F) as u32;
                            ch = self.advance();
                            buffered = true;
                            if (0x30..=0x37).contains(&ch) {
                                v = (v << 3) + (ch & 0x0F) as u32;
                                ch = self.advance();
                                if (0x30..=0x37).contains(&ch) {
                                    buffered = false;
                                    v = (v << 3) + (ch & 0x0F) as u32;
                                }
                            }
                            self.buf.push((v & 0xFF) as u8);
                        }
                        0x0D => {
                            // Escaped line break: swallow CR and optional LF.
                            if self.peek() == 0x0A {
                                self.advance();
                            }
                        }
                        0x0A => {}
                        _ => self.buf.push(ch as u8),
                    }
                }
                _ => self.buf.push(ch as u8),
            }

            if !buffered {
                ch = self.advance();
            }
        }

        if !terminated {
            return Err(PdfError::syntax("unterminated literal string"));
        }
        Ok(Token::String(self.buf.clone()))
    }

    fn lex_hex_string(&mut self) -> PdfResult<Token> {
        self.buf.clear();
        let mut ch = self.current;
        let mut first = -1;
        let mut terminated = false;

        while ch >= 0 {
            if ch == 0x3E {
                self.advance();
                terminated = true;
                break;
            }
            if is_whitespace(ch) {
                ch = self.advance();
                continue;
            }
            let digit = hex_digit(ch);
            if digit >= 0 {
                if first < 0 {
                    first = digit;
                } else {
                    self.buf.push(((first << 4) | digit) as u8);
                    first = -1;
                }
            }
            // Invalid hex digits are skipped silently.
            ch = self.advance();
        }

        if first >= 0 {
            // Odd digit count: final digit behaves as if followed by 0.
            self.buf.push((first << 4) as u8);
        }
        if !terminated {
            return Err(PdfError::syntax("unterminated hex string"));
        }
        Ok(Token::HexString(self.buf.clone()))
    }

    fn lex_name(&mut self) -> PdfResult<Token> {
        self.buf.clear();
        let mut ch = self.advance();

        while is_regular(ch) {
            if ch == 0x23 {
                // #XX escape.
                ch = self.advance();
                if !is_regular(ch) {
                    self.buf.push(b'#');
                    break;
                }
                let hi = hex_digit(ch);
                if hi >= 0 {
                    let saved = ch;
                    ch = self.advance();
                    let lo = hex_digit(ch);
                    if lo >= 0 {
                        self.buf.push(((hi << 4) | lo) as u8);
                    } else {
                        // Only one valid digit: keep the text as written.
                        self.buf.push(b'#');
                        self.buf.push(saved as u8);
                        if !is_regular(ch) {
                            break;
                        }
                        self.buf.push(ch as u8);
                    }
                } else {
                    self.buf.push(b'#');
                    self.buf.push(ch as u8);
                }
            } else {
                self.buf.push(ch as u8);
            }
            ch = self.advance();
        }

        Ok(Token::Name(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    fn lex_keyword(&mut self) -> PdfResult<Token> {
        let mut word = String::new();
        let mut ch = self.current;

        while is_regular(ch) {
            if word.len() >= 128 {
                return Err(PdfError::syntax("keyword token too long"));
            }
            word.push(ch as u8 as char);
            ch = self.advance();
        }

        match word.as_str() {
            "true" => Ok(Token::Boolean(true)),
            "false" => Ok(Token::Boolean(false)),
            "null" => Ok(Token::Null),
            _ => Ok(Token::Keyword(word)),
        }
    }
}
