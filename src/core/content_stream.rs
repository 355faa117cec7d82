//! Content stream operation scanning.
//!
//! A content stream is a flat sequence of operands followed by an operator
//! keyword. The scanner collects operands until it hits a keyword, maps the
//! keyword to an [`OpCode`], and emits an [`Operation`]. Unknown keywords
//! and malformed operands are logged and dropped — one bad operator must
//! not abort the rest of the page.

use smallvec::SmallVec;

use crate::core::error::PdfResult;
use crate::core::lexer::Lexer;
use crate::core::parser::{Object, Parser};
use crate::core::stream::Stream;

/// Content stream operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    // Graphics state
    /// w
    SetLineWidth,
    /// J
    SetLineCap,
    /// j
    SetLineJoin,
    /// M
    SetMiterLimit,
    /// d
    SetDash,
    /// ri
    SetRenderingIntent,
    /// i
    SetFlatness,
    /// gs
    SetExtGState,
    /// q
    Save,
    /// Q
    Restore,
    /// cm
    Transform,

    // Path construction
    /// m
    MoveTo,
    /// l
    LineTo,
    /// c
    CurveTo,
    /// v (first control point is the current point)
    CurveToInitial,
    /// y (second control point is the endpoint)
    CurveToFinal,
    /// h
    ClosePath,
    /// re
    Rectangle,

    // Path painting
    /// S
    Stroke,
    /// s
    CloseStroke,
    /// f or F
    Fill,
    /// f*
    EvenOddFill,
    /// B
    FillStroke,
    /// B*
    EvenOddFillStroke,
    /// b
    CloseFillStroke,
    /// b*
    CloseEvenOddFillStroke,
    /// n
    EndPath,

    // Clipping
    /// W
    Clip,
    /// W*
    EvenOddClip,

    // Text objects
    /// BT
    BeginText,
    /// ET
    EndText,

    // Text state
    /// Tc
    SetCharSpacing,
    /// Tw
    SetWordSpacing,
    /// Tz
    SetHorizontalScale,
    /// TL
    SetLeading,
    /// Tf
    SetFont,
    /// Tr
    SetTextRenderMode,
    /// Ts
    SetTextRise,

    // Text positioning
    /// Td
    MoveText,
    /// TD
    MoveTextSetLeading,
    /// Tm
    SetTextMatrix,
    /// T*
    NextLine,

    // Text showing
    /// Tj
    ShowText,
    /// TJ
    ShowTextAdjusted,
    /// '
    NextLineShowText,
    /// "
    NextLineShowTextSpacing,

    // Type 3 glyph metrics
    /// d0
    SetCharWidth,
    /// d1
    SetCharWidthAndBounds,

    // Color
    /// CS
    SetStrokeColorSpace,
    /// cs
    SetFillColorSpace,
    /// SC
    SetStrokeColor,
    /// SCN
    SetStrokeColorN,
    /// sc
    SetFillColor,
    /// scn
    SetFillColorN,
    /// G
    SetStrokeGray,
    /// g
    SetFillGray,
    /// RG
    SetStrokeRgb,
    /// rg
    SetFillRgb,
    /// K
    SetStrokeCmyk,
    /// k
    SetFillCmyk,

    // Shading
    /// sh
    ShadingFill,

    // Inline images
    /// BI
    BeginInlineImage,

    // XObjects
    /// Do
    PaintXObject,

    // Marked content
    /// MP
    MarkPoint,
    /// DP
    MarkPointProps,
    /// BMC
    BeginMarkedContent,
    /// BDC
    BeginMarkedContentProps,
    /// EMC
    EndMarkedContent,

    // Compatibility sections
    /// BX
    BeginCompat,
    /// EX
    EndCompat,
}

impl OpCode {
    /// Maps an operator keyword to its opcode. Unknown keywords return
    /// `None`; the scanner skips them.
    pub fn from_keyword(kw: &str) -> Option<OpCode> {
        use OpCode::*;
        Some(match kw {
            "w" => SetLineWidth,
            "J" => SetLineCap,
            "j" => SetLineJoin,
            "M" => SetMiterLimit,
            "d" => SetDash,
            "ri" => SetRenderingIntent,
            "i" => SetFlatness,
            "gs" => SetExtGState,
            "q" => Save,
            "Q" => Restore,
            "cm" => Transform,

            "m" => MoveTo,
            "l" => LineTo,
            "c" => CurveTo,
            "v" => CurveToInitial,
            "y" => CurveToFinal,
            "h" => ClosePath,
            "re" => Rectangle,

            "S" => Stroke,
            "s" => CloseStroke,
            "f" | "F" => Fill,
            "f*" => EvenOddFill,
            "B" => FillStroke,
            "B*" => EvenOddFillStroke,
            "b" => CloseFillStroke,
            "b*" => CloseEvenOddFillStroke,
            "n" => EndPath,

            "W" => Clip,
            "W*" => EvenOddClip,

            "BT" => BeginText,
            "ET" => EndText,

            "Tc" => SetCharSpacing,
            "Tw" => SetWordSpacing,
            "Tz" => SetHorizontalScale,
            "TL" => SetLeading,
            "Tf" => SetFont,
            "Tr" => SetTextRenderMode,
            "Ts" => SetTextRise,

            "Td" => MoveText,
            "TD" => MoveTextSetLeading,
            "Tm" => SetTextMatrix,
            "T*" => NextLine,

            "Tj" => ShowText,
            "TJ" => ShowTextAdjusted,
            "'" => NextLineShowText,
            "\"" => NextLineShowTextSpacing,

            "d0" => SetCharWidth,
            "d1" => SetCharWidthAndBounds,

            "CS" => SetStrokeColorSpace,
            "cs" => SetFillColorSpace,
            "SC" => SetStrokeColor,
            "SCN" => SetStrokeColorN,
            "sc" => SetFillColor,
            "scn" => SetFillColorN,
            "G" => SetStrokeGray,
            "g" => SetFillGray,
            "RG" => SetStrokeRgb,
            "rg" => SetFillRgb,
            "K" => SetStrokeCmyk,
            "k" => SetFillCmyk,

            "sh" => ShadingFill,
            "BI" => BeginInlineImage,
            "Do" => PaintXObject,

            "MP" => MarkPoint,
            "DP" => MarkPointProps,
            "BMC" => BeginMarkedContent,
            "BDC" => BeginMarkedContentProps,
            "EMC" => EndMarkedContent,

            "BX" => BeginCompat,
            "EX" => EndCompat,

            _ => return None,
        })
    }
}

/// One operator with its operands, in stream order.
#[derive(Debug, Clone)]
pub struct Operation {
    pub op: OpCode,
    pub operands: SmallVec<[Object; 6]>,
}

impl Operation {
    pub fn new(op: OpCode, operands: SmallVec<[Object; 6]>) -> Self {
        Operation { op, operands }
    }
}

/// Scans a decoded content stream into a list of operations.
///
/// Recovery rules: operands with no operator are dropped at EOF; an
/// unknown keyword drops itself and the operands collected so far;
/// inline image payloads (`BI ... ID <bytes> EI`) are skipped whole.
pub fn scan_operations(content: &[u8]) -> PdfResult<Vec<Operation>> {
    let lexer = Lexer::new(Box::new(Stream::from_bytes(content.to_vec())));
    let mut parser = Parser::new(lexer)?;

    let mut operations = Vec::new();
    let mut operands: SmallVec<[Object; 6]> = SmallVec::new();

    loop {
        let obj = match parser.next_object() {
            Ok(o) => o,
            Err(e) => {
                log::warn!("content stream parse error, dropping operand run: {e}");
                operands.clear();
                continue;
            }
        };

        match obj {
            Object::Eof => break,
            Object::Keyword(kw) => match OpCode::from_keyword(&kw) {
                Some(OpCode::BeginInlineImage) => {
                    skip_inline_image(&mut parser)?;
                    operands.clear();
                }
                Some(op) => {
                    operations.push(Operation::new(op, std::mem::take(&mut operands)));
                }
                None => {
                    log::warn!("skipping unknown content operator '{kw}'");
                    operands.clear();
                }
            },
            operand => {
                if operands.len() >= 64 {
                    // Operand runs this long mean we lost sync; drop the
                    // oldest rather than grow without bound.
                    operands.remove(0);
                }
                operands.push(operand);
            }
        }
    }

    if !operands.is_empty() {
        log::warn!("content stream ends with {} dangling operands", operands.len());
    }

    Ok(operations)
}

/// Consumes an inline image: key/value pairs to `ID`, then raw bytes to a
/// whitespace-delimited `EI`.
fn skip_inline_image(parser: &mut Parser) -> PdfResult<()> {
    // Parameter dictionary entries until the ID keyword sits in the
    // lookahead; the payload skip rewinds from there.
    loop {
        if parser.peek_is_keyword("ID") {
            if !parser.skip_inline_image_payload() {
                log::warn!("inline image without EI terminator");
            }
            return Ok(());
        }
        match parser.next_object() {
            Ok(Object::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                log::warn!("bad inline image parameter: {e}");
            }
        }
    }
}
