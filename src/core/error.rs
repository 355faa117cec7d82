use thiserror::Error;

/// Crate-wide error type.
///
/// Every failure that crosses the public boundary is one of these variants,
/// so callers can branch on kind (prompt for a password, report a corrupt
/// file, resize a surface) instead of string-matching.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The document is encrypted and no usable password was supplied.
    #[error("document is encrypted and requires a password")]
    PasswordRequired,

    /// A password was supplied but did not validate.
    #[error("invalid password")]
    InvalidPassword,

    /// The document structure is unusable after all recovery strategies.
    #[error("document corrupt: {0}")]
    DocumentCorrupt(String),

    /// A page index outside [0, page_count).
    #[error("page index {index} out of range (page count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// The underlying byte source could not be read.
    #[error("i/o failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// Operation on a handle after close().
    #[error("document handle is closed")]
    ClosedHandle,

    /// Caller-supplied surface does not match the computed render dimensions.
    #[error("surface size mismatch: expected {expected:?}, got {actual:?}")]
    SurfaceSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Local syntax error while parsing an object or a content stream.
    ///
    /// Absorbed by best-effort recovery wherever possible; only escalates to
    /// `DocumentCorrupt` when the damage is structural.
    #[error("malformed syntax: {0}")]
    MalformedSyntax(String),
}

impl PdfError {
    /// Shorthand used by parsing code paths.
    pub(crate) fn syntax(msg: impl Into<String>) -> Self {
        PdfError::MalformedSyntax(msg.into())
    }

    /// Shorthand for structural failures.
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        PdfError::DocumentCorrupt(msg.into())
    }
}

/// Result type alias for PDF operations.
pub type PdfResult<T> = Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = PdfError::IndexOutOfRange { index: 7, count: 3 };
        assert_eq!(
            err.to_string(),
            "page index 7 out of range (page count 3)"
        );

        let err = PdfError::SurfaceSizeMismatch {
            expected: (100, 200),
            actual: (50, 50),
        };
        assert!(err.to_string().contains("(100, 200)"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PdfError = io.into();
        assert!(matches!(err, PdfError::IoFailure(_)));
    }
}
