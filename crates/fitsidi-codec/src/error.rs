/// All errors that can occur while decoding or encoding FITS data.
#[derive(Debug)]
pub enum Error {
    /// Malformed FITS header block or structurally inconsistent header.
    InvalidHeader(&'static str),
    /// Premature end of data while reading.
    UnexpectedEof,
    /// Unrecognized BITPIX value.
    InvalidBitpix(i64),
    /// Keyword name contains bytes outside printable ASCII.
    InvalidKeyword,
    /// Unknown or unsupported XTENSION type.
    UnsupportedExtension(String),
    /// A header value or data field could not be parsed or written.
    InvalidValue(&'static str),
    /// A required keyword was not found in the header.
    MissingKeyword(&'static str),
    /// A TFORMn code that this codec cannot decode (e.g. variable-length arrays).
    UnsupportedColumn(String),
    /// A tile compression algorithm or quantisation method that is not supported.
    UnsupportedCompression(String),
    /// Compressed tile data could not be inflated.
    Decompression,
    /// An I/O error from the standard library.
    Io(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidHeader(why) => write!(f, "invalid FITS header: {why}"),
            Error::UnexpectedEof => write!(f, "unexpected end of file"),
            Error::InvalidBitpix(v) => write!(f, "invalid BITPIX value: {v}"),
            Error::InvalidKeyword => write!(f, "invalid keyword name"),
            Error::UnsupportedExtension(x) => write!(f, "unsupported XTENSION type: {x}"),
            Error::InvalidValue(why) => write!(f, "invalid value: {why}"),
            Error::MissingKeyword(kw) => write!(f, "missing required keyword: {kw}"),
            Error::UnsupportedColumn(tform) => write!(f, "unsupported column format: {tform}"),
            Error::UnsupportedCompression(name) => {
                write!(f, "unsupported tile compression: {name}")
            }
            Error::Decompression => write!(f, "failed to decompress tile data"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
