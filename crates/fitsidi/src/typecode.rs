//! Element types and FITS binary-table format codes.

use core::fmt;

/// Every format code letter that may appear in a TFORMn value.
pub const FORMAT_CODE_ALPHABET: [char; 13] =
    ['L', 'X', 'B', 'I', 'J', 'K', 'A', 'E', 'D', 'C', 'M', 'P', 'Q'];

/// TZEROn that stores 64-bit unsigned integers in a `K` column.
pub const U64_OFFSET: f64 = 9_223_372_036_854_775_808.0;

/// Scalar element type of an array or column in the container model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    /// IEEE binary16, stored as bit patterns.
    F16,
    F32,
    F64,
    Complex64,
    Complex128,
    /// Fixed-width byte string of the given width.
    Bytes(usize),
    /// Fixed-width unicode string of the given width in characters.
    Unicode(usize),
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Bool => f.write_str("bool"),
            ElementType::U8 => f.write_str("u8"),
            ElementType::I8 => f.write_str("i8"),
            ElementType::U16 => f.write_str("u16"),
            ElementType::I16 => f.write_str("i16"),
            ElementType::U32 => f.write_str("u32"),
            ElementType::I32 => f.write_str("i32"),
            ElementType::U64 => f.write_str("u64"),
            ElementType::I64 => f.write_str("i64"),
            ElementType::F16 => f.write_str("f16"),
            ElementType::F32 => f.write_str("f32"),
            ElementType::F64 => f.write_str("f64"),
            ElementType::Complex64 => f.write_str("complex64"),
            ElementType::Complex128 => f.write_str("complex128"),
            ElementType::Bytes(n) => write!(f, "bytes[{n}]"),
            ElementType::Unicode(n) => write!(f, "unicode[{n}]"),
        }
    }
}

/// A binary-table format code: repeat count and type letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatCode {
    pub repeat: usize,
    pub code: char,
}

impl FormatCode {
    pub fn new(repeat: usize, code: char) -> Self {
        FormatCode { repeat, code }
    }

    /// Parse a TFORMn value such as `D`, `5D`, `16A` or `1PE(12)`.
    ///
    /// Returns `None` when the letter is outside [`FORMAT_CODE_ALPHABET`].
    pub fn parse(s: &str) -> Option<FormatCode> {
        let s = s.trim();
        let digits = s.bytes().take_while(u8::is_ascii_digit).count();
        let repeat = if digits == 0 {
            1
        } else {
            s[..digits].parse().ok()?
        };
        let mut rest = s[digits..].chars();
        let code = rest.next()?;
        if !FORMAT_CODE_ALPHABET.contains(&code) {
            return None;
        }
        // Only variable-length descriptors carry anything after the letter.
        let tail = rest.as_str();
        if !tail.is_empty() && !matches!(code, 'P' | 'Q') {
            return None;
        }
        Some(FormatCode { repeat, code })
    }
}

impl fmt::Display for FormatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.repeat == 1 {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}{}", self.repeat, self.code)
        }
    }
}

/// An element type (or format code) with no counterpart on the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedType {
    pub element: String,
}

impl fmt::Display for UnsupportedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported element type {}", self.element)
    }
}

impl std::error::Error for UnsupportedType {}

fn unsupported(element: impl fmt::Display) -> UnsupportedType {
    UnsupportedType {
        element: element.to_string(),
    }
}

/// Number of elements in one cell of a column shaped `[rows, d1, ...]`.
pub fn cell_len(shape: &[usize]) -> usize {
    shape.iter().skip(1).product()
}

/// Format code for a column of `element` values shaped `[rows, d1, ...]`.
///
/// The repeat count is the cell element count, so `[N]` and `[N, 1]` both
/// give a bare letter and `[N, 5]` gives `5D`. Byte strings multiply their
/// width into the repeat count.
pub fn encode(element: ElementType, shape: &[usize]) -> Result<FormatCode, UnsupportedType> {
    let cell = cell_len(shape);
    let code = match element {
        ElementType::Bytes(0) | ElementType::Unicode(_) => return Err(unsupported(element)),
        ElementType::Bytes(width) => return Ok(FormatCode::new(width * cell, 'A')),
        ElementType::Bool => 'L',
        ElementType::U8 => 'B',
        ElementType::I8 | ElementType::I16 => 'I',
        ElementType::U16 | ElementType::I32 => 'J',
        ElementType::U32 | ElementType::U64 | ElementType::I64 => 'K',
        ElementType::F16 | ElementType::F32 => 'E',
        ElementType::F64 => 'D',
        ElementType::Complex64 => 'C',
        ElementType::Complex128 => 'M',
    };
    Ok(FormatCode::new(cell, code))
}

/// Element type and per-row element count stored by a format code.
///
/// This is the lossy inverse of [`encode`]: widened types come back wide
/// (`J` is `i32`, never `u16`). An `A` column is one string per row whose
/// width is the repeat count. Variable-length descriptors are rejected.
pub fn decode(format: FormatCode) -> Result<(ElementType, usize), UnsupportedType> {
    let element = match format.code {
        'L' | 'X' => ElementType::Bool,
        'B' => ElementType::U8,
        'I' => ElementType::I16,
        'J' => ElementType::I32,
        'K' => ElementType::I64,
        'E' => ElementType::F32,
        'D' => ElementType::F64,
        'C' => ElementType::Complex64,
        'M' => ElementType::Complex128,
        'A' => return Ok((ElementType::Bytes(format.repeat), 1)),
        other => return Err(unsupported(format_args!("variable-length array ({other})"))),
    };
    Ok((element, format.repeat))
}

/// TZEROn written alongside the format code, if any.
pub fn column_offset(element: ElementType) -> Option<f64> {
    match element {
        ElementType::U64 => Some(U64_OFFSET),
        _ => None,
    }
}

/// BITPIX used to store an image of `element` pixels.
///
/// The narrow or unsigned integer types share a BITPIX with their signed
/// counterparts and carry a BZERO offset; `f16` is widened.
pub fn image_bitpix(element: ElementType) -> Result<i64, UnsupportedType> {
    Ok(match element {
        ElementType::U8 | ElementType::I8 => 8,
        ElementType::I16 | ElementType::U16 => 16,
        ElementType::I32 | ElementType::U32 => 32,
        ElementType::I64 | ElementType::U64 => 64,
        ElementType::F16 | ElementType::F32 => -32,
        ElementType::F64 => -64,
        other => return Err(unsupported(other)),
    })
}
