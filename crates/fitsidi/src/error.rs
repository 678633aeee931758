use core::fmt;

/// All errors raised while translating between FITS and the container model.
#[derive(Debug)]
pub enum Error {
    /// The FITS codec rejected the file or document.
    Fits(fitsidi_codec::Error),
    /// Reading or writing the file failed.
    Io(std::io::Error),
    /// An element type with no FITS representation.
    UnsupportedType {
        unit: String,
        column: Option<String>,
        element: String,
    },
    /// A unit name was inserted twice.
    DuplicateUnit(String),
    /// A column name was added twice to one table.
    DuplicateColumn(String),
    /// A column whose row count differs from the rest of its table.
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },
    /// Array data does not fit the declared shape.
    Shape(String),
    /// Unit names must be non-empty.
    InvalidUnitName,
    /// An error raised while translating the named unit.
    InUnit { unit: String, source: Box<Error> },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Attach the name of the unit being translated, once.
    pub(crate) fn in_unit(self, unit: &str) -> Error {
        match self {
            Error::InUnit { .. } | Error::UnsupportedType { .. } => self,
            other => Error::InUnit {
                unit: unit.to_string(),
                source: Box::new(other),
            },
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Fits(e) => write!(f, "FITS error: {e}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::UnsupportedType {
                unit,
                column: Some(column),
                element,
            } => write!(
                f,
                "column {column:?} of unit {unit:?} has element type {element}, which has no FITS format code"
            ),
            Error::UnsupportedType {
                unit,
                column: None,
                element,
            } => write!(f, "unit {unit:?} has element type {element}, which has no FITS BITPIX"),
            Error::DuplicateUnit(name) => write!(f, "duplicate unit name {name:?}"),
            Error::DuplicateColumn(name) => write!(f, "duplicate column name {name:?}"),
            Error::ColumnLength {
                column,
                expected,
                found,
            } => write!(f, "column {column:?} has {found} rows, expected {expected}"),
            Error::Shape(why) => write!(f, "array shape mismatch: {why}"),
            Error::InvalidUnitName => write!(f, "unit names must not be empty"),
            Error::InUnit { unit, source } => write!(f, "in unit {unit:?}: {source}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Fits(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::InUnit { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<fitsidi_codec::Error> for Error {
    fn from(e: fitsidi_codec::Error) -> Self {
        match e {
            fitsidi_codec::Error::Io(io) => Error::Io(io),
            other => Error::Fits(other),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::Shape(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_names_the_offending_column() {
        let e = Error::UnsupportedType {
            unit: "EVENTS".into(),
            column: Some("LABEL".into()),
            element: "unicode[4]".into(),
        };
        let text = e.to_string();
        assert!(text.contains("LABEL"));
        assert!(text.contains("EVENTS"));
        assert!(text.contains("unicode[4]"));
    }

    #[test]
    fn in_unit_wraps_once() {
        let e = Error::DuplicateColumn("X".into()).in_unit("A").in_unit("B");
        match &e {
            Error::InUnit { unit, source } => {
                assert_eq!(unit, "A");
                assert!(matches!(**source, Error::DuplicateColumn(_)));
            }
            other => panic!("expected InUnit, got {other:?}"),
        }
        assert!(e.source().is_some());
    }

    #[test]
    fn codec_and_io_errors_convert() {
        let e: Error = fitsidi_codec::Error::UnexpectedEof.into();
        assert!(matches!(e, Error::Fits(_)));
        assert!(e.source().is_some());

        let e: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(e.to_string().contains("gone"));

        let e: Error = fitsidi_codec::Error::Io(std::io::Error::other("disk")).into();
        assert!(matches!(e, Error::Io(_)));
    }
}
