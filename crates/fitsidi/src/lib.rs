//! Lossless translation between FITS files and a hierarchical container
//! model of named units holding headers, n-dimensional arrays and tables.
//!
//! ```no_run
//! use fitsidi::{read, write, Verbosity};
//!
//! let units = read("in.fits", Verbosity::SILENT)?;
//! for (name, unit) in units.iter() {
//!     println!("{name}: {}", unit.kind());
//! }
//! write(&units, "out.fits", Verbosity::SILENT)?;
//! # Ok::<(), fitsidi::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod header;
pub mod idi;
pub mod import;
pub mod typecode;
pub mod units;

pub use fitsidi_codec as codec;

pub use config::{ReservedKeywords, Verbosity};
pub use error::{Error, Result};
pub use export::{build, build_with, write, write_with};
pub use header::{parse_header, write_header, HeaderEntry, HeaderValue, IdiHeader};
pub use idi::{ArrayData, IdiColumn, IdiHdu, IdiHduList, IdiImageHdu, IdiPrimaryHdu, IdiTableHdu};
pub use import::{classify, read, read_bytes, read_bytes_with, read_with, UnitKind};
pub use typecode::{ElementType, FormatCode, UnsupportedType, FORMAT_CODE_ALPHABET};
pub use units::{from_foreign, to_foreign, Unit};
