//! A FITS codec covering images, binary and ASCII tables, random groups,
//! tile-compressed images and CHECKSUM/DATASUM, exposed through
//! [`FitsFile`] for reading and [`FitsDocument`] for writing.

pub mod asciitable;
pub mod bintable;
pub mod block;
pub mod checksum;
pub mod document;
pub mod error;
pub mod fix;
pub mod groups;
pub mod hdu;
pub mod header;
pub mod image;
pub mod tiled;
pub mod value;

pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use document::{ChecksumStatus, DocumentHdu, FitsDocument, FitsFile, HduData, WriteOptions};
pub use error::{Error, Result};
pub use header::Card;
pub use value::Value;
