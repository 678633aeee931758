//! File-level reading and writing.
//!
//! [`FitsFile`] owns the bytes of an existing file and decodes HDUs on
//! demand. [`FitsDocument`] is an ordered list of HDUs built in memory and
//! serialized in one pass, generating every structural keyword itself.

use std::path::Path;

use log::debug;

use crate::asciitable::read_ascii_table;
use crate::bintable::{read_binary_table, scale_value, Table};
use crate::block::{pad_to_block, DATA_PAD_BYTE};
use crate::checksum::{stamp_checksum, verify_checksum, verify_datasum};
use crate::error::{Error, Result};
use crate::fix::fix_cards;
use crate::groups::read_random_groups;
use crate::hdu::{parse_fits, FitsData, Hdu, HduInfo};
use crate::header::{format_card, serialize_header, Card};
use crate::image::{encode_pixels, read_image, ImageData, Scaling};
use crate::value::Value;

// ── Reading ──

/// An opened FITS file.
#[derive(Debug, Clone)]
pub struct FitsFile {
    bytes: Vec<u8>,
    fits: FitsData,
}

/// Outcome of checking the CHECKSUM and DATASUM keywords of one HDU.
/// `None` means the keyword is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumStatus {
    pub checksum: Option<bool>,
    pub datasum: Option<bool>,
}

impl FitsFile {
    /// Read and parse the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<FitsFile> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        debug!("read {} bytes from {}", bytes.len(), path.display());
        FitsFile::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<FitsFile> {
        let fits = parse_fits(&bytes)?;
        Ok(FitsFile { bytes, fits })
    }

    pub fn hdus(&self) -> &[Hdu] {
        &self.fits.hdus
    }

    pub fn hdu(&self, index: usize) -> Result<&Hdu> {
        self.fits
            .get(index)
            .ok_or(Error::InvalidValue("HDU index out of range"))
    }

    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw pixels of an image HDU (primary, IMAGE or tile-compressed).
    pub fn read_image(&self, index: usize) -> Result<ImageData> {
        read_image(&self.bytes, self.hdu(index)?)
    }

    /// Rows of a binary table, ASCII table or random-groups HDU.
    pub fn read_table(&self, index: usize) -> Result<Table> {
        let hdu = self.hdu(index)?;
        match hdu.info {
            HduInfo::BinaryTable { .. } => read_binary_table(&self.bytes, hdu),
            HduInfo::AsciiTable { .. } => read_ascii_table(&self.bytes, hdu),
            HduInfo::RandomGroups { .. } => read_random_groups(&self.bytes, hdu),
            _ => Err(Error::InvalidHeader("not a table HDU")),
        }
    }

    pub fn verify_checksums(&self, index: usize) -> Result<ChecksumStatus> {
        let hdu = self.hdu(index)?;
        Ok(ChecksumStatus {
            checksum: verify_checksum(&self.bytes, hdu),
            datasum: verify_datasum(&self.bytes, hdu),
        })
    }
}

// ── Writing ──

/// Options applied by [`FitsDocument::to_bytes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Stamp CHECKSUM and DATASUM on every HDU.
    pub checksum: bool,
    /// Normalise user cards with [`crate::fix::fix_cards`] before writing.
    pub fix: bool,
}

/// The payload of an HDU to be written.
#[derive(Debug, Clone, PartialEq)]
pub enum HduData {
    /// No data (`NAXIS = 0`).
    Empty,
    /// An image; `naxes` lists NAXIS1 first.
    Image {
        naxes: Vec<usize>,
        data: ImageData,
        scaling: Option<Scaling>,
    },
    BinaryTable(Table),
}

/// An HDU to be written: name, user cards and data.
///
/// Structural keywords (SIMPLE, XTENSION, BITPIX, NAXISn, PCOUNT, GCOUNT,
/// TFIELDS, column keywords, EXTNAME) are generated from `name` and `data`;
/// user cards with the same keyword are not written.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentHdu {
    pub name: Option<String>,
    pub cards: Vec<Card>,
    pub data: HduData,
}

impl DocumentHdu {
    pub fn new(name: Option<String>, data: HduData) -> Self {
        DocumentHdu {
            name,
            cards: Vec::new(),
            data,
        }
    }

    /// Structural cards for this HDU at position `index`.
    fn structural_cards(&self, index: usize) -> Result<Vec<Card>> {
        let (bitpix, naxes) = match &self.data {
            HduData::Empty => (8, Vec::new()),
            HduData::Image { naxes, data, .. } => {
                let expected: usize = if naxes.is_empty() {
                    0
                } else {
                    naxes.iter().product()
                };
                if expected != data.len() {
                    return Err(Error::InvalidValue("image shape does not match pixel count"));
                }
                (data.bitpix(), naxes.clone())
            }
            HduData::BinaryTable(table) => {
                if index == 0 {
                    return Err(Error::InvalidHeader("a binary table cannot be the primary HDU"));
                }
                let mut cards = table.header_cards()?;
                cards.extend(self.extname_card(index));
                return Ok(cards);
            }
        };

        let mut cards = if index == 0 {
            vec![Card::new("SIMPLE", Value::Logical(true)).with_comment("conforms to FITS standard")]
        } else {
            vec![Card::new("XTENSION", Value::String("IMAGE".into()))
                .with_comment("image extension")]
        };
        cards.push(Card::new("BITPIX", Value::Integer(bitpix)));
        cards.push(Card::new("NAXIS", Value::Integer(naxes.len() as i64)));
        for (i, n) in naxes.iter().enumerate() {
            cards.push(Card::new(format!("NAXIS{}", i + 1), Value::Integer(*n as i64)));
        }
        if index == 0 {
            cards.push(Card::new("EXTEND", Value::Logical(true)));
        } else {
            cards.push(Card::new("PCOUNT", Value::Integer(0)));
            cards.push(Card::new("GCOUNT", Value::Integer(1)));
        }
        if let HduData::Image {
            scaling: Some(scaling),
            ..
        } = &self.data
        {
            cards.push(Card::new("BSCALE", scale_value(scaling.bscale)));
            cards.push(Card::new("BZERO", scale_value(scaling.bzero)));
        }
        cards.extend(self.extname_card(index));
        Ok(cards)
    }

    fn extname_card(&self, index: usize) -> Option<Card> {
        let name = self.name.as_deref().filter(|n| !n.is_empty())?;
        if index == 0 && name == "PRIMARY" {
            return None;
        }
        Some(Card::new("EXTNAME", Value::String(name.to_string())).with_comment("extension name"))
    }

    /// Check that this HDU can be written as an extension under `options`:
    /// every card formats and the data encodes.
    pub fn verify(&self, options: &WriteOptions) -> Result<()> {
        self.structural_cards(1)?;
        let user = if options.fix {
            fix_cards(&self.cards)
        } else {
            self.cards.clone()
        };
        for card in &user {
            format_card(card)?;
        }
        self.data_bytes().map(|_| ())
    }

    fn data_bytes(&self) -> Result<Vec<u8>> {
        match &self.data {
            HduData::Empty => Ok(Vec::new()),
            HduData::Image { data, .. } => Ok(encode_pixels(data)),
            HduData::BinaryTable(table) => table.encode(),
        }
    }

    fn to_bytes(&self, index: usize, options: &WriteOptions) -> Result<Vec<u8>> {
        let mut cards = self.structural_cards(index)?;
        let user = if options.fix {
            fix_cards(&self.cards)
        } else {
            self.cards.clone()
        };
        for card in user {
            let generated = cards.iter().any(|c| c.keyword == card.keyword);
            let managed = options.checksum && matches!(card.keyword.as_str(), "CHECKSUM" | "DATASUM");
            if card.keyword == "END" || (!card.is_commentary() && generated) || managed {
                debug!("not writing user card {} in HDU {index}", card.keyword);
                continue;
            }
            cards.push(card);
        }

        let data = self.data_bytes()?;
        if options.checksum {
            cards = stamp_checksum(&cards, &data)?;
        }
        let mut bytes = serialize_header(&cards)?;
        bytes.extend_from_slice(&data);
        pad_to_block(&mut bytes, DATA_PAD_BYTE);
        Ok(bytes)
    }
}

/// An ordered list of HDUs to be written as one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsDocument {
    hdus: Vec<DocumentHdu>,
}

impl FitsDocument {
    pub fn new() -> Self {
        FitsDocument::default()
    }

    pub fn push(&mut self, hdu: DocumentHdu) {
        self.hdus.push(hdu);
    }

    /// Insert at `index`, shifting later HDUs back.
    pub fn insert(&mut self, index: usize, hdu: DocumentHdu) {
        self.hdus.insert(index, hdu);
    }

    pub fn hdus(&self) -> &[DocumentHdu] {
        &self.hdus
    }

    pub fn hdus_mut(&mut self) -> &mut Vec<DocumentHdu> {
        &mut self.hdus
    }

    pub fn len(&self) -> usize {
        self.hdus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hdus.is_empty()
    }

    /// Serialize every HDU. An empty document becomes a lone empty primary.
    pub fn to_bytes(&self, options: &WriteOptions) -> Result<Vec<u8>> {
        if self.hdus.is_empty() {
            return DocumentHdu::new(None, HduData::Empty).to_bytes(0, options);
        }
        let mut out = Vec::new();
        for (index, hdu) in self.hdus.iter().enumerate() {
            out.extend(hdu.to_bytes(index, options)?);
        }
        Ok(out)
    }

    pub fn write_to(&self, path: impl AsRef<Path>, options: &WriteOptions) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes(options)?;
        std::fs::write(path, &bytes)?;
        debug!("wrote {} HDUs ({} bytes) to {}", self.len(), bytes.len(), path.display());
        Ok(())
    }
}
