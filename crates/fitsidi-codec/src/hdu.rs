//! Walking a FITS byte stream HDU by HDU.

use crate::block::{padded_byte_len, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::header::{card_integer, card_logical, card_string, parse_header_blocks, Card};

/// Describes the kind and shape of data in a single HDU.
#[derive(Debug, Clone, PartialEq)]
pub enum HduInfo {
    /// Primary HDU, possibly without data (`NAXIS = 0`).
    Primary {
        /// BITPIX value (8, 16, 32, 64, -32, -64).
        bitpix: i64,
        /// Axis dimensions (NAXIS1, NAXIS2, ...).
        naxes: Vec<usize>,
    },
    /// Image extension (XTENSION = 'IMAGE').
    Image { bitpix: i64, naxes: Vec<usize> },
    /// ASCII table extension (XTENSION = 'TABLE').
    AsciiTable {
        /// Row width in bytes.
        naxis1: usize,
        /// Number of rows.
        naxis2: usize,
        tfields: usize,
    },
    /// Binary table extension (XTENSION = 'BINTABLE').
    BinaryTable {
        naxis1: usize,
        naxis2: usize,
        /// Size of the heap in bytes.
        pcount: usize,
        tfields: usize,
    },
    /// Random groups structure (primary HDU with GROUPS=T, NAXIS1=0).
    RandomGroups {
        bitpix: i64,
        /// Group array dimensions (NAXIS2..NAXISm).
        naxes: Vec<usize>,
        /// Number of parameters per group.
        pcount: usize,
        /// Number of groups.
        gcount: usize,
    },
    /// Tile-compressed image stored as a binary table (ZIMAGE=T).
    CompressedImage {
        /// Original image BITPIX before compression.
        zbitpix: i64,
        /// Original image dimensions.
        znaxes: Vec<usize>,
        /// Compression algorithm name (e.g. "GZIP_1").
        zcmptype: String,
        /// Tile dimensions, one per image axis.
        ztile: Vec<usize>,
        naxis1: usize,
        /// Number of tiles.
        naxis2: usize,
        pcount: usize,
        tfields: usize,
    },
}

/// A single Header Data Unit parsed from a FITS byte stream.
#[derive(Debug, Clone)]
pub struct Hdu {
    pub info: HduInfo,
    /// Byte offset where the header begins in the FITS stream.
    pub header_start: usize,
    /// Byte offset where the data segment begins.
    pub data_start: usize,
    /// Length of the data segment in bytes (unpadded).
    pub data_len: usize,
    pub cards: Vec<Card>,
}

impl Hdu {
    /// The HDU name: EXTNAME when present and non-blank, otherwise
    /// `PRIMARY` for the first HDU of a file.
    pub fn name(&self, index: usize) -> Option<String> {
        match card_string(&self.cards, "EXTNAME") {
            Some(name) if !name.is_empty() => Some(name),
            _ if index == 0 => Some("PRIMARY".to_string()),
            _ => None,
        }
    }

    /// The raw (unpadded) data segment of this HDU within `fits_data`.
    pub fn data<'a>(&self, fits_data: &'a [u8]) -> Result<&'a [u8]> {
        fits_data
            .get(self.data_start..self.data_start + self.data_len)
            .ok_or(Error::UnexpectedEof)
    }
}

/// A collection of HDUs parsed from a complete FITS file.
#[derive(Debug, Clone)]
pub struct FitsData {
    /// All HDUs in the file, with the primary HDU at index 0.
    pub hdus: Vec<Hdu>,
}

impl FitsData {
    pub fn get(&self, index: usize) -> Option<&Hdu> {
        self.hdus.get(index)
    }

    pub fn len(&self) -> usize {
        self.hdus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hdus.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hdu> {
        self.hdus.iter()
    }
}

fn required(cards: &[Card], keyword: &'static str) -> Result<i64> {
    card_integer(cards, keyword).ok_or(Error::MissingKeyword(keyword))
}

fn required_usize(cards: &[Card], keyword: &'static str) -> Result<usize> {
    let v = required(cards, keyword)?;
    usize::try_from(v).map_err(|_| Error::InvalidValue("negative size keyword"))
}

/// Read `{prefix}1 .. {prefix}n` as axis lengths.
fn read_axes(cards: &[Card], prefix: &str, n: usize) -> Result<Vec<usize>> {
    (1..=n)
        .map(|i| {
            card_integer(cards, &format!("{prefix}{i}"))
                .ok_or(Error::MissingKeyword("NAXISn"))
                .and_then(|v| {
                    usize::try_from(v).map_err(|_| Error::InvalidValue("negative axis length"))
                })
        })
        .collect()
}

fn product(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(Error::InvalidHeader("axis product overflow"))
}

fn is_random_groups(cards: &[Card], naxes: &[usize]) -> bool {
    naxes.first() == Some(&0) && card_logical(cards, "GROUPS") == Some(true)
}

fn compute_data_byte_len(cards: &[Card], is_primary: bool) -> Result<usize> {
    let bitpix = required(cards, "BITPIX")?;
    let naxis = required_usize(cards, "NAXIS")?;
    if naxis == 0 {
        return Ok(0);
    }
    let bytes_per_value = (bitpix.unsigned_abs() as usize) / 8;
    let naxes = read_axes(cards, "NAXIS", naxis)?;

    if is_primary && is_random_groups(cards, &naxes) {
        let pcount = required_usize(cards, "PCOUNT")?;
        let gcount = required_usize(cards, "GCOUNT")?;
        let group = pcount
            .checked_add(product(&naxes[1..])?)
            .ok_or(Error::InvalidHeader("random groups size overflow"))?;
        return bytes_per_value
            .checked_mul(gcount)
            .and_then(|v| v.checked_mul(group))
            .ok_or(Error::InvalidHeader("random groups size overflow"));
    }

    let (pcount, gcount) = if is_primary {
        (0, 1)
    } else {
        let pcount = card_integer(cards, "PCOUNT").unwrap_or(0).max(0) as usize;
        let gcount = card_integer(cards, "GCOUNT").unwrap_or(1).max(1) as usize;
        (pcount, gcount)
    };

    product(&naxes)?
        .checked_mul(bytes_per_value)
        .and_then(|v| v.checked_add(pcount))
        .and_then(|v| v.checked_mul(gcount))
        .ok_or(Error::InvalidHeader("data size overflow"))
}

fn parse_hdu_info(cards: &[Card], is_primary: bool) -> Result<HduInfo> {
    if is_primary {
        let bitpix = required(cards, "BITPIX")?;
        let naxis = required_usize(cards, "NAXIS")?;
        let naxes = read_axes(cards, "NAXIS", naxis)?;
        if is_random_groups(cards, &naxes) {
            return Ok(HduInfo::RandomGroups {
                bitpix,
                naxes: naxes[1..].to_vec(),
                pcount: required_usize(cards, "PCOUNT")?,
                gcount: required_usize(cards, "GCOUNT")?,
            });
        }
        return Ok(HduInfo::Primary { bitpix, naxes });
    }

    let xtension = card_string(cards, "XTENSION").ok_or(Error::MissingKeyword("XTENSION"))?;
    match xtension.as_str() {
        "IMAGE" | "IUEIMAGE" => {
            let bitpix = required(cards, "BITPIX")?;
            let naxis = required_usize(cards, "NAXIS")?;
            let naxes = read_axes(cards, "NAXIS", naxis)?;
            Ok(HduInfo::Image { bitpix, naxes })
        }
        "TABLE" => Ok(HduInfo::AsciiTable {
            naxis1: required_usize(cards, "NAXIS1")?,
            naxis2: required_usize(cards, "NAXIS2")?,
            tfields: required_usize(cards, "TFIELDS")?,
        }),
        "BINTABLE" | "A3DTABLE" => {
            let naxis1 = required_usize(cards, "NAXIS1")?;
            let naxis2 = required_usize(cards, "NAXIS2")?;
            let pcount = card_integer(cards, "PCOUNT").unwrap_or(0).max(0) as usize;
            let tfields = required_usize(cards, "TFIELDS")?;

            if card_logical(cards, "ZIMAGE") != Some(true) {
                return Ok(HduInfo::BinaryTable {
                    naxis1,
                    naxis2,
                    pcount,
                    tfields,
                });
            }

            let zbitpix = required(cards, "ZBITPIX")?;
            let znaxis = required_usize(cards, "ZNAXIS")?;
            let znaxes = read_axes(cards, "ZNAXIS", znaxis)?;
            let zcmptype =
                card_string(cards, "ZCMPTYPE").ok_or(Error::MissingKeyword("ZCMPTYPE"))?;
            let ztile = (1..=znaxis)
                .map(|i| {
                    let default = if i == 1 { znaxes[0] } else { 1 };
                    card_integer(cards, &format!("ZTILE{i}"))
                        .map(|v| v.max(1) as usize)
                        .unwrap_or(default)
                })
                .collect();
            Ok(HduInfo::CompressedImage {
                zbitpix,
                znaxes,
                zcmptype,
                ztile,
                naxis1,
                naxis2,
                pcount,
                tfields,
            })
        }
        other => Err(Error::UnsupportedExtension(other.to_string())),
    }
}

/// Parse a complete FITS byte stream into a [`FitsData`] containing all HDUs.
///
/// Trailing bytes that do not form a valid extension header are ignored once
/// at least one HDU has been read.
pub fn parse_fits(data: &[u8]) -> Result<FitsData> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let mut hdus = Vec::new();
    let mut offset = 0usize;

    while data.len().saturating_sub(offset) >= BLOCK_SIZE {
        let remaining = &data[offset..];
        let first = hdus.is_empty();

        let (cards, header_len) = match parse_header_blocks(remaining) {
            Ok(parsed) => parsed,
            Err(_) if !first => break,
            Err(e) => return Err(e),
        };

        let is_primary = first && cards.first().map(|c| c.keyword.as_str()) == Some("SIMPLE");
        if first && !is_primary {
            return Err(Error::InvalidHeader("first HDU must be primary"));
        }

        let info = match parse_hdu_info(&cards, is_primary) {
            Ok(info) => info,
            Err(_) if !first => break,
            Err(e) => return Err(e),
        };
        let data_len = compute_data_byte_len(&cards, is_primary)?;
        let data_start = offset + header_len;

        // Trailing block padding may be missing; the data itself may not.
        if data_start + data_len > data.len() {
            return Err(Error::UnexpectedEof);
        }

        hdus.push(Hdu {
            info,
            header_start: offset,
            data_start,
            data_len,
            cards,
        });
        offset = data_start + padded_byte_len(data_len);
    }

    Ok(FitsData { hdus })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::serialize_header;
    use crate::value::Value;

    fn header(cards: &[(&str, Value)]) -> Vec<u8> {
        let cards: Vec<Card> = cards
            .iter()
            .map(|(k, v)| Card::new(*k, v.clone()))
            .collect();
        serialize_header(&cards).unwrap()
    }

    fn empty_primary() -> Vec<u8> {
        header(&[
            ("SIMPLE", Value::Logical(true)),
            ("BITPIX", Value::Integer(8)),
            ("NAXIS", Value::Integer(0)),
        ])
    }

    #[test]
    fn single_empty_primary() {
        let fits = parse_fits(&empty_primary()).unwrap();
        assert_eq!(fits.len(), 1);
        assert_eq!(
            fits.hdus[0].info,
            HduInfo::Primary {
                bitpix: 8,
                naxes: vec![]
            }
        );
        assert_eq!(fits.hdus[0].data_len, 0);
        assert_eq!(fits.hdus[0].name(0).as_deref(), Some("PRIMARY"));
    }

    #[test]
    fn primary_then_image_extension() {
        let mut bytes = empty_primary();
        bytes.extend(header(&[
            ("XTENSION", Value::String("IMAGE".into())),
            ("BITPIX", Value::Integer(16)),
            ("NAXIS", Value::Integer(2)),
            ("NAXIS1", Value::Integer(3)),
            ("NAXIS2", Value::Integer(2)),
            ("PCOUNT", Value::Integer(0)),
            ("GCOUNT", Value::Integer(1)),
            ("EXTNAME", Value::String("SCI".into())),
        ]));
        bytes.extend(vec![0u8; BLOCK_SIZE]);

        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(fits.len(), 2);
        let ext = &fits.hdus[1];
        assert_eq!(
            ext.info,
            HduInfo::Image {
                bitpix: 16,
                naxes: vec![3, 2]
            }
        );
        assert_eq!(ext.data_len, 12);
        assert_eq!(ext.data_start, 2 * BLOCK_SIZE);
        assert_eq!(ext.name(1).as_deref(), Some("SCI"));
        assert_eq!(ext.data(&bytes).unwrap().len(), 12);
    }

    #[test]
    fn unnamed_extension_has_no_name() {
        let mut bytes = empty_primary();
        bytes.extend(header(&[
            ("XTENSION", Value::String("IMAGE".into())),
            ("BITPIX", Value::Integer(8)),
            ("NAXIS", Value::Integer(0)),
        ]));
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(fits.hdus[1].name(1), None);
    }

    #[test]
    fn random_groups_detected() {
        let bytes = {
            let mut b = header(&[
                ("SIMPLE", Value::Logical(true)),
                ("BITPIX", Value::Integer(-32)),
                ("NAXIS", Value::Integer(3)),
                ("NAXIS1", Value::Integer(0)),
                ("NAXIS2", Value::Integer(3)),
                ("NAXIS3", Value::Integer(2)),
                ("GROUPS", Value::Logical(true)),
                ("PCOUNT", Value::Integer(2)),
                ("GCOUNT", Value::Integer(4)),
            ]);
            b.extend(vec![0u8; BLOCK_SIZE]);
            b
        };
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(
            fits.hdus[0].info,
            HduInfo::RandomGroups {
                bitpix: -32,
                naxes: vec![3, 2],
                pcount: 2,
                gcount: 4
            }
        );
        assert_eq!(fits.hdus[0].data_len, 4 * 4 * (2 + 6));
    }

    #[test]
    fn compressed_image_detected_with_default_tiles() {
        let mut bytes = empty_primary();
        bytes.extend(header(&[
            ("XTENSION", Value::String("BINTABLE".into())),
            ("BITPIX", Value::Integer(8)),
            ("NAXIS", Value::Integer(2)),
            ("NAXIS1", Value::Integer(8)),
            ("NAXIS2", Value::Integer(0)),
            ("PCOUNT", Value::Integer(0)),
            ("GCOUNT", Value::Integer(1)),
            ("TFIELDS", Value::Integer(1)),
            ("TFORM1", Value::String("1PB(0)".into())),
            ("ZIMAGE", Value::Logical(true)),
            ("ZBITPIX", Value::Integer(16)),
            ("ZNAXIS", Value::Integer(2)),
            ("ZNAXIS1", Value::Integer(10)),
            ("ZNAXIS2", Value::Integer(5)),
            ("ZCMPTYPE", Value::String("GZIP_1".into())),
        ]));
        let fits = parse_fits(&bytes).unwrap();
        match &fits.hdus[1].info {
            HduInfo::CompressedImage { ztile, znaxes, .. } => {
                assert_eq!(znaxes, &vec![10, 5]);
                assert_eq!(ztile, &vec![10, 1]);
            }
            other => panic!("expected compressed image, got {other:?}"),
        }
    }

    #[test]
    fn first_hdu_must_be_primary() {
        let bytes = header(&[
            ("XTENSION", Value::String("IMAGE".into())),
            ("BITPIX", Value::Integer(8)),
            ("NAXIS", Value::Integer(0)),
        ]);
        assert!(matches!(parse_fits(&bytes), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn truncated_data_is_eof() {
        let mut bytes = header(&[
            ("SIMPLE", Value::Logical(true)),
            ("BITPIX", Value::Integer(8)),
            ("NAXIS", Value::Integer(1)),
            ("NAXIS1", Value::Integer(100)),
        ]);
        bytes.extend(vec![0u8; 10]);
        assert!(matches!(parse_fits(&bytes), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn unknown_extension_stops_after_primary() {
        let mut bytes = empty_primary();
        bytes.extend(header(&[
            ("XTENSION", Value::String("FOREIGN".into())),
            ("BITPIX", Value::Integer(8)),
            ("NAXIS", Value::Integer(0)),
        ]));
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(fits.len(), 1);
    }

    #[test]
    fn short_input_is_eof() {
        assert!(matches!(parse_fits(&[]), Err(Error::UnexpectedEof)));
    }
}
