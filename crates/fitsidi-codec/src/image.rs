//! Image pixel decoding and encoding.

use bytemuck::pod_collect_to_vec;

use crate::error::{Error, Result};
use crate::hdu::{Hdu, HduInfo};
use crate::header::{card_float, Card};

/// Pixel data decoded from an image HDU, in FITS storage order (NAXIS1
/// varies fastest).
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ImageData {
    /// The BITPIX value matching this pixel type.
    pub fn bitpix(&self) -> i64 {
        match self {
            ImageData::U8(_) => 8,
            ImageData::I16(_) => 16,
            ImageData::I32(_) => 32,
            ImageData::I64(_) => 64,
            ImageData::F32(_) => -32,
            ImageData::F64(_) => -64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ImageData::U8(v) => v.len(),
            ImageData::I16(v) => v.len(),
            ImageData::I32(v) => v.len(),
            ImageData::I64(v) => v.len(),
            ImageData::F32(v) => v.len(),
            ImageData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Linear pixel scaling from BSCALE/BZERO: `physical = bzero + bscale * raw`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub bscale: f64,
    pub bzero: f64,
}

impl Scaling {
    /// Read BSCALE/BZERO; `None` when neither keyword is present.
    pub fn from_cards(cards: &[Card]) -> Option<Scaling> {
        let bscale = card_float(cards, "BSCALE");
        let bzero = card_float(cards, "BZERO");
        if bscale.is_none() && bzero.is_none() {
            return None;
        }
        Some(Scaling {
            bscale: bscale.unwrap_or(1.0),
            bzero: bzero.unwrap_or(0.0),
        })
    }

    /// The offset that stores unsigned (or, for BITPIX 8, signed) integers
    /// in the native FITS integer type of `bitpix`.
    pub fn unsigned(bitpix: i64) -> Option<Scaling> {
        let bzero = match bitpix {
            8 => -128.0,
            16 => 32_768.0,
            32 => 2_147_483_648.0,
            64 => 9_223_372_036_854_775_808.0,
            _ => return None,
        };
        Some(Scaling { bscale: 1.0, bzero })
    }

    /// Returns `true` if this scaling is exactly the integer offset
    /// convention for `bitpix`.
    pub fn is_unsigned_offset(&self, bitpix: i64) -> bool {
        Scaling::unsigned(bitpix) == Some(*self)
    }
}

/// Returns the number of bytes per pixel for a BITPIX value.
pub fn bytes_per_pixel(bitpix: i64) -> Result<usize> {
    match bitpix {
        8 => Ok(1),
        16 => Ok(2),
        32 | -32 => Ok(4),
        64 | -64 => Ok(8),
        _ => Err(Error::InvalidBitpix(bitpix)),
    }
}

/// Decode a big-endian byte slice into an `ImageData` variant based on BITPIX.
pub fn decode_pixels(raw: &[u8], bitpix: i64) -> Result<ImageData> {
    let bpp = bytes_per_pixel(bitpix)?;
    if raw.len() % bpp != 0 {
        return Err(Error::InvalidValue("pixel data is not a whole number of pixels"));
    }
    Ok(match bitpix {
        8 => ImageData::U8(raw.to_vec()),
        16 => {
            let pixels: Vec<i16> = pod_collect_to_vec(raw);
            ImageData::I16(pixels.into_iter().map(i16::from_be).collect())
        }
        32 => {
            let pixels: Vec<i32> = pod_collect_to_vec(raw);
            ImageData::I32(pixels.into_iter().map(i32::from_be).collect())
        }
        64 => {
            let pixels: Vec<i64> = pod_collect_to_vec(raw);
            ImageData::I64(pixels.into_iter().map(i64::from_be).collect())
        }
        -32 => {
            let bits: Vec<u32> = pod_collect_to_vec(raw);
            ImageData::F32(
                bits.into_iter()
                    .map(|b| f32::from_bits(u32::from_be(b)))
                    .collect(),
            )
        }
        _ => {
            let bits: Vec<u64> = pod_collect_to_vec(raw);
            ImageData::F64(
                bits.into_iter()
                    .map(|b| f64::from_bits(u64::from_be(b)))
                    .collect(),
            )
        }
    })
}

/// Encode pixels as big-endian bytes (unpadded).
pub fn encode_pixels(data: &ImageData) -> Vec<u8> {
    match data {
        ImageData::U8(v) => v.clone(),
        ImageData::I16(v) => {
            let be: Vec<i16> = v.iter().map(|x| x.to_be()).collect();
            pod_collect_to_vec(&be)
        }
        ImageData::I32(v) => {
            let be: Vec<i32> = v.iter().map(|x| x.to_be()).collect();
            pod_collect_to_vec(&be)
        }
        ImageData::I64(v) => {
            let be: Vec<i64> = v.iter().map(|x| x.to_be()).collect();
            pod_collect_to_vec(&be)
        }
        ImageData::F32(v) => {
            let be: Vec<u32> = v.iter().map(|x| x.to_bits().to_be()).collect();
            pod_collect_to_vec(&be)
        }
        ImageData::F64(v) => {
            let be: Vec<u64> = v.iter().map(|x| x.to_bits().to_be()).collect();
            pod_collect_to_vec(&be)
        }
    }
}

/// Axis lengths of an image-like HDU (NAXIS1 first).
pub fn image_axes(hdu: &Hdu) -> Option<&[usize]> {
    match &hdu.info {
        HduInfo::Primary { naxes, .. } | HduInfo::Image { naxes, .. } => Some(naxes),
        HduInfo::CompressedImage { znaxes, .. } => Some(znaxes),
        _ => None,
    }
}

/// Read the raw pixels of a primary or image-extension HDU.
///
/// Tile-compressed images are decompressed. No BSCALE/BZERO scaling is
/// applied; see [`Scaling::from_cards`].
pub fn read_image(fits_data: &[u8], hdu: &Hdu) -> Result<ImageData> {
    match &hdu.info {
        HduInfo::Primary { bitpix, naxes } | HduInfo::Image { bitpix, naxes } => {
            let bpp = bytes_per_pixel(*bitpix)?;
            let npix: usize = if naxes.is_empty() {
                0
            } else {
                naxes.iter().product()
            };
            let raw = hdu.data(fits_data)?;
            let raw = raw
                .get(..npix * bpp)
                .ok_or(Error::UnexpectedEof)?;
            decode_pixels(raw, *bitpix)
        }
        HduInfo::CompressedImage { .. } => crate::tiled::read_tiled_image(fits_data, hdu),
        _ => Err(Error::InvalidHeader("not an image HDU")),
    }
}
