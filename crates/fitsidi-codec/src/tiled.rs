//! Tile-compressed image decompression.
//!
//! Supports GZIP_1, GZIP_2 (byte-shuffled) and NOCOMPRESS tiles under the
//! FITS tiled image convention, with arbitrary ZTILEn tile shapes and
//! ZSCALE/ZZERO quantised floating-point data (with or without subtractive
//! dithering).

use crate::bintable::{decode_numeric, gather_column, parse_columns, ColumnData, ColumnType};
use crate::error::{Error, Result};
use crate::hdu::{Hdu, HduInfo};
use crate::header::{card_float, card_integer, card_string, Card};
use crate::image::ImageData;

/// Keywords that describe the compression itself rather than the image.
const COMPRESSION_KEYWORDS: &[&str] = &[
    "ZIMAGE", "ZBITPIX", "ZCMPTYPE", "ZQUANTIZ", "ZDITHER0", "ZSIMPLE", "ZTENSION", "ZEXTEND",
    "ZPCOUNT", "ZGCOUNT", "ZHECKSUM", "ZDATASUM", "ZBLANK", "ZSCALE", "ZZERO", "ZMASKCMP",
    "THEAP",
];

/// Indexed compression keywords (ZNAXISn, ZTILEn, ZNAMEn, ZVALn).
const COMPRESSION_PREFIXES: &[&str] = &["ZNAXIS", "ZTILE", "ZNAME", "ZVAL"];

/// Returns `true` for keywords that belong to the compression wrapper of a
/// tile-compressed image and not to the image header it stands for.
pub fn is_compression_keyword(keyword: &str) -> bool {
    COMPRESSION_KEYWORDS.contains(&keyword)
        || COMPRESSION_PREFIXES.iter().any(|prefix| {
            keyword
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_digit()))
        })
}

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

/// Location of one table column within a row.
#[derive(Debug, Clone, Copy)]
struct ColumnSlot {
    offset: usize,
    width: usize,
    col_type: ColumnType,
}

#[derive(Debug, Default)]
struct Layout {
    compressed: Option<ColumnSlot>,
    gzip_fallback: Option<ColumnSlot>,
    uncompressed: Option<ColumnSlot>,
    zscale: Option<ColumnSlot>,
    zzero: Option<ColumnSlot>,
    zblank: Option<ColumnSlot>,
}

fn column_layout(cards: &[Card], tfields: usize) -> Result<Layout> {
    let mut layout = Layout::default();
    let mut offset = 0;
    for desc in parse_columns(cards, tfields)? {
        let slot = ColumnSlot {
            offset,
            width: desc.tform.byte_width(),
            col_type: desc.tform.col_type,
        };
        offset += slot.width;
        let target = match desc.name.as_str() {
            "COMPRESSED_DATA" => &mut layout.compressed,
            "GZIP_COMPRESSED_DATA" => &mut layout.gzip_fallback,
            "UNCOMPRESSED_DATA" => &mut layout.uncompressed,
            "ZSCALE" => &mut layout.zscale,
            "ZZERO" => &mut layout.zzero,
            "ZBLANK" => &mut layout.zblank,
            _ => continue,
        };
        *target = Some(slot);
    }
    if layout.compressed.is_none() {
        return Err(Error::InvalidHeader(
            "compressed image has no COMPRESSED_DATA column",
        ));
    }
    Ok(layout)
}

/// One numeric value per row for a scalar column, as f64.
fn scalar_column(table: &[u8], row_len: usize, nrows: usize, slot: ColumnSlot) -> Result<Vec<f64>> {
    let raw = gather_column(table, row_len, nrows, slot.offset, slot.width);
    Ok(match decode_numeric(&raw, slot.col_type)? {
        ColumnData::Byte(v) => v.into_iter().map(f64::from).collect(),
        ColumnData::Short(v) => v.into_iter().map(f64::from).collect(),
        ColumnData::Int(v) => v.into_iter().map(f64::from).collect(),
        ColumnData::Long(v) => v.into_iter().map(|x| x as f64).collect(),
        ColumnData::Float(v) => v.into_iter().map(f64::from).collect(),
        ColumnData::Double(v) => v,
        _ => return Err(Error::InvalidValue("non-numeric scaling column")),
    })
}

// ---------------------------------------------------------------------------
// Heap access
// ---------------------------------------------------------------------------

/// Read a variable-length array descriptor: (element count, heap offset).
fn read_descriptor(row: &[u8], slot: ColumnSlot) -> Result<(usize, usize)> {
    let bytes = row
        .get(slot.offset..slot.offset + slot.width)
        .ok_or(Error::UnexpectedEof)?;
    let (count, offset) = match slot.col_type {
        ColumnType::VarArrayP(_) => {
            let count = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let offset = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
            (count as u64, offset as u64)
        }
        ColumnType::VarArrayQ(_) => {
            let mut count = [0u8; 8];
            let mut offset = [0u8; 8];
            count.copy_from_slice(&bytes[..8]);
            offset.copy_from_slice(&bytes[8..16]);
            (u64::from_be_bytes(count), u64::from_be_bytes(offset))
        }
        _ => {
            return Err(Error::InvalidHeader(
                "tile data column is not a variable-length array",
            ))
        }
    };
    let count = usize::try_from(count).map_err(|_| Error::InvalidValue("descriptor count"))?;
    let offset = usize::try_from(offset).map_err(|_| Error::InvalidValue("descriptor offset"))?;
    Ok((count, offset))
}

/// The heap bytes addressed by a descriptor column of one row. Empty when
/// the descriptor count is zero.
fn heap_bytes<'a>(heap: &'a [u8], row: &[u8], slot: ColumnSlot) -> Result<&'a [u8]> {
    let (count, offset) = read_descriptor(row, slot)?;
    let elem = match slot.col_type {
        ColumnType::VarArrayP(code) | ColumnType::VarArrayQ(code) => {
            ColumnType::from_code(code as char).map_or(1, |t| t.element_size().max(1))
        }
        _ => 1,
    };
    heap.get(offset..offset + count * elem)
        .ok_or(Error::UnexpectedEof)
}

// ---------------------------------------------------------------------------
// GZIP decompression
// ---------------------------------------------------------------------------

/// Strip the gzip header and trailer, returning the raw deflate payload.
fn strip_gzip_header(data: &[u8]) -> Result<&[u8]> {
    if data.len() < 18 || data[0] != 0x1f || data[1] != 0x8b || data[2] != 0x08 {
        return Err(Error::Decompression);
    }
    let flags = data[3];
    let mut pos = 10usize;
    if flags & 0x04 != 0 {
        let xlen = data
            .get(pos..pos + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
            .ok_or(Error::Decompression)?;
        pos += 2 + xlen;
    }
    // FNAME then FCOMMENT, both NUL-terminated.
    for flag in [0x08, 0x10] {
        if flags & flag != 0 {
            let len = data
                .get(pos..)
                .and_then(|rest| rest.iter().position(|&b| b == 0))
                .ok_or(Error::Decompression)?;
            pos += len + 1;
        }
    }
    if flags & 0x02 != 0 {
        pos += 2;
    }
    if data.len() < pos + 8 {
        return Err(Error::Decompression);
    }
    Ok(&data[pos..data.len() - 8])
}

/// Inflate a tile: gzip member, zlib stream or raw deflate.
fn gzip_decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    if compressed.starts_with(&[0x1f, 0x8b]) {
        let payload = strip_gzip_header(compressed)?;
        return miniz_oxide::inflate::decompress_to_vec(payload).map_err(|_| Error::Decompression);
    }
    miniz_oxide::inflate::decompress_to_vec_zlib(compressed)
        .or_else(|_| miniz_oxide::inflate::decompress_to_vec(compressed))
        .map_err(|_| Error::Decompression)
}

/// Undo the GZIP_2 byte shuffle: all most-significant bytes first, then the
/// next byte of every element, and so on.
fn unshuffle(input: &[u8], elem_size: usize) -> Vec<u8> {
    if elem_size <= 1 {
        return input.to_vec();
    }
    let n = input.len() / elem_size;
    let mut output = vec![0u8; n * elem_size];
    for i in 0..n {
        for j in 0..elem_size {
            output[i * elem_size + j] = input[j * n + i];
        }
    }
    output
}

// ---------------------------------------------------------------------------
// Quantisation
// ---------------------------------------------------------------------------

const N_RANDOM: usize = 10_000;

/// Integer value reserved by SUBTRACTIVE_DITHER_2 for exact zeros.
const ZERO_VALUE: i64 = -2_147_483_646;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantize {
    NoDither,
    SubtractiveDither1,
    SubtractiveDither2,
}

impl Quantize {
    fn from_cards(cards: &[Card]) -> Result<Quantize> {
        match card_string(cards, "ZQUANTIZ").as_deref() {
            None | Some("NO_DITHER") => Ok(Quantize::NoDither),
            Some("SUBTRACTIVE_DITHER_1") => Ok(Quantize::SubtractiveDither1),
            Some("SUBTRACTIVE_DITHER_2") => Ok(Quantize::SubtractiveDither2),
            Some(other) => Err(Error::UnsupportedCompression(other.to_string())),
        }
    }
}

/// The uniform deviates shared by every dithering implementation: a
/// Park-Miller generator seeded with 1.
fn random_table() -> Vec<f32> {
    const A: f64 = 16_807.0;
    const M: f64 = 2_147_483_647.0;
    let mut seed = 1.0f64;
    (0..N_RANDOM)
        .map(|_| {
            let temp = A * seed;
            seed = temp - M * (temp / M).trunc();
            (seed / M) as f32
        })
        .collect()
}

/// Per-tile dequantisation parameters.
struct Dequantizer<'a> {
    mode: Quantize,
    scale: f64,
    zero: f64,
    blank: Option<i64>,
    random: &'a [f32],
}

impl Dequantizer<'_> {
    /// Restore floats for the tile whose zero-based index is `tile`.
    fn apply(&self, values: &[i64], tile: usize, zdither0: i64) -> Vec<f64> {
        if self.mode == Quantize::NoDither {
            return values
                .iter()
                .map(|&v| {
                    if Some(v) == self.blank {
                        f64::NAN
                    } else {
                        v as f64 * self.scale + self.zero
                    }
                })
                .collect();
        }

        let mut iseed = (tile as i64 + zdither0 - 1).rem_euclid(N_RANDOM as i64) as usize;
        let mut next = (self.random[iseed] * 500.0) as usize;
        let mut out = Vec::with_capacity(values.len());
        for &v in values {
            out.push(if Some(v) == self.blank {
                f64::NAN
            } else if self.mode == Quantize::SubtractiveDither2 && v == ZERO_VALUE {
                0.0
            } else {
                (v as f64 - f64::from(self.random[next]) + 0.5) * self.scale + self.zero
            });
            next += 1;
            if next == N_RANDOM {
                iseed = (iseed + 1) % N_RANDOM;
                next = (self.random[iseed] * 500.0) as usize;
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tile decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Gzip1,
    Gzip2,
    NoCompress,
}

impl Algorithm {
    fn parse(zcmptype: &str) -> Result<Algorithm> {
        match zcmptype {
            "GZIP_1" => Ok(Algorithm::Gzip1),
            "GZIP_2" => Ok(Algorithm::Gzip2),
            "NOCOMPRESS" => Ok(Algorithm::NoCompress),
            other => Err(Error::UnsupportedCompression(other.to_string())),
        }
    }
}

/// Width in bytes of each element of a decompressed tile of `npix` pixels.
fn element_size(len: usize, npix: usize) -> Result<usize> {
    if npix == 0 || len % npix != 0 {
        return Err(Error::Decompression);
    }
    match len / npix {
        size @ (1 | 2 | 4 | 8) => Ok(size),
        _ => Err(Error::Decompression),
    }
}

fn be_integers(raw: &[u8], size: usize) -> Vec<i64> {
    raw.chunks_exact(size)
        .map(|c| match size {
            1 => i64::from(c[0]),
            2 => i64::from(i16::from_be_bytes([c[0], c[1]])),
            4 => i64::from(i32::from_be_bytes([c[0], c[1], c[2], c[3]])),
            _ => i64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]),
        })
        .collect()
}

fn be_floats(raw: &[u8], size: usize) -> Result<Vec<f64>> {
    match size {
        4 => Ok(raw
            .chunks_exact(4)
            .map(|c| f64::from(f32::from_be_bytes([c[0], c[1], c[2], c[3]])))
            .collect()),
        8 => Ok(raw
            .chunks_exact(8)
            .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect()),
        _ => Err(Error::Decompression),
    }
}

/// Decompressed pixels of a single tile.
enum TilePixels {
    Integers(Vec<i64>),
    Floats(Vec<f64>),
}

/// Decompress and reassemble a tile-compressed image.
///
/// The HDU must have [`HduInfo::CompressedImage`]. Each row of the binary
/// table holds one tile; tiles are laid out with the first axis varying
/// fastest and may be clipped at the image edges.
pub fn read_tiled_image(fits_data: &[u8], hdu: &Hdu) -> Result<ImageData> {
    let (zbitpix, znaxes, zcmptype, ztile, naxis1, naxis2, tfields) = match &hdu.info {
        HduInfo::CompressedImage {
            zbitpix,
            znaxes,
            zcmptype,
            ztile,
            naxis1,
            naxis2,
            tfields,
            ..
        } => (
            *zbitpix,
            znaxes.as_slice(),
            zcmptype.as_str(),
            ztile.as_slice(),
            *naxis1,
            *naxis2,
            *tfields,
        ),
        _ => return Err(Error::InvalidHeader("not a compressed image HDU")),
    };
    if !matches!(zbitpix, 8 | 16 | 32 | 64 | -32 | -64) {
        return Err(Error::InvalidBitpix(zbitpix));
    }
    let algorithm = Algorithm::parse(zcmptype)?;
    let total: usize = if znaxes.is_empty() {
        0
    } else {
        znaxes.iter().product()
    };
    if total == 0 {
        return Ok(assemble(zbitpix, Vec::new(), Vec::new()));
    }
    if ztile.len() != znaxes.len() {
        return Err(Error::InvalidHeader("ZTILEn does not match ZNAXIS"));
    }

    let layout = column_layout(&hdu.cards, tfields)?;
    let data = hdu.data(fits_data)?;
    let table_len = naxis1 * naxis2;
    let heap_start = match card_integer(&hdu.cards, "THEAP") {
        Some(theap) => usize::try_from(theap).map_err(|_| Error::InvalidValue("THEAP"))?,
        None => table_len,
    };
    let table = data.get(..table_len).ok_or(Error::UnexpectedEof)?;
    let heap = data.get(heap_start..).unwrap_or(&[]);

    let tiles_per_axis: Vec<usize> = znaxes
        .iter()
        .zip(ztile)
        .map(|(&n, &t)| n.div_ceil(t))
        .collect();
    let ntiles: usize = tiles_per_axis.iter().product();
    if naxis2 < ntiles {
        return Err(Error::InvalidHeader("fewer table rows than image tiles"));
    }

    let floating = zbitpix < 0;
    let per_row = |slot: Option<ColumnSlot>| {
        slot.map(|s| scalar_column(table, naxis1, naxis2, s))
            .transpose()
    };
    let zscale_col = per_row(layout.zscale)?;
    let zzero_col = per_row(layout.zzero)?;
    let zblank_col = per_row(layout.zblank)?;
    let zscale_key = card_float(&hdu.cards, "ZSCALE");
    let zzero_key = card_float(&hdu.cards, "ZZERO");
    let zblank_key = card_integer(&hdu.cards, "ZBLANK");
    let quantized = floating && (zscale_col.is_some() || zscale_key.is_some());
    let mode = Quantize::from_cards(&hdu.cards)?;
    let zdither0 = card_integer(&hdu.cards, "ZDITHER0").unwrap_or(1);
    let random = if quantized && mode != Quantize::NoDither {
        random_table()
    } else {
        Vec::new()
    };

    let mut ints = if floating { Vec::new() } else { vec![0i64; total] };
    let mut floats = if floating { vec![0f64; total] } else { Vec::new() };

    for tile in 0..ntiles {
        // Tile origin and clipped extent along each axis.
        let mut rem = tile;
        let mut origin = Vec::with_capacity(znaxes.len());
        let mut extent = Vec::with_capacity(znaxes.len());
        for axis in 0..znaxes.len() {
            let index = rem % tiles_per_axis[axis];
            rem /= tiles_per_axis[axis];
            let start = index * ztile[axis];
            origin.push(start);
            extent.push(ztile[axis].min(znaxes[axis] - start));
        }
        let npix: usize = extent.iter().product();

        let row = &table[tile * naxis1..(tile + 1) * naxis1];
        let pixels = decode_tile(algorithm, &layout, heap, row, npix, floating && !quantized)?;
        let pixels = match pixels {
            TilePixels::Integers(values) if quantized => {
                let dequantizer = Dequantizer {
                    mode,
                    scale: zscale_col
                        .as_ref()
                        .map(|c| c[tile])
                        .or(zscale_key)
                        .unwrap_or(1.0),
                    zero: zzero_col
                        .as_ref()
                        .map(|c| c[tile])
                        .or(zzero_key)
                        .unwrap_or(0.0),
                    blank: zblank_col
                        .as_ref()
                        .map(|c| c[tile] as i64)
                        .or(zblank_key),
                    random: &random,
                };
                TilePixels::Floats(dequantizer.apply(&values, tile, zdither0))
            }
            other => other,
        };

        let len = match &pixels {
            TilePixels::Integers(v) => v.len(),
            TilePixels::Floats(v) => v.len(),
        };
        if len < npix {
            return Err(Error::Decompression);
        }
        for k in 0..npix {
            let mut rem = k;
            let mut pos = 0;
            let mut stride = 1;
            for axis in 0..znaxes.len() {
                let c = rem % extent[axis];
                rem /= extent[axis];
                pos += (origin[axis] + c) * stride;
                stride *= znaxes[axis];
            }
            match &pixels {
                TilePixels::Integers(v) => ints[pos] = v[k],
                TilePixels::Floats(v) => floats[pos] = v[k],
            }
        }
    }

    log::trace!("decompressed {ntiles} {zcmptype} tiles into {total} pixels");
    Ok(assemble(zbitpix, ints, floats))
}

/// Decompress the tile stored in one table row.
fn decode_tile(
    algorithm: Algorithm,
    layout: &Layout,
    heap: &[u8],
    row: &[u8],
    npix: usize,
    raw_floats: bool,
) -> Result<TilePixels> {
    let mut raw = match layout.compressed {
        Some(slot) => {
            let bytes = heap_bytes(heap, row, slot)?;
            match algorithm {
                _ if bytes.is_empty() => Vec::new(),
                Algorithm::NoCompress => bytes.to_vec(),
                Algorithm::Gzip1 | Algorithm::Gzip2 => gzip_decompress(bytes)?,
            }
        }
        None => Vec::new(),
    };
    let mut shuffled = algorithm == Algorithm::Gzip2;

    // Tiles that could not be compressed are stored in a fallback column.
    if raw.is_empty() {
        if let Some(slot) = layout.gzip_fallback {
            let bytes = heap_bytes(heap, row, slot)?;
            if !bytes.is_empty() {
                raw = gzip_decompress(bytes)?;
                shuffled = false;
            }
        }
    }
    if raw.is_empty() {
        if let Some(slot) = layout.uncompressed {
            let bytes = heap_bytes(heap, row, slot)?;
            raw = bytes.to_vec();
            shuffled = false;
        }
    }

    let size = element_size(raw.len(), npix)?;
    if shuffled {
        raw = unshuffle(&raw, size);
    }
    if raw_floats {
        Ok(TilePixels::Floats(be_floats(&raw, size)?))
    } else {
        Ok(TilePixels::Integers(be_integers(&raw, size)))
    }
}

fn assemble(zbitpix: i64, ints: Vec<i64>, floats: Vec<f64>) -> ImageData {
    match zbitpix {
        8 => ImageData::U8(ints.into_iter().map(|v| v as u8).collect()),
        16 => ImageData::I16(ints.into_iter().map(|v| v as i16).collect()),
        32 => ImageData::I32(ints.into_iter().map(|v| v as i32).collect()),
        64 => ImageData::I64(ints),
        -32 => ImageData::F32(floats.into_iter().map(|v| v as f32).collect()),
        _ => ImageData::F64(floats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{pad_to_block, DATA_PAD_BYTE};
    use crate::hdu::parse_fits;
    use crate::header::serialize_header;
    use crate::image::read_image;
    use crate::value::Value;
    use miniz_oxide::deflate::{compress_to_vec, compress_to_vec_zlib};

    /// Build a primary HDU followed by a compressed image whose table has a
    /// `1PB` COMPRESSED_DATA column plus optional scalar `D` columns.
    fn compressed_file(
        keywords: Vec<Card>,
        tiles: &[Vec<u8>],
        extra_columns: &[(&str, Vec<f64>)],
    ) -> Vec<u8> {
        let mut bytes = serialize_header(&[
            Card::new("SIMPLE", Value::Logical(true)),
            Card::new("BITPIX", Value::Integer(8)),
            Card::new("NAXIS", Value::Integer(0)),
        ])
        .unwrap();

        let naxis1 = 8 + 8 * extra_columns.len();
        let mut table = Vec::new();
        let mut heap = Vec::new();
        for (row, tile) in tiles.iter().enumerate() {
            table.extend_from_slice(&(tile.len() as u32).to_be_bytes());
            table.extend_from_slice(&(heap.len() as u32).to_be_bytes());
            heap.extend_from_slice(tile);
            for (_, values) in extra_columns {
                table.extend_from_slice(&values[row].to_be_bytes());
            }
        }

        let mut cards = vec![
            Card::new("XTENSION", Value::String("BINTABLE".into())),
            Card::new("BITPIX", Value::Integer(8)),
            Card::new("NAXIS", Value::Integer(2)),
            Card::new("NAXIS1", Value::Integer(naxis1 as i64)),
            Card::new("NAXIS2", Value::Integer(tiles.len() as i64)),
            Card::new("PCOUNT", Value::Integer(heap.len() as i64)),
            Card::new("GCOUNT", Value::Integer(1)),
            Card::new("TFIELDS", Value::Integer(1 + extra_columns.len() as i64)),
            Card::new("TTYPE1", Value::String("COMPRESSED_DATA".into())),
            Card::new("TFORM1", Value::String("1PB(64)".into())),
            Card::new("ZIMAGE", Value::Logical(true)),
        ];
        for (i, (name, _)) in extra_columns.iter().enumerate() {
            cards.push(Card::new(format!("TTYPE{}", i + 2), Value::String((*name).into())));
            cards.push(Card::new(format!("TFORM{}", i + 2), Value::String("1D".into())));
        }
        cards.extend(keywords);
        bytes.extend(serialize_header(&cards).unwrap());
        bytes.extend(table);
        bytes.extend(heap);
        pad_to_block(&mut bytes, DATA_PAD_BYTE);
        bytes
    }

    fn image_keywords(cmptype: &str, zbitpix: i64, axes: &[usize], tile: &[usize]) -> Vec<Card> {
        let mut cards = vec![
            Card::new("ZBITPIX", Value::Integer(zbitpix)),
            Card::new("ZNAXIS", Value::Integer(axes.len() as i64)),
        ];
        for (i, n) in axes.iter().enumerate() {
            cards.push(Card::new(format!("ZNAXIS{}", i + 1), Value::Integer(*n as i64)));
        }
        for (i, n) in tile.iter().enumerate() {
            cards.push(Card::new(format!("ZTILE{}", i + 1), Value::Integer(*n as i64)));
        }
        cards.push(Card::new("ZCMPTYPE", Value::String(cmptype.into())));
        cards
    }

    fn be_i16(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    fn be_i32(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    fn shuffle(raw: &[u8], size: usize) -> Vec<u8> {
        let n = raw.len() / size;
        let mut out = vec![0u8; raw.len()];
        for i in 0..n {
            for j in 0..size {
                out[j * n + i] = raw[i * size + j];
            }
        }
        out
    }

    fn gzip_member(raw: &[u8]) -> Vec<u8> {
        let mut out = vec![0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff];
        out.extend(compress_to_vec(raw, 6));
        out.extend([0u8; 8]);
        out
    }

    #[test]
    fn gzip1_row_tiles() {
        let rows = [[1i16, 2, 3, 4], [-5, -6, -7, -8], [100, 200, 300, 400]];
        let tiles: Vec<Vec<u8>> = rows
            .iter()
            .map(|r| compress_to_vec_zlib(&be_i16(r), 6))
            .collect();
        let bytes = compressed_file(image_keywords("GZIP_1", 16, &[4, 3], &[4, 1]), &tiles, &[]);
        let fits = parse_fits(&bytes).unwrap();
        let image = read_image(&bytes, &fits.hdus[1]).unwrap();
        assert_eq!(
            image,
            ImageData::I16(vec![1, 2, 3, 4, -5, -6, -7, -8, 100, 200, 300, 400])
        );
    }

    #[test]
    fn gzip1_accepts_gzip_members_and_widened_integers() {
        // Tiles stored as 32-bit integers for a 16-bit image.
        let tiles = vec![gzip_member(&be_i32(&[7, -7, 70]))];
        let bytes = compressed_file(image_keywords("GZIP_1", 16, &[3], &[3]), &tiles, &[]);
        let fits = parse_fits(&bytes).unwrap();
        let image = read_image(&bytes, &fits.hdus[1]).unwrap();
        assert_eq!(image, ImageData::I16(vec![7, -7, 70]));
    }

    #[test]
    fn gzip2_square_tiles_clipped_at_edges() {
        // 3x3 image in 2x2 tiles: extents (2x2), (1x2), (2x1), (1x1).
        let image: Vec<i32> = (0..9).collect();
        let tile_pixels: [&[i32]; 4] = [&[0, 1, 3, 4], &[2, 5], &[6, 7], &[8]];
        let tiles: Vec<Vec<u8>> = tile_pixels
            .iter()
            .map(|p| compress_to_vec_zlib(&shuffle(&be_i32(p), 4), 6))
            .collect();
        let bytes = compressed_file(image_keywords("GZIP_2", 32, &[3, 3], &[2, 2]), &tiles, &[]);
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(read_image(&bytes, &fits.hdus[1]).unwrap(), ImageData::I32(image));
    }

    #[test]
    fn nocompress_float_tiles() {
        let raw: Vec<u8> = [1.5f32, -2.25].iter().flat_map(|v| v.to_be_bytes()).collect();
        let bytes = compressed_file(image_keywords("NOCOMPRESS", -32, &[2], &[2]), &[raw], &[]);
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(
            read_image(&bytes, &fits.hdus[1]).unwrap(),
            ImageData::F32(vec![1.5, -2.25])
        );
    }

    #[test]
    fn quantized_without_dither_uses_scale_zero_and_blank() {
        let tiles = vec![
            compress_to_vec_zlib(&be_i32(&[0, 10, -999]), 6),
            compress_to_vec_zlib(&be_i32(&[4, 5, 6]), 6),
        ];
        let mut keywords = image_keywords("GZIP_1", -64, &[3, 2], &[3, 1]);
        keywords.push(Card::new("ZBLANK", Value::Integer(-999)));
        let bytes = compressed_file(
            keywords,
            &tiles,
            &[("ZSCALE", vec![0.5, 2.0]), ("ZZERO", vec![1.0, -1.0])],
        );
        let fits = parse_fits(&bytes).unwrap();
        let image = read_image(&bytes, &fits.hdus[1]).unwrap();
        let ImageData::F64(values) = image else {
            panic!("expected f64 image");
        };
        assert_eq!(values[..2], [1.0, 6.0]);
        assert!(values[2].is_nan());
        assert_eq!(values[3..], [7.0, 9.0, 11.0]);
    }

    #[test]
    fn dithered_tiles_subtract_the_random_sequence() {
        let tiles = vec![compress_to_vec_zlib(&be_i32(&[10, 20, ZERO_VALUE as i32]), 6)];
        let mut keywords = image_keywords("GZIP_1", -32, &[3], &[3]);
        keywords.push(Card::new("ZQUANTIZ", Value::String("SUBTRACTIVE_DITHER_2".into())));
        keywords.push(Card::new("ZDITHER0", Value::Integer(1)));
        let bytes = compressed_file(
            keywords,
            &tiles,
            &[("ZSCALE", vec![0.25]), ("ZZERO", vec![100.0])],
        );
        let fits = parse_fits(&bytes).unwrap();
        let ImageData::F32(values) = read_image(&bytes, &fits.hdus[1]).unwrap() else {
            panic!("expected f32 image");
        };

        let random = random_table();
        let start = (random[0] * 500.0) as usize;
        let expect = |v: f64, k: usize| {
            ((v - f64::from(random[start + k]) + 0.5) * 0.25 + 100.0) as f32
        };
        assert_eq!(values[0], expect(10.0, 0));
        assert_eq!(values[1], expect(20.0, 1));
        assert_eq!(values[2], 0.0);
    }

    #[test]
    fn random_table_matches_reference_generator() {
        let random = random_table();
        assert_eq!(random.len(), N_RANDOM);
        assert_eq!(random[0], (16_807.0f64 / 2_147_483_647.0) as f32);
        // The generator's seed after 10000 draws is a published constant.
        let mut seed = 1.0f64;
        for _ in 0..N_RANDOM {
            let temp = 16_807.0 * seed;
            seed = temp - 2_147_483_647.0 * (temp / 2_147_483_647.0).trunc();
        }
        assert_eq!(seed, 1_043_618_065.0);
    }

    #[test]
    fn unshuffle_restores_element_order() {
        let raw = be_i32(&[0x0102_0304, 0x0506_0708]);
        assert_eq!(unshuffle(&shuffle(&raw, 4), 4), raw);
        assert_eq!(unshuffle(&[1, 2, 3], 1), vec![1, 2, 3]);
    }

    #[test]
    fn unsupported_algorithms_are_reported() {
        let bytes = compressed_file(image_keywords("RICE_1", 16, &[2], &[2]), &[vec![0]], &[]);
        let fits = parse_fits(&bytes).unwrap();
        assert!(matches!(
            read_image(&bytes, &fits.hdus[1]),
            Err(Error::UnsupportedCompression(name)) if name == "RICE_1"
        ));
    }

    #[test]
    fn compression_keywords() {
        for keyword in ["ZIMAGE", "ZNAXIS", "ZNAXIS2", "ZTILE1", "ZNAME3", "ZVAL1", "ZQUANTIZ"] {
            assert!(is_compression_keyword(keyword), "{keyword}");
        }
        for keyword in ["ZNAXISX", "OBJECT", "ZENITH", "NAXIS1"] {
            assert!(!is_compression_keyword(keyword), "{keyword}");
        }
    }
}
