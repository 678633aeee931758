//! Reading a FITS file into the container model.

use std::path::Path;

use fitsidi_codec::bintable::{ColumnData, ColumnDescriptor, ColumnType};
use fitsidi_codec::hdu::{Hdu, HduInfo};
use fitsidi_codec::image::{image_axes, ImageData, Scaling};
use fitsidi_codec::tiled::is_compression_keyword;
use fitsidi_codec::FitsFile;
use log::{debug, info, warn};
use ndarray::{ArrayD, IxDyn};

use crate::config::{ReservedKeywords, Verbosity};
use crate::error::Result;
use crate::header::{parse_header, IdiHeader};
use crate::idi::{ArrayData, IdiColumn, IdiHduList, IdiTableHdu};
use crate::typecode::U64_OFFSET;
use crate::units::from_foreign;

/// How an HDU is translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// No data: header only.
    Primary,
    Image,
    /// A tile-compressed image, decoded like an image.
    CompressedImage,
    /// A binary or ASCII table.
    Table,
    /// Random groups, read as one row per group.
    RandomGroupsTable,
}

/// Decide how `hdu` is translated. HDUs without data are always `Primary`.
pub fn classify(hdu: &Hdu) -> UnitKind {
    match &hdu.info {
        HduInfo::Primary { naxes, .. } | HduInfo::Image { naxes, .. } => {
            if element_count(naxes) == 0 {
                UnitKind::Primary
            } else {
                UnitKind::Image
            }
        }
        HduInfo::CompressedImage { znaxes, .. } => {
            if element_count(znaxes) == 0 {
                UnitKind::Primary
            } else {
                UnitKind::CompressedImage
            }
        }
        HduInfo::RandomGroups { .. } if hdu.data_len == 0 => UnitKind::Primary,
        HduInfo::RandomGroups { .. } => UnitKind::RandomGroupsTable,
        HduInfo::AsciiTable { .. } | HduInfo::BinaryTable { .. } => UnitKind::Table,
    }
}

fn element_count(naxes: &[usize]) -> usize {
    if naxes.is_empty() {
        0
    } else {
        naxes.iter().product()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Read the FITS file at `path` with the default keyword profile.
pub fn read(path: impl AsRef<Path>, verbosity: Verbosity) -> Result<IdiHduList> {
    read_with(path, verbosity, &ReservedKeywords::FITS)
}

pub fn read_with(
    path: impl AsRef<Path>,
    verbosity: Verbosity,
    profile: &ReservedKeywords,
) -> Result<IdiHduList> {
    let path = path.as_ref();
    if verbosity.units() {
        info!("reading {}", path.display());
    }
    let file = FitsFile::open(path)?;
    import_file(&file, verbosity, profile)
}

/// Translate an in-memory FITS file with the default keyword profile.
pub fn read_bytes(bytes: Vec<u8>, verbosity: Verbosity) -> Result<IdiHduList> {
    read_bytes_with(bytes, verbosity, &ReservedKeywords::FITS)
}

pub fn read_bytes_with(
    bytes: Vec<u8>,
    verbosity: Verbosity,
    profile: &ReservedKeywords,
) -> Result<IdiHduList> {
    let file = FitsFile::from_bytes(bytes)?;
    import_file(&file, verbosity, profile)
}

fn import_file(
    file: &FitsFile,
    verbosity: Verbosity,
    profile: &ReservedKeywords,
) -> Result<IdiHduList> {
    let mut list = IdiHduList::new();
    let mut blank_names = 0;

    for (index, hdu) in file.hdus().iter().enumerate() {
        let name = match hdu.name(index) {
            Some(name) => name,
            None => {
                let name = format!("HDU{blank_names}");
                blank_names += 1;
                name
            }
        };
        let name = unique_name(&list, name);
        let kind = classify(hdu);
        if verbosity.units() {
            info!("HDU {index} -> {kind:?} unit {name}");
        }
        import_unit(file, index, &name, kind, &mut list, verbosity, profile)
            .map_err(|e| e.in_unit(&name))?;
    }
    Ok(list)
}

/// `name`, or `name_2`, `name_3`, ... when the list already holds it.
fn unique_name(list: &IdiHduList, name: String) -> String {
    if !list.contains(&name) {
        return name;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{name}_{suffix}");
        if !list.contains(&candidate) {
            warn!("duplicate HDU name {name}, importing as {candidate}");
            return candidate;
        }
        suffix += 1;
    }
}

fn import_unit(
    file: &FitsFile,
    index: usize,
    name: &str,
    kind: UnitKind,
    list: &mut IdiHduList,
    verbosity: Verbosity,
    profile: &ReservedKeywords,
) -> Result<()> {
    let hdu = file.hdu(index)?;
    let mut header = parse_header(&hdu.cards, profile);
    // Layout keywords are consumed even when the payload turns out empty.
    match hdu.info {
        HduInfo::CompressedImage { .. } => header.retain(|key, _| !is_compression_keyword(key)),
        HduInfo::RandomGroups { .. } => header.retain(|key, _| !is_group_keyword(key)),
        _ => {}
    }

    match kind {
        UnitKind::Primary => list.add_primary_hdu(name, header),
        UnitKind::Image | UnitKind::CompressedImage => {
            let pixels = file.read_image(index)?;
            let axes = image_axes(hdu).unwrap_or(&[]);
            let shape: Vec<usize> = axes.iter().rev().copied().collect();
            let scaling = Scaling::from_cards(&hdu.cards);
            let data = image_array(pixels, scaling, &shape, &mut header)?;
            if verbosity.detail() {
                debug!("{name}: {} image {:?}", data.element_type(), data.shape());
            }
            list.add_image_hdu(name, header, data)
        }
        UnitKind::Table | UnitKind::RandomGroupsTable => {
            let table = file.read_table(index)?;
            let mut unit = IdiTableHdu::new(header);
            for (i, column) in table.columns.into_iter().enumerate() {
                let desc = column.descriptor;
                let column_name = if desc.name.is_empty() {
                    format!("col{}", i + 1)
                } else {
                    desc.name.clone()
                };
                let data = column_array(&desc, column.data, table.nrows)?;
                if verbosity.detail() {
                    debug!(
                        "column {column_name}: TFORM {} -> {} {:?}",
                        desc.tform,
                        data.element_type(),
                        data.shape()
                    );
                }
                unit.add_column(IdiColumn {
                    name: column_name,
                    unit: desc.unit.as_deref().map(from_foreign),
                    data,
                })?;
            }
            list.add_table_hdu(name, unit)
        }
    }
}

/// Keywords consumed into the columns of a random-groups table.
fn is_group_keyword(key: &str) -> bool {
    matches!(key, "BSCALE" | "BZERO")
        || ["PTYPE", "PSCAL", "PZERO"].iter().any(|prefix| {
            key.strip_prefix(prefix)
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn array<T>(shape: &[usize], values: Vec<T>) -> Result<ArrayD<T>> {
    Ok(ArrayD::from_shape_vec(IxDyn(shape), values)?)
}

/// Convert raw pixels to an array, mapping the unsigned BZERO convention to
/// unsigned element types. Scaling keywords consumed this way are removed
/// from `header`; any other scaling stays there with the raw pixels.
fn image_array(
    pixels: ImageData,
    scaling: Option<Scaling>,
    shape: &[usize],
    header: &mut IdiHeader,
) -> Result<ArrayData> {
    let unsigned = scaling.is_some_and(|s| s.is_unsigned_offset(pixels.bitpix()));
    if unsigned {
        header.remove("BSCALE");
        header.remove("BZERO");
    }
    Ok(match pixels {
        ImageData::U8(v) if unsigned => {
            ArrayData::I8(array(shape, v.into_iter().map(|b| (b ^ 0x80) as i8).collect())?)
        }
        ImageData::I16(v) if unsigned => {
            ArrayData::U16(array(shape, v.into_iter().map(|x| x as u16 ^ 0x8000).collect())?)
        }
        ImageData::I32(v) if unsigned => ArrayData::U32(array(
            shape,
            v.into_iter().map(|x| x as u32 ^ 0x8000_0000).collect(),
        )?),
        ImageData::I64(v) if unsigned => ArrayData::U64(array(
            shape,
            v.into_iter().map(|x| x as u64 ^ (1 << 63)).collect(),
        )?),
        ImageData::U8(v) => ArrayData::U8(array(shape, v)?),
        ImageData::I16(v) => ArrayData::I16(array(shape, v)?),
        ImageData::I32(v) => ArrayData::I32(array(shape, v)?),
        ImageData::I64(v) => ArrayData::I64(array(shape, v)?),
        ImageData::F32(v) => ArrayData::F32(array(shape, v)?),
        ImageData::F64(v) => ArrayData::F64(array(shape, v)?),
    })
}

// ---------------------------------------------------------------------------
// Table columns
// ---------------------------------------------------------------------------

/// `[rows]` for scalar cells, else `[rows, ...cell]` with the cell axes
/// from TDIMn in row-major order.
fn column_shape(desc: &ColumnDescriptor, nrows: usize) -> Vec<usize> {
    let per_row = desc.values_per_row();
    let cell: Vec<usize> = match (&desc.tdim, desc.tform.col_type) {
        // The first TDIM axis of a string column is the string width.
        (Some(dims), ColumnType::Ascii) => dims.iter().skip(1).rev().copied().collect(),
        (Some(dims), _) => dims.iter().rev().copied().collect(),
        (None, _) => vec![per_row],
    };
    let cell = if cell.iter().product::<usize>() == per_row {
        cell
    } else {
        vec![per_row]
    };

    let mut shape = vec![nrows];
    if cell != [1] {
        shape.extend(cell);
    }
    shape
}

/// Physical values `tzero + tscal * stored`.
fn physical<T: Copy + Into<f64>>(values: Vec<T>, tscal: f64, tzero: f64) -> Vec<f64> {
    values
        .into_iter()
        .map(|v| tzero + tscal * v.into())
        .collect()
}

fn column_array(desc: &ColumnDescriptor, data: ColumnData, nrows: usize) -> Result<ArrayData> {
    let shape = column_shape(desc, nrows);
    let tscal = desc.tscal.unwrap_or(1.0);
    let tzero = desc.tzero.unwrap_or(0.0);
    let offset_only = tscal == 1.0;
    let identity = offset_only && tzero == 0.0;

    Ok(match data {
        ColumnData::Ascii(values) => ArrayData::Bytes {
            width: desc.string_width().max(1),
            values: array(&shape, values)?,
        },
        ColumnData::Logical(v) => ArrayData::Bool(array(&shape, v)?),
        ColumnData::ComplexFloat(v) => ArrayData::Complex64(array(&shape, v)?),
        ColumnData::ComplexDouble(v) => ArrayData::Complex128(array(&shape, v)?),

        ColumnData::Byte(v) if offset_only && tzero == -128.0 => {
            ArrayData::I8(array(&shape, v.into_iter().map(|b| (b ^ 0x80) as i8).collect())?)
        }
        ColumnData::Short(v) if offset_only && tzero == 32_768.0 => {
            ArrayData::U16(array(&shape, v.into_iter().map(|x| x as u16 ^ 0x8000).collect())?)
        }
        ColumnData::Int(v) if offset_only && tzero == 2_147_483_648.0 => ArrayData::U32(array(
            &shape,
            v.into_iter().map(|x| x as u32 ^ 0x8000_0000).collect(),
        )?),
        ColumnData::Long(v) if offset_only && tzero == U64_OFFSET => ArrayData::U64(array(
            &shape,
            v.into_iter().map(|x| x as u64 ^ (1 << 63)).collect(),
        )?),

        ColumnData::Byte(v) if !identity => ArrayData::F64(array(&shape, physical(v, tscal, tzero))?),
        ColumnData::Short(v) if !identity => {
            ArrayData::F64(array(&shape, physical(v, tscal, tzero))?)
        }
        ColumnData::Int(v) if !identity => ArrayData::F64(array(&shape, physical(v, tscal, tzero))?),
        ColumnData::Long(v) if !identity => ArrayData::F64(array(
            &shape,
            v.into_iter().map(|x| tzero + tscal * x as f64).collect(),
        )?),
        ColumnData::Float(v) if !identity => {
            ArrayData::F64(array(&shape, physical(v, tscal, tzero))?)
        }
        ColumnData::Double(v) if !identity => {
            ArrayData::F64(array(&shape, physical(v, tscal, tzero))?)
        }

        ColumnData::Byte(v) => ArrayData::U8(array(&shape, v)?),
        ColumnData::Short(v) => ArrayData::I16(array(&shape, v)?),
        ColumnData::Int(v) => ArrayData::I32(array(&shape, v)?),
        ColumnData::Long(v) => ArrayData::I64(array(&shape, v)?),
        ColumnData::Float(v) => ArrayData::F32(array(&shape, v)?),
        ColumnData::Double(v) => ArrayData::F64(array(&shape, v)?),
    })
}
