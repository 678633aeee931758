//! Writing the container model out as a FITS document.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use fitsidi_codec::bintable::{ColumnData, ColumnDescriptor, ColumnType, Table, Tform};
use fitsidi_codec::image::{ImageData, Scaling};
use fitsidi_codec::{Card, DocumentHdu, FitsDocument, HduData, WriteOptions};
use log::{debug, info, trace};

use crate::config::{ReservedKeywords, Verbosity};
use crate::error::{Error, Result};
use crate::header::write_header;
use crate::idi::{ArrayData, IdiColumn, IdiHdu, IdiHduList, IdiTableHdu};
use crate::typecode::{self, cell_len, column_offset, UnsupportedType};
use crate::units::to_foreign;

/// Name of the image unit that becomes the primary HDU.
const PRIMARY_NAME: &str = "PRIMARY";

const WRITE_OPTIONS: WriteOptions = WriteOptions {
    checksum: true,
    fix: true,
};

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Build the FITS document for `list` with the default keyword profile.
pub fn build(list: &IdiHduList, verbosity: Verbosity) -> Result<FitsDocument> {
    build_with(list, verbosity, &ReservedKeywords::FITS)
}

/// Build the FITS document for `list`.
///
/// Primary units and an image named `PRIMARY` go to position 0, pushing
/// whatever was there back by one. Every other unit is appended as an
/// extension behind an empty primary HDU, inserted as needed. The first HDU
/// gets a HISTORY line recording when the file was written. Each unit is
/// checked against the codec as it is built, so a header value or column
/// that cannot be written fails here with the unit's name.
pub fn build_with(
    list: &IdiHduList,
    verbosity: Verbosity,
    profile: &ReservedKeywords,
) -> Result<FitsDocument> {
    let mut doc = FitsDocument::new();
    let mut placeholder_primary = false;

    for (name, unit) in list.iter() {
        let hdu = export_unit(name, unit, profile).map_err(|e| e.in_unit(name))?;
        let to_front = match unit {
            IdiHdu::Primary(_) => true,
            IdiHdu::Image(_) => name == PRIMARY_NAME,
            IdiHdu::Table(_) => false,
        };
        if verbosity.units() {
            info!(
                "{} unit {name} -> {}",
                unit.kind(),
                if to_front { "primary HDU" } else { "extension" }
            );
        }

        if to_front {
            if placeholder_primary {
                doc.hdus_mut()[0] = hdu;
                placeholder_primary = false;
            } else {
                doc.insert(0, hdu);
            }
        } else {
            if doc.is_empty() {
                doc.push(DocumentHdu::new(None, HduData::Empty));
                placeholder_primary = true;
            }
            doc.push(hdu);
        }
    }

    if doc.is_empty() {
        doc.push(DocumentHdu::new(None, HduData::Empty));
    }
    let stamp = provenance(unix_now());
    if verbosity.detail() {
        debug!("{stamp}");
    }
    doc.hdus_mut()[0].cards.push(Card::commentary("HISTORY", stamp));
    Ok(doc)
}

/// Write `list` to `path` with CHECKSUM/DATASUM and the card fix pass.
pub fn write(list: &IdiHduList, path: impl AsRef<Path>, verbosity: Verbosity) -> Result<()> {
    write_with(list, path, verbosity, &ReservedKeywords::FITS)
}

pub fn write_with(
    list: &IdiHduList,
    path: impl AsRef<Path>,
    verbosity: Verbosity,
    profile: &ReservedKeywords,
) -> Result<()> {
    let path = path.as_ref();
    let doc = build_with(list, verbosity, profile)?;
    let bytes = doc.to_bytes(&WRITE_OPTIONS)?;
    std::fs::write(path, &bytes)?;
    if verbosity.units() {
        info!("wrote {} HDUs to {}", doc.len(), path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

fn export_unit(name: &str, unit: &IdiHdu, profile: &ReservedKeywords) -> Result<DocumentHdu> {
    let data = match unit {
        IdiHdu::Primary(_) => HduData::Empty,
        IdiHdu::Image(image) => image_payload(&image.data).map_err(|e| Error::UnsupportedType {
            unit: name.to_string(),
            column: None,
            element: e.element,
        })?,
        IdiHdu::Table(table) => HduData::BinaryTable(table_payload(name, table)?),
    };
    let mut hdu = DocumentHdu::new(Some(name.to_string()), data);
    hdu.cards = write_header(unit.header(), profile);
    hdu.verify(&WRITE_OPTIONS)?;
    Ok(hdu)
}

fn unsupported(data: &ArrayData) -> UnsupportedType {
    UnsupportedType {
        element: data.element_type().to_string(),
    }
}

/// Pixels in FITS axis order with the BZERO offset the element type needs.
fn image_payload(data: &ArrayData) -> std::result::Result<HduData, UnsupportedType> {
    let bitpix = typecode::image_bitpix(data.element_type())?;
    let mut naxes: Vec<usize> = data.shape().iter().rev().copied().collect();
    if naxes.is_empty() {
        naxes.push(1);
    }

    let (pixels, scaling) = match data {
        ArrayData::U8(a) => (ImageData::U8(a.iter().copied().collect()), None),
        ArrayData::I16(a) => (ImageData::I16(a.iter().copied().collect()), None),
        ArrayData::I32(a) => (ImageData::I32(a.iter().copied().collect()), None),
        ArrayData::I64(a) => (ImageData::I64(a.iter().copied().collect()), None),
        ArrayData::F32(a) => (ImageData::F32(a.iter().copied().collect()), None),
        ArrayData::F64(a) => (ImageData::F64(a.iter().copied().collect()), None),
        ArrayData::F16(a) => (ImageData::F32(a.iter().map(|&h| f16_to_f32(h)).collect()), None),
        ArrayData::I8(a) => (
            ImageData::U8(a.iter().map(|&x| x as u8 ^ 0x80).collect()),
            Scaling::unsigned(bitpix),
        ),
        ArrayData::U16(a) => (
            ImageData::I16(a.iter().map(|&x| (x ^ 0x8000) as i16).collect()),
            Scaling::unsigned(bitpix),
        ),
        ArrayData::U32(a) => (
            ImageData::I32(a.iter().map(|&x| (x ^ 0x8000_0000) as i32).collect()),
            Scaling::unsigned(bitpix),
        ),
        ArrayData::U64(a) => (
            ImageData::I64(a.iter().map(|&x| (x ^ (1 << 63)) as i64).collect()),
            Scaling::unsigned(bitpix),
        ),
        _ => return Err(unsupported(data)),
    };
    Ok(HduData::Image {
        naxes,
        data: pixels,
        scaling,
    })
}

fn table_payload(name: &str, unit: &IdiTableHdu) -> Result<Table> {
    let mut table = Table::new(unit.nrows());
    for column in unit.columns() {
        let (desc, data) = export_column(column).map_err(|e| Error::UnsupportedType {
            unit: name.to_string(),
            column: Some(column.name.clone()),
            element: e.element,
        })?;
        trace!("column {}: {} -> TFORM {}", column.name, column.data.element_type(), desc.tform);
        table.push(desc, data);
    }
    Ok(table)
}

/// Descriptor and flattened values for one column.
fn export_column(
    column: &IdiColumn,
) -> std::result::Result<(ColumnDescriptor, ColumnData), UnsupportedType> {
    let element = column.data.element_type();
    let shape = column.data.shape();
    let format = typecode::encode(element, shape)?;
    let col_type = ColumnType::from_code(format.code).ok_or_else(|| unsupported(&column.data))?;

    let mut desc = ColumnDescriptor::new(column.name.clone(), Tform::new(format.repeat, col_type));
    desc.unit = column.unit.as_ref().map(to_foreign);
    desc.tzero = column_offset(element);

    let cell = &shape[1.min(shape.len())..];
    desc.tdim = match &column.data {
        ArrayData::Bytes { width, .. } if cell_len(shape) != 1 || cell.len() > 1 => {
            Some(std::iter::once(*width).chain(cell.iter().rev().copied()).collect())
        }
        _ if cell.len() > 1 => Some(cell.iter().rev().copied().collect()),
        _ => None,
    };

    let data = match &column.data {
        ArrayData::Bool(a) => ColumnData::Logical(a.iter().copied().collect()),
        ArrayData::U8(a) => ColumnData::Byte(a.iter().copied().collect()),
        ArrayData::I8(a) => ColumnData::Short(a.iter().map(|&x| i16::from(x)).collect()),
        ArrayData::I16(a) => ColumnData::Short(a.iter().copied().collect()),
        ArrayData::U16(a) => ColumnData::Int(a.iter().map(|&x| i32::from(x)).collect()),
        ArrayData::I32(a) => ColumnData::Int(a.iter().copied().collect()),
        ArrayData::U32(a) => ColumnData::Long(a.iter().map(|&x| i64::from(x)).collect()),
        ArrayData::U64(a) => ColumnData::Long(a.iter().map(|&x| (x ^ (1 << 63)) as i64).collect()),
        ArrayData::I64(a) => ColumnData::Long(a.iter().copied().collect()),
        ArrayData::F16(a) => ColumnData::Float(a.iter().map(|&h| f16_to_f32(h)).collect()),
        ArrayData::F32(a) => ColumnData::Float(a.iter().copied().collect()),
        ArrayData::F64(a) => ColumnData::Double(a.iter().copied().collect()),
        ArrayData::Complex64(a) => ColumnData::ComplexFloat(a.iter().copied().collect()),
        ArrayData::Complex128(a) => ColumnData::ComplexDouble(a.iter().copied().collect()),
        ArrayData::Bytes { values, .. } => ColumnData::Ascii(values.iter().cloned().collect()),
        ArrayData::Unicode { .. } => return Err(unsupported(&column.data)),
    };
    Ok((desc, data))
}

/// Widen an IEEE binary16 bit pattern.
pub fn f16_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits >> 15) << 31;
    let exponent = u32::from((bits >> 10) & 0x1F);
    let mantissa = u32::from(bits & 0x3FF);
    match exponent {
        0 => {
            // Subnormal: mantissa * 2^-24.
            let magnitude = mantissa as f32 / 16_777_216.0;
            if sign == 0 {
                magnitude
            } else {
                -magnitude
            }
        }
        0x1F => f32::from_bits(sign | 0x7F80_0000 | (mantissa << 13)),
        _ => f32::from_bits(sign | ((exponent + 112) << 23) | (mantissa << 13)),
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn provenance(secs: u64) -> String {
    format!("File written by fitsidi {}", format_timestamp(secs))
}

/// `YYYY-MM-DDTHH:MM` (UTC) for seconds since the Unix epoch.
pub fn format_timestamp(secs: u64) -> String {
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}",
        rem / 3_600,
        rem % 3_600 / 60
    )
}

/// Proleptic Gregorian date for a day count since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::IdiHeader;
    use crate::units::Unit;
    use fitsidi_codec::header::{card_string, find_card};
    use ndarray::{arr1, arr2, ArrayD, IxDyn};

    fn names(doc: &FitsDocument) -> Vec<Option<String>> {
        doc.hdus().iter().map(|h| h.name.clone()).collect()
    }

    #[test]
    fn timestamps() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00");
        assert_eq!(format_timestamp(951_782_400), "2000-02-29T00:00");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14T22:13");
        assert_eq!(format_timestamp(1_704_067_199), "2023-12-31T23:59");
        assert!(provenance(0).ends_with("fitsidi 1970-01-01T00:00"));
    }

    #[test]
    fn half_precision_widening() {
        assert_eq!(f16_to_f32(0x3C00), 1.0);
        assert_eq!(f16_to_f32(0xC000), -2.0);
        assert_eq!(f16_to_f32(0x7BFF), 65_504.0);
        assert_eq!(f16_to_f32(0x0001), 2f32.powi(-24));
        assert_eq!(f16_to_f32(0x7C00), f32::INFINITY);
        assert!(f16_to_f32(0x7E00).is_nan());
        assert_eq!(f16_to_f32(0x8000).to_bits(), (-0.0f32).to_bits());
    }

    #[test]
    fn first_extension_gets_a_placeholder_primary() {
        let mut list = IdiHduList::new();
        list.add_image_hdu("SCI", IdiHeader::new(), arr1(&[1.0f32, 2.0]).into_dyn())
            .unwrap();
        let doc = build(&list, Verbosity::SILENT).unwrap();
        assert_eq!(names(&doc), vec![None, Some("SCI".into())]);
        assert!(matches!(doc.hdus()[0].data, HduData::Empty));
        let history = find_card(&doc.hdus()[0].cards, "HISTORY").unwrap();
        assert!(history.comment.as_deref().unwrap().starts_with("File written by fitsidi "));
    }

    #[test]
    fn later_primary_replaces_the_placeholder() {
        let mut list = IdiHduList::new();
        list.add_image_hdu("SCI", IdiHeader::new(), arr1(&[1u8]).into_dyn())
            .unwrap();
        list.add_image_hdu("PRIMARY", IdiHeader::new(), arr1(&[2u8]).into_dyn())
            .unwrap();
        let doc = build(&list, Verbosity::SILENT).unwrap();
        assert_eq!(names(&doc), vec![Some("PRIMARY".into()), Some("SCI".into())]);
    }

    #[test]
    fn second_primary_displaces_the_first() {
        let mut list = IdiHduList::new();
        list.add_primary_hdu("A", IdiHeader::new()).unwrap();
        list.add_primary_hdu("B", IdiHeader::new()).unwrap();
        let doc = build(&list, Verbosity::SILENT).unwrap();
        assert_eq!(names(&doc), vec![Some("B".into()), Some("A".into())]);
    }

    #[test]
    fn empty_list_is_a_lone_primary() {
        let doc = build(&IdiHduList::new(), Verbosity::SILENT).unwrap();
        assert_eq!(doc.len(), 1);
        assert!(find_card(&doc.hdus()[0].cards, "HISTORY").is_some());
    }

    #[test]
    fn unsigned_images_carry_bzero() {
        let data = ArrayData::U16(arr2(&[[0u16, 1, 2], [3, 4, 65_535]]).into_dyn());
        match image_payload(&data).unwrap() {
            HduData::Image {
                naxes,
                data,
                scaling,
            } => {
                assert_eq!(naxes, vec![3, 2]);
                assert_eq!(scaling, Scaling::unsigned(16));
                assert_eq!(
                    data,
                    ImageData::I16(vec![-32_768, -32_767, -32_766, -32_765, -32_764, 32_767])
                );
            }
            other => panic!("expected an image, got {other:?}"),
        }
    }

    #[test]
    fn scalar_image_becomes_one_pixel() {
        let data = ArrayData::F64(ArrayD::from_elem(IxDyn(&[]), 2.5));
        match image_payload(&data).unwrap() {
            HduData::Image { naxes, .. } => assert_eq!(naxes, vec![1]),
            other => panic!("expected an image, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_image_types_name_the_unit() {
        let mut list = IdiHduList::new();
        list.add_image_hdu("MASK", IdiHeader::new(), arr1(&[true, false]).into_dyn())
            .unwrap();
        match build(&list, Verbosity::SILENT) {
            Err(Error::UnsupportedType {
                unit,
                column: None,
                element,
            }) => {
                assert_eq!(unit, "MASK");
                assert_eq!(element, "bool");
            }
            other => panic!("expected UnsupportedType, got {other:?}"),
        }
    }

    #[test]
    fn columns_get_codes_units_and_dims() {
        let mut table = IdiTableHdu::default();
        table
            .add_column(
                IdiColumn::new("VEL", arr1(&[1.0f64, 2.0]).into_dyn())
                    .with_unit(Unit::parse_generic("km / s")),
            )
            .unwrap();
        table
            .add_column(IdiColumn::new(
                "SPECTRUM",
                ArrayD::from_shape_vec(IxDyn(&[2, 5]), vec![0.0f64; 10]).unwrap(),
            ))
            .unwrap();
        table
            .add_column(IdiColumn::new(
                "CUBE",
                ArrayD::from_shape_vec(IxDyn(&[2, 2, 3]), (0..12).collect::<Vec<i16>>()).unwrap(),
            ))
            .unwrap();
        table
            .add_column(IdiColumn::new("BIG", arr1(&[0u64, u64::MAX]).into_dyn()))
            .unwrap();
        table
            .add_column(IdiColumn::new(
                "TAGS",
                ArrayData::bytes(
                    ArrayD::from_shape_vec(
                        IxDyn(&[2, 3]),
                        ["a", "bb", "ccc", "d", "", "f"].map(String::from).to_vec(),
                    )
                    .unwrap(),
                ),
            ))
            .unwrap();

        let t = table_payload("CAT", &table).unwrap();
        let column = |name: &str| &t.column(name).unwrap().descriptor;
        assert_eq!(column("VEL").tform.to_string(), "D");
        assert_eq!(column("VEL").unit.as_deref(), Some("km s-1"));
        assert_eq!(column("SPECTRUM").tform.to_string(), "5D");
        assert_eq!(column("SPECTRUM").tdim, None);
        assert_eq!(column("CUBE").tform.to_string(), "6I");
        assert_eq!(column("CUBE").tdim, Some(vec![3, 2]));
        assert_eq!(column("BIG").tzero, Some(typecode::U64_OFFSET));
        assert_eq!(
            t.column("BIG").unwrap().data,
            ColumnData::Long(vec![i64::MIN, i64::MAX])
        );
        assert_eq!(column("TAGS").tform.to_string(), "9A");
        assert_eq!(column("TAGS").tdim, Some(vec![3, 3]));
        t.validate().unwrap();
    }

    #[test]
    fn unicode_columns_are_rejected_by_name() {
        let mut table = IdiTableHdu::default();
        table
            .add_column(IdiColumn::new(
                "LABEL",
                ArrayData::unicode(arr1(&["\u{3b1}".to_string()]).into_dyn()),
            ))
            .unwrap();
        match table_payload("EVENTS", &table) {
            Err(Error::UnsupportedType { unit, column, .. }) => {
                assert_eq!(unit, "EVENTS");
                assert_eq!(column.as_deref(), Some("LABEL"));
            }
            other => panic!("expected UnsupportedType, got {other:?}"),
        }
    }

    #[test]
    fn reserved_entries_are_not_written() {
        let mut header = IdiHeader::new();
        header.insert("OBJECT", "M31", "target");
        header.insert("NAXIS", 7i64, "");
        let mut list = IdiHduList::new();
        list.add_primary_hdu("PRIMARY", header).unwrap();
        let doc = build(&list, Verbosity::ALL).unwrap();
        let cards = &doc.hdus()[0].cards;
        assert_eq!(card_string(cards, "OBJECT").as_deref(), Some("M31"));
        assert!(find_card(cards, "NAXIS").is_none());
    }

    #[test]
    fn unwritable_values_fail_the_build_with_the_unit_name() {
        let mut table = IdiTableHdu::default();
        table
            .add_column(IdiColumn::new(
                "NAME",
                ArrayData::bytes(arr1(&["caf\u{e9}".to_string()]).into_dyn()),
            ))
            .unwrap();
        let mut list = IdiHduList::new();
        list.add_table_hdu("EVENTS", table).unwrap();
        match build(&list, Verbosity::SILENT) {
            Err(Error::InUnit { unit, source }) => {
                assert_eq!(unit, "EVENTS");
                assert!(matches!(*source, Error::Fits(_)));
            }
            other => panic!("expected InUnit, got {other:?}"),
        }

        let mut header = IdiHeader::new();
        header.insert("GAIN", f64::NAN, "");
        let mut list = IdiHduList::new();
        list.add_image_hdu("SCI", header, arr1(&[1.0f32]).into_dyn())
            .unwrap();
        let err = build(&list, Verbosity::SILENT).unwrap_err();
        assert!(matches!(&err, Error::InUnit { unit, .. } if unit == "SCI"));
        assert!(err.to_string().contains("non-finite"));
    }
}
