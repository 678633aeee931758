//! FITS ASCII table extension reading.
//!
//! ASCII tables are decoded into the same [`Table`] model as binary tables:
//! `Aw` fields become `A` columns, `Iw` fields 64-bit integers and
//! `Fw.d`/`Ew.d`/`Dw.d` fields doubles.

use crate::bintable::{describe_column, ColumnData, ColumnType, Table, Tform};
use crate::error::{Error, Result};
use crate::hdu::{Hdu, HduInfo};
use crate::header::{card_integer, card_string};
use crate::value::parse_float_str;

/// An ASCII table field format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsciiFormat {
    /// Aw -- character string of width w.
    Character(usize),
    /// Iw -- integer of width w.
    Integer(usize),
    /// Fw.d -- fixed-point float.
    Fixed(usize, usize),
    /// Ew.d -- exponential float.
    Exponential(usize, usize),
    /// Dw.d -- double-precision exponential float.
    DoubleExponential(usize, usize),
}

impl AsciiFormat {
    pub fn width(&self) -> usize {
        match *self {
            AsciiFormat::Character(w) | AsciiFormat::Integer(w) => w,
            AsciiFormat::Fixed(w, _)
            | AsciiFormat::Exponential(w, _)
            | AsciiFormat::DoubleExponential(w, _) => w,
        }
    }

    /// Parse a TFORMn value of an ASCII table.
    pub fn parse(s: &str) -> Result<AsciiFormat> {
        let s = s.trim();
        let mut chars = s.chars();
        let code = chars
            .next()
            .ok_or_else(|| Error::UnsupportedColumn(s.to_string()))?;
        let rest = chars.as_str();
        let (w, d) = match rest.split_once('.') {
            Some((w, d)) => (w, Some(d)),
            None => (rest, None),
        };
        let w = w
            .parse::<usize>()
            .map_err(|_| Error::InvalidValue("ASCII TFORM width"))?;
        let d = match d {
            Some(d) => d
                .parse::<usize>()
                .map_err(|_| Error::InvalidValue("ASCII TFORM decimals"))?,
            None => 0,
        };
        Ok(match code {
            'A' => AsciiFormat::Character(w),
            'I' => AsciiFormat::Integer(w),
            'F' => AsciiFormat::Fixed(w, d),
            'E' => AsciiFormat::Exponential(w, d),
            'D' => AsciiFormat::DoubleExponential(w, d),
            _ => return Err(Error::UnsupportedColumn(s.to_string())),
        })
    }

    fn column_tform(&self) -> Tform {
        match *self {
            AsciiFormat::Character(w) => Tform::new(w, ColumnType::Ascii),
            AsciiFormat::Integer(_) => Tform::new(1, ColumnType::Long),
            _ => Tform::new(1, ColumnType::Double),
        }
    }
}

/// Read every column of an ASCII table HDU.
pub fn read_ascii_table(fits_data: &[u8], hdu: &Hdu) -> Result<Table> {
    let (naxis1, naxis2, tfields) = match &hdu.info {
        HduInfo::AsciiTable {
            naxis1,
            naxis2,
            tfields,
        } => (*naxis1, *naxis2, *tfields),
        _ => return Err(Error::InvalidHeader("not an ASCII table HDU")),
    };
    let data = hdu.data(fits_data)?;
    if data.len() < naxis1 * naxis2 {
        return Err(Error::UnexpectedEof);
    }

    let mut table = Table::new(naxis2);
    for n in 1..=tfields {
        let tbcol = card_integer(&hdu.cards, &format!("TBCOL{n}"))
            .ok_or(Error::MissingKeyword("TBCOLn"))?;
        let tform = card_string(&hdu.cards, &format!("TFORM{n}"))
            .ok_or(Error::MissingKeyword("TFORMn"))?;
        let format = AsciiFormat::parse(&tform)?;
        let start = usize::try_from(tbcol - 1)
            .map_err(|_| Error::InvalidValue("TBCOL must be positive"))?;
        let end = start + format.width();
        if end > naxis1 {
            return Err(Error::InvalidHeader("ASCII column extends past NAXIS1"));
        }

        let fields = (0..naxis2).map(|row| {
            let bytes = &data[row * naxis1 + start..row * naxis1 + end];
            String::from_utf8_lossy(bytes).into_owned()
        });
        let values = match format {
            AsciiFormat::Character(_) => {
                ColumnData::Ascii(fields.map(|f| f.trim_end().to_string()).collect())
            }
            AsciiFormat::Integer(_) => ColumnData::Long(
                fields
                    .map(|f| parse_integer_field(&f))
                    .collect::<Result<_>>()?,
            ),
            AsciiFormat::Fixed(_, d)
            | AsciiFormat::Exponential(_, d)
            | AsciiFormat::DoubleExponential(_, d) => ColumnData::Double(
                fields
                    .map(|f| parse_float_field(&f, d))
                    .collect::<Result<_>>()?,
            ),
        };

        let mut descriptor = describe_column(&hdu.cards, n, format.column_tform());
        descriptor.tdim = None;
        table.push(descriptor, values);
    }
    Ok(table)
}

/// Blank integer fields read as zero.
fn parse_integer_field(field: &str) -> Result<i64> {
    let text = field.trim();
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<i64>()
        .map_err(|_| Error::InvalidValue("malformed integer field in ASCII table"))
}

/// Blank float fields read as NaN. A mantissa without a decimal point has
/// `decimals` implied fractional digits.
fn parse_float_field(field: &str, decimals: usize) -> Result<f64> {
    let text = field.trim();
    if text.is_empty() {
        return Ok(f64::NAN);
    }
    let mantissa = &text[..text.find(['E', 'e', 'D', 'd']).unwrap_or(text.len())];
    let value =
        parse_float_str(text).ok_or(Error::InvalidValue("malformed float field in ASCII table"))?;
    if mantissa.contains('.') || decimals == 0 {
        return Ok(value);
    }
    Ok(value / 10f64.powi(decimals as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{pad_to_block, DATA_PAD_BYTE};
    use crate::hdu::parse_fits;
    use crate::header::{serialize_header, Card};
    use crate::value::Value;

    #[test]
    fn parse_formats() {
        assert_eq!(AsciiFormat::parse("A8").unwrap(), AsciiFormat::Character(8));
        assert_eq!(AsciiFormat::parse("I6").unwrap(), AsciiFormat::Integer(6));
        assert_eq!(AsciiFormat::parse("F10.4").unwrap(), AsciiFormat::Fixed(10, 4));
        assert_eq!(
            AsciiFormat::parse("E12.5").unwrap(),
            AsciiFormat::Exponential(12, 5)
        );
        assert_eq!(
            AsciiFormat::parse("D25.17").unwrap(),
            AsciiFormat::DoubleExponential(25, 17)
        );
        assert!(AsciiFormat::parse("Q4").is_err());
    }

    #[test]
    fn float_field_rules() {
        assert!(parse_float_field("     ", 2).unwrap().is_nan());
        assert_eq!(parse_float_field("  1.25", 2).unwrap(), 1.25);
        assert_eq!(parse_float_field(" 12345", 2).unwrap(), 123.45);
        assert_eq!(parse_float_field("1.5D2", 3).unwrap(), 150.0);
        assert!(parse_float_field("abc", 0).is_err());
    }

    #[test]
    fn integer_field_rules() {
        assert_eq!(parse_integer_field("   42").unwrap(), 42);
        assert_eq!(parse_integer_field("     ").unwrap(), 0);
        assert!(parse_integer_field(" 4x2").is_err());
    }

    #[test]
    fn read_small_ascii_table() {
        let mut bytes = serialize_header(&[
            Card::new("SIMPLE", Value::Logical(true)),
            Card::new("BITPIX", Value::Integer(8)),
            Card::new("NAXIS", Value::Integer(0)),
        ])
        .unwrap();
        bytes.extend(
            serialize_header(&[
                Card::new("XTENSION", Value::String("TABLE".into())),
                Card::new("BITPIX", Value::Integer(8)),
                Card::new("NAXIS", Value::Integer(2)),
                Card::new("NAXIS1", Value::Integer(16)),
                Card::new("NAXIS2", Value::Integer(2)),
                Card::new("PCOUNT", Value::Integer(0)),
                Card::new("GCOUNT", Value::Integer(1)),
                Card::new("TFIELDS", Value::Integer(3)),
                Card::new("TTYPE1", Value::String("NAME".into())),
                Card::new("TBCOL1", Value::Integer(1)),
                Card::new("TFORM1", Value::String("A4".into())),
                Card::new("TTYPE2", Value::String("COUNT".into())),
                Card::new("TBCOL2", Value::Integer(5)),
                Card::new("TFORM2", Value::String("I4".into())),
                Card::new("TTYPE3", Value::String("FLUX".into())),
                Card::new("TBCOL3", Value::Integer(9)),
                Card::new("TFORM3", Value::String("F8.2".into())),
                Card::new("TUNIT3", Value::String("Jy".into())),
            ])
            .unwrap(),
        );
        let rows: [&[u8]; 2] = [b"abc   12   1.50 ", b"xy    -3        "];
        bytes.extend(rows.concat());
        pad_to_block(&mut bytes, DATA_PAD_BYTE);

        let fits = parse_fits(&bytes).unwrap();
        let table = read_ascii_table(&bytes, &fits.hdus[1]).unwrap();
        assert_eq!(table.nrows, 2);
        assert_eq!(
            table.column("NAME").unwrap().data,
            ColumnData::Ascii(vec!["abc".into(), "xy".into()])
        );
        assert_eq!(
            table.column("COUNT").unwrap().data,
            ColumnData::Long(vec![12, -3])
        );
        let flux = table.column("FLUX").unwrap();
        assert_eq!(flux.descriptor.unit.as_deref(), Some("Jy"));
        match &flux.data {
            ColumnData::Double(v) => {
                assert_eq!(v[0], 1.5);
                assert!(v[1].is_nan());
            }
            other => panic!("expected doubles, got {other:?}"),
        }
    }
}
