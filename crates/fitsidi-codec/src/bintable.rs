//! FITS binary table extension reading and writing.

use core::fmt;

use bytemuck::pod_collect_to_vec;

use crate::error::{Error, Result};
use crate::hdu::{Hdu, HduInfo};
use crate::header::{card_float, card_string, Card};
use crate::value::Value;

/// The data type of a column in a FITS binary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// L -- logical, stored as a single byte (T/F/0).
    Logical,
    /// X -- bit array.
    Bit,
    /// B -- unsigned byte.
    Byte,
    /// I -- 16-bit signed integer.
    Short,
    /// J -- 32-bit signed integer.
    Int,
    /// K -- 64-bit signed integer.
    Long,
    /// E -- 32-bit IEEE float.
    Float,
    /// D -- 64-bit IEEE float.
    Double,
    /// C -- complex: pair of 32-bit IEEE floats.
    ComplexFloat,
    /// M -- complex: pair of 64-bit IEEE floats.
    ComplexDouble,
    /// A -- ASCII character.
    Ascii,
    /// P -- 32-bit variable-length array descriptor, with the element code.
    VarArrayP(u8),
    /// Q -- 64-bit variable-length array descriptor, with the element code.
    VarArrayQ(u8),
}

impl ColumnType {
    /// The TFORM letter for this type.
    pub fn code(self) -> char {
        match self {
            ColumnType::Logical => 'L',
            ColumnType::Bit => 'X',
            ColumnType::Byte => 'B',
            ColumnType::Short => 'I',
            ColumnType::Int => 'J',
            ColumnType::Long => 'K',
            ColumnType::Float => 'E',
            ColumnType::Double => 'D',
            ColumnType::ComplexFloat => 'C',
            ColumnType::ComplexDouble => 'M',
            ColumnType::Ascii => 'A',
            ColumnType::VarArrayP(_) => 'P',
            ColumnType::VarArrayQ(_) => 'Q',
        }
    }

    /// The fixed-width type for a TFORM letter (`P`/`Q` excluded).
    pub fn from_code(code: char) -> Option<ColumnType> {
        Some(match code {
            'L' => ColumnType::Logical,
            'X' => ColumnType::Bit,
            'B' => ColumnType::Byte,
            'I' => ColumnType::Short,
            'J' => ColumnType::Int,
            'K' => ColumnType::Long,
            'E' => ColumnType::Float,
            'D' => ColumnType::Double,
            'C' => ColumnType::ComplexFloat,
            'M' => ColumnType::ComplexDouble,
            'A' => ColumnType::Ascii,
            _ => return None,
        })
    }

    /// Bytes per element. `Bit` columns are sized by [`Tform::byte_width`].
    pub fn element_size(self) -> usize {
        match self {
            ColumnType::Bit => 0,
            ColumnType::Logical | ColumnType::Byte | ColumnType::Ascii => 1,
            ColumnType::Short => 2,
            ColumnType::Int | ColumnType::Float => 4,
            ColumnType::Long | ColumnType::Double | ColumnType::ComplexFloat => 8,
            ColumnType::VarArrayP(_) => 8,
            ColumnType::ComplexDouble | ColumnType::VarArrayQ(_) => 16,
        }
    }
}

/// A parsed TFORMn value: repeat count and element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tform {
    pub repeat: usize,
    pub col_type: ColumnType,
}

impl Tform {
    pub fn new(repeat: usize, col_type: ColumnType) -> Self {
        Tform { repeat, col_type }
    }

    /// Parse a TFORMn value like "1J", "10E", "20A", "1024X", "1PB(200)".
    pub fn parse(s: &str) -> Result<Tform> {
        let s = s.trim();
        let s = s.split_once('(').map_or(s, |(head, _)| head);
        let digits = s.bytes().take_while(u8::is_ascii_digit).count();
        let repeat = if digits == 0 {
            1
        } else {
            s[..digits]
                .parse::<usize>()
                .map_err(|_| Error::InvalidValue("TFORM repeat count"))?
        };

        let mut rest = s[digits..].chars();
        let code = rest
            .next()
            .ok_or_else(|| Error::UnsupportedColumn(s.to_string()))?;
        let col_type = match code {
            'P' | 'Q' => {
                let elem = rest
                    .next()
                    .filter(|&c| c != 'P' && c != 'Q' && ColumnType::from_code(c).is_some())
                    .ok_or_else(|| Error::UnsupportedColumn(s.to_string()))?;
                if code == 'P' {
                    ColumnType::VarArrayP(elem as u8)
                } else {
                    ColumnType::VarArrayQ(elem as u8)
                }
            }
            other => ColumnType::from_code(other)
                .ok_or_else(|| Error::UnsupportedColumn(s.to_string()))?,
        };
        Ok(Tform { repeat, col_type })
    }

    /// Bytes this column occupies in each row.
    pub fn byte_width(&self) -> usize {
        match self.col_type {
            ColumnType::Bit => self.repeat.div_ceil(8),
            other => self.repeat * other.element_size(),
        }
    }
}

impl fmt::Display for Tform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.repeat != 1 {
            write!(f, "{}", self.repeat)?;
        }
        write!(f, "{}", self.col_type.code())?;
        match self.col_type {
            ColumnType::VarArrayP(elem) | ColumnType::VarArrayQ(elem) => {
                write!(f, "{}", elem as char)
            }
            _ => Ok(()),
        }
    }
}

/// Describes one column in a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Column name (TTYPEn), empty when absent.
    pub name: String,
    pub tform: Tform,
    /// Physical unit (TUNITn).
    pub unit: Option<String>,
    /// Zero point (TZEROn): `physical = tzero + tscal * stored`.
    pub tzero: Option<f64>,
    /// Scale factor (TSCALn).
    pub tscal: Option<f64>,
    /// Cell dimensions (TDIMn), fastest-varying first.
    pub tdim: Option<Vec<usize>>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, tform: Tform) -> Self {
        ColumnDescriptor {
            name: name.into(),
            tform,
            unit: None,
            tzero: None,
            tscal: None,
            tdim: None,
        }
    }

    /// Character width of a single string in an `A` column.
    pub fn string_width(&self) -> usize {
        match (&self.tdim, self.tform.col_type) {
            (Some(dims), ColumnType::Ascii) if !dims.is_empty() => dims[0],
            _ => self.tform.repeat,
        }
    }

    /// Number of values each row contributes to [`ColumnData`].
    pub fn values_per_row(&self) -> usize {
        if self.tform.col_type == ColumnType::Ascii {
            let width = self.string_width();
            if width == 0 {
                1
            } else {
                self.tform.repeat / width
            }
        } else {
            self.tform.repeat
        }
    }
}

/// Column values for all rows, flattened row by row.
///
/// Bit (`X`) columns decode to `Logical`, one bool per bit.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Logical(Vec<bool>),
    Byte(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    ComplexFloat(Vec<(f32, f32)>),
    ComplexDouble(Vec<(f64, f64)>),
    Ascii(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Logical(v) => v.len(),
            ColumnData::Byte(v) => v.len(),
            ColumnData::Short(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Long(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::ComplexFloat(v) => v.len(),
            ColumnData::ComplexDouble(v) => v.len(),
            ColumnData::Ascii(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matches(&self, col_type: ColumnType) -> bool {
        matches!(
            (self, col_type),
            (ColumnData::Logical(_), ColumnType::Logical | ColumnType::Bit)
                | (ColumnData::Byte(_), ColumnType::Byte)
                | (ColumnData::Short(_), ColumnType::Short)
                | (ColumnData::Int(_), ColumnType::Int)
                | (ColumnData::Long(_), ColumnType::Long)
                | (ColumnData::Float(_), ColumnType::Float)
                | (ColumnData::Double(_), ColumnType::Double)
                | (ColumnData::ComplexFloat(_), ColumnType::ComplexFloat)
                | (ColumnData::ComplexDouble(_), ColumnType::ComplexDouble)
                | (ColumnData::Ascii(_), ColumnType::Ascii)
        )
    }
}

/// A column descriptor paired with its data.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub descriptor: ColumnDescriptor,
    pub data: ColumnData,
}

/// A decoded (or to-be-encoded) table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub nrows: usize,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(nrows: usize) -> Self {
        Table {
            nrows,
            columns: Vec::new(),
        }
    }

    pub fn push(&mut self, descriptor: ColumnDescriptor, data: ColumnData) {
        self.columns.push(Column { descriptor, data });
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.descriptor.name == name)
    }

    /// Bytes per row (NAXIS1).
    pub fn row_width(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.descriptor.tform.byte_width())
            .sum()
    }

    /// Check that every column can be written: fixed-width type, data of the
    /// declared type, and exactly `nrows` rows of values.
    pub fn validate(&self) -> Result<()> {
        for column in &self.columns {
            let desc = &column.descriptor;
            if matches!(
                desc.tform.col_type,
                ColumnType::VarArrayP(_) | ColumnType::VarArrayQ(_)
            ) {
                return Err(Error::UnsupportedColumn(desc.tform.to_string()));
            }
            if !column.data.matches(desc.tform.col_type) {
                return Err(Error::InvalidValue("column data does not match TFORM"));
            }
            if column.data.len() != self.nrows * desc.values_per_row() {
                return Err(Error::InvalidValue("column length does not match row count"));
            }
        }
        Ok(())
    }

    /// Structural and column-description cards for a BINTABLE extension.
    pub fn header_cards(&self) -> Result<Vec<Card>> {
        self.validate()?;
        let mut cards = vec![
            Card::new("XTENSION", Value::String("BINTABLE".into()))
                .with_comment("binary table extension"),
            Card::new("BITPIX", Value::Integer(8)),
            Card::new("NAXIS", Value::Integer(2)),
            Card::new("NAXIS1", Value::Integer(self.row_width() as i64))
                .with_comment("width of table in bytes"),
            Card::new("NAXIS2", Value::Integer(self.nrows as i64))
                .with_comment("number of rows in table"),
            Card::new("PCOUNT", Value::Integer(0)),
            Card::new("GCOUNT", Value::Integer(1)),
            Card::new("TFIELDS", Value::Integer(self.columns.len() as i64)),
        ];

        for (i, column) in self.columns.iter().enumerate() {
            let n = i + 1;
            let desc = &column.descriptor;
            if !desc.name.is_empty() {
                cards.push(Card::new(format!("TTYPE{n}"), Value::String(desc.name.clone())));
            }
            cards.push(Card::new(
                format!("TFORM{n}"),
                Value::String(desc.tform.to_string()),
            ));
            if let Some(unit) = desc.unit.as_ref().filter(|u| !u.is_empty()) {
                cards.push(Card::new(format!("TUNIT{n}"), Value::String(unit.clone())));
            }
            if let Some(tzero) = desc.tzero {
                cards.push(Card::new(format!("TZERO{n}"), scale_value(tzero)));
            }
            if let Some(tscal) = desc.tscal {
                cards.push(Card::new(format!("TSCAL{n}"), scale_value(tscal)));
            }
            if let Some(dims) = &desc.tdim {
                cards.push(Card::new(
                    format!("TDIM{n}"),
                    Value::String(format_tdim(dims)),
                ));
            }
        }
        Ok(cards)
    }

    /// Encode all rows as the (unpadded) data segment.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let encoded: Vec<(usize, Vec<u8>)> = self
            .columns
            .iter()
            .map(|c| Ok((c.descriptor.tform.byte_width(), encode_column(c, self.nrows)?)))
            .collect::<Result<_>>()?;

        let mut out = Vec::with_capacity(self.row_width() * self.nrows);
        for row in 0..self.nrows {
            for (width, bytes) in &encoded {
                out.extend_from_slice(&bytes[row * width..(row + 1) * width]);
            }
        }
        Ok(out)
    }
}

/// TZERO/TSCAL as an integer card when exactly representable.
pub(crate) fn scale_value(v: f64) -> Value {
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < 9_223_372_036_854_775_808.0 {
        Value::Integer(v as i64)
    } else {
        Value::Float(v)
    }
}

pub fn format_tdim(dims: &[usize]) -> String {
    let parts: Vec<String> = dims.iter().map(usize::to_string).collect();
    format!("({})", parts.join(","))
}

pub fn parse_tdim(s: &str) -> Option<Vec<usize>> {
    let inner = s.trim().strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(|p| p.trim().parse::<usize>().ok())
        .collect()
}

// ── Reading ──

/// Build a descriptor from the TTYPE/TUNIT/TZERO/TSCAL/TDIM cards of
/// column `n` (1-based).
pub(crate) fn describe_column(cards: &[Card], n: usize, tform: Tform) -> ColumnDescriptor {
    ColumnDescriptor {
        name: card_string(cards, &format!("TTYPE{n}")).unwrap_or_default(),
        tform,
        unit: card_string(cards, &format!("TUNIT{n}")).filter(|u| !u.is_empty()),
        tzero: card_float(cards, &format!("TZERO{n}")),
        tscal: card_float(cards, &format!("TSCAL{n}")),
        tdim: card_string(cards, &format!("TDIM{n}")).and_then(|s| parse_tdim(&s)),
    }
}

/// Parse the column descriptors of a binary table header.
pub fn parse_columns(cards: &[Card], tfields: usize) -> Result<Vec<ColumnDescriptor>> {
    (1..=tfields)
        .map(|n| {
            let tform = card_string(cards, &format!("TFORM{n}"))
                .ok_or(Error::MissingKeyword("TFORMn"))?;
            Ok(describe_column(cards, n, Tform::parse(&tform)?))
        })
        .collect()
}

/// Read every column of a binary table HDU.
pub fn read_binary_table(fits_data: &[u8], hdu: &Hdu) -> Result<Table> {
    let (naxis1, naxis2, tfields) = match &hdu.info {
        HduInfo::BinaryTable {
            naxis1,
            naxis2,
            tfields,
            ..
        } => (*naxis1, *naxis2, *tfields),
        _ => return Err(Error::InvalidHeader("not a binary table HDU")),
    };
    let descriptors = parse_columns(&hdu.cards, tfields)?;
    let total: usize = descriptors.iter().map(|d| d.tform.byte_width()).sum();
    if total > naxis1 {
        return Err(Error::InvalidHeader("columns wider than NAXIS1"));
    }
    let data = hdu.data(fits_data)?;
    if data.len() < naxis1 * naxis2 {
        return Err(Error::UnexpectedEof);
    }

    let mut table = Table::new(naxis2);
    let mut offset = 0;
    for desc in descriptors {
        let width = desc.tform.byte_width();
        let raw = gather_column(data, naxis1, naxis2, offset, width);
        offset += width;
        let values = decode_column(&raw, &desc, naxis2)?;
        table.push(desc, values);
    }
    Ok(table)
}

/// Copy one column's bytes out of the row-interleaved data segment.
pub(crate) fn gather_column(
    data: &[u8],
    row_len: usize,
    nrows: usize,
    offset: usize,
    width: usize,
) -> Vec<u8> {
    let mut raw = Vec::with_capacity(nrows * width);
    for row in 0..nrows {
        let start = row * row_len + offset;
        raw.extend_from_slice(&data[start..start + width]);
    }
    raw
}

fn decode_column(raw: &[u8], desc: &ColumnDescriptor, nrows: usize) -> Result<ColumnData> {
    match desc.tform.col_type {
        ColumnType::Bit => {
            let width = desc.tform.byte_width();
            let mut bits = Vec::with_capacity(nrows * desc.tform.repeat);
            for row in raw.chunks_exact(width.max(1)).take(nrows) {
                for i in 0..desc.tform.repeat {
                    bits.push(row[i / 8] >> (7 - i % 8) & 1 == 1);
                }
            }
            Ok(ColumnData::Logical(bits))
        }
        ColumnType::Ascii => {
            let width = desc.string_width();
            let per_row = desc.values_per_row();
            let row_width = desc.tform.repeat;
            let mut strings = Vec::with_capacity(nrows * per_row);
            for row in 0..nrows {
                let cell = &raw[row * row_width..(row + 1) * row_width];
                for k in 0..per_row {
                    let bytes = cell.get(k * width..(k + 1) * width).unwrap_or(&[]);
                    strings.push(decode_string(bytes));
                }
            }
            Ok(ColumnData::Ascii(strings))
        }
        ColumnType::VarArrayP(_) | ColumnType::VarArrayQ(_) => {
            Err(Error::UnsupportedColumn(desc.tform.to_string()))
        }
        other => decode_numeric(raw, other),
    }
}

fn decode_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

/// Decode contiguous big-endian elements of a fixed-width numeric or
/// logical type.
pub(crate) fn decode_numeric(raw: &[u8], col_type: ColumnType) -> Result<ColumnData> {
    Ok(match col_type {
        ColumnType::Logical => ColumnData::Logical(raw.iter().map(|&b| b == b'T').collect()),
        ColumnType::Byte => ColumnData::Byte(raw.to_vec()),
        ColumnType::Short => {
            let v: Vec<i16> = pod_collect_to_vec(raw);
            ColumnData::Short(v.into_iter().map(i16::from_be).collect())
        }
        ColumnType::Int => {
            let v: Vec<i32> = pod_collect_to_vec(raw);
            ColumnData::Int(v.into_iter().map(i32::from_be).collect())
        }
        ColumnType::Long => {
            let v: Vec<i64> = pod_collect_to_vec(raw);
            ColumnData::Long(v.into_iter().map(i64::from_be).collect())
        }
        ColumnType::Float => ColumnData::Float(be_f32(raw)),
        ColumnType::Double => ColumnData::Double(be_f64(raw)),
        ColumnType::ComplexFloat => {
            let v = be_f32(raw);
            ColumnData::ComplexFloat(v.chunks_exact(2).map(|p| (p[0], p[1])).collect())
        }
        ColumnType::ComplexDouble => {
            let v = be_f64(raw);
            ColumnData::ComplexDouble(v.chunks_exact(2).map(|p| (p[0], p[1])).collect())
        }
        other => return Err(Error::UnsupportedColumn(other.code().to_string())),
    })
}

fn be_f32(raw: &[u8]) -> Vec<f32> {
    let bits: Vec<u32> = pod_collect_to_vec(raw);
    bits.into_iter()
        .map(|b| f32::from_bits(u32::from_be(b)))
        .collect()
}

fn be_f64(raw: &[u8]) -> Vec<f64> {
    let bits: Vec<u64> = pod_collect_to_vec(raw);
    bits.into_iter()
        .map(|b| f64::from_bits(u64::from_be(b)))
        .collect()
}

// ── Writing ──

fn encode_column(column: &Column, nrows: usize) -> Result<Vec<u8>> {
    let desc = &column.descriptor;
    Ok(match &column.data {
        ColumnData::Logical(v) if desc.tform.col_type == ColumnType::Bit => {
            let width = desc.tform.byte_width();
            let mut out = vec![0u8; nrows * width];
            for row in 0..nrows {
                for i in 0..desc.tform.repeat {
                    if v[row * desc.tform.repeat + i] {
                        out[row * width + i / 8] |= 0x80 >> (i % 8);
                    }
                }
            }
            out
        }
        ColumnData::Logical(v) => v.iter().map(|&b| if b { b'T' } else { b'F' }).collect(),
        ColumnData::Byte(v) => v.clone(),
        ColumnData::Short(v) => {
            let be: Vec<i16> = v.iter().map(|x| x.to_be()).collect();
            pod_collect_to_vec(&be)
        }
        ColumnData::Int(v) => {
            let be: Vec<i32> = v.iter().map(|x| x.to_be()).collect();
            pod_collect_to_vec(&be)
        }
        ColumnData::Long(v) => {
            let be: Vec<i64> = v.iter().map(|x| x.to_be()).collect();
            pod_collect_to_vec(&be)
        }
        ColumnData::Float(v) => {
            let be: Vec<u32> = v.iter().map(|x| x.to_bits().to_be()).collect();
            pod_collect_to_vec(&be)
        }
        ColumnData::Double(v) => {
            let be: Vec<u64> = v.iter().map(|x| x.to_bits().to_be()).collect();
            pod_collect_to_vec(&be)
        }
        ColumnData::ComplexFloat(v) => {
            let be: Vec<u32> = v
                .iter()
                .flat_map(|&(re, im)| [re.to_bits().to_be(), im.to_bits().to_be()])
                .collect();
            pod_collect_to_vec(&be)
        }
        ColumnData::ComplexDouble(v) => {
            let be: Vec<u64> = v
                .iter()
                .flat_map(|&(re, im)| [re.to_bits().to_be(), im.to_bits().to_be()])
                .collect();
            pod_collect_to_vec(&be)
        }
        ColumnData::Ascii(v) => {
            let width = desc.string_width();
            let row_width = desc.tform.repeat;
            let per_row = desc.values_per_row();
            let mut out = vec![b' '; nrows * row_width];
            for (i, s) in v.iter().enumerate() {
                if !s.is_ascii() {
                    return Err(Error::InvalidValue("string column value is not ASCII"));
                }
                if s.len() > width {
                    return Err(Error::InvalidValue("string longer than column width"));
                }
                let start = (i / per_row) * row_width + (i % per_row) * width;
                out[start..start + s.len()].copy_from_slice(s.as_bytes());
            }
            out
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tform_variants() {
        assert_eq!(Tform::parse("1J").unwrap(), Tform::new(1, ColumnType::Int));
        assert_eq!(Tform::parse("D").unwrap(), Tform::new(1, ColumnType::Double));
        assert_eq!(Tform::parse("20A").unwrap(), Tform::new(20, ColumnType::Ascii));
        assert_eq!(Tform::parse(" 16X ").unwrap(), Tform::new(16, ColumnType::Bit));
        assert_eq!(
            Tform::parse("1PB(200)").unwrap(),
            Tform::new(1, ColumnType::VarArrayP(b'B'))
        );
        assert_eq!(
            Tform::parse("QJ").unwrap(),
            Tform::new(1, ColumnType::VarArrayQ(b'J'))
        );
    }

    #[test]
    fn parse_tform_rejects_unknown_codes() {
        assert!(matches!(Tform::parse("3Z"), Err(Error::UnsupportedColumn(_))));
        assert!(matches!(Tform::parse(""), Err(Error::UnsupportedColumn(_))));
        assert!(matches!(Tform::parse("1PZ"), Err(Error::UnsupportedColumn(_))));
    }

    #[test]
    fn tform_display_omits_unit_repeat() {
        assert_eq!(Tform::new(1, ColumnType::Double).to_string(), "D");
        assert_eq!(Tform::new(5, ColumnType::Double).to_string(), "5D");
        assert_eq!(Tform::new(0, ColumnType::Int).to_string(), "0J");
        assert_eq!(
            Tform::new(1, ColumnType::VarArrayP(b'E')).to_string(),
            "PE"
        );
    }

    #[test]
    fn byte_widths() {
        assert_eq!(Tform::new(3, ColumnType::ComplexDouble).byte_width(), 48);
        assert_eq!(Tform::new(9, ColumnType::Bit).byte_width(), 2);
        assert_eq!(Tform::new(12, ColumnType::Ascii).byte_width(), 12);
    }

    #[test]
    fn tdim_parse_and_format() {
        assert_eq!(parse_tdim("(3,4, 5)"), Some(vec![3, 4, 5]));
        assert_eq!(parse_tdim("3,4"), None);
        assert_eq!(format_tdim(&[2, 3]), "(2,3)");
    }

    #[test]
    fn string_width_uses_tdim() {
        let mut desc = ColumnDescriptor::new("NAMES", Tform::new(12, ColumnType::Ascii));
        assert_eq!(desc.values_per_row(), 1);
        desc.tdim = Some(vec![4, 3]);
        assert_eq!(desc.string_width(), 4);
        assert_eq!(desc.values_per_row(), 3);
    }

    fn sample_table() -> Table {
        let mut table = Table::new(2);
        table.push(
            ColumnDescriptor::new("FLAG", Tform::new(1, ColumnType::Logical)),
            ColumnData::Logical(vec![true, false]),
        );
        table.push(
            ColumnDescriptor::new("VEC", Tform::new(3, ColumnType::Short)),
            ColumnData::Short(vec![1, 2, 3, -4, -5, -6]),
        );
        table.push(
            ColumnDescriptor::new("BITS", Tform::new(10, ColumnType::Bit)),
            ColumnData::Logical((0..20).map(|i| i % 3 == 0).collect()),
        );
        table.push(
            ColumnDescriptor::new("NAME", Tform::new(6, ColumnType::Ascii)),
            ColumnData::Ascii(vec!["alpha".into(), "b".into()]),
        );
        table.push(
            ColumnDescriptor::new("Z", Tform::new(1, ColumnType::ComplexFloat)),
            ColumnData::ComplexFloat(vec![(1.0, -1.0), (0.5, 2.5)]),
        );
        table
    }

    #[test]
    fn encode_row_layout() {
        let table = sample_table();
        let bytes = table.encode().unwrap();
        assert_eq!(table.row_width(), 1 + 6 + 2 + 6 + 8);
        assert_eq!(bytes.len(), 2 * table.row_width());
        assert_eq!(bytes[0], b'T');
        assert_eq!(&bytes[1..3], &[0, 1]);
        // Bits 0, 3, 6, 9 set in row 0.
        assert_eq!(bytes[7], 0b1001_0010);
        assert_eq!(bytes[8], 0b0100_0000);
        assert_eq!(&bytes[9..15], b"alpha ");
    }

    #[test]
    fn header_cards_describe_columns() {
        let mut table = Table::new(1);
        let mut desc = ColumnDescriptor::new("BIG", Tform::new(1, ColumnType::Long));
        desc.tzero = Some(9_223_372_036_854_775_808.0);
        desc.unit = Some("m s-1".into());
        table.push(desc, ColumnData::Long(vec![0]));
        let cards = table.header_cards().unwrap();

        assert_eq!(cards[0].value, Some(Value::String("BINTABLE".into())));
        assert_eq!(crate::header::card_integer(&cards, "NAXIS1"), Some(8));
        assert_eq!(crate::header::card_integer(&cards, "TFIELDS"), Some(1));
        assert_eq!(crate::header::card_string(&cards, "TFORM1").as_deref(), Some("K"));
        assert_eq!(crate::header::card_string(&cards, "TUNIT1").as_deref(), Some("m s-1"));
        assert_eq!(
            crate::header::card_float(&cards, "TZERO1"),
            Some(9_223_372_036_854_775_808.0)
        );
    }

    #[test]
    fn scale_value_prefers_integers() {
        assert_eq!(scale_value(32768.0), Value::Integer(32768));
        assert_eq!(scale_value(0.5), Value::Float(0.5));
        assert_eq!(
            scale_value(9_223_372_036_854_775_808.0),
            Value::Float(9_223_372_036_854_775_808.0)
        );
    }

    #[test]
    fn validate_catches_ragged_and_mismatched_columns() {
        let mut table = Table::new(3);
        table.push(
            ColumnDescriptor::new("X", Tform::new(1, ColumnType::Int)),
            ColumnData::Int(vec![1, 2]),
        );
        assert!(matches!(table.validate(), Err(Error::InvalidValue(_))));

        let mut table = Table::new(1);
        table.push(
            ColumnDescriptor::new("X", Tform::new(1, ColumnType::Int)),
            ColumnData::Double(vec![1.0]),
        );
        assert!(matches!(table.validate(), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn over_long_string_rejected() {
        let mut table = Table::new(1);
        table.push(
            ColumnDescriptor::new("S", Tform::new(2, ColumnType::Ascii)),
            ColumnData::Ascii(vec!["abc".into()]),
        );
        assert!(matches!(table.encode(), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn decode_columns_from_gathered_bytes() {
        let table = sample_table();
        let bytes = table.encode().unwrap();
        let row = table.row_width();
        let mut offset = 0;
        for column in &table.columns {
            let width = column.descriptor.tform.byte_width();
            let raw = gather_column(&bytes, row, 2, offset, width);
            offset += width;
            let decoded = decode_column(&raw, &column.descriptor, 2).unwrap();
            assert_eq!(decoded, column.data, "column {}", column.descriptor.name);
        }
    }

    #[test]
    fn decode_string_stops_at_nul() {
        assert_eq!(decode_string(b"ab\0\0"), "ab");
        assert_eq!(decode_string(b"ab  "), "ab");
    }
}
