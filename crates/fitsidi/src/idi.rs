//! The in-memory container model: an ordered list of named units, each a
//! header with an optional n-dimensional array or table.

use ndarray::ArrayD;

use crate::error::{Error, Result};
use crate::header::IdiHeader;
use crate::typecode::ElementType;
use crate::units::Unit;

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

/// An n-dimensional array of one element type, in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(ArrayD<bool>),
    U8(ArrayD<u8>),
    I8(ArrayD<i8>),
    U16(ArrayD<u16>),
    I16(ArrayD<i16>),
    U32(ArrayD<u32>),
    I32(ArrayD<i32>),
    U64(ArrayD<u64>),
    I64(ArrayD<i64>),
    /// IEEE binary16 bit patterns.
    F16(ArrayD<u16>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    Complex64(ArrayD<(f32, f32)>),
    Complex128(ArrayD<(f64, f64)>),
    /// Byte strings of at most `width` bytes.
    Bytes { width: usize, values: ArrayD<String> },
    /// Unicode strings of at most `width` characters.
    Unicode { width: usize, values: ArrayD<String> },
}

macro_rules! each_array {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            ArrayData::Bool($a) => $body,
            ArrayData::U8($a) => $body,
            ArrayData::I8($a) => $body,
            ArrayData::U16($a) => $body,
            ArrayData::I16($a) => $body,
            ArrayData::U32($a) => $body,
            ArrayData::I32($a) => $body,
            ArrayData::U64($a) => $body,
            ArrayData::I64($a) => $body,
            ArrayData::F16($a) => $body,
            ArrayData::F32($a) => $body,
            ArrayData::F64($a) => $body,
            ArrayData::Complex64($a) => $body,
            ArrayData::Complex128($a) => $body,
            ArrayData::Bytes { values: $a, .. } => $body,
            ArrayData::Unicode { values: $a, .. } => $body,
        }
    };
}

impl ArrayData {
    /// Byte strings sized to the longest value (at least one byte). Only
    /// ASCII text can be written to FITS.
    pub fn bytes(values: ArrayD<String>) -> ArrayData {
        let width = values.iter().map(String::len).max().unwrap_or(0).max(1);
        ArrayData::Bytes { width, values }
    }

    /// Unicode strings sized to the longest value (at least one character).
    pub fn unicode(values: ArrayD<String>) -> ArrayData {
        let width = values
            .iter()
            .map(|s| s.chars().count())
            .max()
            .unwrap_or(0)
            .max(1);
        ArrayData::Unicode { width, values }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ArrayData::Bool(_) => ElementType::Bool,
            ArrayData::U8(_) => ElementType::U8,
            ArrayData::I8(_) => ElementType::I8,
            ArrayData::U16(_) => ElementType::U16,
            ArrayData::I16(_) => ElementType::I16,
            ArrayData::U32(_) => ElementType::U32,
            ArrayData::I32(_) => ElementType::I32,
            ArrayData::U64(_) => ElementType::U64,
            ArrayData::I64(_) => ElementType::I64,
            ArrayData::F16(_) => ElementType::F16,
            ArrayData::F32(_) => ElementType::F32,
            ArrayData::F64(_) => ElementType::F64,
            ArrayData::Complex64(_) => ElementType::Complex64,
            ArrayData::Complex128(_) => ElementType::Complex128,
            ArrayData::Bytes { width, .. } => ElementType::Bytes(*width),
            ArrayData::Unicode { width, .. } => ElementType::Unicode(*width),
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        each_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! impl_from_array {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<ArrayD<$t>> for ArrayData {
                fn from(a: ArrayD<$t>) -> Self {
                    ArrayData::$variant(a)
                }
            }
        )*
    };
}

// `u16` maps to U16; half-precision data is built with `ArrayData::F16`.
impl_from_array!(
    bool => Bool,
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    (f32, f32) => Complex64,
    (f64, f64) => Complex128,
);

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// A named table column; axis 0 of `data` is the row axis.
#[derive(Debug, Clone, PartialEq)]
pub struct IdiColumn {
    pub name: String,
    pub unit: Option<Unit>,
    pub data: ArrayData,
}

impl IdiColumn {
    pub fn new(name: impl Into<String>, data: impl Into<ArrayData>) -> Self {
        IdiColumn {
            name: name.into(),
            unit: None,
            data: data.into(),
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn nrows(&self) -> usize {
        self.data.shape().first().copied().unwrap_or(0)
    }
}

/// Columns sharing one row count, plus a header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdiTableHdu {
    pub header: IdiHeader,
    columns: Vec<IdiColumn>,
}

impl IdiTableHdu {
    pub fn new(header: IdiHeader) -> Self {
        IdiTableHdu {
            header,
            columns: Vec::new(),
        }
    }

    /// Append a column. Names must be unique and every column must have
    /// at least a row axis and the same number of rows.
    pub fn add_column(&mut self, column: IdiColumn) -> Result<()> {
        if self.column(&column.name).is_some() {
            return Err(Error::DuplicateColumn(column.name));
        }
        if column.data.ndim() == 0 {
            return Err(Error::Shape(format!(
                "column {:?} has no row axis",
                column.name
            )));
        }
        if let Some(first) = self.columns.first() {
            let expected = first.nrows();
            let found = column.nrows();
            if found != expected {
                return Err(Error::ColumnLength {
                    column: column.name,
                    expected,
                    found,
                });
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn columns(&self) -> &[IdiColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&IdiColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn remove_column(&mut self, name: &str) -> Option<IdiColumn> {
        let pos = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(pos))
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, IdiColumn::nrows)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdiImageHdu {
    pub header: IdiHeader,
    pub data: ArrayData,
}

/// A unit carrying only a header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdiPrimaryHdu {
    pub header: IdiHeader,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdiHdu {
    Primary(IdiPrimaryHdu),
    Image(IdiImageHdu),
    Table(IdiTableHdu),
}

impl IdiHdu {
    pub fn header(&self) -> &IdiHeader {
        match self {
            IdiHdu::Primary(p) => &p.header,
            IdiHdu::Image(i) => &i.header,
            IdiHdu::Table(t) => &t.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut IdiHeader {
        match self {
            IdiHdu::Primary(p) => &mut p.header,
            IdiHdu::Image(i) => &mut i.header,
            IdiHdu::Table(t) => &mut t.header,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IdiHdu::Primary(_) => "primary",
            IdiHdu::Image(_) => "image",
            IdiHdu::Table(_) => "table",
        }
    }
}

// ---------------------------------------------------------------------------
// The list
// ---------------------------------------------------------------------------

/// Units in insertion order, keyed by unique non-empty names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdiHduList {
    units: Vec<(String, IdiHdu)>,
}

impl IdiHduList {
    pub fn new() -> Self {
        IdiHduList::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, hdu: IdiHdu) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidUnitName);
        }
        if self.contains(&name) {
            return Err(Error::DuplicateUnit(name));
        }
        self.units.push((name, hdu));
        Ok(())
    }

    pub fn add_primary_hdu(&mut self, name: impl Into<String>, header: IdiHeader) -> Result<()> {
        self.insert(name, IdiHdu::Primary(IdiPrimaryHdu { header }))
    }

    pub fn add_image_hdu(
        &mut self,
        name: impl Into<String>,
        header: IdiHeader,
        data: impl Into<ArrayData>,
    ) -> Result<()> {
        self.insert(
            name,
            IdiHdu::Image(IdiImageHdu {
                header,
                data: data.into(),
            }),
        )
    }

    pub fn add_table_hdu(&mut self, name: impl Into<String>, table: IdiTableHdu) -> Result<()> {
        self.insert(name, IdiHdu::Table(table))
    }

    pub fn get(&self, name: &str) -> Option<&IdiHdu> {
        self.units.iter().find(|(n, _)| n == name).map(|(_, h)| h)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut IdiHdu> {
        self.units
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, h)| h)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<IdiHdu> {
        let pos = self.units.iter().position(|(n, _)| n == name)?;
        Some(self.units.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IdiHdu)> {
        self.units.iter().map(|(n, h)| (n.as_str(), h))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
