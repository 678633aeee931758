//! Random groups reading.
//!
//! A random-groups primary HDU is exposed as a [`Table`] with one row per
//! group: a scalar column per group parameter (named by PTYPEn, scaled by
//! PSCALn/PZEROn) followed by a `DATA` column holding the group array.

use crate::bintable::{decode_numeric, gather_column, ColumnDescriptor, ColumnType, Table, Tform};
use crate::error::{Error, Result};
use crate::hdu::{Hdu, HduInfo};
use crate::header::{card_float, card_string};

fn column_type(bitpix: i64) -> Result<ColumnType> {
    Ok(match bitpix {
        8 => ColumnType::Byte,
        16 => ColumnType::Short,
        32 => ColumnType::Int,
        64 => ColumnType::Long,
        -32 => ColumnType::Float,
        -64 => ColumnType::Double,
        other => return Err(Error::InvalidBitpix(other)),
    })
}

/// Parameter names from PTYPEn, made unique and never blank.
fn parameter_names(hdu: &Hdu, pcount: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(pcount + 1);
    for n in 1..=pcount {
        let base = card_string(&hdu.cards, &format!("PTYPE{n}"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("PARAM{n}"));
        let mut name = base.clone();
        let mut suffix = 2;
        while names.contains(&name) || name == "DATA" {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        names.push(name);
    }
    names
}

/// Read a random-groups HDU as a table of parameters plus a `DATA` column.
pub fn read_random_groups(fits_data: &[u8], hdu: &Hdu) -> Result<Table> {
    let (bitpix, naxes, pcount, gcount) = match &hdu.info {
        HduInfo::RandomGroups {
            bitpix,
            naxes,
            pcount,
            gcount,
        } => (*bitpix, naxes, *pcount, *gcount),
        _ => return Err(Error::InvalidHeader("not a random groups HDU")),
    };
    let col_type = column_type(bitpix)?;
    let bpp = col_type.element_size();
    let array_len: usize = naxes.iter().product();
    let group_len = (pcount + array_len) * bpp;
    let data = hdu.data(fits_data)?;
    if data.len() < group_len * gcount {
        return Err(Error::UnexpectedEof);
    }

    let mut table = Table::new(gcount);
    for (i, name) in parameter_names(hdu, pcount).into_iter().enumerate() {
        let n = i + 1;
        let raw = gather_column(data, group_len, gcount, i * bpp, bpp);
        let mut desc = ColumnDescriptor::new(name, Tform::new(1, col_type));
        desc.tscal = card_float(&hdu.cards, &format!("PSCAL{n}"));
        desc.tzero = card_float(&hdu.cards, &format!("PZERO{n}"));
        table.push(desc, decode_numeric(&raw, col_type)?);
    }

    let raw = gather_column(data, group_len, gcount, pcount * bpp, array_len * bpp);
    let mut desc = ColumnDescriptor::new("DATA", Tform::new(array_len, col_type));
    if naxes.len() > 1 {
        desc.tdim = Some(naxes.clone());
    }
    desc.tscal = card_float(&hdu.cards, "BSCALE");
    desc.tzero = card_float(&hdu.cards, "BZERO");
    table.push(desc, decode_numeric(&raw, col_type)?);

    Ok(table)
}
