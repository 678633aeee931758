//! Physical unit strings: container-side tokens and FITS TUNITn syntax.

use core::fmt;

/// A unit known on both sides, with its spelling on each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KnownUnit {
    pub generic: &'static str,
    pub fits: &'static str,
}

const fn unit(generic: &'static str, fits: &'static str) -> KnownUnit {
    KnownUnit { generic, fits }
}

/// Units with a fixed spelling on each side. Both columns are unique.
pub const KNOWN_UNITS: &[KnownUnit] = &[
    // length
    unit("m", "m"),
    unit("km", "km"),
    unit("cm", "cm"),
    unit("mm", "mm"),
    unit("um", "um"),
    unit("nm", "nm"),
    unit("Angstrom", "Angstrom"),
    unit("AU", "AU"),
    unit("lyr", "lyr"),
    unit("pc", "pc"),
    unit("kpc", "kpc"),
    unit("Mpc", "Mpc"),
    unit("solRad", "solRad"),
    // time
    unit("s", "s"),
    unit("ms", "ms"),
    unit("min", "min"),
    unit("h", "h"),
    unit("d", "d"),
    unit("yr", "a"),
    unit("Myr", "Ma"),
    unit("Gyr", "Ga"),
    // mass, temperature, energy, power
    unit("kg", "kg"),
    unit("g", "g"),
    unit("solMass", "solMass"),
    unit("K", "K"),
    unit("eV", "eV"),
    unit("keV", "keV"),
    unit("MeV", "MeV"),
    unit("erg", "erg"),
    unit("J", "J"),
    unit("W", "W"),
    unit("solLum", "solLum"),
    // angles
    unit("deg", "deg"),
    unit("arcmin", "arcmin"),
    unit("arcsec", "arcsec"),
    unit("mas", "mas"),
    unit("rad", "rad"),
    unit("sr", "sr"),
    // frequency and flux
    unit("Hz", "Hz"),
    unit("kHz", "kHz"),
    unit("MHz", "MHz"),
    unit("GHz", "GHz"),
    unit("Jy", "Jy"),
    unit("mJy", "mJy"),
    unit("Jy / beam", "Jy/beam"),
    unit("mag", "mag"),
    // electromagnetism
    unit("V", "V"),
    unit("T", "T"),
    unit("G", "G"),
    // rates and densities
    unit("m / s", "m s-1"),
    unit("km / s", "km s-1"),
    unit("erg / s", "erg s-1"),
    unit("W / m2", "W m-2"),
    unit("erg / (cm2 s)", "erg cm-2 s-1"),
    unit("ph / (cm2 s)", "photon cm-2 s-1"),
    unit("ct / s", "count s-1"),
    // counting
    unit("ct", "count"),
    unit("ph", "photon"),
    unit("pix", "pixel"),
    unit("adu", "adu"),
    unit("beam", "beam"),
    unit("chan", "chan"),
    unit("bit", "bit"),
    unit("byte", "byte"),
];

/// A unit attached to a column or array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    Known(KnownUnit),
    /// Text with no entry in [`KNOWN_UNITS`], kept verbatim on both sides.
    Unrecognized(String),
}

impl Unit {
    /// Interpret a container-side unit token.
    pub fn parse_generic(text: &str) -> Unit {
        let text = text.trim();
        KNOWN_UNITS
            .iter()
            .find(|u| u.generic == text)
            .map_or_else(|| Unit::Unrecognized(text.to_string()), |u| Unit::Known(*u))
    }

    /// The container-side spelling.
    pub fn generic(&self) -> &str {
        match self {
            Unit::Known(u) => u.generic,
            Unit::Unrecognized(text) => text,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, Unit::Known(_))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.generic())
    }
}

/// FITS spelling of `unit`.
pub fn to_foreign(unit: &Unit) -> String {
    match unit {
        Unit::Known(u) => u.fits.to_string(),
        Unit::Unrecognized(text) => text.clone(),
    }
}

/// Interpret a TUNITn value. Never fails: unknown text is kept verbatim.
pub fn from_foreign(text: &str) -> Unit {
    let text = text.trim();
    KNOWN_UNITS
        .iter()
        .find(|u| u.fits == text)
        .map_or_else(|| Unit::Unrecognized(text.to_string()), |u| Unit::Known(*u))
}
