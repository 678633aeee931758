//! Reserved-keyword profiles and verbosity.

/// Keywords that are regenerated from the data on every write and therefore
/// never stored as user header entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedKeywords {
    /// Exact keywords describing file and record structure.
    pub structural: &'static [&'static str],
    /// Per-column keyword families, matched against the first five
    /// characters of a keyword.
    pub table_prefixes: &'static [&'static str],
    /// Further prefixes matched literally (`TDIM` covers `TDIMn`).
    pub literal_prefixes: &'static [&'static str],
    /// Keywords the codec rewrites on every write.
    pub managed: &'static [&'static str],
}

impl ReservedKeywords {
    /// The FITS profile.
    pub const FITS: ReservedKeywords = ReservedKeywords {
        structural: &[
            "XTENSION", "BITPIX", "SIMPLE", "PCOUNT", "GCOUNT", "GROUPS", "EXTEND", "TFIELDS",
            "EXTNAME",
        ],
        table_prefixes: &[
            "TDISP", "TUNIT", "TTYPE", "TFORM", "TBCOL", "TNULL", "TSCAL", "TZERO", "NAXIS",
        ],
        literal_prefixes: &["TDIM"],
        managed: &["CHECKSUM", "DATASUM"],
    };

    pub fn is_structural(&self, keyword: &str) -> bool {
        self.structural.contains(&keyword)
    }

    /// Returns `true` for keywords derived from table columns or axes.
    pub fn is_table_derived(&self, keyword: &str) -> bool {
        let head = keyword
            .char_indices()
            .nth(5)
            .map_or(keyword, |(end, _)| &keyword[..end]);
        self.table_prefixes.contains(&head)
            || self
                .literal_prefixes
                .iter()
                .any(|prefix| keyword.starts_with(prefix))
    }

    pub fn is_managed(&self, keyword: &str) -> bool {
        self.managed.contains(&keyword)
    }

    /// Returns `true` if `keyword` must not be stored as a user entry.
    pub fn is_reserved(&self, keyword: &str) -> bool {
        self.is_structural(keyword) || self.is_table_derived(keyword) || self.is_managed(keyword)
    }
}

impl Default for ReservedKeywords {
    fn default() -> Self {
        ReservedKeywords::FITS
    }
}

/// Diagnostic verbosity, 0 (silent) to 5 (everything). Only affects what is
/// logged, never what is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Verbosity(pub u8);

impl Verbosity {
    pub const SILENT: Verbosity = Verbosity(0);
    pub const ALL: Verbosity = Verbosity(5);

    /// Unit-level progress (created, classified) is logged at `info`.
    pub fn units(self) -> bool {
        self.0 >= 1
    }

    /// Per-column and per-keyword detail is logged at `debug`.
    pub fn detail(self) -> bool {
        self.0 >= 2
    }
}

impl From<u8> for Verbosity {
    fn from(level: u8) -> Self {
        Verbosity(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_keywords_are_exact() {
        let fits = ReservedKeywords::FITS;
        assert!(fits.is_reserved("XTENSION"));
        assert!(fits.is_reserved("EXTNAME"));
        assert!(!fits.is_reserved("EXTNAMES"));
        assert!(!fits.is_reserved("OBJECT"));
    }

    #[test]
    fn table_prefixes_match_first_five_characters() {
        let fits = ReservedKeywords::FITS;
        for keyword in ["TTYPE1", "TFORM12", "TUNIT3", "NAXIS", "NAXIS2", "TZERO7", "TDIM4"] {
            assert!(fits.is_table_derived(keyword), "{keyword}");
        }
        // Five-character heads only: "TNUL" is not "TNULL".
        assert!(!fits.is_table_derived("TNUL"));
        assert!(!fits.is_table_derived("TELESCOP"));
        assert!(!fits.is_table_derived("NAXI"));
    }

    #[test]
    fn codec_managed_keywords() {
        let fits = ReservedKeywords::default();
        assert!(fits.is_reserved("CHECKSUM"));
        assert!(fits.is_reserved("DATASUM"));
        assert!(!fits.is_structural("DATASUM"));
    }

    #[test]
    fn custom_profiles_change_the_rules() {
        const LOOSE: ReservedKeywords = ReservedKeywords {
            structural: &["SIMPLE"],
            table_prefixes: &[],
            literal_prefixes: &[],
            managed: &[],
        };
        assert!(LOOSE.is_reserved("SIMPLE"));
        assert!(!LOOSE.is_reserved("TTYPE1"));
        assert!(!LOOSE.is_reserved("CHECKSUM"));
    }

    #[test]
    fn verbosity_levels() {
        assert!(!Verbosity::SILENT.units());
        assert!(Verbosity(1).units());
        assert!(!Verbosity(1).detail());
        assert!(Verbosity::ALL.detail());
        assert_eq!(Verbosity::from(3), Verbosity(3));
    }
}
