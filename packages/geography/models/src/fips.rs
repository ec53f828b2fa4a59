//! US state and county FIPS code utilities.
//!
//! A single table maps each two-digit state FIPS code to its postal
//! abbreviation, full name and Census region for the 50 states + DC.
//! Territories (PR, GU, VI, ...) are deliberately absent, so counties in
//! them resolve to [`Region::Unknown`].

use crate::Region;

/// One row of the state lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInfo {
    /// Two-digit state FIPS code.
    pub fips: &'static str,
    /// Two-letter postal abbreviation.
    pub abbr: &'static str,
    /// Full state name.
    pub name: &'static str,
    /// Census region containing the state.
    pub region: Region,
}

const fn state(
    fips: &'static str,
    abbr: &'static str,
    name: &'static str,
    region: Region,
) -> StateInfo {
    StateInfo {
        fips,
        abbr,
        name,
        region,
    }
}

/// The 50 US states + DC, ordered by FIPS code.
pub const STATES: &[StateInfo] = &[
    state("01", "AL", "Alabama", Region::South),
    state("02", "AK", "Alaska", Region::West),
    state("04", "AZ", "Arizona", Region::West),
    state("05", "AR", "Arkansas", Region::South),
    state("06", "CA", "California", Region::West),
    state("08", "CO", "Colorado", Region::West),
    state("09", "CT", "Connecticut", Region::Northeast),
    state("10", "DE", "Delaware", Region::South),
    state("11", "DC", "District of Columbia", Region::South),
    state("12", "FL", "Florida", Region::South),
    state("13", "GA", "Georgia", Region::South),
    state("15", "HI", "Hawaii", Region::West),
    state("16", "ID", "Idaho", Region::West),
    state("17", "IL", "Illinois", Region::Midwest),
    state("18", "IN", "Indiana", Region::Midwest),
    state("19", "IA", "Iowa", Region::Midwest),
    state("20", "KS", "Kansas", Region::Midwest),
    state("21", "KY", "Kentucky", Region::South),
    state("22", "LA", "Louisiana", Region::South),
    state("23", "ME", "Maine", Region::Northeast),
    state("24", "MD", "Maryland", Region::South),
    state("25", "MA", "Massachusetts", Region::Northeast),
    state("26", "MI", "Michigan", Region::Midwest),
    state("27", "MN", "Minnesota", Region::Midwest),
    state("28", "MS", "Mississippi", Region::South),
    state("29", "MO", "Missouri", Region::Midwest),
    state("30", "MT", "Montana", Region::West),
    state("31", "NE", "Nebraska", Region::Midwest),
    state("32", "NV", "Nevada", Region::West),
    state("33", "NH", "New Hampshire", Region::Northeast),
    state("34", "NJ", "New Jersey", Region::Northeast),
    state("35", "NM", "New Mexico", Region::West),
    state("36", "NY", "New York", Region::Northeast),
    state("37", "NC", "North Carolina", Region::South),
    state("38", "ND", "North Dakota", Region::Midwest),
    state("39", "OH", "Ohio", Region::Midwest),
    state("40", "OK", "Oklahoma", Region::South),
    state("41", "OR", "Oregon", Region::West),
    state("42", "PA", "Pennsylvania", Region::Northeast),
    state("44", "RI", "Rhode Island", Region::Northeast),
    state("45", "SC", "South Carolina", Region::South),
    state("46", "SD", "South Dakota", Region::Midwest),
    state("47", "TN", "Tennessee", Region::South),
    state("48", "TX", "Texas", Region::South),
    state("49", "UT", "Utah", Region::West),
    state("50", "VT", "Vermont", Region::Northeast),
    state("51", "VA", "Virginia", Region::South),
    state("53", "WA", "Washington", Region::West),
    state("54", "WV", "West Virginia", Region::South),
    state("55", "WI", "Wisconsin", Region::Midwest),
    state("56", "WY", "Wyoming", Region::West),
];

/// Looks up a state by its two-digit FIPS code.
#[must_use]
pub fn state_by_fips(fips: &str) -> Option<&'static StateInfo> {
    STATES.iter().find(|s| s.fips == fips)
}

/// Looks up a state by its postal abbreviation (case-insensitive).
#[must_use]
pub fn state_by_abbr(abbr: &str) -> Option<&'static StateInfo> {
    let abbr = abbr.trim();
    STATES.iter().find(|s| s.abbr.eq_ignore_ascii_case(abbr))
}

/// Resolves a state label that may be either a postal abbreviation, a
/// full state name or a (possibly unpadded) FIPS code.
#[must_use]
pub fn resolve_state(label: &str) -> Option<&'static StateInfo> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    if label.bytes().all(|b| b.is_ascii_digit()) {
        if label.len() > 2 {
            return None;
        }
        return state_by_fips(&format!("{label:0>2}"));
    }
    state_by_abbr(label).or_else(|| {
        STATES
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(label))
    })
}

/// Returns the Census region for a state label, or [`Region::Unknown`].
#[must_use]
pub fn region_of_state(label: &str) -> Region {
    resolve_state(label).map_or(Region::Unknown, |s| s.region)
}

/// Normalizes a raw county identifier into a 5-digit zero-padded FIPS
/// code.
///
/// Accepts unpadded integers (`"1001"`), float renderings produced by
/// spreadsheet exports (`"1001.0"`) and already padded codes. Returns
/// `None` for empty, non-numeric, zero or over-long identifiers.
#[must_use]
pub fn normalize_county_fips(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .split_once('.')
        .map_or(trimmed, |(int, frac)| {
            if frac.bytes().all(|b| b == b'0') {
                int
            } else {
                ""
            }
        });

    if digits.is_empty() || digits.len() > 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.bytes().all(|b| b == b'0') {
        return None;
    }

    Some(format!("{digits:0>5}"))
}

/// Extracts the two-digit state FIPS prefix of a normalized county code.
#[must_use]
pub fn state_fips_of_county(county_fips: &str) -> Option<&str> {
    county_fips.get(..2)
}
