//! Presentation helpers that turn a two-letter region code into a display
//! name and a flag emoji. Both helpers are total: bad input degrades to a
//! default instead of failing the probe.

mod table;

use crate::model::UNKNOWN;

/// Offset between an uppercase ASCII letter and its regional indicator symbol.
const REGIONAL_INDICATOR_OFFSET: u32 = 127_397;

/// Resolves region codes to display names.
pub trait RegionNames: Send + Sync {
    fn lookup(&self, code: &str) -> Option<&str>;
}

/// English short names for ISO 3166-1 alpha-2 codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoRegionNames;

impl RegionNames for IsoRegionNames {
    fn lookup(&self, code: &str) -> Option<&str> {
        table::REGIONS
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, name)| *name)
    }
}

pub fn country_name(regions: &dyn RegionNames, code: Option<&str>) -> String {
    normalize(code)
        .and_then(|code| regions.lookup(&code).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn country_flag(code: Option<&str>) -> String {
    let Some(code) = normalize(code) else {
        return String::new();
    };
    code.chars()
        .map(|c| char::from_u32(c as u32 + REGIONAL_INDICATOR_OFFSET))
        .collect::<Option<String>>()
        .unwrap_or_default()
}

fn normalize(code: Option<&str>) -> Option<String> {
    let code = code?.trim();
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    Some(code.to_ascii_uppercase())
}
