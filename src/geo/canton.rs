//! Swiss postal code → canton → tax rate and language.
//!
//! Postal codes are four digits. Ranges follow the postal routing areas,
//! so border towns may land in a neighbouring canton; callers needing
//! exact answers should store the canton with the address.

use serde::Serialize;

/// Standard Swiss VAT rate in percent.
pub const STANDARD_VAT_RATE: f64 = 7.7;

const FALLBACK_CANTON: &str = "CH";
const FALLBACK_LANGUAGE: &str = "de";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CantonInfo {
    pub canton: &'static str,
    pub tax_rate: f64,
    pub language: &'static str,
}

/// (first, last, canton). First match wins.
const RANGES: &[(u16, u16, &str)] = &[
    (1000, 1199, "VD"),
    (1200, 1299, "GE"),
    (1300, 1499, "VD"),
    (1500, 1799, "FR"),
    (1800, 1999, "VS"),
    (2000, 2499, "NE"),
    (2500, 2799, "BE"),
    (2800, 2999, "JU"),
    (3000, 3899, "BE"),
    (3900, 3999, "VS"),
    (4000, 4099, "BS"),
    (4100, 4499, "BL"),
    (4500, 4799, "SO"),
    (4800, 5999, "AG"),
    (6000, 6299, "LU"),
    (6300, 6399, "ZG"),
    (6400, 6499, "SZ"),
    (6500, 6999, "TI"),
    (7000, 7799, "GR"),
    (8000, 8499, "ZH"),
    (8500, 8599, "TG"),
    (8600, 8749, "ZH"),
    (8750, 8799, "GL"),
    (8800, 8999, "ZH"),
    (9000, 9099, "SG"),
    (9100, 9199, "AR"),
    (9200, 9499, "SG"),
    (9500, 9599, "TG"),
    (9600, 9699, "SG"),
];

/// Never fails: unknown or malformed codes get the national default.
pub fn lookup_canton(postal_code: &str) -> CantonInfo {
    let code = parse_postal_code(postal_code);
    let canton = code
        .and_then(|code| {
            RANGES
                .iter()
                .find(|(first, last, _)| (*first..=*last).contains(&code))
                .map(|(_, _, canton)| *canton)
        })
        .unwrap_or(FALLBACK_CANTON);

    CantonInfo {
        canton,
        tax_rate: STANDARD_VAT_RATE,
        language: language_of(canton, code),
    }
}

fn parse_postal_code(raw: &str) -> Option<u16> {
    let raw = raw.trim();
    if raw.len() != 4 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn language_of(canton: &str, code: Option<u16>) -> &'static str {
    match canton {
        "GE" | "VD" | "NE" | "JU" => "fr",
        "TI" => "it",
        // Bilingual cantons: the French speaking postal areas.
        "FR" => "fr",
        "VS" => match code {
            Some(c) if c >= 3900 => "de",
            _ => "fr",
        },
        _ => FALLBACK_LANGUAGE,
    }
}
