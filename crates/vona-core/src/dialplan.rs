//! Dial plan: phone number to country resolution
//!
//! Maps E.164 numbers to ISO 3166-1 alpha-2 country codes via longest-prefix
//! match over a static dial-code table. The NANP (+1) is split so Canadian
//! and Caribbean area codes resolve to their own countries while bare +1
//! defaults to the US. The unsupported-country denylist lives here as well.

use crate::error::AppError;

/// Minimum digits a dialable E.164 number carries
pub const MIN_NUMBER_DIGITS: usize = 7;

/// Maximum digits per E.164
pub const MAX_NUMBER_DIGITS: usize = 15;

/// Destinations we do not serve (embargoed or unserviceable).
/// Numbers resolving here get a zero rate and are never billed.
pub const UNSUPPORTED_COUNTRIES: &[&str] = &["KP", "IR", "SY", "CU", "SD"];

/// Country resolved from a dialed number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialedCountry {
    /// ISO 3166-1 alpha-2 country code
    pub code: &'static str,
    /// English country name
    pub name: &'static str,
}

impl DialedCountry {
    /// Whether this destination is on the denylist
    pub fn is_unsupported(&self) -> bool {
        is_unsupported(self.code)
    }
}

/// Check a country code against the denylist
pub fn is_unsupported(country_code: &str) -> bool {
    UNSUPPORTED_COUNTRIES.contains(&country_code)
}

/// Normalize a dialed number to bare E.164 digits
///
/// Strips spaces, dashes, dots and parentheses, accepts a leading `+` or
/// `00` international prefix, and validates length. Anything that is not a
/// plausible E.164 number is a parse failure the caller treats as "no
/// pricing available".
pub fn normalize(phone: &str) -> Result<String, AppError> {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return Err(AppError::PhoneParse(phone.to_string()));
    }

    let mut digits: String = trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    // 00 international dialing prefix
    if digits.starts_with("00") {
        digits = digits[2..].to_string();
    }

    if digits.len() < MIN_NUMBER_DIGITS || digits.len() > MAX_NUMBER_DIGITS {
        return Err(AppError::PhoneParse(phone.to_string()));
    }

    if trimmed
        .chars()
        .any(|c| !c.is_ascii_digit() && !matches!(c, '+' | ' ' | '-' | '.' | '(' | ')'))
    {
        return Err(AppError::PhoneParse(phone.to_string()));
    }

    Ok(digits)
}

/// Resolve the country a number dials into
///
/// Longest-prefix match over the dial-code table, so `1204...` resolves to
/// Canada while `1212...` stays US. Fails with `PhoneParse` when the number
/// cannot be normalized or no prefix matches.
pub fn country_for_number(phone: &str) -> Result<DialedCountry, AppError> {
    let digits = normalize(phone)?;

    let mut best: Option<&(&str, &str, &str)> = None;
    for entry in DIAL_CODES {
        if digits.starts_with(entry.0) {
            match best {
                Some(current) if current.0.len() >= entry.0.len() => {}
                _ => best = Some(entry),
            }
        }
    }

    best.map(|&(_, code, name)| DialedCountry { code, name })
        .ok_or_else(|| AppError::PhoneParse(phone.to_string()))
}

/// Dial-code table: (prefix, ISO alpha-2, name)
///
/// NANP area codes for Canada and Caribbean territories come before the
/// bare `1` fallback in spirit; ordering is irrelevant because the lookup
/// always keeps the longest matching prefix.
static DIAL_CODES: &[(&str, &str, &str)] = &[
    // NANP default
    ("1", "US", "United States"),
    // Canadian area codes
    ("1204", "CA", "Canada"),
    ("1226", "CA", "Canada"),
    ("1236", "CA", "Canada"),
    ("1249", "CA", "Canada"),
    ("1250", "CA", "Canada"),
    ("1289", "CA", "Canada"),
    ("1306", "CA", "Canada"),
    ("1343", "CA", "Canada"),
    ("1365", "CA", "Canada"),
    ("1403", "CA", "Canada"),
    ("1416", "CA", "Canada"),
    ("1418", "CA", "Canada"),
    ("1431", "CA", "Canada"),
    ("1437", "CA", "Canada"),
    ("1438", "CA", "Canada"),
    ("1450", "CA", "Canada"),
    ("1506", "CA", "Canada"),
    ("1514", "CA", "Canada"),
    ("1519", "CA", "Canada"),
    ("1548", "CA", "Canada"),
    ("1579", "CA", "Canada"),
    ("1581", "CA", "Canada"),
    ("1587", "CA", "Canada"),
    ("1604", "CA", "Canada"),
    ("1613", "CA", "Canada"),
    ("1639", "CA", "Canada"),
    ("1647", "CA", "Canada"),
    ("1705", "CA", "Canada"),
    ("1709", "CA", "Canada"),
    ("1778", "CA", "Canada"),
    ("1780", "CA", "Canada"),
    ("1782", "CA", "Canada"),
    ("1807", "CA", "Canada"),
    ("1819", "CA", "Canada"),
    ("1825", "CA", "Canada"),
    ("1867", "CA", "Canada"),
    ("1873", "CA", "Canada"),
    ("1902", "CA", "Canada"),
    ("1905", "CA", "Canada"),
    // Caribbean and NANP territories
    ("1242", "BS", "Bahamas"),
    ("1246", "BB", "Barbados"),
    ("1264", "AI", "Anguilla"),
    ("1268", "AG", "Antigua and Barbuda"),
    ("1284", "VG", "British Virgin Islands"),
    ("1340", "VI", "U.S. Virgin Islands"),
    ("1345", "KY", "Cayman Islands"),
    ("1441", "BM", "Bermuda"),
    ("1473", "GD", "Grenada"),
    ("1649", "TC", "Turks and Caicos Islands"),
    ("1658", "JM", "Jamaica"),
    ("1664", "MS", "Montserrat"),
    ("1670", "MP", "Northern Mariana Islands"),
    ("1671", "GU", "Guam"),
    ("1684", "AS", "American Samoa"),
    ("1721", "SX", "Sint Maarten"),
    ("1758", "LC", "Saint Lucia"),
    ("1767", "DM", "Dominica"),
    ("1784", "VC", "Saint Vincent and the Grenadines"),
    ("1787", "PR", "Puerto Rico"),
    ("1809", "DO", "Dominican Republic"),
    ("1829", "DO", "Dominican Republic"),
    ("1849", "DO", "Dominican Republic"),
    ("1868", "TT", "Trinidad and Tobago"),
    ("1869", "KN", "Saint Kitts and Nevis"),
    ("1876", "JM", "Jamaica"),
    ("1939", "PR", "Puerto Rico"),
    // Zone 2-9 country codes
    ("7", "RU", "Russia"),
    ("20", "EG", "Egypt"),
    ("27", "ZA", "South Africa"),
    ("30", "GR", "Greece"),
    ("31", "NL", "Netherlands"),
    ("32", "BE", "Belgium"),
    ("33", "FR", "France"),
    ("34", "ES", "Spain"),
    ("36", "HU", "Hungary"),
    ("39", "IT", "Italy"),
    ("40", "RO", "Romania"),
    ("41", "CH", "Switzerland"),
    ("43", "AT", "Austria"),
    ("44", "GB", "United Kingdom"),
    ("45", "DK", "Denmark"),
    ("46", "SE", "Sweden"),
    ("47", "NO", "Norway"),
    ("48", "PL", "Poland"),
    ("49", "DE", "Germany"),
    ("51", "PE", "Peru"),
    ("52", "MX", "Mexico"),
    ("53", "CU", "Cuba"),
    ("54", "AR", "Argentina"),
    ("55", "BR", "Brazil"),
    ("56", "CL", "Chile"),
    ("57", "CO", "Colombia"),
    ("58", "VE", "Venezuela"),
    ("60", "MY", "Malaysia"),
    ("61", "AU", "Australia"),
    ("62", "ID", "Indonesia"),
    ("63", "PH", "Philippines"),
    ("64", "NZ", "New Zealand"),
    ("65", "SG", "Singapore"),
    ("66", "TH", "Thailand"),
    ("81", "JP", "Japan"),
    ("82", "KR", "South Korea"),
    ("84", "VN", "Vietnam"),
    ("86", "CN", "China"),
    ("90", "TR", "Turkey"),
    ("91", "IN", "India"),
    ("92", "PK", "Pakistan"),
    ("93", "AF", "Afghanistan"),
    ("94", "LK", "Sri Lanka"),
    ("95", "MM", "Myanmar"),
    ("98", "IR", "Iran"),
    ("211", "SS", "South Sudan"),
    ("212", "MA", "Morocco"),
    ("213", "DZ", "Algeria"),
    ("216", "TN", "Tunisia"),
    ("218", "LY", "Libya"),
    ("220", "GM", "Gambia"),
    ("221", "SN", "Senegal"),
    ("225", "CI", "Ivory Coast"),
    ("233", "GH", "Ghana"),
    ("234", "NG", "Nigeria"),
    ("237", "CM", "Cameroon"),
    ("243", "CD", "DR Congo"),
    ("249", "SD", "Sudan"),
    ("250", "RW", "Rwanda"),
    ("251", "ET", "Ethiopia"),
    ("254", "KE", "Kenya"),
    ("255", "TZ", "Tanzania"),
    ("256", "UG", "Uganda"),
    ("260", "ZM", "Zambia"),
    ("263", "ZW", "Zimbabwe"),
    ("351", "PT", "Portugal"),
    ("352", "LU", "Luxembourg"),
    ("353", "IE", "Ireland"),
    ("354", "IS", "Iceland"),
    ("358", "FI", "Finland"),
    ("359", "BG", "Bulgaria"),
    ("370", "LT", "Lithuania"),
    ("371", "LV", "Latvia"),
    ("372", "EE", "Estonia"),
    ("380", "UA", "Ukraine"),
    ("381", "RS", "Serbia"),
    ("385", "HR", "Croatia"),
    ("386", "SI", "Slovenia"),
    ("420", "CZ", "Czechia"),
    ("421", "SK", "Slovakia"),
    ("502", "GT", "Guatemala"),
    ("503", "SV", "El Salvador"),
    ("504", "HN", "Honduras"),
    ("505", "NI", "Nicaragua"),
    ("506", "CR", "Costa Rica"),
    ("507", "PA", "Panama"),
    ("509", "HT", "Haiti"),
    ("591", "BO", "Bolivia"),
    ("593", "EC", "Ecuador"),
    ("595", "PY", "Paraguay"),
    ("598", "UY", "Uruguay"),
    ("850", "KP", "North Korea"),
    ("852", "HK", "Hong Kong"),
    ("853", "MO", "Macau"),
    ("855", "KH", "Cambodia"),
    ("856", "LA", "Laos"),
    ("880", "BD", "Bangladesh"),
    ("886", "TW", "Taiwan"),
    ("960", "MV", "Maldives"),
    ("961", "LB", "Lebanon"),
    ("962", "JO", "Jordan"),
    ("963", "SY", "Syria"),
    ("964", "IQ", "Iraq"),
    ("965", "KW", "Kuwait"),
    ("966", "SA", "Saudi Arabia"),
    ("967", "YE", "Yemen"),
    ("968", "OM", "Oman"),
    ("971", "AE", "United Arab Emirates"),
    ("972", "IL", "Israel"),
    ("973", "BH", "Bahrain"),
    ("974", "QA", "Qatar"),
    ("975", "BT", "Bhutan"),
    ("976", "MN", "Mongolia"),
    ("977", "NP", "Nepal"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepts_formats() {
        assert_eq!(normalize("+1 (555) 123-4567").unwrap(), "15551234567");
        assert_eq!(normalize("0051999888777").unwrap(), "51999888777");
        assert_eq!(normalize("51.999.888.777").unwrap(), "51999888777");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize("").is_err());
        assert!(normalize("   ").is_err());
        assert!(normalize("123").is_err());
        assert!(normalize("not-a-number").is_err());
        assert!(normalize("1234567890123456789").is_err());
    }

    #[test]
    fn test_nanp_defaults_to_us() {
        let country = country_for_number("+12125551234").unwrap();
        assert_eq!(country.code, "US");
    }

    #[test]
    fn test_nanp_splits_canada_and_caribbean() {
        assert_eq!(country_for_number("+12045551234").unwrap().code, "CA");
        assert_eq!(country_for_number("+18765551234").unwrap().code, "JM");
        assert_eq!(country_for_number("+18685551234").unwrap().code, "TT");
    }

    #[test]
    fn test_longest_prefix_wins() {
        // 1249 is Ontario, 124 does not exist, 1 is US
        assert_eq!(country_for_number("+12495551234").unwrap().code, "CA");
        // 249 is Sudan, not NANP
        assert_eq!(country_for_number("+249123456789").unwrap().code, "SD");
    }

    #[test]
    fn test_country_lookup() {
        assert_eq!(country_for_number("+51999888777").unwrap().code, "PE");
        assert_eq!(country_for_number("+447911123456").unwrap().code, "GB");
        assert_eq!(country_for_number("+8613800000000").unwrap().code, "CN");
    }

    #[test]
    fn test_denylist() {
        assert!(is_unsupported("KP"));
        assert!(is_unsupported("IR"));
        assert!(!is_unsupported("US"));

        let country = country_for_number("+850212345678").unwrap();
        assert_eq!(country.code, "KP");
        assert!(country.is_unsupported());
    }

    #[test]
    fn test_unknown_prefix_is_parse_error() {
        // 0 is not a valid country code after normalization
        let result = country_for_number("+999999999999");
        assert!(matches!(result, Err(AppError::PhoneParse(_))));
    }
}
