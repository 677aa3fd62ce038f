//! Link-layer (MAC) address recognition and canonicalisation.
//!
//! Devices report their address in whatever form their firmware prefers:
//!
//! ```text
//! aa:bb:cc:dd:ee:ff      colon separated
//! AA-BB-CC-DD-EE-FF      dash separated
//! aabbccddeeff           bare hex
//! ```
//!
//! All three are parsed into the same [`MacAddress`], whose `Display` form is
//! the canonical upper-case colon-separated string stored on the session.  The
//! session *token* is the same twelve hex digits without separators.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Matches six hex byte groups, either separated by `:`/`-` or bare.
static MAC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5}|[0-9A-Fa-f]{12})\b")
        .expect("MAC pattern is a valid regex")
});

/// Error returned when a string is not a MAC address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a MAC address: '{0}'")]
pub struct MacParseError(pub String);

/// A 48-bit link-layer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Builds an address from its six octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns the raw octets.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Returns the display token: twelve upper-case hex digits, no separators.
    pub fn token(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// Parses colon, dash or bare-hex notation.  Separators may be mixed but
    /// every byte must be exactly two hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MacParseError(s.to_string());

        let digits: String = if s.len() == 12 {
            s.to_string()
        } else if s.len() == 17 {
            // Every third character must be a separator.
            let mut out = String::with_capacity(12);
            for (i, ch) in s.chars().enumerate() {
                if i % 3 == 2 {
                    if ch != ':' && ch != '-' {
                        return Err(err());
                    }
                } else {
                    out.push(ch);
                }
            }
            out
        } else {
            return Err(err());
        };

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            let pair = digits.get(i * 2..i * 2 + 2).ok_or_else(err)?;
            *octet = u8::from_str_radix(pair, 16).map_err(|_| err())?;
        }
        Ok(Self(octets))
    }
}

/// Returns the first MAC-looking token in `line`, if any.
pub fn find_mac(line: &str) -> Option<MacAddress> {
    MAC_PATTERN
        .find_iter(line)
        .find_map(|m| m.as_str().parse().ok())
}

/// Returns `true` when `s` is, in its entirety, a MAC address.
pub fn is_mac(s: &str) -> bool {
    s.parse::<MacAddress>().is_ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const OCTETS: [u8; 6] = [0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03];

    #[test]
    fn test_parse_colon_separated_lowercase() {
        let mac: MacAddress = "aa:bb:cc:01:02:03".parse().unwrap();
        assert_eq!(mac.octets(), OCTETS);
    }

    #[test]
    fn test_parse_dash_separated() {
        let mac: MacAddress = "AA-BB-CC-01-02-03".parse().unwrap();
        assert_eq!(mac.octets(), OCTETS);
    }

    #[test]
    fn test_parse_bare_hex() {
        let mac: MacAddress = "aabbcc010203".parse().unwrap();
        assert_eq!(mac.octets(), OCTETS);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!("aa:bb:cc:01:02".parse::<MacAddress>().is_err());
        assert!("aabbcc0102".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_parse_rejects_non_hex_digits() {
        let result = "zz:bb:cc:01:02:03".parse::<MacAddress>();
        assert_eq!(result, Err(MacParseError("zz:bb:cc:01:02:03".to_string())));
    }

    #[test]
    fn test_parse_rejects_misplaced_separator() {
        assert!("aab:bcc:01:02:03:".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_display_is_canonical_uppercase_colon_form() {
        let mac = MacAddress::new(OCTETS);
        assert_eq!(mac.to_string(), "AA:BB:CC:01:02:03");
    }

    #[test]
    fn test_token_strips_separators() {
        let mac = MacAddress::new(OCTETS);
        assert_eq!(mac.token(), "AABBCC010203");
    }

    #[test]
    fn test_find_mac_inside_free_text() {
        // Arrange
        let line = "BOOT ok mac=aa:bb:cc:01:02:03 rssi=-40";

        // Act
        let found = find_mac(line);

        // Assert
        assert_eq!(found, Some(MacAddress::new(OCTETS)));
    }

    #[test]
    fn test_find_mac_bare_form() {
        assert_eq!(find_mac("ID AABBCC010203"), Some(MacAddress::new(OCTETS)));
    }

    #[test]
    fn test_find_mac_returns_first_of_several() {
        let line = "11:22:33:44:55:66 then aa:bb:cc:01:02:03";
        assert_eq!(
            find_mac(line).map(|m| m.to_string()),
            Some("11:22:33:44:55:66".to_string())
        );
    }

    #[test]
    fn test_find_mac_ignores_longer_hex_runs() {
        // 16 hex digits is not a MAC (no word boundary after 12 digits).
        assert_eq!(find_mac("hash 0123456789abcdef"), None);
    }

    #[test]
    fn test_find_mac_none_for_plain_text() {
        assert_eq!(find_mac("hello world"), None);
    }

    #[test]
    fn test_is_mac() {
        assert!(is_mac("aa:bb:cc:01:02:03"));
        assert!(!is_mac("1001"));
        assert!(!is_mac("3E8"));
    }
}
