//! Telemetry extraction from free-form device lines.
//!
//! Devices interleave status reports with their other output.  Each report is
//! a keyword, a `:` or `=` separator and a value:
//!
//! ```text
//! FW: 2.4.1                     → firmware version "2.4.1"
//! wlan_fw=7.35.180              → WLAN firmware version "7.35.180"
//! BLE MAC: a4:c1:38:00:11:22    → BLE MAC "A4:C1:38:00:11:22"
//! wifi_mac=a4c138001123         → WiFi MAC "A4:C1:38:00:11:23"
//! TRACE: E12 reset by watchdog  → trace "E12 reset by watchdog"
//! ```
//!
//! Keywords are case-insensitive.  One line may carry several reports; every
//! match is returned and the caller applies them in order (last write wins).

use std::sync::LazyLock;

use regex::Regex;

use super::mac::MacAddress;

static FIRMWARE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(wlan[ _-]?)?(?:fw|firmware)(?:[ _-]?ver(?:sion)?)?\s*[:=]\s*(\S+)")
        .expect("firmware pattern is a valid regex")
});

static SECONDARY_MAC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(ble|wifi|wlan)[ _-]?mac\s*[:=]\s*([0-9a-f]{2}(?:[:-][0-9a-f]{2}){5}|[0-9a-f]{12})\b",
    )
    .expect("secondary MAC pattern is a valid regex")
});

static TRACE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\btrace\s*[:=]\s*(.+)$").expect("trace pattern is a valid regex")
});

/// One telemetry value recognised in a device line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryField {
    FirmwareVersion(String),
    WlanFirmwareVersion(String),
    /// Canonical colon form.
    BleMac(String),
    /// Canonical colon form.
    WifiMac(String),
    Trace(String),
}

/// Returns every telemetry value found in `line`, in the order the patterns
/// are checked (firmware, secondary MACs, trace).
pub fn extract_telemetry(line: &str) -> Vec<TelemetryField> {
    let mut fields = Vec::new();

    for caps in FIRMWARE_PATTERN.captures_iter(line) {
        let Some(value) = caps.get(2) else { continue };
        let value = value.as_str().to_string();
        if caps.get(1).is_some() {
            fields.push(TelemetryField::WlanFirmwareVersion(value));
        } else {
            fields.push(TelemetryField::FirmwareVersion(value));
        }
    }

    for caps in SECONDARY_MAC_PATTERN.captures_iter(line) {
        let (Some(kind), Some(raw)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Ok(mac) = raw.as_str().parse::<MacAddress>() else {
            continue;
        };
        if kind.as_str().eq_ignore_ascii_case("ble") {
            fields.push(TelemetryField::BleMac(mac.to_string()));
        } else {
            fields.push(TelemetryField::WifiMac(mac.to_string()));
        }
    }

    if let Some(value) = TRACE_PATTERN.captures(line).and_then(|c| c.get(1)) {
        let trimmed = value.as_str().trim();
        if !trimmed.is_empty() {
            fields.push(TelemetryField::Trace(trimmed.to_string()));
        }
    }

    fields
}

// ── Tests ─────────────────────────────────────────────────────────────────────
