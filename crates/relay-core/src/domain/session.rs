//! The per-device session record.
//!
//! A [`Session`] is created the instant a device connection is accepted and
//! lives until that connection closes.  It starts *unidentified*: every
//! reported field holds the sentinel [`SENTINEL`] (`"NA"`).  The first MAC
//! address the device sends identifies it; telemetry lines overwrite their
//! respective fields whenever they arrive.
//!
//! # Session lifecycle
//!
//! ```text
//! accept ──► Connected (mac = NA) ──► Connected (mac set) ──► Closed
//!                 │                                            ▲
//!                 └────────────── timeout / drop / EOF ────────┘
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::mac::MacAddress;
use super::telemetry::TelemetryField;

/// Numeric session identifier.  Allocated monotonically, never reused.
pub type SessionId = u64;

/// The first identifier handed out by a fresh registry.
pub const FIRST_SESSION_ID: SessionId = 1001;

/// Placeholder shown for any field the device has not reported yet.
pub const SENTINEL: &str = "NA";

/// Connection status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connected,
    Closed,
}

/// Which listener accepted the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Tls,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Plain => f.write_str("tcp"),
            Transport::Tls => f.write_str("tls"),
        }
    }
}

/// Server-side record of one live device connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub status: SessionStatus,
    /// MAC without separators, or [`SENTINEL`] until identified.
    pub token: String,
    /// `None` until the device identifies itself.
    pub mac: Option<MacAddress>,
    pub trace: String,
    pub firmware_version: String,
    pub ble_mac: String,
    pub wifi_mac: String,
    pub wlan_firmware_version: String,
    pub remote_addr: SocketAddr,
    pub transport: Transport,
    pub started_at: Instant,
}

impl Session {
    /// Creates an unidentified, connected session.
    pub fn new(
        id: SessionId,
        remote_addr: SocketAddr,
        transport: Transport,
        started_at: Instant,
    ) -> Self {
        Self {
            id,
            status: SessionStatus::Connected,
            token: SENTINEL.to_string(),
            mac: None,
            trace: SENTINEL.to_string(),
            firmware_version: SENTINEL.to_string(),
            ble_mac: SENTINEL.to_string(),
            wifi_mac: SENTINEL.to_string(),
            wlan_firmware_version: SENTINEL.to_string(),
            remote_addr,
            transport,
            started_at,
        }
    }

    /// Returns `true` once a MAC address has been recorded.
    pub fn is_identified(&self) -> bool {
        self.mac.is_some()
    }

    /// Canonical MAC string, or the sentinel.
    pub fn mac_display(&self) -> String {
        self.mac
            .map_or_else(|| SENTINEL.to_string(), |mac| mac.to_string())
    }

    /// Records the device MAC and derives the token.
    ///
    /// Only the first call has any effect.  Returns `true` if this call
    /// identified the session.
    pub fn identify(&mut self, mac: MacAddress) -> bool {
        if self.mac.is_some() {
            return false;
        }
        self.token = mac.token();
        self.mac = Some(mac);
        true
    }

    /// Overwrites the field named by `field`.
    pub fn apply_telemetry(&mut self, field: &TelemetryField) {
        match field {
            TelemetryField::FirmwareVersion(v) => self.firmware_version.clone_from(v),
            TelemetryField::WlanFirmwareVersion(v) => self.wlan_firmware_version.clone_from(v),
            TelemetryField::BleMac(v) => self.ble_mac.clone_from(v),
            TelemetryField::WifiMac(v) => self.wifi_mac.clone_from(v),
            TelemetryField::Trace(v) => self.trace.clone_from(v),
        }
    }

    /// Time since the connection was accepted.
    pub fn uptime(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// Formats the `ls` line for this session.
    ///
    /// ```text
    /// [SESS][1001][AABBCC010203] 0 days, 01:02:03 trace: NA\t2.4.1\t-- 10.0.0.7:50122
    /// ```
    pub fn listing_line(&self, now: Instant) -> String {
        format!(
            "[SESS][{}][{}] {} trace: {}\t{}\t-- {}",
            self.id,
            self.token,
            format_uptime(self.uptime(now)),
            self.trace,
            self.firmware_version,
            self.remote_addr
        )
    }
}

/// Renders a duration as `<days> days, HH:MM:SS`.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{days} days, {hours:02}:{minutes:02}:{seconds:02}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session() -> Session {
        Session::new(
            FIRST_SESSION_ID,
            "10.0.0.7:50122".parse().unwrap(),
            Transport::Plain,
            Instant::now(),
        )
    }

    #[test]
    fn test_new_session_has_sentinel_fields() {
        let s = make_session();
        assert_eq!(s.status, SessionStatus::Connected);
        assert_eq!(s.token, SENTINEL);
        assert_eq!(s.mac, None);
        assert_eq!(s.mac_display(), SENTINEL);
        assert_eq!(s.trace, SENTINEL);
        assert_eq!(s.firmware_version, SENTINEL);
        assert_eq!(s.ble_mac, SENTINEL);
        assert_eq!(s.wifi_mac, SENTINEL);
        assert_eq!(s.wlan_firmware_version, SENTINEL);
        assert!(!s.is_identified());
    }

    #[test]
    fn test_identify_sets_mac_and_token_once() {
        // Arrange
        let mut s = make_session();
        let first: MacAddress = "aa:bb:cc:01:02:03".parse().unwrap();
        let second: MacAddress = "11:22:33:44:55:66".parse().unwrap();

        // Act
        let first_result = s.identify(first);
        let second_result = s.identify(second);

        // Assert: the second MAC is ignored
        assert!(first_result);
        assert!(!second_result);
        assert_eq!(s.mac, Some(first));
        assert_eq!(s.token, "AABBCC010203");
        assert_eq!(s.mac_display(), "AA:BB:CC:01:02:03");
    }

    #[test]
    fn test_apply_telemetry_last_write_wins() {
        let mut s = make_session();
        s.apply_telemetry(&TelemetryField::FirmwareVersion("1.0".to_string()));
        s.apply_telemetry(&TelemetryField::FirmwareVersion("1.1".to_string()));
        assert_eq!(s.firmware_version, "1.1");
    }

    #[test]
    fn test_apply_telemetry_touches_only_its_field() {
        let mut s = make_session();
        s.apply_telemetry(&TelemetryField::BleMac("A4:C1:38:00:11:22".to_string()));
        assert_eq!(s.ble_mac, "A4:C1:38:00:11:22");
        assert_eq!(s.wifi_mac, SENTINEL);
        assert_eq!(s.trace, SENTINEL);
    }

    #[test]
    fn test_format_uptime_pads_fields() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0 days, 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(3_723)), "0 days, 01:02:03");
    }

    #[test]
    fn test_format_uptime_rolls_over_days() {
        let secs = 2 * 86_400 + 5 * 3_600 + 6 * 60 + 7;
        assert_eq!(format_uptime(Duration::from_secs(secs)), "2 days, 05:06:07");
    }

    #[test]
    fn test_listing_line_layout() {
        // Arrange
        let mut s = make_session();
        s.identify("aa:bb:cc:01:02:03".parse().unwrap());
        s.apply_telemetry(&TelemetryField::FirmwareVersion("2.4.1".to_string()));
        let now = s.started_at + Duration::from_secs(3_723);

        // Act
        let line = s.listing_line(now);

        // Assert
        assert_eq!(
            line,
            "[SESS][1001][AABBCC010203] 0 days, 01:02:03 trace: NA\t2.4.1\t-- 10.0.0.7:50122"
        );
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(Transport::Plain.to_string(), "tcp");
        assert_eq!(Transport::Tls.to_string(), "tls");
    }
}
