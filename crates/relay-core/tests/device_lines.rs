//! Integration tests for the relay-core public API.
//!
//! These walk a device's text output through the same steps the server
//! takes: frame bytes into lines, look for the identifying MAC, apply
//! telemetry to the session, and render the `ls` line an admin would see.

use std::time::{Duration, Instant};

use relay_core::{
    extract_telemetry, find_mac, AdminCommand, LineBuffer, Session, Target, Transport,
    FIRST_SESSION_ID, SENTINEL,
};

/// Feeds `chunks` through a fresh line buffer and applies every line to a
/// new session the way the device handler does.
fn replay(chunks: &[&[u8]]) -> Session {
    let mut session = Session::new(
        FIRST_SESSION_ID,
        "10.1.2.3:40001".parse().unwrap(),
        Transport::Plain,
        Instant::now(),
    );
    let mut buf = LineBuffer::new();
    for chunk in chunks {
        buf.extend(chunk);
        while let Some(line) = buf.next_line() {
            if !session.is_identified() {
                if let Some(mac) = find_mac(&line) {
                    session.identify(mac);
                }
            }
            for field in extract_telemetry(&line) {
                session.apply_telemetry(&field);
            }
        }
    }
    session
}

#[test]
fn test_device_identifies_across_split_reads() {
    // Arrange: the MAC line is split across two TCP reads
    let chunks: [&[u8]; 3] = [b"HELLO a4:c1:38", b":00:11:22\nFW: 3.0", b".1\n"];

    // Act
    let session = replay(&chunks);

    // Assert
    assert_eq!(session.token, "A4C138001122");
    assert_eq!(session.mac_display(), "A4:C1:38:00:11:22");
    assert_eq!(session.firmware_version, "3.0.1");
}

#[test]
fn test_later_mac_lines_do_not_change_identity() {
    let chunks: [&[u8]; 1] = [b"id a4c138001122\nid 11:22:33:44:55:66\n"];
    let session = replay(&chunks);
    assert_eq!(session.token, "A4C138001122");
}

#[test]
fn test_telemetry_applies_before_identification() {
    // Telemetry on the very first line counts even though no MAC is known yet.
    let chunks: [&[u8]; 1] = [b"TRACE: T07\n"];
    let session = replay(&chunks);
    assert!(!session.is_identified());
    assert_eq!(session.token, SENTINEL);
    assert_eq!(session.trace, "T07");
}

#[test]
fn test_listing_line_matches_token_filter() {
    // Arrange
    let chunks: [&[u8]; 1] = [b"a4:c1:38:00:11:22\n"];
    let session = replay(&chunks);
    let line = session.listing_line(session.started_at + Duration::from_secs(61));

    // Act
    let filter = match AdminCommand::parse("ls C138") {
        AdminCommand::List { filter } => filter,
        other => panic!("expected List, got {other:?}"),
    };

    // Assert
    assert!(line.contains(&filter));
    assert!(line.contains("0 days, 00:01:01"));
}

#[test]
fn test_cmd_targets_mixed_with_bad_entry() {
    let cmd = AdminCommand::parse("cmd AA:BB:CC:DD:EE:FF,11:22:33:44:55:66,nope PING");
    let AdminCommand::Command { targets, payload } = cmd else {
        panic!("expected Command");
    };
    assert_eq!(payload, "PING");
    assert_eq!(targets.len(), 3);
    assert!(matches!(targets[0], Target::Mac(_)));
    assert!(matches!(targets[1], Target::Mac(_)));
    assert_eq!(targets[2], Target::Invalid("nope".to_string()));
}
