//! Line Transport Tests
//!
//! Accumulation and `\r\n` splitting of the modem's reply stream.

use hl78xx_modem::transport::{LineBuffer, TransportOwner};

// ============================================================================
// Line Splitting
// ============================================================================

#[test]
fn test_single_line() {
    let mut lines = LineBuffer::new();
    lines.push(b"OK\r\n");
    assert_eq!(lines.next_line().unwrap().as_slice(), b"OK");
    assert!(lines.next_line().is_none());
}

#[test]
fn test_multiple_lines_in_one_push() {
    let mut lines = LineBuffer::new();
    lines.push(b"+CSQ: 17,99\r\nOK\r\n");
    assert_eq!(lines.next_line().unwrap().as_slice(), b"+CSQ: 17,99");
    assert_eq!(lines.next_line().unwrap().as_slice(), b"OK");
    assert!(lines.next_line().is_none());
}

#[test]
fn test_partial_line_waits_for_delimiter() {
    let mut lines = LineBuffer::new();
    lines.push(b"+CEREG");
    assert!(lines.next_line().is_none());
    lines.push(b": 1\r");
    assert!(lines.next_line().is_none());
    lines.push(b"\n");
    assert_eq!(lines.next_line().unwrap().as_slice(), b"+CEREG: 1");
}

#[test]
fn test_blank_lines_are_skipped() {
    let mut lines = LineBuffer::new();
    lines.push(b"\r\n\r\nOK\r\n");
    assert_eq!(lines.next_line().unwrap().as_slice(), b"OK");
}

#[test]
fn test_lone_newline_is_not_a_delimiter() {
    // Only the full \r\n sequence terminates a line.
    let mut lines = LineBuffer::new();
    lines.push(b"a\nb\r\n");
    assert_eq!(lines.next_line().unwrap().as_slice(), b"a\nb");
}

#[test]
fn test_available_and_clear() {
    let mut lines = LineBuffer::new();
    lines.push(b"abc");
    assert_eq!(lines.available(), 3);
    lines.clear();
    assert_eq!(lines.available(), 0);
    assert!(lines.next_line().is_none());
}

#[test]
fn test_sustained_traffic_compacts() {
    // Far more than the accumulator size, line by line.
    let mut lines = LineBuffer::new();
    for _ in 0..100 {
        lines.push(b"+KTCP_DATA: 1,42\r\n");
        assert_eq!(lines.next_line().unwrap().as_slice(), b"+KTCP_DATA: 1,42");
    }
}

#[test]
fn test_overlong_garbage_is_dropped() {
    let mut lines = LineBuffer::new();
    // Fill the whole accumulator with delimiter-free noise.
    for _ in 0..10 {
        lines.push(&[b'x'; 64]);
    }
    assert!(lines.next_line().is_none());
    // The buffer recovered and accepts fresh lines.
    lines.push(b"OK\r\n");
    assert_eq!(lines.next_line().unwrap().as_slice(), b"OK");
}

// ============================================================================
// Transport Ownership
// ============================================================================

#[test]
fn test_owner_defaults_to_detached() {
    assert_eq!(TransportOwner::default(), TransportOwner::Detached);
}

#[test]
fn test_owner_states_are_mutually_exclusive() {
    // The chat layer and framer are distinct owners; handover is explicit.
    assert_ne!(TransportOwner::Chat, TransportOwner::Framer);
}
