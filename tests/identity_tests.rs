//! Identity and APN Tests
//!
//! Field storage, the derived interface MAC, and carrier APN detection.

use hl78xx_modem::modem::apn::{detect_apn, find_apn, APN_PROFILES};
use hl78xx_modem::modem::identity::{hash32, ModemIdentity, MAC_VENDOR_PREFIX};

// ============================================================================
// Field Storage
// ============================================================================

#[test]
fn test_fields_start_empty() {
    let identity = ModemIdentity::new();
    assert!(identity.imei().is_empty());
    assert!(identity.imsi().is_empty());
    assert!(identity.iccid().is_empty());
    assert!(identity.apn().is_empty());
}

#[test]
fn test_set_and_get_fields() {
    let mut identity = ModemIdentity::new();
    identity.set_imei(b"351234567890123");
    identity.set_model(b"HL7800");
    identity.set_manufacturer(b"Sierra Wireless");
    identity.set_apn(b"iot.1nce.net");

    assert_eq!(identity.imei(), "351234567890123");
    assert_eq!(identity.model(), "HL7800");
    assert_eq!(identity.manufacturer(), "Sierra Wireless");
    assert_eq!(identity.apn(), "iot.1nce.net");
}

#[test]
fn test_overlong_field_is_truncated() {
    let mut identity = ModemIdentity::new();
    identity.set_model(b"0123456789ABCDEF-THIS-PART-DROPS");
    assert_eq!(identity.model(), "0123456789ABCDEF");
}

#[test]
fn test_set_replaces_previous_value() {
    let mut identity = ModemIdentity::new();
    identity.set_apn(b"first.apn");
    identity.set_apn(b"x");
    assert_eq!(identity.apn(), "x");
}

// ============================================================================
// Synthetic MAC
// ============================================================================

#[test]
fn test_mac_requires_imei() {
    let identity = ModemIdentity::new();
    assert!(identity.mac_address().is_none());
}

#[test]
fn test_mac_uses_vendor_prefix() {
    let mut identity = ModemIdentity::new();
    identity.set_imei(b"351234567890123");
    let mac = identity.mac_address().unwrap();
    assert_eq!(&mac[..2], &MAC_VENDOR_PREFIX);
}

#[test]
fn test_mac_is_stable_across_reads() {
    // Same IMEI, same MAC: interface identity survives reboots without
    // persisted storage.
    let mut a = ModemIdentity::new();
    a.set_imei(b"351234567890123");
    let mut b = ModemIdentity::new();
    b.set_imei(b"351234567890123");
    assert_eq!(a.mac_address(), b.mac_address());
}

#[test]
fn test_mac_differs_per_imei() {
    let mut a = ModemIdentity::new();
    a.set_imei(b"351234567890123");
    let mut b = ModemIdentity::new();
    b.set_imei(b"351234567890124");
    assert_ne!(a.mac_address(), b.mac_address());
}

#[test]
fn test_hash32_is_deterministic() {
    assert_eq!(hash32(b"abc"), hash32(b"abc"));
    assert_ne!(hash32(b"abc"), hash32(b"abd"));
    // FNV-1a offset basis for empty input.
    assert_eq!(hash32(b""), 0x811c_9dc5);
}

// ============================================================================
// APN Detection
// ============================================================================

#[test]
fn test_find_apn_exact_prefix_returns_apn_unmodified() {
    let profiles = ["31017=m2m.example.org"];
    assert_eq!(find_apn(&profiles, "31017"), Some("m2m.example.org"));
}

#[test]
fn test_find_apn_prefix_match_on_longer_ident() {
    let profiles = ["8988303=iot.1nce.net"];
    assert_eq!(
        find_apn(&profiles, "89883030000012345678"),
        Some("iot.1nce.net")
    );
}

#[test]
fn test_find_apn_prefix_longer_than_ident_is_not_found() {
    let profiles = ["8988303000099999=nope"];
    assert_eq!(find_apn(&profiles, "8988303"), None);
}

#[test]
fn test_find_apn_skips_malformed_entries() {
    let profiles = ["no-separator", "31017=m2m.example.org"];
    assert_eq!(find_apn(&profiles, "31017"), Some("m2m.example.org"));
}

#[test]
fn test_find_apn_no_match() {
    assert_eq!(find_apn(APN_PROFILES, "999999999"), None);
    assert_eq!(find_apn(APN_PROFILES, ""), None);
}

#[test]
fn test_detect_apn_prefers_iccid() {
    let mut identity = ModemIdentity::new();
    identity.set_iccid(b"89883030000012345678");
    identity.set_imsi(b"310170123456789");
    assert_eq!(detect_apn(&identity), Some("iot.1nce.net"));
}

#[test]
fn test_detect_apn_falls_back_to_imsi() {
    let mut identity = ModemIdentity::new();
    identity.set_iccid(b"00000000000000000000");
    identity.set_imsi(b"310170123456789");
    assert_eq!(detect_apn(&identity), Some("m2m.com.attz"));
}

#[test]
fn test_detect_apn_unknown_sim() {
    let identity = ModemIdentity::new();
    assert_eq!(detect_apn(&identity), None);
}
