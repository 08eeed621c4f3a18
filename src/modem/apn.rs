//! APN auto-detection
//!
//! Carrier APNs keyed by IMSI or ICCID prefix. Each profile entry has the
//! form `"<number_prefix>=<apn>"`.

use super::identity::ModemIdentity;

/// Built-in APN profiles, keyed by ICCID or IMSI prefix.
pub static APN_PROFILES: &[&str] = &[
    // ICCID-keyed
    "8901260=wireless.twilio.com",
    "8988303=iot.1nce.net",
    "893108=iot.truphone.com",
    "8988228=em",
    // IMSI-keyed
    "310410=m2m.com.attz",
    "310170=m2m.com.attz",
    "204080=m2m.tele2.com",
];

/// Find the APN whose prefix matches the start of `ident`.
///
/// Entries without a `=` separator are skipped. A prefix longer than
/// `ident` simply does not match; there is no partial comparison beyond
/// the identifier's length.
#[must_use]
pub fn find_apn<'a>(profiles: &[&'a str], ident: &str) -> Option<&'a str> {
    for profile in profiles {
        if let Some((prefix, apn)) = profile.split_once('=') {
            if !prefix.is_empty() && ident.starts_with(prefix) {
                return Some(apn);
            }
        }
    }
    None
}

/// Detect the APN for the SIM described by `identity`, trying the ICCID
/// first and falling back to the IMSI.
#[must_use]
pub fn detect_apn(identity: &ModemIdentity) -> Option<&'static str> {
    if !identity.iccid().is_empty() {
        if let Some(apn) = find_apn(APN_PROFILES, identity.iccid()) {
            return Some(apn);
        }
    }
    if !identity.imsi().is_empty() {
        return find_apn(APN_PROFILES, identity.imsi());
    }
    None
}
