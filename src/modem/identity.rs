//! Modem identity
//!
//! Fixed-capacity identity strings populated incrementally by the init
//! script's response handlers. Nothing is persisted: every field is re-read
//! from the modem on each boot.

use heapless::String;

use crate::config::identity::{
    APN_SIZE, ICCID_SIZE, IMEI_SIZE, IMSI_SIZE, MANUFACTURER_SIZE, MODEL_SIZE, OPERATOR_SIZE,
    REVISION_SIZE,
};

/// Vendor prefix of the synthetic interface MAC address.
pub const MAC_VENDOR_PREFIX: [u8; 2] = [0x00, 0x14];

/// Identity fields read from the modem during initialization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModemIdentity {
    imei: String<IMEI_SIZE>,
    model: String<MODEL_SIZE>,
    imsi: String<IMSI_SIZE>,
    iccid: String<ICCID_SIZE>,
    manufacturer: String<MANUFACTURER_SIZE>,
    revision: String<REVISION_SIZE>,
    operator: String<OPERATOR_SIZE>,
    apn: String<APN_SIZE>,
}

impl ModemIdentity {
    /// Create an empty identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// International mobile equipment identity.
    #[must_use]
    pub fn imei(&self) -> &str {
        &self.imei
    }

    /// Model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// International mobile subscriber identity.
    #[must_use]
    pub fn imsi(&self) -> &str {
        &self.imsi
    }

    /// SIM card identifier.
    #[must_use]
    pub fn iccid(&self) -> &str {
        &self.iccid
    }

    /// Manufacturer string.
    #[must_use]
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// Firmware revision.
    #[must_use]
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Registered network operator, if reported.
    #[must_use]
    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// Access point name currently applied.
    #[must_use]
    pub fn apn(&self) -> &str {
        &self.apn
    }

    /// Store the IMEI.
    pub fn set_imei(&mut self, value: &[u8]) {
        set_field(&mut self.imei, value);
    }

    /// Store the model identifier.
    pub fn set_model(&mut self, value: &[u8]) {
        set_field(&mut self.model, value);
    }

    /// Store the IMSI.
    pub fn set_imsi(&mut self, value: &[u8]) {
        set_field(&mut self.imsi, value);
    }

    /// Store the ICCID.
    pub fn set_iccid(&mut self, value: &[u8]) {
        set_field(&mut self.iccid, value);
    }

    /// Store the manufacturer string.
    pub fn set_manufacturer(&mut self, value: &[u8]) {
        set_field(&mut self.manufacturer, value);
    }

    /// Store the firmware revision.
    pub fn set_revision(&mut self, value: &[u8]) {
        set_field(&mut self.revision, value);
    }

    /// Store the operator name.
    pub fn set_operator(&mut self, value: &[u8]) {
        set_field(&mut self.operator, value);
    }

    /// Store the applied APN.
    pub fn set_apn(&mut self, value: &[u8]) {
        set_field(&mut self.apn, value);
    }

    /// Derive a stable interface MAC address from the IMEI.
    ///
    /// The address survives reboots without persisted storage because the
    /// IMEI is re-read and re-hashed identically each boot. Returns `None`
    /// until the IMEI is known.
    #[must_use]
    pub fn mac_address(&self) -> Option<[u8; 6]> {
        if self.imei.is_empty() {
            return None;
        }
        let h = hash32(self.imei.as_bytes());
        Some([
            MAC_VENDOR_PREFIX[0],
            MAC_VENDOR_PREFIX[1],
            (h >> 24) as u8,
            (h >> 16) as u8,
            (h >> 8) as u8,
            h as u8,
        ])
    }
}

/// 32-bit FNV-1a hash.
#[must_use]
pub fn hash32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Replace `field` with `value`, truncating to capacity. Invalid UTF-8
/// leaves the field empty rather than propagating an error.
fn set_field<const N: usize>(field: &mut String<N>, value: &[u8]) {
    field.clear();
    let take = value.len().min(N);
    if let Ok(text) = core::str::from_utf8(&value[..take]) {
        let _ = field.push_str(text);
    }
}
