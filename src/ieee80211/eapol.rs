//! EAPOL-Key Detection and Parsing
//!
//! Identifies authentication-key-exchange frames inside monitor-mode
//! traffic and extracts the handshake message number and, for message 1,
//! the PMKID key-data element when present.

use super::frame::MGMT_HEADER_LEN;

/// Offset of the LLC/SNAP EtherType inside a data frame:
/// 24-byte header + 6 bytes of LLC/SNAP before the type field.
const ETHERTYPE_OFFSET: usize = MGMT_HEADER_LEN + 6;

/// Offset of the EAPOL packet past the 8-byte LLC/SNAP encapsulation
const EAPOL_OFFSET: usize = MGMT_HEADER_LEN + 8;

/// Minimum EAPOL-Key body: descriptor + key info + key length + replay
/// counter + nonce + IV + RSC + key ID + MIC + key-data length.
const KEY_BODY_MIN: usize = 95;

/// Check for the EAPOL EtherType marker at the expected payload offset.
pub fn is_eapol(frame: &[u8]) -> bool {
    frame.len() > EAPOL_OFFSET + 4 && frame[ETHERTYPE_OFFSET..ETHERTYPE_OFFSET + 2] == [0x88, 0x8e]
}

/// Parsed EAPOL-Key frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapolKey {
    /// Handshake message number (1-4, 0 when the key-info bits match none)
    pub message_number: u8,
    /// PMKID from the message-1 key data, when advertised
    pub pmkid: Option<[u8; 16]>,
}

/// Key information flags (big-endian u16 in the key body)
#[derive(Debug, Clone, Copy)]
struct KeyInfo {
    install: bool,
    ack: bool,
    mic: bool,
    secure: bool,
}

impl KeyInfo {
    fn from_u16(val: u16) -> Self {
        Self {
            install: val & 0x40 != 0,
            ack: val & 0x80 != 0,
            mic: val & 0x100 != 0,
            secure: val & 0x200 != 0,
        }
    }

    /// Map the flag combination to a 4-way handshake message number
    fn message_number(&self) -> u8 {
        match (self.ack, self.mic, self.secure, self.install) {
            (true, false, false, false) => 1, // AP -> STA, ANonce
            (false, true, false, false) => 2, // STA -> AP, SNonce
            (true, true, true, true) => 3,    // AP -> STA, install key
            (false, true, true, false) => 4,  // STA -> AP, confirm
            _ => 0,
        }
    }
}

/// Parse an EAPOL-Key frame out of a full 802.11 data frame.
///
/// Returns `None` for non-key EAPOL packets and for frames too short to
/// carry the fixed key body.
pub fn parse_eapol_key(frame: &[u8]) -> Option<EapolKey> {
    if !is_eapol(frame) {
        return None;
    }

    let eapol = frame.get(EAPOL_OFFSET..)?;
    // EAPOL header: version, packet type, body length
    if *eapol.get(1)? != 0x03 {
        return None; // not EAPOL-Key
    }

    let body = eapol.get(4..)?;
    if body.len() < KEY_BODY_MIN {
        return None;
    }

    let key_info = KeyInfo::from_u16(u16::from_be_bytes([body[1], body[2]]));
    let message_number = key_info.message_number();

    let data_len = u16::from_be_bytes([body[93], body[94]]) as usize;
    let key_data = body.get(95..95 + data_len).unwrap_or(&[]);

    let pmkid = if message_number == 1 {
        find_pmkid(key_data)
    } else {
        None
    };

    Some(EapolKey {
        message_number,
        pmkid,
    })
}

/// Scan key-data elements for the PMKID KDE (tag 0xdd, OUI 00:0f:ac, type 4)
fn find_pmkid(key_data: &[u8]) -> Option<[u8; 16]> {
    let mut pos = 0;
    while pos + 2 <= key_data.len() {
        let tag = key_data[pos];
        let len = key_data[pos + 1] as usize;
        let value = key_data.get(pos + 2..pos + 2 + len)?;

        if tag == 0xdd && len >= 20 && value[..3] == [0x00, 0x0f, 0xac] && value[3] == 0x04 {
            let mut pmkid = [0u8; 16];
            pmkid.copy_from_slice(&value[4..20]);
            return Some(pmkid);
        }
        pos += 2 + len;
    }
    None
}
