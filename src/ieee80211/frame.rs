//! 802.11 Frame Inspection
//!
//! Length-checked view over a raw received frame. Every field access the
//! classifier performs goes through this type; a frame shorter than the
//! field being read yields `None` instead of a panic.

use super::mac::MacAddr;

/// Length of the standard three-address management/data header
pub const MGMT_HEADER_LEN: usize = 24;

/// Frame type (2 bits of the frame-control field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Management = 0,
    Control = 1,
    Data = 2,
    Extension = 3,
}

impl From<u8> for FrameType {
    fn from(val: u8) -> Self {
        match val & 0x03 {
            0 => FrameType::Management,
            1 => FrameType::Control,
            2 => FrameType::Data,
            _ => FrameType::Extension,
        }
    }
}

/// Management frame subtypes the classifier dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSubtype {
    ProbeRequest,
    ProbeResponse,
    Beacon,
    Deauthentication,
    Other,
}

impl FrameSubtype {
    fn from_raw(frame_type: FrameType, subtype: u8) -> Self {
        if frame_type != FrameType::Management {
            return FrameSubtype::Other;
        }
        match subtype & 0x0f {
            4 => FrameSubtype::ProbeRequest,
            5 => FrameSubtype::ProbeResponse,
            8 => FrameSubtype::Beacon,
            12 => FrameSubtype::Deauthentication,
            _ => FrameSubtype::Other,
        }
    }
}

/// Bounds-checked view over a raw 802.11 frame
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    data: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Accept only frames carrying the full three-address header
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        if data.len() < MGMT_HEADER_LEN {
            return None;
        }
        Some(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn frame_type(&self) -> FrameType {
        FrameType::from((self.data[0] >> 2) & 0x03)
    }

    pub fn subtype(&self) -> FrameSubtype {
        FrameSubtype::from_raw(self.frame_type(), (self.data[0] >> 4) & 0x0f)
    }

    /// Address 1 (receiver/destination)
    pub fn addr1(&self) -> MacAddr {
        // parse() guarantees 24 bytes
        MacAddr::from_slice(&self.data[4..10]).unwrap_or(MacAddr::ZERO)
    }

    /// Address 2 (transmitter/source)
    pub fn addr2(&self) -> MacAddr {
        MacAddr::from_slice(&self.data[10..16]).unwrap_or(MacAddr::ZERO)
    }

    /// Address 3 (BSSID in infrastructure traffic)
    pub fn addr3(&self) -> MacAddr {
        MacAddr::from_slice(&self.data[16..22]).unwrap_or(MacAddr::ZERO)
    }

    pub fn raw(&self) -> &'a [u8] {
        self.data
    }

    /// Read an information element at an absolute frame offset.
    ///
    /// Returns `(tag, value)` only when the full element fits inside the
    /// frame; truncated elements are treated as absent.
    pub fn ie_at(&self, offset: usize) -> Option<(u8, &'a [u8])> {
        let tag = *self.data.get(offset)?;
        let len = *self.data.get(offset + 1)? as usize;
        let value = self.data.get(offset + 2..offset + 2 + len)?;
        Some((tag, value))
    }

    /// Read an SSID element (tag 0) at an absolute frame offset.
    ///
    /// Empty and oversized (>32 byte) SSIDs yield `None`.
    pub fn ssid_ie_at(&self, offset: usize) -> Option<&'a [u8]> {
        match self.ie_at(offset) {
            Some((0, value)) if !value.is_empty() && value.len() <= 32 => Some(value),
            _ => None,
        }
    }
}
