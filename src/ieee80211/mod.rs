//! 802.11 Frame Handling
//!
//! Wire-format parsing and construction for the management frames the
//! engine injects and the data frames the capture path classifies.

pub mod builder;
pub mod eapol;
pub mod frame;
pub mod mac;

pub use builder::{build_beacon, build_deauth, build_probe_request, FrameError};
pub use eapol::{is_eapol, parse_eapol_key, EapolKey};
pub use frame::{FrameSubtype, FrameType, FrameView, MGMT_HEADER_LEN};
pub use mac::MacAddr;
