//! SSID Pools
//!
//! Curated and procedurally generated network names for the flood and
//! probe-spam attacks.

use rand::Rng;

/// Default beacon flood pool
pub const DEFAULT_SSIDS: &[&str] = &[
    "Free WiFi",
    "GoogleGuest",
    "FBI Surveillance Van",
    "NASA Deep Space",
    "5G COVID Tower",
    "Wu-Tang LAN",
    "Pretty Fly for a WiFi",
    "Hide Yo Kids Hide Yo WiFi",
    "The Promised LAN",
    "LAN of the Dead",
];

const EMOJI_SSIDS: &[&str] = &[
    "🔥🔥🔥", "☠️☠️☠️", "🖕🖕🖕", "🍆🍑💦", "🚀🚀🚀", "🤡🤡🤡", "👁️👄👁️", "💣💣💣", "🚩🚩🚩", "📶📶📶",
];

const FUNNY_SSIDS: &[&str] = &[
    "Mom Use This One",
    "FBI Surveillance Van #4",
    "Troy and Abed in the Modem",
    "Martin Router King",
    "Skynet Global Defense",
    "Loading...",
    "Connecting...",
    "Virus Distribution Center",
    "Hack Me If You Can",
    "Free iPhone 16 Pro",
    "Batcave secure wifi",
    "404 Network Not Found",
    "Tell My Wifi Love Her",
    "No Free WiFi Here",
    "It hurts when IP",
    "Drop it like it's Hotspot",
];

/// Themed pool for the chaos flood
pub const CHAOS_SSIDS: &[&str] = &[
    "☠️ DANGER ☠️",
    "🔥 FIRE 🔥",
    "☢️ NUCLEAR ☢️",
    "👽 ALIENS 👽",
    "👻 GHOST 👻",
    "💀 SKULL 💀",
    "💣 BOMB 💣",
    "⚡ SHOCK ⚡",
    "🛑 STOP 🛑",
    "⚠️ WARNING ⚠️",
    "ZALGO_HE_COMES",
    "¯\\_(ツ)_/¯",
    "(╯°□°)╯︵ ┻━┻",
    "Loading... 0%",
    "Loading... 99%",
    "Buffering...",
    "No Internet",
];

/// Device names used by probe spam to look like real clients scanning
pub const DEVICE_SSIDS: &[&str] = &[
    "iPhone 15 Pro",
    "Samsung S24 Ultra",
    "MacBook Pro",
    "Windows PC",
    "Tesla Model S",
    "Google Pixel A",
    "Amazon Echo",
    "PlayStation 5",
];

/// Procedural SSID for beacon frame `index` of a flood batch: every 10th
/// an emoji name, every 3rd a funny name, otherwise printable gibberish.
pub fn generate<R: Rng>(index: usize, rng: &mut R) -> String {
    if index % 10 == 0 {
        let emoji = EMOJI_SSIDS[rng.gen_range(0..EMOJI_SSIDS.len())];
        format!("{emoji} Free WiFi")
    } else if index % 3 == 0 {
        FUNNY_SSIDS[rng.gen_range(0..FUNNY_SSIDS.len())].to_string()
    } else {
        (0..10)
            .map(|_| rng.gen_range(33u8..126) as char)
            .collect()
    }
}

pub fn chaos<R: Rng>(rng: &mut R) -> &'static str {
    CHAOS_SSIDS[rng.gen_range(0..CHAOS_SSIDS.len())]
}

pub fn device<R: Rng>(rng: &mut R) -> &'static str {
    DEVICE_SSIDS[rng.gen_range(0..DEVICE_SSIDS.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_ssids_fit_on_air() {
        let mut rng = StdRng::seed_from_u64(9);
        for i in 0..200 {
            let ssid = generate(i, &mut rng);
            assert!(!ssid.is_empty());
            assert!(ssid.len() <= 32, "ssid {ssid:?} too long");
        }
    }

    #[test]
    fn test_pool_entries_fit_on_air() {
        for ssid in DEFAULT_SSIDS
            .iter()
            .chain(CHAOS_SSIDS)
            .chain(DEVICE_SSIDS)
        {
            assert!(ssid.len() <= 32, "ssid {ssid:?} too long");
        }
    }
}
