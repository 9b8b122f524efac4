//! Promiscuous-Capture Classification
//!
//! Consumes every frame the radio monitor delivers, filters by the
//! active target and dispatches to the client registry, the capture
//! buffer and the reveal/karma logs depending on the attack mode.
//!
//! All shared state sits behind short-lived mutex guards, so this path
//! is safe to run both from the control loop draining the monitor
//! channel and from a direct `on_frame` delivery.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::attack::session::{AttackKind, DeauthMode, SessionCounters};
use crate::capture::CaptureBuffer;
use crate::clients::ClientRegistry;
use crate::ieee80211::{eapol, FrameSubtype, FrameType, FrameView, MacAddr, MGMT_HEADER_LEN};

/// Maximum SSIDs remembered from karma-mode probe requests
const PROBE_LOG_CAP: usize = 16;

/// Offset of the first IE in a probe response (past the fixed fields)
const PROBE_RESP_IE_OFFSET: usize = MGMT_HEADER_LEN + 12;

/// What the classifier acts on for the current attack mode
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyPolicy {
    /// Upsert client addresses from target data frames
    pub collect_clients: bool,
    /// Count and record EAPOL key-exchange frames
    pub capture_eapol: bool,
    /// Parse target probe responses for a hidden SSID
    pub reveal_ssid: bool,
    /// Log SSIDs sought by nearby probe requests
    pub log_probes: bool,
}

impl ClassifyPolicy {
    pub fn off() -> Self {
        Self::default()
    }

    /// Derive the policy from the attack kind. EAPOL capture runs for
    /// every mode that has monitor delivery enabled.
    pub fn for_kind(kind: AttackKind) -> Self {
        match kind {
            AttackKind::Deauth {
                mode: DeauthMode::Smart,
            } => Self {
                collect_clients: true,
                capture_eapol: true,
                ..Self::default()
            },
            AttackKind::Deauth {
                mode: DeauthMode::Turbo,
            } => Self {
                capture_eapol: true,
                ..Self::default()
            },
            AttackKind::HandshakeCapture | AttackKind::PmkidCapture => Self {
                capture_eapol: true,
                ..Self::default()
            },
            AttackKind::HandshakeSniper => Self {
                collect_clients: true,
                capture_eapol: true,
                ..Self::default()
            },
            AttackKind::HiddenSsidReveal => Self {
                reveal_ssid: true,
                capture_eapol: true,
                ..Self::default()
            },
            AttackKind::Karma => Self {
                log_probes: true,
                capture_eapol: true,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

/// Frame classifier for the capture path
pub struct PacketClassifier {
    target: Mutex<Option<MacAddr>>,
    policy: Mutex<ClassifyPolicy>,
    registry: Arc<Mutex<ClientRegistry>>,
    capture: Arc<Mutex<CaptureBuffer>>,
    counters: Arc<SessionCounters>,
    probe_log: Mutex<Vec<String>>,
    revealed: Mutex<Option<String>>,
}

impl PacketClassifier {
    pub fn new(
        registry: Arc<Mutex<ClientRegistry>>,
        capture: Arc<Mutex<CaptureBuffer>>,
        counters: Arc<SessionCounters>,
    ) -> Self {
        Self {
            target: Mutex::new(None),
            policy: Mutex::new(ClassifyPolicy::off()),
            registry,
            capture,
            counters,
            probe_log: Mutex::new(Vec::new()),
            revealed: Mutex::new(None),
        }
    }

    pub fn set_target(&self, bssid: Option<MacAddr>) {
        *self.target.lock() = bssid;
        *self.revealed.lock() = None;
    }

    pub fn set_policy(&self, policy: ClassifyPolicy) {
        *self.policy.lock() = policy;
    }

    /// Hidden SSID learned from a target probe response, if any
    pub fn revealed_ssid(&self) -> Option<String> {
        self.revealed.lock().clone()
    }

    /// SSIDs nearby devices were observed probing for (karma mode)
    pub fn probed_ssids(&self) -> Vec<String> {
        self.probe_log.lock().clone()
    }

    pub fn clear_probe_log(&self) {
        self.probe_log.lock().clear();
    }

    /// Classify one received frame. Malformed or short input is dropped
    /// silently; nothing on this path can panic or propagate an error.
    pub fn classify(&self, frame: &[u8], rssi: i8, now: Instant) {
        let policy = *self.policy.lock();
        let target = *self.target.lock();

        let Some(view) = FrameView::parse(frame) else {
            trace!(len = frame.len(), "dropping short frame");
            return;
        };

        let to_target = target.map_or(false, |t| view.addr1() == t);
        let from_target = target.map_or(false, |t| view.addr2() == t);

        if !to_target && !from_target {
            // Probe requests are broadcast, so karma listening has to
            // look at them before the target scope drops the frame.
            if policy.log_probes && view.subtype() == FrameSubtype::ProbeRequest {
                self.log_probe(&view);
            }
            return;
        }

        if policy.collect_clients && view.frame_type() == FrameType::Data {
            let peer = if from_target {
                view.addr1()
            } else {
                view.addr2()
            };
            if !peer.is_multicast() {
                let mut registry = self.registry.lock();
                let known = registry.len();
                registry.upsert(peer, rssi, now);
                if registry.len() > known {
                    info!(client = %peer, rssi, "new target client");
                }
            }
        }

        if policy.capture_eapol && eapol::is_eapol(frame) {
            self.record_handshake(frame, rssi);
        }

        if policy.reveal_ssid && view.subtype() == FrameSubtype::ProbeResponse && from_target {
            if let Some(ssid) = view.ssid_ie_at(PROBE_RESP_IE_OFFSET) {
                let name = String::from_utf8_lossy(ssid).into_owned();
                info!(ssid = %name, "hidden SSID revealed");
                *self.revealed.lock() = Some(name);
            }
        }

        if policy.log_probes && view.subtype() == FrameSubtype::ProbeRequest {
            self.log_probe(&view);
        }
    }

    fn log_probe(&self, view: &FrameView<'_>) {
        let Some(ssid) = view.ssid_ie_at(MGMT_HEADER_LEN) else {
            return;
        };
        let name = String::from_utf8_lossy(ssid).into_owned();

        let mut log = self.probe_log.lock();
        if log.len() < PROBE_LOG_CAP && !log.contains(&name) {
            info!(ssid = %name, source = %view.addr2(), "device probing for network");
            log.push(name);
        }
    }

    /// Count the handshake frame and append it to the capture buffer.
    /// The counter increments even when the buffer is full; only the
    /// append is dropped.
    fn record_handshake(&self, frame: &[u8], rssi: i8) {
        use std::sync::atomic::Ordering;

        let n = self
            .counters
            .handshakes_captured
            .fetch_add(1, Ordering::Relaxed)
            + 1;
        if n == 1 || n % 100 == 0 {
            info!(rssi, len = frame.len(), total = n, "handshake frame captured");
        }

        if let Some(key) = eapol::parse_eapol_key(frame) {
            if key.message_number == 1 && key.pmkid.is_some() {
                self.counters
                    .pmkids_captured
                    .fetch_add(1, Ordering::Relaxed);
                info!("PMKID captured from message 1");
            }
        }

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        if !self.capture.lock().append(frame, ts) {
            debug!("capture buffer full, handshake frame not recorded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{GLOBAL_HEADER_LEN, RECORD_HEADER_LEN};

    const TARGET: MacAddr = MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    const CLIENT: MacAddr = MacAddr::new([0x11, 0x12, 0x13, 0x14, 0x15, 0x16]);

    struct Rig {
        registry: Arc<Mutex<ClientRegistry>>,
        capture: Arc<Mutex<CaptureBuffer>>,
        counters: Arc<SessionCounters>,
        classifier: PacketClassifier,
    }

    fn rig(kind: AttackKind, capture_capacity: usize) -> Rig {
        let registry = Arc::new(Mutex::new(ClientRegistry::new(32)));
        let capture = Arc::new(Mutex::new(CaptureBuffer::new(capture_capacity, 0.75)));
        let counters = Arc::new(SessionCounters::default());
        let classifier =
            PacketClassifier::new(registry.clone(), capture.clone(), counters.clone());
        classifier.set_target(Some(TARGET));
        classifier.set_policy(ClassifyPolicy::for_kind(kind));
        Rig {
            registry,
            capture,
            counters,
            classifier,
        }
    }

    /// Data frame with the given receiver and transmitter addresses
    fn data_frame(addr1: MacAddr, addr2: MacAddr) -> Vec<u8> {
        let mut f = vec![0u8; 32];
        f[0] = 0x08;
        f[4..10].copy_from_slice(addr1.as_bytes());
        f[10..16].copy_from_slice(addr2.as_bytes());
        f
    }

    /// Frame carrying only the EAPOL ethertype marker, padded to `len`
    fn handshake_marker_frame(len: usize) -> Vec<u8> {
        let mut f = vec![0u8; len];
        f[0] = 0x08;
        f[10..16].copy_from_slice(TARGET.as_bytes());
        f[30] = 0x88;
        f[31] = 0x8e;
        f
    }

    #[test]
    fn test_smart_deauth_discovers_client() {
        let r = rig(
            AttackKind::Deauth {
                mode: DeauthMode::Smart,
            },
            4096,
        );

        // Client -> target
        r.classifier
            .classify(&data_frame(TARGET, CLIENT), -48, Instant::now());

        let registry = r.registry.lock();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.all()[0].mac, CLIENT);
        assert_eq!(registry.all()[0].rssi, -48);
    }

    #[test]
    fn test_client_extracted_from_either_direction() {
        let r = rig(
            AttackKind::Deauth {
                mode: DeauthMode::Smart,
            },
            4096,
        );

        // Target -> client: peer is addr1
        r.classifier
            .classify(&data_frame(CLIENT, TARGET), -50, Instant::now());
        assert_eq!(r.registry.lock().all()[0].mac, CLIENT);
    }

    #[test]
    fn test_multicast_peer_skipped() {
        let r = rig(
            AttackKind::Deauth {
                mode: DeauthMode::Smart,
            },
            4096,
        );

        r.classifier
            .classify(&data_frame(MacAddr::BROADCAST, TARGET), -50, Instant::now());
        assert!(r.registry.lock().is_empty());
    }

    #[test]
    fn test_unrelated_traffic_discarded() {
        let r = rig(
            AttackKind::Deauth {
                mode: DeauthMode::Smart,
            },
            4096,
        );
        let other = MacAddr::new([9, 9, 9, 9, 9, 9]);

        r.classifier
            .classify(&data_frame(other, CLIENT), -50, Instant::now());
        assert!(r.registry.lock().is_empty());
    }

    #[test]
    fn test_clients_not_collected_in_classic_mode() {
        let r = rig(
            AttackKind::Deauth {
                mode: DeauthMode::Classic,
            },
            4096,
        );
        r.classifier
            .classify(&data_frame(TARGET, CLIENT), -48, Instant::now());
        assert!(r.registry.lock().is_empty());
    }

    #[test]
    fn test_handshake_counter_and_bounded_capture() {
        // Room for exactly three 80-byte records
        let capacity = GLOBAL_HEADER_LEN + 3 * (RECORD_HEADER_LEN + 80);
        let r = rig(AttackKind::HandshakeCapture, capacity);

        for _ in 0..5 {
            r.classifier
                .classify(&handshake_marker_frame(80), -60, Instant::now());
        }

        // Counter counts all five; only three fit the buffer
        assert_eq!(r.counters.handshakes_captured(), 5);
        assert_eq!(r.capture.lock().record_count(), 3);
    }

    #[test]
    fn test_pmkid_counted_on_message_1() {
        use crate::ieee80211::eapol::testutil::{eapol_key_frame, pmkid_kde};

        let r = rig(AttackKind::PmkidCapture, 4096);
        let frame = eapol_key_frame(
            *TARGET.as_bytes(),
            *CLIENT.as_bytes(),
            0x008a,
            &pmkid_kde([0x42; 16]),
        );

        r.classifier.classify(&frame, -55, Instant::now());
        assert_eq!(r.counters.handshakes_captured(), 1);
        assert_eq!(r.counters.pmkids_captured(), 1);

        // Message 2 carries no PMKID
        let m2 = eapol_key_frame(*TARGET.as_bytes(), *CLIENT.as_bytes(), 0x010a, &[]);
        r.classifier.classify(&m2, -55, Instant::now());
        assert_eq!(r.counters.handshakes_captured(), 2);
        assert_eq!(r.counters.pmkids_captured(), 1);
    }

    #[test]
    fn test_short_frames_dropped_without_panic() {
        let r = rig(AttackKind::HandshakeCapture, 4096);
        r.classifier.classify(&[], -60, Instant::now());
        r.classifier.classify(&[0xc0], -60, Instant::now());
        r.classifier.classify(&[0u8; 23], -60, Instant::now());
        // Marker offset exists but body is truncated
        r.classifier
            .classify(&handshake_marker_frame(37), -60, Instant::now());
        assert_eq!(r.counters.handshakes_captured(), 1);
    }

    #[test]
    fn test_hidden_ssid_reveal() {
        let r = rig(AttackKind::HiddenSsidReveal, 4096);

        let mut f = vec![0u8; 24];
        f[0] = 0x50; // probe response
        f[4..10].copy_from_slice(CLIENT.as_bytes());
        f[10..16].copy_from_slice(TARGET.as_bytes());
        f[16..22].copy_from_slice(TARGET.as_bytes());
        f.extend_from_slice(&[0u8; 12]); // fixed parameters
        f.extend_from_slice(&[0x00, 0x06]);
        f.extend_from_slice(b"Hidden");

        r.classifier.classify(&f, -62, Instant::now());
        assert_eq!(r.classifier.revealed_ssid().as_deref(), Some("Hidden"));
    }

    #[test]
    fn test_reveal_ignores_empty_ssid() {
        let r = rig(AttackKind::HiddenSsidReveal, 4096);

        let mut f = vec![0u8; 24];
        f[0] = 0x50;
        f[10..16].copy_from_slice(TARGET.as_bytes());
        f.extend_from_slice(&[0u8; 12]);
        f.extend_from_slice(&[0x00, 0x00]); // zero-length SSID

        r.classifier.classify(&f, -62, Instant::now());
        assert!(r.classifier.revealed_ssid().is_none());
    }

    #[test]
    fn test_karma_probe_log_dedup_and_cap() {
        let r = rig(AttackKind::Karma, 4096);

        let probe = |ssid: &str| {
            let mut f = vec![0u8; 24];
            f[0] = 0x40;
            f[4..10].copy_from_slice(MacAddr::BROADCAST.as_bytes());
            f[10..16].copy_from_slice(CLIENT.as_bytes());
            f[16..22].copy_from_slice(MacAddr::BROADCAST.as_bytes());
            f.push(0x00);
            f.push(ssid.len() as u8);
            f.extend_from_slice(ssid.as_bytes());
            f
        };

        r.classifier.classify(&probe("HomeNet"), -70, Instant::now());
        r.classifier.classify(&probe("HomeNet"), -70, Instant::now());
        assert_eq!(r.classifier.probed_ssids(), vec!["HomeNet".to_string()]);

        for i in 0..32 {
            r.classifier
                .classify(&probe(&format!("Net{i}")), -70, Instant::now());
        }
        assert_eq!(r.classifier.probed_ssids().len(), PROBE_LOG_CAP);
    }

    #[test]
    fn test_policy_off_ignores_everything() {
        let r = rig(AttackKind::None, 4096);
        r.classifier
            .classify(&handshake_marker_frame(80), -60, Instant::now());
        r.classifier
            .classify(&data_frame(TARGET, CLIENT), -60, Instant::now());
        assert_eq!(r.counters.handshakes_captured(), 0);
        assert!(r.registry.lock().is_empty());
    }
}
