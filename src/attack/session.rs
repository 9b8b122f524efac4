//! Attack Session State
//!
//! The attack kind taxonomy, the per-state clocks of the state machine,
//! and the session counters shared between the control loop and the
//! capture path.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Deauthentication variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeauthMode {
    /// Broadcast bursts at the standard tier
    Classic,
    /// One unicast burst per known client
    Smart,
    /// Maximum rate broadcast
    Turbo,
    /// Broadcast with reason 23 (802.1X authentication failed)
    RickRoll,
}

/// Beacon flood variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodMode {
    Normal,
    /// Themed SSID pool, fully random channels, faster hopping
    Chaos,
}

/// Attack taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    None,
    Deauth { mode: DeauthMode },
    BeaconFlood { mode: FloodMode },
    ProbeSpam,
    EvilTwin,
    HandshakeCapture,
    PmkidCapture,
    HandshakeSniper,
    Karma,
    GhostAp,
    OneTapNuke,
    DowngradeSpoof,
    HiddenSsidReveal,
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttackKind::None => "none",
            AttackKind::Deauth {
                mode: DeauthMode::Classic,
            } => "deauth",
            AttackKind::Deauth {
                mode: DeauthMode::Smart,
            } => "smart-deauth",
            AttackKind::Deauth {
                mode: DeauthMode::Turbo,
            } => "turbo-deauth",
            AttackKind::Deauth {
                mode: DeauthMode::RickRoll,
            } => "rickroll",
            AttackKind::BeaconFlood {
                mode: FloodMode::Normal,
            } => "beacon-flood",
            AttackKind::BeaconFlood {
                mode: FloodMode::Chaos,
            } => "ap-flood-chaos",
            AttackKind::ProbeSpam => "probe-spam",
            AttackKind::EvilTwin => "evil-twin",
            AttackKind::HandshakeCapture => "handshake-capture",
            AttackKind::PmkidCapture => "pmkid-capture",
            AttackKind::HandshakeSniper => "handshake-sniper",
            AttackKind::Karma => "karma",
            AttackKind::GhostAp => "ghost-ap",
            AttackKind::OneTapNuke => "one-tap-nuke",
            AttackKind::DowngradeSpoof => "downgrade-spoof",
            AttackKind::HiddenSsidReveal => "hidden-ssid-reveal",
        };
        f.write_str(name)
    }
}

/// Deauth duty-cycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutyPhase {
    On,
    Off,
}

/// State machine states, each carrying its own deadlines so `tick()`
/// never sleeps.
#[derive(Debug, Clone)]
pub enum AttackState {
    Idle,
    Deauthenticating {
        phase: DutyPhase,
        phase_until: Instant,
        next_burst: Instant,
    },
    FloodingBeacons {
        next_batch: Instant,
        hop_idx: usize,
    },
    SpammingProbes {
        next_batch: Instant,
    },
    CapturingHandshakes {
        next_provoke: Instant,
    },
    SniperCapturing {
        next_strike: Instant,
    },
    EvilTwinActive,
    GhostToggling {
        ap_up: bool,
        toggle_at: Instant,
    },
    NukeSweeping {
        channel: u8,
        next_hop: Instant,
    },
    DowngradeSpoofing {
        next_frame: Instant,
    },
    RevealingHiddenSsid,
    KarmaListening,
}

impl AttackState {
    pub fn name(&self) -> &'static str {
        match self {
            AttackState::Idle => "idle",
            AttackState::Deauthenticating {
                phase: DutyPhase::On,
                ..
            } => "deauth-on",
            AttackState::Deauthenticating {
                phase: DutyPhase::Off,
                ..
            } => "deauth-off",
            AttackState::FloodingBeacons { .. } => "flooding-beacons",
            AttackState::SpammingProbes { .. } => "spamming-probes",
            AttackState::CapturingHandshakes { .. } => "capturing-handshakes",
            AttackState::SniperCapturing { .. } => "sniper-capturing",
            AttackState::EvilTwinActive => "evil-twin-active",
            AttackState::GhostToggling { .. } => "ghost-toggling",
            AttackState::NukeSweeping { .. } => "nuke-sweeping",
            AttackState::DowngradeSpoofing { .. } => "downgrade-spoofing",
            AttackState::RevealingHiddenSsid => "revealing-hidden-ssid",
            AttackState::KarmaListening => "karma-listening",
        }
    }
}

/// Monotonic session counters. Relaxed atomics: the capture callback and
/// the control loop both increment, exact interleaving is irrelevant.
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub frames_sent: AtomicU64,
    pub handshakes_captured: AtomicU64,
    pub pmkids_captured: AtomicU64,
    pub clients_kicked: AtomicU64,
    pub tx_errors: AtomicU64,
}

impl SessionCounters {
    pub fn reset(&self) {
        self.frames_sent.store(0, Ordering::Relaxed);
        self.handshakes_captured.store(0, Ordering::Relaxed);
        self.pmkids_captured.store(0, Ordering::Relaxed);
        self.clients_kicked.store(0, Ordering::Relaxed);
        self.tx_errors.store(0, Ordering::Relaxed);
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn handshakes_captured(&self) -> u64 {
        self.handshakes_captured.load(Ordering::Relaxed)
    }

    pub fn pmkids_captured(&self) -> u64 {
        self.pmkids_captured.load(Ordering::Relaxed)
    }

    pub fn clients_kicked(&self) -> u64 {
        self.clients_kicked.load(Ordering::Relaxed)
    }

    pub fn tx_errors(&self) -> u64 {
        self.tx_errors.load(Ordering::Relaxed)
    }
}

/// Snapshot of a session for the status surface
#[derive(Debug, Clone)]
pub struct AttackStats {
    pub kind: AttackKind,
    pub state: &'static str,
    pub frames_sent: u64,
    pub handshakes_captured: u64,
    pub pmkids_captured: u64,
    pub clients_kicked: u64,
    pub tx_errors: u64,
    pub active: bool,
    pub elapsed: Duration,
}
