//! Transmit Power and Duty-Cycle Policy
//!
//! Maps the current attack kind and the explicit turbo/eco flags to a
//! concrete transmit policy: burst size, inter-frame pacing, TX power and
//! processor performance level. Pure lookup; the flags are passed in each
//! tick rather than read from process-wide state.

use std::time::Duration;

use crate::attack::session::AttackKind;
use crate::config::PowerConfig;

/// Processor performance level requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerfLevel {
    Max,
    #[default]
    Balanced,
    Low,
}

/// Global power-mode flags. Turbo wins when both are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerMode {
    pub turbo: bool,
    pub eco: bool,
}

/// Concrete transmit policy for one tick
#[derive(Debug, Clone)]
pub struct TxPolicy {
    /// Frames per burst
    pub burst_size: u32,
    /// Inter-frame pacing hint handed to the radio driver
    pub frame_gap: Duration,
    pub tx_power_dbm: i8,
    pub perf: PerfLevel,
    /// Deauth family duty cycle
    pub duty_on: Duration,
    pub duty_off: Duration,
    /// Minimum delay after a broadcast burst, before jitter
    pub inter_burst: Duration,
    /// Randomized addition to `inter_burst`
    pub inter_burst_jitter: Duration,
    /// Cadence for non-turbo bursts inside the ON phase
    pub burst_cadence: Duration,
}

/// Policy lookup configured from the power section of the config file.
/// Every TX power it hands out is capped at the regulatory maximum.
#[derive(Debug, Clone)]
pub struct PowerThrottler {
    cfg: PowerConfig,
    region_max_tx_dbm: i8,
}

impl PowerThrottler {
    pub fn new(cfg: PowerConfig, region_max_tx_dbm: i8) -> Self {
        Self {
            cfg,
            region_max_tx_dbm,
        }
    }

    /// Compute the policy for `kind` under `mode`, `elapsed` ticks into
    /// the session (drives the capture-attack performance boost window).
    pub fn policy(&self, kind: AttackKind, mode: PowerMode, elapsed: Duration) -> TxPolicy {
        let turbo = mode.turbo || kind_forces_turbo(kind);
        let eco = mode.eco && !turbo;

        let (burst_size, gap_us, tx_power_dbm) = if turbo {
            (
                self.cfg.turbo_burst,
                self.cfg.turbo_gap_us,
                self.cfg.turbo_tx_dbm,
            )
        } else if eco {
            (self.cfg.eco_burst, self.cfg.eco_gap_us, self.cfg.eco_tx_dbm)
        } else {
            (
                self.cfg.standard_burst,
                self.cfg.standard_gap_us,
                self.cfg.standard_tx_dbm,
            )
        };

        let perf = if turbo {
            PerfLevel::Max
        } else if is_capture_kind(kind) {
            // Run hot for the first few seconds to catch immediate
            // handshakes, then drop for long passive waits.
            if elapsed < Duration::from_secs(self.cfg.boost_window_secs) {
                PerfLevel::Max
            } else {
                PerfLevel::Low
            }
        } else if eco {
            PerfLevel::Low
        } else {
            PerfLevel::Balanced
        };

        TxPolicy {
            burst_size,
            frame_gap: Duration::from_micros(gap_us),
            tx_power_dbm: tx_power_dbm.min(self.region_max_tx_dbm),
            perf,
            duty_on: Duration::from_millis(self.cfg.duty_on_ms),
            duty_off: Duration::from_millis(self.cfg.duty_off_ms),
            inter_burst: Duration::from_millis(50),
            inter_burst_jitter: Duration::from_millis(50),
            burst_cadence: Duration::from_millis(100),
        }
    }

    /// TX power applied when a session stops or idles
    pub fn standard_tx_dbm(&self) -> i8 {
        self.cfg.standard_tx_dbm.min(self.region_max_tx_dbm)
    }

    /// TX power during the deauth OFF phase
    pub fn eco_tx_dbm(&self) -> i8 {
        self.cfg.eco_tx_dbm.min(self.region_max_tx_dbm)
    }
}

fn kind_forces_turbo(kind: AttackKind) -> bool {
    matches!(
        kind,
        AttackKind::Deauth {
            mode: crate::attack::session::DeauthMode::Turbo
        } | AttackKind::OneTapNuke
    )
}

fn is_capture_kind(kind: AttackKind) -> bool {
    matches!(
        kind,
        AttackKind::HandshakeCapture | AttackKind::PmkidCapture | AttackKind::HandshakeSniper
    )
}
