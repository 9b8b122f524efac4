//! Radio Driver Seam
//!
//! The engine drives the physical radio through this trait: channel
//! control, raw frame injection, transmit power/pacing hints and
//! monitor-mode delivery. Monitor frames arrive over a bounded channel
//! drained by the control loop, so the hardware capture path never
//! touches engine state directly.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

use crate::ieee80211::MacAddr;
use crate::power::PerfLevel;

/// Default monitor-mode delivery queue depth
pub const MONITOR_QUEUE_DEPTH: usize = 256;

/// Radio driver errors
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("invalid channel {0}")]
    InvalidChannel(u8),
    #[error("transmit failed: {0}")]
    TxFailed(String),
    #[error("monitor mode unavailable: {0}")]
    Monitor(String),
    #[error("soft-AP error: {0}")]
    Ap(String),
    #[error("tx power not applied: {0}")]
    Power(String),
}

/// A frame delivered from monitor mode, with its signal strength
#[derive(Debug, Clone)]
pub struct RxFrame {
    pub data: Vec<u8>,
    pub rssi: i8,
}

/// Driver-side counters
#[derive(Debug, Clone, Copy, Default)]
pub struct RadioStats {
    pub transmitted: u64,
    pub tx_errors: u64,
    pub rx_delivered: u64,
    /// Monitor frames dropped because the consumer lagged
    pub rx_dropped: u64,
}

/// Control surface of the radio subsystem
pub trait RadioDriver: Send {
    fn set_channel(&mut self, channel: u8) -> Result<(), RadioError>;
    fn channel(&self) -> Option<u8>;
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError>;
    fn set_tx_power(&mut self, dbm: i8) -> Result<(), RadioError>;
    /// Inter-frame pacing hint; the driver spaces burst frames by this gap
    fn set_pacing(&mut self, gap: Duration);
    fn set_performance(&mut self, level: PerfLevel);
    /// Enable monitor-mode delivery; frames arrive on the returned channel
    fn start_monitor(&mut self) -> Result<Receiver<RxFrame>, RadioError>;
    fn stop_monitor(&mut self);
    fn start_ap(&mut self, ssid: &str, channel: u8, bssid: MacAddr) -> Result<(), RadioError>;
    fn stop_ap(&mut self);
}

#[derive(Debug)]
struct DummyState {
    channel: Option<u8>,
    tx_power: i8,
    pacing: Duration,
    perf: PerfLevel,
    queue_depth: usize,
    monitor_tx: Option<Sender<RxFrame>>,
    ap: Option<(String, u8, MacAddr)>,
    ap_toggles: u64,
    stats: RadioStats,
    fail_tx: bool,
    fail_tx_power: bool,
    keep_frames: bool,
    transmitted: Vec<Vec<u8>>,
    channel_history: Vec<u8>,
}

impl Default for DummyState {
    fn default() -> Self {
        Self {
            channel: None,
            tx_power: 10,
            pacing: Duration::ZERO,
            perf: PerfLevel::Balanced,
            queue_depth: MONITOR_QUEUE_DEPTH,
            monitor_tx: None,
            ap: None,
            ap_toggles: 0,
            stats: RadioStats::default(),
            fail_tx: false,
            fail_tx_power: false,
            keep_frames: false,
            transmitted: Vec::new(),
            channel_history: Vec::new(),
        }
    }
}

/// In-memory radio for simulation and tests.
///
/// Clones share state, so a handle kept outside the engine can inspect
/// what was transmitted and synthesize scripted monitor traffic.
#[derive(Debug, Clone, Default)]
pub struct DummyRadio {
    state: Arc<Mutex<DummyState>>,
}

impl DummyRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dummy radio that records every transmitted frame
    pub fn recording() -> Self {
        let radio = Self::default();
        radio.state.lock().keep_frames = true;
        radio
    }

    /// Make every subsequent transmit fail
    pub fn set_fail_tx(&self, fail: bool) {
        self.state.lock().fail_tx = fail;
    }

    /// Make every subsequent TX power change fail
    pub fn set_fail_tx_power(&self, fail: bool) {
        self.state.lock().fail_tx_power = fail;
    }

    /// Monitor delivery queue depth for subsequent `start_monitor` calls
    pub fn set_queue_depth(&self, depth: usize) {
        self.state.lock().queue_depth = depth.max(1);
    }

    /// Deliver a synthetic monitor frame. Returns false when monitor mode
    /// is off or the queue was full (counted as a driver-side drop).
    pub fn inject(&self, data: Vec<u8>, rssi: i8) -> bool {
        let mut state = self.state.lock();
        let Some(tx) = state.monitor_tx.clone() else {
            return false;
        };
        match tx.try_send(RxFrame { data, rssi }) {
            Ok(()) => {
                state.stats.rx_delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                state.stats.rx_dropped += 1;
                false
            }
        }
    }

    /// Synthesize a data frame between the target and a client
    pub fn inject_data_frame(&self, bssid: MacAddr, client: MacAddr, rssi: i8) -> bool {
        let mut f = vec![0u8; 32];
        f[0] = 0x08; // data
        f[4..10].copy_from_slice(bssid.as_bytes());
        f[10..16].copy_from_slice(client.as_bytes());
        f[16..22].copy_from_slice(bssid.as_bytes());
        self.inject(f, rssi)
    }

    /// Synthesize an EAPOL-Key message 1, optionally carrying a PMKID
    pub fn inject_eapol_m1(&self, bssid: MacAddr, client: MacAddr, pmkid: bool, rssi: i8) -> bool {
        let mut f = vec![0u8; 24];
        f[0] = 0x08;
        f[4..10].copy_from_slice(client.as_bytes());
        f[10..16].copy_from_slice(bssid.as_bytes());
        f[16..22].copy_from_slice(bssid.as_bytes());
        f.extend_from_slice(&[0xaa, 0xaa, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8e]);

        let key_data: Vec<u8> = if pmkid {
            let mut kde = vec![0xdd, 0x14, 0x00, 0x0f, 0xac, 0x04];
            kde.extend_from_slice(&[0x5a; 16]);
            kde
        } else {
            Vec::new()
        };

        let body_len = (95 + key_data.len()) as u16;
        f.extend_from_slice(&[0x02, 0x03]);
        f.extend_from_slice(&body_len.to_be_bytes());

        let mut body = vec![0u8; 95];
        body[0] = 0x02;
        body[1..3].copy_from_slice(&0x008au16.to_be_bytes()); // message 1
        body[93..95].copy_from_slice(&(key_data.len() as u16).to_be_bytes());
        f.extend_from_slice(&body);
        f.extend_from_slice(&key_data);
        self.inject(f, rssi)
    }

    /// Synthesize a probe response from the target announcing `ssid`
    pub fn inject_probe_response(&self, bssid: MacAddr, ssid: &str, rssi: i8) -> bool {
        let mut f = vec![0u8; 24];
        f[0] = 0x50; // probe response
        f[4..10].copy_from_slice(MacAddr::BROADCAST.as_bytes());
        f[10..16].copy_from_slice(bssid.as_bytes());
        f[16..22].copy_from_slice(bssid.as_bytes());
        f.extend_from_slice(&[0u8; 12]); // timestamp + interval + capability
        let ssid = &ssid.as_bytes()[..ssid.len().min(32)];
        f.push(0x00);
        f.push(ssid.len() as u8);
        f.extend_from_slice(ssid);
        self.inject(f, rssi)
    }

    /// Synthesize a broadcast probe request seeking `ssid`
    pub fn inject_probe_request(&self, source: MacAddr, ssid: &str, rssi: i8) -> bool {
        let mut f = vec![0u8; 24];
        f[0] = 0x40; // probe request
        f[4..10].copy_from_slice(MacAddr::BROADCAST.as_bytes());
        f[10..16].copy_from_slice(source.as_bytes());
        f[16..22].copy_from_slice(MacAddr::BROADCAST.as_bytes());
        let ssid = &ssid.as_bytes()[..ssid.len().min(32)];
        f.push(0x00);
        f.push(ssid.len() as u8);
        f.extend_from_slice(ssid);
        self.inject(f, rssi)
    }

    pub fn stats(&self) -> RadioStats {
        self.state.lock().stats
    }

    pub fn monitor_active(&self) -> bool {
        self.state.lock().monitor_tx.is_some()
    }

    pub fn ap_active(&self) -> bool {
        self.state.lock().ap.is_some()
    }

    /// Soft-AP parameters while one is up
    pub fn ap(&self) -> Option<(String, u8, MacAddr)> {
        self.state.lock().ap.clone()
    }

    pub fn ap_toggles(&self) -> u64 {
        self.state.lock().ap_toggles
    }

    pub fn tx_power(&self) -> i8 {
        self.state.lock().tx_power
    }

    pub fn perf(&self) -> PerfLevel {
        self.state.lock().perf
    }

    /// Frames transmitted so far (recording mode only)
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.state.lock().transmitted.clone()
    }

    /// Every channel the driver was tuned to, in order
    pub fn channel_history(&self) -> Vec<u8> {
        self.state.lock().channel_history.clone()
    }
}

impl RadioDriver for DummyRadio {
    fn set_channel(&mut self, channel: u8) -> Result<(), RadioError> {
        if !(1..=14).contains(&channel) {
            return Err(RadioError::InvalidChannel(channel));
        }
        let mut state = self.state.lock();
        state.channel = Some(channel);
        state.channel_history.push(channel);
        Ok(())
    }

    fn channel(&self) -> Option<u8> {
        self.state.lock().channel
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        let mut state = self.state.lock();
        if state.fail_tx {
            state.stats.tx_errors += 1;
            return Err(RadioError::TxFailed("simulated failure".into()));
        }
        state.stats.transmitted += 1;
        if state.keep_frames {
            state.transmitted.push(frame.to_vec());
        }
        trace!(len = frame.len(), "dummy transmit");
        Ok(())
    }

    fn set_tx_power(&mut self, dbm: i8) -> Result<(), RadioError> {
        let mut state = self.state.lock();
        if state.fail_tx_power {
            return Err(RadioError::Power("simulated failure".into()));
        }
        state.tx_power = dbm;
        Ok(())
    }

    fn set_pacing(&mut self, gap: Duration) {
        self.state.lock().pacing = gap;
    }

    fn set_performance(&mut self, level: PerfLevel) {
        self.state.lock().perf = level;
    }

    fn start_monitor(&mut self) -> Result<Receiver<RxFrame>, RadioError> {
        let mut state = self.state.lock();
        let (tx, rx) = bounded(state.queue_depth);
        state.monitor_tx = Some(tx);
        Ok(rx)
    }

    fn stop_monitor(&mut self) {
        self.state.lock().monitor_tx = None;
    }

    fn start_ap(&mut self, ssid: &str, channel: u8, bssid: MacAddr) -> Result<(), RadioError> {
        let mut state = self.state.lock();
        state.ap = Some((ssid.to_string(), channel, bssid));
        state.ap_toggles += 1;
        Ok(())
    }

    fn stop_ap(&mut self) {
        let mut state = self.state.lock();
        if state.ap.take().is_some() {
            state.ap_toggles += 1;
        }
    }
}
