use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tabled::{Table, Tabled};

use wavejack::capture::read_records;
use wavejack::ieee80211::{builder, eapol, FrameSubtype, FrameType, FrameView, MacAddr};
use wavejack::{
    AttackEngine, Config, DummyRadio, NullPortal, PortalVariant, PowerMode,
};

#[derive(Parser)]
#[command(name = "wavejack")]
#[command(author, version, about = "802.11 attack and capture engine")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an attack session against the in-memory dummy radio
    Simulate {
        /// Attack to run
        #[arg(value_enum)]
        attack: AttackArg,

        /// Target BSSID (required by targeted attacks)
        #[arg(short, long)]
        bssid: Option<MacAddr>,

        /// Target SSID
        #[arg(short, long, default_value = "TargetNet")]
        ssid: String,

        /// Target channel
        #[arg(long, default_value = "6")]
        channel: u8,

        /// Session length in seconds
        #[arg(long, default_value = "10")]
        duration: u64,

        /// Force maximum-rate transmit policy
        #[arg(long)]
        turbo: bool,

        /// Force battery-saving transmit policy
        #[arg(long)]
        eco: bool,

        /// Write the capture buffer to this .pcap file at the end
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Summarize a capture file produced by the engine
    Classify {
        /// Capture file to read
        file: PathBuf,
    },

    /// Build a single frame and hexdump it
    Frames {
        #[arg(value_enum)]
        kind: FrameArg,

        /// BSSID / source address
        #[arg(short, long, default_value = "de:ad:be:ef:00:01")]
        bssid: MacAddr,

        /// Destination address (deauth only)
        #[arg(long, default_value = "ff:ff:ff:ff:ff:ff")]
        dest: MacAddr,

        /// Deauthentication reason code
        #[arg(short, long, default_value = "7")]
        reason: u16,

        /// SSID for beacon / probe frames
        #[arg(short, long, default_value = "FreeWiFi")]
        ssid: String,

        /// Channel for beacon frames
        #[arg(long, default_value = "1")]
        channel: u8,
    },

    /// Write a default configuration file
    GenConfig {
        /// Output path
        #[arg(short, long, default_value = "wavejack.toml")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AttackArg {
    Deauth,
    SmartDeauth,
    TurboDeauth,
    Rickroll,
    BeaconFlood,
    ApFloodChaos,
    ProbeSpam,
    EvilTwin,
    HandshakeCapture,
    PmkidCapture,
    HandshakeSniper,
    Karma,
    GhostAp,
    OneTapNuke,
    Downgrade,
    RevealSsid,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FrameArg {
    Deauth,
    Beacon,
    ProbeRequest,
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Simulate {
            attack,
            bssid,
            ssid,
            channel,
            duration,
            turbo,
            eco,
            export,
        } => {
            simulate(
                config,
                attack,
                bssid,
                &ssid,
                channel,
                Duration::from_secs(duration),
                PowerMode { turbo, eco },
                export,
            )
            .await
        }
        Commands::Classify { file } => classify_capture(&file),
        Commands::Frames {
            kind,
            bssid,
            dest,
            reason,
            ssid,
            channel,
        } => dump_frame(kind, bssid, dest, reason, &ssid, channel),
        Commands::GenConfig { output } => {
            Config::default().save(&output)?;
            println!("{} wrote {}", "✓".green(), output.display());
            Ok(())
        }
    }
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[allow(clippy::too_many_arguments)]
async fn simulate(
    config: Config,
    attack: AttackArg,
    bssid: Option<MacAddr>,
    ssid: &str,
    channel: u8,
    duration: Duration,
    mode: PowerMode,
    export: Option<PathBuf>,
) -> Result<()> {
    let radio = DummyRadio::new();
    radio.set_queue_depth(config.radio.monitor_queue);
    let mut engine = AttackEngine::new(
        Box::new(radio.clone()),
        Box::new(NullPortal),
        &config,
    );
    engine.set_power_mode(mode);

    if let Some(bssid) = bssid {
        engine.set_target(bssid, ssid, channel)?;
    }

    let standard_burst = config.power.standard_burst;
    let started = match attack {
        AttackArg::Deauth => engine.start_deauth(standard_burst),
        AttackArg::SmartDeauth => engine.start_smart_deauth(),
        AttackArg::TurboDeauth => engine.start_turbo_deauth(),
        AttackArg::Rickroll => engine.start_rickroll(),
        AttackArg::BeaconFlood => engine.start_beacon_flood(None),
        AttackArg::ApFloodChaos => engine.start_ap_flood_chaos(),
        AttackArg::ProbeSpam => engine.start_probe_flood(None),
        AttackArg::EvilTwin => engine.start_evil_twin(ssid, PortalVariant::Generic),
        AttackArg::HandshakeCapture => engine.start_handshake_capture(),
        AttackArg::PmkidCapture => engine.start_pmkid_attack(),
        AttackArg::HandshakeSniper => engine.start_handshake_sniper(),
        AttackArg::Karma => engine.start_karma(),
        AttackArg::GhostAp => engine.start_ghost_ap(),
        AttackArg::OneTapNuke => engine.start_one_tap_nuke(),
        AttackArg::Downgrade => engine.start_downgrade_attack(),
        AttackArg::RevealSsid => engine.start_hidden_ssid_reveal(),
    };
    if !started {
        bail!("attack failed to start (targeted attacks need --bssid)");
    }

    println!(
        "{} {} for {:?} (started {})",
        "simulating".cyan().bold(),
        engine.kind(),
        duration,
        Local::now().format("%H:%M:%S")
    );

    // Synthetic station so monitor-mode attacks have traffic to classify
    let station = MacAddr::new([0x11, 0x12, 0x13, 0x14, 0x15, 0x16]);
    let mut next_station = Instant::now();

    let deadline = Instant::now() + duration;
    let mut interval = tokio::time::interval(Duration::from_millis(5));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                if let Some(bssid) = bssid {
                    if now >= next_station {
                        radio.inject_data_frame(bssid, station, -52);
                        radio.inject_eapol_m1(bssid, station, true, -52);
                        radio.inject_probe_response(bssid, ssid, -52);
                        radio.inject_probe_request(station, "HomeNet", -52);
                        next_station = now + Duration::from_millis(500);
                    }
                }
                engine.tick(now);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "interrupted".yellow());
                break;
            }
        }
    }

    let stats = engine.stats();
    engine.stop_attack();

    let rows = vec![
        StatRow {
            metric: "attack",
            value: stats.kind.to_string(),
        },
        StatRow {
            metric: "elapsed",
            value: format!("{:.1?}", stats.elapsed),
        },
        StatRow {
            metric: "frames sent",
            value: stats.frames_sent.to_string(),
        },
        StatRow {
            metric: "clients kicked",
            value: stats.clients_kicked.to_string(),
        },
        StatRow {
            metric: "handshake frames",
            value: stats.handshakes_captured.to_string(),
        },
        StatRow {
            metric: "PMKIDs",
            value: stats.pmkids_captured.to_string(),
        },
        StatRow {
            metric: "TX errors",
            value: stats.tx_errors.to_string(),
        },
        StatRow {
            metric: "known clients",
            value: engine.registry().lock().len().to_string(),
        },
        StatRow {
            metric: "capture bytes",
            value: engine.capture_buffer().lock().len().to_string(),
        },
    ];
    println!("{}", Table::new(rows));

    if let Some(ssid) = engine.revealed_ssid() {
        println!("{} hidden SSID: {}", "revealed".green().bold(), ssid);
    }
    let probed = engine.probed_ssids();
    if !probed.is_empty() {
        println!("{} {}", "probed networks:".green().bold(), probed.join(", "));
    }

    if let Some(path) = export {
        engine
            .capture_buffer()
            .lock()
            .write_to(&path)
            .with_context(|| format!("writing capture to {}", path.display()))?;
        println!("{} capture written to {}", "✓".green(), path.display());
    }

    Ok(())
}

fn classify_capture(path: &PathBuf) -> Result<()> {
    let records =
        read_records(path).with_context(|| format!("reading {}", path.display()))?;

    let mut mgmt = 0usize;
    let mut data = 0usize;
    let mut eapol_frames = 0usize;
    let mut other = 0usize;

    for (i, record) in records.iter().enumerate() {
        let Some(view) = FrameView::parse(record) else {
            other += 1;
            continue;
        };

        let mut label = match view.frame_type() {
            FrameType::Management => {
                mgmt += 1;
                match view.subtype() {
                    FrameSubtype::Beacon => "beacon",
                    FrameSubtype::ProbeRequest => "probe-req",
                    FrameSubtype::ProbeResponse => "probe-resp",
                    FrameSubtype::Deauthentication => "deauth",
                    FrameSubtype::Other => "mgmt",
                }
                .to_string()
            }
            FrameType::Data => {
                data += 1;
                "data".to_string()
            }
            _ => {
                other += 1;
                "other".to_string()
            }
        };

        if eapol::is_eapol(record) {
            eapol_frames += 1;
            match eapol::parse_eapol_key(record) {
                Some(key) if key.pmkid.is_some() => {
                    label = format!("eapol M{} +PMKID", key.message_number)
                }
                Some(key) => label = format!("eapol M{}", key.message_number),
                None => label = "eapol".to_string(),
            }
        }

        println!(
            "{:>4}  {:<16} {:>4}B  {} -> {}",
            i,
            label,
            record.len(),
            view.addr2(),
            view.addr1()
        );
    }

    println!();
    println!(
        "{} records: {} management, {} data, {} EAPOL, {} other",
        records.len().to_string().bold(),
        mgmt,
        data,
        eapol_frames,
        other
    );
    Ok(())
}

fn dump_frame(
    kind: FrameArg,
    bssid: MacAddr,
    dest: MacAddr,
    reason: u16,
    ssid: &str,
    channel: u8,
) -> Result<()> {
    let mut buf = [0u8; 256];
    let mut rng = rand::thread_rng();

    let len = match kind {
        FrameArg::Deauth => builder::build_deauth(&mut buf, bssid, dest, reason)?,
        FrameArg::Beacon => builder::build_beacon(&mut buf, ssid, channel, &mut rng)?,
        FrameArg::ProbeRequest => builder::build_probe_request(&mut buf, ssid, &mut rng)?,
    };

    for chunk in buf[..len].chunks(16) {
        println!("{}", hex::encode(chunk));
    }
    println!("{} bytes", len);
    Ok(())
}
