//! Synthetic 802.11 traffic generator
//!
//! Writes a capture file full of crafted management and EAPOL frames so
//! the classify command and the capture reader can be exercised without
//! hardware.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use wavejack::capture::CaptureBuffer;
use wavejack::ieee80211::{builder, MacAddr};

#[derive(Parser)]
#[command(name = "frame_synth")]
#[command(about = "Generate a synthetic 802.11 capture file")]
struct Args {
    /// Output capture file
    #[arg(short, long, default_value = "synth.pcap")]
    output: PathBuf,

    /// Beacons to generate
    #[arg(long, default_value = "20")]
    beacons: usize,

    /// Deauthentication frames to generate
    #[arg(long, default_value = "20")]
    deauths: usize,

    /// Probe requests to generate
    #[arg(long, default_value = "10")]
    probes: usize,

    /// EAPOL message-1 frames to generate
    #[arg(long, default_value = "4")]
    eapol: usize,

    /// RNG seed for reproducible output
    #[arg(long, default_value = "1")]
    seed: u64,
}

/// Minimal EAPOL-Key message 1 between `bssid` and `client`
fn eapol_m1(bssid: MacAddr, client: MacAddr) -> Vec<u8> {
    let mut f = vec![0u8; 24];
    f[0] = 0x08; // data frame
    f[4..10].copy_from_slice(client.as_bytes());
    f[10..16].copy_from_slice(bssid.as_bytes());
    f[16..22].copy_from_slice(bssid.as_bytes());
    f.extend_from_slice(&[0xaa, 0xaa, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8e]);
    f.extend_from_slice(&[0x02, 0x03, 0x00, 0x5f]); // 802.1X header, 95-byte body
    let mut body = vec![0u8; 95];
    body[0] = 0x02; // descriptor type
    body[1..3].copy_from_slice(&0x008au16.to_be_bytes()); // key info: message 1
    f.extend_from_slice(&body);
    f
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let bssid = MacAddr::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
    let client = MacAddr::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);

    let mut capture = CaptureBuffer::new(512 * 1024, 0.9);
    let mut buf = [0u8; 256];
    let mut ts = Duration::from_secs(1_700_000_000);
    let step = Duration::from_millis(10);
    let mut written = 0usize;

    for i in 0..args.beacons {
        let channel = [1u8, 6, 11][i % 3];
        let len = builder::build_beacon(&mut buf, &format!("SynthNet{i}"), channel, &mut rng)?;
        written += capture.append(&buf[..len], ts) as usize;
        ts += step;
    }

    for i in 0..args.deauths {
        let reason = if i % 2 == 0 {
            builder::REASON_CLASS3_FRAME
        } else {
            builder::REASON_PREV_AUTH_EXPIRED
        };
        let len = builder::build_deauth(&mut buf, bssid, MacAddr::BROADCAST, reason)?;
        written += capture.append(&buf[..len], ts) as usize;
        ts += step;
    }

    for i in 0..args.probes {
        let len = builder::build_probe_request(&mut buf, &format!("Probe{i}"), &mut rng)?;
        written += capture.append(&buf[..len], ts) as usize;
        ts += step;
    }

    for _ in 0..args.eapol {
        let frame = eapol_m1(bssid, client);
        written += capture.append(&frame, ts) as usize;
        ts += step;
    }

    capture
        .write_to(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!(
        "wrote {} records ({} bytes) to {}",
        written,
        capture.len(),
        args.output.display()
    );
    Ok(())
}
