//! Intercom sender
//!
//! Captures the default input device and streams it to the receiver as
//! position-tagged UDP datagrams.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_intercom::{
    audio::{AudioCapture, CaptureEvent, CaptureSource},
    clock,
    config::AppConfig,
    constants::TICK_INTERVAL,
    net::{udp, AudioSender},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: sender <target host> <target port>");
        std::process::exit(1);
    }
    let host = &args[1];
    let port: u16 = match args[2].parse() {
        Ok(port) => port,
        Err(_) => {
            eprintln!("Usage: sender <target host> <target port>");
            std::process::exit(1);
        }
    };

    let config = AppConfig::load()?;

    let peer = udp::resolve_peer(host, port)?;
    let socket = udp::connect_sender(peer)?;
    let mut sender = AudioSender::new(socket);

    let mut capture = AudioCapture::new(config.audio.capture_fragment_bytes)?;

    info!("streaming to {}", peer);

    let mut last_stats = Instant::now();
    loop {
        // Pump capture events once, then frame and send everything pending
        while let Some(event) = capture.poll_event() {
            match event {
                CaptureEvent::StreamReady => info!("capture stream ready"),
                CaptureEvent::Data(chunk) => {
                    let now = match clock::wall_clock_ns() {
                        Ok(now) => now,
                        Err(e) => {
                            warn!("failed to get current time: {e}");
                            continue;
                        }
                    };
                    match sender.transmit(chunk, now) {
                        Ok(position) => debug!("data transmitted, position now at {position}"),
                        Err(e) => warn!("failed to transmit chunk: {e}"),
                    }
                }
            }
        }

        if let Some(e) = capture.check_errors() {
            warn!("capture stream error: {e}");
        }

        if last_stats.elapsed() >= Duration::from_secs(5) {
            last_stats = Instant::now();
            let stats = sender.stats();
            info!(
                "sender stats: {} packets framed, {} datagrams, {:.1} KB sent, {} send failures",
                stats.packets_framed,
                stats.datagrams_sent,
                stats.bytes_sent as f64 / 1024.0,
                stats.send_failures
            );
        }

        tokio::time::sleep(TICK_INTERVAL).await;
    }
}
