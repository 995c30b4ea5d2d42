//! Intercom receiver
//!
//! Binds a UDP port, reassembles the incoming stream into the jitter
//! window, and plays it out while the rate controller tracks the sender's
//! clock.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_intercom::{
    audio::{AudioPlayback, PlaybackSink},
    clock,
    config::AppConfig,
    constants::TICK_INTERVAL,
    net::{udp, PacketReceiver},
    sync::StreamSync,
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
    if args.len() != 2 {
        eprintln!("Usage: receiver <listen port>");
        std::process::exit(1);
    }
    let port: u16 = match args[1].parse() {
        Ok(port) => port,
        Err(_) => {
            eprintln!("Usage: receiver <listen port>");
            std::process::exit(1);
        }
    };

    let config = AppConfig::load()?;

    let socket = udp::bind_receiver(port, config.network.recv_buffer_size)?;
    let mut receiver = PacketReceiver::new(socket);

    let mut playback = AudioPlayback::new(
        config.audio.playback_ring_bytes,
        config.sync.nominal_sample_rate as u32,
    )?;
    let mut sync = StreamSync::new(&config.sync);

    info!("listening on port {}", port);

    let mut last_stats = Instant::now();
    loop {
        // Feed the device from the window front, sliding it forward
        sync.drain_tick(&mut playback);

        // Drain every datagram currently pending on the socket
        loop {
            match receiver.try_recv_packet() {
                Ok(Some(packet)) => {
                    let now = match clock::wall_clock_ns() {
                        Ok(now) => now,
                        Err(e) => {
                            warn!("failed to get current time: {e}");
                            break;
                        }
                    };
                    sync.handle_packet(&packet, now);
                    if let Some(rate) = sync.device_rate() {
                        playback.request_rate(rate);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("failed to receive packet: {e}");
                    break;
                }
            }
        }

        if let Some(e) = playback.check_errors() {
            warn!("playback stream error: {e}");
        }

        if last_stats.elapsed() >= Duration::from_secs(5) {
            last_stats = Instant::now();
            let net = receiver.stats();
            let sync_stats = sync.stats();
            info!(
                "receiver stats: {} packets, {:.1} KB, {} invalid | {} accepted, {} late, {}+{} resyncs, {} bytes played",
                net.packets_received,
                net.bytes_received as f64 / 1024.0,
                net.invalid_datagrams,
                sync_stats.accepted,
                sync_stats.late,
                sync_stats.resyncs_ahead,
                sync_stats.resyncs_behind,
                sync_stats.bytes_played
            );
        }

        tokio::time::sleep(TICK_INTERVAL).await;
    }
}
