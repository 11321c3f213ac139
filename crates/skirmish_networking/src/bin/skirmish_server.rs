//! # SKIRMISH Server
//!
//! The authoritative game server.
//!
//! ## Usage
//!
//! ```bash
//! skirmish_server [config.toml]
//! RUST_LOG=skirmish_networking=debug skirmish_server
//! ```

use std::process::ExitCode;
use std::time::{Duration, Instant};

use skirmish_core::{MonotonicClock, PlatformerPhysics};
use skirmish_networking::{GameServer, ServerConfig, TickLoop, TransportBridge, UdpTransport};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match ServerConfig::load(&path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path);
                config
            }
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };

    let transport = match UdpTransport::bind(config.bind_address) {
        Ok(transport) => transport,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_address, e);
            return ExitCode::FAILURE;
        }
    };

    let tick_rate = config.tick_rate;
    let client_timeout = Duration::from_secs_f64(config.client_timeout);
    let physics = PlatformerPhysics::new(config.physics);
    let mut server = GameServer::new(config, MonotonicClock::new(), physics);

    let bridge = TransportBridge::new(transport, server.transport_handle(), client_timeout);
    let transport_thread = std::thread::spawn(move || bridge.run(Duration::from_millis(1)));

    let mut tick_loop = TickLoop::new(tick_rate);
    let dt = tick_loop.delta_seconds();
    let stats_interval = u64::from(tick_rate) * 5;
    let start = Instant::now();

    tracing::info!("Server running at {} Hz", tick_rate);

    while server.is_running() && !transport_thread.is_finished() {
        tick_loop.wait_for_next_tick();

        while tick_loop.should_tick() {
            let tick_start = tick_loop.begin_tick();
            server.tick(dt);
            tick_loop.end_tick(tick_start);

            if tick_loop.tick_count() % stats_interval == 0 {
                let stats = tick_loop.stats();
                tracing::info!(
                    "Tick {} | uptime {:.1}s | clients {} | avg {:?} | max {:?} | late {}",
                    tick_loop.tick_count(),
                    start.elapsed().as_secs_f64(),
                    server.connection_count(),
                    stats.average,
                    stats.max,
                    stats.late_ticks
                );
            }
        }
    }

    server.shutdown();
    if transport_thread.join().is_err() {
        tracing::error!("Transport thread panicked");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
