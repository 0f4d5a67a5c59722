//! setu-lidar - LiDAR transport daemon
//!
//! Reads the unit configuration, builds the adapter set through the sensor
//! manager, logs every decoded stream and error code, and runs until
//! interrupted.

use setu_lidar::{Config, SensorManager};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `setu-lidar <path>` (positional)
/// - `setu-lidar --config <path>` (flag-based)
/// - `setu-lidar -c <path>` (short flag)
///
/// Defaults to `/etc/setu-lidar.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/setu-lidar.toml".to_string()
}

fn main() -> setu_lidar::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("setu-lidar starting...");

    let config_path = parse_config_path();
    log::info!("Using config: {}", config_path);
    let config = Config::from_file(&config_path)?;

    let mut manager = SensorManager::new();
    manager.register_points_callback(|msg| {
        log::info!(
            "points from {}: seq={} count={}",
            msg.frame_id,
            msg.seq,
            msg.cloud.len()
        );
    });
    manager.register_scan_callback(|msg| {
        log::info!("scan: seq={} packets={}", msg.seq, msg.packets.len());
    });
    manager.register_error_callback(|code| {
        log::warn!("transport error: {}", code);
    });

    manager.init(&config)?;
    manager.start()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| setu_lidar::Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("setu-lidar running. Press Ctrl-C to stop.");
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutting down...");
    manager.stop()?;

    log::info!("setu-lidar stopped");
    Ok(())
}
