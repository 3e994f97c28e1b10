//! Tool tracking example
//!
//! Opens a serial port, brings the device up from a hardware reset,
//! activates every configured tool port, and streams poses to the
//! terminal.
//!
//! # Usage
//!
//! ```bash
//! # Track with default settings on the default port
//! cargo run --example track_tools
//!
//! # Name the serial port and a session configuration file
//! cargo run --example track_tools /dev/ttyUSB0 session.toml
//!
//! # Show the library's structured logs while tracking
//! RUST_LOG=ndicapi_rust=debug cargo run --example track_tools
//! ```

use std::env;
use std::fs;
use std::thread;
use std::time::Duration;

use ndicapi_rust::config::SessionConfig;
use ndicapi_rust::protocol::types::PoseFlag;
use ndicapi_rust::system::TrackingSystem;
use tracing_subscriber::EnvFilter;

/// Pose reports to stream before stopping.
const POSE_FRAMES: usize = 50;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let port = env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let config = match env::args().nth(2) {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => SessionConfig::default(),
    };

    let mut system = TrackingSystem::builder().config(config).build();
    system.open(&port)?;
    println!("[INFO] Opened {}", port);

    system.hardware_reset()?;
    system.initialize()?;
    system.query_system_info()?;
    if let Some(profile) = system.profile() {
        println!("[INFO] Detected a {:?} tracker", profile.family);
        for line in profile.version.lines() {
            println!("       {}", line);
        }
    }
    system.refresh_timeouts()?;
    system.set_activation_rate()?;

    let enabled = system.activate_ports()?;
    println!("[INFO] {} tool(s) enabled", enabled);
    for (handle, record) in system.registry().iter() {
        if record.status.enabled {
            println!(
                "       {} port {:16} {} {}",
                handle, record.port_label, record.part_number, record.serial_number
            );
        }
    }

    system.start_tracking()?;
    for _ in 0..POSE_FRAMES {
        let status = system.read_poses(false)?;
        for (handle, record) in system.registry().iter() {
            if !record.status.enabled {
                continue;
            }
            let pose = &record.pose;
            match pose.flag {
                PoseFlag::Valid => println!(
                    "[POSE] {} frame {:8} x {:+9.2} y {:+9.2} z {:+9.2} err {:.4}",
                    handle,
                    pose.frame_number,
                    pose.translation.x,
                    pose.translation.y,
                    pose.translation.z,
                    pose.error
                ),
                flag => println!("[POSE] {} frame {:8} {:?}", handle, pose.frame_number, flag),
            }
        }
        if status.any_set() {
            println!("[WARN] System status: {:?}", status);
        }
        thread::sleep(Duration::from_millis(100));
    }
    system.stop_tracking()?;
    println!("[INFO] Tracking stopped");
    Ok(())
}
