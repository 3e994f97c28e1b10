//! System report example
//!
//! Resets a device, queries its identity, capabilities, published
//! command timeouts, and active alert conditions, and prints a report.
//!
//! # Usage
//!
//! ```bash
//! # Hardware reset through a serial break, then report
//! cargo run --example system_report /dev/ttyUSB0
//!
//! # Soft reset for links that cannot carry a serial break
//! cargo run --example system_report /dev/ttyUSB0 soft
//! ```

use std::env;

use ndicapi_rust::error::{NdiError, Result};
use ndicapi_rust::system::TrackingSystem;
use tracing_subscriber::EnvFilter;

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

fn run() -> Result<()> {
    let port = env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let soft = env::args().nth(2).as_deref() == Some("soft");

    let mut system = TrackingSystem::builder().build();
    system.open(&port)?;
    if soft {
        system.wireless_reset()?;
    } else {
        system.hardware_reset()?;
    }
    system.initialize()?;
    system.query_system_info()?;
    let timeouts = system.refresh_timeouts()?;

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if let Some(profile) = system.profile() {
        println!("Family:              {:?}", profile.family);
        for line in profile.version.lines() {
            println!("Firmware:            {}", line);
        }
        let ports = profile.ports;
        if profile.family.magnetic() {
            println!("Sensor ports:        {}", ports.magnetic);
            println!(
                "Field generators:    {} on {} card(s)",
                ports.field_generators, ports.field_generator_cards
            );
        } else {
            println!("Active ports:        {}", ports.active);
            println!("Passive ports:       {}", ports.passive);
            println!("Tool-in-port ports:  {}", ports.active_tip);
            println!("Wireless slots:      {}", ports.active_wireless);
            let mut features = Vec::new();
            if profile.features.active_ports {
                features.push("active ports");
            }
            if profile.features.passive_ports {
                features.push("passive ports");
            }
            if profile.features.multiple_volumes {
                features.push("multiple volumes");
            }
            if profile.features.tool_in_port_sensing {
                features.push("tool-in-port sensing");
            }
            if profile.features.active_wireless {
                features.push("active wireless tools");
            }
            if features.is_empty() {
                println!("Features:            none reported");
            } else {
                println!("Features:            {}", features.join(", "));
            }
        }
    }
    println!("Published timeouts:  {}", timeouts);

    match system.alerts(false) {
        Ok(alerts) => {
            let labels = alerts.active_labels();
            if labels.is_empty() {
                println!("Alerts:              none");
            } else {
                for label in labels {
                    println!("Alert:               {}", label);
                }
            }
        }
        Err(NdiError::DeviceError { .. }) => {
            println!("Alerts:              not supported by this firmware");
        }
        Err(e) => return Err(e),
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Two beeps confirm the link end to end.
    system.beep(2)?;
    Ok(())
}
