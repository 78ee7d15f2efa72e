// Module diagnostic: READ-ONLY survey of all eight motor controllers
//
// This tool does NOT write anything to the controllers - it's completely safe.
// Use this first before running module_test.
//
// Usage: cargo run --example module_diagnostic -- [--port /dev/ttyUSB0]

use clap::Parser;
use std::io::{self, Write};

use swerve_zenoh_runtime::config::{DriveConfig, MODULE_LABELS};
use swerve_zenoh_runtime::swerve::bus::{MotorBus, MotorIo, Register};
use swerve_zenoh_runtime::swerve::units;

#[derive(Parser)]
#[command(about = "Read-only survey of the swerve module controllers")]
struct Args {
    /// Serial port of the controller bus
    #[arg(long, default_value_t = DriveConfig::standard().port)]
    port: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let cfg = DriveConfig::standard();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Swerve Module Diagnostic (READ-ONLY)                ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  This tool only READS from controllers - no writes, no       ║");
    println!("║  movement                                                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("Serial port: {}", args.port);
    println!();

    // Try to open serial port
    println!("Step 1: Opening serial port...");
    let mut bus = match MotorBus::open(&args.port) {
        Ok(bus) => {
            println!("  ✓ Serial port opened successfully");
            bus
        }
        Err(e) => {
            println!("  ✗ Failed to open serial port: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the port path is correct");
            println!("  - Verify the USB adapter is connected");
            println!("  - Check your user is in the dialout group");
            return Err(e.into());
        }
    };
    println!();

    // Ping every controller
    println!("Step 2: Pinging controllers...");
    let mut all_found = true;
    for (label, module) in MODULE_LABELS.iter().zip(&cfg.modules) {
        for (role, id) in [("drive", module.drive_id), ("steer", module.steer_id)] {
            print!("  {} {} (ID {}): ", label, role, id);
            io::stdout().flush()?;

            match bus.ping(id) {
                Ok(true) => println!("✓ RESPONDING"),
                Ok(false) => {
                    println!("✗ NO RESPONSE");
                    all_found = false;
                }
                Err(e) => {
                    println!("✗ ERROR: {}", e);
                    all_found = false;
                }
            }
        }
    }
    println!();

    if !all_found {
        println!("⚠ WARNING: Not all controllers responded!");
        println!("  - Check bus power supply");
        println!("  - Verify the configured controller ids");
        println!("  - Check wiring connections");
        println!();
        print!("Continue reading available controllers? [y/N]: ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
        println!();
    }

    // Read registers from each module
    println!("Step 3: Reading module registers...");
    println!();

    for (label, module) in MODULE_LABELS.iter().zip(&cfg.modules) {
        println!("  === {} (drive {}, steer {}) ===", label, module.drive_id, module.steer_id);

        for (role, id) in [("drive", module.drive_id), ("steer", module.steer_id)] {
            match bus.read_u8(id, Register::OperatingMode) {
                Ok(mode) => {
                    let mode_str = match mode {
                        0 => "Velocity",
                        1 => "Position",
                        _ => "Unknown",
                    };
                    println!("    {} mode:    {} ({})", role, mode, mode_str);
                }
                Err(e) => println!("    {} mode:    ERROR - {}", role, e),
            }

            match bus.read_u8(id, Register::TorqueEnable) {
                Ok(val) => {
                    let status = if val == 1 { "ENABLED" } else { "disabled" };
                    println!("    {} torque:  {} ({})", role, val, status);
                }
                Err(e) => println!("    {} torque:  ERROR - {}", role, e),
            }
        }

        match bus.present_velocity(module.drive_id) {
            Ok(rpm) => {
                let mps = units::drive_rpm_to_mps(rpm, cfg.wheel_circumference, cfg.drive_gear_ratio);
                println!("    drive velocity: {} RPM ({:.3} m/s)", rpm, mps);
            }
            Err(e) => println!("    drive velocity: ERROR - {}", e),
        }

        match bus.present_position(module.steer_id) {
            Ok(ticks) => {
                let turns = units::steer_ticks_to_turns(ticks, cfg.steer_gear_ratio);
                println!(
                    "    steer position: {} ticks ({:.1}°)",
                    ticks,
                    turns.rem_euclid(1.0) * 360.0
                );
            }
            Err(e) => println!("    steer position: ERROR - {}", e),
        }

        match bus.absolute_position(module.steer_id) {
            Ok(raw) => {
                let fraction = units::absolute_fraction(raw);
                println!(
                    "    absolute enc:   {} ({:.1}°, offset {:.1}°)",
                    raw,
                    fraction * 360.0,
                    module.zero_offset * 360.0
                );
            }
            Err(e) => println!("    absolute enc:   ERROR - {}", e),
        }

        println!();
    }

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Diagnostic Complete                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("If all controllers responded and show reasonable values:");
    println!("  1. Drive controllers should show Velocity mode once configured");
    println!("  2. Steer controllers should show Position mode once configured");
    println!("  3. Absolute readings at wheel-forward should match the offsets");
    println!();
    println!("Next step: Run 'cargo run --example module_test' with the chassis ON BLOCKS");

    Ok(())
}
