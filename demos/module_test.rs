// Module test: Careful, step-by-step bring-up of the full drive
//
// IMPORTANT: Run module_diagnostic FIRST to verify read-only communication.
//
// Usage: cargo run --example module_test -- [--port /dev/ttyUSB0]
//
// Safety features:
// - Explicit confirmation before any writes
// - Starts with zero velocity
// - Very slow test speeds
// - Easy abort with Ctrl+C

use clap::Parser;
use std::io::{self, Write};
use std::thread::sleep;
use std::time::Duration;

use swerve_zenoh_runtime::config::{DriveConfig, MODULE_LABELS};
use swerve_zenoh_runtime::messages::ChassisCommand;
use swerve_zenoh_runtime::swerve::drive::SwerveDrive;

#[derive(Parser)]
#[command(about = "Guarded bring-up test for the swerve drive (moves the wheels)")]
struct Args {
    /// Serial port of the controller bus
    #[arg(long)]
    port: Option<String>,
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut cfg = DriveConfig::standard();
    if let Some(port) = args.port {
        cfg.port = port;
    }

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║            Swerve Module Test (WITH WRITES)                  ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  ⚠  This tool WILL move the steering and drive wheels!       ║");
    println!("║  ⚠  Make sure the chassis is ON BLOCKS before proceeding!    ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("Serial port: {}", cfg.port);
    println!();

    if !confirm("Have you run module_diagnostic first and verified all controllers respond?") {
        println!("Please run: cargo run --example module_diagnostic -- --port {}", cfg.port);
        return Ok(());
    }

    if !confirm("Is the chassis ON BLOCKS (wheels free to spin and steer)?") {
        println!("Please elevate the chassis so the wheels can move without driving it.");
        return Ok(());
    }

    // ========== STEP 1: Bring the drive up ==========
    // Init pings every controller, pushes configuration and seeds the steer
    // encoders from the absolute encoders - the calibration values are logged.
    println!();
    println!("Step 1: Initializing drive (configures and enables all modules)...");
    if !confirm("Proceed with initialization?") {
        println!("Aborted.");
        return Ok(());
    }

    let mut drive = SwerveDrive::open(&cfg)?;
    println!("  ✓ All four modules initialized");
    println!();

    // ========== STEP 2: Hold at zero ==========
    println!("Step 2: Commanding ZERO velocity...");
    println!("  The steering should hold; nothing should drive.");
    println!();

    let zero = ChassisCommand::zero();
    drive.drive(&zero, 0.0);
    sleep(Duration::from_millis(500));

    println!("  Reading back module states...");
    for (label, state) in MODULE_LABELS.iter().zip(drive.module_states()) {
        println!("    {}: {:.3} m/s @ {:.1}° (should be ~0 m/s)", label, state.speed, state.heading);
    }
    println!();

    // ========== STEP 3: Slow motion sequence ==========
    println!("Step 3: Slow motion sequence");
    println!("  Speed: 0.1 m/s translation, 0.3 rad/s rotation");
    println!("  Duration: 1 second per direction");
    println!();
    println!("  ⚠  WATCH THE MODULES - wheels steer first, then creep!");
    println!("  ⚠  Press Ctrl+C at any time to abort!");
    println!();

    if !confirm("Proceed with motion test?") {
        drive.stop();
        return Ok(());
    }

    let test_speed = 0.1; // m/s - very slow
    let cycle = Duration::from_millis(20); // match the runtime loop rate
    let steps_per_test = 50; // 1 second
    let pause = Duration::from_millis(500);

    let tests = [
        ("Forward", test_speed, 0.0, 0.0),
        ("Backward", -test_speed, 0.0, 0.0),
        ("Strafe left", 0.0, test_speed, 0.0),
        ("Strafe right", 0.0, -test_speed, 0.0),
        ("Rotate CCW", 0.0, 0.0, 0.3),
        ("Rotate CW", 0.0, 0.0, -0.3),
    ];

    for (name, vx, vy, omega) in tests {
        println!("  Testing: {}...", name);

        let cmd = ChassisCommand { vx, vy, omega, field_relative: false };
        for _ in 0..steps_per_test {
            drive.drive(&cmd, 0.0);
            sleep(cycle);
        }

        for (label, state) in MODULE_LABELS.iter().zip(drive.module_states()) {
            println!("    {}: {:.3} m/s @ {:.1}°", label, state.speed, state.heading);
        }

        // Stop between tests
        drive.drive(&zero, 0.0);
        sleep(pause);
    }

    println!("  Current draw per module:");
    for (label, (drive_amps, steer_amps)) in MODULE_LABELS.iter().zip(drive.current_draw()) {
        println!("    {}: drive {:.1} A, steer {:.1} A", label, drive_amps, steer_amps);
    }

    // ========== FINAL: Stop ==========
    println!();
    println!("Step 4: Stopping drive motors...");
    drive.stop();
    println!("  ✓ Drive motors stopped");

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Test Complete!                            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("If the modules steered and crept as expected, the drive is working.");
    println!("You can now try the full runtime with: cargo run");

    Ok(())
}
