// 50 Hz control loop with watchdog
// Note: a watchdog is a safety mechanism that triggers a safe action if something goes wrong
// Eg. without it if teleop crashes and stops sending commands, the runtime will keep driving
// the chassis with the last velocity it heard

use std::time::Instant;
use tokio::time::{Duration, interval};
use tracing::{info, warn};

// local imports
use crate::config::{
    self, CMD_TIMEOUT, DriveConfig, LOOP_HZ, TOPIC_CMD_CHASSIS, TOPIC_HEALTH, TOPIC_RT_TELEMETRY,
    TOPIC_YAW,
};
use crate::messages::{ChassisCommand, DriveTelemetry, RuntimeHealth, YawUpdate};
use crate::swerve::bus::MotorIo;
use crate::swerve::drive::SwerveDrive;
use crate::swerve::sim::SimBus;

pub struct Runtime {
    latest_cmd: Option<ChassisCommand>,
    cmd_received_at: Instant,
    yaw_deg: f32,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            yaw_deg: 0.0,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    /// Process incoming command
    fn on_command(&mut self, cmd: ChassisCommand) {
        info!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Latest chassis yaw from the pose estimator; held between updates
    fn on_yaw(&mut self, update: YawUpdate) {
        self.yaw_deg = update.yaw_deg;
    }

    /// Command for this cycle, zeroed when the watchdog trips
    fn command_for_cycle(&mut self) -> ChassisCommand {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the chassis
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping chassis", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            ChassisCommand::zero()
        } else if let Some(ref cmd) = self.latest_cmd {
            self.health = RuntimeHealth::Ok;
            cmd.clone()
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            ChassisCommand::zero()
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = DriveConfig::standard();

    if config::DRIVE_ENABLED {
        let drive = SwerveDrive::open(&cfg)?;
        run_loop(drive).await
    } else {
        warn!("Hardware disabled, driving the simulated bus");
        let drive = SwerveDrive::new(SimBus::for_config(&cfg), &cfg)?;
        run_loop(drive).await
    }
}

async fn run_loop<B: MotorIo>(
    mut drive: SwerveDrive<B>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_cmd = session.declare_subscriber(TOPIC_CMD_CHASSIS).await?;
    let sub_yaw = session.declare_subscriber(TOPIC_YAW).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_RT_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!("Runtime started: {}Hz loop, {}ms watchdog timeout", LOOP_HZ, CMD_TIMEOUT.as_millis());
    info!("Subscribed to: {}, {}", TOPIC_CMD_CHASSIS, TOPIC_YAW);
    info!("Publishing to: {}, {}", TOPIC_RT_TELEMETRY, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_cmd.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ChassisCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Drain yaw updates the same way
        while let Ok(Some(sample)) = sub_yaw.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<YawUpdate>(&payload) {
                Ok(update) => runtime.on_yaw(update),
                Err(e) => warn!("Failed to parse yaw update: {}", e),
            }
        }

        // 3. Dispatch this cycle's command (includes watchdog logic)
        let cmd = runtime.command_for_cycle();
        drive.drive(&cmd, runtime.yaw_deg);

        // 4. Publish telemetry for the odometry consumer
        let telemetry =
            DriveTelemetry { states: drive.module_states(), positions: drive.module_positions() };
        pub_telemetry.put(serde_json::to_string(&telemetry)?).await?;

        // 5. Publish health
        pub_health.put(serde_json::to_string(&runtime.health)?).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchdog_zeroes_a_stale_command() {
        let mut runtime = Runtime::new();
        runtime.on_command(ChassisCommand { vx: 1.0, vy: 0.0, omega: 0.5, field_relative: false });

        let cmd = runtime.command_for_cycle();
        assert_eq!(cmd.vx, 1.0);
        assert_eq!(runtime.health, RuntimeHealth::Ok);

        runtime.cmd_received_at = Instant::now() - CMD_TIMEOUT - Duration::from_millis(50);
        let cmd = runtime.command_for_cycle();
        assert_eq!(cmd.vx, 0.0);
        assert_eq!(cmd.omega, 0.0);
        assert_eq!(runtime.health, RuntimeHealth::CmdStale);
    }

    #[test]
    fn starts_stale_until_first_command() {
        let mut runtime = Runtime::new();
        let cmd = runtime.command_for_cycle();
        assert_eq!(cmd.vx, 0.0);
        assert_eq!(runtime.health, RuntimeHealth::CmdStale);
    }
}
