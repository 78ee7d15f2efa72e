// Serial protocol for the module motor controllers.
//
// Each swerve module carries two smart controllers on a shared half-duplex
// bus: the drive controller runs an onboard velocity loop, the steer
// controller an onboard position loop with an absolute encoder on the module
// axis. Packet format is Dynamixel-1.0 style:
// [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

use crate::config::PidGains;

/// Default serial configuration for the controller bus
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Broadcast id for sync writes
const BROADCAST_ID: u8 = 0xFE;

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
    SyncWrite = 0x83,
}

/// Register addresses shared by both controller types
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    // EEPROM area (persists across power cycles)
    ModelNumber = 3, // 2 bytes, read-only
    Id = 5,          // 1 byte
    BaudRate = 6,    // 1 byte

    // RAM area (volatile)
    OperatingMode = 33, // 1 byte: 0=velocity, 1=position
    Direction = 34,     // 1 byte: 0=normal, 1=inverted
    CurrentLimit = 35,  // 2 bytes, mA
    LoopKp = 37,        // 2 bytes, milli-units
    LoopKi = 39,        // 2 bytes, milli-units
    LoopKd = 41,        // 2 bytes, milli-units
    LoopKf = 43,        // 2 bytes, milli-units
    Lock = 47,          // 1 byte: 0=unlocked, 1=locked
    TorqueEnable = 48,  // 1 byte: 0=off, 1=on
    GoalVelocity = 50,  // 2 bytes (sign-magnitude RPM, velocity mode)
    GoalPosition = 52,  // 4 bytes (signed ticks, position mode)

    PresentPosition = 56, // 4 bytes, signed ticks; writable for calibration
    PresentVelocity = 60, // 2 bytes, sign-magnitude RPM, read-only
    PresentCurrent = 62,  // 2 bytes, mA, read-only
    AbsolutePosition = 64, // 2 bytes, 0..4095, steer controllers only
}

/// Onboard closed-loop modes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Velocity = 0,
    Position = 1,
}

/// One-time configuration pushed to a controller before torque-on.
#[derive(Debug, Clone, Copy)]
pub struct ControllerSetup {
    pub mode: OperatingMode,
    pub inverted: bool,
    pub current_limit_ma: u16,
    pub gains: PidGains,
}

/// Error types for bus communication
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from controller {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for controller {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Controller {id} returned error status: 0x{status:02X}")]
    ControllerError { id: u8, status: u8 },

    #[error("Timeout waiting for response from controller {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// The semantic operations the module layer needs from the hardware.
/// Implemented by `MotorBus` for the real bus and by the simulator.
pub trait MotorIo {
    fn ping(&mut self, id: u8) -> Result<bool>;
    fn set_torque(&mut self, id: u8, enabled: bool) -> Result<()>;
    fn configure(&mut self, id: u8, setup: &ControllerSetup) -> Result<()>;
    fn set_goal_velocity(&mut self, id: u8, rpm: i16) -> Result<()>;
    fn set_goal_position(&mut self, id: u8, ticks: i32) -> Result<()>;
    /// One broadcast packet setting several velocity targets at once.
    fn sync_goal_velocity(&mut self, targets: &[(u8, i16)]) -> Result<()>;
    fn present_velocity(&mut self, id: u8) -> Result<i16>;
    fn present_position(&mut self, id: u8) -> Result<i32>;
    fn present_current_ma(&mut self, id: u8) -> Result<u16>;
    fn absolute_position(&mut self, id: u8) -> Result<u16>;
    /// Overwrite the relative position counter (torque must be off on the
    /// position loop for the write to be accepted).
    fn seed_position(&mut self, id: u8, ticks: i32) -> Result<()>;
}

/// Controller bus - handles serial communication with the motor controllers
pub struct MotorBus {
    port: Box<dyn SerialPort>,
}

impl MotorBus {
    /// Open a new connection to the controller bus
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // params + instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        // Checksum over id, length, instruction, params
        let checksum_data = &packet[2..]; // skip header
        packet.push(Self::checksum(checksum_data));

        packet
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read a status packet, returning its parameter bytes
    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                BusError::Timeout { id: expected_id }
            } else {
                BusError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.port.read_exact(&mut id_length)?;
        let id = id_length[0];
        let length = id_length[1] as usize;

        if id != expected_id {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }

        // Read remaining bytes (error + params + checksum = length bytes)
        let mut remaining = vec![0u8; length];
        self.port.read_exact(&mut remaining)?;

        // Verify checksum
        let mut checksum_data = vec![id, length as u8];
        checksum_data.extend_from_slice(&remaining[..remaining.len() - 1]);
        let expected_checksum = Self::checksum(&checksum_data);
        let received_checksum = remaining[remaining.len() - 1];

        if expected_checksum != received_checksum {
            return Err(BusError::ChecksumMismatch { id });
        }

        // Check error status
        let error_status = remaining[0];
        if error_status != 0 {
            return Err(BusError::ControllerError { id, status: error_status });
        }

        // Return parameters (excluding error byte and checksum)
        Ok(remaining[1..remaining.len() - 1].to_vec())
    }

    /// Write a single byte to a register
    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        let params = [register as u8, value];
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write u8 to controller {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;

        let _ = self.read_response(id)?;
        Ok(())
    }

    /// Write two bytes (little-endian) to a register
    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        let params = [register as u8, (value & 0xFF) as u8, (value >> 8) as u8];
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write u16 to controller {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;

        let _ = self.read_response(id)?;
        Ok(())
    }

    /// Write a signed 16-bit value (velocity registers use sign-magnitude:
    /// bit 15 = direction, bits 0-14 = magnitude)
    pub fn write_i16(&mut self, id: u8, register: Register, value: i16) -> Result<()> {
        self.write_u16(id, register, encode_sign_magnitude(value))
    }

    /// Write a signed 32-bit value (little-endian two's complement)
    pub fn write_i32(&mut self, id: u8, register: Register, value: i32) -> Result<()> {
        let bytes = value.to_le_bytes();
        let params = [register as u8, bytes[0], bytes[1], bytes[2], bytes[3]];
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write i32 to controller {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;

        let _ = self.read_response(id)?;
        Ok(())
    }

    /// Read a single byte from a register
    pub fn read_u8(&mut self, id: u8, register: Register) -> Result<u8> {
        let params = [register as u8, 1]; // address, length
        let packet = Self::build_packet(id, Instruction::Read, &params);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        if response.is_empty() {
            return Err(BusError::InvalidResponse { id, reason: "Empty response".to_string() });
        }
        Ok(response[0])
    }

    /// Read two bytes (little-endian) from a register
    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        let params = [register as u8, 2]; // address, length
        let packet = Self::build_packet(id, Instruction::Read, &params);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        if response.len() < 2 {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("Expected 2 bytes, got {}", response.len()),
            });
        }
        Ok(u16::from_le_bytes([response[0], response[1]]))
    }

    /// Read four bytes (little-endian, signed) from a register
    pub fn read_i32(&mut self, id: u8, register: Register) -> Result<i32> {
        let params = [register as u8, 4]; // address, length
        let packet = Self::build_packet(id, Instruction::Read, &params);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        if response.len() < 4 {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("Expected 4 bytes, got {}", response.len()),
            });
        }
        Ok(i32::from_le_bytes([response[0], response[1], response[2], response[3]]))
    }

    /// Sync write: same register on multiple controllers in one broadcast
    /// packet. Params: [start_addr, data_length, id1, data1..., id2, ...]
    pub fn sync_write_u16(&mut self, register: Register, data: &[(u8, u16)]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let data_length: u8 = 2; // 2 bytes per controller
        let mut params = vec![register as u8, data_length];

        for &(id, value) in data {
            params.push(id);
            params.push((value & 0xFF) as u8);
            params.push((value >> 8) as u8);
        }

        let packet = Self::build_packet(BROADCAST_ID, Instruction::SyncWrite, &params);
        debug!("Sync write to {} controllers: reg={:?}", data.len(), register);
        self.send_packet(&packet)?;

        // Sync write has no response
        Ok(())
    }

    /// Sync write signed 16-bit values (for velocities)
    pub fn sync_write_i16(&mut self, register: Register, data: &[(u8, i16)]) -> Result<()> {
        let encoded: Vec<(u8, u16)> =
            data.iter().map(|&(id, val)| (id, encode_sign_magnitude(val))).collect();
        self.sync_write_u16(register, &encoded)
    }
}

impl MotorIo for MotorBus {
    fn ping(&mut self, id: u8) -> Result<bool> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        match self.read_response(id) {
            Ok(_) => Ok(true),
            Err(BusError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn set_torque(&mut self, id: u8, enabled: bool) -> Result<()> {
        let value = enabled as u8;
        self.write_u8(id, Register::TorqueEnable, value)?;
        self.write_u8(id, Register::Lock, value)
    }

    fn configure(&mut self, id: u8, setup: &ControllerSetup) -> Result<()> {
        self.write_u8(id, Register::OperatingMode, setup.mode as u8)?;
        self.write_u8(id, Register::Direction, setup.inverted as u8)?;
        self.write_u16(id, Register::CurrentLimit, setup.current_limit_ma)?;
        self.write_u16(id, Register::LoopKp, gain_milli(setup.gains.kp))?;
        self.write_u16(id, Register::LoopKi, gain_milli(setup.gains.ki))?;
        self.write_u16(id, Register::LoopKd, gain_milli(setup.gains.kd))?;
        self.write_u16(id, Register::LoopKf, gain_milli(setup.gains.kf))
    }

    fn set_goal_velocity(&mut self, id: u8, rpm: i16) -> Result<()> {
        self.write_i16(id, Register::GoalVelocity, rpm)
    }

    fn set_goal_position(&mut self, id: u8, ticks: i32) -> Result<()> {
        self.write_i32(id, Register::GoalPosition, ticks)
    }

    fn sync_goal_velocity(&mut self, targets: &[(u8, i16)]) -> Result<()> {
        self.sync_write_i16(Register::GoalVelocity, targets)
    }

    fn present_velocity(&mut self, id: u8) -> Result<i16> {
        let raw = self.read_u16(id, Register::PresentVelocity)?;
        Ok(decode_sign_magnitude(raw))
    }

    fn present_position(&mut self, id: u8) -> Result<i32> {
        self.read_i32(id, Register::PresentPosition)
    }

    fn present_current_ma(&mut self, id: u8) -> Result<u16> {
        self.read_u16(id, Register::PresentCurrent)
    }

    fn absolute_position(&mut self, id: u8) -> Result<u16> {
        self.read_u16(id, Register::AbsolutePosition)
    }

    fn seed_position(&mut self, id: u8, ticks: i32) -> Result<()> {
        self.write_i32(id, Register::PresentPosition, ticks)
    }
}

/// Closed-loop gains travel as fixed-point milli-units
fn gain_milli(gain: f32) -> u16 {
    (gain * 1000.0).round().clamp(0.0, u16::MAX as f32) as u16
}

/// Encode a signed value to sign-magnitude format
/// Bit 15 = sign (1 = negative), Bits 0-14 = magnitude
fn encode_sign_magnitude(value: i16) -> u16 {
    if value >= 0 { value as u16 } else { (0x8000 | (-(value as i32)) as u16) & 0xFFFF }
}

/// Decode sign-magnitude format to signed value
fn decode_sign_magnitude(raw: u16) -> i16 {
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 { -magnitude } else { magnitude }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // Example: ID=1, Length=4, Instruction=WRITE, Addr=30, Data=0, 2
        let data = [1u8, 4, 0x03, 30, 0, 2];
        let checksum = MotorBus::checksum(&data);
        // ~(1+4+3+30+0+2) = ~40 = 215
        assert_eq!(checksum, 215);
    }

    #[test]
    fn test_sign_magnitude_encoding() {
        assert_eq!(encode_sign_magnitude(0), 0);
        assert_eq!(encode_sign_magnitude(100), 100);
        assert_eq!(encode_sign_magnitude(-100), 0x8064); // 0x8000 | 100
        assert_eq!(encode_sign_magnitude(-1), 0x8001);

        assert_eq!(decode_sign_magnitude(0), 0);
        assert_eq!(decode_sign_magnitude(100), 100);
        assert_eq!(decode_sign_magnitude(0x8064), -100);
        assert_eq!(decode_sign_magnitude(0x8001), -1);
    }

    #[test]
    fn test_build_packet() {
        let packet = MotorBus::build_packet(1, Instruction::Ping, &[]);
        // Header (2) + ID (1) + Length (1) + Instruction (1) + Checksum (1) = 6 bytes
        assert_eq!(packet.len(), 6);
        assert_eq!(packet[0], 0xFF);
        assert_eq!(packet[1], 0xFF);
        assert_eq!(packet[2], 1); // ID
        assert_eq!(packet[3], 2); // Length (instruction + checksum)
        assert_eq!(packet[4], 0x01); // PING instruction
    }

    #[test]
    fn test_position_packet_little_endian() {
        let bytes = (-1_i32).to_le_bytes();
        assert_eq!(bytes, [0xFF, 0xFF, 0xFF, 0xFF]);
        let bytes = 0x0001_0203_i32.to_le_bytes();
        assert_eq!(bytes, [0x03, 0x02, 0x01, 0x00]);
        assert_eq!(i32::from_le_bytes(bytes), 0x0001_0203);
    }

    #[test]
    fn test_gain_fixed_point() {
        assert_eq!(gain_milli(1.0), 1000);
        assert_eq!(gain_milli(0.5), 500);
        assert_eq!(gain_milli(0.0), 0);
        // saturates rather than wrapping
        assert_eq!(gain_milli(1e9), u16::MAX);
    }
}
