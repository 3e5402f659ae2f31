//! ICM-20948 register map
//!
//! Register addresses are only meaningful relative to the user bank selected
//! through `REG_BANK_SEL`, which is reachable from every bank.

/// Bank select register (all banks)
pub const REG_BANK_SEL: u8 = 0x7F;

/// User register banks. The discriminant is the raw `REG_BANK_SEL` value
/// (bank number in bits [5:4]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bank {
    /// Power management, interrupt config and sensor data
    Bank0 = 0x00,
    /// Self-test and offsets
    Bank1 = 0x10,
    /// Gyro and accel configuration
    Bank2 = 0x20,
    /// Auxiliary I2C master
    Bank3 = 0x30,
}

impl Bank {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Bank 0 registers
pub mod bank0 {
    pub const WHO_AM_I: u8 = 0x00;
    pub const USER_CTRL: u8 = 0x03;
    pub const LP_CONFIG: u8 = 0x05;
    pub const PWR_MGMT_1: u8 = 0x06;
    pub const PWR_MGMT_2: u8 = 0x07;
    pub const INT_PIN_CFG: u8 = 0x0F;
    /// First byte of the accel/gyro burst (ACCEL_XOUT_H .. GYRO_ZOUT_L)
    pub const ACCEL_XOUT_H: u8 = 0x2D;
    pub const GYRO_XOUT_H: u8 = 0x33;
}

/// Bank 2 registers
pub mod bank2 {
    pub const GYRO_SMPLRT_DIV: u8 = 0x00;
    pub const GYRO_CONFIG_1: u8 = 0x01;
    pub const ACCEL_CONFIG: u8 = 0x14;
}

/// Expected WHO_AM_I value
pub const WHO_AM_I_VALUE: u8 = 0xEA;

/// PWR_MGMT_1: clear sleep, auto-select best clock source
pub const PWR_MGMT_1_WAKE: u8 = 0x01;

/// GYRO_CONFIG_1 default: ±250 dps, DLPF bypassed
pub const GYRO_CONFIG_1_DEFAULT: u8 = 0x00;

/// ACCEL_CONFIG default: ±2 g, DLPF bypassed
pub const ACCEL_CONFIG_DEFAULT: u8 = 0x00;

/// Length of the accel + gyro burst: 6 big-endian i16 values
pub const SAMPLE_BURST_LEN: usize = 12;
