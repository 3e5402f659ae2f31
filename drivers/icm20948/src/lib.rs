//! ICM-20948 6-Axis IMU I2C Driver
//!
//! Pure Rust driver for the accelerometer and gyroscope of the ICM-20948,
//! generic over any `embedded-hal` 1.0 I2C bus and delay provider.
//!
//! # Features
//!
//! - Register-bank tracking (`REG_BANK_SEL`)
//! - Single 12-byte burst read per sample
//! - Conversion to SI units (m/s², rad/s) at the default ±2 g / ±250 dps ranges
//! - `no_std` compatible
//!
//! # Example
//!
//! ```ignore
//! use icm20948::{Icm20948, I2C_ADDR_AD0_HIGH};
//!
//! let mut imu = Icm20948::new(i2c, delay, I2C_ADDR_AD0_HIGH);
//! imu.initialize()?;
//!
//! loop {
//!     let data = imu.read_sample()?;
//!     println!("Accel: {}, {}, {}", data.ax, data.ay, data.az);
//! }
//! ```
//!
//! The driver does not retry. Per-transaction timeouts are the bus
//! implementation's job; see [`TRANSACTION_TIMEOUT_MS`].

#![cfg_attr(not(any(test, feature = "mock")), no_std)]

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod registers;

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
#[cfg(feature = "logging")]
use log::{debug, warn};

pub use registers::Bank;
use registers::{bank0, bank2};

/// I2C address with AD0 pulled low
pub const I2C_ADDR_AD0_LOW: u8 = 0x68;
/// I2C address with AD0 pulled high (breakout default)
pub const I2C_ADDR_AD0_HIGH: u8 = 0x69;

/// Settle time after the wake write before configuration registers are usable
pub const SETTLE_DELAY_MS: u32 = 100;

/// Upper bound a bus implementation should enforce on each transaction
pub const TRANSACTION_TIMEOUT_MS: u32 = 100;

/// Physical constants
const G: f32 = 9.80665; // m/s²
const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;

/// Accelerometer sensitivity at ±2 g
pub const ACCEL_LSB_PER_G: f32 = 16384.0;
/// Gyroscope sensitivity at ±250 dps
pub const GYRO_LSB_PER_DPS: f32 = 131.0;

/// Convert a raw accelerometer count to m/s² (±2 g range)
pub fn convert_accel(raw: i16) -> f32 {
    raw as f32 / ACCEL_LSB_PER_G * G
}

/// Convert a raw gyroscope count to rad/s (±250 dps range)
pub fn convert_gyro(raw: i16) -> f32 {
    raw as f32 / GYRO_LSB_PER_DPS * DEG_TO_RAD
}

/// One converted 6-axis measurement
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuData {
    /// Accelerometer X-axis (m/s²)
    pub ax: f32,
    /// Accelerometer Y-axis (m/s²)
    pub ay: f32,
    /// Accelerometer Z-axis (m/s²)
    pub az: f32,

    /// Gyroscope X-axis (rad/s)
    pub gx: f32,
    /// Gyroscope Y-axis (rad/s)
    pub gy: f32,
    /// Gyroscope Z-axis (rad/s)
    pub gz: f32,
}

impl ImuData {
    /// Decode the 12-byte ACCEL_XOUT_H..GYRO_ZOUT_L burst
    pub fn from_burst(raw: &[u8; registers::SAMPLE_BURST_LEN]) -> Self {
        let word = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]);

        Self {
            ax: convert_accel(word(0)),
            ay: convert_accel(word(2)),
            az: convert_accel(word(4)),
            gx: convert_gyro(word(6)),
            gy: convert_gyro(word(8)),
            gz: convert_gyro(word(10)),
        }
    }
}

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// A bus transaction failed or timed out
    Bus(E),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "I2C transaction failed: {:?}", e),
        }
    }
}

/// ICM-20948 driver
pub struct Icm20948<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    /// Last bank written to REG_BANK_SEL, `None` until the first select
    bank: Option<Bank>,
}

impl<I2C, D> Icm20948<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a driver instance. Performs no bus traffic.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            bank: None,
        }
    }

    /// Wake the device and apply the default gyro/accel configuration.
    ///
    /// Sequence: bank 0 → PWR_MGMT_1 wake → settle → bank 2 → GYRO_CONFIG_1,
    /// ACCEL_CONFIG → bank 0. The first failing transaction aborts.
    pub fn initialize(&mut self) -> Result<(), Error<I2C::Error>> {
        self.select_bank(Bank::Bank0)?;
        self.write_register(bank0::PWR_MGMT_1, registers::PWR_MGMT_1_WAKE)?;

        self.delay.delay_ms(SETTLE_DELAY_MS);

        self.select_bank(Bank::Bank2)?;
        self.write_register(bank2::GYRO_CONFIG_1, registers::GYRO_CONFIG_1_DEFAULT)?;
        self.write_register(bank2::ACCEL_CONFIG, registers::ACCEL_CONFIG_DEFAULT)?;

        self.select_bank(Bank::Bank0)?;

        #[cfg(feature = "logging")]
        debug!("ICM-20948 at 0x{:02X} initialized (±2 g, ±250 dps)", self.address);

        Ok(())
    }

    /// Read one accel + gyro sample in a single burst transaction.
    pub fn read_sample(&mut self) -> Result<ImuData, Error<I2C::Error>> {
        if self.bank != Some(Bank::Bank0) {
            self.select_bank(Bank::Bank0)?;
        }

        let mut raw = [0u8; registers::SAMPLE_BURST_LEN];
        self.read_registers(bank0::ACCEL_XOUT_H, &mut raw)?;

        Ok(ImuData::from_burst(&raw))
    }

    /// Read the WHO_AM_I identity register (expected [`registers::WHO_AM_I_VALUE`])
    pub fn who_am_i(&mut self) -> Result<u8, Error<I2C::Error>> {
        if self.bank != Some(Bank::Bank0) {
            self.select_bank(Bank::Bank0)?;
        }

        let mut id = [0u8; 1];
        self.read_registers(bank0::WHO_AM_I, &mut id)?;
        Ok(id[0])
    }

    /// Write REG_BANK_SEL. Always issues the transaction, even when `bank`
    /// is already selected.
    pub fn select_bank(&mut self, bank: Bank) -> Result<(), Error<I2C::Error>> {
        match self.write_register(registers::REG_BANK_SEL, bank.as_u8()) {
            Ok(()) => {
                self.bank = Some(bank);
                Ok(())
            }
            Err(e) => {
                // Device state unknown after a failed select
                self.bank = None;
                Err(e)
            }
        }
    }

    /// Currently selected bank as tracked by the driver
    pub fn bank(&self) -> Option<Bank> {
        self.bank
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give back the bus and delay provider
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c.write(self.address, &[reg, value]).map_err(|e| {
            #[cfg(feature = "logging")]
            warn!("ICM-20948 write 0x{:02X} failed", reg);
            Error::Bus(e)
        })
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.i2c.write_read(self.address, &[start], buf).map_err(|e| {
            #[cfg(feature = "logging")]
            warn!("ICM-20948 read at 0x{:02X} ({} bytes) failed", start, buf.len());
            Error::Bus(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock::{BusOp, MockBus, MockDelay};
    use registers::REG_BANK_SEL;

    fn driver() -> (Icm20948<MockBus, MockDelay>, MockBus, MockDelay) {
        let bus = MockBus::new();
        let delay = MockDelay::new();
        let imu = Icm20948::new(bus.clone(), delay.clone(), I2C_ADDR_AD0_HIGH);
        (imu, bus, delay)
    }

    fn burst(words: [i16; 6]) -> [u8; 12] {
        let mut out = [0u8; 12];
        for (i, w) in words.iter().enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&w.to_be_bytes());
        }
        out
    }

    #[test]
    fn test_convert_accel_matches_formula() {
        for raw in [i16::MIN, -16384, -1, 0, 1, 8192, 16384, i16::MAX] {
            assert_eq!(convert_accel(raw), raw as f32 / 16384.0 * 9.80665);
        }
        assert!((convert_accel(16384) - 9.80665).abs() < 1e-6);
    }

    #[test]
    fn test_convert_gyro_matches_formula() {
        let dps_to_rads = core::f32::consts::PI / 180.0;
        for raw in [i16::MIN, -131, -1, 0, 1, 131, 1310, i16::MAX] {
            assert_eq!(convert_gyro(raw), raw as f32 / 131.0 * dps_to_rads);
        }
        assert!((convert_gyro(131) - dps_to_rads).abs() < 1e-7);
    }

    #[test]
    fn test_initialize_sequence() {
        let (mut imu, bus, delay) = driver();
        imu.initialize().unwrap();

        assert_eq!(
            bus.register_writes(),
            vec![
                (REG_BANK_SEL, 0x00),
                (bank0::PWR_MGMT_1, 0x01),
                (REG_BANK_SEL, 0x20),
                (bank2::GYRO_CONFIG_1, 0x00),
                (bank2::ACCEL_CONFIG, 0x00),
                (REG_BANK_SEL, 0x00),
            ]
        );
        assert!(bus.ops().iter().all(|op| matches!(
            op,
            BusOp::Write { addr: I2C_ADDR_AD0_HIGH, .. }
        )));
        assert!(delay.total_ms() >= 100);
        assert_eq!(imu.bank(), Some(Bank::Bank0));
    }

    #[test]
    fn test_initialize_stops_on_first_failure() {
        let (mut imu, bus, _) = driver();
        bus.fail_next(1);

        assert!(matches!(imu.initialize(), Err(Error::Bus(_))));
        assert!(bus.ops().is_empty());
        assert_eq!(imu.bank(), None);
    }

    #[test]
    fn test_read_sample_decodes_big_endian_burst() {
        let (mut imu, bus, _) = driver();
        imu.initialize().unwrap();
        bus.clear_ops();
        bus.push_read_data(&burst([16384, -16384, 0, 131, -131, 0]));

        let data = imu.read_sample().unwrap();

        assert!((data.ax - 9.80665).abs() < 1e-5);
        assert!((data.ay + 9.80665).abs() < 1e-5);
        assert_eq!(data.az, 0.0);
        assert!((data.gx - 0.017453292).abs() < 1e-6);
        assert!((data.gy + 0.017453292).abs() < 1e-6);
        assert_eq!(data.gz, 0.0);

        // Bank 0 already active: one write of the start register, one 12-byte read
        assert_eq!(
            bus.ops(),
            vec![
                BusOp::Write {
                    addr: I2C_ADDR_AD0_HIGH,
                    data: vec![bank0::ACCEL_XOUT_H],
                },
                BusOp::Read {
                    addr: I2C_ADDR_AD0_HIGH,
                    len: 12,
                },
            ]
        );
    }

    #[test]
    fn test_read_sample_selects_bank0_when_unknown() {
        let (mut imu, bus, _) = driver();
        bus.push_read_data(&burst([0; 6]));

        imu.read_sample().unwrap();

        assert_eq!(
            bus.ops()[0],
            BusOp::Write {
                addr: I2C_ADDR_AD0_HIGH,
                data: vec![REG_BANK_SEL, 0x00],
            }
        );
    }

    #[test]
    fn test_select_bank_is_not_elided() {
        let (mut imu, bus, _) = driver();
        imu.select_bank(Bank::Bank2).unwrap();
        imu.select_bank(Bank::Bank2).unwrap();

        assert_eq!(
            bus.register_writes(),
            vec![(REG_BANK_SEL, 0x20), (REG_BANK_SEL, 0x20)]
        );
    }

    #[test]
    fn test_read_failure_then_recovery() {
        let (mut imu, bus, _) = driver();
        imu.initialize().unwrap();

        bus.fail_next(1);
        assert!(imu.read_sample().is_err());

        bus.push_read_data(&burst([100, 200, 300, 10, 20, 30]));
        let data = imu.read_sample().unwrap();
        assert_eq!(data.ax, convert_accel(100));
        assert_eq!(data.gz, convert_gyro(30));
    }

    #[test]
    fn test_who_am_i() {
        let (mut imu, bus, _) = driver();
        bus.push_read_data(&[registers::WHO_AM_I_VALUE]);

        assert_eq!(imu.who_am_i().unwrap(), 0xEA);
    }
}
