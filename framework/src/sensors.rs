/// Sensor abstraction layer for hardware independence
/// Lets the acquisition loop run against the real driver or a test source
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use icm20948::{Icm20948, ImuData};

use crate::error::Result;

/// One converted 6-axis measurement. Replaced wholesale, never patched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    /// Linear acceleration (m/s²)
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    /// Angular rate (rad/s)
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
}

impl Sample {
    pub fn accel(&self) -> [f32; 3] {
        [self.ax, self.ay, self.az]
    }

    pub fn gyro(&self) -> [f32; 3] {
        [self.gx, self.gy, self.gz]
    }
}

impl From<ImuData> for Sample {
    fn from(d: ImuData) -> Self {
        Self {
            ax: d.ax,
            ay: d.ay,
            az: d.az,
            gx: d.gx,
            gy: d.gy,
            gz: d.gz,
        }
    }
}

/// Anything the acquisition loop can poll for a fresh sample.
/// Implementations: ICM-20948 over I2C, synthetic sources in tests.
pub trait SampleSource {
    /// Read one sample. No internal retry; the caller owns retry policy.
    fn read_sample(&mut self) -> Result<Sample>;
}

impl<I2C, D> SampleSource for Icm20948<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    fn read_sample(&mut self) -> Result<Sample> {
        Ok(Icm20948::read_sample(self)?.into())
    }
}
