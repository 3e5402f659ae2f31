/// I2C bus adapter with a bounded per-transaction wait
use esp_idf_hal::delay::TickType;
use esp_idf_hal::i2c::I2cDriver;
use esp_idf_hal::sys::EspError;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};

#[derive(Debug)]
pub struct BusError(pub EspError);

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Wraps the ESP-IDF driver so every transaction gives up after the
/// driver's transaction timeout instead of blocking forever
pub struct TimedI2c {
    driver: I2cDriver<'static>,
    timeout_ticks: u32,
}

impl TimedI2c {
    pub fn new(driver: I2cDriver<'static>) -> Self {
        Self {
            driver,
            timeout_ticks: TickType::new_millis(icm20948::TRANSACTION_TIMEOUT_MS as u64).ticks(),
        }
    }
}

impl ErrorType for TimedI2c {
    type Error = BusError;
}

impl I2c<SevenBitAddress> for TimedI2c {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.driver
            .transaction(address, operations, self.timeout_ticks)
            .map_err(BusError)
    }
}
