//! Wire message format
//!
//! One JSON object per message, values fixed at three decimals:
//!
//! ```text
//! {"type":"imu","accel":[ax,ay,az],"gyro":[gx,gy,gz],"roll":0.000,"pitch":0.000,"yaw":0.000}
//! ```
//!
//! Orientation fields are reserved and always zero.

use core::fmt::{self, Write};

use heapless::String;

use crate::error::{Error, Result};
use crate::sensors::Sample;

/// Fixed message buffer size in bytes
pub const MESSAGE_CAPACITY: usize = 192;

pub type Message = String<MESSAGE_CAPACITY>;

/// Serialize a sample into a fixed-capacity buffer.
/// Fails with [`Error::MessageTooLong`] rather than truncating.
pub fn format_sample(sample: &Sample) -> Result<Message> {
    let mut counter = ByteCounter(0);
    // Counting never fails
    let _ = write_sample(&mut counter, sample);
    if counter.0 > MESSAGE_CAPACITY {
        return Err(Error::MessageTooLong {
            len: counter.0,
            capacity: MESSAGE_CAPACITY,
        });
    }

    let mut msg = Message::new();
    write_sample(&mut msg, sample).map_err(|_| Error::MessageTooLong {
        len: counter.0,
        capacity: MESSAGE_CAPACITY,
    })?;
    Ok(msg)
}

fn write_sample<W: Write>(w: &mut W, s: &Sample) -> fmt::Result {
    write!(
        w,
        "{{\"type\":\"imu\",\"accel\":[{:.3},{:.3},{:.3}],\"gyro\":[{:.3},{:.3},{:.3}],\
         \"roll\":{:.3},\"pitch\":{:.3},\"yaw\":{:.3}}}",
        s.ax, s.ay, s.az, s.gx, s.gy, s.gz, 0.0f32, 0.0f32, 0.0f32
    )
}

struct ByteCounter(usize);

impl Write for ByteCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}
