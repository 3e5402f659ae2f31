//! Recording bus and delay for host-side tests
//!
//! `MockBus` logs every transaction, answers reads from a scripted byte
//! queue, and can be told to fail the next N transactions. Clones share the
//! same state, so a test can keep one handle while the driver owns another.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

/// One recorded bus operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Write { addr: u8, data: Vec<u8> },
    Read { addr: u8, len: usize },
}

#[derive(Debug, Default)]
struct MockState {
    ops: Vec<BusOp>,
    read_data: VecDeque<u8>,
    fail_next: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded operations, oldest first
    pub fn ops(&self) -> Vec<BusOp> {
        self.state.lock().map(|s| s.ops.clone()).unwrap_or_default()
    }

    pub fn clear_ops(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.ops.clear();
        }
    }

    /// Queue bytes returned by subsequent reads
    pub fn push_read_data(&self, data: &[u8]) {
        if let Ok(mut s) = self.state.lock() {
            s.read_data.extend(data.iter().copied());
        }
    }

    /// Make the next `count` transactions fail with a NACK
    pub fn fail_next(&self, count: usize) {
        if let Ok(mut s) = self.state.lock() {
            s.fail_next = count;
        }
    }

    /// Register writes only, as (register, value) pairs
    pub fn register_writes(&self) -> Vec<(u8, u8)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::Write { data, .. } if data.len() == 2 => Some((data[0], data[1])),
                _ => None,
            })
            .collect()
    }
}

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut s = self.state.lock().map_err(|_| ErrorKind::Other)?;

        if s.fail_next > 0 {
            s.fail_next -= 1;
            return Err(ErrorKind::NoAcknowledge(
                embedded_hal::i2c::NoAcknowledgeSource::Address,
            ));
        }

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => s.ops.push(BusOp::Write {
                    addr: address,
                    data: bytes.to_vec(),
                }),
                Operation::Read(buf) => {
                    s.ops.push(BusOp::Read {
                        addr: address,
                        len: buf.len(),
                    });
                    for b in buf.iter_mut() {
                        *b = s.read_data.pop_front().unwrap_or(0);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delay that only accumulates the requested time
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    total_ns: Arc<Mutex<u64>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns.lock().map(|ns| *ns / 1_000_000).unwrap_or(0)
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        if let Ok(mut total) = self.total_ns.lock() {
            *total += u64::from(ns);
        }
    }
}
