//! In-process stand-in for the PS2 connector.
//!
//! Backs memory with a sparse byte map (unset bytes read as zero, like
//! freshly cleared RAM) and can be told to fail reads or writes, either
//! globally or for individual addresses.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::StatePort;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct SimulatedPort {
    memory: Mutex<HashMap<u64, u8>>,
    failing: Mutex<HashSet<u64>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl SimulatedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SimulatedPortBuilder {
        SimulatedPortBuilder::default()
    }

    /// Make every read fail until cleared
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail until cleared
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make any access touching `address` fail
    pub fn fail_address(&self, address: u64) {
        lock(&self.failing).insert(address);
    }

    pub fn heal_address(&self, address: u64) {
        lock(&self.failing).remove(&address);
    }

    /// Number of successful reads so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw view of memory, bypassing failure injection and counters
    pub fn peek(&self, address: u64, size: usize) -> Vec<u8> {
        let memory = lock(&self.memory);
        (0..size as u64)
            .map(|i| memory.get(&(address + i)).copied().unwrap_or(0))
            .collect()
    }

    pub fn peek_u16(&self, address: u64) -> u16 {
        let b = self.peek(address, 2);
        u16::from_le_bytes([b[0], b[1]])
    }

    pub fn peek_u32(&self, address: u64) -> u32 {
        let b = self.peek(address, 4);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Raw store, bypassing failure injection and counters
    pub fn poke(&self, address: u64, bytes: &[u8]) {
        let mut memory = lock(&self.memory);
        for (i, b) in bytes.iter().enumerate() {
            memory.insert(address + i as u64, *b);
        }
    }

    fn touches_failing(&self, address: u64, size: usize) -> bool {
        let failing = lock(&self.failing);
        !failing.is_empty() && (0..size as u64).any(|i| failing.contains(&(address + i)))
    }
}

impl StatePort for SimulatedPort {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        if self.fail_reads.load(Ordering::SeqCst) || self.touches_failing(address, size) {
            return Err(Error::MemoryReadFailed {
                address,
                message: "simulated read failure".to_string(),
            });
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.peek(address, size))
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) || self.touches_failing(address, bytes.len()) {
            return Err(Error::MemoryWriteFailed {
                address,
                message: "simulated write failure".to_string(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.poke(address, bytes);
        Ok(())
    }
}

/// Builder for seeding a [`SimulatedPort`] with known values
#[derive(Debug, Default)]
pub struct SimulatedPortBuilder {
    memory: HashMap<u64, u8>,
}

impl SimulatedPortBuilder {
    pub fn write_bytes(mut self, address: u64, bytes: &[u8]) -> Self {
        for (i, b) in bytes.iter().enumerate() {
            self.memory.insert(address + i as u64, *b);
        }
        self
    }

    pub fn write_u8(self, address: u64, value: u8) -> Self {
        self.write_bytes(address, &[value])
    }

    pub fn write_u16(self, address: u64, value: u16) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_u32(self, address: u64, value: u32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_u64(self, address: u64, value: u64) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn build(self) -> SimulatedPort {
        SimulatedPort {
            memory: Mutex::new(self.memory),
            ..SimulatedPort::default()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
