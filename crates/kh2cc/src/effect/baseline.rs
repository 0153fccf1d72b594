//! Values an effect captures at start so that stop can put them back.

use std::collections::{BTreeMap, HashMap};

use crate::effect::Steps;
use crate::error::Result;
use crate::port::StatePort;

/// A word of game memory as it was before an effect touched it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl Word {
    pub fn as_u64(self) -> u64 {
        match self {
            Word::U8(v) => v as u64,
            Word::U16(v) => v as u64,
            Word::U32(v) => v as u64,
            Word::U64(v) => v,
        }
    }

    fn write_to(self, port: &dyn StatePort, address: u64) -> Result<()> {
        match self {
            Word::U8(v) => port.write_u8(address, v),
            Word::U16(v) => port.write_u16(address, v),
            Word::U32(v) => port.write_u32(address, v),
            Word::U64(v) => port.write_u64(address, v),
        }
    }
}

/// Snapshot owned by a single effect instance.
///
/// The first capture of an address wins: a `start` hook that is retried after
/// a partial failure must not overwrite the original value with one it
/// already modified.
#[derive(Debug, Default)]
pub struct Baseline {
    words: BTreeMap<u64, Word>,
    marks: HashMap<&'static str, u64>,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture_u8(&mut self, port: &dyn StatePort, address: u64) -> Result<u8> {
        if let Some(word) = self.words.get(&address) {
            return Ok(word.as_u64() as u8);
        }
        let value = port.read_u8(address)?;
        self.words.insert(address, Word::U8(value));
        Ok(value)
    }

    pub fn capture_u16(&mut self, port: &dyn StatePort, address: u64) -> Result<u16> {
        if let Some(word) = self.words.get(&address) {
            return Ok(word.as_u64() as u16);
        }
        let value = port.read_u16(address)?;
        self.words.insert(address, Word::U16(value));
        Ok(value)
    }

    pub fn capture_u32(&mut self, port: &dyn StatePort, address: u64) -> Result<u32> {
        if let Some(word) = self.words.get(&address) {
            return Ok(word.as_u64() as u32);
        }
        let value = port.read_u32(address)?;
        self.words.insert(address, Word::U32(value));
        Ok(value)
    }

    pub fn capture_u64(&mut self, port: &dyn StatePort, address: u64) -> Result<u64> {
        if let Some(word) = self.words.get(&address) {
            return Ok(word.as_u64());
        }
        let value = port.read_u64(address)?;
        self.words.insert(address, Word::U64(value));
        Ok(value)
    }

    pub fn get(&self, address: u64) -> Option<Word> {
        self.words.get(&address).copied()
    }

    /// Remember a scalar that is not a memory word (e.g. a slot address)
    pub fn set_mark(&mut self, name: &'static str, value: u64) {
        self.marks.insert(name, value);
    }

    pub fn mark(&self, name: &str) -> Option<u64> {
        self.marks.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.marks.is_empty()
    }

    /// Write every captured word back, recording one step per address.
    ///
    /// Nothing captured means nothing to restore, which counts as success.
    pub fn restore(&self, port: &dyn StatePort, steps: &mut Steps) {
        for (address, word) in &self.words {
            steps.check(
                format!("restore {:#x}", address),
                word.write_to(port, *address),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SimulatedPort;

    #[test]
    fn test_first_capture_wins() {
        let port = SimulatedPort::builder().write_u32(0x100, 42).build();
        let mut baseline = Baseline::new();

        assert_eq!(baseline.capture_u32(&port, 0x100).unwrap(), 42);
        port.write_u32(0x100, 999).unwrap();
        assert_eq!(baseline.capture_u32(&port, 0x100).unwrap(), 42);
        assert_eq!(baseline.get(0x100), Some(Word::U32(42)));
    }

    #[test]
    fn test_failed_capture_stores_nothing() {
        let port = SimulatedPort::new();
        port.set_fail_reads(true);
        let mut baseline = Baseline::new();

        assert!(baseline.capture_u16(&port, 0x100).is_err());
        assert!(baseline.is_empty());
    }

    #[test]
    fn test_restore_writes_each_word() {
        let port = SimulatedPort::builder()
            .write_u8(0x10, 7)
            .write_u16(0x20, 0x8001)
            .build();
        let mut baseline = Baseline::new();
        baseline.capture_u8(&port, 0x10).unwrap();
        baseline.capture_u16(&port, 0x20).unwrap();
        port.write_u8(0x10, 0).unwrap();
        port.write_u16(0x20, 0).unwrap();

        let mut steps = Steps::new("test", "stop");
        baseline.restore(&port, &mut steps);

        assert!(steps.finish());
        assert_eq!(port.peek(0x10, 1), vec![7]);
        assert_eq!(port.peek_u16(0x20), 0x8001);
    }

    #[test]
    fn test_restore_keeps_going_after_failure() {
        let port = SimulatedPort::builder()
            .write_u8(0x10, 1)
            .write_u8(0x20, 2)
            .build();
        let mut baseline = Baseline::new();
        baseline.capture_u8(&port, 0x10).unwrap();
        baseline.capture_u8(&port, 0x20).unwrap();
        port.write_u8(0x20, 0).unwrap();
        port.fail_address(0x10);

        let mut steps = Steps::new("test", "stop");
        baseline.restore(&port, &mut steps);

        assert_eq!(steps.failures().count(), 1);
        assert!(!steps.finish());
        assert_eq!(port.peek(0x20, 1), vec![2]);
    }

    #[test]
    fn test_marks() {
        let mut baseline = Baseline::new();
        baseline.set_mark("slot", 0x2032_E100);
        assert_eq!(baseline.mark("slot"), Some(0x2032_E100));
        assert_eq!(baseline.mark("other"), None);
    }
}
