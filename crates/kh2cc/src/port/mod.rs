//! Access to the game's memory through the host-supplied connector.
//!
//! The connector itself lives outside this crate; effects only ever see the
//! [`StatePort`] trait. Every call is fallible and a failure is a transient
//! condition for the caller to log and retry, never a fatal one.

mod simulated;

pub use simulated::{SimulatedPort, SimulatedPortBuilder};

use crate::error::{Error, Result};

/// Typed little-endian reads and writes against the game's address space.
///
/// Implementors only provide the raw byte access; the typed helpers decode
/// PS2 little-endian words on top of it.
pub trait StatePort: Send + Sync {
    /// Read `size` bytes starting at `address`
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Write `bytes` starting at `address`
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()>;

    fn read_u8(&self, address: u64) -> Result<u8> {
        let buf: [u8; 1] = read_array(self, address)?;
        Ok(buf[0])
    }

    fn read_u16(&self, address: u64) -> Result<u16> {
        Ok(u16::from_le_bytes(read_array(self, address)?))
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        Ok(u32::from_le_bytes(read_array(self, address)?))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(read_array(self, address)?))
    }

    fn write_u8(&self, address: u64, value: u8) -> Result<()> {
        self.write_bytes(address, &[value])
    }

    fn write_u16(&self, address: u64, value: u16) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_u32(&self, address: u64, value: u32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_u64(&self, address: u64, value: u64) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_f32(&self, address: u64, value: f32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }
}

/// Read exactly `N` bytes, rejecting short reads from the connector.
fn read_array<const N: usize, P: StatePort + ?Sized>(port: &P, address: u64) -> Result<[u8; N]> {
    let bytes = port.read_bytes(address, N)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::MemoryReadFailed {
            address,
            message: format!("short read: expected {} bytes, got {}", N, bytes.len()),
        })
}
