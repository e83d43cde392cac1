//! No-op SPI/delay implementations used by doc tests and unit tests.
//!
//! Kept public (but hidden from docs) so downstream integration tests and
//! doc examples can build an [`crate::MCP2515`] without a real bus.
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};

use crate::MCP2515;

/// used for docs tests
pub fn get_mcp2515() -> MCP2515<NoOpSpi, NoOpDelay> {
    MCP2515::from_parts(NoOpSpi, NoOpDelay)
}

pub struct NoOpSpi;
pub struct NoOpDelay;

impl ErrorType for NoOpSpi {
    type Error = Infallible;
}

impl SpiDevice<u8> for NoOpSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        for op in operations {
            if let Operation::Read(buf) = op {
                buf.fill(0);
            }
        }
        Ok(())
    }
}

impl DelayNs for NoOpDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
