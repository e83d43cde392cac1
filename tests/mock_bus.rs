use embedded_hal_mock::eh1::spi::{Mock, Transaction};

use mcp2515::testutil::NoOpDelay;
use mcp2515::MCP2515;

/// Builds a handle around a scripted SPI transaction sequence and a no-op
/// delay, so tests run instantly instead of blocking on real microsecond
/// delays.
pub fn scripted(transactions: &[Transaction<u8>]) -> MCP2515<Mock<u8>, NoOpDelay> {
    MCP2515::from_parts(Mock::new(transactions), NoOpDelay)
}

pub fn done(mcp2515: MCP2515<Mock<u8>, NoOpDelay>) {
    let (mut spi, _delay) = mcp2515.free();
    spi.done();
}
