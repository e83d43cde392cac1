/// Error type for every fallible operation on [`crate::MCP2515`].
///
/// Per the driver's error taxonomy, the transport is assumed infallible at
/// the protocol layer: invalid configuration is a silent no-op and
/// bus-level CAN errors surface through status registers, not as
/// `Result::Err`. The only thing that can actually fail here is the
/// underlying SPI transaction itself.
#[derive(Debug)]
pub enum Error<E> {
    /// The SPI transport reported a bus error.
    Transport(E),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Transport(e)
    }
}
