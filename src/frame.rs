use core::fmt::Debug;

use embedded_can::{Frame, Id};

use crate::idheader::IdHeader;
use crate::registers::DLC;

/// A CAN frame, laid out the same way the controller's TX/RX buffer
/// registers are (id header, DLC byte, up to 8 data bytes).
#[derive(Clone, Default, PartialEq, Eq)]
#[repr(C)]
pub struct CanFrame {
    pub(crate) id_header: IdHeader,
    pub(crate) dlc: DLC,
    pub(crate) data: [u8; 8],
}

impl CanFrame {
    /// Encodes into the 5-byte SIDH..DLC burst plus the (possibly empty)
    /// data bytes, as written to TXBnSIDH onward.
    pub(crate) fn as_tx_bytes(&self) -> ([u8; 5], &[u8]) {
        let id = self.id_header.into_bytes();
        let header = [id[0], id[1], id[2], id[3], self.dlc.into_bytes()[0]];
        (header, self.data())
    }

    /// Builds a frame from a decoded id header, DLC byte, raw data buffer
    /// (only the first `dlc` bytes are meaningful), and the remote-frame
    /// flag resolved by the caller.
    ///
    /// `is_remote` is taken as an explicit parameter rather than read back
    /// out of `dlc_byte`'s RTR bit: on real RX registers that bit is only
    /// meaningful for extended frames, standard frames signal remote via
    /// SRR in SIDL instead (§4.H). Resolving that asymmetry is the
    /// caller's job; this constructor just needs the answer so
    /// `Frame::is_remote_frame` is correct afterwards regardless of frame
    /// type.
    pub(crate) fn from_registers(
        id_header: IdHeader,
        dlc_byte: u8,
        data: [u8; 8],
        is_remote: bool,
    ) -> Self {
        let mut dlc = DLC::from_bytes([dlc_byte]);
        let len = (dlc.dlc() as usize).min(8);
        if dlc.dlc() as usize != len {
            dlc.set_dlc(len as u8);
        }
        dlc.set_rtr(is_remote);
        CanFrame {
            id_header,
            dlc,
            data,
        }
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut frame = CanFrame {
            id_header: IdHeader::from(id.into()),
            dlc: DLC::new().with_dlc(data.len() as u8),
            data: [0; 8],
        };
        frame.data[..data.len()].copy_from_slice(data);
        Some(frame)
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(CanFrame {
            id_header: IdHeader::from(id.into()),
            dlc: DLC::new().with_dlc(dlc as u8).with_rtr(true),
            data: [0; 8],
        })
    }

    #[inline]
    fn is_extended(&self) -> bool {
        self.id_header.exide()
    }

    #[inline]
    fn is_remote_frame(&self) -> bool {
        self.dlc.rtr()
    }

    fn id(&self) -> Id {
        self.id_header.id()
    }

    #[inline]
    fn dlc(&self) -> usize {
        self.dlc.dlc() as usize
    }

    #[inline]
    fn data(&self) -> &[u8] {
        &self.data[0..self.dlc().min(8)]
    }
}

impl Debug for CanFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CanFrame")
            .field(
                "id",
                match &self.id() {
                    Id::Standard(id) => id,
                    Id::Extended(id) => id,
                },
            )
            .field("is_extended", &self.is_extended())
            .field("is_remote_frame", &self.is_remote_frame())
            .field("dlc", &self.dlc())
            .field("data", &self.data())
            .finish()
    }
}

/// Acceptance-filter-hit index as reported by RXB0CTRL/RXB1CTRL.FILHIT.
pub type FilterHit = u8;

/// Whether an RXB0 frame rolled over from a full RXB0 into RXB1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RolloverStatus {
    NotOccurred,
    Occurred,
}

/// Output of reading a single RX buffer: the frame plus the buffer metadata
/// the controller reports alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub frame: CanFrame,
    pub acceptance_filter_hit: FilterHit,
    /// Only meaningful for RXB0; always `NotOccurred` for RXB1.
    pub rollover_status: RolloverStatus,
}
