//! Bit-timing planner: precomputed CNF1/CNF2/CNF3 segment lengths for each
//! supported nominal bit rate, assuming an 8 MHz controller oscillator.
//!
//! Values follow the datasheet's bit-timing segment table
//! (BRP/PropSeg/PS1/PS2/SJW per rate); SAM (sample point) and
//! WAKFIL (wake-up filter) are not baked into the table since they are
//! independent, per-chip configuration choices applied when the table's
//! [`CNF`] is built via [`BaudRate::cnf`].

use crate::config::{SamplePoint, WakeUpFilter};
use crate::registers::{CNF, CNF1, CNF2, CNF3};

/// Nominal CAN bit rate, for an 8 MHz controller oscillator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BaudRate {
    B50K,
    B100K,
    B125K,
    B250K,
    B500K,
}

/// Raw register field values for one bit-timing segment table row.
/// `prop_seg`/`ps1`/`ps2`/`sjw` are already decremented by one, matching
/// the register encoding (a field value of 0 means 1 time quantum).
struct Segments {
    brp: u8,
    sjw: u8,
    prop_seg: u8,
    ps1: u8,
    ps2: u8,
}

impl BaudRate {
    const fn segments(self) -> Segments {
        // BRP, PropSeg, PS1, PS2, SJW, taken directly from the bit-timing table.
        match self {
            BaudRate::B500K => Segments {
                brp: 0,
                sjw: 0,
                prop_seg: 1,
                ps1: 1,
                ps2: 2,
            },
            BaudRate::B250K => Segments {
                brp: 0,
                sjw: 0,
                prop_seg: 3,
                ps1: 4,
                ps2: 5,
            },
            BaudRate::B125K => Segments {
                brp: 1,
                sjw: 0,
                prop_seg: 2,
                ps1: 5,
                ps2: 5,
            },
            BaudRate::B100K => Segments {
                brp: 1,
                sjw: 0,
                prop_seg: 5,
                ps1: 5,
                ps2: 6,
            },
            BaudRate::B50K => Segments {
                brp: 3,
                sjw: 0,
                prop_seg: 5,
                ps1: 5,
                ps2: 6,
            },
        }
    }

    /// Nominal bit rate in bit/s, for worst-case-duration calculations.
    pub const fn bps(self) -> u32 {
        match self {
            BaudRate::B50K => 50_000,
            BaudRate::B100K => 100_000,
            BaudRate::B125K => 125_000,
            BaudRate::B250K => 250_000,
            BaudRate::B500K => 500_000,
        }
    }

    /// Builds the full CNF1/CNF2/CNF3 register set for this bit rate,
    /// folding in the per-chip sample point and wake-up filter selection.
    /// CNF2.BTLMODE is always set, matching the documented contract that
    /// PS2 length is explicitly configured rather than auto-computed.
    pub fn cnf(self, sample_point: SamplePoint, wake_up_filter: WakeUpFilter) -> CNF {
        let s = self.segments();
        CNF {
            cnf1: CNF1::new().with_brp(s.brp).with_sjw(s.sjw),
            cnf2: CNF2::new()
                .with_prseg(s.prop_seg)
                .with_phseg1(s.ps1)
                .with_sam(sample_point == SamplePoint::SampledThreeTimes)
                .with_btlmode(true),
            cnf3: CNF3::new()
                .with_phseg2(s.ps2)
                .with_wakfil(wake_up_filter == WakeUpFilter::Enabled),
        }
    }
}
