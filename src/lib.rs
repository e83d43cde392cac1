#![no_std]

use embedded_can::{Frame, Id as CanId};
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};

pub use buffers::{RxBufferId, RxResult, RxSelection, TxBufferId, TxBufferMask, TxSelection};
pub use config::{
    ControllerConfig, FilterSelector, MaskSelector, Mode, OneShotMode, RxBufferMode, Rollover,
    SamplePoint, WakeUpFilter,
};
pub use error::Error;
pub use frame::{CanFrame, FilterHit, ReceivedFrame, RolloverStatus};
pub use idheader::IdHeader;

pub mod bitrates;
mod buffers;
mod config;
mod error;
mod frame;
mod idheader;
pub mod registers;
#[doc(hidden)]
pub mod testutil;

use crate::bitrates::BaudRate;
use crate::buffers::{RXB0_DATA, RXB1_DATA, RX_BUFFERS, TX_BUFFERS};
use crate::registers::*;

/// Oscillator frequency this driver's bit-timing planner is computed for.
/// Only the MCP2515/MCP25625 wired to an 8 MHz crystal are supported.
const OSC_HZ: u32 = 8_000_000;

/// Oscillator start-up time after [`MCP2515::reset`]: 128 oscillator
/// periods, expressed in microseconds for an 8 MHz oscillator.
const OST_US: u32 = 128_000_000 / OSC_HZ;

/// Settling delay the controller needs after any complete SPI transaction;
/// the datasheet documents no minimum inter-command gap, so this covers it.
const SETTLE_US: u32 = 50;

#[repr(u8)]
enum Instruction {
    Reset = 0b1100_0000,
    Read = 0b0000_0011,
    Write = 0b0000_0010,
    BitModify = 0b0000_0101,
    ReadStatus = 0b1010_0000,
}

/// A transacted CAN controller driver over SPI.
///
/// Owns its SPI device and delay provider exclusively for the lifetime of
/// the handle; two handles never multiplex a single transport. All public
/// methods block on the SPI transport and, where the protocol calls for
/// it, on `delay`.
pub struct MCP2515<SPI, Delay> {
    spi: SPI,
    delay: Delay,
    baud_rate: BaudRate,
    one_shot_mode: OneShotMode,
    sample_point: SamplePoint,
    wake_up_filter: WakeUpFilter,
    rxb0_rollover: Rollover,
    operation_mode: Mode,
}

impl<SPI, Delay> MCP2515<SPI, Delay>
where
    SPI: SpiDevice<u8>,
    Delay: DelayNs,
{
    /// Builds a handle around an already-initialized SPI device and delay
    /// provider without touching the chip. Prefer [`MCP2515::init`] for
    /// normal use; this is mainly useful for tests and doc examples.
    pub fn from_parts(spi: SPI, delay: Delay) -> Self {
        MCP2515 {
            spi,
            delay,
            baud_rate: BaudRate::B500K,
            one_shot_mode: OneShotMode::Reattempt,
            sample_point: SamplePoint::SampledOnce,
            wake_up_filter: WakeUpFilter::Disabled,
            rxb0_rollover: Rollover::Disabled,
            operation_mode: Mode::Configuration,
        }
    }

    /// Initializes a controller handle: resets the chip, programs
    /// bit-timing, writes any requested RX buffer operating modes and
    /// masks/filters, then commits the requested operation mode.
    ///
    /// If `config.transport_selector` is not `0` or `1` (the two physical
    /// SPI instances the source hard-codes), this is a no-op: the handle
    /// is returned without a single SPI transaction having been issued,
    /// matching the "unrecognized transport selector" silent-no-op policy.
    pub fn init(spi: SPI, delay: Delay, config: &ControllerConfig<'_>) -> Result<Self, Error<SPI::Error>> {
        let mut dev = MCP2515 {
            spi,
            delay,
            baud_rate: config.baud_rate,
            one_shot_mode: config.one_shot_mode,
            sample_point: config.sample_point,
            wake_up_filter: config.wake_up_filter,
            rxb0_rollover: config.rxb0_rollover,
            operation_mode: Mode::Configuration,
        };

        if config.transport_selector > 1 {
            return Ok(dev);
        }

        dev.reset()?;
        dev.set_baud_rate(config.baud_rate)?;

        for &(selector, id) in config.masks {
            dev.set_mask(selector, id)?;
        }
        for &(selector, id) in config.filters {
            dev.set_filter(selector, id)?;
        }

        if config.rx0_mode == RxBufferMode::AcceptAny || config.rxb0_rollover == Rollover::Enabled {
            let rxb0ctrl = RXB0CTRL::new()
                .with_rxm(config.rx0_mode.to_register())
                .with_bukt(config.rxb0_rollover == Rollover::Enabled);
            dev.write_register(rxb0ctrl)?;
        }
        if config.rx1_mode == RxBufferMode::AcceptAny {
            let rxb1ctrl = RXB1CTRL::new().with_rxm(config.rx1_mode.to_register());
            dev.write_register(rxb1ctrl)?;
        }

        dev.set_operation_mode(config.operation_mode)?;
        Ok(dev)
    }

    /// Releases the underlying SPI device and delay provider.
    pub fn free(self) -> (SPI, Delay) {
        (self.spi, self.delay)
    }

    #[inline]
    fn settle(&mut self) {
        self.delay.delay_us(SETTLE_US);
    }

    /// Resets internal registers to their default state and puts the
    /// controller in configuration mode. Blocks for the instruction
    /// settling delay plus the oscillator start-up time.
    pub fn reset(&mut self) -> Result<(), Error<SPI::Error>> {
        self.spi
            .transaction(&mut [Operation::Write(&[Instruction::Reset as u8])])?;
        self.settle();
        self.delay.delay_us(OST_US);
        self.operation_mode = Mode::Configuration;
        Ok(())
    }

    /// Writes a contiguous run of registers starting at `start_addr`; the
    /// controller auto-increments the address internally.
    pub fn write_registers(&mut self, start_addr: u8, bytes: &[u8]) -> Result<(), Error<SPI::Error>> {
        self.spi.transaction(&mut [
            Operation::Write(&[Instruction::Write as u8, start_addr]),
            Operation::Write(bytes),
        ])?;
        self.settle();
        Ok(())
    }

    /// Reads `buf.len()` contiguous registers starting at `start_addr`.
    pub fn read_registers(&mut self, start_addr: u8, buf: &mut [u8]) -> Result<(), Error<SPI::Error>> {
        self.spi.transaction(&mut [
            Operation::Write(&[Instruction::Read as u8, start_addr]),
            Operation::Read(buf),
        ])?;
        self.settle();
        Ok(())
    }

    /// Bit-modify instruction. Only bit-modifiable registers honor `mask`;
    /// the controller forces a full byte write (mask 0xFF) for any other
    /// register address, so this is only issued against registers that
    /// implement [`Modify`].
    pub fn bit_modify(&mut self, addr: u8, mask: u8, value: u8) -> Result<(), Error<SPI::Error>> {
        self.spi.transaction(&mut [Operation::Write(&[
            Instruction::BitModify as u8,
            addr,
            mask,
            value,
        ])])?;
        self.settle();
        Ok(())
    }

    /// Typed read of a singleton register (one fixed address, e.g. CANCTRL
    /// or EFLG — not one of the three TX or two RX buffer banks).
    pub fn read_register<R: Register>(&mut self) -> Result<R, Error<SPI::Error>> {
        let mut buf = [0u8];
        self.read_registers(R::ADDRESS, &mut buf)?;
        Ok(R::from(buf[0]))
    }

    /// Typed full-byte write of a singleton register.
    pub fn write_register<R: Register + Into<u8>>(&mut self, reg: R) -> Result<(), Error<SPI::Error>> {
        self.write_registers(R::ADDRESS, &[reg.into()])
    }

    /// Typed bit-modify of a singleton register, using `mask` to select
    /// which bits of `reg` take effect.
    pub fn modify_register<R: Register + Modify + Into<u8>>(
        &mut self,
        reg: R,
        mask: u8,
    ) -> Result<(), Error<SPI::Error>> {
        self.bit_modify(R::ADDRESS, mask, reg.into())
    }

    /// Programs CNF1/CNF2/CNF3 for `baud_rate`, folding in the sample
    /// point and wake-up filter selected at init. Only takes lasting
    /// effect while the controller is in configuration mode.
    pub fn set_baud_rate(&mut self, baud_rate: BaudRate) -> Result<(), Error<SPI::Error>> {
        let cnf = baud_rate.cnf(self.sample_point, self.wake_up_filter);
        self.write_registers(CNF3::ADDRESS, &cnf.into_bytes())?;
        self.baud_rate = baud_rate;
        Ok(())
    }

    pub fn baud_rate(&self) -> BaudRate {
        self.baud_rate
    }

    /// Requests a mode transition via CANCTRL.REQOP, carrying the
    /// one-shot bit set at init. Does not poll CANSTAT for acknowledgment
    /// — per the documented contract, a subsequent operation only
    /// observes the mode once at least one full SPI round-trip (covered
    /// by the post-write settling delay) has elapsed.
    pub fn set_operation_mode(&mut self, mode: Mode) -> Result<(), Error<SPI::Error>> {
        let reg = CANCTRL::new()
            .with_reqop(mode.to_register())
            .with_osm(self.one_shot_mode == OneShotMode::NoReattempt);
        self.modify_register(reg, 0b1110_1000)?;
        self.operation_mode = mode;
        Ok(())
    }

    pub fn operation_mode(&self) -> Mode {
        self.operation_mode
    }

    /// Advisory for the mask/filter/bit-timing preconditions in §4.D/§4.F:
    /// the driver never blocks these calls outside configuration mode, but
    /// a caller that wants to know in advance whether a write will stick
    /// can check this first.
    pub fn would_be_ignored_in_current_mode(&self) -> bool {
        self.operation_mode != Mode::Configuration
    }

    /// Writes one of the two 29-bit RX masks.
    pub fn set_mask(&mut self, selector: MaskSelector, id: CanId) -> Result<(), Error<SPI::Error>> {
        let header = IdHeader::from(id);
        self.write_registers(selector.sidh_address(), &header.into_bytes())
    }

    /// Writes one of the six 29-bit RX filters.
    pub fn set_filter(&mut self, selector: FilterSelector, id: CanId) -> Result<(), Error<SPI::Error>> {
        let header = IdHeader::from(id);
        self.write_registers(selector.sidh_address(), &header.into_bytes())
    }

    /// Encodes and transmits every selected buffer, strictly in priority
    /// order `{TXB0, TXB1, TXB2}` — this ordering overrides the
    /// controller's own TXP priority bits. Each buffer is fully driven to
    /// completion (blocked for its worst-case on-bus duration) before the
    /// next begins.
    pub fn send(&mut self, selection: &TxSelection<'_>) -> Result<(), Error<SPI::Error>> {
        for (buffer, frame) in selection.ordered() {
            if let Some(frame) = frame {
                self.send_one(buffer, frame)?;
            }
        }
        Ok(())
    }

    fn send_one(&mut self, buffer: TxBufferId, frame: &CanFrame) -> Result<(), Error<SPI::Error>> {
        let addrs = TX_BUFFERS[buffer as usize];
        let (header, data) = frame.as_tx_bytes();
        self.write_registers(addrs.sidh, &header)?;
        if !frame.is_remote_frame() && !data.is_empty() {
            self.write_registers(addrs.d0, data)?;
        }
        self.bit_modify(addrs.ctrl, 0b0000_1000, 0b0000_1000)?; // TXREQ
        self.delay.delay_us(worst_case_on_bus_us(frame, self.baud_rate.bps()));
        Ok(())
    }

    /// Decodes TXBnCTRL into a [`TxState`]. The TXERR-AND-MLOA combination
    /// is checked before either single-flag case.
    pub fn tx_status(&mut self, buffer: TxBufferId) -> Result<TxState, Error<SPI::Error>> {
        let addrs = TX_BUFFERS[buffer as usize];
        let mut buf = [0u8];
        self.read_registers(addrs.ctrl, &mut buf)?;
        let ctrl = TXBNCTRL::from(buf[0]);
        Ok(if ctrl.abtf() {
            TxState::Aborted
        } else if ctrl.txreq() {
            if ctrl.txerr() && ctrl.mloa() {
                TxState::BusErrorAndLostArbitration
            } else if ctrl.txerr() {
                TxState::BusError
            } else if ctrl.mloa() {
                TxState::LostArbitration
            } else {
                TxState::Pending
            }
        } else {
            TxState::Success
        })
    }

    /// Clears TXREQ for each selected buffer without touching an ongoing
    /// on-bus transmission — `abort` does not cancel in-flight bits.
    pub fn abort(&mut self, buffers: TxBufferMask) -> Result<(), Error<SPI::Error>> {
        for buffer in [TxBufferId::Txb0, TxBufferId::Txb1, TxBufferId::Txb2] {
            if buffers.contains(buffer) {
                let addrs = TX_BUFFERS[buffer as usize];
                self.bit_modify(addrs.ctrl, 0b0000_1000, 0)?;
            }
        }
        Ok(())
    }

    /// Sets then clears CANCTRL.ABAT, aborting every pending transmission.
    pub fn abort_all(&mut self) -> Result<(), Error<SPI::Error>> {
        self.bit_modify(CANCTRL::ADDRESS, 0b0001_0000, 0b0001_0000)?;
        self.bit_modify(CANCTRL::ADDRESS, 0b0001_0000, 0)?;
        Ok(())
    }

    /// Reads each selected RX buffer: CTRL, SIDH/SIDL/EID8/EID0, and DLC,
    /// followed by the data bytes (if any). The RX-full interrupt flag is
    /// left untouched; clear it separately via [`MCP2515::clear_interrupts`].
    pub fn read(&mut self, selection: RxSelection) -> Result<RxResult, Error<SPI::Error>> {
        Ok(RxResult {
            rxb0: if selection.rxb0 {
                Some(self.read_rxb0()?)
            } else {
                None
            },
            rxb1: if selection.rxb1 {
                Some(self.read_rxb1()?)
            } else {
                None
            },
        })
    }

    fn read_rxb0(&mut self) -> Result<ReceivedFrame, Error<SPI::Error>> {
        let addrs = RX_BUFFERS[RxBufferId::Rxb0 as usize];
        let mut header_buf = [0u8; 6];
        self.read_registers(addrs.ctrl, &mut header_buf)?;
        let ctrl = RXB0CTRL::from(header_buf[0]);
        let id_header = IdHeader::from_bytes([
            header_buf[1],
            header_buf[2],
            header_buf[3],
            header_buf[4],
        ]);
        let dlc_byte = header_buf[5];
        let is_remote = is_remote_frame(id_header, dlc_byte);

        // BUKT (rollover enabled) AND BUKT1 (read-only rollover-occurred
        // copy) both set means this message actually landed in RXB1.
        let rollover = self.rxb0_rollover == Rollover::Enabled && ctrl.bukt() && ctrl.bukt1();

        let mut data = [0u8; 8];
        let dlc = (dlc_byte & 0x0F).min(8) as usize;
        if !is_remote && dlc > 0 {
            let data_addr = if rollover { RXB1_DATA } else { RXB0_DATA };
            self.read_registers(data_addr, &mut data[..dlc])?;
        }

        Ok(ReceivedFrame {
            frame: CanFrame::from_registers(id_header, dlc_byte, data, is_remote),
            acceptance_filter_hit: ctrl.filhit(),
            rollover_status: if rollover {
                RolloverStatus::Occurred
            } else {
                RolloverStatus::NotOccurred
            },
        })
    }

    fn read_rxb1(&mut self) -> Result<ReceivedFrame, Error<SPI::Error>> {
        let addrs = RX_BUFFERS[RxBufferId::Rxb1 as usize];
        let mut header_buf = [0u8; 6];
        self.read_registers(addrs.ctrl, &mut header_buf)?;
        let ctrl = RXB1CTRL::from(header_buf[0]);
        let id_header = IdHeader::from_bytes([
            header_buf[1],
            header_buf[2],
            header_buf[3],
            header_buf[4],
        ]);
        let dlc_byte = header_buf[5];
        let is_remote = is_remote_frame(id_header, dlc_byte);

        let mut data = [0u8; 8];
        let dlc = (dlc_byte & 0x0F).min(8) as usize;
        if !is_remote && dlc > 0 {
            // Always RXB1D0: the source's RXB1D1 read for standard data
            // frames is a documented defect that this implementation does
            // not reproduce (see DESIGN.md).
            self.read_registers(RXB1_DATA, &mut data[..dlc])?;
        }

        Ok(ReceivedFrame {
            frame: CanFrame::from_registers(id_header, dlc_byte, data, is_remote),
            acceptance_filter_hit: ctrl.filhit(),
            rollover_status: RolloverStatus::NotOccurred,
        })
    }

    /// Writes CANINTE. Bits previously enabled but absent from `mask`
    /// become disabled.
    pub fn enable_interrupts(&mut self, mask: u8) -> Result<(), Error<SPI::Error>> {
        self.write_registers(CANINTE::ADDRESS, &[mask])
    }

    /// Reads CANINTF.
    pub fn interrupt_status(&mut self) -> Result<u8, Error<SPI::Error>> {
        let mut buf = [0u8];
        self.read_registers(CANINTF::ADDRESS, &mut buf)?;
        Ok(buf[0])
    }

    /// Zeroes the selected bits of CANINTF.
    pub fn clear_interrupts(&mut self, mask: u8) -> Result<(), Error<SPI::Error>> {
        self.bit_modify(CANINTF::ADDRESS, mask, 0)
    }

    /// Reads EFLG.
    pub fn error_status(&mut self) -> Result<u8, Error<SPI::Error>> {
        let mut buf = [0u8];
        self.read_registers(EFLG::ADDRESS, &mut buf)?;
        Ok(buf[0])
    }

    /// Bit-modifies EFLG with the selected mask. Only RX1OVR and RX0OVR
    /// are actually clearable this way — the controller silently ignores
    /// the request for every other bit, which this driver does not
    /// special-case (see [`MCP2515::bit_modify`]'s contract).
    pub fn clear_errors(&mut self, mask: u8) -> Result<(), Error<SPI::Error>> {
        self.bit_modify(EFLG::ADDRESS, mask, 0)
    }

    /// Reads the transmit error counter (TEC).
    pub fn transmit_error_counter(&mut self) -> Result<u8, Error<SPI::Error>> {
        let mut buf = [0u8];
        self.read_registers(TEC::ADDRESS, &mut buf)?;
        Ok(buf[0])
    }

    /// Reads the receive error counter (REC).
    pub fn receive_error_counter(&mut self) -> Result<u8, Error<SPI::Error>> {
        let mut buf = [0u8];
        self.read_registers(REC::ADDRESS, &mut buf)?;
        Ok(buf[0])
    }

    /// Reads CANSTAT: current operation mode plus the highest-priority
    /// pending interrupt source.
    pub fn read_status(&mut self) -> Result<CANSTAT, Error<SPI::Error>> {
        self.read_register()
    }

    /// One-opcode quick poll of the TX/RX interrupt and TXREQ flags across
    /// all five buffers, via the dedicated Read Status instruction rather
    /// than a CANINTF register read.
    pub fn read_status_quick(&mut self) -> Result<ReadStatusResponse, Error<SPI::Error>> {
        let mut buf = [0u8];
        self.spi.transaction(&mut [
            Operation::Write(&[Instruction::ReadStatus as u8]),
            Operation::Read(&mut buf),
        ])?;
        self.settle();
        Ok(ReadStatusResponse::from_bytes(buf))
    }
}

/// Decodes the "is this a remote frame" bit out of a raw RX id-header and
/// DLC byte: RTR (RX-DLC bit 6) for extended frames, SRR (RX-SIDL bit 4)
/// for standard frames.
fn is_remote_frame(id_header: IdHeader, dlc_byte: u8) -> bool {
    if id_header.exide() {
        DLC::from(dlc_byte).rtr()
    } else {
        id_header.srr()
    }
}

/// Worst-case on-bus duration for a frame at `baud_bps`, computed from the
/// bit-stuffing worst case per frame type (§4.G). All five supported
/// bauds divide 1_000_000 exactly, so the per-bit time is an exact integer
/// number of microseconds.
fn worst_case_on_bus_us(frame: &CanFrame, baud_bps: u32) -> u32 {
    let bit_time_us = 1_000_000 / baud_bps;
    let dlc = frame.dlc() as u32;
    let bits = if frame.is_remote_frame() {
        if frame.is_extended() {
            73
        } else {
            50
        }
    } else if frame.is_extended() {
        8 * dlc + 64 + (53 + 8 * dlc) / 4
    } else {
        8 * dlc + 44 + (33 + 8 * dlc) / 4
    };
    bits * bit_time_us
}

/// Decoded TXBnCTRL transmit state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxState {
    Pending,
    LostArbitration,
    BusError,
    BusErrorAndLostArbitration,
    Aborted,
    Success,
}
