//! Init-time configuration: the handle's immutable properties (baud rate,
//! one-shot mode, sample point, wake-up filter, RX buffer operating modes,
//! RXB0 rollover, target operation mode) plus the masks/filters to program
//! while the controller is still in configuration mode after reset.

use embedded_can::Id as CanId;

use crate::bitrates::BaudRate;
use crate::registers::{OperationMode, RXM};

/// Target operation mode, as written to CANCTRL.REQOP.
///
/// Unlike [`crate::registers::OperationMode`] (which must cover all eight
/// 3-bit patterns to satisfy `modular_bitfield`'s `Specifier` contract),
/// this enum only has the five modes the controller actually documents —
/// "mode outside the five enumerated values" is unrepresentable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Sleep,
    Loopback,
    ListenOnly,
    Configuration,
}

impl Mode {
    pub(crate) fn to_register(self) -> OperationMode {
        match self {
            Mode::Normal => OperationMode::NormalOperation,
            Mode::Sleep => OperationMode::Sleep,
            Mode::Loopback => OperationMode::Loopback,
            Mode::ListenOnly => OperationMode::ListenOnly,
            Mode::Configuration => OperationMode::Configuration,
        }
    }
}

/// Whether the controller reattempts transmission automatically after
/// losing arbitration or a bus error (CANCTRL.OSM).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OneShotMode {
    Reattempt,
    NoReattempt,
}

/// Bit sample point: once per bit, or three times with majority vote
/// (CNF2.SAM).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SamplePoint {
    SampledOnce,
    SampledThreeTimes,
}

/// CNF3.WAKFIL: filter applied to the wake-up signal on the CAN bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WakeUpFilter {
    Disabled,
    Enabled,
}

/// Per-RX-buffer acceptance behavior (RXB0CTRL.RXM / RXB1CTRL.RXM).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RxBufferMode {
    AcceptFiltered,
    AcceptAny,
}

impl RxBufferMode {
    pub(crate) fn to_register(self) -> RXM {
        match self {
            RxBufferMode::AcceptFiltered => RXM::Filter,
            RxBufferMode::AcceptAny => RXM::ReceiveAny,
        }
    }
}

/// RXB0CTRL.BUKT: on RXB0 overflow, spill the message into RXB1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rollover {
    Disabled,
    Enabled,
}

/// Selects which of the two mask registers a write targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaskSelector {
    /// Governs RX buffer 0.
    Mask0,
    /// Governs RX buffer 1.
    Mask1,
}

impl MaskSelector {
    pub(crate) fn sidh_address(self) -> u8 {
        match self {
            MaskSelector::Mask0 => 0x20,
            MaskSelector::Mask1 => 0x24,
        }
    }
}

/// Selects which of the six filter registers a write targets. Filters 0-1
/// apply to RX buffer 0; filters 2-5 apply to RX buffer 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterSelector {
    Filter0,
    Filter1,
    Filter2,
    Filter3,
    Filter4,
    Filter5,
}

impl FilterSelector {
    pub(crate) fn sidh_address(self) -> u8 {
        match self {
            FilterSelector::Filter0 => 0x00,
            FilterSelector::Filter1 => 0x04,
            FilterSelector::Filter2 => 0x08,
            FilterSelector::Filter3 => 0x10,
            FilterSelector::Filter4 => 0x14,
            FilterSelector::Filter5 => 0x18,
        }
    }
}

/// Init-time configuration for one controller handle.
///
/// `transport_selector` stands in for "which of the host's SPI instances
/// backs this chip" (the source hard-codes two); since the transport is
/// bound generically through the `SPI` type parameter rather than chosen
/// at runtime, the selector's only remaining role is the "unrecognized
/// selector" no-op guard `init` applies, so only `0` and `1` are
/// recognized.
pub struct ControllerConfig<'a> {
    pub transport_selector: u8,
    pub baud_rate: BaudRate,
    pub one_shot_mode: OneShotMode,
    pub sample_point: SamplePoint,
    pub wake_up_filter: WakeUpFilter,
    pub rx0_mode: RxBufferMode,
    pub rx1_mode: RxBufferMode,
    pub rxb0_rollover: Rollover,
    pub operation_mode: Mode,
    pub masks: &'a [(MaskSelector, CanId)],
    pub filters: &'a [(FilterSelector, CanId)],
}

impl<'a> Default for ControllerConfig<'a> {
    fn default() -> Self {
        ControllerConfig {
            transport_selector: 0,
            baud_rate: BaudRate::B500K,
            one_shot_mode: OneShotMode::Reattempt,
            sample_point: SamplePoint::SampledOnce,
            wake_up_filter: WakeUpFilter::Disabled,
            rx0_mode: RxBufferMode::AcceptFiltered,
            rx1_mode: RxBufferMode::AcceptFiltered,
            rxb0_rollover: Rollover::Disabled,
            operation_mode: Mode::Normal,
            masks: &[],
            filters: &[],
        }
    }
}

impl<'a> ControllerConfig<'a> {
    pub fn transport_selector(&mut self, selector: u8) -> &mut Self {
        self.transport_selector = selector;
        self
    }
    pub fn baud_rate(&mut self, baud_rate: BaudRate) -> &mut Self {
        self.baud_rate = baud_rate;
        self
    }
    pub fn one_shot_mode(&mut self, mode: OneShotMode) -> &mut Self {
        self.one_shot_mode = mode;
        self
    }
    pub fn sample_point(&mut self, sample_point: SamplePoint) -> &mut Self {
        self.sample_point = sample_point;
        self
    }
    pub fn wake_up_filter(&mut self, wake_up_filter: WakeUpFilter) -> &mut Self {
        self.wake_up_filter = wake_up_filter;
        self
    }
    pub fn rx0_mode(&mut self, mode: RxBufferMode) -> &mut Self {
        self.rx0_mode = mode;
        self
    }
    pub fn rx1_mode(&mut self, mode: RxBufferMode) -> &mut Self {
        self.rx1_mode = mode;
        self
    }
    pub fn rxb0_rollover(&mut self, rollover: Rollover) -> &mut Self {
        self.rxb0_rollover = rollover;
        self
    }
    pub fn operation_mode(&mut self, mode: Mode) -> &mut Self {
        self.operation_mode = mode;
        self
    }
    pub fn masks(&mut self, masks: &'a [(MaskSelector, CanId)]) -> &mut Self {
        self.masks = masks;
        self
    }
    pub fn filters(&mut self, filters: &'a [(FilterSelector, CanId)]) -> &mut Self {
        self.filters = filters;
        self
    }
}
