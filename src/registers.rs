#![allow(unused_parens)] // FIXME: remove after https://github.com/modular-bitfield/modular-bitfield/pull/125

use modular_bitfield::prelude::*;

/// 8 bit register with a fixed address in the MCP2515's register map.
pub trait Register: From<u8> + Into<u8> {
    /// Address of the register.
    const ADDRESS: u8;
}

/// Marker trait for registers that support the `BIT MODIFY` instruction.
///
/// Registers that do not implement this are still accepted by
/// [`crate::MCP2515::modify_register`], but the controller forces the mask to
/// 0xFF for them (a full byte write) rather than honoring the supplied mask.
pub trait Modify {}

/// Receive Buffer 0 Control Register
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct RXB0CTRL {
    #[skip(setters)]
    /// Filter Hit bit (indicates which acceptance filter enabled reception of message)
    pub filhit: B1,
    #[skip(setters)]
    /// Read-Only Copy of BUKT bit (used internally)
    pub bukt1: bool,
    /// Rollover Enable
    pub bukt: bool,
    #[skip(setters)]
    /// Received Remote Transfer Request
    pub rxrtr: bool,
    #[skip]
    __: B1,
    /// Receive Buffer Operating Mode
    pub rxm: RXM,
    #[skip]
    __: B1,
}

/// Receive Buffer 1 Control Register
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct RXB1CTRL {
    #[skip(setters)]
    /// Filter Hit bits (indicates which acceptance filter enabled reception of message)
    pub filhit: B3,
    #[skip(setters)]
    /// Received Remote Transfer Request bit
    pub rxrtr: bool,
    #[skip]
    __: B1,
    /// Receive Buffer Operating Mode
    pub rxm: RXM,
    #[skip]
    __: B1,
}

/// Receive Buffer Operating Mode
///
/// Note: on the MCP2515, `0b01` and `0b10` are reserved by the datasheet and
/// must not be used.
#[derive(BitfieldSpecifier, Copy, Clone, Debug, PartialEq, Eq)]
#[bits = 2]
pub enum RXM {
    /// Receive all valid messages using either standard or extended identifiers that meet filter criteria
    Filter = 0b00,
    Reserved1 = 0b01,
    Reserved2 = 0b10,
    /// Turn mask/filters off; receive any message
    ReceiveAny = 0b11,
}

/// CAN Control Register
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct CANCTRL {
    /// CLKOUT Pin Prescaler
    pub clkpre: CLKPRE,
    /// CLKOUT Pin Enable
    pub clken: bool,
    /// One-Shot Mode
    pub osm: bool,
    /// Abort All Pending Transmissions
    pub abat: bool,
    /// Request Operation Mode
    pub reqop: OperationMode,
}

/// Request Operation mode
#[derive(BitfieldSpecifier, Copy, Clone, Debug, PartialEq, Eq)]
#[bits = 3]
pub enum OperationMode {
    NormalOperation = 0b000,
    Sleep = 0b001,
    Loopback = 0b010,
    ListenOnly = 0b011,
    Configuration = 0b100,
    Invalid1 = 0b101,
    Invalid2 = 0b110,
    Invalid3 = 0b111,
}

/// CLKOUT Pin Prescaler
#[derive(BitfieldSpecifier, Copy, Clone, Debug)]
#[bits = 2]
pub enum CLKPRE {
    SystemClockDiv1 = 0b000,
    SystemClockDiv2 = 0b001,
    SystemClockDiv4 = 0b010,
    SystemClockDiv8 = 0b011,
}

impl Default for CANCTRL {
    fn default() -> Self {
        0b1000_0111.into()
    }
}

/// CAN Status Register
///
/// Note: Read only
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct CANSTAT {
    #[skip]
    __: B1,
    /// Interrupt Flag Code
    pub icod: InterruptFlagCode,
    #[skip]
    __: B1,
    /// Operation Mode
    pub opmod: OperationMode,
}

/// Interrupt Flag Code
#[derive(BitfieldSpecifier, Copy, Clone, Debug)]
#[bits = 3]
pub enum InterruptFlagCode {
    NoInterrupt = 0b000,
    ErrorInterrupt = 0b001,
    WakeUpInterrupt = 0b010,
    TXB0Interrupt = 0b011,
    TXB1Interrupt = 0b100,
    TXB2Interrupt = 0b101,
    RXB0Interrupt = 0b110,
    RXB1Interrupt = 0b111,
}

impl Default for CANSTAT {
    fn default() -> Self {
        0b1000_0000.into()
    }
}

/// Bit-timing configuration registers (CNF1/CNF2/CNF3).
///
/// Note: write operations only take lasting effect in Configuration mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CNF {
    /// Configuration 3 Register
    pub cnf3: CNF3,
    /// Configuration 2 Register
    pub cnf2: CNF2,
    /// Configuration 1 Register
    pub cnf1: CNF1,
}

impl CNF {
    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        CNF {
            cnf3: CNF3::from_bytes([bytes[0]]),
            cnf2: CNF2::from_bytes([bytes[1]]),
            cnf1: CNF1::from_bytes([bytes[2]]),
        }
    }
    pub const fn into_bytes(self) -> [u8; 3] {
        [
            self.cnf3.into_bytes()[0],
            self.cnf2.into_bytes()[0],
            self.cnf1.into_bytes()[0],
        ]
    }
}

/// Configuration 1 Register
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CNF1 {
    /// Baud Rate Prescaler
    pub brp: B6,
    /// Synchronization Jump Width Length
    pub sjw: B2,
}

/// Configuration 2 Register
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CNF2 {
    /// Propagation Segment Length
    pub prseg: B3,
    /// PS1 Length
    pub phseg1: B3,
    /// Sample Point Configuration
    pub sam: bool,
    /// PS2 Bit Time Length configurable (BTLMODE)
    pub btlmode: bool,
}

/// Configuration 3 Register
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CNF3 {
    /// PS2 Length
    /// Note: Minimum valid setting is 1
    pub phseg2: B3,
    #[skip]
    __: B3,
    /// Wake-up Filter
    pub wakfil: bool,
    /// Start-of-Frame Signal
    pub sof: bool,
}

/// Data Length Code Register, shared layout for TX and RX buffers.
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct DLC {
    /// Data Length Code
    pub dlc: B4,
    #[skip]
    __: B2,
    /// Remote Transmission Request (TX: requested; RX: valid for extended frames)
    pub rtr: bool,
    #[skip]
    __: B1,
}

/// Transmit Buffer N Control Register (same layout for TXB0/1/2CTRL)
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct TXBNCTRL {
    /// Transmit Buffer Priority
    pub txp: B2,
    #[skip]
    __: B1,
    /// Message Transmit Request
    pub txreq: bool,
    /// Transmission Error Detected
    pub txerr: bool,
    /// Message Lost Arbitration
    pub mloa: bool,
    /// Message Aborted Flag
    pub abtf: bool,
    #[skip]
    __: B1,
}

/// Interrupt Enable Register
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct CANINTE {
    /// Receive Buffer 0 Full Interrupt Enable
    pub rx0ie: bool,
    /// Receive Buffer 1 Full Interrupt Enable
    pub rx1ie: bool,
    /// Transmit Buffer 0 Empty Interrupt Enable
    pub tx0ie: bool,
    /// Transmit Buffer 1 Empty Interrupt Enable
    pub tx1ie: bool,
    /// Transmit Buffer 2 Empty Interrupt Enable
    pub tx2ie: bool,
    /// Error Interrupt Enable (multiple sources in the [`EFLG`] register)
    pub errie: bool,
    /// Wake-up Interrupt Enable
    pub wakie: bool,
    /// Message Error Interrupt Enable
    pub merrie: bool,
}

/// Interrupt Flag Register
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct CANINTF {
    /// Receive Buffer 0 Full Interrupt Flag
    pub rx0if: bool,
    /// Receive Buffer 1 Full Interrupt Flag
    pub rx1if: bool,
    /// Transmit Buffer 0 Empty Interrupt Flag
    pub tx0if: bool,
    /// Transmit Buffer 1 Empty Interrupt Flag
    pub tx1if: bool,
    /// Transmit Buffer 2 Empty Interrupt Flag
    pub tx2if: bool,
    /// Error Interrupt Flag (multiple sources in the [`EFLG`] register)
    pub errif: bool,
    /// Wake-up Interrupt Flag
    pub wakif: bool,
    /// Message Error Interrupt Flag
    pub merrf: bool,
}

/// Error Flag Register
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct EFLG {
    /// Error Warning Flag bit
    pub ewarn: bool,
    /// Receive Error Warning Flag bit
    pub rxwar: bool,
    /// Transmit Error Warning Flag bit
    pub txwar: bool,
    /// Receive Error-Passive Flag bit
    pub rxep: bool,
    /// Transmit Error-Passive Flag bit
    pub txep: bool,
    /// Bus-Off Error Flag bit
    pub txbo: bool,
    /// Receive Buffer 0 Overflow Flag bit
    pub rx0ovr: bool,
    /// Receive Buffer 1 Overflow Flag bit
    pub rx1ovr: bool,
}

/// Transmit Error Counter Register
#[derive(Copy, Clone, Debug, Default, Ord, PartialOrd, Eq, PartialEq)]
pub struct TEC(pub u8);

impl From<u8> for TEC {
    fn from(val: u8) -> Self {
        TEC(val)
    }
}
impl From<TEC> for u8 {
    fn from(val: TEC) -> Self {
        val.0
    }
}

/// Receive Error Counter Register
#[derive(Copy, Clone, Debug, Default, Ord, PartialOrd, Eq, PartialEq)]
pub struct REC(pub u8);

impl From<u8> for REC {
    fn from(val: u8) -> Self {
        REC(val)
    }
}
impl From<REC> for u8 {
    fn from(val: REC) -> Self {
        val.0
    }
}

/// Read Status instruction response bitfield (quick-poll of TX/RX flags).
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ReadStatusResponse {
    pub rx0if: bool,
    pub rx1if: bool,
    pub txreq0: bool,
    pub tx0if: bool,
    pub txreq1: bool,
    pub tx1if: bool,
    pub txreq2: bool,
    pub tx2if: bool,
}

impl Register for RXB0CTRL {
    const ADDRESS: u8 = 0x60;
}
impl Register for RXB1CTRL {
    const ADDRESS: u8 = 0x70;
}
impl Register for CANCTRL {
    const ADDRESS: u8 = 0x0F;
}
impl Register for CANSTAT {
    const ADDRESS: u8 = 0x0E;
}
impl Register for CNF1 {
    const ADDRESS: u8 = 0x2A;
}
impl Register for CNF2 {
    const ADDRESS: u8 = 0x29;
}
impl Register for CNF3 {
    const ADDRESS: u8 = 0x28;
}
impl Register for CANINTE {
    const ADDRESS: u8 = 0x2B;
}
impl Register for CANINTF {
    const ADDRESS: u8 = 0x2C;
}
impl Register for EFLG {
    const ADDRESS: u8 = 0x2D;
}
impl Register for TEC {
    const ADDRESS: u8 = 0x1C;
}
impl Register for REC {
    const ADDRESS: u8 = 0x1D;
}

impl Modify for CANCTRL {}
impl Modify for CNF1 {}
impl Modify for CNF2 {}
impl Modify for CNF3 {}
impl Modify for TXBNCTRL {}
impl Modify for RXB0CTRL {}
impl Modify for RXB1CTRL {}
impl Modify for CANINTE {}
impl Modify for CANINTF {}
impl Modify for EFLG {}
