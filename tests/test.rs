mod mock_bus;

use embedded_hal_mock::eh1::spi::Transaction;
use mock_bus::{done, scripted};

use embedded_can::{ExtendedId, Frame, Id, StandardId};
use mcp2515::bitrates::BaudRate;
use mcp2515::registers::{
    Register, CANCTRL, CANINTE, CANINTF, CANSTAT, CNF3, EFLG, REC, TEC,
};
use mcp2515::{
    CanFrame, FilterSelector, MaskSelector, Mode, RxSelection, TxBufferId, TxBufferMask,
    TxSelection, TxState,
};

const RESET: u8 = 0xC0;
const READ: u8 = 0x03;
const WRITE: u8 = 0x02;
const BIT_MODIFY: u8 = 0x05;

#[test]
fn reset_issues_single_opcode() {
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![RESET]),
        Transaction::transaction_end(),
    ]);
    mcp.reset().unwrap();
    done(mcp);
}

#[test]
fn set_operation_mode_bit_modifies_canctrl() {
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, CANCTRL::ADDRESS, 0b1110_1000, 0b1000_0000]),
        Transaction::transaction_end(),
    ]);
    mcp.set_operation_mode(Mode::Configuration).unwrap();
    assert_eq!(mcp.operation_mode(), Mode::Configuration);
    done(mcp);
}

#[test]
fn set_baud_rate_writes_cnf_burst() {
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![WRITE, CNF3::ADDRESS]),
        // CNF3, CNF2, CNF1 for 500 kbit/s: PropSeg=2,PS1=2,PS2=3,SJW=1,BRP=0, SAM=once, WAKFIL=off.
        Transaction::write_vec(vec![0b0000_0010, 0b1000_1001, 0b0000_0000]),
        Transaction::transaction_end(),
    ]);
    mcp.set_baud_rate(BaudRate::B500K).unwrap();
    assert_eq!(mcp.baud_rate(), BaudRate::B500K);
    done(mcp);
}

#[test]
fn set_filter_writes_four_byte_burst() {
    let filter0 = FilterSelector::Filter0;
    let id = Id::Standard(StandardId::new(0x555).unwrap());
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![WRITE, 0x00]),
        Transaction::write_vec(vec![0xAA, 0xA0, 0x00, 0x00]),
        Transaction::transaction_end(),
    ]);
    mcp.set_filter(filter0, id).unwrap();
    done(mcp);
}

#[test]
fn set_mask_writes_mask1() {
    let id = Id::Extended(ExtendedId::new(0x1FFF_FFFF).unwrap());
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![WRITE, 0x24]),
        // SIDH=0xFF, SIDL=0xEB (bits 7:5 and 1:0 from the id, bit3 EXIDE set,
        // bit2 unused, bit4 untouched), EID8=0xFF, EID0=0xFF.
        Transaction::write_vec(vec![0xFF, 0xEB, 0xFF, 0xFF]),
        Transaction::transaction_end(),
    ]);
    mcp.set_mask(MaskSelector::Mask1, id).unwrap();
    done(mcp);
}

#[test]
fn send_std_data_frame_on_txb0() {
    let frame = CanFrame::new(Id::Standard(StandardId::new(0x555).unwrap()), &[0x0D, 0xD0])
        .unwrap();
    let mut selection = TxSelection::default();
    selection.txb0 = Some(&frame);

    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![WRITE, 0x31]),
        // SIDH, SIDL, EID8, EID0, DLC for std id 0x555 dlc=2.
        Transaction::write_vec(vec![0xAA, 0xA0, 0x00, 0x00, 0x02]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![WRITE, 0x36]),
        Transaction::write_vec(vec![0x0D, 0xD0]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, 0x30, 0b0000_1000, 0b0000_1000]),
        Transaction::transaction_end(),
    ]);
    mcp.send(&selection).unwrap();
    done(mcp);
}

#[test]
fn send_skips_data_burst_for_remote_frame() {
    let frame = CanFrame::new_remote(Id::Extended(ExtendedId::new(0x34D).unwrap()), 8).unwrap();
    let mut selection = TxSelection::default();
    selection.txb2 = Some(&frame);

    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![WRITE, 0x51]),
        // SIDH, SIDL, EID8, EID0, DLC for ext id 0x34D, dlc=8, RTR set.
        Transaction::write_vec(vec![0x00, 0x08, 0x03, 0x4D, 0b0100_1000]),
        Transaction::transaction_end(),
        // no data burst for a remote frame
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, 0x50, 0b0000_1000, 0b0000_1000]),
        Transaction::transaction_end(),
    ]);
    mcp.send(&selection).unwrap();
    done(mcp);
}

#[test]
fn tx_status_decodes_success() {
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, 0x30]),
        Transaction::read_vec(vec![0x00]),
        Transaction::transaction_end(),
    ]);
    assert_eq!(mcp.tx_status(TxBufferId::Txb0).unwrap(), TxState::Success);
    done(mcp);
}

#[test]
fn tx_status_prioritizes_txerr_and_mloa_combination() {
    // TXREQ | TXERR | MLOA all set.
    let byte = 0b0011_1000;
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, 0x30]),
        Transaction::read_vec(vec![byte]),
        Transaction::transaction_end(),
    ]);
    assert_eq!(
        mcp.tx_status(TxBufferId::Txb0).unwrap(),
        TxState::BusErrorAndLostArbitration
    );
    done(mcp);
}

#[test]
fn abort_clears_txreq_for_selected_buffers_only() {
    let mask = TxBufferMask {
        txb0: true,
        txb1: false,
        txb2: true,
    };
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, 0x30, 0b0000_1000, 0]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, 0x50, 0b0000_1000, 0]),
        Transaction::transaction_end(),
    ]);
    mcp.abort(mask).unwrap();
    done(mcp);
}

#[test]
fn abort_all_sets_then_clears_abat() {
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, CANCTRL::ADDRESS, 0b0001_0000, 0b0001_0000]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, CANCTRL::ADDRESS, 0b0001_0000, 0]),
        Transaction::transaction_end(),
    ]);
    mcp.abort_all().unwrap();
    done(mcp);
}

#[test]
fn read_rxb0_std_data_frame_no_rollover() {
    // S1: std id 0x555, dlc=2, data [0x0D, 0xD0], filhit=0.
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, 0x60]),
        Transaction::read_vec(vec![0x00, 0xAA, 0xA0, 0x00, 0x00, 0x02]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, 0x66]),
        Transaction::read_vec(vec![0x0D, 0xD0]),
        Transaction::transaction_end(),
    ]);
    let result = mcp
        .read(RxSelection {
            rxb0: true,
            rxb1: false,
        })
        .unwrap();
    let received = result.rxb0.unwrap();
    assert!(!received.frame.is_extended());
    assert_eq!(received.frame.id(), Id::Standard(StandardId::new(0x555).unwrap()));
    assert_eq!(received.frame.data(), &[0x0D, 0xD0]);
    assert_eq!(received.acceptance_filter_hit, 0);
    assert_eq!(
        received.rollover_status,
        mcp2515::RolloverStatus::NotOccurred
    );
    assert!(result.rxb1.is_none());
    done(mcp);
}

#[test]
fn read_rxb0_rollover_reads_data_from_rxb1() {
    use embedded_hal_mock::eh1::spi::Mock;
    use mcp2515::testutil::NoOpDelay;
    use mcp2515::{ControllerConfig, MCP2515};

    let config = ControllerConfig {
        rxb0_rollover: mcp2515::Rollover::Enabled,
        operation_mode: Mode::Configuration,
        ..ControllerConfig::default()
    };

    // BUKT=1, BUKT1=1 (bits 2 and 1 of CTRL byte): rollover occurred.
    let ctrl_byte = 0b0000_0110;
    let spi = Mock::new(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![RESET]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![WRITE, CNF3::ADDRESS]),
        Transaction::write_vec(vec![0b0000_0010, 0b1000_1001, 0b0000_0000]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![WRITE, 0x60]),
        Transaction::write_vec(vec![0b0000_0100]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, CANCTRL::ADDRESS, 0b1110_1000, 0b1000_0000]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, 0x60]),
        Transaction::read_vec(vec![ctrl_byte, 0xAA, 0xA0, 0x00, 0x00, 0x01]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, 0x76]),
        Transaction::read_vec(vec![0x7F]),
        Transaction::transaction_end(),
    ]);
    let mut mcp = MCP2515::init(spi, NoOpDelay, &config).unwrap();

    let result = mcp
        .read(RxSelection {
            rxb0: true,
            rxb1: false,
        })
        .unwrap();
    let received = result.rxb0.unwrap();
    assert_eq!(received.frame.data(), &[0x7F]);
    assert_eq!(received.rollover_status, mcp2515::RolloverStatus::Occurred);
    let (mut spi, _delay) = mcp.free();
    spi.done();
}

#[test]
fn interrupt_and_error_facade_round_trip() {
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![WRITE, CANINTE::ADDRESS]),
        Transaction::write_vec(vec![0b0000_0011]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, CANINTF::ADDRESS]),
        Transaction::read_vec(vec![0b0000_0001]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, CANINTF::ADDRESS, 0b0000_0001, 0]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, EFLG::ADDRESS]),
        Transaction::read_vec(vec![0b0100_0000]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, EFLG::ADDRESS, 0b0100_0000, 0]),
        Transaction::transaction_end(),
    ]);
    mcp.enable_interrupts(0b0000_0011).unwrap();
    assert_eq!(mcp.interrupt_status().unwrap(), 0b0000_0001);
    mcp.clear_interrupts(0b0000_0001).unwrap();
    assert_eq!(mcp.error_status().unwrap(), 0b0100_0000);
    mcp.clear_errors(0b0100_0000).unwrap();
    done(mcp);
}

#[test]
fn error_counters_and_status_reads() {
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, TEC::ADDRESS]),
        Transaction::read_vec(vec![136]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, REC::ADDRESS]),
        Transaction::read_vec(vec![0]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![READ, CANSTAT::ADDRESS]),
        Transaction::read_vec(vec![0b1000_0000]),
        Transaction::transaction_end(),
        Transaction::transaction_start(),
        Transaction::write_vec(vec![0xA0]),
        Transaction::read_vec(vec![0b0000_0001]),
        Transaction::transaction_end(),
    ]);
    assert_eq!(mcp.transmit_error_counter().unwrap(), 136);
    assert_eq!(mcp.receive_error_counter().unwrap(), 0);
    assert_eq!(
        mcp.read_status().unwrap().opmod(),
        mcp2515::registers::OperationMode::Configuration
    );
    assert!(mcp.read_status_quick().unwrap().rx0if());
    done(mcp);
}

#[test]
fn would_be_ignored_reflects_operation_mode() {
    let mut mcp = scripted(&[
        Transaction::transaction_start(),
        Transaction::write_vec(vec![BIT_MODIFY, CANCTRL::ADDRESS, 0b1110_1000, 0b0000_0000]),
        Transaction::transaction_end(),
    ]);
    assert!(!mcp.would_be_ignored_in_current_mode()); // starts in Configuration
    mcp.set_operation_mode(Mode::Normal).unwrap();
    assert!(mcp.would_be_ignored_in_current_mode());
    done(mcp);
}
