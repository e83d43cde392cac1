use mcp2515::bitrates::BaudRate;
use mcp2515::registers::CNF;

const RATES: [(BaudRate, u32); 5] = [
    (BaudRate::B50K, 50_000),
    (BaudRate::B100K, 100_000),
    (BaudRate::B125K, 125_000),
    (BaudRate::B250K, 250_000),
    (BaudRate::B500K, 500_000),
];

/// Recomputes the nominal bit rate from the CNF bytes `BaudRate::cnf`
/// actually emits, independent of `BaudRate::bps`'s own arithmetic, so a
/// typo in one doesn't get masked by the same typo in the other.
fn bitrate_from_cnf(cnf: CNF) -> f64 {
    let brp = cnf.cnf1.brp() as f64 + 1.0;
    let prseg = cnf.cnf2.prseg() as f64 + 1.0;
    let phseg1 = cnf.cnf2.phseg1() as f64 + 1.0;
    let phseg2 = cnf.cnf3.phseg2() as f64 + 1.0;
    let tq = 2.0 * brp / 8_000_000.0;
    let tq_per_bit = 1.0 + prseg + phseg1 + phseg2;
    1.0 / (tq_per_bit * tq)
}

#[test]
fn cnf_bytes_reproduce_the_named_bit_rate() {
    for (rate, nominal) in RATES {
        let cnf = rate.cnf(
            mcp2515::SamplePoint::SampledOnce,
            mcp2515::WakeUpFilter::Disabled,
        );
        let computed = bitrate_from_cnf(cnf);
        let error = (computed - nominal as f64).abs() / nominal as f64;
        assert!(
            error < 1e-9,
            "{:?}: expected {} bps, computed {} bps",
            rate,
            nominal,
            computed
        );
        assert_eq!(rate.bps(), nominal);
    }
}

#[test]
fn phase_segments_respect_the_one_tq_sjw() {
    for (rate, _) in RATES {
        let cnf = rate.cnf(
            mcp2515::SamplePoint::SampledThreeTimes,
            mcp2515::WakeUpFilter::Enabled,
        );
        let sjw = cnf.cnf1.sjw() as usize + 1;
        let phseg1 = cnf.cnf2.phseg1() as usize + 1;
        let phseg2 = cnf.cnf3.phseg2() as usize + 1;
        assert!(phseg1 >= sjw);
        assert!(phseg2 >= sjw);
    }
}
