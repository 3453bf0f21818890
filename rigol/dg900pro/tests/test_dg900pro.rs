//! Tests for the Rigol DG900 Pro driver.

use measurements::{Frequency, test_utils::assert_almost_eq};
use rstest::*;

use amodevices::{InstrumentError, LoopbackInterfaceString};

use rigol_dg900pro::Dg900Pro;

type Dg900ProLbk = Dg900Pro<LoopbackInterfaceString>;

fn crt_inst(host2inst: Vec<&str>, inst2host: Vec<&str>) -> Dg900ProLbk {
    let host2inst = host2inst.into_iter().map(String::from).collect();
    let inst2host = inst2host.into_iter().map(String::from).collect();
    let interface = LoopbackInterfaceString::new(host2inst, inst2host, "\n");
    Dg900Pro::try_new(interface).unwrap()
}

#[fixture]
fn emp_inst() -> Dg900ProLbk {
    crt_inst(vec![], vec![])
}

#[rstest]
#[case(1, ":SOUR1:FREQ?", "1.000000000000E+06", 1e6)]
#[case(2, ":SOUR2:FREQ?", "2.5E+01", 25.0)]
fn test_get_frequency(
    #[case] channel: u8,
    #[case] cmd: &str,
    #[case] resp: &str,
    #[case] exp: f64,
) {
    let inst = crt_inst(vec![cmd], vec![resp]);
    let mut ch = inst.get_channel(channel).unwrap();
    assert_eq!(ch.channel(), channel);
    assert_almost_eq(ch.get_frequency().unwrap().as_hertz(), exp);
}

#[rstest]
#[case(1, 10e6, ":SOUR1:FREQ 10000000")]
#[case(2, 1234.5, ":SOUR2:FREQ 1234.5")]
fn test_set_frequency(#[case] channel: u8, #[case] freq: f64, #[case] cmd: &str) {
    let inst = crt_inst(vec![cmd], vec![]);
    inst.get_channel(channel)
        .unwrap()
        .set_frequency(Frequency::from_hertz(freq))
        .unwrap();
}

#[rstest]
#[case(0)]
#[case(3)]
fn test_invalid_channel(emp_inst: Dg900ProLbk, #[case] channel: u8) {
    assert!(matches!(
        emp_inst.get_channel(channel),
        Err(InstrumentError::ChannelIndexOutOfRange { nof_channels: 2, .. })
    ));
}

/// Handles of both channels share the interface.
#[rstest]
fn test_channels_share_interface() {
    let inst = crt_inst(
        vec![":SOUR1:FREQ 1000", ":SOUR2:FREQ?"],
        vec!["2000"],
    );
    let mut ch1 = inst.get_channel(1).unwrap();
    let mut ch2 = inst.clone().get_channel(2).unwrap();
    ch1.set_frequency(Frequency::from_hertz(1e3)).unwrap();
    assert_almost_eq(ch2.get_frequency().unwrap().as_hertz(), 2e3);
    inst.close();
}
