//! Tests for the Keysight 53220A driver.

use std::time::Duration;

use measurements::{Voltage, test_utils::assert_almost_eq};
use rstest::*;

use amodevices::{InstrumentError, LoopbackInterfaceString};

use keysight_counter_53220a::{Counter53220a, Slope};

type CounterLbk = Counter53220a<LoopbackInterfaceString>;

fn crt_inst(host2inst: Vec<&str>, inst2host: Vec<&str>) -> CounterLbk {
    let host2inst = host2inst.into_iter().map(String::from).collect();
    let inst2host = inst2host.into_iter().map(String::from).collect();
    let interface = LoopbackInterfaceString::new(host2inst, inst2host, "\n");
    Counter53220a::try_new(interface).unwrap()
}

#[fixture]
fn emp_inst() -> CounterLbk {
    crt_inst(vec![], vec![])
}

#[rstest]
#[case(1)]
#[case(2)]
fn test_input_level(#[case] channel: u8) {
    let get_cmd = format!("INPut{channel}:LEVel?");
    let set_cmd = format!("INPut{channel}:LEVel -0.25");
    let inst = crt_inst(vec![&get_cmd, &set_cmd], vec!["+1.00000000000000E-001"]);
    let mut inp = inst.input(channel).unwrap();
    assert_almost_eq(inp.get_level().unwrap().as_volts(), 0.1);
    inp.set_level(Voltage::from_volts(-0.25)).unwrap();
}

#[rstest]
#[case("ON", true)]
#[case("OFF", false)]
#[case("1", true)]
fn test_get_noise_reject(#[case] resp: &str, #[case] exp: bool) {
    let inst = crt_inst(vec!["INPut2:NREject?"], vec![resp]);
    assert_eq!(inst.input(2).unwrap().get_noise_reject().unwrap(), exp);
}

#[rstest]
fn test_set_noise_reject() {
    let inst = crt_inst(vec!["INPut1:NREject ON", "INPut1:NREject OFF"], vec![]);
    let mut inp = inst.input(1).unwrap();
    inp.set_noise_reject(true).unwrap();
    inp.set_noise_reject(false).unwrap();
}

#[rstest]
fn test_invalid_input(emp_inst: CounterLbk) {
    assert!(matches!(
        emp_inst.input(3),
        Err(InstrumentError::ChannelIndexOutOfRange { idx: 3, .. })
    ));
}

#[rstest]
#[case("POS", Slope::Positive)]
#[case("NEGative", Slope::Negative)]
fn test_gate_slope(#[case] resp: &str, #[case] exp: Slope) {
    let inst = crt_inst(
        vec![":GATE:STARt:SLOPe?", ":GATE:STARt:SLOPe NEG"],
        vec![resp],
    );
    let mut gate = inst.gate();
    assert_eq!(gate.get_slope().unwrap(), exp);
    gate.set_slope(Slope::Negative).unwrap();
}

#[rstest]
fn test_gate_delay() {
    let inst = crt_inst(
        vec![":GATE:STARt:DELay:TIME?", ":GATE:STARt:DELay:TIME 0.5"],
        vec!["+1.00000000000000E-003"],
    );
    let mut gate = inst.gate();
    assert_eq!(gate.get_delay().unwrap(), Duration::from_millis(1));
    gate.set_delay(Duration::from_millis(500)).unwrap();
}

#[rstest]
fn test_gate_delay_negative() {
    let inst = crt_inst(vec![":GATE:STARt:DELay:TIME?"], vec!["-1"]);
    assert!(matches!(
        inst.gate().get_delay(),
        Err(InstrumentError::ResponseParseError(_))
    ));
}

#[rstest]
fn test_totalize() {
    let mut inst = crt_inst(
        vec![
            ":TOTalize:DATA?",
            ":TOTalize:GATE:TIME?",
            ":TOTalize:GATE:TIME 2",
        ],
        vec!["+1.23450000000000E+004", "+1.00000000000000E-001"],
    );
    assert_eq!(inst.get_totalize_data().unwrap(), 12345.0);
    assert_eq!(
        inst.get_totalize_gate_time().unwrap(),
        Duration::from_millis(100)
    );
    inst.set_totalize_gate_time(Duration::from_secs(2)).unwrap();
    inst.close();
}
