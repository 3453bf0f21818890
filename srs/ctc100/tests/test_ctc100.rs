//! Tests for the SRS CTC100 driver.

use measurements::test_utils::assert_almost_eq;
use rstest::*;

use amodevices::{InstrumentError, LoopbackInterfaceString};

use srs_ctc100::Ctc100;

type Ctc100Lbk = Ctc100<LoopbackInterfaceString>;

/// Create the controller on a loopback interface: commands end in `"\n"`, responses in
/// `"\r\n"`.
fn crt_inst(host2inst: Vec<&str>, inst2host: Vec<&str>) -> Ctc100Lbk {
    let host2inst = host2inst.into_iter().map(String::from).collect();
    let inst2host = inst2host.into_iter().map(String::from).collect();
    let interface =
        LoopbackInterfaceString::new(host2inst, inst2host, "\n").with_inst_terminator("\r\n");
    Ctc100::try_new(interface).unwrap()
}

#[fixture]
fn emp_inst() -> Ctc100Lbk {
    crt_inst(vec![], vec![])
}

#[rstest]
fn test_initialization(emp_inst: Ctc100Lbk) {
    emp_inst.close();
}

#[rstest]
#[case("In1", "4.0213", 4.0213)]
#[case("Tcold", "295.1", 295.1)]
fn test_read_temperature(#[case] name: &str, #[case] resp: &str, #[case] exp: f64) {
    let cmd = format!("{name}?");
    let mut inst = crt_inst(vec![&cmd], vec![resp]);
    assert_almost_eq(inst.read_temperature(name).unwrap().as_kelvin(), exp);
}

#[rstest]
fn test_read_pid_setpoint() {
    let mut inst = crt_inst(vec!["Out1.PID.Setpoint?"], vec!["3.5"]);
    assert_almost_eq(inst.read_pid_setpoint("Out1").unwrap().as_kelvin(), 3.5);
}

#[rstest]
fn test_read_heater_power() {
    let mut inst = crt_inst(vec!["Heater?"], vec!["0.125"]);
    assert_almost_eq(inst.read_heater_power("Heater").unwrap().as_watts(), 0.125);
}

#[rstest]
fn test_query_custom_command() {
    let mut inst = crt_inst(vec!["In2.Value?"], vec!["77.2"]);
    assert_almost_eq(inst.query_custom_command("In2.Value?").unwrap(), 77.2);
}

#[rstest]
fn test_write() {
    let mut inst = crt_inst(vec!["Out1.PID.Mode on"], vec![]);
    inst.write("Out1.PID.Mode on").unwrap();
}

#[rstest]
fn test_empty_response() {
    let mut inst = crt_inst(vec!["In1?"], vec![""]);
    assert!(matches!(
        inst.read_temperature("In1"),
        Err(InstrumentError::EmptyResponse)
    ));
}

#[rstest]
fn test_non_numeric_response() {
    let mut inst = crt_inst(vec!["In1?"], vec!["Error: unknown"]);
    assert!(matches!(
        inst.read_temperature("In1"),
        Err(InstrumentError::TypeConversion { .. })
    ));
}
