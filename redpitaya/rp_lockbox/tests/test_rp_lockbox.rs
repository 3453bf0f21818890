//! Tests for the Red Pitaya lockbox driver.

use measurements::{Frequency, Voltage, test_utils::assert_almost_eq};
use rstest::*;

use amodevices::{InstrumentError, LoopbackInterfaceString};

use redpitaya_rp_lockbox::{RpLockbox, Waveform};

type RpLockboxLbk = RpLockbox<LoopbackInterfaceString>;

fn crt_inst(host2inst: Vec<&str>, inst2host: Vec<&str>) -> RpLockboxLbk {
    let host2inst = host2inst.into_iter().map(String::from).collect();
    let inst2host = inst2host.into_iter().map(String::from).collect();
    let interface = LoopbackInterfaceString::new(host2inst, inst2host, "\r\n");
    RpLockbox::try_new(interface).unwrap()
}

#[fixture]
fn emp_inst() -> RpLockboxLbk {
    crt_inst(vec![], vec![])
}

#[rstest]
#[case(0)]
#[case(3)]
fn test_invalid_output(emp_inst: RpLockboxLbk, #[case] output: u8) {
    assert!(matches!(
        emp_inst.get_output(output),
        Err(InstrumentError::ChannelIndexOutOfRange { nof_channels: 2, .. })
    ));
}

#[rstest]
#[case(0, 1)]
#[case(1, 3)]
fn test_invalid_pid(emp_inst: RpLockboxLbk, #[case] input: u8, #[case] output: u8) {
    assert!(matches!(
        emp_inst.get_pid(input, output),
        Err(InstrumentError::ChannelIndexOutOfRange { .. })
    ));
}

#[rstest]
#[case(true, "OUTPUT2:STATE 1")]
#[case(false, "OUTPUT2:STATE 0")]
fn test_set_output_state(#[case] state: bool, #[case] cmd: &str) {
    let inst = crt_inst(vec![cmd], vec![]);
    inst.get_output(2).unwrap().set_output_state(state).unwrap();
}

#[rstest]
#[case("1", true)]
#[case("0", false)]
fn test_get_output_state(#[case] resp: &str, #[case] exp: bool) {
    let inst = crt_inst(vec!["OUTPUT1:STATE?"], vec![resp]);
    assert_eq!(inst.get_output(1).unwrap().get_output_state().unwrap(), exp);
}

#[rstest]
fn test_generator() {
    let inst = crt_inst(
        vec![
            "SOUR1:FREQ:FIX 10000",
            "SOUR1:FREQ:FIX?",
            "SOUR1:FUNC SAWU",
            "SOUR1:FUNC?",
            "SOUR1:VOLT 0.25",
            "SOUR1:VOLT?",
            "SOUR1:VOLT:OFFS -0.1",
            "SOUR1:VOLT:OFFS?",
        ],
        vec!["10000.0", "SAWU", "0.25", "-0.1"],
    );
    let mut out = inst.get_output(1).unwrap();
    out.set_generator_frequency(Frequency::from_hertz(10e3))
        .unwrap();
    assert_almost_eq(out.get_generator_frequency().unwrap().as_hertz(), 10e3);
    out.set_generator_waveform(Waveform::SawUp).unwrap();
    assert_eq!(out.get_generator_waveform().unwrap(), Waveform::SawUp);
    out.set_generator_amplitude(Voltage::from_volts(0.25)).unwrap();
    assert_almost_eq(out.get_generator_amplitude().unwrap().as_volts(), 0.25);
    out.set_generator_offset(Voltage::from_volts(-0.1)).unwrap();
    assert_almost_eq(out.get_generator_offset().unwrap().as_volts(), -0.1);
}

#[rstest]
fn test_unknown_waveform() {
    let inst = crt_inst(vec!["SOUR2:FUNC?"], vec!["NOISE"]);
    assert!(matches!(
        inst.get_output(2).unwrap().get_generator_waveform(),
        Err(InstrumentError::ResponseParseError(_))
    ));
}

#[rstest]
fn test_output_limits() {
    let inst = crt_inst(
        vec!["OUT2:LIM:MIN -0.5", "OUT2:LIM:MAX 0.75", "OUT2:LIM:MIN?", "OUT2:LIM:MAX?"],
        vec!["-0.5", "0.75"],
    );
    let mut out = inst.get_output(2).unwrap();
    out.set_output_minimum(Voltage::from_volts(-0.5)).unwrap();
    out.set_output_maximum(Voltage::from_volts(0.75)).unwrap();
    assert_almost_eq(out.get_output_minimum().unwrap().as_volts(), -0.5);
    assert_almost_eq(out.get_output_maximum().unwrap().as_volts(), 0.75);
}

#[rstest]
fn test_fast_analog() {
    let inst = crt_inst(
        vec!["ANALOG:IN1:VOLT?", "ANALOG:OUT1:VOLT?"],
        vec!["0.0123", "-0.456"],
    );
    let mut out = inst.get_output(1).unwrap();
    assert_almost_eq(out.get_fast_analog_input().unwrap().as_volts(), 0.0123);
    assert_almost_eq(out.get_fast_analog_output().unwrap().as_volts(), -0.456);
}

#[rstest]
#[case("KG", 2.0)]
#[case("KP", 100.0)]
#[case("KI", 15000.5)]
#[case("KII", 300.0)]
#[case("KD", 0.001)]
fn test_pid_gains(#[case] param: &str, #[case] value: f64) {
    let set = format!("PID:IN2:OUT1:{param} {value}");
    let get = format!("PID:IN2:OUT1:{param}?");
    let resp = format!("{value}");
    let inst = crt_inst(vec![&set, &get], vec![&resp]);
    let mut pid = inst.get_pid(2, 1).unwrap();
    let got = match param {
        "KG" => pid.set_kg(value).and_then(|_| pid.get_kg()),
        "KP" => pid.set_kp(value).and_then(|_| pid.get_kp()),
        "KI" => pid.set_ki(value).and_then(|_| pid.get_ki()),
        "KII" => pid.set_kii(value).and_then(|_| pid.get_kii()),
        _ => pid.set_kd(value).and_then(|_| pid.get_kd()),
    };
    assert_almost_eq(got.unwrap(), value);
}

#[rstest]
fn test_pid_setpoint() {
    let inst = crt_inst(
        vec!["PID:IN1:OUT2:SETPoint -0.25", "PID:IN1:OUT2:SETPoint?"],
        vec!["-0.25"],
    );
    let mut pid = inst.get_pid(1, 2).unwrap();
    assert_eq!((pid.input(), pid.output()), (1, 2));
    pid.set_setpoint(Voltage::from_volts(-0.25)).unwrap();
    assert_almost_eq(pid.get_setpoint().unwrap().as_volts(), -0.25);
}

#[rstest]
fn test_pid_states() {
    let inst = crt_inst(
        vec![
            "PID:IN1:OUT1:INT:RES 1",
            "PID:IN1:OUT1:INT:RES?",
            "PID:IN1:OUT1:HOLD 0",
            "PID:IN1:OUT1:HOLD?",
            "PID:IN1:OUT1:INT:AUTO 1",
            "PID:IN1:OUT1:INT:AUTO?",
            "PID:IN1:OUT1:INV 1",
            "PID:IN1:OUT1:INV?",
            "PID:IN1:OUT1:REL 0",
            "PID:IN1:OUT1:REL?",
        ],
        vec!["ON", "OFF", "ON", "ON", "OFF"],
    );
    let mut pid = inst.get_pid(1, 1).unwrap();
    pid.set_int_reset_state(true).unwrap();
    assert!(pid.get_int_reset_state().unwrap());
    pid.set_hold_state(false).unwrap();
    assert!(!pid.get_hold_state().unwrap());
    pid.set_int_auto_state(true).unwrap();
    assert!(pid.get_int_auto_state().unwrap());
    pid.set_inv_state(true).unwrap();
    assert!(pid.get_inv_state().unwrap());
    pid.set_relock_state(false).unwrap();
    assert!(!pid.get_relock_state().unwrap());
}

#[rstest]
fn test_pid_relock() {
    let inst = crt_inst(
        vec![
            "PID:IN2:OUT2:REL:STEP 50",
            "PID:IN2:OUT2:REL:STEP?",
            "PID:IN2:OUT2:REL:MIN 0.2",
            "PID:IN2:OUT2:REL:MIN?",
            "PID:IN2:OUT2:REL:MAX 0.9",
            "PID:IN2:OUT2:REL:MAX?",
            "PID:IN2:OUT2:REL:INP AIN3",
            "PID:IN2:OUT2:REL:INP?",
        ],
        vec!["50.0", "0.2", "0.9", "AIN3"],
    );
    let mut pid = inst.get_pid(2, 2).unwrap();
    pid.set_relock_stepsize(50.0).unwrap();
    assert_almost_eq(pid.get_relock_stepsize().unwrap(), 50.0);
    pid.set_relock_minimum(Voltage::from_volts(0.2)).unwrap();
    assert_almost_eq(pid.get_relock_minimum().unwrap().as_volts(), 0.2);
    pid.set_relock_maximum(Voltage::from_volts(0.9)).unwrap();
    assert_almost_eq(pid.get_relock_maximum().unwrap().as_volts(), 0.9);
    pid.set_relock_input(3).unwrap();
    assert_eq!(pid.get_relock_input().unwrap(), 3);
}

#[rstest]
fn test_relock_input_out_of_range(emp_inst: RpLockboxLbk) {
    let mut pid = emp_inst.get_pid(1, 1).unwrap();
    assert!(matches!(
        pid.set_relock_input(4),
        Err(InstrumentError::IntValueOutOfRange { max: 3, .. })
    ));
}

#[rstest]
#[case("AIN7")]
#[case("XADC1")]
fn test_relock_input_invalid_response(#[case] resp: &str) {
    let inst = crt_inst(vec!["PID:IN1:OUT1:REL:INP?"], vec![resp]);
    assert!(inst.get_pid(1, 1).unwrap().get_relock_input().is_err());
}

#[rstest]
fn test_save_load_config() {
    let mut inst = crt_inst(vec!["LOCK:CONF:SAVE", "LOCK:CONF:LOAD"], vec![]);
    inst.save_config().unwrap();
    inst.load_config().unwrap();
}

/// Output and PID handles share the interface.
#[rstest]
fn test_handles_share_interface() {
    let inst = crt_inst(
        vec!["OUTPUT1:STATE 1", "PID:IN1:OUT1:KP 1"],
        vec![],
    );
    let mut out = inst.clone().get_output(1).unwrap();
    let mut pid = inst.get_pid(1, 1).unwrap();
    out.set_output_state(true).unwrap();
    pid.set_kp(1.0).unwrap();
}
