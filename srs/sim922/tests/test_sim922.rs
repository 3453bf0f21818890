//! Tests for the SRS SIM922 driver.

use std::time::Duration;

use measurements::{Temperature, Voltage, test_utils::assert_almost_eq};
use rstest::*;

use amodevices::{InstrumentError, LoopbackInterfaceString};

use srs_sim922::{CalibrationPoint, Curve, Sim922};

type Sim922Lbk = Sim922<LoopbackInterfaceString>;

fn crt_inst(host2inst: Vec<&str>, inst2host: Vec<&str>) -> Sim922Lbk {
    let host2inst = host2inst.into_iter().map(String::from).collect();
    let inst2host = inst2host.into_iter().map(String::from).collect();
    let interface =
        LoopbackInterfaceString::new(host2inst, inst2host, "\n").with_inst_terminator("\r\n");
    Sim922::try_new(interface).unwrap()
}

#[fixture]
fn emp_inst() -> Sim922Lbk {
    crt_inst(vec![], vec![])
}

#[rstest]
#[case(1, "TVAL? 1", "+4.2110E+00", 4.211)]
#[case(2, "TVAL? 2", "+7.7350E+01", 77.35)]
#[case(3, "TVAL? 3", "+2.9415E+02", 294.15)]
fn test_read_temperature(
    #[case] channel: u8,
    #[case] cmd: &str,
    #[case] resp: &str,
    #[case] exp: f64,
) {
    let mut inst = crt_inst(vec![cmd], vec![resp]);
    assert_almost_eq(inst.read_temperature(channel).unwrap().as_kelvin(), exp);
}

#[rstest]
#[case(0)]
#[case(4)]
fn test_read_temperature_invalid_channel(mut emp_inst: Sim922Lbk, #[case] channel: u8) {
    match emp_inst.read_temperature(channel) {
        Err(InstrumentError::IntValueOutOfRange { value, min, max }) => {
            assert_eq!(value, channel as i64);
            assert_eq!((min, max), (1, 3));
        }
        other => panic!("Expected out of range error, got {other:?}"),
    }
}

#[rstest]
fn test_empty_response() {
    let mut inst = crt_inst(vec!["TVAL? 1"], vec![""]);
    assert!(matches!(
        inst.read_temperature(1),
        Err(InstrumentError::EmptyResponse)
    ));
}

#[rstest]
#[case("0", Curve::Standard)]
#[case("1", Curve::User)]
#[case("USER", Curve::User)]
fn test_get_curve(#[case] resp: &str, #[case] exp: Curve) {
    let mut inst = crt_inst(vec!["CURV? 2"], vec![resp]);
    assert_eq!(inst.get_curve(2).unwrap(), exp);
}

#[rstest]
#[case(Curve::Standard, "CURV 1,STAN")]
#[case(Curve::User, "CURV 1,USER")]
fn test_set_curve(#[case] curve: Curve, #[case] cmd: &str) {
    let mut inst = crt_inst(vec![cmd], vec![]);
    inst.set_curve(1, curve).unwrap();
}

#[rstest]
fn test_calibration_info() {
    let mut inst = crt_inst(vec!["CINI? 2"], vec!["0,DT670"]);
    assert_eq!(inst.get_calibration_info(2).unwrap(), "0,DT670");
}

#[rstest]
#[case("")]
#[case("DT,670")]
fn test_init_user_calibration_invalid_name(mut emp_inst: Sim922Lbk, #[case] name: &str) {
    assert!(emp_inst.init_user_calibration(2, name).is_err());
}

/// Points are sent in order of increasing voltage, then the user curve is selected.
#[rstest]
fn test_load_user_calibration() {
    let mut inst = crt_inst(
        vec![
            "CINI 2,0,DT670",
            "CAPT 2,0.5,300",
            "CAPT 2,1,77",
            "CAPT 2,1.5,4",
            "CURV 2,USER",
        ],
        vec![],
    );
    let points = vec![
        CalibrationPoint::new(Voltage::from_volts(1.5), Temperature::from_kelvin(4.0)),
        CalibrationPoint::new(Voltage::from_volts(0.5), Temperature::from_kelvin(300.0)),
        CalibrationPoint::new(Voltage::from_volts(1.0), Temperature::from_kelvin(77.0)),
    ];
    inst.load_user_calibration(2, "DT670", &points, Duration::ZERO)
        .unwrap();
}

#[rstest]
fn test_parse_table() {
    let table = "DT-670 standard curve\nT (K)  V\n\n1.4  1.644290\n  300.0   0.559690\n";
    let points = CalibrationPoint::parse_table(table, 2).unwrap();
    assert_eq!(points.len(), 2);
    assert_almost_eq(points[0].temperature.as_kelvin(), 1.4);
    assert_almost_eq(points[0].voltage.as_volts(), 1.64429);
    assert_almost_eq(points[1].temperature.as_kelvin(), 300.0);

    assert!(CalibrationPoint::parse_table("1.4\n", 0).is_err());
    assert!(CalibrationPoint::parse_table("1.4 abc\n", 0).is_err());
}
