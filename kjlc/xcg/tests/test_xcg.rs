//! Tests for the KJLC XCG driver.

use std::collections::BTreeMap;

use measurements::test_utils::assert_almost_eq;
use rstest::*;

use amodevices::{ChannelConfig, InstrumentError, LoopbackInterfaceString};

use kjlc_xcg::{PA_PER_TORR, Xcg};

type XcgLbk = Xcg<LoopbackInterfaceString>;

/// Create a controller with internal address 1 on a loopback interface.
fn crt_inst(host2inst: Vec<&str>, inst2host: Vec<&str>) -> XcgLbk {
    let host2inst = host2inst.into_iter().map(String::from).collect();
    let inst2host = inst2host.into_iter().map(String::from).collect();
    let interface = LoopbackInterfaceString::new(host2inst, inst2host, "\r");
    Xcg::try_new(interface, 1).unwrap()
}

#[fixture]
fn emp_inst() -> XcgLbk {
    crt_inst(vec![], vec![])
}

#[rstest]
fn test_initialization(emp_inst: XcgLbk) {
    assert_eq!(emp_inst.internal_address(), 1);
}

#[rstest]
fn test_read_pressure() {
    let mut inst = crt_inst(vec!["#1RD"], vec!["*1 1.23E-6"]);
    let pressure = inst.read_pressure().unwrap();
    assert_almost_eq(pressure.as_pascals() / PA_PER_TORR, 1.23e-6);
}

#[rstest]
fn test_query_payload() {
    let mut inst = crt_inst(vec!["#1VER"], vec!["*1 XCG 2.1"]);
    assert_eq!(inst.query("VER").unwrap(), "XCG 2.1");
}

#[rstest]
fn test_error_response() {
    let mut inst = crt_inst(vec!["#1RD"], vec!["?1"]);
    match inst.read_pressure() {
        Err(InstrumentError::ErrorResponse(resp)) => assert_eq!(resp, "?1"),
        other => panic!("Expected error response, got {other:?}"),
    }
}

#[rstest]
fn test_empty_response() {
    let mut inst = crt_inst(vec!["#1RD"], vec![""]);
    assert!(matches!(
        inst.read_pressure(),
        Err(InstrumentError::EmptyResponse)
    ));
}

#[rstest]
#[case("*2 1.0E-6")]
#[case("*11.0E-6")]
#[case("1.0E-6")]
fn test_wrong_acknowledgment(#[case] resp: &str) {
    let mut inst = crt_inst(vec!["#1RD"], vec![resp]);
    match inst.read_pressure() {
        Err(InstrumentError::NotAcknowledged(rsp)) => assert_eq!(rsp, resp),
        other => panic!("Expected not acknowledged error, got {other:?}"),
    }
}

#[rstest]
fn test_unparsable_pressure() {
    let mut inst = crt_inst(vec!["#1RD"], vec!["*1 OFF"]);
    assert!(matches!(
        inst.read_pressure(),
        Err(InstrumentError::ResponseParseError(_))
    ));
}

#[rstest]
fn test_get_values() {
    let mut channels = BTreeMap::new();
    channels.insert("P_chamber".to_string(), ChannelConfig::new("Pressure"));
    channels.insert("P_source".to_string(), ChannelConfig::new("Pressure"));
    let mut inst = crt_inst(vec!["#1RD", "#1RD"], vec!["*1 2.0E-7", "*1 3.0E-7"]).with_channels(channels);

    let values = inst.get_values().unwrap();
    assert_eq!(values.len(), 2);
    assert_almost_eq(values["P_chamber"].as_pascals(), 2.0e-7 * PA_PER_TORR);
    assert_almost_eq(values["P_source"].as_pascals(), 3.0e-7 * PA_PER_TORR);
}

#[rstest]
fn test_get_values_unknown_type(emp_inst: XcgLbk) {
    let mut channels = BTreeMap::new();
    channels.insert("T".to_string(), ChannelConfig::new("Temperature"));
    let mut inst = emp_inst.with_name("Gauge 1").with_channels(channels);
    match inst.get_values() {
        Err(InstrumentError::InvalidArgument(msg)) => {
            assert!(msg.contains("'Temperature'"));
            assert!(msg.contains("'Gauge 1'"));
        }
        other => panic!("Expected invalid argument error, got {other:?}"),
    }
}

#[rstest]
fn test_close(emp_inst: XcgLbk) {
    emp_inst.close();
}
