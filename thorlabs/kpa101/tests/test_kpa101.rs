//! Tests for the Thorlabs KPA101 driver against a mock quad detector backend.

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use measurements::test_utils::assert_almost_eq;
use rstest::*;
use serde_json::json;

use amodevices::{DeviceConfig, InstrumentError};

use thorlabs_kpa101::{Kpa101, OperationMode, QuadDetectorBackend, QuadReadings};

const SN: u32 = 69252254;

const READINGS: QuadReadings = QuadReadings {
    xdiff: 0.5,
    ydiff: -0.25,
    sum: 2.0,
    xpos: 0.1,
    ypos: -0.2,
};

#[derive(Default)]
struct MockState {
    open_fails: bool,
    opened_with: Option<u32>,
    closed: bool,
    nof_readings: usize,
    mode: Option<OperationMode>,
}

#[derive(Clone, Default)]
struct MockDetector(Arc<Mutex<MockState>>);

impl MockDetector {
    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }
}

impl QuadDetectorBackend for MockDetector {
    fn open(&mut self, serial_number: u32) -> Result<(), InstrumentError> {
        let mut state = self.state();
        if state.open_fails {
            return Err(InstrumentError::DeviceNotFound("no such device".to_string()));
        }
        state.opened_with = Some(serial_number);
        Ok(())
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        self.state().closed = true;
        Ok(())
    }

    fn get_readings(&mut self) -> Result<QuadReadings, InstrumentError> {
        self.state().nof_readings += 1;
        Ok(READINGS)
    }

    fn get_operation_mode(&mut self) -> Result<OperationMode, InstrumentError> {
        Ok(self.state().mode.unwrap_or(OperationMode::Monitor))
    }

    fn set_operation_mode(&mut self, mode: OperationMode) -> Result<(), InstrumentError> {
        self.state().mode = Some(mode);
        Ok(())
    }
}

#[fixture]
fn mock() -> MockDetector {
    MockDetector::default()
}

fn crt_inst(mock: &MockDetector) -> Kpa101<MockDetector> {
    let inst = Kpa101::new(mock.clone(), SN);
    inst.connect().unwrap();
    inst
}

#[rstest]
fn test_connect_and_close(mock: MockDetector) {
    let inst = crt_inst(&mock);
    assert!(inst.is_connected());
    assert_eq!(mock.state().opened_with, Some(SN));
    // Initial reading on connect.
    assert_eq!(mock.state().nof_readings, 1);
    inst.close().unwrap();
    assert!(!inst.is_connected());
    assert!(mock.state().closed);
}

#[rstest]
fn test_connect_fails(mock: MockDetector) {
    mock.state().open_fails = true;
    let inst = Kpa101::new(mock, SN);
    assert!(matches!(
        inst.connect(),
        Err(InstrumentError::ConnectionFailed { .. })
    ));
    assert!(!inst.is_connected());
}

#[rstest]
fn test_not_connected(mock: MockDetector) {
    let inst = Kpa101::new(mock, SN);
    assert!(matches!(inst.sum(), Err(InstrumentError::NotConnected(_))));
    assert!(matches!(
        inst.get_operation_mode(),
        Err(InstrumentError::NotConnected(_))
    ));
}

#[rstest]
fn test_from_config(mock: MockDetector) {
    let config = DeviceConfig::new("Beam aligner", "")
        .with_device_specific(json!({"SerialNumber": SN}));
    let inst = Kpa101::from_config(mock, &config).unwrap();
    assert_eq!(inst.serial_number(), SN);
}

#[rstest]
fn test_readings(mock: MockDetector) {
    let inst = crt_inst(&mock);
    assert_almost_eq(inst.xdiff().unwrap().as_volts(), 0.5);
    assert_almost_eq(inst.ydiff().unwrap().as_volts(), -0.25);
    assert_almost_eq(inst.sum().unwrap().as_volts(), 2.0);
    assert_almost_eq(inst.xpos().unwrap().as_millimeters(), 0.1);
    assert_almost_eq(inst.ypos().unwrap().as_millimeters(), -0.2);
}

#[rstest]
fn test_pdp90a_position(mock: MockDetector) {
    let inst = crt_inst(&mock);
    assert_almost_eq(inst.xpos_pdp90a().unwrap().as_millimeters(), 1.25);
    assert_almost_eq(inst.ypos_pdp90a().unwrap().as_millimeters(), -0.625);
}

#[rstest]
fn test_readings_cached(mock: MockDetector) {
    let inst = crt_inst(&mock);
    inst.xdiff().unwrap();
    inst.ydiff().unwrap();
    inst.sum().unwrap();
    assert_eq!(mock.state().nof_readings, 1);
    thread::sleep(Duration::from_millis(150));
    inst.sum().unwrap();
    assert_eq!(mock.state().nof_readings, 2);
}

#[rstest]
#[case(OperationMode::Monitor)]
#[case(OperationMode::OpenLoop)]
#[case(OperationMode::ClosedLoop)]
#[case(OperationMode::AutoLoop)]
fn test_operation_mode(mock: MockDetector, #[case] mode: OperationMode) {
    let inst = crt_inst(&mock);
    inst.set_operation_mode(mode).unwrap();
    assert_eq!(inst.get_operation_mode().unwrap(), mode);
}

#[rstest]
#[case("monitor", OperationMode::Monitor)]
#[case("open_loop", OperationMode::OpenLoop)]
#[case("closed_loop", OperationMode::ClosedLoop)]
#[case("auto_loop", OperationMode::AutoLoop)]
fn test_operation_mode_names(#[case] name: &str, #[case] mode: OperationMode) {
    assert_eq!(OperationMode::try_from(name).unwrap(), mode);
    assert_eq!(mode.to_string(), name);
}

#[rstest]
fn test_operation_mode_unknown() {
    assert!(matches!(
        OperationMode::try_from("feedback"),
        Err(InstrumentError::InvalidArgument(_))
    ));
}
