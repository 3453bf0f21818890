//! Tests for the high voltage controller against scripted DAQ tasks.

use std::{thread, time::Duration};

use measurements::{Voltage, test_utils::assert_almost_eq};
use rstest::*;
use serde_json::json;

use amodevices::{
    DaqCall, DeviceConfig, InstrumentError, LoopbackDaqSystem, LoopbackDaqTask, daq::DaqError,
};

use hvs_controller::{CONTROL_TASK, HvsController, HvsParams, MONITOR_TASK};

type HvsLbk = HvsController<LoopbackDaqSystem>;

fn params() -> serde_json::Value {
    json!({
        "cDAQs": {"adc": "cDAQ1Mod1", "dac": "cDAQ1Mod2"},
        "channels": [
            {"name": "HV1", "model": "Matsusada KA-10P", "voltage_monitor": 0,
             "current_monitor": 4, "voltage_control": 0},
            {"name": "HV2", "model": "Matsusada J4-5P", "voltage_monitor": 1,
             "voltage_control": 1}
        ]
    })
}

/// Monitor task after setup: voltage and current monitor of HV1, voltage monitor of HV2.
fn monitor_task() -> LoopbackDaqTask {
    LoopbackDaqTask::new(MONITOR_TASK)
        .expect(DaqCall::ai("/cDAQ1Mod1/AI0", 0.0, 10.0))
        .expect(DaqCall::ai("/cDAQ1Mod1/AI4", 0.0, 10.0))
        .expect(DaqCall::ai("/cDAQ1Mod1/AI1", 0.0, 5.0))
        .expect(DaqCall::Start)
}

/// Control task after setup.
fn control_task() -> LoopbackDaqTask {
    LoopbackDaqTask::new(CONTROL_TASK)
        .expect(DaqCall::ao("/cDAQ1Mod2/AO0", 0.0, 10.0))
        .expect(DaqCall::ao("/cDAQ1Mod2/AO1", 0.0, 9.0))
        .expect(DaqCall::Start)
}

/// Monitor samples: HV1 at 2.5 V and 5 V, HV2 at 1 V.
fn monitor_samples(nof_samples: usize) -> Vec<Vec<f64>> {
    vec![
        vec![2.5; nof_samples],
        vec![5.0; nof_samples],
        vec![1.0; nof_samples],
    ]
}

fn crt_inst(monitors: LoopbackDaqTask, controls: LoopbackDaqTask) -> HvsLbk {
    let system = LoopbackDaqSystem::new(vec![monitors, controls]);
    let config = DeviceConfig::new("HVS", "")
        .with_timeout(Duration::from_secs(1))
        .with_device_specific(params());
    let inst = HvsController::from_config(system, &config).unwrap();
    inst.connect().unwrap();
    inst
}

#[rstest]
fn test_connect_and_close() {
    let inst = crt_inst(
        monitor_task().expect(DaqCall::Clear),
        control_task().expect(DaqCall::Clear),
    );
    assert!(inst.is_connected());
    assert_eq!(inst.channel_names(), vec!["HV1", "HV2"]);
    inst.close().unwrap();
    assert!(!inst.is_connected());
}

#[rstest]
fn test_not_connected() {
    let config = DeviceConfig::new("HVS", "").with_device_specific(params());
    let inst = HvsController::from_config(LoopbackDaqSystem::new(vec![]), &config).unwrap();
    assert!(matches!(
        inst.read_voltage("HV1"),
        Err(InstrumentError::NotConnected(_))
    ));
    assert!(matches!(
        inst.set_voltage("HV1", Voltage::from_volts(100.0)),
        Err(InstrumentError::NotConnected(_))
    ));
}

#[rstest]
fn test_connect_device_not_accessible() {
    let monitors = LoopbackDaqTask::new(MONITOR_TASK).expect_err(
        DaqCall::ai("/cDAQ1Mod1/AI0", 0.0, 10.0),
        DaqError::DeviceNotAccessible("cDAQ1Mod1".to_string()),
    );
    let system = LoopbackDaqSystem::new(vec![monitors, LoopbackDaqTask::new(CONTROL_TASK)]);
    let config = DeviceConfig::new("HVS", "").with_device_specific(params());
    let inst = HvsController::from_config(system, &config).unwrap();
    assert!(matches!(
        inst.connect(),
        Err(InstrumentError::NotConnected(_))
    ));
    assert!(!inst.is_connected());
}

#[rstest]
fn test_read_cached() {
    let inst = crt_inst(
        monitor_task().expect_read(64, monitor_samples(64)),
        control_task(),
    );
    assert_almost_eq(inst.read_voltage("HV1").unwrap().as_volts(), 2500.0);
    assert_almost_eq(inst.read_current("HV1").unwrap().as_milliamperes(), 0.5);
    assert_almost_eq(inst.read_voltage("HV2").unwrap().as_volts(), 1000.0);
}

#[rstest]
fn test_read_cache_expires() {
    let inst = crt_inst(
        monitor_task()
            .expect_read(64, monitor_samples(64))
            .expect_read(64, vec![vec![3.0; 64], vec![5.0; 64], vec![1.0; 64]]),
        control_task(),
    );
    assert_almost_eq(inst.read_voltage("HV1").unwrap().as_volts(), 2500.0);
    thread::sleep(Duration::from_millis(600));
    assert_almost_eq(inst.read_voltage("HV1").unwrap().as_volts(), 3000.0);
}

#[rstest]
fn test_read_averages_samples() {
    let ramp: Vec<f64> = (0..64).map(|i| f64::from(i) / 63.0).collect();
    let inst = crt_inst(
        monitor_task().expect_read(64, vec![ramp.clone(), ramp.clone(), ramp]),
        control_task(),
    );
    assert_almost_eq(inst.read_voltage("HV1").unwrap().as_volts(), 500.0);
    assert_almost_eq(inst.read_current("HV1").unwrap().as_milliamperes(), 0.05);
}

#[rstest]
fn test_read_channel_mismatch() {
    let inst = crt_inst(
        monitor_task().expect_read(64, vec![vec![1.0; 64], vec![1.0; 64]]),
        control_task(),
    );
    assert!(matches!(
        inst.read_voltage("HV1"),
        Err(InstrumentError::Measurement(_))
    ));
}

#[rstest]
fn test_sample_mismatch_caches_nan() {
    let inst = crt_inst(
        monitor_task().expect_read(64, monitor_samples(10)),
        control_task(),
    );
    assert!(matches!(
        inst.read_voltage("HV2"),
        Err(InstrumentError::Measurement(_))
    ));
    assert!(inst.read_voltage("HV2").unwrap().as_volts().is_nan());
    assert!(inst.read_current("HV1").unwrap().as_milliamperes().is_nan());
}

#[rstest]
fn test_read_device_not_accessible() {
    let inst = crt_inst(
        monitor_task().expect_err(
            DaqCall::ReadAnalog {
                samples_per_channel: 64,
            },
            DaqError::DeviceNotAccessible("cDAQ1Mod1".to_string()),
        ),
        control_task(),
    );
    assert!(matches!(
        inst.read_voltage("HV1"),
        Err(InstrumentError::NotConnected(_))
    ));
    assert!(!inst.is_connected());
}

#[rstest]
fn test_read_current_without_monitor() {
    let inst = crt_inst(
        monitor_task().expect_read(64, monitor_samples(64)),
        control_task(),
    );
    assert!(matches!(
        inst.read_current("HV2"),
        Err(InstrumentError::InvalidArgument(_))
    ));
}

#[rstest]
fn test_unknown_supply() {
    let inst = crt_inst(monitor_task(), control_task());
    assert!(matches!(
        inst.read_voltage("HV9"),
        Err(InstrumentError::InvalidArgument(_))
    ));
}

#[rstest]
fn test_set_voltage() {
    let inst = crt_inst(
        monitor_task(),
        control_task()
            .expect(DaqCall::WriteAnalog(vec![0.0, 9.0]))
            .expect(DaqCall::WriteAnalog(vec![2.5, 9.0])),
    );
    inst.set_voltage("HV2", Voltage::from_volts(5000.0)).unwrap();
    inst.set_voltage("HV1", Voltage::from_volts(2500.0)).unwrap();
}

#[rstest]
#[case("HV1", 10001.0)]
#[case("HV2", 5001.0)]
#[case("HV2", -1.0)]
fn test_set_voltage_out_of_range(#[case] name: &str, #[case] volts: f64) {
    let inst = crt_inst(monitor_task(), control_task());
    assert!(matches!(
        inst.set_voltage(name, Voltage::from_volts(volts)),
        Err(InstrumentError::FloatValueOutOfRange { .. })
    ));
}

#[rstest]
fn test_set_voltage_nothing_written() {
    let inst = crt_inst(
        monitor_task(),
        control_task()
            .expect_write(vec![1.0, 0.0], 0)
            .expect(DaqCall::WriteAnalog(vec![0.0, 0.9])),
    );
    assert!(matches!(
        inst.set_voltage("HV1", Voltage::from_volts(1000.0)),
        Err(InstrumentError::Measurement(_))
    ));
    // The failed value is not kept.
    inst.set_voltage("HV2", Voltage::from_volts(500.0)).unwrap();
}

#[rstest]
fn test_set_name() {
    let inst = crt_inst(
        monitor_task().expect_read(64, monitor_samples(64)),
        control_task().expect(DaqCall::WriteAnalog(vec![1.0, 0.0])),
    );
    inst.set_name("HV1", "Anode").unwrap();
    assert_eq!(inst.channel_names(), vec!["Anode", "HV2"]);
    assert!(matches!(
        inst.set_name("HV2", "Anode"),
        Err(InstrumentError::InvalidArgument(_))
    ));
    assert!(matches!(
        inst.set_name("HV1", "Cathode"),
        Err(InstrumentError::InvalidArgument(_))
    ));
    // Physical channels stay with the supply.
    assert_almost_eq(inst.read_voltage("Anode").unwrap().as_volts(), 2500.0);
    inst.set_voltage("Anode", Voltage::from_volts(1000.0)).unwrap();
}

#[rstest]
#[case(json!({"cDAQs": {"adc": "A", "dac": "D"}, "channels": [
    {"name": "HV1", "model": "Matsusada XYZ", "voltage_monitor": 0, "voltage_control": 0}]}))]
#[case(json!({"cDAQs": {"adc": "A", "dac": "D"}, "channels": [
    {"name": "HV1", "model": "Matsusada KA-10P", "voltage_monitor": 0, "voltage_control": 0}]}))]
#[case(json!({"cDAQs": {"adc": "A", "dac": "D"}, "channels": [
    {"name": "HV1", "model": "Matsusada J4-5N", "voltage_monitor": 0, "voltage_control": 0},
    {"name": "HV1", "model": "Matsusada J4-5N", "voltage_monitor": 1, "voltage_control": 1}]}))]
fn test_invalid_config(#[case] params: serde_json::Value) {
    let config = DeviceConfig::new("HVS", "").with_device_specific(params);
    assert!(matches!(
        HvsController::from_config(LoopbackDaqSystem::new(vec![]), &config),
        Err(InstrumentError::InvalidArgument(_))
    ));
}

#[rstest]
fn test_params_from_json() {
    let params: HvsParams = serde_json::from_value(params()).unwrap();
    assert_eq!(params.modules.adc, "cDAQ1Mod1");
    assert_eq!(params.channels[0].current_monitor, Some(4));
    assert_eq!(params.channels[1].current_monitor, None);
}
