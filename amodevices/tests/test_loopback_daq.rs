//! Test cases for the [`LoopbackDaqSystem`] and [`LoopbackDaqTask`].

use std::time::Duration;

use rstest::*;

use amodevices::{
    DaqCall, LoopbackDaqSystem, LoopbackDaqTask,
    daq::{DaqError, DaqSystem, DaqTask},
};

const TIMEOUT: Duration = Duration::from_secs(1);

#[rstest]
fn test_scripted_tasks() {
    let monitors = LoopbackDaqTask::new("Voltage Monitors")
        .expect(DaqCall::ai("/Dev1/AI0", 0.0, 10.0))
        .expect(DaqCall::Start)
        .expect_read(2, vec![vec![1.0, 2.0]]);
    let controls = LoopbackDaqTask::new("Voltage Controls")
        .expect(DaqCall::ao("/Dev2/AO0", 0.0, 10.0))
        .expect(DaqCall::WriteAnalog(vec![0.1 + 0.2]))
        .expect(DaqCall::Clear);
    let mut system = LoopbackDaqSystem::new(vec![monitors, controls]);

    let mut task = system.create_task("Voltage Monitors").unwrap();
    assert_eq!(task.name(), "Voltage Monitors");
    task.add_ai_voltage_channel("/Dev1/AI0", 0.0, 10.0).unwrap();
    task.start().unwrap();
    let samples = task.read_analog(2, TIMEOUT).unwrap();
    assert_eq!(samples.samples_per_channel_read, 2);
    assert_eq!(samples.data, vec![vec![1.0, 2.0]]);

    let mut task = system.create_task("Voltage Controls").unwrap();
    task.add_ao_voltage_channel("/Dev2/AO0", 0.0, 10.0).unwrap();
    // Written values are compared with a tolerance.
    assert_eq!(task.write_analog(&[0.3], TIMEOUT).unwrap(), 1);
    task.clear().unwrap();
}

#[rstest]
fn test_scripted_errors() {
    let mut task = LoopbackDaqTask::new("Task")
        .expect_err(
            DaqCall::Start,
            DaqError::DeviceNotAccessible("Dev1".to_string()),
        )
        .expect_write(vec![1.0, 2.0], 0);
    assert_eq!(
        task.start(),
        Err(DaqError::DeviceNotAccessible("Dev1".to_string()))
    );
    assert_eq!(task.write_analog(&[1.0, 2.0], TIMEOUT), Ok(0));
}

#[rstest]
#[should_panic(expected = "expected Start, got Stop")]
fn test_unexpected_call() {
    let mut task = LoopbackDaqTask::new("Task").expect(DaqCall::Start);
    let _ = task.stop();
}

#[rstest]
#[should_panic(expected = "Leftover expected call")]
fn test_leftover_call() {
    let _task = LoopbackDaqTask::new("Task").expect(DaqCall::Start);
}

#[rstest]
#[should_panic(expected = "Unexpected DAQ task created")]
fn test_unexpected_task_name() {
    let mut system = LoopbackDaqSystem::new(vec![LoopbackDaqTask::new("Monitors")]);
    let _ = system.create_task("Controls");
}

#[rstest]
#[should_panic(expected = "Leftover DAQ task")]
fn test_leftover_task() {
    let _system = LoopbackDaqSystem::new(vec![LoopbackDaqTask::new("Monitors")]);
}
