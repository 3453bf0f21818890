//! Single value reads and writes on per-channel tasks.

use std::time::Duration;

use amodevices::{
    InstrumentError,
    daq::{DaqError, DaqTask},
};

/// Write one value to a task with a single output channel.
///
/// `connected` is cleared if the device cannot be accessed anymore.
pub(crate) fn write_value<T: DaqTask>(
    task: &mut T,
    value: f64,
    timeout: Duration,
    connected: &mut bool,
) -> Result<(), InstrumentError> {
    let written = task
        .write_analog(&[value], timeout)
        .map_err(|err| lost_device(err, connected))?;
    if written == 0 {
        return Err(InstrumentError::Measurement(
            "Requested and written samples mismatch!".to_string(),
        ));
    }
    Ok(())
}

/// Read one value from a task with a single input channel.
pub(crate) fn read_value<T: DaqTask>(
    task: &mut T,
    timeout: Duration,
    connected: &mut bool,
) -> Result<f64, InstrumentError> {
    let samples = task
        .read_analog(1, timeout)
        .map_err(|err| lost_device(err, connected))?;
    samples
        .data
        .first()
        .and_then(|ch| ch.first())
        .copied()
        .ok_or_else(|| InstrumentError::Measurement("No sample was read".to_string()))
}

/// Stop and clear all tasks. All tasks are cleared even if one fails, the first error is
/// returned.
pub(crate) fn close_tasks<T: DaqTask>(
    tasks: impl IntoIterator<Item = T>,
) -> Result<(), InstrumentError> {
    let mut result = Ok(());
    for mut task in tasks {
        let closed = task.stop().and_then(|_| task.clear());
        if let Err(err) = closed {
            if result.is_ok() {
                result = Err(err.into());
            }
        }
    }
    result
}

fn lost_device(err: DaqError, connected: &mut bool) -> InstrumentError {
    if matches!(err, DaqError::DeviceNotAccessible(_)) {
        *connected = false;
    }
    err.into()
}
