//! Loopback DAQ system for drivers built on the [`daq`](crate::daq) traits.

use std::{collections::VecDeque, thread, time::Duration};

use crate::daq::{AnalogSamples, DaqError, DaqSystem, DaqTask};

/// A call on a DAQ task, as recorded by [`LoopbackDaqTask`].
#[derive(Clone, Debug, PartialEq)]
pub enum DaqCall {
    /// `add_ai_voltage_channel(channel, min_val, max_val)`
    AddAiVoltageChannel {
        /// Physical channel.
        channel: String,
        /// Lower end of the range.
        min_val: f64,
        /// Upper end of the range.
        max_val: f64,
    },
    /// `add_ao_voltage_channel(channel, min_val, max_val)`
    AddAoVoltageChannel {
        /// Physical channel.
        channel: String,
        /// Lower end of the range.
        min_val: f64,
        /// Upper end of the range.
        max_val: f64,
    },
    /// `start()`
    Start,
    /// `read_analog(samples_per_channel, _)`
    ReadAnalog {
        /// Requested samples per channel.
        samples_per_channel: usize,
    },
    /// `write_analog(values, _)`
    WriteAnalog(Vec<f64>),
    /// `stop()`
    Stop,
    /// `clear()`
    Clear,
}

impl DaqCall {
    /// Analog input channel with the given range.
    pub fn ai(channel: &str, min_val: f64, max_val: f64) -> Self {
        DaqCall::AddAiVoltageChannel {
            channel: channel.to_string(),
            min_val,
            max_val,
        }
    }

    /// Analog output channel with the given range.
    pub fn ao(channel: &str, min_val: f64, max_val: f64) -> Self {
        DaqCall::AddAoVoltageChannel {
            channel: channel.to_string(),
            min_val,
            max_val,
        }
    }

    // Written values are compared with a relative tolerance, as they are usually scaled.
    fn matches(&self, other: &DaqCall) -> bool {
        match (self, other) {
            (DaqCall::WriteAnalog(exp), DaqCall::WriteAnalog(got)) => {
                exp.len() == got.len()
                    && exp
                        .iter()
                        .zip(got)
                        .all(|(e, g)| (e - g).abs() <= 1e-9 * e.abs().max(g.abs()).max(1.0))
            }
            _ => self == other,
        }
    }
}

#[derive(Debug)]
enum DaqReply {
    Done,
    Samples(AnalogSamples),
    Written(usize),
    Fail(DaqError),
}

/// A scripted DAQ task.
///
/// Every call on the task must match the next expected call, otherwise the test panics. Unused
/// expectations panic when the task is dropped.
///
/// ```
/// use std::time::Duration;
///
/// use amodevices::{DaqCall, LoopbackDaqTask, daq::DaqTask};
///
/// let mut task = LoopbackDaqTask::new("Monitors")
///     .expect(DaqCall::ai("/Dev1/AI0", 0.0, 10.0))
///     .expect_read(2, vec![vec![1.0, 3.0]]);
/// task.add_ai_voltage_channel("/Dev1/AI0", 0.0, 10.0).unwrap();
/// let samples = task.read_analog(2, Duration::from_secs(1)).unwrap();
/// assert_eq!(samples.channel_means(), vec![2.0]);
/// ```
#[derive(Debug)]
pub struct LoopbackDaqTask {
    name: String,
    expected: VecDeque<(DaqCall, DaqReply)>,
}

impl LoopbackDaqTask {
    /// Create a task with the given name and no expectations.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            expected: VecDeque::new(),
        }
    }

    /// Name of the task.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Expect a call that succeeds. An expected write reports one sample per channel written.
    pub fn expect(mut self, call: DaqCall) -> Self {
        let reply = match call {
            DaqCall::WriteAnalog(_) => DaqReply::Written(1),
            _ => DaqReply::Done,
        };
        self.expected.push_back((call, reply));
        self
    }

    /// Expect a read of `samples_per_channel` samples that returns `data`, grouped by channel.
    pub fn expect_read(mut self, samples_per_channel: usize, data: Vec<Vec<f64>>) -> Self {
        self.expected.push_back((
            DaqCall::ReadAnalog {
                samples_per_channel,
            },
            DaqReply::Samples(AnalogSamples::new(data)),
        ));
        self
    }

    /// Expect a write of `values` that reports `written` samples per channel.
    pub fn expect_write(mut self, values: Vec<f64>, written: usize) -> Self {
        self.expected
            .push_back((DaqCall::WriteAnalog(values), DaqReply::Written(written)));
        self
    }

    /// Expect a call that fails with the given error.
    pub fn expect_err(mut self, call: DaqCall, err: DaqError) -> Self {
        self.expected.push_back((call, DaqReply::Fail(err)));
        self
    }

    /// Panic if not all expected calls were made.
    pub fn finalize(&mut self) {
        if let Some((call, _)) = self.expected.front() {
            panic!("Leftover expected call on DAQ task '{}': {call:?}", self.name);
        }
    }

    fn next(&mut self, call: DaqCall) -> DaqReply {
        let (exp, reply) = self.expected.pop_front().unwrap_or_else(|| {
            panic!("No more calls were expected on DAQ task '{}', got {call:?}", self.name)
        });
        assert!(
            exp.matches(&call),
            "DAQ task '{}': expected {exp:?}, got {call:?}",
            self.name
        );
        reply
    }

    fn next_done(&mut self, call: DaqCall) -> Result<(), DaqError> {
        match self.next(call) {
            DaqReply::Fail(err) => Err(err),
            _ => Ok(()),
        }
    }
}

impl DaqTask for LoopbackDaqTask {
    fn add_ai_voltage_channel(
        &mut self,
        physical_channel: &str,
        min_val: f64,
        max_val: f64,
    ) -> Result<(), DaqError> {
        self.next_done(DaqCall::ai(physical_channel, min_val, max_val))
    }

    fn add_ao_voltage_channel(
        &mut self,
        physical_channel: &str,
        min_val: f64,
        max_val: f64,
    ) -> Result<(), DaqError> {
        self.next_done(DaqCall::ao(physical_channel, min_val, max_val))
    }

    fn start(&mut self) -> Result<(), DaqError> {
        self.next_done(DaqCall::Start)
    }

    fn read_analog(
        &mut self,
        samples_per_channel: usize,
        _timeout: Duration,
    ) -> Result<AnalogSamples, DaqError> {
        match self.next(DaqCall::ReadAnalog {
            samples_per_channel,
        }) {
            DaqReply::Samples(samples) => Ok(samples),
            DaqReply::Fail(err) => Err(err),
            reply => panic!("Reply {reply:?} does not fit a read on '{}'", self.name),
        }
    }

    fn write_analog(&mut self, values: &[f64], _timeout: Duration) -> Result<usize, DaqError> {
        match self.next(DaqCall::WriteAnalog(values.to_vec())) {
            DaqReply::Written(written) => Ok(written),
            DaqReply::Fail(err) => Err(err),
            reply => panic!("Reply {reply:?} does not fit a write on '{}'", self.name),
        }
    }

    fn stop(&mut self) -> Result<(), DaqError> {
        self.next_done(DaqCall::Stop)
    }

    fn clear(&mut self) -> Result<(), DaqError> {
        self.next_done(DaqCall::Clear)
    }
}

impl Drop for LoopbackDaqTask {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.finalize();
        }
    }
}

/// A DAQ system that hands out scripted tasks in order.
///
/// Creating a task with a different name than the next scripted one panics.
pub struct LoopbackDaqSystem {
    tasks: VecDeque<LoopbackDaqTask>,
}

impl LoopbackDaqSystem {
    /// Create a system that hands out the given tasks in order.
    pub fn new(tasks: Vec<LoopbackDaqTask>) -> Self {
        Self {
            tasks: tasks.into(),
        }
    }
}

impl DaqSystem for LoopbackDaqSystem {
    type Task = LoopbackDaqTask;

    fn create_task(&mut self, name: &str) -> Result<Self::Task, DaqError> {
        let task = self
            .tasks
            .pop_front()
            .unwrap_or_else(|| panic!("No more DAQ tasks were expected, got '{name}'"));
        assert_eq!(task.name, name, "Unexpected DAQ task created");
        Ok(task)
    }
}

impl Drop for LoopbackDaqSystem {
    fn drop(&mut self) {
        if !thread::panicking() {
            if let Some(task) = self.tasks.front() {
                panic!("Leftover DAQ task that was never created: '{}'", task.name);
            }
        }
    }
}
