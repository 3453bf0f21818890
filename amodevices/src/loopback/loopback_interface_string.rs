//! Loopback interface for drivers of devices that talk in terminated lines of text.

use std::{collections::VecDeque, thread};

use crate::{InstrumentError, InstrumentInterface, loopback::IncrIndex};

/// A scripted device that checks every line the driver writes and plays back canned responses.
///
/// # Example
///
/// A driver for a gauge that answers `RD` with its pressure, and a test for it:
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use amodevices::{InstrumentError, InstrumentInterface, LoopbackInterfaceString};
///
/// struct Gauge<T: InstrumentInterface> {
///     interface: Arc<Mutex<T>>,
/// }
///
/// impl<T: InstrumentInterface> Gauge<T> {
///     fn new(interface: T) -> Self {
///         Gauge { interface: Arc::new(Mutex::new(interface)) }
///     }
///
///     fn read_pressure(&mut self) -> Result<f64, InstrumentError> {
///         let resp = self.interface.lock().unwrap().query("RD")?;
///         resp.parse().map_err(|_| InstrumentError::ResponseParseError(resp))
///     }
/// }
///
/// let loopback = LoopbackInterfaceString::new(
///     vec!["RD".to_string()],
///     vec!["1.5E-7".to_string()],
///     "\n",
/// );
/// let mut gauge = Gauge::new(loopback);
/// assert_eq!(gauge.read_pressure().unwrap(), 1.5e-7);
/// // Dropping the gauge drops the loopback, which checks that all lines were used.
/// ```
///
/// Devices with asymmetric framing (e.g., commands end in `"\n"`, responses in `"\r\n"`) can
/// either set a separate response terminator with
/// [`LoopbackInterfaceString::with_inst_terminator`] or use an empty terminator and spell out
/// the framing in every scripted line.
pub struct LoopbackInterfaceString {
    from_host: Vec<String>,
    from_inst: Vec<String>,
    host_terminator: String,
    inst_terminator: String,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    curr_bytes: VecDeque<u8>,
    terminator: String,
}

impl LoopbackInterfaceString {
    /// Create a new loopback interface.
    ///
    /// The lines in `from_host` are what the driver is expected to write, in order. The lines in
    /// `from_inst` are played back to the driver, in order, whenever it reads. `terminator_exp`
    /// is appended to both before they are compared or played back.
    ///
    /// Writing anything that is not the next expected line panics. Reading past the last
    /// response panics. Dropping the interface with unused lines left panics as well, see
    /// [`LoopbackInterfaceString::finalize`].
    ///
    /// # Arguments:
    /// * `from_host` - Lines from host to device, without terminator.
    /// * `from_inst` - Lines from device to host, without terminator.
    /// * `terminator_exp` - The terminator the driver is expected to use.
    pub fn new(from_host: Vec<String>, from_inst: Vec<String>, terminator_exp: &str) -> Self {
        LoopbackInterfaceString {
            from_host,
            from_inst,
            host_terminator: terminator_exp.to_string(),
            inst_terminator: terminator_exp.to_string(),
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            curr_bytes: VecDeque::new(),
            terminator: "\n".to_string(),
        }
    }

    /// Use a different terminator for the lines played back from the device.
    pub fn with_inst_terminator(mut self, terminator: &str) -> Self {
        self.inst_terminator = terminator.to_string();
        self
    }

    /// Panic if not all scripted lines were used.
    ///
    /// Called automatically on drop, unless the thread is already panicking.
    pub fn finalize(&mut self) {
        if let Some(line) = self.from_host.get(self.from_host_index.peek()) {
            panic!("Leftover expected commands found from host to instrument: {line:?}");
        }
        if let Some(line) = self.from_inst.get(self.from_inst_index.peek()) {
            panic!("Leftover expected commands found from instrument to host: {line:?}");
        }
        if !self.curr_bytes.is_empty() {
            panic!(
                "Leftover bytes from instrument to host: {:?}",
                String::from_utf8_lossy(self.curr_bytes.make_contiguous())
            );
        }
    }

    fn next_from_host(&mut self) -> String {
        let line = self
            .from_host
            .get(self.from_host_index.next())
            .expect("No more commands were expected from host to instrument.");
        format!("{line}{}", self.host_terminator)
    }

    fn next_from_inst(&mut self) -> String {
        let line = self
            .from_inst
            .get(self.from_inst_index.next())
            .expect("No more commands were expected from instrument to host.");
        format!("{line}{}", self.inst_terminator)
    }

    fn read_one_byte(&mut self) -> u8 {
        loop {
            if let Some(byte) = self.curr_bytes.pop_front() {
                return byte;
            }
            let line = self.next_from_inst();
            self.curr_bytes.extend(line.bytes());
        }
    }
}

impl InstrumentInterface for LoopbackInterfaceString {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self.read_one_byte();
        }
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let exp = self.next_from_host();
        assert_eq!(
            exp.as_bytes(),
            data,
            "Expected command {exp:?}, got {:?}",
            String::from_utf8_lossy(data)
        );
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }
}

impl Drop for LoopbackInterfaceString {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.finalize();
        }
    }
}
