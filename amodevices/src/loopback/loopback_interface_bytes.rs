//! Loopback interface for drivers that exchange raw byte packets without a terminator.

use std::{collections::VecDeque, thread};

use crate::{InstrumentError, InstrumentInterface, loopback::IncrIndex};

/// A scripted device that checks every packet the driver writes and plays back canned packets.
///
/// Works like [`LoopbackInterfaceString`](crate::LoopbackInterfaceString), but nothing is
/// appended to the packets. Drivers using this interface are expected to read responses with
/// [`InstrumentInterface::read_exact`] or [`InstrumentInterface::read_byte`].
pub struct LoopbackInterfaceBytes {
    from_host: Vec<Vec<u8>>,
    from_inst: Vec<Vec<u8>>,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    curr_bytes: VecDeque<u8>,
}

impl LoopbackInterfaceBytes {
    /// Create a new loopback interface.
    ///
    /// # Arguments:
    /// * `from_host` - Packets from host to device, in order.
    /// * `from_inst` - Packets from device to host, in order. Packets are concatenated when read.
    pub fn new(from_host: Vec<Vec<u8>>, from_inst: Vec<Vec<u8>>) -> Self {
        LoopbackInterfaceBytes {
            from_host,
            from_inst,
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            curr_bytes: VecDeque::new(),
        }
    }

    /// Panic if not all scripted packets were used.
    ///
    /// Called automatically on drop, unless the thread is already panicking.
    pub fn finalize(&mut self) {
        if let Some(packet) = self.from_host.get(self.from_host_index.peek()) {
            panic!("Leftover expected bytes found from host to instrument: {packet:?}");
        }
        if let Some(packet) = self.from_inst.get(self.from_inst_index.peek()) {
            panic!("Leftover expected bytes found from instrument to host: {packet:?}");
        }
        if !self.curr_bytes.is_empty() {
            panic!("Leftover bytes from instrument to host: {:?}", self.curr_bytes);
        }
    }

    fn read_one_byte(&mut self) -> u8 {
        loop {
            if let Some(byte) = self.curr_bytes.pop_front() {
                return byte;
            }
            let packet = self
                .from_inst
                .get(self.from_inst_index.next())
                .expect("No more bytes were expected from instrument to host.");
            self.curr_bytes.extend(packet.iter().copied());
        }
    }
}

impl InstrumentInterface for LoopbackInterfaceBytes {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self.read_one_byte();
        }
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let exp = self
            .from_host
            .get(self.from_host_index.next())
            .expect("No more bytes were expected from host to instrument.");
        assert_eq!(exp.as_slice(), data, "Expected bytes {exp:?}, got {data:?}");
        Ok(())
    }
}

impl Drop for LoopbackInterfaceBytes {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.finalize();
        }
    }
}
