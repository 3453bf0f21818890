//! Scripted stand-ins for devices, used to test drivers without hardware.
//!
//! - [`LoopbackInterfaceString`] for devices that talk in terminated lines of text.
//! - [`LoopbackInterfaceBytes`] for devices that exchange raw byte packets.
//! - [`LoopbackResourceManager`] for drivers that connect through
//!   [`VisaInterface::init`](crate::VisaInterface::init).
//! - [`LoopbackDaqSystem`] and [`LoopbackDaqTask`] for drivers built on the
//!   [`daq`](crate::daq) traits.
//!
//! All of them panic on traffic that was not scripted and on scripted traffic that was never
//! used, such that a passing test proves that the driver produced exactly the expected frames.

mod loopback_daq;
mod loopback_interface_bytes;
mod loopback_interface_string;
mod loopback_resource_manager;

pub use loopback_daq::*;
pub use loopback_interface_bytes::*;
pub use loopback_interface_string::*;
pub use loopback_resource_manager::*;

/// Position in a script of expected frames.
#[derive(Debug, Default)]
struct IncrIndex {
    index: usize,
}

impl IncrIndex {
    /// Current position, then advance by one.
    fn next(&mut self) -> usize {
        let pos = self.index;
        self.index += 1;
        pos
    }

    /// Current position without advancing.
    fn peek(&self) -> usize {
        self.index
    }
}
