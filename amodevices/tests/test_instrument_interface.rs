//! Tests for the default implementations of the [`InstrumentInterface`] trait.

use std::time::Duration;

use rstest::*;

use amodevices::{InstrumentError, InstrumentInterface};

/// Interface that only implements the required methods and records what is written.
#[derive(Default)]
struct MinimalInterface {
    written: Vec<u8>,
}

impl InstrumentInterface for MinimalInterface {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        buf.fill(b'\n');
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.written.extend_from_slice(data);
        Ok(())
    }
}

#[fixture]
fn intf() -> MinimalInterface {
    MinimalInterface::default()
}

#[rstest]
fn test_default_get_terminator(intf: MinimalInterface) {
    assert_eq!(intf.get_terminator(), "\n");
}

#[rstest]
fn test_default_set_terminator_is_ignored(mut intf: MinimalInterface) {
    intf.set_terminator("\r");
    assert_eq!(intf.get_terminator(), "\n");
}

#[rstest]
fn test_default_get_timeout(intf: MinimalInterface) {
    assert_eq!(intf.get_timeout(), Duration::from_secs(3));
}

#[rstest]
fn test_default_sendcmd_appends_terminator(mut intf: MinimalInterface) {
    intf.sendcmd("TVAL? 1").unwrap();
    intf.write(">").unwrap();
    assert_eq!(intf.written, b"TVAL? 1\n>");
}

#[rstest]
fn test_default_query_returns_empty_line(mut intf: MinimalInterface) {
    assert_eq!(intf.query("*IDN?").unwrap(), "");
    assert_eq!(intf.written, b"*IDN?\n");
}

#[rstest]
fn test_default_check_acknowledgment(mut intf: MinimalInterface) {
    intf.check_acknowledgment("").unwrap();
    match intf.check_acknowledgment(">") {
        Err(InstrumentError::NotAcknowledged(resp)) => assert_eq!(resp, ""),
        other => panic!("Expected not acknowledged error, got {other:?}"),
    }
}
