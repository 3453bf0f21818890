//! This module provides the implementation for a device controlled via TCP/IP.
//!
//! It includes a blocking implementation of the [`InstrumentInterface`](crate::InstrumentInterface)
//! trait using the [`std::net::TcpStream`] struct.

use std::{
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use tracing::info;

use crate::{Instrument, InstrumentError};

/// A blocking TCP/IP interface builder using the [`std::net::TcpStream`] struct.
#[derive(Debug)]
pub struct TcpIpInterface {}

impl TcpIpInterface {
    /// Connect to the given socket address with a timeout of three seconds.
    ///
    /// The terminator is `"\n"` by default and can be changed with `set_terminator`.
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address, e.g., `"192.168.1.20:5000"`.
    pub fn try_new<A: ToSocketAddrs>(
        sock_addr: A,
    ) -> Result<Instrument<TcpStream>, InstrumentError> {
        Self::with_timeout(sock_addr, Duration::from_secs(3))
    }

    /// Connect to the given socket address with the given read and write timeout.
    ///
    /// A read that does not see the terminator within `timeout` fails with
    /// [`InstrumentError::Timeout`] instead of blocking forever.
    pub fn with_timeout<A: ToSocketAddrs>(
        sock_addr: A,
        timeout: Duration,
    ) -> Result<Instrument<TcpStream>, InstrumentError> {
        let stream = TcpStream::connect(sock_addr)?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_read_timeout(Some(timeout))?;
        if let Ok(peer) = stream.peer_addr() {
            info!("Opened TCP/IP connection to {peer}");
        }
        Ok(Instrument::new(stream, timeout))
    }
}
