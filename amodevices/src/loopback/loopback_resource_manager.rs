//! Loopback VISA resource manager.

use std::{io, time::Duration};

use crate::{InstrumentError, LoopbackInterfaceString, VisaResourceManager};

/// A VISA resource manager with a fixed list of resources that hands out one scripted
/// [`LoopbackInterfaceString`] when a resource is opened.
///
/// The loopback interface should expect the `*IDN?` query (and `CmdOnInit`, if configured) that
/// [`VisaInterface::init`](crate::VisaInterface::init) sends.
pub struct LoopbackResourceManager {
    resources: Vec<String>,
    interface: Option<LoopbackInterfaceString>,
}

impl LoopbackResourceManager {
    /// Create a resource manager that lists `resources` and opens `interface`.
    pub fn new(resources: Vec<String>, interface: LoopbackInterfaceString) -> Self {
        Self {
            resources,
            interface: Some(interface),
        }
    }

    /// Create a resource manager that lists `resources`, but fails to open any of them.
    pub fn refusing(resources: Vec<String>) -> Self {
        Self {
            resources,
            interface: None,
        }
    }
}

impl VisaResourceManager for LoopbackResourceManager {
    type Resource = LoopbackInterfaceString;

    fn list_resources(&mut self) -> Result<Vec<String>, InstrumentError> {
        Ok(self.resources.clone())
    }

    fn open(
        &mut self,
        address: &str,
        _timeout: Duration,
    ) -> Result<Self::Resource, InstrumentError> {
        assert!(
            self.resources.iter().any(|res| res == address),
            "Resource {address:?} was opened without being listed"
        );
        self.interface.take().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("resource '{address}' refused the connection"),
            )
            .into()
        })
    }
}
