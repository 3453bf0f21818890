//! Connections to VISA resources.
//!
//! A [`VisaResourceManager`] enumerates and opens resources. [`VisaInterface::init`] uses it to
//! connect to the resource named in a [`DeviceConfig`], checks the identity of the device, and
//! returns an interface that wraps all communication faults into
//! [`InstrumentError::Communication`].

use std::time::Duration;

use tracing::{error, info, warn};

use crate::{DeviceConfig, InstrumentError, InstrumentInterface};

/// A resource manager that knows which VISA resources are available and can open them.
pub trait VisaResourceManager {
    /// The interface of an opened resource.
    type Resource: InstrumentInterface;

    /// List the names of all available resources.
    fn list_resources(&mut self) -> Result<Vec<String>, InstrumentError>;

    /// Open the resource with the given name.
    fn open(&mut self, address: &str, timeout: Duration)
    -> Result<Self::Resource, InstrumentError>;
}

/// An opened VISA resource.
///
/// Created with [`VisaInterface::init`]. All errors of the underlying resource are reported as
/// [`InstrumentError::Communication`], naming the device and the resource.
pub struct VisaInterface<R: InstrumentInterface> {
    resource: R,
    device: String,
    address: String,
    idn: String,
    identity_mismatch: bool,
}

impl<R: InstrumentInterface> VisaInterface<R> {
    /// Connect to the VISA resource named by `config.address`.
    ///
    /// The steps are:
    /// 1. Check that the resource is listed by the resource manager, otherwise fail with
    ///    [`InstrumentError::DeviceNotFound`].
    /// 2. Open the resource with the configured timeout, otherwise fail with
    ///    [`InstrumentError::ConnectionFailed`].
    /// 3. Query `*IDN?`. If `VISAIDN` is configured and differs from the answer, a warning is
    ///    logged and [`VisaInterface::identity_mismatch`] returns `true`. This is not an error.
    /// 4. Send `CmdOnInit` once, if configured.
    pub fn init<M>(rm: &mut M, config: &DeviceConfig) -> Result<Self, InstrumentError>
    where
        M: VisaResourceManager<Resource = R>,
    {
        let resources = rm.list_resources()?;
        if !resources.iter().any(|res| res == &config.address) {
            error!(
                "{}: VISA resource '{}' not found",
                config.device, config.address
            );
            return Err(InstrumentError::DeviceNotFound(format!(
                "{}: VISA resource '{}' not found",
                config.device, config.address
            )));
        }

        let resource = rm
            .open(&config.address, config.timeout())
            .map_err(|err| {
                error!(device = %config.device, address = %config.address, "{err}");
                InstrumentError::ConnectionFailed {
                    device: config.device.clone(),
                    reason: format!("VISA resource '{}': {err}", config.address),
                }
            })?;

        let mut intf = Self {
            resource,
            device: config.device.clone(),
            address: config.address.clone(),
            idn: String::new(),
            identity_mismatch: false,
        };

        intf.idn = intf.query("*IDN?")?;
        if let Some(expected) = &config.visa_idn {
            if expected != &intf.idn {
                warn!(
                    "{}: Identity '{}' of VISA resource '{}' does not match expected identity '{}'",
                    intf.device, intf.idn, intf.address, expected
                );
                intf.identity_mismatch = true;
            }
        }
        if let Some(cmd) = &config.cmd_on_init {
            intf.sendcmd(cmd)?;
        }
        info!(
            "{}: Connected to VISA resource '{}' ({})",
            intf.device, intf.address, intf.idn
        );
        Ok(intf)
    }

    /// The answer of the device to `*IDN?` when it was connected.
    pub fn idn(&self) -> &str {
        &self.idn
    }

    /// Whether the identity of the device differs from the configured `VISAIDN`.
    pub fn identity_mismatch(&self) -> bool {
        self.identity_mismatch
    }

    /// Name of the device.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// VISA resource name.
    pub fn address(&self) -> &str {
        &self.address
    }

    fn wrap(&self, err: InstrumentError) -> InstrumentError {
        match err {
            InstrumentError::Communication { .. } => err,
            err => InstrumentError::Communication {
                device: self.device.clone(),
                address: self.address.clone(),
                description: err.to_string(),
            },
        }
    }
}

impl<R: InstrumentInterface> InstrumentInterface for VisaInterface<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        self.resource.read_exact(buf).map_err(|err| self.wrap(err))
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.resource.write_raw(data).map_err(|err| self.wrap(err))
    }

    fn get_terminator(&self) -> &str {
        self.resource.get_terminator()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.resource.set_terminator(terminator);
    }

    fn get_timeout(&self) -> Duration {
        self.resource.get_timeout()
    }
}

#[cfg(feature = "visa")]
mod visa_rs_backend {
    use std::{ffi::CString, time::Duration};

    use visa_rs::{VisaString, prelude::*};

    use super::VisaResourceManager;
    use crate::{Instrument, InstrumentError};

    /// Resource manager backed by the system's VISA library through the `visa-rs` crate.
    pub struct VisaRsResourceManager {
        rm: DefaultRM,
    }

    impl VisaRsResourceManager {
        /// Open the default resource manager of the VISA library.
        pub fn new() -> Result<Self, InstrumentError> {
            let rm = DefaultRM::new().map_err(|err| InstrumentError::ConnectionFailed {
                device: "VISA resource manager".to_string(),
                reason: err.to_string(),
            })?;
            Ok(Self { rm })
        }
    }

    fn visa_string(value: &str) -> Result<VisaString, InstrumentError> {
        let c_string = CString::new(value).map_err(|_| {
            InstrumentError::InvalidArgument(format!("Invalid VISA string '{value}'"))
        })?;
        Ok(VisaString::from(c_string))
    }

    impl VisaResourceManager for VisaRsResourceManager {
        type Resource = Instrument<visa_rs::Instrument>;

        fn list_resources(&mut self) -> Result<Vec<String>, InstrumentError> {
            let mut list = self
                .rm
                .find_res_list(&visa_string("?*INSTR")?)
                .map_err(|err| InstrumentError::DeviceNotFound(format!("No VISA resources: {err}")))?;
            let mut resources = Vec::new();
            while let Some(res) = list
                .find_next()
                .map_err(|err| InstrumentError::DeviceNotFound(err.to_string()))?
            {
                resources.push(res.to_string());
            }
            Ok(resources)
        }

        fn open(
            &mut self,
            address: &str,
            timeout: Duration,
        ) -> Result<Self::Resource, InstrumentError> {
            let inst = self
                .rm
                .open(&visa_string(address)?, AccessMode::NO_LOCK, timeout)
                .map_err(|err| InstrumentError::ConnectionFailed {
                    device: address.to_string(),
                    reason: err.to_string(),
                })?;
            Ok(Instrument::new(inst, timeout))
        }
    }
}

#[cfg(feature = "visa")]
pub use visa_rs_backend::VisaRsResourceManager;
