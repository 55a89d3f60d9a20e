//! Transport driver abstraction.
//!
//! A driver submits one ACBX and its buffers to a database and updates
//! both in place. The engine keeps exactly one driver per target URL and
//! creates it through a [`DriverFactory`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::abd::Buffer;
use crate::acbx::Acbx;
use crate::adatcp::AdaTcp;
use crate::config::ClientConfig;
use crate::error::{GenericError, Result};
use crate::id::AdaId;
use crate::logging::Logger;
use crate::url::{Driver, Url};

/// Submits calls to one database target.
#[async_trait]
pub trait TransportDriver: Send + Sync + fmt::Debug {
    /// Establishes the session with the target.
    async fn connect(&mut self, acbx: &Acbx) -> Result<()>;

    /// Sends one call; the reply is written into `acbx` and `buffers`.
    async fn send(&mut self, acbx: &mut Acbx, buffers: &mut [Buffer]) -> Result<()>;

    /// Ends the session. A second call fails with code 114.
    async fn disconnect(&mut self) -> Result<()>;

    /// Whether a session is established.
    fn is_connected(&self) -> bool;

    /// Short driver name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Locally linked native submitter.
///
/// This build carries no native library, so every call fails with code 49
/// and callers are pointed to an ADATCP URL.
#[derive(Debug, Default)]
pub struct NativeDriver {
    dbid: u32,
}

impl NativeDriver {
    /// Driver for database `dbid`.
    pub fn new(dbid: u32) -> Self {
        Self { dbid }
    }
}

#[async_trait]
impl TransportDriver for NativeDriver {
    async fn connect(&mut self, _acbx: &Acbx) -> Result<()> {
        Ok(())
    }

    async fn send(&mut self, _acbx: &mut Acbx, _buffers: &mut [Buffer]) -> Result<()> {
        tracing::debug!(dbid = self.dbid, "native call requested");
        Err(GenericError::native_unavailable().into())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Creates the driver for a target.
pub trait DriverFactory: Send + Sync + fmt::Debug {
    /// Driver for `url`, not yet connected.
    fn create(&self, url: &Url, id: &AdaId) -> Result<Box<dyn TransportDriver>>;
}

/// Factory selecting the driver from the URL scheme.
#[derive(Debug, Clone)]
pub struct DefaultDriverFactory {
    config: ClientConfig,
    logger: Arc<dyn Logger>,
}

impl DefaultDriverFactory {
    /// Factory passing `config` and `logger` to every driver it creates.
    pub fn new(config: ClientConfig, logger: Arc<dyn Logger>) -> Self {
        Self { config, logger }
    }
}

impl DriverFactory for DefaultDriverFactory {
    fn create(&self, url: &Url, id: &AdaId) -> Result<Box<dyn TransportDriver>> {
        match url.driver {
            Driver::Native if url.port != 0 => {
                Err(GenericError::entire_network_unsupported().into())
            }
            Driver::Native => Ok(Box::new(NativeDriver::new(url.dbid))),
            Driver::AdaTcp | Driver::AdaTcps => Ok(Box::new(AdaTcp::new(
                url.clone(),
                id.clone(),
                self.config.clone(),
                self.logger.clone(),
            )?)),
            Driver::EntireNetwork => Err(GenericError::entire_network_unsupported().into()),
        }
    }
}
