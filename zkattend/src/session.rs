//! Session lifecycle around a burst of device calls

use tracing::{debug, warn};

use zkattend_gateway::{DeviceSession, Gateway};
use zkattend_types::DeviceDescriptor;

use crate::error::{Error, Result};

/// An open session that must be handed back through [`ManagedSession::release`]
///
/// Release re-enables the terminal and closes the session, so a terminal is
/// never left in its suspended state once a session was obtained.
pub struct ManagedSession {
    device: String,
    session: Box<dyn DeviceSession>,
}

impl ManagedSession {
    /// Connect without suspending the terminal
    pub async fn connect(gateway: &dyn Gateway, device: &DeviceDescriptor) -> Result<Self> {
        let session = gateway
            .connect(device)
            .await
            .map_err(|source| Error::Connection {
                device: device.name.clone(),
                source,
            })?;
        debug!("Session with {} opened", device);

        Ok(Self {
            device: device.name.clone(),
            session,
        })
    }

    /// Connect and suspend the terminal for a consistent read/write burst
    pub async fn open(gateway: &dyn Gateway, device: &DeviceDescriptor) -> Result<Self> {
        let mut managed = Self::connect(gateway, device).await?;
        if let Err(source) = managed.session.disable().await {
            managed.release().await;
            return Err(Error::Operation {
                action: "disable device",
                source,
            });
        }
        Ok(managed)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn session(&mut self) -> &mut dyn DeviceSession {
        self.session.as_mut()
    }

    /// Enable, then close; failures are logged and swallowed
    pub async fn release(mut self) {
        if let Err(e) = self.session.enable().await {
            warn!("Failed to re-enable {}: {}", self.device, e);
        }
        if let Err(e) = self.session.close().await {
            warn!("Failed to close session with {}: {}", self.device, e);
        }
        debug!("Session with {} released", self.device);
    }
}
