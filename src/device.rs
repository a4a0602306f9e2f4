//! Device session
//!
//! Owns the rusb context and the open device handle, and walks the
//! open/configure/claim sequence the RX2164 requires. The session holds no
//! partial state: any failure during `open()` drops whatever was acquired
//! and leaves the session closed.

use std::sync::Arc;

use rusb::{Context, DeviceHandle, UsbContext};
use tracing::{debug, info, warn};

use crate::error::{DeviceError, Result};
use crate::transport::{CONFIGURATION, INTERFACE, PRODUCT_ID, VENDOR_ID};

/// Exclusive owner of the open receiver handle.
pub struct DeviceSession {
    context: Option<Context>,
    handle: Option<Arc<DeviceHandle<Context>>>,
}

impl DeviceSession {
    pub fn new() -> Self {
        Self {
            context: None,
            handle: None,
        }
    }

    /// Open the receiver.
    ///
    /// Initializes the USB context, locates the device by vendor/product
    /// id, detaches a kernel driver if one holds the interface, sets the
    /// device configuration, and claims the interface. On any failure the
    /// session stays closed with no handle retained.
    pub fn open(&mut self) -> Result<()> {
        info!("opening RX2164 receiver");

        let context = Context::new().map_err(DeviceError::TransportInit)?;

        let Some(handle) = context.open_device_with_vid_pid(VENDOR_ID, PRODUCT_ID) else {
            warn!(
                "RX2164 not found ({:04x}:{:04x})",
                VENDOR_ID, PRODUCT_ID
            );
            return Err(DeviceError::NotFound {
                vendor_id: VENDOR_ID,
                product_id: PRODUCT_ID,
            });
        };

        match handle.kernel_driver_active(INTERFACE) {
            Ok(true) => {
                debug!("detaching kernel driver from interface {}", INTERFACE);
                if let Err(e) = handle.detach_kernel_driver(INTERFACE) {
                    warn!("failed to detach kernel driver: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!("could not query kernel driver state: {}", e);
            }
        }

        if let Err(e) = handle.set_active_configuration(CONFIGURATION) {
            // Handle is dropped here; nothing partially acquired survives.
            return Err(match e {
                rusb::Error::Busy => {
                    warn!("RX2164 is busy");
                    DeviceError::Busy
                }
                other => {
                    warn!("failed to configure RX2164: {}", other);
                    DeviceError::Config(other)
                }
            });
        }

        handle
            .claim_interface(INTERFACE)
            .map_err(|source| DeviceError::Claim {
                interface: INTERFACE,
                source,
            })?;

        info!("RX2164 opened, interface {} claimed", INTERFACE);
        self.handle = Some(Arc::new(handle));
        self.context = Some(context);
        Ok(())
    }

    /// Close the session.
    ///
    /// Releases the claimed interface and drops the handle and context.
    /// Idempotent: a second call, or a call on a never-opened session,
    /// performs no destructive action.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.release_interface(INTERFACE) {
                debug!("failed to release interface {}: {}", INTERFACE, e);
            }
            info!("RX2164 closed");
        }
        self.context = None;
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Shared handle for the poll loop. `None` while the session is closed.
    pub fn handle(&self) -> Option<Arc<DeviceHandle<Context>>> {
        self.handle.clone()
    }
}

impl Default for DeviceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}
