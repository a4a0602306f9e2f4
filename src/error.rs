//! Driver error types

use thiserror::Error;

/// Errors surfaced while opening or driving the receiver.
///
/// Read failures inside the poll loop are deliberately absent: they are
/// non-fatal, logged at the point of occurrence, and the loop carries on
/// with the next iteration.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The USB subsystem failed to initialize.
    #[error("failed to initialize USB context: {0}")]
    TransportInit(rusb::Error),

    /// No device with the receiver's vendor/product id is attached.
    #[error("receiver {vendor_id:04x}:{product_id:04x} not found")]
    NotFound { vendor_id: u16, product_id: u16 },

    /// The device is held by another process.
    #[error("receiver is busy")]
    Busy,

    /// Setting the device configuration failed.
    #[error("failed to configure receiver: {0}")]
    Config(rusb::Error),

    /// Claiming the control interface failed.
    #[error("failed to claim interface {interface}: {source}")]
    Claim { interface: u8, source: rusb::Error },

    /// An operation that needs an open session was called before `open()`,
    /// or after `close()`.
    #[error("receiver is not open")]
    NotOpen,

    /// `start()` was called while the poll loop is already running.
    #[error("poll loop already started")]
    AlreadyStarted,
}

/// Type alias for driver results.
pub type Result<T> = std::result::Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_includes_identity() {
        let err = DeviceError::NotFound {
            vendor_id: 0x16c0,
            product_id: 0x05dc,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("16c0"));
        assert!(msg.contains("05dc"));
    }

    #[test]
    fn config_display_includes_cause() {
        let err = DeviceError::Config(rusb::Error::Io);
        assert!(format!("{}", err).contains("configure"));
    }
}
