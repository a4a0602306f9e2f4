//! Control-transfer plumbing
//!
//! The RX2164 is polled with a single class/interface IN control transfer;
//! it has no interrupt endpoint and never signals "no new data" by itself.
//! This module holds the receiver's fixed protocol constants, the
//! [`FrameSource`] seam the poll loop reads through, and the rusb-backed
//! implementation of that seam.

use std::sync::Arc;
use std::time::Duration;

use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType};

use crate::frame::RawFrame;

/// USB vendor id of the RX2164 (0x16c0, Van Ooijen Technische Informatica).
pub const VENDOR_ID: u16 = 0x16c0;

/// USB product id of the RX2164.
pub const PRODUCT_ID: u16 = 0x05dc;

/// The single configuration the receiver exposes.
pub const CONFIGURATION: u8 = 1;

/// The single interface the receiver exposes.
pub const INTERFACE: u8 = 0;

/// Fixed delay between poll iterations.
pub const POLL_DELAY: Duration = Duration::from_millis(200);

/// Per-read control transfer timeout.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// bRequest of the polling control transfer.
const CONTROL_REQUEST: u8 = 0x9;

/// wValue of the polling control transfer.
const CONTROL_VALUE: u16 = 0x300;

/// wIndex of the polling control transfer.
const CONTROL_INDEX: u16 = 0;

/// Source of raw receiver frames, one blocking read at a time.
///
/// The poll loop is generic over this trait so it can be driven by scripted
/// frames in tests instead of real hardware.
pub trait FrameSource: Send {
    /// Perform one blocking read into `frame`, returning the number of
    /// bytes transferred.
    fn read_frame(&mut self, frame: &mut RawFrame) -> rusb::Result<usize>;
}

/// [`FrameSource`] over an open rusb device handle.
///
/// Shares the handle with the owning session; rusb transfer calls take
/// `&self`, so the session keeps its copy for release on close.
pub struct UsbFrameSource {
    handle: Arc<DeviceHandle<Context>>,
}

impl UsbFrameSource {
    pub fn new(handle: Arc<DeviceHandle<Context>>) -> Self {
        Self { handle }
    }
}

impl FrameSource for UsbFrameSource {
    fn read_frame(&mut self, frame: &mut RawFrame) -> rusb::Result<usize> {
        let request_type =
            rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface);
        self.handle.read_control(
            request_type,
            CONTROL_REQUEST,
            CONTROL_VALUE,
            CONTROL_INDEX,
            frame,
            READ_TIMEOUT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_request_type_is_class_interface_in() {
        let rt = rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface);
        // 0x80 (IN) | 0x20 (class) | 0x01 (interface)
        assert_eq!(rt, 0xA1);
    }

    #[test]
    fn protocol_constants() {
        assert_eq!(VENDOR_ID, 5824);
        assert_eq!(PRODUCT_ID, 1500);
        assert_eq!(POLL_DELAY, Duration::from_millis(200));
        assert_eq!(READ_TIMEOUT, Duration::from_millis(100));
    }
}
