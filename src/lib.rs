//! Driver for the NooLite RX2164 USB radio receiver.
//!
//! The RX2164 captures commands from paired NooLite transmitters (wall
//! switches, remotes) and exposes them over a USB control endpoint. This
//! crate opens and claims the device, runs a low-latency background poll
//! loop against it, detects genuinely new commands via the frame's rolling
//! toggle counter, and hands each decoded (channel, action) pair to a
//! registered [`Watcher`].
//!
//! The driver does not interpret action codes and does not manage more than
//! one receiver; it delivers raw decoded commands and leaves their meaning
//! to the consumer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use noolite_rx::{Command, Rx2164, Watcher};
//!
//! struct Printer;
//!
//! impl Watcher for Printer {
//!     fn on_command(&self, command: Command) {
//!         println!("channel {} action {}", command.channel, command.action);
//!     }
//! }
//!
//! fn main() -> noolite_rx::Result<()> {
//!     let mut rx = Rx2164::new();
//!     rx.add_watcher(Arc::new(Printer));
//!     rx.open()?;
//!     rx.start()?;
//!     // ... commands are dispatched on the poll thread until ...
//!     rx.close();
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod error;
pub mod frame;
pub mod receiver;
pub mod transport;

pub use device::DeviceSession;
pub use error::{DeviceError, Result};
pub use frame::{CHANNEL_CAPACITY, Command, FRAME_SIZE, RawFrame, TOGGLE_MASK, ToggleTracker};
pub use receiver::{ControlFlags, Rx2164, Watcher};
pub use transport::{
    CONFIGURATION, FrameSource, INTERFACE, POLL_DELAY, PRODUCT_ID, READ_TIMEOUT, UsbFrameSource,
    VENDOR_ID,
};
