//! RX2164 receiver
//!
//! Lifecycle control, the background poll loop, and command dispatch.
//!
//! The receiver never pushes data: the poll loop issues one control-transfer
//! read per iteration and relies on the toggle counter (see [`crate::frame`])
//! to tell a fresh command apart from the stale frame the device returns
//! when nothing new has arrived. Exactly two threads ever touch this state:
//! the caller's (open/start/pause/close) and the single poll thread spawned
//! by `start()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::device::DeviceSession;
use crate::error::{DeviceError, Result};
use crate::frame::{self, Command, FRAME_SIZE, RawFrame, ToggleTracker};
use crate::transport::{FrameSource, POLL_DELAY, UsbFrameSource};

/// Observer capability invoked for every newly detected command.
///
/// Called synchronously on the poll thread. Failure handling is the
/// implementation's own contract; nothing is caught here.
pub trait Watcher: Send + Sync {
    fn on_command(&self, command: Command);
}

/// Shutdown/pause flags shared between the caller and the poll loop.
///
/// Shutdown is one-way: once set it is never cleared. Pause toggles freely.
/// The flags are independent relaxed atomics; the loop may observe a write
/// up to one iteration late.
#[derive(Debug, Default)]
pub struct ControlFlags {
    shutdown: AtomicBool,
    pause: AtomicBool,
}

impl ControlFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.pause.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::Relaxed)
    }
}

/// Run the poll loop until the shutdown flag is observed.
///
/// One blocking read per iteration when not paused. A failed read is logged
/// and the iteration proceeds without touching the stored toggle; change
/// detection only runs on iterations whose read succeeded, so a stale or
/// never-filled buffer can never produce a command. The frame buffer is
/// reused across iterations.
pub(crate) fn run_poll_loop<S: FrameSource>(
    mut source: S,
    flags: Arc<ControlFlags>,
    watcher: Option<Arc<dyn Watcher>>,
    delay: Duration,
) {
    info!("RX2164 poll loop started");

    let mut buf: RawFrame = [0; FRAME_SIZE];
    let mut toggles = ToggleTracker::new();

    while !flags.is_shutdown() {
        if !flags.is_paused() {
            match source.read_frame(&mut buf) {
                Ok(_) => {
                    let toggle = frame::toggle(&buf);
                    if toggles.observe(toggle) {
                        let command = Command::decode(&buf);
                        debug!(
                            toggle,
                            channel = command.channel,
                            action = command.action,
                            frame = ?buf,
                            "new command received"
                        );
                        if let Some(watcher) = &watcher {
                            watcher.on_command(command);
                        }
                    }
                }
                Err(e) => {
                    warn!("poll read failed: {}", e);
                }
            }
        }

        thread::sleep(delay);
    }

    info!("RX2164 poll loop stopped");
}

/// Driver for the NooLite RX2164 USB radio receiver.
///
/// Lifecycle: `new` → optional [`add_watcher`](Self::add_watcher) →
/// [`open`](Self::open) → [`start`](Self::start) →
/// ([`pause`](Self::pause)/[`resume`](Self::resume)) →
/// [`close`](Self::close). Closed is terminal: construct a fresh receiver
/// to reopen.
pub struct Rx2164 {
    session: DeviceSession,
    flags: Arc<ControlFlags>,
    watcher: Option<Arc<dyn Watcher>>,
    poll_thread: Option<JoinHandle<()>>,
}

impl Rx2164 {
    pub fn new() -> Self {
        Self {
            session: DeviceSession::new(),
            flags: Arc::new(ControlFlags::new()),
            watcher: None,
            poll_thread: None,
        }
    }

    /// Register the command observer.
    ///
    /// Must be called before [`start`](Self::start); without one, decoded
    /// commands are silently dropped.
    pub fn add_watcher(&mut self, watcher: Arc<dyn Watcher>) {
        self.watcher = Some(watcher);
    }

    /// Open and claim the receiver. See [`DeviceSession::open`].
    pub fn open(&mut self) -> Result<()> {
        self.session.open()
    }

    /// Spawn the background poll thread.
    ///
    /// Fails with [`DeviceError::NotOpen`] before a successful
    /// [`open`](Self::open) and with [`DeviceError::AlreadyStarted`] on a
    /// second call, so reads can never run against an invalid handle.
    pub fn start(&mut self) -> Result<()> {
        if self.poll_thread.is_some() {
            return Err(DeviceError::AlreadyStarted);
        }
        let handle = self.session.handle().ok_or(DeviceError::NotOpen)?;

        info!("starting RX2164 poll loop");

        let source = UsbFrameSource::new(handle);
        let flags = Arc::clone(&self.flags);
        let watcher = self.watcher.clone();

        let thread = thread::Builder::new()
            .name("rx2164-poll".to_string())
            .spawn(move || run_poll_loop(source, flags, watcher, POLL_DELAY))
            .expect("failed to spawn RX2164 poll thread");

        self.poll_thread = Some(thread);
        Ok(())
    }

    /// Suspend reads without stopping the poll loop.
    pub fn pause(&self) {
        self.flags.set_paused(true);
    }

    /// Resume reads; detection continues from the last stored toggle.
    pub fn resume(&self) {
        self.flags.set_paused(false);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.is_paused()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// Shut down the receiver.
    ///
    /// Sets the shutdown flag, waits for the poll thread to observe it and
    /// exit, then releases the device. Idempotent: repeated calls, or a
    /// call on a never-opened receiver, only ever assign the flag.
    pub fn close(&mut self) {
        info!("closing RX2164");
        self.flags.shutdown();
        if let Some(thread) = self.poll_thread.take() {
            if thread.join().is_err() {
                warn!("RX2164 poll thread panicked");
            }
        }
        self.session.close();
    }
}

impl Default for Rx2164 {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Rx2164 {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Watcher that records every dispatched command.
    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<Command>>,
    }

    impl Recorder {
        fn taken(&self) -> Vec<Command> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl Watcher for Recorder {
        fn on_command(&self, command: Command) {
            self.commands.lock().unwrap().push(command);
        }
    }

    /// Frame source that replays a fixed script and requests shutdown once
    /// the script is exhausted.
    struct ScriptedSource {
        script: Vec<rusb::Result<RawFrame>>,
        cursor: usize,
        flags: Arc<ControlFlags>,
    }

    impl ScriptedSource {
        fn new(script: Vec<rusb::Result<RawFrame>>, flags: Arc<ControlFlags>) -> Self {
            Self {
                script,
                cursor: 0,
                flags,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self, frame: &mut RawFrame) -> rusb::Result<usize> {
            assert!(
                !self.flags.is_paused(),
                "read issued while the pause flag is set"
            );
            let step = match self.script.get(self.cursor) {
                Some(step) => *step,
                None => {
                    self.flags.shutdown();
                    return Err(rusb::Error::Timeout);
                }
            };
            self.cursor += 1;
            if self.cursor == self.script.len() {
                self.flags.shutdown();
            }
            match step {
                Ok(f) => {
                    *frame = f;
                    Ok(FRAME_SIZE)
                }
                Err(e) => Err(e),
            }
        }
    }

    fn frame(toggle: u8, channel: u8, action: u8) -> rusb::Result<RawFrame> {
        Ok([toggle, channel, action, 0, 0, 0, 0, 0])
    }

    fn run_script(script: Vec<rusb::Result<RawFrame>>) -> Vec<Command> {
        let flags = Arc::new(ControlFlags::new());
        let recorder = Arc::new(Recorder::default());
        let source = ScriptedSource::new(script, Arc::clone(&flags));
        let watcher: Arc<dyn Watcher> = recorder.clone();
        run_poll_loop(source, flags, Some(watcher), Duration::ZERO);
        recorder.taken()
    }

    #[test]
    fn repeated_toggles_emit_once() {
        // [5, 5, 5, 6, 6, 9]: the startup frame emits (first reading is
        // always new), then only the transitions to 6 and 9 do.
        let commands = run_script(vec![
            frame(5, 0, 0),
            frame(5, 0, 0),
            frame(5, 0, 0),
            frame(6, 3, 1),
            frame(6, 3, 1),
            frame(9, 7, 2),
        ]);
        assert_eq!(
            commands,
            vec![
                Command {
                    channel: 1,
                    action: 0
                },
                Command {
                    channel: 4,
                    action: 1
                },
                Command {
                    channel: 8,
                    action: 2
                },
            ]
        );
    }

    #[test]
    fn first_frame_is_always_dispatched() {
        // Even a toggle of zero, which matched the original driver's
        // initial comparison value and was silently dropped there.
        let commands = run_script(vec![frame(0, 2, 4)]);
        assert_eq!(
            commands,
            vec![Command {
                channel: 3,
                action: 4
            }]
        );
    }

    #[test]
    fn read_error_leaves_stored_toggle_unchanged() {
        // A failed read must not disturb detection: a later read with the
        // same toggle emits nothing, a later read with a new toggle emits
        // exactly one command.
        let commands = run_script(vec![
            frame(5, 1, 1),
            Err(rusb::Error::Io),
            frame(5, 1, 1),
            frame(9, 2, 2),
        ]);
        assert_eq!(
            commands,
            vec![
                Command {
                    channel: 2,
                    action: 1
                },
                Command {
                    channel: 3,
                    action: 2
                },
            ]
        );
    }

    #[test]
    fn no_watcher_means_commands_are_dropped() {
        let flags = Arc::new(ControlFlags::new());
        let source = ScriptedSource::new(vec![frame(5, 1, 1)], Arc::clone(&flags));
        // Must terminate normally with nothing registered.
        run_poll_loop(source, flags, None, Duration::ZERO);
    }

    #[test]
    fn pause_suppresses_reads_and_emissions() {
        let flags = Arc::new(ControlFlags::new());
        let recorder = Arc::new(Recorder::default());

        // The scripted source asserts it is never read while paused.
        let source = ScriptedSource::new(vec![frame(7, 3, 1)], Arc::clone(&flags));
        flags.set_paused(true);

        let loop_flags = Arc::clone(&flags);
        let loop_watcher: Arc<dyn Watcher> = recorder.clone();
        let poll = thread::spawn(move || {
            run_poll_loop(
                source,
                loop_flags,
                Some(loop_watcher),
                Duration::from_millis(1),
            )
        });

        // Let the loop spin paused for a while: no reads, no commands.
        thread::sleep(Duration::from_millis(50));
        assert!(recorder.taken().is_empty());

        // Resuming picks detection back up from the stored (empty) state.
        flags.set_paused(false);
        poll.join().expect("poll loop panicked");

        assert_eq!(
            recorder.taken(),
            vec![Command {
                channel: 4,
                action: 1
            }]
        );
    }

    #[test]
    fn shutdown_stops_the_loop_before_any_read() {
        let flags = Arc::new(ControlFlags::new());
        flags.shutdown();
        struct NoRead;
        impl FrameSource for NoRead {
            fn read_frame(&mut self, _frame: &mut RawFrame) -> rusb::Result<usize> {
                panic!("read after shutdown");
            }
        }
        run_poll_loop(NoRead, flags, None, Duration::ZERO);
    }

    #[test]
    fn control_flags_shutdown_is_one_way() {
        let flags = ControlFlags::new();
        assert!(!flags.is_shutdown());
        flags.shutdown();
        flags.shutdown();
        assert!(flags.is_shutdown());

        flags.set_paused(true);
        assert!(flags.is_paused());
        flags.set_paused(false);
        assert!(!flags.is_paused());
        assert!(flags.is_shutdown());
    }

    #[test]
    fn start_before_open_is_rejected() {
        let mut rx = Rx2164::new();
        assert!(matches!(rx.start(), Err(DeviceError::NotOpen)));
    }

    #[test]
    fn close_is_idempotent() {
        let mut rx = Rx2164::new();
        rx.close();
        rx.close();
        assert!(rx.flags.is_shutdown());
        assert!(!rx.is_open());
        // start() after close stays rejected.
        assert!(matches!(rx.start(), Err(DeviceError::NotOpen)));
    }
}
