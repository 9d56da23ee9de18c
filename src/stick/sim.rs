//! In-memory stick used by the tests.
//!
//! Parses the frames the host writes, answers INFO and ACKs the way the
//! firmware does, and can be told to misbehave.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::client::{Connection, StickClient};
use super::protocol::{
    ACK_OK, Ack, CMD_CONTINUE_IMAGE, CMD_INFO, CMD_NEW_IMAGE, CMD_OFF, CONTINUE_IMAGE_HEADER_SIZE, INFO_MAGIC,
    NEW_IMAGE_HEADER_SIZE, OFF_FRAME_SIZE,
};

struct SimState {
    max_pixels: u8,
    max_cols: u8,
    magic: u8,
    pending: Vec<u8>,
    outbox: VecDeque<u8>,
    written: Vec<u8>,
    frames: Vec<Vec<u8>>,
    crc: crc32fast::Hasher,
    height: usize,
    nacks: usize,
    corrupt_next: bool,
    hang_up_after: Option<usize>,
    closed: bool,
    held: bool,
}

impl SimState {
    /// Size of the frame at the head of `pending`, if enough is known.
    fn next_frame_len(&self) -> Option<usize> {
        let cmd = *self.pending.first()?;
        match cmd {
            CMD_INFO => Some(1),
            CMD_OFF => Some(OFF_FRAME_SIZE),
            CMD_NEW_IMAGE => {
                let header = self.pending.get(..NEW_IMAGE_HEADER_SIZE)?;
                let (height, cols) = (usize::from(header[1]), usize::from(header[3]));
                Some(NEW_IMAGE_HEADER_SIZE + cols * height * 3)
            }
            CMD_CONTINUE_IMAGE => {
                let header = self.pending.get(..CONTINUE_IMAGE_HEADER_SIZE)?;
                Some(CONTINUE_IMAGE_HEADER_SIZE + usize::from(header[2]) * self.height * 3)
            }
            _ => Some(1),
        }
    }

    fn process(&mut self) {
        while let Some(len) = self.next_frame_len() {
            if self.pending.len() < len {
                return;
            }
            let frame: Vec<u8> = self.pending.drain(..len).collect();
            self.handle(frame);
        }
    }

    fn handle(&mut self, frame: Vec<u8>) {
        if self.closed {
            return;
        }
        if frame[0] == CMD_INFO {
            self.outbox
                .extend([self.magic, 0x00, 0x00, self.max_pixels, self.max_cols]);
            self.crc = crc32fast::Hasher::new();
            return;
        }
        if frame[0] == CMD_NEW_IMAGE {
            self.height = usize::from(frame[1]);
        }

        self.crc.update(&frame);
        let mut crc = std::mem::take(&mut self.crc).finalize();
        self.frames.push(frame);

        if self.hang_up_after.is_some_and(|n| self.frames.len() >= n) {
            self.closed = true;
            return;
        }

        let status = if self.nacks > 0 {
            self.nacks -= 1;
            b'x'
        } else {
            ACK_OK
        };
        if self.corrupt_next {
            self.corrupt_next = false;
            crc = !crc;
        }
        self.outbox.extend(Ack { status, crc }.encode());
    }
}

/// Handle to the simulated stick; clones share the same device.
#[derive(Clone)]
pub(crate) struct SimulatedStick {
    state: Arc<(Mutex<SimState>, Condvar)>,
}

impl SimulatedStick {
    pub fn new(max_pixels: u8, max_cols: u8) -> Self {
        let state = SimState {
            max_pixels,
            max_cols,
            magic: INFO_MAGIC,
            pending: Vec::new(),
            outbox: VecDeque::new(),
            written: Vec::new(),
            frames: Vec::new(),
            crc: crc32fast::Hasher::new(),
            height: 0,
            nacks: 0,
            corrupt_next: false,
            hang_up_after: None,
            closed: false,
            held: false,
        };
        Self {
            state: Arc::new((Mutex::new(state), Condvar::new())),
        }
    }

    /// A client already attached to a fresh simulated stick.
    pub fn attached(max_pixels: u8, max_cols: u8) -> (StickClient, Self) {
        let sim = Self::new(max_pixels, max_cols);
        let mut client = StickClient::new();
        client.attach(sim.connection()).unwrap();
        sim.clear_log();
        (client, sim)
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.0.lock().unwrap()
    }

    pub fn connection(&self) -> Box<dyn Connection> {
        Box::new(SimConnection { sim: self.clone() })
    }

    pub fn set_magic(&self, magic: u8) {
        self.lock().magic = magic;
    }

    pub fn nack_next(&self, count: usize) {
        self.lock().nacks = count;
    }

    pub fn corrupt_next_ack(&self) {
        self.lock().corrupt_next = true;
    }

    /// Close the stream once `frames` frames have been received.
    pub fn hang_up_after(&self, frames: usize) {
        self.lock().hang_up_after = Some(frames);
    }

    /// Block every read until [`SimulatedStick::release_acks`].
    pub fn hold_acks(&self) {
        self.lock().held = true;
    }

    pub fn release_acks(&self) {
        self.lock().held = false;
        self.state.1.notify_all();
    }

    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.written.clear();
        state.frames.clear();
    }

    /// Every byte the host wrote.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Complete frames received, INFO excluded.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    pub fn count_frames(&self, cmd: u8) -> usize {
        self.lock().frames.iter().filter(|f| f[0] == cmd).count()
    }

    /// Wait until at least `count` frames have been received.
    pub fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock().unwrap();
        while state.frames.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = cvar.wait_timeout(state, deadline - now).unwrap().0;
        }
        true
    }
}

struct SimConnection {
    sim: SimulatedStick,
}

impl Read for SimConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (lock, cvar) = &*self.sim.state;
        let mut state = lock.lock().unwrap();
        while state.held && !state.closed {
            state = cvar.wait(state).unwrap();
        }
        // Nothing queued means nothing will ever arrive: report EOF.
        // Replies trickle out a few bytes at a time to exercise short reads.
        let n = buf.len().min(state.outbox.len()).min(3);
        for slot in &mut buf[..n] {
            *slot = state.outbox.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}

impl Write for SimConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let (lock, cvar) = &*self.sim.state;
        let mut state = lock.lock().unwrap();
        state.written.extend_from_slice(buf);
        state.pending.extend_from_slice(buf);
        state.process();
        cvar.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
