//! Background transmission of images to the stick.
//!
//! The caller thread only ever touches a single-slot mailbox; the worker
//! thread is the only one that drives the [`StickClient`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::stick::{CancelToken, Image, Playback, StickClient, StickError};

/// Lifecycle notifications for a transmission.
///
/// Called from the worker thread.
pub trait SenderCallbacks: Send + Sync {
    /// A request has been picked up.
    fn start(&self);
    /// Percentage of the current pass acknowledged by the stick, 0 to 100.
    ///
    /// No guarantee is made on how often this is called.
    fn progress(&self, percent: u8);
    /// The request is over, whatever the outcome.
    fn done(&self);
    /// The transmission failed. Never called for a user-initiated stop.
    fn on_error(&self, err: &StickError);
}

/// An image together with the settings to play it with.
#[derive(Debug, Clone)]
pub struct TransmissionRequest {
    pub image: Arc<Image>,
    pub playback: Playback,
}

/// Events forwarded by [`ChannelCallbacks`].
#[derive(Debug, Clone, PartialEq)]
pub enum SenderEvent {
    Started,
    Progress { percent: u8 },
    Done,
    Error(String),
}

/// Callbacks that forward every event to an async receiver.
pub struct ChannelCallbacks {
    tx: mpsc::UnboundedSender<SenderEvent>,
}

impl ChannelCallbacks {
    pub fn new(tx: mpsc::UnboundedSender<SenderEvent>) -> Self {
        Self { tx }
    }

    /// Create the callbacks and the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SenderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl SenderCallbacks for ChannelCallbacks {
    fn start(&self) {
        let _ = self.tx.send(SenderEvent::Started);
    }

    fn progress(&self, percent: u8) {
        let _ = self.tx.send(SenderEvent::Progress { percent });
    }

    fn done(&self) {
        let _ = self.tx.send(SenderEvent::Done);
    }

    fn on_error(&self, err: &StickError) {
        let _ = self.tx.send(SenderEvent::Error(err.to_string()));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Slot {
    pending: Option<TransmissionRequest>,
    closed: bool,
}

/// Single-slot mailbox: a new request replaces one not yet picked up.
struct Mailbox {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                pending: None,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Store the request, returns false once the mailbox is closed.
    fn post(&self, request: TransmissionRequest) -> bool {
        let mut slot = lock(&self.slot);
        if slot.closed {
            return false;
        }
        if slot.pending.replace(request).is_some() {
            debug!("Pending request superseded");
        }
        self.ready.notify_all();
        true
    }

    fn close(&self) {
        let mut slot = lock(&self.slot);
        slot.closed = true;
        slot.pending = None;
        self.ready.notify_all();
    }

    /// Block until a request is available, `None` once closed.
    fn wait(&self) -> Option<TransmissionRequest> {
        let mut slot = lock(&self.slot);
        loop {
            if slot.closed {
                return None;
            }
            if let Some(request) = slot.pending.take() {
                return Some(request);
            }
            slot = self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// One worker thread with its own mailbox and cancellation token.
///
/// The token is read by [`StickClient::show_image`] between batches, outside
/// any mailbox call, so it is an atomic beside the slot rather than a field
/// under the slot lock.
struct Worker {
    mailbox: Arc<Mailbox>,
    cancel: CancelToken,
}

impl Worker {
    fn spawn(stick: Arc<Mutex<StickClient>>, callbacks: Arc<dyn SenderCallbacks>) -> std::io::Result<Self> {
        let mailbox = Arc::new(Mailbox::new());
        let cancel = CancelToken::new();

        let worker_mailbox = Arc::clone(&mailbox);
        let worker_cancel = cancel.clone();
        thread::Builder::new()
            .name("stick-sender".to_string())
            .spawn(move || run_worker(&worker_mailbox, &worker_cancel, &stick, callbacks.as_ref()))?;

        Ok(Self { mailbox, cancel })
    }

    /// Cancel the in-flight transmission and let the thread exit.
    fn retire(&self) {
        self.cancel.cancel();
        self.mailbox.close();
    }
}

fn run_worker(mailbox: &Mailbox, cancel: &CancelToken, stick: &Mutex<StickClient>, callbacks: &dyn SenderCallbacks) {
    debug!("Sender worker started");

    while let Some(request) = mailbox.wait() {
        let image = &request.image;
        let width = image.width();

        // Waits for a retired worker still unwinding on the same stick. Its
        // `done()` is reported under this lock, so ours starts strictly after.
        let mut client = lock(stick);
        info!("Sending {}x{} image", width, image.height());
        callbacks.start();
        let result = client.show_image(
            width,
            image.height(),
            image.pixels(),
            &request.playback,
            cancel,
            |col| callbacks.progress(percent(col, width)),
        );

        match result {
            Ok(()) => info!("Image sent"),
            Err(StickError::Cancelled) => {
                info!("Transmission stopped, turning stick off");
                if let Err(e) = client.off() {
                    warn!("Failed to turn stick off: {e}");
                }
            }
            Err(e) => {
                warn!("Transmission failed: {e}");
                callbacks.on_error(&e);
            }
        }
        callbacks.done();
        drop(client);
    }

    debug!("Sender worker exiting");
}

fn percent(col: usize, width: usize) -> u8 {
    (col as f64 / width as f64 * 100.0).round().min(100.0) as u8
}

/// Sends images to the stick from a dedicated thread.
///
/// Submissions never block: the worker picks up the latest one when it is
/// free. [`Sender::stop`] cancels at the next column batch and replaces the
/// worker, [`Sender::kill`] retires it for good.
pub struct Sender {
    stick: Arc<Mutex<StickClient>>,
    callbacks: Arc<dyn SenderCallbacks>,
    worker: Mutex<Option<Worker>>,
    settings: Mutex<Playback>,
}

impl Sender {
    /// Start a worker driving `stick`.
    ///
    /// # Errors
    /// Returns the OS error if the worker thread cannot be spawned.
    pub fn new(stick: StickClient, callbacks: impl SenderCallbacks + 'static) -> std::io::Result<Self> {
        let stick = Arc::new(Mutex::new(stick));
        let callbacks: Arc<dyn SenderCallbacks> = Arc::new(callbacks);
        let worker = Worker::spawn(Arc::clone(&stick), Arc::clone(&callbacks))?;
        info!("Sender started");

        Ok(Self {
            stick,
            callbacks,
            worker: Mutex::new(Some(worker)),
            settings: Mutex::new(Playback::default()),
        })
    }

    /// Queue a request, replacing any request not yet picked up.
    ///
    /// Returns false if the sender has been killed.
    pub fn submit(&self, request: TransmissionRequest) -> bool {
        match lock(&self.worker).as_ref() {
            Some(worker) => worker.mailbox.post(request),
            None => {
                warn!("Sender killed, ignoring submission");
                false
            }
        }
    }

    /// Queue an image with the current playback settings.
    pub fn send_image(&self, image: Arc<Image>) -> bool {
        let playback = self.playback();
        self.submit(TransmissionRequest { image, playback })
    }

    /// Cancel the in-flight transmission and get a fresh worker ready.
    ///
    /// The stick is turned off by the cancelled worker. Does nothing after
    /// [`Sender::kill`].
    pub fn stop(&self) -> std::io::Result<()> {
        let mut worker = lock(&self.worker);
        let Some(old) = worker.as_ref() else {
            return Ok(());
        };

        info!("Sender stop");
        old.retire();
        *worker = Some(Worker::spawn(Arc::clone(&self.stick), Arc::clone(&self.callbacks))?);
        Ok(())
    }

    /// Cancel the in-flight transmission and retire the worker for good.
    pub fn kill(&self) {
        if let Some(worker) = lock(&self.worker).take() {
            info!("Sender kill");
            worker.retire();
        }
    }

    /// Whether submissions are still accepted.
    pub fn is_alive(&self) -> bool {
        lock(&self.worker).is_some()
    }

    pub fn playback(&self) -> Playback {
        *lock(&self.settings)
    }

    /// Pause between two columns, used by [`Sender::send_image`].
    pub fn set_delay(&self, delay_ms: u8) {
        lock(&self.settings).delay_ms = delay_ms;
    }

    /// Repeat images until stopped. Use [`Sender::stop`] to end the loop.
    pub fn set_loop(&self, looping: bool) {
        lock(&self.settings).looping = looping;
    }

    /// Brightness used by [`Sender::send_image`], in `[0, 1]`.
    pub fn set_brightness(&self, brightness: f32) -> Result<(), StickError> {
        let playback = Playback {
            brightness,
            ..self.playback()
        };
        playback.validate()?;
        *lock(&self.settings) = playback;
        Ok(())
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        self.kill();
    }
}
