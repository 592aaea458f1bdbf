use std::{
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, SendError, Sender};
use tracing::{debug, trace};

use crate::{builder::BuildError, handler::Handler, metric::Metric};

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Buffers incoming metrics and hands them to a handler in batches.
///
/// A batch is emitted whenever the buffer reaches the handler's maximum buffer size, whenever the handler's interval
/// elapses, and one final time once every sender has been dropped. Empty buffers are never emitted.
pub struct Forwarder<H> {
    handler: H,
    receiver: Receiver<Metric>,
}

impl<H> Forwarder<H>
where
    H: Handler,
{
    /// Creates a new `Forwarder`.
    pub fn new(handler: H, receiver: Receiver<Metric>) -> Self {
        Forwarder { handler, receiver }
    }

    /// Runs the forwarder until every sender has been dropped.
    pub fn run(self) {
        let flush_interval = self.handler.interval().max(MIN_FLUSH_INTERVAL);
        let max_buffer_size = self.handler.max_buffer_size().max(1);
        let mut buffer = Vec::with_capacity(max_buffer_size);

        let mut next_flush = next_deadline(flush_interval);
        loop {
            let received = match next_flush {
                Some(deadline) => self.receiver.recv_deadline(deadline),
                None => self.receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(metric) => {
                    buffer.push(metric);
                    if buffer.len() >= max_buffer_size {
                        trace!(buffered = buffer.len(), "Buffer full, flushing early.");
                        self.flush(&mut buffer);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    next_flush = next_deadline(flush_interval);
                    self.flush(&mut buffer);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(handler = self.handler.name(), "All senders dropped, flushing remaining metrics.");
                    self.flush(&mut buffer);
                    return;
                }
            }
        }
    }

    fn flush(&self, buffer: &mut Vec<Metric>) {
        if buffer.is_empty() {
            return;
        }

        if !self.handler.emit(buffer) {
            debug!(handler = self.handler.name(), num_metrics = buffer.len(), "Batch was not emitted.");
        }
        buffer.clear();
    }
}

/// Returns when the next interval flush is due, or `None` if the interval is too long to ever elapse.
fn next_deadline(flush_interval: Duration) -> Option<Instant> {
    Instant::now().checked_add(flush_interval)
}

/// Handle to a running forwarder thread.
pub struct ForwarderHandle {
    sender: Sender<Metric>,
    thread: JoinHandle<()>,
}

impl ForwarderHandle {
    /// Returns a sender that feeds the forwarder.
    ///
    /// Clones of the sender keep the forwarder alive: it only shuts down once all of them have been dropped.
    pub fn sender(&self) -> Sender<Metric> {
        self.sender.clone()
    }

    /// Sends a metric to the forwarder.
    ///
    /// # Errors
    ///
    /// If the forwarder thread has exited, the metric is handed back in the error.
    pub fn send(&self, metric: Metric) -> Result<(), SendError<Metric>> {
        self.sender.send(metric)
    }

    /// Shuts down the forwarder, waiting for buffered metrics to be emitted.
    ///
    /// This blocks until every clone obtained through [`sender`][ForwarderHandle::sender] has been dropped.
    pub fn shutdown(self) {
        drop(self.sender);
        if self.thread.join().is_err() {
            debug!("Forwarder thread panicked.");
        }
    }
}

/// Spawns a forwarder for `handler` on a dedicated thread.
///
/// # Errors
///
/// If the thread cannot be spawned, an error is returned.
pub fn spawn_forwarder<H>(handler: H) -> Result<ForwarderHandle, BuildError>
where
    H: Handler + 'static,
{
    let (sender, receiver) = unbounded();
    let thread_name = format!("metrics-handler-{}-forwarder", handler.name().to_lowercase());
    let forwarder = Forwarder::new(handler, receiver);

    let thread = std::thread::Builder::new()
        .name(thread_name)
        .spawn(move || forwarder.run())
        .map_err(|_| BuildError::Backend)?;

    Ok(ForwarderHandle { sender, thread })
}
