//! Dedicated threads that own a cpal stream.
//!
//! `cpal::Stream` is not `Send` on every host, so it is built, played and
//! dropped on one thread. The spawning side only sees a running flag and a
//! join handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::StreamTrait;

use crate::error::BackendError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Spawn `name`, run `open` on it and keep the resulting stream alive until
/// `running` is cleared. Returns once the stream is playing or has failed.
pub(crate) fn spawn<T, F>(
    name: &str,
    running: Arc<AtomicBool>,
    open: F,
) -> Result<(thread::JoinHandle<()>, T), BackendError>
where
    F: FnOnce() -> Result<(cpal::Stream, T), BackendError> + Send + 'static,
    T: Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);
    running.store(true, Ordering::SeqCst);
    let flag = Arc::clone(&running);
    let thread_name = name.to_string();

    let handle = thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let stream = match open().and_then(|(stream, info)| {
                stream.play()?;
                Ok((stream, info))
            }) {
                Ok((stream, info)) => {
                    let _ = ready_tx.send(Ok(info));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    flag.store(false, Ordering::SeqCst);
                    return;
                }
            };

            while flag.load(Ordering::SeqCst) {
                thread::park_timeout(POLL_INTERVAL);
            }
            if let Err(e) = stream.pause() {
                log::debug!("{}: pause on shutdown failed: {}", thread_name, e);
            }
        })
        .map_err(|e| {
            running.store(false, Ordering::SeqCst);
            BackendError::Thread(format!("failed to spawn {}: {}", name, e))
        })?;

    match ready_rx.recv() {
        Ok(Ok(info)) => Ok((handle, info)),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            Err(BackendError::Thread(format!("{} exited during startup", name)))
        }
    }
}

/// Clear `running` and wait for the stream thread to drop its stream.
pub(crate) fn shutdown(running: &AtomicBool, handle: Option<thread::JoinHandle<()>>) {
    running.store(false, Ordering::SeqCst);
    if let Some(handle) = handle {
        handle.thread().unpark();
        if handle.join().is_err() {
            log::error!("audio stream thread panicked");
        }
    }
}
