//! In-order submission queue.
//!
//! Work submitted to a `Queue` runs on one worker thread, strictly in
//! submission order, against the queue's `Device`. Each submission hands
//! back a future that resolves when that piece of work has finished, so a
//! read-back submitted after a sort observes the sorted data.

use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc;
use std::task::{Context, Poll};
use std::thread;

use bytemuck::Pod;
use futures::channel::oneshot;
use futures::FutureExt;
use log::{debug, warn};

use crate::buffer::Buffer;
use crate::cached::CachedReadIterator;
use crate::config::{SortConfig, TransformConfig};
use crate::device::{Device, LaunchReport};
use crate::error::{Error, Result};
use crate::radix::RadixKey;
use crate::radix_sort;
use crate::transform;

type Job = Box<dyn FnOnce(&Device) + Send>;

pub struct Queue {
    device: Device,
    sender: Option<mpsc::Sender<Job>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Queue {
    pub fn new(device: Device) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker_device = device.clone();
        let worker = thread::Builder::new()
            .name("blocksort-queue".to_string())
            .spawn(move || {
                for job in receiver {
                    job(&worker_device);
                }
                debug!("queue worker drained");
            })?;
        Ok(Self {
            device,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Queues `work`; the returned future yields its result.
    pub fn submit<T, F>(&self, work: F) -> Submission<T>
    where
        T: Send + 'static,
        F: FnOnce(&Device) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |device| {
            // The receiver may already be gone; nobody is waiting then.
            let _ = tx.send(work(device));
        });
        match &self.sender {
            Some(sender) => {
                if sender.send(job).is_err() {
                    warn!("submission dropped: queue worker has stopped");
                }
            }
            None => warn!("submission dropped: queue is shut down"),
        }
        Submission { receiver: rx }
    }

    /// Sorts every batch of `keys` on the device.
    pub fn sort_keys<K: RadixKey>(
        &self,
        config: SortConfig,
        keys: &Buffer<K>,
    ) -> Submission<LaunchReport> {
        let keys = keys.clone();
        self.submit(move |device| {
            let mut keys = keys.map_write();
            radix_sort::sort_keys(device, &config, &mut keys[..])
        })
    }

    /// Sorts every batch of `keys`, moving `values` along.
    pub fn sort_pairs<K: RadixKey, V: Pod + Send + Sync>(
        &self,
        config: SortConfig,
        keys: &Buffer<K>,
        values: &Buffer<V>,
    ) -> Submission<LaunchReport> {
        let keys = keys.clone();
        let values = values.clone();
        self.submit(move |device| {
            if keys.same_storage(&values) {
                return Err(Error::AliasedBuffers);
            }
            let mut keys = keys.map_write();
            let mut values = values.map_write();
            radix_sort::sort_pairs(device, &config, &mut keys[..], &mut values[..])
        })
    }

    /// Applies `op` to the first `size` elements of `input` through a cached
    /// read path, writing `output`.
    pub fn transform<T, U, F>(
        &self,
        config: TransformConfig,
        input: &Buffer<T>,
        output: &Buffer<U>,
        size: usize,
        op: F,
    ) -> Submission<LaunchReport>
    where
        T: Pod + Send + Sync,
        U: Pod + Send + Sync,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let input = input.clone();
        let output = output.clone();
        self.submit(move |device| {
            if input.same_storage(&output) {
                return Err(Error::AliasedBuffers);
            }
            let source = input.map_read();
            let mut destination = output.map_write();
            let mut cached = CachedReadIterator::new();
            cached.bind(&source[..], input.capacity);
            let report = transform::transform(device, &config, &cached, &mut destination[..], size, op);
            cached.unbind();
            report
        })
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish what is queued and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("queue worker panicked");
            }
        }
    }
}

/// Completion of one queued piece of work.
#[must_use = "submissions do nothing observable unless awaited"]
pub struct Submission<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Submission<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver
            .poll_unpin(cx)
            .map(|received| received.unwrap_or(Err(Error::QueueClosed)))
    }
}
