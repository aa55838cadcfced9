use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::Fence;

/// Monotonic timeline fence over wgpu's submission callbacks.
///
/// wgpu has no user-visible fence object; completion surfaces through
/// `Queue::on_submitted_work_done`. Each submission registers a callback that
/// raises the shared counter to its signal value, and `wait` drives the device
/// until the counter catches up.
pub struct WgpuFence {
    device: wgpu::Device,
    completed: Arc<AtomicU64>,
}

impl WgpuFence {
    pub(crate) fn new(device: wgpu::Device) -> Self {
        Self {
            device,
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registers `signal_value` against the most recent submission on `queue`.
    pub(crate) fn signal_on_done(&self, queue: &wgpu::Queue, signal_value: u64) {
        let completed = self.completed.clone();
        queue.on_submitted_work_done(move || {
            // fetch_max: callbacks may run out of registration order.
            completed.fetch_max(signal_value, Ordering::Release);
        });
    }
}

impl Fence for WgpuFence {
    fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn wait(&self, target: u64) {
        while self.completed.load(Ordering::Acquire) < target {
            // Wait drives queue callbacks; on error there is nothing left to
            // wait for.
            if let Err(err) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
                log::error!("device poll failed while waiting for fence: {err:?}");
                break;
            }
        }
    }
}
