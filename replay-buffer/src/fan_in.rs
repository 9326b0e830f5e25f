use crossbeam::channel::Receiver;

use super::error::PipelineError;

/// Merges the per-worker channels by taking one item from each in turn. A slow worker
/// holds up the merge instead of being starved by the faster ones.
pub struct FanIn<T> {
    receivers: Vec<Receiver<T>>,
    cursor: usize,
}

impl<T> FanIn<T> {
    pub fn new(receivers: Vec<Receiver<T>>) -> Self {
        Self {
            receivers,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Blocks until the next worker in the rotation has an item. A worker whose channel
    /// is closed and drained has stopped, which ends the stream.
    pub fn recv(&mut self) -> Result<T, PipelineError> {
        let worker = self.cursor;
        let receiver = self
            .receivers
            .get(worker)
            .ok_or(PipelineError::WorkerStopped(worker))?;

        let item = receiver
            .recv()
            .map_err(|_| PipelineError::WorkerStopped(worker))?;

        self.cursor = (self.cursor + 1) % self.receivers.len();

        Ok(item)
    }
}

impl<T> Iterator for FanIn<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv().ok()
    }
}
