use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::bounded;
use go::SymmetryTables;
use log::{error, info};

use super::batch::TrainingBatch;
use super::error::{ConfigError, PipelineError};
use super::example::ExampleEncoder;
use super::fan_in::FanIn;
use super::index::{partition, ArchiveIndex};
use super::options::PipelineOptions;
use super::worker::{CancellationToken, Worker};

type WorkerHandle = JoinHandle<Result<(), PipelineError>>;

/// Worker threads decoding archives into training records, merged into one stream.
///
/// Records arrive as serialized [`crate::TrainingExample`]s of a fixed length. The
/// stream is infinite while the workers are healthy; it ends when a worker stops,
/// after which [`StreamingPipeline::shutdown`] reports why.
pub struct StreamingPipeline {
    options: PipelineOptions,
    fan_in: Option<FanIn<Vec<u8>>>,
    cancel: CancellationToken,
    handles: Vec<WorkerHandle>,
}

impl StreamingPipeline {
    pub fn start(options: PipelineOptions, sources: Vec<PathBuf>) -> Result<Self, PipelineError> {
        crate::init_logging();

        options.validate()?;

        if sources.is_empty() {
            return Err(ConfigError::NoSources.into());
        }

        let tables = Arc::new(SymmetryTables::new(options.board_size, options.history_steps));
        let encoder = ExampleEncoder::new(tables);
        let cancel = CancellationToken::new();
        let worker_count = options.worker_count;

        info!(
            "Starting pipeline with {} workers over {} archives. Board: {}, History: {}, Capacity: {}",
            worker_count,
            sources.len(),
            options.board_size,
            options.history_steps,
            options.channel_capacity
        );

        let mut receivers = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let (sender, receiver) = bounded(options.channel_capacity);
            let worker = Worker::new(
                id,
                partition(&sources, id, worker_count),
                options.clone(),
                encoder.clone(),
                sender,
                cancel.clone(),
            );

            let spawned = thread::Builder::new()
                .name(format!("archive-worker-{}", id))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => {
                    receivers.push(receiver);
                    handles.push(handle);
                }
                Err(err) => {
                    cancel.cancel();
                    drop(receivers);
                    let _ = join_all(handles);
                    return Err(err.into());
                }
            }
        }

        Ok(Self {
            options,
            fan_in: Some(FanIn::new(receivers)),
            cancel,
            handles,
        })
    }

    /// Streams every archive in the index, newest first.
    pub fn from_index(options: PipelineOptions, index: &ArchiveIndex) -> Result<Self, PipelineError> {
        Self::start(options, index.paths())
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Blocks for the next record.
    pub fn recv(&mut self) -> Result<Vec<u8>, PipelineError> {
        match self.fan_in.as_mut() {
            Some(fan_in) => fan_in.recv(),
            None => Err(PipelineError::WorkerStopped(0)),
        }
    }

    pub fn iter(&mut self) -> impl Iterator<Item = Vec<u8>> + '_ {
        std::iter::from_fn(move || self.recv().ok())
    }

    /// Receives `size` records and decodes them into a batch.
    pub fn next_batch(&mut self, size: usize) -> Result<TrainingBatch, PipelineError> {
        let records = (0..size)
            .map(|_| self.recv())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TrainingBatch::from_records(
            &records,
            self.options.board_size,
            self.options.history_steps,
        )?)
    }

    /// Stops every worker and waits for them. Returns the first error a worker hit.
    pub fn shutdown(mut self) -> Result<(), PipelineError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        if self.fan_in.is_none() && self.handles.is_empty() {
            return Ok(());
        }

        info!("Shutting down pipeline");

        self.cancel.cancel();
        // Dropping the receivers fails any blocked send.
        self.fan_in.take();

        join_all(std::mem::take(&mut self.handles))
    }
}

impl Drop for StreamingPipeline {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("Pipeline stopped with error: {}", err);
        }
    }
}

fn join_all(handles: Vec<WorkerHandle>) -> Result<(), PipelineError> {
    let mut first_err = None;

    for (id, handle) in handles.into_iter().enumerate() {
        let res = handle
            .join()
            .unwrap_or_else(|_| Err(PipelineError::WorkerPanicked(id)));

        if let Err(err) = res {
            error!("Worker {} failed: {}", id, err);
            first_err.get_or_insert(err);
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
