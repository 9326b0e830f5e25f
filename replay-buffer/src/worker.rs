use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::create_rng_for_stream;
use crossbeam::channel::Sender;
use go::{BoardHistory, Game, NUM_SYMMETRIES};
use log::{debug, error, info, warn};
use rand::prelude::*;
use rand::seq::index;

use super::archive::ArchiveReader;
use super::error::{ArchiveError, PipelineError};
use super::example::ExampleEncoder;
use super::options::{DecodeErrorPolicy, PipelineOptions};

/// Shared stop flag. Workers look at it between game records, never in the middle of one.
#[derive(Clone, Default, Debug)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub archives: usize,
    pub skipped: usize,
    pub games: usize,
    pub examples: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Produces an endless stream of serialized examples from its archives into its own
/// bounded channel. A full channel blocks the worker until the consumer catches up.
pub struct Worker {
    id: usize,
    sources: Vec<PathBuf>,
    options: PipelineOptions,
    encoder: ExampleEncoder,
    sender: Sender<Vec<u8>>,
    cancel: CancellationToken,
    rng: StdRng,
}

impl Worker {
    pub fn new(
        id: usize,
        sources: Vec<PathBuf>,
        options: PipelineOptions,
        encoder: ExampleEncoder,
        sender: Sender<Vec<u8>>,
        cancel: CancellationToken,
    ) -> Self {
        let rng = create_rng_for_stream(options.seed, id as u64);

        Self {
            id,
            sources,
            options,
            encoder,
            sender,
            cancel,
            rng,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs passes over the sources until cancelled or the consumer goes away.
    pub fn run(mut self) -> Result<(), PipelineError> {
        info!("Starting worker {} with {} archives", self.id, self.sources.len());

        let mut pass_num = 0usize;
        loop {
            let stats = match self.run_pass()? {
                Some(stats) => stats,
                None => {
                    info!("Stopping worker {} after {} passes", self.id, pass_num);
                    return Ok(());
                }
            };

            pass_num += 1;

            if stats.examples == 0 {
                error!(
                    "Worker {} completed pass {} without any examples. Archives: {}, Skipped: {}, Games: {}",
                    self.id, pass_num, stats.archives, stats.skipped, stats.games
                );
                return Err(PipelineError::NoExamples { worker: self.id });
            }

            info!(
                "Worker: {}, Pass: {}, Archives: {}, Skipped: {}, Games: {}, Examples: {}",
                self.id, pass_num, stats.archives, stats.skipped, stats.games, stats.examples
            );
        }
    }

    /// One pass over every source. `None` means the worker should stop.
    fn run_pass(&mut self) -> Result<Option<PassStats>, PipelineError> {
        if self.options.shuffle_games {
            self.sources.shuffle(&mut self.rng);
        }

        let mut stats = PassStats::default();
        let sources = self.sources.clone();

        for path in sources {
            stats.archives += 1;

            match self.stream_archive(&path, &mut stats) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return Ok(None),
                Err(err) => match self.options.decode_error_policy {
                    DecodeErrorPolicy::Skip => {
                        warn!("Worker {} skipping {:?}: {}", self.id, path, err);
                        stats.skipped += 1;
                    }
                    DecodeErrorPolicy::Abort => {
                        error!("Worker {} failed to decode {:?}: {}", self.id, path, err);
                        return Err(PipelineError::Archive { path, source: err });
                    }
                },
            }
        }

        Ok(Some(stats))
    }

    fn stream_archive(&mut self, path: &Path, stats: &mut PassStats) -> Result<Flow, ArchiveError> {
        debug!("Worker {} opening {:?}", self.id, path);
        let reader = ArchiveReader::open(path, self.options.board_size)?;
        self.stream_games(reader, stats)
    }

    fn stream_games<R: Read>(
        &mut self,
        mut reader: ArchiveReader<R>,
        stats: &mut PassStats,
    ) -> Result<Flow, ArchiveError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Stop);
            }

            let game = match reader.next_game()? {
                Some(game) => game,
                None => return Ok(Flow::Continue),
            };

            stats.games += 1;

            if self.emit_game(&game, stats) == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
    }

    /// Sends a random subset of the game's positions, each under a random symmetry.
    fn emit_game(&mut self, game: &Game, stats: &mut PassStats) -> Flow {
        let history = BoardHistory::replay(game, self.options.board_size);
        let num_samples = self.options.samples_per_game(game.len());
        let picked = index::sample(&mut self.rng, game.len(), num_samples);

        for step in picked.iter() {
            let symmetry = self.rng.gen_range(0..NUM_SYMMETRIES);
            let mut record = Vec::with_capacity(self.encoder.record_len());
            self.encoder
                .encode_into(game, &history, step, symmetry, &mut record);

            if self.sender.send(record).is_err() {
                debug!("Worker {} channel disconnected", self.id);
                return Flow::Stop;
            }

            stats.examples += 1;
        }

        Flow::Continue
    }
}
