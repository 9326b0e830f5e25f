use anyhow::Result;
use common::{Config, ConfigLoader};
use go::{DEFAULT_BOARD_SIZE, DEFAULT_HISTORY_STEPS, MAX_BOARD_SIZE, MIN_BOARD_SIZE};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::ConfigError;

pub const MAX_HISTORY_STEPS: usize = 64;

/// What a worker does when an archive fails to open or decode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// Log the error and continue with the next archive.
    Skip,
    /// Stop the worker and surface the error when the pipeline is shut down.
    Abort,
}

impl FromStr for DecodeErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(DecodeErrorPolicy::Skip),
            "abort" => Ok(DecodeErrorPolicy::Abort),
            other => Err(ConfigError::InvalidDecodeErrorPolicy(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub history_steps: usize,
    pub board_size: usize,
    pub worker_count: usize,
    pub channel_capacity: usize,
    /// Fraction of each game's positions that are emitted, rounded up.
    pub sample_fraction: f32,
    /// Re-draw the order of each worker's archives at the start of every pass.
    pub shuffle_games: bool,
    pub decode_error_policy: DecodeErrorPolicy,
    /// Base seed for the worker rngs. Unset means seeded from entropy.
    pub seed: Option<u64>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            history_steps: DEFAULT_HISTORY_STEPS,
            board_size: DEFAULT_BOARD_SIZE,
            worker_count: default_worker_count(),
            channel_capacity: 1000,
            sample_fraction: 1.0 / 16.0,
            shuffle_games: true,
            decode_error_policy: DecodeErrorPolicy::Skip,
            seed: None,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&self.board_size) {
            return Err(ConfigError::InvalidBoardSize(self.board_size));
        }

        if !(1..=MAX_HISTORY_STEPS).contains(&self.history_steps) {
            return Err(ConfigError::InvalidHistorySteps(self.history_steps));
        }

        if self.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidChannelCapacity);
        }

        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(ConfigError::InvalidSampleFraction(self.sample_fraction));
        }

        Ok(())
    }

    /// Number of positions emitted from a game with `num_steps` steps.
    pub fn samples_per_game(&self, num_steps: usize) -> usize {
        // Kept in f32 so that 10 * 0.1 samples exactly one step.
        ((num_steps as f32 * self.sample_fraction).ceil() as usize).min(num_steps)
    }
}

/// Leaves two cores for the training loop.
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    cpus.saturating_sub(2).max(1)
}

impl Config for PipelineOptions {
    fn load(config: &ConfigLoader) -> Result<Self> {
        let defaults = PipelineOptions::default();

        let decode_error_policy = match config
            .get("decode_error_policy")
            .and_then(|v| v.as_string())
        {
            Some(policy) => policy.parse::<DecodeErrorPolicy>()?,
            None => defaults.decode_error_policy,
        };

        let options = Self {
            history_steps: config
                .get("history_steps")
                .and_then(|v| v.as_usize())
                .unwrap_or(defaults.history_steps),
            board_size: config
                .get("board_size")
                .and_then(|v| v.as_usize())
                .unwrap_or(defaults.board_size),
            worker_count: config
                .get("worker_count")
                .and_then(|v| v.as_usize())
                .unwrap_or(defaults.worker_count),
            channel_capacity: config
                .get("channel_capacity")
                .and_then(|v| v.as_usize())
                .unwrap_or(defaults.channel_capacity),
            sample_fraction: config
                .get("sample_fraction")
                .and_then(|v| v.as_f32())
                .unwrap_or(defaults.sample_fraction),
            shuffle_games: config
                .get("shuffle_games")
                .and_then(|v| v.as_bool())
                .unwrap_or(defaults.shuffle_games),
            decode_error_policy,
            seed: config.get("seed").and_then(|v| v.as_u64()),
        };

        options.validate()?;

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(contents: &str) -> Result<PipelineOptions> {
        ConfigLoader::from_str(contents, "stream".to_string())?
            .with_env(HashMap::new())
            .load::<PipelineOptions>()
    }

    #[test]
    fn test_defaults_are_valid() {
        let options = PipelineOptions::default();
        assert_eq!(options.validate(), Ok(()));
        assert_eq!(options.board_size, 19);
        assert_eq!(options.history_steps, 8);
        assert!(options.worker_count >= 1);
    }

    #[test]
    fn test_load_from_config() {
        let options = load(
            r#"
            stream {
                board_size = 9
                history_steps = 4
                worker_count = 3
                channel_capacity = 16
                sample_fraction = 0.5
                shuffle_games = false
                decode_error_policy = "abort"
                seed = 42
            }
            "#,
        )
        .unwrap();

        assert_eq!(
            options,
            PipelineOptions {
                history_steps: 4,
                board_size: 9,
                worker_count: 3,
                channel_capacity: 16,
                sample_fraction: 0.5,
                shuffle_games: false,
                decode_error_policy: DecodeErrorPolicy::Abort,
                seed: Some(42),
            }
        );
    }

    #[test]
    fn test_missing_values_use_defaults() {
        let options = load("stream { worker_count = 2 }").unwrap();
        assert_eq!(options.board_size, 19);
        assert_eq!(options.channel_capacity, 1000);
        assert_eq!(options.decode_error_policy, DecodeErrorPolicy::Skip);
        assert_eq!(options.seed, None);
    }

    #[test]
    fn test_load_rejects_invalid_board_size() {
        let err = load("stream { board_size = 1 }").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::InvalidBoardSize(1))
        );
    }

    #[test]
    fn test_load_rejects_unknown_policy() {
        let err = load("stream { decode_error_policy = retry }").unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_validate() {
        let valid = PipelineOptions {
            worker_count: 2,
            ..PipelineOptions::default()
        };

        let cases = [
            (
                PipelineOptions { history_steps: 0, ..valid.clone() },
                ConfigError::InvalidHistorySteps(0),
            ),
            (
                PipelineOptions { board_size: 26, ..valid.clone() },
                ConfigError::InvalidBoardSize(26),
            ),
            (
                PipelineOptions { worker_count: 0, ..valid.clone() },
                ConfigError::InvalidWorkerCount,
            ),
            (
                PipelineOptions { channel_capacity: 0, ..valid.clone() },
                ConfigError::InvalidChannelCapacity,
            ),
            (
                PipelineOptions { sample_fraction: 0.0, ..valid.clone() },
                ConfigError::InvalidSampleFraction(0.0),
            ),
            (
                PipelineOptions { sample_fraction: 1.5, ..valid.clone() },
                ConfigError::InvalidSampleFraction(1.5),
            ),
        ];

        for (options, expected) in cases {
            assert_eq!(options.validate(), Err(expected));
        }
    }

    #[test]
    fn test_samples_per_game_rounds_up() {
        let options = PipelineOptions::default();
        assert_eq!(options.samples_per_game(0), 0);
        assert_eq!(options.samples_per_game(1), 1);
        assert_eq!(options.samples_per_game(16), 1);
        assert_eq!(options.samples_per_game(17), 2);
        assert_eq!(options.samples_per_game(250), 16);

        let all = PipelineOptions {
            sample_fraction: 1.0,
            ..options
        };
        assert_eq!(all.samples_per_game(250), 250);
    }

    #[test]
    fn test_samples_per_game_exact_products() {
        let cases = [(0.1, 10, 1), (0.2, 5, 1), (0.3, 10, 3), (0.5, 7, 4), (0.25, 8, 2)];

        for (sample_fraction, num_steps, expected) in cases {
            let options = PipelineOptions {
                sample_fraction,
                ..PipelineOptions::default()
            };
            assert_eq!(
                options.samples_per_game(num_steps),
                expected,
                "{} x {}",
                sample_fraction,
                num_steps
            );
        }
    }
}
