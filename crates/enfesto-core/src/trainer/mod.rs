use crate::types::*;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use tracing::{debug, info, warn};

mod fields;

pub use fields::{normalize_header, resolve_record, RawRecord, Rejection, TrainingRecord};

/// Stack heights commonly used in cutting rooms, in ascending order.
pub const CANDIDATE_STACK_HEIGHTS: [u32; 15] =
    [12, 18, 24, 30, 36, 42, 48, 54, 60, 72, 84, 96, 108, 120, 144];

/// A quantity divides "near-evenly" when its remainder is below this share of the height.
/// Heuristic; kept configurable through [`TrainerConfig`].
pub const NEAR_EVEN_RATIO: f64 = 0.05;

/// Emitted alone when no candidate matches any historical quantity.
pub const DEFAULT_STACK_HEIGHT: u32 = 36;

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub candidate_heights: Vec<u32>,
    pub near_even_ratio: f64,
    pub default_height: u32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            candidate_heights: CANDIDATE_STACK_HEIGHTS.to_vec(),
            near_even_ratio: NEAR_EVEN_RATIO,
            default_height: DEFAULT_STACK_HEIGHT,
        }
    }
}

/// Learns which stack heights analysts favoured from historical
/// (original, optimized) pairs. Group boundaries are ignored so the result
/// also applies to references never seen during training.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Resolves headers and drops rows that are incomplete or not numeric.
    pub fn clean(&self, records: &[RawRecord]) -> Vec<TrainingRecord> {
        let cleaned: Vec<TrainingRecord> = records
            .iter()
            .enumerate()
            .filter_map(|(idx, raw)| match resolve_record(raw) {
                Ok(record) => Some(record),
                Err(reason) => {
                    warn!(row = idx + 1, %reason, "Training record dropped");
                    None
                }
            })
            .collect();

        debug!(
            received = records.len(),
            valid = cleaned.len(),
            "Training data cleaned"
        );
        cleaned
    }

    pub fn train(&self, records: &[RawRecord]) -> Result<TrainedModel> {
        self.train_at(records, Utc::now())
    }

    /// Same as [`Trainer::train`] with an explicit training timestamp.
    pub fn train_at(
        &self,
        records: &[RawRecord],
        trained_at: DateTime<Utc>,
    ) -> Result<TrainedModel> {
        let cleaned = self.clean(records);
        if cleaned.is_empty() {
            return Err(OptimizerError::InsufficientData);
        }

        let optimized: Vec<u32> = cleaned.iter().map(|r| r.qtd_otimizada).collect();
        let ranked = self.rank_heights(&optimized);

        let (global_stack_heights, used_default) = if ranked.is_empty() {
            (vec![self.config.default_height], true)
        } else {
            (ranked, false)
        };

        info!(
            samples = cleaned.len(),
            heights = ?global_stack_heights,
            used_default,
            "Model trained"
        );

        Ok(TrainedModel {
            global_stack_heights,
            used_default,
            sample_size: cleaned.len(),
            trained_at,
            version: format!("v{}", trained_at.timestamp_millis()),
        })
    }

    /// Ranks candidate heights by how many quantities they divide near-evenly.
    /// Heights with no match are left out. On equal counts the larger height
    /// comes first, since it divides everything its smaller divisors do in fewer lays.
    pub fn rank_heights(&self, optimized: &[u32]) -> Vec<u32> {
        let mut counts: Vec<(u32, usize)> = self
            .config
            .candidate_heights
            .iter()
            .copied()
            .filter(|&height| height > 0)
            .map(|height| {
                let hits = optimized
                    .iter()
                    .filter(|&&qty| qty > 0 && self.is_near_even(qty, height))
                    .count();
                (height, hits)
            })
            .filter(|&(_, hits)| hits > 0)
            .collect();

        counts.sort_by_key(|&(height, hits)| (Reverse(hits), Reverse(height)));
        counts.into_iter().map(|(height, _)| height).collect()
    }

    /// A quantity smaller than the height never fills one stack and does not count.
    fn is_near_even(&self, qty: u32, height: u32) -> bool {
        qty >= height
            && f64::from(qty % height) < f64::from(height) * self.config.near_even_ratio
    }
}

/// Trains with the default candidate heights and threshold.
pub fn train(records: &[RawRecord]) -> Result<TrainedModel> {
    Trainer::default().train(records)
}
