use crate::types::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

mod hybrid;
mod stack;
mod summary;

pub use stack::{apply_stack_height, find_stack_height, height_fits};

/// Adjusts cut quantities so every (referencia, cor) group shares one stack height.
///
/// Without a model every group goes through the GCD rule. With a model the
/// ranked heights are tried first and the rule only decides groups none of
/// them can serve within tolerance.
pub struct Optimizer {
    items: Vec<ProductionItem>,
    tolerance: f64,
    model: Option<TrainedModel>,
}

impl Optimizer {
    /// Validates the tolerance and builds a rule-based optimizer.
    pub fn new(items: Vec<ProductionItem>, tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(OptimizerError::InvalidInput(format!(
                "Tolerance must be a non-negative percentage, got {}",
                tolerance
            )));
        }

        Ok(Self {
            items,
            tolerance,
            model: None,
        })
    }

    /// Switches to the hybrid path, guided by a trained model.
    pub fn with_model(mut self, model: TrainedModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_optional_model(mut self, model: Option<TrainedModel>) -> Self {
        self.model = model;
        self
    }

    pub fn uses_model(&self) -> bool {
        self.model.is_some()
    }

    /// Runs group -> decide -> adjust -> summarize over the whole batch.
    pub fn optimize(&self) -> OptimizationResult {
        let mut items = self.items.clone();
        let mut decisions = BTreeMap::new();

        for (key, indices) in self.group_items() {
            let quantities: Vec<u32> = indices.iter().map(|&idx| items[idx].qtd).collect();

            let decision = match &self.model {
                Some(model) => self.decide_with_model(&quantities, model),
                None => self.decide_by_rules(&quantities),
            };

            debug!(
                group = %key,
                stack_height = decision.best_stack_height,
                method = %decision.method,
                "Stack height selected"
            );

            for idx in indices {
                let optimized = apply_stack_height(items[idx].qtd, decision.best_stack_height);
                items[idx].set_optimized(optimized);
            }

            decisions.insert(key, decision);
        }

        let summary = self.calculate_summary(&items, decisions);

        info!(
            items = summary.total_items,
            groups = summary.stack_heights.len(),
            increases = summary.increases,
            decreases = summary.decreases,
            unchanged = summary.unchanged,
            hybrid = self.uses_model(),
            "Optimization complete"
        );

        OptimizationResult { items, summary }
    }

    /// Partitions item indices by group key, keeping input order inside each group.
    fn group_items(&self) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, item) in self.items.iter().enumerate() {
            groups.entry(item.group_key()).or_default().push(idx);
        }
        groups
    }
}

/// Rule-based optimization of a batch.
pub fn optimize(items: Vec<ProductionItem>, tolerance: f64) -> Result<OptimizationResult> {
    Ok(Optimizer::new(items, tolerance)?.optimize())
}

/// Hybrid optimization of a batch, guided by `model`.
pub fn optimize_with_model(
    items: Vec<ProductionItem>,
    tolerance: f64,
    model: TrainedModel,
) -> Result<OptimizationResult> {
    Ok(Optimizer::new(items, tolerance)?.with_model(model).optimize())
}
