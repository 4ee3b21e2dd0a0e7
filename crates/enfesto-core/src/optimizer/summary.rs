use super::*;
use std::cmp::Ordering;

impl Optimizer {
    /// Counts increased, decreased and unchanged lines.
    pub(super) fn calculate_summary(
        &self,
        items: &[ProductionItem],
        stack_heights: BTreeMap<String, StackHeightDecision>,
    ) -> OptimizationSummary {
        let mut increases = 0;
        let mut decreases = 0;
        let mut unchanged = 0;

        for item in items {
            match item.diferenca.unwrap_or(0).cmp(&0) {
                Ordering::Greater => increases += 1,
                Ordering::Less => decreases += 1,
                Ordering::Equal => unchanged += 1,
            }
        }

        OptimizationSummary {
            total_items: items.len(),
            increases,
            decreases,
            unchanged,
            stack_heights,
        }
    }
}
