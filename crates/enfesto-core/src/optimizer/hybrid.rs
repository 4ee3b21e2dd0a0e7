use super::*;

impl Optimizer {
    /// Tries the model's heights in rank order and keeps the first one that
    /// serves the whole group within tolerance. Tolerance always wins over the
    /// model: when no learned height fits, the group falls back to its own GCD.
    pub(super) fn decide_with_model(
        &self,
        quantities: &[u32],
        model: &TrainedModel,
    ) -> StackHeightDecision {
        let accepted = model
            .global_stack_heights
            .iter()
            .copied()
            .filter(|&height| height > 1)
            .find(|&height| height_fits(quantities, height, self.tolerance));

        if let Some(height) = accepted {
            let method = if model.used_default {
                Method::GlobalDefault
            } else {
                Method::Model
            };
            return StackHeightDecision {
                best_stack_height: height,
                method,
            };
        }

        let height = find_stack_height(quantities, self.tolerance);
        let method = if height > 1 {
            Method::ToleranceRule
        } else {
            Method::Rules
        };

        StackHeightDecision {
            best_stack_height: height,
            method,
        }
    }
}
