use super::*;
use crate::arith::{adjust_to_layers, deviation_percent, gcd_multiple};

/// Quantity an item is cut to under `height`.
///
/// A height of 1 means no optimization. Under a real height an item never
/// ends up with zero units: original zeros and quantities rounded down to
/// zero both become one full stack.
pub fn apply_stack_height(qtd: u32, height: u32) -> u32 {
    if height <= 1 {
        return qtd;
    }
    match adjust_to_layers(qtd, height) {
        0 => height,
        adjusted => adjusted,
    }
}

/// True when every positive quantity stays within `tolerance` percent after
/// being cut to `height`. Zero quantities are exempt.
pub fn height_fits(quantities: &[u32], height: u32, tolerance: f64) -> bool {
    if height == 0 {
        return false;
    }
    quantities
        .iter()
        .filter(|&&qtd| qtd > 0)
        .all(|&qtd| deviation_percent(qtd, apply_stack_height(qtd, height)) <= tolerance)
}

/// Picks the group's own GCD when it is a real height that respects
/// `tolerance`, otherwise 1. A single-item group reports its own quantity
/// as the height and keeps that quantity unchanged.
pub fn find_stack_height(quantities: &[u32], tolerance: f64) -> u32 {
    let positive: Vec<u32> = quantities.iter().copied().filter(|&q| q > 0).collect();
    let gcd_height = gcd_multiple(&positive);

    if gcd_height <= 1 {
        return 1;
    }

    if height_fits(quantities, gcd_height, tolerance) {
        gcd_height
    } else {
        1
    }
}

impl Optimizer {
    pub(super) fn decide_by_rules(&self, quantities: &[u32]) -> StackHeightDecision {
        StackHeightDecision {
            best_stack_height: find_stack_height(quantities, self.tolerance),
            method: Method::Rules,
        }
    }
}
