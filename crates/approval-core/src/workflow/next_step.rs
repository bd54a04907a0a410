//! Selection of the next open step in an approval chain

use approval_types::{ApprovalTransaction, ProcessStep};
use std::collections::BTreeSet;

/// Lowest-order step whose order is not in `completed`
///
/// `steps` need not be sorted. When two steps share an order the first one
/// listed wins. `None` means the chain is complete.
pub fn next_step<'a>(steps: &'a [ProcessStep], completed: &BTreeSet<u32>) -> Option<&'a ProcessStep> {
    steps
        .iter()
        .filter(|step| !completed.contains(&step.order))
        .min_by_key(|step| step.order)
}

/// Orders already present in a chain's transaction log
pub fn completed_orders(transactions: &[ApprovalTransaction]) -> BTreeSet<u32> {
    transactions.iter().map(|tx| tx.order).collect()
}

/// Completed orders that the process does not define
pub fn stray_orders(steps: &[ProcessStep], completed: &BTreeSet<u32>) -> Vec<u32> {
    let defined: BTreeSet<u32> = steps.iter().map(|step| step.order).collect();
    completed.difference(&defined).copied().collect()
}
