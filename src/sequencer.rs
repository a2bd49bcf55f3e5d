//! Order sequencing policy.
//!
//! Instructions that need live market data (best-quote price and/or
//! max volume) are drafted first, while the session is freshest and
//! quotes most current. Fully specified instructions need no live
//! lookup and are drafted afterwards. Pure function over in-memory
//! data; no side effects, no failure modes.

use crate::types::TradeInstruction;

/// Produce the drafting order for one account's trade set.
///
/// Total reordering: every instruction appears exactly once. Sorted by
/// the number of market-default fields descending (both-default first,
/// one-default next, fully specified last), then ticker ascending
/// within a priority class.
pub fn sequence(instructions: &[TradeInstruction]) -> Vec<TradeInstruction> {
    let mut ordered: Vec<TradeInstruction> = instructions.to_vec();
    ordered.sort_by(|a, b| {
        b.default_field_count()
            .cmp(&a.default_field_count())
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    ordered
}
