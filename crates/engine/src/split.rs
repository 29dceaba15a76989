//! Expense splits: validation of a proposed split set and equal splitting.
//!
//! A split assigns one participant a share of one expense. For a well-formed
//! expense the shares add up to its amount, allowing a tolerance of one minor
//! unit ([`SPLIT_TOLERANCE_MINOR`]).
//!
//! Nothing in storage enforces the invariant, so every place that computes
//! from stored splits runs [`validate_splits`] again.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

/// Accepted distance between the sum of the splits and the expense amount.
pub const SPLIT_TOLERANCE_MINOR: u64 = 1;

/// Largest number of shares [`equal_split`] will produce.
pub const MAX_SPLIT_SHARES: usize = 1_000;

/// A participant's share of one expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub participant_id: Uuid,
    pub amount_minor: i64,
}

impl Split {
    #[must_use]
    pub fn new(participant_id: Uuid, amount_minor: i64) -> Self {
        Self {
            participant_id,
            amount_minor,
        }
    }
}

/// Sum of the split amounts, failing on overflow.
pub fn split_total(splits: &[Split]) -> ResultEngine<i64> {
    splits
        .iter()
        .try_fold(Money::ZERO, |acc, split| {
            acc.try_add(Money::new(split.amount_minor))
        })
        .map(Money::minor)
}

/// Checks that `splits` is a valid split set for an expense of `total_minor`.
///
/// Rules, in the order they are checked:
/// - the total must be > 0 and every split amount >= 0
/// - every participant must be one of `participants` and appear only once
/// - `|sum(splits) - total| <= SPLIT_TOLERANCE_MINOR`, otherwise
///   [`EngineError::SplitMismatch`] carrying both sums
pub fn validate_splits(
    total_minor: i64,
    splits: &[Split],
    participants: &HashSet<Uuid>,
) -> ResultEngine<()> {
    if total_minor <= 0 {
        return Err(EngineError::InvalidAmount(
            "amount_minor must be > 0".to_string(),
        ));
    }
    if splits.iter().any(|split| split.amount_minor < 0) {
        return Err(EngineError::InvalidAmount(
            "split amount must be >= 0".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(splits.len());
    for split in splits {
        if !participants.contains(&split.participant_id) {
            return Err(EngineError::InvalidParticipantReference(
                split.participant_id.to_string(),
            ));
        }
        if !seen.insert(split.participant_id) {
            return Err(EngineError::InvalidAmount(format!(
                "participant {} appears more than once in splits",
                split.participant_id
            )));
        }
    }

    let actual = Money::new(split_total(splits)?);
    let expected = Money::new(total_minor);
    if actual.abs_diff(expected) > SPLIT_TOLERANCE_MINOR {
        return Err(EngineError::SplitMismatch { expected, actual });
    }
    Ok(())
}

/// Divides `total_minor` into `count` shares.
///
/// The first `count - 1` shares get `total / count` (integer division) and the
/// last share takes whatever is left, so the shares always add up to the
/// total exactly. The remainder is not spread round-robin: only the last
/// share differs, by at most `count - 1` minor units.
pub fn equal_split(total_minor: i64, count: usize) -> ResultEngine<Vec<i64>> {
    if count == 0 {
        return Err(EngineError::InvalidAmount(
            "cannot split an amount between zero participants".to_string(),
        ));
    }
    if count > MAX_SPLIT_SHARES {
        return Err(EngineError::InvalidAmount(format!(
            "cannot split an amount into more than {MAX_SPLIT_SHARES} shares"
        )));
    }
    if total_minor < 0 {
        return Err(EngineError::InvalidAmount(
            "amount_minor must be >= 0".to_string(),
        ));
    }

    let divisor = i64::try_from(count)
        .map_err(|_| EngineError::InvalidAmount("too many participants".to_string()))?;
    let share = total_minor / divisor;
    let mut shares = vec![share; count - 1];
    shares.push(total_minor - share * (divisor - 1));
    Ok(shares)
}

/// Equal split of `total_minor` between `participants`, in the given order.
pub fn equal_splits(total_minor: i64, participants: &[Uuid]) -> ResultEngine<Vec<Split>> {
    let shares = equal_split(total_minor, participants.len())?;
    Ok(participants
        .iter()
        .zip(shares)
        .map(|(participant_id, amount_minor)| Split::new(*participant_id, amount_minor))
        .collect())
}
