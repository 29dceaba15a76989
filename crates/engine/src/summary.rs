//! Budget summary of a trip ledger.
//!
//! For every participant:
//!
//! - `paid` is the sum of the amounts of the expenses they paid,
//! - `owes` is the sum of their splits,
//! - `balance = paid - owes`.
//!
//! The summary is derived on demand and never stored. When every expense is
//! balanced the participant balances sum to zero; expenses whose splits do
//! not add up (or point at people no longer on the trip) are still counted
//! but listed in [`BudgetSummary::unbalanced_expenses`].

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Expense, ExpenseCategory, Money, Participant, ResultEngine,
    currency::ensure_trip_currency, split::validate_splits,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantBalance {
    pub name: String,
    pub paid_minor: i64,
    pub owes_minor: i64,
    pub balance_minor: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub currency: Currency,
    pub total_minor: i64,
    pub by_category: BTreeMap<ExpenseCategory, i64>,
    pub by_participant: BTreeMap<Uuid, ParticipantBalance>,
    /// Expenses that failed split validation when the summary was computed.
    pub unbalanced_expenses: Vec<Uuid>,
}

fn add_minor(acc: &mut i64, amount: i64) -> ResultEngine<()> {
    *acc = Money::new(*acc).try_add(Money::new(amount))?.minor();
    Ok(())
}

/// Computes the summary of `expenses` for a trip kept in `currency`.
///
/// Fails only on malformed input: a non-positive expense amount or a negative
/// split (`InvalidAmount`), or an expense in another currency
/// (`CurrencyMismatch`).
pub fn compute_summary(
    currency: Currency,
    participants: &[Participant],
    expenses: &[Expense],
) -> ResultEngine<BudgetSummary> {
    let participant_ids: HashSet<Uuid> = participants.iter().map(|p| p.id).collect();
    let mut by_participant: BTreeMap<Uuid, ParticipantBalance> = participants
        .iter()
        .map(|p| {
            (
                p.id,
                ParticipantBalance {
                    name: p.name.clone(),
                    ..Default::default()
                },
            )
        })
        .collect();

    let mut total_minor = 0i64;
    let mut by_category: BTreeMap<ExpenseCategory, i64> = BTreeMap::new();
    let mut unbalanced_expenses = Vec::new();

    for expense in expenses {
        if expense.amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(format!(
                "expense {} has a non-positive amount",
                expense.id
            )));
        }
        if expense.splits.iter().any(|split| split.amount_minor < 0) {
            return Err(EngineError::InvalidAmount(format!(
                "expense {} has a negative split",
                expense.id
            )));
        }
        ensure_trip_currency(currency, expense.currency)?;

        add_minor(&mut total_minor, expense.amount_minor)?;
        add_minor(
            by_category.entry(expense.category).or_insert(0),
            expense.amount_minor,
        )?;

        let mut balanced =
            validate_splits(expense.amount_minor, &expense.splits, &participant_ids).is_ok();

        match by_participant.get_mut(&expense.paid_by) {
            Some(payer) => add_minor(&mut payer.paid_minor, expense.amount_minor)?,
            None => balanced = false,
        }
        for split in &expense.splits {
            if let Some(entry) = by_participant.get_mut(&split.participant_id) {
                add_minor(&mut entry.owes_minor, split.amount_minor)?;
            }
        }

        if !balanced {
            unbalanced_expenses.push(expense.id);
        }
    }

    for entry in by_participant.values_mut() {
        entry.balance_minor = Money::new(entry.paid_minor)
            .checked_sub(Money::new(entry.owes_minor))
            .map(Money::minor)
            .ok_or_else(|| EngineError::InvalidAmount("amount overflow".to_string()))?;
    }

    Ok(BudgetSummary {
        currency,
        total_minor,
        by_category,
        by_participant,
        unbalanced_expenses,
    })
}
