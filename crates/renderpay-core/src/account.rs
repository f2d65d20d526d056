//! Account types for renderpay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// A user account holding the balances the ledger mutates.
///
/// `cash_balance_cents` and `promo_credits` are never mutated directly by
/// callers; all changes go through the ledger store's atomic operations so
/// the non-negativity invariant holds under concurrent jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account ID.
    pub id: AccountId,

    /// Stable external identity (messaging-platform user id). Unique.
    pub external_id: String,

    /// Cash balance in credits (integer cents). Never negative.
    pub cash_balance_cents: i64,

    /// Promotional free generations remaining. Never negative.
    ///
    /// One promo credit waives the unit cost of one generated output.
    pub promo_credits: i64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balances.
    #[must_use]
    pub fn new(external_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::generate(),
            external_id: external_id.into(),
            cash_balance_cents: 0,
            promo_credits: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account can afford `charge_cents` from cash.
    #[must_use]
    pub const fn can_afford(&self, charge_cents: i64) -> bool {
        self.cash_balance_cents >= charge_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_starts_empty() {
        let account = Account::new("tg:42");
        assert_eq!(account.external_id, "tg:42");
        assert_eq!(account.cash_balance_cents, 0);
        assert_eq!(account.promo_credits, 0);
    }

    #[test]
    fn can_afford_boundary() {
        let mut account = Account::new("tg:42");
        account.cash_balance_cents = 30;
        assert!(account.can_afford(30));
        assert!(!account.can_afford(31));
    }
}
