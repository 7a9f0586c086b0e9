//! A small ledger actor kind.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use chronicle_engine::{ActorKind, DispatchRegistry, HandlerError, Rejection};
use chronicle_id::Uuid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub balance: i64,
    pub entries: Vec<i64>,
}

/// Ledger actors: `deposit` and `withdraw` are validated events, `adjust`
/// is a hidden event whose apply step can be armed to fail once, and
/// `balance` and `entries` are queries.
#[derive(Debug)]
pub struct Ledger;

static ARMED_FAULTS: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn armed() -> MutexGuard<'static, HashSet<String>> {
    ARMED_FAULTS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Returns a token that makes the next `adjust` carrying it fail in apply,
/// after it has already changed the balance.
pub fn arm_apply_fault() -> String {
    let token = Uuid::new_v4().simple().to_string();
    armed().insert(token.clone());
    token
}

fn validate_amount(amount: i64) -> Result<(), Rejection> {
    if amount <= 0 {
        return Err(Rejection::new("amount must be positive"));
    }
    Ok(())
}

fn credit(balance: i64, amount: i64) -> Result<i64, Rejection> {
    balance
        .checked_add(amount)
        .ok_or_else(|| Rejection::new("balance out of range"))
}

fn debit(balance: i64, amount: i64) -> Result<i64, Rejection> {
    balance
        .checked_sub(amount)
        .ok_or_else(|| Rejection::new("balance out of range"))
}

impl ActorKind for Ledger {
    const KIND: &'static str = "ledger";
    type State = LedgerState;

    fn registry() -> &'static DispatchRegistry<LedgerState> {
        static REGISTRY: OnceLock<DispatchRegistry<LedgerState>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            DispatchRegistry::builder(Self::KIND)
                .validated_event(
                    "deposit",
                    &["amount"],
                    |s: &LedgerState, (amount,): &(i64,)| {
                        validate_amount(*amount)?;
                        credit(s.balance, *amount).map(|_| ())
                    },
                    |s: &mut LedgerState, (amount,): (i64,)| {
                        s.balance = credit(s.balance, amount).map_err(HandlerError::new)?;
                        s.entries.push(amount);
                        Ok(s.balance)
                    },
                )
                .validated_event(
                    "withdraw",
                    &["amount"],
                    |s: &LedgerState, (amount,): &(i64,)| {
                        validate_amount(*amount)?;
                        if s.balance < *amount {
                            return Err(Rejection::new("insufficient funds"));
                        }
                        debit(s.balance, *amount).map(|_| ())
                    },
                    |s: &mut LedgerState, (amount,): (i64,)| {
                        s.balance = debit(s.balance, amount).map_err(HandlerError::new)?;
                        s.entries.push(-amount);
                        Ok(s.balance)
                    },
                )
                .validated_event(
                    "adjust",
                    &["amount", "fault"],
                    |s: &LedgerState, (amount, _): &(i64, String)| {
                        credit(s.balance, *amount).map(|_| ())
                    },
                    |s: &mut LedgerState, (amount, fault): (i64, String)| {
                        s.balance = credit(s.balance, amount).map_err(HandlerError::new)?;
                        if armed().remove(&fault) {
                            return Err(HandlerError::new("injected apply failure"));
                        }
                        s.entries.push(amount);
                        Ok(s.balance)
                    },
                )
                .hidden()
                .query("balance", &[], |s: &LedgerState, (): ()| Ok(s.balance))
                .query("entries", &[], |s: &LedgerState, (): ()| Ok(s.entries.clone()))
                .build()
        })
    }
}
