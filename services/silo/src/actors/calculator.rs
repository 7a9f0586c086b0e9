use std::sync::OnceLock;

use chronicle_engine::{ActorKind, DispatchRegistry, Rejection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorState {
    pub value: f64,
}

/// Values that JSON cannot carry never reach the journal.
fn finite(value: f64) -> Result<(), Rejection> {
    if !value.is_finite() {
        return Err(Rejection::new("result is out of range"));
    }
    Ok(())
}

/// A journaled calculator. Every event returns the new value.
#[derive(Debug)]
pub struct Calculator;

impl ActorKind for Calculator {
    const KIND: &'static str = "calculator";
    type State = CalculatorState;

    fn registry() -> &'static DispatchRegistry<CalculatorState> {
        static REGISTRY: OnceLock<DispatchRegistry<CalculatorState>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            DispatchRegistry::builder(Self::KIND)
                .validated_event(
                    "set",
                    &["number"],
                    |_: &CalculatorState, (n,): &(f64,)| finite(*n),
                    |s: &mut CalculatorState, (n,): (f64,)| {
                        s.value = n;
                        Ok(s.value)
                    },
                )
                .validated_event(
                    "add",
                    &["number"],
                    |s: &CalculatorState, (n,): &(f64,)| finite(s.value + n),
                    |s: &mut CalculatorState, (n,): (f64,)| {
                        s.value += n;
                        Ok(s.value)
                    },
                )
                .validated_event(
                    "multiply",
                    &["number"],
                    |s: &CalculatorState, (n,): &(f64,)| finite(s.value * n),
                    |s: &mut CalculatorState, (n,): (f64,)| {
                        s.value *= n;
                        Ok(s.value)
                    },
                )
                .validated_event(
                    "divide",
                    &["number"],
                    |s: &CalculatorState, (n,): &(f64,)| {
                        if *n == 0.0 {
                            return Err(Rejection::new("cannot divide by zero"));
                        }
                        finite(s.value / n)
                    },
                    |s: &mut CalculatorState, (n,): (f64,)| {
                        s.value /= n;
                        Ok(s.value)
                    },
                )
                .event("reset", &[], |s: &mut CalculatorState, (): ()| {
                    s.value = 0.0;
                    Ok(s.value)
                })
                .query("get", &[], |s: &CalculatorState, (): ()| Ok(s.value))
                .build()
        })
    }
}
