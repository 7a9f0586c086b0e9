//! Actor kinds hosted by the silo.

mod calculator;

pub use calculator::{Calculator, CalculatorState};
