mod rate;

pub use rate::{Action, Decision, RateController};
