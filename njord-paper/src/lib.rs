//! Paper Trader / Fill Simulator (spec §4.F): converts accepted orders into
//! fills using a price oracle plus a [`SlippageModel`], and is the
//! authoritative fill source for both backtests and the simulation harness
//! — the same slicing logic that drives live fills drives simulated ones.

mod policy;
mod slippage;
mod trader;

pub use policy::{AllOrNothing, FillOutcome, FillPolicy};
pub use slippage::{LinearSlippage, SlippageModel, SqrtSlippage};
pub use trader::PaperTrader;
