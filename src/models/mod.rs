//! Data models for fight input, per-call options and the aggregate output.

mod aggregate;
mod fight;
pub mod lenient;
mod options;
mod player;
mod series;

pub use aggregate::*;
pub use fight::*;
pub use options::*;
pub use player::*;
pub use series::*;
