//! Type definitions for claim records and predictions

pub mod prediction;
pub mod record;

pub use prediction::{ClaimPrediction, FraudLabel};
pub use record::{RawRecord, RawTable};
