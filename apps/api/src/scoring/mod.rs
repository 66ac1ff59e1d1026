pub mod ats;

pub use ats::{ats_score, AtsReport};
