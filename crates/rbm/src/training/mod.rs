//! RBM training steps: the manual contrastive-divergence update, the
//! optimizer-driven free-energy step, and monitoring metrics.

pub mod cd;
pub mod gradient;
pub mod metrics;
