//! Restricted Boltzmann Machine (RBM) on burn.
//!
//! A binary visible layer and a binary hidden layer joined by a dense weight
//! matrix, trained with contrastive divergence (CD-k) over Gibbs chains.
//! Training either adds manual CD deltas to the parameters or hands the
//! free-energy cost to a burn optimizer. Data loading and the training loop
//! are left to the caller.

pub mod config;
pub mod error;
pub mod model;
pub mod training;

pub use error::RbmError;
pub use model::rbm::{Rbm, RbmConfig, RbmOutput};
