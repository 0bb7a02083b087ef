//! RBM model: parameters, Gibbs sampling, free energy, and the tensor
//! bridge between plain row vectors and burn tensors.

pub mod bridge;
pub mod rbm;
