use thiserror::Error;

use crate::tape::NodeId;


/// Errors reported by fallible graph and model operations.
///
/// Numerical degeneracy (division by zero, overflow) is never reported here.
/// It propagates as infinity or NaN through the affected values and gradients.

#[derive(Error, Debug)]
pub enum GradError {
  #[error("Only constant exponents are supported, got node {0}")]
  NonConstantExponent(NodeId),

  #[error("Node {0} was produced by an operation, only leaves can be assigned")]
  NotALeaf(NodeId),

  #[error("Expected {expected} inputs, got {actual}")]
  InputMismatch { expected: usize, actual: usize },

  #[error("Model has {expected} parameters but the snapshot holds {actual}")]
  ParameterMismatch { expected: usize, actual: usize },

  #[error("Failed to encode or decode model: {0}")]
  Serialization(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}
