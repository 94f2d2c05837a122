use serde::{ Serialize, Deserialize };

use crate::{
  error::GradError,
  ops::{ BaseOps, Hops },
  scalar::Real,
  tape::{ NodeId, Tape },
};


/// Primitive operation that produced a node.
///
/// Composite operations such as subtraction or division never appear here,
/// they are recorded as the primitives they are built from.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Op<T> {
  Add,
  Mul,
  Pow(T),
  Relu,
}

impl<T: Real> Op<T> {
  pub fn arity(&self) -> usize {
    match self {
      Op::Add | Op::Mul => 2,
      Op::Pow(_) | Op::Relu => 1,
    }
  }

  pub fn run(&self, inputs: &[T; 2]) -> T {
    let [lhs, rhs] = *inputs;
    match *self {
      Op::Add => lhs + rhs,
      Op::Mul => lhs * rhs,
      Op::Pow(exponent) => lhs.powf(exponent),
      Op::Relu => if lhs < T::zero() { T::zero() } else { lhs },
    }
  }

  /// Contribution to each operand's gradient, given the operands,
  /// the node's own value and the gradient flowing into it.
  /// Unused trailing slots of unary operations are zero.

  pub fn derive(&self, inputs: &[T; 2], output: T, grad: T) -> [T; 2] {
    let [lhs, rhs] = *inputs;
    let zero = T::zero();
    match *self {
      Op::Add => [grad, grad],
      Op::Mul => [grad * rhs, grad * lhs],
      Op::Pow(exponent) => [grad * exponent * lhs.powf(exponent - T::one()), zero],
      Op::Relu => [grad * if output > zero { T::one() } else { zero }, zero],
    }
  }
}


/// Exponent argument of [Tape::pow].
///
/// Only constants are differentiable exponents. A node passed as exponent
/// is rejected when the operation is recorded.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exponent<T> {
  Constant(T),
  Node(NodeId),
}

impl<T> From<NodeId> for Exponent<T> {
  fn from(id: NodeId) -> Self {
    Exponent::Node(id)
  }
}

impl From<f64> for Exponent<f64> {
  fn from(exponent: f64) -> Self {
    Exponent::Constant(exponent)
  }
}

impl From<f32> for Exponent<f32> {
  fn from(exponent: f32) -> Self {
    Exponent::Constant(exponent)
  }
}


impl<T: Real> BaseOps<T> for Tape<T> {
  fn constant(&mut self, item: T) -> NodeId {
    self.leaf(item)
  }

  fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
    self.record(Op::Add, vec![lhs, rhs])
  }

  fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
    self.record(Op::Mul, vec![lhs, rhs])
  }

  fn powf(&mut self, base: NodeId, exponent: T) -> NodeId {
    self.record(Op::Pow(exponent), vec![base])
  }

  fn relu(&mut self, input: NodeId) -> NodeId {
    self.record(Op::Relu, vec![input])
  }
}

impl<T: Real> Hops<T> for Tape<T> {}

impl<T: Real> Tape<T> {
  /// Raise `base` to a constant power.

  pub fn pow(&mut self, base: NodeId, exponent: impl Into<Exponent<T>>) -> Result<NodeId, GradError> {
    match exponent.into() {
      Exponent::Constant(exponent) => Ok(self.powf(base, exponent)),
      Exponent::Node(id) => Err(GradError::NonConstantExponent(id)),
    }
  }

  fn record(&mut self, op: Op<T>, inputs: Vec<NodeId>) -> NodeId {
    debug_assert_eq!(op.arity(), inputs.len());
    let data = op.run(&self.operand_values(&inputs));
    self.push(data, Some(op), inputs)
  }

  pub(crate) fn operand_values(&self, inputs: &[NodeId]) -> [T; 2] {
    let mut values = [T::zero(); 2];
    for (value, &id) in values.iter_mut().zip(inputs) {
      *value = self.data(id);
    }
    values
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn forward_values() {
    let mut tape = Tape::new();
    let x = tape.leaf(2.0);
    let y = tape.leaf(3.0);
    let sum = tape.add(x, y);
    let product = tape.mul(x, y);
    let cube = tape.powf(x, 3.0);
    let z = tape.constant(-2.0);
    let clipped = tape.relu(z);
    let passed = tape.relu(y);
    assert_eq!(tape.data(sum), 5.0);
    assert_eq!(tape.data(product), 6.0);
    assert_eq!(tape.data(cube), 8.0);
    assert_eq!(tape.data(clipped), 0.0);
    assert_eq!(tape.data(passed), 3.0);
  }

  #[test]
  fn relu_keeps_nan() {
    assert!(Op::Relu.run(&[f64::NAN, 0.0]).is_nan());
  }

  #[test]
  fn derivatives() {
    let grad = 2.0;
    assert_eq!(Op::Add.derive(&[3.0, 4.0], 7.0, grad), [2.0, 2.0]);
    assert_eq!(Op::Mul.derive(&[3.0, 4.0], 12.0, grad), [8.0, 6.0]);
    assert_eq!(Op::Pow(3.0).derive(&[2.0, 0.0], 8.0, grad), [24.0, 0.0]);
    assert_eq!(Op::Relu.derive(&[-1.0, 0.0], 0.0, grad), [0.0, 0.0]);
    assert_eq!(Op::Relu.derive(&[1.5, 0.0], 1.5, grad), [2.0, 0.0]);
  }

  #[test]
  fn node_exponent_is_rejected() {
    let mut tape = Tape::new();
    let x = tape.leaf(2.0);
    let k = tape.leaf(3.0);
    let len = tape.len();
    assert!(matches!(tape.pow(x, k), Err(GradError::NonConstantExponent(id)) if id == k));
    assert_eq!(tape.len(), len);
    let y = tape.pow(x, 3.0).unwrap();
    assert_eq!(tape.data(y), 8.0);
  }

  #[test]
  fn division_by_zero_is_not_guarded() {
    let mut tape = Tape::<f64>::new();
    let x = tape.leaf(1.0);
    let y = tape.leaf(0.0);
    let z = tape.div(x, y);
    assert!(tape.data(z).is_infinite());
    tape.backward(z);
    assert!(!tape.grad(y).is_finite());
  }
}
