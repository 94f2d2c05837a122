use std::cell::{ Ref, RefCell, RefMut };
use std::fmt;
use std::rc::Rc;

use crate::{
  error::GradError,
  ops::{ BaseOps, Hops },
  scalar::Real,
  tape::{ Checkpoint, Exponent, NodeId, Op, Statistics, Tape },
};


/// Shared handle to one [Tape].
///
/// Cloning a graph clones the handle, not the nodes. The tape is torn
/// down once the graph and every [Value] recorded on it are dropped.

#[derive(Clone)]
pub struct Graph<T: Real = f64> {
  tape: Rc<RefCell<Tape<T>>>,
}

impl<T: Real> Default for Graph<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Real> fmt::Debug for Graph<T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Graph").field("nodes", &self.len()).finish()
  }
}

impl<T: Real> Graph<T> {
  pub fn new() -> Self {
    Self { tape: Rc::new(RefCell::new(Tape::new())) }
  }

  /// Create an input or parameter value.

  pub fn leaf(&self, data: T) -> Value<T> {
    let id = self.tape_mut().leaf(data);
    self.wrap(id)
  }

  pub fn leaves(&self, data: &[T]) -> Vec<Value<T>> {
    data.iter().map(|&item| self.leaf(item) ).collect()
  }

  /// Wrap an id recorded on this graph's tape.

  pub fn value(&self, id: NodeId) -> Value<T> {
    assert!(self.tape().contains(id), "Node {id} is not part of this graph");
    self.wrap(id)
  }

  fn wrap(&self, id: NodeId) -> Value<T> {
    Value { graph: self.clone(), id }
  }

  pub fn tape(&self) -> Ref<'_, Tape<T>> {
    self.tape.borrow()
  }

  pub fn tape_mut(&self) -> RefMut<'_, Tape<T>> {
    self.tape.borrow_mut()
  }

  pub fn len(&self) -> usize {
    self.tape().len()
  }

  pub fn is_empty(&self) -> bool {
    self.tape().is_empty()
  }

  pub fn checkpoint(&self) -> Checkpoint {
    self.tape().checkpoint()
  }

  /// Discard every value recorded after `checkpoint`.
  /// See [Tape::rewind].

  pub fn rewind(&self, checkpoint: Checkpoint) {
    self.tape_mut().rewind(checkpoint)
  }

  pub fn same(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.tape, &other.tape)
  }
}


/// Conversion into a [Value] living on a given graph.
///
/// Bare scalars become new leaves, values are passed through unchanged.

pub trait IntoValue<T: Real> {
  fn into_value(self, graph: &Graph<T>) -> Value<T>;
}

impl<T: Real> IntoValue<T> for T {
  fn into_value(self, graph: &Graph<T>) -> Value<T> {
    graph.leaf(self)
  }
}

impl<T: Real> IntoValue<T> for Value<T> {
  fn into_value(self, _graph: &Graph<T>) -> Value<T> {
    self
  }
}

impl<T: Real> IntoValue<T> for &Value<T> {
  fn into_value(self, _graph: &Graph<T>) -> Value<T> {
    self.clone()
  }
}


/// Scalar tracked on a computation graph.
///
/// Values record the operations used to create them and allow for computing
/// their gradient with respect to every value they depend on.
/// Arithmetic operators accept other values as well as bare scalars on either side.

#[derive(Clone)]
pub struct Value<T: Real = f64> {
  graph: Graph<T>,
  id: NodeId,
}

impl<T: Real> Value<T> {
  pub fn id(&self) -> NodeId {
    self.id
  }

  pub fn graph(&self) -> &Graph<T> {
    &self.graph
  }

  pub fn data(&self) -> T {
    self.graph.tape().data(self.id)
  }

  pub fn grad(&self) -> T {
    self.graph.tape().grad(self.id)
  }

  pub fn op(&self) -> Option<Op<T>> {
    self.graph.tape().node(self.id).op().copied()
  }

  pub fn is_leaf(&self) -> bool {
    self.graph.tape().node(self.id).is_leaf()
  }

  pub fn parents(&self) -> Vec<Self> {
    let parents = self.graph.tape().parents(self.id);
    parents.into_iter().map(|id| self.graph.wrap(id) ).collect()
  }

  /// Assign new data to a leaf value.

  pub fn set_data(&self, data: T) -> Result<(), GradError> {
    self.graph.tape_mut().set_data(self.id, data)
  }

  pub fn zero_grad(&self) {
    self.graph.tape_mut().zero_grad(self.id)
  }

  /// Compute gradients across this value's entire graph.
  /// See [Tape::backward] for accumulation semantics.

  pub fn backward(&self) {
    self.graph.tape_mut().backward(self.id)
  }

  /// Reevaluate this value's graph to reflect reassigned leaves.

  pub fn forward(&self) {
    self.graph.tape_mut().forward(self.id)
  }

  /// Set gradients to zero for this value's entire graph.

  pub fn reset(&self) {
    self.graph.tape_mut().reset(self.id)
  }

  pub fn topological_order(&self) -> Vec<Self> {
    let order = self.graph.tape().topological_order(self.id);
    order.into_iter().map(|id| self.graph.wrap(id) ).collect()
  }

  pub fn statistics(&self) -> Statistics {
    self.graph.tape().statistics(self.id)
  }

  pub fn relu(&self) -> Self {
    self.unary(|tape, id| tape.relu(id) )
  }

  pub fn powf(&self, exponent: T) -> Self {
    self.unary(|tape, id| tape.powf(id, exponent) )
  }

  /// Raise to a constant power. Passing a value as exponent fails with
  /// [GradError::NonConstantExponent].

  pub fn pow(&self, exponent: impl Into<Exponent<T>>) -> Result<Self, GradError> {
    let id = self.graph.tape_mut().pow(self.id, exponent)?;
    Ok(self.graph.wrap(id))
  }

  pub fn sqr(&self) -> Self {
    self.unary(|tape, id| tape.sqr(id) )
  }

  pub fn recip(&self) -> Self {
    self.unary(|tape, id| tape.recip(id) )
  }

  fn unary(&self, build: impl FnOnce(&mut Tape<T>, NodeId) -> NodeId) -> Self {
    let id = build(&mut *self.graph.tape_mut(), self.id);
    self.graph.wrap(id)
  }

  fn combine(&self, rhs: impl IntoValue<T>, build: impl FnOnce(&mut Tape<T>, NodeId, NodeId) -> NodeId) -> Self {
    let rhs = rhs.into_value(&self.graph);
    assert!(self.graph.same(&rhs.graph), "Cannot combine values from different graphs");
    let id = build(&mut *self.graph.tape_mut(), self.id, rhs.id);
    self.graph.wrap(id)
  }
}

impl<T: Real> From<&Value<T>> for Exponent<T> {
  fn from(value: &Value<T>) -> Self {
    Exponent::Node(value.id)
  }
}

impl<T: Real> From<Value<T>> for Exponent<T> {
  fn from(value: Value<T>) -> Self {
    Exponent::Node(value.id)
  }
}

impl<T: Real> fmt::Display for Value<T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let tape = self.graph.tape();
    let node = tape.node(self.id);
    write!(f, "Value(data={}, grad={})", node.data(), node.grad())
  }
}

impl<T: Real> fmt::Debug for Value<T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let tape = self.graph.tape();
    let node = tape.node(self.id);
    f.debug_struct("Value")
      .field("id", &self.id)
      .field("data", &node.data())
      .field("grad", &node.grad())
      .finish()
  }
}

impl<T: Real> std::ops::Neg for &Value<T> {
  type Output = Value<T>;

  fn neg(self) -> Self::Output {
    self.unary(|tape, id| tape.neg(id) )
  }
}

impl<T: Real> std::ops::Neg for Value<T> {
  type Output = Value<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($op:ident, $meth:ident, $symbol:tt) => {
    impl<T: Real> std::ops::$op for &Value<T> { // &value * &other
      type Output = Value<T>;

      fn $meth(self, rhs: Self) -> Value<T> {
        self.combine(rhs, |tape, lhs, rhs| tape.$meth(lhs, rhs) )
      }
    }

    impl<T: Real> std::ops::$op for Value<T> { // value * other
      type Output = Value<T>;

      fn $meth(self, rhs: Self) -> Value<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<Value<T>> for &Value<T> { // &value * other
      type Output = Value<T>;

      fn $meth(self, rhs: Value<T>) -> Value<T> {
        self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<&Value<T>> for Value<T> { // value * &other
      type Output = Value<T>;

      fn $meth(self, rhs: &Value<T>) -> Value<T> {
        &self $symbol rhs
      }
    }

    impl<T: Real> std::ops::$op<T> for &Value<T> { // &value * T
      type Output = Value<T>;

      fn $meth(self, rhs: T) -> Value<T> {
        self.combine(rhs, |tape, lhs, rhs| tape.$meth(lhs, rhs) )
      }
    }

    impl<T: Real> std::ops::$op<T> for Value<T> { // value * T
      type Output = Value<T>;

      fn $meth(self, rhs: T) -> Value<T> {
        &self $symbol rhs
      }
    }

    add_operator!(@scalar $op, $meth, $symbol, f32);
    add_operator!(@scalar $op, $meth, $symbol, f64);
  };

  (@scalar $op:ident, $meth:ident, $symbol:tt, $scalar:ty) => {
    impl std::ops::$op<&Value<$scalar>> for $scalar { // T * &value
      type Output = Value<$scalar>;

      fn $meth(self, rhs: &Value<$scalar>) -> Value<$scalar> {
        self.into_value(&rhs.graph) $symbol rhs
      }
    }

    impl std::ops::$op<Value<$scalar>> for $scalar { // T * value
      type Output = Value<$scalar>;

      fn $meth(self, rhs: Value<$scalar>) -> Value<$scalar> {
        self $symbol &rhs
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);


/// Compute a function's gradient with respect to each input numerically and
/// compare it to the automatically derived solution.
///
/// Returns the largest difference found, relative to the magnitude of the
/// compared gradients where they exceed one. NaN gradients yield NaN.

pub fn check_gradients<T, F>(inputs: &[T], function: F) -> T
where
  T: Real,
  F: Fn(&[Value<T>]) -> Value<T>,
{
  let eps = T::epsilon().cbrt();
  let two = T::one() + T::one();

  // Gradients using auto diff
  let graph = Graph::new();
  let variables = graph.leaves(inputs);
  function(&variables).backward();

  let evaluate = |shifted: &[T]| function(&Graph::new().leaves(shifted)).data();

  // Central differences for every input
  let mut worst = T::zero();
  for (i, variable) in variables.iter().enumerate() {
    let mut shifted = inputs.to_vec();
    shifted[i] = inputs[i] + eps;
    let next = evaluate(&shifted);
    shifted[i] = inputs[i] - eps;
    let prev = evaluate(&shifted);
    let numeric = (next - prev) / (two * eps);
    let analytic = variable.grad();
    let scale = T::one().max(analytic.abs()).max(numeric.abs());
    let difference = (analytic - numeric).abs() / scale;
    if difference.is_nan() || difference > worst {
      worst = difference;
    }
  }
  worst
}
