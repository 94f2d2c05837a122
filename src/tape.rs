use std::fmt;
use std::sync::atomic::{ AtomicU64, Ordering };

use itertools::Itertools;
use log::{ debug, trace };
use serde::{ Serialize, Deserialize };

mod mops;
mod backprop;

pub use mops::{ Op, Exponent };

use crate::{
  error::GradError,
  scalar::Real,
};


/// Handle to a [Node] stored on a [Tape].
///
/// Ids stay valid for as long as their node does. Nodes discarded by
/// [rewind](Tape::rewind) leave their ids stale; the stamp guarantees that a
/// stale id never resolves to a node recorded later in the same slot.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
  index: usize,
  stamp: u64,
}

impl NodeId {
  pub fn index(&self) -> usize {
    self.index
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "#{}", self.index)
  }
}


/// Vertex in a computation graph, holding the forward value,
/// the accumulated gradient and the operation used to create it.

#[derive(Debug, Clone)]
pub struct Node<T: Real> {
  stamp: u64,
  data: T,
  grad: T,
  op: Option<Op<T>>,
  inputs: Vec<NodeId>,
}

impl<T: Real> Node<T> {
  pub fn data(&self) -> T {
    self.data
  }

  pub fn grad(&self) -> T {
    self.grad
  }

  pub fn op(&self) -> Option<&Op<T>> {
    self.op.as_ref()
  }

  /// Operands in the order they were passed to the operation.
  /// `x + x` lists `x` twice.

  pub fn inputs(&self) -> &[NodeId] {
    &self.inputs
  }

  /// Distinct nodes this node was computed from.

  pub fn parents(&self) -> Vec<NodeId> {
    self.inputs.iter().copied().unique().collect()
  }

  pub fn is_leaf(&self) -> bool {
    self.op.is_none()
  }
}


/// Arena length recorded by [Tape::checkpoint].
///
/// A checkpoint only rewinds the tape that issued it (or a clone of that tape).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
  tape: u64,
  len: usize,
}

static NEXT_TAPE: AtomicU64 = AtomicU64::new(0);


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Statistics {
  pub nodes: usize,
  pub operations: usize,
  pub leaves: usize,
}


/// Dense arena owning every node of one computation graph.
///
/// Nodes reference their operands by [NodeId], so an operand is always older
/// than the nodes computed from it and the parent relation cannot form a cycle.
/// Dropping the tape tears down the whole graph at once.

#[derive(Debug, Clone)]
pub struct Tape<T: Real> {
  id: u64,
  nodes: Vec<Node<T>>,
  next_stamp: u64,
}

impl<T: Real> Default for Tape<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Real> Tape<T> {
  pub fn new() -> Self {
    Self { id: NEXT_TAPE.fetch_add(1, Ordering::Relaxed), nodes: vec![], next_stamp: 0 }
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Record an input or parameter node without parents.

  pub fn leaf(&mut self, data: T) -> NodeId {
    self.push(data, None, vec![])
  }

  pub(crate) fn push(&mut self, data: T, op: Option<Op<T>>, inputs: Vec<NodeId>) -> NodeId {
    let id = NodeId { index: self.nodes.len(), stamp: self.next_stamp };
    self.next_stamp += 1;
    trace!("Recorded {id} = {data} from {op:?} {inputs:?}");
    self.nodes.push(Node { stamp: id.stamp, data, grad: T::zero(), op, inputs });
    id
  }

  pub fn get(&self, id: NodeId) -> Option<&Node<T>> {
    self.nodes.get(id.index).filter(|node| node.stamp == id.stamp )
  }

  pub fn contains(&self, id: NodeId) -> bool {
    self.get(id).is_some()
  }

  pub fn node(&self, id: NodeId) -> &Node<T> {
    self.get(id).unwrap_or_else(|| panic!("Node {id} is not part of this tape") )
  }

  fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
    match self.nodes.get_mut(id.index) {
      Some(node) if node.stamp == id.stamp => node,
      _ => panic!("Node {id} is not part of this tape"),
    }
  }

  pub fn data(&self, id: NodeId) -> T {
    self.node(id).data
  }

  pub fn grad(&self, id: NodeId) -> T {
    self.node(id).grad
  }

  pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
    self.node(id).parents()
  }

  pub fn zero_grad(&mut self, id: NodeId) {
    self.node_mut(id).grad = T::zero();
  }

  /// Assign a new value to a leaf, typically a parameter update.
  /// Nodes computed from it keep their old value until [forward](Tape::forward).

  pub fn set_data(&mut self, id: NodeId, data: T) -> Result<(), GradError> {
    let node = self.node_mut(id);
    if !node.is_leaf() { return Err(GradError::NotALeaf(id)) }
    node.data = data;
    Ok(())
  }

  // Operands are older than their results and survive any rewind that keeps
  // the result, so indices taken from a live node's inputs are always valid.
  pub(crate) fn accumulate(&mut self, id: NodeId, change: T) {
    let node = &mut self.nodes[id.index];
    node.grad = node.grad + change;
  }

  pub fn checkpoint(&self) -> Checkpoint {
    Checkpoint { tape: self.id, len: self.nodes.len() }
  }

  /// Discard every node recorded after `checkpoint`.
  ///
  /// Ids of discarded nodes become stale. Nodes recorded before the
  /// checkpoint, such as model parameters, are unaffected.
  ///
  /// Panics if `checkpoint` was taken on a different tape.

  pub fn rewind(&mut self, checkpoint: Checkpoint) {
    assert_eq!(checkpoint.tape, self.id, "Checkpoint was taken on a different tape");
    if checkpoint.len >= self.nodes.len() { return }
    debug!("Rewinding tape from {} to {} nodes", self.nodes.len(), checkpoint.len);
    self.nodes.truncate(checkpoint.len);
  }

  pub fn statistics(&self, root: NodeId) -> Statistics {
    let history = self.topological_order(root);
    let leaves = history.iter().filter(|&&id| self.nodes[id.index].is_leaf() ).count();
    Statistics {
      nodes: history.len(),
      operations: history.len() - leaves,
      leaves,
    }
  }
}
