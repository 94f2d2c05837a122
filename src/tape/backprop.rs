use log::debug;

use crate::{
  scalar::Real,
  tape::{ NodeId, Tape },
};


impl<T: Real> Tape<T> {
  /// List every node reachable from `root`, each one after all of its parents.
  ///
  /// Uses an explicit work stack, so graph depth is not bounded by the call stack.

  pub fn topological_order(&self, root: NodeId) -> Vec<NodeId> {
    self.node(root);
    let mut order = vec![];
    let mut visited = vec![false; self.nodes.len()];
    let mut stack = vec![(root, false)];
    while let Some((id, expanded)) = stack.pop() {
      if expanded {
        order.push(id);
        continue
      }
      if visited[id.index] { continue }
      visited[id.index] = true;
      stack.push((id, true));
      for &parent in self.nodes[id.index].inputs.iter().rev() {
        if !visited[parent.index] { stack.push((parent, false)) }
      }
    }
    order
  }

  /// Compute the gradient of `root` with respect to every node it depends on.
  ///
  /// Gradients are accumulated, not assigned. Calling this again without
  /// [reset](Tape::reset) or [zero_grad](Tape::zero_grad) adds to the
  /// gradients left by the previous pass.

  pub fn backward(&mut self, root: NodeId) {
    let order = self.topological_order(root);
    debug!("Backward pass from {root} across {} nodes", order.len());
    self.nodes[root.index].grad = T::one();
    for &id in order.iter().rev() {
      self.propagate(id);
    }
  }

  fn propagate(&mut self, id: NodeId) {
    let node = &self.nodes[id.index];
    let Some(op) = node.op else { return };
    let changes = op.derive(&self.operand_values(&node.inputs), node.data, node.grad);
    let inputs = [node.inputs.first().copied(), node.inputs.get(1).copied()];
    for (input, change) in inputs.into_iter().flatten().zip(changes) {
      self.accumulate(input, change);
    }
  }

  /// Recompute every operation reachable from `root`, e.g. after
  /// leaves were reassigned with [set_data](Tape::set_data).

  pub fn forward(&mut self, root: NodeId) {
    let order = self.topological_order(root);
    debug!("Forward pass to {root} across {} nodes", order.len());
    for id in order {
      let node = &self.nodes[id.index];
      if let Some(op) = node.op {
        let data = op.run(&self.operand_values(&node.inputs));
        self.nodes[id.index].data = data;
      }
    }
  }

  /// Set gradients to zero for every node reachable from `root`.

  pub fn reset(&mut self, root: NodeId) {
    for id in self.topological_order(root) {
      self.nodes[id.index].grad = T::zero();
    }
  }
}


#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;
  use crate::ops::*;

  #[test]
  fn add() {
    let mut tape = Tape::new();
    let a = tape.leaf(-4.0);
    let b = tape.leaf(7.5);
    let c = tape.add(a, b);
    tape.backward(c);
    assert_eq!(tape.grad(a), 1.0);
    assert_eq!(tape.grad(b), 1.0);
    assert_eq!(tape.grad(c), 1.0);
  }

  #[test]
  fn mul() {
    let mut tape = Tape::new();
    let x = tape.leaf(2.0);
    let y = tape.leaf(3.0);
    let z = tape.mul(x, y);
    assert_eq!(tape.data(z), 6.0);
    tape.backward(z);
    assert_eq!(tape.grad(x), 3.0);
    assert_eq!(tape.grad(y), 2.0);
  }

  #[test]
  fn pow() {
    let mut tape = Tape::new();
    let x = tape.leaf(2.0);
    let z = tape.powf(x, 2.0);
    tape.backward(z);
    assert_eq!(tape.grad(x), 4.0);

    let mut tape = Tape::new();
    let x = tape.leaf(1.5);
    let z = tape.powf(x, -0.5);
    tape.backward(z);
    assert_relative_eq!(tape.grad(x), -0.5 * 1.5f64.powf(-1.5));
  }

  #[test]
  fn relu() {
    let mut tape = Tape::new();
    let x = tape.leaf(-2.0);
    let y = tape.relu(x);
    assert_eq!(tape.data(y), 0.0);
    tape.backward(y);
    assert_eq!(tape.grad(x), 0.0);

    let mut tape = Tape::new();
    let x = tape.leaf(0.7);
    let y = tape.relu(x);
    tape.backward(y);
    assert_eq!(tape.grad(x), 1.0);
  }

  #[test]
  fn fan_out() {
    let mut tape = Tape::new();
    let a = tape.leaf(3.0);
    let b = tape.add(a, a);
    tape.backward(b);
    assert_eq!(tape.grad(a), 2.0);
  }

  #[test]
  fn diamond() {
    // y = (x * 3) + (x * x), dy/dx = 3 + 2x
    let mut tape = Tape::new();
    let x = tape.leaf(4.0);
    let three = tape.constant(3.0);
    let left = tape.mul(x, three);
    let right = tape.mul(x, x);
    let y = tape.add(left, right);
    tape.backward(y);
    assert_eq!(tape.data(y), 28.0);
    assert_eq!(tape.grad(x), 11.0);
  }

  #[test]
  fn div() {
    let mut tape = Tape::new();
    let x = tape.leaf(10.0);
    let y = tape.leaf(5.0);
    let z = tape.div(x, y);
    assert_eq!(tape.data(z), 2.0);
    tape.backward(z);
    assert_relative_eq!(tape.grad(x), 0.2);
    assert_relative_eq!(tape.grad(y), -0.4);
  }

  #[test]
  fn sub_and_neg() {
    let mut tape = Tape::new();
    let a = tape.leaf(5.0);
    let b = tape.leaf(2.0);
    let c = tape.sub(a, b);
    let d = tape.neg(c);
    tape.backward(d);
    assert_eq!(tape.data(d), -3.0);
    assert_eq!(tape.grad(a), -1.0);
    assert_eq!(tape.grad(b), 1.0);
  }

  #[test]
  fn order_lists_parents_first() {
    let mut tape = Tape::new();
    let a = tape.leaf(1.0);
    let b = tape.leaf(2.0);
    let c = tape.mul(a, b);
    let d = tape.add(c, a);
    let e = tape.relu(d);
    let f = tape.mul(e, c);
    let order = tape.topological_order(f);
    assert_eq!(order.len(), 6);
    assert_eq!(order.last(), Some(&f));
    for (position, &id) in order.iter().enumerate() {
      for parent in tape.parents(id) {
        let parent_position = order.iter().position(|&other| other == parent ).unwrap();
        assert!(parent_position < position);
      }
    }
  }

  #[test]
  fn order_skips_unreachable() {
    let mut tape = Tape::new();
    let a = tape.leaf(1.0);
    let b = tape.leaf(2.0);
    let _c = tape.add(a, b);
    let d = tape.relu(a);
    assert_eq!(tape.topological_order(d), vec![a, d]);
  }

  #[test]
  fn deep_graph() {
    let mut tape = Tape::new();
    let x = tape.leaf(1.0);
    let one = tape.constant(1.0);
    let mut y = x;
    for _ in 0..200_000 {
      y = tape.add(y, one);
    }
    tape.backward(y);
    assert_eq!(tape.data(y), 200_001.0);
    assert_eq!(tape.grad(x), 1.0);
    assert_eq!(tape.grad(one), 200_000.0);
  }

  #[test]
  fn repeated_backward_accumulates() {
    let mut tape = Tape::new();
    let x = tape.leaf(2.0);
    let y = tape.leaf(3.0);
    let z = tape.mul(x, y);
    tape.backward(z);
    tape.backward(z);
    assert_eq!(tape.grad(x), 6.0);
    tape.reset(z);
    assert_eq!(tape.grad(x), 0.0);
    assert_eq!(tape.grad(z), 0.0);
    tape.backward(z);
    assert_eq!(tape.grad(x), 3.0);
  }

  #[test]
  fn forward_after_assignment() {
    let mut tape = Tape::new();
    let x = tape.leaf(2.0);
    let y = tape.leaf(3.0);
    let product = tape.mul(x, y);
    let z = tape.relu(product);
    tape.set_data(x, -1.0).unwrap();
    assert_eq!(tape.data(z), 6.0);
    tape.forward(z);
    assert_eq!(tape.data(product), -3.0);
    assert_eq!(tape.data(z), 0.0);
  }
}
