use crate::{
  scalar::Real,
  tape::NodeId,
};


/// Differentiable primitive operations.
///
/// Every call records exactly one node whose [Op](crate::Op) carries
/// the derivative rule used during the backward pass.

pub trait BaseOps<T: Real> {
  fn constant(&mut self, item: T) -> NodeId;
  fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId;
  fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId;
  fn powf(&mut self, base: NodeId, exponent: T) -> NodeId;
  fn relu(&mut self, input: NodeId) -> NodeId;
}


/// High-level operations, implemented exclusively on top of
/// [BaseOps]. As a result, their gradients follow from the
/// primitives they are composed of.

pub trait Hops<T: Real>: BaseOps<T> {
  fn neg(&mut self, input: NodeId) -> NodeId {
    let minus_one = self.constant(-T::one());
    self.mul(input, minus_one)
  }

  fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
    let negated = self.neg(rhs);
    self.add(lhs, negated)
  }

  fn recip(&mut self, input: NodeId) -> NodeId {
    self.powf(input, -T::one())
  }

  fn div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
    let reciprocal = self.recip(rhs);
    self.mul(lhs, reciprocal)
  }

  fn sqr(&mut self, input: NodeId) -> NodeId {
    self.powf(input, T::one() + T::one())
  }
}
