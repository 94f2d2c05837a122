use std::collections::HashMap;

use log::debug;

use crate::{
  error::GradError,
  internal::constant,
  scalar::Real,
  tape::NodeId,
  value::Value,
};


/// An optimization strategy to be used with [Optimizer].

pub trait Strategy<T: Real> {
  /// Change to be added to `param`, given its current gradient.
  fn update(&mut self, param: &Value<T>, rate: T, step: usize) -> T;
}


/// Generic optimizer that allows for several optimization [strategies](Strategy) to be used.

#[derive(Debug)]
pub struct Optimizer<T: Real, S: Strategy<T>> {
  strategy: S,
  pub learning_rate: T,
  step: usize,
}

impl<T: Real, S: Strategy<T>> Optimizer<T, S> {
  pub fn new(learning_rate: T, strategy: S) -> Self {
    Self { strategy, learning_rate, step: 1 }
  }

  pub fn step(&self) -> usize {
    self.step
  }

  /// Back-propagate `loss`, update every parameter in `params`
  /// and reset the gradients of the loss graph afterwards.
  ///
  /// Parameters have to be leaves, otherwise nothing is changed and
  /// [GradError::NotALeaf] is returned. Operations computed from them keep
  /// their stale value until the graph is rebuilt or [forwarded](Value::forward).

  pub fn minimize(&mut self, loss: &Value<T>, params: &[Value<T>]) -> Result<(), GradError> {
    if let Some(param) = params.iter().find(|param| !param.is_leaf() ) {
      return Err(GradError::NotALeaf(param.id()))
    }

    // Compute gradients
    loss.backward();
    debug!("Optimizer step {} with loss {} over {} parameters", self.step, loss.data(), params.len());

    // Optimize individual parameters
    for param in params {
      let change = self.strategy.update(param, self.learning_rate, self.step);
      param.set_data(param.data() + change)?;
    }

    // Reset gradients
    loss.reset();

    self.step += 1;
    Ok(())
  }
}


/// Stochastic Gradient Descent strategy

#[derive(Debug, Clone, Default)]
pub struct Sgd;

impl<T: Real> Strategy<T> for Sgd {
  fn update(&mut self, param: &Value<T>, rate: T, _step: usize) -> T {
    -param.grad() * rate
  }
}


/// Stochastic Gradient Descent with momentum

#[derive(Debug, Clone)]
pub struct Momentum<T: Real> {
  pub momentum: T,
  v: HashMap<NodeId, T>,
}

impl<T: Real> Momentum<T> {
  pub fn new(momentum: T) -> Self {
    Self {
      momentum,
      v: HashMap::new(),
    }
  }
}

impl<T: Real> Default for Momentum<T> {
  fn default() -> Self {
    Self::new(constant(0.9))
  }
}

impl<T: Real> Strategy<T> for Momentum<T> {
  fn update(&mut self, param: &Value<T>, rate: T, _step: usize) -> T {
    let v = self.v.entry(param.id()).or_insert_with(T::zero);
    *v = *v * self.momentum - param.grad() * rate;
    *v
  }
}


/// Stochastic Gradient Descent with Nesterov momentum

#[derive(Debug, Clone)]
pub struct Nesterov<T: Real> {
  pub momentum: T,
  v: HashMap<NodeId, T>,
}

impl<T: Real> Nesterov<T> {
  pub fn new(momentum: T) -> Self {
    Self {
      momentum,
      v: HashMap::new(),
    }
  }
}

impl<T: Real> Default for Nesterov<T> {
  fn default() -> Self {
    Self::new(constant(0.9))
  }
}

impl<T: Real> Strategy<T> for Nesterov<T> {
  fn update(&mut self, param: &Value<T>, rate: T, _step: usize) -> T {
    let v = self.v.entry(param.id()).or_insert_with(T::zero);
    let v_prev = *v;
    *v = *v * self.momentum - param.grad() * rate;
    -v_prev * self.momentum + *v * (T::one() + self.momentum)
  }
}


/// Adaptive Movement Estimation strategy (ADAM)

#[derive(Debug, Clone)]
pub struct Adam<T: Real> {
  pub beta1: T,
  pub beta2: T,
  pub epsilon: T,
  m: HashMap<NodeId, T>,
  v: HashMap<NodeId, T>,
}

impl<T: Real> Adam<T> {
  pub fn new(beta1: T, beta2: T) -> Self {
    Self {
      beta1,
      beta2,
      epsilon: constant(1e-8),
      m: HashMap::new(),
      v: HashMap::new(),
    }
  }
}

impl<T: Real> Default for Adam<T> {
  fn default() -> Self {
    Self::new(constant(0.9), constant(0.999))
  }
}

impl<T: Real> Strategy<T> for Adam<T> {
  fn update(&mut self, param: &Value<T>, rate: T, step: usize) -> T {
    let id = param.id();
    let grad = param.grad();
    let m = self.m.entry(id).or_insert_with(T::zero);
    *m = *m * self.beta1 + grad        * (T::one() - self.beta1);
    let m = *m;
    let v = self.v.entry(id).or_insert_with(T::zero);
    *v = *v * self.beta2 + grad * grad * (T::one() - self.beta2);
    let v = *v;
    let step = T::from(step).unwrap_or_else(T::max_value);
    let mt = m / (T::one() - self.beta1.powf(step));
    let vt = v / (T::one() - self.beta2.powf(step));
    -mt * rate / (vt.sqrt() + self.epsilon)
  }
}
