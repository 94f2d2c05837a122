use std::fmt;

use itertools::Itertools;
use rand::Rng;

#[cfg(feature = "serialize")]
use std::path::Path;
#[cfg(feature = "serialize")]
use serde::{ Serialize, Deserialize, de::DeserializeOwned };

use crate::{
  error::GradError,
  internal::uniform,
  scalar::Real,
  value::{ Graph, Value },
};


/// Collection of trainable parameters.

pub trait Module<T: Real> {
  fn parameters(&self) -> Vec<Value<T>>;

  /// Reset the gradient of every parameter.

  fn zero_grad(&self) {
    for param in self.parameters() {
      param.zero_grad();
    }
  }
}


/// Weighted sum of its inputs plus bias, optionally followed by ReLU.

#[derive(Debug, Clone)]
pub struct Neuron<T: Real = f64> {
  weights: Vec<Value<T>>,
  bias: Value<T>,
  nonlinear: bool,
}

impl<T: Real> Neuron<T> {
  pub fn new(graph: &Graph<T>, num_inputs: usize, nonlinear: bool) -> Self {
    Self::with_rng(graph, num_inputs, nonlinear, &mut rand::thread_rng())
  }

  /// Weights are drawn uniformly from `[-1, 1]`, the bias starts at zero.

  pub fn with_rng(graph: &Graph<T>, num_inputs: usize, nonlinear: bool, rng: &mut impl Rng) -> Self {
    let weights = (0..num_inputs)
      .map(|_| graph.leaf(uniform(rng, -T::one(), T::one())) )
      .collect();
    Self { weights, bias: graph.leaf(T::zero()), nonlinear }
  }

  pub fn num_inputs(&self) -> usize {
    self.weights.len()
  }

  pub fn is_nonlinear(&self) -> bool {
    self.nonlinear
  }

  pub fn forward(&self, inputs: &[Value<T>]) -> Result<Value<T>, GradError> {
    if inputs.len() != self.weights.len() {
      return Err(GradError::InputMismatch { expected: self.weights.len(), actual: inputs.len() })
    }
    let activation = self.weights.iter()
      .zip(inputs)
      .fold(self.bias.clone(), |sum, (weight, input)| sum + weight * input );
    Ok(if self.nonlinear { activation.relu() } else { activation })
  }
}

impl<T: Real> Module<T> for Neuron<T> {
  fn parameters(&self) -> Vec<Value<T>> {
    self.weights.iter().chain([&self.bias]).cloned().collect()
  }
}

impl<T: Real> fmt::Display for Neuron<T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let kind = if self.nonlinear { "ReLU" } else { "Linear" };
    write!(f, "{kind} Neuron({})", self.weights.len())
  }
}


/// Neurons sharing the same inputs.

#[derive(Debug, Clone)]
pub struct Layer<T: Real = f64> {
  neurons: Vec<Neuron<T>>,
}

impl<T: Real> Layer<T> {
  pub fn new(graph: &Graph<T>, num_inputs: usize, num_outputs: usize, nonlinear: bool) -> Self {
    Self::with_rng(graph, num_inputs, num_outputs, nonlinear, &mut rand::thread_rng())
  }

  pub fn with_rng(graph: &Graph<T>, num_inputs: usize, num_outputs: usize, nonlinear: bool, rng: &mut impl Rng) -> Self {
    let neurons = (0..num_outputs)
      .map(|_| Neuron::with_rng(graph, num_inputs, nonlinear, rng) )
      .collect();
    Self { neurons }
  }

  pub fn neurons(&self) -> &[Neuron<T>] {
    &self.neurons
  }

  pub fn forward(&self, inputs: &[Value<T>]) -> Result<Vec<Value<T>>, GradError> {
    self.neurons.iter()
      .map(|neuron| neuron.forward(inputs) )
      .collect()
  }
}

impl<T: Real> Module<T> for Layer<T> {
  fn parameters(&self) -> Vec<Value<T>> {
    self.neurons.iter().flat_map(|neuron| neuron.parameters() ).collect()
  }
}

impl<T: Real> fmt::Display for Layer<T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Layer of [{}]", self.neurons.iter().join(", "))
  }
}


/// Multi-layer perceptron.
///
/// Every layer but the last applies ReLU, so the output stays unbounded.
///
/// ```
/// use scalargrad::{ Graph, nn::{ Mlp, Module } };
///
/// let graph = Graph::new();
/// let model = Mlp::new(&graph, 3, &[4, 4, 1]);
/// let inputs = graph.leaves(&[2.0, 3.0, -1.0]);
/// let output = model.forward(&inputs).unwrap();
/// assert_eq!(output.len(), 1);
/// assert_eq!(model.parameters().len(), 41);
/// ```

#[derive(Debug, Clone)]
pub struct Mlp<T: Real = f64> {
  sizes: Vec<usize>,
  layers: Vec<Layer<T>>,
}

impl<T: Real> Mlp<T> {
  pub fn new(graph: &Graph<T>, num_inputs: usize, num_outputs: &[usize]) -> Self {
    Self::with_rng(graph, num_inputs, num_outputs, &mut rand::thread_rng())
  }

  pub fn with_rng(graph: &Graph<T>, num_inputs: usize, num_outputs: &[usize], rng: &mut impl Rng) -> Self {
    let sizes: Vec<usize> = [num_inputs].into_iter().chain(num_outputs.iter().copied()).collect();
    let layers = sizes.windows(2)
      .enumerate()
      .map(|(i, size)| Layer::with_rng(graph, size[0], size[1], i != num_outputs.len() - 1, rng) )
      .collect();
    Self { sizes, layers }
  }

  /// Number of inputs, followed by the number of outputs of each layer.

  pub fn sizes(&self) -> &[usize] {
    &self.sizes
  }

  pub fn layers(&self) -> &[Layer<T>] {
    &self.layers
  }

  pub fn forward(&self, inputs: &[Value<T>]) -> Result<Vec<Value<T>>, GradError> {
    let mut activations = inputs.to_vec();
    for layer in &self.layers {
      activations = layer.forward(&activations)?;
    }
    Ok(activations)
  }
}

impl<T: Real> Module<T> for Mlp<T> {
  fn parameters(&self) -> Vec<Value<T>> {
    self.layers.iter().flat_map(|layer| layer.parameters() ).collect()
  }
}

impl<T: Real> fmt::Display for Mlp<T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "MLP of [{}]", self.layers.iter().join(", "))
  }
}


#[cfg(feature = "serialize")]
#[derive(Serialize, Deserialize)]
struct Snapshot<T> {
  sizes: Vec<usize>,
  parameters: Vec<T>,
}

/// Weights plus biases of an MLP with the given sizes, `None` on overflow.

#[cfg(feature = "serialize")]
fn num_parameters(sizes: &[usize]) -> Option<usize> {
  sizes.windows(2).try_fold(0usize, |total, size| {
    let inputs = size[0].checked_add(1)?;
    total.checked_add(inputs.checked_mul(size[1])?)
  })
}

#[cfg(feature = "serialize")]
impl<T: Real + Serialize + DeserializeOwned> Mlp<T> {
  /// Encode layer sizes and current parameter values.

  pub fn to_bytes(&self) -> Result<Vec<u8>, GradError> {
    let snapshot = Snapshot {
      sizes: self.sizes.clone(),
      parameters: self.parameters().iter().map(|param| param.data() ).collect(),
    };
    postcard::to_allocvec(&snapshot)
      .map_err(|e| GradError::Serialization(e.to_string()) )
  }

  /// Rebuild a model on `graph` from bytes produced by [to_bytes](Self::to_bytes).

  pub fn from_bytes(graph: &Graph<T>, bytes: &[u8]) -> Result<Self, GradError> {
    let snapshot: Snapshot<T> = postcard::from_bytes(bytes)
      .map_err(|e| GradError::Serialization(e.to_string()) )?;
    let (&num_inputs, num_outputs) = snapshot.sizes.split_first()
      .ok_or_else(|| GradError::Serialization("Snapshot holds no layer sizes".to_string()) )?;

    // Validate before recording anything on the caller's graph
    let expected = num_parameters(&snapshot.sizes)
      .ok_or_else(|| GradError::Serialization("Snapshot layer sizes overflow".to_string()) )?;
    if expected != snapshot.parameters.len() {
      return Err(GradError::ParameterMismatch { expected, actual: snapshot.parameters.len() })
    }

    let model = Self::new(graph, num_inputs, num_outputs);
    for (param, data) in model.parameters().iter().zip(snapshot.parameters) {
      param.set_data(data)?;
    }
    Ok(model)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GradError> {
    std::fs::write(path, self.to_bytes()?)?;
    Ok(())
  }

  pub fn load(graph: &Graph<T>, path: impl AsRef<Path>) -> Result<Self, GradError> {
    let bytes = std::fs::read(path)?;
    Self::from_bytes(graph, &bytes)
  }
}


#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use rand::{ SeedableRng, rngs::StdRng };

  use super::*;
  use crate::optimize::{ Optimizer, Sgd };

  #[test]
  fn neuron() {
    let graph = Graph::<f64>::new();
    let neuron = Neuron::new(&graph, 2, true);
    neuron.weights[0].set_data(0.5).unwrap();
    neuron.weights[1].set_data(-1.0).unwrap();
    neuron.bias.set_data(0.25).unwrap();

    let output = neuron.forward(&graph.leaves(&[2.0, 0.5])).unwrap();
    assert_eq!(output.data(), 0.75);
    output.backward();
    assert_eq!(neuron.weights[0].grad(), 2.0);
    assert_eq!(neuron.weights[1].grad(), 0.5);
    assert_eq!(neuron.bias.grad(), 1.0);

    let output = neuron.forward(&graph.leaves(&[-2.0, 0.5])).unwrap();
    assert_eq!(output.data(), 0.0);
  }

  #[test]
  fn linear_neuron_passes_negatives() {
    let graph = Graph::<f64>::new();
    let neuron = Neuron::new(&graph, 1, false);
    neuron.weights[0].set_data(-3.0).unwrap();
    let output = neuron.forward(&graph.leaves(&[2.0])).unwrap();
    assert_eq!(output.data(), -6.0);
  }

  #[test]
  fn input_mismatch() {
    let graph = Graph::<f64>::new();
    let layer = Layer::new(&graph, 3, 2, true);
    let result = layer.forward(&graph.leaves(&[1.0, 2.0]));
    assert!(matches!(result, Err(GradError::InputMismatch { expected: 3, actual: 2 })));
  }

  #[test]
  fn initialization() {
    let graph = Graph::<f64>::new();
    let mut rng = StdRng::seed_from_u64(7);
    let model = Mlp::with_rng(&graph, 3, &[4, 4, 1], &mut rng);
    assert_eq!(model.sizes(), &[3, 4, 4, 1]);
    assert_eq!(model.parameters().len(), 41);
    for neuron in model.layers().iter().flat_map(|layer| layer.neurons() ) {
      assert!(neuron.weights.iter().all(|weight| (-1.0..=1.0).contains(&weight.data()) ));
      assert_eq!(neuron.bias.data(), 0.0);
    }
    let flags: Vec<_> = model.layers().iter().map(|layer| layer.neurons()[0].is_nonlinear() ).collect();
    assert_eq!(flags, vec![true, true, false]);
  }

  #[test]
  fn seeded_models_match() {
    let graph = Graph::<f64>::new();
    let a = Mlp::with_rng(&graph, 2, &[3, 1], &mut StdRng::seed_from_u64(1));
    let b = Mlp::with_rng(&graph, 2, &[3, 1], &mut StdRng::seed_from_u64(1));
    let data = |model: &Mlp| model.parameters().iter().map(|param| param.data() ).collect::<Vec<_>>();
    assert_eq!(data(&a), data(&b));
  }

  #[test]
  fn display() {
    let graph = Graph::<f64>::new();
    let model = Mlp::new(&graph, 2, &[3, 1]);
    assert_eq!(
      model.to_string(),
      "MLP of [Layer of [ReLU Neuron(2), ReLU Neuron(2), ReLU Neuron(2)], Layer of [Linear Neuron(3)]]"
    );
  }

  #[test]
  fn zero_grad() {
    let graph = Graph::<f64>::new();
    let model = Mlp::new(&graph, 2, &[2, 1]);
    let inputs = graph.leaves(&[1.0, -1.0]);
    let output = model.forward(&inputs).unwrap().remove(0);
    output.backward();
    assert!(model.parameters().iter().any(|param| param.grad() != 0.0 ));
    model.zero_grad();
    assert!(model.parameters().iter().all(|param| param.grad() == 0.0 ));
  }

  #[test]
  fn fits_linear_function() {
    // y = 2x - 1
    let graph = Graph::<f64>::new();
    let model = Mlp::new(&graph, 1, &[1]);
    let params = model.parameters();
    let mut optimizer = Optimizer::new(0.1, Sgd);
    let checkpoint = graph.checkpoint();
    for _ in 0..500 {
      let mut loss = graph.leaf(0.0);
      for x in [-1.0, 0.0, 0.5, 1.0] {
        let prediction = model.forward(&graph.leaves(&[x])).unwrap().remove(0);
        loss = loss + (prediction - (2.0 * x - 1.0)).sqr();
      }
      optimizer.minimize(&loss, &params).unwrap();
      graph.rewind(checkpoint);
    }
    assert_relative_eq!(params[0].data(), 2.0, epsilon = 1e-6);
    assert_relative_eq!(params[1].data(), -1.0, epsilon = 1e-6);
  }

  #[cfg(feature = "serialize")]
  #[test]
  fn bytes() {
    let graph = Graph::<f64>::new();
    let model = Mlp::new(&graph, 2, &[3, 1]);
    let restored = Mlp::from_bytes(&graph, &model.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.sizes(), model.sizes());
    let inputs = graph.leaves(&[0.3, -0.7]);
    let expected = model.forward(&inputs).unwrap()[0].data();
    assert_eq!(restored.forward(&inputs).unwrap()[0].data(), expected);
  }

  #[cfg(feature = "serialize")]
  #[test]
  fn parameter_mismatch() {
    let graph = Graph::<f64>::new();
    let snapshot = Snapshot { sizes: vec![2, 1], parameters: vec![1.0f64] };
    let bytes = postcard::to_allocvec(&snapshot).unwrap();
    let result = Mlp::from_bytes(&graph, &bytes);
    assert!(matches!(result, Err(GradError::ParameterMismatch { expected: 3, actual: 1 })));
    assert!(graph.is_empty());
  }

  #[cfg(feature = "serialize")]
  #[test]
  fn oversized_snapshot_is_rejected_up_front() {
    let graph = Graph::<f64>::new();
    let _input = graph.leaf(1.0);

    let snapshot = Snapshot { sizes: vec![1000, 5000], parameters: vec![1.0f64] };
    let bytes = postcard::to_allocvec(&snapshot).unwrap();
    let result = Mlp::from_bytes(&graph, &bytes);
    assert!(matches!(result, Err(GradError::ParameterMismatch { expected: 5_005_000, actual: 1 })));
    assert_eq!(graph.len(), 1);

    let snapshot = Snapshot { sizes: vec![usize::MAX, 2], parameters: vec![1.0f64] };
    let bytes = postcard::to_allocvec(&snapshot).unwrap();
    assert!(matches!(Mlp::from_bytes(&graph, &bytes), Err(GradError::Serialization(_))));
    assert_eq!(graph.len(), 1);
  }

  #[cfg(feature = "serialize")]
  #[test]
  fn parameter_count() {
    assert_eq!(num_parameters(&[3, 4, 4, 1]), Some(41));
    assert_eq!(num_parameters(&[3]), Some(0));
    assert_eq!(num_parameters(&[usize::MAX / 2, 3]), None);
  }

  #[cfg(feature = "serialize")]
  #[test]
  fn corrupt_bytes() {
    let result = Mlp::<f64>::from_bytes(&Graph::new(), &[]);
    assert!(matches!(result, Err(GradError::Serialization(_))));
  }

  #[cfg(feature = "serialize")]
  #[test]
  fn save_and_load() {
    let path = std::env::temp_dir().join(format!("scalargrad-mlp-{}.bin", std::process::id()));
    let graph = Graph::<f64>::new();
    let model = Mlp::new(&graph, 3, &[2, 2]);
    model.save(&path).unwrap();
    let loaded = Mlp::load(&Graph::new(), &path).unwrap();
    std::fs::remove_file(&path).unwrap();
    let data = |model: &Mlp| model.parameters().iter().map(|param| param.data() ).collect::<Vec<_>>();
    assert_eq!(data(&loaded), data(&model));
    assert!(matches!(Mlp::<f64>::load(&graph, &path), Err(GradError::Io(_))));
  }
}
