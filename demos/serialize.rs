// This example demonstrates saving a trained model to a file
// and loading it into a fresh graph elsewhere.

use scalargrad::{ Graph, nn::Mlp };

fn main() {
  env_logger::init();

  let filename = "model.nn";

  // Build and save a model
  let graph = Graph::<f64>::new();
  let model = Mlp::new(&graph, 3, &[4, 1]);
  model.save(filename).unwrap();

  // Load it elsewhere
  let graph = Graph::<f64>::new();
  let loaded = Mlp::load(&graph, filename).unwrap();
  let inputs = graph.leaves(&[1.0, -2.0, 0.5]);
  let output = loaded.forward(&inputs).unwrap();
  println!("{loaded} produced {}", output[0]);

  std::fs::remove_file(filename).unwrap();
}
