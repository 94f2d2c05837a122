// This example demonstrates training a small multi layer perceptron
// on a toy binary classification problem with a max-margin loss.

// Parameters are recorded once. Everything recorded after the checkpoint
// belongs to a single training step and gets discarded once it's done.

use rand::Rng;
use scalargrad::{ Graph, Value, nn::{ Mlp, Module }, optimize::{ Optimizer, Sgd } };

fn main() {
  env_logger::init();

  // Points inside the unit circle are labeled 1, others -1
  let mut rng = rand::thread_rng();
  let dataset: Vec<([f64; 2], f64)> = (0..64).map(|_| {
    let point = [rng.gen_range(-1.5, 1.5), rng.gen_range(-1.5, 1.5)];
    let label = if point[0] * point[0] + point[1] * point[1] < 1.0 { 1.0 } else { -1.0 };
    (point, label)
  }).collect();

  let graph = Graph::<f64>::new();
  let model = Mlp::new(&graph, 2, &[16, 16, 1]);
  println!("{model}");
  println!("Number of parameters: {}", model.parameters().len());

  let params = model.parameters();
  let mut optimizer = Optimizer::new(0.05, Sgd);
  let checkpoint = graph.checkpoint();

  for epoch in 0..100 {
    let mut loss = graph.leaf(0.0);
    let mut correct = 0;

    for (point, label) in &dataset {
      let inputs = graph.leaves(point);
      let score = model.forward(&inputs).unwrap().remove(0);
      if (score.data() > 0.0) == (*label > 0.0) { correct += 1 }

      // Hinge loss
      loss = loss + (1.0 - &score * *label).relu();
    }

    // L2 regularization
    let penalty = params.iter().fold(graph.leaf(0.0), |sum, param| sum + param.sqr() );
    let loss: Value = loss / dataset.len() as f64 + penalty * 1e-4;

    if epoch % 10 == 0 {
      println!("Epoch {epoch}: loss {:.4}, accuracy {}%", loss.data(), correct * 100 / dataset.len());
      println!("{:?}", loss.statistics());
    }

    optimizer.minimize(&loss, &params).unwrap();
    graph.rewind(checkpoint);
  }
}
