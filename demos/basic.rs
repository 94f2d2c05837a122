use scalargrad::Graph;

fn main() {
  env_logger::init();

  // Create trainable leaves
  let graph = Graph::<f64>::new();
  let w = graph.leaf(-0.5);
  let b = graph.leaf(0.0);

  let learning_rate = 0.05;

  // Remember the tape length, so every step can discard its own nodes
  let checkpoint = graph.checkpoint();

  // Basic gradient descent
  for _ in 0..100 {

    // Compute loss
    let x = graph.leaf(2.0);
    let loss = ((&w * &x + &b).relu() - 1.5).sqr();

    // Compute gradients
    loss.backward();

    println!("Gradient of loss with respect to w: {}", w.grad());

    // Minimize loss by updating parameters
    for param in [&w, &b] {
      param.set_data(param.data() - param.grad() * learning_rate).unwrap();
    }

    // Reset gradients and drop this step's nodes
    loss.reset();
    graph.rewind(checkpoint);
  }

  println!("w = {}, b = {}", w, b);
}
