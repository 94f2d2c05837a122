use scalargrad::{ Graph, optimize::{ Optimizer, Adam } };

fn main() {
  env_logger::init();

  // Create trainable leaves
  let graph = Graph::<f64>::new();
  let x = graph.leaf(-2.0);
  let y = graph.leaf(3.0);

  // Use a standard optimizer
  let mut optimizer = Optimizer::new(0.05, Adam::default());

  let checkpoint = graph.checkpoint();

  // Basic training loop
  for step in 0..500 {

    // Rosenbrock function, minimal at (1, 1)
    let loss = (1.0 - &x).sqr() + 100.0 * (&y - x.sqr()).sqr();

    if step % 50 == 0 {
      println!("Step {step}: loss {}", loss.data());
    }

    // Back-prop, optimize and reset gradients
    optimizer.minimize(&loss, &[x.clone(), y.clone()]).unwrap();
    graph.rewind(checkpoint);
  }

  println!("x = {}, y = {}", x.data(), y.data());
}
