//! Reverse-mode automatic differentiation over scalar computation graphs.
//! Tiny. Few dependencies. CPU only.
//!
//! # Features
//!
//! - **Arena graphs** — Every value lives on a [Tape] owned by its [Graph]
//! and is referenced by a lightweight [NodeId]. Dropping the graph tears down
//! all of its nodes at once, shared sub-expressions never get copied.
//!
//! - **Small primitive set** — Only addition, multiplication, constant powers
//! and ReLU carry derivative rules. Negation, subtraction and division are
//! recorded as compositions of these, so their gradients follow for free.
//!
//! - **Deep graphs** — Topological ordering uses an explicit stack. Graphs
//! hundreds of thousands of nodes deep can be back-propagated safely.
//!
//! - **Graph recycling** — Leaves can be reassigned and a graph re-evaluated,
//! or a tape can be rewound to a [Checkpoint] to reuse it across training steps.
//!
//! - **Optimization** — Includes standard optimizers, such as SGD, Momentum and ADAM,
//! as well as a small multi-layer perceptron built from [Value]s.
//!
//! # Examples
//!
//! Differentiating an expression:
//! ```
//! use scalargrad::Graph;
//!
//! let graph = Graph::new();
//! let a = graph.leaf(3.0);
//! let b = graph.leaf(2.0);
//! let c = &a + &b;
//! let d = &a * &b + b.powf(3.0);
//! let g = &c * &d;
//! g.backward();
//!
//! assert_eq!(g.data(), 70.0);
//! assert_eq!(a.grad(), 24.0);
//! assert_eq!(b.grad(), 89.0);
//! ```
//!
//! Minimizing a function:
//! ```
//! use scalargrad::{ Graph, optimize::{ Optimizer, Sgd } };
//!
//! let graph = Graph::<f64>::new();
//! let x = graph.leaf(3.0);
//! let mut optimizer = Optimizer::new(0.1, Sgd);
//!
//! let checkpoint = graph.checkpoint();
//! for _ in 0..100 {
//!   let loss = (&x - 1.0).sqr();
//!   optimizer.minimize(&loss, &[x.clone()]).unwrap();
//!   graph.rewind(checkpoint);
//! }
//! assert!((x.data() - 1.0).abs() < 1e-3);
//! ```
//!
//! ## More examples
//! Check the `/demos` folder for more example code.
//!
//!
//! # Optional features
//!
//! Some features can be toggled in your `Cargo.toml`.
//!
//! - `serialize` *(default)* — Saving and loading of trained models using `postcard`.

mod internal;
mod tape;
mod value;

pub mod ops;
pub mod scalar;
pub mod error;
pub mod nn;
pub mod optimize;

pub use tape::{ Tape, Node, NodeId, Op, Exponent, Checkpoint, Statistics };
pub use value::{ Graph, Value, IntoValue, check_gradients };
pub use error::GradError;
