use std::fmt::{ Debug, Display };

use rand::distributions::uniform::SampleUniform;
use num_traits::Float;


/// All floating point types that may be stored in a [Tape](crate::Tape).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Real: Float + SampleUniform + Debug + Display + 'static {}
impl<T: Float + SampleUniform + Debug + Display + 'static> Real for T {}
