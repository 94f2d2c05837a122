use rand::Rng;

use crate::scalar::Real;


#[inline]
pub fn uniform<T: Real>(rng: &mut impl Rng, low: T, high: T) -> T {
  rng.gen_range(low, high)
}

#[inline]
pub fn constant<T: Real>(value: f64) -> T {
  T::from(value).unwrap_or_else(|| panic!("{value} is not representable"))
}
