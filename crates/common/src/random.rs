use rand::distributions::uniform::SampleUniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform random number source used for scattering instances.
///
/// Seeded generators are reproducible; `from_entropy` is not.
#[derive(Debug, Clone)]
pub struct Random {
    rng: StdRng,
}

impl Random {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A value uniformly drawn from `[min, max)`. Returns `min` when the range
    /// is empty.
    pub fn next<T>(&mut self, min: T, max: T) -> T
    where
        T: SampleUniform + PartialOrd + Copy,
    {
        if !(min < max) {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    /// `amount` values drawn with [`Random::next`].
    pub fn range<T>(&mut self, min: T, max: T, amount: usize) -> Vec<T>
    where
        T: SampleUniform + PartialOrd + Copy,
    {
        (0..amount).map(|_| self.next(min, max)).collect()
    }
}
