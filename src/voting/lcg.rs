use std::num::NonZeroU64;

pub const DEFAULT_MULTIPLIER: u64 = 0x19660d;
pub const DEFAULT_INCREMENT: u64 = 0x3c6ef35f;
pub const DEFAULT_MODULUS: NonZeroU64 = match NonZeroU64::new(1 << 32) {
    Some(m) => m,
    None => panic!("modulus must be non-zero"),
};

/// Linear congruential generator used for every shuffle in a reveal.
///
/// The same seed always yields the same sequence, so a scoreboard reloaded
/// mid-show replays the same order.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
    a: u64,
    c: u64,
    m: NonZeroU64,
}

impl Lcg {
    pub fn new(seed: i64) -> Self {
        Self::with_params(seed, DEFAULT_MULTIPLIER, DEFAULT_INCREMENT, DEFAULT_MODULUS)
    }

    pub fn with_params(seed: i64, a: u64, c: u64, m: NonZeroU64) -> Self {
        // Reducing the seed first gives the same sequence as applying the step to the raw seed
        let state = (seed as i128).rem_euclid(m.get() as i128) as u64;
        Self { state, a, c, m }
    }

    pub fn next(&mut self) -> u64 {
        let m = self.m.get() as u128;
        self.state = ((self.state as u128 * self.a as u128 + self.c as u128) % m) as u64;
        self.state
    }

    // Random index in 0..bound, bound must be non-zero
    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }

    // Fisher-Yates, walking from the back
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }

    pub fn sample<T: Clone>(&mut self, items: &[T], k: usize) -> Vec<T> {
        let mut indices: Vec<usize> = (0..items.len()).collect();
        self.shuffle(&mut indices);
        indices
            .into_iter()
            .take(k)
            .map(|i| items[i].clone())
            .collect()
    }

    /// Swap `num_swaps` random pairs, leaving the rest of the order alone.
    ///
    /// Pairs are drawn from positions `0..len - 1`, so the last element only
    /// moves if it is swapped into. Fewer pairs are used when the slice is
    /// too short to supply them all.
    pub fn lightly_shuffle<T>(&mut self, items: &mut [T], num_swaps: usize) {
        let positions: Vec<usize> = (0..items.len().saturating_sub(1)).collect();
        let picked = self.sample(&positions, num_swaps.saturating_mul(2));
        for pair in picked.chunks_exact(2) {
            items.swap(pair[0], pair[1]);
        }
    }
}
