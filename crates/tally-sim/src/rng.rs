use serde::{Deserialize, Serialize};

/// Seeded LCG driving every random choice in a simulation run.
///
/// Same seed, same run, on every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    #[must_use]
    pub const fn from_seed(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// An independent stream derived from this seed, e.g. one per viewer.
    #[must_use]
    pub const fn fork(&self, salt: u64) -> Self {
        Self::from_seed(self.state.rotate_left(17) ^ salt.wrapping_mul(0xA24B_AED4_963E_E407))
    }

    pub const fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // High bits of an LCG are the well-mixed ones.
        self.state >> 11
    }

    /// Value in `[0, upper)`, or 0 when `upper` is 0.
    pub const fn below(&mut self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        self.next_u64() % upper
    }

    /// True with probability `percent / 100`.
    pub fn chance(&mut self, percent: u8) -> bool {
        match percent {
            0 => false,
            100.. => true,
            p => self.below(100) < u64::from(p),
        }
    }

    /// Uniform element of `items`.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        let upper = u64::try_from(items.len()).unwrap_or(u64::MAX);
        let index = usize::try_from(self.below(upper)).ok()?;
        items.get(index)
    }
}
