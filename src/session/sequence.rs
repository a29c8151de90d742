// src/session/sequence.rs

//! Deterministic practice line.
//!
//! The line is a seeded Fisher-Yates shuffle driven by MT19937, drawing
//! bounded integers by rejection sampling on the top bits of each output.
//! Seeding uses the init-by-array routine keyed with `|seed|`, so a line
//! only depends on `(seed, question_count)` and lines generated before a
//! restart stay identical afterwards.

use rand_mt::Mt;

pub struct SequenceGenerator {
    mt: Mt,
}

impl SequenceGenerator {
    pub fn new(seed: i32) -> Self {
        Self {
            mt: Mt::new_with_key([seed.unsigned_abs()]),
        }
    }

    /// Top `k` bits of the next output, `1 <= k <= 32`.
    fn next_bits(&mut self, k: u32) -> u32 {
        self.mt.next_u32() >> (32 - k)
    }

    /// Uniform integer in `[0, n)`.
    pub fn below(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        let k = u32::BITS - n.leading_zeros();
        loop {
            let r = self.next_bits(k);
            if r < n {
                return r;
            }
        }
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below((i + 1) as u32) as usize;
            items.swap(i, j);
        }
    }
}

/// Question ids `1..=question_count` in the client's fixed order.
pub fn practice_line(seed: i32, question_count: usize) -> Vec<i32> {
    let mut line: Vec<i32> = (1..=question_count as i32).collect();
    SequenceGenerator::new(seed).shuffle(&mut line);
    line
}
