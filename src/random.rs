// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A reproducible random source for probe-wait jitter.
//!
//! BBR's ProbeBW scheduling intentionally randomizes a couple of small delays so that
//! multiple flows sharing a bottleneck don't synchronize their probing. The controller
//! must still be fully deterministic given `(current_time, client_mode, path_id)`, so
//! the RNG here is an explicit, seedable 64-bit generator rather than anything
//! process-global.

use core::ops::RangeInclusive;

/// A generator of random data.
///
/// The two fill methods provide the same functionality for different use cases: one for
/// "public" randomly generated data that may appear in the clear, and one for "private"
/// data that should remain secret. This mirrors the split used elsewhere in this
/// codebase for endpoint-level randomness, even though the BBR core only ever needs the
/// public side (probe-wait jitter is not a secret).
pub trait Generator: 'static + Send {
    /// Fills `dest` with unpredictable bits that may be sent over the wire and viewable
    /// in the clear.
    fn public_random_fill(&mut self, dest: &mut [u8]);

    /// Fills `dest` with unpredictable bits that will only be used internally within the
    /// endpoint, remaining secret.
    fn private_random_fill(&mut self, dest: &mut [u8]);

    /// Returns a bool with probability `p` of being true.
    fn gen_bool(&mut self, p: f64) -> bool;
}

/// A small, fast, reproducible 64-bit generator (xorshift64*).
///
/// Seeded once at controller construction from a mix of the current time, the
/// client/server role, and the path id, so that two controllers constructed with
/// identical inputs and fed identical notifications produce byte-identical outputs.
#[derive(Clone, Debug)]
pub struct Random {
    state: u64,
}

impl Random {
    /// A fixed constant folded into every seed so that an all-zero `(time, role, path_id)`
    /// doesn't degenerate into an all-zero (and therefore frozen) xorshift state.
    const SEED_CONSTANT: u64 = 0x9E37_79B9_7F4A_7C15;

    pub fn new(current_time_micros: u64, client_mode: bool, path_id: u64) -> Self {
        let role = u64::from(client_mode);
        let mut state = Self::SEED_CONSTANT
            ^ current_time_micros
            ^ (role.wrapping_shl(63))
            ^ path_id.wrapping_mul(0x2545_F491_4F6C_DD1D);

        if state == 0 {
            state = Self::SEED_CONSTANT;
        }

        Self { state }
    }

    /// Advances the xorshift64* generator and returns the next raw 64-bit word.
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Returns a value uniformly distributed over `range`.
    ///
    /// Uses a modulo reduction rather than rejection sampling: the resulting very slight
    /// bias toward the low end of the range is an acceptable trade for avoiding an
    /// unbounded retry loop, and matches the precision BBR's own probe-wait jitter needs.
    pub fn gen_range_biased(&mut self, range: RangeInclusive<u64>) -> u64 {
        let (low, high) = (*range.start(), *range.end());
        let span = high.saturating_sub(low).saturating_add(1);
        if span == 0 {
            return low;
        }
        low + self.next_u64() % span
    }
}

impl Generator for Random {
    fn public_random_fill(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let word = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn private_random_fill(&mut self, dest: &mut [u8]) {
        // The BBR core never generates secret randomness; public bits are good enough
        // for either case here, but the distinct entry point is kept for parity with
        // the `Generator` contract other parts of the transport depend on.
        self.public_random_fill(dest);
    }

    fn gen_bool(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        let threshold = (p * u64::MAX as f64) as u64;
        self.next_u64() < threshold
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::Generator;

    /// A `Generator` with fully scripted output, for tests that need to pin down exactly
    /// which jitter value a probe-wait pick resolves to.
    #[derive(Debug)]
    pub struct Fixed {
        pub seed: u8,
        pub gen_bool_result: bool,
    }

    impl Default for Fixed {
        fn default() -> Self {
            Self {
                seed: 123,
                gen_bool_result: false,
            }
        }
    }

    impl Generator for Fixed {
        fn public_random_fill(&mut self, dest: &mut [u8]) {
            let seed = self.seed;
            for (i, elem) in dest.iter_mut().enumerate() {
                *elem = seed ^ i as u8;
            }
            self.seed = self.seed.wrapping_add(1);
        }

        fn private_random_fill(&mut self, dest: &mut [u8]) {
            let seed = u8::MAX - self.seed;
            for (i, elem) in dest.iter_mut().enumerate() {
                *elem = seed ^ i as u8;
            }
            self.seed = self.seed.wrapping_add(1);
        }

        fn gen_bool(&mut self, _p: f64) -> bool {
            self.gen_bool_result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_given_same_seed() {
        let mut a = Random::new(1_000_000, true, 42);
        let mut b = Random::new(1_000_000, true, 42);

        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Random::new(1_000_000, true, 42);
        let mut b = Random::new(1_000_000, true, 43);

        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn gen_range_biased_stays_in_bounds() {
        let mut rng = Random::new(7, false, 1);
        for _ in 0..1000 {
            let v = rng.gen_range_biased(2_000_000..=3_000_000);
            assert!((2_000_000..=3_000_000).contains(&v));
        }
    }
}
