// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The bandwidth model (C4): tracks the windowed maximum delivery rate plus the upper
//! and lower bounds ProbeBW and the loss-response path place on it.

use crate::bandwidth::{Bandwidth, RateSample};
use crate::bbr::constants::BETA;
use crate::bbr::windowed_filter::MaxFilter;

#[derive(Clone, Debug)]
pub(crate) struct Model {
    max_bw_filter: MaxFilter<{ crate::bbr::constants::MAX_BW_FILTER_LEN }>,
    /// Sender-side upper bound on bandwidth, used while draining an inflight overshoot.
    bw_hi: Bandwidth,
    /// Loss-response lower bound: once a round has seen loss, the model won't let `bw`
    /// fall below this, decayed by `BETA` each time a new lower bound is set.
    bw_lo: Bandwidth,
    /// `min(max_bw(), bw_lo, bw_hi)`, recomputed by `bound_bw_for_model`.
    bw: Bandwidth,
    cycle_count: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            max_bw_filter: Default::default(),
            bw_hi: Bandwidth::MAX,
            bw_lo: Bandwidth::MAX,
            bw: Bandwidth::ZERO,
            cycle_count: 0,
        }
    }
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_bw(&self) -> Bandwidth {
        Bandwidth::from_bytes_per_second(self.max_bw_filter.max())
    }

    pub fn bw_hi(&self) -> Bandwidth {
        self.bw_hi
    }

    pub fn bw_lo(&self) -> Bandwidth {
        self.bw_lo
    }

    pub fn bw(&self) -> Bandwidth {
        self.bw
    }

    /// Advances the rotating filter to a new cycle, starting a fresh measurement
    /// period for the slot the new cycle index maps to.
    pub fn advance_max_bw_filter(&mut self) {
        self.cycle_count = self.cycle_count.wrapping_add(1);
        self.max_bw_filter.start_period(self.cycle_count);
    }

    /// Feeds a rate sample into the windowed max filter, unless it's an app-limited
    /// sample that doesn't exceed the current max (in which case it carries no signal
    /// about the path's true capacity).
    pub fn update_max_bw(&mut self, rate_sample: &RateSample) {
        if rate_sample.delivery_rate > self.max_bw() || !rate_sample.is_app_limited {
            self.max_bw_filter
                .update_max(rate_sample.delivery_rate.as_bytes_per_second(), self.cycle_count);
        }
    }

    /// Raises `bw_hi` to at least `bw` (ProbeBW_Up does this as it inflates the
    /// network pipe in search of more bandwidth).
    pub fn update_upper_bound(&mut self, bw: Bandwidth) {
        self.bw_hi = self.bw_hi.max(bw);
    }

    /// Called once per round that saw loss: decays the previous lower bound by `BETA`
    /// and clamps it to at least `bw`, initializing from `max_bw()` the first time.
    pub fn update_lower_bound(&mut self, bw: Bandwidth) {
        let prior = if self.bw_lo == Bandwidth::MAX {
            self.max_bw()
        } else {
            self.bw_lo
        };
        self.bw_lo = bw.max(prior.mul_ratio(BETA));
    }

    /// Resets the lower bound to "unset" (cycle-entry for phases that don't want a
    /// stale loss response lingering, e.g. ProbeBW_Cruise).
    pub fn reset_lower_bound(&mut self) {
        self.bw_lo = Bandwidth::MAX;
    }

    /// Recomputes `bw` as the minimum of the windowed max and both bounds.
    pub fn bound_bw_for_model(&mut self) {
        self.bw = self.max_bw().min(self.bw_lo).min(self.bw_hi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn sample(rate: u64, app_limited: bool) -> RateSample {
        RateSample {
            delivery_rate: Bandwidth::from_bytes_per_second(rate),
            rtt_sample: Duration::from_millis(50),
            is_app_limited: app_limited,
            ..Default::default()
        }
    }

    #[test]
    fn new_has_no_signal_yet() {
        let model = Model::new();
        assert_eq!(model.max_bw().as_bytes_per_second(), 0);
        assert_eq!(model.bw_hi(), Bandwidth::MAX);
        assert_eq!(model.bw_lo(), Bandwidth::MAX);
    }

    #[test]
    fn update_max_bw_tracks_the_windowed_maximum() {
        let mut model = Model::new();
        model.update_max_bw(&sample(1_000, false));
        assert_eq!(model.max_bw().as_bytes_per_second(), 1_000);

        model.advance_max_bw_filter();
        model.update_max_bw(&sample(500, false));
        // The prior cycle's sample is still within the 2-slot window.
        assert_eq!(model.max_bw().as_bytes_per_second(), 1_000);

        model.advance_max_bw_filter();
        model.update_max_bw(&sample(200, false));
        // Now both slots have aged past the original 1_000 sample.
        assert_eq!(model.max_bw().as_bytes_per_second(), 500);
    }

    #[test]
    fn app_limited_sample_below_max_is_discarded() {
        let mut model = Model::new();
        model.update_max_bw(&sample(1_000, false));
        model.update_max_bw(&sample(200, true));
        assert_eq!(model.max_bw().as_bytes_per_second(), 1_000);
    }

    #[test]
    fn update_lower_bound_initializes_from_max_bw_then_decays() {
        let mut model = Model::new();
        model.update_max_bw(&sample(1_000, false));

        model.update_lower_bound(Bandwidth::from_bytes_per_second(900));
        // max(900, 1000 * 0.7 = 700) == 900
        assert_eq!(model.bw_lo().as_bytes_per_second(), 900);

        model.update_lower_bound(Bandwidth::from_bytes_per_second(100));
        // max(100, 900 * 0.7 = 630) == 630
        assert_eq!(model.bw_lo().as_bytes_per_second(), 630);
    }

    #[test]
    fn bound_bw_for_model_takes_the_minimum() {
        let mut model = Model::new();
        model.update_max_bw(&sample(1_000, false));
        model.bw_hi = Bandwidth::from_bytes_per_second(800);
        model.bw_lo = Bandwidth::from_bytes_per_second(600);

        model.bound_bw_for_model();
        assert_eq!(model.bw().as_bytes_per_second(), 600);
    }
}
