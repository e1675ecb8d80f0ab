// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Drain: a single round paced below 1.0 to flush the queue Startup built up, then
//! straight into ProbeBW_Down.

use crate::bbr::startup;
use crate::bbr::{BbrController, Phase};
use crate::event::Publisher;
use crate::path::PathContext;
use crate::time::Timestamp;
use num_rational::Ratio;

/// The inverse of `BBRStartupCwndGain`, chosen to drain the queue built up in Startup
/// in one round.
pub(crate) const PACING_GAIN: Ratio<u64> = Ratio::new_raw(1, 2);
/// Drain keeps Startup's cwnd gain so the window doesn't shrink while draining.
pub(crate) const CWND_GAIN: Ratio<u64> = startup::CWND_GAIN;

impl<P: Publisher> BbrController<P> {
    /// `BBREnterDrain`.
    pub(super) fn enter_drain(&mut self) {
        self.transition_to(Phase::Drain);
    }

    /// `BBRCheckDrain`: enters ProbeBW_Down once the estimated queue has drained
    /// (`bytes_in_transit <= BBRInflight(1.0)`).
    pub(super) fn check_drain_done(&mut self, path: &mut PathContext, now: Timestamp) {
        if !self.phase.is_drain() {
            return;
        }

        let target = self.inflight(path, self.data_rate_model.bw(), Ratio::from_integer(1));
        if path.bytes_in_transit as u64 <= target {
            self.enter_probe_bw_down(path, now);
        }
    }
}
