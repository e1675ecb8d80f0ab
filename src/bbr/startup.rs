// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Startup: the initial phase, doubling the pacing rate each round until the pipe
//! looks full (or one of the picoquic high-loss/high-RTT escapes fires first).

use crate::bbr::{BbrController, Phase};
use crate::event::Publisher;
use num_rational::Ratio;

/// A constant specifying the minimum gain value for calculating the pacing rate that
/// will allow the sending rate to double each round (`4 * ln(2) ~= 2.77`).
pub(crate) const PACING_GAIN: Ratio<u64> = Ratio::new_raw(277, 100);

/// A constant specifying the minimum gain value for calculating the cwnd that will
/// allow the sending rate to double each round.
pub(crate) const CWND_GAIN: Ratio<u64> = Ratio::new_raw(2, 1);

impl<P: Publisher> BbrController<P> {
    /// `BBREnterStartup`.
    pub(super) fn enter_startup(&mut self) {
        self.transition_to(Phase::Startup);
    }

    /// `BBRCheckStartupDone`: enters Drain once the pipe looks full.
    pub(super) fn check_startup_done(&mut self) {
        if self.phase.is_startup() && self.full_pipe_estimator.filled_pipe() {
            self.enter_drain();
        }
    }
}
