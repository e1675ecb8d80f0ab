// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The "filled the pipe" estimator: the three independent tests that end Startup.
//!
//! Startup exits on whichever of these fires first: the bandwidth has plateaued (three
//! rounds in a row without a 25% growth), an ack's loss rate is already too high to
//! keep probing at the aggressive Startup gain, or the RTT has grown enough above its
//! floor that more inflight is clearly just queuing delay rather than new bandwidth.
//! The latter two are picoquic extensions (`BBRCheckStartupHighLoss` /
//! `BBRCheckStartupHighRTT`) layered onto the IETF draft's plateau-only test.

use crate::bandwidth::{Bandwidth, RateSample};
use crate::bbr::constants::{FULL_BW_COUNT_THRESHOLD, FULL_BW_GROWTH_DENOMINATOR, FULL_BW_GROWTH_NUMERATOR};
use crate::counter::Counter;
use core::time::Duration;

#[derive(Debug, Clone, Default)]
pub(crate) struct Estimator {
    /// Records whether BBR estimates it has ever fully utilized its available
    /// bandwidth.
    filled_pipe: bool,
    /// A recent baseline `max_bw`, used to judge whether bandwidth is still growing.
    full_bw: Bandwidth,
    /// The number of non-app-limited rounds without a large increase in `full_bw`.
    full_bw_count: Counter<u32>,
}

impl Estimator {
    pub fn filled_pipe(&self) -> bool {
        self.filled_pipe
    }

    /// Forces the pipe to be considered full, without going through the normal
    /// round-based tests. Used by `StartupLongRTT`'s exit, which declares the pipe
    /// full by HyStart criteria rather than the plateau/loss/RTT tests above.
    pub fn force_filled(&mut self, full_bw: Bandwidth) {
        self.filled_pipe = true;
        self.full_bw = full_bw;
    }

    /// Called once per round while still in Startup.
    pub fn on_round_start(
        &mut self,
        rate_sample: &RateSample,
        max_bw: Bandwidth,
        is_inflight_too_high: bool,
        rtt_sample: Duration,
        min_rtt: Duration,
        rtt_variant: Duration,
    ) {
        if self.filled_pipe {
            return;
        }

        self.filled_pipe = self.bandwidth_plateaued(rate_sample, max_bw)
            || is_inflight_too_high
            || (rate_sample.is_cwnd_limited && self.high_rtt(rtt_sample, min_rtt, rtt_variant));
    }

    /// `BBRCheckStartupFullBandwidth`: if doubling the delivery rate each round
    /// actually produces less than 25% growth for three rounds running, the pipe is
    /// estimated full. Tests `4 * max_bw >= 5 * full_bw` to avoid integer division.
    fn bandwidth_plateaued(&mut self, rate_sample: &RateSample, max_bw: Bandwidth) -> bool {
        if rate_sample.is_app_limited {
            return false;
        }

        let still_growing = (max_bw.as_bytes_per_second() as u128) * (FULL_BW_GROWTH_NUMERATOR as u128)
            <= (self.full_bw.as_bytes_per_second() as u128) * (FULL_BW_GROWTH_DENOMINATOR as u128);

        if !still_growing {
            self.full_bw = max_bw;
            self.full_bw_count = Counter::default();
            return false;
        }

        let _ = self.full_bw_count.try_add(1u32);
        *self.full_bw_count >= FULL_BW_COUNT_THRESHOLD
    }

    /// `BBRCheckStartupHighRTT`: once the RTT sample rises well above its floor, extra
    /// inflight is just building queue, not finding more bandwidth. Only meaningful
    /// when the sample is cwnd-limited (checked by the caller) — an app-limited ACK's
    /// RTT says nothing about whether the window itself is oversized.
    fn high_rtt(&self, rtt_sample: Duration, min_rtt: Duration, rtt_variant: Duration) -> bool {
        if min_rtt.is_zero() {
            return false;
        }
        rtt_sample > min_rtt + min_rtt / 4 + rtt_variant * 2
    }
}
