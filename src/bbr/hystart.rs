// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! HyStart-style exit tests (C10) used by `StartupLongRTT`: a slow-start variant that
//! watches for a sustained RTT increase or a burst of loss rather than waiting for
//! Startup's bandwidth-plateau test, since a long-RTT path's plateau test would take
//! many more round trips to converge.

use core::time::Duration;

/// The minimum RTT-increase threshold, regardless of how small `min_rtt` itself is.
const MIN_RTT_THRESH: Duration = Duration::from_millis(4);

/// `hystart_test`: true once a round's RTT sample has risen by more than `min_rtt / 8`
/// (floored at 4ms) above the path's long-term minimum.
pub(crate) fn hystart_test(rtt_sample: Duration, min_rtt: Duration) -> bool {
    if min_rtt.is_zero() {
        return false;
    }
    let thresh = (min_rtt / 8).max(MIN_RTT_THRESH);
    rtt_sample > min_rtt + thresh
}

/// `hystart_loss_volume_test`: true once a round has lost more than an eighth of the
/// bytes it acknowledged, the same ratio this core uses elsewhere as a "too much loss
/// to keep probing aggressively" threshold.
pub(crate) fn hystart_loss_volume_test(newly_lost: u32, newly_acked: u32) -> bool {
    newly_acked > 0 && (newly_lost as u64) * 8 > newly_acked as u64
}

/// `hystart_increase`: linear growth (one byte of cwnd per byte freshly acked, capped
/// at one MSS per ack) in place of Startup's exponential `2.77x` pacing gain, since a
/// long-RTT path can't afford Startup's usual doubling-every-round overshoot.
pub(crate) fn hystart_increase(cwin: u32, newly_acked: u32, mss: u32) -> u32 {
    cwin.saturating_add(newly_acked.min(mss))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hystart_test_requires_rtt_growth_past_the_floor() {
        let min_rtt = Duration::from_millis(120);
        assert!(!hystart_test(Duration::from_millis(130), min_rtt));
        assert!(hystart_test(Duration::from_millis(140), min_rtt));
    }

    #[test]
    fn hystart_test_uses_the_4ms_floor_for_a_tiny_min_rtt() {
        let min_rtt = Duration::from_millis(8);
        // 1ms (min_rtt/8) would be the threshold without the floor; 4ms applies instead.
        assert!(!hystart_test(Duration::from_millis(11), min_rtt));
        assert!(hystart_test(Duration::from_millis(13), min_rtt));
    }

    #[test]
    fn hystart_loss_volume_test_trips_past_one_eighth() {
        assert!(!hystart_loss_volume_test(100, 1000));
        assert!(hystart_loss_volume_test(200, 1000));
    }

    #[test]
    fn hystart_increase_is_capped_at_one_mss_per_ack() {
        assert_eq!(hystart_increase(10_000, 3_000, 1_500), 11_500);
    }
}
