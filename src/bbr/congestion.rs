// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Loss and congestion signal tracking (C5, output half): the once-per-round loss
//! response that feeds the data rate and data volume models' lower bounds, plus an
//! EWMA-smoothed loss rate used by the Startup high-loss escape test.

use crate::bandwidth::{Bandwidth, RateSample};
use crate::bbr::{data_rate, data_volume, round};

/// `BBRLossAlpha` as a plain `f64`: matches `bbr::constants::LOSS_ALPHA` (1/8). The
/// smoothed loss rate is a diagnostic statistic rather than a value fed back into exact
/// gain arithmetic, so a float is a closer match to how picoquic tracks it than
/// threading another exact-fraction type through here.
const ALPHA: f64 = 0.125;

#[derive(Clone, Debug, Default)]
pub(crate) struct State {
    /// Tracks round trips so loss response only fires once per round.
    loss_round_counter: round::Counter,
    /// A 1-round-trip max of the delivery-rate samples (`rs.delivery_rate`).
    bw_latest: Bandwidth,
    /// A 1-round-trip max of the delivered-volume samples (`rs.delivered`).
    inflight_latest: u64,
    /// True if loss was observed at any point in the current round trip.
    loss_in_round: bool,
    delivered_smoothed: f64,
    lost_smoothed: f64,
}

impl State {
    /// Updates the congestion state from the latest rate sample. Called near the start
    /// of ACK processing, before the bandwidth/inflight models derive their bounds.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        delivered: u64,
        bytes_in_transit: u32,
        rate_sample: &RateSample,
        data_rate_model: &mut data_rate::Model,
        data_volume_model: &mut data_volume::Model,
        is_probing_bw: bool,
        cwnd: u32,
    ) {
        let round_start = self.loss_round_counter.on_ack(delivered, bytes_in_transit);
        self.bw_latest = self.bw_latest.max(rate_sample.delivery_rate);
        self.inflight_latest = self.inflight_latest.max(rate_sample.delivered);

        data_rate_model.update_max_bw(rate_sample);
        self.track_loss_rate(rate_sample);

        if rate_sample.newly_lost > 0 {
            self.loss_in_round = true;
        }

        if round_start {
            if !is_probing_bw && self.loss_in_round {
                data_rate_model.update_lower_bound(self.bw_latest);
                data_volume_model.update_lower_bound(cwnd, self.inflight_latest, true);
            }

            self.loss_in_round = false;
        }
    }

    /// `BBRTrackLossRate`: an EWMA over every sample (not gated on round boundaries),
    /// so `loss_rate_smoothed` reacts within a round rather than lagging a full RTT.
    fn track_loss_rate(&mut self, rate_sample: &RateSample) {
        let newly_delivered = (rate_sample.newly_acked + rate_sample.newly_lost) as f64;
        let newly_lost = rate_sample.newly_lost as f64;

        self.delivered_smoothed = (1.0 - ALPHA) * self.delivered_smoothed + ALPHA * newly_delivered;
        self.lost_smoothed = (1.0 - ALPHA) * self.lost_smoothed + ALPHA * newly_lost;
    }

    /// The current EWMA-smoothed loss rate, in `[0, 1]`.
    pub fn loss_rate_smoothed(&self) -> f64 {
        if self.delivered_smoothed > 0.0 {
            (self.lost_smoothed / self.delivered_smoothed).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Initializes the congestion state for the next round. Called near the end of ACK
    /// processing.
    pub fn advance(&mut self, rate_sample: &RateSample) {
        if self.loss_round_counter.round_start() {
            self.bw_latest = rate_sample.delivery_rate;
            self.inflight_latest = rate_sample.delivered;
        }
    }

    pub fn reset(&mut self) {
        self.loss_in_round = false;
        self.bw_latest = Bandwidth::ZERO;
        self.inflight_latest = 0;
        self.delivered_smoothed = 0.0;
        self.lost_smoothed = 0.0;
    }
}

#[cfg(test)]
pub mod testing {
    use super::State;
    use crate::bandwidth::{Bandwidth, RateSample};
    use crate::bbr::{data_rate, data_volume};
    use crate::time::{Clock, NoopClock};
    use core::time::Duration;

    pub(crate) fn assert_reset(state: State) {
        assert!(!state.loss_in_round);
        assert_eq!(Bandwidth::ZERO, state.bw_latest);
        assert_eq!(0, state.inflight_latest);
    }

    pub(crate) fn test_state() -> State {
        let mut state = State::default();
        let now = NoopClock.get_time();
        let rate_sample = RateSample {
            delivered: 100,
            rtt_sample: Duration::from_millis(10),
            newly_lost: 50,
            ..Default::default()
        };
        let mut data_rate_model = data_rate::Model::new();
        let mut data_volume_model = data_volume::Model::new(now);

        state.update(
            500,
            0,
            &rate_sample,
            &mut data_rate_model,
            &mut data_volume_model,
            false,
            100,
        );

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Clock, NoopClock};
    use core::time::Duration;

    #[test]
    fn update() {
        let mut state = State::default();
        let now = NoopClock.get_time();

        let rate_sample = RateSample {
            delivered: 100,
            rtt_sample: Duration::from_millis(10),
            newly_lost: 50,
            ..Default::default()
        };
        let mut data_rate_model = data_rate::Model::new();
        let mut data_volume_model = data_volume::Model::new(now);

        state.update(
            500,
            0,
            &rate_sample,
            &mut data_rate_model,
            &mut data_volume_model,
            false,
            100,
        );

        assert!(state.loss_round_counter.round_start());
        assert_eq!(rate_sample.delivery_rate, state.bw_latest);
        assert_eq!(rate_sample.delivered, state.inflight_latest);
        assert_eq!(rate_sample.delivery_rate, data_rate_model.max_bw());
        // There was loss in the round, so the lower bounds are updated.
        assert_eq!(rate_sample.delivery_rate, data_rate_model.bw_lo());
        assert_eq!(rate_sample.delivered, data_volume_model.inflight_lo());
        assert!(!state.loss_in_round);
        assert!(state.loss_rate_smoothed() > 0.0);

        let new_rate_sample = RateSample {
            delivered: 1000,
            rtt_sample: Duration::from_millis(10),
            newly_lost: 50,
            ..Default::default()
        };

        // delivered stays below the round anchor (500 + 0 bytes_in_transit): no new round.
        state.update(
            400,
            0,
            &new_rate_sample,
            &mut data_rate_model,
            &mut data_volume_model,
            false,
            100,
        );

        assert!(!state.loss_round_counter.round_start());
        assert_eq!(new_rate_sample.delivery_rate, state.bw_latest);
        assert_eq!(new_rate_sample.delivered, state.inflight_latest);
        assert_eq!(new_rate_sample.delivery_rate, data_rate_model.max_bw());
        // Not a round start yet, so the lower bounds are untouched.
        assert_eq!(rate_sample.delivery_rate, data_rate_model.bw_lo());
        assert_eq!(rate_sample.delivered, data_volume_model.inflight_lo());
        assert!(state.loss_in_round);

        // This ack crosses the round anchor.
        state.update(
            500,
            0,
            &new_rate_sample,
            &mut data_rate_model,
            &mut data_volume_model,
            true, // probing bw: lower bounds should not update
            100,
        );

        assert!(state.loss_round_counter.round_start());
        assert_eq!(rate_sample.delivery_rate, data_rate_model.bw_lo());
        assert_eq!(rate_sample.delivered, data_volume_model.inflight_lo());
        assert!(!state.loss_in_round);
    }

    #[test]
    fn advance() {
        let mut state = State::default();
        let now = NoopClock.get_time();

        let mut rate_sample = RateSample {
            delivered: 100,
            rtt_sample: Duration::from_millis(10),
            ..Default::default()
        };

        state.update(
            100,
            0,
            &rate_sample,
            &mut data_rate::Model::new(),
            &mut data_volume::Model::new(now),
            false,
            100,
        );

        assert!(state.loss_round_counter.round_start());
        assert_eq!(rate_sample.delivery_rate, state.bw_latest);
        assert_eq!(rate_sample.delivered, state.inflight_latest);

        rate_sample.delivered = 500;
        state.advance(&rate_sample);

        assert_eq!(rate_sample.delivery_rate, state.bw_latest);
        assert_eq!(rate_sample.delivered, state.inflight_latest);
    }

    #[test]
    fn reset() {
        let mut state = State {
            loss_in_round: true,
            inflight_latest: 100,
            bw_latest: Bandwidth::MAX,
            delivered_smoothed: 10.0,
            lost_smoothed: 5.0,
            ..Default::default()
        };

        state.reset();

        assert!(!state.loss_in_round);
        assert_eq!(Bandwidth::ZERO, state.bw_latest);
        assert_eq!(0, state.inflight_latest);
        assert_eq!(state.loss_rate_smoothed(), 0.0);
    }
}
