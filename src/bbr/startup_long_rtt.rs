// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! `StartupLongRTT` (C6): a picoquic extension entered in place of ordinary Startup
//! when the very first RTT sample already exceeds `PICOQUIC_TARGET_RENO_RTT` (100ms).
//!
//! An RFC 9002-style initial window sized for a ~100ms RTT badly underestimates the
//! BDP of a long-RTT (e.g. satellite) path, and Startup's usual `2.77x` pacing-gain
//! doubling would take many round trips to catch up. This phase instead seeds `cwin`
//! from an RTT-scaled multiple of the initial window (or an externally supplied BDP
//! seed, if larger) and grows it linearly using the HyStart tests in [`super::hystart`]
//! in place of the bandwidth-plateau test, exiting straight into Drain once one of them
//! fires.

use crate::bandwidth::AckSample;
use crate::bbr::constants::{PICOQUIC_CWIN_INITIAL_PACKETS, PICOQUIC_TARGET_RENO_RTT, PICOQUIC_TARGET_SATELLITE_RTT};
use crate::bbr::{hystart, startup, BbrController, Phase};
use crate::event::Publisher;
use crate::path::PathContext;
use crate::time::Timestamp;

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct State {
    /// `true` once a round trip has elapsed since entry, so the very first (partial)
    /// round doesn't get evaluated against the exit tests.
    round_started: bool,
}

impl<P: Publisher> BbrController<P> {
    pub(super) fn enter_startup_long_rtt(&mut self, path: &mut PathContext, now: Timestamp) {
        let mss = path.send_mtu as u64;
        let initial = PICOQUIC_CWIN_INITIAL_PACKETS as u64 * mss;
        let seed = self.bdp_seed.max(initial);

        let reno_rtt_ms = PICOQUIC_TARGET_RENO_RTT.as_millis().max(1) as u64;
        let rtt_min_ms = path.rtt_min.as_millis().max(1) as u64;
        let satellite_rtt_ms = PICOQUIC_TARGET_SATELLITE_RTT.as_millis().max(1) as u64;

        let scaled = seed.saturating_mul(rtt_min_ms) / reno_rtt_ms;
        let cap = seed.saturating_mul(satellite_rtt_ms) / reno_rtt_ms;

        path.cwin = path.cwin.max(scaled.min(cap).min(u32::MAX as u64) as u32);
        self.publish_cwnd(path.cwin);

        self.round_counter.start(path.delivered + path.bytes_in_transit as u64);
        self.transition_to(Phase::StartupLongRtt(State::default()));
    }

    /// Called on every ACK while in `StartupLongRTT`, in place of the ordinary
    /// pacing-rate/cwnd output derivation.
    pub(super) fn update_startup_long_rtt(&mut self, path: &mut PathContext, sample: &AckSample, now: Timestamp) {
        let round_start = self.round_counter.round_start();
        let exit = match &mut self.phase {
            Phase::StartupLongRtt(state) => {
                if round_start {
                    state.round_started = true;
                }
                state.round_started
                    && (hystart::hystart_test(path.rtt_sample, path.rtt_min)
                        || hystart::hystart_loss_volume_test(sample.nb_bytes_newly_lost, sample.nb_bytes_acknowledged))
            }
            _ => false,
        };

        if exit {
            self.full_pipe_estimator.force_filled(self.data_rate_model.max_bw());
            self.round_counter.start(path.delivered + path.bytes_in_transit as u64);
            self.enter_drain();
            self.check_drain_done(path, now);
            return;
        }

        path.cwin = hystart::hystart_increase(path.cwin, sample.nb_bytes_acknowledged, path.send_mtu as u32);
        self.publish_cwnd(path.cwin);

        self.pacing
            .set_pacing_rate(self.data_rate_model.bw(), startup::PACING_GAIN, false, &mut self.publisher);
        self.pacing.set_send_quantum(path.send_mtu);
    }
}
