// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! ProbeRTT: a brief low-inflight phase entered every `BBRProbeRTTInterval` to refresh
//! `min_rtt`, since a path that never drains its queue would otherwise let a stale,
//! too-low `min_rtt` estimate linger forever.

use crate::bbr::constants::{PROBE_RTT_CWND_GAIN, PROBE_RTT_DURATION};
use crate::bbr::{AckPhase, BbrController, Phase};
use crate::event::Publisher;
use crate::path::PathContext;
use crate::time::Timestamp;
use num_rational::Ratio;

pub(crate) const PACING_GAIN: Ratio<u64> = Ratio::new_raw(1, 1);
pub(crate) const CWND_GAIN: Ratio<u64> = PROBE_RTT_CWND_GAIN;

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct State {
    probe_rtt_done_stamp: Option<Timestamp>,
    probe_rtt_round_done: bool,
}

impl<P: Publisher> BbrController<P> {
    /// Checked on every ACK while not already in ProbeRTT.
    pub(super) fn maybe_enter_probe_rtt(&mut self, path: &PathContext, now: Timestamp) {
        if self.phase.is_probing_rtt() {
            return;
        }
        if self.data_volume_model.probe_rtt_expired(now) && !self.idle_restart {
            self.enter_probe_rtt(path);
        }
    }

    pub(super) fn enter_probe_rtt(&mut self, path: &PathContext) {
        self.save_cwnd(path.cwin);
        self.ack_phase = AckPhase::ProbeStopping;
        self.round_counter.start(path.delivered + path.bytes_in_transit as u64);
        self.transition_to(Phase::ProbeRtt(State::default()));
    }

    /// Checked on every ACK while in ProbeRTT.
    pub(super) fn check_probe_rtt_done(&mut self, path: &mut PathContext, now: Timestamp) {
        let Phase::ProbeRtt(mut state) = self.phase else {
            return;
        };

        let probe_rtt_cwnd = self
            .bdp_multiple(path, self.data_rate_model.bw(), CWND_GAIN)
            .max(self.minimum_window(path.send_mtu) as u64) as u32;

        if state.probe_rtt_done_stamp.is_none() && path.bytes_in_transit <= probe_rtt_cwnd {
            state.probe_rtt_done_stamp = Some(now + PROBE_RTT_DURATION);
            state.probe_rtt_round_done = false;
            self.round_counter.start(path.delivered + path.bytes_in_transit as u64);
        }

        if let Some(done_stamp) = state.probe_rtt_done_stamp {
            if self.round_counter.round_start() {
                state.probe_rtt_round_done = true;
            }

            if state.probe_rtt_round_done && now >= done_stamp {
                self.data_volume_model.schedule_next_probe_rtt(now);
                self.restore_cwnd(path);

                if self.full_pipe_estimator.filled_pipe() {
                    self.enter_probe_bw_down(path, now);
                    self.start_cruise(path, now);
                } else {
                    self.enter_startup();
                }
                return;
            }
        }

        self.phase = Phase::ProbeRtt(state);
    }
}

impl Phase {
    pub(crate) fn is_probing_rtt(&self) -> bool {
        matches!(self, Phase::ProbeRtt(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gains_match_the_fixed_table() {
        assert_eq!(PACING_GAIN, Ratio::new_raw(1, 1));
        assert_eq!(CWND_GAIN, Ratio::new_raw(1, 2));
    }
}
