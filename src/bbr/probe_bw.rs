// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! ProbeBW: the steady-state cycle (Down -> Cruise -> Refill -> Up -> Down...) that
//! periodically probes for more available bandwidth while otherwise cruising at the
//! last bandwidth/inflight estimate.

use crate::bandwidth::RateSample;
use crate::bbr::constants::{
    BW_PROBE_WAIT_BASE_MICROS, BW_PROBE_WAIT_JITTER_MICROS, MAX_BW_PROBE_ROUNDS, MAX_BW_PROBE_UP_ROUNDS,
    PROBE_BW_CRUISE_PACING_GAIN, PROBE_BW_CWND_GAIN, PROBE_BW_DOWN_PACING_GAIN, PROBE_BW_REFILL_PACING_GAIN,
    PROBE_BW_UP_PACING_GAIN,
};
use crate::bbr::{AckPhase, BbrController, Phase};
use crate::event::{BbrPhase, Publisher};
use crate::path::PathContext;
use crate::time::Timestamp;
use core::time::Duration;
use num_rational::Ratio;

/// The four sub-phases of the ProbeBW cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CyclePhase {
    Down,
    Cruise,
    Refill,
    Up,
}

impl CyclePhase {
    pub(crate) fn pacing_gain(self) -> Ratio<u64> {
        match self {
            CyclePhase::Down => PROBE_BW_DOWN_PACING_GAIN,
            CyclePhase::Cruise => PROBE_BW_CRUISE_PACING_GAIN,
            CyclePhase::Refill => PROBE_BW_REFILL_PACING_GAIN,
            CyclePhase::Up => PROBE_BW_UP_PACING_GAIN,
        }
    }

    pub(crate) fn cwnd_gain(self) -> Ratio<u64> {
        PROBE_BW_CWND_GAIN
    }

    pub(crate) fn is_cruise(self) -> bool {
        matches!(self, CyclePhase::Cruise)
    }

    pub(crate) fn is_up(self) -> bool {
        matches!(self, CyclePhase::Up)
    }

    pub(crate) fn as_event(self) -> BbrPhase {
        match self {
            CyclePhase::Down => BbrPhase::ProbeBwDown,
            CyclePhase::Cruise => BbrPhase::ProbeBwCruise,
            CyclePhase::Refill => BbrPhase::ProbeBwRefill,
            CyclePhase::Up => BbrPhase::ProbeBwUp,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct State {
    pub(crate) cycle_phase: CyclePhase,
    /// Rounds elapsed since the last bandwidth probe, counted while in Down/Cruise.
    rounds_since_bw_probe: u64,
    /// The randomised wait, in microseconds, before the next probe is allowed to fire
    /// purely on elapsed time (the round-count based trigger can still fire sooner).
    bw_probe_wait_micros: u64,
    cycle_stamp: Timestamp,
    /// `BBRRaiseInflightHiSlope`'s round counter: `inflight_hi` grows by one MSS per
    /// `bw_probe_up_cnt` bytes acked, and `growth_this_round = MSS << bw_probe_up_rounds`
    /// halves the growth rate every time the threshold is hit, up to
    /// `MAX_BW_PROBE_UP_ROUNDS`, so growth decelerates the longer the probe runs.
    bw_probe_up_rounds: u64,
    /// The byte-volume threshold `bw_probe_up_acks` must reach before the next
    /// `inflight_hi` increment, recomputed from `cwin` every time `bw_probe_up_rounds`
    /// changes.
    bw_probe_up_cnt: u64,
    /// Accumulated newly-acked bytes (not an ack count) since the last increment.
    bw_probe_up_acks: u64,
    /// True for exactly the round(s) whose rate sample is eligible to move
    /// `inflight_hi` (Refill's first round start through the end of Up).
    pub(crate) bw_probe_samples: bool,
}

impl<P: Publisher> BbrController<P> {
    /// `BBREnterProbeBW`, always into `ProbeBW_Down`: resets the loss-response lower
    /// bounds and schedules the next randomised probe wait.
    pub(super) fn enter_probe_bw_down(&mut self, path: &PathContext, now: Timestamp) {
        self.data_rate_model.reset_lower_bound();
        self.data_volume_model.reset_lower_bound();

        let (rounds_since_bw_probe, bw_probe_wait_micros) = self.pick_probe_wait(path);
        self.ack_phase = AckPhase::ProbeStopping;
        self.round_counter.start(path.delivered + path.bytes_in_transit as u64);

        self.transition_to(Phase::ProbeBw(State {
            cycle_phase: CyclePhase::Down,
            rounds_since_bw_probe,
            bw_probe_wait_micros,
            cycle_stamp: now,
            bw_probe_up_rounds: 0,
            bw_probe_up_cnt: 0,
            bw_probe_up_acks: 0,
            bw_probe_samples: false,
        }));
    }

    pub(super) fn start_cruise(&mut self, _path: &PathContext, _now: Timestamp) {
        if let Phase::ProbeBw(state) = &mut self.phase {
            state.cycle_phase = CyclePhase::Cruise;
        }
    }

    /// Leaves `ProbeStopping` (Down/Cruise's sub-state) for `Refilling`: the end of one
    /// round of bandwidth-probing samples, and so the point at which the windowed
    /// max-bw filter rotates to a fresh measurement period, the same way picoquic's
    /// `BBRUpdateRound` advances `cycle_count` at the end of a non-app-limited round.
    fn start_refill(&mut self, path: &PathContext, now: Timestamp, rate_sample: &RateSample) {
        self.data_rate_model.reset_lower_bound();
        self.data_volume_model.reset_lower_bound();
        self.ack_phase = AckPhase::Refilling;
        self.round_counter.start(path.delivered + path.bytes_in_transit as u64);

        if !rate_sample.is_app_limited {
            self.data_rate_model.advance_max_bw_filter();
        }

        if let Phase::ProbeBw(state) = &mut self.phase {
            state.cycle_phase = CyclePhase::Refill;
            state.bw_probe_up_rounds = 0;
            state.bw_probe_up_cnt = 0;
            state.bw_probe_up_acks = 0;
            state.bw_probe_samples = true;
        }
    }

    fn start_probe_up(&mut self, path: &PathContext, now: Timestamp) {
        self.ack_phase = AckPhase::ProbeStarting;
        self.round_counter.start(path.delivered + path.bytes_in_transit as u64);

        if let Phase::ProbeBw(state) = &mut self.phase {
            state.cycle_phase = CyclePhase::Up;
            state.cycle_stamp = now;
            state.bw_probe_up_rounds = 1;
            state.bw_probe_up_acks = 0;
        }
        self.raise_inflight_hi_slope(path);
    }

    /// `BBRRaiseInflightHiSlope`: derives the byte-volume threshold for the next
    /// `inflight_hi` increment from the current `cwin`, halved every time
    /// `bw_probe_up_rounds` advances so later increments need proportionally more
    /// acked volume to land.
    fn raise_inflight_hi_slope(&mut self, path: &PathContext) {
        if let Phase::ProbeBw(state) = &mut self.phase {
            let mss = path.send_mtu as u64;
            let growth_this_round = mss.saturating_mul(1u64 << state.bw_probe_up_rounds.min(63));
            state.bw_probe_up_cnt = (path.cwin as u64 / growth_this_round.max(1)).max(1);
            state.bw_probe_up_acks = 0;
        }
    }

    fn pick_probe_wait(&mut self, path: &PathContext) -> (u64, u64) {
        // `rand(0, 1)` rounds of slack before the round-count trigger can fire, plus
        // `2s + rand(0, 1s)` of real time before the wait-based trigger can fire.
        let rounds_since_bw_probe = self.random.gen_range_biased(0..=1);
        let jitter = self.random.gen_range_biased(0..=BW_PROBE_WAIT_JITTER_MICROS);
        let _ = path;
        (rounds_since_bw_probe, BW_PROBE_WAIT_BASE_MICROS + jitter)
    }

    pub(super) fn advance_rounds_since_bw_probe(&mut self) {
        if let Phase::ProbeBw(state) = &mut self.phase {
            if matches!(state.cycle_phase, CyclePhase::Down | CyclePhase::Cruise) {
                state.rounds_since_bw_probe = state.rounds_since_bw_probe.saturating_add(1);
            }
        }
    }

    fn is_time_to_probe_bw(&self, path: &PathContext, now: Timestamp) -> bool {
        let Phase::ProbeBw(state) = self.phase else {
            return false;
        };

        let elapsed = now.saturating_duration_since(state.cycle_stamp) >= Duration::from_micros(state.bw_probe_wait_micros);
        let target_inflight_mss = (self.target_inflight(path) / path.send_mtu.max(1) as u64).min(MAX_BW_PROBE_ROUNDS);
        let round_trigger = state.rounds_since_bw_probe >= target_inflight_mss;

        elapsed || round_trigger
    }

    fn is_time_to_cruise(&self, path: &PathContext) -> bool {
        let inflight = path.bytes_in_transit as u64;
        let headroom = self.inflight_with_headroom();
        let at_estimated_bw = self.inflight(path, self.data_rate_model.max_bw(), Ratio::from_integer(1));

        (headroom == u64::MAX || inflight <= headroom) && inflight <= at_estimated_bw
    }

    /// `BBRUpdateProbeBWCyclePhase`, called on every ACK while in ProbeBW.
    pub(super) fn update_probe_bw_cycle_phase(&mut self, path: &mut PathContext, rate_sample: &RateSample, now: Timestamp) {
        let Phase::ProbeBw(state) = self.phase else {
            return;
        };

        match state.cycle_phase {
            CyclePhase::Down => {
                if self.is_time_to_probe_bw(path, now) {
                    self.start_refill(path, now, rate_sample);
                } else if self.is_time_to_cruise(path) {
                    self.start_cruise(path, now);
                }
            }
            CyclePhase::Cruise => {
                if self.is_time_to_probe_bw(path, now) {
                    self.start_refill(path, now, rate_sample);
                }
            }
            CyclePhase::Refill => {
                if self.round_counter.round_start() {
                    self.start_probe_up(path, now);
                }
            }
            CyclePhase::Up => {
                self.adapt_upper_bounds(path, rate_sample);

                let min_rtt_elapsed = self
                    .data_volume_model
                    .min_rtt()
                    .is_none_or(|min_rtt| now.saturating_duration_since(state.cycle_stamp) >= min_rtt);
                let above_bw_target = path.bytes_in_transit as u64
                    > self.inflight(path, self.data_rate_model.max_bw(), PROBE_BW_UP_PACING_GAIN);

                if min_rtt_elapsed && above_bw_target {
                    self.enter_probe_bw_down(path, now);
                }
            }
        }
    }

    /// `BBRAdaptUpperBounds`: while a bandwidth probe is in flight, keeps growing
    /// `bw_hi`/`inflight_hi` as long as loss stays under the threshold.
    fn adapt_upper_bounds(&mut self, path: &mut PathContext, rate_sample: &RateSample) {
        if matches!(self.ack_phase, AckPhase::ProbeStarting) && self.round_counter.round_start() {
            self.ack_phase = AckPhase::ProbeFeedback;
        }

        let bw_probe_samples = matches!(self.phase, Phase::ProbeBw(state) if state.bw_probe_samples);
        if !bw_probe_samples {
            return;
        }

        if !Self::is_inflight_too_high(rate_sample) {
            let bw = self.data_rate_model.bw();
            self.data_rate_model.update_upper_bound(bw);
            self.probe_inflight_hi_upward(path, rate_sample);
        }
    }

    /// `BBRProbeInflightHiUpward`: accumulates newly-acked byte volume and, once it
    /// reaches `bw_probe_up_cnt`, grows `inflight_hi` by `delta` MSS and advances
    /// `bw_probe_up_rounds` by `delta`, recomputing the (now larger) threshold for the
    /// next increment via `RaiseInflightHiSlope`.
    fn probe_inflight_hi_upward(&mut self, path: &PathContext, rate_sample: &RateSample) {
        let inflight_hi = self.data_volume_model.inflight_hi();
        if !rate_sample.is_cwnd_limited || (path.cwin as u64) < inflight_hi {
            return;
        }

        let delta = match &mut self.phase {
            Phase::ProbeBw(state) => {
                state.bw_probe_up_acks = state.bw_probe_up_acks.saturating_add(rate_sample.newly_acked as u64);
                let cnt = state.bw_probe_up_cnt.max(1);
                let delta = state.bw_probe_up_acks / cnt;
                if delta > 0 {
                    state.bw_probe_up_acks -= delta * cnt;
                    state.bw_probe_up_rounds = state.bw_probe_up_rounds.saturating_add(delta).min(MAX_BW_PROBE_UP_ROUNDS);
                }
                delta
            }
            _ => 0,
        };

        if delta > 0 {
            let mss = path.send_mtu as u64;
            let new_inflight_hi = inflight_hi
                .saturating_add(delta.saturating_mul(mss))
                .max(path.bytes_in_transit as u64);
            self.data_volume_model.update_upper_bound(new_inflight_hi);
            self.raise_inflight_hi_slope(path);
        }
    }
}
