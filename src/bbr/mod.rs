// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! BBRv3 congestion control core, with the picoquic `StartupLongRTT` extension.
//!
//! This module wires together the sub-models (C1-C12): the windowed bandwidth and
//! inflight filters, the round-trip counter, the Startup/Drain/ProbeBW/ProbeRTT phase
//! machine, and the pacing-rate/cwnd output derivation. Everything here is driven
//! exclusively by the notifications in [`BbrController`]'s public API — the controller
//! never reads a clock or owns a socket.

pub(crate) mod congestion;
pub(crate) mod constants;
pub(crate) mod data_rate;
pub(crate) mod data_volume;
mod drain;
pub(crate) mod full_pipe;
mod hystart;
pub(crate) mod pacing;
pub(crate) mod probe_bw;
mod probe_rtt;
pub(crate) mod round;
mod startup;
mod startup_long_rtt;
pub(crate) mod windowed_filter;

use crate::bandwidth::{AckSample, Bandwidth, LossInfo, RateSample};
use crate::bbr::constants::{LOSS_THRESH, MIN_PIPE_CWND_PACKETS, PICOQUIC_TARGET_RENO_RTT};
use crate::event::{BbrPhase, BbrPhaseChanged, CongestionWindowUpdated, NoopPublisher, Publisher};
use crate::path::PathContext;
use crate::random::Random;
use crate::time::Timestamp;
use num_rational::Ratio;

/// The ACK-phase sub-state machine (distinct from the 8 `Phase` values): tracks where a
/// ProbeBW/ProbeRTT bandwidth probe is within its own starting/stopping/refilling
/// lifecycle, independent of which cycle phase currently owns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum AckPhase {
    ProbeStarting,
    ProbeStopping,
    Refilling,
    #[default]
    ProbeFeedback,
}

/// The controller's top-level phase.
///
/// ProbeBW's four cycle phases (Down/Cruise/Refill/Up) live inside [`probe_bw::State`]
/// rather than as separate variants here, since they share every other piece of
/// `ProbeBw`'s bookkeeping (probe-wait scheduling, `bw_probe_samples`) and only ever
/// transition among themselves plus back out to `ProbeBw`'s own entry point.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Phase {
    Startup,
    StartupLongRtt(startup_long_rtt::State),
    Drain,
    ProbeBw(probe_bw::State),
    ProbeRtt(probe_rtt::State),
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Startup
    }
}

impl Phase {
    pub(crate) fn pacing_gain(&self) -> Ratio<u64> {
        match self {
            Phase::Startup | Phase::StartupLongRtt(_) => startup::PACING_GAIN,
            Phase::Drain => drain::PACING_GAIN,
            Phase::ProbeBw(state) => state.cycle_phase.pacing_gain(),
            Phase::ProbeRtt(_) => probe_rtt::PACING_GAIN,
        }
    }

    pub(crate) fn cwnd_gain(&self) -> Ratio<u64> {
        match self {
            Phase::Startup | Phase::StartupLongRtt(_) => startup::CWND_GAIN,
            Phase::Drain => drain::CWND_GAIN,
            Phase::ProbeBw(state) => state.cycle_phase.cwnd_gain(),
            Phase::ProbeRtt(_) => probe_rtt::CWND_GAIN,
        }
    }

    pub(crate) fn is_startup(&self) -> bool {
        matches!(self, Phase::Startup)
    }

    pub(crate) fn is_startup_long_rtt(&self) -> bool {
        matches!(self, Phase::StartupLongRtt(_))
    }

    pub(crate) fn is_drain(&self) -> bool {
        matches!(self, Phase::Drain)
    }

    pub(crate) fn is_probing_bw(&self) -> bool {
        matches!(self, Phase::ProbeBw(_))
    }

    pub(crate) fn is_probing_bw_cruise(&self) -> bool {
        matches!(self, Phase::ProbeBw(s) if s.cycle_phase.is_cruise())
    }

    pub(crate) fn is_probing_bw_up(&self) -> bool {
        matches!(self, Phase::ProbeBw(s) if s.cycle_phase.is_up())
    }

    fn as_event(&self) -> BbrPhase {
        match self {
            Phase::Startup => BbrPhase::Startup,
            Phase::StartupLongRtt(_) => BbrPhase::StartupLongRtt,
            Phase::Drain => BbrPhase::Drain,
            Phase::ProbeBw(state) => state.cycle_phase.as_event(),
            Phase::ProbeRtt(_) => BbrPhase::ProbeRtt,
        }
    }
}

/// The BBRv3 congestion controller.
///
/// Holds every piece of model state described in the data model (§ "Data Model" in the
/// design notes) except the two fields that live on the path itself (`path.cwin` and
/// `path.bytes_in_transit`): those are read and written in place on every notification
/// rather than cached here, since the path is the single source of truth for them.
#[derive(Clone, Debug)]
pub struct BbrController<P: Publisher = NoopPublisher> {
    phase: Phase,
    ack_phase: AckPhase,
    round_counter: round::Counter,
    data_rate_model: data_rate::Model,
    data_volume_model: data_volume::Model,
    congestion_state: congestion::State,
    full_pipe_estimator: full_pipe::Estimator,
    pacing: pacing::PacingOutput,
    random: Random,
    /// `cwnd` saved before entering ProbeRTT or an RTO, restored afterward.
    prior_cwnd: u32,
    idle_restart: bool,
    /// The seed cwnd picoquic passes in from the previous path's bandwidth estimate,
    /// used as a floor while `StartupLongRTT` is still building its own estimate.
    bdp_seed: u64,
    publisher: P,
}

impl<P: Publisher + Default> BbrController<P> {
    /// `Init`: constructs a fresh controller for a path about to start sending.
    pub fn new(now: Timestamp, client_mode: bool, unique_path_id: u64) -> Self {
        Self::with_publisher(now, client_mode, unique_path_id, P::default())
    }

    /// `Reset`: full reinitialisation at the current time. The randomised seed is
    /// re-derived from `(now, client_mode, unique_path_id)` exactly as at construction,
    /// rather than "preserved" verbatim, since the generator holds no state worth
    /// keeping once every other field has been thrown away.
    pub fn reset(&mut self, now: Timestamp, client_mode: bool, unique_path_id: u64) {
        let publisher = core::mem::take(&mut self.publisher);
        *self = Self::with_publisher(now, client_mode, unique_path_id, publisher);
    }
}

impl<P: Publisher> BbrController<P> {
    pub fn with_publisher(now: Timestamp, client_mode: bool, unique_path_id: u64, publisher: P) -> Self {
        let current_time_micros = now
            .saturating_duration_since(Timestamp::default())
            .as_micros()
            .min(u64::MAX as u128) as u64;

        Self {
            phase: Phase::Startup,
            ack_phase: AckPhase::ProbeFeedback,
            round_counter: round::Counter::default(),
            data_rate_model: data_rate::Model::new(),
            data_volume_model: data_volume::Model::new(now),
            congestion_state: congestion::State::default(),
            full_pipe_estimator: full_pipe::Estimator::default(),
            pacing: pacing::PacingOutput::default(),
            random: Random::new(current_time_micros, client_mode, unique_path_id),
            prior_cwnd: 0,
            idle_restart: false,
            bdp_seed: 0,
            publisher,
        }
    }

    /// `SeedCwnd`: seeds the StartupLongRTT floor from an out-of-band BDP estimate
    /// (e.g. a prior path on the same connection).
    pub fn seed_cwnd(&mut self, bdp_seed: u64) {
        self.bdp_seed = bdp_seed;
    }

    /// `Observe`: a read-only snapshot for diagnostics/scheduling decisions that live
    /// outside the controller (e.g. whether it's safe to probe for more bandwidth).
    pub fn observe(&self) -> (BbrPhase, Bandwidth) {
        (self.phase.as_event(), self.data_rate_model.max_bw())
    }

    /// `EcnEchoCongestion`: ignored. ECN response is out of scope for this core; the
    /// loss-based signals in `IsInflightTooHigh` are the only congestion feedback it
    /// reacts to.
    pub fn on_ecn_echo_congestion(&mut self) {}

    /// `CwinBlocked`: ignored. The controller derives `cwin` purely from delivery-rate
    /// and loss signals; it doesn't need to know when the sender was unable to use the
    /// window it was given.
    pub fn on_cwin_blocked(&mut self) {}

    /// `Acknowledgement`: the main per-ACK notification (C3 through C7).
    pub fn on_ack(&mut self, path: &mut PathContext, sample: AckSample, now: Timestamp) {
        let rate_sample = RateSample::from_ack(&sample, path.delivered, path.bandwidth_estimate);

        self.publisher.on_delivery_rate_sampled(crate::event::DeliveryRateSampled {
            delivery_rate: rate_sample.delivery_rate,
            is_app_limited: rate_sample.is_app_limited,
        });

        // Picoquic's long-RTT fallback is only ever entered from the very first round
        // of Startup, before any other phase transition has happened.
        if self.phase.is_startup() && self.round_counter.round_count() == 0 && path.rtt_min > PICOQUIC_TARGET_RENO_RTT {
            self.enter_startup_long_rtt(path, now);
        }

        let round_start = self.round_counter.on_ack(path.delivered, path.bytes_in_transit);
        if round_start {
            self.data_volume_model.start_round(self.round_counter.round_count());
        }

        self.congestion_state.update(
            path.delivered,
            path.bytes_in_transit,
            &rate_sample,
            &mut self.data_rate_model,
            &mut self.data_volume_model,
            self.phase.is_probing_bw(),
            path.cwin,
        );

        self.data_volume_model.update_ack_aggregation(
            self.data_rate_model.bw(),
            sample.nb_bytes_acknowledged,
            path.cwin,
            self.round_counter.round_count(),
            now,
        );

        let is_inflight_too_high = Self::is_inflight_too_high(&rate_sample);

        if self.phase.is_startup() && round_start {
            self.full_pipe_estimator.on_round_start(
                &rate_sample,
                self.data_rate_model.max_bw(),
                is_inflight_too_high,
                path.rtt_sample,
                path.rtt_min,
                path.rtt_variant,
            );
            self.check_startup_done();
        }

        if self.phase.is_drain() {
            self.check_drain_done(path, now);
        }

        if self.phase.is_probing_bw() {
            if round_start {
                self.advance_rounds_since_bw_probe();
            }
            self.update_probe_bw_cycle_phase(path, &rate_sample, now);
        }

        self.data_volume_model.update_min_rtt(path.rtt_sample, now);
        self.maybe_enter_probe_rtt(path, now);
        if self.phase.is_probing_rtt() {
            self.check_probe_rtt_done(path, now);
        }

        self.congestion_state.advance(&rate_sample);
        self.data_rate_model.bound_bw_for_model();

        if is_inflight_too_high && self.is_bw_probe_sample() {
            self.handle_inflight_too_high(path, &rate_sample, now);
        }

        if self.phase.is_startup_long_rtt() {
            self.update_startup_long_rtt(path, &sample, now);
        } else {
            self.pacing.set_pacing_rate(
                self.data_rate_model.bw(),
                self.phase.pacing_gain(),
                self.full_pipe_estimator.filled_pipe(),
                &mut self.publisher,
            );
            self.pacing.set_send_quantum(path.send_mtu);
            self.set_cwnd(path, &sample);
        }

        path.is_cc_data_updated = true;
        self.idle_restart = false;
    }

    /// `Repeat`: a packet declared lost by duplicate-ack/reordering-threshold detection.
    pub fn on_repeat(&mut self, path: &mut PathContext, loss: LossInfo, now: Timestamp) {
        self.handle_lost_packet(path, &loss, now);
    }

    /// `Timeout`: a packet declared lost by the loss-detection timer. In addition to
    /// the common loss handling, this collapses `cwin` to the RFC 9002 RTO floor.
    pub fn on_timeout(&mut self, path: &mut PathContext, loss: LossInfo, now: Timestamp) {
        self.handle_lost_packet(path, &loss, now);
        self.save_cwnd(path.cwin);
        path.cwin = path.bytes_in_transit.saturating_add(path.send_mtu as u32);
        self.publish_cwnd(path.cwin);
    }

    /// `SpuriousRepeat`: a packet previously declared lost turns out to have arrived.
    /// Restores the cwnd saved before that loss response, in full.
    pub fn on_spurious_repeat(&mut self, path: &mut PathContext) {
        self.restore_cwnd(path);
    }

    /// `Delete`: no explicit teardown is needed; dropping the controller releases
    /// every resource it owns.
    pub fn on_delete(self) {}

    fn handle_lost_packet(&mut self, path: &PathContext, loss: &LossInfo, now: Timestamp) {
        if !self.is_bw_probe_sample() {
            return;
        }

        let lost = loss.nb_bytes_lost_since_packet_sent;
        let tx_in_flight = loss.inflight_prior as u64;
        if !Self::loss_rate_exceeds_threshold(lost, tx_in_flight) {
            return;
        }

        let inflight_hi = self.inflight_hi_from_lost_packet(loss);
        if let Phase::ProbeBw(state) = &mut self.phase {
            state.bw_probe_samples = false;
        }
        self.data_volume_model.update_upper_bound(inflight_hi);

        if self.phase.is_probing_bw_up() {
            self.enter_probe_bw_down(path, now);
        }
    }

    fn is_bw_probe_sample(&self) -> bool {
        matches!(self.phase, Phase::ProbeBw(state) if state.bw_probe_samples)
    }

    fn loss_rate_exceeds_threshold(lost: u64, tx_in_flight: u64) -> bool {
        if tx_in_flight == 0 {
            return false;
        }
        (lost as u128) * (*LOSS_THRESH.denom() as u128) > (tx_in_flight as u128) * (*LOSS_THRESH.numer() as u128)
    }

    /// `IsInflightTooHigh`: the sole loss-based trigger this core reacts to (no ECN
    /// term, matching §4.5's literal predicate).
    fn is_inflight_too_high(rate_sample: &RateSample) -> bool {
        Self::loss_rate_exceeds_threshold(rate_sample.lost, rate_sample.tx_in_flight as u64)
    }

    /// `HandleInflightTooHigh`, called from the ACK path (as opposed to the loss path,
    /// handled by `handle_lost_packet`): responds to a rate sample whose loss ratio
    /// already exceeds the threshold.
    fn handle_inflight_too_high(&mut self, path: &PathContext, rate_sample: &RateSample, now: Timestamp) {
        if let Phase::ProbeBw(state) = &mut self.phase {
            state.bw_probe_samples = false;
        }

        if !rate_sample.is_app_limited {
            let target_inflight = self.target_inflight(path);
            let inflight_hi = (rate_sample.tx_in_flight as u64).max(target_inflight);
            self.data_volume_model.update_upper_bound(inflight_hi);
        }

        if self.phase.is_probing_bw_up() {
            self.enter_probe_bw_down(path, now);
        }
    }

    /// `InflightHiFromLostPacket`: reconstructs what `inflight_hi` should have been
    /// given the fraction of in-flight bytes this one packet's loss represents.
    fn inflight_hi_from_lost_packet(&self, loss: &LossInfo) -> u64 {
        let inflight_prev = (loss.inflight_prior as u64).saturating_sub(loss.nb_bytes_newly_lost as u64) as u128;
        let lost_prefix = loss
            .nb_bytes_lost_since_packet_sent
            .saturating_sub(loss.nb_bytes_newly_lost as u64) as u128;

        let numer = *LOSS_THRESH.numer() as u128;
        let denom = *LOSS_THRESH.denom() as u128;
        let headroom = (denom.saturating_sub(numer)).max(1);

        let additional = (numer * inflight_prev.saturating_sub(lost_prefix)) / headroom;
        (inflight_prev + additional) as u64
    }

    fn transition_to(&mut self, new_phase: Phase) {
        let previous = self.phase.as_event();
        self.phase = new_phase;
        let current = self.phase.as_event();
        if previous != current {
            self.publisher.on_bbr_phase_changed(BbrPhaseChanged { previous, current });
        }
    }

    fn publish_cwnd(&mut self, cwnd: u32) {
        self.publisher
            .on_congestion_window_updated(CongestionWindowUpdated { congestion_window: cwnd });
    }

    fn save_cwnd(&mut self, cwin: u32) {
        self.prior_cwnd = cwin;
    }

    fn restore_cwnd(&mut self, path: &mut PathContext) {
        if self.prior_cwnd > path.cwin {
            path.cwin = self.prior_cwnd;
            self.publish_cwnd(path.cwin);
        }
    }

    /// `BDPMultiple`: `gain * bw * min_rtt`, falling back to `InitialWindow` while
    /// `min_rtt` hasn't been measured yet.
    fn bdp_multiple(&self, path: &PathContext, bw: Bandwidth, gain: Ratio<u64>) -> u64 {
        match self.data_volume_model.min_rtt() {
            Some(min_rtt) if !min_rtt.is_zero() => bw.mul_ratio(gain).mul_duration(min_rtt),
            _ => Self::initial_window(path.send_mtu) as u64,
        }
    }

    fn bdp(&self, path: &PathContext) -> u64 {
        self.bdp_multiple(path, self.data_rate_model.bw(), Ratio::from_integer(1))
    }

    fn target_inflight(&self, path: &PathContext) -> u64 {
        self.bdp(path).min(path.cwin as u64)
    }

    /// `QuantizationBudget`: floors a target inflight value at whichever is larger of
    /// the offload budget (`3 * send_quantum`) or `4 * MSS`, then adds a little extra
    /// room while probing upward for more bandwidth.
    fn quantization_budget(&self, path: &PathContext, inflight: u64) -> u64 {
        let mss = path.send_mtu as u64;
        let offload_budget = 3 * self.pacing.send_quantum() as u64;
        let mut budget = inflight.max(offload_budget).max(4 * mss);

        if self.phase.is_probing_bw_up() {
            budget += 2 * mss;
        }

        budget
    }

    fn inflight(&self, path: &PathContext, bw: Bandwidth, gain: Ratio<u64>) -> u64 {
        self.quantization_budget(path, self.bdp_multiple(path, bw, gain))
    }

    fn max_inflight(&self, path: &PathContext, extra_acked: u64) -> u64 {
        let target = self.bdp_multiple(path, self.data_rate_model.bw(), self.phase.cwnd_gain());
        self.quantization_budget(path, target + extra_acked)
    }

    fn inflight_with_headroom(&self) -> u64 {
        let inflight_hi = self.data_volume_model.inflight_hi();
        if inflight_hi == u64::MAX {
            u64::MAX
        } else {
            (Ratio::from_integer(inflight_hi) * constants::HEADROOM).to_integer()
        }
    }

    /// `BBRInitialWindow`, an RFC 9002-style bound used while `min_rtt` is unknown.
    fn initial_window(max_datagram_size: u16) -> u32 {
        let mss = max_datagram_size as u32;
        (10 * mss).min((2 * mss).max(constants::INITIAL_WINDOW_LIMIT))
    }

    fn minimum_window(&self, max_datagram_size: u16) -> u32 {
        MIN_PIPE_CWND_PACKETS * max_datagram_size as u32
    }

    /// `SetCwnd`: the full per-ACK cwnd recomputation (§4.7). Reads and writes
    /// `path.cwin` directly, since the controller never caches its own copy of it.
    fn set_cwnd(&mut self, path: &mut PathContext, sample: &AckSample) {
        let extra_acked = self.data_volume_model.extra_acked();
        let max_inflight = self.max_inflight(path, extra_acked);
        let mss = path.send_mtu as u32;

        let mut cwin = path.cwin.saturating_sub(sample.nb_bytes_newly_lost);
        cwin = cwin.max(mss);

        if self.full_pipe_estimator.filled_pipe() {
            cwin = (cwin.saturating_add(sample.nb_bytes_acknowledged)).min(max_inflight as u32);
        } else if (cwin as u64) < max_inflight || (path.delivered as u64) < Self::initial_window(path.send_mtu) as u64 {
            cwin = cwin.saturating_add(sample.nb_bytes_acknowledged);
        }

        cwin = cwin.max(4 * mss);

        if self.phase.is_probing_rtt() {
            let probe_rtt_cwnd = self
                .bdp_multiple(path, self.data_rate_model.bw(), probe_rtt::CWND_GAIN)
                .max(self.minimum_window(path.send_mtu) as u64) as u32;
            cwin = cwin.min(probe_rtt_cwnd);
        }

        if self.phase.is_probing_bw() && !self.phase.is_probing_bw_cruise() {
            let inflight_hi = self.data_volume_model.inflight_hi();
            if inflight_hi != u64::MAX {
                cwin = cwin.min(inflight_hi as u32);
            }
        }

        if self.phase.is_probing_bw_cruise() || self.phase.is_probing_rtt() {
            let headroom = self.inflight_with_headroom();
            if headroom != u64::MAX {
                cwin = cwin.min(headroom as u32);
            }
        }

        let inflight_lo = self.data_volume_model.inflight_lo();
        if inflight_lo != u64::MAX {
            cwin = cwin.min(inflight_lo as u32);
        }

        cwin = cwin.max(4 * mss);

        if cwin != path.cwin {
            path.cwin = cwin;
            self.publish_cwnd(cwin);
        }
    }
}

/// Read-only accessors for the quantities named in the controller's testable
/// invariants, compiled only for `cfg(test)` or the `testing` feature so production
/// builds never carry a public surface for internal model state.
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;

    impl<P: Publisher> BbrController<P> {
        pub fn inflight_hi(&self) -> u64 {
            self.data_volume_model.inflight_hi()
        }

        pub fn inflight_lo(&self) -> u64 {
            self.data_volume_model.inflight_lo()
        }

        pub fn max_bw(&self) -> Bandwidth {
            self.data_rate_model.max_bw()
        }

        pub fn bw(&self) -> Bandwidth {
            self.data_rate_model.bw()
        }

        pub fn bw_hi(&self) -> Bandwidth {
            self.data_rate_model.bw_hi()
        }

        pub fn bw_lo(&self) -> Bandwidth {
            self.data_rate_model.bw_lo()
        }

        pub fn min_rtt(&self) -> Option<core::time::Duration> {
            self.data_volume_model.min_rtt()
        }

        pub fn round_count(&self) -> u64 {
            self.round_counter.round_count()
        }

        pub fn round_start(&self) -> bool {
            self.round_counter.round_start()
        }

        pub fn extra_acked(&self) -> u64 {
            self.data_volume_model.extra_acked()
        }

        pub fn send_quantum(&self) -> usize {
            self.pacing.send_quantum()
        }

        pub fn pacing_rate(&self) -> Bandwidth {
            self.pacing.pacing_rate()
        }

        pub fn smoothed_loss_rate(&self) -> f64 {
            self.congestion_state.loss_rate_smoothed()
        }

        pub fn max_inflight_value(&self, path: &PathContext, extra_acked: u64) -> u64 {
            self.max_inflight(path, extra_acked)
        }

        pub fn min_pipe_cwnd(&self, max_datagram_size: u16) -> u32 {
            self.minimum_window(max_datagram_size)
        }

        /// `(numerator, denominator)` of the active phase's pacing gain, avoiding a
        /// `num-rational` dependency for callers that only need to compare fractions.
        pub fn pacing_gain_fraction(&self) -> (u64, u64) {
            let gain = self.phase.pacing_gain();
            (*gain.numer(), *gain.denom())
        }

        /// `(numerator, denominator)` of the active phase's cwnd gain.
        pub fn cwnd_gain_fraction(&self) -> (u64, u64) {
            let gain = self.phase.cwnd_gain();
            (*gain.numer(), *gain.denom())
        }
    }
}
