// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The inflight-data model (C5, input half): the windowed minimum RTT, the
//! ack-aggregation estimate, and the loss-response upper/lower bounds on inflight data.
//!
//! ECN is a no-op hook per scope, so `update_lower_bound` here only ever responds to
//! loss, unlike upstream BBRv2 implementations that also fold in an ECN-alpha term.

use crate::bandwidth::Bandwidth;
use crate::bbr::constants::{BETA, EXTRA_ACKED_FILTER_LEN, MIN_RTT_FILTER_LEN, MIN_RTT_MARGIN_PERCENT, PROBE_RTT_INTERVAL};
use crate::bbr::windowed_filter::MaxFilter;
use crate::time::Timestamp;
use core::time::Duration;

/// The windowed minimum RTT, refreshed whenever a lower sample arrives or the current
/// one ages out past `MIN_RTT_FILTER_LEN`. Also tracks when ProbeRTT is next due
/// (`PROBE_RTT_INTERVAL`), a separate, shorter clock from the value's own expiry.
#[derive(Clone, Debug)]
pub(crate) struct MinRttFilter {
    min_rtt: Option<Duration>,
    min_rtt_stamp: Timestamp,
    /// Last time ProbeRTT ran (or the filter was created); `probe_rtt_expired` measures
    /// `PROBE_RTT_INTERVAL` from here, independent of `min_rtt_stamp`.
    probe_rtt_stamp: Timestamp,
}

impl MinRttFilter {
    pub fn new(now: Timestamp) -> Self {
        Self {
            min_rtt: None,
            min_rtt_stamp: now,
            probe_rtt_stamp: now,
        }
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        self.min_rtt
    }

    /// `BBRUpdateMinRTT`, with picoquic's `min_rtt_margin`: a sample within
    /// `MIN_RTT_MARGIN_PERCENT` of the current minimum refreshes the expiry stamp
    /// (treating it as "still at the floor") without needing to beat the minimum
    /// outright, avoiding a spurious ProbeRTT re-entry from ordinary RTT jitter right at
    /// the filter's expiry boundary.
    pub fn update(&mut self, rtt: Duration, now: Timestamp) {
        let expired = now.saturating_duration_since(self.min_rtt_stamp) > MIN_RTT_FILTER_LEN;
        let margin = self
            .min_rtt
            .map(|min_rtt| min_rtt * MIN_RTT_MARGIN_PERCENT as u32 / 100)
            .unwrap_or(Duration::ZERO);
        let within_margin = self.min_rtt.is_some_and(|min_rtt| rtt <= min_rtt + margin);

        if expired || self.min_rtt.is_none_or(|min_rtt| rtt <= min_rtt) {
            self.min_rtt = Some(rtt);
            self.min_rtt_stamp = now;
        } else if within_margin {
            self.min_rtt_stamp = now;
        }
    }

    pub fn probe_rtt_expired(&self, now: Timestamp) -> bool {
        now.saturating_duration_since(self.probe_rtt_stamp) > PROBE_RTT_INTERVAL
    }

    /// Pushes the next ProbeRTT out by a fresh `PROBE_RTT_INTERVAL`, called once
    /// ProbeRTT has finished refreshing the estimate (or the path resumes from idle).
    pub fn schedule_next_probe_rtt(&mut self, now: Timestamp) {
        self.probe_rtt_stamp = now;
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Model {
    min_rtt_filter: MinRttFilter,
    extra_acked_filter: MaxFilter<EXTRA_ACKED_FILTER_LEN>,
    extra_acked_interval_start: Timestamp,
    extra_acked_delivered: u64,
    /// The long-term inflight ceiling set by loss response in ProbeBW_Up.
    inflight_hi: u64,
    /// The short-term inflight ceiling set by loss response within the current cycle.
    inflight_lo: u64,
}

impl Model {
    pub fn new(now: Timestamp) -> Self {
        Self {
            min_rtt_filter: MinRttFilter::new(now),
            extra_acked_filter: Default::default(),
            extra_acked_interval_start: now,
            extra_acked_delivered: 0,
            inflight_hi: u64::MAX,
            inflight_lo: u64::MAX,
        }
    }

    pub fn extra_acked(&self) -> u64 {
        self.extra_acked_filter.max()
    }

    /// `BBRUpdateRound`'s filter half: clears the slot the new round is about to write
    /// into, so a round's worth of excess doesn't keep the value a stale round left
    /// behind (which would otherwise pin the windowed max at its highest-ever sample).
    pub fn start_round(&mut self, round_count: u64) {
        self.extra_acked_filter.start_period(round_count);
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        self.min_rtt_filter.min_rtt()
    }

    pub fn inflight_hi(&self) -> u64 {
        self.inflight_hi
    }

    pub fn inflight_lo(&self) -> u64 {
        self.inflight_lo
    }

    pub fn probe_rtt_expired(&self, now: Timestamp) -> bool {
        self.min_rtt_filter.probe_rtt_expired(now)
    }

    pub fn schedule_next_probe_rtt(&mut self, now: Timestamp) {
        self.min_rtt_filter.schedule_next_probe_rtt(now)
    }

    pub fn update_min_rtt(&mut self, rtt: Duration, now: Timestamp) {
        self.min_rtt_filter.update(rtt, now)
    }

    /// §4.4: find the excess delivered bytes beyond what the current bandwidth
    /// estimate would explain over the current interval, feeding the excess into a
    /// windowed max filter indexed by round count.
    pub fn update_ack_aggregation(
        &mut self,
        bw: Bandwidth,
        bytes_acknowledged: u32,
        cwnd: u32,
        round_count: u64,
        now: Timestamp,
    ) {
        let interval = now.saturating_duration_since(self.extra_acked_interval_start);
        let mut expected_delivered = bw.mul_duration(interval);

        if self.extra_acked_delivered <= expected_delivered {
            self.extra_acked_delivered = 0;
            self.extra_acked_interval_start = now;
            expected_delivered = 0;
        }

        self.extra_acked_delivered += bytes_acknowledged as u64;
        let extra = (self.extra_acked_delivered - expected_delivered).min(cwnd as u64);
        self.extra_acked_filter.update_max(extra, round_count);
    }

    pub fn update_upper_bound(&mut self, inflight_hi: u64) {
        self.inflight_hi = inflight_hi;
    }

    /// Called once per round: if the round saw loss, lowers `inflight_lo` toward the
    /// greater of the observed latest inflight and a `BETA`-decayed prior bound,
    /// initializing from `cwnd` the first time a bound is needed.
    pub fn update_lower_bound(&mut self, cwnd: u32, inflight_latest: u64, loss_in_round: bool) {
        if !loss_in_round {
            return;
        }

        if self.inflight_lo == u64::MAX {
            self.inflight_lo = cwnd as u64;
        }

        self.inflight_lo = inflight_latest.max((BETA * self.inflight_lo).to_integer());
    }

    pub fn reset_lower_bound(&mut self) {
        self.inflight_lo = u64::MAX;
    }

    pub fn set_extra_acked_interval_start(&mut self, timestamp: Timestamp) {
        self.extra_acked_interval_start = timestamp;
    }
}
