// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Property tests for the quantified invariants, driven by a `bolero`-generated stream
//! of notifications against a single model controller, following the
//! `Operation`/`Model`/`apply`/`invariants` harness shape used for this workspace's own
//! congestion controllers.

use bolero::{check, generator::*};
use core::time::Duration;
use quic_bbr::bandwidth::{AckSample, Bandwidth, LossInfo};
use quic_bbr::bbr::BbrController;
use quic_bbr::event::{BbrPhase, NoopPublisher};
use quic_bbr::path::PathContext;
use quic_bbr::time::{Clock, NoopClock, Timestamp};

const MSS: u16 = 1_500;
/// How long an increase in `min_rtt` is allowed to take to appear after the filter's
/// window expires; matches the literal 10s window named by the invariant.
const MIN_RTT_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, TypeGenerator)]
enum Operation {
    IncrementTime {
        #[generator(0..=2_000)]
        millis: u16,
    },
    Ack {
        #[generator(1..=9_000)]
        bytes_acked: u16,
        #[generator(1..=2_000)]
        rtt_millis: u16,
        #[generator(0..=500_000)]
        bytes_in_transit: u32,
        is_app_limited: bool,
        is_cwnd_limited: bool,
        #[generator(0..=3_000)]
        lost_bytes: u16,
    },
    Repeat {
        #[generator(0..=9_000)]
        lost_bytes: u16,
        #[generator(0..=500_000)]
        inflight_prior: u32,
    },
    Timeout {
        #[generator(0..=9_000)]
        lost_bytes: u16,
        #[generator(0..=500_000)]
        inflight_prior: u32,
    },
    SpuriousRepeat,
}

struct Model {
    subject: BbrController<NoopPublisher>,
    path: PathContext,
    timestamp: Timestamp,
    last_round_count: u64,
    last_min_rtt: Option<Duration>,
    last_min_rtt_drop_at: Timestamp,
    skip_cwin_bound: bool,
    has_acked: bool,
}

impl Model {
    fn new() -> Self {
        let now = NoopClock.get_time();
        Self {
            subject: BbrController::new(now, true, 0),
            path: PathContext {
                send_mtu: MSS,
                rtt_min: Duration::from_millis(20),
                rtt_sample: Duration::from_millis(20),
                smoothed_rtt: Duration::from_millis(20),
                bandwidth_estimate: Some(Bandwidth::from_bytes_per_second(1_250_000)),
                ..Default::default()
            },
            timestamp: now,
            last_round_count: 0,
            last_min_rtt: None,
            last_min_rtt_drop_at: now,
            skip_cwin_bound: false,
            has_acked: false,
        }
    }

    fn apply(&mut self, op: &Operation) {
        self.skip_cwin_bound = false;
        match op {
            Operation::IncrementTime { millis } => {
                self.timestamp = self.timestamp + Duration::from_millis(*millis as u64);
            }
            Operation::Ack {
                bytes_acked,
                rtt_millis,
                bytes_in_transit,
                is_app_limited,
                is_cwnd_limited,
                lost_bytes,
            } => {
                let rtt = Duration::from_millis((*rtt_millis).max(1) as u64);
                let delivered_at_send = self.path.delivered;
                self.path.delivered += *bytes_acked as u64;
                self.path.bytes_in_transit = *bytes_in_transit;
                self.path.rtt_sample = rtt;
                let sample = AckSample {
                    nb_bytes_acknowledged: *bytes_acked as u32,
                    nb_bytes_delivered_since_packet_sent: *bytes_acked as u64,
                    nb_bytes_lost_since_packet_sent: *lost_bytes as u64,
                    inflight_prior: bytes_in_transit.saturating_add(*bytes_acked as u32),
                    rtt_measurement: rtt,
                    delivered_at_send,
                    is_app_limited: *is_app_limited,
                    is_cwnd_limited: *is_cwnd_limited,
                    ..Default::default()
                };
                self.subject.on_ack(&mut self.path, sample, self.timestamp);
                self.has_acked = true;
            }
            Operation::Repeat {
                lost_bytes,
                inflight_prior,
            } => {
                let loss = LossInfo {
                    nb_bytes_newly_lost: *lost_bytes as u32,
                    nb_bytes_lost_since_packet_sent: *lost_bytes as u64,
                    inflight_prior: *inflight_prior,
                };
                self.subject.on_repeat(&mut self.path, loss, self.timestamp);
            }
            Operation::Timeout {
                lost_bytes,
                inflight_prior,
            } => {
                let loss = LossInfo {
                    nb_bytes_newly_lost: *lost_bytes as u32,
                    nb_bytes_lost_since_packet_sent: *lost_bytes as u64,
                    inflight_prior: *inflight_prior,
                };
                self.subject.on_timeout(&mut self.path, loss, self.timestamp);
                // `on_timeout` collapses cwin to the RTO floor, the "explicit recovery
                // override" the cwin-bound invariant carves out.
                self.skip_cwin_bound = true;
            }
            Operation::SpuriousRepeat => {
                self.subject.on_spurious_repeat(&mut self.path);
            }
        }

        self.invariants();
    }

    fn invariants(&mut self) {
        // 1. cwin is bounded below by BBRMinPipeCwnd and above by the largest of the
        // inflight bounds, outside of the timeout's explicit override.
        if !self.skip_cwin_bound {
            let floor = 4 * MSS as u32;
            assert!(
                self.path.cwin >= floor,
                "cwin {} fell below the {} MSS floor",
                self.path.cwin,
                4
            );

            let extra_acked = self.subject.extra_acked();
            let max_inflight = self.subject.max_inflight_value(&self.path, extra_acked);
            let min_pipe_cwnd = self.subject.min_pipe_cwnd(self.path.send_mtu) as u64;
            let ceiling = self
                .subject
                .inflight_hi()
                .max(self.subject.inflight_lo())
                .max(max_inflight)
                .max(min_pipe_cwnd);
            assert!(
                self.path.cwin as u64 <= ceiling,
                "cwin {} exceeded every inflight bound {}",
                self.path.cwin,
                ceiling
            );
        }

        // 2. bw never exceeds any of the filters it is derived from.
        let bw = self.subject.bw();
        let max_bw = self.subject.max_bw();
        assert!(bw <= max_bw, "bw {:?} exceeded max_bw {:?}", bw, max_bw);
        let bw_hi = self.subject.bw_hi();
        if bw_hi != Bandwidth::MAX {
            assert!(bw <= bw_hi, "bw {:?} exceeded bw_hi {:?}", bw, bw_hi);
        }
        let bw_lo = self.subject.bw_lo();
        if bw_lo != Bandwidth::MAX {
            assert!(bw <= bw_lo, "bw {:?} exceeded bw_lo {:?}", bw, bw_lo);
        }

        // 3. round_count never goes backwards, and strictly advances whenever the
        // controller reports a round start.
        let round_count = self.subject.round_count();
        assert!(round_count >= self.last_round_count);
        if self.subject.round_start() {
            assert!(round_count > self.last_round_count);
        }
        self.last_round_count = round_count;

        // 4. the active phase's gains always match the fixed table.
        let (phase, _) = self.subject.observe();
        let expected_pacing: (u64, u64) = match phase {
            BbrPhase::Startup | BbrPhase::StartupLongRtt => (277, 100),
            BbrPhase::Drain => (1, 2),
            BbrPhase::ProbeBwDown => (9, 10),
            BbrPhase::ProbeBwCruise => (1, 1),
            BbrPhase::ProbeBwRefill | BbrPhase::ProbeBwUp => (5, 4),
            BbrPhase::ProbeRtt => (1, 1),
        };
        let expected_cwnd: (u64, u64) = match phase {
            BbrPhase::ProbeRtt => (1, 2),
            _ => (2, 1),
        };
        assert_eq!(self.subject.pacing_gain_fraction(), expected_pacing);
        assert_eq!(self.subject.cwnd_gain_fraction(), expected_cwnd);

        // 5. min_rtt only ever increases after its 10s window has elapsed since it was
        // last refreshed to a lower value.
        if let Some(min_rtt) = self.subject.min_rtt() {
            match self.last_min_rtt {
                None => self.last_min_rtt_drop_at = self.timestamp,
                Some(prev) if min_rtt < prev => self.last_min_rtt_drop_at = self.timestamp,
                Some(prev) if min_rtt > prev => {
                    let elapsed = self.timestamp.saturating_duration_since(self.last_min_rtt_drop_at);
                    assert!(
                        elapsed >= MIN_RTT_WINDOW,
                        "min_rtt rose from {:?} to {:?} after only {:?}",
                        prev,
                        min_rtt,
                        elapsed
                    );
                    self.last_min_rtt_drop_at = self.timestamp;
                }
                _ => {}
            }
            self.last_min_rtt = Some(min_rtt);
        }

        // 6 (determinism) is checked by a separate, two-model test below.

        // 7. send_quantum sits within [floor, 65536], where floor depends on whether
        // the pacing rate has crossed the 150_000 B/s line. Only meaningful once the
        // output derivation has actually run at least once.
        if self.has_acked {
            let send_quantum = self.subject.send_quantum();
            let pacing_rate = self.subject.pacing_rate().as_bytes_per_second();
            let floor = if pacing_rate < 150_000 {
                self.path.send_mtu as usize
            } else {
                2 * self.path.send_mtu as usize
            };
            assert!(
                send_quantum >= floor && send_quantum <= 65_536,
                "send_quantum {} outside [{}, 65536]",
                send_quantum,
                floor
            );
        }

        // 8. the smoothed loss rate is a probability.
        let loss_rate = self.subject.smoothed_loss_rate();
        assert!(
            (0.0..=1.0).contains(&loss_rate),
            "smoothed loss rate {} outside [0, 1]",
            loss_rate
        );
    }
}

#[cfg_attr(miri, ignore)]
#[test]
fn bbr_invariants_hold_for_any_notification_sequence() {
    check!()
        .with_generator(gen::<Vec<Operation>>())
        .for_each(|operations| {
            let mut model = Model::new();
            for operation in operations.iter() {
                model.apply(operation);
            }
        });
}

/// Invariant 6: two controllers, constructed identically and fed the same notification
/// stream, must land in identical observable states at every step.
#[cfg_attr(miri, ignore)]
#[test]
fn bbr_is_deterministic_given_an_identical_notification_stream() {
    check!()
        .with_generator(gen::<Vec<Operation>>())
        .for_each(|operations| {
            let mut left = Model::new();
            let mut right = Model::new();

            for operation in operations.iter() {
                left.apply(operation);
                right.apply(operation);

                assert_eq!(left.path.cwin, right.path.cwin);
                assert_eq!(
                    left.subject.pacing_rate().as_bytes_per_second(),
                    right.subject.pacing_rate().as_bytes_per_second()
                );
                assert_eq!(left.subject.observe().0, right.subject.observe().0);
                assert_eq!(left.subject.inflight_hi(), right.subject.inflight_hi());
                assert_eq!(left.subject.round_count(), right.subject.round_count());
            }
        });
}
