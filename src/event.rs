// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic events.
//!
//! The controller never logs directly; instead it reports every externally-visible
//! model change through a generic [`Publisher`], the same decoupling pattern this
//! codebase's congestion controllers use elsewhere. A caller that doesn't care about
//! diagnostics can pass [`NoopPublisher`], which the optimizer erases entirely since
//! `Publisher` is taken as `impl Publisher` (monomorphized), not `dyn Publisher`.

use crate::{bandwidth::Bandwidth, time::Timestamp};
use core::time::Duration;

/// The controller's externally visible phase, mirrored 1:1 with `bbr::Phase` for
/// reporting purposes so a subscriber doesn't need to depend on the controller's
/// internal module layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BbrPhase {
    Startup,
    StartupLongRtt,
    Drain,
    ProbeBwDown,
    ProbeBwCruise,
    ProbeBwRefill,
    ProbeBwUp,
    ProbeRtt,
}

/// Emitted whenever the controller transitions from one phase to another.
#[derive(Clone, Copy, Debug)]
pub struct BbrPhaseChanged {
    pub previous: BbrPhase,
    pub current: BbrPhase,
}

/// Emitted after `SetPacingRate` decides to (or declines to) update the pacing rate.
#[derive(Clone, Copy, Debug)]
pub struct PacingRateUpdated {
    pub pacing_rate: Bandwidth,
    pub send_quantum: usize,
}

/// Emitted whenever the congestion window changes.
#[derive(Clone, Copy, Debug)]
pub struct CongestionWindowUpdated {
    pub congestion_window: u32,
}

/// Emitted whenever a new per-ACK delivery-rate sample is folded into the bandwidth
/// model, independent of whether it changed `max_bw`.
#[derive(Clone, Copy, Debug)]
pub struct DeliveryRateSampled {
    pub delivery_rate: Bandwidth,
    pub is_app_limited: bool,
}

/// Emitted whenever `min_rtt` is refreshed.
#[derive(Clone, Copy, Debug)]
pub struct MinRttUpdated {
    pub min_rtt: Duration,
    pub timestamp: Timestamp,
}

/// Emitted when Startup exits because the pipe looks full.
#[derive(Clone, Copy, Debug)]
pub struct PipeFilled {
    pub full_bw: Bandwidth,
}

/// Receives diagnostic events from the controller.
///
/// Implement this to wire the controller into a metrics pipeline; the default
/// `tracing`-backed implementation below is gated behind Cargo features so a caller
/// that doesn't enable them pays nothing for it.
pub trait Publisher {
    fn on_bbr_phase_changed(&mut self, event: BbrPhaseChanged);
    fn on_pacing_rate_updated(&mut self, event: PacingRateUpdated);
    fn on_congestion_window_updated(&mut self, event: CongestionWindowUpdated);
    fn on_delivery_rate_sampled(&mut self, event: DeliveryRateSampled);
    fn on_min_rtt_updated(&mut self, event: MinRttUpdated);
    fn on_pipe_filled(&mut self, event: PipeFilled);
}

/// A `Publisher` that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    #[inline]
    fn on_bbr_phase_changed(&mut self, _event: BbrPhaseChanged) {}
    #[inline]
    fn on_pacing_rate_updated(&mut self, _event: PacingRateUpdated) {}
    #[inline]
    fn on_congestion_window_updated(&mut self, _event: CongestionWindowUpdated) {}
    #[inline]
    fn on_delivery_rate_sampled(&mut self, _event: DeliveryRateSampled) {}
    #[inline]
    fn on_min_rtt_updated(&mut self, _event: MinRttUpdated) {}
    #[inline]
    fn on_pipe_filled(&mut self, _event: PipeFilled) {}
}

cfg_if::cfg_if! {
    if #[cfg(feature = "tracing")] {
        /// A `Publisher` that mirrors every event as a `tracing` event at `debug` level.
        ///
        /// Enabled by the `event-tracing`/`state-tracing` Cargo features; compiles out
        /// entirely (along with the `tracing` dependency) when those features are off.
        #[derive(Clone, Copy, Debug, Default)]
        pub struct TracingPublisher;

        impl Publisher for TracingPublisher {
            fn on_bbr_phase_changed(&mut self, event: BbrPhaseChanged) {
                tracing::debug!(previous = ?event.previous, current = ?event.current, "bbr_phase_changed");
            }

            fn on_pacing_rate_updated(&mut self, event: PacingRateUpdated) {
                tracing::trace!(
                    pacing_rate = event.pacing_rate.as_bytes_per_second(),
                    send_quantum = event.send_quantum,
                    "pacing_rate_updated"
                );
            }

            fn on_congestion_window_updated(&mut self, event: CongestionWindowUpdated) {
                tracing::trace!(cwnd = event.congestion_window, "congestion_window_updated");
            }

            fn on_delivery_rate_sampled(&mut self, event: DeliveryRateSampled) {
                tracing::trace!(
                    delivery_rate = event.delivery_rate.as_bytes_per_second(),
                    is_app_limited = event.is_app_limited,
                    "delivery_rate_sampled"
                );
            }

            fn on_min_rtt_updated(&mut self, event: MinRttUpdated) {
                tracing::debug!(min_rtt = ?event.min_rtt, "min_rtt_updated");
            }

            fn on_pipe_filled(&mut self, event: PipeFilled) {
                tracing::debug!(full_bw = event.full_bw.as_bytes_per_second(), "pipe_filled");
            }
        }
    }
}
