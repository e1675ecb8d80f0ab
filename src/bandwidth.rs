// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Bandwidth arithmetic and the per-ACK rate sample.
//!
//! The delivery-rate estimator itself (tracking `delivered_bytes`/`delivered_time` per
//! sent packet) is an external collaborator; the controller only ever sees the
//! already-built [`AckSample`]/[`LossInfo`] records described in the external
//! interfaces, from which [`RateSample::from_ack`] builds the internal working sample.

use core::time::Duration;
use num_rational::Ratio;
use num_traits::CheckedMul;

/// A fallback delivery-rate floor used when neither a bandwidth estimate nor a usable
/// RTT measurement is available for a sample (e.g. the very first ACK on a path).
const FALLBACK_DELIVERY_RATE: u64 = 40_000;

/// A rate, expressed in bytes per second.
///
/// Multiplying by a `Duration` or a `Ratio<u64>` gain is always overflow-safe: both
/// operations widen to `u128`/checked arithmetic internally and saturate to
/// `Bandwidth::MAX` rather than wrapping, since a saturated bandwidth is a much safer
/// failure mode for a congestion controller than a wrapped one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bandwidth(u64);

impl Bandwidth {
    pub const ZERO: Bandwidth = Bandwidth(0);
    pub const MAX: Bandwidth = Bandwidth(u64::MAX);

    pub const fn from_bytes_per_second(bytes_per_second: u64) -> Self {
        Self(bytes_per_second)
    }

    pub const fn as_bytes_per_second(self) -> u64 {
        self.0
    }

    /// Bytes transferred over `duration` at this rate, saturating on overflow.
    pub fn mul_duration(self, duration: Duration) -> u64 {
        let nanos = duration.as_nanos();
        let bytes = (self.0 as u128).saturating_mul(nanos) / 1_000_000_000u128.max(1);
        bytes.min(u64::MAX as u128) as u64
    }

    /// Scales the bandwidth by an exact-fraction gain, saturating on overflow.
    pub fn mul_ratio(self, gain: Ratio<u64>) -> Bandwidth {
        gain.checked_mul(&Ratio::from_integer(self.0))
            .map_or(Bandwidth::MAX, |r| Bandwidth(r.to_integer()))
    }

    pub fn saturating_sub(self, rhs: Bandwidth) -> Bandwidth {
        Bandwidth(self.0.saturating_sub(rhs.0))
    }
}

/// The per-ACK sample supplied by the caller (§6, "Per-ACK sample").
#[derive(Clone, Copy, Debug, Default)]
pub struct AckSample {
    pub nb_bytes_acknowledged: u32,
    pub nb_bytes_delivered_since_packet_sent: u64,
    pub nb_bytes_newly_lost: u32,
    pub nb_bytes_lost_since_packet_sent: u64,
    pub inflight_prior: u32,
    pub rtt_measurement: Duration,
    /// The path's cumulative `delivered` counter at the moment the now-acknowledged
    /// packet was sent, recorded per-packet by the (external) delivery-rate estimator.
    /// Subtracting this from the path's current `delivered` yields the volume actually
    /// delivered while that packet was in flight, the quantity BBR calls `rs.delivered`.
    pub delivered_at_send: u64,
    pub is_app_limited: bool,
    pub is_cwnd_limited: bool,
}

/// The per-loss info supplied by the caller (§6, "Per-loss info").
#[derive(Clone, Copy, Debug, Default)]
pub struct LossInfo {
    pub nb_bytes_newly_lost: u32,
    pub nb_bytes_lost_since_packet_sent: u64,
    pub inflight_prior: u32,
}

/// The internal working sample built by the sample adapter (C3) from an [`AckSample`]
/// plus the path's current `delivered` counter and an optional live bandwidth estimate.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RateSample {
    pub delivered: u64,
    pub delivery_rate: Bandwidth,
    pub rtt_sample: Duration,
    pub newly_acked: u32,
    pub newly_lost: u32,
    pub lost: u64,
    pub tx_in_flight: u32,
    pub is_app_limited: bool,
    pub is_cwnd_limited: bool,
}

impl RateSample {
    /// Builds a `RateSample` per §4.3: prefer the path's live bandwidth estimate; fall
    /// back to `delivered_since_send / rtt_measurement`; fall back again to a fixed
    /// floor if neither is usable.
    ///
    /// `delivered` is the path's raw cumulative delivered-byte counter; the sample's own
    /// `delivered` field is the volume delivered *while this packet was in flight*
    /// (`delivered - ack.delivered_at_send`), matching BBR's `rs.delivered` rather than
    /// the ever-growing connection total.
    pub fn from_ack(
        ack: &AckSample,
        delivered: u64,
        bandwidth_estimate: Option<Bandwidth>,
    ) -> Self {
        let delivery_rate = match bandwidth_estimate {
            Some(bw) if bw != Bandwidth::ZERO => bw,
            _ => {
                if !ack.rtt_measurement.is_zero() {
                    let bytes = ack.nb_bytes_delivered_since_packet_sent as u128;
                    let micros = ack.rtt_measurement.as_micros().max(1);
                    let rate = (bytes * 1_000_000) / micros;
                    Bandwidth::from_bytes_per_second(rate.min(u64::MAX as u128) as u64)
                } else {
                    Bandwidth::from_bytes_per_second(FALLBACK_DELIVERY_RATE)
                }
            }
        };

        Self {
            delivered: delivered.saturating_sub(ack.delivered_at_send),
            delivery_rate,
            rtt_sample: ack.rtt_measurement,
            newly_acked: ack.nb_bytes_acknowledged,
            newly_lost: ack.nb_bytes_newly_lost,
            lost: ack.nb_bytes_lost_since_packet_sent,
            tx_in_flight: ack.inflight_prior,
            is_app_limited: ack.is_app_limited,
            is_cwnd_limited: ack.is_cwnd_limited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_duration_is_exact_for_one_second() {
        let bw = Bandwidth::from_bytes_per_second(1_000);
        assert_eq!(bw.mul_duration(Duration::from_secs(1)), 1_000);
    }

    #[test]
    fn mul_duration_saturates_instead_of_overflowing() {
        let bw = Bandwidth::from_bytes_per_second(u64::MAX);
        assert_eq!(bw.mul_duration(Duration::from_secs(10)), u64::MAX);
    }

    #[test]
    fn from_ack_prefers_bandwidth_estimate() {
        let ack = AckSample {
            nb_bytes_delivered_since_packet_sent: 1_000,
            rtt_measurement: Duration::from_millis(10),
            ..Default::default()
        };
        let sample = RateSample::from_ack(
            &ack,
            0,
            Some(Bandwidth::from_bytes_per_second(5_000_000)),
        );
        assert_eq!(sample.delivery_rate.as_bytes_per_second(), 5_000_000);
    }

    #[test]
    fn from_ack_falls_back_to_delivered_over_rtt() {
        let ack = AckSample {
            nb_bytes_delivered_since_packet_sent: 1_000,
            rtt_measurement: Duration::from_millis(10),
            ..Default::default()
        };
        let sample = RateSample::from_ack(&ack, 0, None);
        assert_eq!(sample.delivery_rate.as_bytes_per_second(), 100_000);
    }

    #[test]
    fn from_ack_uses_floor_when_no_signal_available() {
        let ack = AckSample::default();
        let sample = RateSample::from_ack(&ack, 0, None);
        assert_eq!(
            sample.delivery_rate.as_bytes_per_second(),
            FALLBACK_DELIVERY_RATE
        );
    }
}
