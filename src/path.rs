// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-path counters the controller reads (and the couple of flags it writes)
//! on every notification.
//!
//! Everything here is an external collaborator's state (RTT estimation, the delivery
//! rate estimator, path identity) — the controller never owns these fields, it only
//! observes them through a `&mut PathContext` passed in on each call. This keeps the
//! RTT estimator, ACK parser, and delivery-rate estimator out of this crate entirely,
//! matching the explicit scope boundary in §1.

use crate::bandwidth::Bandwidth;
use core::time::Duration;

/// The per-path inputs read (and, for the two flags, written) on every notification
/// (§6, "Required path inputs").
#[derive(Clone, Copy, Debug)]
pub struct PathContext {
    /// Monotonic count of bytes the receiver has acknowledged on this path.
    pub delivered: u64,
    pub bytes_in_transit: u32,
    pub send_mtu: u16,
    pub smoothed_rtt: Duration,
    pub rtt_variant: Duration,
    pub rtt_min: Duration,
    pub rtt_sample: Duration,
    /// A live bandwidth estimate from the (external) delivery-rate estimator, when one
    /// is available; `None` before the first usable sample.
    pub bandwidth_estimate: Option<Bandwidth>,
    pub peak_bandwidth_estimate: Bandwidth,
    pub pacing_packet_time_microsec: u64,
    /// The congestion window, in bytes. Owned by the path; the controller reads it as
    /// an input to `SetCwnd` and writes the recomputed value back on every
    /// acknowledgement notification.
    pub cwin: u32,
    pub unique_path_id: u64,
    pub client_mode: bool,
    /// Set to `true` by the controller once the initial Startup/StartupLongRTT phase
    /// has computed a real slow-start threshold equivalent.
    pub is_ssthresh_initialized: bool,
    /// Set to `true` by the controller whenever it updates any congestion-control state
    /// in response to this notification, so the transport knows a re-evaluation of the
    /// send schedule may be warranted.
    pub is_cc_data_updated: bool,
    /// Timestamp of the last ACK-eliciting frame sent on this path; used by the
    /// StartupLongRTT HyStart adapter (C10) to decide whether to grow cwin linearly.
    pub last_time_acked_data_frame_sent: Option<crate::time::Timestamp>,
    /// Timestamp of the last moment the sender was limited by something other than
    /// congestion control (e.g. no application data to send).
    pub last_sender_limited_time: Option<crate::time::Timestamp>,
}

impl Default for PathContext {
    fn default() -> Self {
        Self {
            delivered: 0,
            bytes_in_transit: 0,
            send_mtu: 1500,
            smoothed_rtt: Duration::from_millis(250),
            rtt_variant: Duration::ZERO,
            rtt_min: Duration::from_millis(250),
            rtt_sample: Duration::from_millis(250),
            bandwidth_estimate: None,
            peak_bandwidth_estimate: Bandwidth::ZERO,
            pacing_packet_time_microsec: 0,
            cwin: 10 * 1500,
            unique_path_id: 0,
            client_mode: true,
            is_ssthresh_initialized: false,
            is_cc_data_updated: false,
            last_time_acked_data_frame_sent: None,
            last_sender_limited_time: None,
        }
    }
}
