// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Named constants for the BBRv3 core, including the picoquic-specific extensions.
//!
//! Per the design notes this module keeps every "implicit global constant" as an
//! explicit, named, module-level item rather than a magic number scattered across the
//! state machine.

use core::time::Duration;
use num_rational::Ratio;

/// `BBRStartupPacingGain`: doubles the sending rate each round during Startup
/// (`4 * ln(2) ~= 2.77`).
pub(crate) const STARTUP_PACING_GAIN: Ratio<u64> = Ratio::new_raw(277, 100);
/// `BBRStartupCwndGain`.
pub(crate) const STARTUP_CWND_GAIN: Ratio<u64> = Ratio::new_raw(2, 1);

/// `BBRLossThresh`: the maximum tolerated per-round-trip packet loss rate while
/// probing for bandwidth.
pub(crate) const LOSS_THRESH: Ratio<u64> = Ratio::new_raw(1, 50);
/// `BBRLossAlpha`: the EWMA smoothing factor for the smoothed loss rate.
pub(crate) const LOSS_ALPHA: Ratio<u64> = Ratio::new_raw(1, 8);
/// `BBRBeta`: the multiplicative decrease applied to lower bounds on detected loss.
pub(crate) const BETA: Ratio<u64> = Ratio::new_raw(7, 10);
/// `BBRHeadroom`, applied as the retained (not discarded) fraction of `inflight_hi`:
/// the draft's pseudocode subtracts `0.15 * inflight_hi`, i.e. retains 85%.
pub(crate) const HEADROOM: Ratio<u64> = Ratio::new_raw(85, 100);

/// `BBRMinPipeCwnd`, in MSS units.
pub(crate) const MIN_PIPE_CWND_PACKETS: u32 = 4;

/// `BBRMaxBwFilterLen`.
pub(crate) const MAX_BW_FILTER_LEN: usize = 2;
/// `BBRExtraAckedFilterLen`.
pub(crate) const EXTRA_ACKED_FILTER_LEN: usize = 10;

/// `BBRMinRTTFilterLen`.
pub(crate) const MIN_RTT_FILTER_LEN: Duration = Duration::from_secs(10);
/// `BBRMinRttMarginPercent`: a sample within this percentage of the tracked minimum
/// still refreshes the expiry stamp, to avoid spurious ProbeRTT re-entry from ordinary
/// RTT jitter right at the filter's expiry boundary.
pub(crate) const MIN_RTT_MARGIN_PERCENT: u64 = 2;
/// `BBRProbeRTTDuration`.
pub(crate) const PROBE_RTT_DURATION: Duration = Duration::from_millis(200);
/// `BBRProbeRTTInterval`.
pub(crate) const PROBE_RTT_INTERVAL: Duration = Duration::from_secs(5);
/// `BBRProbeRTTCwndGain`.
pub(crate) const PROBE_RTT_CWND_GAIN: Ratio<u64> = Ratio::new_raw(1, 2);

/// `BBRPacingMarginPercent`: shaved off the pacing rate to leave headroom below the
/// estimated bottleneck rate.
pub(crate) const PACING_MARGIN_PERCENT: u64 = 1;

/// Startup's bandwidth-plateau growth threshold: `4 * max_bw >= 5 * full_bw`, i.e. a
/// 1.25x growth test (`BBRCheckStartupFullBandwidth`).
pub(crate) const FULL_BW_GROWTH_NUMERATOR: u64 = 5;
pub(crate) const FULL_BW_GROWTH_DENOMINATOR: u64 = 4;
/// Number of consecutive non-growing rounds before Startup declares the pipe full.
pub(crate) const FULL_BW_COUNT_THRESHOLD: u32 = 3;

/// `MaxBwProbeUpRounds`.
pub(crate) const MAX_BW_PROBE_UP_ROUNDS: u64 = 30;
/// `MaxBwProbeRounds`, capping `rounds_since_bw_probe` at `min(target_inflight, this)`.
pub(crate) const MAX_BW_PROBE_ROUNDS: u64 = 63;
/// Number of loss bursts within a single ProbeBW round considered "too high".
pub(crate) const PROBE_BW_FULL_LOSS_COUNT: u8 = 2;

/// ProbeBW phase gains (pacing_gain, cwnd_gain).
pub(crate) const PROBE_BW_DOWN_PACING_GAIN: Ratio<u64> = Ratio::new_raw(9, 10);
pub(crate) const PROBE_BW_CRUISE_PACING_GAIN: Ratio<u64> = Ratio::new_raw(1, 1);
pub(crate) const PROBE_BW_REFILL_PACING_GAIN: Ratio<u64> = Ratio::new_raw(5, 4);
pub(crate) const PROBE_BW_UP_PACING_GAIN: Ratio<u64> = Ratio::new_raw(5, 4);
pub(crate) const PROBE_BW_CWND_GAIN: Ratio<u64> = Ratio::new_raw(2, 1);

/// Randomised probe-wait bounds, in microseconds: `2_000_000 + rand(0, 1_000_000)`.
pub(crate) const BW_PROBE_WAIT_BASE_MICROS: u64 = 2_000_000;
pub(crate) const BW_PROBE_WAIT_JITTER_MICROS: u64 = 1_000_000;

/// Picoquic-derived constants used by the StartupLongRTT fallback.
pub(crate) const PICOQUIC_INITIAL_RTT: Duration = Duration::from_millis(250);
pub(crate) const PICOQUIC_CWIN_INITIAL_PACKETS: u32 = 10;
pub(crate) const PICOQUIC_TARGET_RENO_RTT: Duration = Duration::from_millis(100);
pub(crate) const PICOQUIC_TARGET_SATELLITE_RTT: Duration = Duration::from_secs(1);

/// RFC 9002-style initial window bound used when `min_rtt` is not yet known.
pub(crate) const INITIAL_WINDOW_LIMIT: u32 = 14720;

/// Send quantum bounds (§3 invariant 6).
pub(crate) const SEND_QUANTUM_LOW_RATE_THRESHOLD: u64 = 150_000;
pub(crate) const SEND_QUANTUM_MAX: usize = 65536;
