// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Output derivation (C7): turns `(pacing_gain, bw)` and `(cwnd_gain, bdp)` into the
//! two values the sender actually consumes. The pacer itself (departure-time
//! scheduling, burst pacing) is an external collaborator — this only computes the rate
//! and quantum it should run at.

use crate::bandwidth::Bandwidth;
use crate::bbr::constants::{PACING_MARGIN_PERCENT, SEND_QUANTUM_LOW_RATE_THRESHOLD, SEND_QUANTUM_MAX};
use crate::event::{PacingRateUpdated, Publisher};
use core::time::Duration;
use num_rational::Ratio;

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PacingOutput {
    pacing_rate: Bandwidth,
    send_quantum: usize,
}

impl PacingOutput {
    pub fn pacing_rate(&self) -> Bandwidth {
        self.pacing_rate
    }

    pub fn send_quantum(&self) -> usize {
        self.send_quantum
    }

    /// `SetPacingRate`: only ever raises the rate unless the pipe is already filled,
    /// so a transient dip in `bw` during Startup/Drain doesn't strand the sender at a
    /// lower rate than it already knows is safe.
    pub fn set_pacing_rate<P: Publisher>(
        &mut self,
        bw: Bandwidth,
        gain: Ratio<u64>,
        filled_pipe: bool,
        publisher: &mut P,
    ) {
        let margin = Ratio::new_raw(100 - PACING_MARGIN_PERCENT, 100);
        let rate = bw.mul_ratio(gain).mul_ratio(margin);

        if filled_pipe || rate > self.pacing_rate {
            self.pacing_rate = rate;
            publisher.on_pacing_rate_updated(PacingRateUpdated {
                pacing_rate: rate,
                send_quantum: self.send_quantum,
            });
        }
    }

    /// `SetSendQuantum`.
    pub fn set_send_quantum(&mut self, max_datagram_size: u16) {
        let floor = if self.pacing_rate.as_bytes_per_second() < SEND_QUANTUM_LOW_RATE_THRESHOLD {
            max_datagram_size as usize
        } else {
            max_datagram_size as usize * 2
        };

        let quantum = self.pacing_rate.mul_duration(Duration::from_millis(1)) as usize;
        self.send_quantum = quantum.clamp(floor, SEND_QUANTUM_MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoopPublisher;

    #[test]
    fn set_pacing_rate_only_raises_before_pipe_is_filled() {
        let mut output = PacingOutput::default();
        let mut publisher = NoopPublisher;

        output.set_pacing_rate(
            Bandwidth::from_bytes_per_second(1_000_000),
            Ratio::new_raw(2, 1),
            false,
            &mut publisher,
        );
        let first = output.pacing_rate();
        assert!(first.as_bytes_per_second() > 0);

        output.set_pacing_rate(
            Bandwidth::from_bytes_per_second(10),
            Ratio::new_raw(1, 1),
            false,
            &mut publisher,
        );
        // A much lower rate shouldn't regress pacing while the pipe isn't filled.
        assert_eq!(output.pacing_rate(), first);

        output.set_pacing_rate(
            Bandwidth::from_bytes_per_second(10),
            Ratio::new_raw(1, 1),
            true,
            &mut publisher,
        );
        // Once the pipe is filled, the rate tracks bw downward too.
        assert!(output.pacing_rate() < first);
    }

    #[test]
    fn send_quantum_uses_the_low_rate_floor() {
        let mut output = PacingOutput::default();
        output.pacing_rate = Bandwidth::from_bytes_per_second(100_000);
        output.set_send_quantum(1_500);
        assert_eq!(output.send_quantum(), 1_500);
    }

    #[test]
    fn send_quantum_caps_at_64kb() {
        let mut output = PacingOutput::default();
        output.pacing_rate = Bandwidth::from_bytes_per_second(u64::MAX);
        output.set_send_quantum(1_500);
        assert_eq!(output.send_quantum(), SEND_QUANTUM_MAX);
    }
}
