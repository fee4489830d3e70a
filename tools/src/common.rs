// Copyright (c) 2023 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;
use std::time::Instant;

use log::trace;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use lbbr::CongestionController;
use lbbr::RateSample;
use lbbr::TransportState;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Parameters of a simulated bottleneck.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Bottleneck bandwidth in segments per millisecond.
    pub bandwidth: u64,

    /// Two-way propagation delay.
    pub rtt: Duration,

    /// Max extra delay added to each RTT sample.
    pub jitter: Duration,

    /// Segment size in bytes.
    pub mss: u32,

    /// Congestion window clamp in segments.
    pub cwnd_clamp: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bandwidth: 100,
            rtt: Duration::from_millis(10),
            jitter: Duration::ZERO,
            mss: lbbr::DEFAULT_MSS,
            cwnd_clamp: u32::MAX,
        }
    }
}

/// A fixed-bandwidth bottleneck with an unlimited FIFO buffer.
///
/// The sender is window-limited: each round it puts a full window in flight,
/// the window drains at the bottleneck rate and is acknowledged as a whole
/// at the end of the round. A window above the BDP queues and stretches the
/// round. The pacing rate is reported but does not shape the link.
pub struct Link {
    conf: LinkConfig,
    transport: TransportState,
    now: Instant,
    rng: StdRng,
}

impl Link {
    pub fn new(conf: LinkConfig, seed: u64) -> Result<Self> {
        if conf.bandwidth == 0 {
            return Err("zero bandwidth".into());
        }
        if conf.rtt.is_zero() {
            return Err("zero rtt".into());
        }

        let transport = TransportState {
            cwnd_clamp: conf.cwnd_clamp,
            mss: conf.mss,
            ..TransportState::default()
        };

        Ok(Self {
            conf,
            transport,
            now: Instant::now(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Bandwidth-delay product of the link in segments.
    pub fn bdp(&self) -> u64 {
        self.conf.bandwidth * self.conf.rtt.as_millis() as u64
    }

    /// Transport state after the last round.
    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    /// Send one window through the link and feed the resulting sample to
    /// the controller.
    pub fn round(&mut self, cc: &mut dyn CongestionController) -> RateSample {
        let cwnd = cc.congestion_window();

        // Queueing delay once the window exceeds the BDP.
        let drain_us = (cwnd as u64).saturating_mul(1000) / self.conf.bandwidth;
        let round_us = (self.conf.rtt.as_micros() as u64).max(drain_us);

        let jitter_us = match self.conf.jitter.as_micros() as u64 {
            0 => 0,
            jitter => self.rng.gen_range(0..=jitter),
        };
        let rtt = Duration::from_micros(round_us.saturating_add(jitter_us));

        let prior_delivered = self.transport.delivered;
        self.transport.delivered += cwnd as u64;
        self.transport.in_flight = cwnd;
        self.now += rtt;

        let sample = RateSample {
            now: self.now,
            delivered: cwnd as u64,
            interval: Duration::from_micros(round_us),
            rtt: Some(rtt),
            is_app_limited: false,
            prior_delivered,
            acked_sacked: cwnd,
        };
        cc.on_rate_sample(&sample, &self.transport);

        trace!(
            "link: sent {} in {}us, rtt {:?}, next cwnd {}",
            cwnd,
            round_us,
            rtt,
            cc.congestion_window()
        );

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbbr::build_congestion_controller;
    use lbbr::CongestionControlVariant;
    use lbbr::LbbrConfig;
    use lbbr::Phase;

    fn controller(variant: CongestionControlVariant) -> Box<dyn CongestionController> {
        let mut conf = LbbrConfig::default();
        conf.set_variant(variant).set_mss(1000);
        build_congestion_controller(&conf).unwrap()
    }

    fn link(jitter: Duration, clamp: u32, seed: u64) -> Link {
        let conf = LinkConfig {
            jitter,
            mss: 1000,
            cwnd_clamp: clamp,
            ..LinkConfig::default()
        };
        Link::new(conf, seed).unwrap()
    }

    #[test]
    fn link_config() {
        let conf = LinkConfig {
            bandwidth: 0,
            ..LinkConfig::default()
        };
        assert!(Link::new(conf, 0).is_err());

        let conf = LinkConfig {
            rtt: Duration::ZERO,
            ..LinkConfig::default()
        };
        assert!(Link::new(conf, 0).is_err());

        let link = Link::new(LinkConfig::default(), 0).unwrap();
        assert_eq!(link.bdp(), 1000);
        assert_eq!(link.transport().delivered, 0);
    }

    #[test]
    fn link_oscillating() {
        let mut cc = controller(CongestionControlVariant::Oscillating);
        let mut link = link(Duration::ZERO, u32::MAX, 0);

        for _ in 0..30 {
            link.round(cc.as_mut());
        }
        let info = cc.info().unwrap();
        assert_ne!(info.phase, <&str>::from(Phase::Startup));
        assert_eq!(info.min_rtt_us, Some(10_000));
        assert_eq!(info.target_cwnd, 1000);
        // 100 segments/ms of 1000 bytes, less the truncation of the scaled rate.
        assert!(info.bw > 99_000_000 && info.bw <= 100_000_000);

        // The window saws between 0.8 and 2 times the BDP.
        for _ in 30..300 {
            link.round(cc.as_mut());
            let cwnd = cc.congestion_window();
            assert!((797..=2001).contains(&cwnd), "cwnd {}", cwnd);
        }
        assert_eq!(link.transport().delivered, cc.stats().acked_in_total);
    }

    #[test]
    fn link_basic() {
        let mut cc = controller(CongestionControlVariant::Basic);
        let mut link = link(Duration::ZERO, u32::MAX, 0);

        for _ in 0..30 {
            link.round(cc.as_mut());
        }
        assert_eq!(cc.name(), "LBBR-BASIC");
        assert!(!cc.in_slow_start());

        // Never below the BDP, never backing off.
        let mut last = cc.congestion_window();
        for _ in 30..300 {
            link.round(cc.as_mut());
            let cwnd = cc.congestion_window();
            assert!(cwnd >= 1000);
            assert!(cwnd >= last);
            last = cwnd;
        }
    }

    #[test]
    fn link_jitter() {
        let jitter = Duration::from_millis(2);
        let mut cc = controller(CongestionControlVariant::Oscillating);
        let mut other = controller(CongestionControlVariant::Oscillating);
        let mut link1 = link(jitter, u32::MAX, 7);
        let mut link2 = link(jitter, u32::MAX, 7);

        for _ in 0..200 {
            let s1 = link1.round(cc.as_mut());
            let s2 = link2.round(other.as_mut());
            assert_eq!(s1.rtt, s2.rtt);
            assert_eq!(cc.congestion_window(), other.congestion_window());

            let min_rtt_us = cc.info().unwrap().min_rtt_us.unwrap();
            assert!((10_000..=12_000).contains(&min_rtt_us));
        }
    }

    #[test]
    fn link_clamp() {
        let mut cc = controller(CongestionControlVariant::Oscillating);
        let mut link = link(Duration::ZERO, 500, 0);

        for _ in 0..100 {
            link.round(cc.as_mut());
            assert!(cc.congestion_window() <= 500);
        }
    }
}
