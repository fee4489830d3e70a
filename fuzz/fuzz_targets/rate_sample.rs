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

#![no_main]

use std::time::Duration;
use std::time::Instant;

use libfuzzer_sys::fuzz_target;

use lbbr::CongestionControlVariant;
use lbbr::CongestionController;
use lbbr::Lbbr;
use lbbr::LbbrConfig;
use lbbr::RateSample;
use lbbr::TransportState;
use lbbr::MIN_CWND;

const CHUNK_LEN: usize = 24;

fn u32_at(chunk: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([chunk[off], chunk[off + 1], chunk[off + 2], chunk[off + 3]])
}

fuzz_target!(|data: &[u8]| {
    let variant = match data.first() {
        Some(b) if b & 1 == 1 => CongestionControlVariant::Basic,
        _ => CongestionControlVariant::Oscillating,
    };
    let mut conf = LbbrConfig::default();
    conf.set_variant(variant);
    let mut lbbr = Lbbr::new(conf);

    let now = Instant::now();
    let mut transport = TransportState::default();

    // Each chunk is one ACK event.
    for (i, chunk) in data.chunks_exact(CHUNK_LEN).enumerate() {
        let delivered = u32_at(chunk, 0) as u64;
        let flags = chunk[20];

        transport.cwnd_clamp = u32_at(chunk, 12) >> (flags & 0x0f);
        transport.in_flight = u32_at(chunk, 16);
        transport.is_cwnd_limited = flags & 0x10 != 0;
        transport.mss = (chunk[21] as u32 + 1) * 8;

        let prior_delivered = transport.delivered.saturating_sub(chunk[22] as u64 * 1000);
        transport.delivered = transport.delivered.saturating_add(delivered);

        let sample = RateSample {
            now: now + Duration::from_millis(i as u64),
            delivered,
            interval: Duration::from_micros(u32_at(chunk, 4) as u64 >> 8),
            rtt: match flags & 0x20 {
                0 => Some(Duration::from_micros(u32_at(chunk, 8) as u64 >> 8)),
                _ => None,
            },
            is_app_limited: flags & 0x40 != 0,
            prior_delivered,
            acked_sacked: u32_at(chunk, 12) >> (chunk[23] & 0x1f),
        };
        lbbr.on_rate_sample(&sample, &transport);

        let cwnd = lbbr.congestion_window();
        assert!(cwnd >= MIN_CWND);
        if sample.acked_sacked > 0 {
            assert!(cwnd <= transport.cwnd_clamp.max(MIN_CWND));
        }
        assert!(lbbr.pacing_rate().unwrap_or(0) <= transport.max_pacing_rate);
    }
});
