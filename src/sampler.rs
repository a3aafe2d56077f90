//! Decides whether to fingerprint a file's entire byte stream or a
//! deterministic head+tail sample.
//!
//! The two size breakpoints beyond the configurable `large_file_threshold`
//! (1GiB and 5GiB) are fixed, not part of `Config` — they scale the
//! configured head/tail base sizes by ×2 and ×5 respectively, which is how
//! the four tiers collapse to just three configuration knobs.

use crate::config::Config;
use crate::types::FingerprintKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRanges {
    pub head_len: u64,
    pub tail_len: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePlan {
    Full,
    Sampled(SampleRanges),
}

impl SamplePlan {
    pub fn kind(self, size: u64) -> FingerprintKind {
        let _ = size;
        match self {
            SamplePlan::Full => FingerprintKind::Full,
            SamplePlan::Sampled(ranges) => FingerprintKind::Sampled {
                total_bytes: ranges.head_len + ranges.tail_len,
            },
        }
    }
}

const GIB: u64 = 1024 * 1024 * 1024;

pub fn plan_for_size(size: u64, config: &Config) -> SamplePlan {
    if !config.enable_sampling || size < config.large_file_threshold {
        return SamplePlan::Full;
    }

    let scale = if size < GIB {
        1
    } else if size < 5 * GIB {
        2
    } else {
        5
    };

    let head_len = config.sample_head_size * scale;
    let tail_len = config.sample_tail_size * scale;

    if head_len + tail_len >= size {
        return SamplePlan::Full;
    }

    SamplePlan::Sampled(SampleRanges { head_len, tail_len })
}
