//! Enumerated engine configuration. No file format is defined here — YAML
//! loading and CLI argument parsing are out of scope; callers construct
//! `Config` directly, typically by starting from `Config::default()`.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// Non-cryptographic, fast default (XxHash64). Adequate because the
    /// cache's (size, mtime, digest) identity already prevents most
    /// accidental collisions from ever mattering.
    FastNonCryptographic64,
    Sha1,
    Sha256,
    Md5,
}

impl HashAlgorithm {
    pub fn label(self) -> &'static str {
        match self {
            HashAlgorithm::FastNonCryptographic64 => "xxhash64",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Md5 => "md5",
        }
    }
}

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "svg", "ico", "heic", "heif",
    "raw", "cr2", "nef", "arw", "dng", "psd", "ai",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub hash_algorithm: HashAlgorithm,

    pub enable_sampling: bool,
    /// Files smaller than this are always fully hashed.
    pub large_file_threshold: u64,
    /// Base head/tail sample sizes for the first sampled tier; scaled ×2 and
    /// ×5 for the 1GiB and 5GiB tiers respectively.
    pub sample_head_size: u64,
    pub sample_tail_size: u64,

    pub skip_images: bool,
    pub image_extensions: HashSet<String>,
    pub min_file_size: u64,

    pub use_media_probe: bool,
    pub probe_duration: bool,
    pub probe_codec: bool,
    pub probe_resolution: bool,

    pub parallel_hashing: bool,
    pub max_workers: usize,

    pub require_output_root: bool,
    pub dry_run: bool,
    /// When true, the resolver re-stats files from disk instead of trusting
    /// cached size/mtime.
    pub verify_files: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::FastNonCryptographic64,

            enable_sampling: true,
            large_file_threshold: 20 * 1024 * 1024,
            sample_head_size: 10 * 1024 * 1024,
            sample_tail_size: 10 * 1024 * 1024,

            skip_images: true,
            image_extensions: DEFAULT_IMAGE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            min_file_size: 10 * 1024,

            use_media_probe: true,
            probe_duration: true,
            probe_codec: false,
            probe_resolution: false,

            parallel_hashing: true,
            max_workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),

            require_output_root: true,
            dry_run: true,
            verify_files: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_dry_run() {
        assert!(Config::default().dry_run);
    }

    #[test]
    fn default_image_extensions_include_common_formats() {
        let config = Config::default();
        assert!(config.image_extensions.contains("jpg"));
        assert!(config.image_extensions.contains("png"));
    }
}
