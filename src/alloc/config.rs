use serde::{Deserialize, Serialize};

/// The engine's numeric policy. The defaults are what [`Heap::new()`] uses;
/// [`Heap::with_config()`] injects anything else.
///
/// [`Heap::new()`]: super::heap::Heap::new
/// [`Heap::with_config()`]: super::heap::Heap::with_config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Requests whose size plus one header reach this many bytes get their
    /// own mapped region
    pub mmap_threshold: usize,
    /// A granted block is only split when the leftover payload is at least
    /// this plus one header
    pub split_threshold: usize,
    /// Largest request accepted, in bytes
    pub max_request: usize,
}

impl Config {
    pub const DEFAULT: Self = Self {
        mmap_threshold: 128 * 1024,
        split_threshold: 128,
        max_request: 100_000_000,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{ "split_threshold": 256 }"#).unwrap();
        assert_eq!(config.split_threshold, 256);
        assert_eq!(config.mmap_threshold, Config::DEFAULT.mmap_threshold);
        assert_eq!(config.max_request, Config::DEFAULT.max_request);
    }
}
