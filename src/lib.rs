//! Shikaku - toolbox for Japanese text.
//!
//! This library provides functionality for:
//! - Downloading works from Aozora Bunko and stripping their markup
//! - Splitting cleaned prose into sentences for text generators
//! - Reducing katakana readings to vowels and counting mora

pub mod aozora;
pub mod config;
pub mod error;
pub mod kana;
pub mod normalize;
pub mod utils;

// Re-export commonly used types
pub use aozora::{AozoraLoader, CardCache, Fetch, HttpFetcher, WorkId, load_aozorabunko};
pub use config::Config;
pub use error::{ConfigError, LoaderError};
pub use normalize::{TextMode, normalize};
pub use utils::split_sentences;
