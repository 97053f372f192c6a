//! Common utilities and types shared across fitforum

pub mod config;
pub mod error;
pub mod utils;

pub use config::{ApiConfig, CacheConfig, Config, CounterPolicy, VoteConfig};
pub use error::{Error, Result};
pub use utils::{encode_segment, generate_mutation_id, parse_duration, timestamp_now_millis, validate_post_id};
