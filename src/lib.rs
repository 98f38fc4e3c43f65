#![doc = include_str!("../README.md")]

pub mod app_password;
pub mod correlate;
pub mod error;
pub mod fence;
pub mod gateway;
pub mod middleware;
pub mod store;
pub mod token;
pub mod types;

// Re-exports for convenient access
pub use app_password::{AppPassword, is_valid_app_password};
pub use correlate::{
    CorrelationResult, CorrelationSummary, MAX_BLOCK_PAGES, all_blocked, blocked_local_parts,
    correlate, existing,
};
pub use error::Error;
pub use fence::RestartFence;
pub use gateway::{
    AccountGateway, BLOCKS_PAGE_SIZE, BlockedAccount, BlockedPage, BlueskyConfig, BlueskyGateway,
};
#[cfg(feature = "redis")]
pub use store::RedisSessionStore;
pub use store::{MemorySessionStore, SessionRecord, SessionStore, StoreError};
pub use token::{Clock, TokenPair, TokenService};
pub use types::{Handle, SessionId};
