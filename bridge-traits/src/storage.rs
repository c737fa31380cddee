//! Settings storage abstraction.
//!
//! The playback core only ever reads preferences; the host owns the
//! preference screens that write them.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences storage:
/// - Android: SharedPreferences / DataStore
/// - iOS: UserDefaults
/// - Desktop: config files
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn readahead_enabled(store: &dyn SettingsStore) -> Result<bool> {
///     Ok(store.get_bool("enable_readahead").await?.unwrap_or(false))
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Retrieve an integer value
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool>;
}
