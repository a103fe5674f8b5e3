//! `ChatStore` trait definition.
//!
//! Persistence port for chat records. Implementations live in
//! `chatloom-infra` (e.g. `SqliteChatStore`). Uses native async fn in
//! traits (RPITIT, Rust 2024 edition).
//!
//! The store must be safe for concurrent use: every session actor saves its
//! own record once per loop iteration, so saves for different chats overlap
//! freely while saves for one chat stay serialized by its actor.

use chatloom_types::chat::{ChatId, ChatRecord};
use chatloom_types::error::StorageError;

/// Storage port for chat session records.
pub trait ChatStore: Send + Sync {
    /// Prepare the store and return the `ChatId` of every existing chat.
    fn init(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ChatId>, StorageError>> + Send;

    /// Whether a record for this chat exists.
    fn exists(
        &self,
        record: &ChatRecord,
    ) -> impl std::future::Future<Output = Result<bool, StorageError>> + Send;

    /// Insert a new record. Sets `record.primary_id` on success.
    fn insert(
        &self,
        record: &mut ChatRecord,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Update an existing record.
    fn update(
        &self,
        record: &ChatRecord,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Upsert: update if the chat exists, insert otherwise.
    ///
    /// Called by every session actor after each loop iteration.
    fn save(
        &self,
        record: &mut ChatRecord,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Delete the record for this chat.
    fn delete(
        &self,
        record: &ChatRecord,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Look up a chat by storage primary key.
    fn chat_by_primary_id(
        &self,
        primary_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<ChatRecord>, StorageError>> + Send;

    /// Look up a chat by its `ChatId`.
    fn chat_by_chat_id(
        &self,
        chat_id: ChatId,
    ) -> impl std::future::Future<Output = Result<Option<ChatRecord>, StorageError>> + Send;

    /// All chats whose serialized params contain `fragment` as a substring.
    fn chats_by_param(
        &self,
        fragment: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ChatRecord>, StorageError>> + Send;
}
