//! Remote side of a sync: post metadata plus the raw file each post was parsed from.
//!
//! Stores keep two collections, `posts` (metadata keyed by slug and hash) and
//! `raw` (original bytes keyed by hash). Every call is one blocking round trip.

use crate::error::StoreError;
use crate::post::Post;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub trait PostStore {
    /// Metadata of the post using `slug`. Returned posts carry no raw bytes.
    fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError>;

    /// Every stored post, newest first.
    fn list_all(&self) -> Result<Vec<Post>, StoreError>;

    /// The `limit` newest posts by creation date.
    fn list_recent(&self, limit: usize) -> Result<Vec<Post>, StoreError> {
        let mut posts = self.list_all()?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit);
        Ok(posts)
    }

    /// Stores the raw payload, then the metadata. Fails with
    /// [`StoreError::SlugTaken`] when another post already owns the slug.
    fn insert(&mut self, post: &Post) -> Result<(), StoreError>;

    /// Deletes metadata and raw payload of the post with `hash`.
    /// [`StoreError::NotFound`] when that version is no longer stored.
    fn remove(&mut self, hash: &str) -> Result<(), StoreError>;

    /// Swaps the post stored under `old_hash` for `post`, only if `old_hash`
    /// is still the stored version.
    fn replace(&mut self, old_hash: &str, post: &Post) -> Result<(), StoreError>;

    fn fetch_raw(&self, hash: &str) -> Result<Vec<u8>, StoreError>;
}
