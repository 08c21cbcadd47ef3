use std::collections::HashMap;

use crate::error::StoreError;
use crate::post::Post;
use crate::store::PostStore;

/// In-process store, same contract as [`crate::store::SqliteStore`].
#[derive(Default)]
pub struct MemoryStore {
    posts: Vec<Post>,
    raw: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `posts`, raw payloads included.
    pub fn with_posts(posts: impl IntoIterator<Item = Post>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for post in posts {
            store.insert(&post)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn raw_count(&self) -> usize {
        self.raw.len()
    }

    pub fn has_raw(&self, hash: &str) -> bool {
        self.raw.contains_key(hash)
    }

    fn metadata(post: &Post) -> Post {
        Post {
            raw: vec![],
            source: None,
            ..post.clone()
        }
    }

    fn position(&self, hash: &str) -> Result<usize, StoreError> {
        self.posts.iter()
            .position(|p| p.hash == hash)
            .ok_or_else(|| StoreError::NotFound(hash.to_string()))
    }
}

impl PostStore for MemoryStore {
    fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.iter().find(|p| p.slug == slug).cloned())
    }

    fn list_all(&self) -> Result<Vec<Post>, StoreError> {
        let mut posts = self.posts.clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.slug.cmp(&b.slug)));
        Ok(posts)
    }

    fn insert(&mut self, post: &Post) -> Result<(), StoreError> {
        if self.posts.iter().any(|p| p.slug == post.slug) {
            return Err(StoreError::SlugTaken(post.slug.clone()));
        }
        self.raw.insert(post.hash.clone(), post.raw.clone());
        self.posts.push(Self::metadata(post));
        Ok(())
    }

    fn remove(&mut self, hash: &str) -> Result<(), StoreError> {
        let idx = self.position(hash)?;
        self.posts.remove(idx);
        self.raw.remove(hash);
        Ok(())
    }

    fn replace(&mut self, old_hash: &str, post: &Post) -> Result<(), StoreError> {
        let idx = self.position(old_hash)?;
        let taken = self.posts.iter()
            .enumerate()
            .any(|(i, p)| i != idx && p.slug == post.slug);
        if taken {
            return Err(StoreError::SlugTaken(post.slug.clone()));
        }
        self.raw.remove(old_hash);
        self.raw.insert(post.hash.clone(), post.raw.clone());
        self.posts[idx] = Self::metadata(post);
        Ok(())
    }

    fn fetch_raw(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
        self.raw.get(hash)
            .cloned()
            .ok_or_else(|| StoreError::MissingRaw(hash.to_string()))
    }
}
