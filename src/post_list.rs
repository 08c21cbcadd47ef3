use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use spdlog::debug;

use crate::error::ParseError;
use crate::post::{ParserConfig, Post};

/// Markdown posts living directly inside `root_dir`. Sub-directories are not visited.
pub struct PostList {
    pub root_dir: PathBuf,
}

impl PostList {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        PostList { root_dir: root_dir.into() }
    }

    /// `*.md` files, sorted by path so every run sees the same order.
    pub fn retrieve_files(&self) -> Result<Vec<PathBuf>, ParseError> {
        let io_err = |source| ParseError::Io { path: self.root_dir.clone(), source };

        let mut posts = vec![];
        for entry in fs::read_dir(&self.root_dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            // follows symlinks, a linked post is still a post
            if !path.is_file() {
                continue;
            }
            if path.extension().is_some_and(|ext| ext == "md") {
                posts.push(path);
            }
        }
        posts.sort();
        Ok(posts)
    }

    /// Parses every post. The first failure aborts the whole load.
    pub fn load(&self, config: &ParserConfig) -> Result<Vec<Post>, ParseError> {
        let mut posts = vec![];
        let mut slugs: HashMap<String, PathBuf> = HashMap::new();

        for file in self.retrieve_files()? {
            let post = open_post(&file, config)?;
            debug!("Loaded {} from {}", post.slug, file.display());

            if let Some(first) = slugs.get(&post.slug) {
                return Err(ParseError::DuplicateSlug {
                    slug: post.slug.clone(),
                    first: first.clone(),
                    second: file,
                });
            }
            slugs.insert(post.slug.clone(), file);
            posts.push(post);
        }

        Ok(posts)
    }
}

pub fn open_post(file: &Path, config: &ParserConfig) -> Result<Post, ParseError> {
    let raw = fs::read(file).map_err(|source| ParseError::Io { path: file.to_path_buf(), source })?;
    Post::parse(raw, Some(file.to_path_buf()), config).map_err(|e| e.in_file(file))
}

pub fn load_posts(dir: &Path, config: &ParserConfig) -> Result<Vec<Post>, ParseError> {
    PostList::new(dir).load(config)
}
