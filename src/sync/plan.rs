use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::post::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Only on disk
    Create,
    /// Only in the store
    Delete,
    /// On both sides, different hashes
    Conflict,
    Unchanged,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Conflict => "conflict",
            Action::Unchanged => "unchanged",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification<'a> {
    Create(&'a Post),
    Conflict { local: &'a Post, remote: &'a Post },
    Unchanged(&'a Post),
    Delete(&'a Post),
}

impl<'a> Classification<'a> {
    pub fn slug(&self) -> &'a str {
        match *self {
            Classification::Create(post) | Classification::Unchanged(post) | Classification::Delete(post) => &post.slug,
            Classification::Conflict { local, .. } => &local.slug,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Classification::Create(_) => Action::Create,
            Classification::Conflict { .. } => Action::Conflict,
            Classification::Unchanged(_) => Action::Unchanged,
            Classification::Delete(_) => Action::Delete,
        }
    }
}

/// Sorts every slug of `local` and `remote` into exactly one [`Action`].
///
/// Local posts come first, in local order (the local to remote pass), followed
/// by the posts only found remotely, in remote order. The result only depends on
/// which side has a slug and, when both do, whether the hashes match.
pub fn classify<'a>(local: &'a [Post], remote: &'a [Post]) -> Vec<Classification<'a>> {
    let remote_index: HashMap<&str, &Post> = remote.iter()
        .map(|post| (post.slug.as_str(), post))
        .collect();

    let mut seen: HashSet<&str> = HashSet::with_capacity(local.len());
    let mut plan = Vec::with_capacity(local.len() + remote.len());

    for post in local {
        seen.insert(post.slug.as_str());
        let step = match remote_index.get(post.slug.as_str()).copied() {
            None => Classification::Create(post),
            Some(remote) if remote.hash != post.hash => Classification::Conflict { local: post, remote },
            Some(_) => Classification::Unchanged(post),
        };
        plan.push(step);
    }

    for post in remote {
        if !seen.contains(post.slug.as_str()) {
            plan.push(Classification::Delete(post));
        }
    }

    plan
}
