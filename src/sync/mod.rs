//! Reconciles a directory of posts with a [`PostStore`].
//!
//! A run lists the store once, classifies every slug (see [`plan::classify`]),
//! then walks the local posts followed by the posts only the store has, asking
//! the [`Decider`] before each mutation. The first failing store call, prompt or
//! file write ends the run.

use std::fmt;
use std::fmt::{Display, Formatter};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use spdlog::{debug, info, warn};

use crate::error::{io_err, SyncError};
use crate::post::Post;
use crate::store::PostStore;

pub mod decision;
pub mod plan;

pub use decision::{ConflictChoice, ConsoleDecider, Decider, MissingChoice, ScriptedDecider};
pub use plan::{classify, Action, Classification};

/// What to do when local and remote disagree on the content of a slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Surface the conflict, touch nothing
    #[default]
    Report,
    /// Let the decider pick a side
    Ask,
    PreferLocal,
    PreferRemote,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "report" => Ok(ConflictPolicy::Report),
            "ask" => Ok(ConflictPolicy::Ask),
            "prefer-local" => Ok(ConflictPolicy::PreferLocal),
            "prefer-remote" => Ok(ConflictPolicy::PreferRemote),
            _ => Err(format!("Unknown conflict policy {}. Use report, ask, prefer-local or prefer-remote", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    KeptLocal,
    KeptRemote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub slug: String,
    pub local_hash: String,
    pub remote_hash: String,
    /// `None` while the conflict is still open
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Classification of every slug, in processing order
    pub plan: Vec<(String, Action)>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub redownloaded: Vec<PathBuf>,
    pub conflicts: Vec<Conflict>,
    pub unchanged: Vec<String>,
    /// Proposals the decider declined
    pub skipped: Vec<String>,
}

impl SyncReport {
    pub fn open_conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| c.resolution.is_none())
    }
}

impl Display for SyncReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} created, {} deleted, {} redownloaded, {} unchanged, {} skipped, {} conflicts ({} open)",
               self.created.len(),
               self.deleted.len(),
               self.redownloaded.len(),
               self.unchanged.len(),
               self.skipped.len(),
               self.conflicts.len(),
               self.open_conflicts().count(),
        )
    }
}

pub struct Reconciler<'a, S, D> {
    store: &'a mut S,
    decider: &'a mut D,
    local_dir: PathBuf,
    policy: ConflictPolicy,
}

impl<'a, S: PostStore, D: Decider> Reconciler<'a, S, D> {
    pub fn new(store: &'a mut S, decider: &'a mut D, local_dir: impl Into<PathBuf>, policy: ConflictPolicy) -> Self {
        Reconciler {
            store,
            decider,
            local_dir: local_dir.into(),
            policy,
        }
    }

    /// Syncs `local` against the full listing of the store.
    pub fn run(&mut self, local: &[Post]) -> Result<SyncReport, SyncError> {
        let remote = self.store.list_all()?;
        info!("Syncing {} local posts with {} stored posts", local.len(), remote.len());
        self.reconcile(local, &remote)
    }

    pub fn reconcile(&mut self, local: &[Post], remote: &[Post]) -> Result<SyncReport, SyncError> {
        let plan = classify(local, remote);

        let mut report = SyncReport {
            plan: plan.iter().map(|c| (c.slug().to_string(), c.action())).collect(),
            ..Default::default()
        };

        for step in plan {
            debug!("{}: {}", step.slug(), step.action());
            match step {
                Classification::Create(post) => self.create(post, &mut report)?,
                Classification::Conflict { local, remote } => self.conflict(local, remote, &mut report)?,
                Classification::Unchanged(post) => report.unchanged.push(post.slug.clone()),
                Classification::Delete(post) => self.missing(post, &mut report)?,
            }
        }

        Ok(report)
    }

    fn create(&mut self, post: &Post, report: &mut SyncReport) -> Result<(), SyncError> {
        if !self.decider.confirm_create(post)? {
            report.skipped.push(post.slug.clone());
            return Ok(());
        }

        self.store.insert(post)?;
        info!("Uploaded {} ({})", post.slug, post.hash);
        report.created.push(post.slug.clone());
        Ok(())
    }

    fn missing(&mut self, post: &Post, report: &mut SyncReport) -> Result<(), SyncError> {
        match self.decider.resolve_missing(post)? {
            MissingChoice::Delete => {
                self.store.remove(&post.hash)?;
                info!("Removed {} ({}) from the store", post.slug, post.hash);
                report.deleted.push(post.slug.clone());
            }
            MissingChoice::Redownload => {
                let raw = self.store.fetch_raw(&post.hash)?;
                let path = self.local_dir.join(format!("{}.md", post.slug));
                write_new_file(&path, &raw)?;
                info!("Redownloaded {} to {}", post.slug, path.display());
                report.redownloaded.push(path);
            }
            MissingChoice::Skip => report.skipped.push(post.slug.clone()),
        }
        Ok(())
    }

    fn conflict(&mut self, local: &Post, remote: &Post, report: &mut SyncReport) -> Result<(), SyncError> {
        warn!("Conflict on {}: local {} but stored {}", local.slug, local.hash, remote.hash);

        let choice = match self.policy {
            ConflictPolicy::Report => ConflictChoice::Skip,
            ConflictPolicy::Ask => self.decider.resolve_conflict(local, remote)?,
            ConflictPolicy::PreferLocal => ConflictChoice::KeepLocal,
            ConflictPolicy::PreferRemote => ConflictChoice::KeepRemote,
        };

        let resolution = match choice {
            ConflictChoice::KeepLocal => {
                self.store.replace(&remote.hash, local)?;
                info!("Replaced stored {} with the local version", local.slug);
                Some(Resolution::KeptLocal)
            }
            ConflictChoice::KeepRemote => {
                let raw = self.store.fetch_raw(&remote.hash)?;
                let path = local.source.clone()
                    .unwrap_or_else(|| self.local_dir.join(format!("{}.md", local.slug)));
                std::fs::write(&path, &raw).map_err(|e| io_err(&path, e))?;
                info!("Replaced {} with the stored version", path.display());
                Some(Resolution::KeptRemote)
            }
            ConflictChoice::Skip => None,
        };

        report.conflicts.push(Conflict {
            slug: local.slug.clone(),
            local_hash: local.hash.clone(),
            remote_hash: remote.hash.clone(),
            resolution,
        });
        Ok(())
    }
}

/// Never overwrites: a file with that name may hold a different post.
fn write_new_file(path: &Path, content: &[u8]) -> Result<(), SyncError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    file.write_all(content).map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::error::{DecisionError, StoreError};
    use crate::post::ParserConfig;
    use crate::store::MemoryStore;

    use super::*;

    fn post(title: &str, body: &str) -> Post {
        let raw = format!("title: {}\ndate: 2024-01-01\n\n{}\n", title, body);
        Post::parse(raw.into_bytes(), None, &ParserConfig::default()).unwrap()
    }

    /// Store whose writes always fail.
    struct BrokenStore(MemoryStore);

    impl PostStore for BrokenStore {
        fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
            self.0.find_by_slug(slug)
        }
        fn list_all(&self) -> Result<Vec<Post>, StoreError> {
            self.0.list_all()
        }
        fn insert(&mut self, post: &Post) -> Result<(), StoreError> {
            Err(StoreError::Corrupt(format!("cannot insert {}", post.slug)))
        }
        fn remove(&mut self, hash: &str) -> Result<(), StoreError> {
            Err(StoreError::NotFound(hash.to_string()))
        }
        fn replace(&mut self, old_hash: &str, _post: &Post) -> Result<(), StoreError> {
            Err(StoreError::NotFound(old_hash.to_string()))
        }
        fn fetch_raw(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
            self.0.fetch_raw(hash)
        }
    }

    /// Approves `answers` questions, then behaves like closed input.
    struct AbortingDecider {
        answers: usize,
        asked: Vec<String>,
    }

    impl AbortingDecider {
        fn answer(&mut self, post: &Post) -> Result<(), DecisionError> {
            self.asked.push(post.slug.clone());
            if self.answers == 0 {
                return Err(DecisionError::Aborted);
            }
            self.answers -= 1;
            Ok(())
        }
    }

    impl Decider for AbortingDecider {
        fn confirm_create(&mut self, post: &Post) -> Result<bool, DecisionError> {
            self.answer(post).map(|_| true)
        }
        fn resolve_missing(&mut self, post: &Post) -> Result<MissingChoice, DecisionError> {
            self.answer(post).map(|_| MissingChoice::Delete)
        }
        fn resolve_conflict(&mut self, local: &Post, _remote: &Post) -> Result<ConflictChoice, DecisionError> {
            self.answer(local).map(|_| ConflictChoice::KeepLocal)
        }
    }

    #[test]
    fn test_conflict_policy_from_str() {
        assert_eq!("report".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Report);
        assert_eq!("prefer-remote".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::PreferRemote);
        assert!("last-write-wins".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn test_declined_run_only_reports() {
        let tmp = TempDir::new().unwrap();
        let local = vec![post("New", "n"), post("Edited", "mine")];
        let mut store = MemoryStore::with_posts([post("Edited", "theirs"), post("Gone", "g")]).unwrap();
        let mut decider = ScriptedDecider::decline_all();

        let report = Reconciler::new(&mut store, &mut decider, tmp.path(), ConflictPolicy::Ask)
            .run(&local)
            .unwrap();

        assert_eq!(report.skipped, ["new", "gone"]);
        assert_eq!(report.open_conflicts().count(), 1);
        assert!(report.created.is_empty() && report.deleted.is_empty());
        assert_eq!(store.len(), 2);
        assert_eq!(decider.asked, vec![
            (Action::Create, "new".to_string()),
            (Action::Conflict, "edited".to_string()),
            (Action::Delete, "gone".to_string()),
        ]);
    }

    #[test]
    fn test_report_policy_does_not_ask() {
        let tmp = TempDir::new().unwrap();
        let local = vec![post("Edited", "mine")];
        let mut store = MemoryStore::with_posts([post("Edited", "theirs")]).unwrap();
        let mut decider = ScriptedDecider::new(true, MissingChoice::Delete, ConflictChoice::KeepLocal);

        let report = Reconciler::new(&mut store, &mut decider, tmp.path(), ConflictPolicy::Report)
            .run(&local)
            .unwrap();

        assert!(decider.asked.is_empty());
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].resolution, None);
        assert_eq!(store.find_by_slug("edited").unwrap().unwrap().hash, post("Edited", "theirs").hash);
    }

    #[test]
    fn test_prefer_local_replaces_store() {
        let tmp = TempDir::new().unwrap();
        let mine = post("Edited", "mine");
        let mut store = MemoryStore::with_posts([post("Edited", "theirs")]).unwrap();
        let mut decider = ScriptedDecider::decline_all();

        let report = Reconciler::new(&mut store, &mut decider, tmp.path(), ConflictPolicy::PreferLocal)
            .run(std::slice::from_ref(&mine))
            .unwrap();

        assert_eq!(report.conflicts[0].resolution, Some(Resolution::KeptLocal));
        assert_eq!(store.find_by_slug("edited").unwrap().unwrap().hash, mine.hash);
        assert_eq!(store.fetch_raw(&mine.hash).unwrap(), mine.raw);
        assert_eq!(store.raw_count(), 1);
    }

    #[test]
    fn test_prefer_remote_rewrites_source_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("my-edit.md");
        let mut mine = post("Edited", "mine");
        std::fs::write(&file, &mine.raw).unwrap();
        mine.source = Some(file.clone());
        let theirs = post("Edited", "theirs");
        let mut store = MemoryStore::with_posts([theirs.clone()]).unwrap();
        let mut decider = ScriptedDecider::decline_all();

        let report = Reconciler::new(&mut store, &mut decider, tmp.path(), ConflictPolicy::PreferRemote)
            .run(&[mine])
            .unwrap();

        assert_eq!(report.conflicts[0].resolution, Some(Resolution::KeptRemote));
        assert_eq!(std::fs::read(&file).unwrap(), theirs.raw);
        assert!(!tmp.path().join("edited.md").exists());
    }

    #[test]
    fn test_redownload_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("old-post.md"), "something else").unwrap();
        let mut store = MemoryStore::with_posts([post("Old Post", "old")]).unwrap();
        let mut decider = ScriptedDecider::new(false, MissingChoice::Redownload, ConflictChoice::Skip);

        let err = Reconciler::new(&mut store, &mut decider, tmp.path(), ConflictPolicy::Report)
            .run(&[])
            .unwrap_err();

        assert!(matches!(err, SyncError::Io { .. }));
        assert_eq!(std::fs::read_to_string(tmp.path().join("old-post.md")).unwrap(), "something else");
    }

    #[test]
    fn test_store_failure_aborts_run() {
        let tmp = TempDir::new().unwrap();
        let local = vec![post("First", "1"), post("Second", "2")];
        let mut store = BrokenStore(MemoryStore::new());
        let mut decider = ScriptedDecider::approve_all();

        let err = Reconciler::new(&mut store, &mut decider, tmp.path(), ConflictPolicy::Report)
            .run(&local)
            .unwrap_err();

        assert!(matches!(err, SyncError::Store(StoreError::Corrupt(_))));
        // the second post is never proposed
        assert_eq!(decider.asked, vec![(Action::Create, "first".to_string())]);
    }

    #[test]
    fn test_decider_failure_aborts_run() {
        let tmp = TempDir::new().unwrap();
        let local = vec![post("First", "1"), post("Second", "2"), post("Third", "3")];
        let mut store = MemoryStore::with_posts([post("Gone", "g")]).unwrap();
        let mut decider = AbortingDecider { answers: 1, asked: vec![] };

        let err = Reconciler::new(&mut store, &mut decider, tmp.path(), ConflictPolicy::Ask)
            .run(&local)
            .unwrap_err();

        assert!(matches!(err, SyncError::Decision(DecisionError::Aborted)));
        assert_eq!(decider.asked, ["first", "second"]);
        assert!(store.find_by_slug("first").unwrap().is_some());
        assert!(store.find_by_slug("second").unwrap().is_none());
        assert!(store.find_by_slug("third").unwrap().is_none());
        assert!(store.find_by_slug("gone").unwrap().is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_report_display() {
        let report = SyncReport {
            created: vec!["a".to_string()],
            conflicts: vec![Conflict {
                slug: "b".to_string(),
                local_hash: "1".to_string(),
                remote_hash: "2".to_string(),
                resolution: None,
            }],
            ..Default::default()
        };
        assert_eq!(report.to_string(), "1 created, 0 deleted, 0 redownloaded, 0 unchanged, 0 skipped, 1 conflicts (1 open)");
    }
}
