use std::io;
use std::io::{BufRead, StdinLock, Stdout, Write};

use crate::error::DecisionError;
use crate::post::Post;
use crate::sync::plan::Action;

/// What to do with a post that only exists in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingChoice {
    Delete,
    Redownload,
    Skip,
}

/// Which side wins when both sides have the slug with different content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    KeepLocal,
    KeepRemote,
    Skip,
}

/// Answers the questions a sync run asks. Calls block until answered.
pub trait Decider {
    fn confirm_create(&mut self, post: &Post) -> Result<bool, DecisionError>;

    fn resolve_missing(&mut self, post: &Post) -> Result<MissingChoice, DecisionError>;

    fn resolve_conflict(&mut self, local: &Post, remote: &Post) -> Result<ConflictChoice, DecisionError>;
}

/// Asks yes/no questions on a terminal, or any reader/writer pair.
pub struct ConsoleDecider<R, W> {
    input: R,
    output: W,
}

impl ConsoleDecider<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        ConsoleDecider::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleDecider<R, W> {
    pub fn new(input: R, output: W) -> Self {
        ConsoleDecider { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, question: &str) -> Result<bool, DecisionError> {
        loop {
            write!(self.output, "{} [y/n] ", question)?;
            self.output.flush()?;

            let mut answer = String::new();
            if self.input.read_line(&mut answer)? == 0 {
                return Err(DecisionError::Aborted);
            }

            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Decider for ConsoleDecider<R, W> {
    fn confirm_create(&mut self, post: &Post) -> Result<bool, DecisionError> {
        self.ask(&format!("Upload new post: \"{}\" ?", post.title))
    }

    fn resolve_missing(&mut self, post: &Post) -> Result<MissingChoice, DecisionError> {
        if self.ask(&format!("Remove post from database: \"{}\" ?", post.title))? {
            return Ok(MissingChoice::Delete);
        }
        if self.ask(&format!("Redownload post from database: \"{}\" ?", post.title))? {
            return Ok(MissingChoice::Redownload);
        }
        Ok(MissingChoice::Skip)
    }

    fn resolve_conflict(&mut self, local: &Post, remote: &Post) -> Result<ConflictChoice, DecisionError> {
        writeln!(self.output, "Post \"{}\" differs from the database version (local {}, database {})",
                 local.title, short_hash(&local.hash), short_hash(&remote.hash))?;
        if self.ask("Upload the local version?")? {
            return Ok(ConflictChoice::KeepLocal);
        }
        if self.ask("Replace the local file with the database version?")? {
            return Ok(ConflictChoice::KeepRemote);
        }
        Ok(ConflictChoice::Skip)
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..10).unwrap_or(hash)
}

/// Fixed answers, for batch runs and tests. Every question is recorded.
#[derive(Debug, Clone)]
pub struct ScriptedDecider {
    pub create: bool,
    pub missing: MissingChoice,
    pub conflict: ConflictChoice,
    pub asked: Vec<(Action, String)>,
}

impl ScriptedDecider {
    pub fn new(create: bool, missing: MissingChoice, conflict: ConflictChoice) -> Self {
        ScriptedDecider {
            create,
            missing,
            conflict,
            asked: vec![],
        }
    }

    /// Says no to everything, which makes a run report-only.
    pub fn decline_all() -> Self {
        Self::new(false, MissingChoice::Skip, ConflictChoice::Skip)
    }

    /// Uploads new posts and deletes the ones gone from disk. Conflicts are skipped.
    pub fn approve_all() -> Self {
        Self::new(true, MissingChoice::Delete, ConflictChoice::Skip)
    }
}

impl Decider for ScriptedDecider {
    fn confirm_create(&mut self, post: &Post) -> Result<bool, DecisionError> {
        self.asked.push((Action::Create, post.slug.clone()));
        Ok(self.create)
    }

    fn resolve_missing(&mut self, post: &Post) -> Result<MissingChoice, DecisionError> {
        self.asked.push((Action::Delete, post.slug.clone()));
        Ok(self.missing)
    }

    fn resolve_conflict(&mut self, local: &Post, _remote: &Post) -> Result<ConflictChoice, DecisionError> {
        self.asked.push((Action::Conflict, local.slug.clone()));
        Ok(self.conflict)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::post::ParserConfig;

    use super::*;

    fn post(title: &str) -> Post {
        let raw = format!("title: {}\ndate: 2024-01-01\n\nbody\n", title);
        Post::parse(raw.into_bytes(), None, &ParserConfig::default()).unwrap()
    }

    fn console(answers: &str) -> ConsoleDecider<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleDecider::new(Cursor::new(answers.as_bytes().to_vec()), vec![])
    }

    #[test]
    fn test_confirm_create() {
        let mut decider = console("y\n");
        assert!(decider.confirm_create(&post("Hello World")).unwrap());
        let out = String::from_utf8(decider.into_output()).unwrap();
        assert_eq!(out, "Upload new post: \"Hello World\" ? [y/n] ");

        let mut decider = console(" NO \n");
        assert!(!decider.confirm_create(&post("Hello World")).unwrap());
    }

    #[test]
    fn test_reasks_on_garbage() {
        let mut decider = console("maybe\nyes\n");
        assert!(decider.confirm_create(&post("Hello")).unwrap());
        let out = String::from_utf8(decider.into_output()).unwrap();
        assert!(out.contains("Please answer y or n."));
        assert_eq!(out.matches("Upload new post").count(), 2);
    }

    #[test]
    fn test_eof_aborts() {
        let mut decider = console("");
        assert!(matches!(decider.confirm_create(&post("Hello")), Err(DecisionError::Aborted)));

        let mut decider = console("what\n");
        assert!(matches!(decider.confirm_create(&post("Hello")), Err(DecisionError::Aborted)));
    }

    #[test]
    fn test_resolve_missing() {
        let old = post("Old Post");
        assert_eq!(console("y\n").resolve_missing(&old).unwrap(), MissingChoice::Delete);
        assert_eq!(console("n\ny\n").resolve_missing(&old).unwrap(), MissingChoice::Redownload);
        assert_eq!(console("n\nn\n").resolve_missing(&old).unwrap(), MissingChoice::Skip);

        let mut decider = console("n\ny\n");
        decider.resolve_missing(&old).unwrap();
        let out = String::from_utf8(decider.into_output()).unwrap();
        assert!(out.contains("Remove post from database: \"Old Post\" ?"));
        assert!(out.contains("Redownload post from database: \"Old Post\" ?"));
    }

    #[test]
    fn test_resolve_conflict() {
        let local = post("Edited");
        let remote = post("Edited");
        assert_eq!(console("y\n").resolve_conflict(&local, &remote).unwrap(), ConflictChoice::KeepLocal);
        assert_eq!(console("n\ny\n").resolve_conflict(&local, &remote).unwrap(), ConflictChoice::KeepRemote);
        assert_eq!(console("n\nn\n").resolve_conflict(&local, &remote).unwrap(), ConflictChoice::Skip);
    }

    #[test]
    fn test_short_hash() {
        let hash = "f".repeat(64);
        assert_eq!(short_hash(&hash), "ffffffffff");
        assert_eq!(short_hash("abc"), "abc");
        // byte 10 falls inside a two byte char
        assert_eq!(short_hash("aéééééé"), "aéééééé");
    }

    #[test]
    fn test_scripted_records_questions() {
        let mut decider = ScriptedDecider::decline_all();
        assert!(!decider.confirm_create(&post("New")).unwrap());
        assert_eq!(decider.resolve_missing(&post("Gone")).unwrap(), MissingChoice::Skip);
        assert_eq!(decider.asked, vec![
            (Action::Create, "new".to_string()),
            (Action::Delete, "gone".to_string()),
        ]);
    }
}
