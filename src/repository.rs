use std::fmt::Display;

use crate::{
    clock::Clock,
    commit::{Commit, CommitFactory},
    error::{Error, InvalidArgument},
};

mod synchronize;

/// A named, linear history of [`Commit`]s, most recent first.
///
/// Commits live in an arena owned by the repository. Each one points at
/// its predecessor by index, and `head` indexes the most recent commit.
/// Slots of dropped commits are emptied and handed out again by the next
/// [`Repository::commit`]; [`Repository::synchronize`] compacts the arena.
#[derive(Debug, Clone)]
pub struct Repository {
    name: String,
    commits: Vec<Option<Commit>>,
    vacant: Vec<usize>,
    head: Option<usize>,
}

/// Walks a [`Repository`] from its head through the predecessor links.
pub struct Commits<'a> {
    slots: &'a [Option<Commit>],
    next: Option<usize>,
}

impl<'a> Iterator for Commits<'a> {
    type Item = &'a Commit;

    fn next(&mut self) -> Option<Self::Item> {
        let commit = self.slots.get(self.next?)?.as_ref()?;
        self.next = commit.predecessor;
        Some(commit)
    }
}

impl Repository {
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidArgument::EmptyName.into());
        }
        log::debug!("created repository {}", name);
        Ok(Self {
            name,
            commits: Vec::new(),
            vacant: Vec::new(),
            head: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head(&self) -> Option<&Commit> {
        self.commits().next()
    }

    pub fn current_head_id(&self) -> Option<&str> {
        self.head().map(Commit::id)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn commits(&self) -> Commits<'_> {
        Commits {
            slots: &self.commits,
            next: self.head,
        }
    }

    /// Number of commits reachable from the head.
    pub fn size(&self) -> usize {
        self.commits().count()
    }

    pub fn get(&self, id: &str) -> Option<&Commit> {
        self.commits().find(|commit| commit.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// A one line summary naming the repository and its head commit.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// The `n` most recent commits, newest first. Asking for more commits
    /// than exist yields all of them.
    pub fn recent(&self, n: i64) -> Result<std::iter::Take<Commits<'_>>, Error> {
        if n <= 0 {
            return Err(InvalidArgument::NonPositiveCount(n).into());
        }
        Ok(self.commits().take(usize::try_from(n).unwrap_or(usize::MAX)))
    }

    /// The descriptions of the `n` most recent commits, one per line.
    pub fn history(&self, n: i64) -> Result<String, Error> {
        Ok(self
            .recent(n)?
            .map(Commit::to_string)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Records a new commit on top of the current head and returns its id.
    pub fn commit<C: Clock>(
        &mut self,
        factory: &mut CommitFactory<C>,
        message: impl Into<String>,
    ) -> String {
        let commit = factory.create(message.into(), self.head);
        let id = commit.id().to_owned();
        log::debug!("committing {} to {}", id, self.name);
        let index = match self.vacant.pop() {
            Some(index) => {
                self.commits[index] = Some(commit);
                index
            }
            None => {
                self.commits.push(Some(commit));
                self.commits.len() - 1
            }
        };
        self.head = Some(index);
        id
    }

    /// Removes the commit with the given id, linking its successor straight
    /// to its predecessor. Returns whether anything was removed.
    pub fn drop(&mut self, id: &str) -> bool {
        let mut successor: Option<usize> = None;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let (found, predecessor) = match &self.commits[index] {
                Some(commit) => (commit.id() == id, commit.predecessor),
                None => break,
            };
            if found {
                self.commits[index] = None;
                self.vacant.push(index);
                match successor.and_then(|s| self.commits[s].as_mut()) {
                    Some(commit) => commit.predecessor = predecessor,
                    None => self.head = predecessor,
                }
                if self.head.is_none() {
                    self.commits.clear();
                    self.vacant.clear();
                }
                log::debug!("dropped {} from {}", id, self.name);
                return true;
            }
            successor = Some(index);
            cursor = predecessor;
        }
        log::debug!("{} not found in {}", id, self.name);
        false
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.head() {
            None => write!(f, "{} - No commits", self.name),
            Some(head) => write!(f, "{} - Current head: {}", self.name, head),
        }
    }
}

#[cfg(test)]
fn test_factory() -> CommitFactory<crate::clock::manual::ManualClock> {
    CommitFactory::with_clock(crate::clock::manual::ManualClock::ticking())
}

#[test]
fn test_new_repository() {
    let repo = Repository::new("demo").unwrap();
    assert_eq!(repo.name(), "demo");
    assert_eq!(repo.size(), 0);
    assert_eq!(repo.current_head_id(), None);
    assert_eq!(repo.describe(), "demo - No commits");
}

#[test]
fn test_empty_name_is_rejected() {
    let err = Repository::new("").unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(err, Error::InvalidArgument(InvalidArgument::EmptyName));
}

#[test]
fn test_commits_in_sequence() {
    let mut factory = test_factory();
    let mut repo = Repository::new("demo").unwrap();
    for i in 0..5 {
        let id = repo.commit(&mut factory, format!("change {}", i));
        assert_eq!(repo.size(), i + 1);
        assert_eq!(repo.current_head_id(), Some(id.as_str()));
    }
    assert_eq!(repo.current_head_id(), Some("4"));
    assert!(repo.contains("0"));
    assert!(!repo.contains("5"));
    assert_eq!(
        repo.describe(),
        "demo - Current head: 4 at 1970-01-01 at 00:00:04 UTC: change 4"
    );
}

#[test]
fn test_ids_are_unique_across_repositories() {
    let mut factory = test_factory();
    let mut a = Repository::new("a").unwrap();
    let mut b = Repository::new("b").unwrap();
    let first = a.commit(&mut factory, "one");
    let second = b.commit(&mut factory, "two");
    assert_ne!(first, second);
    assert!(!a.contains(&second));
    assert!(!b.contains(&first));
}

#[test]
fn test_history() {
    let mut factory = test_factory();
    let mut repo = Repository::new("demo").unwrap();
    repo.commit(&mut factory, "first");
    repo.commit(&mut factory, "second");
    repo.commit(&mut factory, "");

    assert_eq!(
        repo.history(2).unwrap(),
        "2 at 1970-01-01 at 00:00:02 UTC: \n1 at 1970-01-01 at 00:00:01 UTC: second"
    );
    assert_eq!(repo.history(1).unwrap().lines().count(), 1);

    let everything = repo.history(100).unwrap();
    assert_eq!(everything.lines().count(), 3);
    assert!(!everything.ends_with('\n'));

    let mut extracted = Vec::new();
    while let Some(head) = repo.head() {
        extracted.push(head.to_string());
        let id = head.id().to_owned();
        assert!(repo.drop(&id));
    }
    assert_eq!(everything, extracted.join("\n"));
}

#[test]
fn test_history_of_empty_repository() {
    let repo = Repository::new("demo").unwrap();
    assert_eq!(repo.history(3).unwrap(), "");
}

#[test]
fn test_history_rejects_non_positive_counts() {
    let mut factory = test_factory();
    let mut repo = Repository::new("demo").unwrap();
    repo.commit(&mut factory, "first");
    assert_eq!(
        repo.history(-1),
        Err(Error::InvalidArgument(InvalidArgument::NonPositiveCount(-1)))
    );
    assert!(repo.history(0).unwrap_err().is_invalid_argument());
}

#[test]
fn test_drop_head() {
    let mut factory = test_factory();
    let mut repo = Repository::new("demo").unwrap();
    let first = repo.commit(&mut factory, "first");
    let second = repo.commit(&mut factory, "second");
    assert!(repo.drop(&second));
    assert_eq!(repo.current_head_id(), Some(first.as_str()));
    assert_eq!(repo.size(), 1);
    assert!(repo.drop(&first));
    assert!(repo.is_empty());
    assert_eq!(repo.describe(), "demo - No commits");
}

#[test]
fn test_drop_middle_and_tail() {
    let mut factory = test_factory();
    let mut repo = Repository::new("demo").unwrap();
    let first = repo.commit(&mut factory, "first");
    let second = repo.commit(&mut factory, "second");
    let third = repo.commit(&mut factory, "third");

    assert!(repo.drop(&second));
    assert_eq!(repo.current_head_id(), Some(third.as_str()));
    let ids: Vec<&str> = repo.commits().map(Commit::id).collect();
    assert_eq!(ids, vec![third.as_str(), first.as_str()]);

    assert!(repo.drop(&first));
    assert_eq!(repo.current_head_id(), Some(third.as_str()));
    assert_eq!(repo.size(), 1);
    assert!(!repo.contains(&first));
}

#[test]
fn test_drop_missing_changes_nothing() {
    let mut factory = test_factory();
    let mut empty = Repository::new("empty").unwrap();
    assert!(!empty.drop("0"));

    let mut repo = Repository::new("demo").unwrap();
    repo.commit(&mut factory, "first");
    repo.commit(&mut factory, "second");
    let describe = repo.describe();
    let history = repo.history(10).unwrap();

    assert!(!repo.drop("42"));
    assert!(!repo.drop(""));
    assert_eq!(repo.describe(), describe);
    assert_eq!(repo.size(), 2);
    assert_eq!(repo.history(10).unwrap(), history);
}

#[test]
fn test_commit_then_drop_round_trip() {
    let mut factory = test_factory();
    let mut repo = Repository::new("demo").unwrap();
    repo.commit(&mut factory, "first");
    let head = repo.current_head_id().map(str::to_owned);
    let size = repo.size();

    let id = repo.commit(&mut factory, "temporary");
    assert!(repo.drop(&id));
    assert_eq!(repo.size(), size);
    assert_eq!(repo.current_head_id().map(str::to_owned), head);

    // The next commit takes over the emptied slot.
    let next = repo.commit(&mut factory, "next");
    assert_eq!(repo.size(), size + 1);
    assert_eq!(repo.current_head_id(), Some(next.as_str()));
}

#[test]
fn test_commit_drop_loop_reuses_slots() {
    let mut factory = test_factory();
    let mut repo = Repository::new("demo").unwrap();
    let base = repo.commit(&mut factory, "base");
    for i in 0..10_000 {
        let id = repo.commit(&mut factory, format!("scratch {}", i));
        assert!(repo.drop(&id));
    }
    assert_eq!(repo.size(), 1);
    assert_eq!(repo.current_head_id(), Some(base.as_str()));
    assert_eq!(repo.commits.len(), 2);

    assert!(repo.drop(&base));
    assert!(repo.commits.is_empty());
}

#[test]
fn test_commit_fills_vacant_slot() {
    let mut factory = test_factory();
    let mut repo = Repository::new("demo").unwrap();
    let first = repo.commit(&mut factory, "first");
    let second = repo.commit(&mut factory, "second");
    let third = repo.commit(&mut factory, "third");
    assert!(repo.drop(&second));

    let fourth = repo.commit(&mut factory, "fourth");
    assert_eq!(repo.commits.len(), 3);
    let ids: Vec<&str> = repo.commits().map(Commit::id).collect();
    assert_eq!(ids, vec![fourth.as_str(), third.as_str(), first.as_str()]);
    assert_eq!(repo.history(2).unwrap().lines().count(), 2);
}
