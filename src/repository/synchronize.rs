use crate::commit::Commit;

use super::Repository;

impl Repository {
    /// Moves every commit of `other` into this repository, leaving `other`
    /// empty.
    ///
    /// Both chains are already ordered newest first, so they are merged the
    /// way a merge sort merges two runs. A commit from `other` only goes
    /// ahead of one from `self` when its timestamp is strictly later, so
    /// ties keep this repository's commits in front. Neither chain is
    /// reordered internally.
    pub fn synchronize(&mut self, other: &mut Repository) {
        if other.is_empty() {
            other.commits.clear();
            other.vacant.clear();
            log::debug!("nothing to synchronize from {} into {}", other.name, self.name);
            return;
        }
        let theirs = other.take_chain();
        let ours = self.take_chain();
        log::info!(
            "synchronizing {} commits from {} into {} ({} commits)",
            theirs.len(),
            other.name,
            self.name,
            ours.len()
        );
        self.rebuild(interleave(ours, theirs));
    }

    /// Empties the repository, returning its reachable commits newest first.
    fn take_chain(&mut self) -> Vec<Commit> {
        let mut slots = std::mem::take(&mut self.commits);
        self.vacant.clear();
        let mut chain = Vec::new();
        let mut cursor = self.head.take();
        while let Some(index) = cursor {
            match slots.get_mut(index).and_then(Option::take) {
                Some(commit) => {
                    cursor = commit.predecessor;
                    chain.push(commit);
                }
                None => break,
            }
        }
        chain
    }

    /// Replaces the arena with `chain` (newest first), oldest commit in
    /// slot zero.
    fn rebuild(&mut self, chain: Vec<Commit>) {
        self.head = chain.len().checked_sub(1);
        self.commits = chain
            .into_iter()
            .rev()
            .enumerate()
            .map(|(index, mut commit)| {
                commit.predecessor = index.checked_sub(1);
                Some(commit)
            })
            .collect();
    }
}

fn interleave(ours: Vec<Commit>, theirs: Vec<Commit>) -> Vec<Commit> {
    let mut merged = Vec::with_capacity(ours.len() + theirs.len());
    let mut ours = ours.into_iter().peekable();
    let mut theirs = theirs.into_iter().peekable();
    loop {
        let take_theirs = match (ours.peek(), theirs.peek()) {
            (Some(mine), Some(other)) => other.timestamp() > mine.timestamp(),
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_theirs {
            theirs.next()
        } else {
            ours.next()
        };
        merged.extend(next);
    }
    merged
}

#[cfg(test)]
fn stepping_factory(
    step: chrono::Duration,
) -> crate::commit::CommitFactory<crate::clock::manual::ManualClock> {
    crate::commit::CommitFactory::with_clock(crate::clock::manual::ManualClock::new(
        chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
        step,
    ))
}

#[cfg(test)]
fn ids(repo: &Repository) -> Vec<&str> {
    repo.commits().map(Commit::id).collect()
}

#[cfg(test)]
fn assert_non_increasing(repo: &Repository) {
    let stamps: Vec<_> = repo.commits().map(Commit::timestamp).collect();
    assert!(stamps.windows(2).all(|pair| pair[0] >= pair[1]), "{:?}", stamps);
}

#[test]
fn test_synchronize_interleaves_by_time() {
    let mut factory = stepping_factory(chrono::Duration::seconds(1));
    let mut a = Repository::new("a").unwrap();
    let mut b = Repository::new("b").unwrap();
    let first = a.commit(&mut factory, "first");
    let alpha = b.commit(&mut factory, "alpha");
    let second = a.commit(&mut factory, "second");

    a.synchronize(&mut b);

    assert_eq!(b.size(), 0);
    assert_eq!(b.current_head_id(), None);
    assert_eq!(a.size(), 3);
    assert_eq!(ids(&a), vec![second.as_str(), alpha.as_str(), first.as_str()]);
    assert_non_increasing(&a);
}

#[test]
fn test_synchronize_other_newer_goes_first() {
    let mut factory = stepping_factory(chrono::Duration::seconds(1));
    let mut a = Repository::new("a").unwrap();
    let mut b = Repository::new("b").unwrap();
    a.commit(&mut factory, "old");
    b.commit(&mut factory, "new");
    b.commit(&mut factory, "newer");

    a.synchronize(&mut b);

    assert_eq!(ids(&a), vec!["2", "1", "0"]);
    assert_eq!(a.current_head_id(), Some("2"));
    assert!(b.is_empty());
}

#[test]
fn test_synchronize_ties_keep_this_repository_ahead() {
    let mut factory = stepping_factory(chrono::Duration::zero());
    let mut a = Repository::new("a").unwrap();
    let mut b = Repository::new("b").unwrap();
    b.commit(&mut factory, "b1");
    a.commit(&mut factory, "a1");
    b.commit(&mut factory, "b2");
    a.commit(&mut factory, "a2");

    a.synchronize(&mut b);

    let messages: Vec<&str> = a.commits().map(Commit::message).collect();
    assert_eq!(messages, vec!["a2", "a1", "b2", "b1"]);
}

#[test]
fn test_synchronize_into_empty_adopts_chain() {
    let mut factory = stepping_factory(chrono::Duration::seconds(1));
    let mut a = Repository::new("a").unwrap();
    let mut b = Repository::new("b").unwrap();
    b.commit(&mut factory, "one");
    b.commit(&mut factory, "two");
    let history = b.history(10).unwrap();

    a.synchronize(&mut b);

    assert_eq!(a.history(10).unwrap(), history);
    assert_eq!(b.size(), 0);
    assert_eq!(b.describe(), "b - No commits");
}

#[test]
fn test_synchronize_from_empty_is_a_no_op() {
    let mut factory = stepping_factory(chrono::Duration::seconds(1));
    let mut a = Repository::new("a").unwrap();
    let mut b = Repository::new("b").unwrap();
    a.commit(&mut factory, "one");
    let describe = a.describe();

    a.synchronize(&mut b);

    assert_eq!(a.describe(), describe);
    assert_eq!(a.size(), 1);
    assert!(b.is_empty());

    let mut c = Repository::new("c").unwrap();
    c.synchronize(&mut b);
    assert!(c.is_empty());
}

#[test]
fn test_synchronize_sums_sizes_and_stays_ordered() {
    let mut factory = stepping_factory(chrono::Duration::seconds(1));
    let mut a = Repository::new("a").unwrap();
    let mut b = Repository::new("b").unwrap();
    for i in 0..12 {
        if i % 3 == 0 {
            b.commit(&mut factory, format!("b{}", i));
        } else {
            a.commit(&mut factory, format!("a{}", i));
        }
        if i % 5 == 0 {
            factory.clock_mut().advance(chrono::Duration::milliseconds(250));
        }
    }
    let dropped = a.commits().nth(2).map(|c| c.id().to_owned()).unwrap();
    assert!(a.drop(&dropped));
    let (size_a, size_b) = (a.size(), b.size());

    a.synchronize(&mut b);

    assert_eq!(a.size(), size_a + size_b);
    assert_eq!(b.size(), 0);
    assert!(!a.contains(&dropped));
    assert_non_increasing(&a);
}

#[test]
fn test_repository_is_usable_after_synchronize() {
    let mut factory = stepping_factory(chrono::Duration::seconds(1));
    let mut a = Repository::new("a").unwrap();
    let mut b = Repository::new("b").unwrap();
    let first = a.commit(&mut factory, "first");
    let alpha = b.commit(&mut factory, "alpha");
    let second = a.commit(&mut factory, "second");
    a.synchronize(&mut b);

    assert!(a.drop(&alpha));
    assert_eq!(ids(&a), vec![second.as_str(), first.as_str()]);
    let third = a.commit(&mut factory, "third");
    assert_eq!(a.current_head_id(), Some(third.as_str()));
    assert_eq!(a.size(), 3);

    let beta = b.commit(&mut factory, "beta");
    assert_eq!(b.size(), 1);
    a.synchronize(&mut b);
    assert_eq!(a.current_head_id(), Some(beta.as_str()));
    assert_non_increasing(&a);
}
