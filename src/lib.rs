//! # Commit Chain
//!
//! An in-memory model of a linear revision history: named repositories
//! holding chains of commits, newest first, which can be inspected, pruned,
//! and merged together by commit time.

/// Sources of commit timestamps.
pub mod clock;
/// Commits and the [`CommitFactory`](commit::CommitFactory) that creates them.
pub mod commit;
pub mod error;
/// A named chain of commits.
pub mod repository;
/// Line-oriented command interpreter over a set of repositories.
pub mod session;
