use std::{
    collections::BTreeMap,
    fmt::Display,
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
};

use clap::{error::ErrorKind, Parser, Subcommand};
use derive_more::{Display, From};
use serde::Serialize;

use crate::{
    clock::{system::SystemClock, Clock},
    commit::{Commit, CommitFactory},
    error::Error,
    repository::Repository,
};

/// One line of input, parsed as a command.
#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct Line {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(about = "create a new, empty repository")]
    Create { name: String },
    #[clap(about = "show the id of the head commit")]
    Head { name: String },
    #[clap(about = "count the commits in a repository")]
    Size { name: String },
    #[clap(about = "describe a repository and its head commit")]
    Describe { name: String },
    #[clap(about = "check whether a commit is in a repository")]
    Contains { name: String, id: String },
    #[clap(about = "show the most recent commits")]
    History {
        name: String,
        #[arg(allow_negative_numbers = true, help = "how many commits to show")]
        n: i64,
    },
    #[clap(about = "record a new commit")]
    Commit {
        name: String,
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            help = "message to leave with this commit"
        )]
        message: Vec<String>,
    },
    #[clap(about = "remove a commit from a repository")]
    Drop { name: String, id: String },
    #[clap(about = "move every commit of <OTHER> into <NAME>")]
    Synchronize { name: String, other: String },
    #[clap(about = "describe every repository")]
    List,
    #[clap(about = "end the session")]
    Quit,
}

#[derive(Debug, Display, From)]
pub enum SessionError {
    #[from]
    #[display(fmt = "{}", _0)]
    Repository(Error),
    #[from]
    #[display(fmt = "{}", _0)]
    Parse(clap::Error),
    #[from]
    #[display(fmt = "{}", _0)]
    IO(std::io::Error),
    #[from]
    #[display(fmt = "{}", _0)]
    Serde(serde_json::Error),
    #[display(fmt = "no repository named {}", _0)]
    UnknownRepository(String),
    #[display(fmt = "repository {} already exists", _0)]
    RepositoryExists(String),
    #[display(fmt = "cannot synchronize {} with itself", _0)]
    SelfSynchronize(String),
}

impl std::error::Error for SessionError {}

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Description(String),
    Head(Option<String>),
    Size(usize),
    Found(bool),
    History(Vec<Commit>),
    Committed(String),
    Listing(Vec<String>),
    Help(String),
    Quit,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Description(text) | Outcome::Committed(text) => write!(f, "{}", text),
            Outcome::History(commits) => {
                for (i, commit) in commits.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", commit)?;
                }
                Ok(())
            }
            Outcome::Help(text) => write!(f, "{}", text.trim_end()),
            Outcome::Head(Some(id)) => write!(f, "{}", id),
            Outcome::Head(None) => write!(f, "none"),
            Outcome::Size(size) => write!(f, "{}", size),
            Outcome::Found(found) => write!(f, "{}", found),
            Outcome::Listing(lines) if lines.is_empty() => write!(f, "No repositories"),
            Outcome::Listing(lines) => write!(f, "{}", lines.join("\n")),
            Outcome::Quit => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// A set of named repositories driven by textual commands.
pub struct Session<C = SystemClock> {
    factory: CommitFactory<C>,
    repositories: BTreeMap<String, Repository>,
    format: Format,
}

impl Session<SystemClock> {
    pub fn new(format: Format) -> Self {
        Self::with_factory(CommitFactory::new(), format)
    }
}

impl<C: Clock> Session<C> {
    pub fn with_factory(factory: CommitFactory<C>, format: Format) -> Self {
        Self {
            factory,
            repositories: BTreeMap::new(),
            format,
        }
    }

    pub fn repository(&self, name: &str) -> Result<&Repository, SessionError> {
        self.repositories
            .get(name)
            .ok_or_else(|| SessionError::UnknownRepository(name.to_owned()))
    }

    /// Runs a single command. Blank lines and `#` comments produce nothing.
    pub fn execute(&mut self, line: &str) -> Result<Option<Outcome>, SessionError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        if let Some((name, message)) = commit_arguments(line) {
            log::debug!("committing {:?} to {}", message, name);
            return self.commit(name, message).map(Some);
        }
        let Line { cmd } = match Line::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => parsed,
            Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                return Ok(Some(Outcome::Help(err.to_string())));
            }
            Err(err) => return Err(err.into()),
        };
        log::debug!("executing {:?}", cmd);
        self.dispatch(cmd).map(Some)
    }

    fn commit(&mut self, name: &str, message: &str) -> Result<Outcome, SessionError> {
        let repository = self
            .repositories
            .get_mut(name)
            .ok_or_else(|| SessionError::UnknownRepository(name.to_owned()))?;
        Ok(Outcome::Committed(repository.commit(&mut self.factory, message)))
    }

    fn dispatch(&mut self, cmd: Command) -> Result<Outcome, SessionError> {
        Ok(match cmd {
            Command::Create { name } => {
                if self.repositories.contains_key(&name) {
                    return Err(SessionError::RepositoryExists(name));
                }
                let repository = Repository::new(name.clone())?;
                let outcome = Outcome::Description(repository.describe());
                self.repositories.insert(name, repository);
                outcome
            }
            Command::Head { name } => Outcome::Head(
                self.repository(&name)?
                    .current_head_id()
                    .map(str::to_owned),
            ),
            Command::Size { name } => Outcome::Size(self.repository(&name)?.size()),
            Command::Describe { name } => Outcome::Description(self.repository(&name)?.describe()),
            Command::Contains { name, id } => Outcome::Found(self.repository(&name)?.contains(&id)),
            Command::History { name, n } => {
                Outcome::History(self.repository(&name)?.recent(n)?.cloned().collect())
            }
            Command::Commit { name, message } => self.commit(&name, &message.join(" "))?,
            Command::Drop { name, id } => {
                let repository = self
                    .repositories
                    .get_mut(&name)
                    .ok_or(SessionError::UnknownRepository(name))?;
                Outcome::Found(repository.drop(&id))
            }
            Command::Synchronize { name, other } => {
                if name == other {
                    return Err(SessionError::SelfSynchronize(name));
                }
                if !self.repositories.contains_key(&name) {
                    return Err(SessionError::UnknownRepository(name));
                }
                let mut source = self
                    .repositories
                    .remove(&other)
                    .ok_or_else(|| SessionError::UnknownRepository(other.clone()))?;
                let target = self
                    .repositories
                    .get_mut(&name)
                    .ok_or(SessionError::UnknownRepository(name))?;
                target.synchronize(&mut source);
                let outcome = Outcome::Description(target.describe());
                self.repositories.insert(other, source);
                outcome
            }
            Command::List => {
                Outcome::Listing(self.repositories.values().map(Repository::describe).collect())
            }
            Command::Quit => Outcome::Quit,
        })
    }

    /// Executes every line of `input`, writing one result per command to
    /// `output`, until the input runs out or a `quit` command.
    ///
    /// A failing command is reported and the session carries on. Only
    /// failures to read or write end it early.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<(), SessionError> {
        for line in input.lines() {
            match self.execute(&line?) {
                Ok(None) => {}
                Ok(Some(Outcome::Quit)) => break,
                Ok(Some(outcome)) => self.render(&mut output, &outcome)?,
                Err(err) => self.render_error(&mut output, &err)?,
            }
        }
        output.flush()?;
        Ok(())
    }

    pub fn run_script<W: Write>(&mut self, path: &Path, output: W) -> Result<(), SessionError> {
        log::info!("running commands from {:?}", path);
        let file = File::options().read(true).open(path)?;
        self.run(BufReader::new(file), output)
    }

    fn render<W: Write>(&self, output: &mut W, outcome: &Outcome) -> Result<(), SessionError> {
        match self.format {
            Format::Text => writeln!(output, "{}", outcome)?,
            Format::Json => {
                serde_json::to_writer(&mut *output, outcome)?;
                writeln!(output)?;
            }
        }
        Ok(())
    }

    fn render_error<W: Write>(&self, output: &mut W, err: &SessionError) -> Result<(), SessionError> {
        log::debug!("command failed: {:?}", err);
        match (self.format, err) {
            // clap renders its own "error:" prefix and usage.
            (Format::Text, SessionError::Parse(err)) => {
                writeln!(output, "{}", err.to_string().trim_end())?
            }
            (Format::Text, err) => writeln!(output, "error: {}", err)?,
            (Format::Json, err) => {
                serde_json::to_writer(&mut *output, &serde_json::json!({ "error": err.to_string() }))?;
                writeln!(output)?;
            }
        }
        Ok(())
    }
}

/// Splits `commit <name> <message>` by hand so the message is kept exactly
/// as typed, hyphens and inner spaces included. Lines this does not match
/// go through clap.
fn commit_arguments(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("commit")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let (name, message) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if name.starts_with('-') {
        return None;
    }
    Some((name, message.trim_start()))
}

#[cfg(test)]
fn test_session(format: Format) -> Session<crate::clock::manual::ManualClock> {
    Session::with_factory(
        CommitFactory::with_clock(crate::clock::manual::ManualClock::ticking()),
        format,
    )
}

#[cfg(test)]
fn run_to_string<C: Clock>(session: &mut Session<C>, script: &str) -> String {
    let mut output = Vec::new();
    session.run(script.as_bytes(), &mut output).unwrap();
    String::from_utf8(output).unwrap()
}

#[test]
fn test_session_script() {
    let mut session = test_session(Format::Text);
    let script = "\
create a
create b
# interleave b's commit between a's two
commit a first
commit b alpha
commit a second   thing

synchronize a b
size a
size b
history a 5
history a -1
head b
drop a 1
drop a 1
contains a 0
head missing
synchronize a a
create a
list
quit
size a
";
    let expected = "\
a - No commits
b - No commits
0
1
2
a - Current head: 2 at 1970-01-01 at 00:00:02 UTC: second   thing
3
0
2 at 1970-01-01 at 00:00:02 UTC: second   thing
1 at 1970-01-01 at 00:00:01 UTC: alpha
0 at 1970-01-01 at 00:00:00 UTC: first
error: invalid argument: history length must be positive, got -1
none
true
false
true
error: no repository named missing
error: cannot synchronize a with itself
error: repository a already exists
a - Current head: 2 at 1970-01-01 at 00:00:02 UTC: second   thing
b - No commits
";
    assert_eq!(run_to_string(&mut session, script), expected);
}

#[test]
fn test_session_commit_messages() {
    let mut session = test_session(Format::Text);
    let output = run_to_string(
        &mut session,
        "create a\ncommit a\ncommit a fix --amend this\ncommit a --help\ncommit a -h me\ncommit a   two   spaces\n",
    );
    assert_eq!(output, "a - No commits\n0\n1\n2\n3\n4\n");
    let repository = session.repository("a").unwrap();
    let messages: Vec<&str> = repository.commits().map(Commit::message).collect();
    assert_eq!(
        messages,
        vec!["two   spaces", "-h me", "--help", "fix --amend this", ""]
    );
}

#[test]
fn test_session_help_is_not_an_error() {
    let mut session = test_session(Format::Text);
    assert!(matches!(session.execute("help"), Ok(Some(Outcome::Help(_)))));
    assert!(matches!(
        session.execute("commit --help"),
        Ok(Some(Outcome::Help(_)))
    ));
    let output = run_to_string(&mut session, "history --help\nlist\n");
    assert!(!output.starts_with("error"), "{}", output);
    assert!(output.contains("how many commits to show"), "{}", output);
    assert!(output.ends_with("No repositories\n"), "{}", output);
}

#[test]
fn test_session_parse_errors() {
    let mut session = test_session(Format::Text);
    assert!(matches!(
        session.execute("frobnicate a"),
        Err(SessionError::Parse(_))
    ));
    assert!(matches!(
        session.execute("history a many"),
        Err(SessionError::Parse(_))
    ));
    assert!(matches!(session.execute("   "), Ok(None)));
    let output = run_to_string(&mut session, "frobnicate\nlist\n");
    assert!(output.starts_with("error:"), "{}", output);
    assert!(output.ends_with("No repositories\n"), "{}", output);
}

#[test]
fn test_session_json() {
    let mut session = test_session(Format::Json);
    let output = run_to_string(
        &mut session,
        "create a\nhead a\ncommit a hello\nsize a\ncontains a 0\nhistory a 3\nhead b\n",
    );
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![
            serde_json::json!({ "kind": "description", "value": "a - No commits" }),
            serde_json::json!({ "kind": "head", "value": null }),
            serde_json::json!({ "kind": "committed", "value": "0" }),
            serde_json::json!({ "kind": "size", "value": 1 }),
            serde_json::json!({ "kind": "found", "value": true }),
            serde_json::json!({
                "kind": "history",
                "value": [{ "id": "0", "message": "hello", "timestamp": "1970-01-01T00:00:00Z" }],
            }),
            serde_json::json!({ "error": "no repository named b" }),
        ]
    );
}

#[test]
fn test_session_script_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "create demo").unwrap();
    writeln!(file, "commit demo initial import").unwrap();
    writeln!(file, "describe demo").unwrap();
    file.flush().unwrap();

    let mut session = test_session(Format::Text);
    let mut output = Vec::new();
    session.run_script(file.path(), &mut output).unwrap();
    assert_eq!(
        String::from_utf8(output).unwrap(),
        "demo - No commits\n0\ndemo - Current head: 0 at 1970-01-01 at 00:00:00 UTC: initial import\n"
    );
}

#[test]
fn test_session_missing_script() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = test_session(Format::Text);
    let result = session.run_script(&dir.path().join("nope"), Vec::new());
    assert!(matches!(result, Err(SessionError::IO(_))));
}
