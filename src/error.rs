use derive_more::{Display, From};

/// Errors raised by [`Repository`](crate::repository::Repository) operations.
///
/// Both causes are caller misuse. A failing operation never mutates the
/// repository.
#[derive(Debug, Clone, PartialEq, Eq, Display, From)]
pub enum Error {
    #[from]
    #[display(fmt = "invalid argument: {}", _0)]
    InvalidArgument(InvalidArgument),
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum InvalidArgument {
    #[display(fmt = "repository name must not be empty")]
    EmptyName,
    #[display(fmt = "history length must be positive, got {}", _0)]
    NonPositiveCount(i64),
}

impl std::error::Error for Error {}

impl Error {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}

#[test]
fn test_error_messages() {
    let err = Error::from(InvalidArgument::NonPositiveCount(0));
    assert_eq!(
        err.to_string(),
        "invalid argument: history length must be positive, got 0"
    );
    assert_eq!(
        Error::from(InvalidArgument::EmptyName).to_string(),
        "invalid argument: repository name must not be empty"
    );
}
