//! The crate's error taxonomy
//!
//! Mirrors how this codebase's host-side tooling represents failures: a small `enum` with a
//! hand-written [`std::fmt::Display`] and [`std::error::Error`] impl, rather than reaching for a
//! derive-macro error crate. Unlike the host tool this is grounded on, `main` needs to branch on
//! *which* variant occurred (to print the exact fixed message §7 specifies and nothing else), so
//! this is a closed `enum` rather than a `Box<dyn Error>`.

use std::fmt;

/// Everything that can go wrong compiling and running a Brainfuck source file, short of a
/// programmer error in the encoder (those are preconditions, enforced with `panic!` — see
/// [`crate::encoder`]).
#[derive(Debug)]
pub enum Error {
    /// The source file could not be read, or its size could not be determined.
    Io(std::io::Error),
    /// The source was malformed: an unmatched `[` or `]`.
    Parse(ParseError),
    /// The JIT memory region could not be allocated.
    Resource,
}

/// Which bracket was left dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Reached end of input with one or more `[` never closed.
    ExpectedClose,
    /// Saw a `]` with no matching open `[` on the jump stack.
    ExpectedOpen,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Parse(ParseError::ExpectedClose) => {
                write!(f, "program parse error: expected ]")
            }
            Self::Parse(ParseError::ExpectedOpen) => {
                write!(f, "program parse error: expected [")
            }
            Self::Resource => write!(f, "could not JIT memory region"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(_) | Self::Resource => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_render_exact_spec_messages() {
        assert_eq!(
            Error::Parse(ParseError::ExpectedClose).to_string(),
            "program parse error: expected ]"
        );
        assert_eq!(
            Error::Parse(ParseError::ExpectedOpen).to_string(),
            "program parse error: expected ["
        );
    }

    #[test]
    fn resource_error_renders_exact_spec_message() {
        assert_eq!(Error::Resource.to_string(), "could not JIT memory region");
    }
}
