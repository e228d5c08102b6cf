use std::{fmt, io};

/// Errors returned by the attribute server and its codec layers.
///
/// Protocol-level failures are not represented here: those travel back to the
/// peer as ATT Error Responses (see [`att::AttError`]) and never tear down
/// the connection.
///
/// [`att::AttError`]: ../att/struct.AttError.html
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Packet specified an invalid length value or was too short.
    InvalidLength,

    /// Invalid value supplied for field.
    InvalidValue,

    /// Unexpectedly reached EOF while reading or writing data.
    ///
    /// This is returned when the application tries to fit too much data into
    /// a bounded buffer, and also when reaching EOF prematurely while reading
    /// data from a buffer.
    Eof,

    /// An I/O error on the underlying channel.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidLength => f.write_str("invalid length value specified"),
            Error::InvalidValue => f.write_str("invalid value for field"),
            Error::Eof => f.write_str("end of buffer"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
