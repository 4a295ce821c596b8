//! Error type untuk konstruksi ring buffer
//!
//! Hanya konstruksi yang bisa gagal. Operasi data (write/read) tidak pernah
//! mengembalikan error: selesai atau menunggu.

use std::fmt;
use std::io;

/// Error saat membangun ring buffer
#[derive(Debug)]
pub enum Error {
    /// Kapasitas nol, bukan power of 2, atau tidak muat di `usize`
    InvalidCapacity(u64),
    /// Anonymous mmap untuk backing store gagal dibuat
    Alloc(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCapacity(capacity) => write!(
                f,
                "invalid capacity {}: must be a non-zero power of two",
                capacity
            ),
            Error::Alloc(err) => write!(f, "failed to allocate backing store: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidCapacity(_) => None,
            Error::Alloc(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Alloc(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_invalid_capacity() {
        let err = Error::InvalidCapacity(12);
        assert_eq!(
            err.to_string(),
            "invalid capacity 12: must be a non-zero power of two"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn test_alloc_keeps_source() {
        let err: Error = io::Error::new(io::ErrorKind::OutOfMemory, "no pages").into();
        assert!(matches!(err, Error::Alloc(_)));
        assert!(err.to_string().contains("no pages"));
        assert!(err.source().is_some());
    }
}
