use std::path::PathBuf;

use rpm_format::{BlobError, CodecError, JoinError, OpenError, SplitError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot split package `{}`", .path.display())]
    Split {
        path: PathBuf,
        #[source]
        source: SplitError,
    },

    #[error("Cannot join package `{}`", .path.display())]
    Join {
        path: PathBuf,
        #[source]
        source: JoinError,
    },

    #[error("Cannot build blob from package `{}`", .path.display())]
    Blob {
        path: PathBuf,
        #[source]
        source: BlobError,
    },

    #[error("Cannot open package `{}`", .path.display())]
    OpenPackage {
        path: PathBuf,
        #[source]
        source: OpenError,
    },

    #[error("Cannot resolve payload of `{}`", .path.display())]
    Payload {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}

/// Formats an error and its sources on one line, outermost first.
pub fn report(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(e) = source {
        out.push_str(": ");
        out.push_str(&e.to_string());
        source = e.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_includes_sources() {
        let error = Error::Split {
            path: PathBuf::from("hello.rpm"),
            source: SplitError::Open(OpenError::NotAPackage),
        };

        assert_eq!(
            report(&error),
            "Cannot split package `hello.rpm`: argument is not an RPM package"
        );
    }

    #[test]
    fn report_includes_io_errors() {
        let error = Error::Join {
            path: PathBuf::from("out.rpm"),
            source: JoinError::OpenFailed(
                std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
                PathBuf::from("in.cpio"),
            ),
        };

        assert_eq!(
            report(&error),
            "Cannot join package `out.rpm`: Opening file failed. Path: 'in.cpio': No such file or directory"
        );
    }
}
