//! Testing utilities and mock implementations.
//!
//! Mocks for the external seams (show source, asset providers, snapshot
//! storage) so orchestration can be exercised without network or disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use showtunes_core::testing::{fixtures, MockProvider, MockShowSource};
//!
//! let provider = MockProvider::new("plex", true);
//! provider.set_resources(vec![("theme.mp3", b"tune".to_vec())]);
//!
//! let source = MockShowSource::new();
//! source.set_shows(vec![fixtures::show(1, "Cowboy Bebop", "/tv/Cowboy Bebop", Some(76885))]);
//! ```

mod mock_provider;
mod mock_show_source;
mod mock_storage;

pub use mock_provider::MockProvider;
pub use mock_show_source::MockShowSource;
pub use mock_storage::MemorySnapshotStorage;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;
    use futures::{stream, StreamExt};

    use crate::limiter::AdmissionScheduler;
    use crate::providers::{FetchError, Resource};
    use crate::source::Show;

    /// Create a test show.
    pub fn show(id: u64, title: &str, path: impl AsRef<Path>, tvdb_id: Option<u64>) -> Show {
        Show {
            id,
            title: title.to_string(),
            path: path.as_ref().to_path_buf(),
            tvdb_id,
        }
    }

    /// A resource whose body is the given chunks.
    pub fn bytes_resource(
        filename: &str,
        scheduler: AdmissionScheduler,
        chunks: Vec<Vec<u8>>,
    ) -> Resource {
        Resource::new(filename, scheduler, move || async move {
            let chunks = chunks.into_iter().map(|c| Ok(Bytes::from(c)));
            Ok(stream::iter(chunks).boxed())
        })
    }

    /// A resource that records whether it was opened.
    pub fn tracked_resource(
        filename: &str,
        scheduler: AdmissionScheduler,
        body: &[u8],
    ) -> (Resource, Arc<AtomicBool>) {
        let opened = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&opened);
        let body = Bytes::copy_from_slice(body);

        let resource = Resource::new(filename, scheduler, move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok(stream::iter(vec![Ok(body)]).boxed())
        });
        (resource, opened)
    }

    /// A resource whose stream breaks after `prefix`.
    pub fn failing_resource(
        filename: &str,
        scheduler: AdmissionScheduler,
        prefix: &[u8],
    ) -> Resource {
        let prefix = Bytes::copy_from_slice(prefix);
        Resource::new(filename, scheduler, move || async move {
            let chunks = vec![
                Ok(prefix),
                Err(FetchError::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset mid-stream",
                ))),
            ];
            Ok(stream::iter(chunks).boxed())
        })
    }

    /// A resource whose request fails with an HTTP status.
    pub fn status_resource(filename: &str, scheduler: AdmissionScheduler, status: u16) -> Resource {
        let url = format!("mock://{}", filename);
        Resource::new(filename, scheduler, move || async move {
            Err(FetchError::Status { url, status })
        })
    }
}
