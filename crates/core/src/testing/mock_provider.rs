//! Mock asset provider for testing.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use parking_lot::Mutex;

use crate::limiter::{AdmissionScheduler, Quota};
use crate::providers::{AssetProvider, FetchError, ProviderError, Resource};
use crate::source::Show;

#[derive(Debug, Clone)]
enum MockBody {
    Complete(Vec<u8>),
    /// Sends the prefix, then fails.
    Broken(Vec<u8>),
}

#[derive(Debug, Clone)]
struct MockResource {
    filename: String,
    directory: Option<String>,
    body: MockBody,
}

/// Mock implementation of the AssetProvider trait.
///
/// Returns the configured resources on every discovery, built fresh each
/// time; per-show overrides take precedence. Records discoveries and stream
/// opens for assertions.
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockProvider::new("plex", true);
/// provider.set_resources(vec![("theme.mp3", b"tune".to_vec())]);
/// provider.add_failing_resource("broken.mp3", b"half");
///
/// // ... run the orchestrator ...
///
/// assert_eq!(provider.discover_count(), 1);
/// ```
pub struct MockProvider {
    name: String,
    persistable: bool,
    scheduler: AdmissionScheduler,
    resources: Mutex<Vec<MockResource>>,
    by_show: Mutex<HashMap<String, Vec<MockResource>>>,
    next_error: Mutex<Option<ProviderError>>,
    discovers: AtomicUsize,
    opens: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(name: &str, persistable: bool) -> Self {
        let scheduler = match AdmissionScheduler::new(name, Quota::concurrency(4)) {
            Ok(scheduler) => scheduler,
            Err(e) => panic!("mock quota rejected: {}", e),
        };
        Self::with_scheduler(name, persistable, scheduler)
    }

    /// Route fetches through a specific scheduler.
    pub fn with_scheduler(name: &str, persistable: bool, scheduler: AdmissionScheduler) -> Self {
        Self {
            name: name.to_string(),
            persistable,
            scheduler,
            resources: Mutex::new(Vec::new()),
            by_show: Mutex::new(HashMap::new()),
            next_error: Mutex::new(None),
            discovers: AtomicUsize::new(0),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the resources returned by discovery.
    pub fn set_resources(&self, resources: Vec<(&str, Vec<u8>)>) {
        *self.resources.lock() = resources
            .into_iter()
            .map(|(filename, body)| MockResource {
                filename: filename.to_string(),
                directory: None,
                body: MockBody::Complete(body),
            })
            .collect();
    }

    /// Resources returned only for the show with this entity key.
    pub fn set_resources_for(&self, entity_key: &str, resources: Vec<(&str, Vec<u8>)>) {
        let entries = resources
            .into_iter()
            .map(|(filename, body)| MockResource {
                filename: filename.to_string(),
                directory: None,
                body: MockBody::Complete(body),
            })
            .collect();
        self.by_show.lock().insert(entity_key.to_string(), entries);
    }

    /// Add a resource placed in a subdirectory of the show root.
    pub fn add_resource_in(&self, directory: &str, filename: &str, body: Vec<u8>) {
        self.resources.lock().push(MockResource {
            filename: filename.to_string(),
            directory: Some(directory.to_string()),
            body: MockBody::Complete(body),
        });
    }

    /// Add a resource whose stream fails after `prefix`.
    pub fn add_failing_resource(&self, filename: &str, prefix: &[u8]) {
        self.resources.lock().push(MockResource {
            filename: filename.to_string(),
            directory: None,
            body: MockBody::Broken(prefix.to_vec()),
        });
    }

    /// Configure the next discovery to fail with the given error.
    pub fn set_next_error(&self, error: ProviderError) {
        *self.next_error.lock() = Some(error);
    }

    pub fn discover_count(&self) -> usize {
        self.discovers.load(Ordering::SeqCst)
    }

    /// Number of resource streams opened.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn build(&self, entry: MockResource) -> Resource {
        let opens = Arc::clone(&self.opens);
        let resource = Resource::new(entry.filename, self.scheduler.clone(), move || async move {
            opens.fetch_add(1, Ordering::SeqCst);
            let chunks = match entry.body {
                MockBody::Complete(body) => vec![Ok(Bytes::from(body))],
                MockBody::Broken(prefix) => vec![
                    Ok(Bytes::from(prefix)),
                    Err(FetchError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "mock stream broken",
                    ))),
                ],
            };
            Ok(stream::iter(chunks).boxed())
        });
        match entry.directory {
            Some(directory) => resource.in_directory(directory),
            None => resource,
        }
    }
}

#[async_trait]
impl AssetProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn persistable(&self) -> bool {
        self.persistable
    }

    async fn discover(&self, show: &Show) -> Result<Vec<Resource>, ProviderError> {
        self.discovers.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_error.lock().take() {
            return Err(error);
        }
        let entries = match self.by_show.lock().get(&show.entity_key()) {
            Some(entries) => entries.clone(),
            None => self.resources.lock().clone(),
        };
        Ok(entries.into_iter().map(|entry| self.build(entry)).collect())
    }
}
