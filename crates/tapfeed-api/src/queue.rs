use std::{path::PathBuf, sync::Arc};

use serde_json::Value;
use tapfeed_dl::Transport;
use tracing::debug;

use crate::{api::Api, error::Result};

/// A download that was deferred instead of performed inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonDownload {
    pub endpoint: String,
    pub target: PathBuf,
    pub stale_seconds: u64,
}

/// Collects deferred downloads so a caller can perform several of them together.
///
/// Each frontend decides how queued downloads run; [`BatchQueue`] runs them one after another.
pub trait DownloadQueue {
    fn enqueue(&mut self, download: JsonDownload);
}

/// Queue that stores downloads until [`BatchQueue::run`] performs them.
#[derive(Debug, Default)]
pub struct BatchQueue {
    downloads: Vec<JsonDownload>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downloads(&self) -> &[JsonDownload] {
        &self.downloads
    }

    pub fn len(&self) -> usize {
        self.downloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty()
    }

    /// Performs every queued download through `api`, draining the queue.
    ///
    /// Downloads are independent: one failing does not stop the rest. Results come back in
    /// enqueue order, and successful documents are memoized by `api`, so a later
    /// [`Api::fetch_json_api_file`] for the same endpoint is answered from memory.
    pub fn run<T: Transport>(
        &mut self,
        api: &Api<T>,
    ) -> Vec<(JsonDownload, Result<(Arc<Value>, bool)>)> {
        debug!("running {} queued downloads", self.downloads.len());
        self.downloads
            .drain(..)
            .map(|download| {
                let result = api.fetch_json_api_file(
                    &download.endpoint,
                    Some(&download.target),
                    Some(download.stale_seconds),
                    None,
                );
                (download, result)
            })
            .collect()
    }
}

impl DownloadQueue for BatchQueue {
    fn enqueue(&mut self, download: JsonDownload) {
        if !self.downloads.contains(&download) {
            self.downloads.push(download);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_ignores_duplicates() {
        let mut queue = BatchQueue::new();
        let download = JsonDownload {
            endpoint: "formula.jws.json".to_string(),
            target: PathBuf::from("/cache/api/formula.jws.json"),
            stale_seconds: 450,
        };

        queue.enqueue(download.clone());
        queue.enqueue(download.clone());

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.downloads(), &[download]);
    }
}
