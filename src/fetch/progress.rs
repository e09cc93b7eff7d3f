//! Download progress reporting

use std::sync::Arc;

/// Callback invoked for every received chunk with the declared total length
pub type OnData = Arc<dyn Fn(Option<u64>, &[u8]) + Send + Sync>;

// Debug log granularity for long transfers
const LOG_THRESHOLD: u64 = 1024 * 1024;

/// Per-transfer byte accounting
pub(crate) struct DownloadProgress<'a> {
    on_data: Option<&'a OnData>,
    total: Option<u64>,
    received: u64,
    last_logged: u64,
}

impl<'a> DownloadProgress<'a> {
    pub fn new(on_data: Option<&'a OnData>, total: Option<u64>) -> Self {
        Self {
            on_data,
            total,
            received: 0,
            last_logged: 0,
        }
    }

    pub fn chunk(&mut self, data: &[u8]) {
        if let Some(callback) = self.on_data {
            callback(self.total, data);
        }

        self.received += data.len() as u64;
        if self.received - self.last_logged >= LOG_THRESHOLD {
            match self.total {
                Some(total) if total > 0 => log::debug!(
                    "Downloaded {:.1} MB / {:.1} MB ({}%)",
                    self.received as f64 / 1_048_576.0,
                    total as f64 / 1_048_576.0,
                    self.received * 100 / total
                ),
                _ => log::debug!("Downloaded {:.1} MB", self.received as f64 / 1_048_576.0),
            }
            self.last_logged = self.received;
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }
}
