//! Progress reporting for indexing

use manualroot_core::index::IndexProgress;
use std::io::{self, Write};

/// Rewrites one stderr line per page
pub struct ProgressReporter {
    label: String,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn update(&self, progress: &IndexProgress) {
        eprint!(
            "\r{}: page {}/{} ({} chunks)   ",
            self.label, progress.processed_pages, progress.total_pages, progress.chunks
        );
        io::stderr().flush().ok();
    }

    pub fn finish(&self) {
        eprintln!();
    }
}
