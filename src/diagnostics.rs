use std::sync::Mutex;
use tracing::warn;

use crate::error::{ErrorKind, ScanError};

/// One isolated, non-fatal failure observed during a scan.
#[derive(Debug)]
pub struct Diagnostic {
    pub error: ScanError,
    /// Raw entry bytes, kept for malformed descriptors.
    pub payload: Option<Vec<u8>>,
}

impl Diagnostic {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Thread-safe sink collecting per-entry and per-root failures.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, error: ScanError) {
        self.push(Diagnostic {
            error,
            payload: None,
        });
    }

    pub fn report_with_payload(&self, error: ScanError, payload: Vec<u8>) {
        self.push(Diagnostic {
            error,
            payload: Some(payload),
        });
    }

    fn push(&self, diagnostic: Diagnostic) {
        warn!(kind = ?diagnostic.kind(), "{}", diagnostic.error);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(diagnostic);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries.into_inner().unwrap_or_default()
    }
}
