//! Collaborators the engine talks to. All are optional; a missing one is a
//! silent no-op.

use std::sync::{Arc, Mutex};

/// Notification severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient user-facing messages (toasts).
pub trait Notifier: Send {
    fn notify(&self, message: &str, severity: Severity);
}

/// Hand-off of generated prompt text to the next stage.
pub trait PromptSink: Send {
    fn export_prompt_text(&self, text: &str);
}

/// Receives exported files.
pub trait DownloadSink: Send {
    fn download_file(&self, bytes: Vec<u8>, filename: &str, mime: &str);
}

#[derive(Default)]
pub struct Collaborators {
    pub notifier: Option<Box<dyn Notifier>>,
    pub prompt_sink: Option<Box<dyn PromptSink>>,
    pub download_sink: Option<Box<dyn DownloadSink>>,
}

impl Collaborators {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_notifier(mut self, n: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(n));
        self
    }

    pub fn with_prompt_sink(mut self, s: impl PromptSink + 'static) -> Self {
        self.prompt_sink = Some(Box::new(s));
        self
    }

    pub fn with_download_sink(mut self, s: impl DownloadSink + 'static) -> Self {
        self.download_sink = Some(Box::new(s));
        self
    }

    pub fn notify(&self, message: &str, severity: Severity) {
        if let Some(n) = &self.notifier {
            n.notify(message, severity);
        }
    }

    pub fn export_prompt_text(&self, text: &str) {
        if let Some(s) = &self.prompt_sink {
            s.export_prompt_text(text);
        }
    }

    pub fn download_file(&self, bytes: Vec<u8>, filename: &str, mime: &str) {
        if let Some(s) = &self.download_sink {
            s.download_file(bytes, filename, mime);
        }
    }
}

// ============================================================================
// In-memory collaborators (GUI toasts, CLI output capture, tests)
// ============================================================================

/// Collects notifications. Clones share the same log.
#[derive(Clone, Default)]
pub struct NotificationLog {
    entries: Arc<Mutex<Vec<(String, Severity)>>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<(String, Severity)> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }

    /// Remove and return everything collected so far.
    pub fn drain(&self) -> Vec<(String, Severity)> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, message: &str, severity: Severity) {
        crate::log_info!("notify [{:?}] {}", severity, message);
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((message.to_string(), severity));
    }
}

/// Keeps the most recent exported prompt.
#[derive(Clone, Default)]
pub struct PromptMailbox {
    last: Arc<Mutex<Option<String>>>,
}

impl PromptMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Option<String> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub fn peek(&self) -> Option<String> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl PromptSink for PromptMailbox {
    fn export_prompt_text(&self, text: &str) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.to_string());
    }
}

/// A file handed to a [`DownloadSink`].
#[derive(Clone, Debug)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: String,
}

/// Queues downloads for the host to write out.
#[derive(Clone, Default)]
pub struct DownloadQueue {
    files: Arc<Mutex<Vec<Download>>>,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Download> {
        std::mem::take(&mut *self.files.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DownloadSink for DownloadQueue {
    fn download_file(&self, bytes: Vec<u8>, filename: &str, mime: &str) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Download { bytes, filename: filename.to_string(), mime: mime.to_string() });
    }
}
