use crate::domain::model::{LookupOutcome, NutritionView, ScanResult, ScannerSettings};
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Events delivered to the scan session dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Decoded(ScanResult),
    Cancelled,
}

/// Sending half handed to the scanner on `start_scanning`. Cloneable so the
/// UI can push a cancellation through the same queue.
#[derive(Debug, Clone)]
pub struct DecodeNotifier {
    tx: mpsc::UnboundedSender<ScanEvent>,
}

impl DecodeNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `false` once the session stopped listening.
    pub fn decoded(&self, result: ScanResult) -> bool {
        self.tx.send(ScanEvent::Decoded(result)).is_ok()
    }

    pub fn cancelled(&self) -> bool {
        self.tx.send(ScanEvent::Cancelled).is_ok()
    }
}

/// 外部條碼掃描器的最小介面（不涉及影像辨識本身）
pub trait Scanner: Send {
    fn apply_settings(&mut self, settings: &ScannerSettings);

    /// Acquires the camera and begins decoding. Fails with
    /// `AppError::PermissionError` when camera access is denied.
    fn start_scanning(&mut self, license_key: &str, notifier: DecodeNotifier) -> Result<()>;

    /// Releases the camera. Must be safe to call more than once.
    fn stop_scanning(&mut self);

    fn is_scanning(&self) -> bool;
}

#[async_trait]
pub trait Prompt: Send {
    async fn next_action(&mut self) -> UserAction;
}

#[async_trait]
pub trait LookupService: Send + Sync {
    async fn lookup(&self, code: &str) -> LookupOutcome;
}

/// Screen the presenter asks the UI to show.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Scanning,
    PermissionDenied { message: String },
    LookingUp { code: String },
    NutritionFacts(NutritionView),
    NotFound { code: String },
    NetworkError { code: String, reason: String },
    UnexpectedResponse { code: String, reason: String },
    Cleared,
}

/// User choice after a result has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Rescan,
    RetryLookup,
    Quit,
}

pub trait View: Send {
    fn render(&mut self, screen: &Screen) -> Result<()>;
}
