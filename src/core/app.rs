use crate::config::AppConfig;
use crate::core::presenter::ResultPresenter;
use crate::core::session::{ScanSession, SessionOutcome};
use crate::domain::model::{LookupOutcome, ScannerSettings, SymbologySet};
use crate::domain::ports::{LookupService, Prompt, Scanner, Screen, UserAction, View};
use crate::utils::error::{AppError, Result};
use tokio_util::sync::CancellationToken;

/// Result of one scan/lookup cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Presented { code: String, outcome: LookupOutcome },
    Cancelled,
    PermissionDenied,
}

/// Drives scan → lookup → present, one event at a time.
pub struct ScanApp<S: Scanner, L: LookupService, V: View> {
    config: AppConfig,
    settings: ScannerSettings,
    session: ScanSession<S>,
    lookup: L,
    presenter: ResultPresenter<V>,
    shutdown: CancellationToken,
}

impl<S: Scanner, L: LookupService, V: View> ScanApp<S, L, V> {
    pub fn new(config: AppConfig, scanner: S, lookup: L, view: V) -> Self {
        Self::with_shutdown(config, scanner, lookup, view, CancellationToken::new())
    }

    pub fn with_shutdown(
        config: AppConfig,
        scanner: S,
        lookup: L,
        view: V,
        shutdown: CancellationToken,
    ) -> Self {
        let settings = config.scanner_settings();
        Self {
            config,
            settings,
            session: ScanSession::with_shutdown(scanner, shutdown.clone()),
            lookup,
            presenter: ResultPresenter::new(view),
            shutdown,
        }
    }

    pub fn with_symbologies(mut self, symbologies: SymbologySet) -> Self {
        self.settings.symbologies = symbologies;
        self
    }

    pub fn session(&self) -> &ScanSession<S> {
        &self.session
    }

    pub fn presenter(&self) -> &ResultPresenter<V> {
        &self.presenter
    }

    /// Opens the scanner, waits for one decode and looks it up. A camera
    /// permission denial is shown to the user rather than returned.
    pub async fn scan_once(&mut self) -> Result<CycleOutcome> {
        let handle = match self.presenter.request_rescan(
            &mut self.session,
            &self.config.credentials,
            &self.settings,
        ) {
            Ok(handle) => handle,
            Err(AppError::PermissionError { message }) => {
                tracing::warn!("🚫 Camera permission denied: {}", message);
                self.presenter.show(Screen::PermissionDenied { message })?;
                return Ok(CycleOutcome::PermissionDenied);
            }
            Err(e) => return Err(e),
        };

        let outcome = self.session.next_outcome().await;
        // 掃描器視圖已結束，UI 端不再需要取消把手
        drop(handle);

        match outcome? {
            SessionOutcome::Cancelled => {
                self.session.end_session();
                self.presenter.show(Screen::Cleared)?;
                Ok(CycleOutcome::Cancelled)
            }
            SessionOutcome::Decoded(result) => {
                if !result.has_valid_check_digit() {
                    tracing::warn!(
                        "⚠️ {} code {} has a bad check digit, looking it up anyway",
                        result.symbology,
                        result.code
                    );
                }
                self.lookup_and_present(&result.code).await
            }
        }
    }

    /// Looks up `code` while the decoded session is still open, so a user
    /// cancel abandons the request.
    async fn lookup_and_present(&mut self, code: &str) -> Result<CycleOutcome> {
        self.presenter.show(Screen::LookingUp {
            code: code.to_string(),
        })?;

        let outcome = tokio::select! {
            outcome = self.lookup.lookup(code) => Some(outcome),
            _ = self.session.cancelled() => None,
        };
        self.session.end_session();

        match outcome {
            Some(outcome) => self.present(code, outcome),
            None => {
                tracing::info!("Lookup for {} abandoned", code);
                self.presenter.show(Screen::Cleared)?;
                Ok(CycleOutcome::Cancelled)
            }
        }
    }

    /// Re-issues the lookup for a code already scanned (the "try again"
    /// action after a network error). No scan session is opened.
    pub async fn retry_lookup(&mut self, code: &str) -> Result<CycleOutcome> {
        self.presenter.show(Screen::LookingUp {
            code: code.to_string(),
        })?;

        let outcome = tokio::select! {
            outcome = self.lookup.lookup(code) => outcome,
            _ = self.shutdown.cancelled() => return Ok(CycleOutcome::Cancelled),
        };
        self.present(code, outcome)
    }

    /// Looks up a code supplied directly, e.g. typed by the user.
    pub async fn lookup_code(&mut self, code: &str) -> Result<CycleOutcome> {
        self.retry_lookup(code).await
    }

    fn present(&mut self, code: &str, outcome: LookupOutcome) -> Result<CycleOutcome> {
        self.presenter.present(code, outcome.clone())?;
        Ok(CycleOutcome::Presented {
            code: code.to_string(),
            outcome,
        })
    }

    /// Interactive loop: scan, present, then ask the user what to do next.
    /// Nothing is retried unless the user asks for it.
    pub async fn run<P: Prompt>(&mut self, prompt: &mut P) -> Result<()> {
        let mut last_code: Option<String> = None;
        let mut action = UserAction::Rescan;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let cycle = match (action, last_code.clone()) {
                (UserAction::Quit, _) => break,
                (UserAction::RetryLookup, Some(code)) => self.retry_lookup(&code).await?,
                (UserAction::RetryLookup, None) | (UserAction::Rescan, _) => {
                    self.scan_once().await?
                }
            };

            if let CycleOutcome::Presented { code, .. } = cycle {
                last_code = Some(code);
            }

            if self.shutdown.is_cancelled() {
                break;
            }
            action = tokio::select! {
                action = prompt.next_action() => action,
                _ = self.shutdown.cancelled() => UserAction::Quit,
            };
        }

        self.session.end_session();
        tracing::info!("👋 Scanner closed");
        Ok(())
    }
}
