use crate::config::Credentials;
use crate::domain::model::{ScanResult, ScannerSettings};
use crate::domain::ports::{DecodeNotifier, ScanEvent, Scanner};
use crate::utils::error::{AppError, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Decoded(ScanResult),
    Cancelled,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Scanning => "scanning",
            SessionState::Decoded(_) => "decoded",
            SessionState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Decoded(ScanResult),
    Cancelled,
}

/// UI side of an active session: lets the user abandon it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    notifier: DecodeNotifier,
}

impl SessionHandle {
    pub fn cancel(&self) {
        if !self.notifier.cancelled() {
            tracing::debug!("Cancel ignored, session already ended");
        }
    }
}

/// Owns one scanning attempt at a time: `Idle -> Scanning -> (Decoded | Cancelled) -> Idle`.
///
/// The camera is held from `start_session` until `end_session`; dropping the
/// controller while a session is open releases it as well.
pub struct ScanSession<S: Scanner> {
    scanner: S,
    state: SessionState,
    events: Option<mpsc::UnboundedReceiver<ScanEvent>>,
    shutdown: CancellationToken,
    activation: CancellationToken,
    ignored_decodes: usize,
}

impl<S: Scanner> ScanSession<S> {
    pub fn new(scanner: S) -> Self {
        Self::with_shutdown(scanner, CancellationToken::new())
    }

    /// Every activation is cancelled when `shutdown` fires.
    pub fn with_shutdown(scanner: S, shutdown: CancellationToken) -> Self {
        let activation = shutdown.child_token();
        Self {
            scanner,
            state: SessionState::Idle,
            events: None,
            shutdown,
            activation,
            ignored_decodes: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    /// Decode notifications dropped by the single-transition guard since the
    /// controller was created.
    pub fn ignored_decodes(&self) -> usize {
        self.ignored_decodes
    }

    /// Token tied to the current activation; cancelled when the user
    /// abandons the session or the session ends.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.activation.clone()
    }

    pub fn start_session(
        &mut self,
        credentials: &Credentials,
        settings: &ScannerSettings,
    ) -> Result<SessionHandle> {
        if self.state != SessionState::Idle {
            return Err(AppError::SessionStateError {
                expected: SessionState::Idle.name().to_string(),
                actual: self.state.name().to_string(),
            });
        }

        self.scanner.apply_settings(settings);

        let (notifier, rx) = DecodeNotifier::channel();
        // 權限被拒時維持 Idle，不自動重試
        self.scanner
            .start_scanning(&credentials.scanner_license_key, notifier.clone())?;

        self.events = Some(rx);
        self.activation = self.shutdown.child_token();
        self.state = SessionState::Scanning;
        tracing::debug!(
            "Scan session started ({} symbologies enabled)",
            settings.symbologies.len()
        );

        Ok(SessionHandle { notifier })
    }

    /// Applies one event. Only the first decode of an activation moves the
    /// state; later ones are dropped.
    pub fn handle_event(&mut self, event: ScanEvent) -> Option<SessionOutcome> {
        match event {
            ScanEvent::Decoded(result) if self.state == SessionState::Scanning => {
                tracing::info!("📷 Decoded {} barcode {}", result.symbology, result.code);
                self.state = SessionState::Decoded(result.clone());
                Some(SessionOutcome::Decoded(result))
            }
            ScanEvent::Decoded(result) => {
                self.ignored_decodes += 1;
                tracing::debug!(
                    "Ignoring decode of {} while session is {}",
                    result.code,
                    self.state.name()
                );
                None
            }
            ScanEvent::Cancelled
                if matches!(
                    self.state,
                    SessionState::Scanning | SessionState::Decoded(_)
                ) =>
            {
                tracing::info!("Scan session cancelled by user");
                self.activation.cancel();
                self.state = SessionState::Cancelled;
                Some(SessionOutcome::Cancelled)
            }
            ScanEvent::Cancelled => None,
        }
    }

    /// Waits for the scanning activation to finish. A closed event queue
    /// (scanner view torn down) counts as cancellation.
    pub async fn next_outcome(&mut self) -> Result<SessionOutcome> {
        if self.state != SessionState::Scanning {
            return Err(AppError::SessionStateError {
                expected: SessionState::Scanning.name().to_string(),
                actual: self.state.name().to_string(),
            });
        }

        let activation = self.activation.clone();
        loop {
            let event = match self.events.as_mut() {
                Some(rx) => tokio::select! {
                    event = rx.recv() => event,
                    _ = activation.cancelled() => None,
                },
                None => None,
            };

            let event = event.unwrap_or(ScanEvent::Cancelled);
            if let Some(outcome) = self.handle_event(event) {
                return Ok(outcome);
            }
        }
    }

    /// Resolves once the current activation is abandoned. Used to race an
    /// in-flight lookup; never resolves on its own after a clean decode.
    pub async fn cancelled(&mut self) {
        let activation = self.activation.clone();
        loop {
            let event = match self.events.as_mut() {
                Some(rx) => tokio::select! {
                    event = rx.recv() => event,
                    _ = activation.cancelled() => return,
                },
                None => {
                    activation.cancelled().await;
                    return;
                }
            };

            match event {
                Some(event) => {
                    if let Some(SessionOutcome::Cancelled) = self.handle_event(event) {
                        return;
                    }
                }
                // 掃描器已放掉通知端，只剩 token 能取消
                None => self.events = None,
            }
        }
    }

    /// Releases the camera and returns to `Idle`. No-op when already idle.
    pub fn end_session(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }

        self.scanner.stop_scanning();
        self.events = None;
        self.activation.cancel();
        tracing::debug!("Scan session ended from {}", self.state.name());
        self.state = SessionState::Idle;
    }
}

impl<S: Scanner> Drop for ScanSession<S> {
    fn drop(&mut self) {
        self.end_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Symbology;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CameraLog {
        starts: usize,
        stops: usize,
        active: bool,
        notifier: Option<DecodeNotifier>,
        settings: Option<ScannerSettings>,
    }

    #[derive(Clone, Default)]
    struct MockScanner {
        log: Arc<Mutex<CameraLog>>,
        deny: bool,
    }

    impl MockScanner {
        fn denied() -> Self {
            Self {
                deny: true,
                ..Default::default()
            }
        }

        fn notifier(&self) -> DecodeNotifier {
            self.log.lock().unwrap().notifier.clone().unwrap()
        }

        fn camera_active(&self) -> bool {
            self.log.lock().unwrap().active
        }
    }

    impl Scanner for MockScanner {
        fn apply_settings(&mut self, settings: &ScannerSettings) {
            self.log.lock().unwrap().settings = Some(settings.clone());
        }

        fn start_scanning(&mut self, _license_key: &str, notifier: DecodeNotifier) -> Result<()> {
            if self.deny {
                return Err(AppError::PermissionError {
                    message: "camera access denied".to_string(),
                });
            }
            let mut log = self.log.lock().unwrap();
            log.starts += 1;
            log.active = true;
            log.notifier = Some(notifier);
            Ok(())
        }

        fn stop_scanning(&mut self) {
            let mut log = self.log.lock().unwrap();
            log.stops += 1;
            log.active = false;
            log.notifier = None;
        }

        fn is_scanning(&self) -> bool {
            self.log.lock().unwrap().active
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            scanner_license_key: "license".to_string(),
            nutrition_app_id: "id".to_string(),
            nutrition_app_key: "key".to_string(),
        }
    }

    fn ean(code: &str) -> ScanResult {
        ScanResult::new(Symbology::Ean13, code)
    }

    #[tokio::test]
    async fn test_duplicate_decodes_transition_once() {
        let scanner = MockScanner::default();
        let mut session = ScanSession::new(scanner.clone());
        session
            .start_session(&credentials(), &ScannerSettings::default())
            .unwrap();

        // 廠商 SDK 已知問題：同一次掃描可能回報兩次
        let notifier = scanner.notifier();
        assert!(notifier.decoded(ean("0123456789012")));
        assert!(notifier.decoded(ean("0123456789012")));
        assert!(notifier.decoded(ean("4006381333931")));

        let outcome = session.next_outcome().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Decoded(ean("0123456789012")));
        assert_eq!(session.state(), &SessionState::Decoded(ean("0123456789012")));

        // 之後的事件只會被丟棄
        assert!(session.handle_event(ScanEvent::Decoded(ean("1"))).is_none());
        assert!(matches!(session.state(), SessionState::Decoded(_)));

        // next_outcome is only valid while scanning
        assert!(matches!(
            session.next_outcome().await,
            Err(AppError::SessionStateError { .. })
        ));
    }

    #[tokio::test]
    async fn test_queued_duplicates_are_counted_after_decode() {
        let scanner = MockScanner::default();
        let mut session = ScanSession::new(scanner.clone());
        session
            .start_session(&credentials(), &ScannerSettings::default())
            .unwrap();

        let notifier = scanner.notifier();
        notifier.decoded(ean("0123456789012"));
        notifier.decoded(ean("0123456789012"));
        session.next_outcome().await.unwrap();

        // drain the queue the way the lookup race does, then cancel
        notifier.cancelled();
        session.cancelled().await;
        assert_eq!(session.ignored_decodes(), 1);
        assert_eq!(session.state(), &SessionState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_releases_camera() {
        let scanner = MockScanner::default();
        let mut session = ScanSession::new(scanner.clone());
        let handle = session
            .start_session(&credentials(), &ScannerSettings::default())
            .unwrap();
        assert!(scanner.camera_active());

        handle.cancel();
        let outcome = session.next_outcome().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert!(session.cancellation_token().is_cancelled());

        session.end_session();
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(!scanner.camera_active());
        assert_eq!(scanner.log.lock().unwrap().stops, 1);

        // a cancel after the session ended goes nowhere
        handle.cancel();
    }

    #[tokio::test]
    async fn test_closed_event_queue_counts_as_cancel() {
        let scanner = MockScanner::default();
        let mut session = ScanSession::new(scanner.clone());
        let handle = session
            .start_session(&credentials(), &ScannerSettings::default())
            .unwrap();

        drop(handle);
        scanner.log.lock().unwrap().notifier = None;

        assert_eq!(session.next_outcome().await.unwrap(), SessionOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_scanning() {
        let shutdown = CancellationToken::new();
        let scanner = MockScanner::default();
        let mut session = ScanSession::with_shutdown(scanner.clone(), shutdown.clone());
        session
            .start_session(&credentials(), &ScannerSettings::default())
            .unwrap();

        shutdown.cancel();
        assert_eq!(session.next_outcome().await.unwrap(), SessionOutcome::Cancelled);
    }

    #[test]
    fn test_permission_denied_stays_idle() {
        let scanner = MockScanner::denied();
        let mut session = ScanSession::new(scanner.clone());

        let result = session.start_session(&credentials(), &ScannerSettings::default());
        assert!(matches!(result, Err(AppError::PermissionError { .. })));
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(!scanner.camera_active());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let scanner = MockScanner::default();
        let mut session = ScanSession::new(scanner.clone());
        session
            .start_session(&credentials(), &ScannerSettings::default())
            .unwrap();

        let result = session.start_session(&credentials(), &ScannerSettings::default());
        assert!(matches!(result, Err(AppError::SessionStateError { .. })));
        assert_eq!(scanner.log.lock().unwrap().starts, 1);
    }

    #[test]
    fn test_settings_are_applied_before_start() {
        let scanner = MockScanner::default();
        let mut session = ScanSession::new(scanner.clone());
        let settings = ScannerSettings {
            symbologies: "qr".parse().unwrap(),
            ..Default::default()
        };
        session.start_session(&credentials(), &settings).unwrap();

        let applied = scanner.log.lock().unwrap().settings.clone().unwrap();
        assert!(applied.symbologies.contains(Symbology::Qr));
        assert_eq!(applied.symbologies.len(), 1);
    }

    #[test]
    fn test_drop_releases_camera() {
        let scanner = MockScanner::default();
        {
            let mut session = ScanSession::new(scanner.clone());
            session
                .start_session(&credentials(), &ScannerSettings::default())
                .unwrap();
            assert!(scanner.camera_active());
        }
        assert!(!scanner.camera_active());
    }

    #[tokio::test]
    async fn test_pending_until_event_arrives() {
        let scanner = MockScanner::default();
        let mut session = ScanSession::new(scanner.clone());
        session
            .start_session(&credentials(), &ScannerSettings::default())
            .unwrap();

        let notifier = scanner.notifier();
        {
            let mut next = tokio_test::task::spawn(session.next_outcome());
            tokio_test::assert_pending!(next.poll());

            notifier.decoded(ean("0123456789012"));
            assert!(next.is_woken());
            let outcome = tokio_test::assert_ready!(next.poll()).unwrap();
            assert_eq!(outcome, SessionOutcome::Decoded(ean("0123456789012")));
        }
    }
}
