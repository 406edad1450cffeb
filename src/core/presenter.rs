use crate::config::Credentials;
use crate::core::session::{ScanSession, SessionHandle};
use crate::domain::model::{LookupOutcome, NutritionView, ScannerSettings};
use crate::domain::ports::{Scanner, Screen, View};
use crate::utils::error::Result;

/// Every outcome gets its own screen.
pub fn screen_for(code: &str, outcome: LookupOutcome) -> Screen {
    let code = code.to_string();
    match outcome {
        LookupOutcome::Success(record) => Screen::NutritionFacts(NutritionView::new(&code, record)),
        LookupOutcome::NotFound => Screen::NotFound { code },
        LookupOutcome::NetworkError(reason) => Screen::NetworkError { code, reason },
        LookupOutcome::InvalidResponse(reason) => Screen::UnexpectedResponse { code, reason },
    }
}

pub struct ResultPresenter<V: View> {
    view: V,
    current: Option<Screen>,
}

impl<V: View> ResultPresenter<V> {
    pub fn new(view: V) -> Self {
        Self {
            view,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Screen> {
        self.current.as_ref()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Shows a transient screen (scanning, looking up, permission denied).
    pub fn show(&mut self, screen: Screen) -> Result<()> {
        self.view.render(&screen)?;
        self.current = Some(screen);
        Ok(())
    }

    pub fn present(&mut self, code: &str, outcome: LookupOutcome) -> Result<&Screen> {
        let screen = screen_for(code, outcome);
        self.view.render(&screen)?;
        Ok(&*self.current.insert(screen))
    }

    /// Drops the shown result and opens a fresh scan session.
    pub fn request_rescan<S: Scanner>(
        &mut self,
        session: &mut ScanSession<S>,
        credentials: &Credentials,
        settings: &ScannerSettings,
    ) -> Result<SessionHandle> {
        session.end_session();
        self.show(Screen::Cleared)?;
        let handle = session.start_session(credentials, settings)?;
        self.show(Screen::Scanning)?;
        Ok(handle)
    }
}
