use crate::adapters::wedge::SharedLines;
use crate::domain::ports::{Prompt, Screen, UserAction, View};
use crate::utils::error::Result;
use std::io::Write;
use tokio::io::AsyncBufRead;

/// Renders screens as plain text.
pub struct TerminalView<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> View for TerminalView<W> {
    fn render(&mut self, screen: &Screen) -> Result<()> {
        match screen {
            Screen::Scanning => {
                writeln!(self.out, "📷 Scan a barcode (empty line or 'q' to cancel)")?;
            }
            Screen::PermissionDenied { message } => {
                writeln!(self.out, "🚫 Scanner unavailable: {}", message)?;
                writeln!(self.out, "   Grant access, then press Enter to try again")?;
            }
            Screen::LookingUp { code } => {
                writeln!(self.out, "🔎 Looking up {} ...", code)?;
            }
            Screen::NutritionFacts(view) => {
                writeln!(self.out, "✅ Nutrition facts for {}", view.code)?;
                let width = view.rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
                for (key, value) in &view.rows {
                    writeln!(self.out, "   {:<width$}  {}", key, value, width = width)?;
                }
                writeln!(
                    self.out,
                    "   (retrieved {})",
                    view.retrieved_at.format("%Y-%m-%d %H:%M:%S UTC")
                )?;
            }
            Screen::NotFound { code } => {
                writeln!(self.out, "❔ No nutrition facts found for {}", code)?;
            }
            Screen::NetworkError { code, reason } => {
                writeln!(self.out, "📡 Network error while looking up {}: {}", code, reason)?;
                writeln!(self.out, "   Press 'r' to try again")?;
            }
            Screen::UnexpectedResponse { code, reason } => {
                writeln!(
                    self.out,
                    "❌ Unexpected response from the nutrition service for {}: {}",
                    code, reason
                )?;
            }
            Screen::Cleared => {}
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Reads the next action from the same input the scanner types into.
pub struct TerminalPrompt<R, W: Write + Send> {
    input: SharedLines<R>,
    out: W,
}

impl<R, W> TerminalPrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    pub fn new(input: SharedLines<R>, out: W) -> Self {
        Self { input, out }
    }
}

pub fn parse_action(line: &str) -> UserAction {
    match line.trim().to_ascii_lowercase().as_str() {
        "r" | "retry" => UserAction::RetryLookup,
        "q" | "quit" | "exit" => UserAction::Quit,
        _ => UserAction::Rescan,
    }
}

#[async_trait::async_trait]
impl<R, W> Prompt for TerminalPrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    async fn next_action(&mut self) -> UserAction {
        if writeln!(self.out, "[Enter] scan again  [r] retry lookup  [q] quit")
            .and_then(|_| self.out.flush())
            .is_err()
        {
            return UserAction::Quit;
        }

        let mut lines = self.input.lock().await;
        match lines.next_line().await {
            Ok(Some(line)) => parse_action(&line),
            Ok(None) => UserAction::Quit,
            Err(e) => {
                tracing::warn!("⚠️ Failed to read input: {}", e);
                UserAction::Quit
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::wedge::shared_lines;
    use crate::core::presenter::screen_for;
    use crate::domain::model::{LookupOutcome, NutritionRecord};
    use tokio::io::BufReader;

    #[test]
    fn test_renders_nutrition_rows() {
        let item = serde_json::json!({"name": "Test Bar", "calories": 200});
        let screen = screen_for(
            "0123456789012",
            LookupOutcome::Success(NutritionRecord::from_json_object(item.as_object().unwrap())),
        );

        let mut view = TerminalView::new(Vec::new());
        view.render(&screen).unwrap();
        let text = String::from_utf8(view.into_inner()).unwrap();

        assert!(text.contains("Nutrition facts for 0123456789012"));
        assert!(text.contains("name      Test Bar"));
        assert!(text.contains("calories  200"));
    }

    #[test]
    fn test_network_error_offers_retry() {
        let mut view = TerminalView::new(Vec::new());
        view.render(&screen_for("1", LookupOutcome::NetworkError("timed out".into())))
            .unwrap();
        let text = String::from_utf8(view.into_inner()).unwrap();
        assert!(text.contains("timed out"));
        assert!(text.contains("'r'"));
    }

    #[test]
    fn test_parse_action() {
        assert_eq!(parse_action(""), UserAction::Rescan);
        assert_eq!(parse_action(" R "), UserAction::RetryLookup);
        assert_eq!(parse_action("quit"), UserAction::Quit);
    }

    #[tokio::test]
    async fn test_prompt_reads_actions_until_eof() {
        let input = shared_lines(BufReader::new("r\n\n".as_bytes()));
        let mut prompt = TerminalPrompt::new(input, Vec::new());

        assert_eq!(prompt.next_action().await, UserAction::RetryLookup);
        assert_eq!(prompt.next_action().await, UserAction::Rescan);
        assert_eq!(prompt.next_action().await, UserAction::Quit);
    }
}
