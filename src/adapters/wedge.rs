use crate::domain::model::{ScanResult, ScannerSettings, Symbology, SymbologySet};
use crate::domain::ports::{DecodeNotifier, Scanner};
use crate::utils::error::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Line source shared between the scanner and the terminal prompt.
pub type SharedLines<R> = Arc<Mutex<Lines<R>>>;

pub fn shared_lines<R: AsyncBufRead + Unpin>(reader: R) -> SharedLines<R> {
    use tokio::io::AsyncBufReadExt;
    Arc::new(Mutex::new(reader.lines()))
}

/// Handheld "keyboard wedge" scanners type the code followed by Enter.
/// One activation consumes lines until the first usable decode.
pub struct WedgeScanner<R> {
    input: SharedLines<R>,
    symbologies: SymbologySet,
    reader: Option<JoinHandle<()>>,
}

impl<R> WedgeScanner<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(input: SharedLines<R>) -> Self {
        Self {
            input,
            symbologies: SymbologySet::vendor_default(),
            reader: None,
        }
    }
}

/// `CODE` or `SYMBOLOGY:CODE`; `None` for an unknown symbology prefix.
pub fn parse_line(line: &str) -> Option<ScanResult> {
    match line.split_once(':') {
        Some((symbology, code)) if !code.trim().is_empty() => {
            let symbology = symbology.parse::<Symbology>().ok()?;
            Some(ScanResult::new(symbology, code.trim()))
        }
        Some(_) => None,
        None => Some(ScanResult::new(Symbology::infer(line), line)),
    }
}

async fn read_until_decode<R>(
    input: SharedLines<R>,
    symbologies: SymbologySet,
    notifier: DecodeNotifier,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lock().await;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("Scanner input closed");
                notifier.cancelled();
                return;
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to read scanner input: {}", e);
                notifier.cancelled();
                return;
            }
        };

        let line = line.trim();
        if line.is_empty() || line.eq_ignore_ascii_case("q") {
            notifier.cancelled();
            return;
        }

        match parse_line(line) {
            Some(result) if symbologies.contains(result.symbology) => {
                notifier.decoded(result);
                return;
            }
            Some(result) => {
                tracing::debug!("Ignoring {} code, symbology disabled", result.symbology);
            }
            None => tracing::warn!("⚠️ Unreadable scanner input: {}", line),
        }
    }
}

impl<R> Scanner for WedgeScanner<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn apply_settings(&mut self, settings: &ScannerSettings) {
        // 鍵盤式掃描器沒有鏡頭方向與 MSI 檢查碼設定
        self.symbologies = settings.symbologies.clone();
    }

    fn start_scanning(&mut self, _license_key: &str, notifier: DecodeNotifier) -> Result<()> {
        self.stop_scanning();
        let task = read_until_decode(self.input.clone(), self.symbologies.clone(), notifier);
        self.reader = Some(tokio::spawn(task));
        Ok(())
    }

    fn stop_scanning(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    fn is_scanning(&self) -> bool {
        self.reader
            .as_ref()
            .map(|reader| !reader.is_finished())
            .unwrap_or(false)
    }
}

impl<R> Drop for WedgeScanner<R> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ScanEvent;
    use tokio::io::BufReader;

    fn scanner_over(text: &'static str) -> WedgeScanner<BufReader<&'static [u8]>> {
        WedgeScanner::new(shared_lines(BufReader::new(text.as_bytes())))
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("0123456789012"),
            Some(ScanResult::new(Symbology::Ean13, "0123456789012"))
        );
        assert_eq!(
            parse_line("qr:https://example.com"),
            Some(ScanResult::new(Symbology::Qr, "https://example.com"))
        );
        assert_eq!(parse_line("bogus:123"), None);
        assert_eq!(parse_line("ean13:"), None);
    }

    #[tokio::test]
    async fn test_first_enabled_code_is_decoded() {
        let mut scanner = scanner_over("msi_plessey:1234\n0123456789012\n96385074\n");
        let (notifier, mut rx) = DecodeNotifier::channel();

        scanner.apply_settings(&ScannerSettings::default());
        scanner.start_scanning("license", notifier).unwrap();

        // MSI Plessey is off by default
        assert_eq!(
            rx.recv().await,
            Some(ScanEvent::Decoded(ScanResult::new(
                Symbology::Ean13,
                "0123456789012"
            )))
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_empty_line_cancels() {
        let mut scanner = scanner_over("\n0123456789012\n");
        let (notifier, mut rx) = DecodeNotifier::channel();

        scanner.start_scanning("license", notifier).unwrap();
        assert_eq!(rx.recv().await, Some(ScanEvent::Cancelled));
    }

    #[tokio::test]
    async fn test_end_of_input_cancels() {
        let mut scanner = scanner_over("");
        let (notifier, mut rx) = DecodeNotifier::channel();

        scanner.start_scanning("license", notifier).unwrap();
        assert_eq!(rx.recv().await, Some(ScanEvent::Cancelled));
    }

    #[tokio::test]
    async fn test_stop_releases_reader() {
        let (client, _server) = tokio::io::duplex(64);
        let mut scanner = WedgeScanner::new(shared_lines(BufReader::new(client)));
        let (notifier, _rx) = DecodeNotifier::channel();

        scanner.start_scanning("license", notifier).unwrap();
        assert!(scanner.is_scanning());

        scanner.stop_scanning();
        assert!(!scanner.is_scanning());
    }
}
