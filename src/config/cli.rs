use crate::domain::model::SymbologySet;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "nutriscan")]
#[command(about = "Scan product barcodes and look up their nutrition facts")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "nutriscan.toml")]
    pub config: String,

    /// Look up a single code without opening a scan session
    #[arg(long)]
    pub code: Option<String>,

    /// Override enabled symbologies (comma separated, e.g. ean13,upca,qr)
    #[arg(long)]
    pub symbologies: Option<SymbologySet>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Symbology;

    #[test]
    fn test_parse_defaults() {
        let args = CliArgs::parse_from(["nutriscan"]);
        assert_eq!(args.config, "nutriscan.toml");
        assert!(args.code.is_none());
        assert!(args.symbologies.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_parse_overrides() {
        let args = CliArgs::parse_from([
            "nutriscan",
            "--config",
            "custom.toml",
            "--code",
            "0123456789012",
            "--symbologies",
            "ean13,qr",
            "-v",
        ]);
        assert_eq!(args.config, "custom.toml");
        assert_eq!(args.code.as_deref(), Some("0123456789012"));
        let set = args.symbologies.unwrap();
        assert!(set.contains(Symbology::Qr));
        assert_eq!(set.len(), 2);
        assert!(args.verbose);
    }

    #[test]
    fn test_rejects_unknown_symbology() {
        assert!(CliArgs::try_parse_from(["nutriscan", "--symbologies", "barcode9000"]).is_err());
    }
}
