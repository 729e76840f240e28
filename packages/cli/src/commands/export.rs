use super::ServerArgs;
use crate::config::Config;
use anyhow::{Context, Result};
use bbdsl_live_sync::{DerivationService, ExportFormat, ExportOptions, HttpDerivationService};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// BBDSL document to export
    pub file: PathBuf,

    /// Target format (bml, bboalert, svg, html, pbn)
    #[arg(short, long)]
    pub format: ExportFormat,

    /// Output file (defaults to export.<format> in the current directory)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub server: ServerArgs,

    /// Output locale (overrides config)
    #[arg(long)]
    pub locale: Option<String>,

    /// Render suits as ♠♥♦♣
    #[arg(long)]
    pub suit_symbols: bool,

    /// Number of deals to generate (pbn only)
    #[arg(long)]
    pub deals: Option<u32>,

    /// Deal generator seed (pbn only)
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ExportArgs {
    fn options(&self, config: &Config) -> ExportOptions {
        let mut options = config.sync.export.clone();
        if let Some(locale) = &self.locale {
            options.locale = locale.clone();
        }
        if self.suit_symbols {
            options.suit_symbols = true;
        }
        if let Some(deals) = self.deals {
            options.n_deals = deals;
        }
        if self.seed.is_some() {
            options.seed = self.seed;
        }
        options
    }

    fn output_path(&self, cwd: &Path) -> PathBuf {
        self.out
            .clone()
            .unwrap_or_else(|| cwd.join(self.format.file_name()))
    }
}

pub async fn export(args: ExportArgs, cwd: &Path) -> Result<()> {
    let config = Config::load(cwd)?;
    let (endpoints, session) = args.server.resolve(&config)?;
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("Cannot read {}", args.file.display()))?;

    println!(
        "📤 {} {} as {}",
        "Exporting".green().bold(),
        args.file.display(),
        args.format.as_str().bold()
    );

    let service = HttpDerivationService::new(endpoints, session)?;
    let options = args.options(&config);
    let body = tokio::time::timeout(
        config.sync.request_timeout(),
        service.derive(&text, args.format, &options),
    )
    .await
    .context("Export timed out")??;

    let out = args.output_path(cwd);
    fs::write(&out, &body).with_context(|| format!("Cannot write {}", out.display()))?;
    info!(format = %args.format, bytes = body.len(), "Export written");

    println!(
        "   {} {} ({}, {} bytes)",
        "✓".green(),
        out.display(),
        args.format.content_type(),
        body.len()
    );
    Ok(())
}
