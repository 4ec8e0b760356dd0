//! The `run` subcommand: computes the dashboard, writes the HTML reports and
//! emails them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Args;
use dashfolio_lib::config::DEFAULT_VARS_FILE;
use dashfolio_lib::mail::{build_message, send_message, RenderedReport};
use dashfolio_lib::oauth::{OAuthClient, OAuthCredentials};
use dashfolio_lib::pipeline::{read_csv_table, validate_table};
use dashfolio_lib::retry::{with_retry, RetryConfig};
use dashfolio_lib::sheets::{SheetRange, SheetsClient};
use dashfolio_lib::{
    compute_dashboard, DashboardConfig, DashboardSettings, RawTable, Secrets, VarsFile, YahooSource,
};

use crate::html_output::HtmlReport;
use crate::output::{print_dashboard, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// YAML config describing the portfolio source and parameters
    pub config: PathBuf,

    /// Compute the dashboard as of this date (YYYY-MM-DD) instead of today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Read secrets from the vars file instead of the environment
    #[arg(long)]
    pub local: bool,

    /// Vars file used with --local
    #[arg(long, default_value = DEFAULT_VARS_FILE)]
    pub vars_file: PathBuf,

    /// Read the dummy Google Sheet (GOOGLE_SHEET_DUMMY_ID)
    #[arg(long)]
    pub dummy: bool,

    /// Skip sending the email
    #[arg(long)]
    pub no_email: bool,
}

/// Google identity of the run: who sends, who receives, and the token that
/// authorizes the sheet read and the SMTP login.
struct GoogleSession {
    secrets: Secrets,
    access_token: String,
}

async fn open_session(args: &RunArgs, retry: &RetryConfig) -> Result<GoogleSession> {
    let mut vars = if args.local {
        Some(VarsFile::load(&args.vars_file)?)
    } else {
        None
    };
    let secrets = match &vars {
        Some(v) => Secrets::from_vars_file(v, args.dummy)?,
        None => Secrets::from_env(args.dummy)?,
    };

    let creds = OAuthCredentials {
        client_id: secrets.google_client_id.clone(),
        client_secret: secrets.google_client_secret.clone(),
        refresh_token: secrets.google_refresh_token.clone(),
    };
    let oauth = OAuthClient::new()?;
    let grant = with_retry(retry, "OAuth token", || oauth.refresh(&creds))
        .await
        .context("refreshing Google access token")?;

    if grant.rotated(&secrets.google_refresh_token) {
        match vars.as_mut() {
            Some(v) => v.persist_refresh_token(&grant.refresh_token)?,
            None => tracing::warn!("Google rotated the refresh token; update GOOGLE_REFRESH_TOKEN"),
        }
    }

    Ok(GoogleSession {
        secrets,
        access_token: grant.access_token,
    })
}

async fn read_sheet(
    config: &DashboardConfig,
    session: &GoogleSession,
    retry: &RetryConfig,
) -> Result<RawTable> {
    let range = SheetRange {
        spreadsheet_id: session.secrets.sheet_id()?.to_string(),
        sheet_name: config.portfolio_file.sheet_name.clone(),
        range: config.portfolio_file.range.clone(),
    };
    tracing::info!("Reading portfolio from sheet range {}", range.a1());
    let sheets = SheetsClient::new()?;
    let table = with_retry(retry, "Sheets", || sheets.get_table(&session.access_token, &range))
        .await
        .context("reading portfolio sheet")?;
    Ok(table)
}

fn write_reports(dir: &Path, report: &HtmlReport) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for (name, html) in report.files() {
        let path = dir.join(name);
        std::fs::write(&path, html).with_context(|| format!("writing {}", path.display()))?;
    }
    tracing::info!("Saved reports to {}", dir.display());
    Ok(())
}

pub async fn run(args: &RunArgs, format: &OutputFormat) -> Result<()> {
    let config = DashboardConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let settings = DashboardSettings::from_config(&config)?;
    let retry = RetryConfig::from_env();

    // A CSV portfolio is checked before any Google credentials are touched.
    let mut session = None;
    let raw = match &config.portfolio_file.path {
        Some(path) => {
            tracing::info!("Reading portfolio from {}", path.display());
            read_csv_table(path)?
        }
        None => {
            let opened = open_session(args, &retry).await?;
            let table = read_sheet(&config, &opened, &retry).await?;
            session = Some(opened);
            table
        }
    };
    let (rows, warnings) =
        validate_table(&raw, &settings.schema).context("portfolio table does not match the schema")?;

    if session.is_none() && !args.no_email {
        session = Some(open_session(args, &retry).await?);
    }

    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let source = YahooSource::new();
    let dashboard = compute_dashboard(rows, warnings, &settings, as_of, &source, &source).await;

    let report = HtmlReport::render(&dashboard)?;
    write_reports(&config.output_dir, &report)?;
    print_dashboard(&dashboard, format);

    if let (false, Some(session)) = (args.no_email, session.as_ref()) {
        let rendered = RenderedReport {
            date: as_of.format("%Y-%m-%d").to_string(),
            summary_html: report.summary,
            per_asset_html: report.per_asset,
            indirect_html: report.indirect,
        };
        let message = build_message(
            &session.secrets.sender_email,
            &session.secrets.receiver_email,
            &rendered,
        )?;
        let smtp = config.email.smtp();
        with_retry(&retry, "SMTP", || {
            send_message(
                message.clone(),
                &smtp,
                &session.secrets.sender_email,
                &session.access_token,
            )
        })
        .await
        .context("sending dashboard email")?;
        tracing::info!("Sent dashboard to {}", session.secrets.receiver_email);
    }

    Ok(())
}
