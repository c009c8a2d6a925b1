//! Process startup and service wiring
//!
//! Logging is initialized before anything else so that configuration and
//! wiring failures are reported consistently. All collections live in
//! process memory; the service graph is built once per invocation.

use crate::app::cli::{Cli, Commands};
use crate::app::config::{AppConfig, API_KEY_ENV};
use crate::core::logging::{init_logging, level_for_verbosity};
use crate::core::time::{SystemTimeProvider, TimeProvider};
use crate::identity::{IdentityResolver, RequestContext};
use crate::pipeline::{AnalysisPipeline, GeminiClient, GitCli, GitSource, LanguageModel};
use crate::quota::{QuotaConfig, QuotaLedger};
use crate::repo::RepositoryCache;
use crate::scan::{ScanLifecycle, ScanRecord, ScanStatus};
use crate::service::ScanService;
use crate::store::Collection;
use clap::Parser;
use std::sync::Arc;

/// Parse arguments, initialize logging and run the selected command
pub fn startup() {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| level_for_verbosity(cli.verbosity()).to_string());
    let log_file = cli.log_file.clone();
    let _logger = match init_logging(
        Some(&level),
        cli.log_format.as_deref(),
        log_file.as_deref().and_then(|p| p.to_str()),
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error initializing logging: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("repolens {} starting", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error creating async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(cli.config_file.as_deref()).await;

    match cli.command {
        Commands::Whoami { ip } => {
            let resolver = IdentityResolver::new(config.ip_hash_salt.clone());
            let ctx = anonymous_context(ip);
            println!("{}", resolver.anonymous_id(&ctx));
            println!("anonymous scan limit: {} per {}h", config.anonymous_limit, config.reset_window_hours);
            Ok(())
        }
        Commands::Scan {
            url,
            as_user,
            ip,
            cancel_at,
        } => {
            let service = build_service(&config)?;
            let ctx = match as_user {
                Some(subject) => RequestContext::authenticated(subject),
                None => anonymous_context(ip),
            };
            run_scan(&service, &ctx, &url, cancel_at).await
        }
    }
}

/// Wire the full service graph from configuration
fn build_service(config: &AppConfig) -> Result<ScanService, Box<dyn std::error::Error>> {
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);

    let users = Collection::new("users", Arc::clone(&time));
    let anonymous_users = Collection::new("anonymous_users", Arc::clone(&time));
    let scans = Collection::new("scans", Arc::clone(&time));
    let repositories = Collection::new("repository-cache", Arc::clone(&time));

    let quota_config = QuotaConfig {
        anonymous_limit: config.anonymous_limit,
        reset_window: chrono::Duration::hours(config.reset_window_hours),
        anonymous_retention: chrono::Duration::hours(config.reset_window_hours),
        ..QuotaConfig::default()
    };

    let resolver = IdentityResolver::new(config.ip_hash_salt.clone());
    let ledger = QuotaLedger::new(users, anonymous_users, Arc::clone(&time), quota_config);
    let lifecycle = ScanLifecycle::new(scans, Arc::clone(&time));
    let cache = RepositoryCache::new(repositories, Arc::clone(&time));

    let api_key = config
        .gemini_api_key
        .clone()
        .ok_or_else(|| format!("no Gemini API key configured; set gemini_api_key or {}", API_KEY_ENV))?;

    let git: Arc<dyn GitSource> = Arc::new(GitCli::new(std::time::Duration::from_secs(
        config.clone_timeout_secs,
    ))?);
    let model: Arc<dyn LanguageModel> = Arc::new(GeminiClient::new(
        config.gemini_base_url.clone(),
        api_key,
        config.gemini_model.clone(),
        std::time::Duration::from_secs(config.model_timeout_secs),
    )?);

    let pipeline = AnalysisPipeline::new(git, model, cache.clone(), Arc::clone(&time));
    Ok(ScanService::new(resolver, ledger, lifecycle, pipeline, cache))
}

fn anonymous_context(ip: Option<String>) -> RequestContext {
    match ip {
        Some(ip) => RequestContext::anonymous_from_ip(ip),
        None => RequestContext::default(),
    }
}

/// Submit one scan and stream its document until it settles
async fn run_scan(
    service: &ScanService,
    ctx: &RequestContext,
    url: &str,
    cancel_at: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let receipt = service.submit(ctx, url)?;
    println!("scan {} queued for {}", receipt.scan_id, url);

    let mut rx = service.watch(&receipt.scan_id);
    let mut cancel_requested = false;
    let mut last_line = String::new();

    let finished = loop {
        let scan = rx.borrow_and_update().as_ref().map(|s| s.data.clone());

        if let Some(scan) = scan {
            let line = render_scan_line(&scan);
            if line != last_line {
                println!("{}", line);
                last_line = line;
            }

            if let Some(threshold) = cancel_at {
                if !cancel_requested && !scan.is_terminal() && scan.progress >= threshold {
                    cancel_requested = true;
                    service.cancel(&receipt.scan_id)?;
                    println!("cancellation requested at {}%", scan.progress);
                }
            }

            if scan.is_terminal() {
                break scan;
            }
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Err("scan document dropped before reaching a terminal state".into());
                }
            }
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                cancel_requested = true;
                service.cancel(&receipt.scan_id)?;
                println!("cancellation requested (ctrl-c); waiting for the scan to settle");
            }
        }
    };

    match finished.status {
        ScanStatus::Succeeded => {
            match service.get_analysis(&receipt.repo_id) {
                Some(analysis) => println!("{}", serde_json::to_string_pretty(&analysis)?),
                None => log::warn!("Scan {} succeeded but no analysis document found", receipt.scan_id),
            }
            Ok(())
        }
        _ => {
            let code = finished
                .error_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string());
            Err(format!("scan {} failed: {}", receipt.scan_id, code).into())
        }
    }
}

fn render_scan_line(scan: &ScanRecord) -> String {
    format!("[{}] {:>3}%  {}", scan.status, scan.progress, scan.repo_full_name)
}
