// Copyright 2026 Sitegauge Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sitegauge::report::{self, SiteSummary};
use sitegauge::{AnalysisResult, AnalyzerConfig, CancelToken, SiteAnalyzer};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sitegauge",
    about = "Measure a page's resources and discover its backend endpoints",
    version
)]
struct Cli {
    /// Site URL to analyze
    url: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Measurement worker-pool size
    #[arg(long, default_value = "8")]
    concurrency: usize,

    /// Custom User-Agent header
    #[arg(long)]
    user_agent: Option<String>,

    /// Print one row per resource instead of the summary
    #[arg(long)]
    list_resources: bool,

    /// Output the structured summary as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,

    /// Suppress the progress bar
    #[arg(long, short)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AnalyzerConfig {
        timeout: Duration::from_secs(cli.timeout),
        concurrency: cli.concurrency,
        ..Default::default()
    };
    if let Some(ua) = cli.user_agent.clone() {
        config.user_agent = ua;
    }

    let analyzer = SiteAnalyzer::new(config);
    let (tx, mut rx) = sitegauge::progress::channel();
    let cancel = CancelToken::new();

    // Ctrl-C abandons the run; in-flight fetches finish or time out.
    let ctrlc_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc_cancel.cancel();
        }
    });

    let bar_task = (!cli.quiet && !cli.json).then(|| {
        tokio::spawn(async move {
            let bar = ProgressBar::new(100);
            if let Ok(style) =
                ProgressStyle::with_template("[{bar:40}] {pos:>3}% {msg}")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            while let Ok(event) = rx.recv().await {
                bar.set_position(u64::from(event.percent));
                bar.set_message(event.message);
                if event.percent >= 100 {
                    break;
                }
            }
            bar.finish_and_clear();
        })
    });

    let result = analyzer.analyze_with(&cli.url, Some(tx), cancel).await?;
    if let Some(task) = bar_task {
        let _ = task.await;
    }

    let summary = report::summary(&result);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if cli.list_resources {
        print_rows(&result);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "sitegauge=debug"
    } else {
        "sitegauge=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn truncate_url(url: &str, width: usize) -> String {
    if url.len() <= width {
        url.to_string()
    } else {
        format!("...{}", &url[url.len() - (width - 3)..])
    }
}

fn print_rows(result: &AnalysisResult) {
    println!(
        "{:<8} {:<64} {:>12} {:>10} {:>8} {:>6}",
        "TYPE", "URL", "SIZE (KB)", "TIME (MS)", "STATUS", "REDIR"
    );
    println!("{}", "-".repeat(114));
    for row in report::resource_rows(result) {
        println!(
            "{:<8} {:<64} {:>12.2} {:>10.2} {:>8} {:>6}",
            row.category.label(),
            truncate_url(&row.url, 64),
            row.size_bytes as f64 / 1024.0,
            row.load_time_ms,
            row.status,
            row.redirects,
        );
    }
    for row in report::api_rows(result) {
        println!(
            "{:<8} {:<64} {:>12.2} {:>10.2} {:>8} {:>6}",
            "api",
            truncate_url(&row.url, 64),
            row.size_bytes as f64 / 1024.0,
            row.load_time_ms,
            row.status,
            row.redirects,
        );
    }
}

fn print_summary(summary: &SiteSummary) {
    println!("{}", "=".repeat(70));
    println!("ANALYSIS SUMMARY: {}", summary.url);
    println!("{}", "=".repeat(70));
    println!("Resources found:       {}", summary.total_resources);
    println!("API endpoints found:   {}", summary.total_apis_analyzed);
    println!(
        "Total page weight:     {:.2} MB",
        summary.total_size_bytes as f64 / 1024.0 / 1024.0
    );
    println!("Analysis wall time:    {:.2} s", summary.total_time_s);

    println!("\nHTTP STATISTICS");
    println!("  Requests:            {}", summary.total_requests);
    println!("  Failed requests:     {}", summary.failed_requests);
    println!(
        "  Response time:       avg {:.3}s  min {:.3}s  max {:.3}s  stddev {:.3}s",
        summary.response_times.avg_s,
        summary.response_times.min_s,
        summary.response_times.max_s,
        summary.response_times.stddev_s,
    );

    println!("\nSTATUS CODES");
    for entry in &summary.status_codes {
        println!("  {}: {} requests", entry.status, entry.count);
    }

    println!("\nTOP CONTENT TYPES");
    for entry in summary.content_types.iter().take(5) {
        println!("  {}: {}", entry.content_type, entry.count);
    }

    println!("\nBY RESOURCE TYPE");
    for cat in &summary.categories {
        println!(
            "  {:<6} count {:<4} size {:>9.2} KB  avg time {:.2}s",
            cat.category.label(),
            cat.count,
            cat.total_size_bytes as f64 / 1024.0,
            cat.avg_load_time_s,
        );
        if let Some(missing) = cat.images_missing_alt {
            if missing > 0 {
                println!("         images without alt text: {missing}");
            }
        }
        if let (Some(async_n), Some(defer_n)) = (cat.async_scripts, cat.defer_scripts) {
            println!("         async scripts: {async_n}, deferred: {defer_n}");
        }
    }

    if !summary.api_categories.is_empty() {
        println!("\nAPI ENDPOINTS");
        for api in &summary.api_categories {
            println!(
                "  {:<9} count {:<4} avg time {:.3}s",
                api.category.label(),
                api.count,
                api.avg_load_time_s,
            );
        }
    }

    if !summary.slowest.is_empty() {
        println!("\nSLOWEST RESOURCES");
        for entry in summary.slowest.iter().take(5) {
            println!(
                "  {:>7.2}s  {}",
                entry.load_time_s,
                truncate_url(&entry.url, 60)
            );
        }
    }

    println!("\nOPTIMIZATION");
    println!(
        "  Cacheable resources:  {:.1}%",
        summary.cache_coverage * 100.0
    );
    println!(
        "  Compressed resources: {:.1}%",
        summary.compression_coverage * 100.0
    );
    if summary.slow_resources > 0 {
        println!("  Slow resources (>0.5s): {}", summary.slow_resources);
    }
    println!("{}", "=".repeat(70));
}
