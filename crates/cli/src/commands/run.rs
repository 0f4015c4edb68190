//! `stepwise run`: run one task through the reasoning loop.

use std::sync::Arc;
use std::time::Duration;
use stepwise_agent::{ReasoningLoop, TaskReport};
use stepwise_business::{BusinessClient, PlatformUsageSink};
use stepwise_config::{AppConfig, TelemetryConfig};
use stepwise_providers::DecodingProvider;
use stepwise_telemetry::{FanoutSink, TracingSink, UsageLedger, UsageSink};

pub struct RunArgs {
    pub task_id: Option<String>,
    pub text: String,
    pub api_url: Option<String>,
    pub json: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(url) = args.api_url {
        config.business.api_url = url;
        config.validate()?;
    }

    let task_id = args
        .task_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let decoder = Arc::new(DecodingProvider::from_config(&config)?);
    let api = Arc::new(
        BusinessClient::for_task(
            &config.business.api_url,
            &task_id,
            Duration::from_secs(config.business.timeout_secs),
        )
        .with_api_key(config.business.api_key.clone()),
    );

    let ledger = Arc::new(UsageLedger::new());
    let sink = usage_sink(&config.telemetry, &config.business.api_url, ledger.clone());

    let runner = ReasoningLoop::from_config(decoder, api, &config).with_usage_sink(sink);
    let report = runner.run_task(&task_id, &args.text).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &ledger);
    }

    Ok(())
}

/// Sinks for one run: the ledger always, tracing and the platform log when enabled.
pub fn usage_sink(
    telemetry: &TelemetryConfig,
    api_url: &str,
    ledger: Arc<UsageLedger>,
) -> Arc<dyn UsageSink> {
    let mut fanout = FanoutSink::new().with(ledger);
    if telemetry.enabled {
        fanout = fanout.with(Arc::new(TracingSink));
        if telemetry.log_to_platform {
            fanout = fanout.with(Arc::new(PlatformUsageSink::new(api_url)));
        }
    }
    Arc::new(fanout)
}

fn print_report(report: &TaskReport, ledger: &UsageLedger) {
    let record = &report.termination;
    let summary = ledger.summary();

    println!();
    println!("  Task:      {}", report.task_id);
    println!("  Outcome:   {}", record.outcome);
    println!("  Source:    {:?}", record.source);
    println!("  Steps:     {}", report.steps);
    println!(
        "  Tokens:    {} ({} calls)",
        summary.totals.total_tokens, summary.totals.calls
    );
    if !record.links.is_empty() {
        println!("  Links:");
        for link in &record.links {
            println!("    {:?} {}", link.kind, link.id);
        }
    }
    println!();
    for line in record.message.lines() {
        println!("  {line}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_telemetry_keeps_only_the_ledger() {
        let telemetry = TelemetryConfig {
            enabled: false,
            log_to_platform: true,
        };
        // Building must not touch the network.
        let _sink = usage_sink(&telemetry, "http://localhost:1", Arc::new(UsageLedger::new()));
    }

    #[tokio::test]
    async fn ledger_receives_records_through_the_fanout() {
        let telemetry = TelemetryConfig {
            enabled: true,
            log_to_platform: false,
        };
        let ledger = Arc::new(UsageLedger::new());
        let sink = usage_sink(&telemetry, "http://localhost:1", ledger.clone());

        let record = stepwise_telemetry::UsageRecord::new(
            "t1",
            "gpt-4o",
            0.2,
            stepwise_core::UsageStats::default(),
        );
        sink.record(&record).await.unwrap();
        assert_eq!(ledger.len(), 1);
    }
}
