//! FieldScan CLI - Command-line interface
//!
//! This binary runs the analysis queue against a demo provider so operators
//! can exercise submission, batching, retries, metrics, and health without
//! a live imagery backend.

use chrono::{NaiveDate, Utc};
use clap::Parser;
use fieldscan::config::QueueConfig;
use fieldscan::gateway::{BatchRequest, FieldRef, SubmitOptions};
use fieldscan::geo::BoundingBox;
use fieldscan::job::{AnalysisPayload, DateRange, Priority};
use fieldscan::provider::{AnalysisError, AnalysisProvider};
use fieldscan::service::AnalysisQueueService;
use fieldscan::store::MemoryJobStore;
use std::collections::HashSet;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fieldscan")]
#[command(version = fieldscan::VERSION)]
#[command(about = "Run the field analysis queue against a demo provider", long_about = None)]
struct Args {
    /// Number of fields in the demo batch
    #[arg(long, default_value = "5")]
    fields: usize,

    /// Number of queue workers
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Simulated provider latency per analysis, in milliseconds
    #[arg(long, default_value = "200")]
    latency_ms: u64,

    /// Field IDs the demo provider should fail (repeatable)
    #[arg(long = "fail-field")]
    fail_fields: Vec<String>,

    /// Per-job wall-clock budget in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Retry backoff base in milliseconds (0 retries immediately)
    #[arg(long, default_value = "0")]
    backoff_ms: u64,
}

/// Demo provider: waits for the configured latency, then succeeds with a
/// fabricated summary unless the field is on the failure list.
struct DemoProvider {
    latency: Duration,
    fail_fields: HashSet<String>,
}

impl AnalysisProvider for DemoProvider {
    async fn analyze(
        &self,
        payload: &AnalysisPayload,
    ) -> Result<serde_json::Value, AnalysisError> {
        tokio::time::sleep(self.latency).await;

        if self.fail_fields.contains(&payload.field_id) {
            return Err(AnalysisError::new("demo provider: scene rejected"));
        }

        let (lat, lon) = payload.bounding_box.center();
        Ok(serde_json::json!({
            "field_id": payload.field_id,
            "center": { "lat": lat, "lon": lon },
            "target_date": payload.target_date,
            "scenes_used": 1,
        }))
    }

    fn name(&self) -> &str {
        "demo"
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    if args.fields == 0 {
        eprintln!("Error: --fields must be at least 1");
        process::exit(1);
    }
    if args.workers == 0 {
        eprintln!("Error: --workers must be at least 1");
        process::exit(1);
    }

    let config = QueueConfig {
        worker_count: args.workers,
        job_timeout: Duration::from_secs(args.timeout_secs),
        retry_backoff_base: Duration::from_millis(args.backoff_ms),
        ..Default::default()
    };

    let provider = DemoProvider {
        latency: Duration::from_millis(args.latency_ms),
        fail_fields: args.fail_fields.iter().cloned().collect(),
    };

    let service = AnalysisQueueService::start(MemoryJobStore::new(), provider, config);

    println!("Submitting a batch of {} fields...", args.fields);
    let today = Utc::now().date_naive();
    let window_start = today - chrono::Duration::days(14);

    let request = BatchRequest {
        user_id: "operator".to_string(),
        fields: (0..args.fields).map(demo_field).collect(),
        date_range: demo_range(window_start, today),
        options: Default::default(),
    };

    let receipt = match service
        .submit_batch(
            request,
            SubmitOptions {
                priority: Priority::ON_DEMAND,
                max_attempts: 3,
            },
        )
        .await
    {
        Ok(receipt) => receipt,
        Err(e) => {
            eprintln!("Error submitting batch: {}", e);
            service.shutdown().await;
            process::exit(1);
        }
    };
    println!("  Batch {} queued with {} jobs", receipt.batch_id, receipt.jobs);
    println!();

    // Poll until every child is terminal.
    loop {
        let summary = match service.batch_summary(receipt.batch_id).await {
            Ok(summary) => summary,
            Err(e) => {
                eprintln!("Error reading batch: {}", e);
                service.shutdown().await;
                process::exit(1);
            }
        };
        if summary.is_settled() {
            println!(
                "Batch settled: {} completed / {} failed (of {})",
                summary.completed, summary.failed, summary.total
            );
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    println!();

    match service.metrics().await {
        Ok(m) => {
            println!("Queue metrics:");
            println!("  total jobs:       {}", m.total_jobs);
            println!("  completed:        {}", m.completed);
            println!("  failed:           {}", m.failed);
            println!("  success rate:     {:.1}%", m.success_rate * 100.0);
            println!("  error rate:       {:.1}%", m.error_rate * 100.0);
            if let Some(avg) = m.avg_processing_time_ms {
                println!("  avg processing:   {:.0} ms", avg);
            }
            if let Some(avg) = m.avg_wait_time_ms {
                println!("  avg queue wait:   {:.0} ms", avg);
            }
        }
        Err(e) => eprintln!("Error reading metrics: {}", e),
    }

    match service.health().await {
        Ok(h) => {
            println!(
                "Health: {} (backlog {}, capacity {})",
                h.status, h.queue_backlog, h.processing_capacity
            );
        }
        Err(e) => eprintln!("Error reading health: {}", e),
    }

    service.shutdown().await;
}

/// Generates a small demo field near the Swiss plateau, offset per index.
fn demo_field(index: usize) -> FieldRef {
    let south = 47.0 + (index as f64) * 0.01;
    let west = 8.0 + (index as f64) * 0.01;
    FieldRef {
        field_id: format!("field-{:03}", index + 1),
        // Offsets keep every box well inside world bounds.
        bounding_box: BoundingBox {
            south,
            north: south + 0.005,
            west,
            east: west + 0.005,
        },
    }
}

fn demo_range(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange::new(start, end).unwrap_or(DateRange { start: end, end })
}
