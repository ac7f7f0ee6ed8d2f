//! Warpfield Simulator CLI
//!
//! Run deterministic interaction scenarios against the warp engine.

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use warpfield_core::Renderer;
use warpfield_sim::scenarios::ScenarioId;
use warpfield_sim::{ScenarioResult, ScenarioRunner, SimConfig};

/// Warpfield deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "warpfield-sim")]
#[command(about = "Run deterministic warp scenarios for Warpfield", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of nodes in the field
    #[arg(short, long, default_value = "500")]
    nodes: usize,

    /// Scenario to run (single_warp, chained_warps, click_during_warp,
    /// programmatic_rewarp, resize_mid_warp, hover_sweep, embedding_probe, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum simulated duration per scenario in seconds
    #[arg(short, long, default_value = "30")]
    duration: f64,

    /// Simulated frame rate
    #[arg(long, default_value = "60")]
    fps: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export recorded frames to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Load a SimConfig JSON file; flags given explicitly still apply on top
    #[arg(long)]
    config: Option<String>,

    /// Stream the exported run to a Rerun viewer
    #[cfg(feature = "visualization")]
    #[arg(long)]
    rerun: bool,
}

fn load_config(args: &Args, seed: u64) -> SimConfig {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error: cannot read {}: {}", path, e);
                std::process::exit(1);
            });
            serde_json::from_str(&text).unwrap_or_else(|e| {
                eprintln!("Error: invalid config {}: {}", path, e);
                std::process::exit(1);
            })
        }
        None => SimConfig::default(),
    };

    config.seed = seed;
    if args.config.is_none() || args.nodes != 500 {
        config.app.node_count = args.nodes;
    }
    if args.config.is_none() || args.fps != 60 {
        config.app.fps = args.fps;
    }
    if args.config.is_none() || args.duration != 30.0 {
        config.max_duration_secs = args.duration;
    }
    config
}

fn export_renderer(_args: &Args) -> Option<Box<dyn Renderer + Send>> {
    #[cfg(feature = "visualization")]
    if _args.rerun {
        match warpfield_core::RerunRenderer::spawn("Warpfield Sim") {
            Ok(renderer) => return Some(Box::new(renderer)),
            Err(e) => error!("Rerun unavailable, exporting JSON only: {}", e),
        }
    }
    None
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED | {} warps, {:.1}s",
            result.scenario.name(),
            result.seed,
            result.metrics.warps_completed,
            result.final_time_secs
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Warpfield Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        info!("Running with export to: {}", export_path);
        let runner = ScenarioRunner::with_config(load_config(&args, base_seed));
        let (result, export) = runner
            .run_with_export(scenarios[0], export_renderer(&args))
            .await;

        match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
        report(&result);

        if !result.passed {
            std::process::exit(1);
        }
        return;
    }

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::with_config(load_config(&args, seed));

        for scenario in &scenarios {
            let result = runner.run(*scenario).await;
            if !args.json {
                report(&result);
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "warps_started": r.metrics.warps_started,
                    "warps_completed": r.metrics.warps_completed,
                    "clicks": r.metrics.clicks_sent,
                    "violations": r.metrics.violations,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
