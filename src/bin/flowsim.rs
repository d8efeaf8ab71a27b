use clap::Parser;
use flowsim_rs::error::Result;
use flowsim_rs::net::{BandwidthModel, RoutingMode};
use flowsim_rs::sim::{MemorySink, SimulationContext, WorkloadSpec};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "flowsim",
    about = "Run workload.json on the flow-level interconnect simulator"
)]
struct Args {
    /// Path to workload.json
    #[arg(long)]
    workload: PathBuf,

    /// Output JSON run report
    #[arg(long)]
    out: Option<PathBuf>,

    /// Override bandwidth model: fast or accurate
    #[arg(long)]
    bandwidth_model: Option<String>,

    /// Override routing: ksp:K, llskr:K:THS or ecmp
    #[arg(long)]
    routing: Option<String>,

    /// Override RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Disable logging
    #[arg(long)]
    quiet: bool,
}

fn run(args: &Args) -> Result<()> {
    let raw = fs::read_to_string(&args.workload)?;
    let workload = WorkloadSpec::from_json(&raw)?;

    let mut config = workload.config.clone().unwrap_or_default();
    if let Some(model) = &args.bandwidth_model {
        config.bandwidth_model = BandwidthModel::parse(model)?;
    }
    if let Some(routing) = &args.routing {
        config.routing = RoutingMode::parse(routing)?;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let mut ctx = SimulationContext::from_workload(&workload, config)?;
    let mut sink = MemorySink::default();
    let makespan = ctx.run(&mut sink)?;
    let report = ctx.report(sink);

    for m in &report.applications {
        println!(
            "app id={} tasks={} arrival={:.6} start={:.6} finish={:.6} runtime={:.6} flows={} bytes={:.0} mean_distance={:.3}",
            m.id.0,
            m.tasks,
            m.arrival,
            m.start,
            m.finish,
            m.runtime,
            m.flows,
            m.bytes,
            m.mean_distance()
        );
    }
    println!(
        "summary makespan={} applications={} flows={} utilization={:.4}",
        makespan, report.summary.applications, report.summary.flows, report.summary.utilization
    );

    if let Some(out) = &args.out {
        fs::write(out, serde_json::to_string_pretty(&report)?)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(if args.quiet {
            tracing_subscriber::EnvFilter::new("off")
        } else {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        })
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
