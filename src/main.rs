use std::fs::File;
use std::io::{BufWriter, Write};

use rayon::prelude::*;
use serde::Serialize;

use refab::analysis::{self, StrategyRating, Verdict};
use refab::config::{Allocation, MAX_WASTE_TONS, SIMULATION_MONTHS};
use refab::events::MarketEvent;
use refab::scenario::Scenario;
use refab::simulation::{RunOutcome, Simulation};
use refab::types::ScenarioId;

/// One NDJSON line of the combined event log.
#[derive(Serialize)]
struct LogLine<'a> {
    scenario: ScenarioId,
    #[serde(flatten)]
    event: &'a MarketEvent,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut seed: u64 = 42;
    let mut months = SIMULATION_MONTHS;
    let mut output_path: Option<String> = None;
    let mut csv_path: Option<String> = None;
    let mut quiet = false;
    let mut runs: Option<u64> = None;
    // Balanced default split; override per category.
    let mut allocation = Allocation::new(300_000.0, 150_000.0, 350_000.0, 200_000.0);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                i += 1;
                seed = args[i].parse().expect("--seed requires a u64");
            }
            "--months" => {
                i += 1;
                months = args[i].parse().expect("--months requires a u32");
            }
            "--traditional" => {
                i += 1;
                allocation.traditional = args[i].parse().expect("--traditional requires EUR");
            }
            "--detection" => {
                i += 1;
                allocation.detection = args[i].parse().expect("--detection requires EUR");
            }
            "--robotics" => {
                i += 1;
                allocation.robotics = args[i].parse().expect("--robotics requires EUR");
            }
            "--ecodesign" => {
                i += 1;
                allocation.ecodesign = args[i].parse().expect("--ecodesign requires EUR");
            }
            "--runs" => {
                i += 1;
                runs = Some(args[i].parse().expect("--runs requires a positive integer"));
            }
            "--output" => {
                i += 1;
                output_path = Some(args[i].clone());
            }
            "--csv" => {
                i += 1;
                csv_path = Some(args[i].clone());
            }
            "--quiet" => quiet = true,
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    // Fail fast at the boundary; the engine does not re-validate.
    if let Err(e) = allocation.validate() {
        eprintln!("invalid allocation: {e}");
        std::process::exit(2);
    }

    let catalog = Scenario::catalog();

    if let Some(n) = runs {
        run_sweep(&allocation, &catalog, months, seed, n, csv_path.as_deref(), quiet);
        return;
    }

    // Scenario runs are independent; each owns its market state and rng.
    let results: Vec<(Scenario, refab::simulation::RunHistory, RunOutcome)> = catalog
        .into_par_iter()
        .map(|scenario| {
            let mut sim = Simulation::with_seed(&allocation, scenario, months, seed);
            let outcome = sim.run();
            (scenario, sim.history, outcome)
        })
        .collect();

    if let Some(path) = output_path {
        let file = File::create(&path).expect("failed to create output file");
        let mut writer = BufWriter::new(file);
        for (scenario, history, _) in &results {
            for event in &history.events {
                let line = LogLine { scenario: scenario.id, event };
                serde_json::to_writer(&mut writer, &line).expect("failed to serialize event");
                writeln!(writer).expect("failed to write newline");
            }
        }
    }

    if !quiet {
        print_results(&allocation, &results);
    }
}

fn print_results(
    allocation: &Allocation,
    results: &[(Scenario, refab::simulation::RunHistory, RunOutcome)],
) {
    println!(
        "Allocation: traditional {:.0} | detection {:.0} | robotics {:.0} | ecodesign {:.0} | idle {:.0}",
        allocation.traditional,
        allocation.detection,
        allocation.robotics,
        allocation.ecodesign,
        allocation.unallocated(),
    );

    println!(
        "\n{:<18} | {:>12} | {:>12} | {:>9} | {:>5} | {:>7} | Verdict",
        "Scenario", "Final", "Profit", "Waste(t)", "Cap%", "Events"
    );
    println!("{}", "-".repeat(96));

    for (scenario, history, outcome) in results {
        let verdict = Verdict::for_outcome(outcome);
        let cap_pct = (outcome.total_waste / MAX_WASTE_TONS * 100.0).round();
        println!(
            "{:<18} | {:>12.0} | {:>+12.0} | {:>9.1} | {:>4.0}% | {:>7} | {}",
            scenario.id.to_string(),
            outcome.final_balance,
            outcome.profit,
            outcome.total_waste,
            cap_pct,
            history.events.len(),
            verdict,
        );
    }

    println!("\n=== Events ===");
    for (scenario, history, _) in results {
        for e in &history.events {
            println!("  [{}] month {:>3} {} {}", scenario.id, e.month.0, e.kind.icon(), e.message);
        }
    }

    println!("\n=== Year milestones ===");
    for (scenario, history, _) in results {
        let line: Vec<String> =
            history.milestones().map(|m| format!("y{}: {:.0}", m.year, m.balance)).collect();
        println!("  [{}] {}", scenario.id, line.join(" | "));
    }

    let outcomes: Vec<RunOutcome> = results.iter().map(|(_, _, o)| *o).collect();
    println!("\n{}", StrategyRating::from_outcomes(&outcomes));
}

fn run_sweep(
    allocation: &Allocation,
    catalog: &[Scenario],
    months: u32,
    start_seed: u64,
    n: u64,
    csv_path: Option<&str>,
    quiet: bool,
) {
    let all: Vec<(Scenario, Vec<(u64, RunOutcome)>)> = catalog
        .iter()
        .map(|scenario| {
            let outcomes: Vec<(u64, RunOutcome)> = (0..n)
                .into_par_iter()
                .map(|i| {
                    let seed = start_seed + i;
                    let mut sim = Simulation::with_seed(allocation, *scenario, months, seed);
                    (seed, sim.run())
                })
                .collect();
            (*scenario, outcomes)
        })
        .collect();

    if let Some(path) = csv_path {
        write_sweep_csv(&all, path);
    }

    if quiet {
        return;
    }

    if n < 2 {
        eprintln!("Warning: distribution requires >= 2 runs");
        return;
    }

    println!("=== Multi-run distribution (N={n} runs per scenario) ===");
    for (scenario, outcomes) in &all {
        let bare: Vec<RunOutcome> = outcomes.iter().map(|(_, o)| *o).collect();
        let Some(dist) = analysis::sweep_distributions(&bare) else {
            continue;
        };
        println!("\n--- {} (survival {:.0}%) ---", scenario.id, dist.survival_rate * 100.0);
        println!(
            "{:>13} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10}",
            "metric", "min", "p5", "p50", "p95", "max", "mean"
        );
        for (name, stats) in [
            ("final balance", &dist.final_balance),
            ("profit", &dist.profit),
            ("waste (t)", &dist.total_waste),
        ] {
            println!(
                "{:>13} | {:>10.0} | {:>10.0} | {:>10.0} | {:>10.0} | {:>10.0} | {:>10.0}",
                name, stats.min, stats.p5, stats.p50, stats.p95, stats.max, stats.mean
            );
        }
    }
}

fn write_sweep_csv(all: &[(Scenario, Vec<(u64, RunOutcome)>)], path: &str) {
    let file = File::create(path).unwrap_or_else(|e| panic!("failed to create {path}: {e}"));
    let mut w = BufWriter::new(file);
    writeln!(
        w,
        "seed,scenario,final_balance,profit,total_waste,bankrupt_month,waste_shutdown_month,survived"
    )
    .expect("write");
    for (scenario, outcomes) in all {
        for (seed, o) in outcomes {
            writeln!(
                w,
                "{},{},{:.2},{:.2},{:.3},{},{},{}",
                seed,
                scenario.id,
                o.final_balance,
                o.profit,
                o.total_waste,
                o.bankrupt_month.map(|m| m.0.to_string()).unwrap_or_default(),
                o.waste_shutdown_month.map(|m| m.0.to_string()).unwrap_or_default(),
                o.survived,
            )
            .expect("write");
        }
    }
}
