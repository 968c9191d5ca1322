//! Benchmark for model encoding, heuristic construction and validation.
//!
//! Run with: cargo run --release --bin bench

use shift_roster::demo_data::{self, DemoData};
use shift_roster::heuristic::solve_heuristic;
use shift_roster::model::build_model;
use shift_roster::relaxation::build_attempts;
use shift_roster::validation::validate;
use std::time::Instant;

const ROUNDS: u32 = 20;

fn main() -> shift_roster::Result<()> {
    let demo = demo_data::generate(DemoData::Large)?;
    let (employees, horizon, config) = (&demo.employees, &demo.horizon, &demo.config);

    println!("Benchmark: roster generation without optimizer");
    println!("  Employees: {}", employees.len());
    println!("  Days: {}", horizon.len());
    println!();

    for attempt in build_attempts(config) {
        let model_start = Instant::now();
        let mut model = build_model(employees, horizon, config, &attempt);
        for _ in 1..ROUNDS {
            model = build_model(employees, horizon, config, &attempt);
        }
        let model_time = model_start.elapsed() / ROUNDS;

        let heuristic_start = Instant::now();
        let mut roster = solve_heuristic(employees, horizon, config, &attempt)?;
        for _ in 1..ROUNDS {
            roster = solve_heuristic(employees, horizon, config, &attempt)?;
        }
        let heuristic_time = heuristic_start.elapsed() / ROUNDS;

        let validate_start = Instant::now();
        let mut report = validate(&roster, horizon, config);
        for _ in 1..ROUNDS {
            report = validate(&roster, horizon, config);
        }
        let validate_time = validate_start.elapsed() / ROUNDS;

        println!("{}", attempt.label);
        println!(
            "  Model: {} constraints, {} binaries, {} bytes ({:.2?})",
            model.constraint_count,
            model.binary_count,
            model.text.len(),
            model_time
        );
        println!("  Heuristic: {:.2?}", heuristic_time);
        println!(
            "  Validation: {} hard, {} staffing ({:.2?})",
            report.hard_count(),
            report.staffing_count(),
            validate_time
        );
    }

    Ok(())
}
