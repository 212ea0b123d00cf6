//! Cellygen CLI - compile rules, play automata and search for patterns.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;

use cellygen::{
    compiler,
    compute::{
        Automaton, Grid, Playback, PlaybackEvent,
        evolution::{EvolutionEngine, PatternExport, settings_summary},
    },
    schema::{AutomatonConfig, EvolutionConfig, RuleTable},
};

const DEFAULT_GENERATIONS: u64 = 100;
const DEFAULT_DENSITY: f64 = 0.3;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--example") => print_example_config(),
        Some("check") if args.len() >= 3 => check(Path::new(&args[2])),
        Some("run") if args.len() >= 3 => {
            let generations = args
                .get(3)
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_GENERATIONS);
            run(Path::new(&args[2]), generations);
        }
        Some("evolve") if args.len() >= 4 => {
            let output = args.get(4).map(PathBuf::from);
            evolve(Path::new(&args[2]), Path::new(&args[3]), output.as_deref());
        }
        _ => {
            usage(&args[0]);
            process::exit(1);
        }
    }
}

fn usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {program} check <automaton.json>");
    eprintln!("  {program} run <automaton.json | pattern.txt> [generations]");
    eprintln!("  {program} evolve <automaton.json> <evolution.json> [best.txt]");
    eprintln!("  {program} --example");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  automaton.json  States, neighborhood, grid size and rule text");
    eprintln!("  pattern.txt     Pattern exported by 'evolve'");
    eprintln!("  generations     Generations to play (default: {DEFAULT_GENERATIONS})");
    eprintln!("  evolution.json  Genetic search settings");
    eprintln!("  best.txt        Where to export the best pattern found");
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {}", path.display(), e);
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing {}: {}", path.display(), e);
        process::exit(1);
    })
}

fn load_automaton(path: &Path) -> AutomatonConfig {
    let config: AutomatonConfig = load_json(path);
    if let Err(e) = config.validate() {
        eprintln!("Invalid automaton configuration: {}", e);
        process::exit(1);
    }
    config
}

/// Compile the rule text, printing every diagnostic on failure.
fn compile_rules(config: &AutomatonConfig) -> RuleTable {
    let compilation = compiler::compile(config);
    if compilation.is_ok() {
        return compilation.rules;
    }

    eprintln!("Rule text has {} error(s):", compilation.errors.len());
    for error in &compilation.errors {
        let (line, col) = error.line_col(&config.rules);
        eprintln!("  {}:{}: {}", line, col, error.kind);
    }
    process::exit(1);
}

fn check(path: &Path) {
    let config = load_automaton(path);
    let rules = compile_rules(&config);

    println!("{} rule(s) compiled:", rules.len());
    print!("{rules}");
}

fn run(path: &Path, generations: u64) {
    let (config, grid) = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("txt")) {
        let export = PatternExport::load(path).unwrap_or_else(|e| {
            eprintln!("Error loading pattern: {}", e);
            process::exit(1);
        });
        (export.to_config(), export.grid)
    } else {
        let config = load_automaton(path);
        let mut grid = Grid::new(config.width, config.height);
        grid.populate(
            &config.states,
            DEFAULT_DENSITY,
            &mut StdRng::from_entropy(),
        );
        (config, grid)
    };

    let rules = compile_rules(&config);

    println!("Cellygen Playback");
    println!("=================");
    println!("Grid: {}x{}", config.width, config.height);
    println!("States: {}", config.states.user_count());
    println!("Neighborhood: {}", config.neighborhood);
    println!("Rules: {}", rules.len());
    println!("Generations: {}", generations);
    println!();
    println!("Initial live cells: {}", grid.live_count());

    let automaton = Automaton::new(config.states.clone(), config.neighborhood, rules);
    let mut playback = Playback::new(automaton, grid);

    let start = Instant::now();
    let events = playback.play(Some(generations)).unwrap_or_else(|e| {
        eprintln!("Error starting playback: {}", e);
        process::exit(1);
    });

    for event in events {
        match event {
            PlaybackEvent::Generation {
                generation,
                changes,
            } => {
                // Print progress every 10%
                if generation % (generations / 10).max(1) == 0 {
                    println!(
                        "  Generation {}/{}: {} changes, {} live",
                        generation,
                        generations,
                        changes.len(),
                        playback.snapshot().live_count()
                    );
                }
            }
            PlaybackEvent::Finished { generation } => {
                println!("Stable after {} generations", generation);
            }
            PlaybackEvent::Stopped { generation } => {
                println!("Stopped at generation {}", generation);
            }
            PlaybackEvent::Failed(e) => {
                eprintln!("Playback failed: {}", e);
                process::exit(1);
            }
        }
    }
    playback.join();

    let elapsed = start.elapsed();
    println!();
    println!("Final live cells: {}", playback.snapshot().live_count());
    println!(
        "Time: {:.2}s ({:.1} generations/s)",
        elapsed.as_secs_f32(),
        playback.generation() as f32 / elapsed.as_secs_f32().max(f32::EPSILON)
    );
}

fn evolve(automaton_path: &Path, evolution_path: &Path, output: Option<&Path>) {
    let automaton = load_automaton(automaton_path);
    let config: EvolutionConfig = load_json(evolution_path);
    let rules = compile_rules(&automaton);

    println!("Cellygen Search");
    println!("===============");
    println!("Grid: {}x{}", automaton.width, automaton.height);
    println!("Population: {}", config.population_size);
    println!("Selection: {}", config.selection);
    println!("Epochs: {}", config.targets.epochs);
    println!();

    let mut engine = EvolutionEngine::new(config.clone(), &automaton).unwrap_or_else(|e| {
        eprintln!("Error creating search: {}", e);
        process::exit(1);
    });

    let report_every = (config.targets.epochs / 10).max(1);
    let result = engine
        .run_with_callback(|progress| {
            if progress.epoch % report_every == 0 {
                println!(
                    "  Epoch {}: best={:.3}, last={:.3}, avg={:.3}",
                    progress.epoch, progress.best.fitness, progress.last.fitness, progress.avg_fitness
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            process::exit(1);
        });

    let best = &result.best.stats;
    println!();
    println!("Best pattern (epoch {}):", result.best.epoch);
    println!("  Fitness: {:.6}", best.fitness);
    println!("  Generations: {}", best.generations);
    println!("  Avg. population: {}", best.average_population);
    println!("  Initial size: {}", best.initial_size);
    println!(
        "Time: {:.2}s ({:.1} evaluations/s)",
        result.stats.elapsed_seconds, result.stats.evaluations_per_second
    );

    if let Some(path) = output {
        let export = PatternExport::from_snapshot(
            automaton.states.clone(),
            &rules,
            automaton.neighborhood,
            &result.best,
        )
        .with_settings(settings_summary(&config, &result));
        if let Err(e) = export.save(path) {
            eprintln!("Error writing {}: {}", path.display(), e);
            process::exit(1);
        }
        println!("Exported best pattern to {}", path.display());
    }
}

fn print_example_config() {
    let automaton = AutomatonConfig::default();
    let evolution = EvolutionConfig::default();

    println!("Example automaton (automaton.json):");
    println!(
        "{}",
        serde_json::to_string_pretty(&automaton).unwrap_or_default()
    );
    println!();
    println!("Example search settings (evolution.json):");
    println!(
        "{}",
        serde_json::to_string_pretty(&evolution).unwrap_or_default()
    );
}
