//! Streakline CLI
//!
//! Usage:
//!   streakline --rules rules.json --colors r,g,g,y,r     # Replay a color list
//!   streakline --rules rules.json --values 1.2,3.4,11   # Replay numeric results
//!   streakline --interactive                            # Read outcomes from stdin
//!   streakline --simulate --colors g,g,g,r,g            # Back-test every rule
//!   streakline --validate rules.json                    # Check a rules file
//!   streakline --serve                                  # HTTP API server

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use log::info;
use serde_json::Value;

use streakline::config::EngineConfig;
use streakline::core::{
    default_rules, load_and_validate_snapshot, run_server, save_snapshot, simulate, PatternEngine,
};
use streakline::error::{EngineError, EngineResult};
use streakline::types::{Color, RoundOutput, Rule};
use streakline::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "streakline",
    version = VERSION,
    about = "Streakline - Sequential color-pattern engine",
    long_about = "Streakline watches a stream of red/green/yellow outcomes and reports\n\
                  which trigger/miss rules match, how long their streaks run, and when\n\
                  a streak crosses an alert threshold.\n\n\
                  Modes:\n  \
                  --colors/--values  Replay a comma-separated history\n  \
                  --interactive      Read outcomes from stdin\n  \
                  --simulate         Back-test rules over a history\n  \
                  --validate         Check a rules file and exit\n  \
                  --serve            HTTP API server mode"
)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON rules file (one rule or an array of rules)
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Load the built-in rule set as well
    #[arg(long)]
    defaults: bool,

    /// Comma-separated colors (red/green/yellow or r/g/y)
    #[arg(long, conflicts_with = "values")]
    colors: Option<String>,

    /// Comma-separated numeric results, classified by the configured thresholds
    #[arg(long)]
    values: Option<String>,

    /// Interactive mode - read outcomes from stdin
    #[arg(short, long)]
    interactive: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Back-test every rule over --colors/--values instead of processing them
    #[arg(long)]
    simulate: bool,

    /// Validate a rules file and exit
    #[arg(long, value_name = "FILE")]
    validate: Option<PathBuf>,

    /// Directory for engine snapshots: the newest is restored on start, a new one saved on exit
    #[arg(long, value_name = "DIR")]
    state: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Debug logging and per-round detail
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(&args).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> EngineResult<()> {
    if let Some(path) = &args.validate {
        return run_validate(path);
    }

    let mut engine = build_engine(args)?;

    if args.serve {
        print_header("API Server", args.no_color);
        println!("  Listening on {}", args.addr);
        println!("  Rules loaded: {}", engine.rules().len());
        println!("  Ctrl-C stops the server");
        println!();
        engine = run_server(&args.addr, engine)
            .await
            .map_err(|e| EngineError::configuration(format!("server: {}", e)))?;
    } else {
        let feed = parse_feed(args, &engine)?;

        if args.simulate {
            let colors = feed.ok_or_else(|| {
                EngineError::configuration("--simulate needs --colors or --values")
            })?;
            return run_simulate(&engine, &colors, args);
        }

        if let Some(colors) = &feed {
            run_replay(&mut engine, colors, args)?;
        }
        if args.interactive || feed.is_none() {
            run_interactive(&mut engine, args)?;
        }
    }

    if let Some(dir) = &args.state {
        let path = save_snapshot(&engine.snapshot(), dir)?;
        if !args.json {
            println!("State saved: {}", path);
        }
    }
    Ok(())
}

// =============================================================================
// SETUP
// =============================================================================

/// Config file, built-in rules, rules file, then any saved state
fn build_engine(args: &Args) -> EngineResult<PatternEngine> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    };
    if args.defaults {
        config.load_default_rules = true;
    }

    let mut engine = PatternEngine::with_config(&config)?;

    if let Some(path) = &args.rules {
        for rule in read_rules_file(path)? {
            engine.add_rule(rule?)?;
        }
    }
    if engine.rules().is_empty() {
        info!("no rules given, loading the built-in set");
        for rule in default_rules() {
            engine.add_rule(rule)?;
        }
    }

    if let Some(dir) = &args.state {
        if let Some(path) = newest_snapshot(dir) {
            let snapshot = load_and_validate_snapshot(&path)?;
            engine.restore(snapshot)?;
            info!("restored state from {}", path.display());
        }
    }

    Ok(engine)
}

/// Each entry of a rules file, validated independently
fn read_rules_file(path: &Path) -> EngineResult<Vec<EngineResult<Rule>>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| EngineError::storage(path.display().to_string(), e))?;
    let docs = match serde_json::from_str::<Value>(&text)? {
        Value::Array(items) => items,
        single => vec![single],
    };
    Ok(docs
        .into_iter()
        .map(|doc| Rule::from_value(doc).map_err(EngineError::from))
        .collect())
}

/// Snapshot files sort by their timestamped names
fn newest_snapshot(dir: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
        .max()
}

fn parse_feed(args: &Args, engine: &PatternEngine) -> EngineResult<Option<Vec<Color>>> {
    if let Some(list) = &args.colors {
        let colors = split_list(list)
            .map(|token| token.parse::<Color>().map_err(EngineError::configuration))
            .collect::<EngineResult<Vec<_>>>()?;
        return Ok(Some(colors));
    }
    if let Some(list) = &args.values {
        let thresholds = engine.thresholds();
        let colors = split_list(list)
            .map(|token| {
                token
                    .parse::<f64>()
                    .map(|v| thresholds.classify(v))
                    .map_err(|_| EngineError::configuration(format!("not a number: '{}'", token)))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        return Ok(Some(colors));
    }
    Ok(None)
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|t| !t.is_empty())
}

// =============================================================================
// MODES
// =============================================================================

fn run_validate(path: &Path) -> EngineResult<()> {
    let results = read_rules_file(path)?;
    let mut invalid = 0;

    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(rule) => println!(
                "{} #{} '{}' ({}, {} trigger / {} miss steps)",
                "ok".green(),
                i,
                rule.name,
                rule.kind.as_str(),
                rule.trigger.len(),
                rule.miss.len()
            ),
            Err(e) => {
                invalid += 1;
                println!("{} #{} {}", "invalid".red(), i, e);
            }
        }
    }

    if invalid > 0 {
        return Err(EngineError::configuration(format!(
            "{} of {} rules invalid",
            invalid,
            results.len()
        )));
    }
    Ok(())
}

fn run_replay(engine: &mut PatternEngine, colors: &[Color], args: &Args) -> EngineResult<()> {
    for (i, color) in colors.iter().enumerate() {
        let output = engine.process(*color, &format!("cli-{}", i + 1))?;
        if args.verbose || !output.is_quiet() {
            print_round(&output, args)?;
        }
    }
    if !args.json {
        print_summary(engine, args.no_color);
    }
    Ok(())
}

fn run_interactive(engine: &mut PatternEngine, args: &Args) -> EngineResult<()> {
    print_header("Interactive", args.no_color);
    println!("Enter a color (r/g/y) or a numeric result per line.");
    println!("Commands: 'rules', 'stats', 'quit'.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut round = 0u64;

    loop {
        print!("{}", format_prompt(engine, args.no_color));
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            println!("\nSession ended. Rounds: {}", engine.rounds_processed());
            break;
        }
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("rules") {
            for (id, rule) in engine.rules().iter() {
                let state = if rule.active { "active" } else { "inactive" };
                println!("  {:>3} {} ({}, {})", id, rule.name, rule.kind.as_str(), state);
            }
            continue;
        }
        if line.eq_ignore_ascii_case("stats") {
            print_summary(engine, args.no_color);
            continue;
        }

        round += 1;
        let round_id = format!("cli-{}", round);
        let result = match line.parse::<f64>() {
            Ok(value) => engine.process_value(value, &round_id),
            Err(_) => match line.parse::<Color>() {
                Ok(color) => engine.process(color, &round_id),
                Err(e) => {
                    round -= 1;
                    println!("  {}", e);
                    continue;
                }
            },
        };
        print_round(&result?, args)?;
    }
    Ok(())
}

fn run_simulate(engine: &PatternEngine, colors: &[Color], args: &Args) -> EngineResult<()> {
    let reports: Vec<_> = engine
        .rules()
        .iter()
        .map(|(_, rule)| simulate(rule, colors))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!("Simulated {} rules over {} outcomes", reports.len(), colors.len());
    for report in &reports {
        println!();
        println!("{}", report.pattern_name.bold());
        for sub in &report.sub_patterns {
            println!(
                "  {:<28} triggers={:<5} ({:>6.2}%) misses={:<5} ({:>6.2}%) max_trigger={} max_miss={}",
                sub.name,
                sub.total_triggers,
                sub.trigger_rate,
                sub.total_misses,
                sub.miss_rate,
                sub.max_trigger_streak,
                sub.max_miss_streak
            );
        }
    }
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_round(output: &RoundOutput, args: &Args) -> EngineResult<()> {
    if args.json {
        println!("{}", serde_json::to_string(output)?);
    } else if args.no_color {
        println!("{}", output.to_parseable_string());
    } else {
        println!("{}", output.to_terminal_string());
    }
    Ok(())
}

fn print_summary(engine: &PatternEngine, no_color: bool) {
    println!();
    println!(
        "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "key", "trig", "miss", "total_t", "total_m", "long_t", "long_m"
    );
    for (key, state) in engine.tracker().states() {
        let line = format!(
            "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            key.to_string(),
            state.trigger_streak,
            state.miss_streak,
            state.total_triggers,
            state.total_misses,
            state.longest_trigger_streak,
            state.longest_miss_streak
        );
        if no_color || state.trigger_streak == 0 {
            println!("{}", line);
        } else {
            println!("{}", line.green());
        }
    }
}

fn print_header(mode: &str, no_color: bool) {
    let title = format!("Streakline v{} - {}", VERSION, mode);
    println!("========================================");
    if no_color {
        println!("  {}", title);
    } else {
        println!("  {}", title.bold());
    }
    println!("========================================");
    println!();
}

/// Prompt with the last few outcomes
fn format_prompt(engine: &PatternEngine, no_color: bool) -> String {
    let tail: String = engine
        .buffer()
        .tail(12)
        .iter()
        .map(|c| {
            if no_color {
                c.symbol().to_string()
            } else {
                format!("{}{}{}", c.color_code(), c.symbol(), Color::color_reset())
            }
        })
        .collect();
    format!("[{}] > ", tail)
}
