use anyhow::Result;
use apicheck::engine::run_scenarios;
use apicheck::engine_async::run_scenarios_concurrent;
use apicheck::report::print_human;
use apicheck::spec::{load_suites, SuiteWithConfig};
use apicheck::transport::HttpTransport;
use apicheck::types::RunSummary;
use clap::Parser;
use colored::control::set_override as set_color_override;
use std::path::PathBuf;
use tracing::{error, info};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    author,
    about = "Checks HTTP APIs against declarative contract suites"
)]
struct Cli {
    // TEST_PATHS: one or more YAML suite files/directories
    #[arg(value_name = "TEST_PATHS", required = true)]
    tests: Vec<PathBuf>,

    /// Override the BaseUrl of every suite
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Authorization header value sent with every request
    #[arg(long, value_name = "VALUE")]
    auth: Option<String>,

    /// Per-exchange timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Run scenarios one at a time instead of concurrently
    #[arg(long)]
    serial: bool,

    /// Concurrent exchanges in flight (default: number of CPUs)
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    // Silent mode
    #[arg(short = 'q', long = "silent")]
    silent: bool,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    // Color control
    #[arg(short = 'c', long = "color", alias = "colour")]
    color: bool,

    #[arg(long = "no-color")]
    no_color: bool,

    // Filtering of report lines
    #[arg(short = 'f', long = "hide-fails", conflicts_with = "hide_passes")]
    hide_fails: bool,

    #[arg(short = 'p', long = "hide-passes", conflicts_with = "hide_fails")]
    hide_passes: bool,

    // -t/--test: number (1..N), scenario id or test/suite name.
    // Special: 0 / list lists all scenarios and exits.
    #[arg(short = 't', long = "test", value_name = "TEST")]
    test: Option<String>,
}

fn list_scenarios(suites: &[SuiteWithConfig]) {
    let mut index = 1;
    for swc in suites {
        for scenario in &swc.suite.scenarios {
            println!("  {index}. [{}] {}", swc.suite.name, scenario.id);
            index += 1;
        }
    }
}

/// Filters suites down to the selection; returns false when nothing matched.
fn select_scenarios(suites: &mut Vec<SuiteWithConfig>, selection: &str) -> bool {
    let selection = selection.trim();
    if let Ok(n) = selection.parse::<usize>() {
        let mut index = 0;
        for swc in suites.iter_mut() {
            swc.suite.scenarios.retain(|_| {
                index += 1;
                index == n
            });
        }
    } else {
        for swc in suites.iter_mut() {
            if swc.suite.name == selection {
                continue;
            }
            let prefix = format!("{selection}: ");
            swc.suite
                .scenarios
                .retain(|s| s.id == selection || s.id.starts_with(&prefix));
        }
    }
    suites.retain(|swc| !swc.suite.scenarios.is_empty());
    !suites.is_empty()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // With -v, show INFO and above; RUST_LOG overrides either way
    let filter = if cli.verbose {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "apicheck=info".to_string())
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "apicheck=warn".to_string())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Colors: default on, --no-color turns off
    if cli.no_color {
        set_color_override(false);
    } else {
        set_color_override(true);
    }

    let mut suites = match load_suites(&cli.tests) {
        Ok(suites) => suites,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(2);
        }
    };
    suites.retain(|swc| !swc.suite.scenarios.is_empty());

    if let Some(selection) = &cli.test {
        let trimmed = selection.trim();
        if trimmed == "0" || trimmed.eq_ignore_ascii_case("list") {
            println!("Available scenarios:");
            list_scenarios(&suites);
            return Ok(());
        }
        let mut selected = suites.clone();
        if !select_scenarios(&mut selected, trimmed) {
            error!("no scenario matches `{trimmed}`");
            eprintln!("Available scenarios:");
            list_scenarios(&suites);
            std::process::exit(2);
        }
        suites = selected;
    }

    if suites.is_empty() {
        error!("no scenarios to run");
        std::process::exit(2);
    }

    let transport = match HttpTransport::new() {
        Ok(transport) => transport,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };
    let jobs = cli.jobs.unwrap_or_else(num_cpus::get).max(1);

    let mut aggregate = RunSummary::default();
    for swc in &suites {
        let cfg = match swc.resolve(cli.base_url.as_deref(), cli.auth.as_deref(), cli.timeout) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("{e:#}");
                std::process::exit(2);
            }
        };
        if cli.verbose && !cli.silent {
            info!(
                suite = %swc.suite.name,
                base_url = %cfg.base_url,
                scenarios = swc.suite.scenarios.len(),
                "starting suite"
            );
        }

        let summary = if cli.serial {
            run_scenarios(&transport, &cfg, &swc.suite.scenarios).await
        } else {
            run_scenarios_concurrent(&transport, &cfg, &swc.suite.scenarios, jobs).await
        };

        if cli.verbose && !cli.silent {
            info!(
                suite = %swc.suite.name,
                passed = summary.passed,
                failed = summary.failed,
                "suite finished"
            );
        }
        if !cli.silent {
            print_human(&summary, cli.verbose, cli.hide_fails, cli.hide_passes);
        }

        aggregate.merge(summary);
    }

    if cli.verbose && !cli.silent {
        info!(
            total = aggregate.total,
            passed = aggregate.passed,
            failed = aggregate.failed,
            "all suites finished"
        );
    }

    if aggregate.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
