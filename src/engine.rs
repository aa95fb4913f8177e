use crate::evaluate::evaluate;
use crate::report::render_exchange;
use crate::transport::{Transport, TransportError};
use crate::types::{Mismatch, RunConfig, RunSummary, Scenario, ScenarioResult, Verdict};
use std::time::Duration;
use tracing::debug;

/// Executes and evaluates a single scenario. Transport failures become
/// errored results, never faults, so one broken scenario cannot take the
/// rest of the run down with it.
pub async fn run_one<T: Transport + ?Sized>(
    transport: &T,
    cfg: &RunConfig,
    scenario: &Scenario,
) -> ScenarioResult {
    let request = scenario.request.resolve(cfg);
    debug!(id = %scenario.id, method = %request.method, url = %request.url, "executing scenario");
    match transport.send(&request, cfg.timeout).await {
        Ok(snapshot) => {
            let elapsed = snapshot.elapsed();
            let verdict = evaluate(&snapshot, &scenario.expect);
            let diagnostics =
                (!verdict.passed).then(|| render_exchange(&snapshot, Some(&verdict)));
            ScenarioResult {
                id: scenario.id.clone(),
                verdict,
                error: None,
                elapsed,
                diagnostics,
            }
        }
        Err(e) => transport_failure(scenario, e),
    }
}

fn transport_failure(scenario: &Scenario, error: TransportError) -> ScenarioResult {
    let message = error.to_string();
    let verdict = Verdict::from_mismatches(vec![Mismatch {
        check: "transport".to_string(),
        expected: "a completed HTTP exchange".to_string(),
        actual: message.clone(),
    }]);
    ScenarioResult {
        id: scenario.id.clone(),
        verdict,
        error: Some(message),
        elapsed: Duration::ZERO,
        diagnostics: None,
    }
}

/// Runs scenarios one at a time, in declaration order.
pub async fn run_scenarios<T: Transport + ?Sized>(
    transport: &T,
    cfg: &RunConfig,
    scenarios: &[Scenario],
) -> RunSummary {
    let mut results = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        results.push(run_one(transport, cfg, scenario).await);
    }
    summarize(scenarios, results)
}

pub(crate) fn summarize(scenarios: &[Scenario], results: Vec<ScenarioResult>) -> RunSummary {
    let passed = results.iter().filter(|r| r.passed()).count();
    let errored = results.iter().filter(|r| r.errored()).count();
    let failed_checks: usize = results.iter().map(|r| r.verdict.mismatches.len()).sum();
    let total_checks: usize = scenarios.iter().map(|s| s.expect.check_count()).sum();
    RunSummary {
        total: results.len(),
        passed,
        failed: results.len() - passed,
        errored,
        total_checks,
        passed_checks: total_checks.saturating_sub(failed_checks),
        failed_checks,
        cases: results,
    }
}
