use crate::engine::{run_one, summarize};
use crate::transport::Transport;
use crate::types::{RunConfig, RunSummary, Scenario, ScenarioResult};
use futures::stream::{self, StreamExt};

/// Runs scenarios concurrently with at most `jobs` exchanges in flight.
/// Each scenario owns exactly one pre-allocated result slot, so workers
/// never contend on shared counters; counts are derived after all slots
/// fill. Scenario order in the summary matches declaration order.
pub async fn run_scenarios_concurrent<T: Transport + ?Sized>(
    transport: &T,
    cfg: &RunConfig,
    scenarios: &[Scenario],
    jobs: usize,
) -> RunSummary {
    let jobs = jobs.max(1);
    let mut slots: Vec<Option<ScenarioResult>> = Vec::new();
    slots.resize_with(scenarios.len(), || None);

    {
        let mut in_flight = stream::iter(scenarios.iter().enumerate())
            .map(|(idx, scenario)| async move { (idx, run_one(transport, cfg, scenario).await) })
            .buffer_unordered(jobs);
        while let Some((idx, result)) = in_flight.next().await {
            slots[idx] = Some(result);
        }
    }

    // Every slot is filled: the stream yielded one result per index.
    let results: Vec<ScenarioResult> = slots.into_iter().flatten().collect();
    summarize(scenarios, results)
}
