use conclave_types::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    RoundRobin,
    LeastLoaded,
    Random,
    CapabilityMatch,
}

fn score(worker: &Worker) -> f64 {
    worker.load.map(|l| l.score()).unwrap_or(0.0)
}

/// `index mod candidates.len()`. The caller is responsible for advancing
/// the round-robin index exactly once per successful selection.
pub fn select_round_robin(candidates: &[&Worker], current_index: usize) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let idx = current_index % candidates.len();
    Some(candidates[idx].id.clone())
}

/// Minimizes `0.4*cpu + 0.3*memory + 0.3*(10*queued)`; a worker without
/// load info scores 0 and is therefore preferred.
pub fn select_least_loaded(candidates: &[&Worker]) -> Option<String> {
    candidates
        .iter()
        .min_by(|a, b| score(a).partial_cmp(&score(b)).unwrap_or(std::cmp::Ordering::Equal))
        .map(|w| w.id.clone())
}

pub fn select_random(candidates: &[&Worker]) -> Option<String> {
    use rand::seq::SliceRandom;
    let mut rng = rand::thread_rng();
    candidates.choose(&mut rng).map(|w| w.id.clone())
}

/// Maximizes `|requiredCaps ∩ workerCaps| / |requiredCaps|`; ties broken by
/// least-loaded. Falls through to least-loaded when no capabilities are
/// requested.
pub fn select_capability_match(candidates: &[&Worker], required: &[String]) -> Option<String> {
    if required.is_empty() {
        return select_least_loaded(candidates);
    }

    let mut best: Option<(&Worker, f64)> = None;
    for worker in candidates {
        let overlap = required.iter().filter(|c| worker.capabilities.contains(c)).count();
        let ratio = overlap as f64 / required.len() as f64;
        best = match best {
            None => Some((worker, ratio)),
            Some((best_worker, best_ratio)) => {
                if ratio > best_ratio || (ratio == best_ratio && score(worker) < score(best_worker)) {
                    Some((worker, ratio))
                } else {
                    Some((best_worker, best_ratio))
                }
            }
        };
    }
    best.map(|(w, _)| w.id.clone())
}

pub fn select(
    strategy: SelectionStrategy,
    candidates: &[&Worker],
    required_capabilities: &[String],
    round_robin_index: usize,
) -> Option<String> {
    match strategy {
        SelectionStrategy::RoundRobin => select_round_robin(candidates, round_robin_index),
        SelectionStrategy::LeastLoaded => select_least_loaded(candidates),
        SelectionStrategy::Random => select_random(candidates),
        SelectionStrategy::CapabilityMatch => select_capability_match(candidates, required_capabilities),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::{Worker, WorkerLoad};

    fn worker_with_load(id: &str, score_input: WorkerLoad) -> Worker {
        let mut w = Worker::new(id);
        w.load = Some(score_input);
        w
    }

    #[test]
    fn least_loaded_prefers_worker_without_load_info() {
        let a = worker_with_load("a", WorkerLoad { cpu_pct: 50.0, memory_pct: 50.0, queued_tasks: 2 });
        let b = Worker::new("b");
        let refs = vec![&a, &b];
        assert_eq!(select_least_loaded(&refs), Some("b".to_string()));
    }

    #[test]
    fn round_robin_wraps_on_index() {
        let a = Worker::new("a");
        let b = Worker::new("b");
        let refs = vec![&a, &b];
        assert_eq!(select_round_robin(&refs, 2), Some("a".to_string()));
        assert_eq!(select_round_robin(&refs, 3), Some("b".to_string()));
    }

    #[test]
    fn capability_match_maximizes_overlap_ratio() {
        let mut a = Worker::new("a");
        a.capabilities = vec!["python".to_string()];
        let mut b = Worker::new("b");
        b.capabilities = vec!["python".to_string(), "rust".to_string()];
        let refs = vec![&a, &b];
        let required = vec!["python".to_string(), "rust".to_string()];
        assert_eq!(select_capability_match(&refs, &required), Some("b".to_string()));
    }

    #[test]
    fn capability_match_falls_through_to_least_loaded_with_no_requirements() {
        let a = worker_with_load("a", WorkerLoad { cpu_pct: 10.0, memory_pct: 10.0, queued_tasks: 1 });
        let b = Worker::new("b");
        let refs = vec![&a, &b];
        assert_eq!(select_capability_match(&refs, &[]), Some("b".to_string()));
    }
}
