use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};

use seqtune::prelude::*;

use crate::common::{curve, space};

fn tuner(name: &str, storage: std::sync::Arc<dyn Storage>) -> Tuner {
    Tuner::builder()
        .study_name(name)
        .maximize()
        .space(space())
        .sampler(RandomSampler::with_seed(21))
        .shared_storage(storage)
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_run_matches_sequential_draws() {
    let storage = seqtune::storage::open("memory").unwrap();
    let sequential = tuner("seq", storage.clone());
    sequential.tune(12, &curve).unwrap();

    let parallel = tuner("par", storage);
    let summary = parallel.tune_parallel(12, 4, curve).await.unwrap();
    assert_eq!(summary.n_new_trials, 12);
    assert_eq!(summary.total.running, 0);

    let seq = sequential.study().trials().unwrap();
    let par = parallel.study().trials().unwrap();
    assert_eq!(par.len(), 12);
    for (s, p) in seq.iter().zip(&par) {
        assert_eq!(s.id, p.id);
        assert_eq!(s.config, p.config);
        assert_eq!(s.value, p.value);
    }
}

struct StopAfter {
    seen: AtomicUsize,
    limit: usize,
}

impl Objective for StopAfter {
    type Error = Error;

    fn evaluate(
        &self,
        config: &Configuration,
        reporter: &mut Reporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<f64> {
        curve(config, reporter, cancel)
    }

    fn after_trial(&self, _study: &Study, _trial: &TrialRecord) -> ControlFlow<()> {
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn break_stops_new_launches_and_drains_workers() {
    let tuner = tuner("stop", seqtune::storage::open("memory").unwrap());
    let objective = StopAfter {
        seen: AtomicUsize::new(0),
        limit: 3,
    };
    let summary = tuner.tune_parallel(50, 2, objective).await.unwrap();
    assert!(summary.n_new_trials >= 3);
    assert!(summary.n_new_trials < 50);
    assert_eq!(summary.total.running, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn break_is_honoured_before_the_next_launch() {
    for n_workers in [1, 3] {
        let tuner = tuner(&format!("halt-{n_workers}"), seqtune::storage::open("memory").unwrap());
        let objective = StopAfter {
            seen: AtomicUsize::new(0),
            limit: 1,
        };
        let summary = tuner.tune_parallel(20, n_workers, objective).await.unwrap();
        // Only trials launched before the first one was booked may run.
        assert!(summary.n_new_trials <= n_workers, "{n_workers} workers ran {}", summary.n_new_trials);
        assert_eq!(summary.total.running, 0);
    }
}
