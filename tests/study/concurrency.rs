use std::sync::Arc;
use std::thread;

use seqtune::prelude::*;
use seqtune::storage::StudyMeta;

fn hammer(storage: Arc<dyn Storage>) {
    storage
        .create_study(&StudyMeta::new("shared", Direction::Minimize, "sig"))
        .unwrap();

    let ids: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let storage = storage.clone();
                s.spawn(move || {
                    let mut mine = Vec::new();
                    for _ in 0..5 {
                        mine.push(storage.create_trial("shared").unwrap());
                    }
                    // Finish in reverse order of creation.
                    for (k, &id) in mine.iter().rev().enumerate() {
                        storage.append_intermediate("shared", id, 1, 0.5).unwrap();
                        if (worker + k) % 3 == 0 {
                            storage.finish_trial("shared", id, TrialState::Failed, None).unwrap();
                        } else {
                            storage
                                .finish_trial("shared", id, TrialState::Complete, Some(0.5))
                                .unwrap();
                        }
                    }
                    mine
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });

    let mut sorted = ids;
    sorted.sort_unstable();
    assert_eq!(sorted, (0..20).collect::<Vec<_>>());

    let trials = storage.trials("shared").unwrap();
    assert_eq!(trials.len(), 20);
    assert!(trials.iter().all(TrialRecord::is_finished));
    assert!(trials.iter().enumerate().all(|(i, t)| t.id == i as u64));
    assert!(trials.iter().all(|t| t.trajectory == [(1, 0.5)]));
}

#[test]
fn memory_store_allocates_contiguous_ids_across_threads() {
    hammer(Arc::new(MemoryStorage::default()));
}

#[test]
fn journal_store_allocates_contiguous_ids_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.jsonl");
    // Two independent handles on one file behave like two processes.
    let a = JournalStorage::open(&path).unwrap();
    let b = JournalStorage::open(&path).unwrap();
    a.create_study(&StudyMeta::new("other", Direction::Minimize, "sig")).unwrap();
    b.create_trial("other").unwrap();
    assert_eq!(a.create_trial("other").unwrap(), 1);
    hammer(Arc::new(a));
    assert_eq!(b.trials("shared").unwrap().len(), 20);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_store_allocates_contiguous_ids_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    hammer(Arc::new(SqliteStorage::open(dir.path().join("shared.db")).unwrap()));
}

#[test]
fn finished_trials_reject_late_writes() {
    let storage = MemoryStorage::default();
    storage
        .create_study(&StudyMeta::new("late", Direction::Maximize, "sig"))
        .unwrap();
    let id = storage.create_trial("late").unwrap();
    storage.finish_trial("late", id, TrialState::Pruned, Some(0.1)).unwrap();
    assert!(matches!(
        storage.append_intermediate("late", id, 3, 1.0),
        Err(Error::TrialFinished { .. })
    ));
    assert!(matches!(
        storage.finish_trial("late", id, TrialState::Complete, Some(1.0)),
        Err(Error::TrialFinished { .. })
    ));
    assert!(matches!(
        storage.finish_trial("late", 7, TrialState::Complete, Some(1.0)),
        Err(Error::UnknownTrial { .. })
    ));
}
