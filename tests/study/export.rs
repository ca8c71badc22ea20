use seqtune::prelude::*;

use crate::common::{curve, space};

fn tuned() -> Tuner {
    let tuner = Tuner::builder()
        .study_name("exported")
        .maximize()
        .space(space())
        .sampler(RandomSampler::with_seed(5))
        .build()
        .unwrap();
    tuner.tune(4, &curve).unwrap();
    tuner
}

#[test]
fn csv_has_one_row_per_trial() {
    let tuner = tuned();
    let mut out = Vec::new();
    tuner.study().to_csv(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "trial_id,state,value,last_step,fail_reason,hidden,layers,lr");
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("0,complete,"));
}

#[test]
fn json_export_carries_counts_and_best() {
    let tuner = tuned();
    let export = tuner.study().export().unwrap();
    assert_eq!(export.name, "exported");
    assert_eq!(export.counts.complete, 4);
    assert_eq!(export.trials.len(), 4);
    let best = export.best.as_ref().unwrap();
    assert_eq!(best.value, Some(tuner.study().best_value().unwrap()));

    let json: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
    assert_eq!(json["direction"], "maximize");
    assert_eq!(json["trials"].as_array().unwrap().len(), 4);
}

#[test]
fn summary_names_the_best_trial() {
    let tuner = tuned();
    let best = tuner.study().best_trial().unwrap();
    let summary = tuner.study().summary().unwrap();
    assert!(summary.contains("complete=4"));
    assert!(summary.contains(&format!("#{}", best.id)));
}
