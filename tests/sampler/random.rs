use seqtune::prelude::*;

fn space() -> SearchSpace {
    SearchSpace::new(vec![
        FieldGroup::new("model")
            .categorical("cell", ["lstm", "gru"])
            .int_range("hidden", 16, 128, 16),
        FieldGroup::new("optimizer").float_range("dropout", 0.0, 0.5, 0.1),
    ])
    .unwrap()
}

fn configs(seed: u64, n: usize) -> Vec<Configuration> {
    let tuner = Tuner::builder()
        .space(space())
        .sampler(RandomSampler::with_seed(seed))
        .build()
        .unwrap();
    let objective = |config: &Configuration, _: &mut Reporter<'_>, _: &CancellationToken| {
        config.get_int("hidden").map(|h| h as f64)
    };
    tuner.tune(n, &objective).unwrap();
    tuner.study().trials().unwrap().into_iter().map(|t| t.config).collect()
}

#[test]
fn same_seed_same_configurations() {
    assert_eq!(configs(42, 12), configs(42, 12));
    assert_ne!(configs(42, 12), configs(43, 12));
}

#[test]
fn draws_stay_inside_their_domains() {
    let space = space();
    for config in configs(7, 200) {
        assert!(space.admits(&config), "{config} is outside the space");
        let dropout = config.get_float("dropout").unwrap();
        assert!((0.0..=0.5 + 1e-9).contains(&dropout));
    }
}

#[test]
fn every_value_is_reachable() {
    let seen: std::collections::BTreeSet<i64> = configs(9, 300)
        .iter()
        .map(|c| c.get_int("hidden").unwrap())
        .collect();
    assert_eq!(seen.into_iter().collect::<Vec<_>>(), [16, 32, 48, 64, 80, 96, 112, 128]);
}
