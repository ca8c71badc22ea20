use seqtune::prelude::*;

fn space() -> SearchSpace {
    SearchSpace::new(vec![
        FieldGroup::new("g")
            .categorical("a", [1_i64, 2, 3])
            .categorical("b", [10_i64, 20]),
    ])
    .unwrap()
}

fn product(config: &Configuration, _: &mut Reporter<'_>, _: &CancellationToken) -> Result<f64> {
    Ok((config.get_int("a")? * config.get_int("b")?) as f64)
}

fn tpe(multivariate: bool) -> TpeSampler {
    TpeSampler::builder()
        .n_startup_trials(15)
        .multivariate(multivariate)
        .consider_prior(false)
        .seed(1)
        .build()
        .unwrap()
}

fn run(sampler: impl Sampler + 'static, n: usize) -> Vec<TrialRecord> {
    let tuner = Tuner::builder()
        .maximize()
        .space(space())
        .sampler(sampler)
        .build()
        .unwrap();
    tuner.tune(n, &product).unwrap();
    tuner.study().trials().unwrap()
}

#[test]
fn startup_trials_are_uniform_draws() {
    let tpe_trials = run(tpe(true), 20);
    let random_trials = run(RandomSampler::with_seed(1), 15);
    let space = space();

    assert_eq!(tpe_trials.len(), 20);
    for (t, r) in tpe_trials.iter().zip(&random_trials) {
        assert_eq!(t.config, r.config, "trial {} diverged during startup", t.id);
    }
    for trial in &tpe_trials {
        assert_eq!(trial.state, TrialState::Complete);
        assert!(space.admits(&trial.config));
    }
}

#[test]
fn model_phase_beats_uniform_phase() {
    for multivariate in [false, true] {
        let trials = run(tpe(multivariate), 60);
        let mean = |ts: &[TrialRecord]| {
            ts.iter().filter_map(|t| t.value).sum::<f64>() / ts.len() as f64
        };
        let startup = mean(&trials[..15]);
        let modelled = mean(&trials[30..]);
        assert!(
            modelled > startup,
            "multivariate={multivariate}: modelled mean {modelled} <= startup mean {startup}"
        );
    }
}

#[test]
fn same_seed_same_study() {
    let configs = |trials: Vec<TrialRecord>| -> Vec<Configuration> {
        trials.into_iter().map(|t| t.config).collect()
    };
    assert_eq!(configs(run(tpe(true), 25)), configs(run(tpe(true), 25)));
}
