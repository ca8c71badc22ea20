use seqtune::prelude::*;

pub fn space() -> SearchSpace {
    SearchSpace::new(vec![
        FieldGroup::new("model")
            .categorical("hidden", [8_i64, 16, 32])
            .int_range("layers", 1, 3, 1),
        FieldGroup::new("optimizer").categorical("lr", [1e-3, 1e-2]),
    ])
    .unwrap()
}

/// Deterministic curve: bigger and deeper models score higher, every step
/// adds a quarter.
pub fn curve(config: &Configuration, reporter: &mut Reporter<'_>, cancel: &CancellationToken) -> Result<f64> {
    let hidden = config.get_int("hidden")? as f64;
    let layers = config.get_int("layers")? as f64;
    let mut value = 0.0;
    for step in 1..=4_u64 {
        if cancel.is_cancelled() {
            break;
        }
        value = hidden / 8.0 + layers + step as f64 * 0.25;
        reporter.report(step, value)?;
    }
    Ok(value)
}
