//! Integration tests for the public API of rsdfit-core.

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use rsdfit_core::prelude::*;

fn state(x: &[f64], f: f64, g: &[f64]) -> OptimizerState<f64> {
    OptimizerState::new(
        DVector::from_column_slice(x),
        f,
        DVector::from_column_slice(g),
        None,
    )
    .unwrap()
}

#[test]
fn test_iteration_zero_ignores_tolerances() {
    let s = state(&[0.0, 0.0], 0.0, &[0.0, 0.0]);
    for tol in [None, Some(0.0), Some(1.0), Some(f64::INFINITY)] {
        let criteria = ConvergenceCriteria::new()
            .with_xtol(tol)
            .with_ftol(tol)
            .with_gtol(tol);
        assert_eq!(criteria.check(0, &s, &s), Status::Running);
    }
}

#[test]
fn test_history_survives_state_updates() {
    let mut live = state(&[1.0, 1.0], 2.0, &[2.0, 2.0]);
    let mut history = History::new();

    for k in 0..4 {
        let scale = 0.5f64.powi(k + 1);
        history.record(&live, &[StateField::X, StateField::F]);
        live.update(
            &DVector::from_vec(vec![scale, scale]),
            2.0 * scale * scale,
            &DVector::from_vec(vec![2.0 * scale, 2.0 * scale]),
            None,
        )
        .unwrap();
    }

    assert_eq!(history.len(StateField::F), 4);
    assert_eq!(history.scalars(StateField::F), vec![2.0, 0.5, 0.125, 0.03125]);

    let first = history.get(StateField::X).unwrap()[0].as_vector().unwrap();
    assert_eq!(first, &DVector::from_vec(vec![1.0, 1.0]));
    assert_relative_eq!(live.gnorm(), 2.0 * 0.0625 * 2f64.sqrt());
}

#[test]
fn test_status_display() {
    assert_eq!(
        Status::GradientTolerance.to_string(),
        "Tolerance reached: Gnorm < gtol. (3)"
    );
    assert_eq!(Status::LineSearchFailed.code(), -4);
    assert_eq!(Status::from_code(-5), Some(Status::DegenerateCurvature));
}

#[test]
fn test_counting_wrapper_through_trait_object() {
    let mut counted = CountingObjective::new(FnObjective::new(
        |x: &DVector<f64>| x.sum(),
        |x: &DVector<f64>| DVector::from_element(x.len(), 1.0),
    ));
    {
        let objective: &mut dyn Objective<f64> = &mut counted;
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert_relative_eq!(objective.value(&x).unwrap(), 6.0);
        assert_eq!(objective.gradient(&x).unwrap().len(), 3);
    }
    assert_eq!(counted.value_evals(), 1);
    assert_eq!(counted.gradient_evals(), 1);
}
