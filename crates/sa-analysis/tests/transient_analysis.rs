use nalgebra::DVector;
use sa_analysis::{
    AlphaOs, AnalysisBuilder, AnalysisError, AnalysisRecord, CentralDifference, ConvergenceTest,
    Hht, Integrator, Linear, Newmark, NewmarkExplicit, NewmarkParams, NewtonRaphson, TestKind,
    TransientIntegrator, VariableDt,
};
use sa_model::elements::{Dashpot, LumpedMass, Spring};
use sa_model::{AnalysisModel, ModelBuilder, RayleighDamping};
use sa_soe::{DiagonalSoe, LinearSoe, ProfileSoe};
use std::f64::consts::PI;

const OMEGA: f64 = 2.0 * PI;

/// m = 1, k = ω², released from u = 1 at rest.
fn oscillator(damping: Option<f64>) -> AnalysisModel {
    let mut b = ModelBuilder::new();
    let d = b.add_dof();
    b.add_element(Spring::linear(d, None, OMEGA * OMEGA).unwrap());
    b.add_element(LumpedMass::new(d, 1.0).unwrap());
    if let Some(c) = damping {
        b.add_element(Dashpot::new(d, None, c).unwrap());
    }
    let mut model = b.build().unwrap();
    model.set_disp(&DVector::from_element(1, 1.0)).unwrap();
    model
        .set_accel(&DVector::from_element(1, -OMEGA * OMEGA))
        .unwrap();
    model.update_domain().unwrap();
    model.commit_state().unwrap();
    model
}

fn energy(model: &AnalysisModel) -> f64 {
    let (u, v) = (model.disp()[0], model.vel()[0]);
    0.5 * v * v + 0.5 * OMEGA * OMEGA * u * u
}

fn run_linear(integrator: impl TransientIntegrator + 'static, steps: usize) -> AnalysisModel {
    let mut analysis = AnalysisBuilder::new(oscillator(None))
        .algorithm(Linear::new())
        .soe(ProfileSoe::default())
        .build_transient(integrator)
        .unwrap();
    analysis.analyze(steps, 0.01).unwrap();
    analysis.into_model()
}

#[test]
fn average_acceleration_conserves_energy_over_a_period() {
    let model = run_linear(Newmark::with_params(NewmarkParams::AVERAGE_ACCELERATION), 100);
    assert!((model.time() - 1.0).abs() < 1e-9);
    assert!((energy(&model) - 0.5 * OMEGA * OMEGA).abs() < 1e-8);
    // period elongation (ωΔt)²/12 leaves a small phase lag
    assert!((model.disp()[0] - 1.0).abs() < 1e-2);
}

#[test]
fn newton_with_newmark_converges_in_one_iteration_on_a_linear_oscillator() {
    let mut analysis = AnalysisBuilder::new(oscillator(Some(0.5)))
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .test(ConvergenceTest::new(TestKind::EnergyIncr, 1e-12, 5))
        .build_transient(Newmark::new(0.5, 0.25))
        .unwrap();
    analysis.analyze(50, 0.01).unwrap();
    assert!(analysis.record().iterations.iter().all(|&i| i == 1));
    // damped response loses energy
    assert!(energy(analysis.model()) < 0.5 * OMEGA * OMEGA);
}

#[test]
fn hht_with_alpha_one_is_newmark_and_smaller_alpha_dissipates() {
    let newmark = run_linear(Newmark::with_params(NewmarkParams::AVERAGE_ACCELERATION), 50);
    let hht_one = run_linear(Hht::new(1.0).unwrap(), 50);
    assert!((newmark.disp()[0] - hht_one.disp()[0]).abs() < 1e-10);
    assert!((newmark.vel()[0] - hht_one.vel()[0]).abs() < 1e-10);

    let hht = run_linear(Hht::new(0.8).unwrap(), 100);
    assert!(energy(&hht) < energy(&newmark));
}

#[test]
fn alpha_os_with_alpha_one_matches_newmark_on_a_linear_model() {
    let newmark = run_linear(Newmark::with_params(NewmarkParams::AVERAGE_ACCELERATION), 30);
    let alpha_os = run_linear(AlphaOs::new(1.0).unwrap(), 30);
    assert!((newmark.disp()[0] - alpha_os.disp()[0]).abs() < 1e-10);
}

#[test]
fn central_difference_runs_on_a_diagonal_system() {
    let mut analysis = AnalysisBuilder::new(oscillator(None))
        .algorithm(Linear::new())
        .soe(DiagonalSoe::default())
        .build_transient(CentralDifference::new())
        .unwrap();
    analysis.analyze(100, 0.001).unwrap();
    let t = analysis.model().committed_time();
    assert!((t - 0.1).abs() < 1e-9);
    assert!((analysis.model().disp()[0] - (OMEGA * t).cos()).abs() < 1e-4);
}

#[test]
fn explicit_newmark_rejects_a_second_update_inside_an_iteration() {
    let mut analysis = AnalysisBuilder::new(oscillator(None))
        .algorithm(NewtonRaphson::default())
        .soe(DiagonalSoe::default())
        .test(ConvergenceTest::new(TestKind::NormDispIncr, 1e-14, 5))
        .build_transient(NewmarkExplicit::new(0.5).unwrap())
        .unwrap();
    let err = analysis.step(0.01).unwrap_err();
    assert_eq!(err.code(), -4);
    match err {
        AnalysisError::Update(inner) => assert_eq!(inner.code(), -4),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(analysis.model().committed_time(), 0.0);
}

#[test]
fn newmark_zero_correction_leaves_the_prediction() {
    let mut model = oscillator(None);
    let mut soe = ProfileSoe::default();
    soe.set_size(&model.dof_graph().unwrap()).unwrap();
    let mut newmark = Newmark::new(0.5, 0.25);
    newmark.domain_changed(&model).unwrap();
    newmark.new_step(&mut model, 0.1).unwrap();
    let predicted = (model.disp(), model.vel(), model.accel());

    newmark
        .update(&mut model, &mut soe, &DVector::zeros(1))
        .unwrap();
    assert_eq!((model.disp(), model.vel(), model.accel()), predicted);
}

#[test]
fn rayleigh_damping_enters_the_transient_residual() {
    let damped = {
        let mut model = oscillator(None);
        model.set_rayleigh(Some(RayleighDamping::from_modal(0.05, OMEGA, 3.0 * OMEGA)));
        let mut analysis = AnalysisBuilder::new(model)
            .algorithm(Linear::new())
            .soe(ProfileSoe::default())
            .build_transient(Newmark::new(0.5, 0.25))
            .unwrap();
        analysis.analyze(100, 0.01).unwrap();
        analysis.into_model()
    };
    let undamped = run_linear(Newmark::new(0.5, 0.25), 100);
    assert!(energy(&damped) < 0.9 * energy(&undamped));
}

#[test]
fn variable_step_grows_with_fast_convergence() {
    let mut analysis = AnalysisBuilder::new(oscillator(None))
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .test(ConvergenceTest::new(TestKind::EnergyIncr, 1e-10, 10))
        .build_variable_transient(
            Box::new(Newmark::new(0.5, 0.25)),
            VariableDt {
                dt_min: 1e-3,
                dt_max: 0.05,
                jd: 4,
            },
        )
        .unwrap();
    analysis.analyze(4, 0.01).unwrap();
    let AnalysisRecord { time, .. } = analysis.record().clone();
    let steps: Vec<f64> = std::iter::once(time[0])
        .chain(time.windows(2).map(|w| w[1] - w[0]))
        .collect();
    for (got, want) in steps.iter().zip([0.01, 0.02, 0.04, 0.05]) {
        assert!((got - want).abs() < 1e-12, "{steps:?}");
    }
}

#[test]
fn variable_step_gives_up_below_dt_min() {
    let mut analysis = AnalysisBuilder::new(oscillator(None))
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .test(ConvergenceTest::new(TestKind::NormDispIncr, 1e-300, 1))
        .build_variable_transient(
            Box::new(Newmark::new(0.5, 0.25)),
            VariableDt {
                dt_min: 0.0025,
                dt_max: 0.01,
                jd: 1,
            },
        )
        .unwrap();
    let err = analysis.analyze(1, 0.01).unwrap_err();
    assert_eq!(err.code(), -6);
    assert_eq!(analysis.model().committed_time(), 0.0);
    assert!(analysis.model().trial_is_committed());
}

#[test]
fn invalid_newmark_parameters_fail_at_new_step() {
    let mut analysis = AnalysisBuilder::new(oscillator(None))
        .algorithm(Linear::new())
        .soe(ProfileSoe::default())
        .build_transient(Newmark::new(0.5, 0.0))
        .unwrap();
    let err = analysis.step(0.01).unwrap_err();
    assert_eq!(err.code(), -7);
}
