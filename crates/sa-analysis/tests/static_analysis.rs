use sa_analysis::{
    AnalysisBuilder, AnalysisError, ArcLength, ArcLength1, ConvergenceTest, DisplacementControl,
    Integrator, Linear, LoadControl, MinUnbalDispNorm, ModifiedNewton, NewtonRaphson,
    NewtonTangent, StaticIntegrator, TangentKind, TestKind,
};
use sa_core::DofId;
use sa_model::elements::{Spring, SpringLaw};
use sa_model::{AnalysisModel, LoadPattern, ModelBuilder, TimeSeries};
use sa_soe::{BandSpdSoe, DofGraph, FullGenSoe, LinearSoe, ProfileSoe};

/// d0 fixed, spring k = 100 to d1, load `p` on d1.
fn two_dof_spring(p: f64) -> AnalysisModel {
    let mut b = ModelBuilder::new();
    let d = b.add_dofs(2);
    b.fix(d[0]).unwrap();
    b.add_element(Spring::linear(d[0], Some(d[1]), 100.0).unwrap());
    b.add_pattern(
        LoadPattern::new(TimeSeries::Linear { factor: 1.0 })
            .unwrap()
            .with_load(d[1], p),
    );
    b.build().unwrap()
}

/// Three free DOFs in a chain tied to ground.
fn chain() -> AnalysisModel {
    let mut b = ModelBuilder::new();
    let d = b.add_dofs(3);
    b.add_element(Spring::linear(d[0], None, 50.0).unwrap());
    b.add_element(Spring::linear(d[0], Some(d[1]), 20.0).unwrap());
    b.add_element(Spring::linear(d[1], Some(d[2]), 10.0).unwrap());
    b.add_pattern(
        LoadPattern::new(TimeSeries::Linear { factor: 1.0 })
            .unwrap()
            .with_load(d[1], 2.0)
            .with_load(d[2], 4.0),
    );
    b.build().unwrap()
}

/// Single DOF on a cubic spring with reference load 1.
fn cubic(k3: f64) -> AnalysisModel {
    let mut b = ModelBuilder::new();
    let d = b.add_dof();
    b.add_element(Spring::new(d, None, SpringLaw::Cubic { k: 100.0, k3 }).unwrap());
    b.add_pattern(
        LoadPattern::new(TimeSeries::Linear { factor: 1.0 })
            .unwrap()
            .with_load(d, 1.0),
    );
    b.build().unwrap()
}

fn newton_test() -> ConvergenceTest {
    ConvergenceTest::new(TestKind::NormUnbalance, 1e-9, 50)
}

#[test]
fn newton_on_linear_spring_converges_in_one_iteration() {
    let mut analysis = AnalysisBuilder::new(two_dof_spring(10.0))
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .test(ConvergenceTest::new(TestKind::EnergyIncr, 1e-10, 10))
        .build_static(LoadControl::new(1.0).unwrap())
        .unwrap();
    let report = analysis.step().unwrap();
    assert_eq!(report.iterations, 1);
    assert_eq!(report.norms.len(), 1);

    let u = analysis.model().disp();
    assert!((u[0] - 0.1).abs() < 1e-12);
    assert_eq!(analysis.model().committed_time(), 1.0);
    assert_eq!(analysis.record().disp[0], vec![0.0, u[0]]);
}

#[test]
fn linear_algorithm_runs_one_cycle_without_a_test() {
    let mut analysis = AnalysisBuilder::new(two_dof_spring(5.0))
        .algorithm(Linear::new())
        .soe(FullGenSoe::default())
        .build_static(LoadControl::new(0.5).unwrap())
        .unwrap();
    analysis.analyze(2).unwrap();
    let record = analysis.record();
    assert_eq!(record.iterations, vec![1, 1]);
    assert_eq!(record.time, vec![0.5, 1.0]);
    assert!((record.disp[1][1] - 0.05).abs() < 1e-14);
}

#[test]
fn factor_once_reuses_the_first_tangent() {
    let mut analysis = AnalysisBuilder::new(chain())
        .algorithm(Linear::factor_once())
        .soe(BandSpdSoe::default())
        .build_static(LoadControl::new(0.25).unwrap())
        .unwrap();
    analysis.analyze(4).unwrap();
    let u = analysis.model().disp();
    // exact for a linear model: d0 = 6/50, d1 = d0 + 6/20, d2 = d1 + 4/10
    let expected = [0.12, 0.42, 0.82];
    for (a, b) in u.iter().zip(expected) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn modified_newton_matches_newton_on_a_linear_model() {
    let run = |newton: bool| {
        let builder = AnalysisBuilder::new(chain())
            .soe(ProfileSoe::default())
            .test(ConvergenceTest::new(TestKind::NormDispIncr, 1e-12, 10));
        let builder = if newton {
            builder.algorithm(NewtonRaphson::default())
        } else {
            builder.algorithm(ModifiedNewton::new(TangentKind::Current))
        };
        let mut analysis = builder
            .build_static(LoadControl::new(0.25).unwrap())
            .unwrap();
        analysis.analyze(4).unwrap();
        analysis.record().clone()
    };
    let full = run(true);
    let modified = run(false);
    assert_eq!(full.iterations, modified.iterations);
    for (a, b) in full.disp.iter().flatten().zip(modified.disp.iter().flatten()) {
        assert!((a - b).abs() < 1e-14);
    }
}

#[test]
fn newton_tangent_choices_reach_the_same_equilibrium() {
    for tangent in [
        NewtonTangent::Current,
        NewtonTangent::Initial,
        NewtonTangent::InitialThenCurrent,
    ] {
        let mut analysis = AnalysisBuilder::new(cubic(-100.0))
            .algorithm(NewtonRaphson::new(tangent))
            .soe(FullGenSoe::default())
            .test(newton_test())
            .build_static(LoadControl::new(10.0).unwrap())
            .unwrap();
        analysis.analyze(3).unwrap();
        let u = analysis.model().disp()[0];
        let residual = 30.0 - (100.0 * u - 100.0 * u.powi(3));
        assert!(residual.abs() < 1e-8, "{tangent:?}: residual {residual}");
    }
}

#[test]
fn displacement_control_follows_softening_curve() {
    let mut analysis = AnalysisBuilder::new(cubic(-100.0))
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .test(newton_test())
        .build_static(DisplacementControl::new(DofId::from_index(0), 0.05).unwrap())
        .unwrap();
    analysis.analyze(10).unwrap();
    let u = analysis.model().disp()[0];
    assert!((u - 0.5).abs() < 1e-10);
    assert!((analysis.model().committed_time() - 37.5).abs() < 1e-6);
}

#[test]
fn displacement_control_on_fixed_dof_is_rejected_at_setup() {
    let mut analysis = AnalysisBuilder::new(two_dof_spring(1.0))
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .test(newton_test())
        .build_static(DisplacementControl::new(DofId::from_index(0), 0.01).unwrap())
        .unwrap();
    let err = analysis.analyze(1).unwrap_err();
    assert!(matches!(err, AnalysisError::NewStep(_)));
}

#[test]
fn arc_length_steps_stay_on_the_equilibrium_path() {
    for quadratic in [true, false] {
        let builder = AnalysisBuilder::new(cubic(-100.0))
            .algorithm(NewtonRaphson::default())
            .soe(ProfileSoe::default())
            .test(newton_test());
        let built = if quadratic {
            builder.build_static(ArcLength::new(0.05, 0.01).unwrap())
        } else {
            builder.build_static(ArcLength1::new(0.05, 0.01).unwrap())
        };
        let mut analysis = built.unwrap();
        analysis.analyze(5).unwrap();

        let lambda = analysis.model().committed_time();
        let u = analysis.model().disp()[0];
        assert!(lambda > 0.0 && u > 0.0);
        assert!((lambda - (100.0 * u - 100.0 * u.powi(3))).abs() < 1e-6);
        let times = &analysis.record().time;
        assert!(times.windows(2).all(|w| w[1] > w[0]));
    }
}

#[test]
fn min_unbal_disp_norm_stays_on_the_equilibrium_path() {
    let mut analysis = AnalysisBuilder::new(cubic(-100.0))
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .test(newton_test())
        .build_static(MinUnbalDispNorm::new(5.0).unwrap())
        .unwrap();
    analysis.analyze(4).unwrap();
    // one DOF: iterations keep U and move λ onto the curve
    let lambda = analysis.model().committed_time();
    let u = analysis.model().disp()[0];
    assert!(lambda > 15.0 && lambda < 20.0);
    assert!((lambda - (100.0 * u - 100.0 * u.powi(3))).abs() < 1e-6);
}

#[test]
fn degenerate_arc_length_is_code_minus_one() {
    // no load pattern and alpha = 0: the predictor has a zero denominator
    let mut b = ModelBuilder::new();
    let d = b.add_dof();
    b.add_element(Spring::linear(d, None, 10.0).unwrap());
    let mut model = b.build().unwrap();

    let mut soe = ProfileSoe::default();
    soe.set_size(&model.dof_graph().unwrap()).unwrap();
    let mut arc = ArcLength1::new(1.0, 0.0).unwrap();
    arc.domain_changed(&model).unwrap();
    let err = arc.new_step(&mut model, &mut soe).unwrap_err();
    assert_eq!(err.code(), -1);

    let mut analysis = AnalysisBuilder::new(model)
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .test(newton_test())
        .build_static(ArcLength1::new(1.0, 0.0).unwrap())
        .unwrap();
    match analysis.step().unwrap_err() {
        AnalysisError::NewStep(inner) => assert_eq!(inner.code(), -1),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(analysis.model().trial_is_committed());
}

#[test]
fn missing_parts_are_unbound() {
    let err = AnalysisBuilder::new(chain())
        .algorithm(NewtonRaphson::default())
        .test(newton_test())
        .build_static(LoadControl::new(0.1).unwrap())
        .err()
        .unwrap();
    assert_eq!(err.code(), -5);

    let err = AnalysisBuilder::new(chain())
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .build_static(LoadControl::new(0.1).unwrap())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        AnalysisError::Unbound {
            what: "convergence test"
        }
    ));
}

#[test]
fn non_convergence_reverts_the_step() {
    let mut analysis = AnalysisBuilder::new(cubic(-100.0))
        .algorithm(NewtonRaphson::default())
        .soe(ProfileSoe::default())
        .test(ConvergenceTest::new(TestKind::NormUnbalance, 1e-12, 1))
        .build_static(LoadControl::new(30.0).unwrap())
        .unwrap();
    let err = analysis.analyze(1).unwrap_err();
    assert_eq!(err.code(), -6);
    assert!(err.is_non_convergence());
    assert_eq!(analysis.model().committed_time(), 0.0);
    assert!(analysis.model().trial_is_committed());
    assert!(analysis.record().is_empty());
}

#[test]
fn tangent_and_unbalance_are_deterministic() {
    let mut model = chain();
    model.apply_load(0.7);
    model.update_domain().unwrap();
    let graph: DofGraph = model.dof_graph().unwrap();
    let mut lc = LoadControl::new(0.1).unwrap();

    let mut solve_once = || {
        let mut soe = FullGenSoe::default();
        soe.set_size(&graph).unwrap();
        lc.form_tangent(&model, &mut soe, TangentKind::Current).unwrap();
        lc.form_unbalance(&model, &mut soe).unwrap();
        let b = soe.b().clone();
        soe.solve().unwrap();
        (b, soe.x().clone())
    };
    let first = solve_once();
    let second = solve_once();
    assert_eq!(first, second);
}
