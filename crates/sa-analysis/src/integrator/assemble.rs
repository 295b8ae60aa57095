//! Element-by-element assembly into the system of equations.

use crate::error::IntegratorResult;
use crate::integrator::TangentKind;
use nalgebra::{DMatrix, DVector};
use sa_core::timing::{Phase, Timer};
use sa_model::{AnalysisModel, Element, ResponseKind};
use sa_soe::LinearSoe;

/// Element matrices the integrators combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MatrixKind {
    Stiffness(TangentKind),
    Damping,
    Mass,
}

pub(crate) fn element_matrix(
    model: &AnalysisModel,
    element: &dyn Element,
    kind: MatrixKind,
) -> DMatrix<f64> {
    match kind {
        MatrixKind::Stiffness(TangentKind::Current) => element.tangent_stiff(),
        MatrixKind::Stiffness(TangentKind::Initial) => element.initial_stiff(),
        MatrixKind::Damping => model.element_damp(element),
        MatrixKind::Mass => element.mass(),
    }
}

/// `A = ck K + cc C + cm M`
#[derive(Clone, Copy, Debug)]
pub(crate) struct TangentCoeffs {
    pub k: f64,
    pub c: f64,
    pub m: f64,
}

impl TangentCoeffs {
    pub const STATIC: TangentCoeffs = TangentCoeffs {
        k: 1.0,
        c: 0.0,
        m: 0.0,
    };
}

pub(crate) fn assemble_tangent(
    model: &AnalysisModel,
    soe: &mut dyn LinearSoe,
    kind: TangentKind,
    coeffs: TangentCoeffs,
) -> IntegratorResult<()> {
    let timer = Timer::start();
    soe.zero_a();
    let result = add_tangent(model, soe, kind, coeffs);
    timer.stop_into(Phase::AssembleTangent);
    result
}

fn add_tangent(
    model: &AnalysisModel,
    soe: &mut dyn LinearSoe,
    kind: TangentKind,
    coeffs: TangentCoeffs,
) -> IntegratorResult<()> {
    for (e, ids) in model.elements() {
        if coeffs.k != 0.0 {
            soe.add_a(
                &element_matrix(model, e, MatrixKind::Stiffness(kind)),
                ids,
                coeffs.k,
            )?;
        }
        if coeffs.c != 0.0 {
            soe.add_a(&model.element_damp(e), ids, coeffs.c)?;
        }
        if coeffs.m != 0.0 {
            soe.add_a(&e.mass(), ids, coeffs.m)?;
        }
    }
    Ok(())
}

/// `b = load - Σ R_e` and, with `inertia`, `- Σ (C_e v_e + M_e a_e)` at
/// the trial state.
pub(crate) fn assemble_unbalance(
    model: &AnalysisModel,
    soe: &mut dyn LinearSoe,
    load: &DVector<f64>,
    inertia: bool,
) -> IntegratorResult<()> {
    let timer = Timer::start();
    let result = add_unbalance(model, soe, load, inertia);
    timer.stop_into(Phase::AssembleUnbalance);
    result
}

fn add_unbalance(
    model: &AnalysisModel,
    soe: &mut dyn LinearSoe,
    load: &DVector<f64>,
    inertia: bool,
) -> IntegratorResult<()> {
    soe.set_b(load)?;
    for (e, ids) in model.elements() {
        soe.add_b(&e.resisting_force(), ids, -1.0)?;
        if !inertia {
            continue;
        }
        let m = e.mass();
        if m.iter().any(|&v| v != 0.0) {
            let a = model.element_response(e, ResponseKind::Accel);
            soe.add_b(&(m * a), ids, -1.0)?;
        }
        let c = model.element_damp(e);
        if c.iter().any(|&v| v != 0.0) {
            let v = model.element_response(e, ResponseKind::Vel);
            soe.add_b(&(c * v), ids, -1.0)?;
        }
    }
    Ok(())
}

/// Gather an equation-space vector onto an element's local DOFs.
fn localize(v: &DVector<f64>, ids: &[Option<usize>]) -> DVector<f64> {
    DVector::from_iterator(ids.len(), ids.iter().map(|eq| eq.map_or(0.0, |i| v[i])))
}

/// `b += factor · Σ X_e v_e` for an equation-space vector `v`.
pub(crate) fn add_matrix_product(
    model: &AnalysisModel,
    soe: &mut dyn LinearSoe,
    kind: MatrixKind,
    v: &DVector<f64>,
    factor: f64,
) -> IntegratorResult<()> {
    if factor == 0.0 {
        return Ok(());
    }
    for (e, ids) in model.elements() {
        let x = element_matrix(model, e, kind);
        soe.add_b(&(x * localize(v, ids)), ids, factor)?;
    }
    Ok(())
}

/// Assembled `Σ R_e` (plus `Σ C_e v_e` with `damping`) in equation space.
pub(crate) fn internal_forces(model: &AnalysisModel, damping: bool) -> DVector<f64> {
    let mut f = DVector::zeros(model.num_eqn());
    for (e, ids) in model.elements() {
        let mut local = e.resisting_force();
        if damping {
            local += model.element_damp(e) * model.element_response(e, ResponseKind::Vel);
        }
        for (i, eq) in ids.iter().enumerate() {
            if let Some(eq) = *eq {
                f[eq] += local[i];
            }
        }
    }
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use sa_model::ModelBuilder;
    use sa_model::elements::{LumpedMass, Spring};
    use sa_soe::FullGenSoe;

    fn two_springs() -> AnalysisModel {
        let mut b = ModelBuilder::new();
        let d = b.add_dofs(2);
        b.add_element(Spring::linear(d[0], None, 3.0).unwrap());
        b.add_element(Spring::linear(d[0], Some(d[1]), 2.0).unwrap());
        b.add_element(LumpedMass::new(d[1], 5.0).unwrap());
        b.build().unwrap()
    }

    fn sized(model: &AnalysisModel) -> FullGenSoe {
        let mut soe = FullGenSoe::default();
        soe.set_size(&model.dof_graph().unwrap()).unwrap();
        soe
    }

    #[test]
    fn tangent_combines_stiffness_and_mass() {
        let model = two_springs();
        let mut soe = sized(&model);
        let coeffs = TangentCoeffs {
            k: 1.0,
            c: 0.0,
            m: 2.0,
        };
        assemble_tangent(&model, &mut soe, TangentKind::Current, coeffs).unwrap();
        let expected = DMatrix::from_row_slice(2, 2, &[5.0, -2.0, -2.0, 12.0]);
        assert_eq!(soe.storage().matrix(), &expected);
    }

    #[test]
    fn assembly_is_deterministic() {
        let mut model = two_springs();
        model
            .set_disp(&DVector::from_vec(vec![0.3, -0.1]))
            .unwrap();
        model.update_domain().unwrap();
        let mut soe1 = sized(&model);
        let mut soe2 = sized(&model);
        let load = DVector::from_vec(vec![1.0, 2.0]);
        for soe in [&mut soe1, &mut soe2] {
            assemble_tangent(&model, &mut *soe, TangentKind::Current, TangentCoeffs::STATIC)
                .unwrap();
            assemble_unbalance(&model, &mut *soe, &load, true).unwrap();
        }
        assert_eq!(soe1.storage().matrix(), soe2.storage().matrix());
        assert_eq!(soe1.b(), soe2.b());
        // R = [3*0.3 - 2*(-0.4), 2*(-0.4)]
        assert!((soe1.b()[0] - (1.0 - 1.7)).abs() < 1e-12);
        assert!((soe1.b()[1] - (2.0 + 0.8)).abs() < 1e-12);
    }

    #[test]
    fn internal_forces_match_unbalance() {
        let mut model = two_springs();
        model.set_disp(&DVector::from_vec(vec![0.1, 0.2])).unwrap();
        model.update_domain().unwrap();
        let f = internal_forces(&model, false);
        let mut soe = sized(&model);
        assemble_unbalance(&model, &mut soe, &DVector::zeros(2), false).unwrap();
        assert_eq!(f, -soe.b().clone());
    }
}
