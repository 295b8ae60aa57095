//! Zero-length spring between two DOFs (or one DOF and ground).

use crate::element::{Element, TrialResponse};
use crate::error::{ModelError, ModelResult};
use nalgebra::{DMatrix, DVector};
use sa_core::DofId;

/// Force-deformation law of a spring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpringLaw {
    /// f = k d
    Linear { k: f64 },
    /// f = k d + k3 d³ (softening for k3 < 0)
    Cubic { k: f64, k3: f64 },
    /// Elastoplastic with linear kinematic hardening; `b` is the ratio of
    /// post-yield to elastic stiffness.
    Bilinear { k: f64, fy: f64, b: f64 },
}

impl SpringLaw {
    fn initial_tangent(&self) -> f64 {
        match *self {
            SpringLaw::Linear { k } | SpringLaw::Cubic { k, .. } | SpringLaw::Bilinear { k, .. } => k,
        }
    }

    fn validate(&self) -> ModelResult<()> {
        let ok = match *self {
            SpringLaw::Linear { k } => k.is_finite(),
            SpringLaw::Cubic { k, k3 } => k.is_finite() && k3.is_finite(),
            SpringLaw::Bilinear { k, fy, b } => k > 0.0 && fy > 0.0 && (0.0..1.0).contains(&b),
        };
        if ok {
            Ok(())
        } else {
            Err(ModelError::InvalidParameter {
                what: format!("spring law {self:?}"),
            })
        }
    }
}

/// Plastic history of a bilinear spring.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct PlasticState {
    plastic_def: f64,
    back_force: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct SpringResponse {
    deformation: f64,
    force: f64,
    tangent: f64,
    plastic: PlasticState,
}

#[derive(Clone, Debug)]
pub struct Spring {
    dofs: Vec<DofId>,
    law: SpringLaw,
    trial: SpringResponse,
    committed: SpringResponse,
}

impl Spring {
    /// Spring from `i` to `j`; with `j = None` the far end is grounded.
    pub fn new(i: DofId, j: Option<DofId>, law: SpringLaw) -> ModelResult<Self> {
        law.validate()?;
        let dofs = match j {
            Some(j) if j == i => {
                return Err(ModelError::InvalidParameter {
                    what: format!("spring connects DOF {i} to itself"),
                });
            }
            Some(j) => vec![i, j],
            None => vec![i],
        };
        let start = SpringResponse {
            tangent: law.initial_tangent(),
            ..SpringResponse::default()
        };
        Ok(Self {
            dofs,
            law,
            trial: start,
            committed: start,
        })
    }

    pub fn linear(i: DofId, j: Option<DofId>, k: f64) -> ModelResult<Self> {
        Self::new(i, j, SpringLaw::Linear { k })
    }

    pub fn deformation(&self) -> f64 {
        self.trial.deformation
    }

    pub fn force(&self) -> f64 {
        self.trial.force
    }

    /// Local-to-deformation map: d = Bᵀ u.
    fn b(&self) -> DVector<f64> {
        if self.dofs.len() == 2 {
            DVector::from_vec(vec![-1.0, 1.0])
        } else {
            DVector::from_element(1, 1.0)
        }
    }

    fn stiffness(&self, k: f64) -> DMatrix<f64> {
        let b = self.b();
        &b * b.transpose() * k
    }

    fn respond(&self, d: f64) -> SpringResponse {
        match self.law {
            SpringLaw::Linear { k } => SpringResponse {
                deformation: d,
                force: k * d,
                tangent: k,
                plastic: PlasticState::default(),
            },
            SpringLaw::Cubic { k, k3 } => SpringResponse {
                deformation: d,
                force: k * d + k3 * d * d * d,
                tangent: k + 3.0 * k3 * d * d,
                plastic: PlasticState::default(),
            },
            SpringLaw::Bilinear { k, fy, b } => {
                let h = b * k / (1.0 - b);
                let prev = self.committed.plastic;
                let f_trial = k * (d - prev.plastic_def);
                let xi = f_trial - prev.back_force;
                let yield_fn = xi.abs() - fy;
                if yield_fn <= 0.0 {
                    SpringResponse {
                        deformation: d,
                        force: f_trial,
                        tangent: k,
                        plastic: prev,
                    }
                } else {
                    let dgamma = yield_fn / (k + h);
                    let sign = xi.signum();
                    SpringResponse {
                        deformation: d,
                        force: f_trial - k * dgamma * sign,
                        tangent: k * h / (k + h),
                        plastic: PlasticState {
                            plastic_def: prev.plastic_def + dgamma * sign,
                            back_force: prev.back_force + h * dgamma * sign,
                        },
                    }
                }
            }
        }
    }
}

impl Element for Spring {
    fn name(&self) -> &'static str {
        "Spring"
    }

    fn dofs(&self) -> &[DofId] {
        &self.dofs
    }

    fn update(&mut self, trial: &TrialResponse<'_>) -> ModelResult<()> {
        let d = match self.dofs.as_slice() {
            [i, j] => trial.disp(*j) - trial.disp(*i),
            [i] => trial.disp(*i),
            _ => unreachable!("spring has one or two DOFs"),
        };
        let response = self.respond(d);
        if !response.force.is_finite() {
            return Err(ModelError::InvalidParameter {
                what: format!("non-finite spring force at deformation {d}"),
            });
        }
        self.trial = response;
        Ok(())
    }

    fn tangent_stiff(&self) -> DMatrix<f64> {
        self.stiffness(self.trial.tangent)
    }

    fn initial_stiff(&self) -> DMatrix<f64> {
        self.stiffness(self.law.initial_tangent())
    }

    fn committed_stiff(&self) -> DMatrix<f64> {
        self.stiffness(self.committed.tangent)
    }

    fn resisting_force(&self) -> DVector<f64> {
        self.b() * self.trial.force
    }

    fn commit_state(&mut self) -> ModelResult<()> {
        self.committed = self.trial;
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> ModelResult<()> {
        self.trial = self.committed;
        Ok(())
    }

    fn revert_to_start(&mut self) -> ModelResult<()> {
        let start = SpringResponse {
            tangent: self.law.initial_tangent(),
            ..SpringResponse::default()
        };
        self.trial = start;
        self.committed = start;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(u: &DVector<f64>) -> TrialResponse<'_> {
        TrialResponse {
            disp: u,
            vel: u,
            accel: u,
            time: 0.0,
        }
    }

    #[test]
    fn two_dof_linear_spring() {
        let mut s = Spring::linear(DofId::from_index(0), Some(DofId::from_index(1)), 100.0)
            .unwrap();
        let u = DVector::from_vec(vec![0.0, 0.01]);
        s.update(&view(&u)).unwrap();
        assert!((s.force() - 1.0).abs() < 1e-12);
        let r = s.resisting_force();
        assert_eq!(r.as_slice(), &[-1.0, 1.0]);
        let k = s.tangent_stiff();
        assert_eq!(k[(0, 1)], -100.0);
    }

    #[test]
    fn cubic_spring_softens() {
        let mut s = Spring::new(
            DofId::from_index(0),
            None,
            SpringLaw::Cubic { k: 100.0, k3: -100.0 },
        )
        .unwrap();
        let u = DVector::from_element(1, 0.5);
        s.update(&view(&u)).unwrap();
        assert!((s.force() - (50.0 - 12.5)).abs() < 1e-12);
        assert!((s.tangent_stiff()[(0, 0)] - 25.0).abs() < 1e-12);
    }

    #[test]
    fn bilinear_spring_yields_and_reverts() {
        let law = SpringLaw::Bilinear {
            k: 100.0,
            fy: 1.0,
            b: 0.1,
        };
        let mut s = Spring::new(DofId::from_index(0), None, law).unwrap();
        let u = DVector::from_element(1, 0.02);
        s.update(&view(&u)).unwrap();
        // yield at d = 0.01, hardening slope k*b
        assert!((s.force() - (1.0 + 10.0 * 0.01)).abs() < 1e-12);
        assert!((s.tangent_stiff()[(0, 0)] - 10.0).abs() < 1e-12);

        s.revert_to_last_commit().unwrap();
        assert_eq!(s.force(), 0.0);
        assert_eq!(s.tangent_stiff()[(0, 0)], 100.0);
    }

    #[test]
    fn self_connected_spring_is_rejected() {
        let d = DofId::from_index(3);
        assert!(Spring::linear(d, Some(d), 1.0).is_err());
    }
}
