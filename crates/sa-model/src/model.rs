//! Analysis model: DOFs, elements and loads plus the committed and trial
//! response.
//!
//! The response is stored per DOF. Integrators work in equation space, so
//! every vector accessor below gathers or scatters through the equation
//! numbering; constrained DOFs stay at zero.

use crate::damping::RayleighDamping;
use crate::element::{Element, ResponseKind, TrialResponse};
use crate::error::{ModelError, ModelResult};
use crate::load::LoadPattern;
use crate::numbering::Numberer;
use nalgebra::{DMatrix, DVector};
use sa_core::{DofId, ensure_finite};
use sa_core::timing::{Phase, Timer};
use sa_soe::DofGraph;

#[derive(Clone, Debug, PartialEq)]
struct ResponseState {
    disp: DVector<f64>,
    vel: DVector<f64>,
    accel: DVector<f64>,
    time: f64,
}

impl ResponseState {
    fn zeros(n: usize) -> Self {
        Self {
            disp: DVector::zeros(n),
            vel: DVector::zeros(n),
            accel: DVector::zeros(n),
            time: 0.0,
        }
    }

    fn field(&self, kind: ResponseKind) -> &DVector<f64> {
        match kind {
            ResponseKind::Disp => &self.disp,
            ResponseKind::Vel => &self.vel,
            ResponseKind::Accel => &self.accel,
        }
    }

    fn field_mut(&mut self, kind: ResponseKind) -> &mut DVector<f64> {
        match kind {
            ResponseKind::Disp => &mut self.disp,
            ResponseKind::Vel => &mut self.vel,
            ResponseKind::Accel => &mut self.accel,
        }
    }
}

/// The structure being analysed. Built with [`crate::ModelBuilder`].
#[derive(Debug)]
pub struct AnalysisModel {
    fixed: Vec<bool>,
    elements: Vec<Box<dyn Element>>,
    patterns: Vec<LoadPattern>,
    rayleigh: Option<RayleighDamping>,
    numberer: Numberer,
    dof_eq: Vec<Option<usize>>,
    eq_dof: Vec<usize>,
    element_eqs: Vec<Vec<Option<usize>>>,
    numbered: bool,
    trial: ResponseState,
    committed: ResponseState,
}

impl AnalysisModel {
    pub(crate) fn new(
        fixed: Vec<bool>,
        elements: Vec<Box<dyn Element>>,
        patterns: Vec<LoadPattern>,
        rayleigh: Option<RayleighDamping>,
        numberer: Numberer,
    ) -> Self {
        let n = fixed.len();
        Self {
            fixed,
            elements,
            patterns,
            rayleigh,
            numberer,
            dof_eq: vec![None; n],
            eq_dof: Vec::new(),
            element_eqs: Vec::new(),
            numbered: false,
            trial: ResponseState::zeros(n),
            committed: ResponseState::zeros(n),
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.fixed.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn num_eqn(&self) -> usize {
        self.eq_dof.len()
    }

    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    pub fn is_fixed(&self, dof: DofId) -> bool {
        self.fixed.get(dof.index()).copied().unwrap_or(false)
    }

    pub fn numberer(&self) -> Numberer {
        self.numberer
    }

    pub fn set_numberer(&mut self, numberer: Numberer) {
        self.numberer = numberer;
        self.numbered = false;
    }

    pub fn rayleigh(&self) -> Option<RayleighDamping> {
        self.rayleigh
    }

    pub fn set_rayleigh(&mut self, rayleigh: Option<RayleighDamping>) {
        self.rayleigh = rayleigh.filter(|r| !r.is_zero());
    }

    /// Assign equation numbers to the free DOFs and return their count.
    pub fn number_equations(&mut self) -> usize {
        let free: Vec<usize> = (0..self.num_dofs()).filter(|&d| !self.fixed[d]).collect();
        let mut free_index = vec![None; self.num_dofs()];
        for (k, &d) in free.iter().enumerate() {
            free_index[d] = Some(k);
        }

        let mut graph = DofGraph::new(free.len());
        for e in &self.elements {
            let ids: Vec<Option<usize>> = e.dofs().iter().map(|d| free_index[d.index()]).collect();
            graph.add_clique(&ids);
        }
        let perm = self.numberer.permutation(&graph);

        self.dof_eq = free_index
            .iter()
            .map(|k| k.map(|k| perm[k]))
            .collect();
        self.eq_dof = vec![0; free.len()];
        for (k, &d) in free.iter().enumerate() {
            self.eq_dof[perm[k]] = d;
        }
        self.element_eqs = self
            .elements
            .iter()
            .map(|e| e.dofs().iter().map(|d| self.dof_eq[d.index()]).collect())
            .collect();
        self.numbered = true;

        tracing::debug!(
            num_eqn = free.len(),
            numberer = ?self.numberer,
            "equations numbered"
        );
        free.len()
    }

    /// Equation number of a DOF; `None` when it is constrained.
    pub fn equation(&self, dof: DofId) -> ModelResult<Option<usize>> {
        self.check_numbered()?;
        self.dof_eq
            .get(dof.index())
            .copied()
            .ok_or(ModelError::InvalidDof {
                dof,
                num_dofs: self.num_dofs(),
            })
    }

    /// Connectivity of the active equations.
    pub fn dof_graph(&self) -> ModelResult<DofGraph> {
        self.check_numbered()?;
        let mut graph = DofGraph::new(self.num_eqn());
        for ids in &self.element_eqs {
            graph.add_clique(ids);
        }
        Ok(graph)
    }

    /// Elements paired with their equation numbers.
    pub fn elements(&self) -> impl Iterator<Item = (&dyn Element, &[Option<usize>])> + '_ {
        self.elements
            .iter()
            .zip(&self.element_eqs)
            .map(|(e, ids)| (e.as_ref(), ids.as_slice()))
    }

    /// Element damping including the model's Rayleigh terms.
    pub fn element_damp(&self, element: &dyn Element) -> DMatrix<f64> {
        let own = element.damp();
        match self.rayleigh {
            Some(r) => {
                own + r.matrix(
                    || element.mass(),
                    || element.tangent_stiff(),
                    || element.initial_stiff(),
                    || element.committed_stiff(),
                    element.dofs().len(),
                )
            }
            None => own,
        }
    }

    /// Local trial response of an element's DOFs.
    pub fn element_response(&self, element: &dyn Element, kind: ResponseKind) -> DVector<f64> {
        self.view().gather(element.dofs(), kind)
    }

    fn view(&self) -> TrialResponse<'_> {
        TrialResponse {
            disp: &self.trial.disp,
            vel: &self.trial.vel,
            accel: &self.trial.accel,
            time: self.trial.time,
        }
    }

    fn check_numbered(&self) -> ModelResult<()> {
        if self.numbered {
            Ok(())
        } else {
            Err(ModelError::NotNumbered)
        }
    }

    fn check_len(&self, what: &'static str, v: &DVector<f64>) -> ModelResult<()> {
        self.check_numbered()?;
        if v.len() != self.num_eqn() {
            return Err(ModelError::SizeMismatch {
                what,
                expected: self.num_eqn(),
                actual: v.len(),
            });
        }
        Ok(())
    }

    fn gather(&self, src: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.eq_dof.len(), self.eq_dof.iter().map(|&d| src[d]))
    }

    // ---- trial and committed response (equation space) ----

    pub fn disp(&self) -> DVector<f64> {
        self.gather(&self.trial.disp)
    }

    pub fn vel(&self) -> DVector<f64> {
        self.gather(&self.trial.vel)
    }

    pub fn accel(&self) -> DVector<f64> {
        self.gather(&self.trial.accel)
    }

    pub fn committed_disp(&self) -> DVector<f64> {
        self.gather(&self.committed.disp)
    }

    pub fn committed_vel(&self) -> DVector<f64> {
        self.gather(&self.committed.vel)
    }

    pub fn committed_accel(&self) -> DVector<f64> {
        self.gather(&self.committed.accel)
    }

    /// Trial response of one DOF.
    pub fn dof_response(&self, dof: DofId, kind: ResponseKind) -> ModelResult<f64> {
        self.trial
            .field(kind)
            .get(dof.index())
            .copied()
            .ok_or(ModelError::InvalidDof {
                dof,
                num_dofs: self.num_dofs(),
            })
    }

    fn scatter(&mut self, kind: ResponseKind, v: &DVector<f64>, factor: Option<f64>) {
        let dst = self.trial.field_mut(kind);
        for (eq, &d) in self.eq_dof.iter().enumerate() {
            match factor {
                Some(f) => dst[d] += f * v[eq],
                None => dst[d] = v[eq],
            }
        }
    }

    pub fn set_disp(&mut self, u: &DVector<f64>) -> ModelResult<()> {
        self.check_len("displacement", u)?;
        self.scatter(ResponseKind::Disp, u, None);
        Ok(())
    }

    pub fn set_vel(&mut self, v: &DVector<f64>) -> ModelResult<()> {
        self.check_len("velocity", v)?;
        self.scatter(ResponseKind::Vel, v, None);
        Ok(())
    }

    pub fn set_accel(&mut self, a: &DVector<f64>) -> ModelResult<()> {
        self.check_len("acceleration", a)?;
        self.scatter(ResponseKind::Accel, a, None);
        Ok(())
    }

    pub fn set_response(
        &mut self,
        u: &DVector<f64>,
        v: &DVector<f64>,
        a: &DVector<f64>,
    ) -> ModelResult<()> {
        self.set_disp(u)?;
        self.set_vel(v)?;
        self.set_accel(a)
    }

    /// `U += factor · du`
    pub fn incr_disp(&mut self, du: &DVector<f64>, factor: f64) -> ModelResult<()> {
        self.check_len("displacement increment", du)?;
        ensure_finite(factor, "increment factor")?;
        self.scatter(ResponseKind::Disp, du, Some(factor));
        Ok(())
    }

    pub fn incr_vel(&mut self, dv: &DVector<f64>, factor: f64) -> ModelResult<()> {
        self.check_len("velocity increment", dv)?;
        ensure_finite(factor, "increment factor")?;
        self.scatter(ResponseKind::Vel, dv, Some(factor));
        Ok(())
    }

    pub fn incr_accel(&mut self, da: &DVector<f64>, factor: f64) -> ModelResult<()> {
        self.check_len("acceleration increment", da)?;
        ensure_finite(factor, "increment factor")?;
        self.scatter(ResponseKind::Accel, da, Some(factor));
        Ok(())
    }

    // ---- time and loads ----

    /// Trial pseudo-time (the load factor in static analysis).
    pub fn time(&self) -> f64 {
        self.trial.time
    }

    pub fn committed_time(&self) -> f64 {
        self.committed.time
    }

    /// Move the trial state to time `t`; loads are evaluated there.
    pub fn apply_load(&mut self, t: f64) {
        self.trial.time = t;
    }

    /// Reset both trial and committed time, e.g. after [`Self::set_load_const`].
    pub fn reset_time(&mut self, t: f64) {
        self.trial.time = t;
        self.committed.time = t;
    }

    /// Applied load at time `t` in equation space.
    pub fn load_at(&self, t: f64) -> DVector<f64> {
        let mut p = DVector::zeros(self.num_eqn());
        for pattern in &self.patterns {
            let f = pattern.factor(t);
            if f == 0.0 {
                continue;
            }
            for &(dof, value) in pattern.loads() {
                if let Some(Some(eq)) = self.dof_eq.get(dof.index()) {
                    p[*eq] += f * value;
                }
            }
        }
        p
    }

    /// Applied load at the trial time.
    pub fn external_load(&self) -> DVector<f64> {
        self.load_at(self.trial.time)
    }

    /// Load per unit load factor: `P(1) - P(0)`.
    pub fn reference_load(&self) -> DVector<f64> {
        self.load_at(1.0) - self.load_at(0.0)
    }

    /// Hold every pattern at its current value.
    pub fn set_load_const(&mut self) {
        let t = self.trial.time;
        for p in &mut self.patterns {
            p.freeze_at(t);
        }
        tracing::debug!(time = t, "loads held constant");
    }

    pub fn add_pattern(&mut self, pattern: LoadPattern) -> ModelResult<()> {
        for &(dof, _) in pattern.loads() {
            if dof.index() >= self.num_dofs() {
                return Err(ModelError::InvalidDof {
                    dof,
                    num_dofs: self.num_dofs(),
                });
            }
        }
        self.patterns.push(pattern);
        Ok(())
    }

    // ---- state determination and commit ----

    /// Bring every element to the trial response.
    pub fn update_domain(&mut self) -> ModelResult<()> {
        let timer = Timer::start();
        let view = TrialResponse {
            disp: &self.trial.disp,
            vel: &self.trial.vel,
            accel: &self.trial.accel,
            time: self.trial.time,
        };
        let result = self
            .elements
            .iter_mut()
            .enumerate()
            .try_for_each(|(index, e)| {
                e.update(&view).map_err(|err| ModelError::Element {
                    index,
                    name: e.name(),
                    what: err.to_string(),
                })
            });
        timer.stop_into(Phase::ElementState);
        result
    }

    pub fn commit_state(&mut self) -> ModelResult<()> {
        for e in &mut self.elements {
            e.commit_state()?;
        }
        self.committed = self.trial.clone();
        Ok(())
    }

    /// Discard the trial state of the current step.
    pub fn revert_to_last_step(&mut self) -> ModelResult<()> {
        for e in &mut self.elements {
            e.revert_to_last_commit()?;
        }
        self.trial = self.committed.clone();
        Ok(())
    }

    pub fn revert_to_start(&mut self) -> ModelResult<()> {
        for e in &mut self.elements {
            e.revert_to_start()?;
        }
        self.trial = ResponseState::zeros(self.num_dofs());
        self.committed = self.trial.clone();
        Ok(())
    }

    /// True when the trial response equals the last committed one.
    pub fn trial_is_committed(&self) -> bool {
        self.trial == self.committed
    }
}
