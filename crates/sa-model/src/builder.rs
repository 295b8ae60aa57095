//! Incremental model builder.

use crate::damping::RayleighDamping;
use crate::element::Element;
use crate::error::{ModelError, ModelResult};
use crate::load::LoadPattern;
use crate::model::AnalysisModel;
use crate::numbering::Numberer;
use sa_core::{DofId, EleId, PatternId};

/// Builder for an [`AnalysisModel`].
///
/// DOFs are created with `add_dof`, elements and load patterns refer to
/// them by id. `build()` validates every reference and numbers the
/// equations.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    fixed: Vec<bool>,
    elements: Vec<Box<dyn Element>>,
    patterns: Vec<LoadPattern>,
    rayleigh: Option<RayleighDamping>,
    numberer: Numberer,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dof(&mut self) -> DofId {
        let id = DofId::from_index(self.fixed.len());
        self.fixed.push(false);
        id
    }

    pub fn add_dofs(&mut self, n: usize) -> Vec<DofId> {
        (0..n).map(|_| self.add_dof()).collect()
    }

    /// Constrain a DOF to zero response.
    pub fn fix(&mut self, dof: DofId) -> ModelResult<()> {
        let num_dofs = self.fixed.len();
        let slot = self
            .fixed
            .get_mut(dof.index())
            .ok_or(ModelError::InvalidDof { dof, num_dofs })?;
        *slot = true;
        Ok(())
    }

    pub fn add_element(&mut self, element: impl Element + 'static) -> EleId {
        self.add_boxed_element(Box::new(element))
    }

    pub fn add_boxed_element(&mut self, element: Box<dyn Element>) -> EleId {
        let id = EleId::from_index(self.elements.len());
        self.elements.push(element);
        id
    }

    pub fn add_pattern(&mut self, pattern: LoadPattern) -> PatternId {
        let id = PatternId::from_index(self.patterns.len());
        self.patterns.push(pattern);
        id
    }

    pub fn rayleigh(&mut self, damping: RayleighDamping) -> &mut Self {
        self.rayleigh = Some(damping);
        self
    }

    pub fn numberer(&mut self, numberer: Numberer) -> &mut Self {
        self.numberer = numberer;
        self
    }

    /// Validate references and return a numbered model.
    pub fn build(self) -> ModelResult<AnalysisModel> {
        let num_dofs = self.fixed.len();
        let check = |dof: DofId| {
            if dof.index() < num_dofs {
                Ok(())
            } else {
                Err(ModelError::InvalidDof { dof, num_dofs })
            }
        };
        for (index, e) in self.elements.iter().enumerate() {
            if e.dofs().is_empty() {
                return Err(ModelError::Element {
                    index,
                    name: e.name(),
                    what: "element has no DOFs".into(),
                });
            }
            e.dofs().iter().try_for_each(|&d| check(d))?;
        }
        for p in &self.patterns {
            p.loads().iter().try_for_each(|&(d, _)| check(d))?;
        }

        let mut model = AnalysisModel::new(
            self.fixed,
            self.elements,
            Vec::new(),
            None,
            self.numberer,
        );
        for p in self.patterns {
            model.add_pattern(p)?;
        }
        model.set_rayleigh(self.rayleigh);
        let num_eqn = model.number_equations();
        tracing::debug!(
            num_dofs,
            num_eqn,
            num_elements = model.num_elements(),
            "model built"
        );
        Ok(model)
    }
}
