use super::config::ConstraintConfig;
use super::error::ConstraintError;
use super::kind::{ObservableGrid, ObservableKind, PairDistribution, StructureFactor};
use super::state::{
    AmputationState, CommittedData, OriginalData, Phase, StagedEvaluation, TransactionState,
};
use super::transaction::CoordinateGuard;
use crate::core::histogram::kernel::{HistogramKernel, PartialScope};
use crate::core::histogram::table::PairHistogram;
use crate::core::models::configuration::Configuration;
use crate::core::transform::correction::{ScaleFactorPolicy, WindowFunction, standard_error};
use crate::core::transform::data::{ExperimentalData, UsedData};
use crate::core::transform::grid::RadialGrid;
use crate::core::transform::observable::{
    ConstraintValue, PartialObservables, Population, reduced_pdf, weighted_g,
};
use crate::core::transform::shape::ShapeFunction;
use crate::core::weighting::properties::{
    BuiltinProperties, ElementPropertyProvider, resolve_element_weights,
};
use crate::core::weighting::scheme::WeightingScheme;
use nalgebra::Point3;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

pub type PairDistributionConstraint = ExperimentalConstraint<PairDistribution>;
pub type StructureFactorConstraint = ExperimentalConstraint<StructureFactor>;

/// Model observable evaluated for one histogram.
struct Evaluation {
    unsmoothed: Vec<f64>,
    total: Vec<f64>,
    standard_error: f64,
    scale_factor: f64,
}

/// How the scale factor is chosen during an evaluation.
#[derive(Debug, Clone, Copy)]
enum ScaleFit {
    /// Refit if the policy says a refit is due at this generated-move count.
    IfDue(u64),
    /// Reuse the given value.
    Fixed(f64),
}

/// Fits a pair-correlation observable of a configuration against experimental data.
///
/// The constraint keeps the accepted pair histogram and updates it incrementally:
/// a move is evaluated in two steps ([`compute_before_move`](Self::compute_before_move)
/// then [`compute_after_move`](Self::compute_after_move)) and the outer Monte Carlo
/// loop then calls [`accept_move`](Self::accept_move) or
/// [`reject_move`](Self::reject_move). Only the pairs involving moved atoms are
/// rebinned. The single-atom removal path works the same way through
/// [`compute_as_if_amputated`](Self::compute_as_if_amputated).
pub struct ExperimentalConstraint<K: ObservableKind> {
    data: ExperimentalData,
    config: ConstraintConfig,
    provider: Arc<dyn ElementPropertyProvider>,
    policy: ScaleFactorPolicy,
    window: Option<WindowFunction>,
    used: UsedData,
    grid: Option<ObservableGrid>,
    element_weights: Option<Vec<f64>>,
    shape: Option<Vec<f64>>,
    last_shape_update: Option<u64>,
    committed: Option<CommittedData>,
    original: Option<OriginalData>,
    state: TransactionState,
    _kind: PhantomData<K>,
}

impl<K: ObservableKind> ExperimentalConstraint<K> {
    pub fn new(data: ExperimentalData, config: ConstraintConfig) -> Result<Self, ConstraintError> {
        config.validate()?;
        let used = data.select(config.limits)?;
        let window = config
            .window_function
            .clone()
            .map(WindowFunction::new)
            .transpose()?;
        check_window(window.as_ref(), &used)?;
        Ok(Self {
            policy: config.adjust_scale_factor,
            provider: Arc::new(BuiltinProperties),
            data,
            config,
            window,
            used,
            grid: None,
            element_weights: None,
            shape: None,
            last_shape_update: None,
            committed: None,
            original: None,
            state: TransactionState::Idle,
            _kind: PhantomData,
        })
    }

    /// Replaces the built-in element property table.
    pub fn with_provider(mut self, provider: Arc<dyn ElementPropertyProvider>) -> Self {
        self.provider = provider;
        self.element_weights = None;
        self
    }

    /// Recomputes the histogram of the whole configuration and commits it.
    ///
    /// Any in-flight move or amputation is discarded. Returns the new standard error.
    #[instrument(skip_all, name = "compute_data", fields(kind = K::NAME, atoms = configuration.len()))]
    pub fn compute_data(&mut self, configuration: &Configuration) -> Result<f64, ConstraintError> {
        if self.state.phase() != Phase::Idle {
            warn!(
                state = %self.state.phase(),
                "Discarding in-flight state for a full recomputation"
            );
            self.state = TransactionState::Idle;
        }

        self.ensure_grid(configuration)?;
        let scheme = self.compute_scheme(configuration)?;
        let population = Population::new(configuration.populations().to_vec(), configuration.volume())?;
        let histogram = self.kernel(configuration)?.full(&configuration.source())?;
        if self.shape.is_none() {
            self.refresh_shape(configuration, &scheme)?;
        }

        let previous = self.scale_factor();
        let evaluation = self.evaluate(
            &histogram,
            &scheme,
            &population,
            ScaleFit::IfDue(configuration.counters.generated),
            previous,
        )?;

        if self.original.is_none() {
            self.original = Some(OriginalData {
                histogram: histogram.clone(),
                scheme: scheme.clone(),
                population: population.clone(),
                scale_factor: evaluation.scale_factor,
            });
        }
        info!(
            standard_error = evaluation.standard_error,
            scale_factor = evaluation.scale_factor,
            "Computed {} data from scratch.",
            K::NAME
        );
        let standard_error = evaluation.standard_error;
        self.committed = Some(CommittedData {
            histogram,
            scheme,
            population,
            standard_error,
            scale_factor: evaluation.scale_factor,
            atom_count: configuration.len(),
        });
        Ok(standard_error)
    }

    /// Stages the pairs the atoms of `subset` currently contribute.
    pub fn compute_before_move(
        &mut self,
        configuration: &Configuration,
        subset: &[usize],
    ) -> Result<(), ConstraintError> {
        self.require_idle("compute a before-move delta")?;
        self.check_configuration(configuration)?;
        configuration.validate_subset(subset)?;
        let before = self.move_delta(configuration, subset)?;
        trace!(subset = ?subset, pairs = before.total(), "Staged before-move delta");
        self.state = TransactionState::BeforeComputed {
            subset: subset.to_vec(),
            before,
        };
        Ok(())
    }

    /// Evaluates the configuration with `candidates` in place of the subset's
    /// coordinates and returns the resulting standard error.
    ///
    /// The candidates are only written for the duration of the call; the
    /// configuration holds its original coordinates again when this returns.
    pub fn compute_after_move(
        &mut self,
        configuration: &mut Configuration,
        subset: &[usize],
        candidates: &[Point3<f64>],
    ) -> Result<f64, ConstraintError> {
        let (staged_subset, before) = match std::mem::take(&mut self.state) {
            TransactionState::BeforeComputed { subset: staged, before } if staged == subset => {
                (staged, before)
            }
            TransactionState::BeforeComputed { subset: staged, before } => {
                self.state = TransactionState::BeforeComputed {
                    subset: staged,
                    before,
                };
                return Err(ConstraintError::Transaction {
                    operation: "compute an after-move delta for a different subset",
                    state: Phase::BeforeComputed.describe(),
                });
            }
            other => {
                let phase = other.phase();
                self.state = other;
                return Err(ConstraintError::Transaction {
                    operation: "compute an after-move delta",
                    state: phase.describe(),
                });
            }
        };

        match self.stage_move(configuration, &staged_subset, &before, candidates) {
            Ok((after, staged)) => {
                let standard_error = staged.standard_error;
                trace!(
                    subset = ?staged_subset,
                    standard_error,
                    "Staged after-move evaluation"
                );
                self.state = TransactionState::AfterComputed {
                    subset: staged_subset,
                    before,
                    after,
                    staged,
                };
                Ok(standard_error)
            }
            Err(e) => {
                self.state = TransactionState::BeforeComputed {
                    subset: staged_subset,
                    before,
                };
                Err(e)
            }
        }
    }

    fn stage_move(
        &self,
        configuration: &mut Configuration,
        subset: &[usize],
        before: &PairHistogram,
        candidates: &[Point3<f64>],
    ) -> Result<(PairHistogram, StagedEvaluation), ConstraintError> {
        self.check_configuration(configuration)?;
        let committed = self.committed()?;
        let after = {
            let guard = CoordinateGuard::new(configuration, subset, candidates)?;
            self.move_delta(&guard, subset)?
        };

        let mut histogram = &committed.histogram - before;
        histogram += &after;
        let evaluation = self.evaluate(
            &histogram,
            &committed.scheme,
            &committed.population,
            ScaleFit::IfDue(configuration.counters.generated),
            committed.scale_factor,
        )?;
        Ok((
            after,
            StagedEvaluation {
                histogram,
                standard_error: evaluation.standard_error,
                scale_factor: evaluation.scale_factor,
            },
        ))
    }

    /// Commits the evaluated move.
    pub fn accept_move(&mut self) -> Result<(), ConstraintError> {
        match std::mem::take(&mut self.state) {
            TransactionState::AfterComputed { staged, .. } => {
                let committed = self.committed_mut()?;
                committed.histogram = staged.histogram;
                committed.standard_error = staged.standard_error;
                committed.scale_factor = staged.scale_factor;
                Ok(())
            }
            other => {
                let phase = other.phase();
                self.state = other;
                Err(ConstraintError::Transaction {
                    operation: "accept a move",
                    state: phase.describe(),
                })
            }
        }
    }

    /// Drops the staged move, leaving the committed data untouched.
    pub fn reject_move(&mut self) -> Result<(), ConstraintError> {
        match self.state.phase() {
            Phase::BeforeComputed | Phase::AfterComputed => {
                self.state = TransactionState::Idle;
                Ok(())
            }
            phase => Err(ConstraintError::Transaction {
                operation: "reject a move",
                state: phase.describe(),
            }),
        }
    }

    /// Evaluates the configuration as if `atom` were removed and returns the
    /// resulting standard error. Nothing committed changes until
    /// [`accept_amputation`](Self::accept_amputation).
    pub fn compute_as_if_amputated(
        &mut self,
        configuration: &Configuration,
        atom: usize,
        allow_scale_factor_fit: bool,
    ) -> Result<f64, ConstraintError> {
        self.require_idle("evaluate an amputation")?;
        self.check_configuration(configuration)?;
        configuration.validate_subset(&[atom])?;
        let committed = self.committed()?;

        let before = self.move_delta(configuration, &[atom])?;
        let histogram = &committed.histogram - &before;
        let element = configuration.element_index()[atom].index();
        let population = committed.population.without_one(element)?;
        let weights = self.element_weights(configuration)?;
        let scheme = WeightingScheme::compute(&population.counts, &weights)?;

        let fit = if allow_scale_factor_fit {
            ScaleFit::IfDue(configuration.counters.generated)
        } else {
            ScaleFit::Fixed(committed.scale_factor)
        };
        let evaluation = self.evaluate(&histogram, &scheme, &population, fit, committed.scale_factor)?;
        let standard_error = evaluation.standard_error;
        trace!(atom, standard_error, "Staged amputation");

        self.state = TransactionState::Amputation(AmputationState {
            atom,
            scheme,
            population,
            staged: StagedEvaluation {
                histogram,
                standard_error,
                scale_factor: evaluation.scale_factor,
            },
        });
        Ok(standard_error)
    }

    /// Commits the staged amputation. The caller must then remove the atom from
    /// its configuration with [`Configuration::remove_atom`].
    pub fn accept_amputation(&mut self) -> Result<(), ConstraintError> {
        match std::mem::take(&mut self.state) {
            TransactionState::Amputation(amputation) => {
                let committed = self.committed_mut()?;
                committed.histogram = amputation.staged.histogram;
                committed.scheme = amputation.scheme;
                committed.population = amputation.population;
                committed.standard_error = amputation.staged.standard_error;
                committed.scale_factor = amputation.staged.scale_factor;
                committed.atom_count -= 1;
                debug!(atom = amputation.atom, "Accepted amputation");
                Ok(())
            }
            other => {
                let phase = other.phase();
                self.state = other;
                Err(ConstraintError::Transaction {
                    operation: "accept an amputation",
                    state: phase.describe(),
                })
            }
        }
    }

    pub fn reject_amputation(&mut self) -> Result<(), ConstraintError> {
        match self.state.phase() {
            Phase::Amputation => {
                self.state = TransactionState::Idle;
                Ok(())
            }
            phase => Err(ConstraintError::Transaction {
                operation: "reject an amputation",
                state: phase.describe(),
            }),
        }
    }

    /// Refreshes a geometry-derived shape function when it is due.
    ///
    /// Returns whether the shape function was recomputed.
    pub fn on_step(&mut self, configuration: &Configuration) -> Result<bool, ConstraintError> {
        self.require_idle("run step maintenance")?;
        let Some(ShapeFunction::Parameters(params)) = &self.config.shape_function else {
            return Ok(false);
        };
        let accepted = configuration.counters.accepted;
        if params.update_frequency == 0
            || self.last_shape_update == Some(accepted)
            || accepted % params.update_frequency != 0
        {
            return Ok(false);
        }

        self.check_configuration(configuration)?;
        let committed = self.committed()?;
        let scheme = committed.scheme.clone();
        self.refresh_shape(configuration, &scheme)?;

        let committed = self.committed()?;
        let evaluation = self.evaluate(
            &committed.histogram,
            &committed.scheme,
            &committed.population,
            ScaleFit::Fixed(committed.scale_factor),
            committed.scale_factor,
        )?;
        let committed = self.committed_mut()?;
        let old = committed.standard_error;
        committed.standard_error = evaluation.standard_error;
        info!(
            old_standard_error = old,
            new_standard_error = evaluation.standard_error,
            accepted,
            "Updated {} shape function.",
            K::NAME
        );
        Ok(true)
    }

    /// Full recomputation after element, population or molecule changes.
    pub fn on_topology_changed(&mut self, configuration: &Configuration) -> Result<f64, ConstraintError> {
        self.element_weights = None;
        if matches!(self.config.shape_function, Some(ShapeFunction::Parameters(_))) {
            self.shape = None;
        }
        self.compute_data(configuration)
    }

    /// Full recomputation after the boundary (and thus the volume) changed.
    ///
    /// Grids derived from the box are rebuilt, which resets the committed data.
    pub fn on_boundary_changed(&mut self, configuration: &Configuration) -> Result<f64, ConstraintError> {
        if K::follows_boundary(&self.config.real_space) {
            self.grid = None;
            self.committed = None;
            self.original = None;
            self.shape = None;
        } else if matches!(self.config.shape_function, Some(ShapeFunction::Parameters(_))) {
            self.shape = None;
        }
        self.compute_data(configuration)
    }

    /// Changes the compared data range. Committed data is dropped and must be
    /// recomputed with [`compute_data`](Self::compute_data).
    pub fn set_limits(&mut self, limits: Option<(f64, f64)>) -> Result<(), ConstraintError> {
        let used = self.data.select(limits)?;
        check_window(self.window.as_ref(), &used)?;
        self.used = used;
        self.config.limits = limits;
        self.reset();
        Ok(())
    }

    /// Forgets every computed quantity.
    pub fn reset(&mut self) {
        if self.state.phase() != Phase::Idle {
            warn!(state = %self.state.phase(), "Discarding in-flight state on reset");
        }
        self.state = TransactionState::Idle;
        self.grid = None;
        self.shape = None;
        self.last_shape_update = None;
        self.committed = None;
        self.original = None;
    }

    pub fn standard_error(&self) -> Option<f64> {
        self.committed.as_ref().map(|c| c.standard_error)
    }

    pub fn after_move_standard_error(&self) -> Option<f64> {
        match &self.state {
            TransactionState::AfterComputed { staged, .. } => Some(staged.standard_error),
            _ => None,
        }
    }

    pub fn amputation_standard_error(&self) -> Option<f64> {
        match &self.state {
            TransactionState::Amputation(a) => Some(a.staged.standard_error),
            _ => None,
        }
    }

    /// Accepted scale factor, or the configured one before the first computation.
    pub fn scale_factor(&self) -> f64 {
        self.committed
            .as_ref()
            .map_or(self.config.scale_factor, |c| c.scale_factor)
    }

    /// Observable of the committed data with its per-pair breakdown.
    pub fn observable(&self) -> Result<ConstraintValue, ConstraintError> {
        let committed = self.committed()?;
        self.constraint_value(
            &committed.histogram,
            &committed.scheme,
            &committed.population,
            committed.scale_factor,
        )
    }

    /// Observable of the first full computation.
    pub fn original_observable(&self) -> Result<ConstraintValue, ConstraintError> {
        let original = self.original.as_ref().ok_or(ConstraintError::Transaction {
            operation: "evaluate the original observable",
            state: "not computed",
        })?;
        self.constraint_value(
            &original.histogram,
            &original.scheme,
            &original.population,
            original.scale_factor,
        )
    }

    pub fn histogram(&self) -> Option<&PairHistogram> {
        self.committed.as_ref().map(|c| &c.histogram)
    }

    pub fn original_histogram(&self) -> Option<&PairHistogram> {
        self.original.as_ref().map(|o| &o.histogram)
    }

    pub fn weighting_scheme(&self) -> Option<&WeightingScheme> {
        self.committed.as_ref().map(|c| &c.scheme)
    }

    pub fn shape_array(&self) -> Option<&[f64]> {
        self.shape.as_deref()
    }

    pub fn radial_grid(&self) -> Option<&RadialGrid> {
        self.grid.as_ref().map(ObservableGrid::radial)
    }

    pub fn experimental_values(&self) -> &UsedData {
        &self.used
    }

    pub fn state(&self) -> Phase {
        self.state.phase()
    }

    pub fn config(&self) -> &ConstraintConfig {
        &self.config
    }

    fn committed(&self) -> Result<&CommittedData, ConstraintError> {
        self.committed.as_ref().ok_or(ConstraintError::Transaction {
            operation: "use committed data",
            state: "not computed",
        })
    }

    fn committed_mut(&mut self) -> Result<&mut CommittedData, ConstraintError> {
        self.committed.as_mut().ok_or(ConstraintError::Transaction {
            operation: "update committed data",
            state: "not computed",
        })
    }

    fn grid(&self) -> Result<&ObservableGrid, ConstraintError> {
        self.grid.as_ref().ok_or(ConstraintError::Transaction {
            operation: "evaluate the observable",
            state: "not computed",
        })
    }

    fn require_idle(&self, operation: &'static str) -> Result<(), ConstraintError> {
        match self.state.phase() {
            Phase::Idle => Ok(()),
            phase => Err(ConstraintError::Transaction {
                operation,
                state: phase.describe(),
            }),
        }
    }

    /// The configuration must still describe the committed atoms; element or population
    /// changes go through [`on_topology_changed`](Self::on_topology_changed).
    fn check_configuration(&self, configuration: &Configuration) -> Result<(), ConstraintError> {
        let committed = self.committed()?;
        if committed.atom_count != configuration.len() {
            return Err(ConstraintError::Configuration(format!(
                "configuration holds {} atoms but the committed data describes {}",
                configuration.len(),
                committed.atom_count
            )));
        }
        if committed.histogram.num_elements() != configuration.num_elements() {
            return Err(ConstraintError::Configuration(format!(
                "configuration defines {} elements but the committed data describes {}",
                configuration.num_elements(),
                committed.histogram.num_elements()
            )));
        }
        if committed.population.counts != configuration.populations() {
            return Err(ConstraintError::Configuration(format!(
                "element populations {:?} differ from the committed {:?}",
                configuration.populations(),
                committed.population.counts
            )));
        }
        Ok(())
    }

    fn ensure_grid(&mut self, configuration: &Configuration) -> Result<(), ConstraintError> {
        if self.grid.is_none() {
            self.grid = Some(K::build_grid(
                &self.used,
                &self.config.real_space,
                configuration.boundary(),
            )?);
        }
        Ok(())
    }

    fn kernel<'c>(&self, configuration: &'c Configuration) -> Result<HistogramKernel<'c>, ConstraintError> {
        Ok(HistogramKernel::new(
            configuration.boundary(),
            self.grid()?.radial().bins(),
            configuration.workers(),
        ))
    }

    fn element_weights(&self, configuration: &Configuration) -> Result<Vec<f64>, ConstraintError> {
        match &self.element_weights {
            Some(weights) if weights.len() == configuration.num_elements() => Ok(weights.clone()),
            _ => Ok(resolve_element_weights(
                configuration.elements(),
                self.config.weighting,
                &self.config.atoms_weight,
                self.provider.as_ref(),
            )?),
        }
    }

    fn compute_scheme(&mut self, configuration: &Configuration) -> Result<WeightingScheme, ConstraintError> {
        let weights = self.element_weights(configuration)?;
        let scheme = WeightingScheme::compute(configuration.populations(), &weights)?;
        self.element_weights = Some(weights);
        Ok(scheme)
    }

    /// Pairs anchored on `subset`, each counted once.
    fn move_delta(
        &self,
        configuration: &Configuration,
        subset: &[usize],
    ) -> Result<PairHistogram, ConstraintError> {
        let kernel = self.kernel(configuration)?;
        let anchored = kernel.partial(&configuration.source(), subset, PartialScope::AllAtoms)?;
        let gathered = configuration.gather(subset)?;
        let internal = kernel.full(&gathered.source())?;
        Ok(&anchored - &internal)
    }

    fn refresh_shape(
        &mut self,
        configuration: &Configuration,
        scheme: &WeightingScheme,
    ) -> Result<(), ConstraintError> {
        let grid = self.grid()?.radial();
        let shape = match &self.config.shape_function {
            None => None,
            Some(ShapeFunction::Constant(values)) => {
                Some(K::constant_shape(values, self.data.len(), &self.used, grid)?)
            }
            Some(ShapeFunction::Parameters(params)) => {
                let shape = params.compute(configuration, scheme, grid.centers())?;
                self.last_shape_update = Some(configuration.counters.accepted);
                Some(shape)
            }
        };
        self.shape = shape;
        Ok(())
    }

    fn reduced_model(
        &self,
        histogram: &PairHistogram,
        scheme: &WeightingScheme,
        population: &Population,
    ) -> Result<Vec<f64>, ConstraintError> {
        let grid = self.grid()?;
        let g = weighted_g(histogram, scheme, population, grid.radial());
        let mut reduced = reduced_pdf(&g, grid.radial().centers(), population.number_density());
        if let Some(shape) = &self.shape {
            reduced.iter_mut().zip(shape).for_each(|(v, s)| *v -= s);
        }
        Ok(grid.model(&reduced))
    }

    fn evaluate(
        &self,
        histogram: &PairHistogram,
        scheme: &WeightingScheme,
        population: &Population,
        fit: ScaleFit,
        current: f64,
    ) -> Result<Evaluation, ConstraintError> {
        let model = self.reduced_model(histogram, scheme, population)?;
        if model.len() != self.used.len() {
            return Err(ConstraintError::Configuration(format!(
                "model has {} values for {} data points",
                model.len(),
                self.used.len()
            )));
        }
        let scale_factor = match fit {
            ScaleFit::IfDue(step) if self.policy.is_due(step) => {
                self.policy.fit(&self.used.y, &model, &self.used.weights)?
            }
            ScaleFit::IfDue(_) => current,
            ScaleFit::Fixed(value) => value,
        };
        let unsmoothed: Vec<f64> = model.iter().map(|v| v * scale_factor).collect();
        let total = match &self.window {
            Some(window) => window.convolve_same(&unsmoothed),
            None => unsmoothed.clone(),
        };
        let standard_error = standard_error(&self.used.y, &total, &self.used.weights);
        if !standard_error.is_finite() {
            return Err(ConstraintError::NumericDegeneracy(format!(
                "standard error evaluated to {standard_error}"
            )));
        }
        Ok(Evaluation {
            unsmoothed,
            total,
            standard_error,
            scale_factor,
        })
    }

    fn constraint_value(
        &self,
        histogram: &PairHistogram,
        scheme: &WeightingScheme,
        population: &Population,
        scale_factor: f64,
    ) -> Result<ConstraintValue, ConstraintError> {
        let evaluation = self.evaluate(
            histogram,
            scheme,
            population,
            ScaleFit::Fixed(scale_factor),
            scale_factor,
        )?;
        let grid = self.grid()?;
        let partials = PartialObservables::from_histogram(histogram, scheme, population, grid.radial())
            .map_values(|values| grid.partial(values));
        Ok(ConstraintValue {
            total: evaluation.total,
            unsmoothed: evaluation.unsmoothed,
            partials,
        })
    }
}

fn check_window(window: Option<&WindowFunction>, used: &UsedData) -> Result<(), ConstraintError> {
    if let Some(window) = window {
        if window.len() > used.len() {
            return Err(ConstraintError::Configuration(format!(
                "window function of {} values is longer than the {} compared data points",
                window.len(),
                used.len()
            )));
        }
    }
    Ok(())
}
