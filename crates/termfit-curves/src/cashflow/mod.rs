//! Multi-instrument cashflow calibration for forward-price curves.
//!
//! Every tenor decomposes into discounted fixings, each a linear function
//! of the curve values at its neighbouring nodes. The curve nodes are the
//! distinct curve dates of the active tenors, so the whole tenor set forms
//! one linear system `A x = b`:
//!
//! - [`CashflowFitMethod::Bootstrap`] solves it node by node, each node
//!   seeing only the nodes before it (a lower-triangular solve).
//! - [`CashflowFitMethod::Smoothed`] solves all nodes at once, adding
//!   slope and curvature penalties weighted by user-supplied penalty
//!   curves.
//!
//! A spot tenor seeds the curve: its node is pinned at the spot quote.
//! When a projection curve is configured the calibrated values are an
//! additive basis on top of it.

use nalgebra::{DMatrix, DVector};
use termfit_core::types::Date;
use termfit_math::least_squares::{
    first_difference_penalty, penalized_least_squares_with_fixed, second_difference_penalty,
};
use termfit_math::MathError;
use tracing::{debug, info, warn};

use crate::bootstrap::model_time;
use crate::calibrator::{
    model_price, scoped_curve, validate_settlement, Calibrator, CloneScope, FitReport, FitState,
    FitStatus, InstrumentError, Pricer,
};
use crate::config::{CalibrationConfig, CashflowFitMethod};
use crate::curve::{Curve, ExtrapolationMethod, InterpolationMethod, SharedCurve};
use crate::error::{CurveError, CurveResult, ValidationIssue};
use crate::products::{ForwardPricer, ForwardProduct};
use crate::tenor::{CurveTenor, Instrument};

/// Calibrates a forward-price curve to spot, forward, future and average
/// swap quotes.
#[derive(Debug, Clone)]
pub struct CashflowCalibrator {
    as_of: Date,
    settlement: Date,
    config: CalibrationConfig,
    discount: Option<SharedCurve>,
    projections: Vec<SharedCurve>,
    projection_index: Option<String>,
    slope_penalty: Option<Curve>,
    curvature_penalty: Option<Curve>,
}

impl CashflowCalibrator {
    /// Creates a calibrator with no discounting and no projection curve.
    #[must_use]
    pub fn new(as_of: Date) -> Self {
        Self {
            as_of,
            settlement: as_of,
            config: CalibrationConfig::default(),
            discount: None,
            projections: Vec::new(),
            projection_index: None,
            slope_penalty: None,
            curvature_penalty: None,
        }
    }

    /// Sets the settlement date.
    #[must_use]
    pub fn with_settlement(mut self, settlement: Date) -> Self {
        self.settlement = settlement;
        self
    }

    /// Sets the calibration settings.
    #[must_use]
    pub fn with_config(mut self, config: CalibrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Discounts settled contracts on `discount`.
    #[must_use]
    pub fn with_discount(mut self, discount: SharedCurve) -> Self {
        self.discount = Some(discount);
        self
    }

    /// Adds a candidate projection curve.
    #[must_use]
    pub fn with_projection(mut self, projection: SharedCurve) -> Self {
        self.projections.push(projection);
        self
    }

    /// Selects the projection curve by name.
    #[must_use]
    pub fn with_projection_index(mut self, index: impl Into<String>) -> Self {
        self.projection_index = Some(index.into());
        self
    }

    /// Sets the slope and curvature penalty curves used by the smoothed
    /// method. Each is read at the node a penalty term ends on.
    #[must_use]
    pub fn with_smoothing(mut self, slope: Curve, curvature: Curve) -> Self {
        self.slope_penalty = Some(slope);
        self.curvature_penalty = Some(curvature);
        self
    }

    /// Resolves the projection curve.
    ///
    /// No candidates means no projection. A single candidate is used when no
    /// index is requested. Otherwise the requested index must match exactly
    /// one candidate's name.
    pub fn resolve_projection(&self) -> CurveResult<Option<&SharedCurve>> {
        match (self.projections.len(), &self.projection_index) {
            (0, _) => Ok(None),
            (1, None) => Ok(self.projections.first()),
            (available, requested) => {
                let found: Vec<&SharedCurve> = match requested {
                    Some(index) => self
                        .projections
                        .iter()
                        .filter(|c| c.read().name() == index)
                        .collect(),
                    None => Vec::new(),
                };
                match found.as_slice() {
                    [single] => Ok(Some(*single)),
                    _ => Err(CurveError::AmbiguousProjection {
                        requested: requested
                            .clone()
                            .unwrap_or_else(|| "<unspecified>".to_string()),
                        matches: found.len(),
                        available,
                    }),
                }
            }
        }
    }
}

/// Weights of the nodes a linearly interpolated, flat-extrapolated value at
/// `date` depends on.
fn node_weights(nodes: &[Date], date: Date) -> Vec<(usize, f64)> {
    let n = nodes.len();
    let index = nodes.partition_point(|d| *d < date);
    if index < n && nodes[index] == date {
        return vec![(index, 1.0)];
    }
    if index == 0 {
        return vec![(0, 1.0)];
    }
    if index == n {
        return vec![(n - 1, 1.0)];
    }
    let (d0, d1) = (nodes[index - 1], nodes[index]);
    let w = d0.days_between(&date) as f64 / d0.days_between(&d1) as f64;
    vec![(index - 1, 1.0 - w), (index, w)]
}

/// One tenor's linear equation before node weights are applied.
struct Equation {
    node: usize,
    spot: bool,
    weight: f64,
    fixings: Vec<(Date, f64)>,
    rhs: f64,
}

impl Equation {
    fn row(&self, nodes: &[Date]) -> Vec<(usize, f64)> {
        let mut row = Vec::new();
        for (date, coefficient) in &self.fixings {
            for (k, w) in node_weights(nodes, *date) {
                row.push((k, coefficient * w));
            }
        }
        row
    }
}

enum Solution {
    Solved { values: Vec<f64>, objective: Option<f64> },
    Singular(String),
}

impl CashflowCalibrator {
    fn equations(
        &self,
        tenors: &[CurveTenor<ForwardProduct>],
        active: &[usize],
        nodes: &[Date],
        projection: Option<&SharedCurve>,
    ) -> CurveResult<Vec<Equation>> {
        let discount = self.discount.as_ref().map(|d| d.read());
        let projection = projection.map(|p| p.read());

        let mut equations = Vec::with_capacity(active.len());
        for &i in active {
            let tenor = &tenors[i];
            let (product, quote) = tenor.target()?;
            let schedule = product.decompose(discount.as_deref())?;
            let mut rhs = schedule.discounted(quote);
            let mut fixings = Vec::new();
            for (date, coefficient) in schedule.coefficients() {
                if let Some(projection) = &projection {
                    rhs -= coefficient * projection.interpolate(date)?;
                }
                fixings.push((date, coefficient));
            }
            let node = nodes.partition_point(|d| *d < tenor.curve_date);
            equations.push(Equation {
                node,
                spot: product.is_spot(),
                weight: tenor.weight,
                fixings,
                rhs,
            });
        }
        Ok(equations)
    }

    fn solve_bootstrap(&self, nodes: &[Date], equations: &[Equation]) -> Solution {
        let mut values = vec![0.0; nodes.len()];
        for k in 0..nodes.len() {
            let at_node: Vec<&Equation> = equations.iter().filter(|e| e.node == k).collect();
            let seeds: Vec<&Equation> = at_node.iter().copied().filter(|e| e.spot).collect();
            let used = if seeds.is_empty() { at_node } else { seeds };

            let (mut numerator, mut denominator) = (0.0, 0.0);
            for equation in used {
                let mut known = 0.0;
                let mut own = 0.0;
                for (j, c) in equation.row(&nodes[..=k]) {
                    if j == k {
                        own += c;
                    } else {
                        known += c * values[j];
                    }
                }
                numerator += equation.weight * own * (equation.rhs - known);
                denominator += equation.weight * own * own;
            }
            if denominator <= f64::EPSILON {
                return Solution::Singular(format!("node {} is not determined by any tenor", nodes[k]));
            }
            values[k] = numerator / denominator;
        }
        Solution::Solved {
            values,
            objective: None,
        }
    }

    fn solve_smoothed(&self, nodes: &[Date], equations: &[Equation]) -> CurveResult<Solution> {
        let (m, n) = (equations.len(), nodes.len());
        let mut design = DMatrix::<f64>::zeros(m, n);
        let mut target = DVector::<f64>::zeros(m);
        let mut weights = Vec::with_capacity(m);
        let mut fixed = vec![None; n];
        for (r, equation) in equations.iter().enumerate() {
            for (k, c) in equation.row(nodes) {
                design[(r, k)] += c;
            }
            target[r] = equation.rhs;
            weights.push(equation.weight);
            let own = design[(r, equation.node)];
            if equation.spot && own.abs() > f64::EPSILON {
                fixed[equation.node] = Some(equation.rhs / own);
            }
        }

        let spacing: Vec<f64> = nodes.windows(2).map(|w| model_time(w[0], w[1])).collect();
        let slope_weights = (1..n)
            .map(|k| Ok(penalty_at(&self.slope_penalty, nodes[k])? / spacing[k - 1].powi(2)))
            .collect::<CurveResult<Vec<f64>>>()?;
        let curvature_weights = (1..n.saturating_sub(1))
            .map(|k| {
                let h = 0.5 * (spacing[k - 1] + spacing[k]);
                Ok(penalty_at(&self.curvature_penalty, nodes[k])? / h.powi(4))
            })
            .collect::<CurveResult<Vec<f64>>>()?;
        let penalty = first_difference_penalty(n, &slope_weights)?
            + second_difference_penalty(n, &curvature_weights)?;

        let x = match penalized_least_squares_with_fixed(&design, &target, &weights, &penalty, &fixed)
        {
            Ok(x) => x,
            Err(MathError::SingularMatrix) => {
                return Ok(Solution::Singular("smoothed normal equations are singular".into()))
            }
            Err(err) => return Err(err.into()),
        };

        let residual = &design * &x - &target;
        let misfit: f64 = residual
            .iter()
            .zip(&weights)
            .map(|(r, w)| w * r * r)
            .sum();
        let roughness = (x.transpose() * &penalty * &x)[(0, 0)];
        Ok(Solution::Solved {
            values: x.iter().copied().collect(),
            objective: Some(misfit + roughness),
        })
    }
}

fn penalty_at(curve: &Option<Curve>, date: Date) -> CurveResult<f64> {
    match curve {
        Some(curve) if !curve.is_empty() => curve.interpolate(date),
        _ => Ok(0.0),
    }
}

impl Calibrator for CashflowCalibrator {
    type Product = ForwardProduct;

    fn as_of(&self) -> Date {
        self.as_of
    }

    fn settlement(&self) -> Date {
        self.settlement
    }

    fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    fn empty_curve(&self) -> Curve {
        Curve::new(InterpolationMethod::Linear, ExtrapolationMethod::Flat)
    }

    fn pricer<'a>(
        &'a self,
        curve: &'a Curve,
        product: &'a ForwardProduct,
    ) -> CurveResult<Box<dyn Pricer + 'a>> {
        let projection = self.resolve_projection()?;
        Ok(Box::new(ForwardPricer::new(curve, projection, product)))
    }

    fn validate(&self, tenors: &[CurveTenor<ForwardProduct>], issues: &mut Vec<ValidationIssue>) {
        if let Err(err) = self.resolve_projection() {
            issues.push(ValidationIssue::new("projection", err.to_string()));
        }
        let spots = tenors
            .iter()
            .filter(|t| t.is_active() && t.product.is_spot())
            .count();
        if spots > 1 {
            issues.push(ValidationIssue::new(
                "spot",
                format!("{spots} active spot tenors, at most one may seed the curve"),
            ));
        }
        validate_settlement(self.as_of, self.settlement, issues);
        for tenor in tenors.iter().filter(|t| t.is_active()) {
            let maturity = tenor.product.maturity();
            if !tenor.product.is_spot() && maturity < self.settlement {
                issues.push(ValidationIssue::new(
                    &tenor.name,
                    format!("contract fixes by {maturity}, before settlement {}", self.settlement),
                ));
            }
            // Every fixing must lie on or before the node the tenor is solved on.
            if tenor.curve_date < maturity {
                issues.push(ValidationIssue::new(
                    &tenor.name,
                    format!("curve date {} is before the last fixing {maturity}", tenor.curve_date),
                ));
            }
        }
    }

    fn fit_from(
        &mut self,
        state: FitState<'_, ForwardProduct>,
        _from: usize,
    ) -> CurveResult<FitReport> {
        let FitState {
            name,
            currency,
            curve,
            tenors,
            ..
        } = state;
        let projection = self.resolve_projection()?;

        let active: Vec<usize> = (0..tenors.len()).filter(|&i| tenors[i].is_active()).collect();
        if active.is_empty() {
            debug!(curve = %name, "no active tenors, curve left unchanged");
            return Ok(FitReport::new(FitStatus::Skipped));
        }

        let mut nodes: Vec<Date> = active.iter().map(|&i| tenors[i].curve_date).collect();
        nodes.sort();
        nodes.dedup();

        let method = self.config.cashflow_method;
        info!(
            curve = %name,
            tenors = active.len(),
            nodes = nodes.len(),
            method = ?method,
            projected = projection.is_some(),
            "cashflow fit started"
        );

        let equations = self.equations(tenors, &active, &nodes, projection)?;
        let solution = match method {
            CashflowFitMethod::Bootstrap => self.solve_bootstrap(&nodes, &equations),
            CashflowFitMethod::Smoothed => self.solve_smoothed(&nodes, &equations)?,
        };
        let (values, objective) = match solution {
            Solution::Solved { values, objective } => (values, objective),
            Solution::Singular(reason) => {
                warn!(curve = %name, %reason, "cashflow fit failed");
                return Ok(FitReport::new(FitStatus::Failed));
            }
        };

        curve.clear();
        for (date, value) in nodes.iter().zip(&values) {
            curve.add(*date, *value)?;
        }
        curve.set_identity(name, currency);

        let mut report = FitReport::new(FitStatus::Converged);
        report.objective = objective;
        for tenor in tenors.iter_mut() {
            tenor.model_price = None;
        }
        for &i in &active {
            let (product, quote) = tenors[i].target()?;
            let price = model_price(&*self, curve, &product)?;
            tenors[i].model_price = Some(price);
            report.instrument_errors.push(InstrumentError {
                tenor: tenors[i].name.clone(),
                market_price: quote,
                model_price: price,
            });
        }

        info!(
            curve = %name,
            max_error = report.max_abs_error(),
            "cashflow fit finished"
        );
        Ok(report)
    }

    fn deep_clone(&self, scope: CloneScope) -> Self {
        Self {
            discount: self.discount.as_ref().map(|d| scoped_curve(d, scope)),
            projections: self
                .projections
                .iter()
                .map(|p| scoped_curve(p, scope))
                .collect(),
            ..self.clone()
        }
    }
}
