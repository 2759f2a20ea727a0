use super::ProblemModel;
use crate::domain::error::{ProblemError, Reference, Result};
use crate::domain::expression::LinearExpression;
use crate::domain::ids::{ConstraintId, VariableId};
use crate::domain::models::{Constraint, Objective, Variable};
use crate::domain::value_objects::{OptimizationType, Relation, VariableKind};
use std::collections::BTreeSet;
use tracing::debug;

/// Flux limit used for use-indicator constraints on unbounded variables
pub const DEFAULT_BIG_M: f64 = 1000.0;

/// How a constraint is taken out of the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    /// Keep the row but stop enforcing it; ids are unchanged
    Relax,
    /// Physically delete the row; later constraint ids shift down by one
    Delete,
}

/// Options for the "sum of all variables of a kind" builders
#[derive(Debug, Clone, PartialEq)]
pub struct SumOptions {
    pub coefficient: f64,
    /// Use `coefficient * v^2` instead of `coefficient * v`
    pub quadratic: bool,
    /// Restrict to a named subset defined on the model
    pub subset: Option<String>,
}

impl Default for SumOptions {
    fn default() -> Self {
        Self {
            coefficient: 1.0,
            quadratic: false,
            subset: None,
        }
    }
}

impl SumOptions {
    pub fn with_coefficient(mut self, coefficient: f64) -> Self {
        self.coefficient = coefficient;
        self
    }

    pub fn squared(mut self) -> Self {
        self.quadratic = true;
        self
    }

    pub fn within(mut self, subset: impl Into<String>) -> Self {
        self.subset = Some(subset.into());
        self
    }
}

impl ProblemModel {
    /// Add a variable; returns its id (the next free column)
    pub fn add_variable(&mut self, variable: Variable) -> Result<VariableId> {
        let id = VariableId::from_index(self.variables.len());
        if !variable.has_valid_bounds() {
            return Err(ProblemError::InvalidBounds {
                variable: id,
                lower: variable.lower_bound,
                upper: variable.upper_bound,
            });
        }
        self.variables.push(variable);
        self.mark_variable(id);
        Ok(id)
    }

    /// Physically remove a variable.
    ///
    /// Every term on it is dropped from constraints, the objective and named
    /// subsets, and higher variable ids shift down by one. States saved
    /// before the removal can no longer be restored.
    pub fn remove_variable(&mut self, id: VariableId) -> Result<Variable> {
        self.ensure_variable(id)?;
        let removed = self.variables.remove(id.index());
        for constraint in &mut self.constraints {
            constraint.expression.remove_and_renumber(id);
        }
        self.objective.expression.remove_and_renumber(id);
        for members in self.subsets.values_mut() {
            *members = members
                .iter()
                .filter(|&&member| member != id)
                .map(|&member| {
                    if member > id {
                        VariableId::new(member.inner() - 1)
                    } else {
                        member
                    }
                })
                .collect();
        }
        self.epoch += 1;
        self.mark_structure_changed();
        debug!(
            component = "problem",
            operation = "remove_variable",
            status = "success",
            variable = id.inner(),
            epoch = self.epoch,
            "Removed variable and renumbered columns"
        );
        Ok(removed)
    }

    /// Mutable access to a variable; it is reloaded at the next sync
    pub fn variable_mut(&mut self, id: VariableId) -> Result<&mut Variable> {
        self.ensure_variable(id)?;
        self.mark_variable(id);
        Ok(&mut self.variables[id.index()])
    }

    pub fn set_bounds(&mut self, id: VariableId, lower: f64, upper: f64) -> Result<()> {
        self.check_bounds(id, lower, upper)?;
        let variable = &self.variables[id.index()];
        if variable.lower_bound != lower || variable.upper_bound != upper {
            let variable = &mut self.variables[id.index()];
            variable.lower_bound = lower;
            variable.upper_bound = upper;
            self.mark_variable(id);
        }
        Ok(())
    }

    /// Whether `[lower, upper]` would be accepted by `set_bounds`, without
    /// touching the model
    pub(crate) fn check_bounds(&self, id: VariableId, lower: f64, upper: f64) -> Result<()> {
        self.ensure_variable(id)?;
        let candidate = self.variables[id.index()].clone().with_bounds(lower, upper);
        if candidate.has_valid_bounds() {
            Ok(())
        } else {
            Err(ProblemError::InvalidBounds {
                variable: id,
                lower,
                upper,
            })
        }
    }

    /// Add a constraint; returns its id (the next free row).
    ///
    /// A name already held by another row gets the first free `_{n}` suffix.
    pub fn add_constraint(&mut self, mut constraint: Constraint) -> Result<ConstraintId> {
        self.check_references(&constraint.expression)?;
        let id = ConstraintId::from_index(self.constraints.len());
        self.claim_constraint_name(&mut constraint, id);
        self.constraints.push(constraint);
        self.mark_constraint(id);
        Ok(id)
    }

    /// Replace a constraint in place, keeping its id
    pub fn update_constraint(&mut self, id: ConstraintId, mut constraint: Constraint) -> Result<()> {
        self.ensure_constraint(id)?;
        self.check_references(&constraint.expression)?;
        let old_name = std::mem::take(&mut self.constraints[id.index()].name);
        if self.constraint_index.get(&old_name) == Some(&id) {
            self.constraint_index.remove(&old_name);
        }
        self.claim_constraint_name(&mut constraint, id);
        self.constraints[id.index()] = constraint;
        self.mark_constraint(id);
        Ok(())
    }

    pub fn set_constraint_rhs(&mut self, id: ConstraintId, rhs: f64) -> Result<()> {
        self.ensure_constraint(id)?;
        self.constraints[id.index()].rhs = rhs;
        self.mark_constraint(id);
        Ok(())
    }

    pub fn remove_constraint(&mut self, id: ConstraintId, mode: RemovalMode) -> Result<()> {
        self.ensure_constraint(id)?;
        match mode {
            RemovalMode::Relax => {
                self.constraints[id.index()].relaxed = true;
                self.mark_constraint(id);
            }
            RemovalMode::Delete => {
                self.constraints.remove(id.index());
                self.rebuild_constraint_index();
                self.mark_structure_changed();
            }
        }
        Ok(())
    }

    pub fn relax_constraint(&mut self, id: ConstraintId) -> Result<()> {
        self.remove_constraint(id, RemovalMode::Relax)
    }

    /// Enforce a previously relaxed constraint again
    pub fn enforce_constraint(&mut self, id: ConstraintId) -> Result<()> {
        self.ensure_constraint(id)?;
        self.constraints[id.index()].relaxed = false;
        self.mark_constraint(id);
        Ok(())
    }

    pub fn set_objective(&mut self, objective: Objective) -> Result<()> {
        self.check_references(&objective.expression)?;
        self.objective = objective;
        self.mark_objective();
        Ok(())
    }

    pub fn set_max(&mut self) {
        self.objective.optimization_type = OptimizationType::Maximize;
        self.mark_objective();
    }

    pub fn set_min(&mut self) {
        self.objective.optimization_type = OptimizationType::Minimize;
        self.mark_objective();
    }

    /// Objective that optimizes a single variable
    pub fn add_optimize_variable_objective(&mut self, id: VariableId, maximize: bool) -> Result<()> {
        self.ensure_variable(id)?;
        let direction = if maximize {
            OptimizationType::Maximize
        } else {
            OptimizationType::Minimize
        };
        self.set_objective(Objective::new(direction, LinearExpression::term(id, 1.0)))
    }

    /// Turn the current objective into the constraint `objective REL value`
    pub fn add_objective_constraint(&mut self, value: f64, relation: Relation) -> Result<ConstraintId> {
        let constraint = Constraint::new(self.objective.expression.clone(), relation, value)
            .with_name("objective_bound");
        self.add_constraint(constraint)
    }

    pub fn clear_objective(&mut self) {
        let direction = self.objective.optimization_type;
        self.objective = Objective::new(direction, LinearExpression::new());
        self.mark_objective();
    }

    pub fn clear_constraints(&mut self) {
        self.constraints.clear();
        self.constraint_index.clear();
        self.mark_structure_changed();
    }

    /// Remove every variable, and with them all constraints, the objective
    /// and named subsets
    pub fn clear_variables(&mut self) {
        self.variables.clear();
        self.clear_constraints();
        self.clear_objective();
        self.subsets.clear();
        self.epoch += 1;
    }

    pub fn define_subset(
        &mut self,
        name: impl Into<String>,
        members: impl IntoIterator<Item = VariableId>,
    ) -> Result<()> {
        let members: BTreeSet<VariableId> = members.into_iter().collect();
        for &id in &members {
            self.ensure_variable(id)?;
        }
        self.subsets.insert(name.into(), members);
        Ok(())
    }

    /// Sum of all variables of `kind`, optionally squared or restricted to a
    /// named subset. The expression is returned unattached.
    pub fn sum_expression(&self, kind: VariableKind, options: &SumOptions) -> Result<LinearExpression> {
        let subset = options
            .subset
            .as_deref()
            .map(|name| self.subset(name))
            .transpose()?;
        let mut expr = LinearExpression::new();
        for id in self.variable_ids() {
            if self.variables[id.index()].kind != kind {
                continue;
            }
            if subset.is_some_and(|members| !members.contains(&id)) {
                continue;
            }
            if options.quadratic {
                expr.add_quadratic_term(id, id, options.coefficient);
            } else {
                expr.add_term(id, options.coefficient);
            }
        }
        Ok(expr)
    }

    /// Unattached constraint `sum REL rhs` over variables of `kind`
    pub fn sum_constraint(
        &self,
        kind: VariableKind,
        options: &SumOptions,
        relation: Relation,
        rhs: f64,
    ) -> Result<Constraint> {
        Ok(Constraint::new(self.sum_expression(kind, options)?, relation, rhs))
    }

    pub fn add_sum_constraint(
        &mut self,
        kind: VariableKind,
        options: &SumOptions,
        relation: Relation,
        rhs: f64,
    ) -> Result<ConstraintId> {
        let constraint = self.sum_constraint(kind, options, relation, rhs)?;
        self.add_constraint(constraint)
    }

    /// Set the objective to the sum over variables of `kind`, or add the sum
    /// to the current objective when `append` is true. Returns the resulting
    /// objective expression.
    pub fn add_sum_objective(
        &mut self,
        kind: VariableKind,
        options: &SumOptions,
        append: bool,
    ) -> Result<LinearExpression> {
        let sum = self.sum_expression(kind, options)?;
        let mut expression = if append {
            self.objective.expression.clone()
        } else {
            LinearExpression::new()
        };
        for (&id, &coeff) in &sum.terms {
            expression.add_term(id, coeff);
        }
        for (&(a, b), &coeff) in &sum.quadratic {
            expression.add_quadratic_term(a, b, coeff);
        }
        self.objective.expression = expression.clone();
        self.mark_objective();
        Ok(expression)
    }

    /// Create a binary use indicator `u` for a flux variable `v` together
    /// with `v - ub*u <= 0` and, for a negative lower bound, `v - lb*u >= 0`.
    /// Infinite bounds are replaced by [`DEFAULT_BIG_M`].
    pub fn add_use_variable(&mut self, flux: VariableId) -> Result<VariableId> {
        let source = self.variable(flux)?.clone();
        let kind = match source.kind {
            VariableKind::ForwardFlux => VariableKind::ForwardUse,
            VariableKind::ReverseFlux => VariableKind::ReverseUse,
            kind if kind.is_drain() => VariableKind::DrainUse,
            _ => VariableKind::ReactionUse,
        };
        let mut indicator = Variable::binary(kind, format!("{}_use", source.name));
        indicator.entity = source.entity.clone();
        let use_id = self.add_variable(indicator)?;

        let limit = |bound: f64| {
            if bound.is_finite() {
                bound
            } else {
                DEFAULT_BIG_M.copysign(bound)
            }
        };
        if source.upper_bound > 0.0 {
            let upper = limit(source.upper_bound);
            self.add_constraint(
                Constraint::new(
                    LinearExpression::term(flux, 1.0).with_term(use_id, -upper),
                    Relation::LessThanOrEqual,
                    0.0,
                )
                .with_name(format!("{}_use_upper", source.name)),
            )?;
        }
        if source.lower_bound < 0.0 {
            let lower = limit(source.lower_bound);
            self.add_constraint(
                Constraint::new(
                    LinearExpression::term(flux, 1.0).with_term(use_id, -lower),
                    Relation::GreaterThanOrEqual,
                    0.0,
                )
                .with_name(format!("{}_use_lower", source.name)),
            )?;
        }
        Ok(use_id)
    }

    fn claim_constraint_name(&mut self, constraint: &mut Constraint, id: ConstraintId) {
        if constraint.name.is_empty() {
            return;
        }
        let base = constraint.name.clone();
        let mut n = 1;
        while self.constraint_index.contains_key(&constraint.name) {
            constraint.name = format!("{base}_{n}");
            n += 1;
        }
        self.constraint_index.insert(constraint.name.clone(), id);
    }

    pub(super) fn rebuild_constraint_index(&mut self) {
        self.constraint_index = self
            .constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.name.is_empty())
            .map(|(index, c)| (c.name.clone(), ConstraintId::from_index(index)))
            .collect();
    }

    fn check_references(&self, expression: &LinearExpression) -> Result<()> {
        match expression
            .variables()
            .find(|id| id.index() >= self.variables.len())
        {
            Some(id) => Err(ProblemError::InvalidReference(Reference::Variable(id))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::RecordingAdapter;
    use super::*;

    fn model() -> ProblemModel {
        ProblemModel::new(Box::new(RecordingAdapter::default()))
    }

    fn flux(model: &mut ProblemModel, name: &str) -> VariableId {
        model
            .add_variable(Variable::continuous(VariableKind::Flux, name).with_bounds(-10.0, 10.0))
            .unwrap()
    }

    #[test]
    fn ids_are_assigned_in_order() {
        let mut model = model();
        assert_eq!(flux(&mut model, "a"), VariableId::new(0));
        assert_eq!(flux(&mut model, "b"), VariableId::new(1));
    }

    #[test]
    fn foreign_reference_is_rejected() {
        let mut model = model();
        flux(&mut model, "a");
        let err = model
            .add_constraint(Constraint::new(
                LinearExpression::term(VariableId::new(5), 1.0),
                Relation::Equal,
                0.0,
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            ProblemError::InvalidReference(Reference::Variable(id)) if id == VariableId::new(5)
        ));
        assert_eq!(model.num_constraints(), 0);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut model = model();
        let a = flux(&mut model, "a");
        assert!(model.set_bounds(a, 3.0, 1.0).is_err());
        assert_eq!(model.variable(a).unwrap().upper_bound, 10.0);
    }

    #[test]
    fn removing_a_variable_renumbers_references() {
        let mut model = model();
        let a = flux(&mut model, "a");
        let b = flux(&mut model, "b");
        let c = flux(&mut model, "c");
        model
            .add_constraint(Constraint::new(
                LinearExpression::term(a, 1.0).with_term(b, 2.0).with_term(c, 3.0),
                Relation::Equal,
                0.0,
            ))
            .unwrap();
        model.define_subset("tail", [b, c]).unwrap();
        model.remove_variable(b).unwrap();

        let expr = &model.constraint(ConstraintId::new(0)).unwrap().expression;
        assert_eq!(expr.coefficient(VariableId::new(0)), 1.0);
        assert_eq!(expr.coefficient(VariableId::new(1)), 3.0);
        assert_eq!(expr.terms.len(), 2);
        assert_eq!(
            model.subset("tail").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![VariableId::new(1)]
        );
    }

    #[test]
    fn deleting_a_constraint_shifts_name_index() {
        let mut model = model();
        let a = flux(&mut model, "a");
        let first = model
            .add_constraint(
                Constraint::new(LinearExpression::term(a, 1.0), Relation::LessThanOrEqual, 1.0)
                    .with_name("first"),
            )
            .unwrap();
        model
            .add_constraint(
                Constraint::new(LinearExpression::term(a, 1.0), Relation::GreaterThanOrEqual, 0.0)
                    .with_name("second"),
            )
            .unwrap();
        model.remove_constraint(first, RemovalMode::Delete).unwrap();
        assert_eq!(model.constraint_by_name("first"), None);
        assert_eq!(model.constraint_by_name("second"), Some(ConstraintId::new(0)));
    }

    #[test]
    fn repeated_constraint_names_get_suffixes() {
        let mut model = model();
        let a = flux(&mut model, "a");
        model
            .set_objective(Objective::maximize(LinearExpression::term(a, 1.0)))
            .unwrap();
        let first = model.add_objective_constraint(1.0, Relation::GreaterThanOrEqual).unwrap();
        let second = model.add_objective_constraint(2.0, Relation::GreaterThanOrEqual).unwrap();

        assert_eq!(model.constraint(second).unwrap().name, "objective_bound_1");
        assert_eq!(model.constraint_by_name("objective_bound"), Some(first));
        assert_eq!(model.constraint_by_name("objective_bound_1"), Some(second));

        let renamed = Constraint::new(LinearExpression::term(a, 1.0), Relation::LessThanOrEqual, 5.0)
            .with_name("objective_bound");
        model.update_constraint(second, renamed).unwrap();
        assert_eq!(model.constraint(second).unwrap().name, "objective_bound_1");
        assert_eq!(model.constraint_by_name("objective_bound"), Some(first));
    }

    #[test]
    fn relaxing_keeps_the_row() {
        let mut model = model();
        let a = flux(&mut model, "a");
        let id = model
            .add_constraint(Constraint::new(
                LinearExpression::term(a, 1.0),
                Relation::LessThanOrEqual,
                1.0,
            ))
            .unwrap();
        model.relax_constraint(id).unwrap();
        assert_eq!(model.num_constraints(), 1);
        assert!(model.constraint(id).unwrap().relaxed);
        model.enforce_constraint(id).unwrap();
        assert!(!model.constraint(id).unwrap().relaxed);
    }

    #[test]
    fn sum_builders_respect_kind_and_subset() {
        let mut model = model();
        let a = flux(&mut model, "a");
        let b = flux(&mut model, "b");
        model
            .add_variable(Variable::binary(VariableKind::ReactionUse, "u"))
            .unwrap();
        model.define_subset("only_b", [b]).unwrap();

        let all = model
            .sum_expression(VariableKind::Flux, &SumOptions::default().with_coefficient(2.0))
            .unwrap();
        assert_eq!(all.coefficient(a), 2.0);
        assert_eq!(all.coefficient(b), 2.0);
        assert_eq!(all.terms.len(), 2);

        let restricted = model
            .sum_expression(VariableKind::Flux, &SumOptions::default().squared().within("only_b"))
            .unwrap();
        assert!(restricted.terms.is_empty());
        assert_eq!(restricted.quadratic.get(&(b, b)), Some(&1.0));

        let mut constraint = model
            .sum_constraint(VariableKind::Flux, &SumOptions::default(), Relation::LessThanOrEqual, 5.0)
            .unwrap();
        constraint.expression.add_term(a, 1.0);
        let id = model.add_constraint(constraint).unwrap();
        assert_eq!(model.constraint(id).unwrap().expression.coefficient(a), 2.0);

        assert!(model
            .sum_expression(VariableKind::Flux, &SumOptions::default().within("missing"))
            .is_err());
    }

    #[test]
    fn sum_objective_appends() {
        let mut model = model();
        let a = flux(&mut model, "a");
        model.add_optimize_variable_objective(a, true).unwrap();
        let expr = model
            .add_sum_objective(VariableKind::Flux, &SumOptions::default().with_coefficient(-1.0), true)
            .unwrap();
        assert!(expr.terms.is_empty());
        assert!(model.is_max());
    }

    #[test]
    fn use_variable_links_both_directions() {
        let mut model = model();
        let a = flux(&mut model, "a");
        let u = model.add_use_variable(a).unwrap();
        assert_eq!(model.variable(u).unwrap().kind, VariableKind::ReactionUse);
        let upper = model.constraint_by_name("a_use_upper").unwrap();
        let lower = model.constraint_by_name("a_use_lower").unwrap();
        assert_eq!(model.constraint(upper).unwrap().expression.coefficient(u), -10.0);
        assert_eq!(model.constraint(lower).unwrap().expression.coefficient(u), 10.0);
    }

    #[test]
    fn objective_constraint_copies_objective() {
        let mut model = model();
        let a = flux(&mut model, "a");
        let b = flux(&mut model, "b");
        model
            .set_objective(Objective::maximize(
                LinearExpression::term(a, 1.0).with_term(b, 1.0),
            ))
            .unwrap();
        let id = model
            .add_objective_constraint(10.0, Relation::GreaterThanOrEqual)
            .unwrap();
        let constraint = model.constraint(id).unwrap();
        assert_eq!(constraint.rhs, 10.0);
        assert_eq!(constraint.expression, model.objective().expression);
    }
}
