use super::ids::VariableId;
use std::collections::BTreeMap;

/// Linear (optionally quadratic) expression over model variables.
///
/// Terms are keyed by variable id so the order in which they are loaded into
/// a solver is deterministic regardless of insertion order. Quadratic keys
/// are normalized so that the smaller id comes first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpression {
    pub terms: BTreeMap<VariableId, f64>,
    pub quadratic: BTreeMap<(VariableId, VariableId), f64>,
    pub constant: f64,
}

impl LinearExpression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expression with a single term `coefficient * variable`
    pub fn term(variable: VariableId, coefficient: f64) -> Self {
        let mut expr = Self::new();
        expr.add_term(variable, coefficient);
        expr
    }

    /// Add `coefficient * variable`, merging with an existing term
    pub fn add_term(&mut self, variable: VariableId, coefficient: f64) -> &mut Self {
        let entry = self.terms.entry(variable).or_insert(0.0);
        *entry += coefficient;
        if *entry == 0.0 {
            self.terms.remove(&variable);
        }
        self
    }

    /// Add `coefficient * a * b`
    pub fn add_quadratic_term(&mut self, a: VariableId, b: VariableId, coefficient: f64) -> &mut Self {
        let key = if a <= b { (a, b) } else { (b, a) };
        let entry = self.quadratic.entry(key).or_insert(0.0);
        *entry += coefficient;
        if *entry == 0.0 {
            self.quadratic.remove(&key);
        }
        self
    }

    pub fn with_term(mut self, variable: VariableId, coefficient: f64) -> Self {
        self.add_term(variable, coefficient);
        self
    }

    pub fn with_constant(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }

    pub fn coefficient(&self, variable: VariableId) -> f64 {
        self.terms.get(&variable).copied().unwrap_or(0.0)
    }

    pub fn is_quadratic(&self) -> bool {
        !self.quadratic.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.quadratic.is_empty()
    }

    /// Every variable referenced by a linear or quadratic term
    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.terms
            .keys()
            .copied()
            .chain(self.quadratic.keys().flat_map(|&(a, b)| [a, b]))
    }

    /// Evaluate against a dense value vector indexed by variable id
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let value_of = |id: VariableId| values.get(id.index()).copied().unwrap_or(0.0);
        let linear: f64 = self
            .terms
            .iter()
            .map(|(&id, &coeff)| coeff * value_of(id))
            .sum();
        let quadratic: f64 = self
            .quadratic
            .iter()
            .map(|(&(a, b), &coeff)| coeff * value_of(a) * value_of(b))
            .sum();
        self.constant + linear + quadratic
    }

    /// Drop every term on `removed` and shift ids above it down by one
    pub(crate) fn remove_and_renumber(&mut self, removed: VariableId) {
        let shift = |id: VariableId| {
            if id > removed {
                VariableId::new(id.inner() - 1)
            } else {
                id
            }
        };
        self.terms = std::mem::take(&mut self.terms)
            .into_iter()
            .filter(|(id, _)| *id != removed)
            .map(|(id, coeff)| (shift(id), coeff))
            .collect();
        self.quadratic = std::mem::take(&mut self.quadratic)
            .into_iter()
            .filter(|((a, b), _)| *a != removed && *b != removed)
            .map(|((a, b), coeff)| ((shift(a), shift(b)), coeff))
            .collect();
    }
}
