#![allow(dead_code)]

use fluxopt::{
    Constraint, LinearExpression, Objective, ProblemModel, Relation, SolverBackend, SolverConfig,
    SolverFactory, Variable, VariableId, VariableKind,
};

pub const TOL: f64 = 1e-6;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn microlp_model(name: &str) -> ProblemModel {
    init_tracing();
    SolverFactory::create_model(&SolverConfig::new(SolverBackend::MicroLp))
        .expect("microlp backend is compiled in")
        .with_name(name)
}

pub fn flux(model: &mut ProblemModel, name: &str, lower: f64, upper: f64) -> VariableId {
    model
        .add_variable(Variable::continuous(VariableKind::Flux, name).with_bounds(lower, upper))
        .expect("valid variable")
}

pub fn row(terms: &[(VariableId, f64)], relation: Relation, rhs: f64) -> Constraint {
    let mut expression = LinearExpression::new();
    for &(id, coeff) in terms {
        expression.add_term(id, coeff);
    }
    Constraint::new(expression, relation, rhs)
}

/// maximize x + y  s.t.  x + y <= 10, x <= 6, y <= 7, x, y >= 0
pub fn scenario_a() -> (ProblemModel, VariableId, VariableId) {
    let mut model = microlp_model("scenario_a");
    let x = flux(&mut model, "x", 0.0, f64::INFINITY);
    let y = flux(&mut model, "y", 0.0, f64::INFINITY);
    model
        .add_constraint(row(&[(x, 1.0), (y, 1.0)], Relation::LessThanOrEqual, 10.0).with_name("total"))
        .unwrap();
    model
        .add_constraint(row(&[(x, 1.0)], Relation::LessThanOrEqual, 6.0).with_name("x_cap"))
        .unwrap();
    model
        .add_constraint(row(&[(y, 1.0)], Relation::LessThanOrEqual, 7.0).with_name("y_cap"))
        .unwrap();
    model
        .set_objective(Objective::maximize(
            LinearExpression::term(x, 1.0).with_term(y, 1.0),
        ))
        .unwrap();
    (model, x, y)
}

/// `n` binaries, `sum <= limit`, maximize the sum
pub fn binary_choice(n: usize, limit: f64) -> (ProblemModel, Vec<VariableId>) {
    let mut model = microlp_model("binary_choice");
    let ids: Vec<VariableId> = (0..n)
        .map(|i| {
            model
                .add_variable(Variable::binary(VariableKind::ReactionUse, format!("b{i}")))
                .unwrap()
        })
        .collect();
    let terms: Vec<_> = ids.iter().map(|&id| (id, 1.0)).collect();
    model
        .add_constraint(row(&terms, Relation::LessThanOrEqual, limit))
        .unwrap();
    let mut sum = LinearExpression::new();
    for &id in &ids {
        sum.add_term(id, 1.0);
    }
    model.set_objective(Objective::maximize(sum)).unwrap();
    (model, ids)
}
