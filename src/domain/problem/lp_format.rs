use super::ProblemModel;
use crate::domain::expression::LinearExpression;
use crate::domain::value_objects::{OptimizationType, VariableDomain};
use std::collections::BTreeSet;
use std::fmt::Write;

// CPLEX LP format only allows a restricted alphabet in identifiers
fn sanitize(name: &str, fallback: impl FnOnce() -> String) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.chars().next() {
        None => fallback(),
        Some(first) if first.is_ascii_digit() || first == '.' => format!("_{cleaned}"),
        Some(_) => cleaned,
    }
}

// Unnamed entries fall back to `{prefix}{index}`; clashes get the first free
// `_{n}` suffix
fn unique_names<'a>(names: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .enumerate()
        .map(|(index, (name, prefix))| {
            let base = sanitize(name, || format!("{prefix}{index}"));
            let mut candidate = base.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            candidate
        })
        .collect()
}

fn format_number(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{value}")
    }
}

fn write_term(out: &mut String, coefficient: f64, first: bool, term: &str) {
    if coefficient < 0.0 {
        let _ = write!(out, " - {} {term}", -coefficient);
    } else if first {
        let _ = write!(out, " {coefficient} {term}");
    } else {
        let _ = write!(out, " + {coefficient} {term}");
    }
}

fn write_expression(out: &mut String, expression: &LinearExpression, names: &[String]) {
    let mut first = true;
    for (id, &coefficient) in &expression.terms {
        write_term(out, coefficient, first, &names[id.index()]);
        first = false;
    }
    if expression.is_quadratic() {
        out.push_str(if first { " [" } else { " + [" });
        for (n, (&(a, b), &coefficient)) in expression.quadratic.iter().enumerate() {
            let term = if a == b {
                format!("{} ^ 2", names[a.index()])
            } else {
                format!("{} * {}", names[a.index()], names[b.index()])
            };
            write_term(out, coefficient, n == 0, &term);
        }
        out.push_str(" ]");
        first = false;
    }
    if first {
        out.push_str(" 0");
    }
}

impl ProblemModel {
    /// Render the model as CPLEX LP text. Relaxed constraints are omitted.
    pub fn write_lp(&self) -> String {
        let var_names = unique_names(
            self.variables
                .iter()
                .map(|v| (v.name.as_str(), v.kind.prefix())),
        );
        let row_names = unique_names(self.constraints.iter().map(|c| (c.name.as_str(), "c")));
        let mut out = String::new();

        let _ = writeln!(out, "\\ Problem: {}", self.name);
        out.push_str(match self.objective.optimization_type {
            OptimizationType::Maximize => "Maximize\n",
            OptimizationType::Minimize => "Minimize\n",
        });
        out.push_str(" obj:");
        let mut objective = self.objective.expression.clone();
        // Bracketed objective terms are divided by two on read
        for coefficient in objective.quadratic.values_mut() {
            *coefficient *= 2.0;
        }
        write_expression(&mut out, &objective, &var_names);
        if objective.is_quadratic() {
            out.push_str(" / 2");
        }
        if objective.constant != 0.0 {
            let _ = write!(out, " + {}", objective.constant);
        }
        out.push('\n');

        out.push_str("Subject To\n");
        for (constraint, name) in self.constraints.iter().zip(&row_names) {
            if constraint.relaxed {
                continue;
            }
            let _ = write!(out, " {name}:");
            write_expression(&mut out, &constraint.expression, &var_names);
            let rhs = constraint.rhs - constraint.expression.constant;
            let _ = writeln!(
                out,
                " {} {}",
                constraint.relation.symbol(),
                format_number(rhs)
            );
        }

        out.push_str("Bounds\n");
        for (variable, name) in self.variables.iter().zip(&var_names) {
            if variable.domain == VariableDomain::Binary
                && variable.lower_bound == 0.0
                && variable.upper_bound == 1.0
            {
                continue;
            }
            if variable.lower_bound == variable.upper_bound {
                let _ = writeln!(out, " {name} = {}", format_number(variable.lower_bound));
            } else if variable.lower_bound == f64::NEG_INFINITY
                && variable.upper_bound == f64::INFINITY
            {
                let _ = writeln!(out, " {name} free");
            } else {
                let _ = writeln!(
                    out,
                    " {} <= {name} <= {}",
                    format_number(variable.lower_bound),
                    format_number(variable.upper_bound)
                );
            }
        }

        let integers: Vec<&String> = self
            .variables
            .iter()
            .zip(&var_names)
            .filter(|(v, _)| v.domain == VariableDomain::Integer)
            .map(|(_, name)| name)
            .collect();
        if !integers.is_empty() && !self.parameters.relax_integers {
            out.push_str("Generals\n");
            for name in integers {
                let _ = writeln!(out, " {name}");
            }
        }
        let binaries: Vec<&String> = self
            .variables
            .iter()
            .zip(&var_names)
            .filter(|(v, _)| v.domain == VariableDomain::Binary)
            .map(|(_, name)| name)
            .collect();
        if !binaries.is_empty() && !self.parameters.relax_integers {
            out.push_str("Binaries\n");
            for name in binaries {
                let _ = writeln!(out, " {name}");
            }
        }
        out.push_str("End\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::RecordingAdapter;
    use super::*;
    use crate::domain::models::{Constraint, Objective, Variable};
    use crate::domain::value_objects::{Relation, VariableKind};

    #[test]
    fn names_are_sanitized_and_unique() {
        let names = unique_names(
            [("a b", "F"), ("a_b", "F"), ("", "RD"), ("1x", "F")].into_iter(),
        );
        assert_eq!(names, vec!["a_b", "a_b_1", "RD2", "_1x"]);
    }

    #[test]
    fn suffixed_names_skip_later_literal_names() {
        let names = unique_names(
            [("a", "F"), ("a", "F"), ("a_1", "F"), ("", "F"), ("F3", "F")].into_iter(),
        );
        assert_eq!(names, vec!["a", "a_1", "a_1_1", "F3", "F3_1"]);
        let distinct: BTreeSet<&String> = names.iter().collect();
        assert_eq!(distinct.len(), names.len());
    }

    #[test]
    fn writes_sections_and_skips_relaxed_rows() {
        let mut model = ProblemModel::new(Box::new(RecordingAdapter::default())).with_name("toy");
        let x = model
            .add_variable(Variable::continuous(VariableKind::Flux, "x").with_bounds(0.0, 6.0))
            .unwrap();
        let y = model
            .add_variable(Variable::binary(VariableKind::ReactionUse, "use_y"))
            .unwrap();
        model
            .add_constraint(
                Constraint::new(
                    LinearExpression::term(x, 1.0).with_term(y, -2.0),
                    Relation::LessThanOrEqual,
                    10.0,
                )
                .with_name("cap"),
            )
            .unwrap();
        let hidden = model
            .add_constraint(
                Constraint::new(LinearExpression::term(x, 1.0), Relation::Equal, 1.0)
                    .with_name("hidden"),
            )
            .unwrap();
        model.relax_constraint(hidden).unwrap();
        model
            .set_objective(Objective::maximize(LinearExpression::term(x, 1.0)))
            .unwrap();

        let lp = model.write_lp();
        assert!(lp.starts_with("\\ Problem: toy\nMaximize\n"));
        assert!(lp.contains(" obj: 1 x\n"));
        assert!(lp.contains(" cap: 1 x - 2 use_y <= 10\n"));
        assert!(!lp.contains("hidden"));
        assert!(lp.contains(" 0 <= x <= 6\n"));
        assert!(lp.contains("Binaries\n use_y\n"));
        assert!(lp.ends_with("End\n"));
    }
}
