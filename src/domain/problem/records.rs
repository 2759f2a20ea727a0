use super::ProblemModel;
use crate::domain::error::Result;
use crate::domain::ids::VariableId;
use crate::domain::value_objects::{EntityKind, VariableKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// One `name -> [lower, upper]` line of a bounds record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundEntry {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

/// Bounds read from an external source, applied by variable name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundsRecord {
    pub entries: Vec<BoundEntry>,
}

impl BoundsRecord {
    pub fn with_entry(mut self, name: impl Into<String>, lower: f64, upper: f64) -> Self {
        self.entries.push(BoundEntry {
            name: name.into(),
            lower,
            upper,
        });
        self
    }
}

/// Species available for uptake and their maximum uptake rate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub name: String,
    pub compounds: BTreeMap<String, f64>,
}

impl MediaRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compounds: BTreeMap::new(),
        }
    }

    pub fn with_compound(mut self, species: impl Into<String>, max_uptake: f64) -> Self {
        self.compounds.insert(species.into(), max_uptake);
        self
    }
}

impl ProblemModel {
    /// Apply a bounds record; returns how many entries matched a variable.
    /// Names the model does not know are skipped.
    ///
    /// Every matched entry is checked before any bound changes, so a record
    /// with one bad entry leaves the model as it was.
    pub fn apply_bounds(&mut self, record: &BoundsRecord) -> Result<usize> {
        let mut plan = Vec::with_capacity(record.entries.len());
        for entry in &record.entries {
            match self.variable_by_name(&entry.name) {
                Some(id) => plan.push((id, entry.lower, entry.upper)),
                None => warn!(
                    component = "records",
                    operation = "apply_bounds",
                    status = "skipped",
                    name = %entry.name,
                    "No variable with this name"
                ),
            }
        }
        self.apply_plan(&plan, "apply_bounds")?;
        debug!(
            component = "records",
            operation = "apply_bounds",
            status = "success",
            applied = plan.len(),
            total = record.entries.len(),
            "Applied bounds record"
        );
        Ok(plan.len())
    }

    /// Close uptake on every species drain, then open the drains of species
    /// listed in the media. Returns the number of drains opened.
    ///
    /// Net drains get `lower = -max_uptake`; split uptake drains get
    /// `upper = max_uptake`. Outflow components are left alone. Nothing
    /// changes when any resulting bound pair is invalid.
    pub fn apply_media(&mut self, media: &MediaRecord) -> Result<usize> {
        let mut plan = Vec::new();
        let mut opened = 0;
        let mut seen = BTreeSet::new();
        for (index, variable) in self.variables.iter().enumerate() {
            let species = match &variable.entity {
                Some(entity) if entity.kind == EntityKind::Species => &entity.id,
                _ => continue,
            };
            let limit = media.compounds.get(species).copied();
            let (lower, upper) = (variable.lower_bound, variable.upper_bound);
            let bounds = match variable.kind {
                VariableKind::DrainFlux => Some((-limit.unwrap_or(0.0), upper.max(0.0))),
                VariableKind::ReverseDrainFlux => Some((lower.min(0.0), limit.unwrap_or(0.0))),
                _ => None,
            };
            if let Some((lower, upper)) = bounds {
                plan.push((VariableId::from_index(index), lower, upper));
                if limit.is_some() {
                    opened += 1;
                    seen.insert(species.clone());
                }
            }
        }
        self.apply_plan(&plan, "apply_media")?;
        for species in media.compounds.keys().filter(|s| !seen.contains(*s)) {
            warn!(
                component = "records",
                operation = "apply_media",
                status = "skipped",
                media = %media.name,
                species = %species,
                "Media compound has no drain variable"
            );
        }
        debug!(
            component = "records",
            operation = "apply_media",
            status = "success",
            media = %media.name,
            opened,
            "Applied media"
        );
        Ok(opened)
    }

    fn apply_plan(&mut self, plan: &[(VariableId, f64, f64)], operation: &str) -> Result<()> {
        if let Some(err) = plan
            .iter()
            .find_map(|&(id, lower, upper)| self.check_bounds(id, lower, upper).err())
        {
            warn!(
                component = "records",
                operation,
                status = "rejected",
                error = %err,
                "Record left unapplied"
            );
            return Err(err);
        }
        for &(id, lower, upper) in plan {
            self.set_bounds(id, lower, upper)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::RecordingAdapter;
    use super::*;
    use crate::domain::models::{EntityRef, Variable};

    fn model() -> ProblemModel {
        ProblemModel::new(Box::new(RecordingAdapter::default()))
    }

    #[test]
    fn bounds_record_skips_unknown_names() {
        let mut model = model();
        let a = model
            .add_variable(Variable::continuous(VariableKind::Flux, "rxn1"))
            .unwrap();
        let record = BoundsRecord::default()
            .with_entry("rxn1", -5.0, 5.0)
            .with_entry("nope", 0.0, 1.0);
        assert_eq!(model.apply_bounds(&record).unwrap(), 1);
        assert_eq!(model.variable(a).unwrap().lower_bound, -5.0);
    }

    #[test]
    fn bounds_record_rejects_inverted_bounds() {
        let mut model = model();
        model
            .add_variable(Variable::continuous(VariableKind::Flux, "rxn1"))
            .unwrap();
        let record = BoundsRecord::default().with_entry("rxn1", 5.0, -5.0);
        assert!(model.apply_bounds(&record).is_err());
    }

    #[test]
    fn bounds_record_with_one_bad_entry_changes_nothing() {
        let mut model = model();
        let a = model
            .add_variable(Variable::continuous(VariableKind::Flux, "rxn1").with_bounds(-1.0, 1.0))
            .unwrap();
        let b = model
            .add_variable(Variable::continuous(VariableKind::Flux, "rxn2").with_bounds(-1.0, 1.0))
            .unwrap();
        model.synchronize().unwrap();

        let record = BoundsRecord::default()
            .with_entry("rxn1", -5.0, 5.0)
            .with_entry("rxn2", 3.0, 2.0);
        let err = model.apply_bounds(&record).unwrap_err();
        assert_eq!(err.code(), "VARIABLE_INVALID_BOUNDS");

        for id in [a, b] {
            let variable = model.variable(id).unwrap();
            assert_eq!((variable.lower_bound, variable.upper_bound), (-1.0, 1.0));
        }
        assert!(!model.needs_sync());
    }

    #[test]
    fn media_with_one_bad_limit_changes_nothing() {
        let mut model = model();
        let glc = model
            .add_variable(
                Variable::continuous(VariableKind::DrainFlux, "EX_glc")
                    .with_bounds(-100.0, 100.0)
                    .with_entity(EntityRef::species("glc")),
            )
            .unwrap();
        let nh4_in = model
            .add_variable(
                Variable::continuous(VariableKind::ReverseDrainFlux, "EX_nh4_in")
                    .with_bounds(0.0, 100.0)
                    .with_entity(EntityRef::species("nh4")),
            )
            .unwrap();
        let media = MediaRecord::new("broken")
            .with_compound("glc", 10.0)
            .with_compound("nh4", -1.0);

        assert!(model.apply_media(&media).is_err());
        assert_eq!(model.variable(glc).unwrap().lower_bound, -100.0);
        assert_eq!(model.variable(nh4_in).unwrap().upper_bound, 100.0);
    }

    #[test]
    fn media_opens_listed_and_closes_others() {
        let mut model = model();
        let glc = model
            .add_variable(
                Variable::continuous(VariableKind::DrainFlux, "EX_glc")
                    .with_bounds(-100.0, 100.0)
                    .with_entity(EntityRef::species("glc")),
            )
            .unwrap();
        let o2 = model
            .add_variable(
                Variable::continuous(VariableKind::DrainFlux, "EX_o2")
                    .with_bounds(-100.0, 100.0)
                    .with_entity(EntityRef::species("o2")),
            )
            .unwrap();
        let nh4_in = model
            .add_variable(
                Variable::continuous(VariableKind::ReverseDrainFlux, "EX_nh4_in")
                    .with_bounds(0.0, 100.0)
                    .with_entity(EntityRef::species("nh4")),
            )
            .unwrap();
        let media = MediaRecord::new("minimal")
            .with_compound("glc", 10.0)
            .with_compound("nh4", 5.0)
            .with_compound("fe", 1.0);

        assert_eq!(model.apply_media(&media).unwrap(), 2);
        assert_eq!(model.variable(glc).unwrap().lower_bound, -10.0);
        assert_eq!(model.variable(o2).unwrap().lower_bound, 0.0);
        assert_eq!(model.variable(o2).unwrap().upper_bound, 100.0);
        assert_eq!(model.variable(nh4_in).unwrap().upper_bound, 5.0);
    }
}
