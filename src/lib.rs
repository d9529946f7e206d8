//! JSON shape planning for annotated protobuf schemas.
//!
//! Protobuf's canonical JSON mapping is fixed: every message is an object,
//! 64-bit integers are decimal strings, bytes are standard base64, oneofs
//! emit the set variant's key. Schema annotations let an API owner bend
//! that mapping per field: inject a discriminator for a oneof, flatten a
//! nested message, collapse a single-field wrapper to its bare collection,
//! re-encode bytes or timestamps, surface absent optionals as `null`.
//!
//! This crate is the semantic core shared by the code generators for each
//! target language. It extracts the annotations from a normalized schema
//! model, validates them, resolves the cross-file unwrap graph, and
//! compiles each message into a [`plan::ShapePlan`]: an ordered list of
//! invertible patch operations over the canonical JSON object. Renderers
//! translate plans into target-language marshal/unmarshal code;
//! [`synth::encode`] and [`synth::decode`] execute plans directly on
//! `serde_json` values and serve as the executable definition of each
//! operation.
//!
//! Planning is deterministic: the same schema set always yields the same
//! plans, with operations in a fixed category order (discriminator,
//! flatten, unwrap, scalar, presence) and messages keyed by their
//! fully-qualified names.

pub mod annotations;
pub mod error;
pub mod model;
pub mod options;
pub mod plan;
pub mod scalar;
pub mod synth;
pub mod unwrap;
pub mod validate;

use std::collections::BTreeMap;

pub use error::{Category, ConflictError, Error, ValidationError};
pub use model::{SchemaFile, SchemaSet};
pub use plan::{PatchOp, ShapePlan};
pub use synth::SynthError;

/// Plans for every message of the generated files, keyed by
/// fully-qualified message name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlanSet {
    pub plans: BTreeMap<String, ShapePlan>,
}

impl PlanSet {
    pub fn get(&self, full_name: &str) -> Option<&ShapePlan> {
        self.plans.get(full_name)
    }

    /// Messages whose plan changes the canonical mapping, in name order.
    pub fn non_identity(&self) -> impl Iterator<Item = &ShapePlan> {
        self.plans.values().filter(|plan| !plan.is_identity())
    }
}

/// Validates the whole set and compiles a plan for every message of the
/// generated files, nested messages included.
///
/// The first validation error or conflict aborts planning; partial plans
/// are never returned.
pub fn plan_set(set: &SchemaSet) -> Result<PlanSet, Error> {
    validate::validate_set(set)?;
    let table = unwrap::UnwrapTable::collect(set)?;
    let mut plans = BTreeMap::new();
    for file in &set.files {
        if !file.generate {
            continue;
        }
        for message in &file.messages {
            plan_message_tree(message, &table, set, &mut plans)?;
        }
    }
    Ok(PlanSet { plans })
}

fn plan_message_tree(
    message: &model::Message,
    table: &unwrap::UnwrapTable,
    set: &SchemaSet,
    plans: &mut BTreeMap<String, ShapePlan>,
) -> Result<(), Error> {
    plans.insert(
        message.full_name.clone(),
        ShapePlan::build(message, table, set)?,
    );
    for nested in &message.nested {
        plan_message_tree(nested, table, set, plans)?;
    }
    Ok(())
}
