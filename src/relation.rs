//! Relation inference over a model registry.
//!
//! Every field of every model is visited once. A field typed as its own
//! model is a self-relation, a field typed as another model is matched
//! against that model's back-pointing fields, anything else is a scalar.
//! Each logical relation is emitted once, keyed by a canonical id that does
//! not depend on which side was visited first.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::schema::{Field, Model, ModelRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    OneOne,
    OneMany,
    ManyManyImplicit,
    SelfOneOne,
    SelfOneMany,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneOne => "one-one",
            Self::OneMany => "one-many",
            Self::ManyManyImplicit => "many-many-implicit",
            Self::SelfOneOne => "self-one-one",
            Self::SelfOneMany => "self-one-many",
        }
    }

    pub fn is_self(&self) -> bool {
        matches!(self, Self::SelfOneOne | Self::SelfOneMany)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub model_name: String,
    pub field_name: String,
}

impl Endpoint {
    fn new(model: &str, field: &str) -> Self {
        Self {
            model_name: model.to_string(),
            field_name: field.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RelationKind,
    pub between: [String; 2],
    pub name: Option<String>,
    /// The "one" side.
    pub from: Endpoint,
    /// The "many" or owning side.
    pub to: Endpoint,
}

impl Relation {
    pub fn is_self(&self) -> bool {
        self.between[0] == self.between[1]
    }

    pub fn touches(&self, model: &str) -> bool {
        self.between.iter().any(|m| m == model)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    #[error("Self-relation field '{model}.{field}' needs a relation name")]
    UnnamedSelfRelation { model: String, field: String },
    #[error("Self-relation \"{name}\" on model '{model}' has no field paired with '{field}'")]
    MissingPair {
        model: String,
        field: String,
        name: String,
    },
    #[error(
        "Self-relation \"{name}\" on model '{model}' pairs '{first}' and '{second}' with an unsupported cardinality"
    )]
    AmbiguousCardinality {
        model: String,
        name: String,
        first: String,
        second: String,
    },
    #[error("Self-relation \"{name}\" on model '{model}' declares no fields/references mapping")]
    MissingKeys { model: String, name: String },
}

const SCALAR_TYPES: &[&str] = &[
    "String",
    "Boolean",
    "Int",
    "BigInt",
    "Float",
    "Decimal",
    "DateTime",
    "Json",
    "Bytes",
    "Unsupported",
];

/// Canonical, order-independent relation id.
pub fn relation_id(models: [&str; 2], fields: [&str; 2]) -> String {
    let mut models = models;
    let mut fields = fields;
    models.sort_unstable();
    fields.sort_unstable();
    format!("{}-{}-{}-{}", models[0], models[1], fields[0], fields[1])
}

/// Infer every relation of the registry and attach `related_to` /
/// `relations` to the models involved.
///
/// Models are only annotated once the whole pass has succeeded.
pub fn infer_relations(registry: &mut ModelRegistry) -> Result<Vec<Relation>, RelationError> {
    let relations = collect_relations(registry)?;

    for relation in &relations {
        let [a, b] = &relation.between;
        if let Some(model) = registry.get_mut(a) {
            model.link(b, &relation.id);
        }
        if a != b {
            if let Some(model) = registry.get_mut(b) {
                model.link(a, &relation.id);
            }
        }
    }

    debug!(relations = relations.len(), "inferred relations");
    Ok(relations)
}

fn collect_relations(registry: &ModelRegistry) -> Result<Vec<Relation>, RelationError> {
    let mut relations = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for model in registry.models() {
        for field in &model.fields {
            let relation = if field.d_type == model.name {
                Some(self_relation(model, field)?)
            } else if let Some(target) = registry.get(&field.d_type) {
                cross_relation(model, field, target)
            } else {
                if !SCALAR_TYPES.contains(&field.d_type.as_str()) {
                    debug!(
                        model = %model.name,
                        field = %field.name,
                        d_type = %field.d_type,
                        "field type is not a known model"
                    );
                }
                None
            };

            if let Some(relation) = relation {
                if seen.insert(relation.id.clone()) {
                    relations.push(relation);
                }
            }
        }
    }

    Ok(relations)
}

fn self_relation(model: &Model, field: &Field) -> Result<Relation, RelationError> {
    let name = field
        .relation_name()
        .ok_or_else(|| RelationError::UnnamedSelfRelation {
            model: model.name.clone(),
            field: field.name.clone(),
        })?;

    let pair = model
        .fields
        .iter()
        .find(|f| f.name != field.name && f.d_type == model.name && f.relation_name() == Some(name))
        .ok_or_else(|| RelationError::MissingPair {
            model: model.name.clone(),
            field: field.name.clone(),
            name: name.to_string(),
        })?;

    let kind = if field.optional && pair.optional {
        RelationKind::SelfOneOne
    } else if (field.optional && pair.iterable) || (field.iterable && pair.optional) {
        RelationKind::SelfOneMany
    } else {
        return Err(RelationError::AmbiguousCardinality {
            model: model.name.clone(),
            name: name.to_string(),
            first: field.name.clone(),
            second: pair.name.clone(),
        });
    };

    let mapping = |f: &Field| f.relation.as_ref().map(|r| (r.referenced_key(), r.foreign_key()));
    let (field_refs, field_fk) = mapping(field).unwrap_or_default();
    let (pair_refs, pair_fk) = mapping(pair).unwrap_or_default();

    let (Some(references), Some(foreign_key)) = (field_refs.or(pair_refs), field_fk.or(pair_fk))
    else {
        return Err(RelationError::MissingKeys {
            model: model.name.clone(),
            name: name.to_string(),
        });
    };

    Ok(Relation {
        id: relation_id([&model.name, &model.name], [&references, &foreign_key]),
        kind,
        between: [model.name.clone(), model.name.clone()],
        name: Some(name.to_string()),
        from: Endpoint::new(&model.name, &references),
        to: Endpoint::new(&model.name, &foreign_key),
    })
}

fn cross_relation(model: &Model, field: &Field, target: &Model) -> Option<Relation> {
    let name = field.relation_name();
    let back_fields: Vec<&Field> = target
        .fields
        .iter()
        .filter(|f| f.d_type == model.name && f.relation_name() == name)
        .collect();

    let keys = field
        .relation
        .as_ref()
        .and_then(|r| Some((r.foreign_key()?, r.referenced_key()?)));

    if let Some((foreign_key, references)) = keys {
        let kind = if back_fields.iter().any(|f| !f.iterable) {
            RelationKind::OneOne
        } else if back_fields.iter().any(|f| f.iterable) {
            RelationKind::OneMany
        } else {
            debug!(
                model = %model.name,
                field = %field.name,
                target = %target.name,
                "relation has no back-relation field"
            );
            return None;
        };

        return Some(Relation {
            id: relation_id([&target.name, &model.name], [&foreign_key, &references]),
            kind,
            between: [target.name.clone(), model.name.clone()],
            name: name.map(str::to_string),
            from: Endpoint::new(&target.name, &references),
            to: Endpoint::new(&model.name, &foreign_key),
        });
    }

    if !field.iterable {
        return None;
    }

    let back = back_fields.into_iter().find(|f| f.iterable)?;
    Some(Relation {
        id: relation_id([&target.name, &model.name], [&field.name, &back.name]),
        kind: RelationKind::ManyManyImplicit,
        between: [target.name.clone(), model.name.clone()],
        name: name.map(str::to_string),
        from: Endpoint::new(&target.name, &back.name),
        to: Endpoint::new(&model.name, &field.name),
    })
}
