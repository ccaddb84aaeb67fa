//! Render-time handle anchors on model fields.
//!
//! A field gets at most one handle per role: a source handle on each side
//! and one target handle. The first edge through a field creates it, later
//! edges through the same field and side reuse it.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handle {
    pub id: String,
    pub position: Side,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldHandles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_left: Option<Handle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_right: Option<Handle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Handle>,
}

impl FieldHandles {
    pub fn is_empty(&self) -> bool {
        self.source_left.is_none() && self.source_right.is_none() && self.target.is_none()
    }
}

/// Source of fresh handle identifiers.
pub trait HandleIdSource {
    fn next_id(&mut self) -> String;
}

impl<F: FnMut() -> String> HandleIdSource for F {
    fn next_id(&mut self) -> String {
        self()
    }
}

/// Deterministic counter: `h0`, `h1`, ...
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("h")
    }
}

impl HandleIdSource for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

pub struct HandleAssigner<S> {
    ids: S,
    handles: HashMap<(String, String), FieldHandles>,
}

impl<S: HandleIdSource> HandleAssigner<S> {
    pub fn new(ids: S) -> Self {
        Self {
            ids,
            handles: HashMap::new(),
        }
    }

    fn slot(&mut self, model: &str, field: &str) -> &mut FieldHandles {
        self.handles
            .entry((model.to_string(), field.to_string()))
            .or_default()
    }

    /// Source handle on `side` of `model.field`.
    pub fn source(&mut self, model: &str, field: &str, side: Side) -> String {
        let existing = {
            let slot = self.slot(model, field);
            match side {
                Side::Left => slot.source_left.as_ref(),
                Side::Right => slot.source_right.as_ref(),
            }
            .map(|h| h.id.clone())
        };
        if let Some(id) = existing {
            return id;
        }

        let id = self.ids.next_id();
        let handle = Some(Handle {
            id: id.clone(),
            position: side,
        });
        let slot = self.slot(model, field);
        match side {
            Side::Left => slot.source_left = handle,
            Side::Right => slot.source_right = handle,
        }
        id
    }

    /// Target handle of `model.field`; `side` only applies when it is created.
    pub fn target(&mut self, model: &str, field: &str, side: Side) -> String {
        if let Some(handle) = &self.slot(model, field).target {
            return handle.id.clone();
        }
        let id = self.ids.next_id();
        self.slot(model, field).target = Some(Handle {
            id: id.clone(),
            position: side,
        });
        id
    }

    pub fn handles(&self, model: &str, field: &str) -> Option<&FieldHandles> {
        self.handles.get(&(model.to_string(), field.to_string()))
    }
}
