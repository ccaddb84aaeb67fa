//! Data structures for layout computation.

use serde::{Deserialize, Serialize};

/// A point on the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Model name -> position, in placement order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Positions {
    entries: Vec<(String, Position)>,
}

impl Positions {
    /// Insert or move a model.
    pub fn insert(&mut self, model: &str, position: Position) {
        match self.entries.iter_mut().find(|(name, _)| name == model) {
            Some((_, slot)) => *slot = position,
            None => self.entries.push((model.to_string(), position)),
        }
    }

    pub fn get(&self, model: &str) -> Option<Position> {
        self.entries
            .iter()
            .find(|(name, _)| name == model)
            .map(|(_, p)| *p)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.get(model).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Position)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
