mod anchors;
mod angular;
mod force;
mod types;

pub use anchors::{FieldHandles, Handle, HandleAssigner, HandleIdSource, SequentialIds, Side};
pub use angular::{AngularConfig, AngularLayout, cos_deg, resolve_root, sin_deg};
pub use force::{ForceConfig, ForceLayout};
pub use types::{Position, Positions};

use serde::Deserialize;
use tracing::debug;

use crate::relation::Relation;
use crate::schema::ModelRegistry;

/// A way of assigning a position to models.
pub trait LayoutStrategy {
    fn layout(
        &self,
        registry: &ModelRegistry,
        relations: &[Relation],
        root: Option<&str>,
    ) -> Positions;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Whole graph, force-directed.
    #[default]
    Force,
    /// One root model and its direct partners.
    Angular,
}

impl Strategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "force" => Some(Self::Force),
            "angular" => Some(Self::Angular),
            _ => None,
        }
    }
}

/// Layout configuration for both strategies.
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    pub force: ForceLayout,
    pub angular: AngularLayout,
}

impl LayoutEngine {
    pub fn new(force: ForceConfig, angular: AngularConfig) -> Self {
        Self {
            force: ForceLayout::new(force),
            angular: AngularLayout::new(angular),
        }
    }

    pub fn layout(
        &self,
        strategy: Strategy,
        registry: &ModelRegistry,
        relations: &[Relation],
        root: Option<&str>,
    ) -> Positions {
        let positions = match strategy {
            Strategy::Force => self.force.layout(registry, relations, root),
            Strategy::Angular => self.angular.layout(registry, relations, root),
        };
        debug!(?strategy, placed = positions.len(), "layout computed");
        positions
    }
}
