//! Ego-centric placement: one root model and its direct partners on a ring.

use serde::Deserialize;
use tracing::warn;

use crate::relation::Relation;
use crate::schema::{Model, ModelRegistry};

use super::types::{Position, Positions};
use super::LayoutStrategy;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AngularConfig {
    /// Ring radius before any partner is counted.
    pub base_radius: f64,
    /// Extra radius per related model.
    pub radius_step: f64,
    /// Upper bound on the angle between two partners, in degrees.
    pub max_angle_step: f64,
    /// Angle of the first partner, in degrees.
    pub start_angle: f64,
    /// Above this many partners the ring is stretched per angular band.
    pub stretch_threshold: usize,
}

impl Default for AngularConfig {
    fn default() -> Self {
        Self {
            base_radius: 300.0,
            radius_step: 60.0,
            max_angle_step: 60.0,
            start_angle: -60.0,
            stretch_threshold: 6,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AngularLayout {
    pub config: AngularConfig,
}

impl AngularLayout {
    pub fn new(config: AngularConfig) -> Self {
        Self { config }
    }

    fn angle_step(&self, related: usize) -> f64 {
        if related == 0 {
            return self.config.max_angle_step;
        }
        self.config
            .max_angle_step
            .min((360.0 / related as f64).floor())
    }
}

impl LayoutStrategy for AngularLayout {
    fn layout(
        &self,
        registry: &ModelRegistry,
        relations: &[Relation],
        root: Option<&str>,
    ) -> Positions {
        let mut positions = Positions::default();
        let Some(root) = resolve_root(registry, root) else {
            return positions;
        };

        let ring = partners(&root.name, relations);
        let related = ring.len();
        let radius = self.config.base_radius + self.config.radius_step * related as f64;
        let step = self.angle_step(related);
        let stretched = related > self.config.stretch_threshold;

        // The root's own self-relation keeps its slot, leaving a gap on the
        // ring.
        for (i, neighbor) in ring.iter().enumerate() {
            if *neighbor == root.name {
                continue;
            }
            let angle = self.config.start_angle + i as f64 * step;
            let (sx, sy) = if stretched { stretch(angle) } else { (1.0, 1.0) };
            positions.insert(
                neighbor,
                Position::new(radius * cos_deg(angle) * sx, radius * sin_deg(angle) * sy),
            );
        }

        positions.insert(&root.name, Position::ORIGIN);
        positions
    }
}

/// Models sharing a relation with `root`, in first-seen order. A
/// self-relation lists the root itself.
fn partners<'a>(root: &str, relations: &'a [Relation]) -> Vec<&'a str> {
    let mut partners: Vec<&str> = Vec::new();
    for relation in relations.iter().filter(|r| r.touches(root)) {
        let [a, b] = &relation.between;
        let other = if a == root { b } else { a };
        if !partners.contains(&other.as_str()) {
            partners.push(other);
        }
    }
    partners
}

/// The requested root, or the first model when it is absent or unknown.
pub fn resolve_root<'a>(registry: &'a ModelRegistry, root: Option<&str>) -> Option<&'a Model> {
    if let Some(name) = root {
        if let Some(model) = registry.get(name) {
            return Some(model);
        }
        warn!(root = %name, "unknown layout root, using the first model");
    }
    registry.models().next()
}

/// Cosine of an angle in degrees, rounded to 3 decimals.
pub fn cos_deg(deg: f64) -> f64 {
    (deg.to_radians().cos() * 1000.0).round() / 1000.0
}

/// Sine of an angle in degrees, rounded to 3 decimals.
pub fn sin_deg(deg: f64) -> f64 {
    (deg.to_radians().sin() * 1000.0).round() / 1000.0
}

/// x/y stretch factors for crowded rings, by angular band.
fn stretch(angle: f64) -> (f64, f64) {
    let x = if (angle > -30.0 && angle < 60.0) || angle > 180.0 {
        1.8
    } else if angle > 30.0 && angle < 90.0 {
        4.0
    } else if angle > 90.0 && angle < 120.0 {
        -4.0
    } else {
        1.0
    };
    let y = if angle > -30.0 && angle < 0.0 {
        3.0
    } else if angle > 0.0 && angle < 30.0 {
        0.0
    } else if angle > 30.0 && angle < 60.0 {
        0.8
    } else if angle > 180.0 {
        1.2
    } else {
        1.0
    };
    (x, y)
}
