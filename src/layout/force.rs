//! Force-directed placement of the whole graph.
//!
//! A small velocity-Verlet style relaxation: link springs, pairwise
//! many-body repulsion and re-centering, run for a fixed number of ticks
//! with a decaying alpha. Initial placement comes from a seeded PRNG, so the
//! same seed and input always settle on the same positions.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::debug;

use crate::relation::Relation;
use crate::schema::ModelRegistry;

use super::types::{Position, Positions};
use super::LayoutStrategy;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceConfig {
    pub iterations: usize,
    /// Rest length of every link.
    pub link_distance: f64,
    /// Many-body strength; negative repels.
    pub charge_strength: f64,
    /// Point the graph's centroid is pinned to.
    pub center: Position,
    pub seed: u64,
    pub alpha_min: f64,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            iterations: 300,
            link_distance: 100.0,
            charge_strength: -500.0,
            center: Position::new(400.0, 300.0),
            seed: 0x5eed,
            alpha_min: 0.001,
            velocity_decay: 0.4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForceLayout {
    pub config: ForceConfig,
}

#[derive(Debug, Clone, Copy)]
struct Body {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

impl ForceLayout {
    pub fn new(config: ForceConfig) -> Self {
        Self { config }
    }

    fn initial_bodies(&self, count: usize, rng: &mut StdRng) -> Vec<Body> {
        let spread = self.config.link_distance * (count.max(1) as f64).sqrt();
        (0..count)
            .map(|_| Body {
                x: self.config.center.x + (rng.random::<f64>() - 0.5) * spread,
                y: self.config.center.y + (rng.random::<f64>() - 0.5) * spread,
                vx: 0.0,
                vy: 0.0,
            })
            .collect()
    }

    fn apply_links(&self, bodies: &mut [Body], links: &[Link], alpha: f64, rng: &mut StdRng) {
        for link in links {
            let (s, t) = (bodies[link.source], bodies[link.target]);
            let mut dx = t.x + t.vx - s.x - s.vx;
            let mut dy = t.y + t.vy - s.y - s.vy;
            if dx == 0.0 {
                dx = jiggle(rng);
            }
            if dy == 0.0 {
                dy = jiggle(rng);
            }
            let len = (dx * dx + dy * dy).sqrt();
            let k = (len - self.config.link_distance) / len * alpha * link.strength;
            dx *= k;
            dy *= k;

            let target = &mut bodies[link.target];
            target.vx -= dx * link.bias;
            target.vy -= dy * link.bias;
            let source = &mut bodies[link.source];
            source.vx += dx * (1.0 - link.bias);
            source.vy += dy * (1.0 - link.bias);
        }
    }

    fn apply_charge(&self, bodies: &mut [Body], alpha: f64, rng: &mut StdRng) {
        const DISTANCE_MIN2: f64 = 1.0;

        for i in 0..bodies.len() {
            let (mut ax, mut ay) = (0.0, 0.0);
            for j in 0..bodies.len() {
                if i == j {
                    continue;
                }
                let mut dx = bodies[j].x - bodies[i].x;
                let mut dy = bodies[j].y - bodies[i].y;
                if dx == 0.0 {
                    dx = jiggle(rng);
                }
                if dy == 0.0 {
                    dy = jiggle(rng);
                }
                let mut l2 = dx * dx + dy * dy;
                if l2 < DISTANCE_MIN2 {
                    l2 = (DISTANCE_MIN2 * l2).sqrt();
                }
                let w = self.config.charge_strength * alpha / l2;
                ax += dx * w;
                ay += dy * w;
            }
            bodies[i].vx += ax;
            bodies[i].vy += ay;
        }
    }

    fn apply_center(&self, bodies: &mut [Body]) {
        if bodies.is_empty() {
            return;
        }
        let n = bodies.len() as f64;
        let mx = bodies.iter().map(|b| b.x).sum::<f64>() / n - self.config.center.x;
        let my = bodies.iter().map(|b| b.y).sum::<f64>() / n - self.config.center.y;
        for body in bodies.iter_mut() {
            body.x -= mx;
            body.y -= my;
        }
    }
}

fn jiggle(rng: &mut StdRng) -> f64 {
    (rng.random::<f64>() - 0.5) * 1e-6
}

/// One link per non-self relation. A self-relation exerts no pull but still
/// counts twice toward its model's degree.
fn build_links(names: &[&str], relations: &[Relation]) -> Vec<Link> {
    let index: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let pairs: Vec<(usize, usize)> = relations
        .iter()
        .filter_map(|r| {
            let source = *index.get(r.from.model_name.as_str())?;
            let target = *index.get(r.to.model_name.as_str())?;
            Some((source, target))
        })
        .collect();

    let mut degree = vec![0usize; names.len()];
    for &(s, t) in &pairs {
        degree[s] += 1;
        degree[t] += 1;
    }

    pairs
        .into_iter()
        .filter(|(source, target)| source != target)
        .map(|(source, target)| {
            let (ds, dt) = (degree[source] as f64, degree[target] as f64);
            Link {
                source,
                target,
                strength: 1.0 / ds.min(dt),
                bias: ds / (ds + dt),
            }
        })
        .collect()
}

impl LayoutStrategy for ForceLayout {
    fn layout(
        &self,
        registry: &ModelRegistry,
        relations: &[Relation],
        _root: Option<&str>,
    ) -> Positions {
        let names: Vec<&str> = registry.models().map(|m| m.name.as_str()).collect();
        let links = build_links(&names, relations);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut bodies = self.initial_bodies(names.len(), &mut rng);

        let iterations = self.config.iterations.max(1) as f64;
        let alpha_decay = 1.0 - self.config.alpha_min.powf(1.0 / iterations);
        let mut alpha = 1.0;

        for _ in 0..self.config.iterations {
            alpha -= alpha * alpha_decay;

            self.apply_links(&mut bodies, &links, alpha, &mut rng);
            self.apply_charge(&mut bodies, alpha, &mut rng);

            for body in bodies.iter_mut() {
                body.vx *= 1.0 - self.config.velocity_decay;
                body.vy *= 1.0 - self.config.velocity_decay;
                body.x += body.vx;
                body.y += body.vy;
            }
            self.apply_center(&mut bodies);
        }

        debug!(
            nodes = bodies.len(),
            links = links.len(),
            alpha,
            "force simulation settled"
        );

        let mut positions = Positions::default();
        for (name, body) in names.iter().zip(&bodies) {
            positions.insert(name, Position::new(body.x, body.y));
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::infer_relations;
    use crate::schema::parse_schema;

    const SHOP: &str = r#"
        model Customer {
            id     Int     @id
            orders Order[]
        }
        model Order {
            id         Int        @id
            customerId Int
            customer   Customer   @relation(fields: [customerId], references: [id])
            lines      LineItem[]
        }
        model LineItem {
            id      Int   @id
            orderId Int
            order   Order @relation(fields: [orderId], references: [id])
        }
        model Setting {
            key String @id
        }
    "#;

    fn setup() -> (ModelRegistry, Vec<Relation>) {
        let mut registry = parse_schema(SHOP).unwrap();
        let relations = infer_relations(&mut registry).unwrap();
        (registry, relations)
    }

    fn distance(a: Position, b: Position) -> f64 {
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let (registry, relations) = setup();
        let layout = ForceLayout::default();
        let first = layout.layout(&registry, &relations, None);
        let second = layout.layout(&registry, &relations, None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_seed_moves_nodes() {
        let (registry, relations) = setup();
        let a = ForceLayout::default().layout(&registry, &relations, None);
        let b = ForceLayout::new(ForceConfig {
            seed: 7,
            ..ForceConfig::default()
        })
        .layout(&registry, &relations, None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_every_model_is_placed() {
        let (registry, relations) = setup();
        let positions = ForceLayout::default().layout(&registry, &relations, None);
        assert_eq!(positions.len(), 4);
        let names: Vec<&str> = positions.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Customer", "Order", "LineItem", "Setting"]);
        assert!(positions.iter().all(|(_, p)| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn test_centroid_is_centered() {
        let (registry, relations) = setup();
        let config = ForceConfig::default();
        let positions = ForceLayout::new(config.clone()).layout(&registry, &relations, None);
        let n = positions.len() as f64;
        let cx = positions.iter().map(|(_, p)| p.x).sum::<f64>() / n;
        let cy = positions.iter().map(|(_, p)| p.y).sum::<f64>() / n;
        assert!((cx - config.center.x).abs() < 1e-6);
        assert!((cy - config.center.y).abs() < 1e-6);
    }

    #[test]
    fn test_linked_models_stay_closer_than_strangers() {
        let (registry, relations) = setup();
        let positions = ForceLayout::default().layout(&registry, &relations, None);
        let order = positions.get("Order").unwrap();
        let line = positions.get("LineItem").unwrap();
        let customer = positions.get("Customer").unwrap();
        assert!(distance(order, line) < distance(customer, line));
    }

    #[test]
    fn test_empty_registry() {
        let registry = ModelRegistry::default();
        let positions = ForceLayout::default().layout(&registry, &[], None);
        assert!(positions.is_empty());
    }

    #[test]
    fn test_self_relation_counts_toward_degree() {
        let mut registry = parse_schema(
            r#"
            model Employee {
                id        Int        @id
                managerId Int?
                manager   Employee?  @relation("Reports", fields: [managerId], references: [id])
                reports   Employee[] @relation("Reports")
                desks     Desk[]
            }
            model Desk {
                id      Int      @id
                ownerId Int
                owner   Employee @relation(fields: [ownerId], references: [id])
            }
            "#,
        )
        .unwrap();
        let relations = infer_relations(&mut registry).unwrap();
        assert_eq!(relations.len(), 2);

        let links = build_links(&["Employee", "Desk"], &relations);
        assert_eq!(links.len(), 1);
        // Employee has degree 3 (self twice, Desk once), Desk has degree 1.
        let link = links[0];
        assert_eq!((link.source, link.target), (0, 1));
        assert_eq!(link.strength, 1.0);
        assert_eq!(link.bias, 0.75);
    }

    #[test]
    fn test_link_strength_and_bias() {
        let (registry, relations) = setup();
        let names: Vec<&str> = registry.models().map(|m| m.name.as_str()).collect();
        let links = build_links(&names, &relations);
        assert_eq!(links.len(), 2);
        // Customer(1) -> Order(2): strength 1/min(1, 2), bias 1/3.
        let first = links[0];
        assert_eq!((first.source, first.target), (0, 1));
        assert_eq!(first.strength, 1.0);
        assert!((first.bias - 1.0 / 3.0).abs() < 1e-12);
    }
}
