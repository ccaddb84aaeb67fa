pub mod ast;
pub mod ir;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod relation;
pub mod schema;

use serde::Deserialize;
use tracing::debug;
use wasm_bindgen::prelude::*;

pub use ir::GraphIR;
pub use layout::{AngularConfig, ForceConfig, LayoutEngine, Position, SequentialIds, Strategy};
pub use parser::ParseError;
pub use relation::{Relation, RelationError, RelationKind, infer_relations};
pub use schema::{Field, Model, ModelRegistry, parse_schema};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed schema: {0}")]
    Malformed(#[from] ParseError),
    #[error("Invalid schema: {0}")]
    Invalid(#[from] RelationError),
}

/// Knobs for [`build_graph`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphOptions {
    pub strategy: Strategy,
    /// Focus model of the angular layout.
    pub root: Option<String>,
    pub force: ForceConfig,
    pub angular: AngularConfig,
}

/// Parse, infer relations, lay out and project in one go.
pub fn build_graph(source: &str, options: &GraphOptions) -> Result<GraphIR, Error> {
    let mut registry = parse_schema(source)?;
    let relations = infer_relations(&mut registry)?;

    let engine = LayoutEngine::new(options.force.clone(), options.angular.clone());
    let root = options.root.as_deref();
    let positions = engine.layout(options.strategy, &registry, &relations, root);

    // Angular views only draw edges of the model in focus.
    let focus = match options.strategy {
        Strategy::Angular => layout::resolve_root(&registry, root).map(|m| m.name.as_str()),
        Strategy::Force => None,
    };

    let graph = GraphIR::from_layout(
        &registry,
        &relations,
        &positions,
        focus,
        SequentialIds::default(),
    );
    debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "graph built"
    );
    Ok(graph)
}

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Turn Prisma schema source into the renderer's node/edge JSON
#[wasm_bindgen(js_name = "prismaToGraph")]
pub fn prisma_to_graph(
    source: &str,
    root: Option<String>,
    strategy: Option<String>,
) -> Result<String, String> {
    let strategy = match strategy.as_deref() {
        Some(s) => Strategy::from_str(s).ok_or_else(|| format!("Unknown layout strategy: {s}"))?,
        None => Strategy::default(),
    };
    let options = GraphOptions {
        strategy,
        root,
        ..GraphOptions::default()
    };

    let graph = build_graph(source, &options).map_err(|e| e.to_string())?;
    serde_json::to_string(&graph).map_err(|e| e.to_string())
}
