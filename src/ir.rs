use serde::Serialize;

use crate::layout::{FieldHandles, HandleAssigner, HandleIdSource, Position, Positions, Side};
use crate::relation::{Relation, RelationKind};
use crate::schema::{Field, ModelRegistry};

/// Graph handed to the renderer: positioned models and the edges between
/// them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphIR {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub position: Position,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeData {
    pub name: String,
    pub fields: Vec<FieldIR>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldIR {
    pub name: String,
    pub d_type: String,
    pub optional: bool,
    pub iterable: bool,
    pub is_foreign_key: bool,
    pub is_primary_key: bool,
    #[serde(skip_serializing_if = "FieldHandles::is_empty")]
    pub handle: FieldHandles,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_handle: String,
    pub target_handle: String,
    pub data: RelationKind,
}

impl GraphIR {
    /// Project positioned models and their relations.
    ///
    /// Only models present in `positions` become nodes, in placement order.
    /// A relation becomes an edge when both ends are placed and, with a
    /// `focus` model, when it touches that model.
    pub fn from_layout<S: HandleIdSource>(
        registry: &ModelRegistry,
        relations: &[Relation],
        positions: &Positions,
        focus: Option<&str>,
        ids: S,
    ) -> Self {
        let mut handles = HandleAssigner::new(ids);

        let edges: Vec<Edge> = relations
            .iter()
            .filter(|r| focus.is_none_or(|f| r.touches(f)))
            .filter_map(|r| {
                let source = positions.get(&r.from.model_name)?;
                let target = positions.get(&r.to.model_name)?;

                let (source_side, target_side) = if r.is_self() {
                    (Side::Right, Side::Right)
                } else if target.x >= source.x {
                    (Side::Right, Side::Left)
                } else {
                    (Side::Left, Side::Right)
                };

                let source_handle =
                    handles.source(&r.from.model_name, &r.from.field_name, source_side);
                let target_handle = handles.target(&r.to.model_name, &r.to.field_name, target_side);

                Some(Edge {
                    id: r.id.clone(),
                    source: r.from.model_name.clone(),
                    target: r.to.model_name.clone(),
                    source_handle,
                    target_handle,
                    data: r.kind,
                })
            })
            .collect();

        let nodes = positions
            .iter()
            .filter_map(|(name, position)| {
                let model = registry.get(name)?;
                let fields = model
                    .fields
                    .iter()
                    .map(|f| FieldIR::new(f, handles.handles(name, &f.name)))
                    .collect();
                Some(Node {
                    id: model.name.clone(),
                    position,
                    data: NodeData {
                        name: model.name.clone(),
                        fields,
                    },
                })
            })
            .collect();

        GraphIR { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

impl FieldIR {
    fn new(field: &Field, handle: Option<&FieldHandles>) -> Self {
        Self {
            name: field.name.clone(),
            d_type: field.d_type.clone(),
            optional: field.optional,
            iterable: field.iterable,
            is_foreign_key: field.is_foreign_key,
            is_primary_key: field.is_primary_key,
            handle: handle.cloned().unwrap_or_default(),
        }
    }
}

impl NodeData {
    pub fn field(&self, name: &str) -> Option<&FieldIR> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutEngine, SequentialIds, Strategy};
    use crate::relation::infer_relations;
    use crate::schema::parse_schema;

    const BLOG: &str = r#"
        model User {
            id      Int      @id
            posts   Post[]
            profile Profile?
        }
        model Post {
            id       Int    @id
            authorId Int
            author   User   @relation(fields: [authorId], references: [id])
            editorId Int?
            editor   User?  @relation("Edited", fields: [editorId], references: [id])
        }
        model Profile {
            id     Int  @id
            userId Int  @unique
            user   User @relation(fields: [userId], references: [id])
        }
        model Log {
            id Int @id
        }
    "#;

    fn graph(strategy: Strategy, root: Option<&str>) -> GraphIR {
        let mut registry = parse_schema(BLOG).unwrap();
        let relations = infer_relations(&mut registry).unwrap();
        let positions = LayoutEngine::default().layout(strategy, &registry, &relations, root);
        let focus = match strategy {
            Strategy::Angular => root,
            Strategy::Force => None,
        };
        GraphIR::from_layout(&registry, &relations, &positions, focus, SequentialIds::default())
    }

    #[test]
    fn test_angular_nodes_and_edges() {
        let ir = graph(Strategy::Angular, Some("Post"));
        let ids: Vec<&str> = ir.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["User", "Post"]);
        assert_eq!(ir.node("Post").unwrap().position, Position::ORIGIN);
        assert_eq!(ir.edges.len(), 1);

        let edge = &ir.edges[0];
        assert_eq!(edge.source, "User");
        assert_eq!(edge.target, "Post");
        assert_eq!(edge.data, RelationKind::OneMany);
        assert_eq!(edge.id, "Post-User-authorId-id");
    }

    #[test]
    fn test_unmatched_named_relation_is_not_drawn() {
        // `editor` has no "Edited" back-relation on User.
        let ir = graph(Strategy::Force, None);
        assert!(ir.edges.iter().all(|e| !e.id.contains("editorId")));
    }

    #[test]
    fn test_handles_attached_to_fields() {
        let ir = graph(Strategy::Angular, Some("User"));
        assert_eq!(ir.edges.len(), 2);

        let user = ir.node("User").unwrap();
        let id = user.data.field("id").unwrap();
        // User sits at the origin and both partners lie to its right.
        let right = id.handle.source_right.as_ref().unwrap();
        assert_eq!(ir.edges[0].source_handle, right.id);
        assert_eq!(ir.edges[1].source_handle, right.id);
        assert!(id.handle.source_left.is_none());

        let post = ir.node("Post").unwrap();
        let author_id = post.data.field("authorId").unwrap();
        let target = author_id.handle.target.as_ref().unwrap();
        assert_eq!(target.position, Side::Left);
        assert_eq!(ir.edges[0].target_handle, target.id);

        assert!(user.data.field("posts").unwrap().handle.is_empty());
    }

    #[test]
    fn test_force_graph_covers_all_models() {
        let ir = graph(Strategy::Force, None);
        assert_eq!(ir.nodes.len(), 4);
        assert_eq!(ir.edges.len(), 2);
        assert!(ir.node("Log").unwrap().data.fields[0].handle.is_empty());
    }

    #[test]
    fn test_json_contract() {
        let ir = graph(Strategy::Angular, Some("Post"));
        let json = serde_json::to_value(&ir).unwrap();

        let node = &json["nodes"][1];
        assert_eq!(node["id"], "Post");
        assert_eq!(node["position"]["x"], 0.0);
        assert_eq!(node["data"]["name"], "Post");
        let author_id = &node["data"]["fields"][1];
        assert_eq!(author_id["name"], "authorId");
        assert_eq!(author_id["dType"], "Int");
        assert_eq!(author_id["isForeignKey"], true);
        assert_eq!(author_id["handle"]["target"]["id"], "h1");

        let edge = &json["edges"][0];
        assert_eq!(edge["source"], "User");
        assert_eq!(edge["sourceHandle"], "h0");
        assert_eq!(edge["targetHandle"], "h1");
        assert_eq!(edge["data"], "one-many");
    }
}
