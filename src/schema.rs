//! Model registry assembled from the parsed document.
//!
//! Models live in one arena indexed by name. Relations reference models and
//! fields by name only, so nothing here holds a pointer into another model.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::ast::{Attribute, Block, Document, Expr, FieldDecl, Member, ModelBlock, TypeModifier};
use crate::parser::{ParseError, Parser};

/// Parsed `@relation(...)` arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationAnnotation {
    pub name: Option<String>,
    /// Scalar fields on this model holding the key (`fields: [...]`).
    pub fields: Vec<String>,
    /// Fields on the other model they point at (`references: [...]`).
    pub references: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
    pub map: Option<String>,
}

impl RelationAnnotation {
    fn from_attribute(attr: &Attribute) -> Self {
        let name = attr
            .named("name")
            .or_else(|| attr.positional(0))
            .and_then(Expr::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            name,
            fields: attr.named("fields").map(Expr::ident_list).unwrap_or_default(),
            references: attr
                .named("references")
                .map(Expr::ident_list)
                .unwrap_or_default(),
            on_delete: attr.named("onDelete").and_then(Expr::as_ident).map(str::to_string),
            on_update: attr.named("onUpdate").and_then(Expr::as_ident).map(str::to_string),
            map: attr.named("map").and_then(Expr::as_str).map(str::to_string),
        }
    }

    /// Key held on the owning side; several fields collapse to `a_b`.
    pub fn foreign_key(&self) -> Option<String> {
        join_key(&self.fields)
    }

    /// Key on the referenced side, collapsed the same way.
    pub fn referenced_key(&self) -> Option<String> {
        join_key(&self.references)
    }
}

fn join_key(names: &[String]) -> Option<String> {
    if names.is_empty() {
        None
    } else {
        Some(names.join("_"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// Bare type name with `?` / `[]` stripped.
    pub d_type: String,
    pub optional: bool,
    pub iterable: bool,
    pub is_foreign_key: bool,
    pub is_primary_key: bool,
    pub attributes: Vec<Attribute>,
    pub relation: Option<RelationAnnotation>,
}

impl Field {
    fn from_decl(decl: &FieldDecl) -> Self {
        let relation = decl
            .attributes
            .iter()
            .find(|a| a.name == "relation")
            .map(RelationAnnotation::from_attribute);

        Self {
            name: decl.name.clone(),
            d_type: decl.typ.name.clone(),
            optional: decl.typ.modifier == TypeModifier::Optional,
            iterable: decl.typ.modifier == TypeModifier::List,
            is_foreign_key: false,
            is_primary_key: false,
            attributes: decl.attributes.clone(),
            relation,
        }
    }

    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    pub fn relation_name(&self) -> Option<&str> {
        self.relation.as_ref()?.name.as_deref()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
    /// Primary key field name, `a_b` for composite ids, empty when none.
    pub primary_key: String,
    pub foreign_keys: Vec<String>,
    pub block_attributes: Vec<Attribute>,
    /// Neighbor model names in the order relations were attached.
    pub related_to: Vec<String>,
    /// Neighbor model name -> ids of the relations shared with it.
    pub relations: Vec<(String, Vec<String>)>,
}

impl Model {
    fn from_block(block: &ModelBlock) -> Result<Self, ParseError> {
        let mut model = Model {
            name: block.name.clone(),
            fields: Vec::new(),
            primary_key: String::new(),
            foreign_keys: Vec::new(),
            block_attributes: Vec::new(),
            related_to: Vec::new(),
            relations: Vec::new(),
        };
        let mut key_fields: Vec<String> = Vec::new();

        for member in &block.members {
            match member {
                Member::Attribute(attr) => {
                    if attr.name == "id" {
                        let parts = attr
                            .named("fields")
                            .or_else(|| attr.positional(0))
                            .map(Expr::ident_list)
                            .unwrap_or_default();
                        if !parts.is_empty() {
                            model.primary_key = parts.join("_");
                            key_fields = parts;
                        }
                    }
                    model.block_attributes.push(attr.clone());
                }
                Member::Field(decl) => {
                    if model.field(&decl.name).is_some() {
                        return Err(ParseError::DuplicateField {
                            model: model.name.clone(),
                            field: decl.name.clone(),
                        });
                    }
                    let field = Field::from_decl(decl);

                    if field.has_attribute("id")
                        || (field.has_attribute("unique") && model.primary_key.is_empty())
                    {
                        model.primary_key = field.name.clone();
                        key_fields = vec![field.name.clone()];
                    }

                    if let Some(relation) = &field.relation {
                        for fk in &relation.fields {
                            if !model.foreign_keys.contains(fk) {
                                model.foreign_keys.push(fk.clone());
                            }
                        }
                    }

                    model.fields.push(field);
                }
            }
        }

        for fk in &model.foreign_keys {
            match model.fields.iter_mut().find(|f| &f.name == fk) {
                Some(field) => field.is_foreign_key = true,
                None => warn!(
                    model = %model.name,
                    field = %fk,
                    "relation names a foreign key field that does not exist"
                ),
            }
        }
        for field in &mut model.fields {
            field.is_primary_key = key_fields.contains(&field.name);
        }

        Ok(model)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Ids of the relations shared with `other`, empty when unrelated.
    pub fn relations_with(&self, other: &str) -> &[String] {
        self.relations
            .iter()
            .find(|(name, _)| name == other)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn link(&mut self, other: &str, relation_id: &str) {
        if !self.related_to.iter().any(|n| n == other) {
            self.related_to.push(other.to_string());
        }
        match self.relations.iter_mut().find(|(name, _)| name == other) {
            Some((_, ids)) => {
                if !ids.iter().any(|id| id == relation_id) {
                    ids.push(relation_id.to_string());
                }
            }
            None => self
                .relations
                .push((other.to_string(), vec![relation_id.to_string()])),
        }
    }
}

/// All models of one schema, in declaration order, indexed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRegistry {
    models: Vec<Model>,
    index: HashMap<String, usize>,
    /// `provider` of the datasource block, when present.
    pub provider: Option<String>,
    /// `relationMode` of the datasource block, when present.
    pub relation_mode: Option<String>,
}

impl ModelRegistry {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let document = Parser::new(source)?.parse()?;
        Self::from_document(&document)
    }

    pub fn from_document(document: &Document) -> Result<Self, ParseError> {
        let mut registry = ModelRegistry::default();

        for block in &document.blocks {
            match block {
                Block::Model(block) => registry.insert(Model::from_block(block)?)?,
                Block::Datasource(ds) => {
                    registry.provider = ds
                        .entry("provider")
                        .and_then(Expr::as_str)
                        .map(str::to_string);
                    registry.relation_mode = ds
                        .entry("relationMode")
                        .and_then(Expr::as_str)
                        .map(str::to_string);
                }
                Block::Other { keyword, name } => {
                    debug!(%keyword, %name, "skipping block");
                }
            }
        }

        debug!(models = registry.len(), "assembled model registry");
        Ok(registry)
    }

    fn insert(&mut self, model: Model) -> Result<(), ParseError> {
        if self.index.contains_key(&model.name) {
            return Err(ParseError::DuplicateModel(model.name));
        }
        self.index.insert(model.name.clone(), self.models.len());
        self.models.push(model);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        self.index.get(name).map(|&i| &self.models[i])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Model> {
        let i = *self.index.get(name)?;
        self.models.get_mut(i)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Same models with the declaration order reversed.
    pub fn reversed(&self) -> Self {
        let models: Vec<Model> = self.models.iter().rev().cloned().collect();
        let index = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();
        Self {
            models,
            index,
            provider: self.provider.clone(),
            relation_mode: self.relation_mode.clone(),
        }
    }
}

/// Parse schema text into a model registry.
pub fn parse_schema(source: &str) -> Result<ModelRegistry, ParseError> {
    ModelRegistry::parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOG: &str = r#"
        // blog schema
        datasource db {
            provider = "postgresql"
            url      = env("DATABASE_URL")
        }

        model User {
            id      Int      @id @default(autoincrement())
            email   String   @unique
            posts   Post[]
            profile Profile?
        }

        /* profile lives apart */
        model Profile {
            id     Int    @id
            userId Int    @unique
            user   User   @relation(fields: [userId], references: [id])
        }

        model Post {
            id       Int    @id
            authorId Int
            author   User   @relation("Written", fields: [authorId], references: [id], onDelete: Cascade)
        }
    "#;

    #[test]
    fn test_registry_order_and_lookup() {
        let registry = parse_schema(BLOG).unwrap();
        let names: Vec<&str> = registry.models().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Profile", "Post"]);
        assert!(registry.contains("Post"));
        assert!(registry.get("Comment").is_none());
        assert_eq!(registry.provider.as_deref(), Some("postgresql"));
        assert_eq!(registry.relation_mode, None);
    }

    #[test]
    fn test_field_modifiers() {
        let registry = parse_schema(BLOG).unwrap();
        let user = registry.get("User").unwrap();

        let posts = user.field("posts").unwrap();
        assert_eq!(posts.d_type, "Post");
        assert!(posts.iterable);
        assert!(!posts.optional);

        let profile = user.field("profile").unwrap();
        assert_eq!(profile.d_type, "Profile");
        assert!(profile.optional);
        assert!(!profile.iterable);
        assert!(!profile.is_relation());
    }

    #[test]
    fn test_primary_key_prefers_id() {
        let registry = parse_schema(BLOG).unwrap();
        let user = registry.get("User").unwrap();
        assert_eq!(user.primary_key, "id");
        assert!(user.field("id").unwrap().is_primary_key);
        assert!(!user.field("email").unwrap().is_primary_key);
    }

    #[test]
    fn test_first_unique_is_primary_key_without_id() {
        let input = r#"
            model Account {
                handle String @unique
                email  String @unique
            }
        "#;
        let registry = parse_schema(input).unwrap();
        assert_eq!(registry.get("Account").unwrap().primary_key, "handle");
    }

    #[test]
    fn test_composite_id() {
        let input = r#"
            model Like {
                postId Int
                userId Int
                @@id([postId, userId])
                @@index([userId])
            }

            model Vote {
                a Int
                b Int
                @@id(fields: [a, b])
            }
        "#;
        let registry = parse_schema(input).unwrap();
        let like = registry.get("Like").unwrap();
        assert_eq!(like.primary_key, "postId_userId");
        assert_eq!(like.block_attributes.len(), 2);
        assert_eq!(like.block_attributes[1].to_string(), "@@index([userId])");
        assert!(like.field("postId").unwrap().is_primary_key);
        assert!(like.field("userId").unwrap().is_primary_key);

        assert_eq!(registry.get("Vote").unwrap().primary_key, "a_b");
    }

    #[test]
    fn test_relation_annotation() {
        let registry = parse_schema(BLOG).unwrap();
        let post = registry.get("Post").unwrap();
        let relation = post.field("author").unwrap().relation.clone().unwrap();

        assert_eq!(relation.name.as_deref(), Some("Written"));
        assert_eq!(relation.fields, vec!["authorId"]);
        assert_eq!(relation.references, vec!["id"]);
        assert_eq!(relation.on_delete.as_deref(), Some("Cascade"));
        assert_eq!(relation.foreign_key().as_deref(), Some("authorId"));
        assert_eq!(relation.referenced_key().as_deref(), Some("id"));
        assert_eq!(relation.on_update, None);
        assert_eq!(relation.map, None);

        let input = r#"
            model Account {
                id     Int  @id
                userId Int
                user   User @relation(fields: [userId], references: [id], onUpdate: Cascade, map: "fk_account_user")
            }
            model User {
                id       Int       @id
                accounts Account[]
            }
        "#;
        let registry = parse_schema(input).unwrap();
        let account = registry.get("Account").unwrap();
        let relation = account.field("user").unwrap().relation.clone().unwrap();
        assert_eq!(relation.name, None);
        assert_eq!(relation.on_delete, None);
        assert_eq!(relation.on_update.as_deref(), Some("Cascade"));
        assert_eq!(relation.map.as_deref(), Some("fk_account_user"));
    }

    #[test]
    fn test_relation_name_argument() {
        let input = r#"
            model Node {
                id       Int   @id
                parentId Int?
                parent   Node? @relation(name: "Tree", fields: [parentId], references: [id])
                children Node[] @relation(name: "Tree")
            }
        "#;
        let registry = parse_schema(input).unwrap();
        let node = registry.get("Node").unwrap();
        assert_eq!(node.field("parent").unwrap().relation_name(), Some("Tree"));
        assert_eq!(node.field("children").unwrap().relation_name(), Some("Tree"));
        let children = node.field("children").unwrap().relation.clone().unwrap();
        assert_eq!(children.foreign_key(), None);
    }

    #[test]
    fn test_foreign_keys_flagged() {
        let registry = parse_schema(BLOG).unwrap();
        let post = registry.get("Post").unwrap();
        assert_eq!(post.foreign_keys, vec!["authorId"]);
        assert!(post.field("authorId").unwrap().is_foreign_key);
        assert!(!post.field("author").unwrap().is_foreign_key);
        assert!(!post.field("id").unwrap().is_foreign_key);
    }

    #[test]
    fn test_composite_foreign_key() {
        let input = r#"
            model Line {
                orderId Int
                sku     String
                item    Item @relation(fields: [orderId, sku], references: [orderId, sku])
            }
        "#;
        let registry = parse_schema(input).unwrap();
        let line = registry.get("Line").unwrap();
        assert!(line.field("orderId").unwrap().is_foreign_key);
        assert!(line.field("sku").unwrap().is_foreign_key);
        let relation = line.field("item").unwrap().relation.clone().unwrap();
        assert_eq!(relation.foreign_key().as_deref(), Some("orderId_sku"));
    }

    #[test]
    fn test_unknown_foreign_key_is_skipped() {
        let input = r#"
            model Post {
                author User @relation(fields: [ghostId], references: [id])
            }
        "#;
        let registry = parse_schema(input).unwrap();
        let post = registry.get("Post").unwrap();
        assert_eq!(post.foreign_keys, vec!["ghostId"]);
        assert!(post.fields.iter().all(|f| !f.is_foreign_key));
    }

    #[test]
    fn test_duplicate_model() {
        let err = parse_schema("model A { id Int }\nmodel A { id Int }").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateModel(name) if name == "A"));
    }

    #[test]
    fn test_duplicate_field() {
        let err = parse_schema("model A {\n id Int\n id String\n}").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateField { .. }));
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(parse_schema(BLOG).unwrap(), parse_schema(BLOG).unwrap());
    }

    #[test]
    fn test_reversed() {
        let registry = parse_schema(BLOG).unwrap().reversed();
        let names: Vec<&str> = registry.models().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Post", "Profile", "User"]);
        assert_eq!(registry.get("User").unwrap().name, "User");
    }
}
