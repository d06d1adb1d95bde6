/// Schema definition loading.
///
/// The schema model is not parsed from SDL here; it is built from a
/// definition document (YAML or JSON) listing entities, interfaces, unions,
/// edge-property-types and root custom queries. This module handles:
///
/// - Loading from YAML/JSON strings or files
/// - Resolving scalar type names and relationship targets
/// - Structural validation (unknown targets, missing interface members,
///   duplicates)
/// - Deriving root fields (`<plural>`, `<plural>Connection`, `<plural>Aggregate`)
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use super::errors::SchemaError;
use super::schema::{
    CustomField, CustomTarget, DeclaredRelationship, EdgePropertyType, Entity, Interface,
    RelationshipField, RootFieldKind, ScalarField, SchemaModel, Union,
};
use super::types::{Cardinality, Direction, PaginationLimits, QueryDirection, ScalarKind, TypeRef};

/// Top-level schema definition document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
    #[serde(default)]
    pub unions: Vec<UnionDefinition>,
    #[serde(default)]
    pub relationship_properties: Vec<PropertiesDefinition>,
    #[serde(default)]
    pub enums: Vec<EnumDefinition>,
    /// Root-level custom query fields
    #[serde(default)]
    pub queries: Vec<CustomFieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    /// Node labels; defaults to `[name]`
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// Plural used for root fields; defaults to lower-camel name + "s"
    #[serde(default)]
    pub plural: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub limit: PaginationLimits,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub name: String,
    /// Edge label
    #[serde(rename = "type")]
    pub edge_label: String,
    pub direction: Direction,
    #[serde(default)]
    pub query_direction: QueryDirection,
    pub target: String,
    #[serde(default = "default_true")]
    pub list: bool,
    #[serde(default)]
    pub properties: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    pub name: String,
    pub statement: String,
    pub column_name: String,
    /// Scalar type name or entity name
    pub target: String,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    #[serde(default)]
    pub plural: Option<String>,
    #[serde(default)]
    pub limit: PaginationLimits,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub declared_relationships: Vec<DeclaredRelationshipDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredRelationshipDefinition {
    pub name: String,
    pub target: String,
    #[serde(default = "default_true")]
    pub list: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDefinition {
    pub name: String,
    #[serde(default)]
    pub plural: Option<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertiesDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub name: String,
    pub values: Vec<String>,
}

/// Default plural: lower-case first letter, append `s`.
pub fn default_plural(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("{}{}s", first.to_lowercase(), chars.as_str()),
        None => String::new(),
    }
}

impl SchemaModel {
    /// Build from a YAML (or JSON, which YAML accepts) document.
    pub fn from_yaml_str(content: &str) -> Result<Self, SchemaError> {
        let definition: SchemaDefinition =
            serde_yaml::from_str(content).map_err(|e| SchemaError::ConfigParseError {
                error: e.to_string(),
            })?;
        Self::from_definition(definition)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| SchemaError::ConfigReadError {
                error: format!("{}: {}", path.as_ref().display(), e),
            })?;
        Self::from_yaml_str(&content)
    }

    /// Validate a definition document and freeze it into a model.
    pub fn from_definition(definition: SchemaDefinition) -> Result<Self, SchemaError> {
        let builder = SchemaBuilder::new(&definition)?;
        let model = builder.build(&definition)?;
        log::info!(
            "Schema model built: {} entities, {} interfaces, {} unions, {} root fields",
            model.entities.len(),
            model.interfaces.len(),
            model.unions.len(),
            model.root_fields.len()
        );
        Ok(model)
    }
}

struct SchemaBuilder {
    enums: HashSet<String>,
    entity_names: HashSet<String>,
    interface_names: HashSet<String>,
    union_names: HashSet<String>,
    properties_names: HashSet<String>,
}

impl SchemaBuilder {
    fn new(definition: &SchemaDefinition) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut check = |name: &str| -> Result<(), SchemaError> {
            if seen.insert(name.to_string()) {
                Ok(())
            } else {
                Err(SchemaError::Duplicate {
                    name: name.to_string(),
                })
            }
        };

        for e in &definition.enums {
            check(&e.name)?;
        }
        for e in &definition.entities {
            check(&e.name)?;
        }
        for i in &definition.interfaces {
            check(&i.name)?;
        }
        for u in &definition.unions {
            check(&u.name)?;
        }
        for p in &definition.relationship_properties {
            check(&p.name)?;
        }

        Ok(SchemaBuilder {
            enums: definition.enums.iter().map(|e| e.name.clone()).collect(),
            entity_names: definition.entities.iter().map(|e| e.name.clone()).collect(),
            interface_names: definition.interfaces.iter().map(|i| i.name.clone()).collect(),
            union_names: definition.unions.iter().map(|u| u.name.clone()).collect(),
            properties_names: definition
                .relationship_properties
                .iter()
                .map(|p| p.name.clone())
                .collect(),
        })
    }

    fn type_ref(&self, name: &str, context: &str) -> Result<TypeRef, SchemaError> {
        if self.entity_names.contains(name) {
            Ok(TypeRef::Entity(name.to_string()))
        } else if self.interface_names.contains(name) {
            Ok(TypeRef::Interface(name.to_string()))
        } else if self.union_names.contains(name) {
            Ok(TypeRef::Union(name.to_string()))
        } else {
            Err(SchemaError::type_error_with_context(name, context))
        }
    }

    fn scalar_fields(
        &self,
        type_name: &str,
        fields: &[FieldDefinition],
    ) -> Result<Vec<ScalarField>, SchemaError> {
        let mut names = HashSet::new();
        fields
            .iter()
            .map(|f| {
                if !names.insert(f.name.as_str()) {
                    return Err(SchemaError::Duplicate {
                        name: format!("{}.{}", type_name, f.name),
                    });
                }
                let kind = ScalarKind::parse(&f.type_name, &self.enums).ok_or_else(|| {
                    SchemaError::InvalidScalarType {
                        type_name: type_name.to_string(),
                        field: f.name.clone(),
                        scalar: f.type_name.clone(),
                    }
                })?;
                Ok(ScalarField {
                    name: f.name.clone(),
                    kind,
                    nullable: f.nullable,
                    is_list: f.list,
                    alias: f.alias.clone(),
                    default_value: f.default.clone(),
                })
            })
            .collect()
    }

    fn custom_field(
        &self,
        owner: &str,
        def: &CustomFieldDefinition,
    ) -> Result<CustomField, SchemaError> {
        let target = if let Some(kind) = ScalarKind::parse(&def.target, &self.enums) {
            CustomTarget::Scalar(kind)
        } else if self.entity_names.contains(&def.target) {
            CustomTarget::Entity(def.target.clone())
        } else {
            return Err(SchemaError::type_error_with_context(
                &def.target,
                format!("custom field `{}.{}`", owner, def.name),
            ));
        };
        if def.statement.trim().is_empty() {
            return Err(SchemaError::InvalidConfig {
                message: format!("custom field `{}.{}` has an empty statement", owner, def.name),
            });
        }
        Ok(CustomField {
            name: def.name.clone(),
            statement: def.statement.clone(),
            column_name: def.column_name.clone(),
            target,
            cardinality: Cardinality::from_list_flag(def.list),
            arguments: def.arguments.clone(),
        })
    }

    fn build(self, definition: &SchemaDefinition) -> Result<SchemaModel, SchemaError> {
        let mut model = SchemaModel {
            enums: definition
                .enums
                .iter()
                .map(|e| (e.name.clone(), e.values.clone()))
                .collect(),
            ..Default::default()
        };

        for p in &definition.relationship_properties {
            let fields = self.scalar_fields(&p.name, &p.fields)?;
            model
                .edge_properties_index
                .insert(p.name.clone(), model.edge_properties.len());
            model.edge_properties.push(EdgePropertyType {
                name: p.name.clone(),
                fields,
            });
        }

        for i in &definition.interfaces {
            let fields = self.scalar_fields(&i.name, &i.fields)?;
            let declared_relationships = i
                .declared_relationships
                .iter()
                .map(|d| {
                    Ok(DeclaredRelationship {
                        name: d.name.clone(),
                        target: self.type_ref(
                            &d.target,
                            &format!("declared relationship `{}.{}`", i.name, d.name),
                        )?,
                        cardinality: Cardinality::from_list_flag(d.list),
                    })
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            let implementations = definition
                .entities
                .iter()
                .filter(|e| e.implements.contains(&i.name))
                .map(|e| e.name.clone())
                .collect();
            model
                .interface_index
                .insert(i.name.clone(), model.interfaces.len());
            model.interfaces.push(Interface {
                name: i.name.clone(),
                plural: i.plural.clone().unwrap_or_else(|| default_plural(&i.name)),
                fields,
                declared_relationships,
                implementations,
                limits: i.limit,
            });
        }

        for e in &definition.entities {
            let entity = self.entity(&model, e)?;
            model.entity_index.insert(e.name.clone(), model.entities.len());
            model.entities.push(entity);
        }

        for u in &definition.unions {
            for member in &u.members {
                if !self.entity_names.contains(member) {
                    return Err(SchemaError::InvalidUnionMember {
                        union_name: u.name.clone(),
                        member: member.clone(),
                    });
                }
            }
            model.union_index.insert(u.name.clone(), model.unions.len());
            model.unions.push(Union {
                name: u.name.clone(),
                plural: u.plural.clone().unwrap_or_else(|| default_plural(&u.name)),
                members: u.members.clone(),
            });
        }

        register_root_fields(&mut model, &self, definition)?;
        Ok(model)
    }

    fn entity(&self, model: &SchemaModel, e: &EntityDefinition) -> Result<Entity, SchemaError> {
        let fields = self.scalar_fields(&e.name, &e.fields)?;

        let mut relationships = Vec::with_capacity(e.relationships.len());
        for r in &e.relationships {
            if let Some(props) = &r.properties {
                if !self.properties_names.contains(props) {
                    return Err(SchemaError::UnknownPropertiesType {
                        type_name: e.name.clone(),
                        relationship: r.name.clone(),
                        properties: props.clone(),
                    });
                }
            }
            let declared_by = e
                .implements
                .iter()
                .find(|i| {
                    model
                        .interface_opt(i)
                        .map(|iface| iface.declared_relationship(&r.name).is_some())
                        .unwrap_or(false)
                })
                .cloned();
            relationships.push(RelationshipField {
                name: r.name.clone(),
                edge_label: r.edge_label.clone(),
                direction: r.direction,
                query_direction: r.query_direction,
                target: self.type_ref(
                    &r.target,
                    &format!("relationship `{}.{}`", e.name, r.name),
                )?,
                cardinality: Cardinality::from_list_flag(r.list),
                properties: r.properties.clone(),
                declared_by,
            });
        }

        let custom_fields = e
            .custom_fields
            .iter()
            .map(|c| self.custom_field(&e.name, c))
            .collect::<Result<Vec<_>, _>>()?;

        // Every interface member must be supplied by the implementing entity
        for interface_name in &e.implements {
            let interface = model.interface_opt(interface_name).ok_or_else(|| {
                SchemaError::type_error_with_context(
                    interface_name,
                    format!("`{}` implements list", e.name),
                )
            })?;
            for shared in &interface.fields {
                let supplied = fields
                    .iter()
                    .any(|f| f.name == shared.name && f.kind == shared.kind);
                if !supplied {
                    return Err(SchemaError::MissingImplementation {
                        entity: e.name.clone(),
                        interface: interface_name.clone(),
                        member: shared.name.clone(),
                    });
                }
            }
            for declared in &interface.declared_relationships {
                if !relationships.iter().any(|r| r.name == declared.name) {
                    return Err(SchemaError::MissingImplementation {
                        entity: e.name.clone(),
                        interface: interface_name.clone(),
                        member: declared.name.clone(),
                    });
                }
            }
        }

        Ok(Entity {
            name: e.name.clone(),
            labels: e.labels.clone().unwrap_or_else(|| vec![e.name.clone()]),
            plural: e.plural.clone().unwrap_or_else(|| default_plural(&e.name)),
            implements: e.implements.clone(),
            fields,
            relationships,
            custom_fields,
            limits: e.limit,
        })
    }
}

fn register_root_fields(
    model: &mut SchemaModel,
    builder: &SchemaBuilder,
    definition: &SchemaDefinition,
) -> Result<(), SchemaError> {
    let mut roots: Vec<(String, RootFieldKind)> = Vec::new();
    for e in &model.entities {
        let target = TypeRef::Entity(e.name.clone());
        roots.push((e.plural.clone(), RootFieldKind::List(target.clone())));
        roots.push((
            format!("{}Connection", e.plural),
            RootFieldKind::Connection(target.clone()),
        ));
        roots.push((
            format!("{}Aggregate", e.plural),
            RootFieldKind::Aggregate(target),
        ));
    }
    for i in &model.interfaces {
        let target = TypeRef::Interface(i.name.clone());
        roots.push((i.plural.clone(), RootFieldKind::List(target.clone())));
        roots.push((
            format!("{}Connection", i.plural),
            RootFieldKind::Connection(target.clone()),
        ));
        roots.push((
            format!("{}Aggregate", i.plural),
            RootFieldKind::Aggregate(target),
        ));
    }
    for u in &model.unions {
        roots.push((
            u.plural.clone(),
            RootFieldKind::List(TypeRef::Union(u.name.clone())),
        ));
    }
    for q in &definition.queries {
        roots.push((
            q.name.clone(),
            RootFieldKind::Custom(builder.custom_field("Query", q)?),
        ));
    }

    for (name, kind) in roots {
        if model.root_fields.insert(name.clone(), kind).is_some() {
            return Err(SchemaError::Duplicate { name });
        }
    }
    Ok(())
}
