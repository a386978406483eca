//! The resource manifest.
//!
//! A `Manifest` is the declarative output of a synthesis run: an ordered set
//! of resources with their properties, plus template parameters and
//! outputs. References between resources (`Ref`, `Fn::GetAtt`, `DependsOn`)
//! form the dependency graph the provisioning engine uses to order
//! creation.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::{Error, Expr, LogicalId, Result, canonical};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Typed properties of a provider resource.
pub trait ResourceType: Serialize {
    /// Provider type name, e.g. `AWS::S3::Bucket`.
    const TYPE: &'static str;
}

/// A resource in the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: LogicalId,
    pub type_name: String,
    pub properties: Value,
    pub depends_on: Vec<LogicalId>,
}

impl Resource {
    /// Logical ids this resource depends on, from intrinsic references in its
    /// properties and from explicit `DependsOn`.
    pub fn references(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        collect_references(&self.properties, &mut refs);
        refs.extend(self.depends_on.iter().map(|id| id.as_str().to_string()));
        refs
    }

    /// Read a top-level property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("Type".to_string(), Value::String(self.type_name.clone()));
        if !self.properties.is_null() {
            map.insert("Properties".to_string(), self.properties.clone());
        }
        if !self.depends_on.is_empty() {
            let deps = self
                .depends_on
                .iter()
                .map(|id| Value::String(id.as_str().to_string()))
                .collect();
            map.insert("DependsOn".to_string(), Value::Array(deps));
        }
        Value::Object(map)
    }
}

/// A template parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A template output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<OutputExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputExport {
    pub name: String,
}

/// An ordered resource manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    description: Option<String>,
    parameters: Vec<(LogicalId, Parameter)>,
    resources: Vec<Resource>,
    outputs: Vec<(LogicalId, Output)>,
}

impl Manifest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Add a resource. Fails if the logical id is already taken.
    pub fn add<R: ResourceType>(&mut self, id: LogicalId, properties: &R) -> Result<LogicalId> {
        self.add_with_dependencies(id, properties, Vec::new())
    }

    /// Add a resource with explicit dependencies.
    pub fn add_with_dependencies<R: ResourceType>(
        &mut self,
        id: LogicalId,
        properties: &R,
        depends_on: Vec<LogicalId>,
    ) -> Result<LogicalId> {
        if self.contains(&id) {
            return Err(Error::Conflict(format!(
                "logical id '{}' is already defined",
                id
            )));
        }
        let properties = serde_json::to_value(properties)?;
        debug!(id = %id, resource_type = R::TYPE, "Adding resource");
        self.resources.push(Resource {
            id: id.clone(),
            type_name: R::TYPE.to_string(),
            properties,
            depends_on,
        });
        Ok(id)
    }

    pub fn add_parameter(&mut self, id: LogicalId, parameter: Parameter) -> Result<LogicalId> {
        if self.contains(&id) {
            return Err(Error::Conflict(format!(
                "parameter '{}' collides with an existing id",
                id
            )));
        }
        self.parameters.push((id.clone(), parameter));
        Ok(id)
    }

    pub fn add_output(&mut self, id: LogicalId, output: Output) -> Result<()> {
        if self.outputs.iter().any(|(existing, _)| existing == &id) {
            return Err(Error::Conflict(format!("output '{}' is already defined", id)));
        }
        self.outputs.push((id, output));
        Ok(())
    }

    /// Whether a resource or parameter with this id exists.
    pub fn contains(&self, id: &LogicalId) -> bool {
        self.resources.iter().any(|r| &r.id == id) || self.parameters.iter().any(|(p, _)| p == id)
    }

    pub fn get(&self, id: &LogicalId) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.id == id)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn parameters(&self) -> &[(LogicalId, Parameter)] {
        &self.parameters
    }

    pub fn outputs(&self) -> &[(LogicalId, Output)] {
        &self.outputs
    }

    pub fn resources_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources.iter().filter(move |r| r.type_name == type_name)
    }

    pub fn count_of_type(&self, type_name: &str) -> usize {
        self.resources_of_type(type_name).count()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Verify every reference points at a resource or parameter in this
    /// manifest. Pseudo parameters (`AWS::*`) are always resolvable.
    pub fn check_references(&self) -> Result<()> {
        let known: BTreeSet<&str> = self
            .resources
            .iter()
            .map(|r| r.id.as_str())
            .chain(self.parameters.iter().map(|(id, _)| id.as_str()))
            .collect();

        for resource in &self.resources {
            for reference in resource.references() {
                if !known.contains(reference.as_str()) {
                    return Err(Error::InvalidReference(format!(
                        "resource '{}' references unknown id '{}'",
                        resource.id, reference
                    )));
                }
            }
        }
        for (id, output) in &self.outputs {
            let mut refs = BTreeSet::new();
            collect_references(&output.value.to_value(), &mut refs);
            if let Some(missing) = refs.iter().find(|r| !known.contains(r.as_str())) {
                return Err(Error::InvalidReference(format!(
                    "output '{}' references unknown id '{}'",
                    id, missing
                )));
            }
        }
        Ok(())
    }

    /// Resources in an order where every resource comes after the resources
    /// it references. Ties keep insertion order.
    pub fn creation_order(&self) -> Result<Vec<LogicalId>> {
        let index: HashMap<&str, &Resource> =
            self.resources.iter().map(|r| (r.id.as_str(), r)).collect();
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut result = Vec::with_capacity(self.resources.len());

        for resource in &self.resources {
            visit(resource.id.as_str(), &index, &mut marks, &mut result)?;
        }
        Ok(result)
    }

    /// Group resources into waves. Every resource in a wave depends only on
    /// resources in earlier waves, so the engine may create a wave in parallel.
    pub fn creation_waves(&self) -> Result<Vec<Vec<LogicalId>>> {
        let order = self.creation_order()?;
        let mut level: HashMap<String, usize> = HashMap::new();
        let mut waves: Vec<Vec<LogicalId>> = Vec::new();

        for id in order {
            let resource = self
                .get(&id)
                .ok_or_else(|| Error::InvalidReference(id.to_string()))?;
            let depth = resource
                .references()
                .iter()
                .filter_map(|r| level.get(r).map(|d| d + 1))
                .max()
                .unwrap_or(0);
            if waves.len() <= depth {
                waves.resize_with(depth + 1, Vec::new);
            }
            level.insert(id.as_str().to_string(), depth);
            waves[depth].push(id);
        }
        Ok(waves)
    }

    /// Render as a template document.
    pub fn to_template(&self) -> Result<Value> {
        let mut doc = Map::new();
        doc.insert(
            "AWSTemplateFormatVersion".to_string(),
            Value::String(TEMPLATE_FORMAT_VERSION.to_string()),
        );
        if let Some(description) = &self.description {
            doc.insert("Description".to_string(), Value::String(description.clone()));
        }
        if !self.parameters.is_empty() {
            let params = self
                .parameters
                .iter()
                .map(|(id, p)| -> Result<(String, Value)> {
                    Ok((id.as_str().to_string(), serde_json::to_value(p)?))
                })
                .collect::<Result<Map<_, _>>>()?;
            doc.insert("Parameters".to_string(), Value::Object(params));
        }
        let resources = self
            .resources
            .iter()
            .map(|r| (r.id.as_str().to_string(), r.to_value()))
            .collect();
        doc.insert("Resources".to_string(), Value::Object(resources));
        if !self.outputs.is_empty() {
            let outputs = self
                .outputs
                .iter()
                .map(|(id, o)| -> Result<(String, Value)> {
                    Ok((id.as_str().to_string(), serde_json::to_value(o)?))
                })
                .collect::<Result<Map<_, _>>>()?;
            doc.insert("Outputs".to_string(), Value::Object(outputs));
        }
        Ok(Value::Object(doc))
    }

    /// SHA-256 digest of the canonical template.
    pub fn digest(&self) -> Result<String> {
        canonical::digest(&self.to_template()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn visit<'a>(
    id: &'a str,
    index: &HashMap<&'a str, &'a Resource>,
    marks: &mut HashMap<&'a str, Mark>,
    result: &mut Vec<LogicalId>,
) -> Result<()> {
    match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => return Err(Error::CycleDetected(format!("{} -> ...", id))),
        None => {}
    }
    // Parameters and pseudo parameters are not part of the ordering.
    let Some(resource) = index.get(id) else {
        return Ok(());
    };

    marks.insert(id, Mark::Visiting);
    for dep in resource.references() {
        if let Some((dep_id, _)) = index.get_key_value(dep.as_str()) {
            let dep_id: &'a str = *dep_id;
            if marks.get(dep_id) == Some(&Mark::Visiting) {
                return Err(Error::CycleDetected(format!("{} -> {}", id, dep)));
            }
            visit(dep_id, index, marks, result)?;
        }
    }
    marks.insert(id, Mark::Done);
    result.push(resource.id.clone());
    Ok(())
}

fn collect_references(value: &Value, refs: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                if map.len() == 1 && !target.starts_with("AWS::") {
                    refs.insert(target.clone());
                    return;
                }
            }
            if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(target)) = args.first() {
                    refs.insert(target.clone());
                }
                return;
            }
            if let Some(Value::String(template)) = map.get("Fn::Sub") {
                collect_sub_references(template, refs);
                return;
            }
            for v in map.values() {
                collect_references(v, refs);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, refs);
            }
        }
        _ => {}
    }
}

/// `${Name}` and `${Name.Attribute}` placeholders in a `Fn::Sub` template.
fn collect_sub_references(template: &str, refs: &mut BTreeSet<String>) {
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        // `${!Literal}` is an escape, not a reference.
        if !name.starts_with('!') && !name.starts_with("AWS::") {
            let target = name.split('.').next().unwrap_or(name);
            if !target.is_empty() {
                refs.insert(target.to_string());
            }
        }
        rest = &after[end + 1..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Thing {
        #[serde(rename = "Target", skip_serializing_if = "Option::is_none")]
        target: Option<Expr>,
    }

    impl ResourceType for Thing {
        const TYPE: &'static str = "Test::Thing";
    }

    fn id(name: &str) -> LogicalId {
        LogicalId::named(name).unwrap()
    }

    fn thing(target: Option<&str>) -> Thing {
        Thing {
            target: target.map(|t| Expr::Ref(t.to_string())),
        }
    }

    #[test]
    fn test_duplicate_id_is_conflict() {
        let mut manifest = Manifest::default();
        manifest.add(id("A"), &thing(None)).unwrap();
        let err = manifest.add(id("A"), &thing(None)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_references_include_sub_and_depends_on() {
        let resource = Resource {
            id: id("A"),
            type_name: "Test::Thing".to_string(),
            properties: json!({
                "Name": { "Fn::Sub": "${B}-${C.Arn}-${AWS::Region}-${!Escaped}" },
                "Other": { "Ref": "AWS::StackName" }
            }),
            depends_on: vec![id("D")],
        };
        let refs: Vec<String> = resource.references().into_iter().collect();
        assert_eq!(refs, vec!["B", "C", "D"]);
    }

    #[test]
    fn test_check_references_rejects_dangling() {
        let mut manifest = Manifest::default();
        manifest.add(id("A"), &thing(Some("Missing"))).unwrap();
        assert!(matches!(
            manifest.check_references().unwrap_err(),
            Error::InvalidReference(_)
        ));
    }

    #[test]
    fn test_parameters_resolve_references() {
        let mut manifest = Manifest::default();
        manifest
            .add_parameter(
                id("Ami"),
                Parameter {
                    type_name: "String".to_string(),
                    default: None,
                    description: None,
                },
            )
            .unwrap();
        manifest.add(id("A"), &thing(Some("Ami"))).unwrap();
        manifest.check_references().unwrap();
        assert_eq!(manifest.creation_order().unwrap(), vec![id("A")]);
    }

    #[test]
    fn test_creation_order_puts_dependencies_first() {
        let mut manifest = Manifest::default();
        manifest.add(id("Record"), &thing(Some("Zone"))).unwrap();
        manifest.add(id("Zone"), &thing(None)).unwrap();
        manifest.add(id("Other"), &thing(None)).unwrap();

        let order = manifest.creation_order().unwrap();
        assert_eq!(order, vec![id("Zone"), id("Record"), id("Other")]);

        let waves = manifest.creation_waves().unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0], vec![id("Zone"), id("Other")]);
        assert_eq!(waves[1], vec![id("Record")]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut manifest = Manifest::default();
        manifest.add(id("A"), &thing(Some("B"))).unwrap();
        manifest.add(id("B"), &thing(Some("A"))).unwrap();
        assert!(matches!(
            manifest.creation_order().unwrap_err(),
            Error::CycleDetected(_)
        ));
    }

    #[test]
    fn test_template_shape() {
        let mut manifest = Manifest::new("test stack");
        manifest
            .add_with_dependencies(id("A"), &thing(None), vec![id("B")])
            .unwrap();
        manifest.add(id("B"), &thing(None)).unwrap();
        manifest
            .add_output(
                id("Out"),
                Output {
                    value: Expr::reference(&id("A")),
                    description: None,
                    export: None,
                },
            )
            .unwrap();

        let template = manifest.to_template().unwrap();
        assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(template["Description"], "test stack");
        assert_eq!(template["Resources"]["A"]["Type"], "Test::Thing");
        assert_eq!(template["Resources"]["A"]["DependsOn"], json!(["B"]));
        assert_eq!(template["Outputs"]["Out"]["Value"], json!({ "Ref": "A" }));
        assert!(template.get("Parameters").is_none());
    }

    #[test]
    fn test_template_renders_parameters() {
        let mut manifest = Manifest::new("params");
        manifest
            .add_parameter(
                id("Ami"),
                Parameter {
                    type_name: "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>".to_string(),
                    default: Some("/aws/latest".to_string()),
                    description: None,
                },
            )
            .unwrap();
        let template = manifest.to_template().unwrap();
        let ami = &template["Parameters"]["Ami"];
        assert_eq!(ami["Type"], "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>");
        assert_eq!(ami["Default"], "/aws/latest");
        assert!(ami.get("Description").is_none());
        assert_eq!(
            manifest.digest().unwrap(),
            canonical::digest(&template).unwrap()
        );
    }
}
