use crate::model::{HttpMethod, Parameter, Route, Schema};
use crate::normalize::deduplicate;
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Info,
    /// Paths collection (URL path -> PathItem)
    paths: BTreeMap<String, PathItem>,
    /// Component schemas by title, first declaration wins
    schemas: BTreeMap<String, Schema>,
    /// Every route tag, in first-seen order
    tags: Vec<String>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
}

impl PathItem {
    /// The operation slot for a concrete method; `None` for `All`
    fn slot(&mut self, method: HttpMethod) -> Option<&mut Option<Operation>> {
        match method {
            HttpMethod::Get => Some(&mut self.get),
            HttpMethod::Post => Some(&mut self.post),
            HttpMethod::Put => Some(&mut self.put),
            HttpMethod::Delete => Some(&mut self.delete),
            HttpMethod::Patch => Some(&mut self.patch),
            HttpMethod::Options => Some(&mut self.options),
            HttpMethod::Head => Some(&mut self.head),
            HttpMethod::Trace => Some(&mut self.trace),
            HttpMethod::All => None,
        }
    }

    fn operations_mut(&mut self) -> impl Iterator<Item = &mut Operation> {
        [
            &mut self.get,
            &mut self.post,
            &mut self.put,
            &mut self.delete,
            &mut self.patch,
            &mut self.options,
            &mut self.head,
            &mut self.trace,
        ]
        .into_iter()
        .flatten()
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub summary: String,
    #[serde(rename = "operationId")]
    pub operation_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    /// Handler location, e.g. `src/routes.rs:42`
    #[serde(rename = "x-source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

/// OpenAPI Tag object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub name: String,
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Components {
    pub schemas: BTreeMap<String, Schema>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl OpenApiDocument {
    /// Number of operations across all paths
    pub fn operation_count(&self) -> usize {
        self.paths
            .values()
            .map(|item| {
                [
                    &item.get,
                    &item.post,
                    &item.put,
                    &item.delete,
                    &item.patch,
                    &item.options,
                    &item.head,
                    &item.trace,
                ]
                .into_iter()
                .filter(|op| op.is_some())
                .count()
            })
            .sum()
    }
}

const JSON: &str = "application/json";

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: "Generated API".to_string(),
                version: "1.0.0".to_string(),
                description: Some("API documentation generated from source code".to_string()),
            },
            paths: BTreeMap::new(),
            schemas: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    /// Add a route to the OpenAPI document.
    ///
    /// `ALL` routes become one operation per concrete method. A method already
    /// documented for the path keeps its first operation.
    pub fn add_route(&mut self, route: &Route) {
        let methods: Vec<HttpMethod> = match route.method {
            HttpMethod::All => HttpMethod::CONCRETE.to_vec(),
            method => vec![method],
        };

        for tag in &route.tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }

        let path_item = self.paths.entry(route.path.clone()).or_default();
        for method in methods {
            let Some(slot) = path_item.slot(method) else {
                continue;
            };
            if slot.is_some() {
                debug!(
                    "Ignoring duplicate {} {} from {}:{}",
                    method,
                    route.path,
                    route.source_file.display(),
                    route.source_line
                );
                continue;
            }
            debug!("Adding route: {} {}", method, route.path);

            let operation_id = if route.method == HttpMethod::All {
                format!("{}{}", route.operation_id, upper_first(&method.as_str().to_ascii_lowercase()))
            } else {
                route.operation_id.clone()
            };
            *slot = Some(Self::operation(route, method, operation_id));
        }
    }

    fn operation(route: &Route, method: HttpMethod, operation_id: String) -> Operation {
        let request_body = route
            .request_body
            .as_ref()
            .filter(|_| method.has_body() || method == HttpMethod::Delete)
            .map(|body| RequestBody {
                required: body.required,
                content: IndexMap::from([(body.content_type.clone(), MediaType { schema: body.schema.clone() })]),
            });

        let mut responses = BTreeMap::new();
        for response in &route.responses {
            responses.entry(response.status.clone()).or_insert_with(|| Response {
                description: response.description.clone(),
                content: response
                    .schema
                    .clone()
                    .map(|schema| IndexMap::from([(JSON.to_string(), MediaType { schema })])),
            });
        }
        if responses.is_empty() {
            // Default response when nothing is known about the result
            responses.insert(
                "200".to_string(),
                Response {
                    description: "Successful response".to_string(),
                    content: None,
                },
            );
        }

        Operation {
            summary: format!("{} {}", method, route.path),
            operation_id,
            tags: route.tags.clone(),
            parameters: route.parameters.clone(),
            request_body,
            responses,
            source: (route.source_line > 0)
                .then(|| format!("{}:{}", route.source_file.display(), route.source_line)),
        }
    }

    /// Add a component schema under its title. Untitled schemas are ignored.
    pub fn add_schema(&mut self, schema: Schema) {
        let Some(title) = schema.title.clone() else {
            debug!("Ignoring untitled schema");
            return;
        };
        if self.schemas.contains_key(&title) {
            debug!("Schema {} already defined; keeping the first", title);
            return;
        }
        self.schemas.insert(title, schema);
    }

    /// Build the final OpenAPI document
    pub fn build(mut self) -> OpenApiDocument {
        debug!("Building final OpenAPI document");
        self.deduplicate_operation_ids();

        let components = if self.schemas.is_empty() {
            None
        } else {
            Some(Components { schemas: self.schemas })
        };

        OpenApiDocument {
            openapi: "3.0.3".to_string(),
            info: self.info,
            tags: self.tags.into_iter().map(|name| Tag { name }).collect(),
            paths: self.paths,
            components,
        }
    }

    /// Suffix repeated operation IDs, in path order then method order
    fn deduplicate_operation_ids(&mut self) {
        let ids: Vec<String> = self
            .paths
            .values_mut()
            .flat_map(|item| item.operations_mut().map(|op| op.operation_id.clone()).collect::<Vec<_>>())
            .collect();
        let duplicated: HashSet<&String> = {
            let mut seen = HashSet::new();
            ids.iter().filter(|id| !seen.insert(*id)).collect()
        };
        if duplicated.is_empty() {
            return;
        }
        debug!("De-duplicating {} operation ID(s)", duplicated.len());

        let mut unique = deduplicate(&ids).into_iter();
        for item in self.paths.values_mut() {
            for op in item.operations_mut() {
                if let Some(id) = unique.next() {
                    op.operation_id = id;
                }
            }
        }
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
