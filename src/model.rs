//! The normalized data model every plugin populates.
//!
//! Routes and schemas are plain values: each extraction call builds them fresh and
//! nothing is shared between files or calls.

use crate::normalize::{extract_path_params, infer_tags, synthesize};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Prefix used by every schema reference
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// HTTP methods a route can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    /// Matches every method (`app.all`, `any(handler)`, `match :*`)
    All,
}

impl HttpMethod {
    /// The methods `All` stands for when a document needs concrete operations
    pub const CONCRETE: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::All => "ALL",
        }
    }

    /// Parse a method name case-insensitively (`any` is accepted for `All`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "head" => Some(HttpMethod::Head),
            "options" => Some(HttpMethod::Options),
            "trace" => Some(HttpMethod::Trace),
            "all" | "any" => Some(HttpMethod::All),
            _ => None,
        }
    }

    /// Whether requests with this method conventionally carry a body
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter value comes from in an HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

/// A single path, query, header or cookie parameter of a route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Schema,
}

impl Parameter {
    /// Path parameter with a string schema; path parameters are always required
    pub fn path(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: ParameterLocation::Path,
            required: true,
            schema: Schema::string(),
        }
    }

    /// Query parameter, optional unless the source says otherwise
    pub fn query(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            location: ParameterLocation::Query,
            required: false,
            schema,
        }
    }

    /// Header parameter
    pub fn header(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            location: ParameterLocation::Header,
            required: false,
            schema,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Request body of an operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    pub content_type: String,
    pub schema: Schema,
    pub required: bool,
}

impl RequestBody {
    pub fn json(schema: Schema) -> Self {
        Self {
            content_type: "application/json".to_string(),
            schema,
            required: true,
        }
    }

    pub fn form(schema: Schema) -> Self {
        Self {
            content_type: "application/x-www-form-urlencoded".to_string(),
            schema,
            required: true,
        }
    }
}

/// One documented response of an operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: String,
    pub description: String,
    pub schema: Option<Schema>,
}

impl Response {
    /// A `200` response with the given body schema
    pub fn ok(schema: Schema) -> Self {
        Self::with_status("200", Some(schema))
    }

    pub fn with_status(status: impl Into<String>, schema: Option<Schema>) -> Self {
        let status = status.into();
        let description = match status.as_str() {
            "200" => "Successful response",
            "201" => "Created",
            "204" => "No content",
            "400" => "Bad request",
            "401" => "Unauthorized",
            "403" => "Forbidden",
            "404" => "Not found",
            "500" => "Internal server error",
            _ => "Response",
        }
        .to_string();
        Self {
            status,
            description,
            schema,
        }
    }
}

/// One HTTP operation found in source code.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: HttpMethod,
    /// Canonical path template, `{name}` placeholders only
    pub path: String,
    /// Best-effort handler name; empty for anonymous handlers
    pub handler: String,
    pub operation_id: String,
    /// Zero or one inferred tag
    pub tags: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub responses: Vec<Response>,
    pub source_file: PathBuf,
    /// 1-based line of the anchor (attribute, macro, decorator or builder call)
    pub source_line: usize,
}

impl Route {
    /// Create a route from an already canonical path, deriving parameters,
    /// operation ID and tags from it.
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        handler: impl Into<String>,
        source_file: impl Into<PathBuf>,
        source_line: usize,
    ) -> Self {
        let path = path.into();
        let handler = handler.into();
        Self {
            operation_id: synthesize(method, &path, &handler),
            tags: infer_tags(&path),
            parameters: extract_path_params(&path),
            method,
            path,
            handler,
            request_body: None,
            responses: Vec::new(),
            source_file: source_file.into(),
            source_line,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = operation_id.into();
        self
    }

    pub fn with_request_body(mut self, body: RequestBody) -> Self {
        self.request_body = Some(body);
        self
    }

    pub fn with_response(mut self, response: Response) -> Self {
        self.responses.push(response);
        self
    }

    /// Add a parameter, replacing one with the same name and location.
    ///
    /// A replaced path parameter stays required and keeps its position.
    pub fn push_parameter(&mut self, parameter: Parameter) {
        if let Some(existing) = self
            .parameters
            .iter_mut()
            .find(|p| p.name == parameter.name && p.location == parameter.location)
        {
            let required = existing.required || parameter.location == ParameterLocation::Path;
            *existing = parameter;
            existing.required = required;
        } else {
            self.parameters.push(parameter);
        }
    }
}

/// Primitive OpenAPI schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
}

/// OpenAPI-style schema: a named object, a property, or a reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Schema {
    pub fn of_type(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::of_type(SchemaType::String)
    }

    pub fn integer() -> Self {
        Self::of_type(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::of_type(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::of_type(SchemaType::Boolean)
    }

    pub fn object() -> Self {
        Self::of_type(SchemaType::Object)
    }

    pub fn array(items: Schema) -> Self {
        Self {
            schema_type: Some(SchemaType::Array),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// A titled object schema with no properties yet
    pub fn titled_object(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::object()
        }
    }

    /// `$ref` to `#/components/schemas/<name>`
    pub fn reference_to(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", SCHEMA_REF_PREFIX, name)),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = values;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Name of the referenced schema, if this is a reference
    pub fn ref_name(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.strip_prefix(SCHEMA_REF_PREFIX))
    }

    pub fn is_array(&self) -> bool {
        self.schema_type == Some(SchemaType::Array)
    }

    /// Add a property, recording it as required when asked
    pub fn add_property(&mut self, name: impl Into<String>, schema: Schema, required: bool) {
        let name = name.into();
        if required && !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
    }
}
