//! Oat++ route and DTO extraction.
//!
//! Endpoints come from the `ENDPOINT` and `ENDPOINT_ASYNC` codegen macros. The
//! parameter sub-macros (`PATH`, `QUERY`, `HEADER`, `BODY_DTO`, `BODY_STRING`)
//! type the route, and an `ENDPOINT_INFO` block with the same name adds typed
//! responses. DTOs are classes with `DTO_INIT` and `DTO_FIELD` declarations.

use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::cpp;
use crate::extractor::{ExtractContext, Framework, FrameworkPlugin};
use crate::model::{HttpMethod, Parameter, RequestBody, Response, Route, Schema};
use crate::normalize::convert;
use crate::source::{Language, SourceFile};
use crate::text::{
    call_blocks, find_calls, find_closing, find_closing_angle, split_generics, split_top_level, unquote,
    LineIndex,
};
use crate::type_mapper::{self, TypeContext};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const MARKERS: &[ManifestMarker] = &[
    ManifestMarker::new(ManifestKind::CMake, "oatpp"),
    ManifestMarker::new(ManifestKind::Conan, "oatpp"),
    ManifestMarker::new(ManifestKind::Vcpkg, "oatpp"),
];

static SUB_MACRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(PATH|QUERY|HEADER|BODY_DTO|BODY_STRING|REQUEST|AUTHORIZATION)\s*\(")
        .expect("valid oatpp parameter macro regex")
});

static STATUS_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CODE_(\d{3})").expect("valid oatpp status regex"));

static INFO_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"info\s*->\s*description\s*=\s*"([^"]*)""#).expect("valid oatpp description regex")
});

static INFO_REQUIRED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"info\s*->\s*required\s*=\s*true").expect("valid oatpp required regex"));

/// Oat++ route extractor
pub struct OatppPlugin;

impl FrameworkPlugin for OatppPlugin {
    fn framework(&self) -> Framework {
        Framework::Oatpp
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Cpp]
    }

    fn manifest_markers(&self) -> &'static [ManifestMarker] {
        MARKERS
    }

    fn detect_file(&self, file: &SourceFile) -> bool {
        cpp::includes(&file.content, "oatpp")
            || file.content.contains("oatpp::")
            || file.content.contains("OATPP_CODEGEN")
    }

    fn declared_types(&self, file: &SourceFile) -> Vec<String> {
        let masked = file.masked();
        let mut names: Vec<String> = cpp::classes(&masked)
            .iter()
            .filter(|class| class.body.contains("DTO_INIT"))
            .map(|class| class.name.to_string())
            .collect();
        names.extend(
            find_calls(&masked, "ENUM")
                .into_iter()
                .filter_map(|(_, args)| split_top_level(args, ',').first().map(|n| n.to_string())),
        );
        names
    }

    fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>> {
        let masked = file.masked();
        let lines = LineIndex::new(&masked);
        let responses = endpoint_info(&masked, &cx.types);

        let mut endpoints: Vec<(usize, &str, bool)> = find_calls(&masked, "ENDPOINT")
            .into_iter()
            .map(|(offset, args)| (offset, args, false))
            .chain(
                find_calls(&masked, "ENDPOINT_ASYNC")
                    .into_iter()
                    .map(|(offset, args)| (offset, args, true)),
            )
            .collect();
        endpoints.sort_by_key(|(offset, _, _)| *offset);

        let mut routes = Vec::new();
        for (offset, args, is_async) in endpoints {
            let Some(mut route) = parse_endpoint(args, is_async, file, lines.line_of(offset), &cx.types) else {
                debug!("Abandoned malformed endpoint at line {}", lines.line_of(offset));
                continue;
            };
            if let Some(documented) = responses.get(&route.handler) {
                route.responses.extend(documented.iter().cloned());
            }
            routes.push(route);
        }

        debug!("Found {} Oat++ routes in {}", routes.len(), file.path.display());
        Ok(routes)
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        let masked = file.masked();
        let mut schemas: Vec<Schema> = cpp::classes(&masked)
            .iter()
            .filter(|class| class.body.contains("DTO_INIT"))
            .map(|class| dto_schema(class.name, class.body, &cx.types))
            .collect();
        schemas.extend(
            find_calls(&masked, "ENUM")
                .into_iter()
                .filter_map(|(_, args)| enum_schema(args)),
        );
        Ok(schemas)
    }
}

/// Parse `ENDPOINT("GET", "/p", name, PARAM(...)...)` or `ENDPOINT_ASYNC("GET", "/p", Name)`
fn parse_endpoint(args: &str, is_async: bool, file: &SourceFile, line: usize, types: &TypeContext) -> Option<Route> {
    let parts = split_top_level(args, ',');
    let method = HttpMethod::from_name(unquote(parts.first()?)?)?;
    let path = convert(unquote(parts.get(1)?)?);
    let name = parts.get(2)?.trim();
    if name.is_empty() {
        return None;
    }

    let mut route = Route::new(method, path, name, &file.path, line);
    if is_async {
        return Some(route);
    }

    for param in parts.iter().skip(3) {
        let Some(caps) = SUB_MACRO.captures(param) else {
            continue;
        };
        let open = caps.get(0)?.end() - 1;
        let Some(close) = find_closing(param, open) else {
            continue;
        };
        let inner = split_generics(&param[open + 1..close]);
        apply_parameter(&mut route, &caps[1], &inner, types);
    }
    Some(route)
}

fn apply_parameter(route: &mut Route, kind: &str, args: &[&str], types: &TypeContext) {
    let (Some(ty), Some(ident)) = (args.first().copied(), args.get(1).copied()) else {
        return;
    };
    let schema = type_mapper::oatpp(ty, types);
    let name = args
        .get(2)
        .and_then(|q| unquote(q))
        .unwrap_or(ident)
        .to_string();

    match kind {
        "PATH" => {
            let mut parameter = Parameter::path(name);
            parameter.schema = schema;
            route.push_parameter(parameter);
        }
        "QUERY" => route.push_parameter(Parameter::query(name, schema)),
        "HEADER" | "AUTHORIZATION" => {
            let name = if kind == "AUTHORIZATION" && args.get(2).is_none() {
                "Authorization".to_string()
            } else {
                name
            };
            route.push_parameter(Parameter::header(name, schema));
        }
        "BODY_DTO" => route.request_body = Some(RequestBody::json(schema)),
        "BODY_STRING" => {
            route.request_body = Some(RequestBody {
                content_type: "text/plain".to_string(),
                schema: Schema::string(),
                required: true,
            })
        }
        _ => {}
    }
}

/// Typed responses declared by `ENDPOINT_INFO(name) { ... }`, keyed by endpoint name
fn endpoint_info(masked: &str, types: &TypeContext) -> HashMap<String, Vec<Response>> {
    let mut documented: HashMap<String, Vec<Response>> = HashMap::new();

    for info in call_blocks(masked, "ENDPOINT_INFO") {
        let (name, block) = (info.args.trim(), info.body);
        let mut responses = Vec::new();
        for (at, _) in block.match_indices("addResponse") {
            let open = at + "addResponse".len();
            let Some(close) = find_closing_angle(block, open) else {
                continue;
            };
            let ty = &block[open + 1..close];
            let status = block[close..]
                .find(';')
                .and_then(|end| STATUS_CODE.captures(&block[close..close + end]))
                .map(|caps| caps[1].to_string())
                .unwrap_or_else(|| "200".to_string());
            responses.push(Response::with_status(status, Some(type_mapper::oatpp(ty, types))));
        }

        documented.entry(name.to_string()).or_default().extend(responses);
    }
    documented
}

fn dto_schema(name: &str, body: &str, types: &TypeContext) -> Schema {
    let mut info: HashMap<&str, (bool, Option<&str>)> = HashMap::new();
    for field_info in call_blocks(body, "DTO_FIELD_INFO") {
        let (field, block) = (field_info.args.trim(), field_info.body);
        let required = INFO_REQUIRED.is_match(block);
        let description = INFO_DESCRIPTION
            .captures(block)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        info.insert(field, (required, description));
    }

    let mut schema = Schema::titled_object(name);
    for (_, args) in find_calls(body, "DTO_FIELD") {
        let parts = split_generics(args);
        let (Some(ty), Some(ident)) = (parts.first().copied(), parts.get(1).copied()) else {
            continue;
        };
        let key = parts.get(2).and_then(|q| unquote(q)).unwrap_or(ident);
        let mut property = type_mapper::oatpp(ty, types);
        let (required, description) = info.get(ident).copied().unwrap_or((false, None));
        property.description = description.map(str::to_string);
        schema.add_property(key, property, required);
    }
    schema
}

/// `ENUM(Name, v_int32, VALUE(A, 0, "a"), VALUE(B, 1))` as a string enum
fn enum_schema(args: &str) -> Option<Schema> {
    let parts = split_top_level(args, ',');
    let name = parts.first()?.trim();
    let values: Vec<String> = parts
        .iter()
        .skip(2)
        .filter_map(|value| {
            let inner = value.trim().strip_prefix("VALUE")?.trim();
            let inner = inner.strip_prefix('(')?.strip_suffix(')')?;
            let fields = split_top_level(inner, ',');
            let label = fields.get(2).and_then(|q| unquote(q)).or(fields.first().copied())?;
            Some(label.to_string())
        })
        .collect();

    let mut schema = Schema::string().with_enum(values);
    schema.title = Some(name.to_string());
    Some(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractConfig;
    use crate::model::ParameterLocation;

    const CONTROLLER: &str = r#"
#include "oatpp/web/server/api/ApiController.hpp"
#include OATPP_CODEGEN_BEGIN(ApiController)

class UserController : public oatpp::web::server::api::ApiController {
public:
  ENDPOINT_INFO(getUser) {
    info->summary = "Get one user";
    info->addResponse<Object<UserDto>>(Status::CODE_200, "application/json");
    info->addResponse<String>(Status::CODE_404, "text/plain");
  }
  ENDPOINT("GET", "/users/{userId}", getUser,
           PATH(Int64, userId),
           QUERY(String, verbose, "v"),
           HEADER(String, token, "X-Token")) {
    return createDtoResponse(Status::CODE_200, m_service.get(userId));
  }

  ENDPOINT("POST", "/users", createUser, BODY_DTO(Object<UserDto>, dto)) {
    return createDtoResponse(Status::CODE_200, m_service.create(dto));
  }

  ENDPOINT("PUT", "/notes/{id}", putNote, PATH(Int32, noteId, "id"), BODY_STRING(String, text)) {
    return createResponse(Status::CODE_200, "ok");
  }

  ENDPOINT_ASYNC("GET", "/stream", Stream) {
    ENDPOINT_ASYNC_INIT(Stream)
  };
};
"#;

    fn routes(code: &str) -> Vec<Route> {
        let files = vec![
            SourceFile::new("UserController.hpp", Language::Cpp, code),
            SourceFile::new("UserDto.hpp", Language::Cpp, DTO),
        ];
        OatppPlugin
            .extract_routes(&files, &ExtractConfig::default())
            .items
    }

    const DTO: &str = r#"
#include "oatpp/core/macro/codegen.hpp"
#include OATPP_CODEGEN_BEGIN(DTO)

ENUM(Role, v_int32,
     VALUE(GUEST, 0, "ROLE_GUEST"),
     VALUE(ADMIN, 1))

class UserDto : public oatpp::DTO {
  DTO_INIT(UserDto, DTO)

  DTO_FIELD_INFO(userName) {
    info->description = "Display name";
    info->required = true;
  }
  DTO_FIELD(String, userName, "user-name");
  DTO_FIELD(Int32, age);
  DTO_FIELD(Vector<Object<UserDto>>, friends);
  DTO_FIELD(Enum<Role>::AsString, role);
};
"#;

    #[test]
    fn test_endpoint_parameters() {
        let found = routes(CONTROLLER);
        assert_eq!(found.len(), 4);

        let get = &found[0];
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.path, "/users/{userId}");
        assert_eq!(get.operation_id, "getGetUser");
        assert_eq!(get.source_line, 12);
        assert_eq!(get.parameters[0].schema.format.as_deref(), Some("int64"));
        assert_eq!(get.parameters[1].name, "v");
        assert_eq!(get.parameters[1].location, ParameterLocation::Query);
        assert!(!get.parameters[1].required);
        assert_eq!(get.parameters[2].name, "X-Token");
        assert_eq!(get.parameters[2].location, ParameterLocation::Header);
    }

    #[test]
    fn test_endpoint_info_responses() {
        let found = routes(CONTROLLER);
        let statuses: Vec<_> = found[0].responses.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["200", "404"]);
        assert_eq!(
            found[0].responses[0].schema.as_ref().and_then(|s| s.ref_name()),
            Some("UserDto")
        );
        assert!(found[1].responses.is_empty());
    }

    #[test]
    fn test_bodies_and_async() {
        let found = routes(CONTROLLER);
        let create = &found[1];
        let body = create.request_body.as_ref().unwrap();
        assert_eq!(body.content_type, "application/json");
        assert_eq!(body.schema.ref_name(), Some("UserDto"));

        let note = &found[2];
        assert_eq!(note.path, "/notes/{id}");
        assert_eq!(note.parameters.len(), 1);
        assert_eq!(note.parameters[0].schema.format.as_deref(), Some("int32"));
        assert_eq!(note.request_body.as_ref().unwrap().content_type, "text/plain");

        assert_eq!(found[3].path, "/stream");
        assert_eq!(found[3].handler, "Stream");
    }

    #[test]
    fn test_malformed_endpoint_is_skipped() {
        let code = r#"
#include "oatpp/web/server/api/ApiController.hpp"
ENDPOINT(GET, "/bad", bad) {}
ENDPOINT("GET", "/good", good) {}
"#;
        let file = SourceFile::new("c.hpp", Language::Cpp, code);
        let found = OatppPlugin.extract_routes(&[file], &ExtractConfig::default()).items;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/good");
    }

    #[test]
    fn test_unclosed_endpoint_parens_are_skipped() {
        let code = r#"
#include "oatpp/web/server/api/ApiController.hpp"
class ItemController : public oatpp::web::server::api::ApiController {
  ENDPOINT("PUT", "/broken", broken, PATH(Int64, id) {
    return createResponse(Status::CODE_200, "ok");
  }
  ENDPOINT("GET", "/good", good) {
    return createResponse(Status::CODE_200, "ok");
  }
};
"#;
        let file = SourceFile::new("ItemController.hpp", Language::Cpp, code);
        let found = OatppPlugin.extract_routes(&[file], &ExtractConfig::default()).items;
        let paths: Vec<_> = found.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/good"]);
    }

    #[test]
    fn test_dto_schemas() {
        let file = SourceFile::new("UserDto.hpp", Language::Cpp, DTO);
        let schemas = OatppPlugin
            .extract_schemas(&[file], &ExtractConfig::default())
            .items;
        assert_eq!(schemas.len(), 2);

        let user = &schemas[0];
        assert_eq!(user.title.as_deref(), Some("UserDto"));
        let keys: Vec<_> = user.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["user-name", "age", "friends", "role"]);
        assert_eq!(user.required, vec!["user-name"]);
        assert_eq!(
            user.properties["user-name"].description.as_deref(),
            Some("Display name")
        );
        assert!(user.properties["friends"].is_array());

        let role = &schemas[1];
        assert_eq!(role.title.as_deref(), Some("Role"));
        assert_eq!(role.enum_values, vec!["ROLE_GUEST", "ADMIN"]);
    }

    #[test]
    fn test_non_oatpp_file_has_no_routes() {
        let file = SourceFile::new("x.cpp", Language::Cpp, "ENDPOINT(\"GET\", \"/x\", x) {}");
        assert!(OatppPlugin
            .extract_routes(&[file], &ExtractConfig::default())
            .items
            .is_empty());
    }
}
