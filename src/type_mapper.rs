//! Source type names to OpenAPI schemas.
//!
//! One entry point per language family. Each takes the type exactly as written in
//! the source (`std::optional<int64_t>`, `List<String>`, `Optional[str]`) and maps
//! it to a [`Schema`]. Names found in the [`TypeContext`] become `$ref`s; anything
//! else that is not a known primitive or container becomes a plain `object`.
//!
//! Rust types are handled on the syn AST by
//! [`serde_schema`](crate::extractor::serde_schema) instead.

use crate::model::Schema;
use crate::text::{find_closing, find_closing_angle, split_generics, split_top_level, unquote};
use std::collections::HashSet;

/// The type names a plugin has seen declared in its file set.
#[derive(Debug, Clone, Default)]
pub struct TypeContext {
    known: HashSet<String>,
}

impl TypeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.known.insert(name.into());
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// `$ref` for a known name, `object` otherwise
    pub fn named(&self, name: &str) -> Schema {
        let name = last_segment(name.trim());
        if self.is_known(name) {
            Schema::reference_to(name)
        } else {
            Schema::object()
        }
    }
}

/// Split `Outer<A, B>` into `("Outer", ["A", "B"])`
pub fn generic_parts(ty: &str) -> Option<(&str, Vec<&str>)> {
    let ty = ty.trim();
    let open = ty.find('<')?;
    let close = find_closing_angle(ty, open)?;
    if close != ty.len() - 1 {
        return None;
    }
    Some((ty[..open].trim(), split_generics(&ty[open + 1..close])))
}

/// Split `Outer[A, B]` into `("Outer", ["A", "B"])`
pub fn subscript_parts(ty: &str) -> Option<(&str, Vec<&str>)> {
    let ty = ty.trim();
    let open = ty.find('[')?;
    let close = find_closing(ty, open)?;
    if close != ty.len() - 1 || open == 0 {
        return None;
    }
    Some((ty[..open].trim(), split_top_level(&ty[open + 1..close], ',')))
}

/// Last segment of a `::` or `.` qualified name
pub fn last_segment(name: &str) -> &str {
    let name = name.rsplit("::").next().unwrap_or(name);
    name.rsplit('.').next().unwrap_or(name)
}

fn int32() -> Schema {
    Schema::integer().with_format("int32")
}

fn int64() -> Schema {
    Schema::integer().with_format("int64")
}

fn float() -> Schema {
    Schema::number().with_format("float")
}

fn double() -> Schema {
    Schema::number().with_format("double")
}

fn date_time() -> Schema {
    Schema::string().with_format("date-time")
}

fn date() -> Schema {
    Schema::string().with_format("date")
}

fn uuid() -> Schema {
    Schema::string().with_format("uuid")
}

/// C++ types as used by Drogon controllers and plain DTO structs
pub fn cpp(ty: &str, ctx: &TypeContext) -> Schema {
    let ty = clean_cpp(ty);

    if let Some((outer, args)) = generic_parts(&ty) {
        let inner = args.first().copied().unwrap_or_default();
        return match last_segment(outer) {
            "optional" => cpp(inner, ctx).nullable(),
            "vector" | "list" | "deque" | "set" | "unordered_set" | "array" => {
                Schema::array(cpp(inner, ctx))
            }
            "map" | "unordered_map" => Schema::object(),
            "shared_ptr" | "unique_ptr" => cpp(inner, ctx),
            _ => ctx.named(outer),
        };
    }

    match ty.as_str() {
        "std::string" | "string" | "std::string_view" | "string_view" | "char*" | "char" => {
            Schema::string()
        }
        "int" | "int32_t" | "int16_t" | "int8_t" | "short" | "unsigned" | "unsigned int"
        | "uint32_t" | "uint16_t" | "uint8_t" => int32(),
        "long" | "long long" | "int64_t" | "uint64_t" | "size_t" | "unsigned long"
        | "unsigned long long" => int64(),
        "float" => float(),
        "double" | "long double" => double(),
        "bool" => Schema::boolean(),
        "trantor::Date" => date_time(),
        "Json::Value" => Schema::object(),
        other => ctx.named(other),
    }
}

fn clean_cpp(ty: &str) -> String {
    let mut ty = ty.trim();
    loop {
        let before = ty;
        ty = ty
            .trim_start_matches("const ")
            .trim_start_matches("struct ")
            .trim_end_matches('&')
            .trim_end_matches("const")
            .trim();
        if before == ty {
            break;
        }
    }
    if let Some(stripped) = ty.strip_suffix('*').filter(|t| *t != "char") {
        ty = stripped.trim();
    }
    ty.to_string()
}

/// Oat++ DTO and endpoint types (`String`, `Int64`, `Object<UserDto>`, `Vector<...>`)
pub fn oatpp(ty: &str, ctx: &TypeContext) -> Schema {
    let ty = ty
        .trim()
        .trim_start_matches("oatpp::")
        .trim_start_matches("data::mapping::type::")
        .trim_end_matches("::AsString")
        .trim_end_matches("::AsNumber");

    if let Some((outer, args)) = generic_parts(ty) {
        let inner = args.first().copied().unwrap_or_default();
        return match last_segment(outer) {
            "Object" => Schema::reference_to(last_segment(inner.trim())),
            "Vector" | "List" | "UnorderedSet" => Schema::array(oatpp(inner, ctx)),
            "Fields" | "UnorderedFields" => Schema::object(),
            "Enum" if ctx.is_known(last_segment(inner.trim())) => {
                Schema::reference_to(last_segment(inner.trim()))
            }
            "Enum" => Schema::string(),
            _ => cpp(ty, ctx),
        };
    }

    match ty {
        "String" => Schema::string(),
        "Int8" | "UInt8" | "Int16" | "UInt16" | "Int32" | "UInt32" => int32(),
        "Int64" | "UInt64" => int64(),
        "Float32" => float(),
        "Float64" => double(),
        "Boolean" => Schema::boolean(),
        "Any" => Schema::object(),
        other => cpp(other, ctx),
    }
}

/// C# types (FastEndpoints request/response classes)
pub fn csharp(ty: &str, ctx: &TypeContext) -> Schema {
    let ty = ty.trim();

    if let Some(inner) = ty.strip_suffix('?') {
        return csharp(inner, ctx).nullable();
    }
    if let Some(inner) = ty.strip_suffix("[]") {
        return Schema::array(csharp(inner, ctx));
    }
    if let Some((outer, args)) = generic_parts(ty) {
        let inner = args.first().copied().unwrap_or_default();
        return match last_segment(outer) {
            "Nullable" => csharp(inner, ctx).nullable(),
            "List" | "IList" | "IEnumerable" | "ICollection" | "IReadOnlyList"
            | "IReadOnlyCollection" | "HashSet" | "ISet" | "Collection" => {
                Schema::array(csharp(inner, ctx))
            }
            "Dictionary" | "IDictionary" | "IReadOnlyDictionary" => Schema::object(),
            "Task" | "ValueTask" | "ActionResult" | "Results" | "Ok" => csharp(inner, ctx),
            _ => ctx.named(outer),
        };
    }

    match last_segment(ty) {
        "string" | "String" | "char" | "Char" | "TimeSpan" => Schema::string(),
        "int" | "Int32" | "short" | "Int16" | "byte" | "Byte" | "sbyte" | "uint" | "ushort" => {
            int32()
        }
        "long" | "Int64" | "ulong" => int64(),
        "float" | "Single" => float(),
        "double" | "Double" => double(),
        "decimal" | "Decimal" => Schema::number(),
        "bool" | "Boolean" => Schema::boolean(),
        "Guid" => uuid(),
        "DateTime" | "DateTimeOffset" => date_time(),
        "DateOnly" => date(),
        "IFormFile" => Schema::string().with_format("binary"),
        "object" | "dynamic" | "JsonElement" => Schema::object(),
        other => ctx.named(other),
    }
}

/// Java types (Micronaut controllers and beans)
pub fn java(ty: &str, ctx: &TypeContext) -> Schema {
    let ty = ty.trim();

    if let Some(inner) = ty.strip_suffix("[]") {
        return Schema::array(java(inner, ctx));
    }
    if let Some((outer, args)) = generic_parts(ty) {
        let inner = args.first().copied().unwrap_or_default();
        return match last_segment(outer) {
            "Optional" => java(inner, ctx).nullable(),
            "List" | "ArrayList" | "LinkedList" | "Set" | "HashSet" | "TreeSet" | "Collection"
            | "Iterable" | "Flux" | "Flowable" => Schema::array(java(inner, ctx)),
            "Map" | "HashMap" | "TreeMap" | "LinkedHashMap" => Schema::object(),
            _ => ctx.named(outer),
        };
    }

    match last_segment(ty) {
        "String" | "CharSequence" | "char" | "Character" => Schema::string(),
        "int" | "Integer" | "short" | "Short" | "byte" | "Byte" => int32(),
        "long" | "Long" => int64(),
        "BigInteger" => Schema::integer(),
        "float" | "Float" => float(),
        "double" | "Double" => double(),
        "BigDecimal" => Schema::number(),
        "boolean" | "Boolean" => Schema::boolean(),
        "UUID" => uuid(),
        "LocalDate" => date(),
        "LocalDateTime" | "Instant" | "ZonedDateTime" | "OffsetDateTime" | "Date" => date_time(),
        "Object" => Schema::object(),
        other => ctx.named(other),
    }
}

/// Kotlin types; falls back to [`java`] for JVM library types
pub fn kotlin(ty: &str, ctx: &TypeContext) -> Schema {
    let ty = ty.trim();

    if let Some(inner) = ty.strip_suffix('?') {
        return kotlin(inner, ctx).nullable();
    }
    if let Some((outer, args)) = generic_parts(ty) {
        let inner = args.first().copied().unwrap_or_default();
        return match last_segment(outer) {
            "List" | "MutableList" | "Set" | "MutableSet" | "Collection" | "Array"
            | "Sequence" | "Iterable" | "Flow" => Schema::array(kotlin(inner, ctx)),
            "Map" | "MutableMap" => Schema::object(),
            _ => java(ty, ctx),
        };
    }

    match last_segment(ty) {
        "String" | "Char" => Schema::string(),
        "Int" | "Short" | "Byte" => int32(),
        "Long" => int64(),
        "Float" => float(),
        "Double" => double(),
        "Boolean" => Schema::boolean(),
        "IntArray" | "ShortArray" => Schema::array(int32()),
        "LongArray" => Schema::array(int64()),
        "Any" => Schema::object(),
        _ => java(ty, ctx),
    }
}

/// TypeScript types as written in interfaces and type aliases
pub fn typescript(ty: &str, ctx: &TypeContext) -> Schema {
    let ty = ty.trim().trim_start_matches('|').trim();

    let variants = split_top_level(ty, '|');
    if variants.len() > 1 {
        let nullable = variants
            .iter()
            .any(|v| matches!(*v, "null" | "undefined"));
        let rest: Vec<&str> = variants
            .into_iter()
            .filter(|v| !matches!(*v, "null" | "undefined"))
            .collect();

        let literals: Vec<String> = rest
            .iter()
            .filter_map(|v| unquote(v))
            .map(str::to_string)
            .collect();
        let schema = if !rest.is_empty() && literals.len() == rest.len() {
            Schema::string().with_enum(literals)
        } else if rest.len() == 1 {
            typescript(rest[0], ctx)
        } else {
            Schema::object()
        };
        return if nullable { schema.nullable() } else { schema };
    }

    if let Some(inner) = ty.strip_suffix("[]") {
        return Schema::array(typescript(inner, ctx));
    }
    if ty.starts_with('(') && ty.ends_with(')') {
        return typescript(&ty[1..ty.len() - 1], ctx);
    }
    if let Some(literal) = unquote(ty) {
        return Schema::string().with_enum(vec![literal.to_string()]);
    }
    if let Some((outer, args)) = generic_parts(ty) {
        let inner = args.first().copied().unwrap_or_default();
        return match outer {
            "Array" | "ReadonlyArray" | "Set" => Schema::array(typescript(inner, ctx)),
            "Promise" | "Partial" | "Required" | "Readonly" => typescript(inner, ctx),
            "Record" | "Map" => Schema::object(),
            _ => ctx.named(outer),
        };
    }
    if ty.starts_with('{') {
        return Schema::object();
    }

    match ty {
        "string" => Schema::string(),
        "number" => Schema::number(),
        "bigint" => Schema::integer(),
        "boolean" => Schema::boolean(),
        "Date" => date_time(),
        "any" | "unknown" | "object" | "Object" => Schema::object(),
        other => ctx.named(other),
    }
}

/// Python annotations (Pydantic models, DRF helpers)
pub fn python(ty: &str, ctx: &TypeContext) -> Schema {
    let ty = ty.trim();

    let variants = split_top_level(ty, '|');
    if variants.len() > 1 {
        let nullable = variants.contains(&"None");
        let rest: Vec<&str> = variants.into_iter().filter(|v| *v != "None").collect();
        let schema = if rest.len() == 1 {
            python(rest[0], ctx)
        } else {
            Schema::object()
        };
        return if nullable { schema.nullable() } else { schema };
    }

    if let Some((outer, args)) = subscript_parts(ty) {
        let inner = args.first().copied().unwrap_or_default();
        return match last_segment(outer) {
            "Optional" => python(inner, ctx).nullable(),
            "Union" => {
                let nullable = args.contains(&"None");
                let rest: Vec<&str> = args.iter().copied().filter(|a| *a != "None").collect();
                let schema = if rest.len() == 1 {
                    python(rest[0], ctx)
                } else {
                    Schema::object()
                };
                if nullable {
                    schema.nullable()
                } else {
                    schema
                }
            }
            "List" | "list" | "Sequence" | "Set" | "set" | "FrozenSet" | "frozenset" | "Tuple"
            | "tuple" | "Iterable" => Schema::array(python(inner, ctx)),
            "Dict" | "dict" | "Mapping" => Schema::object(),
            "Literal" => Schema::string().with_enum(
                args.iter()
                    .filter_map(|a| unquote(a))
                    .map(str::to_string)
                    .collect(),
            ),
            "Annotated" => python(inner, ctx),
            _ => ctx.named(outer),
        };
    }

    match last_segment(ty) {
        "str" => Schema::string(),
        "int" => Schema::integer(),
        "float" => Schema::number(),
        "Decimal" => Schema::number(),
        "bool" => Schema::boolean(),
        "bytes" => Schema::string().with_format("binary"),
        "datetime" => date_time(),
        "date" => date(),
        "UUID" | "UUID4" => uuid(),
        "EmailStr" => Schema::string().with_format("email"),
        "HttpUrl" | "AnyUrl" | "AnyHttpUrl" => Schema::string().with_format("uri"),
        "Any" | "dict" | "object" => Schema::object(),
        "list" => Schema::array(Schema::object()),
        other => ctx.named(other),
    }
}

/// Ecto field types (`:string`, `{:array, :integer}`, `MyApp.Money`)
pub fn elixir(ty: &str, ctx: &TypeContext) -> Schema {
    let ty = ty.trim();

    if ty.starts_with('{') && ty.ends_with('}') {
        let parts = split_top_level(&ty[1..ty.len() - 1], ',');
        return match parts.as_slice() {
            [":array", inner] => Schema::array(elixir(inner, ctx)),
            [":map", ..] => Schema::object(),
            _ => Schema::object(),
        };
    }

    match ty {
        ":string" | ":binary" => Schema::string(),
        ":integer" | ":id" => Schema::integer(),
        ":binary_id" => uuid(),
        ":float" => double(),
        ":decimal" => Schema::number(),
        ":boolean" => Schema::boolean(),
        ":date" => date(),
        ":time" | ":time_usec" => Schema::string().with_format("time"),
        ":naive_datetime" | ":naive_datetime_usec" | ":utc_datetime" | ":utc_datetime_usec" => {
            date_time()
        }
        ":map" | ":any" => Schema::object(),
        other => ctx.named(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaType;

    fn ctx() -> TypeContext {
        TypeContext::from_names(["UserDto", "Address"])
    }

    #[test]
    fn test_generic_parts() {
        let (outer, args) = generic_parts("Map<String, List<Integer>>").unwrap();
        assert_eq!(outer, "Map");
        assert_eq!(args, vec!["String", "List<Integer>"]);
        assert!(generic_parts("String").is_none());
    }

    #[test]
    fn test_cpp_types() {
        assert_eq!(cpp("const std::string &", &ctx()), Schema::string());
        assert_eq!(cpp("int64_t", &ctx()).format.as_deref(), Some("int64"));
        let list = cpp("std::vector<UserDto>", &ctx());
        assert!(list.is_array());
        assert_eq!(list.items.unwrap().ref_name(), Some("UserDto"));
        let opt = cpp("std::optional<double>", &ctx());
        assert!(opt.nullable);
        assert_eq!(opt.schema_type, Some(SchemaType::Number));
        assert_eq!(cpp("Widget", &ctx()), Schema::object());
    }

    #[test]
    fn test_oatpp_types() {
        assert_eq!(oatpp("String", &ctx()), Schema::string());
        assert_eq!(oatpp("oatpp::Int32", &ctx()).format.as_deref(), Some("int32"));
        assert_eq!(oatpp("Object<UserDto>", &ctx()).ref_name(), Some("UserDto"));
        let list = oatpp("Vector<Object<UserDto>>", &ctx());
        assert_eq!(list.items.unwrap().ref_name(), Some("UserDto"));
    }

    #[test]
    fn test_csharp_types() {
        let n = csharp("int?", &ctx());
        assert!(n.nullable);
        assert_eq!(n.schema_type, Some(SchemaType::Integer));
        assert_eq!(csharp("Guid", &ctx()).format.as_deref(), Some("uuid"));
        assert!(csharp("List<string>", &ctx()).is_array());
        assert!(csharp("string[]", &ctx()).is_array());
        assert_eq!(csharp("UserDto", &ctx()).ref_name(), Some("UserDto"));
    }

    #[test]
    fn test_java_and_kotlin_types() {
        assert!(java("Optional<String>", &ctx()).nullable);
        assert_eq!(java("java.util.UUID", &ctx()).format.as_deref(), Some("uuid"));
        assert!(java("List<Address>", &ctx()).is_array());
        assert!(kotlin("String?", &ctx()).nullable);
        assert_eq!(kotlin("Int", &ctx()).format.as_deref(), Some("int32"));
        assert_eq!(kotlin("LocalDate", &ctx()).format.as_deref(), Some("date"));
    }

    #[test]
    fn test_typescript_types() {
        assert_eq!(typescript("string", &ctx()), Schema::string());
        assert!(typescript("UserDto[]", &ctx()).is_array());
        let status = typescript("'active' | 'banned'", &ctx());
        assert_eq!(status.enum_values, vec!["active", "banned"]);
        let maybe = typescript("string | null", &ctx());
        assert!(maybe.nullable);
        assert_eq!(maybe.schema_type, Some(SchemaType::String));
        assert_eq!(typescript("Promise<UserDto>", &ctx()).ref_name(), Some("UserDto"));
    }

    #[test]
    fn test_python_types() {
        assert!(python("Optional[str]", &ctx()).nullable);
        assert!(python("str | None", &ctx()).nullable);
        assert!(python("List[int]", &ctx()).is_array());
        assert_eq!(
            python("Literal['a', 'b']", &ctx()).enum_values,
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(python("EmailStr", &ctx()).format.as_deref(), Some("email"));
    }

    #[test]
    fn test_elixir_types() {
        assert_eq!(elixir(":string", &ctx()), Schema::string());
        assert_eq!(elixir(":binary_id", &ctx()).format.as_deref(), Some("uuid"));
        assert!(elixir("{:array, :integer}", &ctx()).is_array());
        assert_eq!(elixir(":utc_datetime", &ctx()).format.as_deref(), Some("date-time"));
    }

    #[test]
    fn test_unknown_defaults_to_object() {
        assert_eq!(java("Mystery", &ctx()), Schema::object());
        assert_eq!(python("Mystery", &ctx()), Schema::object());
    }
}
