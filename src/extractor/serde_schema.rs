//! Schemas for Rust types deriving `Serialize` or `Deserialize`.
//!
//! Shared by the Axum and Rocket plugins. Struct fields become properties, with
//! the serde attributes that change the wire shape honoured: `rename`,
//! `rename_all`, `skip`, `default` and `flatten`. Unit-only enums become string
//! enums. Validation attributes such as `#[validate(...)]` are not interpreted.

use crate::config::{ExtractConfig, OptionPrecedence};
use crate::extractor::rust_support::{self, generic_arg, type_segment};
use crate::extractor::{Extraction, Framework};
use crate::model::Schema;
use crate::source::SourceFile;
use crate::type_mapper::TypeContext;
use log::debug;
use std::collections::HashMap;
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{Attribute, Fields, Item, ItemEnum, ItemStruct, Token, Type};

/// Serde attributes that affect a field or container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerdeAttributes {
    /// Renamed field name
    pub rename: Option<String>,
    /// Container-wide renaming rule
    pub rename_all: Option<String>,
    /// Whether to skip this field during serialization
    pub skip: bool,
    /// Whether a missing value falls back to `Default`
    pub default: bool,
    /// Whether to flatten this field
    pub flatten: bool,
}

/// One serialized field of a struct
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    /// Rust identifier
    pub ident: String,
    /// Wire name after renaming
    pub key: String,
    pub schema: Schema,
    pub required: bool,
    /// Type name of a `#[serde(flatten)]` field
    pub flatten: Option<String>,
}

/// A schema whose flattened fields are not merged in yet
#[derive(Debug, Clone)]
struct SchemaDraft {
    schema: Schema,
    flattened: Vec<String>,
}

/// Extract the schemas of every serde type in the Rust files of the set.
///
/// Struct and enum names from all files form the type context, so a field typed
/// with a struct declared in another file becomes a `$ref`. Files that fail to
/// parse are reported in [`Extraction::skipped`].
pub fn extract(files: &[SourceFile], framework: Framework, config: &ExtractConfig) -> Extraction<Schema> {
    let (parsed, skipped) = rust_support::parse_all(files, framework);

    let ctx = TypeContext::from_names(parsed.iter().flat_map(|p| declared_names(&p.syntax_tree)));

    let mut drafts = Vec::new();
    for file in &parsed {
        debug!("Extracting serde schemas from {}", file.path.display());
        drafts.extend(drafts_from_items(&file.syntax_tree.items, &ctx, config.option_precedence));
    }

    Extraction {
        items: resolve_flatten(drafts),
        skipped,
    }
}

/// Schemas of the serde types declared in one parsed file
pub fn file_schemas(tree: &syn::File, ctx: &TypeContext, precedence: OptionPrecedence) -> Vec<Schema> {
    resolve_flatten(drafts_from_items(&tree.items, ctx, precedence))
}

/// Names of the serde types a file declares, including those in inline modules
pub fn declared_names(tree: &syn::File) -> Vec<String> {
    let mut names = Vec::new();
    collect_names(&tree.items, &mut names);
    names
}

fn collect_names(items: &[Item], names: &mut Vec<String>) {
    for item in items {
        match item {
            Item::Struct(s) if derives_serde(&s.attrs) => names.push(s.ident.to_string()),
            Item::Enum(e) if derives_serde(&e.attrs) => names.push(e.ident.to_string()),
            Item::Mod(m) => {
                if let Some((_, items)) = &m.content {
                    collect_names(items, names);
                }
            }
            _ => {}
        }
    }
}

/// Every struct declared in a file (serde or not), by name
pub fn struct_table(tree: &syn::File) -> HashMap<String, ItemStruct> {
    let mut table = HashMap::new();
    collect_structs(&tree.items, &mut table);
    table
}

fn collect_structs(items: &[Item], table: &mut HashMap<String, ItemStruct>) {
    for item in items {
        match item {
            Item::Struct(s) => {
                table.insert(s.ident.to_string(), s.clone());
            }
            Item::Mod(m) => {
                if let Some((_, items)) = &m.content {
                    collect_structs(items, table);
                }
            }
            _ => {}
        }
    }
}

/// Whether `#[derive(...)]` lists `Serialize` or `Deserialize`
pub fn derives_serde(attrs: &[Attribute]) -> bool {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("derive"))
        .filter_map(|attr| {
            attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)
                .ok()
        })
        .flatten()
        .any(|path| {
            path.segments
                .last()
                .is_some_and(|s| s.ident == "Serialize" || s.ident == "Deserialize")
        })
}

fn drafts_from_items(items: &[Item], ctx: &TypeContext, precedence: OptionPrecedence) -> Vec<SchemaDraft> {
    let mut drafts = Vec::new();
    for item in items {
        match item {
            Item::Struct(s) if derives_serde(&s.attrs) => drafts.push(struct_draft(s, ctx, precedence)),
            Item::Enum(e) if derives_serde(&e.attrs) => drafts.push(SchemaDraft {
                schema: enum_schema(e),
                flattened: Vec::new(),
            }),
            Item::Mod(m) => {
                if let Some((_, items)) = &m.content {
                    drafts.extend(drafts_from_items(items, ctx, precedence));
                }
            }
            _ => {}
        }
    }
    drafts
}

fn struct_draft(item: &ItemStruct, ctx: &TypeContext, precedence: OptionPrecedence) -> SchemaDraft {
    let name = item.ident.to_string();
    debug!("Generating schema for struct: {}", name);

    let mut schema = match &item.fields {
        Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
            let mut inner = map_type(&fields.unnamed[0].ty, ctx, precedence);
            inner.title = Some(name.clone());
            inner
        }
        Fields::Unnamed(_) => Schema {
            title: Some(name.clone()),
            ..Schema::array(Schema::object())
        },
        _ => Schema::titled_object(&name),
    };
    schema.description = doc_comment(&item.attrs);

    let mut flattened = Vec::new();
    for field in struct_fields(item, ctx, precedence) {
        match field.flatten {
            Some(target) => flattened.push(target),
            None => schema.add_property(field.key, field.schema, field.required),
        }
    }

    SchemaDraft { schema, flattened }
}

/// The serialized fields of a struct with named fields, in declaration order.
///
/// Skipped fields are left out; `Option` fields and `#[serde(default)]` fields are
/// not required.
pub fn struct_fields(item: &ItemStruct, ctx: &TypeContext, precedence: OptionPrecedence) -> Vec<FieldEntry> {
    let container = serde_attributes(&item.attrs);
    let container_default = container.default;

    let Fields::Named(named) = &item.fields else {
        return Vec::new();
    };

    named
        .named
        .iter()
        .filter_map(|field| {
            let ident = field.ident.as_ref()?.to_string();
            let ident = ident.trim_start_matches("r#").to_string();
            let attrs = serde_attributes(&field.attrs);
            if attrs.skip {
                debug!("Skipping field {} (serde skip)", ident);
                return None;
            }

            let key = attrs
                .rename
                .clone()
                .unwrap_or_else(|| rename_case(&ident, container.rename_all.as_deref()));
            let optional = rust_support::unwrap_named(&field.ty, "Option").is_some();
            let mut schema = map_type(&field.ty, ctx, precedence);
            if schema.description.is_none() {
                schema.description = doc_comment(&field.attrs);
            }

            Some(FieldEntry {
                ident,
                key,
                required: !optional && !attrs.default && !container_default,
                flatten: attrs
                    .flatten
                    .then(|| rust_support::type_name(&field.ty))
                    .flatten(),
                schema,
            })
        })
        .collect()
}

fn enum_schema(item: &ItemEnum) -> Schema {
    let name = item.ident.to_string();
    debug!("Generating schema for enum: {}", name);
    let container = serde_attributes(&item.attrs);

    let unit_only = item
        .variants
        .iter()
        .all(|v| matches!(v.fields, Fields::Unit));

    let variant_names: Vec<String> = item
        .variants
        .iter()
        .filter_map(|variant| {
            let attrs = serde_attributes(&variant.attrs);
            if attrs.skip {
                return None;
            }
            Some(attrs.rename.unwrap_or_else(|| {
                rename_case(&variant.ident.to_string(), container.rename_all.as_deref())
            }))
        })
        .collect();

    let mut schema = if unit_only {
        Schema::string().with_enum(variant_names)
    } else {
        // Data-carrying variants: keep the type visible without modelling each arm
        let mut object = Schema::object();
        object.description = Some(format!("One of: {}", variant_names.join(", ")));
        object
    };
    schema.title = Some(name);
    if let Some(doc) = doc_comment(&item.attrs) {
        schema.description = Some(doc);
    }
    schema
}

/// Merge the properties of `#[serde(flatten)]` targets into their containers
fn resolve_flatten(drafts: Vec<SchemaDraft>) -> Vec<Schema> {
    let by_name: HashMap<String, Schema> = drafts
        .iter()
        .filter_map(|d| d.schema.title.clone().map(|t| (t, d.schema.clone())))
        .collect();

    drafts
        .into_iter()
        .map(|draft| {
            let mut schema = draft.schema;
            for target in &draft.flattened {
                match by_name.get(target) {
                    Some(source) => {
                        for (key, property) in &source.properties {
                            let required = source.required.contains(key);
                            schema.add_property(key.clone(), property.clone(), required);
                        }
                    }
                    None => debug!("Flattened type {} not found", target),
                }
            }
            schema
        })
        .collect()
}

/// Map a Rust type to a schema.
///
/// `Option` handling follows `precedence`: composed, `Option<Vec<T>>` is a nullable
/// array of `T`; legacy, the option replaces the array typing and the result is
/// `T`'s schema marked nullable.
pub fn map_type(ty: &Type, ctx: &TypeContext, precedence: OptionPrecedence) -> Schema {
    match ty {
        Type::Reference(reference) => map_type(&reference.elem, ctx, precedence),
        Type::Group(group) => map_type(&group.elem, ctx, precedence),
        Type::Paren(paren) => map_type(&paren.elem, ctx, precedence),
        Type::Slice(slice) => Schema::array(map_type(&slice.elem, ctx, precedence)),
        Type::Array(array) => Schema::array(map_type(&array.elem, ctx, precedence)),
        Type::Path(_) => map_path_type(ty, ctx, precedence),
        _ => Schema::object(),
    }
}

fn map_path_type(ty: &Type, ctx: &TypeContext, precedence: OptionPrecedence) -> Schema {
    let Some(segment) = type_segment(ty) else {
        return Schema::object();
    };
    let name = segment.ident.to_string();
    let inner = |n: usize| generic_arg(segment, n).map(|t| map_type(t, ctx, precedence));

    match name.as_str() {
        "Option" => {
            let Some(inner) = inner(0) else {
                return Schema::object().nullable();
            };
            match precedence {
                OptionPrecedence::Composed => inner.nullable(),
                OptionPrecedence::Legacy => match inner.items {
                    Some(items) if inner.schema_type == Some(crate::model::SchemaType::Array) => {
                        (*items).nullable()
                    }
                    _ => inner.nullable(),
                },
            }
        }
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "LinkedList" | "IndexSet" => {
            Schema::array(inner(0).unwrap_or_else(Schema::object))
        }
        "HashMap" | "BTreeMap" | "IndexMap" | "Map" | "Value" => Schema::object(),
        "Box" | "Arc" | "Rc" | "Json" | "Cell" | "RefCell" => {
            inner(0).unwrap_or_else(Schema::object)
        }
        "Cow" => generic_arg(segment, 0)
            .or_else(|| generic_arg(segment, 1))
            .map(|t| map_type(t, ctx, precedence))
            .unwrap_or_else(Schema::string),
        "String" | "str" | "char" => Schema::string(),
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => Schema::integer().with_format("int32"),
        "i64" | "u64" | "i128" | "u128" | "isize" | "usize" => {
            Schema::integer().with_format("int64")
        }
        "f32" => Schema::number().with_format("float"),
        "f64" => Schema::number().with_format("double"),
        "Decimal" => Schema::number(),
        "bool" => Schema::boolean(),
        "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "PrimitiveDateTime" | "SystemTime"
        | "Timestamp" => Schema::string().with_format("date-time"),
        "NaiveDate" | "Date" => Schema::string().with_format("date"),
        "NaiveTime" | "Time" => Schema::string().with_format("time"),
        "Uuid" => Schema::string().with_format("uuid"),
        "Url" => Schema::string().with_format("uri"),
        other => ctx.named(other),
    }
}

/// Read the serde attributes of a field, variant or container
pub fn serde_attributes(attrs: &[Attribute]) -> SerdeAttributes {
    let mut serde_attrs = SerdeAttributes::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                serde_attrs.rename = renamed_value(&meta)?;
            } else if meta.path.is_ident("rename_all") {
                serde_attrs.rename_all = renamed_value(&meta)?;
            } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                serde_attrs.skip = true;
            } else if meta.path.is_ident("default") {
                serde_attrs.default = true;
                skip_value(&meta)?;
            } else if meta.path.is_ident("flatten") {
                serde_attrs.flatten = true;
            } else {
                skip_value(&meta)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            debug!("Ignoring unparsable serde attribute: {}", e);
        }
    }

    serde_attrs
}

/// `rename = "x"`, or the `serialize` half of `rename(serialize = "x", ...)`
fn renamed_value(meta: &ParseNestedMeta) -> syn::Result<Option<String>> {
    if meta.input.peek(Token![=]) {
        let lit: syn::LitStr = meta.value()?.parse()?;
        return Ok(Some(lit.value()));
    }

    let mut value = None;
    meta.parse_nested_meta(|inner| {
        let lit: syn::LitStr = inner.value()?.parse()?;
        if inner.path.is_ident("serialize") || value.is_none() {
            value = Some(lit.value());
        }
        Ok(())
    })?;
    Ok(value)
}

/// Consume `= value` or `(...)` after a key we do not interpret
fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_value(&inner))?;
    }
    Ok(())
}

/// Apply a serde `rename_all` rule to a field or variant identifier
pub fn rename_case(ident: &str, rule: Option<&str>) -> String {
    let Some(rule) = rule else {
        return ident.to_string();
    };
    let words = split_words(ident);
    let capitalized = || words.iter().map(|w| capitalize(w)).collect::<Vec<_>>();

    match rule {
        "lowercase" => ident.to_lowercase(),
        "UPPERCASE" => ident.to_uppercase(),
        "PascalCase" => capitalized().concat(),
        "camelCase" => {
            let mut out = words.first().map(|w| w.to_lowercase()).unwrap_or_default();
            out.push_str(&capitalized()[1.min(words.len())..].concat());
            out
        }
        "snake_case" => words.join("_"),
        "SCREAMING_SNAKE_CASE" => words.join("_").to_uppercase(),
        "kebab-case" => words.join("-"),
        "SCREAMING-KEBAB-CASE" => words.join("-").to_uppercase(),
        _ => ident.to_string(),
    }
}

/// Lower-case words of a snake_case or PascalCase identifier
fn split_words(ident: &str) -> Vec<String> {
    let mut words = Vec::new();
    for part in ident.split('_').filter(|p| !p.is_empty()) {
        let mut current = String::new();
        let mut prev_lower = false;
        for c in part.chars() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            current.extend(c.to_lowercase());
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Joined `///` doc comment lines
pub fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => rust_support::string_lit(&nv.value),
            _ => None,
        })
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaType;
    use crate::source::Language;

    fn schemas(code: &str, precedence: OptionPrecedence) -> Vec<Schema> {
        let tree = syn::parse_file(code).expect("Failed to parse test code");
        let ctx = TypeContext::from_names(declared_names(&tree));
        file_schemas(&tree, &ctx, precedence)
    }

    fn find<'a>(schemas: &'a [Schema], title: &str) -> &'a Schema {
        schemas
            .iter()
            .find(|s| s.title.as_deref() == Some(title))
            .unwrap_or_else(|| panic!("schema {} not found", title))
    }

    #[test]
    fn test_struct_schema_generation() {
        let code = r#"
            use serde::Serialize;

            /// A registered user
            #[derive(Serialize)]
            pub struct User {
                pub id: u64,
                pub name: String,
                pub active: bool,
                pub score: f32,
            }

            pub struct NotSerialized {
                pub id: u64,
            }
        "#;
        let schemas = schemas(code, OptionPrecedence::Composed);

        assert_eq!(schemas.len(), 1);
        let user = &schemas[0];
        assert_eq!(user.title.as_deref(), Some("User"));
        assert_eq!(user.description.as_deref(), Some("A registered user"));
        assert_eq!(user.schema_type, Some(SchemaType::Object));
        assert_eq!(user.required, vec!["id", "name", "active", "score"]);
        assert_eq!(user.properties["id"].format.as_deref(), Some("int64"));
        assert_eq!(user.properties["score"].format.as_deref(), Some("float"));
    }

    #[test]
    fn test_option_vec_legacy_precedence() {
        let code = r#"
            #[derive(Deserialize)]
            struct Author {
                posts: Option<Vec<String>>,
            }
        "#;
        let schemas = schemas(code, OptionPrecedence::Legacy);
        let posts = &schemas[0].properties["posts"];

        assert_eq!(posts.schema_type, Some(SchemaType::String));
        assert!(posts.nullable);
        assert!(posts.items.is_none());
        assert!(schemas[0].required.is_empty());
    }

    #[test]
    fn test_option_vec_composed_precedence() {
        let code = r#"
            #[derive(Deserialize)]
            struct Author {
                posts: Option<Vec<String>>,
            }
        "#;
        let schemas = schemas(code, OptionPrecedence::Composed);
        let posts = &schemas[0].properties["posts"];

        assert!(posts.is_array());
        assert!(posts.nullable);
        assert_eq!(posts.items.as_deref(), Some(&Schema::string()));
    }

    #[test]
    fn test_serde_rename_skip_default() {
        let code = r#"
            #[derive(Serialize, Deserialize)]
            #[serde(rename_all = "camelCase")]
            struct Profile {
                user_name: String,
                #[serde(rename = "mail")]
                email_address: String,
                #[serde(skip)]
                password_hash: String,
                #[serde(default, skip_serializing_if = "Vec::is_empty")]
                favourite_tags: Vec<String>,
            }
        "#;
        let schemas = schemas(code, OptionPrecedence::Composed);
        let keys: Vec<_> = schemas[0].properties.keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["userName", "mail", "favouriteTags"]);
        assert_eq!(schemas[0].required, vec!["userName", "mail"]);
    }

    #[test]
    fn test_unit_enum_becomes_string_enum() {
        let code = r#"
            #[derive(Serialize)]
            #[serde(rename_all = "snake_case")]
            enum Status {
                Active,
                OnHold,
                #[serde(rename = "gone")]
                Deleted,
            }
        "#;
        let schemas = schemas(code, OptionPrecedence::Composed);

        assert_eq!(schemas[0].schema_type, Some(SchemaType::String));
        assert_eq!(schemas[0].enum_values, vec!["active", "on_hold", "gone"]);
    }

    #[test]
    fn test_known_types_become_refs() {
        let code = r#"
            #[derive(Serialize)]
            struct Address { city: String }

            #[derive(Serialize)]
            struct Customer {
                home: Address,
                previous: Vec<Address>,
                extra: Box<Unknown>,
                id: uuid::Uuid,
                created: chrono::DateTime<chrono::Utc>,
            }
        "#;
        let schemas = schemas(code, OptionPrecedence::Composed);
        let customer = find(&schemas, "Customer");

        assert_eq!(customer.properties["home"].ref_name(), Some("Address"));
        assert_eq!(
            customer.properties["previous"].items.as_ref().and_then(|i| i.ref_name()),
            Some("Address")
        );
        assert_eq!(customer.properties["extra"], Schema::object());
        assert_eq!(customer.properties["id"].format.as_deref(), Some("uuid"));
        assert_eq!(customer.properties["created"].format.as_deref(), Some("date-time"));
    }

    #[test]
    fn test_flatten_merges_properties() {
        let code = r#"
            #[derive(Serialize)]
            struct Pagination { page: u32, per_page: Option<u32> }

            #[derive(Serialize)]
            struct ListQuery {
                search: String,
                #[serde(flatten)]
                pagination: Pagination,
            }
        "#;
        let schemas = schemas(code, OptionPrecedence::Composed);
        let query = find(&schemas, "ListQuery");
        let keys: Vec<_> = query.properties.keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["search", "page", "per_page"]);
        assert_eq!(query.required, vec!["search", "page"]);
    }

    #[test]
    fn test_rename_case_rules() {
        assert_eq!(rename_case("user_id", Some("camelCase")), "userId");
        assert_eq!(rename_case("user_id", Some("PascalCase")), "UserId");
        assert_eq!(rename_case("user_id", Some("kebab-case")), "user-id");
        assert_eq!(rename_case("user_id", Some("SCREAMING_SNAKE_CASE")), "USER_ID");
        assert_eq!(rename_case("InProgress", Some("snake_case")), "in_progress");
        assert_eq!(rename_case("InProgress", Some("camelCase")), "inProgress");
        assert_eq!(rename_case("InProgress", Some("lowercase")), "inprogress");
        assert_eq!(rename_case("plain", None), "plain");
    }

    #[test]
    fn test_extract_across_files_reports_parse_failures() {
        let files = vec![
            SourceFile::new(
                "a.rs",
                Language::Rust,
                "#[derive(Serialize)] struct Order { customer: Customer }",
            ),
            SourceFile::new("b.rs", Language::Rust, "#[derive(Serialize)] struct Customer { id: i32 }"),
            SourceFile::new("c.rs", Language::Rust, "struct Broken {"),
        ];
        let extraction = extract(&files, Framework::Axum, &ExtractConfig::default());

        assert_eq!(extraction.items.len(), 2);
        assert_eq!(
            extraction.items[0].properties["customer"].ref_name(),
            Some("Customer")
        );
        assert_eq!(extraction.skipped.len(), 1);
    }
}
