//! Phoenix router and Ecto schema extraction.
//!
//! The router is walked line by line with an explicit stack of open `do`
//! blocks. `scope` blocks contribute a path prefix and a controller alias,
//! `resources ... do` blocks nest their children under the parent member path,
//! and nothing declared inside a `pipeline` block is a route.

use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::{ExtractContext, Framework, FrameworkPlugin};
use crate::model::{HttpMethod, Route, Schema};
use crate::normalize::{convert, join};
use crate::source::{Language, SourceFile};
use crate::text::{find_calls, split_top_level, unquote};
use crate::type_mapper::{self, last_segment, TypeContext};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const MARKERS: &[ManifestMarker] = &[ManifestMarker::new(ManifestKind::Mix, ":phoenix")];

const VERBS: [&str; 8] = ["get", "post", "put", "patch", "delete", "options", "head", "trace"];

static ROUTER_USE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"use\s+(?:Phoenix\.Router\b|[\w.]+,\s*:router\b)").expect("valid router use regex")
});

static DEFMODULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^defmodule\s+([\w.]+)\s+do$").expect("valid defmodule regex"));

static BLOCK_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdo$").expect("valid do-block regex"));

static MODULE_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@(\w+)\s+(.+)$").expect("valid module attribute regex"));

/// Phoenix route extractor
pub struct PhoenixPlugin;

impl FrameworkPlugin for PhoenixPlugin {
    fn framework(&self) -> Framework {
        Framework::Phoenix
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Elixir]
    }

    fn manifest_markers(&self) -> &'static [ManifestMarker] {
        MARKERS
    }

    fn detect_file(&self, file: &SourceFile) -> bool {
        ROUTER_USE.is_match(&file.content)
    }

    fn declared_types(&self, file: &SourceFile) -> Vec<String> {
        let masked = file.masked();
        let lines = trimmed_lines(&masked);
        ecto_modules(&lines)
            .into_iter()
            .map(|module| module.title().to_string())
            .collect()
    }

    fn file_routes(&self, file: &SourceFile, _cx: &ExtractContext) -> Result<Vec<Route>> {
        let masked = file.masked();
        let mut walk = RouterWalk::new(file);
        for (idx, line) in trimmed_lines(&masked).into_iter().enumerate() {
            walk.step(idx + 1, line);
        }
        debug!("Found {} Phoenix routes in {}", walk.routes.len(), file.path.display());
        Ok(walk.routes)
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        let masked = file.masked();
        let lines = trimmed_lines(&masked);
        Ok(ecto_modules(&lines)
            .iter()
            .map(|module| module.schema(&cx.types))
            .collect())
    }
}

fn trimmed_lines(masked: &str) -> Vec<&str> {
    masked.lines().map(str::trim).collect()
}

/// Whether the line opens a block closed by a later `end`
fn opens_block(line: &str) -> bool {
    if BLOCK_OPEN.is_match(line) {
        return true;
    }
    line.ends_with("->") && line.split(|c: char| !c.is_alphanumeric() && c != '_').any(|w| w == "fn")
}

fn closes_block(line: &str) -> bool {
    line.strip_prefix("end")
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

/// Index of the `end` closing the block opened on `lines[start]`
fn block_end(lines: &[&str], start: usize) -> usize {
    let mut depth = 0;
    for (idx, line) in lines.iter().enumerate().skip(start) {
        if closes_block(line) {
            depth -= 1;
        }
        if opens_block(line) {
            depth += 1;
        }
        if depth <= 0 && idx > start {
            return idx;
        }
    }
    lines.len()
}

/// Arguments of a macro call such as `resources "/p", Ctrl, only: [:show]`
#[derive(Debug, Default)]
struct MacroArgs<'a> {
    positional: Vec<&'a str>,
    keywords: Vec<(&'a str, &'a str)>,
}

impl<'a> MacroArgs<'a> {
    fn parse(args: &'a str) -> Self {
        let args = args.trim();
        let args = args
            .strip_prefix('(')
            .and_then(|a| a.strip_suffix(')'))
            .unwrap_or(args);

        let mut parsed = MacroArgs::default();
        for part in split_top_level(args, ',') {
            match keyword(part) {
                Some((key, value)) => parsed.keywords.push((key, value)),
                None => parsed.positional.push(part),
            }
        }
        parsed
    }

    fn keyword(&self, key: &str) -> Option<&'a str> {
        self.keywords.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    fn string(&self, index: usize) -> Option<&'a str> {
        self.positional.get(index).and_then(|p| unquote(p))
    }
}

/// Split `key: value`, the keyword-list syntax
fn keyword(part: &str) -> Option<(&str, &str)> {
    let colon = part.find(':')?;
    let key = &part[..colon];
    let rest = &part[colon + 1..];
    let is_key = !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
    (is_key && rest.starts_with(char::is_whitespace)).then(|| (key, rest.trim()))
}

/// `:name` to `name`
fn atom(token: &str) -> Option<&str> {
    let name = token.trim().strip_prefix(':')?;
    let name = unquote(name).unwrap_or(name);
    (!name.is_empty()).then_some(name)
}

/// `[:a, :b]` or `~w(a b)a` to its atom names
fn atom_list(token: &str) -> Vec<String> {
    let token = token.trim();
    if let Some(words) = token.strip_prefix("~w(").and_then(|t| t.split(')').next()) {
        return words.split_whitespace().map(str::to_string).collect();
    }
    token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .map(|inner| {
            split_top_level(inner, ',')
                .into_iter()
                .filter_map(atom)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// An open `do` block in the router
#[derive(Debug, Clone, PartialEq)]
enum Block {
    Scope { prefix: String, alias: Option<String> },
    Resources { prefix: String },
    Pipeline,
    Other,
}

struct RouterWalk<'a> {
    file: &'a SourceFile,
    stack: Vec<Block>,
    routes: Vec<Route>,
}

impl<'a> RouterWalk<'a> {
    fn new(file: &'a SourceFile) -> Self {
        Self {
            file,
            stack: Vec::new(),
            routes: Vec::new(),
        }
    }

    fn prefix(&self) -> String {
        self.stack.iter().fold(String::new(), |acc, block| match block {
            Block::Scope { prefix, .. } | Block::Resources { prefix } => join(&acc, prefix),
            _ => acc,
        })
    }

    fn alias(&self) -> Vec<&str> {
        self.stack
            .iter()
            .filter_map(|block| match block {
                Block::Scope { alias: Some(alias), .. } => Some(alias.as_str()),
                _ => None,
            })
            .collect()
    }

    fn in_pipeline(&self) -> bool {
        self.stack.contains(&Block::Pipeline)
    }

    fn step(&mut self, line_no: usize, line: &str) {
        if line.is_empty() {
            return;
        }
        if closes_block(line) {
            if self.stack.pop().is_none() {
                debug!("Unbalanced `end` at line {} of {}", line_no, self.file.path.display());
            }
            return;
        }

        let opens = opens_block(line);
        let head = if BLOCK_OPEN.is_match(line) {
            line[..line.len() - 2].trim_end()
        } else {
            line
        };
        let word_len = head
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(head.len());
        let (word, rest) = head.split_at(word_len);
        let args = MacroArgs::parse(rest.trim_end_matches(','));

        let block = match word {
            "pipeline" => Block::Pipeline,
            "scope" => self.scope(&args),
            "resources" if !self.in_pipeline() => self.resources(line_no, &args),
            "match" if !self.in_pipeline() => {
                self.matched(line_no, &args);
                Block::Other
            }
            "live" if !self.in_pipeline() => {
                self.live(line_no, &args);
                Block::Other
            }
            verb if VERBS.contains(&verb) && !self.in_pipeline() => {
                if let Some(method) = HttpMethod::from_name(verb) {
                    self.verb(line_no, &[method], &args, 0);
                }
                Block::Other
            }
            _ => Block::Other,
        };
        if opens {
            self.stack.push(block);
        }
    }

    fn scope(&self, args: &MacroArgs<'_>) -> Block {
        let prefix = args
            .keyword("path")
            .and_then(unquote)
            .or_else(|| args.string(0))
            .unwrap_or_default();
        let alias = args
            .keyword("alias")
            .or_else(|| {
                args.positional
                    .iter()
                    .copied()
                    .find(|p| p.starts_with(|c: char| c.is_ascii_uppercase()))
            })
            .filter(|alias| *alias != "false")
            .map(str::to_string);
        Block::Scope {
            prefix: prefix.to_string(),
            alias,
        }
    }

    fn handler(&self, module: &str, action: Option<&str>) -> String {
        let mut parts = self.alias();
        parts.push(module);
        let module = parts.join(".");
        match action {
            Some(action) => format!("{}.{}", module, action),
            None => module,
        }
    }

    fn push(&mut self, method: HttpMethod, path: &str, handler: String, line_no: usize) {
        let path = convert(&join(&self.prefix(), path));
        self.routes
            .push(Route::new(method, path, handler, &self.file.path, line_no));
    }

    /// `verb "/path", Controller, :action` with positional arguments from `first`
    fn verb(&mut self, line_no: usize, methods: &[HttpMethod], args: &MacroArgs<'_>, first: usize) {
        let (Some(path), Some(controller)) = (args.string(first), args.positional.get(first + 1)) else {
            debug!("Skipping malformed route at line {}", line_no);
            return;
        };
        let action = args.positional.get(first + 2).and_then(|a| atom(a));
        let handler = self.handler(controller, action);
        for method in methods {
            self.push(*method, path, handler.clone(), line_no);
        }
    }

    /// `match :verb | [:a, :b] | :*, "/path", Controller, :action`
    fn matched(&mut self, line_no: usize, args: &MacroArgs<'_>) {
        let Some(spec) = args.positional.first() else {
            return;
        };
        let methods: Vec<HttpMethod> = if spec.trim() == ":*" {
            vec![HttpMethod::All]
        } else if spec.trim_start().starts_with('[') {
            atom_list(spec)
                .iter()
                .filter_map(|name| HttpMethod::from_name(name))
                .collect()
        } else {
            atom(spec).and_then(HttpMethod::from_name).into_iter().collect()
        };
        self.verb(line_no, &methods, args, 1);
    }

    /// `live "/path", Module, :action` is a GET
    fn live(&mut self, line_no: usize, args: &MacroArgs<'_>) {
        self.verb(line_no, &[HttpMethod::Get], args, 0);
    }

    /// Expand `resources` into its REST actions; returns the block for a `do` form
    fn resources(&mut self, line_no: usize, args: &MacroArgs<'_>) -> Block {
        let (Some(path), Some(controller)) = (args.string(0), args.positional.get(1).copied()) else {
            debug!("Skipping malformed resources at line {}", line_no);
            return Block::Other;
        };
        let singleton = args.keyword("singleton") == Some("true");
        let param = args
            .keyword("param")
            .and_then(unquote)
            .unwrap_or("id");
        let only = args.keyword("only").map(atom_list);
        let except = args.keyword("except").map(atom_list).unwrap_or_default();
        let wanted = |action: &str| {
            only.as_ref().map_or(true, |only| only.iter().any(|a| a == action))
                && !except.iter().any(|a| a == action)
        };

        let member = if singleton {
            path.to_string()
        } else {
            join(path, &format!("{{{}}}", param))
        };
        let mut actions: Vec<(HttpMethod, String, &str)> = Vec::new();
        if !singleton {
            actions.push((HttpMethod::Get, path.to_string(), "index"));
        }
        actions.extend([
            (HttpMethod::Get, join(path, "new"), "new"),
            (HttpMethod::Post, path.to_string(), "create"),
            (HttpMethod::Get, member.clone(), "show"),
            (HttpMethod::Get, join(&member, "edit"), "edit"),
            (HttpMethod::Patch, member.clone(), "update"),
            (HttpMethod::Put, member.clone(), "update"),
            (HttpMethod::Delete, member, "delete"),
        ]);

        for (method, action_path, action) in actions {
            if wanted(action) {
                let handler = self.handler(controller, Some(action));
                self.push(method, &action_path, handler, line_no);
            }
        }

        let nested = if singleton {
            path.to_string()
        } else {
            let name = args
                .keyword("name")
                .and_then(unquote)
                .map(str::to_string)
                .unwrap_or_else(|| resource_name(controller));
            join(path, &format!("{{{}_{}}}", name, param))
        };
        Block::Resources { prefix: nested }
    }
}

/// `MyAppWeb.PostCommentController` to `post_comment`
fn resource_name(controller: &str) -> String {
    let name = last_segment(controller);
    let name = name.strip_suffix("Controller").unwrap_or(name);
    let mut snake = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                snake.push('_');
            }
            snake.push(c.to_ascii_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}

/// A `defmodule` holding an Ecto `schema` or `embedded_schema` block
#[derive(Debug)]
struct EctoModule<'a> {
    name: &'a str,
    /// Lines of the whole module body
    body: &'a [&'a str],
    /// Lines inside the schema block, nested blocks excluded
    fields: Vec<&'a str>,
    /// `schema "table"` rather than `embedded_schema`
    has_table: bool,
}

fn ecto_modules<'a>(lines: &'a [&'a str]) -> Vec<EctoModule<'a>> {
    let mut modules = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let Some(caps) = DEFMODULE.captures(line) else {
            continue;
        };
        let end = block_end(lines, idx);
        let body = &lines[(idx + 1).min(end)..end];

        let mut i = 0;
        while i < body.len() {
            let line = body[i];
            let is_schema = line.starts_with("schema ") && opens_block(line);
            if is_schema || line == "embedded_schema do" {
                let close = block_end(body, i);
                modules.push(EctoModule {
                    name: caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
                    body,
                    fields: top_level(&body[i + 1..close.min(body.len())]),
                    has_table: is_schema,
                });
                break;
            }
            i = if opens_block(line) { block_end(body, i) + 1 } else { i + 1 };
        }
    }
    modules
}

/// Lines of a block body outside any nested block
fn top_level<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if opens_block(line) {
            i = block_end(lines, i) + 1;
        } else {
            found.push(line);
            i += 1;
        }
    }
    found
}

impl EctoModule<'_> {
    fn title(&self) -> &str {
        last_segment(self.name)
    }

    /// Value of `@name` in the module body
    fn attribute(&self, name: &str) -> Option<&str> {
        self.body.iter().find_map(|line| {
            let caps = MODULE_ATTRIBUTE.captures(line)?;
            (caps.get(1)?.as_str() == name).then(|| caps.get(2).map(|m| m.as_str()))?
        })
    }

    /// Fields named by `validate_required`, if the module calls it
    fn validated_required(&self) -> Option<Vec<String>> {
        let text = self.body.join("\n");
        let calls = find_calls(&text, "validate_required");
        if calls.is_empty() {
            return None;
        }
        let mut required = Vec::new();
        for (_, args) in calls {
            for arg in split_top_level(args, ',') {
                let list = match arg.strip_prefix('@') {
                    Some(name) => self.attribute(name).unwrap_or_default(),
                    None => arg,
                };
                required.extend(atom_list(list));
            }
        }
        Some(required)
    }

    fn schema(&self, types: &TypeContext) -> Schema {
        let mut schema = Schema::titled_object(self.title());
        let validated = self.validated_required();
        let is_required = |name: &str, has_default: bool| match &validated {
            Some(required) => required.iter().any(|r| r == name),
            None => !has_default,
        };

        if self.has_table && self.attribute("primary_key") != Some("false") {
            let id = match self.attribute("primary_key") {
                Some(key) if key.contains(":binary_id") => Schema::string().with_format("uuid"),
                _ => Schema::integer(),
            };
            schema.add_property("id", id, false);
        }

        for line in &self.fields {
            let word_len = line
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(line.len());
            let (word, rest) = line.split_at(word_len);
            let args = MacroArgs::parse(rest);
            let name = args.positional.first().and_then(|a| atom(a));
            let target = args.positional.get(1).map(|t| last_segment(t.trim()));

            match (word, name) {
                ("field", Some(name)) => {
                    let ty = args.positional.get(1).copied().unwrap_or(":string");
                    let property = if ty.trim().ends_with("Ecto.Enum") {
                        Schema::string().with_enum(args.keyword("values").map(atom_list).unwrap_or_default())
                    } else {
                        type_mapper::elixir(ty, types)
                    };
                    let required = is_required(name, args.keyword("default").is_some());
                    schema.add_property(name, property, required);
                }
                ("belongs_to", Some(name)) => {
                    let key = args
                        .keyword("foreign_key")
                        .and_then(atom)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{}_id", name));
                    let property = match args.keyword("type") {
                        Some(ty) => type_mapper::elixir(ty, types),
                        None => Schema::integer(),
                    };
                    let required = is_required(&key, false);
                    schema.add_property(key, property, required);
                }
                ("has_many" | "embeds_many" | "many_to_many", Some(name)) => {
                    let item = target.map(|t| types.named(t)).unwrap_or_else(Schema::object);
                    schema.add_property(name, Schema::array(item), false);
                }
                ("has_one" | "embeds_one", Some(name)) => {
                    let item = target.map(|t| types.named(t)).unwrap_or_else(Schema::object);
                    schema.add_property(name, item, false);
                }
                ("timestamps", _) => {
                    for stamp in ["inserted_at", "updated_at"] {
                        schema.add_property(stamp, Schema::string().with_format("date-time"), false);
                    }
                }
                _ => {}
            }
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractConfig;
    use crate::model::SchemaType;

    const ROUTER: &str = r#"defmodule MyAppWeb.Router do
  use MyAppWeb, :router

  pipeline :api do
    plug :accepts, ["json"]
    get "/never", NeverController, :x
  end

  scope "/api", MyAppWeb do
    pipe_through :api

    get "/users/:id", UserController, :show
    resources "/posts", PostController, only: [:index, :show] do
      resources "/comments", CommentController, except: [:new, :edit, :delete]
    end

    scope "/admin", Admin do
      resources "/settings", SettingsController, singleton: true, only: [:show, :update]
    end

    match :*, "/any", AnyController, :any
    match [:get, :post], "/multi", MultiController, :multi
    live "/dashboard", DashboardLive, :index
    forward "/jobs", JobsRouter
  end
end
"#;

    fn routes(code: &str) -> Vec<Route> {
        let file = SourceFile::new("lib/my_app_web/router.ex", Language::Elixir, code);
        PhoenixPlugin
            .extract_routes(&[file], &ExtractConfig::default())
            .items
    }

    #[test]
    fn test_router_walk() {
        let found = routes(ROUTER);
        let summary: Vec<_> = found
            .iter()
            .map(|r| (r.method, r.path.as_str(), r.source_line))
            .collect();
        assert_eq!(
            summary,
            vec![
                (HttpMethod::Get, "/api/users/{id}", 12),
                (HttpMethod::Get, "/api/posts", 13),
                (HttpMethod::Get, "/api/posts/{id}", 13),
                (HttpMethod::Get, "/api/posts/{post_id}/comments", 14),
                (HttpMethod::Post, "/api/posts/{post_id}/comments", 14),
                (HttpMethod::Get, "/api/posts/{post_id}/comments/{id}", 14),
                (HttpMethod::Patch, "/api/posts/{post_id}/comments/{id}", 14),
                (HttpMethod::Put, "/api/posts/{post_id}/comments/{id}", 14),
                (HttpMethod::Get, "/api/admin/settings", 18),
                (HttpMethod::Patch, "/api/admin/settings", 18),
                (HttpMethod::Put, "/api/admin/settings", 18),
                (HttpMethod::All, "/api/any", 21),
                (HttpMethod::Get, "/api/multi", 22),
                (HttpMethod::Post, "/api/multi", 22),
                (HttpMethod::Get, "/api/dashboard", 23),
            ]
        );
    }

    #[test]
    fn test_handlers_carry_scope_alias() {
        let found = routes(ROUTER);
        assert_eq!(found[0].handler, "MyAppWeb.UserController.show");
        assert_eq!(found[0].operation_id, "getShow");
        assert_eq!(found[8].handler, "MyAppWeb.Admin.SettingsController.show");
        assert_eq!(found[14].handler, "MyAppWeb.DashboardLive.index");

        let nested: Vec<_> = found[5].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(nested, vec!["post_id", "id"]);
    }

    #[test]
    fn test_resources_param_and_defaults() {
        let code = r#"defmodule ShopWeb.Router do
  use Phoenix.Router
  resources "/items", ItemController, param: "slug"
end
"#;
        let found = routes(code);
        let summary: Vec<_> = found.iter().map(|r| (r.method, r.path.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (HttpMethod::Get, "/items"),
                (HttpMethod::Get, "/items/new"),
                (HttpMethod::Post, "/items"),
                (HttpMethod::Get, "/items/{slug}"),
                (HttpMethod::Get, "/items/{slug}/edit"),
                (HttpMethod::Patch, "/items/{slug}"),
                (HttpMethod::Put, "/items/{slug}"),
                (HttpMethod::Delete, "/items/{slug}"),
            ]
        );
    }

    #[test]
    fn test_multiline_fn_does_not_close_scope() {
        let code = r#"defmodule AppWeb.Router do
  use AppWeb, :router
  scope "/v1" do
    get "/ping", PingController, :ping
    forward "/hooks", Plug.Hooks, init: fn opts ->
      opts
    end
    get "/pong", PingController, :pong
  end
  get "/root", PageController, :home
end
"#;
        let paths: Vec<_> = routes(code).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/v1/ping", "/v1/pong", "/root"]);
    }

    #[test]
    fn test_non_router_file_has_no_routes() {
        let code = "defmodule App.Util do\n  def get(a), do: a\nend\n";
        assert!(routes(code).is_empty());
    }

    const SCHEMAS: &str = r#"defmodule MyApp.Blog.Post do
  use Ecto.Schema
  import Ecto.Changeset

  @required_fields [:title, :status]

  schema "posts" do
    field :title, :string
    field :body, :string, default: ""
    field :status, Ecto.Enum, values: [:draft, :published]
    field :tags, {:array, :string}
    belongs_to :author, MyApp.Accounts.User
    has_many :comments, MyApp.Blog.Comment
    embeds_one :meta, MyApp.Blog.Meta
    timestamps()
  end

  def changeset(post, attrs) do
    post
    |> cast(attrs, [:title, :body, :status])
    |> validate_required(@required_fields)
  end
end

defmodule MyApp.Blog.Comment do
  use Ecto.Schema

  embedded_schema do
    field :text, :string
    field :likes, :integer, default: 0
  end
end
"#;

    #[test]
    fn test_ecto_schemas() {
        let file = SourceFile::new("lib/my_app/blog/post.ex", Language::Elixir, SCHEMAS);
        let schemas = PhoenixPlugin
            .extract_schemas(&[file], &ExtractConfig::default())
            .items;
        assert_eq!(schemas.len(), 2);

        let post = &schemas[0];
        assert_eq!(post.title.as_deref(), Some("Post"));
        let keys: Vec<_> = post.properties.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "title",
                "body",
                "status",
                "tags",
                "author_id",
                "comments",
                "meta",
                "inserted_at",
                "updated_at"
            ]
        );
        assert_eq!(post.required, vec!["title", "status"]);
        assert_eq!(post.properties["status"].enum_values, vec!["draft", "published"]);
        assert!(post.properties["tags"].is_array());
        assert_eq!(
            post.properties["comments"].items.as_ref().and_then(|s| s.ref_name()),
            Some("Comment")
        );
        assert_eq!(post.properties["meta"].schema_type, Some(SchemaType::Object));

        let comment = &schemas[1];
        let keys: Vec<_> = comment.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["text", "likes"]);
        assert_eq!(comment.required, vec!["text"]);
    }

    #[test]
    fn test_block_end() {
        let lines = trimmed_lines("scope do\n  if x do\n  end\nend\nafter");
        assert_eq!(block_end(&lines, 0), 3);
        assert_eq!(block_end(&lines, 1), 2);
    }
}
