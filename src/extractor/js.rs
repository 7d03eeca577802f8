//! JavaScript and TypeScript scanning shared by the Hono and Express plugins.
//!
//! [`tokenize`] turns comment-masked source into identifiers, strings, templates,
//! numbers and punctuation, each tagged with its line. [`SymbolTable::build`]
//! then records, once per file, the router variables, their mount prefixes,
//! string constants and zod object schemas. [`route_calls`] walks every call
//! chain rooted at a router variable and reports the verb calls it finds;
//! each plugin decides what its middleware arguments mean.

use crate::model::{HttpMethod, Schema};
use crate::normalize::join;
use crate::text::{find_closing, split_top_level, string_literals, unquote};
use crate::type_mapper::{self, TypeContext};
use indexmap::IndexMap;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Router methods that register a route
const VERB_METHODS: [&str; 8] = ["get", "post", "put", "delete", "patch", "head", "options", "all"];

/// Keywords after which a `/` starts a regular expression literal
const REGEX_PRECEDERS: [&str; 7] = ["return", "typeof", "case", "in", "of", "delete", "void"];

static TEMPLATE_SUBSTITUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\s*([^}]*?)\s*\}").expect("valid template substitution regex"));

static INTERFACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\binterface\s+([A-Za-z_$][\w$]*)\s*(?:<[^{]*?>)?\s*(?:extends\s+[^{]+)?\{")
        .expect("valid interface regex")
});

static TYPE_ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\btype\s+([A-Za-z_$][\w$]*)\s*(?:<[^=]*?>)?\s*=\s*").expect("valid type alias regex")
});

static MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)^(?:readonly\s+)?([A-Za-z_$][\w$]*|"[^"]+"|'[^']+')(\?)?\s*:\s*(.+)$"#)
        .expect("valid interface member regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    /// Single- or double-quoted string
    Str,
    /// Backtick template literal
    Template,
    Number,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Identifier or punctuation text; for strings and templates, the content
    /// between the quotes
    pub text: &'a str,
    pub offset: usize,
    pub line: usize,
}

impl Token<'_> {
    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    /// Offset just past the token
    pub fn end(&self) -> usize {
        match self.kind {
            TokenKind::Str | TokenKind::Template => self.offset + self.text.len() + 2,
            _ => self.offset + self.text.len(),
        }
    }
}

/// Lex comment-masked JavaScript or TypeScript.
///
/// Regular expression literals are skipped. Template literals are one token,
/// substitutions included. Unterminated strings end at the line break.
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    const PUNCT3: [&str; 3] = ["...", "===", "!=="];
    const PUNCT2: [&str; 10] = ["=>", "?.", "??", "==", "!=", "<=", ">=", "&&", "||", "::"];

    let bytes = src.as_bytes();
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let start = i;
        let kind = match b {
            b'\n' => {
                line += 1;
                i += 1;
                continue;
            }
            _ if b.is_ascii_whitespace() => {
                i += 1;
                continue;
            }
            b'"' | b'\'' | b'`' => {
                let end = literal_end(bytes, i);
                let inner_end = if end > i + 1 && bytes[end - 1] == b { end - 1 } else { end };
                tokens.push(Token {
                    kind: if b == b'`' { TokenKind::Template } else { TokenKind::Str },
                    text: &src[i + 1..inner_end.max(i + 1)],
                    offset: i,
                    line,
                });
                line += bytes[i..end].iter().filter(|c| **c == b'\n').count();
                i = end;
                continue;
            }
            b'/' if regex_allowed(tokens.last()) => {
                if let Some(end) = regex_end(bytes, i) {
                    i = end;
                    continue;
                }
                i += 1;
                TokenKind::Punct
            }
            _ if is_ident_start(b) => {
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                TokenKind::Ident
            }
            _ if b.is_ascii_digit() => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_') {
                    i += 1;
                }
                TokenKind::Number
            }
            _ => {
                let rest = &src[i..];
                let len = PUNCT3
                    .iter()
                    .chain(PUNCT2.iter())
                    .find(|p| rest.starts_with(**p))
                    .map(|p| p.len())
                    .unwrap_or_else(|| rest.chars().next().map_or(1, char::len_utf8));
                i += len;
                TokenKind::Punct
            }
        };
        tokens.push(Token {
            kind,
            text: &src[start..i],
            offset: start,
            line,
        });
    }
    tokens
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_byte(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// Offset just past the string or template literal starting at `start`
fn literal_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut depth = 0;
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' | b'\'' | b'`' if depth > 0 => {
                i = literal_end(bytes, i);
                continue;
            }
            b'$' if quote == b'`' && bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
                continue;
            }
            b'{' if depth > 0 => depth += 1,
            b'}' if depth > 0 => depth -= 1,
            b'\n' if quote != b'`' => return i,
            _ if b == quote && depth == 0 => return i + 1,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

fn regex_allowed(previous: Option<&Token<'_>>) -> bool {
    match previous {
        None => true,
        Some(token) => match token.kind {
            TokenKind::Punct => !matches!(token.text, ")" | "]" | "}"),
            TokenKind::Ident => REGEX_PRECEDERS.contains(&token.text),
            _ => false,
        },
    }
}

/// End of a regular expression literal, or `None` when the `/` is division
fn regex_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut in_class = false;
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'\n' => return None,
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the token closing the bracket at `open`
pub fn matching(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.kind != TokenKind::Punct {
            continue;
        }
        match token.text {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Arguments between the brackets at `open` and `close`, split at top-level commas
pub fn call_args<'t, 'a>(tokens: &'t [Token<'a>], open: usize, close: usize) -> Vec<&'t [Token<'a>]> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = open + 1;
    for i in open + 1..close {
        let token = &tokens[i];
        if token.kind != TokenKind::Punct {
            continue;
        }
        match token.text {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth -= 1,
            "," if depth == 0 => {
                if i > start {
                    args.push(&tokens[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if close > start {
        args.push(&tokens[start..close]);
    }
    args
}

/// Source text covered by `tokens`
pub fn text_of<'a>(src: &'a str, tokens: &[Token<'_>]) -> &'a str {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => src.get(first.offset..last.end().min(src.len())).unwrap_or_default(),
        _ => "",
    }
}

/// `a.b.c` when the whole argument is a dotted identifier
pub fn reference_name(arg: &[Token<'_>]) -> Option<String> {
    let dotted = arg.iter().enumerate().all(|(i, t)| {
        if i % 2 == 0 {
            t.kind == TokenKind::Ident
        } else {
            t.is_punct(".")
        }
    });
    (dotted && arg.len() % 2 == 1).then(|| arg.iter().map(|t| t.text).collect())
}

/// Callee of a call-expression argument: `express.json` for `express.json()`,
/// with the index of its opening parenthesis
pub fn callee(arg: &[Token<'_>]) -> Option<(String, usize)> {
    let open = arg.iter().position(|t| t.is_punct("("))?;
    let name = reference_name(&arg[..open])?;
    Some((name, open))
}

/// Handler name from the last route argument: a reference, or the single
/// reference wrapped by a call such as `asyncHandler(users.list)`. Inline
/// functions give an empty name.
pub fn handler_name(arg: &[Token<'_>]) -> String {
    if arg
        .first()
        .is_some_and(|t| t.is_ident("async") || t.is_ident("function"))
    {
        return String::new();
    }
    if let Some(name) = reference_name(arg) {
        return name;
    }
    if let Some((_, open)) = callee(arg) {
        if let Some(close) = matching(arg, open) {
            if let [inner] = call_args(arg, open, close).as_slice() {
                if let Some(name) = reference_name(inner) {
                    return name;
                }
            }
        }
    }
    String::new()
}

/// Value tokens of `key: value` in an object literal argument. Computed keys
/// such as `[Segments.BODY]` match on their last segment, case-insensitively.
pub fn object_entry<'t, 'a>(arg: &'t [Token<'a>], key: &str) -> Option<&'t [Token<'a>]> {
    if !arg.first()?.is_punct("{") {
        return None;
    }
    let close = matching(arg, 0)?;
    for entry in call_args(arg, 0, close) {
        let Some(colon) = entry.iter().position(|t| t.is_punct(":")) else {
            continue;
        };
        let key_tokens = &entry[..colon];
        let matches = match key_tokens {
            [single] => single.text == key,
            [open, .., last, close] if open.is_punct("[") && close.is_punct("]") => {
                last.text.eq_ignore_ascii_case(key)
            }
            _ => false,
        };
        if matches && colon + 1 < entry.len() {
            return Some(&entry[colon + 1..]);
        }
    }
    None
}

/// How a framework creates and mounts routers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Hono,
    Express,
}

impl Dialect {
    /// Method mounting a child router: Hono `route`, Express `use`
    fn mount_method(self) -> &'static str {
        match self {
            Dialect::Hono => "route",
            Dialect::Express => "use",
        }
    }

    /// Index of the closing `)` of a router constructor starting at `start`:
    /// `new Hono<Env>()`, `express()`, `express.Router()` or `Router()`
    fn constructor_end(self, tokens: &[Token<'_>], start: usize) -> Option<usize> {
        let token = |i: usize| tokens.get(i);
        let mut i = start;
        match self {
            Dialect::Hono => {
                if !token(i)?.is_ident("new") || !matches!(token(i + 1)?.text, "Hono" | "OpenAPIHono") {
                    return None;
                }
                i += 2;
                if token(i)?.is_punct("<") {
                    let mut depth = 0;
                    while let Some(t) = token(i) {
                        if t.is_punct("<") {
                            depth += 1;
                        } else if t.is_punct(">") {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        i += 1;
                    }
                    i += 1;
                }
            }
            Dialect::Express => {
                if token(i)?.is_ident("express") {
                    i += 1;
                    if token(i)?.is_punct(".") && token(i + 1)?.is_ident("Router") {
                        i += 2;
                    }
                } else if token(i)?.is_ident("Router") {
                    i += 1;
                } else {
                    return None;
                }
            }
        }
        if !token(i)?.is_punct("(") {
            return None;
        }
        matching(tokens, i)
    }
}

#[derive(Debug, Clone, Default)]
struct RouterVar<'a> {
    /// `.basePath("/p")` applied at construction
    base: String,
    /// Parent router and the prefix it mounts this one under
    mount: Option<(&'a str, String)>,
}

/// A `const Name = z.object({ ... })` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ZodObject<'a> {
    /// Component name: the variable name without a `Schema` suffix
    pub title: String,
    /// Text between the object literal's braces
    pub body: &'a str,
}

/// Per-file declarations consulted by the route walk
#[derive(Debug, Default)]
pub struct SymbolTable<'a> {
    routers: IndexMap<&'a str, RouterVar<'a>>,
    constants: IndexMap<&'a str, String>,
    zod: IndexMap<&'a str, ZodObject<'a>>,
}

impl<'a> SymbolTable<'a> {
    pub fn build(src: &'a str, tokens: &[Token<'a>], dialect: Dialect) -> Self {
        let mut table = SymbolTable::default();

        for i in 0..tokens.len() {
            let Some((name, init)) = declaration_at(tokens, i) else {
                continue;
            };
            if let Some(close) = dialect.constructor_end(tokens, init) {
                let mut router = RouterVar::default();
                let mut j = close + 1;
                while let Some((method, open, close)) = chained_call(tokens, j) {
                    if method == "basePath" {
                        if let Some(path) = call_args(tokens, open, close)
                            .first()
                            .and_then(|arg| table.string_arg(arg))
                        {
                            router.base = join(&router.base, &path);
                        }
                    }
                    j = close + 1;
                }
                table.routers.insert(name, router);
            } else if table.routers.contains_key(tokens[init].text) {
                if let Some(("basePath", open, close)) = chained_call(tokens, init + 1) {
                    let path = call_args(tokens, open, close)
                        .first()
                        .and_then(|arg| table.string_arg(arg))
                        .unwrap_or_default();
                    let router = RouterVar {
                        base: String::new(),
                        mount: Some((tokens[init].text, path)),
                    };
                    table.routers.insert(name, router);
                }
            } else if let Some(zod) = zod_object_at(src, tokens, init) {
                table.zod.insert(name, ZodObject {
                    title: zod_title(name),
                    body: zod,
                });
            } else if let Some(value) = constant_at(tokens, init) {
                table.constants.insert(name, value);
            }
        }

        for i in 0..tokens.len() {
            table.record_mount(tokens, i, dialect);
        }
        table
    }

    fn record_mount(&mut self, tokens: &[Token<'a>], i: usize, dialect: Dialect) {
        let parent = tokens[i].text;
        if !self.is_router_root(tokens, i) {
            return;
        }
        let Some((method, open, close)) = chained_call(tokens, i + 1) else {
            return;
        };
        if method != dialect.mount_method() {
            return;
        }
        let args = call_args(tokens, open, close);
        let Some(child) = args.last().and_then(|arg| reference_name(arg)) else {
            return;
        };
        let prefix = if args.len() >= 2 {
            match self.string_arg(args[0]) {
                Some(prefix) => prefix,
                None => return,
            }
        } else {
            String::new()
        };
        let Some((child_key, _)) = self.routers.get_key_value(child.as_str()) else {
            return;
        };
        let child_key = *child_key;
        if child_key == parent {
            return;
        }
        if let Some(router) = self.routers.get_mut(child_key) {
            match &router.mount {
                Some((existing, _)) => {
                    debug!("Router {} already mounted under {}; ignoring {}", child_key, existing, parent)
                }
                None => router.mount = Some((parent, prefix)),
            }
        }
    }

    /// Whether `tokens[i]` is a router variable starting a call chain
    fn is_router_root(&self, tokens: &[Token<'_>], i: usize) -> bool {
        let token = &tokens[i];
        token.kind == TokenKind::Ident
            && self.routers.contains_key(token.text)
            && !(i > 0 && (tokens[i - 1].is_punct(".") || tokens[i - 1].is_punct("?.")))
    }

    /// Full mount prefix of a router variable
    pub fn prefix(&self, name: &str) -> String {
        self.prefix_at(name, 0)
    }

    fn prefix_at(&self, name: &str, depth: usize) -> String {
        let Some(router) = self.routers.get(name) else {
            return String::new();
        };
        let parent = match &router.mount {
            Some((parent, prefix)) if depth < 16 => join(&self.prefix_at(parent, depth + 1), prefix),
            _ => String::new(),
        };
        join(&parent, &router.base)
    }

    pub fn zod(&self, name: &str) -> Option<&ZodObject<'a>> {
        self.zod.get(name)
    }

    /// A string-valued argument: a literal, a template with known constants
    /// substituted, or a string constant
    pub fn string_arg(&self, arg: &[Token<'_>]) -> Option<String> {
        match arg {
            [token] => match token.kind {
                TokenKind::Str => Some(token.text.to_string()),
                TokenKind::Template => Some(self.expand_template(token.text)),
                TokenKind::Ident => self.constants.get(token.text).cloned(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Substitute `${NAME}` with known constants; unknown expressions become
    /// `{name}` placeholders
    fn expand_template(&self, template: &str) -> String {
        TEMPLATE_SUBSTITUTION
            .replace_all(template, |caps: &regex::Captures<'_>| {
                let expr = &caps[1];
                match self.constants.get(expr) {
                    Some(value) => value.clone(),
                    None => {
                        let name = expr.rsplit('.').next().unwrap_or(expr);
                        format!("{{{}}}", name)
                    }
                }
            })
            .into_owned()
    }
}

/// `const|let|var name [: Type] =` at `i`: the name and the initializer index
fn declaration_at<'a>(tokens: &[Token<'a>], i: usize) -> Option<(&'a str, usize)> {
    let keyword = tokens.get(i)?;
    if !matches!(keyword.text, "const" | "let" | "var") || keyword.kind != TokenKind::Ident {
        return None;
    }
    let name = tokens.get(i + 1)?;
    if name.kind != TokenKind::Ident {
        return None;
    }
    let mut j = i + 2;
    if tokens.get(j)?.is_punct(":") {
        while !tokens.get(j)?.is_punct("=") {
            if tokens[j].is_punct(";") || j > i + 24 {
                return None;
            }
            j += 1;
        }
    }
    (tokens.get(j)?.is_punct("=") && j + 1 < tokens.len()).then_some((name.text, j + 1))
}

/// `.method(` at `i`: the method name and its bracket indices
fn chained_call<'a>(tokens: &[Token<'a>], i: usize) -> Option<(&'a str, usize, usize)> {
    let dot = tokens.get(i)?;
    let name = tokens.get(i + 1)?;
    if !(dot.is_punct(".") || dot.is_punct("?.")) || name.kind != TokenKind::Ident {
        return None;
    }
    if !tokens.get(i + 2)?.is_punct("(") {
        return None;
    }
    let close = matching(tokens, i + 2)?;
    Some((name.text, i + 2, close))
}

/// Body of `z.object({ ... })` at `i`
fn zod_object_at<'a>(src: &'a str, tokens: &[Token<'_>], i: usize) -> Option<&'a str> {
    let [z, dot, object, paren, brace] = tokens.get(i..i + 5)? else {
        return None;
    };
    if !(z.is_ident("z") && dot.is_punct(".") && object.is_ident("object") && paren.is_punct("(") && brace.is_punct("{")) {
        return None;
    }
    let close = matching(tokens, i + 4)?;
    src.get(brace.offset + 1..tokens[close].offset)
}

/// A plain string initializer: `'/api'` or a template without substitutions
fn constant_at(tokens: &[Token<'_>], i: usize) -> Option<String> {
    let value = tokens.get(i)?;
    let ends = tokens
        .get(i + 1)
        .map_or(true, |next| next.is_punct(";") || next.line > value.line);
    match value.kind {
        TokenKind::Str if ends => Some(value.text.to_string()),
        TokenKind::Template if ends && !value.text.contains("${") => Some(value.text.to_string()),
        _ => None,
    }
}

fn zod_title(name: &str) -> String {
    name.strip_suffix("Schema")
        .filter(|rest| !rest.is_empty())
        .map(|rest| {
            let mut chars = rest.chars();
            chars
                .next()
                .map(|c| c.to_ascii_uppercase().to_string() + chars.as_str())
                .unwrap_or_default()
        })
        .unwrap_or_else(|| name.to_string())
}

/// A verb call found on a router chain
#[derive(Debug)]
pub struct RouteCall<'t, 'a> {
    pub methods: Vec<HttpMethod>,
    /// Mount prefix joined with the route path, not yet converted
    pub path: String,
    pub handler: String,
    /// Arguments between the path and the handler
    pub middleware: Vec<&'t [Token<'a>]>,
    pub line: usize,
}

/// Every route registered on a router variable's call chains.
///
/// With `propagate` off, mount prefixes and `basePath` are left out of the paths.
pub fn route_calls<'t, 'a>(
    tokens: &'t [Token<'a>],
    table: &SymbolTable<'a>,
    dialect: Dialect,
    propagate: bool,
) -> Vec<RouteCall<'t, 'a>> {
    let mut calls = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if !table.is_router_root(tokens, i) {
            i += 1;
            continue;
        }
        let mut prefix = if propagate {
            table.prefix(tokens[i].text)
        } else {
            String::new()
        };
        let mut route_path: Option<String> = None;
        let mut j = i + 1;

        while let Some((method, open, close)) = chained_call(tokens, j) {
            let args = call_args(tokens, open, close);
            let line = tokens[j + 1].line;
            match method {
                "basePath" if dialect == Dialect::Hono && propagate => {
                    if let Some(path) = args.first().and_then(|arg| table.string_arg(arg)) {
                        prefix = join(&prefix, &path);
                    }
                }
                "route" if dialect == Dialect::Express && args.len() == 1 => {
                    route_path = table.string_arg(args[0]);
                }
                "on" if dialect == Dialect::Hono => {
                    if let Some(call) = on_call(&args, &prefix, table, line) {
                        calls.push(call);
                    }
                }
                verb if VERB_METHODS.contains(&verb) => {
                    let method = HttpMethod::from_name(verb);
                    let call = match (&route_path, method) {
                        (Some(path), Some(method)) if !args.is_empty() => Some(RouteCall {
                            methods: vec![method],
                            path: join(&prefix, path),
                            handler: args.last().map(|a| handler_name(a)).unwrap_or_default(),
                            middleware: args[..args.len() - 1].to_vec(),
                            line,
                        }),
                        (None, Some(method)) => verb_call(method, &args, &prefix, table, line),
                        _ => None,
                    };
                    calls.extend(call);
                }
                _ => {}
            }
            j = close + 1;
        }
        i = j.max(i + 1);
    }
    calls
}

/// `.get(path, ...middleware, handler)`; a single argument is not a route
/// (Express `app.get('env')` reads a setting)
fn verb_call<'t, 'a>(
    method: HttpMethod,
    args: &[&'t [Token<'a>]],
    prefix: &str,
    table: &SymbolTable<'_>,
    line: usize,
) -> Option<RouteCall<'t, 'a>> {
    if args.len() < 2 {
        return None;
    }
    let Some(path) = table.string_arg(args[0]) else {
        debug!("Skipping {} route with a non-literal path at line {}", method, line);
        return None;
    };
    Some(RouteCall {
        methods: vec![method],
        path: join(prefix, &path),
        handler: handler_name(args[args.len() - 1]),
        middleware: args[1..args.len() - 1].to_vec(),
        line,
    })
}

/// Hono `on('PURGE' | ['GET', 'POST'], path, ...middleware, handler)`
fn on_call<'t, 'a>(
    args: &[&'t [Token<'a>]],
    prefix: &str,
    table: &SymbolTable<'_>,
    line: usize,
) -> Option<RouteCall<'t, 'a>> {
    if args.len() < 3 {
        return None;
    }
    let methods: Vec<HttpMethod> = args[0]
        .iter()
        .filter(|t| t.kind == TokenKind::Str)
        .filter_map(|t| HttpMethod::from_name(t.text))
        .collect();
    if methods.is_empty() {
        debug!("Skipping on() route with unsupported methods at line {}", line);
        return None;
    }
    let mut call = verb_call(methods[0], &args[1..], prefix, table, line)?;
    call.methods = methods;
    Some(call)
}

/// Schema named by a validator argument: a zod variable, any declared type, or
/// an inline zod expression
pub fn schema_of(arg: &[Token<'_>], src: &str, table: &SymbolTable<'_>, types: &TypeContext) -> Schema {
    if let Some(name) = reference_name(arg) {
        let name = type_mapper::last_segment(&name);
        if let Some(zod) = table.zod(name) {
            return types.named(&zod.title);
        }
        let title = zod_title(name);
        return if types.is_known(&title) {
            types.named(&title)
        } else {
            types.named(name)
        };
    }
    match arg {
        [z, dot, ..] if z.is_ident("z") && dot.is_punct(".") => zod_type(text_of(src, arg), types).0,
        _ => Schema::object(),
    }
}

/// Fields of a zod object given by variable name or inline `z.object({...})`
pub fn fields_of(arg: &[Token<'_>], src: &str, table: &SymbolTable<'_>, types: &TypeContext) -> Vec<ZodField> {
    if let Some(name) = reference_name(arg) {
        return table
            .zod(&name)
            .map(|zod| zod_fields(zod.body, types))
            .unwrap_or_default();
    }
    let text = text_of(src, arg);
    text.strip_prefix("z.object(")
        .and_then(|t| t.strip_suffix(')'))
        .map(str::trim)
        .and_then(|t| t.strip_prefix('{'))
        .and_then(|t| t.strip_suffix('}'))
        .map(|body| zod_fields(body, types))
        .unwrap_or_default()
}

/// Names of the schemas [`file_schemas`] produces for this file
pub fn declared_types(masked: &str) -> Vec<String> {
    let mut names: Vec<String> = INTERFACE
        .captures_iter(masked)
        .chain(TYPE_ALIAS.captures_iter(masked))
        .map(|caps| caps[1].to_string())
        .collect();
    let tokens = tokenize(masked);
    names.extend(zod_objects(masked, &tokens).into_iter().map(|z| z.title));
    names
}

/// TypeScript interfaces, object and string-union type aliases, and zod objects
pub fn file_schemas(masked: &str, types: &TypeContext) -> Vec<Schema> {
    let mut schemas = Vec::new();

    for caps in INTERFACE.captures_iter(masked) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let open = whole.end() - 1;
        if let Some(close) = find_closing(masked, open) {
            schemas.push(object_type(name.as_str(), &masked[open + 1..close], types));
        }
    }

    for caps in TYPE_ALIAS.captures_iter(masked) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let rest = &masked[whole.end()..];
        if rest.starts_with('{') {
            if let Some(close) = find_closing(rest, 0) {
                schemas.push(object_type(name.as_str(), &rest[1..close], types));
            }
            continue;
        }
        let end = rest.find([';', '\n']).unwrap_or(rest.len());
        let mut schema = type_mapper::typescript(&rest[..end], types);
        if !schema.enum_values.is_empty() {
            schema.title = Some(name.as_str().to_string());
            schemas.push(schema);
        }
    }

    let tokens = tokenize(masked);
    for zod in zod_objects(masked, &tokens) {
        let mut schema = zod_object(zod.body, types);
        schema.title = Some(zod.title);
        schemas.push(schema);
    }
    schemas
}

fn zod_objects<'a>(src: &'a str, tokens: &[Token<'a>]) -> Vec<ZodObject<'a>> {
    (0..tokens.len())
        .filter_map(|i| {
            let (name, init) = declaration_at(tokens, i)?;
            let body = zod_object_at(src, tokens, init)?;
            Some(ZodObject {
                title: zod_title(name),
                body,
            })
        })
        .collect()
}

/// Split an interface or object type body into members
fn members(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut found = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = literal_end(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'>' if i > 0 && bytes[i - 1] != b'=' => depth -= 1,
            b';' | b',' | b'\n' if depth == 0 => {
                found.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    found.push(body[start..].trim());
    found.retain(|m| !m.is_empty());
    found
}

fn object_type(name: &str, body: &str, types: &TypeContext) -> Schema {
    let mut schema = Schema::titled_object(name);
    for member in members(body) {
        let Some(caps) = MEMBER.captures(member) else {
            continue;
        };
        let key = &caps[1];
        let key = unquote(key).unwrap_or(key);
        let ty = caps[3].trim();
        let optional = caps.get(2).is_some() || split_top_level(ty, '|').contains(&"undefined");
        schema.add_property(key, type_mapper::typescript(ty, types), !optional);
    }
    schema
}

/// A property of a zod object
#[derive(Debug, Clone, PartialEq)]
pub struct ZodField {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

/// Properties of a `z.object({ ... })` body
pub fn zod_fields(body: &str, types: &TypeContext) -> Vec<ZodField> {
    split_top_level(body, ',')
        .into_iter()
        .filter_map(|entry| {
            let (key, expr) = entry.split_once(':')?;
            let key = key.trim();
            let key = unquote(key).unwrap_or(key);
            let (schema, optional) = zod_type(expr.trim(), types);
            Some(ZodField {
                name: key.to_string(),
                schema,
                required: !optional,
            })
        })
        .collect()
}

pub fn zod_object(body: &str, types: &TypeContext) -> Schema {
    let mut schema = Schema::object();
    for field in zod_fields(body, types) {
        schema.add_property(field.name, field.schema, field.required);
    }
    schema
}

/// Schema of a zod expression and whether it is optional
fn zod_type(expr: &str, types: &TypeContext) -> (Schema, bool) {
    let expr = expr.trim();
    let (base, mut rest) = match expr.strip_prefix("z.") {
        Some(call) => {
            let call = call.strip_prefix("coerce.").unwrap_or(call);
            let name_len = call
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(call.len());
            let name = &call[..name_len];
            let (args, rest) = match call[name_len..].starts_with('(') {
                true => match find_closing(call, name_len) {
                    Some(close) => (&call[name_len + 1..close], &call[close + 1..]),
                    None => ("", ""),
                },
                false => ("", &call[name_len..]),
            };
            (zod_base(name, args, types), rest)
        }
        None => {
            let name_len = expr
                .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
                .unwrap_or(expr.len());
            (types.named(&zod_title(&expr[..name_len])), &expr[name_len..])
        }
    };

    let mut schema = base;
    let mut optional = false;
    while let Some(call) = rest.trim_start().strip_prefix('.') {
        let name_len = call
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(call.len());
        let name = &call[..name_len];
        let (args, tail) = match call[name_len..].starts_with('(') {
            true => match find_closing(call, name_len) {
                Some(close) => (&call[name_len + 1..close], &call[close + 1..]),
                None => break,
            },
            false => ("", &call[name_len..]),
        };
        match name {
            "optional" | "default" | "catch" => optional = true,
            "nullish" => {
                optional = true;
                schema.nullable = true;
            }
            "nullable" => schema.nullable = true,
            "int" => {
                schema = Schema::integer();
            }
            "email" => schema.format = Some("email".into()),
            "uuid" => schema.format = Some("uuid".into()),
            "url" => schema.format = Some("uri".into()),
            "datetime" => schema.format = Some("date-time".into()),
            "array" => schema = Schema::array(schema),
            "describe" => schema.description = unquote(args).map(str::to_string),
            _ => {}
        }
        rest = tail;
    }
    (schema, optional)
}

fn zod_base(name: &str, args: &str, types: &TypeContext) -> Schema {
    match name {
        "string" => Schema::string(),
        "number" => Schema::number(),
        "bigint" => Schema::integer().with_format("int64"),
        "boolean" => Schema::boolean(),
        "date" => Schema::string().with_format("date-time"),
        "enum" => Schema::string().with_enum(string_literals(args).into_iter().map(str::to_string).collect()),
        "literal" => match unquote(args) {
            Some(value) => Schema::string().with_enum(vec![value.to_string()]),
            None => Schema::number(),
        },
        "nativeEnum" => types.named(&zod_title(args.trim())),
        "array" => Schema::array(zod_type(args, types).0),
        "object" => {
            let inner = args.trim();
            match inner.strip_prefix('{').and_then(|i| i.strip_suffix('}')) {
                Some(body) => zod_object(body, types),
                None => Schema::object(),
            }
        }
        "optional" | "nullable" => zod_type(args, types).0,
        _ => Schema::object(),
    }
}
