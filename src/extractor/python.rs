//! Python structure by indentation: logical lines, classes, functions and
//! their decorators. Used by the DRF plugin.

use crate::text::{split_top_level, unquote};
use once_cell::sync::Lazy;
use regex::Regex;

static CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^class\s+(\w+)\s*(?:\((.*)\))?\s*:").expect("valid class regex"));

static DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:async\s+)?def\s+(\w+)\s*\((.*)\)\s*(?:->\s*[^:]+)?:").expect("valid def regex")
});

static DECORATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([\w.]+)\s*(?:\((.*)\))?\s*$").expect("valid decorator regex"));

static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*(?::[^=]+)?=\s*(.+)$").expect("valid assignment regex"));

/// One statement, with bracketed and backslash continuations joined
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    /// 1-based line where the statement starts
    pub line: usize,
    pub indent: usize,
    pub text: String,
}

/// Split comment-masked Python into statements. Docstrings are dropped.
pub fn logical_lines(masked: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current: Option<LogicalLine> = None;
    let mut depth = 0i32;
    let mut docstring: Option<&str> = None;

    for (idx, raw) in masked.lines().enumerate() {
        if let Some(delimiter) = docstring {
            if raw.contains(delimiter) {
                docstring = None;
            }
            continue;
        }
        let trimmed = raw.trim();
        if current.is_none() {
            if trimmed.is_empty() {
                continue;
            }
            if let Some(delimiter) = docstring_start(trimmed) {
                if trimmed[delimiter.len()..].find(delimiter).is_none() {
                    docstring = Some(delimiter);
                }
                continue;
            }
        }

        let continued = trimmed.ends_with('\\');
        let text = trimmed.trim_end_matches('\\').trim_end();
        depth += bracket_delta(text);
        match current.as_mut() {
            Some(statement) => {
                statement.text.push(' ');
                statement.text.push_str(text);
            }
            None => {
                current = Some(LogicalLine {
                    line: idx + 1,
                    indent: raw.len() - raw.trim_start().len(),
                    text: text.to_string(),
                });
            }
        }
        if depth <= 0 && !continued {
            lines.extend(current.take());
            depth = 0;
        }
    }
    lines.extend(current);
    lines
}

/// Delimiter of a docstring statement starting the line
fn docstring_start(trimmed: &str) -> Option<&'static str> {
    let body = trimmed.trim_start_matches(|c: char| matches!(c, 'r' | 'R' | 'u' | 'U' | 'b' | 'B'));
    ["\"\"\"", "'''"]
        .into_iter()
        .find(|delimiter| body.starts_with(delimiter))
        .filter(|_| trimmed.len() - body.len() <= 1)
}

/// Net bracket depth change over one line, ignoring brackets inside strings
fn bracket_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => delta += 1,
            ')' | ']' | '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// `@name(args)` above a `def` or `class`
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub name: String,
    pub args: Option<String>,
    pub line: usize,
}

impl Decorator {
    fn parse(line: &LogicalLine) -> Option<Self> {
        let caps = DECORATOR.captures(&line.text)?;
        Some(Decorator {
            name: caps[1].to_string(),
            args: caps.get(2).map(|m| m.as_str().to_string()),
            line: line.line,
        })
    }

    /// Whether the decorator's last dotted segment is `name`
    pub fn is(&self, name: &str) -> bool {
        self.name.rsplit('.').next() == Some(name)
    }

    pub fn keyword(&self, key: &str) -> Option<&str> {
        self.args.as_deref().and_then(|args| keyword_arg(args, key))
    }
}

/// A `def` with its decorators
#[derive(Debug, Clone, PartialEq)]
pub struct PyFunction {
    pub name: String,
    pub params: String,
    /// Line of the `def` statement
    pub line: usize,
    pub decorators: Vec<Decorator>,
}

impl PyFunction {
    pub fn decorator(&self, name: &str) -> Option<&Decorator> {
        self.decorators.iter().find(|d| d.is(name))
    }

    /// Line of the first decorator, or of the `def`
    pub fn anchor_line(&self) -> usize {
        self.decorators.first().map_or(self.line, |d| d.line)
    }
}

/// Functions defined at exactly `indent`
pub fn functions(lines: &[LogicalLine], indent: usize) -> Vec<PyFunction> {
    let mut found = Vec::new();
    let mut decorators = Vec::new();
    for line in lines.iter().filter(|l| l.indent == indent) {
        if let Some(decorator) = Decorator::parse(line) {
            decorators.push(decorator);
            continue;
        }
        if let Some(caps) = DEF.captures(&line.text) {
            found.push(PyFunction {
                name: caps[1].to_string(),
                params: caps[2].to_string(),
                line: line.line,
                decorators: std::mem::take(&mut decorators),
            });
        } else {
            decorators.clear();
        }
    }
    found
}

/// A class definition and the statements of its body
#[derive(Debug, Clone, PartialEq)]
pub struct PyClass<'a> {
    pub name: String,
    /// Positional bases as written, e.g. `viewsets.ModelViewSet`
    pub bases: Vec<String>,
    pub line: usize,
    pub indent: usize,
    pub body: &'a [LogicalLine],
}

/// Every class definition, nested ones included
pub fn classes(lines: &[LogicalLine]) -> Vec<PyClass<'_>> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            let caps = CLASS.captures(&line.text)?;
            let end = lines[idx + 1..]
                .iter()
                .position(|l| l.indent <= line.indent)
                .map_or(lines.len(), |p| idx + 1 + p);
            let bases = caps
                .get(2)
                .map(|m| {
                    split_top_level(m.as_str(), ',')
                        .into_iter()
                        .filter(|base| keyword_split(base).is_none())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(PyClass {
                name: caps[1].to_string(),
                bases,
                line: line.line,
                indent: line.indent,
                body: &lines[idx + 1..end],
            })
        })
        .collect()
}

impl<'a> PyClass<'a> {
    /// Whether any base's last dotted segment satisfies `predicate`
    pub fn has_base(&self, predicate: impl Fn(&str) -> bool) -> bool {
        self.bases
            .iter()
            .any(|base| predicate(base.rsplit('.').next().unwrap_or(base)))
    }

    fn member_indent(&self) -> Option<usize> {
        self.body.first().map(|l| l.indent)
    }

    /// Statements directly in the class body
    pub fn members(&self) -> impl Iterator<Item = &'a LogicalLine> + '_ {
        let indent = self.member_indent();
        self.body.iter().filter(move |l| Some(l.indent) == indent)
    }

    /// Right-hand side of `name = value` in the class body
    pub fn assignment(&self, name: &str) -> Option<&'a str> {
        self.members().find_map(|line| {
            let caps = ASSIGNMENT.captures(&line.text)?;
            (caps.get(1)?.as_str() == name).then(|| caps.get(2).map(|m| m.as_str().trim()))?
        })
    }

    pub fn methods(&self) -> Vec<PyFunction> {
        self.member_indent()
            .map(|indent| functions(self.body, indent))
            .unwrap_or_default()
    }

    /// A class nested directly in this one, such as `Meta`
    pub fn nested_class(&self, name: &str) -> Option<PyClass<'a>> {
        let indent = self.member_indent()?;
        classes(self.body)
            .into_iter()
            .find(|c| c.name == name && c.indent == indent)
    }
}

/// Module-level `NAME = value` assignments
pub fn module_assignments(lines: &[LogicalLine]) -> Vec<(&str, &str)> {
    lines
        .iter()
        .filter(|l| l.indent == 0)
        .filter_map(|l| {
            let caps = ASSIGNMENT.captures(&l.text)?;
            Some((caps.get(1)?.as_str(), caps.get(2)?.as_str().trim()))
        })
        .collect()
}

/// Split `key=value` (not `==`) into its halves
fn keyword_split(arg: &str) -> Option<(&str, &str)> {
    let eq = arg.find('=')?;
    let key = arg[..eq].trim();
    let value = &arg[eq + 1..];
    let is_key = !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
    (is_key && !value.starts_with('=')).then(|| (key, value.trim()))
}

/// Value of the `key=` argument in a call's argument text
pub fn keyword_arg<'a>(args: &'a str, key: &str) -> Option<&'a str> {
    split_top_level(args, ',')
        .into_iter()
        .filter_map(keyword_split)
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Positional (non-keyword) arguments of a call's argument text
pub fn positional_args(args: &str) -> Vec<&str> {
    split_top_level(args, ',')
        .into_iter()
        .filter(|arg| keyword_split(arg).is_none())
        .collect()
}

/// Whether a Python literal is `True`
pub fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim() == "True")
}

/// String items of a list or tuple literal; tuple items contribute their first
/// element, as in Django `choices`
pub fn string_items(literal: &str) -> Vec<String> {
    let literal = literal.trim();
    let inner = literal
        .strip_prefix(|c: char| c == '[' || c == '(')
        .and_then(|l| l.strip_suffix(|c: char| c == ']' || c == ')'))
        .unwrap_or(literal);
    split_top_level(inner, ',')
        .into_iter()
        .filter_map(|item| {
            let item = item.trim();
            let first = match item.strip_prefix('(') {
                Some(tuple) => split_top_level(tuple.trim_end_matches(')'), ',').into_iter().next()?,
                None => item,
            };
            unquote(first).map(str::to_string)
        })
        .collect()
}
