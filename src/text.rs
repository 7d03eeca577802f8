//! Raw-text scanning helpers shared by the text-based extractors.
//!
//! None of these understand a language grammar. They know just enough about
//! comments and string literals to find balanced brackets and split argument lists
//! without being fooled by a `)` inside a string.

/// Comment syntax of a source language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `// line` and `/* block */`
    CFamily,
    /// `# line`
    Hash,
}

/// Blank out every comment, keeping byte offsets and newlines intact.
///
/// String literals are copied verbatim, so comment markers inside them survive.
/// The result has the same length as the input, which lets callers map an offset
/// found in the masked text straight back to a line of the original.
pub fn mask_comments(src: &str, style: CommentStyle) -> String {
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if is_quote(b) {
            let end = skip_string(bytes, i);
            out.extend_from_slice(&bytes[i..end]);
            i = end;
            continue;
        }

        let comment_end = match style {
            CommentStyle::CFamily if b == b'/' && bytes.get(i + 1) == Some(&b'/') => {
                Some(line_end(bytes, i))
            }
            CommentStyle::CFamily if b == b'/' && bytes.get(i + 1) == Some(&b'*') => {
                Some(block_comment_end(bytes, i + 2))
            }
            CommentStyle::Hash if b == b'#' && !is_interpolation(bytes, i) => {
                Some(line_end(bytes, i))
            }
            _ => None,
        };

        match comment_end {
            Some(end) => {
                for &c in &bytes[i..end] {
                    out.push(if c == b'\n' { b'\n' } else { b' ' });
                }
                i = end;
            }
            None => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Find the bracket closing the one at `open`.
///
/// Handles `(`, `[` and `{`, each closer having to match the innermost open
/// bracket, and skips over string literals. Returns `None` on unbalanced or
/// mismatched input.
pub fn find_closing(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    if !matches!(bytes.get(open), Some(b'(' | b'[' | b'{')) {
        return None;
    }

    let mut expected: Vec<u8> = Vec::new();
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => expected.push(b')'),
            b'[' => expected.push(b']'),
            b'{' => expected.push(b'}'),
            close @ (b')' | b']' | b'}') => {
                if expected.pop()? != close {
                    return None;
                }
                if expected.is_empty() {
                    return Some(i);
                }
            }
            q if is_quote(q) => {
                i = skip_string(bytes, i);
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Find the `>` closing the generic argument list opened at `open`.
///
/// Gives up at a `;`, `{` or `)` seen at depth zero, which means the `<` was a
/// comparison rather than a generic list.
pub fn find_closing_angle(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    if bytes.get(open) != Some(&b'<') {
        return None;
    }

    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'<' => depth += 1,
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b';' | b'{' | b')' => return None,
            _ => {}
        }
    }
    None
}

/// Split an argument list on `sep` at bracket depth zero, trimming each piece and
/// dropping empty ones (a trailing comma is not an argument).
pub fn split_top_level(args: &str, sep: char) -> Vec<&str> {
    split_with(args, sep, false)
}

/// Like [`split_top_level`], also treating `<...>` as brackets. Used for generic
/// argument lists such as `Map<String, List<Integer>>`.
pub fn split_generics(args: &str) -> Vec<&str> {
    split_with(args, ',', true)
}

fn split_with(args: &str, sep: char, angles: bool) -> Vec<&str> {
    let bytes = args.as_bytes();
    let mut buf = [0u8; 4];
    let sep_bytes = sep.encode_utf8(&mut buf).as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if is_quote(b) {
            i = skip_string(bytes, i);
            continue;
        }
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'<' if angles => depth += 1,
            b'>' if angles && i > 0 && bytes[i - 1] != b'=' && bytes[i - 1] != b'-' => depth -= 1,
            _ if depth == 0 && bytes[i..].starts_with(sep_bytes) => {
                parts.push(args[start..i].trim());
                start = i + sep_bytes.len();
                i = start;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(args[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Strip the quotes from a string literal token.
///
/// Accepts `"..."`, `'...'` and backtick literals, with Python (`r`, `b`, `u`,
/// `f` and pairs of them) and C# (`@`, `$`) prefixes. Returns `None` for anything
/// that is not a single quoted literal.
pub fn unquote(token: &str) -> Option<&str> {
    let token = token.trim();
    let body = token.trim_start_matches(|c: char| {
        matches!(c, 'r' | 'R' | 'b' | 'B' | 'u' | 'U' | 'f' | 'F' | '@' | '$')
    });
    if token.len() - body.len() > 2 {
        return None;
    }

    let quote = body.chars().next()?;
    if !matches!(quote, '"' | '\'' | '`') || body.len() < 2 || !body.ends_with(quote) {
        return None;
    }
    Some(&body[1..body.len() - 1])
}

/// Read the string literal starting at `start`, returning its content and the
/// offset just past the closing quote.
pub fn quoted_at(src: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = src.as_bytes();
    if !bytes.get(start).copied().is_some_and(is_quote) {
        return None;
    }
    let end = skip_string(bytes, start);
    if end <= start + 1 || bytes.get(end - 1) != bytes.get(start) {
        return None;
    }
    Some((&src[start + 1..end - 1], end))
}

/// Content of the first string literal in `src`, if any
pub fn first_string(src: &str) -> Option<&str> {
    let start = src.bytes().position(is_quote)?;
    quoted_at(src, start).map(|(s, _)| s)
}

/// All string literals in `src`, in order
pub fn string_literals(src: &str) -> Vec<&str> {
    let bytes = src.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if is_quote(bytes[i]) {
            match quoted_at(src, i) {
                Some((s, end)) => {
                    found.push(s);
                    i = end;
                }
                None => break,
            }
        } else {
            i += 1;
        }
    }
    found
}

/// Every `name(...)` call in `src`, as the offset of `name` and the text between
/// the parentheses. Calls whose parentheses never close are skipped.
pub fn find_calls<'a>(src: &'a str, name: &str) -> Vec<(usize, &'a str)> {
    let mut calls = Vec::new();
    for (start, _) in src.match_indices(name) {
        let before = src[..start].chars().next_back();
        if before.is_some_and(is_ident_char) {
            continue;
        }
        let after = &src[start + name.len()..];
        let gap = after.len() - after.trim_start().len();
        let open = start + name.len() + gap;
        if src.as_bytes().get(open) != Some(&b'(') {
            continue;
        }
        if let Some(close) = find_closing(src, open) {
            calls.push((start, &src[open + 1..close]));
        }
    }
    calls
}

/// A `name(args) { body }` construct: a macro with a block, or a method definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallBlock<'a> {
    /// Offset of `name`
    pub offset: usize,
    pub args: &'a str,
    /// Offset of the first byte inside the braces
    pub body_start: usize,
    pub body: &'a str,
}

/// Every `name(args)` call directly followed by a braced block
pub fn call_blocks<'a>(src: &'a str, name: &str) -> Vec<CallBlock<'a>> {
    find_calls(src, name)
        .into_iter()
        .filter_map(|(offset, args)| {
            let open = offset + src[offset..].find('(')?;
            let close = find_closing(src, open)?;
            let rest = &src[close + 1..];
            let brace = close + 1 + (rest.len() - rest.trim_start().len());
            if src.as_bytes().get(brace) != Some(&b'{') {
                return None;
            }
            let end = find_closing(src, brace)?;
            Some(CallBlock {
                offset,
                args,
                body_start: brace + 1,
                body: &src[brace + 1..end],
            })
        })
        .collect()
}

/// Maps byte offsets to 1-based line numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(src: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(src.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    /// 1-based line containing `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }

    /// Byte offset where the 1-based `line` begins
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line.checked_sub(1)?).copied()
    }
}

/// Whether `word` occurs in `src` with identifier boundaries on both sides
pub fn contains_word(src: &str, word: &str) -> bool {
    src.match_indices(word).any(|(i, _)| {
        let before = src[..i].chars().next_back();
        let after = src[i + word.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_quote(b: u8) -> bool {
    matches!(b, b'"' | b'\'' | b'`')
}

/// Offset just past the string literal opening at `start` (or the end of input)
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];

    // Python / Elixir triple-quoted strings
    if quote != b'`' && bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote) {
        let mut i = start + 3;
        while i + 2 < bytes.len() {
            if bytes[i] == quote && bytes[i + 1] == quote && bytes[i + 2] == quote {
                return i + 3;
            }
            i += 1;
        }
        return bytes.len();
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            // An unterminated single-line literal stops at the newline
            b'\n' if quote != b'`' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn line_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| start + p)
        .unwrap_or(bytes.len())
}

fn block_comment_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Elixir `#{...}` interpolation is not a comment
fn is_interpolation(bytes: &[u8], i: usize) -> bool {
    bytes.get(i + 1) == Some(&b'{')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_c_comments_keeps_offsets() {
        let src = "a(1); // call(\"x\")\n/* b(2)\n */ c(\"//not\")";
        let masked = mask_comments(src, CommentStyle::CFamily);
        assert_eq!(masked.len(), src.len());
        assert!(!masked.contains("call"));
        assert!(!masked.contains("b(2)"));
        assert!(masked.contains("c(\"//not\")"));
        assert_eq!(masked.matches('\n').count(), 2);
    }

    #[test]
    fn test_mask_hash_comments() {
        let src = "get \"/a\", C, :a # get \"/b\"\nx = \"#keep\"";
        let masked = mask_comments(src, CommentStyle::Hash);
        assert!(masked.contains("get \"/a\""));
        assert!(!masked.contains("/b"));
        assert!(masked.contains("\"#keep\""));
    }

    #[test]
    fn test_find_closing_skips_strings() {
        let src = r#"f(a, ")", g(b[1]), {c})"#;
        assert_eq!(find_closing(src, 1), Some(src.len() - 1));
        assert_eq!(find_closing("f(a, (b)", 1), None);
        assert_eq!(find_closing("abc", 0), None);
    }

    #[test]
    fn test_find_closing_rejects_mismatched_brackets() {
        // `(` left open inside a brace block
        let src = "{ ENDPOINT(\"PUT\", \"/x\", x, PATH(Int64, id) };";
        assert_eq!(find_closing(src, 0), None);
        assert_eq!(find_closing(src, 10), None);
        assert_eq!(find_closing("(a]", 0), None);
        assert_eq!(find_closing("[a(b)c]", 0), Some(6));
    }

    #[test]
    fn test_find_closing_angle() {
        let src = "Endpoint<Req, List<Resp>> {";
        assert_eq!(find_closing_angle(src, 8), Some(24));
        assert_eq!(find_closing_angle("a < b;", 2), None);
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level(r#""/p", get(a, b), "x,y", [1, 2],"#, ','),
            vec![r#""/p""#, "get(a, b)", r#""x,y""#, "[1, 2]"]
        );
        assert_eq!(split_generics("String, Map<K, V>, int"), vec!["String", "Map<K, V>", "int"]);
        assert_eq!(split_generics("Func<A, B>, x => y"), vec!["Func<A, B>", "x => y"]);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"/users\""), Some("/users"));
        assert_eq!(unquote("'/users'"), Some("/users"));
        assert_eq!(unquote("`/users`"), Some("/users"));
        assert_eq!(unquote("r'^users/$'"), Some("^users/$"));
        assert_eq!(unquote("@\"/c#\""), Some("/c#"));
        assert_eq!(unquote("users"), None);
        assert_eq!(unquote("\"open"), None);
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(string_literals(r#"['GET', "POST"]"#), vec!["GET", "POST"]);
        assert_eq!(first_string("x = foo('/a', \"/b\")"), Some("/a"));
        assert_eq!(first_string("no strings"), None);
    }

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("a\nbb\n\nc");
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(2), 2);
        assert_eq!(index.line_of(5), 3);
        assert_eq!(index.line_of(6), 4);
        assert_eq!(index.line_start(2), Some(2));
    }

    #[test]
    fn test_find_calls() {
        let src = "METHOD_ADD(A::b, \"/x\", Get);\nADD_METHOD_TO (C::d, \"/y\");\nMY_METHOD_ADD(z)";
        let calls = find_calls(src, "METHOD_ADD");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (0, "A::b, \"/x\", Get"));
        assert_eq!(find_calls(src, "ADD_METHOD_TO")[0].1, "C::d, \"/y\"");
        assert!(find_calls("f(unclosed", "f").is_empty());
    }

    #[test]
    fn test_call_blocks() {
        let src = "void Configure() { Get(\"/a\"); }\nConfigure();\nINFO(x)\n  { y }";
        let blocks = call_blocks(src, "Configure");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, " Get(\"/a\"); ");
        assert_eq!(&src[blocks[0].body_start..blocks[0].body_start + 1], " ");

        let info = call_blocks(src, "INFO");
        assert_eq!(info[0].args, "x");
        assert_eq!(info[0].body, " y ");
    }

    #[test]
    fn test_contains_word() {
        assert!(contains_word("use hono;", "hono"));
        assert!(!contains_word("use honorific;", "hono"));
    }
}
