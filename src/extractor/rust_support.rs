//! syn helpers shared by the Rust plugins.

use crate::extractor::{Extraction, Framework, SkippedFile};
use crate::parser::{AstParser, ParsedFile};
use crate::source::{Language, SourceFile};
use log::debug;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{Expr, GenericArgument, Item, Lit, PathArguments, Type, UseTree};

/// Parse every Rust file of the set, recording failures as skipped files.
pub fn parse_all(files: &[SourceFile], framework: Framework) -> (Vec<ParsedFile>, Vec<SkippedFile>) {
    let mut parsed = Vec::new();
    let mut failures: Extraction<()> = Extraction::default();

    for file in files.iter().filter(|f| f.language == Language::Rust) {
        match AstParser::parse_source(file) {
            Ok(p) => parsed.push(p),
            Err(e) => failures.absorb(framework, file, Err(e)),
        }
    }

    (parsed, failures.skipped)
}

/// Cheap text check run before parsing
pub fn mentions_crate(content: &str, krate: &str) -> bool {
    content.contains(&format!("{}::", krate)) || crate::text::contains_word(content, krate)
}

/// Whether the file uses `krate` through a `use` tree (plain, grouped or
/// renamed), `extern crate`, or a path rooted at it (`axum::Router`,
/// `#[rocket::get(..)]`). Comments and string literals never count.
pub fn uses_crate(tree: &syn::File, krate: &str) -> bool {
    let mut finder = CrateUse { krate, found: false };
    finder.visit_file(tree);
    finder.found
}

struct CrateUse<'k> {
    krate: &'k str,
    found: bool,
}

impl<'ast> Visit<'ast> for CrateUse<'_> {
    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        if use_root(&node.tree, self.krate) {
            self.found = true;
        }
    }

    fn visit_item_extern_crate(&mut self, node: &'ast syn::ItemExternCrate) {
        if node.ident == self.krate {
            self.found = true;
        }
    }

    fn visit_path(&mut self, node: &'ast syn::Path) {
        if self.found {
            return;
        }
        if node.segments.len() > 1 && node.segments.first().is_some_and(|s| s.ident == self.krate) {
            self.found = true;
            return;
        }
        visit::visit_path(self, node);
    }
}

/// Whether a use tree imports from `krate` at its root
fn use_root(tree: &UseTree, krate: &str) -> bool {
    match tree {
        UseTree::Path(path) => path.ident == krate,
        UseTree::Group(group) => group.items.iter().any(|item| use_root(item, krate)),
        UseTree::Rename(rename) => rename.ident == krate,
        UseTree::Name(name) => name.ident == krate,
        UseTree::Glob(_) => false,
    }
}

/// 1-based line of a syntax node
pub fn line_of<T: Spanned>(node: &T) -> usize {
    node.span().start().line
}

/// The value of a string literal expression
pub fn string_lit(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(s) => Some(s.value()),
            _ => None,
        },
        Expr::Group(group) => string_lit(&group.expr),
        Expr::Paren(paren) => string_lit(&paren.expr),
        _ => None,
    }
}

/// Path segments of an expression path joined with `::`
pub fn path_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

/// Last identifier of an expression path
pub fn last_ident(path: &syn::Path) -> Option<String> {
    path.segments.last().map(|s| s.ident.to_string())
}

/// The last path segment of a type, with references and groups peeled off
pub fn type_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last(),
        Type::Reference(reference) => type_segment(&reference.elem),
        Type::Group(group) => type_segment(&group.elem),
        Type::Paren(paren) => type_segment(&paren.elem),
        _ => None,
    }
}

/// Name of a type's last path segment (`axum::Json<T>` -> `Json`)
pub fn type_name(ty: &Type) -> Option<String> {
    type_segment(ty).map(|s| s.ident.to_string())
}

/// The `n`th generic type argument of a path segment
pub fn generic_arg(segment: &syn::PathSegment, n: usize) -> Option<&Type> {
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .nth(n),
        _ => None,
    }
}

/// Unwrap `Wrapper<T>` when the outermost segment is named `wrapper`
pub fn unwrap_named<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let segment = type_segment(ty)?;
    if segment.ident == wrapper {
        generic_arg(segment, 0)
    } else {
        None
    }
}

/// The `T` of a `Json<T>` type, looking through `Result`, `Option`, references and tuples
pub fn json_payload(ty: &Type) -> Option<&Type> {
    match ty {
        Type::Tuple(tuple) => tuple.elems.iter().find_map(json_payload),
        Type::Paren(paren) => json_payload(&paren.elem),
        _ => {
            let segment = type_segment(ty)?;
            match segment.ident.to_string().as_str() {
                "Json" => generic_arg(segment, 0),
                "Result" | "Option" => generic_arg(segment, 0).and_then(json_payload),
                _ => None,
            }
        }
    }
}

/// Name bound by a simple `ident: Type` or `Json(ident): Type` argument pattern
pub fn pattern_ident(pat: &syn::Pat) -> Option<String> {
    match pat {
        syn::Pat::Ident(ident) => Some(ident.ident.to_string()),
        syn::Pat::TupleStruct(tuple) if tuple.elems.len() == 1 => pattern_ident(&tuple.elems[0]),
        syn::Pat::Reference(reference) => pattern_ident(&reference.pat),
        _ => None,
    }
}

/// A function together with the inline modules enclosing it
pub struct ScopedFn<'a> {
    pub modules: Vec<String>,
    pub sig: &'a syn::Signature,
    pub attrs: &'a [syn::Attribute],
    pub block: &'a syn::Block,
}

/// Every function in a file, including those in inline modules and impl blocks
pub fn collect_functions(tree: &syn::File) -> Vec<(&syn::Signature, &[syn::Attribute], &syn::Block)> {
    collect_scoped_functions(tree)
        .into_iter()
        .map(|f| (f.sig, f.attrs, f.block))
        .collect()
}

/// Like [`collect_functions`], keeping the inline module path of each function
pub fn collect_scoped_functions(tree: &syn::File) -> Vec<ScopedFn<'_>> {
    let mut found = Vec::new();
    collect_from_items(&tree.items, &mut Vec::new(), &mut found);
    debug!("Collected {} functions", found.len());
    found
}

fn collect_from_items<'a>(items: &'a [Item], modules: &mut Vec<String>, found: &mut Vec<ScopedFn<'a>>) {
    for item in items {
        match item {
            Item::Fn(func) => found.push(ScopedFn {
                modules: modules.clone(),
                sig: &func.sig,
                attrs: &func.attrs,
                block: &func.block,
            }),
            Item::Mod(module) => {
                if let Some((_, items)) = &module.content {
                    modules.push(module.ident.to_string());
                    collect_from_items(items, modules, found);
                    modules.pop();
                }
            }
            Item::Impl(imp) => {
                for impl_item in &imp.items {
                    if let syn::ImplItem::Fn(method) = impl_item {
                        found.push(ScopedFn {
                            modules: modules.clone(),
                            sig: &method.sig,
                            attrs: &method.attrs,
                            block: &method.block,
                        });
                    }
                }
            }
            _ => {}
        }
    }
}
