//! Source-package ingestion.
//!
//! Parses every non-test `.rs` file of a package directory with `syn` and
//! collects what the IR builder needs: record declarations in source order,
//! top-level type aliases, imports, and any record that already carries the
//! full SSZ methodset.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use quote::ToTokens;

use crate::error::{GenError, GenErrorKind};

/// One parsed package: a directory of source files keyed by path, in
/// lexicographic order.
#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub files: BTreeMap<PathBuf, syn::File>,
}

/// A record (struct) or type-alias declaration.
#[derive(Debug, Clone)]
pub struct RecordDecl {
    pub name: String,
    /// Present for struct declarations.
    pub strct: Option<syn::ItemStruct>,
    /// Present for type aliases; carries the underlying type expression.
    pub typ: Option<syn::Type>,
    /// True when the record already defines the full SSZ methodset.
    pub impl_func: bool,
    /// True when the record comes from a reference package.
    pub is_ref: bool,
}

/// Declarations found in one source file.
#[derive(Debug, Default)]
pub struct FileScan {
    /// Records in declaration order.
    pub records: Vec<RecordDecl>,
    /// Names of records defining all four SSZ methods in this file.
    pub impl_complete: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Alias the import is bound to; empty when unaliased.
    pub alias: String,
    /// Use-path, `::`-joined.
    pub path: String,
}

impl Import {
    pub fn use_line(&self) -> String {
        if self.alias.is_empty() {
            format!("use {};", self.path)
        } else {
            format!("use {} as {};", self.path, self.alias)
        }
    }

    /// Whether this import binds `name`: by alias when aliased, by the
    /// trailing path segment otherwise.
    pub fn matches(&self, name: &str) -> bool {
        if !self.alias.is_empty() {
            return self.alias == name;
        }
        self.path.rsplit("::").next() == Some(name)
    }
}

pub fn find_import(imports: &[Import], name: &str) -> Option<String> {
    imports
        .iter()
        .find(|i| i.matches(name))
        .map(Import::use_line)
}

/// Parses the package at `path`, a source directory or a single file.
/// Files ending in `_test.rs` and files with no declarations are skipped.
pub fn parse_package(path: &Path) -> Result<Package, GenError> {
    let meta = std::fs::metadata(path).map_err(|e| {
        GenError::new(GenErrorKind::Io, format!("stat {}: {e}", path.display()))
    })?;

    let (dir, single): (&Path, Option<&Path>) = if meta.is_dir() {
        (path, None)
    } else {
        (path.parent().unwrap_or_else(|| Path::new(".")), Some(path))
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    match single {
        Some(file) => paths.push(file.to_path_buf()),
        None => {
            let entries = std::fs::read_dir(dir).map_err(|e| {
                GenError::new(GenErrorKind::Io, format!("read {}: {e}", dir.display()))
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| {
                    GenError::new(GenErrorKind::Io, format!("read {}: {e}", dir.display()))
                })?;
                let p = entry.path();
                if !p.is_file() {
                    continue;
                }
                let Some(name) = p.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !name.ends_with(".rs") || name.ends_with("_test.rs") {
                    continue;
                }
                paths.push(p);
            }
            paths.sort();
        }
    }

    let mut files = BTreeMap::new();
    for p in paths {
        let src = std::fs::read_to_string(&p).map_err(|e| {
            GenError::new(GenErrorKind::Io, format!("read {}: {e}", p.display()))
        })?;
        let file = syn::parse_file(&src).map_err(|e| {
            GenError::new(GenErrorKind::Parse, format!("parse {}: {e}", p.display()))
        })?;
        if file.items.is_empty() {
            // ignored partition, nothing to ingest
            continue;
        }
        files.insert(p, file);
    }

    Ok(Package {
        name: package_name(dir),
        files,
    })
}

fn package_name(dir: &Path) -> String {
    let base = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("package");
    let mut name: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        name.insert(0, '_');
    }
    name
}

/// Collects the record declarations and complete-methodset markers of one
/// source file.
pub fn scan_file(file: &syn::File) -> FileScan {
    let mut res = FileScan::default();
    let mut method_sets: BTreeMap<String, BTreeSet<&'static str>> = BTreeMap::new();

    for item in &file.items {
        match item {
            syn::Item::Struct(s) => {
                res.records.push(RecordDecl {
                    name: s.ident.to_string(),
                    strct: Some(s.clone()),
                    typ: None,
                    impl_func: false,
                    is_ref: false,
                });
            }
            syn::Item::Type(t) => {
                res.records.push(RecordDecl {
                    name: t.ident.to_string(),
                    strct: None,
                    typ: Some((*t.ty).clone()),
                    impl_func: false,
                    is_ref: false,
                });
            }
            syn::Item::Impl(imp) if imp.trait_.is_none() => {
                let Some(self_name) = impl_self_ident(imp) else {
                    continue;
                };
                for impl_item in &imp.items {
                    if let syn::ImplItem::Fn(f) = impl_item {
                        if let Some(which) = ssz_method(&f.sig) {
                            method_sets.entry(self_name.clone()).or_default().insert(which);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    for (name, set) in method_sets {
        if set.len() == 4 {
            res.impl_complete.push(name);
        }
    }
    res
}

fn impl_self_ident(imp: &syn::ItemImpl) -> Option<String> {
    if let syn::Type::Path(p) = &*imp.self_ty {
        if p.qself.is_none() {
            return p.path.get_ident().map(|i| i.to_string());
        }
    }
    None
}

/// Matches a signature against the four SSZ methods by name, receiver,
/// parameter types and result type. Types are compared on their rendered
/// token stream with whitespace removed.
fn ssz_method(sig: &syn::Signature) -> Option<&'static str> {
    match sig.ident.to_string().as_str() {
        "size_ssz" => sig_matches(sig, false, &[], "usize").then_some("size_ssz"),
        "marshal_ssz_to" => sig_matches(sig, false, &["&mutVec<u8>"], "Result<(),ssz::Error>")
            .then_some("marshal_ssz_to"),
        "unmarshal_ssz" => sig_matches(sig, true, &["&[u8]"], "Result<(),ssz::Error>")
            .then_some("unmarshal_ssz"),
        "hash_tree_root_with" => {
            sig_matches(sig, false, &["&mutssz::Hasher"], "Result<(),ssz::Error>")
                .then_some("hash_tree_root_with")
        }
        _ => None,
    }
}

fn sig_matches(sig: &syn::Signature, recv_mut: bool, params: &[&str], ret: &str) -> bool {
    let mut inputs = sig.inputs.iter();

    let Some(syn::FnArg::Receiver(recv)) = inputs.next() else {
        return false;
    };
    if recv.reference.is_none() || recv.mutability.is_some() != recv_mut {
        return false;
    }

    let rest: Vec<&syn::FnArg> = inputs.collect();
    if rest.len() != params.len() {
        return false;
    }
    for (arg, expect) in rest.iter().zip(params) {
        let syn::FnArg::Typed(pat_ty) = arg else {
            return false;
        };
        if render_type(&pat_ty.ty) != *expect {
            return false;
        }
    }

    match &sig.output {
        syn::ReturnType::Default => ret.is_empty(),
        syn::ReturnType::Type(_, ty) => render_type(ty) == ret,
    }
}

fn render_type(ty: &syn::Type) -> String {
    ty.to_token_stream()
        .to_string()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Flattens the `use` declarations of a file into (path, alias) pairs.
/// Imports renamed to `_` are dropped; glob imports cannot bind a package
/// name and are skipped.
pub fn collect_imports(file: &syn::File) -> Vec<Import> {
    let mut out = Vec::new();
    for item in &file.items {
        if let syn::Item::Use(u) = item {
            flatten_use(&u.tree, &mut Vec::new(), &mut out);
        }
    }
    out
}

fn flatten_use(tree: &syn::UseTree, prefix: &mut Vec<String>, out: &mut Vec<Import>) {
    match tree {
        syn::UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            flatten_use(&p.tree, prefix, out);
            prefix.pop();
        }
        syn::UseTree::Name(n) => {
            let mut segs = prefix.clone();
            segs.push(n.ident.to_string());
            out.push(Import {
                alias: String::new(),
                path: segs.join("::"),
            });
        }
        syn::UseTree::Rename(r) => {
            if r.rename == "_" {
                return;
            }
            let mut segs = prefix.clone();
            segs.push(r.ident.to_string());
            out.push(Import {
                alias: r.rename.to_string(),
                path: segs.join("::"),
            });
        }
        syn::UseTree::Glob(_) => {}
        syn::UseTree::Group(g) => {
            for t in &g.items {
                flatten_use(t, prefix, out);
            }
        }
    }
}

/// Extracts the tag string from a field's `#[ssz("...")]` attribute.
/// Returns an empty string when the field carries none.
pub fn field_tags(field: &syn::Field) -> Result<String, GenError> {
    for attr in &field.attrs {
        if !attr.path().is_ident("ssz") {
            continue;
        }
        let lit: syn::LitStr = attr.parse_args().map_err(|e| {
            GenError::new(
                GenErrorKind::Tags,
                format!("malformed ssz attribute: {e}"),
            )
        })?;
        return Ok(lit.value());
    }
    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::{collect_imports, scan_file};

    fn parse(src: &str) -> syn::File {
        syn::parse_file(src).expect("fixture parses")
    }

    #[test]
    fn scan_collects_records_in_order() {
        let file = parse(
            "pub struct B { pub x: u64 }\n\
             pub type Epoch = u64;\n\
             pub struct A { pub y: bool }\n",
        );
        let scan = scan_file(&file);
        let names: Vec<&str> = scan.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["B", "Epoch", "A"]);
        assert!(scan.records[1].typ.is_some());
    }

    #[test]
    fn scan_marks_complete_methodsets() {
        let file = parse(
            "pub struct Sig { pub data: Vec<u8> }\n\
             impl Sig {\n\
                 pub fn size_ssz(&self) -> usize { 96 }\n\
                 pub fn marshal_ssz_to(&self, buf: &mut Vec<u8>) -> Result<(), ssz::Error> { Ok(()) }\n\
                 pub fn unmarshal_ssz(&mut self, buf: &[u8]) -> Result<(), ssz::Error> { Ok(()) }\n\
                 pub fn hash_tree_root_with(&self, hh: &mut ssz::Hasher) -> Result<(), ssz::Error> { Ok(()) }\n\
             }\n",
        );
        let scan = scan_file(&file);
        assert_eq!(scan.impl_complete, ["Sig"]);
    }

    #[test]
    fn scan_partial_methodset_is_not_complete() {
        let file = parse(
            "pub struct Sig { pub data: Vec<u8> }\n\
             impl Sig {\n\
                 pub fn size_ssz(&self) -> usize { 96 }\n\
                 pub fn unmarshal_ssz(&mut self, buf: &[u8]) -> Result<(), ssz::Error> { Ok(()) }\n\
             }\n",
        );
        assert!(scan_file(&file).impl_complete.is_empty());
    }

    #[test]
    fn scan_rejects_wrong_signatures() {
        // wrong receiver mutability and wrong result types
        let file = parse(
            "pub struct Sig;\n\
             impl Sig {\n\
                 pub fn size_ssz(&self) -> u64 { 96 }\n\
                 pub fn marshal_ssz_to(&mut self, buf: &mut Vec<u8>) -> Result<(), ssz::Error> { Ok(()) }\n\
                 pub fn unmarshal_ssz(&mut self, buf: &[u8]) -> Result<(), ssz::Error> { Ok(()) }\n\
                 pub fn hash_tree_root_with(&self, hh: &mut ssz::Hasher) -> Result<(), ssz::Error> { Ok(()) }\n\
             }\n",
        );
        assert!(scan_file(&file).impl_complete.is_empty());
    }

    #[test]
    fn imports_flatten_and_drop_sink() {
        let file = parse(
            "use crate::types::phase0;\n\
             use some_crate::alt as p2;\n\
             use other::thing as _;\n\
             use grouped::{a, b as c};\n",
        );
        let imports = collect_imports(&file);
        let lines: Vec<String> = imports.iter().map(|i| i.use_line()).collect();
        assert_eq!(
            lines,
            [
                "use crate::types::phase0;",
                "use some_crate::alt as p2;",
                "use grouped::a;",
                "use grouped::b as c;",
            ]
        );
        assert!(imports[0].matches("phase0"));
        assert!(imports[1].matches("p2"));
        assert!(!imports[1].matches("alt"));
    }
}
