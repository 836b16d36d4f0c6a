//! Output assembly.
//!
//! Groups the emitted methodsets per output file, prepends the banner, the
//! content hash of the primary package and the import block, and validates
//! every assembled file by re-parsing it before it is handed back for
//! writing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use quote::ToTokens;
use sha2::{Digest, Sha256};

use crate::builder::Env;
use crate::emit::Writer;
use crate::error::{GenError, GenErrorKind};
use crate::{emit_hash, emit_marshal, emit_size, emit_unmarshal, ingest};

/// Suffix replacing `.rs` on per-file outputs.
pub const GENERATED_SUFFIX: &str = "_encoding.rs";

/// Per-file mode: one output alongside each input file that declares at
/// least one emittable record.
pub fn generate_encodings(env: &Env) -> Result<BTreeMap<PathBuf, String>, GenError> {
    let hash = hash_source(env);
    let mut outs = BTreeMap::new();
    for (path, order) in &env.order {
        if let Some(text) = print_records(env, &hash, order)? {
            outs.insert(output_path(path), text);
        }
    }
    Ok(outs)
}

/// Combined mode: a single output with records ordered by input file name,
/// then by in-file declaration order.
pub fn generate_combined(
    env: &Env,
    output: &Path,
) -> Result<BTreeMap<PathBuf, String>, GenError> {
    let hash = hash_source(env);
    let mut order: Vec<String> = Vec::new();
    for names in env.order.values() {
        order.extend(names.iter().cloned());
    }
    let mut outs = BTreeMap::new();
    if let Some(text) = print_records(env, &hash, &order)? {
        outs.insert(output.to_path_buf(), text);
    }
    Ok(outs)
}

fn output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("out.rs");
    let stem = name.strip_suffix(".rs").unwrap_or(name);
    input.with_file_name(format!("{stem}{GENERATED_SUFFIX}"))
}

/// SHA-256 over the canonical AST rendering of every primary-package file,
/// concatenated in lexicographic file-name order. Token-stream printing is
/// whitespace- and comment-insensitive, so the hash survives reformatting.
pub fn hash_source(env: &Env) -> String {
    let mut content = String::new();
    for file in env.source_package.files.values() {
        content.push_str(&file.to_token_stream().to_string());
    }
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Assembles one output file for the given record order. Returns `None`
/// when nothing in the order needs generated methods.
fn print_records(
    env: &Env,
    hash: &str,
    order: &[String],
) -> Result<Option<String>, GenError> {
    let mut body = Writer::new();
    let mut aliases: BTreeSet<String> = BTreeSet::new();
    let mut emitted = 0usize;

    for name in order {
        let Some(decl) = env.raw_decl(name) else { continue };
        if decl.impl_func || decl.is_ref {
            // methodset provided elsewhere
            continue;
        }
        let Some(obj) = env.obj(name) else { continue };
        if obj.is_fixed() && obj.is_basic_type() {
            // alias of a basic kind, encoded inside its parent container
            continue;
        }

        for alias in obj.detect_imports() {
            aliases.insert(alias);
        }

        if emitted > 0 {
            body.blank();
        }
        body.line(0, &format!("impl {name} {{"));
        emit_marshal::marshal_methods(&mut body, name, obj)?;
        body.blank();
        emit_unmarshal::unmarshal_method(&mut body, name, obj)?;
        body.blank();
        emit_size::size_method(&mut body, name, obj)?;
        body.blank();
        emit_hash::hash_methods(&mut body, name, obj)?;
        body.line(0, "}");
        emitted += 1;
    }

    if emitted == 0 {
        return Ok(None);
    }

    let mut header = Writer::new();
    header.line(0, "// Code generated by sszgen. DO NOT EDIT.");
    header.line(0, &format!("// Hash: {hash}"));
    header.line(0, "#![allow(clippy::all)]");
    header.line(
        0,
        "#![allow(unused_assignments, unused_imports, unused_variables)]",
    );
    header.blank();
    header.line(0, "use super::*;");
    header.line(0, "use ssz_rt as ssz;");
    for alias in &aliases {
        if let Some(line) = ingest::find_import(&env.imports, alias) {
            header.line(0, &line);
        }
    }
    header.blank();

    let text = header.finish() + &body.finish();
    syn::parse_file(&text).map_err(|e| {
        GenError::new(
            GenErrorKind::Emit,
            format!("generated code failed to parse: {e}"),
        )
    })?;
    Ok(Some(text))
}
