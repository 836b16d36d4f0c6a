//! Generation pipeline: parse -> build IR -> emit -> validate -> write.
//!
//! Emission is buffered in memory and every output validated before the
//! first file is written, so a failing run leaves no partial outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::builder::Env;
use crate::error::{GenError, GenErrorKind};
use crate::ingest;
use crate::output;

/// Runs the generator and returns the written output paths.
///
/// `source_path` holds the primary package; `include_paths` hold packages
/// whose records may be referenced but are never targets; `target_names`
/// restricts generation to the named records (empty means every eligible
/// record); `output` switches to combined single-file mode.
pub fn generate(
    source_path: &Path,
    include_paths: &[PathBuf],
    target_names: &[String],
    output: Option<&Path>,
) -> Result<Vec<PathBuf>, GenError> {
    let source_package = ingest::parse_package(source_path)?;

    let mut reference_packages = BTreeMap::new();
    for path in include_paths {
        let pkg = ingest::parse_package(path)?;
        reference_packages.insert(pkg.name.clone(), pkg);
    }

    let mut env = Env::new(source_package, reference_packages, target_names);
    env.build_ir()?;

    let outs = match output {
        Some(path) => output::generate_combined(&env, path)?,
        None => output::generate_encodings(&env)?,
    };
    if outs.is_empty() {
        return Err(GenError::new(
            GenErrorKind::Emit,
            "no files to generate".to_string(),
        ));
    }

    let mut written = Vec::with_capacity(outs.len());
    for (path, text) in outs {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GenError::new(
                        GenErrorKind::Io,
                        format!("create output dir {}: {e}", parent.display()),
                    )
                })?;
            }
        }
        std::fs::write(&path, text.as_bytes()).map_err(|e| {
            GenError::new(
                GenErrorKind::Io,
                format!("write {}: {e}", path.display()),
            )
        })?;
        written.push(path);
    }
    Ok(written)
}
