//! IR construction.
//!
//! `Env` owns the raw declarations of the primary package and every
//! reference package, translates record fields into [`Value`] nodes, and
//! caches one node per record name. Referencing fields receive deep copies
//! so per-field metadata (name, offset, package alias) stays local.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use quote::ToTokens;

use crate::error::{GenError, GenErrorKind};
use crate::ingest::{self, Import, Package, RecordDecl};
use crate::ir::{Kind, Value, BYTES_PER_LENGTH_OFFSET};
use crate::tags;

pub struct Env {
    pub source_package: Package,
    reference_packages: BTreeMap<String, Package>,
    /// Explicit target names; empty means every eligible record.
    target_filter: BTreeSet<String>,
    /// Raw declarations by record name, across all packages.
    raw: BTreeMap<String, RecordDecl>,
    /// IR cache by record name.
    objs: BTreeMap<String, Value>,
    /// Per-file record names in declaration order.
    pub order: BTreeMap<PathBuf, Vec<String>>,
    /// Imports reconciled across the primary package's files.
    pub imports: Vec<Import>,
    /// Names currently being resolved, for cycle detection.
    building: Vec<String>,
}

impl Env {
    pub fn new(
        source_package: Package,
        reference_packages: BTreeMap<String, Package>,
        target_names: &[String],
    ) -> Self {
        Self {
            source_package,
            reference_packages,
            target_filter: target_names.iter().cloned().collect(),
            raw: BTreeMap::new(),
            objs: BTreeMap::new(),
            order: BTreeMap::new(),
            imports: Vec::new(),
            building: Vec::new(),
        }
    }

    pub fn obj(&self, name: &str) -> Option<&Value> {
        self.objs.get(name)
    }

    pub fn raw_decl(&self, name: &str) -> Option<&RecordDecl> {
        self.raw.get(name)
    }

    /// Records eligible for codegen: primary-package records that do not
    /// already implement the methodset and, when an explicit list was
    /// given, are named in it.
    pub fn codegen_targets(&self) -> Vec<String> {
        self.raw
            .iter()
            .filter(|(name, decl)| {
                !decl.is_ref
                    && !decl.impl_func
                    && (self.target_filter.is_empty() || self.target_filter.contains(*name))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Ingests every package and resolves all codegen targets to IR.
    pub fn build_ir(&mut self) -> Result<(), GenError> {
        let mut file_imports = Vec::new();
        for file in self.source_package.files.values() {
            file_imports.extend(ingest::collect_imports(file));
        }
        self.add_imports(file_imports)?;

        let mut impl_complete: Vec<String> = Vec::new();

        let source_files: Vec<(PathBuf, syn::File)> = self
            .source_package
            .files
            .iter()
            .map(|(p, f)| (p.clone(), f.clone()))
            .collect();
        for (path, file) in &source_files {
            let scan = ingest::scan_file(file);
            let ordering: Vec<String> = scan.records.iter().map(|r| r.name.clone()).collect();
            self.add_records(scan.records, false)?;
            impl_complete.extend(scan.impl_complete);
            self.order.insert(path.clone(), ordering);
        }

        // reference packages contribute declarations but never targets
        let reference_files: Vec<syn::File> = self
            .reference_packages
            .values()
            .flat_map(|pkg| pkg.files.values().cloned())
            .collect();
        for file in &reference_files {
            let scan = ingest::scan_file(file);
            self.add_records(scan.records, true)?;
            impl_complete.extend(scan.impl_complete);
        }

        for name in impl_complete {
            let decl = self.raw.get_mut(&name).ok_or_else(|| {
                GenError::new(
                    GenErrorKind::Resolve,
                    format!("cannot find record '{name}' for its methodset"),
                )
            })?;
            decl.impl_func = true;
        }

        for name in self.codegen_targets() {
            self.encode_item(&name, "")?;
        }
        Ok(())
    }

    fn add_records(&mut self, records: Vec<RecordDecl>, is_ref: bool) -> Result<(), GenError> {
        for mut decl in records {
            if self.raw.contains_key(&decl.name) {
                return Err(GenError::new(
                    GenErrorKind::Resolve,
                    format!("two records share the same name '{}'", decl.name),
                ));
            }
            decl.is_ref = is_ref;
            self.raw.insert(decl.name.clone(), decl);
        }
        Ok(())
    }

    fn add_imports(&mut self, imports: Vec<Import>) -> Result<(), GenError> {
        for import in imports {
            match self.imports.iter().find(|i| i.path == import.path) {
                Some(existing) if existing.alias != import.alias => {
                    return Err(GenError::new(
                        GenErrorKind::Resolve,
                        format!(
                            "the path '{}' is imported twice with different aliases: '{}' and '{}'",
                            import.path, existing.alias, import.alias
                        ),
                    ));
                }
                Some(_) => {}
                None => self.imports.push(import),
            }
        }
        Ok(())
    }

    /// Resolves `name` to its IR node, building and caching it on first
    /// use, and returns a deep copy for the referencing field.
    fn encode_item(&mut self, name: &str, tags: &str) -> Result<Value, GenError> {
        if let Some(v) = self.objs.get(name) {
            return Ok(v.clone());
        }
        let decl = self
            .raw
            .get(name)
            .cloned()
            .ok_or_else(|| {
                GenError::new(
                    GenErrorKind::Resolve,
                    format!("could not find record with name '{name}'"),
                )
            })?;

        if self.building.iter().any(|n| n == name) {
            return Err(GenError::new(
                GenErrorKind::Resolve,
                format!(
                    "reference cycle through record '{name}' ({})",
                    self.building.join(" -> ")
                ),
            ));
        }
        self.building.push(name.to_string());
        let built = self.encode_decl(&decl, name, tags);
        self.building.pop();

        let mut v = built.map_err(|e| e.context(&format!("failed to encode {name}")))?;
        v.field_name = name.to_string();
        v.struct_name = name.to_string();
        self.objs.insert(name.to_string(), v.clone());
        Ok(v)
    }

    fn encode_decl(
        &mut self,
        decl: &RecordDecl,
        name: &str,
        tags: &str,
    ) -> Result<Value, GenError> {
        if decl.impl_func {
            let size = tags::lookup_int(tags, "ssz-size").unwrap_or(0);
            return Ok(Value {
                size_in_bytes: size,
                value_size: size,
                no_ptr: decl.strct.is_none(),
                ..Value::new(Kind::Reference)
            });
        }
        if let Some(strct) = &decl.strct {
            return self.parse_container(name, strct);
        }
        if let Some(typ) = &decl.typ {
            return self
                .parse_field_type(name, tags, typ)?
                .ok_or_else(|| {
                    GenError::new(
                        GenErrorKind::Resolve,
                        format!("alias '{name}' resolves to an omitted value"),
                    )
                });
        }
        Err(GenError::new(
            GenErrorKind::Internal,
            format!("record '{name}' carries neither a struct nor an alias"),
        ))
    }

    fn parse_container(
        &mut self,
        name: &str,
        strct: &syn::ItemStruct,
    ) -> Result<Value, GenError> {
        if !strct.generics.params.is_empty() {
            return Err(GenError::new(
                GenErrorKind::Resolve,
                format!("generic record '{name}' is not supported"),
            ));
        }

        let mut v = Value {
            field_name: name.to_string(),
            ..Value::new(Kind::Container)
        };

        if let syn::Fields::Named(named) = &strct.fields {
            for field in &named.named {
                let Some(ident) = &field.ident else { continue };
                let field_name = ident.to_string();
                if !matches!(field.vis, syn::Visibility::Public(_)) {
                    continue;
                }
                if field_name.starts_with("xxx_") {
                    // framework-internal field
                    continue;
                }
                let tags = ingest::field_tags(field)
                    .map_err(|e| e.context(&format!("field '{field_name}'")))?;

                let Some(mut elem) = self.parse_field_type(&field_name, &tags, &field.ty)?
                else {
                    continue;
                };
                elem.field_name = field_name;
                elem.field_offset = v.fields.len();
                v.fields.push(elem);
            }
        }

        for f in &v.fields {
            if f.is_fixed() {
                v.value_size += f.value_size;
            } else {
                v.value_size += BYTES_PER_LENGTH_OFFSET;
                v.size_is_variable = true;
            }
        }
        Ok(v)
    }

    /// Classifies one field type expression into a [`Value`].
    fn parse_field_type(
        &mut self,
        name: &str,
        tags: &str,
        ty: &syn::Type,
    ) -> Result<Option<Value>, GenError> {
        if tags::lookup(tags, "ssz").as_deref() == Some("-") {
            // omitted field
            return Ok(None);
        }

        match ty {
            syn::Type::Path(p) => self.parse_path_type(name, tags, p),
            syn::Type::Array(arr) => self.parse_array_type(name, tags, arr).map(Some),
            other => Err(GenError::new(
                GenErrorKind::Parse,
                format!(
                    "unsupported type expression '{}' for field '{name}'",
                    render_type(other)
                ),
            )),
        }
    }

    fn parse_path_type(
        &mut self,
        name: &str,
        tags: &str,
        p: &syn::TypePath,
    ) -> Result<Option<Value>, GenError> {
        if let Some(inner) = generic_inner(p, "Option") {
            // owning nullable reference to a record
            let syn::Type::Path(ip) = inner else {
                return Err(GenError::new(
                    GenErrorKind::Parse,
                    format!("field '{name}': Option must wrap a record type"),
                ));
            };
            let segs = plain_segments(ip).ok_or_else(|| {
                GenError::new(
                    GenErrorKind::Parse,
                    format!("field '{name}': Option must wrap a record type"),
                )
            })?;
            let mut v = match segs.len() {
                1 => self.encode_item(&segs[0], tags)?,
                _ => {
                    let mut v = self.encode_item(&segs[segs.len() - 1], tags)?;
                    v.ref_alias = segs[segs.len() - 2].clone();
                    v
                }
            };
            v.no_ptr = false;
            return Ok(Some(v));
        }

        if let Some(inner) = generic_inner(p, "Vec") {
            return self.parse_vec_type(name, tags, inner).map(Some);
        }

        let segs = plain_segments(p).ok_or_else(|| {
            GenError::new(
                GenErrorKind::Parse,
                format!(
                    "unsupported type expression '{}' for field '{name}'",
                    render_type(&syn::Type::Path(p.clone()))
                ),
            )
        })?;

        if segs.len() == 1 {
            let v = match segs[0].as_str() {
                "u64" => Value {
                    value_size: 8,
                    ..Value::new(Kind::Uint)
                },
                "u32" => Value {
                    value_size: 4,
                    ..Value::new(Kind::Uint)
                },
                "u16" => Value {
                    value_size: 2,
                    ..Value::new(Kind::Uint)
                },
                "u8" => Value {
                    value_size: 1,
                    ..Value::new(Kind::Uint)
                },
                "bool" => Value {
                    value_size: 1,
                    ..Value::new(Kind::Bool)
                },
                other => {
                    // record or alias name, embedded by value
                    let mut v = self.encode_item(other, tags)?;
                    if matches!(v.kind, Kind::Container | Kind::Reference) {
                        v.no_ptr = true;
                    }
                    v
                }
            };
            return Ok(Some(v));
        }

        // qualified identifier
        let last = &segs[segs.len() - 1];
        let alias = &segs[segs.len() - 2];
        if last == "Bitlist" {
            let max = tags::lookup_int(tags, "ssz-max").ok_or_else(|| {
                GenError::new(
                    GenErrorKind::Tags,
                    format!("bitlist field '{name}' does not have a ssz-max tag"),
                )
            })?;
            return Ok(Some(Value {
                max_size: max,
                size_in_bytes: max,
                ..Value::new(Kind::BitList)
            }));
        }
        if last.starts_with("Bitvector") {
            let size = tags::lookup_int(tags, "ssz-size").ok_or_else(|| {
                GenError::new(
                    GenErrorKind::Tags,
                    format!("bitvector field '{name}' does not have a ssz-size tag"),
                )
            })?;
            return Ok(Some(Value {
                size_in_bytes: size,
                value_size: size,
                ..Value::new(Kind::Bytes)
            }));
        }
        let mut v = self.encode_item(last, tags)?;
        v.ref_alias = alias.clone();
        v.no_ptr = true;
        Ok(Some(v))
    }

    fn parse_vec_type(
        &mut self,
        name: &str,
        tags: &str,
        inner: &syn::Type,
    ) -> Result<Value, GenError> {
        if is_u8(inner) {
            // byte sequence
            if tags::lookup(tags, "ssz").as_deref() == Some("bitlist") {
                let max = tags::lookup_int(tags, "ssz-max").ok_or_else(|| {
                    GenError::new(
                        GenErrorKind::Tags,
                        format!("bitlist field '{name}' requires a ssz-max tag"),
                    )
                })?;
                return Ok(Value {
                    max_size: max,
                    size_in_bytes: max,
                    ..Value::new(Kind::BitList)
                });
            }
            if let Some(size) = tags::lookup_int(tags, "ssz-size") {
                return Ok(Value {
                    size_in_bytes: size,
                    value_size: size,
                    ..Value::new(Kind::Bytes)
                });
            }
            let max = tags::lookup_int(tags, "ssz-max").ok_or_else(|| {
                GenError::new(
                    GenErrorKind::Tags,
                    format!("Vec<u8> field '{name}' expects either ssz-max or ssz-size"),
                )
            })?;
            return Ok(Value {
                max_size: max,
                ..Value::new(Kind::Bytes)
            });
        }

        if let syn::Type::Array(arr) = inner {
            if is_u8(&arr.elem) {
                let s = array_len(arr, name)?;
                return self.two_dim_bytes(name, tags, s, true);
            }
        }
        if let syn::Type::Path(ip) = inner {
            if let Some(ii) = generic_inner(ip, "Vec") {
                if is_u8(ii) {
                    return self.two_dim_bytes(name, tags, 0, false);
                }
            }
        }

        // sequence of a compound or primitive element
        let elem = self
            .parse_field_type(name, tags, inner)?
            .ok_or_else(|| {
                GenError::new(
                    GenErrorKind::Resolve,
                    format!("element of field '{name}' resolves to an omitted value"),
                )
            })?;

        if let Some(size) = tags::lookup_int(tags, "ssz-size") {
            let value_size = if elem.is_fixed() {
                size * elem.value_size
            } else {
                0
            };
            return Ok(Value {
                size_in_bytes: size,
                value_size,
                element_type: Some(Box::new(elem)),
                ..Value::new(Kind::Vector)
            });
        }
        let max = tags::lookup_int(tags, "ssz-max").ok_or_else(|| {
            GenError::new(
                GenErrorKind::Tags,
                format!("vec field '{name}' expects either ssz-max or ssz-size"),
            )
        })?;
        Ok(Value {
            size_in_bytes: max,
            max_size: max,
            element_type: Some(Box::new(elem)),
            ..Value::new(Kind::List)
        })
    }

    /// Two-dimensional byte storage with a dynamic outer declaration.
    /// `s_lit` carries the inner array length when the element is an inline
    /// array, 0 when both sizes come from tags.
    fn two_dim_bytes(
        &mut self,
        name: &str,
        tags: &str,
        s_lit: u64,
        s_inline: bool,
    ) -> Result<Value, GenError> {
        let (f, s, kind) = if s_lit != 0 {
            if let Some(f) = tags::lookup_int(tags, "ssz-size") {
                (f, s_lit, Kind::Vector)
            } else if let Some(f) = tags::lookup_int(tags, "ssz-max") {
                (f, s_lit, Kind::List)
            } else {
                return Err(GenError::new(
                    GenErrorKind::Tags,
                    format!(
                        "two-dimensional byte field '{name}' is missing its ssz-size or ssz-max tag"
                    ),
                ));
            }
        } else {
            let (f0, s) = tags::lookup_tuple(tags, "ssz-size").ok_or_else(|| {
                GenError::new(
                    GenErrorKind::Tags,
                    format!("two-dimensional byte field '{name}' expects a ssz-size tuple tag"),
                )
            })?;
            if f0 == 0 {
                let f = tags::lookup_int(tags, "ssz-max").ok_or_else(|| {
                    GenError::new(
                        GenErrorKind::Tags,
                        format!("field '{name}': ssz-max not set after '?' in ssz-size"),
                    )
                })?;
                (f, s, Kind::List)
            } else {
                (f0, s, Kind::Vector)
            }
        };

        let element = Value {
            size_is_variable: s_inline,
            value_size: s,
            size_in_bytes: s,
            ..Value::new(Kind::Bytes)
        };
        Ok(match kind {
            Kind::Vector => Value {
                value_size: f * s,
                size_in_bytes: f,
                element_type: Some(Box::new(element)),
                ..Value::new(Kind::Vector)
            },
            _ => Value {
                size_in_bytes: f,
                max_size: f,
                element_type: Some(Box::new(element)),
                ..Value::new(Kind::List)
            },
        })
    }

    fn parse_array_type(
        &mut self,
        name: &str,
        tags: &str,
        arr: &syn::TypeArray,
    ) -> Result<Value, GenError> {
        let n = array_len(arr, name)?;
        if is_u8(&arr.elem) {
            // inline fixed byte array
            return Ok(Value {
                size_is_variable: true,
                size_in_bytes: n,
                value_size: n,
                ..Value::new(Kind::Bytes)
            });
        }
        if let syn::Type::Array(inner) = &*arr.elem {
            if is_u8(&inner.elem) {
                let m = array_len(inner, name)?;
                let element = Value {
                    size_is_variable: true,
                    value_size: m,
                    size_in_bytes: m,
                    ..Value::new(Kind::Bytes)
                };
                return Ok(Value {
                    size_is_variable: true,
                    value_size: n * m,
                    size_in_bytes: n,
                    element_type: Some(Box::new(element)),
                    ..Value::new(Kind::Vector)
                });
            }
        }

        let elem = self
            .parse_field_type(name, tags, &arr.elem)?
            .ok_or_else(|| {
                GenError::new(
                    GenErrorKind::Resolve,
                    format!("element of field '{name}' resolves to an omitted value"),
                )
            })?;
        let value_size = if elem.is_fixed() {
            n * elem.value_size
        } else {
            0
        };
        Ok(Value {
            size_is_variable: true,
            size_in_bytes: n,
            value_size,
            element_type: Some(Box::new(elem)),
            ..Value::new(Kind::Vector)
        })
    }
}

fn render_type(ty: &syn::Type) -> String {
    ty.to_token_stream().to_string()
}

/// For `Name<T>` with a single type argument, returns `T`.
fn generic_inner<'a>(p: &'a syn::TypePath, name: &str) -> Option<&'a syn::Type> {
    if p.qself.is_some() || p.path.segments.len() != 1 {
        return None;
    }
    let seg = &p.path.segments[0];
    if seg.ident != name {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match &args.args[0] {
        syn::GenericArgument::Type(t) => Some(t),
        _ => None,
    }
}

/// Segment idents of a path with no generic arguments anywhere.
fn plain_segments(p: &syn::TypePath) -> Option<Vec<String>> {
    if p.qself.is_some() {
        return None;
    }
    let mut out = Vec::new();
    for seg in &p.path.segments {
        if !matches!(seg.arguments, syn::PathArguments::None) {
            return None;
        }
        out.push(seg.ident.to_string());
    }
    if out.is_empty() {
        return None;
    }
    Some(out)
}

fn is_u8(ty: &syn::Type) -> bool {
    matches!(ty, syn::Type::Path(p) if p.qself.is_none() && p.path.is_ident("u8"))
}

fn array_len(arr: &syn::TypeArray, name: &str) -> Result<u64, GenError> {
    if let syn::Expr::Lit(lit) = &arr.len {
        if let syn::Lit::Int(int) = &lit.lit {
            return int.base10_parse::<u64>().map_err(|e| {
                GenError::new(
                    GenErrorKind::Parse,
                    format!("field '{name}': bad array length: {e}"),
                )
            });
        }
    }
    Err(GenError::new(
        GenErrorKind::Parse,
        format!("field '{name}': array length must be an integer literal"),
    ))
}
