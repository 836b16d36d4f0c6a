//! Hash-tree-root emission.
//!
//! Containers record the hasher index, hash every field in declaration
//! order and merkleize from the recorded index. Byte and uint sequences
//! append chunk-aligned data and merkleize, with a length mix-in for lists.

use crate::emit::{chunk_aligned, emit_validate, internal, is_nullable, uint_value, Access, Writer};
use crate::error::GenError;
use crate::ir::{Kind, Value};

pub fn hash_methods(w: &mut Writer, name: &str, v: &Value) -> Result<(), GenError> {
    w.line(
        1,
        &format!("/// Computes the ssz hash tree root of the {name} object."),
    );
    w.line(
        1,
        "pub fn hash_tree_root(&self) -> Result<[u8; 32], ssz::Error> {",
    );
    w.line(
        2,
        "ssz::hash_with_default_hasher(|hh| self.hash_tree_root_with(hh))",
    );
    w.line(1, "}");
    w.blank();

    w.line(
        1,
        &format!("/// Computes the ssz hash tree root of the {name} object with a hasher."),
    );
    w.line(
        1,
        "pub fn hash_tree_root_with(&self, hh: &mut ssz::Hasher) -> Result<(), ssz::Error> {",
    );
    w.line(2, "let idx = hh.index();");
    w.blank();

    for f in &v.fields {
        w.line(2, &format!("// Field ({}) '{}'", f.field_offset, f.field_name));
        hash_value(w, 2, f, &Access::field(f))?;
        w.blank();
    }

    w.line(2, "hh.merkleize(idx);");
    w.line(2, "Ok(())");
    w.line(1, "}");
    Ok(())
}

fn hash_value(w: &mut Writer, ind: usize, v: &Value, access: &Access) -> Result<(), GenError> {
    match v.kind {
        Kind::Container | Kind::Reference => {
            if is_nullable(v, access) {
                w.line(ind, &format!("match &{} {{", access.expr));
                w.line(ind + 1, "Some(obj) => obj.hash_tree_root_with(hh)?,");
                w.line(
                    ind + 1,
                    &format!("None => {}::default().hash_tree_root_with(hh)?,", v.obj_ref()),
                );
                w.line(ind, "};");
            } else {
                w.line(ind, &format!("{}.hash_tree_root_with(hh)?;", access.expr));
            }
        }
        Kind::Uint => {
            w.line(
                ind,
                &format!("hh.put_{}({});", v.uint_suffix(), uint_value(v, access)),
            );
        }
        Kind::Bool => {
            let value = if access.is_elem {
                format!("*{}", access.expr)
            } else {
                access.expr.clone()
            };
            w.line(ind, &format!("hh.put_bool({value});"));
        }
        Kind::Bytes => {
            emit_validate(w, ind, v, access);
            w.line(ind, &format!("hh.put_bytes({});", access.amp()));
        }
        Kind::BitList => {
            w.line(ind, &format!("if {}.is_empty() {{", access.expr));
            w.line(ind + 1, "return Err(ssz::Error::EmptyBitlist);");
            w.line(ind, "}");
            w.line(
                ind,
                &format!("hh.put_bitlist({}, {});", access.amp(), v.max_size),
            );
        }
        Kind::Vector => {
            let Some(elem) = v.element_type.as_deref() else {
                return Err(internal("vector value without an element type"));
            };
            match elem.kind {
                Kind::Bytes | Kind::Uint if elem.is_fixed() => {
                    hash_roots(w, ind, v, elem, access, false)?
                }
                Kind::Container | Kind::Reference => {
                    hash_container_seq(w, ind, v, access, false)?
                }
                _ => {
                    return Err(internal(format!(
                        "hashing of {} vector elements is not supported",
                        elem.kind.as_str()
                    )))
                }
            }
        }
        Kind::List => {
            let Some(elem) = v.element_type.as_deref() else {
                return Err(internal("list value without an element type"));
            };
            match elem.kind {
                Kind::Bytes | Kind::Uint if elem.is_fixed() => {
                    hash_roots(w, ind, v, elem, access, true)?
                }
                Kind::Container | Kind::Reference => {
                    hash_container_seq(w, ind, v, access, true)?
                }
                _ => {
                    return Err(internal(format!(
                        "hashing of {} list elements is not supported",
                        elem.kind.as_str()
                    )))
                }
            }
        }
        Kind::BitVector => {
            return Err(internal("hash not implemented for bitvector values"))
        }
    }
    Ok(())
}

/// Byte/uint sequence hashing: append each element chunk-aligned, then
/// merkleize, mixing in the length for lists.
fn hash_roots(
    w: &mut Writer,
    ind: usize,
    v: &Value,
    elem: &Value,
    access: &Access,
    is_list: bool,
) -> Result<(), GenError> {
    w.line(ind, "{");
    emit_validate(w, ind + 1, v, access);
    w.line(ind + 1, "let sub_idx = hh.index();");
    w.line(ind + 1, &format!("for elem in {} {{", access.amp()));

    match elem.kind {
        Kind::Bytes => {
            let s = elem.value_size;
            w.line(ind + 2, &format!("if elem.len() != {s} {{"));
            w.line(ind + 3, "return Err(ssz::Error::BytesLength);");
            w.line(ind + 2, "}");
            let padded = chunk_aligned(s);
            if padded != s {
                // zero-pad to the next chunk boundary
                w.line(ind + 2, &format!("let mut padded = [0u8; {padded}];"));
                w.line(ind + 2, &format!("padded[..{s}].copy_from_slice(elem);"));
                w.line(ind + 2, "hh.append(&padded);");
            } else {
                w.line(ind + 2, "hh.append(elem);");
            }
        }
        Kind::Uint => {
            let value = if elem.value_size == 8 {
                "*elem".to_string()
            } else {
                "u64::from(*elem)".to_string()
            };
            w.line(ind + 2, &format!("hh.append_uint64({value});"));
        }
        _ => return Err(internal("hash roots expects byte or uint elements")),
    }
    w.line(ind + 1, "}");

    if elem.kind == Kind::Uint {
        w.line(ind + 1, "hh.fill_up_to_32();");
    }
    if is_list {
        let elem_chunk = if elem.kind == Kind::Bytes { 32 } else { 8 };
        w.line(ind + 1, &format!("let num_items = {}.len();", access.expr));
        w.line(
            ind + 1,
            &format!(
                "hh.merkleize_with_mixin(sub_idx, num_items, ssz::calculate_limit({}, num_items, {elem_chunk}));",
                v.size_in_bytes
            ),
        );
    } else {
        w.line(ind + 1, "hh.merkleize(sub_idx);");
    }
    w.line(ind, "}");
    Ok(())
}

/// Container sequence hashing: every element contributes its own root.
fn hash_container_seq(
    w: &mut Writer,
    ind: usize,
    v: &Value,
    access: &Access,
    is_list: bool,
) -> Result<(), GenError> {
    w.line(ind, "{");
    w.line(ind + 1, "let sub_idx = hh.index();");
    if is_list {
        w.line(ind + 1, &format!("let num = {}.len();", access.expr));
        w.line(ind + 1, &format!("if num > {} {{", v.max_size));
        w.line(ind + 2, "return Err(ssz::Error::IncorrectListSize);");
        w.line(ind + 1, "}");
    } else {
        emit_validate(w, ind + 1, v, access);
    }
    w.line(ind + 1, &format!("for elem in {} {{", access.amp()));
    w.line(ind + 2, "elem.hash_tree_root_with(hh)?;");
    w.line(ind + 1, "}");
    if is_list {
        w.line(
            ind + 1,
            &format!("hh.merkleize_with_mixin(sub_idx, num, {});", v.max_size),
        );
    } else {
        w.line(ind + 1, "hh.merkleize(sub_idx);");
    }
    w.line(ind, "}");
    Ok(())
}
