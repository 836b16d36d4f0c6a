//! Unmarshal-method emission.
//!
//! The emitted decoder validates the buffer size, reads the fixed part and
//! the offset table behind a generation-time cursor, validates every offset
//! (first against the fixed size, the rest for monotonicity and bound), and
//! then decodes each variable tail from its offset window.

use crate::emit::{internal, is_nullable, Access, Writer};
use crate::error::GenError;
use crate::ir::{Kind, Value};

pub fn unmarshal_method(w: &mut Writer, name: &str, v: &Value) -> Result<(), GenError> {
    w.line(
        1,
        &format!("/// Unmarshals the {name} object from the source buffer."),
    );
    w.line(
        1,
        "pub fn unmarshal_ssz(&mut self, buf: &[u8]) -> Result<(), ssz::Error> {",
    );
    w.line(2, "let size = buf.len();");
    let cmp = if v.is_fixed() { "!=" } else { "<" };
    w.line(2, &format!("if size {cmp} {} {{", v.value_size));
    w.line(3, "return Err(ssz::Error::Size);");
    w.line(2, "}");

    let offsets: Vec<&Value> = v.fields.iter().filter(|f| !f.is_fixed()).collect();
    if !offsets.is_empty() {
        w.line(2, "let tail = buf;");
        for f in &offsets {
            w.line(2, &format!("let o{}: usize;", f.field_offset));
        }
    }
    w.blank();

    // fixed part and offset table
    let mut cursor: u64 = 0;
    let mut prev: Option<usize> = None;
    for f in &v.fields {
        let step = if f.is_fixed() { f.value_size } else { 4 };
        let from = cursor;
        let to = cursor + step;
        cursor = to;

        if f.is_fixed() {
            w.line(2, &format!("// Field ({}) '{}'", f.field_offset, f.field_name));
            let src = format!("&buf[{from}..{to}]");
            let access = Access::field(f);
            if needs_src_binding(f) {
                w.line(2, "{");
                w.line(3, &format!("let src = {src};"));
                unmarshal_value(w, 3, f, "src", &access)?;
                w.line(2, "}");
            } else {
                unmarshal_value(w, 2, f, &src, &access)?;
            }
        } else {
            w.line(2, &format!("// Offset ({}) '{}'", f.field_offset, f.field_name));
            let oname = format!("o{}", f.field_offset);
            w.line(2, &format!("{oname} = ssz::read_offset(&buf[{from}..{to}]);"));
            match prev {
                None => {
                    w.line(2, &format!("if {oname} != {} {{", v.value_size));
                    w.line(3, "return Err(ssz::Error::Offset);");
                    w.line(2, "}");
                }
                Some(p) => {
                    w.line(2, &format!("if {oname} > size || o{p} > {oname} {{"));
                    w.line(3, "return Err(ssz::Error::Offset);");
                    w.line(2, "}");
                }
            }
            prev = Some(f.field_offset);
        }
        w.blank();
    }

    // variable tails
    for (i, f) in offsets.iter().enumerate() {
        w.line(2, &format!("// Field ({}) '{}'", f.field_offset, f.field_name));
        let from = format!("o{}", f.field_offset);
        let window = match offsets.get(i + 1) {
            Some(next) => format!("&tail[{from}..o{}]", next.field_offset),
            None => format!("&tail[{from}..]"),
        };
        w.line(2, "{");
        w.line(3, &format!("let buf = {window};"));
        unmarshal_value(w, 3, f, "buf", &Access::field(f))?;
        w.line(2, "}");
        w.blank();
    }

    w.line(2, "Ok(())");
    w.line(1, "}");
    Ok(())
}

/// Whether the kind's decode reads the source window more than once and
/// needs it bound to a local first.
fn needs_src_binding(v: &Value) -> bool {
    match v.kind {
        Kind::Vector | Kind::List | Kind::BitList => true,
        Kind::Bytes => !v.size_is_variable,
        _ => false,
    }
}

/// Emits the decode of `v` from `src` into `access`. Callers pass a bare
/// identifier as `src` for any kind reported by [`needs_src_binding`].
fn unmarshal_value(
    w: &mut Writer,
    ind: usize,
    v: &Value,
    src: &str,
    access: &Access,
) -> Result<(), GenError> {
    match v.kind {
        Kind::Container | Kind::Reference => {
            if is_nullable(v, access) {
                w.line(
                    ind,
                    &format!(
                        "{}.get_or_insert_with({}::default).unmarshal_ssz({src})?;",
                        access.expr,
                        v.obj_ref()
                    ),
                );
            } else {
                w.line(ind, &format!("{}.unmarshal_ssz({src})?;", access.expr));
            }
        }
        Kind::Uint => {
            if v.struct_name.is_empty() {
                w.line(
                    ind,
                    &format!("{} = ssz::unmarshal_{}({src});", access.expr, v.uint_suffix()),
                );
            } else {
                // field declared through a named alias of the primitive
                w.line(
                    ind,
                    &format!(
                        "{} = ssz::unmarshal_{}({src}) as {};",
                        access.expr,
                        v.uint_suffix(),
                        v.obj_ref()
                    ),
                );
            }
        }
        Kind::Bool => {
            w.line(
                ind,
                &format!("{} = ssz::unmarshal_bool({src});", access.expr),
            );
        }
        Kind::Bytes => {
            if v.size_is_variable {
                // inline array, window length is statically correct
                w.line(ind, &format!("{}.copy_from_slice({src});", access.expr));
                return Ok(());
            }
            if v.size_in_bytes == 0 {
                w.line(ind, &format!("if {src}.len() > {} {{", v.max_size));
                w.line(ind + 1, "return Err(ssz::Error::BytesLength);");
                w.line(ind, "}");
            }
            emit_bytes_append(w, ind, src, access);
        }
        Kind::BitList => {
            w.line(
                ind,
                &format!("ssz::validate_bitlist({src}, {})?;", v.max_size),
            );
            emit_bytes_append(w, ind, src, access);
        }
        Kind::Vector => {
            let Some(elem) = v.element_type.as_deref() else {
                return Err(internal("vector value without an element type"));
            };
            if !elem.is_fixed() {
                return Err(internal(
                    "vector of variable elements is not supported by the decoder",
                ));
            }
            create_slice(w, ind, v, elem, access, &v.size_in_bytes.to_string())?;
            emit_chunk_loop(w, ind, elem, src, access, &v.size_in_bytes.to_string())?;
        }
        Kind::List => {
            let Some(elem) = v.element_type.as_deref() else {
                return Err(internal("list value without an element type"));
            };
            if elem.is_fixed() {
                w.line(
                    ind,
                    &format!(
                        "let num = ssz::divide_int2({src}.len(), {}, {})?;",
                        elem.value_size, v.size_in_bytes
                    ),
                );
                create_slice(w, ind, v, elem, access, "num")?;
                emit_chunk_loop(w, ind, elem, src, access, "num")?;
            } else {
                w.line(
                    ind,
                    &format!(
                        "let num = ssz::decode_dynamic_length({src}, {})?;",
                        v.size_in_bytes
                    ),
                );
                create_slice(w, ind, v, elem, access, "num")?;
                w.line(
                    ind,
                    &format!("ssz::unmarshal_dynamic({src}, num, |i, buf| {{"),
                );
                unmarshal_value(w, ind + 1, elem, "buf", &access.indexed("i"))?;
                w.line(ind + 1, "Ok(())");
                w.line(ind, "})?;");
            }
        }
        Kind::BitVector => {
            return Err(internal(
                "unmarshal not implemented for bitvector values",
            ))
        }
    }
    Ok(())
}

fn emit_bytes_append(w: &mut Writer, ind: usize, src: &str, access: &Access) {
    w.line(ind, &format!("if {}.capacity() == 0 {{", access.expr));
    w.line(ind + 1, &format!("{}.reserve({src}.len());", access.expr));
    w.line(ind, "}");
    w.line(
        ind,
        &format!("{}.extend_from_slice({src});", access.expr),
    );
}

/// Per-element decode loop over equal-sized chunks of `src`.
fn emit_chunk_loop(
    w: &mut Writer,
    ind: usize,
    elem: &Value,
    src: &str,
    access: &Access,
    count: &str,
) -> Result<(), GenError> {
    let s = elem.value_size;
    w.line(ind, &format!("for i in 0..{count} {{"));
    w.line(ind + 1, &format!("let src = &{src}[i * {s}..(i + 1) * {s}];"));
    unmarshal_value(w, ind + 1, elem, "src", &access.indexed("i"))?;
    w.line(ind, "}");
    Ok(())
}

/// Initialises the destination sequence before the per-element loop.
/// Inline array backings need no initialisation.
fn create_slice(
    w: &mut Writer,
    ind: usize,
    v: &Value,
    elem: &Value,
    access: &Access,
    count: &str,
) -> Result<(), GenError> {
    if v.size_is_variable {
        return Ok(());
    }
    match elem.kind {
        Kind::Uint => {
            w.line(
                ind,
                &format!(
                    "ssz::extend_{}(&mut {}, {count});",
                    elem.uint_suffix(),
                    access.expr
                ),
            );
        }
        Kind::Container | Kind::Reference => {
            w.line(ind, &format!("{}.clear();", access.expr));
            w.line(
                ind,
                &format!("{}.resize_with({count}, Default::default);", access.expr),
            );
        }
        Kind::Bytes => {
            w.line(ind, &format!("{}.clear();", access.expr));
            if elem.size_is_variable {
                w.line(
                    ind,
                    &format!(
                        "{}.resize({count}, [0u8; {}]);",
                        access.expr, elem.value_size
                    ),
                );
            } else {
                w.line(
                    ind,
                    &format!("{}.resize_with({count}, Default::default);", access.expr),
                );
            }
        }
        _ => {
            return Err(internal(format!(
                "sequence initialisation not implemented for {} elements",
                elem.kind.as_str()
            )))
        }
    }
    Ok(())
}
