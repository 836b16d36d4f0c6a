//! Marshal-method emission.
//!
//! Two methods per container: a convenience entry point allocating from
//! `size_ssz`, and the to-buffer workhorse. The to-buffer form walks the
//! fields twice: once for the fixed part and offset table, once for the
//! variable tails.

use crate::emit::{emit_validate, internal, is_nullable, uint_value, Access, Writer};
use crate::emit_size::size_delta;
use crate::error::GenError;
use crate::ir::{Kind, Value};

pub fn marshal_methods(w: &mut Writer, name: &str, v: &Value) -> Result<(), GenError> {
    w.line(
        1,
        &format!("/// Marshals the {name} object into a newly allocated buffer."),
    );
    w.line(1, "pub fn marshal_ssz(&self) -> Result<Vec<u8>, ssz::Error> {");
    w.line(2, "let mut buf = Vec::with_capacity(self.size_ssz());");
    w.line(2, "self.marshal_ssz_to(&mut buf)?;");
    w.line(2, "Ok(buf)");
    w.line(1, "}");
    w.blank();

    w.line(
        1,
        &format!("/// Marshals the {name} object into the target buffer."),
    );
    w.line(
        1,
        "pub fn marshal_ssz_to(&self, buf: &mut Vec<u8>) -> Result<(), ssz::Error> {",
    );
    if !v.is_fixed() {
        w.line(2, &format!("let mut offset: usize = {};", v.value_size));
        w.blank();
    }

    // fixed part and offset table
    for f in &v.fields {
        let access = Access::field(f);
        if f.is_fixed() {
            w.line(2, &format!("// Field ({}) '{}'", f.field_offset, f.field_name));
            marshal_value(w, 2, f, &access)?;
        } else {
            w.line(2, &format!("// Offset ({}) '{}'", f.field_offset, f.field_name));
            w.line(2, "ssz::write_offset(buf, offset);");
            size_delta(w, 2, f, "offset", &access)?;
        }
        w.blank();
    }

    // variable tails
    for f in &v.fields {
        if f.is_fixed() {
            continue;
        }
        w.line(2, &format!("// Field ({}) '{}'", f.field_offset, f.field_name));
        marshal_value(w, 2, f, &Access::field(f))?;
        w.blank();
    }

    w.line(2, "Ok(())");
    w.line(1, "}");
    Ok(())
}

fn marshal_value(w: &mut Writer, ind: usize, v: &Value, access: &Access) -> Result<(), GenError> {
    match v.kind {
        Kind::Container | Kind::Reference => {
            if is_nullable(v, access) {
                w.line(ind, &format!("match &{} {{", access.expr));
                w.line(ind + 1, "Some(obj) => obj.marshal_ssz_to(buf)?,");
                w.line(
                    ind + 1,
                    &format!("None => {}::default().marshal_ssz_to(buf)?,", v.obj_ref()),
                );
                w.line(ind, "};");
            } else {
                w.line(ind, &format!("{}.marshal_ssz_to(buf)?;", access.expr));
            }
        }
        Kind::Bytes => {
            emit_validate(w, ind, v, access);
            w.line(
                ind,
                &format!("buf.extend_from_slice({});", access.amp()),
            );
        }
        Kind::BitList => {
            emit_validate(w, ind, v, access);
            w.line(
                ind,
                &format!("buf.extend_from_slice({});", access.amp()),
            );
        }
        Kind::Uint => {
            w.line(
                ind,
                &format!(
                    "ssz::marshal_{}(buf, {});",
                    v.uint_suffix(),
                    uint_value(v, access)
                ),
            );
        }
        Kind::Bool => {
            let value = if access.is_elem {
                format!("*{}", access.expr)
            } else {
                access.expr.clone()
            };
            w.line(ind, &format!("ssz::marshal_bool(buf, {value});"));
        }
        Kind::Vector | Kind::List => {
            let Some(elem) = v.element_type.as_deref() else {
                return Err(internal("sequence value without an element type"));
            };
            emit_validate(w, ind, v, access);
            if elem.is_fixed() {
                w.line(ind, &format!("for elem in {} {{", access.amp()));
                marshal_value(w, ind + 1, elem, &Access::elem())?;
                w.line(ind, "}");
            } else {
                // offsets for each element, then the elements themselves
                w.line(ind, &format!("offset = 4 * {}.len();", access.expr));
                w.line(ind, &format!("for elem in {} {{", access.amp()));
                w.line(ind + 1, "ssz::write_offset(buf, offset);");
                size_delta(w, ind + 1, elem, "offset", &Access::elem())?;
                w.line(ind, "}");
                w.line(ind, &format!("for elem in {} {{", access.amp()));
                marshal_value(w, ind + 1, elem, &Access::elem())?;
                w.line(ind, "}");
            }
        }
        Kind::BitVector => {
            return Err(internal(
                "marshal not implemented for bitvector values",
            ))
        }
    }
    Ok(())
}
