//! Size-method emission.
//!
//! The emitted method starts from the container's fixed part, a
//! generation-time constant, and adds one delta per variable field in
//! declaration order.

use crate::emit::{internal, is_nullable, Access, Writer};
use crate::error::GenError;
use crate::ir::{Kind, Value};

pub fn size_method(w: &mut Writer, name: &str, v: &Value) -> Result<(), GenError> {
    w.line(
        1,
        &format!("/// Returns the ssz encoded size in bytes for the {name} object."),
    );
    w.line(1, "pub fn size_ssz(&self) -> usize {");

    let dynamic: Vec<&Value> = v.fields.iter().filter(|f| !f.is_fixed()).collect();
    if dynamic.is_empty() {
        w.line(2, &format!("let size: usize = {};", v.value_size));
    } else {
        w.line(2, &format!("let mut size: usize = {};", v.value_size));
        for f in &dynamic {
            w.blank();
            w.line(2, &format!("// Field ({}) '{}'", f.field_offset, f.field_name));
            size_delta(w, 2, f, "size", &Access::field(f))?;
        }
    }
    w.line(2, "size");
    w.line(1, "}");
    Ok(())
}

/// Emits `dst += <encoded size of v>`. Also drives the offset bookkeeping
/// in the marshaller, which passes `offset` as the destination.
pub fn size_delta(
    w: &mut Writer,
    ind: usize,
    v: &Value,
    dst: &str,
    access: &Access,
) -> Result<(), GenError> {
    if v.is_fixed() && !matches!(v.kind, Kind::Container | Kind::Reference) {
        w.line(ind, &format!("{dst} += {};", v.value_size));
        return Ok(());
    }

    match v.kind {
        Kind::Container | Kind::Reference => {
            if is_nullable(v, access) {
                w.line(ind, &format!("{dst} += match &{} {{", access.expr));
                w.line(ind + 1, "Some(obj) => obj.size_ssz(),");
                w.line(
                    ind + 1,
                    &format!("None => {}::default().size_ssz(),", v.obj_ref()),
                );
                w.line(ind, "};");
            } else {
                w.line(ind, &format!("{dst} += {}.size_ssz();", access.expr));
            }
        }
        Kind::Bytes | Kind::BitList => {
            w.line(ind, &format!("{dst} += {}.len();", access.expr));
        }
        Kind::List | Kind::Vector => {
            let Some(elem) = v.element_type.as_deref() else {
                return Err(internal("list value without an element type"));
            };
            if elem.is_fixed() {
                w.line(
                    ind,
                    &format!("{dst} += {}.len() * {};", access.expr, elem.value_size),
                );
            } else {
                w.line(ind, &format!("for elem in {} {{", access.amp()));
                w.line(ind + 1, &format!("{dst} += 4;"));
                size_delta(w, ind + 1, elem, dst, &Access::elem())?;
                w.line(ind, "}");
            }
        }
        _ => {
            return Err(internal(format!(
                "size delta not implemented for type {}",
                v.kind.as_str()
            )))
        }
    }
    Ok(())
}
