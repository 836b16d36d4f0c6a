//! Shared emission machinery for the four method generators.

use crate::error::{GenError, GenErrorKind};
use crate::ir::{Kind, Value, CHUNK_SIZE};

/// Accumulates emitted source text. Lines are indented with four spaces per
/// level; the assembled output is what gets written (after a parse check),
/// so the emitters are responsible for well-formed, readable text.
pub struct Writer {
    out: String,
}

impl Writer {
    pub fn new() -> Self {
        Self { out: String::new() }
    }

    pub fn line(&mut self, indent: usize, s: &str) {
        for _ in 0..indent {
            self.out.push_str("    ");
        }
        self.out.push_str(s);
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// How a value is reached in the emitted code.
#[derive(Debug, Clone)]
pub struct Access {
    /// Expression for the value, e.g. `self.epoch` or `elem`.
    pub expr: String,
    /// True when the expression is a loop element binding (already a
    /// reference, and never nullable).
    pub is_elem: bool,
}

impl Access {
    pub fn field(v: &Value) -> Self {
        Self {
            expr: format!("self.{}", v.field_name),
            is_elem: false,
        }
    }

    pub fn elem() -> Self {
        Self {
            expr: "elem".to_string(),
            is_elem: true,
        }
    }

    pub fn indexed(&self, index: &str) -> Self {
        Self {
            expr: format!("{}[{index}]", self.expr),
            is_elem: true,
        }
    }

    /// `&expr` for a place expression, the bare binding for an element.
    pub fn amp(&self) -> String {
        if self.is_elem {
            self.expr.clone()
        } else {
            format!("&{}", self.expr)
        }
    }
}

/// Whether the generated code must guard the value behind an `Option`
/// nullable reference before touching it.
pub fn is_nullable(v: &Value, access: &Access) -> bool {
    matches!(v.kind, Kind::Container | Kind::Reference) && !v.no_ptr && !access.is_elem
}

/// Value expression a uint marshals/hashes through: fields declared via a
/// named alias of a primitive cast through the primitive.
pub fn uint_value(v: &Value, access: &Access) -> String {
    let deref = if access.is_elem {
        format!("*{}", access.expr)
    } else {
        access.expr.clone()
    };
    if v.struct_name.is_empty() {
        deref
    } else {
        format!("{} as {}", deref, v.uint_primitive())
    }
}

/// Byte length the emitted bound checks compare a bitlist against.
pub fn bitlist_byte_bound(max_bits: u64) -> u64 {
    max_bits.div_ceil(8) + 1
}

/// Fixed byte size padded up to the next hashing chunk boundary.
pub fn chunk_aligned(size: u64) -> u64 {
    size.div_ceil(CHUNK_SIZE) * CHUNK_SIZE
}

/// Emits the §4.7.1 bound check for a value, if it needs one. Inline array
/// backings have statically correct lengths and are not checked.
pub fn emit_validate(w: &mut Writer, ind: usize, v: &Value, access: &Access) {
    match v.kind {
        Kind::Bytes => {
            if v.size_is_variable {
                return;
            }
            let (cmp, bound) = if v.size_in_bytes != 0 {
                ("!=", v.size_in_bytes)
            } else {
                (">", v.max_size)
            };
            w.line(
                ind,
                &format!("if {}.len() {cmp} {bound} {{", access.expr),
            );
            w.line(ind + 1, "return Err(ssz::Error::BytesLength);");
            w.line(ind, "}");
        }
        Kind::BitList => {
            let bound = bitlist_byte_bound(v.max_size);
            w.line(ind, &format!("if {}.len() > {bound} {{", access.expr));
            w.line(ind + 1, "return Err(ssz::Error::BytesLength);");
            w.line(ind, "}");
        }
        Kind::Vector => {
            if v.size_is_variable {
                return;
            }
            w.line(
                ind,
                &format!("if {}.len() != {} {{", access.expr, v.size_in_bytes),
            );
            w.line(ind + 1, "return Err(ssz::Error::VectorLength);");
            w.line(ind, "}");
        }
        Kind::List => {
            w.line(
                ind,
                &format!("if {}.len() > {} {{", access.expr, v.size_in_bytes),
            );
            w.line(ind + 1, "return Err(ssz::Error::ListTooBig);");
            w.line(ind, "}");
        }
        _ => {}
    }
}

pub fn internal(message: impl Into<String>) -> GenError {
    GenError::new(GenErrorKind::Internal, message)
}

#[cfg(test)]
mod tests {
    use super::{bitlist_byte_bound, chunk_aligned};

    #[test]
    fn bitlist_bound_rounds_up_and_adds_delimiter() {
        assert_eq!(bitlist_byte_bound(8), 2);
        assert_eq!(bitlist_byte_bound(128), 17);
        assert_eq!(bitlist_byte_bound(7), 2);
    }

    #[test]
    fn chunk_alignment() {
        assert_eq!(chunk_aligned(32), 32);
        assert_eq!(chunk_aligned(48), 64);
        assert_eq!(chunk_aligned(1), 32);
    }
}
