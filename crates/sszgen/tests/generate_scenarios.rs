//! Emitted-code shapes for the canonical record scenarios.

mod support;

use support::{assert_contains, assert_not_contains, read, write_file};

/// Generates per-file outputs for one source file and returns the emitted
/// text.
fn generate_one(src: &str) -> String {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "types.rs", src);
    let written =
        sszgen::generate::generate(dir.path(), &[], &[], None).expect("generation succeeds");
    assert_eq!(written.len(), 1);
    assert!(written[0].ends_with("types_encoding.rs"));
    read(&written[0])
}

#[test]
fn fixed_record_sizes_and_layout() {
    // A { x uint64; y [32]byte } encodes to exactly 40 bytes
    let out = generate_one(
        r#"
pub struct A {
    pub x: u64,
    pub y: [u8; 32],
}
"#,
    );

    assert_contains(&out, "impl A {");
    assert_contains(&out, "let size: usize = 40;");
    assert_contains(&out, "ssz::marshal_uint64(buf, self.x);");
    assert_contains(&out, "buf.extend_from_slice(&self.y);");
    assert_contains(&out, "if size != 40 {");
    assert_contains(&out, "self.x = ssz::unmarshal_uint64(&buf[0..8]);");
    assert_contains(&out, "self.y.copy_from_slice(&buf[8..40]);");
    assert_contains(&out, "hh.put_uint64(self.x);");
    assert_contains(&out, "hh.put_bytes(&self.y);");
    // a fixed container reads no offsets
    assert_not_contains(&out, "read_offset");
}

#[test]
fn uint_list_offsets_and_extend() {
    // B { items []uint64 ssz-max:"1024" }
    let out = generate_one(
        r#"
pub struct B {
    #[ssz("ssz-max:\"1024\"")]
    pub items: Vec<u64>,
}
"#,
    );

    assert_contains(&out, "let mut size: usize = 4;");
    assert_contains(&out, "size += self.items.len() * 8;");
    assert_contains(&out, "let mut offset: usize = 4;");
    assert_contains(&out, "ssz::write_offset(buf, offset);");
    assert_contains(&out, "offset += self.items.len() * 8;");
    assert_contains(&out, "if self.items.len() > 1024 {");
    assert_contains(&out, "return Err(ssz::Error::ListTooBig);");
    // a 4-byte buffer with offset=4 decodes to an empty list
    assert_contains(&out, "if size < 4 {");
    assert_contains(&out, "o0 = ssz::read_offset(&buf[0..4]);");
    assert_contains(&out, "if o0 != 4 {");
    assert_contains(&out, "let num = ssz::divide_int2(buf.len(), 8, 1024)?;");
    assert_contains(&out, "ssz::extend_uint64(&mut self.items, num);");
    assert_contains(&out, "hh.fill_up_to_32();");
    assert_contains(
        &out,
        "hh.merkleize_with_mixin(sub_idx, num_items, ssz::calculate_limit(1024, num_items, 8));",
    );
}

#[test]
fn mixed_fixed_and_dynamic_fields() {
    // C { data []byte ssz-max:"256"; tag uint16 }: offset(6) ++ tag ++ data
    let out = generate_one(
        r#"
pub struct C {
    #[ssz("ssz-max:\"256\"")]
    pub data: Vec<u8>,
    pub tag: u16,
}
"#,
    );

    assert_contains(&out, "let mut offset: usize = 6;");
    assert_contains(&out, "// Offset (0) 'data'");
    assert_contains(&out, "// Field (1) 'tag'");
    assert_contains(&out, "ssz::marshal_uint16(buf, self.tag);");
    assert_contains(&out, "offset += self.data.len();");
    // any buffer whose first offset is not 6 is rejected
    assert_contains(&out, "if size < 6 {");
    assert_contains(&out, "if o0 != 6 {");
    assert_contains(&out, "return Err(ssz::Error::Offset);");
    assert_contains(&out, "self.tag = ssz::unmarshal_uint16(&buf[4..6]);");
    assert_contains(&out, "let buf = &tail[o0..];");
    assert_contains(&out, "if buf.len() > 256 {");
    assert_contains(&out, "return Err(ssz::Error::BytesLength);");
}

#[test]
fn list_of_fixed_containers() {
    // D { children []*A ssz-max:"4" } with A fixed at 40 bytes
    let out = generate_one(
        r#"
pub struct A {
    pub x: u64,
    pub y: [u8; 32],
}

pub struct D {
    #[ssz("ssz-max:\"4\"")]
    pub children: Vec<A>,
}
"#,
    );

    assert_contains(&out, "size += self.children.len() * 40;");
    assert_contains(&out, "for elem in &self.children {");
    assert_contains(&out, "elem.marshal_ssz_to(buf)?;");
    assert_contains(&out, "let num = ssz::divide_int2(buf.len(), 40, 4)?;");
    assert_contains(&out, "self.children.clear();");
    assert_contains(&out, "self.children.resize_with(num, Default::default);");
    assert_contains(&out, "self.children[i].unmarshal_ssz(src)?;");
    assert_contains(&out, "return Err(ssz::Error::IncorrectListSize);");
    assert_contains(&out, "hh.merkleize_with_mixin(sub_idx, num, 4);");
}

#[test]
fn bitlist_hash_rejects_empty() {
    // E { bits bitlist ssz-max:"128" }
    let out = generate_one(
        r#"
pub struct E {
    #[ssz("ssz-max:\"128\"")]
    pub bits: bitfield::Bitlist,
}
"#,
    );

    assert_contains(&out, "size += self.bits.len();");
    // marshal bound: ceil(128 / 8) + 1 delimiter byte
    assert_contains(&out, "if self.bits.len() > 17 {");
    assert_contains(&out, "ssz::validate_bitlist(buf, 128)?;");
    assert_contains(&out, "if self.bits.is_empty() {");
    assert_contains(&out, "return Err(ssz::Error::EmptyBitlist);");
    assert_contains(&out, "hh.put_bitlist(&self.bits, 128);");
}

#[test]
fn two_dimensional_roots_vector() {
    // F { roots [16][32]byte }: fixed size 512, 16 exact chunks
    let out = generate_one(
        r#"
pub struct F {
    pub roots: [[u8; 32]; 16],
}
"#,
    );

    assert_contains(&out, "let size: usize = 512;");
    assert_contains(&out, "if size != 512 {");
    assert_contains(&out, "for elem in &self.roots {");
    assert_contains(&out, "let src = &src[i * 32..(i + 1) * 32];");
    assert_contains(&out, "self.roots[i].copy_from_slice(src);");
    assert_contains(&out, "if elem.len() != 32 {");
    assert_contains(&out, "hh.append(elem);");
    assert_contains(&out, "hh.merkleize(sub_idx);");
    // chunks are exactly 32 bytes, no padding buffer
    assert_not_contains(&out, "padded");
    // inline arrays have statically correct lengths
    assert_not_contains(&out, "Err(ssz::Error::VectorLength)");
}

#[test]
fn unaligned_byte_elements_are_chunk_padded() {
    let out = generate_one(
        r#"
pub struct Proofs {
    #[ssz("ssz-max:\"64\"")]
    pub sigs: Vec<[u8; 48]>,
}
"#,
    );

    assert_contains(&out, "if elem.len() != 48 {");
    assert_contains(&out, "let mut padded = [0u8; 64];");
    assert_contains(&out, "padded[..48].copy_from_slice(elem);");
    assert_contains(&out, "hh.append(&padded);");
    assert_contains(
        &out,
        "hh.merkleize_with_mixin(sub_idx, num_items, ssz::calculate_limit(64, num_items, 32));",
    );
}

#[test]
fn nullable_record_fields_default_when_absent() {
    let out = generate_one(
        r#"
pub struct Checkpoint {
    pub epoch: u64,
    pub root: [u8; 32],
}

pub struct Attestation {
    pub source: Option<Checkpoint>,
    pub target: Checkpoint,
}
"#,
    );

    assert_contains(&out, "match &self.source {");
    assert_contains(&out, "Some(obj) => obj.marshal_ssz_to(buf)?,");
    assert_contains(&out, "None => Checkpoint::default().marshal_ssz_to(buf)?,");
    assert_contains(
        &out,
        "self.source.get_or_insert_with(Checkpoint::default).unmarshal_ssz(&buf[0..40])?;",
    );
    // the by-value field is used directly
    assert_contains(&out, "self.target.marshal_ssz_to(buf)?;");
    assert_contains(&out, "self.target.hash_tree_root_with(hh)?;");
}

#[test]
fn alias_fields_cast_through_the_alias() {
    let out = generate_one(
        r#"
pub type Epoch = u64;

pub struct Header {
    pub epoch: Epoch,
}
"#,
    );

    assert_contains(&out, "ssz::marshal_uint64(buf, self.epoch as u64);");
    assert_contains(&out, "self.epoch = ssz::unmarshal_uint64(&buf[0..8]) as Epoch;");
    assert_contains(&out, "hh.put_uint64(self.epoch as u64);");
    // the alias itself gets no methodset
    assert_not_contains(&out, "impl Epoch");
}

#[test]
fn dynamic_list_of_dynamic_elements() {
    let out = generate_one(
        r#"
pub struct Tx {
    #[ssz("ssz-max:\"1024\"")]
    pub payload: Vec<u8>,
}

pub struct Block {
    #[ssz("ssz-max:\"16\"")]
    pub txs: Vec<Tx>,
}
"#,
    );

    // per-element offsets start at 4 * count and advance per element size
    assert_contains(&out, "offset = 4 * self.txs.len();");
    assert_contains(&out, "for elem in &self.txs {");
    assert_contains(&out, "offset += elem.size_ssz();");
    assert_contains(&out, "let num = ssz::decode_dynamic_length(buf, 16)?;");
    assert_contains(&out, "ssz::unmarshal_dynamic(buf, num, |i, buf| {");
    assert_contains(&out, "self.txs[i].unmarshal_ssz(buf)?;");
    // size of a dynamic element list walks the elements
    assert_contains(&out, "size += 4;");
    assert_contains(&out, "size += elem.size_ssz();");
}
