//! Reconstructed object entities populated by the fill reader.
//!
//! Reference ids are small dense integers (§9 "Side-tables keyed by dense
//! integer"): every per-ref table here is indexable by [`ReferenceId`], with
//! index 0 reserved as a sentinel and `1` denoting the universal null object
//! per the snapshot format itself.

use core::fmt;

/// A dense integer identifying a reconstructed object.
///
/// `1` is the universal null object. Ids are assigned monotonically during
/// the allocation pass and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceId(pub u32);

impl ReferenceId {
    /// The reference id that denotes the null object.
    pub const NULL: ReferenceId = ReferenceId(1);

    /// Whether this id is the null sentinel.
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<u32> for ReferenceId {
    fn from(v: u32) -> Self {
        ReferenceId(v)
    }
}

/// A decoded string object.
#[derive(Debug, Clone)]
pub struct PooledString {
    pub ref_id: ReferenceId,
    pub value: String,
    pub is_one_byte: bool,
}

/// Any object carrying a name-string reference: class, function, library,
/// script, or namespace. The owner chain (class → library, function →
/// class) is resolved later, on demand, during display.
#[derive(Debug, Clone)]
pub struct NamedObject {
    pub ref_id: ReferenceId,
    pub cid: i64,
    pub name_ref: ReferenceId,
    pub owner_ref: Option<ReferenceId>,
    pub signature_ref: Option<ReferenceId>,
}

/// A compiled function's metadata record.
#[derive(Debug, Clone, Copy)]
pub struct CodeEntry {
    pub ref_id: ReferenceId,
    pub owner_ref: ReferenceId,
    /// Index into the instructions table; resolved to a PC offset range by
    /// a downstream consumer (§4.1, `InstructionsTable`).
    pub pc_offset_index: u32,
}

/// One slot in the global constant pool.
#[derive(Debug, Clone, Copy)]
pub enum PoolEntry {
    /// A reference to another reconstructed object.
    Tagged(ReferenceId),
    /// An inline immediate value (e.g. a raw Smi or double bit pattern).
    Immediate(i64),
    /// A native-call entry slot; value is the native function's internal id.
    Native(i64),
    /// A slot with no payload.
    Empty,
}

/// Static class layout: size and name; field offsets are recorded
/// separately in [`FieldInfo`] and resolved post-fill.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub ref_id: ReferenceId,
    pub class_id: i64,
    /// Instance size in *compressed words* (§3 invariants).
    pub instance_size_words: u32,
    pub name_ref: ReferenceId,
}

/// One field of a class. `host_offset_ref` is a reference to a small-integer
/// object holding the word offset; it is dereferenced during class-layout
/// resolution (§4.4), not at fill time.
#[derive(Debug, Clone, Copy)]
pub struct FieldInfo {
    pub owner_ref: ReferenceId,
    pub name_ref: ReferenceId,
    pub host_offset_ref: ReferenceId,
}

/// A signature record: parameter counts only (no type information is
/// reconstructed — that is out of this crate's scope).
#[derive(Debug, Clone, Copy)]
pub struct FuncTypeInfo {
    pub ref_id: ReferenceId,
    pub num_fixed: u32,
    pub num_optional: u32,
}

/// A resolved `(offset, size)` byte-offset slot for a class field, produced
/// by joining [`ClassInfo`], [`FieldInfo`], and the small-integer table.
#[derive(Debug, Clone)]
pub struct ResolvedField {
    pub name: String,
    pub byte_offset: u32,
}

/// A class's fully resolved static layout: its reconstructed name plus every
/// field slot from the object header to `instance_size_words * word_size`,
/// produced by [`crate::fill::resolve_class_layouts`] (§4.4
/// "Class-layout resolution").
#[derive(Debug, Clone)]
pub struct ResolvedClassLayout {
    pub class_ref: ReferenceId,
    pub name: Option<String>,
    pub instance_size_bytes: u32,
    pub fields: Vec<ResolvedField>,
}
