//! The nominal type system of the semantic core.
//!
//! Every type handled by inference is a [`TypeId`]: an opaque integer
//! partitioned into [`TypeFamily`] bands (spec §3). Two sentinel type IDs,
//! [`TypeId::INFER`] and [`TypeId::ERROR`], stand in for "not yet known" and
//! "resolution failed" respectively — they never alias a real registered
//! type.
//!
//! # Type ID layout
//!
//! Rather than interleaving families through a single counter, each family
//! owns a disjoint range of the `u32` space. This keeps `family_of` a cheap
//! range check instead of a registry lookup, which matters because it is
//! called from the hottest part of inference (overload matching).

use std::fmt;

const PRIMITIVE_BASE: u32 = 0;
const PRIMITIVE_MAX: u32 = 999;
const STRUCTURE_BASE: u32 = 1_000;
const STRUCTURE_MAX: u32 = 99_999;
const TEMPLATE_INSTANCE_BASE: u32 = 100_000;
const TEMPLATE_INSTANCE_MAX: u32 = 199_999;
const SUM_BASE: u32 = 200_000;
const SUM_MAX: u32 = 299_999;
const WEAK_ALIAS_BASE: u32 = 300_000;
const WEAK_ALIAS_MAX: u32 = 399_999;
const STRONG_ALIAS_BASE: u32 = 400_000;
const STRONG_ALIAS_MAX: u32 = 499_999;
const FUNCTION_SIGNATURE_BASE: u32 = 500_000;
const FUNCTION_SIGNATURE_MAX: u32 = 599_999;
const REFERENCE_FLAG: u32 = 1 << 31;

const INFER_SENTINEL: u32 = u32::MAX - 1;
const ERROR_SENTINEL: u32 = u32::MAX;

/// The family partition a [`TypeId`] belongs to (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Primitive,
    Structure,
    TemplateInstance,
    Sum,
    WeakAlias,
    StrongAlias,
    FunctionSignature,
    Infer,
    Error,
}

impl fmt::Display for TypeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeFamily::Primitive => "primitive",
            TypeFamily::Structure => "structure",
            TypeFamily::TemplateInstance => "template-instance",
            TypeFamily::Sum => "sum",
            TypeFamily::WeakAlias => "weak-alias",
            TypeFamily::StrongAlias => "strong-alias",
            TypeFamily::FunctionSignature => "function-signature",
            TypeFamily::Infer => "infer",
            TypeFamily::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// The built-in primitive types (spec §3). `Nothing` denotes "no parameter"
/// in a pattern-matched slot; `Void` denotes "no return value".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PrimitiveType {
    Integer32 = 0,
    Integer16 = 1,
    Real32 = 2,
    Boolean = 3,
    StringT = 4,
    Buffer = 5,
    Identifier = 6,
    FunctionRef = 7,
    Nothing = 8,
    Void = 9,
}

impl PrimitiveType {
    pub fn type_id(self) -> TypeId {
        TypeId(PRIMITIVE_BASE + self as u32)
    }

    const ALL: [PrimitiveType; 10] = [
        PrimitiveType::Integer32,
        PrimitiveType::Integer16,
        PrimitiveType::Real32,
        PrimitiveType::Boolean,
        PrimitiveType::StringT,
        PrimitiveType::Buffer,
        PrimitiveType::Identifier,
        PrimitiveType::FunctionRef,
        PrimitiveType::Nothing,
        PrimitiveType::Void,
    ];

    fn from_offset(offset: u32) -> Option<PrimitiveType> {
        Self::ALL.into_iter().find(|p| *p as u32 == offset)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveType::Integer32 => "integer",
            PrimitiveType::Integer16 => "short",
            PrimitiveType::Real32 => "real",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::StringT => "string",
            PrimitiveType::Buffer => "buffer",
            PrimitiveType::Identifier => "identifier",
            PrimitiveType::FunctionRef => "function-ref",
            PrimitiveType::Nothing => "nothing",
            PrimitiveType::Void => "void",
        };
        write!(f, "{s}")
    }
}

/// An opaque, stable type identifier (spec §3). Equality is integer
/// equality; the high bit marks a reference-to type, stripped by
/// [`TypeId::strip_reference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub const INFER: TypeId = TypeId(INFER_SENTINEL);
    pub const ERROR: TypeId = TypeId(ERROR_SENTINEL);

    pub fn is_infer(self) -> bool {
        self.strip_reference().0 == INFER_SENTINEL
    }

    pub fn is_error(self) -> bool {
        self.strip_reference().0 == ERROR_SENTINEL
    }

    pub fn is_reference(self) -> bool {
        self.0 & REFERENCE_FLAG != 0
    }

    /// Produce the reference-qualified version of this type.
    pub fn make_reference(self) -> TypeId {
        TypeId(self.0 | REFERENCE_FLAG)
    }

    /// Strip any reference qualification, returning the underlying type.
    pub fn strip_reference(self) -> TypeId {
        TypeId(self.0 & !REFERENCE_FLAG)
    }

    /// Non-reference equality: `a` and `&a` compare equal under this rule,
    /// matching `Metadata::MakeNonReferenceType` comparisons throughout the
    /// original inference algorithm.
    pub fn same_underlying(self, other: TypeId) -> bool {
        self.strip_reference() == other.strip_reference()
    }

    pub fn family(self) -> TypeFamily {
        let bare = self.strip_reference().0;
        match bare {
            INFER_SENTINEL => TypeFamily::Infer,
            ERROR_SENTINEL => TypeFamily::Error,
            PRIMITIVE_BASE..=PRIMITIVE_MAX => TypeFamily::Primitive,
            STRUCTURE_BASE..=STRUCTURE_MAX => TypeFamily::Structure,
            TEMPLATE_INSTANCE_BASE..=TEMPLATE_INSTANCE_MAX => TypeFamily::TemplateInstance,
            SUM_BASE..=SUM_MAX => TypeFamily::Sum,
            WEAK_ALIAS_BASE..=WEAK_ALIAS_MAX => TypeFamily::WeakAlias,
            STRONG_ALIAS_BASE..=STRONG_ALIAS_MAX => TypeFamily::StrongAlias,
            FUNCTION_SIGNATURE_BASE..=FUNCTION_SIGNATURE_MAX => TypeFamily::FunctionSignature,
            _ => TypeFamily::Error,
        }
    }

    pub fn as_primitive(self) -> Option<PrimitiveType> {
        let bare = self.strip_reference().0;
        if bare <= PRIMITIVE_MAX {
            PrimitiveType::from_offset(bare)
        } else {
            None
        }
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }
}

impl Default for TypeId {
    fn default() -> Self {
        TypeId::INFER
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            return write!(f, "<error>");
        }
        if self.is_infer() {
            return write!(f, "<infer>");
        }
        if let Some(p) = self.as_primitive() {
            write!(f, "{p}")?;
        } else {
            write!(f, "#{}:{}", self.family(), self.strip_reference().0)?;
        }
        if self.is_reference() {
            write!(f, "&")?;
        }
        Ok(())
    }
}

/// Monotonically assigns fresh type IDs within one family band. Each
/// [`crate::registry::Namespace`] owns one allocator per non-primitive
/// family so IDs never collide across families and are stable for the
/// lifetime of the program (spec §4.1 guarantees).
#[derive(Debug, Clone)]
pub struct TypeIdAllocator {
    base: u32,
    max: u32,
    next_offset: u32,
}

impl TypeIdAllocator {
    fn new(base: u32, max: u32) -> Self {
        TypeIdAllocator {
            base,
            max,
            next_offset: 0,
        }
    }

    pub fn structures() -> Self {
        Self::new(STRUCTURE_BASE, STRUCTURE_MAX)
    }

    pub fn template_instances() -> Self {
        Self::new(TEMPLATE_INSTANCE_BASE, TEMPLATE_INSTANCE_MAX)
    }

    pub fn sums() -> Self {
        Self::new(SUM_BASE, SUM_MAX)
    }

    pub fn weak_aliases() -> Self {
        Self::new(WEAK_ALIAS_BASE, WEAK_ALIAS_MAX)
    }

    pub fn strong_aliases() -> Self {
        Self::new(STRONG_ALIAS_BASE, STRONG_ALIAS_MAX)
    }

    pub fn function_signatures() -> Self {
        Self::new(FUNCTION_SIGNATURE_BASE, FUNCTION_SIGNATURE_MAX)
    }

    /// Allocate the next type ID in this family's band.
    ///
    /// # Panics
    /// Panics if the family's address space (100,000 entries) is exhausted;
    /// a program generating that many distinct types of one family has
    /// violated an assumption the registry cannot recover from.
    pub fn alloc(&mut self) -> TypeId {
        let offset = self.next_offset;
        assert!(
            self.base + offset <= self.max,
            "type id space exhausted for family starting at {}",
            self.base
        );
        self.next_offset += 1;
        TypeId(self.base + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_round_trips_through_display() {
        let id = PrimitiveType::Integer32.type_id();
        assert_eq!(id.family(), TypeFamily::Primitive);
        assert_eq!(id.as_primitive(), Some(PrimitiveType::Integer32));
        assert_eq!(id.to_string(), "integer");
    }

    #[test]
    fn reference_flag_round_trips() {
        let id = PrimitiveType::StringT.type_id();
        let reference = id.make_reference();
        assert!(reference.is_reference());
        assert!(!id.is_reference());
        assert_eq!(reference.strip_reference(), id);
        assert!(id.same_underlying(reference));
        assert_eq!(reference.family(), TypeFamily::Primitive);
    }

    #[test]
    fn infer_and_error_are_distinct_sentinels() {
        assert!(TypeId::INFER.is_infer());
        assert!(!TypeId::INFER.is_error());
        assert!(TypeId::ERROR.is_error());
        assert!(!TypeId::ERROR.is_infer());
        assert_ne!(TypeId::INFER, TypeId::ERROR);
    }

    #[test]
    fn allocator_produces_stable_increasing_ids_within_family() {
        let mut allocator = TypeIdAllocator::structures();
        let a = allocator.alloc();
        let b = allocator.alloc();
        assert_ne!(a, b);
        assert_eq!(a.family(), TypeFamily::Structure);
        assert_eq!(b.family(), TypeFamily::Structure);
    }

    #[test]
    fn families_are_disjoint_across_allocators() {
        let s = TypeIdAllocator::structures().alloc();
        let sum = TypeIdAllocator::sums().alloc();
        let weak = TypeIdAllocator::weak_aliases().alloc();
        let strong = TypeIdAllocator::strong_aliases().alloc();
        let func = TypeIdAllocator::function_signatures().alloc();
        let families = [
            s.family(),
            sum.family(),
            weak.family(),
            strong.family(),
            func.family(),
        ];
        for (i, a) in families.iter().enumerate() {
            for (j, b) in families.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
