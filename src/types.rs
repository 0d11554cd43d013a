//! Type model: tagged descriptors and a process-wide interner.
//!
//! Grounded on spec.md §3 ("Type") and the design notes' guidance to replace
//! the original's global singly-linked type table with a structural
//! interner returning stable, `Copy` handles (pointer/ID equality substitutes
//! for structural equality). The interner itself follows the shape of this
//! crate's other process-wide singletons (see [`crate::cache`]):
//! `OnceLock<Mutex<...>>`.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// A structural type descriptor, before interning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeShape {
    Int,
    Boolean,
    Char,
    Reference,
    Array(TypeId),
    Void,
}

/// A stable, `Copy` handle to an interned [`TypeShape`]. Two handles compare
/// equal iff the underlying shapes are structurally equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

struct Interner {
    shapes: Vec<TypeShape>,
    index: HashMap<TypeShape, TypeId>,
}

impl Interner {
    fn new() -> Self {
        let mut interner = Interner {
            shapes: Vec::new(),
            index: HashMap::new(),
        };
        // Primitive singletons get fixed, well-known ids.
        for shape in [
            TypeShape::Int,
            TypeShape::Boolean,
            TypeShape::Char,
            TypeShape::Reference,
            TypeShape::Void,
        ] {
            interner.intern(shape);
        }
        interner
    }

    fn intern(&mut self, shape: TypeShape) -> TypeId {
        if let Some(id) = self.index.get(&shape) {
            return *id;
        }
        let id = TypeId(self.shapes.len() as u32);
        self.shapes.push(shape.clone());
        self.index.insert(shape, id);
        id
    }

    fn shape(&self, id: TypeId) -> TypeShape {
        self.shapes[id.0 as usize].clone()
    }
}

fn interner() -> &'static Mutex<Interner> {
    static INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();
    INTERNER.get_or_init(|| Mutex::new(Interner::new()))
}

impl TypeId {
    pub const INT: TypeId = TypeId(0);
    pub const BOOLEAN: TypeId = TypeId(1);
    pub const CHAR: TypeId = TypeId(2);
    pub const REFERENCE: TypeId = TypeId(3);
    pub const VOID: TypeId = TypeId(4);

    /// Interns an array-of-`self` type, returning its handle. Because the
    /// element type is already a handle, the array-of-array nest is finite
    /// and acyclic by construction: there is no way to build a `TypeId` that
    /// refers to itself.
    pub fn array_of(self) -> TypeId {
        interner().lock().unwrap().intern(TypeShape::Array(self))
    }

    pub fn shape(self) -> TypeShape {
        interner().lock().unwrap().shape(self)
    }

    pub fn is_array(self) -> bool {
        matches!(self.shape(), TypeShape::Array(_))
    }

    /// The element type, if `self` is an array type.
    pub fn element_type(self) -> Option<TypeId> {
        match self.shape() {
            TypeShape::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Parses a single JVM-ish signature character/sequence as used in
    /// method identifiers (spec.md §6): `I`, `Z`, `C`, `V`,
    /// `L<name>;` (treated as `Reference`), `[<T>` (array of `T`).
    /// Returns the parsed type and the number of bytes consumed.
    pub fn parse_one(sig: &str) -> Option<(TypeId, usize)> {
        let bytes = sig.as_bytes();
        match *bytes.first()? {
            b'I' => Some((TypeId::INT, 1)),
            b'Z' => Some((TypeId::BOOLEAN, 1)),
            b'C' => Some((TypeId::CHAR, 1)),
            b'V' => Some((TypeId::VOID, 1)),
            b'L' => {
                let end = sig.find(';')?;
                Some((TypeId::REFERENCE, end + 1))
            }
            b'[' => {
                let (elem, consumed) = TypeId::parse_one(&sig[1..])?;
                Some((elem.array_of(), consumed + 1))
            }
            _ => None,
        }
    }

    /// Parses a full `(argsig)returnsig` or bare argument-list signature
    /// into its component types, left to right.
    pub fn parse_many(mut sig: &str) -> Option<Vec<TypeId>> {
        let mut out = Vec::new();
        while !sig.is_empty() {
            let (ty, consumed) = TypeId::parse_one(sig)?;
            out.push(ty);
            sig = &sig[consumed..];
        }
        Some(out)
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.shape() {
            TypeShape::Int => write!(f, "int"),
            TypeShape::Boolean => write!(f, "boolean"),
            TypeShape::Char => write!(f, "char"),
            TypeShape::Reference => write!(f, "reference"),
            TypeShape::Void => write!(f, "void"),
            TypeShape::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_singletons() {
        assert_eq!(TypeId::INT, TypeId::parse_one("I").unwrap().0);
        assert_eq!(TypeId::parse_one("I").unwrap().0, TypeId::parse_one("I").unwrap().0);
    }

    #[test]
    fn array_identity_is_structural() {
        let a1 = TypeId::INT.array_of();
        let a2 = TypeId::INT.array_of();
        assert_eq!(a1, a2);
        let nested1 = a1.array_of();
        let nested2 = TypeId::INT.array_of().array_of();
        assert_eq!(nested1, nested2);
    }

    #[test]
    fn parses_signatures() {
        let tys = TypeId::parse_many("I Z C".replace(' ', "").as_str()).unwrap();
        assert_eq!(tys, vec![TypeId::INT, TypeId::BOOLEAN, TypeId::CHAR]);

        let (ty, consumed) = TypeId::parse_one("[ILjpamb/Foo;").unwrap();
        assert!(ty.is_array());
        assert_eq!(ty.element_type(), Some(TypeId::INT));
        assert_eq!(consumed, 2);
    }
}
