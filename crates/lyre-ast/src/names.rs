//! The four disjoint source namespaces.
//!
//! Names compare structurally through their interned symbol. Type
//! constructors and classes share [`TypeConName`]; record labels and data
//! constructors share [`LabelName`], in separate sub-namespaces of the
//! environment.
use lyre_util::interner::{intern, resolve, Symbol};
use std::fmt;

macro_rules! name {
    ($(#[$doc:meta])* $id:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $id(pub Symbol);

        impl $id {
            pub fn new(s: &str) -> $id {
                $id(intern(s))
            }

            pub fn as_str(&self) -> String {
                resolve(self.0)
            }
        }

        impl fmt::Debug for $id {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{:?}", self.0)
            }
        }

        impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{:?}", self.0)
            }
        }
    };
}

name!(
    /// A term-level identifier
    ValueName
);
name!(
    /// A type variable
    TypeVarName
);
name!(
    /// A type constructor or class name
    TypeConName
);
name!(
    /// A record label or data constructor
    LabelName
);

impl TypeVarName {
    pub const fn fresh(n: u32) -> TypeVarName {
        TypeVarName(Symbol::gensym(n))
    }
}

impl ValueName {
    pub const fn fresh(n: u32) -> ValueName {
        ValueName(Symbol::gensym(n))
    }
}
