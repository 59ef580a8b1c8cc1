//! The first-order type term language: kinds, types, schemes, and class
//! predicates.
//!
//! Types carry their source span but compare and hash without it. There are
//! no binders inside types, so substitution is capture-unaware by
//! construction.
use crate::names::{TypeConName, TypeVarName};
use lyre_util::interner::S_ARROW;
use lyre_util::span::Span;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::BuildHasher;

/// The name of the builtin arrow constructor, `->`
pub const ARROW: TypeConName = TypeConName(S_ARROW);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Star,
    Arrow(Box<Kind>, Box<Kind>),
}

impl Kind {
    /// The kind of a type constructor taking `n` arguments of kind `*`
    pub fn of_arity(n: usize) -> Kind {
        match n {
            0 => Kind::Star,
            _ => Kind::Arrow(Box::new(Kind::Star), Box::new(Kind::of_arity(n - 1))),
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Kind::Star => 0,
            Kind::Arrow(_, rest) => 1 + rest.arity(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Kind::Star => write!(f, "*"),
            Kind::Arrow(a, b) => match **a {
                Kind::Star => write!(f, "* => {}", b),
                _ => write!(f, "({}) => {}", a, b),
            },
        }
    }
}

#[derive(Clone)]
pub struct Type {
    pub span: Span,
    pub kind: TypeKind,
}

#[derive(Clone)]
pub enum TypeKind {
    Var(TypeVarName),
    App(TypeConName, Vec<Type>),
}

/// Equality ignores spans; types have no binders, so this is also
/// α-equivalence
impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Var(a), TypeKind::Var(b)) => a == b,
            (TypeKind::App(c1, args1), TypeKind::App(c2, args2)) => c1 == c2 && args1 == args2,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl Type {
    pub fn var(span: Span, name: TypeVarName) -> Type {
        Type {
            span,
            kind: TypeKind::Var(name),
        }
    }

    pub fn app(span: Span, con: TypeConName, args: Vec<Type>) -> Type {
        Type {
            span,
            kind: TypeKind::App(con, args),
        }
    }

    pub fn con(span: Span, con: TypeConName) -> Type {
        Type::app(span, con, Vec::new())
    }

    pub fn arrow(span: Span, dom: Type, cod: Type) -> Type {
        Type::app(span, ARROW, vec![dom, cod])
    }

    /// Fold a list of input types into nested arrows ending in `cod`
    pub fn ntyarrow(span: Span, doms: Vec<Type>, cod: Type) -> Type {
        doms.into_iter()
            .rev()
            .fold(cod, |acc, dom| Type::arrow(span, dom, acc))
    }

    /// Split one arrow off, if this is an arrow type
    pub fn destruct_tyarrow(&self) -> Option<(&Type, &Type)> {
        match &self.kind {
            TypeKind::App(con, args) if *con == ARROW && args.len() == 2 => {
                Some((&args[0], &args[1]))
            }
            _ => None,
        }
    }

    /// Collect every leading arrow, the left inverse of [`Type::ntyarrow`]
    pub fn destruct_ntyarrow(&self) -> (Vec<&Type>, &Type) {
        let mut doms = Vec::new();
        let mut ty = self;
        while let Some((dom, cod)) = ty.destruct_tyarrow() {
            doms.push(dom);
            ty = cod;
        }
        (doms, ty)
    }

    /// Apply a variable-to-type substitution
    pub fn substitute<S: BuildHasher>(&self, subst: &HashMap<TypeVarName, Type, S>) -> Type {
        match &self.kind {
            TypeKind::Var(v) => match subst.get(v) {
                Some(ty) => ty.clone(),
                None => self.clone(),
            },
            TypeKind::App(con, args) => Type::app(
                self.span,
                *con,
                args.iter().map(|ty| ty.substitute(subst)).collect(),
            ),
        }
    }

    pub fn free_vars(&self) -> BTreeSet<TypeVarName> {
        let mut set = BTreeSet::new();
        self.ftv(&mut set);
        set
    }

    fn ftv(&self, set: &mut BTreeSet<TypeVarName>) {
        match &self.kind {
            TypeKind::Var(v) => {
                set.insert(*v);
            }
            TypeKind::App(_, args) => {
                for ty in args {
                    ty.ftv(set);
                }
            }
        }
    }

    /// Every type constructor occurring at a non-leaf position
    pub fn type_constructors(&self) -> BTreeSet<TypeConName> {
        let mut set = BTreeSet::new();
        self.tycons(&mut set);
        set
    }

    fn tycons(&self, set: &mut BTreeSet<TypeConName>) {
        if let TypeKind::App(con, args) = &self.kind {
            set.insert(*con);
            for ty in args {
                ty.tycons(set);
            }
        }
    }

    /// α-equivalence up to a renaming of quantified variables: a variable
    /// `a` on the left matches `ren[a]` on the right, and every other
    /// variable matches itself
    pub fn equivalent<S: BuildHasher>(
        &self,
        other: &Type,
        ren: &HashMap<TypeVarName, TypeVarName, S>,
    ) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Var(a), TypeKind::Var(b)) => match ren.get(a) {
                Some(r) => r == b,
                None => a == b,
            },
            (TypeKind::App(c1, args1), TypeKind::App(c2, args2)) => {
                c1 == c2
                    && args1.len() == args2.len()
                    && args1
                        .iter()
                        .zip(args2)
                        .all(|(a, b)| a.equivalent(b, ren))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some((dom, cod)) = self.destruct_tyarrow() {
            return match dom.destruct_tyarrow() {
                Some(_) => write!(f, "({:?}) -> {:?}", dom, cod),
                None => write!(f, "{:?} -> {:?}", dom, cod),
            };
        }
        match &self.kind {
            TypeKind::Var(v) => write!(f, "{:?}", v),
            TypeKind::App(con, args) if args.is_empty() => write!(f, "{:?}", con),
            TypeKind::App(con, args) => {
                write!(f, "{:?}(", con)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A class constraint `k a` over one of a scheme's quantifiers
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ClassPredicate {
    pub class: TypeConName,
    pub var: TypeVarName,
}

impl ClassPredicate {
    pub const fn new(class: TypeConName, var: TypeVarName) -> ClassPredicate {
        ClassPredicate { class, var }
    }
}

impl fmt::Debug for ClassPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} {:?}", self.class, self.var)
    }
}

/// A type scheme: quantifiers, class predicates over those quantifiers, and
/// a body
#[derive(Clone, Debug, PartialEq)]
pub struct TyScheme {
    pub vars: Vec<TypeVarName>,
    pub predicates: Vec<ClassPredicate>,
    pub ty: Type,
}

impl TyScheme {
    pub fn new(vars: Vec<TypeVarName>, predicates: Vec<ClassPredicate>, ty: Type) -> TyScheme {
        TyScheme {
            vars,
            predicates,
            ty,
        }
    }

    pub fn monomorphic(ty: Type) -> TyScheme {
        TyScheme {
            vars: Vec::new(),
            predicates: Vec::new(),
            ty,
        }
    }

    pub fn arity(&self) -> usize {
        self.vars.len()
    }

    /// Instantiate the body at `args`, which must match the quantifier list
    /// in length
    pub fn apply(&self, args: &[Type]) -> Type {
        debug_assert_eq!(self.vars.len(), args.len());
        let map = self
            .vars
            .iter()
            .copied()
            .zip(args.iter().cloned())
            .collect::<HashMap<_, _>>();
        self.ty.substitute(&map)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tv(s: &str) -> TypeVarName {
        TypeVarName::new(s)
    }

    fn var(s: &str) -> Type {
        Type::var(Span::zero(), tv(s))
    }

    fn int() -> Type {
        Type::con(Span::zero(), TypeConName::new("int"))
    }

    #[test]
    fn equality_ignores_spans() {
        let a = Type::var(Span::zero(), tv("a"));
        let b = Type::var(Span::dummy(), tv("a"));
        assert_eq!(a, b);
    }

    #[test]
    fn ntyarrow_destruct_inverse() {
        let ty = Type::ntyarrow(Span::zero(), vec![var("a"), var("b")], int());
        let (doms, cod) = ty.destruct_ntyarrow();
        assert_eq!(doms, vec![&var("a"), &var("b")]);
        assert_eq!(cod, &int());
    }

    #[test]
    fn substitute_replaces_leaves() {
        let ty = Type::arrow(Span::zero(), var("a"), var("b"));
        let mut map = HashMap::new();
        map.insert(tv("a"), int());
        let got = ty.substitute(&map);
        assert_eq!(got, Type::arrow(Span::zero(), int(), var("b")));
    }

    #[test]
    fn free_vars_and_constructors() {
        let ty = Type::arrow(Span::zero(), var("a"), int());
        assert!(ty.free_vars().contains(&tv("a")));
        assert!(ty.type_constructors().contains(&ARROW));
        assert!(ty.type_constructors().contains(&TypeConName::new("int")));
    }

    #[test]
    fn equivalence_renames_quantifiers() {
        let left = Type::arrow(Span::zero(), var("a"), var("a"));
        let right = Type::arrow(Span::zero(), var("b"), var("b"));
        let mut ren = HashMap::new();
        ren.insert(tv("a"), tv("b"));
        assert!(left.equivalent(&right, &ren));
        assert!(!left.equivalent(&right, &HashMap::new()));
    }

    #[test]
    fn kind_of_arity() {
        assert_eq!(Kind::of_arity(0), Kind::Star);
        assert_eq!(
            Kind::of_arity(2),
            Kind::Arrow(
                Box::new(Kind::Star),
                Box::new(Kind::Arrow(Box::new(Kind::Star), Box::new(Kind::Star)))
            )
        );
        assert_eq!(Kind::of_arity(3).arity(), 3);
    }
}
