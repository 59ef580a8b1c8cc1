//! The typed error values raised by every stage of the pipeline.
//!
//! There is no recovery: the first violation is raised as a [`TypeError`]
//! and aborts the run. Errors produced inside the constraint generator
//! cross the solver and elaborator boundaries unchanged.
use lyre_ast::names::{LabelName, TypeConName, TypeVarName, ValueName};
use lyre_ast::types::{Kind, Type};
use lyre_util::diagnostics::Diagnostic;
use lyre_util::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct TypeError {
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    UnboundIdentifier(ValueName),
    UnboundTypeVariable(TypeVarName),
    UnboundTypeConstructor(TypeConName),
    UnboundClass(TypeConName),
    UnboundLabel(LabelName),
    IllKindedType(Type),
    IncompatibleKinds(Kind, Kind),
    IncompatibleTypes(Type, Type),
    ApplicationToNonFunctional(Type),
    RecordExpected(Type),
    LabelDoesNotBelong(LabelName, TypeConName),
    MultipleLabels(LabelName),
    InvalidRecordInstantiation(TypeConName),
    InvalidDataConstructorApplication(LabelName),
    /// Data constructors must be fully applied; expected vs got
    PartialDataConstructorApplication(LabelName, usize, usize),
    NotEnoughPatternArgts(LabelName, usize, usize),
    /// A match expression with no branches has no type
    MatchWithoutBranches,
    InvalidDisjunctionPattern(ValueName),
    NonLinearPattern(ValueName),
    PatternsMustBindSameVariables(ValueName),
    OnlyLetsCanIntroduceTypeAbstraction,
    /// Mismatch between declared quantifiers and type abstractions or
    /// applications; expected vs got
    InvalidNumberOfTypeAbstraction(usize, usize),
    SameNameInTypeAbstractionAndScheme(TypeVarName),
    ValueRestriction(ValueName),
    /// The class parameter does not occur in a member's type
    InvalidOverloading(LabelName),
    OverloadedSymbolCannotBeBound(ValueName),
    TheseTwoClassesMustNotBeInTheSameContext(TypeConName, TypeConName),
    UnresolvedOverloading(TypeConName, Type),
    OverlappingInstances(TypeConName, TypeConName),
    InvalidDataConstructorDefinition(LabelName),
    /// Solver: two types cannot be unified
    UnsatisfiableEquation(Type, Type),
    /// Solver: a scheme cannot be generalized
    CannotGeneralize(Type),
}

impl TypeError {
    pub fn new(span: Span, kind: ErrorKind) -> TypeError {
        TypeError { span, kind }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        use ErrorKind::*;
        let msg = match &self.kind {
            UnboundIdentifier(x) => format!("unbound identifier: {}", x),
            UnboundTypeVariable(v) => format!("unbound type variable: {}", v),
            UnboundTypeConstructor(t) => format!("unbound type constructor: {}", t),
            UnboundClass(k) => format!("unbound class: {}", k),
            UnboundLabel(l) => format!("unbound label: {}", l),
            IllKindedType(ty) => format!("ill-kinded type: {:?}", ty),
            IncompatibleKinds(k1, k2) => {
                format!("incompatible kinds: expected {}, got {}", k1, k2)
            }
            IncompatibleTypes(t1, t2) => {
                format!("incompatible types: expected {:?}, got {:?}", t1, t2)
            }
            ApplicationToNonFunctional(ty) => {
                format!("application of a non-functional value of type {:?}", ty)
            }
            RecordExpected(ty) => format!("a record was expected, got a value of type {:?}", ty),
            LabelDoesNotBelong(l, t) => format!("label {} does not belong to type {}", l, t),
            MultipleLabels(l) => format!("label {} occurs more than once", l),
            InvalidRecordInstantiation(t) => format!("invalid instantiation of record type {}", t),
            InvalidDataConstructorApplication(k) => {
                format!("invalid application of data constructor {}", k)
            }
            PartialDataConstructorApplication(k, expect, got) => format!(
                "partial application of data constructor {}: expected {} arguments, got {}",
                k, expect, got
            ),
            NotEnoughPatternArgts(k, expect, got) => format!(
                "constructor pattern {} expects {} arguments, got {}",
                k, expect, got
            ),
            MatchWithoutBranches => String::from("this match expression has no branches"),
            InvalidDisjunctionPattern(x) => format!(
                "alternatives of a disjunction pattern disagree on the binding of {}",
                x
            ),
            NonLinearPattern(x) => format!("{} is bound several times in this pattern", x),
            PatternsMustBindSameVariables(x) => {
                format!("patterns must bind the same variables; {} is not", x)
            }
            OnlyLetsCanIntroduceTypeAbstraction => {
                String::from("only let bindings can introduce type abstractions")
            }
            InvalidNumberOfTypeAbstraction(expect, got) => format!(
                "invalid number of type abstractions: expected {}, got {}",
                expect, got
            ),
            SameNameInTypeAbstractionAndScheme(v) => format!(
                "the type variable {} occurs both in a type abstraction and its scheme",
                v
            ),
            ValueRestriction(x) => format!(
                "the definition of {} is not a value form and cannot be generalized",
                x
            ),
            InvalidOverloading(l) => format!(
                "invalid overloading: the class parameter does not occur in the type of {}",
                l
            ),
            OverloadedSymbolCannotBeBound(x) => {
                format!("the overloaded symbol {} cannot be rebound", x)
            }
            TheseTwoClassesMustNotBeInTheSameContext(k1, k2) => format!(
                "the classes {} and {} must not appear in the same context",
                k1, k2
            ),
            UnresolvedOverloading(k, ty) => {
                format!("unresolved overloading: no way to satisfy {} {:?}", k, ty)
            }
            OverlappingInstances(k, g) => {
                format!("overlapping instances of class {} at head {}", k, g)
            }
            InvalidDataConstructorDefinition(k) => {
                format!("invalid definition of data constructor {}", k)
            }
            UnsatisfiableEquation(t1, t2) => {
                format!("cannot unify {:?} with {:?}", t1, t2)
            }
            CannotGeneralize(ty) => format!("cannot generalize {:?}", ty),
        };
        Diagnostic::error(self.span, msg)
    }
}

pub type Result<T> = std::result::Result<T, TypeError>;
