//! The intermediate language of typing constraints and the contract of the
//! external constraint solver.
//!
//! The generator produces a single root [`Constraint`] per program whose
//! satisfiability is equivalent to the program being well-typed. Solving it
//! is delegated behind the [`Solver`] trait: a solver consumes the root
//! constraint and yields either a [`Solution`] or a typed error
//! (`UnsatisfiableEquation`, `CannotGeneralize`, `UnresolvedOverloading`).
//! Nothing in this crate depends on how the solver orders its work.
use crate::error::TypeError;
use lyre_ast::explicit;
use lyre_ast::names::{LabelName, TypeVarName, ValueName};
use lyre_ast::types::{ClassPredicate, TyScheme, Type};
use lyre_util::span::Span;
use rustc_hash::FxHashMap;

/// A named scheme referenced by an instance-of constraint. Data
/// constructors live in their own namespace, so they get their own arm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemeName {
    Value(ValueName),
    Constructor(LabelName),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    True,
    /// `t =?= t'`
    Eq(Span, Type, Type),
    /// `name <? t`: the named scheme can be instantiated to `t`
    Inst(Span, SchemeName, Type),
    Conj(Vec<Constraint>),
    /// Existential quantification of flexible variables
    Exists(Vec<TypeVarName>, Box<Constraint>),
    /// Bind schemes over an outer constraint
    Let(Vec<SchemeBinding>, Box<Constraint>),
}

/// One scheme bound by a `Let` constraint. The inner constraint is solved
/// to produce the scheme; the header maps names to types the outer
/// constraint can reference.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemeBinding {
    pub span: Span,
    /// Quantifiers the solver may not unify, i.e. user-supplied parameters
    pub rigid: Vec<TypeVarName>,
    /// Quantifiers the solver may unify and generalize
    pub flexible: Vec<TypeVarName>,
    pub predicates: Vec<ClassPredicate>,
    pub constraint: Box<Constraint>,
    pub header: Vec<(ValueName, Type)>,
}

impl SchemeBinding {
    /// A degenerate binding that introduces monomorphic assumptions and
    /// nothing else
    pub fn monoscheme(span: Span, header: Vec<(ValueName, Type)>) -> SchemeBinding {
        SchemeBinding {
            span,
            rigid: Vec::new(),
            flexible: Vec::new(),
            predicates: Vec::new(),
            constraint: Box::new(Constraint::True),
            header,
        }
    }
}

impl Constraint {
    /// Conjunction, flattening trivial cases
    pub fn conj(cs: Vec<Constraint>) -> Constraint {
        let mut cs = cs
            .into_iter()
            .filter(|c| !matches!(c, Constraint::True))
            .collect::<Vec<_>>();
        match cs.len() {
            0 => Constraint::True,
            1 => cs.pop().unwrap(),
            _ => Constraint::Conj(cs),
        }
    }

    pub fn and(self, other: Constraint) -> Constraint {
        Constraint::conj(vec![self, other])
    }

    pub fn exists(vars: Vec<TypeVarName>, c: Constraint) -> Constraint {
        if vars.is_empty() {
            c
        } else {
            Constraint::Exists(vars, Box::new(c))
        }
    }

    pub fn let_in(bindings: Vec<SchemeBinding>, c: Constraint) -> Constraint {
        if bindings.is_empty() {
            c
        } else {
            Constraint::Let(bindings, Box::new(c))
        }
    }
}

/// What a successful solve delivers.
///
/// The substitution is total over the root constraint's flexible variables
/// and fully resolved: no type on its right-hand side mentions a variable
/// the substitution also binds. Schemes derived for implicitly-typed
/// definitions are keyed by the definition site, instantiations of
/// let-bound names by the use site.
#[derive(Clone, Debug, Default)]
pub struct Solution {
    pub substitution: FxHashMap<TypeVarName, Type>,
    pub schemes: FxHashMap<(Span, ValueName), TyScheme>,
    pub instantiations: FxHashMap<(Span, ValueName), Vec<Type>>,
}

pub trait Solver {
    fn solve(&mut self, root: &Constraint) -> std::result::Result<Solution, TypeError>;
}

impl Solution {
    fn ty(&self, ty: &Type) -> Type {
        ty.substitute(&self.substitution)
    }

    /// Materialize the explicit program from the generator's template by
    /// substituting away every leftover flexible variable, filling in the
    /// recorded type applications, and attaching derived schemes to
    /// implicitly-typed definitions. The substitution is consumed exactly
    /// once, here.
    pub fn derive(&self, template: explicit::Program) -> explicit::Program {
        explicit::Program {
            blocks: template
                .blocks
                .into_iter()
                .map(|b| self.block(b))
                .collect(),
        }
    }

    fn block(&self, block: explicit::Block) -> explicit::Block {
        match block {
            explicit::Block::Types(defs) => explicit::Block::Types(defs),
            explicit::Block::Class(def) => explicit::Block::Class(def),
            explicit::Block::Definitions(group) => {
                explicit::Block::Definitions(self.group(group))
            }
            explicit::Block::Instances(instances) => explicit::Block::Instances(
                instances
                    .into_iter()
                    .map(|inst| explicit::InstanceDefinition {
                        head: inst.head,
                        members: inst
                            .members
                            .into_iter()
                            .map(|m| explicit::MemberDef {
                                span: m.span,
                                name: m.name,
                                body: self.expr(m.body),
                            })
                            .collect(),
                    })
                    .collect(),
            ),
        }
    }

    fn group(&self, group: explicit::BindingGroup) -> explicit::BindingGroup {
        explicit::BindingGroup {
            span: group.span,
            defs: group.defs.into_iter().map(|d| self.def(d)).collect(),
        }
    }

    fn def(&self, def: explicit::ValueDef) -> explicit::ValueDef {
        let (vars, predicates) = if def.vars.is_empty() {
            match self.schemes.get(&(def.span, def.name)) {
                Some(scheme) => (scheme.vars.clone(), scheme.predicates.clone()),
                None => (def.vars, def.predicates),
            }
        } else {
            (def.vars, def.predicates)
        };
        explicit::ValueDef {
            span: def.span,
            vars,
            predicates,
            name: def.name,
            ty: self.ty(&def.ty),
            body: self.expr(def.body),
        }
    }

    fn expr(&self, e: explicit::Expr) -> explicit::Expr {
        use explicit::ExprKind::*;
        let span = e.span;
        let kind = match e.kind {
            Var(x, apps) => {
                let apps = if apps.is_empty() {
                    self.instantiations
                        .get(&(span, x))
                        .cloned()
                        .unwrap_or_default()
                } else {
                    apps
                };
                Var(x, apps.iter().map(|t| self.ty(t)).collect())
            }
            Prim(p) => Prim(p),
            Lambda(x, ann, body) => Lambda(x, self.ty(&ann), Box::new(self.expr(*body))),
            App(f, a) => App(Box::new(self.expr(*f)), Box::new(self.expr(*a))),
            Ann(inner, ty) => Ann(Box::new(self.expr(*inner)), self.ty(&ty)),
            Let(group, body) => Let(self.group(group), Box::new(self.expr(*body))),
            Con(k, apps, args) => Con(
                k,
                apps.iter().map(|t| self.ty(t)).collect(),
                args.into_iter().map(|a| self.expr(a)).collect(),
            ),
            Record(name, apps, fields) => Record(
                name,
                apps.iter().map(|t| self.ty(t)).collect(),
                fields
                    .into_iter()
                    .map(|f| explicit::FieldBinding {
                        span: f.span,
                        label: f.label,
                        expr: self.expr(f.expr),
                    })
                    .collect(),
            ),
            Access(inner, l) => Access(Box::new(self.expr(*inner)), l),
            Match(scrutinee, branches) => Match(
                Box::new(self.expr(*scrutinee)),
                branches
                    .into_iter()
                    .map(|b| explicit::Branch {
                        span: b.span,
                        pat: self.pat(b.pat),
                        body: self.expr(b.body),
                    })
                    .collect(),
            ),
        };
        explicit::Expr { span, kind }
    }

    fn pat(&self, p: explicit::Pat) -> explicit::Pat {
        use explicit::PatKind::*;
        let span = p.span;
        let kind = match p.kind {
            Wild => Wild,
            Lit(l) => Lit(l),
            Var(x) => Var(x),
            Or(ps) => Or(ps.into_iter().map(|p| self.pat(p)).collect()),
            And(ps) => And(ps.into_iter().map(|p| self.pat(p)).collect()),
            Alias(x, inner) => Alias(x, Box::new(self.pat(*inner))),
            Ann(inner, ty) => Ann(Box::new(self.pat(*inner)), self.ty(&ty)),
            Con(k, apps, ps) => Con(
                k,
                apps.iter().map(|t| self.ty(t)).collect(),
                ps.into_iter().map(|p| self.pat(p)).collect(),
            ),
        };
        explicit::Pat { span, kind }
    }
}

/// The generator's output: the root constraint and the template the
/// solution's deriver turns into the explicit program
#[derive(Clone, Debug)]
pub struct Generated {
    pub constraint: Constraint,
    pub template: explicit::Program,
}

impl Generated {
    pub fn derive(&self, solution: &Solution) -> explicit::Program {
        solution.derive(self.template.clone())
    }
}
