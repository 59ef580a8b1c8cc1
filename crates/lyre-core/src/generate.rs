//! Constraint generation.
//!
//! Walks an implicitly-typed program and emits one root constraint whose
//! satisfiability is equivalent to the program being well-typed, together
//! with the explicit-program template the solver's solution later
//! materializes. Surface type variables are renamed apart while interning
//! annotations, so the emitted constraint never confuses two binders with
//! the same spelling.
use crate::builtin;
use crate::check;
use crate::constraint::{Constraint, Generated, SchemeBinding, SchemeName};
use crate::env::Environment;
use crate::error::{ErrorKind, Result, TypeError};
use lyre_ast::defs::ClassDefinition;
use lyre_ast::names::{TypeVarName, ValueName};
use lyre_ast::types::{ClassPredicate, Type, TypeKind};
use lyre_ast::{explicit, implicit};
use lyre_util::span::Span;
use std::collections::HashMap;

pub fn generate(program: &implicit::Program) -> Result<Generated> {
    let mut gen = Generator {
        env: builtin::populate_env(Environment::default()),
        tyvars: Vec::new(),
        fresh: 0,
    };
    let (constraint, blocks) = gen.gen_blocks(&program.blocks)?;
    Ok(Generated {
        constraint,
        template: explicit::Program { blocks },
    })
}

struct Generator {
    env: Environment,
    // scope stack renaming surface type variables to interned ones
    tyvars: Vec<(TypeVarName, TypeVarName)>,
    fresh: u32,
}

/// A pattern against an expected type: the names it binds, the flexible
/// variables it introduces, and the constraint those must satisfy
struct Fragment {
    gamma: Vec<(ValueName, Span, Type)>,
    vars: Vec<TypeVarName>,
    constraint: Constraint,
}

impl Fragment {
    fn empty() -> Fragment {
        Fragment {
            gamma: Vec::new(),
            vars: Vec::new(),
            constraint: Constraint::True,
        }
    }

    fn header(&self) -> Vec<(ValueName, Type)> {
        self.gamma
            .iter()
            .map(|(name, _, ty)| (*name, ty.clone()))
            .collect()
    }
}

impl Generator {
    fn fresh_tyvar(&mut self) -> TypeVarName {
        let v = TypeVarName::fresh(self.fresh);
        self.fresh += 1;
        v
    }

    fn fresh_var(&mut self, span: Span) -> (TypeVarName, Type) {
        let v = self.fresh_tyvar();
        (v, Type::var(span, v))
    }

    fn with_tyvars<T, F: FnOnce(&mut Generator) -> Result<T>>(
        &mut self,
        bindings: &[(TypeVarName, TypeVarName)],
        f: F,
    ) -> Result<T> {
        let n = self.tyvars.len();
        self.tyvars.extend_from_slice(bindings);
        let r = f(self);
        self.tyvars.truncate(n);
        r
    }

    /// Rename a surface type into the constraint's variable space, checking
    /// that every leaf is in scope and every constructor fully applied
    fn intern_type(&self, ty: &Type) -> Result<Type> {
        match &ty.kind {
            TypeKind::Var(v) => {
                for (surface, interned) in self.tyvars.iter().rev() {
                    if surface == v {
                        return Ok(Type::var(ty.span, *interned));
                    }
                }
                Err(TypeError::new(ty.span, ErrorKind::UnboundTypeVariable(*v)))
            }
            TypeKind::App(con, args) => {
                let kind = self.env.lookup_type_kind(ty.span, *con)?;
                if kind.arity() != args.len() {
                    return Err(TypeError::new(ty.span, ErrorKind::IllKindedType(ty.clone())));
                }
                Ok(Type::app(
                    ty.span,
                    *con,
                    args.iter()
                        .map(|a| self.intern_type(a))
                        .collect::<Result<Vec<_>>>()?,
                ))
            }
        }
    }

    fn gen_blocks(
        &mut self,
        blocks: &[implicit::Block],
    ) -> Result<(Constraint, Vec<explicit::Block>)> {
        let (block, rest) = match blocks.split_first() {
            None => return Ok((Constraint::True, Vec::new())),
            Some(parts) => parts,
        };
        match block {
            implicit::Block::Types(defs) => {
                self.env = self.env.bind_type_definitions(defs)?;
                let (c, mut out) = self.gen_blocks(rest)?;
                out.insert(0, explicit::Block::Types(defs.clone()));
                Ok((c, out))
            }
            implicit::Block::Class(def) => self.gen_class(def, rest),
            implicit::Block::Instances(group) => self.gen_instances(group, rest),
            implicit::Block::Definitions(group) => {
                let (parts, template) = self.gen_binding_group(group)?;
                let (c_rest, mut out) = self.gen_blocks(rest)?;
                out.insert(0, explicit::Block::Definitions(template));
                Ok((parts.assemble(c_rest), out))
            }
        }
    }

    fn gen_class(
        &mut self,
        def: &ClassDefinition,
        rest: &[implicit::Block],
    ) -> Result<(Constraint, Vec<explicit::Block>)> {
        for s in &def.superclasses {
            self.env.lookup_class(def.span, *s)?;
        }
        let mut bindings = Vec::new();
        for m in &def.members {
            if !m.ty.free_vars().contains(&def.param) {
                return Err(TypeError::new(m.span, ErrorKind::InvalidOverloading(m.name)));
            }
            let rigid = self.fresh_tyvar();
            let ity = self.with_tyvars(&[(def.param, rigid)], |gen| gen.intern_type(&m.ty))?;
            bindings.push(SchemeBinding {
                span: m.span,
                rigid: vec![rigid],
                flexible: Vec::new(),
                predicates: vec![ClassPredicate::new(def.name, rigid)],
                constraint: Box::new(Constraint::True),
                header: vec![(ValueName(m.name.0), ity)],
            });
        }
        self.env = self.env.bind_class(
            def.name,
            crate::env::ClassInfo {
                span: def.span,
                param: def.param,
                superclasses: def.superclasses.clone(),
                members: def.members.clone(),
                is_constructor_class: def.is_constructor_class,
            },
        );
        let (c_rest, mut out) = self.gen_blocks(rest)?;
        out.insert(0, explicit::Block::Class(def.clone()));
        Ok((Constraint::let_in(bindings, c_rest), out))
    }

    fn gen_instances(
        &mut self,
        group: &[implicit::InstanceDefinition],
        rest: &[implicit::Block],
    ) -> Result<(Constraint, Vec<explicit::Block>)> {
        // the whole group becomes visible before any member is checked, so
        // recursive instances can mention each other
        for inst in group {
            let head = &inst.head;
            self.env.lookup_type(head.span, head.head)?;
            self.env = self.env.bind_instance(crate::env::InstanceInfo {
                span: head.span,
                class: head.class,
                head: head.head,
                params: head.params.clone(),
                context: head.context.clone(),
            })?;
        }

        let mut checks = Vec::new();
        let mut templates = Vec::new();
        for inst in group {
            let head = &inst.head;
            let class = self.env.lookup_class(head.span, head.class)?.clone();
            check::check_correct_context(&self.env, head.span, &head.params, &head.context)?;

            let rigids: Vec<TypeVarName> =
                head.params.iter().map(|_| self.fresh_tyvar()).collect();
            let scope: Vec<(TypeVarName, TypeVarName)> = head
                .params
                .iter()
                .copied()
                .zip(rigids.iter().copied())
                .collect();
            let head_ty = Type::app(
                head.span,
                head.head,
                rigids.iter().map(|r| Type::var(head.span, *r)).collect(),
            );
            let rename: HashMap<TypeVarName, TypeVarName> =
                scope.iter().copied().collect();
            let predicates = head
                .context
                .iter()
                .map(|p| ClassPredicate::new(p.class, rename[&p.var]))
                .collect::<Vec<_>>();

            for sig in &class.members {
                if !inst.members.iter().any(|m| m.name == sig.name) {
                    return Err(TypeError::new(
                        head.span,
                        ErrorKind::InvalidRecordInstantiation(head.class),
                    ));
                }
            }

            let mut member_cs = Vec::new();
            let mut member_templates = Vec::new();
            for m in &inst.members {
                let sig = class
                    .members
                    .iter()
                    .find(|s| s.name == m.name)
                    .ok_or_else(|| {
                        TypeError::new(m.span, ErrorKind::LabelDoesNotBelong(m.name, head.class))
                    })?;
                // the member signature mentions only the class parameter;
                // instantiate it at the head type
                let placeholder = self.fresh_tyvar();
                let interned =
                    self.with_tyvars(&[(class.param, placeholder)], |gen| {
                        gen.intern_type(&sig.ty)
                    })?;
                let mut inst_map = HashMap::new();
                inst_map.insert(placeholder, head_ty.clone());
                let expected = interned.substitute(&inst_map);

                let (c, template) =
                    self.with_tyvars(&scope, |gen| gen.gen_expr(&m.body, &expected))?;
                member_cs.push(c);
                member_templates.push(explicit::MemberDef {
                    span: m.span,
                    name: m.name,
                    body: template,
                });
            }

            checks.push(Constraint::Let(
                vec![SchemeBinding {
                    span: head.span,
                    rigid: rigids,
                    flexible: Vec::new(),
                    predicates,
                    constraint: Box::new(Constraint::conj(member_cs)),
                    header: Vec::new(),
                }],
                Box::new(Constraint::True),
            ));
            templates.push(explicit::InstanceDefinition {
                head: head.clone(),
                members: member_templates,
            });
        }

        let (c_rest, mut out) = self.gen_blocks(rest)?;
        out.insert(0, explicit::Block::Instances(templates));
        checks.push(c_rest);
        Ok((Constraint::conj(checks), out))
    }

    fn gen_binding_group(
        &mut self,
        group: &implicit::BindingGroup,
    ) -> Result<(GroupParts, explicit::BindingGroup)> {
        let mut fixings = Vec::new();
        let mut body_checks = Vec::new();
        let mut implicit_headers = Vec::new();
        let mut implicit_flex = Vec::new();
        let mut implicit_bodies = Vec::new();
        let mut defs = Vec::new();

        // Annotated definitions are bound by an outer Let whose headers are
        // visible to every body check below, which is what makes mutual
        // recursion (including polymorphic self-recursion) work. Unannotated
        // definitions share one inner binding whose monomorphic headers tie
        // their recursive knot; the solver generalizes them afterwards.
        for def in &group.defs {
            let (scope, rigids) = self.def_scope(def)?;
            check::check_correct_context(&self.env, def.span, &def.vars, &def.predicates)?;
            let rename: HashMap<TypeVarName, TypeVarName> = scope.iter().copied().collect();
            let predicates = def
                .predicates
                .iter()
                .map(|p| ClassPredicate::new(p.class, rename[&p.var]))
                .collect::<Vec<_>>();

            let body = peel_forall(def);
            if !rigids.is_empty() && !is_value_form(body) {
                return Err(TypeError::new(def.span, ErrorKind::ValueRestriction(def.name)));
            }

            match &def.annotation {
                Some(ann) => {
                    let ity = self.with_tyvars(&scope, |gen| gen.intern_type(ann))?;
                    let (c_body, template) = self.with_tyvars(&scope, |gen| {
                        let inner = gen.gen_expr(body, &ity)?;
                        Ok(inner)
                    })?;
                    fixings.push(SchemeBinding {
                        span: def.span,
                        rigid: rigids.clone(),
                        flexible: Vec::new(),
                        predicates: predicates.clone(),
                        constraint: Box::new(Constraint::True),
                        header: vec![(def.name, ity.clone())],
                    });
                    body_checks.push(Constraint::Let(
                        vec![SchemeBinding {
                            span: def.span,
                            rigid: rigids.clone(),
                            flexible: Vec::new(),
                            predicates,
                            constraint: Box::new(c_body),
                            header: Vec::new(),
                        }],
                        Box::new(Constraint::True),
                    ));
                    defs.push(explicit::ValueDef {
                        span: def.span,
                        vars: rigids,
                        predicates: def
                            .predicates
                            .iter()
                            .map(|p| ClassPredicate::new(p.class, rename[&p.var]))
                            .collect(),
                        name: def.name,
                        ty: ity,
                        body: template,
                    });
                }
                None => {
                    let (x, xty) = self.fresh_var(def.span);
                    implicit_flex.push(x);
                    implicit_headers.push((def.name, xty.clone()));
                    let (c_body, template) = self.with_tyvars(&scope, |gen| {
                        gen.gen_expr(body, &xty)
                    })?;
                    implicit_bodies.push(c_body);
                    defs.push(explicit::ValueDef {
                        span: def.span,
                        vars: Vec::new(),
                        predicates: Vec::new(),
                        name: def.name,
                        ty: xty,
                        body: template,
                    });
                }
            }
        }

        let implicit_binding = if implicit_flex.is_empty() {
            None
        } else {
            Some(SchemeBinding {
                span: group.span,
                rigid: Vec::new(),
                flexible: implicit_flex,
                predicates: Vec::new(),
                constraint: Box::new(Constraint::let_in(
                    vec![SchemeBinding::monoscheme(
                        group.span,
                        implicit_headers.clone(),
                    )],
                    Constraint::conj(implicit_bodies),
                )),
                header: implicit_headers,
            })
        };

        Ok((
            GroupParts {
                fixings,
                body_checks,
                implicit_binding,
            },
            explicit::BindingGroup {
                span: group.span,
                defs,
            },
        ))
    }

    /// The type-variable scope a definition introduces: its declared
    /// quantifiers, renamed apart
    fn def_scope(
        &mut self,
        def: &implicit::ValueDef,
    ) -> Result<(Vec<(TypeVarName, TypeVarName)>, Vec<TypeVarName>)> {
        let mut scope = Vec::new();
        let mut rigids = Vec::new();
        for q in &def.vars {
            let r = self.fresh_tyvar();
            scope.push((*q, r));
            rigids.push(r);
        }
        if let implicit::ExprKind::Forall(vs, _) = &def.body.kind {
            if def.vars.is_empty() {
                for v in vs {
                    let r = self.fresh_tyvar();
                    scope.push((*v, r));
                    rigids.push(r);
                }
            } else {
                if vs.len() != def.vars.len() {
                    return Err(TypeError::new(
                        def.body.span,
                        ErrorKind::InvalidNumberOfTypeAbstraction(def.vars.len(), vs.len()),
                    ));
                }
                for (v, (_, r)) in vs.iter().zip(scope.clone()) {
                    if def.vars.contains(v) {
                        return Err(TypeError::new(
                            def.body.span,
                            ErrorKind::SameNameInTypeAbstractionAndScheme(*v),
                        ));
                    }
                    scope.push((*v, r));
                }
            }
        }
        Ok((scope, rigids))
    }

    fn gen_expr(
        &mut self,
        e: &implicit::Expr,
        expected: &Type,
    ) -> Result<(Constraint, explicit::Expr)> {
        use implicit::ExprKind::*;
        let span = e.span;
        match &e.kind {
            Var(x) => Ok((
                Constraint::Inst(span, SchemeName::Value(*x), expected.clone()),
                explicit::Expr::var(span, *x, Vec::new()),
            )),
            Prim(p) => Ok((
                Constraint::Eq(span, expected.clone(), builtin::primitive_type(span, p)),
                explicit::Expr::prim(span, *p),
            )),
            Lambda(x, ann, body) => {
                let (v1, dom) = self.fresh_var(span);
                let (v2, cod) = self.fresh_var(span);
                let mut cs = Vec::new();
                if let Some(ann) = ann {
                    let ity = self.intern_type(ann)?;
                    cs.push(Constraint::Eq(ann.span, dom.clone(), ity));
                }
                let (c_body, t_body) = self.gen_expr(body, &cod)?;
                cs.push(Constraint::let_in(
                    vec![SchemeBinding::monoscheme(span, vec![(*x, dom.clone())])],
                    c_body,
                ));
                cs.push(Constraint::Eq(
                    span,
                    expected.clone(),
                    Type::arrow(span, dom.clone(), cod),
                ));
                Ok((
                    Constraint::exists(vec![v1, v2], Constraint::conj(cs)),
                    explicit::Expr::lambda(span, *x, dom, t_body),
                ))
            }
            App(f, arg) => {
                let (v, vty) = self.fresh_var(span);
                let (c_f, t_f) =
                    self.gen_expr(f, &Type::arrow(span, vty.clone(), expected.clone()))?;
                let (c_a, t_a) = self.gen_expr(arg, &vty)?;
                Ok((
                    Constraint::exists(vec![v], c_f.and(c_a)),
                    explicit::Expr::app(span, t_f, t_a),
                ))
            }
            Ann(inner, ty) => {
                let ity = self.intern_type(ty)?;
                let (c, t) = self.gen_expr(inner, &ity)?;
                Ok((
                    Constraint::Eq(span, expected.clone(), ity.clone()).and(c),
                    explicit::Expr::new(span, explicit::ExprKind::Ann(Box::new(t), ity)),
                ))
            }
            Exists(vs, inner) => {
                let mut scope = Vec::new();
                let mut fresh = Vec::new();
                for v in vs {
                    let f = self.fresh_tyvar();
                    scope.push((*v, f));
                    fresh.push(f);
                }
                let (c, t) = self.with_tyvars(&scope, |gen| gen.gen_expr(inner, expected))?;
                Ok((Constraint::exists(fresh, c), t))
            }
            Forall(_, _) => Err(TypeError::new(
                span,
                ErrorKind::OnlyLetsCanIntroduceTypeAbstraction,
            )),
            Let(group, body) => {
                let (parts, template) = self.gen_binding_group(group)?;
                let (c_body, t_body) = self.gen_expr(body, expected)?;
                Ok((
                    parts.assemble(c_body),
                    explicit::Expr::new(
                        span,
                        explicit::ExprKind::Let(template, Box::new(t_body)),
                    ),
                ))
            }
            Con(k, args) => {
                let info = self.env.lookup_constructor(span, *k)?.clone();
                if args.len() < info.arity {
                    return Err(TypeError::new(
                        span,
                        ErrorKind::PartialDataConstructorApplication(*k, info.arity, args.len()),
                    ));
                }
                if args.len() > info.arity {
                    return Err(TypeError::new(
                        span,
                        ErrorKind::InvalidDataConstructorApplication(*k),
                    ));
                }
                let (vars, arg_tys, result) = self.instantiate_constructor(span, &info);
                let chain = Type::ntyarrow(span, arg_tys.clone(), expected.clone());
                // the result equation also pins instantiation variables the
                // argument types never mention, e.g. phantom parameters
                let mut cs = vec![
                    Constraint::Inst(span, SchemeName::Constructor(*k), chain),
                    Constraint::Eq(span, expected.clone(), result),
                ];
                let mut templates = Vec::new();
                for (arg, ty) in args.iter().zip(&arg_tys) {
                    let (c, t) = self.gen_expr(arg, ty)?;
                    cs.push(c);
                    templates.push(t);
                }
                let apps = vars.iter().map(|v| Type::var(span, *v)).collect();
                Ok((
                    Constraint::exists(vars, Constraint::conj(cs)),
                    explicit::Expr::new(span, explicit::ExprKind::Con(*k, apps, templates)),
                ))
            }
            Record(name, fields) => {
                let first = match fields.first() {
                    Some(f) => f,
                    None => {
                        return Err(TypeError::new(
                            span,
                            ErrorKind::InvalidRecordInstantiation(*name),
                        ))
                    }
                };
                let record = self.env.lookup_label(first.span, first.label)?.clone();
                let mut vars = Vec::new();
                let mut map = HashMap::new();
                for p in &record.params {
                    let (v, vty) = self.fresh_var(span);
                    vars.push(v);
                    map.insert(*p, vty);
                }
                let rt = Type::app(
                    span,
                    record.name,
                    vars.iter().map(|v| Type::var(span, *v)).collect(),
                );
                let mut cs = vec![Constraint::Eq(span, expected.clone(), rt)];
                let mut templates = Vec::new();
                let mut seen = Vec::new();
                for field in fields {
                    if seen.contains(&field.label) {
                        return Err(TypeError::new(
                            field.span,
                            ErrorKind::MultipleLabels(field.label),
                        ));
                    }
                    seen.push(field.label);
                    let decl = record.field(field.label).ok_or_else(|| {
                        TypeError::new(
                            field.span,
                            ErrorKind::LabelDoesNotBelong(field.label, record.name),
                        )
                    })?;
                    let (c, t) = self.gen_expr(&field.expr, &decl.substitute(&map))?;
                    cs.push(c);
                    templates.push(explicit::FieldBinding {
                        span: field.span,
                        label: field.label,
                        expr: t,
                    });
                }
                for (label, _) in &record.fields {
                    if !seen.contains(label) {
                        return Err(TypeError::new(
                            span,
                            ErrorKind::InvalidRecordInstantiation(record.name),
                        ));
                    }
                }
                let apps = vars.iter().map(|v| Type::var(span, *v)).collect();
                Ok((
                    Constraint::exists(vars, Constraint::conj(cs)),
                    // the source-level record name is advisory; it is kept
                    // verbatim and plays no part in typing
                    explicit::Expr::new(
                        span,
                        explicit::ExprKind::Record(*name, apps, templates),
                    ),
                ))
            }
            Access(inner, label) => {
                let record = self.env.lookup_label(span, *label)?.clone();
                let mut vars = Vec::new();
                let mut map = HashMap::new();
                for p in &record.params {
                    let (v, vty) = self.fresh_var(span);
                    vars.push(v);
                    map.insert(*p, vty);
                }
                let rt = Type::app(
                    span,
                    record.name,
                    vars.iter().map(|v| Type::var(span, *v)).collect(),
                );
                let field_ty = record
                    .field(*label)
                    .expect("labels index into their own record")
                    .substitute(&map);
                let (c, t) = self.gen_expr(inner, &rt)?;
                Ok((
                    Constraint::exists(
                        vars,
                        c.and(Constraint::Eq(span, expected.clone(), field_ty)),
                    ),
                    explicit::Expr::access(span, t, *label),
                ))
            }
            Match(scrutinee, branches) => {
                if branches.is_empty() {
                    return Err(TypeError::new(span, ErrorKind::MatchWithoutBranches));
                }
                let (v, vty) = self.fresh_var(span);
                let (c_s, t_s) = self.gen_expr(scrutinee, &vty)?;
                let mut cs = vec![c_s];
                let mut templates = Vec::new();
                for branch in branches {
                    let (frag, t_pat) = self.gen_pat(&branch.pat, &vty)?;
                    let (c_body, t_body) = self.gen_expr(&branch.body, expected)?;
                    let header = frag.header();
                    cs.push(Constraint::Let(
                        vec![SchemeBinding {
                            span: branch.span,
                            rigid: Vec::new(),
                            flexible: frag.vars,
                            predicates: Vec::new(),
                            constraint: Box::new(frag.constraint),
                            header,
                        }],
                        Box::new(c_body),
                    ));
                    templates.push(explicit::Branch {
                        span: branch.span,
                        pat: t_pat,
                        body: t_body,
                    });
                }
                Ok((
                    Constraint::exists(vec![v], Constraint::conj(cs)),
                    explicit::Expr::new(
                        span,
                        explicit::ExprKind::Match(Box::new(t_s), templates),
                    ),
                ))
            }
        }
    }

    fn instantiate_constructor(
        &mut self,
        span: Span,
        info: &crate::env::ConstructorInfo,
    ) -> (Vec<TypeVarName>, Vec<Type>, Type) {
        let mut vars = Vec::new();
        let mut args = Vec::new();
        for _ in &info.scheme.vars {
            let (v, vty) = self.fresh_var(span);
            vars.push(v);
            args.push(vty);
        }
        let full = info.scheme.apply(&args);
        let (mut doms, mut ty) = (Vec::new(), &full);
        for _ in 0..info.arity {
            let (dom, cod) = ty
                .destruct_tyarrow()
                .expect("constructor schemes end in their datatype");
            doms.push(dom.clone());
            ty = cod;
        }
        (vars, doms, ty.clone())
    }

    fn gen_pat(
        &mut self,
        p: &implicit::Pat,
        expected: &Type,
    ) -> Result<(Fragment, explicit::Pat)> {
        use implicit::PatKind::*;
        let span = p.span;
        match &p.kind {
            Wild => Ok((
                Fragment::empty(),
                explicit::Pat::new(span, explicit::PatKind::Wild),
            )),
            Lit(prim) => Ok((
                Fragment {
                    gamma: Vec::new(),
                    vars: Vec::new(),
                    constraint: Constraint::Eq(
                        span,
                        expected.clone(),
                        builtin::primitive_type(span, prim),
                    ),
                },
                explicit::Pat::new(span, explicit::PatKind::Lit(*prim)),
            )),
            Var(x) => {
                let (v, vty) = self.fresh_var(span);
                Ok((
                    Fragment {
                        gamma: vec![(*x, span, vty.clone())],
                        vars: vec![v],
                        constraint: Constraint::Eq(span, vty, expected.clone()),
                    },
                    explicit::Pat::new(span, explicit::PatKind::Var(*x)),
                ))
            }
            Or(ps) => {
                let mut frags = Vec::new();
                let mut templates = Vec::new();
                for sub in ps {
                    let (f, t) = self.gen_pat(sub, expected)?;
                    frags.push(f);
                    templates.push(t);
                }
                let first = frags.remove(0);
                let mut vars = first.vars.clone();
                let mut cs = vec![first.constraint.clone()];
                for frag in frags {
                    for (name, span_, _) in &first.gamma {
                        if !frag.gamma.iter().any(|(n, _, _)| n == name) {
                            return Err(TypeError::new(
                                *span_,
                                ErrorKind::InvalidDisjunctionPattern(*name),
                            ));
                        }
                    }
                    for (name, nspan, ty) in &frag.gamma {
                        match first.gamma.iter().find(|(n, _, _)| n == name) {
                            None => {
                                return Err(TypeError::new(
                                    *nspan,
                                    ErrorKind::InvalidDisjunctionPattern(*name),
                                ))
                            }
                            Some((_, _, fty)) => {
                                cs.push(Constraint::Eq(*nspan, fty.clone(), ty.clone()))
                            }
                        }
                    }
                    vars.extend(frag.vars);
                    cs.push(frag.constraint);
                }
                Ok((
                    Fragment {
                        gamma: first.gamma,
                        vars,
                        constraint: Constraint::conj(cs),
                    },
                    explicit::Pat::new(span, explicit::PatKind::Or(templates)),
                ))
            }
            And(ps) => {
                let mut gamma: Vec<(ValueName, Span, Type)> = Vec::new();
                let mut vars = Vec::new();
                let mut cs = Vec::new();
                let mut templates = Vec::new();
                for sub in ps {
                    let (f, t) = self.gen_pat(sub, expected)?;
                    for (name, nspan, ty) in f.gamma {
                        if gamma.iter().any(|(n, _, _)| *n == name) {
                            return Err(TypeError::new(nspan, ErrorKind::NonLinearPattern(name)));
                        }
                        gamma.push((name, nspan, ty));
                    }
                    vars.extend(f.vars);
                    cs.push(f.constraint);
                    templates.push(t);
                }
                Ok((
                    Fragment {
                        gamma,
                        vars,
                        constraint: Constraint::conj(cs),
                    },
                    explicit::Pat::new(span, explicit::PatKind::And(templates)),
                ))
            }
            Alias(x, sub) => {
                let (mut frag, t) = self.gen_pat(sub, expected)?;
                if frag.gamma.iter().any(|(n, _, _)| n == x) {
                    return Err(TypeError::new(span, ErrorKind::NonLinearPattern(*x)));
                }
                frag.gamma.push((*x, span, expected.clone()));
                Ok((
                    frag,
                    explicit::Pat::new(span, explicit::PatKind::Alias(*x, Box::new(t))),
                ))
            }
            Ann(sub, ty) => {
                let ity = self.intern_type(ty)?;
                let (mut frag, t) = self.gen_pat(sub, &ity)?;
                frag.constraint = Constraint::Eq(span, expected.clone(), ity.clone())
                    .and(frag.constraint);
                Ok((
                    frag,
                    explicit::Pat::new(span, explicit::PatKind::Ann(Box::new(t), ity)),
                ))
            }
            Con(k, ps) => {
                let info = self.env.lookup_constructor(span, *k)?.clone();
                if ps.len() < info.arity {
                    return Err(TypeError::new(
                        span,
                        ErrorKind::NotEnoughPatternArgts(*k, info.arity, ps.len()),
                    ));
                }
                if ps.len() > info.arity {
                    return Err(TypeError::new(
                        span,
                        ErrorKind::InvalidDataConstructorApplication(*k),
                    ));
                }
                let (mut vars, arg_tys, result) = self.instantiate_constructor(span, &info);
                let mut gamma: Vec<(ValueName, Span, Type)> = Vec::new();
                let mut cs = vec![Constraint::Eq(span, expected.clone(), result)];
                let mut templates = Vec::new();
                for (sub, ty) in ps.iter().zip(&arg_tys) {
                    let (f, t) = self.gen_pat(sub, ty)?;
                    for (name, nspan, bty) in f.gamma {
                        if gamma.iter().any(|(n, _, _)| *n == name) {
                            return Err(TypeError::new(nspan, ErrorKind::NonLinearPattern(name)));
                        }
                        gamma.push((name, nspan, bty));
                    }
                    vars.extend(f.vars);
                    cs.push(f.constraint);
                    templates.push(t);
                }
                let apps = vars[..info.scheme.vars.len()]
                    .iter()
                    .map(|v| Type::var(span, *v))
                    .collect();
                Ok((
                    Fragment {
                        gamma,
                        vars,
                        constraint: Constraint::conj(cs),
                    },
                    explicit::Pat::new(span, explicit::PatKind::Con(*k, apps, templates)),
                ))
            }
        }
    }
}

/// The constraint layers a binding group contributes, assembled around the
/// constraint of whatever the group scopes over
struct GroupParts {
    fixings: Vec<SchemeBinding>,
    body_checks: Vec<Constraint>,
    implicit_binding: Option<SchemeBinding>,
}

impl GroupParts {
    fn assemble(self, rest: Constraint) -> Constraint {
        let mut inner = self.body_checks;
        match self.implicit_binding {
            Some(binding) => inner.push(Constraint::Let(vec![binding], Box::new(rest))),
            None => inner.push(rest),
        }
        Constraint::let_in(self.fixings, Constraint::conj(inner))
    }
}

/// Strip the type abstraction a definition body is allowed to start with;
/// its variables are already part of the definition scope
fn peel_forall(def: &implicit::ValueDef) -> &implicit::Expr {
    match &def.body.kind {
        implicit::ExprKind::Forall(_, inner) => inner,
        _ => &def.body,
    }
}

fn is_value_form(e: &implicit::Expr) -> bool {
    use implicit::ExprKind::*;
    match &e.kind {
        Var(_) | Prim(_) | Lambda(_, _, _) => true,
        Con(_, args) => args.iter().all(is_value_form),
        Record(_, fields) => fields.iter().all(|f| is_value_form(&f.expr)),
        Ann(inner, _) | Forall(_, inner) | Exists(_, inner) => is_value_form(inner),
        App(_, _) | Let(_, _) | Access(_, _) | Match(_, _) => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lyre_ast::defs::{ConstructorDef, TypeDefBody, TypeDefinition};
    use lyre_ast::names::{LabelName, TypeConName};
    use lyre_ast::Primitive;

    fn span() -> Span {
        Span::zero()
    }

    fn def(name: &str, body: implicit::Expr) -> implicit::ValueDef {
        implicit::ValueDef {
            span: span(),
            vars: Vec::new(),
            predicates: Vec::new(),
            name: ValueName::new(name),
            annotation: None,
            body,
        }
    }

    fn program(blocks: Vec<implicit::Block>) -> implicit::Program {
        implicit::Program { blocks }
    }

    fn single_def(body: implicit::Expr) -> implicit::Program {
        program(vec![implicit::Block::Definitions(implicit::BindingGroup {
            span: span(),
            defs: vec![def("it", body)],
        })])
    }

    fn option_block() -> implicit::Block {
        implicit::Block::Types(vec![TypeDefinition {
            span: span(),
            name: TypeConName::new("option"),
            params: vec![TypeVarName::new("a")],
            body: TypeDefBody::Sum(vec![
                ConstructorDef {
                    span: span(),
                    name: LabelName::new("None"),
                    args: vec![],
                },
                ConstructorDef {
                    span: span(),
                    name: LabelName::new("Some"),
                    args: vec![Type::var(span(), TypeVarName::new("a"))],
                },
            ]),
        }])
    }

    #[test]
    fn lambda_generates_arrow_equation() {
        let x = ValueName::new("x");
        let body = implicit::Expr::lambda(span(), x, None, implicit::Expr::var(span(), x));
        let generated = generate(&single_def(body)).unwrap();
        // one definition produces one implicit binding layer
        let binding = match &generated.constraint {
            Constraint::Let(bindings, _) => &bindings[0],
            other => panic!("expected a let constraint, got {:?}", other),
        };
        assert_eq!(binding.flexible.len(), 1);
        // the arrow equation is buried in the lambda's conjunction
        fn search(c: &Constraint) -> bool {
            match c {
                Constraint::Eq(_, _, ty) => ty.destruct_tyarrow().is_some(),
                Constraint::Conj(cs) => cs.iter().any(search),
                Constraint::Exists(_, inner) => search(inner),
                Constraint::Let(bs, inner) => {
                    bs.iter().any(|b| search(&b.constraint)) || search(inner)
                }
                _ => false,
            }
        }
        assert!(search(&binding.constraint));
    }

    #[test]
    fn variables_emit_instance_constraints() {
        let body = implicit::Expr::var(span(), ValueName::new("missing"));
        let generated = generate(&single_def(body)).unwrap();
        fn search(c: &Constraint) -> bool {
            match c {
                Constraint::Inst(_, SchemeName::Value(_), _) => true,
                Constraint::Conj(cs) => cs.iter().any(search),
                Constraint::Exists(_, inner) => search(inner),
                Constraint::Let(bs, inner) => {
                    bs.iter().any(|b| search(&b.constraint)) || search(inner)
                }
                _ => false,
            }
        }
        assert!(search(&generated.constraint));
    }

    #[test]
    fn partial_constructor_application_is_rejected() {
        let body = implicit::Expr::new(
            span(),
            implicit::ExprKind::Con(LabelName::new("Some"), vec![]),
        );
        let err = generate(&program(vec![
            option_block(),
            implicit::Block::Definitions(implicit::BindingGroup {
                span: span(),
                defs: vec![def("it", body)],
            }),
        ]))
        .unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::PartialDataConstructorApplication(_, 1, 0)
        ));
    }

    #[test]
    fn non_linear_patterns_are_rejected() {
        let x = ValueName::new("x");
        let sub = |s| implicit::Pat::new(s, implicit::PatKind::Var(x));
        let second = Span::new(
            lyre_util::span::Location::new(3, 7),
            lyre_util::span::Location::new(3, 8),
        );
        let pat = implicit::Pat::new(
            span(),
            implicit::PatKind::And(vec![sub(span()), sub(second)]),
        );
        let body = implicit::Expr::new(
            span(),
            implicit::ExprKind::Match(
                Box::new(implicit::Expr::prim(span(), Primitive::Int(0))),
                vec![implicit::Branch {
                    span: span(),
                    pat,
                    body: implicit::Expr::prim(span(), Primitive::Int(0)),
                }],
            ),
        );
        let err = generate(&single_def(body)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NonLinearPattern(x));
        // the reported position is the second binding
        assert_eq!(err.span, second);
    }

    #[test]
    fn disjunction_alternatives_must_agree() {
        let x = ValueName::new("x");
        let pat = implicit::Pat::new(
            span(),
            implicit::PatKind::Or(vec![
                implicit::Pat::new(span(), implicit::PatKind::Var(x)),
                implicit::Pat::new(span(), implicit::PatKind::Wild),
            ]),
        );
        let body = implicit::Expr::new(
            span(),
            implicit::ExprKind::Match(
                Box::new(implicit::Expr::prim(span(), Primitive::Int(0))),
                vec![implicit::Branch {
                    span: span(),
                    pat,
                    body: implicit::Expr::prim(span(), Primitive::Int(0)),
                }],
            ),
        );
        let err = generate(&single_def(body)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidDisjunctionPattern(x));
    }

    #[test]
    fn value_restriction_applies_to_quantified_non_values() {
        let f = ValueName::new("f");
        let body = implicit::Expr::app(
            span(),
            implicit::Expr::var(span(), f),
            implicit::Expr::prim(span(), Primitive::Int(0)),
        );
        let program = program(vec![implicit::Block::Definitions(implicit::BindingGroup {
            span: span(),
            defs: vec![implicit::ValueDef {
                span: span(),
                vars: vec![TypeVarName::new("a")],
                predicates: Vec::new(),
                name: ValueName::new("bad"),
                annotation: Some(Type::var(span(), TypeVarName::new("a"))),
                body,
            }],
        })]);
        let err = generate(&program).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ValueRestriction(_)));
    }

    #[test]
    fn forall_outside_a_definition_is_rejected() {
        let inner = implicit::Expr::new(
            span(),
            implicit::ExprKind::Forall(
                vec![TypeVarName::new("a")],
                Box::new(implicit::Expr::prim(span(), Primitive::Int(1))),
            ),
        );
        let body = implicit::Expr::app(
            span(),
            implicit::Expr::prim(span(), Primitive::IntAdd),
            inner,
        );
        let err = generate(&single_def(body)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OnlyLetsCanIntroduceTypeAbstraction);
    }

    #[test]
    fn annotations_with_unbound_variables_are_rejected() {
        let body = implicit::Expr::new(
            span(),
            implicit::ExprKind::Ann(
                Box::new(implicit::Expr::prim(span(), Primitive::Int(1))),
                Type::var(span(), TypeVarName::new("ghost")),
            ),
        );
        let err = generate(&single_def(body)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnboundTypeVariable(_)));
    }

    #[test]
    fn matches_without_branches_are_rejected() {
        let body = implicit::Expr::new(
            span(),
            implicit::ExprKind::Match(
                Box::new(implicit::Expr::prim(span(), Primitive::Int(0))),
                vec![],
            ),
        );
        let err = generate(&single_def(body)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MatchWithoutBranches);
    }

    #[test]
    fn empty_records_are_rejected() {
        let body = implicit::Expr::new(
            span(),
            implicit::ExprKind::Record(TypeConName::new("point"), vec![]),
        );
        let err = generate(&single_def(body)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidRecordInstantiation(_)));
    }

    #[test]
    fn templates_mirror_the_source_shape() {
        let x = ValueName::new("x");
        let body = implicit::Expr::lambda(span(), x, None, implicit::Expr::var(span(), x));
        let generated = generate(&single_def(body)).unwrap();
        let group = match &generated.template.blocks[0] {
            explicit::Block::Definitions(g) => g,
            other => panic!("expected definitions, got {:?}", other),
        };
        assert!(matches!(
            group.defs[0].body.kind,
            explicit::ExprKind::Lambda(_, _, _)
        ));
    }
}
