//! Dictionary-passing elaboration.
//!
//! Consumes an explicitly-typed program and produces an equivalent program
//! in the class-free dialect. Class definitions compile to record type
//! declarations plus one accessor binding per member; instance groups
//! compile to recursive groups of dictionary-constructor bindings; every
//! use of an overloaded name becomes an application of that name to
//! explicit dictionary arguments.
//!
//! Elaboration also type-checks the program it walks: the type of every
//! expression is recomputed and compared against the annotations, so a
//! program that elaborates successfully is well-typed.
use crate::builtin;
use crate::check::{self, star_kinds, TyVarKinds};
use crate::env::{ClassInfo, Environment, InstanceInfo};
use crate::error::{ErrorKind, Result, TypeError};
use crate::ledger::NamespaceLedger;
use lyre_ast::defs::{ClassDefinition, FieldDef, TypeDefBody, TypeDefinition};
use lyre_ast::explicit::{
    Block, Branch, Expr, ExprKind, FieldBinding, InstanceDefinition, Pat, PatKind, Program,
    ValueDef,
};
use lyre_ast::names::{LabelName, TypeConName, TypeVarName, ValueName};
use lyre_ast::types::{ClassPredicate, Kind, Type, TypeKind};
use lyre_util::span::Span;
use std::collections::HashMap;

/// The record type a class compiles to
pub fn class_type_name(class: TypeConName) -> TypeConName {
    TypeConName::new(&format!("class_type_{}", class.as_str()))
}

/// The field of a subclass dictionary holding a superclass dictionary
pub fn superclass_field_name(class: TypeConName, superclass: TypeConName) -> LabelName {
    LabelName::new(&format!(
        "superclass_field_{}_{}",
        class.as_str(),
        superclass.as_str()
    ))
}

/// The dictionary constructor an instance compiles to
pub fn dict_constructor_name(class: TypeConName, head: TypeConName) -> ValueName {
    ValueName::new(&format!(
        "inst_dict_{}_{}",
        class.as_str(),
        head.as_str()
    ))
}

pub fn elaborate_program(program: &Program) -> Result<Program> {
    let mut elab = Elaborator {
        ledger: NamespaceLedger::new(),
        fresh: 0,
    };
    elab.run(program)
}

/// The dictionaries in scope, one per class predicate of the enclosing
/// definition or instance context
#[derive(Clone, Default)]
struct Dicts {
    entries: Vec<(ClassPredicate, ValueName)>,
}

struct Elaborator {
    ledger: NamespaceLedger,
    fresh: u32,
}

impl Elaborator {
    fn fresh_name(&mut self) -> ValueName {
        let n = ValueName::fresh(self.fresh);
        self.fresh += 1;
        n
    }

    fn bind_scheme(
        &mut self,
        env: &Environment,
        span: Span,
        name: ValueName,
        vars: Vec<TypeVarName>,
        predicates: Vec<ClassPredicate>,
        ty: Type,
    ) -> Result<Environment> {
        self.ledger.record(span, name, !predicates.is_empty())?;
        Ok(env.bind_scheme(name, vars, predicates, ty))
    }

    fn bind_simple(
        &mut self,
        env: &Environment,
        span: Span,
        name: ValueName,
        ty: Type,
    ) -> Result<Environment> {
        self.bind_scheme(env, span, name, Vec::new(), Vec::new(), ty)
    }

    fn run(&mut self, program: &Program) -> Result<Program> {
        let mut env = builtin::populate_env(Environment::default());
        let mut out = Vec::new();
        for block in &program.blocks {
            match block {
                Block::Types(defs) => {
                    env = env.bind_type_definitions(defs)?;
                    out.push(Block::Types(defs.clone()));
                }
                Block::Class(def) => {
                    env = self.elab_class(env, def, &mut out)?;
                }
                Block::Instances(group) => {
                    env = self.elab_instances(env, group, &mut out)?;
                }
                Block::Definitions(group) => {
                    let (next, group) = self.elab_defs(&env, group)?;
                    env = next;
                    out.push(Block::Definitions(group));
                }
            }
        }
        Ok(Program { blocks: out })
    }

    /// Compile a class into its dictionary record type and member
    /// accessors, and install the class for superclass queries
    fn elab_class(
        &mut self,
        env: Environment,
        def: &ClassDefinition,
        out: &mut Vec<Block>,
    ) -> Result<Environment> {
        for s in &def.superclasses {
            env.lookup_class(def.span, *s)?;
        }
        for (i, s1) in def.superclasses.iter().enumerate() {
            for s2 in &def.superclasses[i + 1..] {
                if env.is_superclass(*s1, *s2) || env.is_superclass(*s2, *s1) {
                    return Err(TypeError::new(
                        def.span,
                        ErrorKind::TheseTwoClassesMustNotBeInTheSameContext(*s1, *s2),
                    ));
                }
            }
        }

        let tyvars = star_kinds(&[def.param]);
        for m in &def.members {
            if !m.ty.free_vars().contains(&def.param) {
                return Err(TypeError::new(m.span, ErrorKind::InvalidOverloading(m.name)));
            }
            if !def.is_constructor_class {
                check::check_wf_type(&env, &tyvars, &m.ty, &Kind::Star)?;
            }
        }

        let record_name = class_type_name(def.name);
        let param_ty = Type::var(def.span, def.param);
        let mut fields = Vec::new();
        for s in &def.superclasses {
            fields.push(FieldDef {
                span: def.span,
                label: superclass_field_name(def.name, *s),
                ty: Type::app(def.span, class_type_name(*s), vec![param_ty.clone()]),
            });
        }
        for m in &def.members {
            fields.push(FieldDef {
                span: m.span,
                label: m.name,
                ty: m.ty.clone(),
            });
        }
        let record_def = TypeDefinition {
            span: def.span,
            name: record_name,
            params: vec![def.param],
            body: TypeDefBody::Record(fields),
        };
        let mut env = env.bind_type_definitions(&[record_def.clone()])?;
        out.push(Block::Types(vec![record_def]));

        let dict_ty = Type::app(def.span, record_name, vec![param_ty]);
        let mut accessors = Vec::new();
        for m in &def.members {
            let member_name = ValueName(m.name.0);
            let z = self.fresh_name();
            accessors.push(ValueDef {
                span: m.span,
                vars: vec![def.param],
                predicates: Vec::new(),
                name: member_name,
                ty: Type::arrow(m.span, dict_ty.clone(), m.ty.clone()),
                body: Expr::lambda(
                    Span::dummy(),
                    z,
                    dict_ty.clone(),
                    Expr::access(Span::dummy(), Expr::var(Span::dummy(), z, Vec::new()), m.name),
                ),
            });
            // the environment keeps the class-qualified scheme, so later
            // uses of the member record an `Eq a`-style constraint and get
            // rewritten into dictionary accesses
            env = self.bind_scheme(
                &env,
                m.span,
                member_name,
                vec![def.param],
                vec![ClassPredicate::new(def.name, def.param)],
                m.ty.clone(),
            )?;
        }
        if !accessors.is_empty() {
            out.push(Block::Definitions(lyre_ast::explicit::BindingGroup {
                span: def.span,
                defs: accessors,
            }));
        }

        Ok(env.bind_class(
            def.name,
            ClassInfo {
                span: def.span,
                param: def.param,
                superclasses: def.superclasses.clone(),
                members: def.members.clone(),
                is_constructor_class: def.is_constructor_class,
            },
        ))
    }

    /// Compile a mutually recursive instance group into a recursive group
    /// of dictionary-constructor bindings
    fn elab_instances(
        &mut self,
        base: Environment,
        group: &[InstanceDefinition],
        out: &mut Vec<Block>,
    ) -> Result<Environment> {
        let infos: Vec<InstanceInfo> = group
            .iter()
            .map(|inst| InstanceInfo {
                span: inst.head.span,
                class: inst.head.class,
                head: inst.head.head,
                params: inst.head.params.clone(),
                context: inst.head.context.clone(),
            })
            .collect();

        // every instance of the group is visible while member bodies are
        // elaborated, which is what lets recursive instances work
        let mut big = base.clone();
        for info in &infos {
            big = big.bind_instance(info.clone())?;
        }

        let mut defs = Vec::new();
        let mut env = base.clone();
        let mut small = base.clone();
        for (inst, info) in group.iter().zip(&infos) {
            // superclass dictionaries may only draw on preceding instances
            // and the instance under construction
            small = small.bind_instance(info.clone())?;
            let def = self.elab_instance(&big, &small, inst)?;
            env = self.bind_scheme(
                &env,
                def.span,
                def.name,
                def.vars.clone(),
                Vec::new(),
                def.ty.clone(),
            )?;
            defs.push(def);
        }

        for info in infos {
            env = env.bind_instance(info)?;
        }
        out.push(Block::Definitions(lyre_ast::explicit::BindingGroup {
            span: group.first().map(|i| i.head.span).unwrap_or_else(Span::dummy),
            defs,
        }));
        Ok(env)
    }

    fn elab_instance(
        &mut self,
        big: &Environment,
        small: &Environment,
        inst: &InstanceDefinition,
    ) -> Result<ValueDef> {
        let head = &inst.head;
        let span = head.span;
        let class = big.lookup_class(span, head.class)?.clone();
        check::check_correct_context(big, span, &head.params, &head.context)?;

        let tyvars = star_kinds(&head.params);
        let head_ty = Type::app(
            span,
            head.head,
            head.params.iter().map(|p| Type::var(span, *p)).collect(),
        );
        if !class.is_constructor_class {
            check::check_wf_type(big, &tyvars, &head_ty, &Kind::Star)?;
        }

        // one dictionary parameter per context predicate
        let mut dicts = Dicts::default();
        let mut params = Vec::new();
        let mut body_env = big.clone();
        for pred in &head.context {
            let d = self.fresh_name();
            let dty = Type::app(
                span,
                class_type_name(pred.class),
                vec![Type::var(span, pred.var)],
            );
            body_env = self.bind_simple(&body_env, span, d, dty.clone())?;
            dicts.entries.push((*pred, d));
            params.push((d, dty));
        }

        let mut inst_map = HashMap::new();
        inst_map.insert(class.param, head_ty.clone());

        let mut fields = Vec::new();
        for s in &class.superclasses {
            let dict = self.resolve_dictionary(small, &dicts, span, *s, &head_ty)?;
            fields.push(FieldBinding {
                span: Span::dummy(),
                label: superclass_field_name(head.class, *s),
                expr: dict,
            });
        }
        for sig in &class.members {
            let member = inst
                .members
                .iter()
                .find(|m| m.name == sig.name)
                .ok_or_else(|| {
                    TypeError::new(span, ErrorKind::InvalidRecordInstantiation(head.class))
                })?;
            let (got, body) = self.elab_expr(&body_env, &tyvars, &dicts, &member.body)?;
            if !class.is_constructor_class {
                let expected = sig.ty.substitute(&inst_map);
                check::check_equal_types(member.span, &expected, &got)?;
            }
            fields.push(FieldBinding {
                span: member.span,
                label: member.name,
                expr: body,
            });
        }
        for m in &inst.members {
            if !class.members.iter().any(|sig| sig.name == m.name) {
                return Err(TypeError::new(
                    m.span,
                    ErrorKind::LabelDoesNotBelong(m.name, head.class),
                ));
            }
        }

        let record_name = class_type_name(head.class);
        let dict_record = Expr::new(
            Span::dummy(),
            ExprKind::Record(record_name, vec![head_ty.clone()], fields),
        );
        // the constructor abstracts over its context dictionaries in full;
        // a context-free instance is a plain record
        let body = params.iter().rev().fold(dict_record, |acc, (d, dty)| {
            Expr::lambda(Span::dummy(), *d, dty.clone(), acc)
        });
        let ty = Type::ntyarrow(
            span,
            params.iter().map(|(_, dty)| dty.clone()).collect(),
            Type::app(span, record_name, vec![head_ty]),
        );

        Ok(ValueDef {
            span,
            vars: head.params.clone(),
            predicates: Vec::new(),
            name: dict_constructor_name(head.class, head.head),
            ty,
            body,
        })
    }

    /// Elaborate a binding group. All schemes are bound first so the group
    /// is mutually recursive; each body is then rewritten under one
    /// dictionary parameter per predicate of its definition.
    fn elab_defs(
        &mut self,
        env: &Environment,
        group: &lyre_ast::explicit::BindingGroup,
    ) -> Result<(Environment, lyre_ast::explicit::BindingGroup)> {
        let mut bound = env.clone();
        for def in &group.defs {
            let tyvars = star_kinds(&def.vars);
            check::check_correct_context(env, def.span, &def.vars, &def.predicates)?;
            check::check_wf_type(env, &tyvars, &def.ty, &Kind::Star)?;
            bound = self.bind_scheme(
                &bound,
                def.span,
                def.name,
                def.vars.clone(),
                def.predicates.clone(),
                def.ty.clone(),
            )?;
        }

        let mut defs = Vec::new();
        for def in &group.defs {
            let tyvars = star_kinds(&def.vars);
            let mut dicts = Dicts::default();
            let mut body_env = bound.clone();
            let mut params = Vec::new();
            for pred in &def.predicates {
                let d = self.fresh_name();
                let dty = Type::app(
                    def.span,
                    class_type_name(pred.class),
                    vec![Type::var(def.span, pred.var)],
                );
                body_env = self.bind_simple(&body_env, def.span, d, dty.clone())?;
                dicts.entries.push((*pred, d));
                params.push((d, dty));
            }

            let (got, body) = self.elab_expr(&body_env, &tyvars, &dicts, &def.body)?;
            check::check_equal_types(def.span, &def.ty, &got)?;

            let body = params.iter().rev().fold(body, |acc, (d, dty)| {
                Expr::lambda(Span::dummy(), *d, dty.clone(), acc)
            });
            let ty = Type::ntyarrow(
                def.span,
                params.iter().map(|(_, dty)| dty.clone()).collect(),
                def.ty.clone(),
            );
            defs.push(ValueDef {
                span: def.span,
                vars: def.vars.clone(),
                predicates: Vec::new(),
                name: def.name,
                ty,
                body,
            });
        }

        Ok((
            bound,
            lyre_ast::explicit::BindingGroup {
                span: group.span,
                defs,
            },
        ))
    }

    fn elab_expr(
        &mut self,
        env: &Environment,
        tyvars: &TyVarKinds,
        dicts: &Dicts,
        e: &Expr,
    ) -> Result<(Type, Expr)> {
        let span = e.span;
        match &e.kind {
            ExprKind::Var(x, apps) => {
                let scheme = env.lookup(span, *x)?.clone();
                if apps.len() != scheme.vars.len() {
                    return Err(TypeError::new(
                        span,
                        ErrorKind::InvalidNumberOfTypeAbstraction(scheme.vars.len(), apps.len()),
                    ));
                }
                for ty in apps {
                    check::check_wf_type(env, tyvars, ty, &Kind::Star)?;
                }
                let ty = scheme.apply(apps);
                let mut expr = Expr::var(span, *x, apps.clone());
                for pred in &scheme.predicates {
                    let idx = scheme
                        .vars
                        .iter()
                        .position(|v| *v == pred.var)
                        .expect("internal compiler error: predicate over unquantified variable");
                    let dict = self.resolve_dictionary(env, dicts, span, pred.class, &apps[idx])?;
                    expr = Expr::app(span, expr, dict);
                }
                Ok((ty, expr))
            }
            ExprKind::Prim(p) => Ok((
                builtin::primitive_type(span, p),
                Expr::prim(span, *p),
            )),
            ExprKind::Lambda(x, ann, body) => {
                check::check_wf_type(env, tyvars, ann, &Kind::Star)?;
                let inner = self.bind_simple(env, span, *x, ann.clone())?;
                let (bty, body) = self.elab_expr(&inner, tyvars, dicts, body)?;
                Ok((
                    Type::arrow(span, ann.clone(), bty),
                    Expr::lambda(span, *x, ann.clone(), body),
                ))
            }
            ExprKind::App(f, arg) => {
                let (fty, f) = self.elab_expr(env, tyvars, dicts, f)?;
                let (aty, arg_e) = self.elab_expr(env, tyvars, dicts, arg)?;
                let (dom, cod) = fty.destruct_tyarrow().ok_or_else(|| {
                    TypeError::new(span, ErrorKind::ApplicationToNonFunctional(fty.clone()))
                })?;
                check::check_equal_types(arg.span, dom, &aty)?;
                Ok((cod.clone(), Expr::app(span, f, arg_e)))
            }
            ExprKind::Ann(inner, ty) => {
                check::check_wf_type(env, tyvars, ty, &Kind::Star)?;
                let (got, inner) = self.elab_expr(env, tyvars, dicts, inner)?;
                check::check_equal_types(span, ty, &got)?;
                Ok((
                    ty.clone(),
                    Expr::new(span, ExprKind::Ann(Box::new(inner), ty.clone())),
                ))
            }
            ExprKind::Let(group, body) => {
                let (inner, group) = self.elab_defs(env, group)?;
                let (bty, body) = self.elab_expr(&inner, tyvars, dicts, body)?;
                Ok((
                    bty,
                    Expr::new(span, ExprKind::Let(group, Box::new(body))),
                ))
            }
            ExprKind::Con(k, apps, args) => {
                let info = env.lookup_constructor(span, *k)?.clone();
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
                if apps.len() != info.scheme.vars.len() {
                    return Err(TypeError::new(
                        span,
                        ErrorKind::InvalidNumberOfTypeAbstraction(
                            info.scheme.vars.len(),
                            apps.len(),
                        ),
                    ));
                }
                for ty in apps {
                    check::check_wf_type(env, tyvars, ty, &Kind::Star)?;
                }
                let (doms, cod) = peel_arrows(&info.scheme.apply(apps), info.arity);
                let mut out = Vec::new();
                for (arg, dom) in args.iter().zip(&doms) {
                    let (aty, arg_e) = self.elab_expr(env, tyvars, dicts, arg)?;
                    check::check_equal_types(arg.span, dom, &aty)?;
                    out.push(arg_e);
                }
                Ok((
                    cod,
                    Expr::new(span, ExprKind::Con(*k, apps.clone(), out)),
                ))
            }
            ExprKind::Record(name, apps, fields) => {
                let first = fields.first().ok_or_else(|| {
                    TypeError::new(span, ErrorKind::InvalidRecordInstantiation(*name))
                })?;
                let record = env.lookup_label(first.span, first.label)?.clone();
                if apps.len() != record.params.len() {
                    return Err(TypeError::new(
                        span,
                        ErrorKind::InvalidNumberOfTypeAbstraction(
                            record.params.len(),
                            apps.len(),
                        ),
                    ));
                }
                for ty in apps {
                    check::check_wf_type(env, tyvars, ty, &Kind::Star)?;
                }
                let map: HashMap<TypeVarName, Type> = record
                    .params
                    .iter()
                    .copied()
                    .zip(apps.iter().cloned())
                    .collect();
                let mut seen = Vec::new();
                let mut out = Vec::new();
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
                    let (fty, fe) = self.elab_expr(env, tyvars, dicts, &field.expr)?;
                    check::check_equal_types(field.span, &decl.substitute(&map), &fty)?;
                    out.push(FieldBinding {
                        span: field.span,
                        label: field.label,
                        expr: fe,
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
                Ok((
                    Type::app(span, record.name, apps.clone()),
                    // the advisory record name is passed through untouched
                    Expr::new(span, ExprKind::Record(*name, apps.clone(), out)),
                ))
            }
            ExprKind::Access(inner, label) => {
                let record = env.lookup_label(span, *label)?.clone();
                let (ity, inner) = self.elab_expr(env, tyvars, dicts, inner)?;
                let args = match &ity.kind {
                    TypeKind::App(con, args) if *con == record.name => args.clone(),
                    TypeKind::App(con, _) => {
                        return Err(TypeError::new(
                            span,
                            ErrorKind::LabelDoesNotBelong(*label, *con),
                        ))
                    }
                    _ => {
                        return Err(TypeError::new(span, ErrorKind::RecordExpected(ity.clone())))
                    }
                };
                let map: HashMap<TypeVarName, Type> = record
                    .params
                    .iter()
                    .copied()
                    .zip(args.into_iter())
                    .collect();
                let fty = record
                    .field(*label)
                    .expect("labels index into their own record")
                    .substitute(&map);
                Ok((fty, Expr::access(span, inner, *label)))
            }
            ExprKind::Match(scrutinee, branches) => {
                if branches.is_empty() {
                    return Err(TypeError::new(span, ErrorKind::MatchWithoutBranches));
                }
                let (sty, scrutinee) = self.elab_expr(env, tyvars, dicts, scrutinee)?;
                let mut result: Option<Type> = None;
                let mut out = Vec::new();
                for branch in branches {
                    let (bindings, pat) = self.elab_pat(env, tyvars, &branch.pat, &sty)?;
                    let mut inner = env.clone();
                    for (name, bspan, ty) in bindings {
                        inner = self.bind_simple(&inner, bspan, name, ty)?;
                    }
                    let (bty, body) = self.elab_expr(&inner, tyvars, dicts, &branch.body)?;
                    match &result {
                        None => result = Some(bty),
                        Some(expected) => check::check_equal_types(branch.span, expected, &bty)?,
                    }
                    out.push(Branch {
                        span: branch.span,
                        pat,
                        body,
                    });
                }
                Ok((
                    result.expect("at least one branch"),
                    Expr::new(span, ExprKind::Match(Box::new(scrutinee), out)),
                ))
            }
        }
    }

    fn elab_pat(
        &mut self,
        env: &Environment,
        tyvars: &TyVarKinds,
        p: &Pat,
        expected: &Type,
    ) -> Result<(Vec<(ValueName, Span, Type)>, Pat)> {
        let span = p.span;
        match &p.kind {
            PatKind::Wild => Ok((Vec::new(), p.clone())),
            PatKind::Lit(prim) => {
                check::check_equal_types(span, expected, &builtin::primitive_type(span, prim))?;
                Ok((Vec::new(), p.clone()))
            }
            PatKind::Var(x) => Ok((vec![(*x, span, expected.clone())], p.clone())),
            PatKind::Or(ps) => {
                let mut all = Vec::new();
                let mut out = Vec::new();
                for sub in ps {
                    let (bindings, sub) = self.elab_pat(env, tyvars, sub, expected)?;
                    all.push(bindings);
                    out.push(sub);
                }
                let first = all.remove(0);
                for other in &all {
                    for (name, nspan, ty) in other {
                        match first.iter().find(|(n, _, _)| n == name) {
                            None => {
                                return Err(TypeError::new(
                                    *nspan,
                                    ErrorKind::PatternsMustBindSameVariables(*name),
                                ))
                            }
                            Some((_, _, fty)) => check::check_equal_types(*nspan, fty, ty)?,
                        }
                    }
                    for (name, nspan, _) in &first {
                        if !other.iter().any(|(n, _, _)| n == name) {
                            return Err(TypeError::new(
                                *nspan,
                                ErrorKind::PatternsMustBindSameVariables(*name),
                            ));
                        }
                    }
                }
                Ok((first, Pat::new(span, PatKind::Or(out))))
            }
            PatKind::And(ps) => {
                let mut bindings: Vec<(ValueName, Span, Type)> = Vec::new();
                let mut out = Vec::new();
                for sub in ps {
                    let (bs, sub) = self.elab_pat(env, tyvars, sub, expected)?;
                    for (name, nspan, ty) in bs {
                        if bindings.iter().any(|(n, _, _)| *n == name) {
                            return Err(TypeError::new(nspan, ErrorKind::NonLinearPattern(name)));
                        }
                        bindings.push((name, nspan, ty));
                    }
                    out.push(sub);
                }
                Ok((bindings, Pat::new(span, PatKind::And(out))))
            }
            PatKind::Alias(x, sub) => {
                let (mut bindings, sub) = self.elab_pat(env, tyvars, sub, expected)?;
                if bindings.iter().any(|(n, _, _)| n == x) {
                    return Err(TypeError::new(span, ErrorKind::NonLinearPattern(*x)));
                }
                bindings.push((*x, span, expected.clone()));
                Ok((bindings, Pat::new(span, PatKind::Alias(*x, Box::new(sub)))))
            }
            PatKind::Ann(sub, ty) => {
                check::check_wf_type(env, tyvars, ty, &Kind::Star)?;
                check::check_equal_types(span, expected, ty)?;
                let (bindings, sub) = self.elab_pat(env, tyvars, sub, ty)?;
                Ok((
                    bindings,
                    Pat::new(span, PatKind::Ann(Box::new(sub), ty.clone())),
                ))
            }
            PatKind::Con(k, apps, ps) => {
                let info = env.lookup_constructor(span, *k)?.clone();
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
                if apps.len() != info.scheme.vars.len() {
                    return Err(TypeError::new(
                        span,
                        ErrorKind::InvalidNumberOfTypeAbstraction(
                            info.scheme.vars.len(),
                            apps.len(),
                        ),
                    ));
                }
                let (doms, cod) = peel_arrows(&info.scheme.apply(apps), info.arity);
                check::check_equal_types(span, expected, &cod)?;
                let mut bindings: Vec<(ValueName, Span, Type)> = Vec::new();
                let mut out = Vec::new();
                for (sub, dom) in ps.iter().zip(&doms) {
                    let (bs, sub) = self.elab_pat(env, tyvars, sub, dom)?;
                    for (name, nspan, ty) in bs {
                        if bindings.iter().any(|(n, _, _)| *n == name) {
                            return Err(TypeError::new(nspan, ErrorKind::NonLinearPattern(name)));
                        }
                        bindings.push((name, nspan, ty));
                    }
                    out.push(sub);
                }
                Ok((
                    bindings,
                    Pat::new(span, PatKind::Con(*k, apps.clone(), out)),
                ))
            }
        }
    }

    /// Produce the expression computing the dictionary witnessing `class`
    /// at `ty`.
    ///
    /// A type variable must be covered by an in-scope dictionary parameter,
    /// possibly through a chain of superclass field accesses. A constructed
    /// type goes through its instance's dictionary constructor, resolving
    /// the instance context recursively.
    fn resolve_dictionary(
        &mut self,
        env: &Environment,
        dicts: &Dicts,
        span: Span,
        class: TypeConName,
        ty: &Type,
    ) -> Result<Expr> {
        match &ty.kind {
            TypeKind::Var(v) => {
                for (pred, d) in &dicts.entries {
                    if pred.var != *v {
                        continue;
                    }
                    if pred.class == class {
                        return Ok(Expr::var(span, *d, Vec::new()));
                    }
                    if let Some(path) = env.superclass_path(pred.class, class) {
                        let mut expr = Expr::var(span, *d, Vec::new());
                        let mut current = pred.class;
                        for next in path {
                            expr = Expr::access(
                                span,
                                expr,
                                superclass_field_name(current, next),
                            );
                            current = next;
                        }
                        return Ok(expr);
                    }
                }
                Err(TypeError::new(
                    span,
                    ErrorKind::UnresolvedOverloading(class, ty.clone()),
                ))
            }
            TypeKind::App(head, args) => {
                let info = match env.lookup_instance(class, *head) {
                    Some(info) => info.clone(),
                    None => {
                        return Err(TypeError::new(
                            span,
                            ErrorKind::UnresolvedOverloading(class, ty.clone()),
                        ))
                    }
                };
                let map: HashMap<TypeVarName, Type> = info
                    .params
                    .iter()
                    .copied()
                    .zip(args.iter().cloned())
                    .collect();
                let mut expr = Expr::var(
                    span,
                    dict_constructor_name(class, *head),
                    args.clone(),
                );
                for pred in &info.context {
                    let at = map
                        .get(&pred.var)
                        .expect("instance contexts range over instance parameters");
                    let arg = self.resolve_dictionary(env, dicts, span, pred.class, at)?;
                    expr = Expr::app(span, expr, arg);
                }
                Ok(expr)
            }
        }
    }
}

/// Split exactly `n` arrows off a constructor's instantiated type
fn peel_arrows(ty: &Type, n: usize) -> (Vec<Type>, Type) {
    let mut doms = Vec::new();
    let mut ty = ty;
    for _ in 0..n {
        let (dom, cod) = ty
            .destruct_tyarrow()
            .expect("constructor schemes end in their datatype");
        doms.push(dom.clone());
        ty = cod;
    }
    (doms, ty.clone())
}

#[cfg(test)]
mod test {
    use super::*;
    use lyre_ast::defs::{InstanceHead, MemberSig};
    use lyre_ast::explicit::{BindingGroup, MemberDef};
    use lyre_ast::Primitive;

    fn sp() -> Span {
        Span::zero()
    }

    fn a() -> TypeVarName {
        TypeVarName::new("a")
    }

    fn eq_cmp_ty(arg: Type) -> Type {
        Type::ntyarrow(sp(), vec![arg.clone(), arg], builtin::bool(sp()))
    }

    fn eq_class() -> Block {
        Block::Class(ClassDefinition {
            span: sp(),
            name: TypeConName::new("Eq"),
            param: a(),
            superclasses: vec![],
            members: vec![MemberSig {
                span: sp(),
                name: LabelName::new("eq"),
                ty: eq_cmp_ty(Type::var(sp(), a())),
            }],
            is_constructor_class: false,
        })
    }

    fn ord_class() -> Block {
        Block::Class(ClassDefinition {
            span: sp(),
            name: TypeConName::new("Ord"),
            param: a(),
            superclasses: vec![TypeConName::new("Eq")],
            members: vec![MemberSig {
                span: sp(),
                name: LabelName::new("lt"),
                ty: eq_cmp_ty(Type::var(sp(), a())),
            }],
            is_constructor_class: false,
        })
    }

    fn instance(class: &str, member: &str, body: Primitive) -> InstanceDefinition {
        InstanceDefinition {
            head: InstanceHead {
                span: sp(),
                class: TypeConName::new(class),
                head: builtin::tycons::T_INT,
                params: vec![],
                context: vec![],
            },
            members: vec![MemberDef {
                span: sp(),
                name: LabelName::new(member),
                body: Expr::prim(sp(), body),
            }],
        }
    }

    fn eq_int() -> InstanceDefinition {
        instance("Eq", "eq", Primitive::IntEq)
    }

    fn ord_int() -> InstanceDefinition {
        instance("Ord", "lt", Primitive::IntLt)
    }

    fn defs(defs: Vec<ValueDef>) -> Block {
        Block::Definitions(BindingGroup { span: sp(), defs })
    }

    fn find_def<'a>(program: &'a Program, name: &str) -> &'a ValueDef {
        let name = ValueName::new(name);
        for block in &program.blocks {
            if let Block::Definitions(group) = block {
                for def in &group.defs {
                    if def.name == name {
                        return def;
                    }
                }
            }
        }
        panic!("no definition named {:?}", name);
    }

    #[test]
    fn classes_compile_to_records_and_accessors() {
        let program = Program {
            blocks: vec![eq_class(), Block::Instances(vec![eq_int()])],
        };
        let out = elaborate_program(&program).unwrap();
        assert!(out.is_class_free());

        let record = match &out.blocks[0] {
            Block::Types(defs) => &defs[0],
            other => panic!("expected the class record type, got {:?}", other),
        };
        assert_eq!(record.name, TypeConName::new("class_type_Eq"));
        assert_eq!(record.params, vec![a()]);
        match &record.body {
            TypeDefBody::Record(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].label, LabelName::new("eq"));
            }
            other => panic!("expected a record body, got {:?}", other),
        }

        let accessor = find_def(&out, "eq");
        assert_eq!(accessor.vars, vec![a()]);
        assert!(accessor.predicates.is_empty());
        let expected = Type::arrow(
            sp(),
            Type::app(
                sp(),
                TypeConName::new("class_type_Eq"),
                vec![Type::var(sp(), a())],
            ),
            eq_cmp_ty(Type::var(sp(), a())),
        );
        assert_eq!(accessor.ty, expected);
        match &accessor.body.kind {
            ExprKind::Lambda(_, _, body) => {
                assert!(matches!(body.kind, ExprKind::Access(_, _)))
            }
            other => panic!("expected an accessor lambda, got {:?}", other),
        }

        let dict = find_def(&out, "inst_dict_Eq_int");
        assert_eq!(
            dict.ty,
            Type::app(
                sp(),
                TypeConName::new("class_type_Eq"),
                vec![builtin::int(sp())]
            )
        );
        match &dict.body.kind {
            ExprKind::Record(_, _, fields) => {
                assert_eq!(fields[0].label, LabelName::new("eq"));
                assert!(matches!(
                    fields[0].expr.kind,
                    ExprKind::Prim(Primitive::IntEq)
                ));
            }
            other => panic!("expected a dictionary record, got {:?}", other),
        }
    }

    #[test]
    fn subclasses_carry_superclass_fields() {
        let program = Program {
            blocks: vec![
                eq_class(),
                Block::Instances(vec![eq_int()]),
                ord_class(),
                Block::Instances(vec![ord_int()]),
            ],
        };
        let out = elaborate_program(&program).unwrap();

        let ord_record = out
            .blocks
            .iter()
            .find_map(|b| match b {
                Block::Types(defs) if defs[0].name == TypeConName::new("class_type_Ord") => {
                    Some(&defs[0])
                }
                _ => None,
            })
            .expect("the Ord record type");
        match &ord_record.body {
            TypeDefBody::Record(fields) => {
                assert_eq!(
                    fields[0].label,
                    LabelName::new("superclass_field_Ord_Eq")
                );
                assert_eq!(
                    fields[0].ty,
                    Type::app(
                        sp(),
                        TypeConName::new("class_type_Eq"),
                        vec![Type::var(sp(), a())]
                    )
                );
                assert_eq!(fields[1].label, LabelName::new("lt"));
            }
            other => panic!("expected a record body, got {:?}", other),
        }

        let dict = find_def(&out, "inst_dict_Ord_int");
        match &dict.body.kind {
            ExprKind::Record(_, _, fields) => {
                assert_eq!(
                    fields[0].label,
                    LabelName::new("superclass_field_Ord_Eq")
                );
                assert_eq!(
                    fields[0].expr.kind,
                    ExprKind::Var(ValueName::new("inst_dict_Eq_int"), vec![])
                );
                assert!(matches!(
                    fields[1].expr.kind,
                    ExprKind::Prim(Primitive::IntLt)
                ));
            }
            other => panic!("expected a dictionary record, got {:?}", other),
        }
    }

    #[test]
    fn qualified_definitions_abstract_over_dictionaries() {
        let x = ValueName::new("x");
        let y = ValueName::new("y");
        let va = Type::var(sp(), a());
        let body = Expr::lambda(
            sp(),
            x,
            va.clone(),
            Expr::lambda(
                sp(),
                y,
                va.clone(),
                Expr::apps(
                    sp(),
                    Expr::var(sp(), ValueName::new("lt"), vec![va.clone()]),
                    vec![
                        Expr::var(sp(), x, vec![]),
                        Expr::var(sp(), y, vec![]),
                    ],
                ),
            ),
        );
        let program = Program {
            blocks: vec![
                eq_class(),
                ord_class(),
                defs(vec![ValueDef {
                    span: sp(),
                    vars: vec![a()],
                    predicates: vec![ClassPredicate::new(TypeConName::new("Ord"), a())],
                    name: ValueName::new("f"),
                    ty: eq_cmp_ty(va.clone()),
                    body,
                }]),
            ],
        };
        let out = elaborate_program(&program).unwrap();
        let f = find_def(&out, "f");
        assert!(f.predicates.is_empty());
        let dict_ty = Type::app(sp(), TypeConName::new("class_type_Ord"), vec![va.clone()]);
        assert_eq!(
            f.ty,
            Type::arrow(sp(), dict_ty.clone(), eq_cmp_ty(va.clone()))
        );
        // f = fun d -> fun x -> fun y -> ((lt [a] d) x) y
        let (d, inner) = match &f.body.kind {
            ExprKind::Lambda(d, ann, inner) => {
                assert_eq!(ann, &dict_ty);
                (*d, inner)
            }
            other => panic!("expected a dictionary lambda, got {:?}", other),
        };
        let mut cursor = inner;
        while let ExprKind::Lambda(_, _, body) = &cursor.kind {
            cursor = body;
        }
        let mut callee = cursor;
        while let ExprKind::App(f, _) = &callee.kind {
            callee = f;
        }
        assert!(matches!(&callee.kind, ExprKind::Var(n, _) if *n == ValueName::new("lt")));
        // the first argument handed to lt is the dictionary parameter
        let mut spine = cursor;
        let mut args = Vec::new();
        while let ExprKind::App(f, arg) = &spine.kind {
            args.push(arg);
            spine = f;
        }
        let first = args.last().unwrap();
        assert_eq!(first.kind, ExprKind::Var(d, vec![]));
    }

    #[test]
    fn uses_at_ground_types_apply_dictionary_constructors() {
        let body = Expr::apps(
            sp(),
            Expr::var(sp(), ValueName::new("eq"), vec![builtin::int(sp())]),
            vec![
                Expr::prim(sp(), Primitive::Int(1)),
                Expr::prim(sp(), Primitive::Int(2)),
            ],
        );
        let program = Program {
            blocks: vec![
                eq_class(),
                Block::Instances(vec![eq_int()]),
                defs(vec![ValueDef {
                    span: sp(),
                    vars: vec![],
                    predicates: vec![],
                    name: ValueName::new("g"),
                    ty: builtin::bool(sp()),
                    body,
                }]),
            ],
        };
        let out = elaborate_program(&program).unwrap();
        let g = find_def(&out, "g");
        let mut callee = &g.body;
        let mut args = Vec::new();
        while let ExprKind::App(f, arg) = &callee.kind {
            args.push(arg);
            callee = f;
        }
        // innermost application: eq [int] inst_dict_Eq_int
        assert!(matches!(&callee.kind, ExprKind::Var(n, _) if *n == ValueName::new("eq")));
        assert_eq!(
            args.last().unwrap().kind,
            ExprKind::Var(ValueName::new("inst_dict_Eq_int"), vec![])
        );
    }

    #[test]
    fn overloaded_symbols_cannot_be_rebound() {
        let program = Program {
            blocks: vec![
                eq_class(),
                defs(vec![ValueDef {
                    span: sp(),
                    vars: vec![],
                    predicates: vec![],
                    name: ValueName::new("eq"),
                    ty: builtin::int(sp()),
                    body: Expr::prim(sp(), Primitive::Int(3)),
                }]),
            ],
        };
        let err = elaborate_program(&program).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::OverloadedSymbolCannotBeBound(ValueName::new("eq"))
        );
    }

    #[test]
    fn duplicate_instances_overlap() {
        let program = Program {
            blocks: vec![
                eq_class(),
                Block::Instances(vec![eq_int()]),
                Block::Instances(vec![eq_int()]),
            ],
        };
        let err = elaborate_program(&program).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::OverlappingInstances(_, _)));
    }

    #[test]
    fn empty_record_construction_is_rejected() {
        let program = Program {
            blocks: vec![defs(vec![ValueDef {
                span: sp(),
                vars: vec![],
                predicates: vec![],
                name: ValueName::new("it"),
                ty: builtin::int(sp()),
                body: Expr::new(
                    sp(),
                    ExprKind::Record(TypeConName::new("point"), vec![], vec![]),
                ),
            }])],
        };
        let err = elaborate_program(&program).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidRecordInstantiation(_)));
    }

    #[test]
    fn matches_without_branches_are_rejected() {
        let program = Program {
            blocks: vec![defs(vec![ValueDef {
                span: sp(),
                vars: vec![],
                predicates: vec![],
                name: ValueName::new("it"),
                ty: builtin::int(sp()),
                body: Expr::new(
                    sp(),
                    ExprKind::Match(Box::new(Expr::prim(sp(), Primitive::Int(0))), vec![]),
                ),
            }])],
        };
        let err = elaborate_program(&program).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MatchWithoutBranches);
    }

    #[test]
    fn related_predicates_cannot_share_a_context() {
        let program = Program {
            blocks: vec![
                eq_class(),
                ord_class(),
                defs(vec![ValueDef {
                    span: sp(),
                    vars: vec![a()],
                    predicates: vec![
                        ClassPredicate::new(TypeConName::new("Eq"), a()),
                        ClassPredicate::new(TypeConName::new("Ord"), a()),
                    ],
                    name: ValueName::new("f"),
                    ty: builtin::bool(sp()),
                    body: Expr::prim(sp(), Primitive::Bool(true)),
                }]),
            ],
        };
        let err = elaborate_program(&program).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::TheseTwoClassesMustNotBeInTheSameContext(_, _)
        ));
    }

    #[test]
    fn superclass_dictionaries_see_only_preceding_instances() {
        // Ord int before Eq int in the same group: the Ord dictionary's
        // superclass field cannot be filled yet
        let program = Program {
            blocks: vec![
                eq_class(),
                ord_class(),
                Block::Instances(vec![ord_int(), eq_int()]),
            ],
        };
        let err = elaborate_program(&program).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnresolvedOverloading(_, _)));

        // with Eq int first the group elaborates
        let program = Program {
            blocks: vec![
                eq_class(),
                ord_class(),
                Block::Instances(vec![eq_int(), ord_int()]),
            ],
        };
        assert!(elaborate_program(&program).is_ok());
    }

    #[test]
    fn instance_groups_are_mutually_visible() {
        use lyre_ast::defs::{ConstructorDef, TypeDefBody as Body, TypeDefinition};
        let bx = TypeConName::new("box");
        let types = Block::Types(vec![TypeDefinition {
            span: sp(),
            name: bx,
            params: vec![],
            body: Body::Sum(vec![ConstructorDef {
                span: sp(),
                name: LabelName::new("Box"),
                args: vec![builtin::int(sp())],
            }]),
        }]);
        // eq at box compares through eq at int, which sits later in the
        // same group
        let b1 = ValueName::new("b1");
        let b2 = ValueName::new("b2");
        let box_ty = Type::con(sp(), bx);
        let eq_box_body = Expr::lambda(
            sp(),
            b1,
            box_ty.clone(),
            Expr::lambda(
                sp(),
                b2,
                box_ty.clone(),
                Expr::apps(
                    sp(),
                    Expr::var(sp(), ValueName::new("eq"), vec![builtin::int(sp())]),
                    vec![
                        Expr::prim(sp(), Primitive::Int(1)),
                        Expr::prim(sp(), Primitive::Int(2)),
                    ],
                ),
            ),
        );
        let eq_box = InstanceDefinition {
            head: InstanceHead {
                span: sp(),
                class: TypeConName::new("Eq"),
                head: bx,
                params: vec![],
                context: vec![],
            },
            members: vec![MemberDef {
                span: sp(),
                name: LabelName::new("eq"),
                body: eq_box_body,
            }],
        };

        let recursive = Program {
            blocks: vec![
                types.clone(),
                eq_class(),
                Block::Instances(vec![eq_box.clone(), eq_int()]),
            ],
        };
        assert!(elaborate_program(&recursive).is_ok());

        // split into separate groups the later instance is out of reach
        let split = Program {
            blocks: vec![
                types,
                eq_class(),
                Block::Instances(vec![eq_box]),
                Block::Instances(vec![eq_int()]),
            ],
        };
        let err = elaborate_program(&split).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnresolvedOverloading(_, _)));
    }

    #[test]
    fn elaboration_is_idempotent_on_class_free_programs() {
        let program = Program {
            blocks: vec![
                eq_class(),
                Block::Instances(vec![eq_int()]),
                ord_class(),
                Block::Instances(vec![ord_int()]),
            ],
        };
        let once = elaborate_program(&program).unwrap();
        let twice = elaborate_program(&once).unwrap();
        assert_eq!(once, twice);
    }
}
