//! The two-phase inlining protocol: discover candidates under one tree
//! snapshot, then apply the substitutions.
//!
//! Discover performs a single forward pass over the toplevel declarations,
//! growing a catalog of inline-eligible targets as it goes. A call site is a
//! candidate only if its target is already in the catalog when the site is
//! visited, so later declarations can benefit from earlier discoveries but a
//! conclusion is never revisited — there is no fixpoint loop, and call sites
//! that inlining itself creates are left alone until some later compilation
//! round (deliberately: see the one-round tests).
//!
//! Apply consumes the worklist exactly once, in discovery order. Candidates
//! address call sites by node id, which stays valid because apply runs
//! immediately after discover with no structural pass in between. Every
//! substitution splices in a freshly re-identified copy of the target body
//! with parameters replaced by the call arguments and any hoisted locals
//! uniquely renamed. The type map is stale after any apply; the engine
//! invalidates it as part of the step's declared effects.

use crate::{
    context::AnalysisContext,
    intern::Symbol,
    ir::{
        Block, Declaration, DeclarationKind, Expression, ExpressionKind, Identifier, NodeId,
        Program, Statement, StatementKind,
    },
};

/// A discovered call site and the declaration to splice into it
#[derive(Debug, Clone, Copy)]
pub struct InlineCandidate {
    /// The `Call` statement to replace
    pub call_site: NodeId,
    /// The toplevel declaration the call site lives in
    pub caller: NodeId,
    /// The declaration being inlined
    pub callee: NodeId,
}

/// Worklist produced by [`discover`], valid only against the tree snapshot
/// it was built under, and consumed exactly once by [`apply`].
#[derive(Debug)]
pub struct InlineWorklist {
    pub strategy: InlineStrategy,
    pub candidates: Vec<InlineCandidate>,
}

/// Which declaration kind a discover/apply pair targets. Control inlining
/// hoists the callee's local declarations into the caller; action inlining
/// has no locals to hoist and substitutes the body alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
pub enum InlineStrategy {
    Controls,
    Actions,
}

impl InlineStrategy {
    fn eligible(self, declaration: &Declaration) -> bool {
        match self {
            InlineStrategy::Controls => {
                matches!(declaration.kind, DeclarationKind::Control(_))
            }
            InlineStrategy::Actions => matches!(declaration.kind, DeclarationKind::Action(_)),
        }
    }
}

/// Discover phase: one forward pass, incremental catalog, no fixpoint
pub fn discover(
    program: &Program,
    context: &AnalysisContext,
    strategy: InlineStrategy,
) -> InlineWorklist {
    let mut catalog = hashbrown::HashSet::new();
    let mut candidates = Vec::new();

    for declaration in &program.declarations {
        if strategy.eligible(declaration) {
            catalog.insert(declaration.id);
        }

        if let DeclarationKind::Control(control) = &declaration.kind {
            // A control's local declarations are only referable from inside
            // the control itself, so they all enter the catalog before its
            // bodies are scanned
            for local in &control.locals {
                if strategy.eligible(local) {
                    catalog.insert(local.id);
                }
            }

            for local in &control.locals {
                if let DeclarationKind::Action(action) = &local.kind {
                    scan_block(
                        &action.body,
                        declaration.id,
                        context,
                        &catalog,
                        &mut candidates,
                    );
                }
            }
            scan_block(
                &control.body,
                declaration.id,
                context,
                &catalog,
                &mut candidates,
            );
        }
    }

    log::debug!(
        "discovered {} {} inline candidate(s)",
        candidates.len(),
        <&'static str>::from(strategy)
    );

    InlineWorklist {
        strategy,
        candidates,
    }
}

fn scan_block(
    block: &Block,
    caller: NodeId,
    context: &AnalysisContext,
    catalog: &hashbrown::HashSet<NodeId>,
    candidates: &mut Vec<InlineCandidate>,
) {
    for statement in &block.statements {
        match &statement.kind {
            StatementKind::Call { callee, .. } => {
                let Some(target) = context.resolve(callee.id) else {
                    continue;
                };
                // Self-recursion is never inlined
                if catalog.contains(&target) && target != caller {
                    candidates.push(InlineCandidate {
                        call_site: statement.id,
                        caller,
                        callee: target,
                    });
                }
            }
            StatementKind::If {
                then_block,
                else_block,
                ..
            } => {
                scan_block(then_block, caller, context, catalog, candidates);
                if let Some(else_block) = else_block {
                    scan_block(else_block, caller, context, catalog, candidates);
                }
            }
            StatementKind::Block(nested) => {
                scan_block(nested, caller, context, catalog, candidates)
            }
            StatementKind::Assign { .. } | StatementKind::Empty => {}
        }
    }
}

/// Apply phase: consumes the worklist, rewriting each call site in
/// discovery order.
pub fn apply(mut program: Program, worklist: InlineWorklist) -> Program {
    let strategy = worklist.strategy;
    let total = worklist.candidates.len();

    for (round, candidate) in worklist.candidates.into_iter().enumerate() {
        substitute(&mut program, candidate, round);
    }

    if total > 0 {
        log::debug!(
            "applied {total} {} inline substitution(s)",
            <&'static str>::from(strategy)
        );
    }

    program
}

/// Convenience wrapper running both phases back to back, which is the only
/// pairing the pipeline ever uses.
pub fn run_two_phase(
    program: Program,
    context: &AnalysisContext,
    strategy: InlineStrategy,
) -> Program {
    let worklist = discover(&program, context, strategy);
    apply(program, worklist)
}

fn substitute(program: &mut Program, candidate: InlineCandidate, round: usize) {
    // Clone the callee out first; the caller is mutated below
    let callee = find_declaration(program, candidate.callee)
        .cloned()
        .expect("worklist entries must stay addressable until applied");

    let (parameters, body, callee_locals) = match &callee.kind {
        DeclarationKind::Control(control) => (
            control.parameters.clone(),
            control.body.clone(),
            control.locals.clone(),
        ),
        DeclarationKind::Action(action) => {
            (action.parameters.clone(), action.body.clone(), Vec::new())
        }
        _ => unreachable!("discover only catalogs controls and actions"),
    };

    // Pull the call arguments out of the site before replacing it
    let arguments = take_call_arguments(program, candidate);

    let mut rewriter = Rewriter {
        substitutions: hashbrown::HashMap::new(),
    };

    for (parameter, argument) in parameters.iter().zip(arguments) {
        rewriter
            .substitutions
            .insert(parameter.name.symbol, Substitution::Argument(argument));
    }

    // Hoist the callee's locals under fresh names so repeated inlining of
    // the same callee cannot collide
    let mut hoisted = Vec::with_capacity(callee_locals.len());
    for local in callee_locals {
        let fresh = Symbol::new(&format!(
            "{}_{}_{}",
            callee.name.symbol, local.name.symbol, round
        ));
        rewriter
            .substitutions
            .insert(local.name.symbol, Substitution::Rename(fresh));
        hoisted.push((local, fresh));
    }

    let mut inlined = body;
    rewriter.refresh_block(&mut inlined, program);

    for (mut local, fresh) in hoisted {
        local.name.symbol = fresh;
        rewriter.refresh_declaration(&mut local, program);
        let caller = program
            .declaration_mut(candidate.caller)
            .expect("caller declaration must outlive the worklist");
        let DeclarationKind::Control(control) = &mut caller.kind else {
            unreachable!("call sites only occur inside controls");
        };
        control.locals.push(local);
    }

    let caller = program
        .declaration_mut(candidate.caller)
        .expect("caller declaration must outlive the worklist");
    let replaced = replace_statement(caller, candidate.call_site, StatementKind::Block(inlined));
    debug_assert!(replaced, "call site vanished before apply consumed it");
}

enum Substitution {
    /// Parameter use replaced by the call argument
    Argument(Expression),
    /// Hoisted local referenced under its fresh name
    Rename(Symbol),
}

struct Rewriter {
    substitutions: hashbrown::HashMap<Symbol, Substitution>,
}

impl Rewriter {
    fn refresh_declaration(&mut self, declaration: &mut Declaration, program: &mut Program) {
        declaration.id = program.fresh_id();
        declaration.name.id = program.fresh_id();

        match &mut declaration.kind {
            DeclarationKind::Action(action) => {
                for parameter in &mut action.parameters {
                    parameter.id = program.fresh_id();
                    parameter.name.id = program.fresh_id();
                    parameter.ty.id = program.fresh_id();
                }
                self.refresh_block(&mut action.body, program);
            }
            DeclarationKind::Constant(constant) => {
                constant.ty.id = program.fresh_id();
                self.refresh_expression(&mut constant.value, program);
            }
            _ => {}
        }
    }

    fn refresh_block(&mut self, block: &mut Block, program: &mut Program) {
        block.id = program.fresh_id();
        for statement in &mut block.statements {
            self.refresh_statement(statement, program);
        }
    }

    fn refresh_statement(&mut self, statement: &mut Statement, program: &mut Program) {
        statement.id = program.fresh_id();

        match &mut statement.kind {
            StatementKind::Assign { target, value } => {
                self.refresh_expression(target, program);
                self.refresh_expression(value, program);
            }
            StatementKind::Call { callee, arguments } => {
                self.refresh_identifier(callee, program);
                for argument in arguments {
                    self.refresh_expression(argument, program);
                }
            }
            StatementKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.refresh_expression(condition, program);
                self.refresh_block(then_block, program);
                if let Some(else_block) = else_block {
                    self.refresh_block(else_block, program);
                }
            }
            StatementKind::Block(block) => self.refresh_block(block, program),
            StatementKind::Empty => {}
        }
    }

    fn refresh_expression(&mut self, expression: &mut Expression, program: &mut Program) {
        expression.id = program.fresh_id();

        match &mut expression.kind {
            ExpressionKind::Name(name) => {
                if let Some(Substitution::Argument(argument)) = self.substitutions.get(&name.symbol)
                {
                    let mut replacement = argument.clone();
                    refresh_ids_only(&mut replacement, program);
                    *expression = replacement;
                    return;
                }
                self.refresh_identifier(name, program);
            }
            ExpressionKind::Member { base, member } => {
                self.refresh_identifier(base, program);
                member.id = program.fresh_id();
            }
            ExpressionKind::IntLiteral { .. } | ExpressionKind::BoolLiteral(_) => {}
            ExpressionKind::Unary { operand, .. } => self.refresh_expression(operand, program),
            ExpressionKind::Binary { lhs, rhs, .. } => {
                self.refresh_expression(lhs, program);
                self.refresh_expression(rhs, program);
            }
            ExpressionKind::Slice { base, .. } => self.refresh_expression(base, program),
            ExpressionKind::Cast { operand, .. } => self.refresh_expression(operand, program),
        }
    }

    fn refresh_identifier(&mut self, identifier: &mut Identifier, program: &mut Program) {
        identifier.id = program.fresh_id();
        if let Some(Substitution::Rename(fresh)) = self.substitutions.get(&identifier.symbol) {
            identifier.symbol = *fresh;
        }
    }
}

/// Re-identify a cloned argument expression without applying substitutions:
/// arguments come from the caller's scope, where the callee's names mean
/// nothing.
fn refresh_ids_only(expression: &mut Expression, program: &mut Program) {
    expression.id = program.fresh_id();
    match &mut expression.kind {
        ExpressionKind::Name(name) => name.id = program.fresh_id(),
        ExpressionKind::Member { base, member } => {
            base.id = program.fresh_id();
            member.id = program.fresh_id();
        }
        ExpressionKind::IntLiteral { .. } | ExpressionKind::BoolLiteral(_) => {}
        ExpressionKind::Unary { operand, .. } => refresh_ids_only(operand, program),
        ExpressionKind::Binary { lhs, rhs, .. } => {
            refresh_ids_only(lhs, program);
            refresh_ids_only(rhs, program);
        }
        ExpressionKind::Slice { base, .. } => refresh_ids_only(base, program),
        ExpressionKind::Cast { operand, .. } => refresh_ids_only(operand, program),
    }
}

fn find_declaration(program: &Program, id: NodeId) -> Option<&Declaration> {
    for declaration in &program.declarations {
        if declaration.id == id {
            return Some(declaration);
        }
        if let DeclarationKind::Control(control) = &declaration.kind {
            if let Some(local) = control.locals.iter().find(|l| l.id == id) {
                return Some(local);
            }
        }
    }
    None
}

fn take_call_arguments(program: &mut Program, candidate: InlineCandidate) -> Vec<Expression> {
    let caller = program
        .declaration_mut(candidate.caller)
        .expect("caller declaration must outlive the worklist");

    let statement = find_statement_mut(caller, candidate.call_site)
        .expect("worklist entries must stay addressable until applied");

    match &mut statement.kind {
        StatementKind::Call { arguments, .. } => std::mem::take(arguments),
        _ => unreachable!("discovered call sites are Call statements"),
    }
}

fn find_statement_mut(declaration: &mut Declaration, id: NodeId) -> Option<&mut Statement> {
    let DeclarationKind::Control(control) = &mut declaration.kind else {
        return None;
    };

    for local in &mut control.locals {
        if let DeclarationKind::Action(action) = &mut local.kind {
            if let Some(found) = find_statement_in_block(&mut action.body, id) {
                return Some(found);
            }
        }
    }

    find_statement_in_block(&mut control.body, id)
}

fn find_statement_in_block(block: &mut Block, id: NodeId) -> Option<&mut Statement> {
    for statement in &mut block.statements {
        if statement.id == id {
            return Some(statement);
        }
        match &mut statement.kind {
            StatementKind::If {
                then_block,
                else_block,
                ..
            } => {
                if let Some(found) = find_statement_in_block(then_block, id) {
                    return Some(found);
                }
                if let Some(else_block) = else_block {
                    if let Some(found) = find_statement_in_block(else_block, id) {
                        return Some(found);
                    }
                }
            }
            StatementKind::Block(nested) => {
                if let Some(found) = find_statement_in_block(nested, id) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn replace_statement(declaration: &mut Declaration, id: NodeId, replacement: StatementKind) -> bool {
    match find_statement_mut(declaration, id) {
        Some(statement) => {
            statement.kind = replacement;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{build::TreeBuilder, print::dump_program},
        passes::type_check::run_resolve_references,
        source::SourceMap,
    };

    fn resolved(program: &Program) -> AnalysisContext {
        let mut context = AnalysisContext::new();
        run_resolve_references(program, &mut context).unwrap();
        context
    }

    /// Two controls that never reference each other: the worklist is empty
    /// and apply leaves the tree untouched.
    #[test]
    fn independent_controls_are_a_no_op() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body_a = b.block(vec![]);
        let a = b.control("ingress", vec![], vec![], body_a);
        let body_b = b.block(vec![]);
        let b2 = b.control("egress", vec![], vec![], body_b);
        let program = b.finish(vec![a, b2]);

        let context = resolved(&program);
        let before = dump_program(&program);

        let worklist = discover(&program, &context, InlineStrategy::Controls);
        assert!(worklist.candidates.is_empty());

        let program = apply(program, worklist);
        assert_eq!(dump_program(&program), before);
    }

    /// The catalog grows during the forward pass: a call to a control that
    /// is declared later is not discovered, the same call after the
    /// declaration is.
    #[test]
    fn catalog_is_built_forward_only() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body_a = {
            let call = b.call("helper", vec![]);
            b.block(vec![call])
        };
        let a = b.control("early", vec![], vec![], body_a);
        let helper_body = b.block(vec![]);
        let helper = b.control("helper", vec![], vec![], helper_body);
        let body_c = {
            let call = b.call("helper", vec![]);
            b.block(vec![call])
        };
        let c = b.control("late", vec![], vec![], body_c);
        let program = b.finish(vec![a, helper, c]);

        let context = resolved(&program);
        let worklist = discover(&program, &context, InlineStrategy::Controls);

        let late_id = program.declarations[2].id;
        assert_eq!(worklist.candidates.len(), 1);
        assert_eq!(worklist.candidates[0].caller, late_id);
    }

    #[test]
    fn action_inlining_substitutes_arguments() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let action_body = {
            let target = b.name("x");
            let value = b.name("v");
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let param_ty = b.bits(32);
        let parameter = b.parameter("v", param_ty);
        let action = b.action("set_port", vec![parameter], action_body);

        let control_body = {
            let argument = b.int(42);
            let call = b.call("set_port", vec![argument]);
            b.block(vec![call])
        };
        let port_ty = b.bits(32);
        let port = b.parameter("x", port_ty);
        let control = b.control("ingress", vec![port], vec![action], control_body);
        let program = b.finish(vec![control]);

        let context = resolved(&program);
        let program = run_two_phase(program, &context, InlineStrategy::Actions);

        let dump = dump_program(&program);
        assert!(dump.contains("x = 42;"), "got:\n{dump}");
        assert!(!dump.contains("set_port(42)"), "got:\n{dump}");
    }

    #[test]
    fn control_inlining_hoists_and_renames_locals() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        // inner has a local constant its body reads
        let limit_ty = b.bits(32);
        let limit_value = b.int(7);
        let limit = b.constant("limit", limit_ty, limit_value);
        let inner_body = {
            let target = b.name("y");
            let value = b.name("limit");
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let y_ty = b.bits(32);
        let y = b.parameter("y", y_ty);
        let inner = b.control("inner", vec![y], vec![limit], inner_body);

        let outer_body = {
            let argument = b.name("z");
            let call = b.call("inner", vec![argument]);
            b.block(vec![call])
        };
        let z_ty = b.bits(32);
        let z = b.parameter("z", z_ty);
        let outer = b.control("outer", vec![z], vec![], outer_body);
        let program = b.finish(vec![inner, outer]);

        let context = resolved(&program);
        let program = run_two_phase(program, &context, InlineStrategy::Controls);

        let dump = dump_program(&program);
        assert!(dump.contains("const inner_limit_0"), "got:\n{dump}");
        assert!(dump.contains("z = inner_limit_0;"), "got:\n{dump}");
    }

    /// Inlining one round can expose a new inlinable site; it must be left
    /// alone. Here `relay` calls `sink`, but `sink` is declared after it so
    /// the relay->sink site is never discovered; inlining `relay` into
    /// `front` copies that residual site, and no second round cleans it up.
    #[test]
    fn residual_sites_are_not_re_discovered() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let relay_body = {
            let call = b.call("sink", vec![]);
            b.block(vec![call])
        };
        let relay = b.control("relay", vec![], vec![], relay_body);

        let sink_body = b.block(vec![]);
        let sink = b.control("sink", vec![], vec![], sink_body);

        let front_body = {
            let call = b.call("relay", vec![]);
            b.block(vec![call])
        };
        let front = b.control("front", vec![], vec![], front_body);
        let program = b.finish(vec![relay, sink, front]);

        let context = resolved(&program);
        let worklist = discover(&program, &context, InlineStrategy::Controls);
        assert_eq!(worklist.candidates.len(), 1);

        let program = apply(program, worklist);

        // The copied call to `sink` survives inside `front`
        let dump = dump_program(&program);
        assert!(dump.contains("sink();"), "got:\n{dump}");
    }

    #[test]
    fn worklist_is_consumed_exactly_once() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let helper_body = b.block(vec![]);
        let helper = b.control("helper", vec![], vec![], helper_body);
        let body = {
            let first = b.call("helper", vec![]);
            let second = b.call("helper", vec![]);
            b.block(vec![first, second])
        };
        let caller = b.control("caller", vec![], vec![], body);
        let program = b.finish(vec![helper, caller]);

        let context = resolved(&program);
        let worklist = discover(&program, &context, InlineStrategy::Controls);
        assert_eq!(worklist.candidates.len(), 2);

        // `apply` takes the worklist by value; both sites are rewritten and
        // nothing can replay them afterwards
        let program = apply(program, worklist);
        let dump = dump_program(&program);
        assert!(!dump.contains("helper();"), "got:\n{dump}");
    }
}
