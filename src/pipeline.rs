//! The midend pipeline engine.
//!
//! A pipeline is a fixed, ordered list of steps chosen once from the source
//! dialect; the two dialect branches converge on a shared lowering tail.
//! Each transform step declares its effects on the two analysis maps, the
//! engine invalidates what a step declares stale after running it, and the
//! whole sequence is verified against those declarations at construction
//! time, before any pass runs.
//!
//! Two ways out, and only two: a check step can stop the run early (a normal
//! outcome, the tree so far is returned untouched), and a fatal error aborts
//! it (nothing is returned, no pass is retried, there is no rollback).

use crate::{
    context::AnalysisContext,
    error::{CompileError, PipelineError},
    evaluator::{evaluate, ToplevelGraph},
    ir::Program,
    passes::{
        const_fold::{constant_folding, strength_reduction},
        convert_enums::convert_enums,
        dead_code::remove_unused_declarations,
        declarations::{move_declarations, unique_names},
        inline::{run_two_phase, InlineStrategy},
        lower::{lower_expressions, remove_left_slices},
        simplify::{simplify_control_flow, simplify_expressions, simplify_parsers},
        type_check::{run_resolve_references, run_type_checking},
    },
    policy::{policy_for_target, EnumRepresentationPolicy},
    source::SourceMap,
};

/// Which surface language the front end parsed. Chosen once per run; there
/// is no re-branching mid-pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Legacy,
    Modern,
}

#[derive(Debug, Clone)]
pub struct MidendOptions {
    pub dialect: Dialect,
    pub target: String,
}

impl Default for MidendOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Modern,
            target: "softswitch".into(),
        }
    }
}

/// A transform step. The variant name doubles as the step name in logs,
/// error tags, and the executed trace.
#[derive(strum::IntoStaticStr)]
pub enum Pass {
    ResolveReferences,
    TypeChecking,
    SimplifyParsers,
    ConvertEnums(Box<dyn EnumRepresentationPolicy>),
    UniqueNames,
    MoveDeclarations,
    SimplifyExpressions,
    SimplifyControlFlow,
    InlineControls,
    InlineActions,
    RemoveUnusedDeclarations,
    ConstantFolding,
    StrengthReduction,
    RemoveLeftSlices,
    LowerExpressions,
    Evaluate,
}

/// A non-transforming gate between passes
#[derive(Debug, Clone, Copy)]
pub enum Check {
    /// Stops the run (normally, not fatally) when the freshly evaluated
    /// toplevel graph has no `main` instance: library inputs are type
    /// checked and cleaned up but never lowered.
    RequireEntryPoint,
}

pub enum Step {
    Transform(Pass),
    Check(Check),
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Transform(pass) => pass.into(),
            Step::Check(Check::RequireEntryPoint) => "RequireEntryPoint",
        }
    }
}

/// What a pass does to the two analysis maps. Builders install inside their
/// run; clears are applied by the engine after the run returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct Effects {
    pub reads_references: bool,
    pub reads_types: bool,
    pub builds_references: bool,
    pub builds_types: bool,
    pub clears_references: bool,
    pub clears_types: bool,
}

impl Pass {
    pub fn effects(&self) -> Effects {
        let mut effects = Effects::default();
        match self {
            Pass::ResolveReferences => {
                effects.builds_references = true;
            }
            Pass::TypeChecking => {
                effects.builds_references = true;
                effects.builds_types = true;
            }
            // Drops whole states, so use entries can dangle
            Pass::SimplifyParsers => {
                effects.clears_references = true;
                effects.clears_types = true;
            }
            Pass::ConvertEnums(_) => {
                effects.reads_references = true;
                effects.clears_references = true;
                effects.clears_types = true;
            }
            // Renaming and reordering keep every node id stable
            Pass::UniqueNames => {
                effects.reads_references = true;
            }
            Pass::MoveDeclarations => {}
            Pass::SimplifyExpressions => {
                effects.clears_types = true;
            }
            Pass::SimplifyControlFlow => {
                effects.clears_references = true;
                effects.clears_types = true;
            }
            // Discover reads the reference map; apply splices re-identified
            // clones that neither map has entries for
            Pass::InlineControls | Pass::InlineActions => {
                effects.reads_references = true;
                effects.clears_references = true;
                effects.clears_types = true;
            }
            Pass::RemoveUnusedDeclarations => {
                effects.reads_references = true;
                effects.clears_references = true;
                effects.clears_types = true;
            }
            Pass::ConstantFolding => {
                effects.reads_references = true;
                effects.clears_references = true;
                effects.clears_types = true;
            }
            Pass::StrengthReduction => {
                effects.clears_types = true;
            }
            Pass::RemoveLeftSlices => {
                effects.reads_types = true;
                effects.clears_references = true;
                effects.clears_types = true;
            }
            // Only wraps existing reads in shifts and casts; identifiers
            // keep their ids, so the reference map survives
            Pass::LowerExpressions => {
                effects.reads_types = true;
                effects.clears_types = true;
            }
            Pass::Evaluate => {}
        }
        effects
    }
}

fn legacy_steps() -> Vec<Step> {
    use Pass::*;
    vec![
        Step::Transform(TypeChecking),
        Step::Transform(InlineControls),
        Step::Transform(ResolveReferences),
        Step::Transform(RemoveUnusedDeclarations),
        Step::Transform(TypeChecking),
        Step::Transform(InlineActions),
        Step::Transform(ResolveReferences),
        Step::Transform(RemoveUnusedDeclarations),
    ]
}

fn modern_steps(target: &str) -> Vec<Step> {
    use Pass::*;
    vec![
        Step::Transform(ResolveReferences),
        Step::Transform(SimplifyParsers),
        Step::Transform(ResolveReferences),
        Step::Transform(ConvertEnums(policy_for_target(target))),
        Step::Transform(ResolveReferences),
        Step::Transform(UniqueNames),
        Step::Transform(MoveDeclarations),
        Step::Transform(SimplifyExpressions),
        Step::Transform(RemoveUnusedDeclarations),
        Step::Transform(Evaluate),
        Step::Check(Check::RequireEntryPoint),
        Step::Transform(ResolveReferences),
        Step::Transform(InlineControls),
        Step::Transform(ResolveReferences),
        Step::Transform(InlineActions),
        Step::Transform(ResolveReferences),
        Step::Transform(RemoveUnusedDeclarations),
        Step::Transform(ResolveReferences),
        Step::Transform(ConstantFolding),
        Step::Transform(StrengthReduction),
        Step::Transform(MoveDeclarations),
    ]
}

fn shared_tail() -> Vec<Step> {
    use Pass::*;
    vec![
        Step::Transform(SimplifyControlFlow),
        Step::Transform(TypeChecking),
        Step::Transform(RemoveLeftSlices),
        Step::Transform(TypeChecking),
        Step::Transform(LowerExpressions),
        Step::Transform(ConstantFolding),
        Step::Transform(Evaluate),
    ]
}

fn steps_for(options: &MidendOptions) -> Vec<Step> {
    let mut steps = match options.dialect {
        Dialect::Legacy => legacy_steps(),
        Dialect::Modern => modern_steps(&options.target),
    };
    steps.extend(shared_tail());
    steps
}

/// Simulates the declared effects over the step list and asserts every read
/// is covered by a prior build. A violation here is a bug in the sequence
/// definition, caught before any pass touches a tree.
fn verify_step_order(steps: &[Step]) {
    let mut references = false;
    let mut types = false;
    let mut just_evaluated = false;

    for step in steps {
        match step {
            Step::Transform(pass) => {
                let name: &'static str = pass.into();
                let effects = pass.effects();
                assert!(
                    references || !effects.reads_references,
                    "step `{name}` reads the reference map but no prior step builds it"
                );
                assert!(
                    types || !effects.reads_types,
                    "step `{name}` reads the type map but no prior step builds it"
                );
                if effects.builds_references {
                    references = true;
                }
                if effects.builds_types {
                    types = true;
                }
                if effects.clears_references {
                    references = false;
                }
                if effects.clears_types {
                    types = false;
                }
                just_evaluated = matches!(pass, Pass::Evaluate);
            }
            Step::Check(Check::RequireEntryPoint) => {
                assert!(
                    just_evaluated,
                    "the entry-point check must directly follow an evaluation"
                );
            }
        }
    }

    assert!(
        matches!(steps.last(), Some(Step::Transform(Pass::Evaluate))),
        "step sequences must end with the final evaluation"
    );
}

/// The run outcome. `Halted` is success too: a check decided the remaining
/// steps do not apply to this input.
#[derive(Debug)]
pub enum MidendOutput {
    Lowered {
        program: Program,
        toplevel: ToplevelGraph,
    },
    Halted {
        program: Program,
    },
}

/// The engine. Built once per compilation run; `run` consumes the step list,
/// so an engine drives exactly one program through.
pub struct Midend<'a> {
    steps: Vec<Step>,
    context: AnalysisContext,
    sources: &'a SourceMap,
    toplevel: Option<ToplevelGraph>,
    executed: Vec<&'static str>,
}

impl<'a> Midend<'a> {
    pub fn new(options: MidendOptions, sources: &'a SourceMap) -> Self {
        let steps = steps_for(&options);
        verify_step_order(&steps);

        Self {
            steps,
            context: AnalysisContext::new(),
            sources,
            toplevel: None,
            executed: Vec::new(),
        }
    }

    /// The step names this engine will run, in order
    pub fn planned(&self) -> Vec<&'static str> {
        self.steps.iter().map(Step::name).collect()
    }

    /// The step names that actually ran, including the check that halted
    /// the run, if one did
    pub fn executed(&self) -> &[&'static str] {
        &self.executed
    }

    pub fn run(&mut self, mut program: Program) -> Result<MidendOutput, PipelineError> {
        let steps = std::mem::take(&mut self.steps);

        for step in steps {
            let name = step.name();
            self.executed.push(name);

            match step {
                Step::Transform(pass) => {
                    log::debug!("running {name}");
                    program = self
                        .run_pass(pass, program)
                        .map_err(|error| PipelineError { pass: name, error })?;
                }
                Step::Check(Check::RequireEntryPoint) => {
                    let satisfied = self
                        .toplevel
                        .as_ref()
                        .is_some_and(ToplevelGraph::has_entry_point);
                    if !satisfied {
                        log::debug!("no entry point instance, stopping after {name}");
                        return Ok(MidendOutput::Halted { program });
                    }
                }
            }
        }

        let toplevel = self
            .toplevel
            .take()
            .expect("verified step sequences end with an evaluation");
        Ok(MidendOutput::Lowered { program, toplevel })
    }

    fn run_pass(&mut self, pass: Pass, program: Program) -> Result<Program, CompileError> {
        let effects = pass.effects();

        let program = match pass {
            Pass::ResolveReferences => {
                run_resolve_references(&program, &mut self.context)?;
                program
            }
            Pass::TypeChecking => {
                run_type_checking(&program, &mut self.context)?;
                program
            }
            Pass::SimplifyParsers => simplify_parsers(program),
            Pass::ConvertEnums(policy) => {
                convert_enums(program, &self.context, policy.as_ref(), self.sources)
            }
            Pass::UniqueNames => unique_names(program, &self.context),
            Pass::MoveDeclarations => move_declarations(program),
            Pass::SimplifyExpressions => simplify_expressions(program),
            Pass::SimplifyControlFlow => simplify_control_flow(program),
            Pass::InlineControls => run_two_phase(program, &self.context, InlineStrategy::Controls),
            Pass::InlineActions => run_two_phase(program, &self.context, InlineStrategy::Actions),
            Pass::RemoveUnusedDeclarations => remove_unused_declarations(program, &self.context),
            Pass::ConstantFolding => constant_folding(program, &self.context),
            Pass::StrengthReduction => strength_reduction(program),
            Pass::RemoveLeftSlices => remove_left_slices(program, &self.context),
            Pass::LowerExpressions => lower_expressions(program, &self.context),
            Pass::Evaluate => {
                // Mid-pipeline runs feed the entry-point check; the final
                // run is the definitive graph handed to the back end
                self.toplevel = Some(evaluate(&program)?);
                program
            }
        };

        if effects.clears_references {
            self.context.invalidate_references();
        }
        if effects.clears_types {
            self.context.invalidate_types();
        }

        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{build::TreeBuilder, print::dump_program, Program};
    use indoc::indoc;

    fn deployed_program(sources: &mut SourceMap) -> Program {
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let target = b.name("x");
            let value = b.int_with_width(5, 8);
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let x_ty = b.bits(8);
        let x = b.parameter("x", x_ty);
        let ingress = b.control("ingress", vec![x], vec![], body);
        let main = b.instance("main", "ingress", vec![]);
        b.finish(vec![ingress, main])
    }

    #[test]
    fn legacy_step_sequence() {
        let sources = SourceMap::new();
        let midend = Midend::new(
            MidendOptions {
                dialect: Dialect::Legacy,
                target: "softswitch".into(),
            },
            &sources,
        );

        let expected = indoc! {"
            TypeChecking
            InlineControls
            ResolveReferences
            RemoveUnusedDeclarations
            TypeChecking
            InlineActions
            ResolveReferences
            RemoveUnusedDeclarations
            SimplifyControlFlow
            TypeChecking
            RemoveLeftSlices
            TypeChecking
            LowerExpressions
            ConstantFolding
            Evaluate"};
        assert_eq!(midend.planned().join("\n"), expected);
    }

    #[test]
    fn modern_step_sequence() {
        let sources = SourceMap::new();
        let midend = Midend::new(MidendOptions::default(), &sources);

        let expected = indoc! {"
            ResolveReferences
            SimplifyParsers
            ResolveReferences
            ConvertEnums
            ResolveReferences
            UniqueNames
            MoveDeclarations
            SimplifyExpressions
            RemoveUnusedDeclarations
            Evaluate
            RequireEntryPoint
            ResolveReferences
            InlineControls
            ResolveReferences
            InlineActions
            ResolveReferences
            RemoveUnusedDeclarations
            ResolveReferences
            ConstantFolding
            StrengthReduction
            MoveDeclarations
            SimplifyControlFlow
            TypeChecking
            RemoveLeftSlices
            TypeChecking
            LowerExpressions
            ConstantFolding
            Evaluate"};
        assert_eq!(midend.planned().join("\n"), expected);
    }

    #[test]
    #[should_panic(expected = "reads the reference map")]
    fn read_before_build_is_rejected() {
        verify_step_order(&[
            Step::Transform(Pass::UniqueNames),
            Step::Transform(Pass::Evaluate),
        ]);
    }

    #[test]
    #[should_panic(expected = "directly follow an evaluation")]
    fn unanchored_entry_point_check_is_rejected() {
        verify_step_order(&[
            Step::Transform(Pass::ResolveReferences),
            Step::Check(Check::RequireEntryPoint),
            Step::Transform(Pass::Evaluate),
        ]);
    }

    #[test]
    fn modern_run_lowers_a_deployed_program() {
        let mut sources = SourceMap::new();
        let program = deployed_program(&mut sources);

        let mut midend = Midend::new(MidendOptions::default(), &sources);
        let output = midend.run(program).unwrap();

        let MidendOutput::Lowered { toplevel, .. } = output else {
            panic!("expected a lowered program");
        };
        assert!(toplevel.has_entry_point());
        assert_eq!(midend.executed().last(), Some(&"Evaluate"));
    }

    #[test]
    fn legacy_run_lowers_a_deployed_program() {
        let mut sources = SourceMap::new();
        let program = deployed_program(&mut sources);

        let mut midend = Midend::new(
            MidendOptions {
                dialect: Dialect::Legacy,
                target: "softswitch".into(),
            },
            &sources,
        );
        let output = midend.run(program).unwrap();
        assert!(matches!(output, MidendOutput::Lowered { .. }));
    }

    #[test]
    fn library_programs_halt_at_the_entry_point_check() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = b.block(vec![]);
        let lib = b.control("lib", vec![], vec![], body);
        let program = b.finish(vec![lib]);
        let reference = dump_program(&program);

        let mut midend = Midend::new(MidendOptions::default(), &sources);
        let output = midend.run(program).unwrap();

        let MidendOutput::Halted { program } = output else {
            panic!("expected an early stop");
        };
        // The check is the last thing that ran and the lowering passes
        // never saw the tree
        assert_eq!(midend.executed().last(), Some(&"RequireEntryPoint"));
        assert!(!midend.executed().contains(&"InlineControls"));
        assert_eq!(dump_program(&program), reference);
    }

    #[test]
    fn fatal_errors_carry_the_step_name() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let call = b.call("missing", vec![]);
            b.block(vec![call])
        };
        let broken = b.control("broken", vec![], vec![], body);
        let program = b.finish(vec![broken]);

        let mut midend = Midend::new(MidendOptions::default(), &sources);
        let error = midend.run(program).unwrap_err();
        assert_eq!(error.pass, "ResolveReferences");
    }
}
