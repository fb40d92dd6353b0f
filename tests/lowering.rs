//! End-to-end pipeline runs over hand-built program trees.

use creekc_midend::{
    intern::Symbol,
    ir::{build::TreeBuilder, print::dump_program, BinaryOperatorKind, Program, Transition},
    pipeline::{Dialect, Midend, MidendOptions, MidendOutput},
    source::SourceMap,
};

/// A deployed program touching most of the modern pipeline: a user enum to
/// convert, a stdlib enum to leave alone, a parser with an orphan state, a
/// local action to inline, a slice write to lower, and a multiplication to
/// strength-reduce.
fn modern_program(sources: &mut SourceMap) -> Program {
    let stdlib = sources.add_file("creek/core.creek", "");
    let user = sources.add_memory("");

    let mut b = TreeBuilder::new(stdlib);
    let verdict_enum = b.enumeration("Verdict", &["pass", "drop"]);

    b.in_source(user);
    let proto_enum = b.enumeration("Proto", &["tcp", "udp"]);

    let to_l2 = b.transition_to("l2");
    let start = b.state("start", vec![], to_l2);
    let l2 = b.state("l2", vec![], Transition::Accept);
    let orphan = b.state("orphan", vec![], Transition::Reject);
    let pkt = b.parser("pkt", vec![], vec![start, l2, orphan]);

    let clear_low = {
        let body = {
            let base = b.name("x");
            let target = b.slice(base, 3, 0);
            let value = b.name("v");
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let v_ty = b.bits(4);
        let v = b.parameter("v", v_ty);
        b.action("clear_low", vec![v], body)
    };

    let body = {
        let arg = b.int_with_width(5, 4);
        let call = b.call("clear_low", vec![arg]);

        let lhs = b.name("proto");
        let rhs = b.member("Proto", "udp");
        let condition = b.binary(BinaryOperatorKind::Equal, lhs, rhs);
        let then_block = {
            let target = b.name("x");
            let lhs = b.name("x");
            let rhs = b.int_with_width(2, 8);
            let product = b.binary(BinaryOperatorKind::Multiply, lhs, rhs);
            let assign = b.assign(target, product);
            b.block(vec![assign])
        };
        let branch = b.if_else(condition, then_block, None);

        let target = b.name("verdict");
        let value = b.member("Verdict", "drop");
        let assign = b.assign(target, value);

        b.block(vec![call, branch, assign])
    };
    let x_ty = b.bits(8);
    let x = b.parameter("x", x_ty);
    let proto_ty = b.named_type("Proto");
    let proto = b.parameter("proto", proto_ty);
    let verdict_ty = b.named_type("Verdict");
    let verdict = b.parameter("verdict", verdict_ty);
    let ingress = b.control("ingress", vec![x, proto, verdict], vec![clear_low], body);

    let main = b.instance("main", "ingress", vec![]);
    let prs = b.instance("prs", "pkt", vec![]);

    b.finish(vec![verdict_enum, proto_enum, pkt, ingress, main, prs])
}

#[test]
fn modern_pipeline_lowers_end_to_end() {
    let mut sources = SourceMap::new();
    let program = modern_program(&mut sources);

    let mut midend = Midend::new(MidendOptions::default(), &sources);
    let output = midend.run(program).unwrap();

    let MidendOutput::Lowered { program, toplevel } = output else {
        panic!("expected a lowered program");
    };
    assert!(toplevel.has_entry_point());
    assert!(toplevel.node(Symbol::new("prs")).is_some());

    let dump = dump_program(&program);

    // The user enum is gone: the comparison and the parameter type are on
    // 32-bit integers now
    assert!(!dump.contains("enum Proto"), "got:\n{dump}");
    assert!(dump.contains("(proto == 32w1)"), "got:\n{dump}");
    assert!(dump.contains("proto: bits<32>"), "got:\n{dump}");

    // The stdlib enum stayed symbolic
    assert!(dump.contains("enum Verdict"), "got:\n{dump}");
    assert!(dump.contains("verdict = Verdict.drop;"), "got:\n{dump}");

    // The inlined slice write got lowered to a masked read-modify-write
    // and folded down to a constant merge
    assert!(dump.contains("x = ((x & 8w240) | 8w5);"), "got:\n{dump}");

    // Multiplication by a power of two became a shift
    assert!(dump.contains("x = (x << 8w1);"), "got:\n{dump}");

    // The orphan parser state is gone, the live ones are not
    assert!(!dump.contains("state orphan"), "got:\n{dump}");
    assert!(dump.contains("state start"), "got:\n{dump}");
    assert!(dump.contains("state l2"), "got:\n{dump}");
}

#[test]
fn legacy_pipeline_inlines_and_prunes() {
    let mut sources = SourceMap::new();
    let mut b = TreeBuilder::new(sources.add_memory(""));

    let helper = {
        let body = {
            let target = b.name("y");
            let value = b.int_with_width(1, 8);
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let y_ty = b.bits(8);
        let y = b.parameter("y", y_ty);
        b.control("helper", vec![y], vec![], body)
    };
    let ingress = {
        let body = {
            let arg = b.name("x");
            let call = b.call("helper", vec![arg]);
            b.block(vec![call])
        };
        let x_ty = b.bits(8);
        let x = b.parameter("x", x_ty);
        b.control("ingress", vec![x], vec![], body)
    };
    let main = b.instance("main", "ingress", vec![]);
    let program = b.finish(vec![helper, ingress, main]);

    let mut midend = Midend::new(
        MidendOptions {
            dialect: Dialect::Legacy,
            target: "softswitch".into(),
        },
        &sources,
    );
    let output = midend.run(program).unwrap();

    let MidendOutput::Lowered { program, .. } = output else {
        panic!("expected a lowered program");
    };
    let dump = dump_program(&program);

    // The callee body was spliced in with `y` replaced by the argument,
    // and the now-unreferenced callee was removed
    assert!(dump.contains("x = 8w1;"), "got:\n{dump}");
    assert!(!dump.contains("helper"), "got:\n{dump}");
}

#[test]
fn fatal_errors_render_with_provenance() {
    colored::control::set_override(false);

    let mut sources = SourceMap::new();
    let source = sources.add_file("pipe.creek", "control broken() {\n  frob();\n}\n");
    let mut b = TreeBuilder::new(source);

    let body = {
        let call = b.call("frob", vec![]);
        b.block(vec![call])
    };
    let broken = b.control("broken", vec![], vec![], body);
    let program = b.finish(vec![broken]);

    let mut midend = Midend::new(MidendOptions::default(), &sources);
    let error = midend.run(program).unwrap_err();

    let rendered = error.render(&sources);
    assert!(rendered.contains("unresolved reference to `frob`"));
    assert!(rendered.contains("pipe.creek"));
}
