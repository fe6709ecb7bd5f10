use crate::language::ast::{FunctionDef, Item};
use crate::language::diagnostics::codes;
use crate::language::emit::out::{OutMatchArm, OutProgram, OutStmt};
use crate::language::modules::ModuleTable;
use crate::language::pipeline::{analyze_batch, analyze_file_with, PipelineOptions};
use crate::tests::support::*;

fn item(def: FunctionDef) -> Item {
    Item::Function(def)
}

/// Coarse behavioral trace: the order of bindings, assignments, calls and
/// exits, with both profiles' dispatch shapes flattened the same way. If two
/// programs have equal traces they visit the same nodes and apply the same
/// rewrites in the same order.
#[derive(Debug, PartialEq)]
enum TraceEvent {
    Bind(String),
    Assign(String),
    Eval,
    Return,
    Abort,
    Loop,
    Traverse,
}

fn trace_program(program: &OutProgram) -> Vec<TraceEvent> {
    let mut events = Vec::new();
    for function in program
        .functions
        .iter()
        .chain(program.plugins.iter().flat_map(|p| p.functions.iter()))
    {
        events.push(TraceEvent::Bind(format!("fn {}", function.name)));
        trace_stmts(&function.body, &mut events);
    }
    events
}

fn trace_stmts(stmts: &[OutStmt], events: &mut Vec<TraceEvent>) {
    for stmt in stmts {
        match stmt {
            OutStmt::Declare { name }
            | OutStmt::ConstBind { name, .. }
            | OutStmt::LetBind { name, .. } => events.push(TraceEvent::Bind(name.clone())),
            OutStmt::Assign { target, .. } => {
                events.push(TraceEvent::Assign(format!("{:?}", target)))
            }
            OutStmt::Eval(_) => events.push(TraceEvent::Eval),
            OutStmt::Return(_) => events.push(TraceEvent::Return),
            OutStmt::Throw(_) | OutStmt::Fail(_) => events.push(TraceEvent::Abort),
            // Dispatch shape is profile-specific (nested conditionals versus
            // one flat match), so only the leaves count: arms in order, then
            // the failure path.
            OutStmt::If {
                then_body,
                else_body,
                ..
            } => {
                trace_stmts(then_body, events);
                trace_stmts(else_body, events);
            }
            OutStmt::MatchArms { arms, default, .. } => {
                trace_arms(arms, default, events);
            }
            OutStmt::While { body, .. } | OutStmt::For { body, .. } => {
                events.push(TraceEvent::Loop);
                trace_stmts(body, events);
            }
            OutStmt::Traverse {
                state, visitors, ..
            } => {
                events.push(TraceEvent::Traverse);
                trace_stmts(state, events);
                for visitor in visitors {
                    events.push(TraceEvent::Bind(format!("fn {}", visitor.name)));
                    trace_stmts(&visitor.body, events);
                }
            }
            OutStmt::Scope(body) => trace_stmts(body, events),
            OutStmt::Break | OutStmt::Continue => events.push(TraceEvent::Abort),
        }
    }
}

/// Match arms flatten to the same event stream the dynamic profile's nested
/// conditionals produce: pattern bindings first, then the arm body, arms in
/// order, default last. A guarded arm re-enters the continuation when the
/// guard fails, and the nested-conditional profile spells that by cloning
/// the remaining arms into the guard's else branch, so the continuation is
/// traced once per entry point here too.
fn trace_arms(arms: &[OutMatchArm], default: &[OutStmt], events: &mut Vec<TraceEvent>) {
    use crate::language::emit::out::OutPattern;
    let Some((arm, rest)) = arms.split_first() else {
        trace_stmts(default, events);
        return;
    };
    match &arm.pattern {
        OutPattern::Variant { fields, .. } => {
            for field in fields {
                events.push(TraceEvent::Bind(field.name.clone()));
            }
        }
        OutPattern::Some(Some(binding)) => events.push(TraceEvent::Bind(binding.name.clone())),
        OutPattern::Binding(binding) => events.push(TraceEvent::Bind(binding.name.clone())),
        OutPattern::Some(None)
        | OutPattern::None
        | OutPattern::Literal(_)
        | OutPattern::Wildcard => {}
    }
    trace_stmts(&arm.body, events);
    if arm.guard.is_some() {
        trace_arms(rest, default, events);
    }
    trace_arms(rest, default, events);
}

fn rewrite_plugin_file() -> crate::language::ast::FileAst {
    // A small but representative plugin: enum dispatch, option handling, a
    // diverging arm, and a rebuild-style rewrite.
    file(vec![
        enum_def(
            "Node",
            vec![("Kind", vec![ty("Int")]), ("Leaf", vec![])],
        ),
        struct_def("Rewrite", vec![("count", ty("Int"))]),
        item(func(
            "apply",
            vec![param("node", ty("Node")), param("hits", ty("Int"))],
            Some(ty("Rewrite")),
            block(
                vec![let_stmt(
                    "count",
                    match_expr(
                        ident("node"),
                        vec![
                            arm(
                                pat_variant(Some("Node"), "Kind", vec![pat_ref("id")]),
                                binary(crate::language::ast::BinaryOp::Add, ident("id"), ident("hits")),
                            ),
                            arm(
                                pat_variant(Some("Node"), "Leaf", vec![]),
                                panic_expr("leaf nodes cannot be rewritten"),
                            ),
                        ],
                    ),
                )],
                Some(struct_lit("Rewrite", vec![("count", ident("count"))])),
            ),
        )),
    ])
}

#[test]
fn both_backends_produce_equivalent_traces() {
    let analysis = analyze(&rewrite_plugin_file());
    assert_clean(&analysis);
    let dynamic = trace_program(analysis.dynamic.as_ref().expect("dynamic"));
    let native = trace_program(analysis.native.as_ref().expect("native"));
    assert_eq!(dynamic, native);
}

#[test]
fn guarded_arms_lower_equivalently_on_both_backends() {
    // A failed guard falls through to the wildcard arm on both profiles.
    let file = file(vec![item(func(
        "clamp",
        vec![
            param("opt", ty_args("Option", vec![ty("Int")])),
            param("limit", ty("Int")),
        ],
        Some(ty("Int")),
        block(
            vec![],
            Some(match_expr(
                ident("opt"),
                vec![
                    arm_if(
                        pat_some(pat_bind("n")),
                        binary(crate::language::ast::BinaryOp::Lt, ident("n"), ident("limit")),
                        ident("n"),
                    ),
                    arm(pat_wild(), ident("limit")),
                ],
            )),
        ),
    ))]);
    let analysis = analyze(&file);
    assert_clean(&analysis);
    let dynamic = trace_program(analysis.dynamic.as_ref().expect("dynamic"));
    let native = trace_program(analysis.native.as_ref().expect("native"));
    assert_eq!(dynamic, native, "guard failure must fall through identically");
}

#[test]
fn nested_if_let_scenario_types_and_lowers_on_both_backends() {
    let file = file(vec![
        enum_def("Node", vec![("Kind", vec![ty("Int")]), ("Other", vec![])]),
        item(func(
            "id_name",
            vec![param("id", ty("Int"))],
            Some(ty("Str")),
            block(vec![], Some(string("name"))),
        )),
        item(func(
            "use_name",
            vec![param("name", ty("Str"))],
            None,
            block(vec![], None),
        )),
        item(func(
            "run",
            vec![param("opt", ty_args("Option", vec![ty("Node")]))],
            Some(ty("Str")),
            block(
                vec![
                    let_stmt(
                        "name",
                        if_let(
                            pat_some(pat_ref("v")),
                            ident("opt"),
                            block(
                                vec![],
                                Some(if_let(
                                    pat_variant(Some("Node"), "Kind", vec![pat_ref("id")]),
                                    ident("v"),
                                    block(vec![], Some(call("id_name", vec![ident("id")]))),
                                    Some(block(
                                        vec![ret(Some(method(string("A"), "into", vec![])))],
                                        None,
                                    )),
                                )),
                            ),
                            Some(block(
                                vec![ret(Some(method(string("B"), "into", vec![])))],
                                None,
                            )),
                        ),
                    ),
                    expr_stmt(call("use_name", vec![ident("name")])),
                ],
                Some(ident("name")),
            ),
        )),
    ]);
    let analysis = analyze(&file);
    assert_clean(&analysis);
    let dynamic = analysis.dynamic.as_ref().expect("dynamic output");
    let native = analysis.native.as_ref().expect("native output");
    assert_eq!(
        trace_program(dynamic),
        trace_program(native),
        "scenario must lower equivalently on both backends"
    );
}

#[test]
fn rs002_suppresses_codegen_for_that_file_only() {
    let clean = file(vec![item(func(
        "ok",
        vec![],
        Some(ty("Int")),
        block(vec![], Some(int(1))),
    ))]);
    let broken = file(vec![
        struct_def("Component", vec![("field", ty("Int"))]),
        item(func(
            "bad",
            vec![param("comp", ty_shared(ty("Component")))],
            None,
            block(
                vec![assign(field(ident("comp"), "field"), int(5))],
                None,
            ),
        )),
    ]);
    let outcome = analyze_batch(&[broken, clean], &ModuleTable::new());
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.analyses.len(), 2);

    let broken_analysis = &outcome.analyses[0];
    assert_eq!(codes_of(broken_analysis), vec![codes::DIRECT_MUTATION]);
    assert!(broken_analysis.dynamic.is_none() && broken_analysis.native.is_none());

    let clean_analysis = &outcome.analyses[1];
    assert_clean(clean_analysis);
    assert!(clean_analysis.dynamic.is_some() && clean_analysis.native.is_some());
}

#[test]
fn diagnostics_are_sorted_by_position_and_rows_carry_locations() {
    let file = file(vec![item(func(
        "f",
        vec![],
        None,
        block(
            vec![
                expr_stmt(ident("first_missing")),
                expr_stmt(ident("second_missing")),
            ],
            None,
        ),
    ))]);
    let analysis = analyze(&file);
    assert_eq!(
        codes_of(&analysis),
        vec![codes::UNDEFINED_VARIABLE, codes::UNDEFINED_VARIABLE]
    );
    let rows = analysis.rows();
    assert!(rows[0].line <= rows[1].line);
    assert_eq!(rows[0].file, "test.rsc");
    assert!(rows[0].message.contains("first_missing"));
}

#[test]
fn codegen_can_be_disabled() {
    let file = file(vec![item(func(
        "f",
        vec![],
        Some(ty("Int")),
        block(vec![], Some(int(1))),
    ))]);
    let analysis = analyze_file_with(
        &file,
        &ModuleTable::new(),
        PipelineOptions { codegen: false },
    )
    .expect("pipeline");
    assert_clean(&analysis);
    assert!(analysis.dynamic.is_none() && analysis.native.is_none());
}

#[test]
fn warnings_do_not_block_codegen() {
    // No stage currently emits warnings on this input; the property holds
    // trivially for an empty diagnostic list and is pinned by has_errors.
    let file = file(vec![item(func(
        "f",
        vec![],
        Some(ty("Int")),
        block(vec![], Some(int(1))),
    ))]);
    let analysis = analyze(&file);
    assert!(!analysis.has_errors());
    assert!(analysis.dynamic.is_some());
}
