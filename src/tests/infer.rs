use crate::language::ast::{BinaryOp, Expr, Item};
use crate::language::diagnostics::codes;
use crate::tests::support::*;

fn item(def: crate::language::ast::FunctionDef) -> Item {
    Item::Function(def)
}

#[test]
fn diverging_branch_yields_the_other_branches_type() {
    // let x = if c { return 0; } else { 2 }; x + 1 — x must be Int, not Unit.
    let body = block(
        vec![let_stmt(
            "x",
            if_expr(
                ident("c"),
                block(vec![ret(Some(int(0)))], None),
                Some(block(vec![], Some(int(2)))),
            ),
        )],
        Some(binary(BinaryOp::Add, ident("x"), int(1))),
    );
    let file = file(vec![item(func(
        "f",
        vec![param("c", ty("Bool"))],
        Some(ty("Int")),
        body,
    ))]);
    assert_clean(&analyze(&file));
}

#[test]
fn panic_branch_diverges() {
    let body = block(
        vec![],
        Some(if_expr(
            ident("c"),
            block(vec![], Some(string("ok"))),
            Some(block(vec![], Some(panic_expr("boom")))),
        )),
    );
    let file = file(vec![item(func(
        "f",
        vec![param("c", ty("Bool"))],
        Some(ty("Str")),
        body,
    ))]);
    assert_clean(&analyze(&file));
}

#[test]
fn all_diverging_branches_make_the_whole_expression_never() {
    // Both arms return; the binding is Never and the unreachable tail still
    // satisfies the return type.
    let body = block(
        vec![let_stmt(
            "x",
            if_expr(
                ident("c"),
                block(vec![ret(Some(int(1)))], None),
                Some(block(vec![ret(Some(int(2)))], None)),
            ),
        )],
        Some(int(0)),
    );
    let file = file(vec![item(func(
        "f",
        vec![param("c", ty("Bool"))],
        Some(ty("Int")),
        body,
    ))]);
    assert_clean(&analyze(&file));
}

#[test]
fn mismatched_branches_report_rs003_with_both_spans() {
    let body = block(
        vec![],
        Some(if_expr(
            ident("c"),
            block(vec![], Some(int(1))),
            Some(block(vec![], Some(string("two")))),
        )),
    );
    let file = file(vec![item(func(
        "f",
        vec![param("c", ty("Bool"))],
        Some(ty("Int")),
        body,
    ))]);
    let analysis = analyze(&file);
    let mismatch = analysis
        .diagnostics
        .iter()
        .find(|d| d.code == codes::TYPE_MISMATCH)
        .expect("RS003 expected");
    assert!(
        !mismatch.related_spans.is_empty(),
        "mismatch should name both branch spans"
    );
    assert!(mismatch.message.contains("Int") && mismatch.message.contains("Str"));
}

#[test]
fn recovery_uses_the_first_branch_type() {
    // After the branch mismatch the binding keeps the first branch's type, so
    // the Int usage downstream stays clean: exactly one diagnostic.
    let body = block(
        vec![let_stmt(
            "x",
            if_expr(
                ident("c"),
                block(vec![], Some(int(1))),
                Some(block(vec![], Some(string("two")))),
            ),
        )],
        Some(binary(BinaryOp::Add, ident("x"), int(1))),
    );
    let file = file(vec![item(func(
        "f",
        vec![param("c", ty("Bool"))],
        Some(ty("Int")),
        body,
    ))]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::TYPE_MISMATCH]);
}

#[test]
fn block_tail_inherits_branching_type() {
    // A block whose tail is a match takes the unified arm type.
    let inner = block(
        vec![],
        Some(match_expr(
            ident("opt"),
            vec![
                arm(pat_some(pat_bind("n")), ident("n")),
                arm(pat_none(), int(0)),
            ],
        )),
    );
    let body = block(
        vec![let_stmt("x", Expr::Block(Box::new(inner)))],
        Some(binary(BinaryOp::Add, ident("x"), int(1))),
    );
    let file = file(vec![item(func(
        "f",
        vec![param("opt", ty_args("Option", vec![ty("Int")]))],
        Some(ty("Int")),
        body,
    ))]);
    assert_clean(&analyze(&file));
}

#[test]
fn annotation_mismatch_is_reported() {
    let body = block(vec![let_typed("x", ty("Int"), string("nope"))], None);
    let file = file(vec![item(func("f", vec![], None, body))]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::TYPE_MISMATCH]);
}

#[test]
fn condition_must_be_bool() {
    let body = block(
        vec![expr_stmt(if_expr(int(1), block(vec![], None), None))],
        None,
    );
    let file = file(vec![item(func("f", vec![], None, body))]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::TYPE_MISMATCH]);
}

#[test]
fn int_and_float_arithmetic_widens_to_float() {
    let body = block(
        vec![let_typed(
            "x",
            ty("Float"),
            binary(BinaryOp::Add, int(1), float(2.5)),
        )],
        None,
    );
    let file = file(vec![item(func("f", vec![], None, body))]);
    assert_clean(&analyze(&file));
}

#[test]
fn vec_methods_are_typed() {
    let body = block(
        vec![
            let_mut("v", vec_lit(vec![int(1), int(2)])),
            expr_stmt(method(ident("v"), "push", vec![int(3)])),
            let_typed("n", ty("Int"), method(ident("v"), "len", vec![])),
        ],
        None,
    );
    let file = file(vec![item(func("f", vec![], None, body))]);
    assert_clean(&analyze(&file));
}

#[test]
fn pushing_the_wrong_element_type_is_reported() {
    let body = block(
        vec![
            let_mut("v", vec_lit(vec![int(1)])),
            expr_stmt(method(ident("v"), "push", vec![string("nope")])),
        ],
        None,
    );
    let file = file(vec![item(func("f", vec![], None, body))]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::TYPE_MISMATCH]);
}

#[test]
fn option_builtins_type_their_payload() {
    let body = block(
        vec![let_typed(
            "x",
            ty_args("Option", vec![ty("Int")]),
            some(int(1)),
        )],
        Some(method(ident("x"), "unwrap", vec![])),
    );
    let file = file(vec![item(func("f", vec![], Some(ty("Int")), body))]);
    assert_clean(&analyze(&file));
}

#[test]
fn return_type_mismatch_is_reported() {
    let body = block(vec![ret(Some(string("nope")))], None);
    let file = file(vec![item(func("f", vec![], Some(ty("Int")), body))]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::TYPE_MISMATCH]);
}

#[test]
fn enum_match_types_variant_payloads() {
    let file = file(vec![
        enum_def(
            "Shape",
            vec![("Circle", vec![ty("Float")]), ("Empty", vec![])],
        ),
        item(func(
            "area",
            vec![param("s", ty("Shape"))],
            Some(ty("Float")),
            block(
                vec![],
                Some(match_expr(
                    ident("s"),
                    vec![
                        arm(
                            pat_variant(Some("Shape"), "Circle", vec![pat_bind("r")]),
                            binary(BinaryOp::Mul, ident("r"), ident("r")),
                        ),
                        arm(pat_wild(), float(0.0)),
                    ],
                )),
            ),
        )),
    ]);
    assert_clean(&analyze(&file));
}

#[test]
fn wrong_variant_arity_in_pattern_is_reported() {
    let file = file(vec![
        enum_def("Shape", vec![("Circle", vec![ty("Float")])]),
        item(func(
            "f",
            vec![param("s", ty("Shape"))],
            None,
            block(
                vec![expr_stmt(match_expr(
                    ident("s"),
                    vec![arm(
                        pat_variant(Some("Shape"), "Circle", vec![pat_bind("a"), pat_bind("b")]),
                        int(0),
                    )],
                ))],
                None,
            ),
        )),
    ]);
    let analysis = analyze(&file);
    assert!(codes_of(&analysis).contains(&codes::TYPE_MISMATCH));
}

#[test]
fn nested_if_let_chain_with_alternating_divergence() {
    // Outer binding takes the type of the single non-diverging leaf.
    let file = file(vec![
        enum_def("Node", vec![("Kind", vec![ty("Int")]), ("Other", vec![])]),
        item(func(
            "id_name",
            vec![param("id", ty("Int"))],
            Some(ty("Str")),
            block(vec![], Some(string("name"))),
        )),
        item(func(
            "f",
            vec![param("opt", ty_args("Option", vec![ty("Node")]))],
            Some(ty("Str")),
            block(
                vec![let_stmt(
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
                )],
                Some(ident("name")),
            ),
        )),
    ]);
    let analysis = analyze(&file);
    assert_clean(&analysis);
    assert!(analysis.dynamic.is_some() && analysis.native.is_some());
}
