use crate::language::ast::{Expr, FunctionDef, Item, Statement, TraverseStmt};
use crate::language::diagnostics::codes;
use crate::tests::support::*;

fn component_struct() -> Item {
    struct_def("Component", vec![("value", ty("Int")), ("label", ty("Str"))])
}

fn item(def: FunctionDef) -> Item {
    Item::Function(def)
}

#[test]
fn field_assignment_through_shared_param_is_rejected_once() {
    let body = block(
        vec![assign(field(ident("comp"), "value"), int(1))],
        None,
    );
    let file = file(vec![
        component_struct(),
        item(func(
            "f",
            vec![param("comp", ty_shared(ty("Component")))],
            None,
            body,
        )),
    ]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::DIRECT_MUTATION]);
}

#[test]
fn rebuilding_with_struct_update_is_accepted() {
    // let comp = Component { value: x, ..comp } replaces the value whole.
    let body = block(
        vec![let_stmt(
            "comp2",
            struct_update("Component", vec![("value", int(1))], ident("comp")),
        )],
        None,
    );
    let file = file(vec![
        component_struct(),
        item(func(
            "f",
            vec![param("comp", ty_shared(ty("Component")))],
            None,
            body,
        )),
    ]);
    assert_clean(&analyze(&file));
}

#[test]
fn field_assignment_on_fresh_value_is_accepted() {
    let body = block(
        vec![
            let_mut(
                "comp",
                struct_lit("Component", vec![("value", int(0)), ("label", string(""))]),
            ),
            assign(field(ident("comp"), "value"), int(1)),
        ],
        None,
    );
    let file = file(vec![component_struct(), item(func("f", vec![], None, body))]);
    assert_clean(&analyze(&file));
}

#[test]
fn taking_a_reference_loses_freshness() {
    let body = block(
        vec![
            let_mut(
                "comp",
                struct_lit("Component", vec![("value", int(0)), ("label", string(""))]),
            ),
            let_stmt("alias", reference(false, ident("comp"))),
            assign(field(ident("comp"), "value"), int(1)),
        ],
        None,
    );
    let file = file(vec![component_struct(), item(func("f", vec![], None, body))]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::DIRECT_MUTATION]);
}

#[test]
fn field_assignment_through_exclusive_ref_is_accepted() {
    let body = block(
        vec![assign(field(ident("comp"), "value"), int(1))],
        None,
    );
    let file = file(vec![
        component_struct(),
        item(func(
            "f",
            vec![param("comp", ty_mut(ty("Component")))],
            None,
            body,
        )),
    ]);
    assert_clean(&analyze(&file));
}

#[test]
fn moving_a_non_copy_field_out_of_a_borrow_needs_clone() {
    let body = block(
        vec![let_stmt("label", field(ident("comp"), "label"))],
        None,
    );
    let file = file(vec![
        component_struct(),
        item(func(
            "f",
            vec![param("comp", ty_shared(ty("Component")))],
            None,
            body,
        )),
    ]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::IMPLICIT_BORROW]);
    assert!(analysis.diagnostics[0]
        .help
        .as_deref()
        .unwrap_or("")
        .contains("clone"));
}

#[test]
fn cloning_the_field_is_accepted() {
    let body = block(
        vec![let_stmt(
            "label",
            method(field(ident("comp"), "label"), "clone", vec![]),
        )],
        None,
    );
    let file = file(vec![
        component_struct(),
        item(func(
            "f",
            vec![param("comp", ty_shared(ty("Component")))],
            None,
            body,
        )),
    ]);
    assert_clean(&analyze(&file));
}

#[test]
fn copy_fields_move_freely_out_of_borrows() {
    let body = block(
        vec![let_stmt("n", field(ident("comp"), "value"))],
        None,
    );
    let file = file(vec![
        component_struct(),
        item(func(
            "f",
            vec![param("comp", ty_shared(ty("Component")))],
            None,
            body,
        )),
    ]);
    assert_clean(&analyze(&file));
}

#[test]
fn container_mutation_through_shared_binding_is_rejected() {
    let body = block(
        vec![expr_stmt(method(ident("v"), "push", vec![int(1)]))],
        None,
    );
    let file = file(vec![item(func(
        "f",
        vec![param("v", ty_shared(ty_args("Vec", vec![ty("Int")])))],
        None,
        body,
    ))]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::DIRECT_MUTATION]);
}

#[test]
fn container_mutation_on_fresh_vec_is_accepted() {
    let body = block(
        vec![
            let_mut("v", vec_lit(vec![int(1)])),
            expr_stmt(method(ident("v"), "push", vec![int(2)])),
        ],
        None,
    );
    let file = file(vec![item(func("f", vec![], None, body))]);
    assert_clean(&analyze(&file));
}

#[test]
fn traverse_mut_capture_sanctions_field_assignment() {
    let visitor = func(
        "visit_node",
        vec![param("node", ty("Node"))],
        None,
        block(
            vec![assign(field(ident("state"), "value"), int(1))],
            None,
        ),
    );
    let traverse = Statement::Traverse(TraverseStmt {
        target: ident("root"),
        captures: vec![crate::language::ast::Capture {
            name: "state".to_string(),
            mutable: true,
            span: sp(),
        }],
        state: vec![],
        visitors: vec![visitor],
        span: sp(),
    });
    let body = block(
        vec![
            let_stmt(
                "state",
                struct_lit("Component", vec![("value", int(0)), ("label", string(""))]),
            ),
            let_stmt("alias", reference(false, ident("state"))),
            traverse,
        ],
        None,
    );
    let file = file(vec![
        component_struct(),
        item(func("f", vec![param("root", ty("Node"))], None, body)),
    ]);
    assert_clean(&analyze(&file));
}

#[test]
fn uncaptured_binding_stays_immutable_inside_visitors() {
    let visitor = func(
        "visit_node",
        vec![param("node", ty("Node"))],
        None,
        block(
            vec![assign(field(ident("state"), "value"), int(1))],
            None,
        ),
    );
    let traverse = Statement::Traverse(TraverseStmt {
        target: ident("root"),
        captures: vec![crate::language::ast::Capture {
            name: "state".to_string(),
            mutable: false,
            span: sp(),
        }],
        state: vec![],
        visitors: vec![visitor],
        span: sp(),
    });
    let body = block(
        vec![
            let_stmt(
                "state",
                struct_lit("Component", vec![("value", int(0)), ("label", string(""))]),
            ),
            let_stmt("alias", reference(false, ident("state"))),
            traverse,
        ],
        None,
    );
    let file = file(vec![
        component_struct(),
        item(func("f", vec![param("root", ty("Node"))], None, body)),
    ]);
    let analysis = analyze(&file);
    assert_eq!(codes_of(&analysis), vec![codes::DIRECT_MUTATION]);
}

#[test]
fn whole_value_replacement_is_always_allowed() {
    let body = block(
        vec![
            let_mut("x", ident("comp")),
            assign(
                ident("x"),
                Expr::Identifier(crate::language::ast::Identifier {
                    name: "other".to_string(),
                    span: sp(),
                }),
            ),
        ],
        None,
    );
    let file = file(vec![
        component_struct(),
        item(func(
            "f",
            vec![
                param("comp", ty("Component")),
                param("other", ty("Component")),
            ],
            None,
            body,
        )),
    ]);
    assert_clean(&analyze(&file));
}
