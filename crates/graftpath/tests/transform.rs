use graftpath::{
    CopyBinding, ErrorCode, Evaluation, EvaluationOptionsBuilder, ExpandedName, FnExpression,
    HostTree, NodeId, PendingUpdate, PendingUpdateList, Pointer, QName, SequenceExpression,
    SimpleDocument, Step, TransformExpression, UpdatingCursor, UpdatingExpression, UpdatingResult,
    VariableReference, VariableScope, XdmAtomicValue, XdmItem, attr, elem,
};
use rstest::rstest;

type Doc = SimpleDocument;

fn var(name: &str) -> ExpandedName {
    ExpandedName::local(name)
}

/// Expression yielding one fixed node.
fn node_source(node: NodeId) -> Box<dyn UpdatingExpression<Doc>> {
    Box::new(FnExpression::<Doc>::new(move |_, _| {
        Ok(UpdatingResult::value(vec![XdmItem::Node(Pointer::real(node))]))
    }))
}

fn var_ref(name: &str) -> Box<dyn UpdatingExpression<Doc>> {
    Box::new(VariableReference::new(var(name)))
}

fn bound(scope: &VariableScope<NodeId>, name: &str) -> Pointer<NodeId> {
    scope
        .get(&var(name))
        .and_then(|seq| seq.first())
        .and_then(|item| item.as_node())
        .cloned()
        .expect("variable bound to a node")
}

/// `insert node attribute {name} {value} into $target`
fn insert_attribute(
    target: &'static str,
    name: &'static str,
    value: &'static str,
) -> Box<dyn UpdatingExpression<Doc>> {
    Box::new(FnExpression::<Doc>::new(move |eval, scope| {
        let into = bound(scope, target);
        let a = eval.arena_mut().attribute(QName::local(name), value);
        let pul: PendingUpdateList<NodeId> =
            vec![PendingUpdate::insert_attributes(into, vec![Pointer::silhouette(a)])].into();
        Ok(UpdatingResult::new(vec![], pul))
    }))
}

fn copy_modify_return(
    source: NodeId,
    modify: Box<dyn UpdatingExpression<Doc>>,
) -> TransformExpression<Doc> {
    TransformExpression::new(
        vec![CopyBinding::new(var("n"), node_source(source))],
        modify,
        var_ref("n"),
    )
}

#[rstest]
fn modified_copy_is_returned_and_source_is_untouched() {
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let expr = copy_modify_return(a, insert_attribute("n", "x", "1"));

    let mut eval = Evaluation::new(&mut d);
    let value = eval.run_updating(&expr, &VariableScope::new()).unwrap();
    assert_eq!(value.len(), 1);
    let result = value[0].as_node().and_then(Pointer::real_node).copied().unwrap();

    assert_ne!(result, a);
    let host = eval.host();
    assert_eq!(host.to_xml(result), r#"<a x="1"/>"#);
    assert_eq!(host.to_xml(a), "<a/>");
    assert!(host.attributes(&a, None).is_empty());
    assert_eq!(host.parent(&result, None), None);
}

#[rstest]
fn copies_include_the_whole_subtree() {
    let mut d = SimpleDocument::new();
    let root = d.build(elem("doc").child(elem("item").attr(attr("id", "1")).child(elem("leaf"))));
    let item = d.first_child(&root, None).unwrap();
    let modify: Box<dyn UpdatingExpression<Doc>> =
        Box::new(FnExpression::<Doc>::new(|eval, scope| {
            let n = bound(scope, "n");
            let leaf = eval.facade().first_child(&n, None).expect("copied child");
            let pul: PendingUpdateList<NodeId> = vec![
                PendingUpdate::rename(leaf, QName::local("renamed")),
                PendingUpdate::replace_value(
                    eval.facade().attribute_node(&n, "id").expect("copied attribute"),
                    "2",
                ),
            ]
            .into();
            Ok(UpdatingResult::new(vec![], pul))
        }));
    let expr = copy_modify_return(item, modify);

    let mut eval = Evaluation::new(&mut d);
    let value = eval.run_updating(&expr, &VariableScope::new()).unwrap();
    let copy = *value[0].as_node().and_then(Pointer::real_node).unwrap();
    let host = eval.host();
    assert_eq!(host.to_xml(copy), r#"<item id="2"><renamed/></item>"#);
    assert_eq!(host.to_xml(root), r#"<doc><item id="1"><leaf/></item></doc>"#);
}

#[rstest]
fn modifying_the_original_is_rejected() {
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let modify: Box<dyn UpdatingExpression<Doc>> = Box::new(FnExpression::<Doc>::new(move |_, _| {
        let pul: PendingUpdateList<NodeId> =
            vec![PendingUpdate::rename(Pointer::real(a), QName::local("b"))].into();
        Ok(UpdatingResult::new(vec![], pul))
    }));
    let expr = copy_modify_return(a, modify);

    let mut eval = Evaluation::new(&mut d);
    let err = eval.run_updating(&expr, &VariableScope::new()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUDY0014);
    assert_eq!(eval.host().to_xml(a), "<a/>");
}

#[rstest]
fn put_inside_modify_is_rejected() {
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let modify: Box<dyn UpdatingExpression<Doc>> = Box::new(FnExpression::<Doc>::new(|_, scope| {
        let pul: PendingUpdateList<NodeId> =
            vec![PendingUpdate::put(bound(scope, "n"), "file:///n.xml")].into();
        Ok(UpdatingResult::new(vec![], pul))
    }));
    let expr = copy_modify_return(a, modify);

    let mut eval = Evaluation::new(&mut d);
    let err = eval.run_updating(&expr, &VariableScope::new()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUDY0037);
}

#[rstest]
#[case::empty(|_| vec![])]
#[case::atomic(|_| vec![XdmItem::Atomic(XdmAtomicValue::Integer(1))])]
#[case::two_nodes(|a| vec![XdmItem::Node(Pointer::real(a)), XdmItem::Node(Pointer::real(a))])]
fn source_must_be_a_single_node(#[case] produce: fn(NodeId) -> Vec<XdmItem<Pointer<NodeId>>>) {
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let source: Box<dyn UpdatingExpression<Doc>> =
        Box::new(FnExpression::<Doc>::new(move |_, _| Ok(UpdatingResult::value(produce(a)))));
    let expr = TransformExpression::new(
        vec![CopyBinding::new(var("n"), source)],
        Box::new(SequenceExpression::<Doc>::new(vec![])),
        var_ref("n"),
    );
    let mut eval = Evaluation::new(&mut d);
    let err = eval.run_updating(&expr, &VariableScope::new()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUTY0013);
}

#[rstest]
fn failed_copy_binding_ends_the_transform() {
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let empty: Box<dyn UpdatingExpression<Doc>> =
        Box::new(FnExpression::<Doc>::new(|_, _| Ok(UpdatingResult::value(vec![]))));
    let expr = TransformExpression::new(
        vec![CopyBinding::new(var("n"), empty)],
        insert_attribute("m", "x", "1"),
        var_ref("m"),
    )
    .with_copy(var("m"), node_source(a));

    let mut eval = Evaluation::new(&mut d);
    let mut cursor = expr.open(&VariableScope::new());
    let err = cursor.poll_next(&mut eval).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUTY0013);
    assert!(matches!(cursor.poll_next(&mut eval).unwrap(), Step::Done));
    assert_eq!(eval.host().to_xml(a), "<a/>");
}

#[rstest]
fn later_bindings_see_earlier_copies() {
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let modify: Box<dyn UpdatingExpression<Doc>> = Box::new(SequenceExpression::<Doc>::new(vec![
        insert_attribute("n", "first", "1"),
        insert_attribute("m", "second", "2"),
    ]));
    let expr = TransformExpression::new(
        vec![CopyBinding::new(var("n"), node_source(a))],
        modify,
        Box::new(SequenceExpression::<Doc>::new(vec![
            var_ref("n"),
            var_ref("m"),
        ])),
    )
    .with_copy(var("m"), var_ref("n"));

    let mut eval = Evaluation::new(&mut d);
    let value = eval.run_updating(&expr, &VariableScope::new()).unwrap();
    let nodes: Vec<NodeId> = value
        .iter()
        .filter_map(|i| i.as_node().and_then(Pointer::real_node).copied())
        .collect();
    assert_eq!(nodes.len(), 2);
    assert_ne!(nodes[0], nodes[1]);
    let host = eval.host();
    assert_eq!(host.to_xml(nodes[0]), r#"<a first="1"/>"#);
    assert_eq!(host.to_xml(nodes[1]), r#"<a second="2"/>"#);
    assert_eq!(host.to_xml(a), "<a/>");
}

#[rstest]
fn source_updates_pass_through_unapplied() {
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let other = d.build(elem("other"));
    let source: Box<dyn UpdatingExpression<Doc>> = Box::new(FnExpression::<Doc>::new(move |_, _| {
        let pul: PendingUpdateList<NodeId> =
            vec![PendingUpdate::rename(Pointer::real(other), QName::local("renamed"))].into();
        Ok(UpdatingResult::new(
            vec![XdmItem::Node(Pointer::real(a))],
            pul,
        ))
    }));
    let expr = TransformExpression::new(
        vec![CopyBinding::new(var("n"), source)],
        insert_attribute("n", "x", "1"),
        var_ref("n"),
    );

    let mut eval = Evaluation::new(&mut d);
    let result = eval
        .evaluate_updating(&expr, &VariableScope::new())
        .unwrap();
    assert_eq!(result.pending_updates.len(), 1);
    assert_eq!(result.pending_updates.as_slice()[0].target(), &Pointer::real(other));
    assert_eq!(eval.host().to_xml(other), "<other/>");

    eval.apply_updates(result.pending_updates).unwrap();
    assert_eq!(eval.host().to_xml(other), "<renamed/>");
}

#[rstest]
fn pending_operands_are_polled_again() {
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let slow_source: Box<dyn UpdatingExpression<Doc>> = Box::new(
        FnExpression::<Doc>::new(move |_, _| {
            Ok(UpdatingResult::value(vec![XdmItem::Node(Pointer::real(a))]))
        })
        .with_pending_polls(2),
    );
    let expr = TransformExpression::new(
        vec![CopyBinding::new(var("n"), slow_source)],
        insert_attribute("n", "x", "1"),
        var_ref("n"),
    );

    let mut eval = Evaluation::new(&mut d);
    let mut cursor = expr.open(&VariableScope::new());
    assert!(matches!(cursor.poll_next(&mut eval).unwrap(), Step::Pending));
    assert!(matches!(cursor.poll_next(&mut eval).unwrap(), Step::Pending));
    let Step::Ready(result) = cursor.poll_next(&mut eval).unwrap() else {
        panic!("transform should be ready after the source resumed");
    };
    assert_eq!(result.value.len(), 1);
    assert!(matches!(cursor.poll_next(&mut eval).unwrap(), Step::Done));
    assert!(matches!(cursor.poll_next(&mut eval).unwrap(), Step::Done));
}

#[rstest]
fn pending_budget_bounds_a_transform() {
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let slow_modify: Box<dyn UpdatingExpression<Doc>> = Box::new(
        FnExpression::<Doc>::new(|_, _| Ok(UpdatingResult::default())).with_pending_polls(5),
    );
    let expr = copy_modify_return(a, slow_modify);
    let options = EvaluationOptionsBuilder::new().with_max_pending_polls(4).build();
    let mut eval = Evaluation::with_options(&mut d, options);
    let err = eval.run_updating(&expr, &VariableScope::new()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::EVAL0001);
}

#[rstest]
fn transform_emits_trace_events() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("graftpath=trace"))
        .with_test_writer()
        .try_init();
    let mut d = SimpleDocument::new();
    let a = d.build(elem("a"));
    let expr = copy_modify_return(a, insert_attribute("n", "x", "1"));
    let mut eval = Evaluation::new(&mut d);
    assert!(eval.run_updating(&expr, &VariableScope::new()).is_ok());
}
