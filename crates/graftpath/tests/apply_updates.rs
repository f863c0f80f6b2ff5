use std::sync::Arc;

use graftpath::{
    ErrorCode, Evaluation, EvaluationOptionsBuilder, GraftPoint, HostTree, NodeId, NodeRef,
    Offset, PendingUpdate, PendingUpdateList, Pointer, QName, SimpleDocument, attr, elem, text,
};
use rstest::rstest;

fn real(n: NodeId) -> Pointer<NodeId> {
    Pointer::real(n)
}

#[rstest]
fn primitives_apply_in_stage_order() {
    let mut d = SimpleDocument::new();
    let r = d.build(
        elem("r")
            .child(elem("a"))
            .child(elem("b").attr(attr("x", "1")))
            .child(text("t")),
    );
    let a = d.first_child(&r, None).unwrap();
    let b = d.next_sibling(&a, None).unwrap();
    let x = d.attribute(&b, "x").unwrap();

    let mut eval = Evaluation::new(&mut d);
    let c = eval.arena_mut().element(QName::local("c"), vec![], vec![]);
    let start = eval.arena_mut().text("start");
    let pul: PendingUpdateList<NodeId> = vec![
        PendingUpdate::delete(real(a)),
        PendingUpdate::insert_after(real(b), vec![Pointer::silhouette(c)]),
        PendingUpdate::rename(real(b), QName::local("bb")),
        PendingUpdate::replace_value(real(x), "2"),
        PendingUpdate::insert_into_as_first(real(r), vec![Pointer::silhouette(start)]),
    ]
    .into();
    eval.apply_updates(pul).unwrap();
    assert_eq!(eval.host().to_xml(r), r#"<r>start<bb x="2"/><c/>t</r>"#);
}

#[rstest]
fn failed_precondition_leaves_document_untouched() {
    let mut d = SimpleDocument::new();
    let r = d.build(elem("r").child(elem("a")).child(text("t")));
    let a = d.first_child(&r, None).unwrap();
    let t = d.last_child(&r, None).unwrap();

    let mut eval = Evaluation::new(&mut d);
    let extra = eval.arena_mut().attribute(QName::local("n"), "v");
    let pul: PendingUpdateList<NodeId> = vec![
        PendingUpdate::delete(real(a)),
        PendingUpdate::rename(real(a), QName::local("z")),
        PendingUpdate::insert_attributes(real(t), vec![Pointer::silhouette(extra)]),
    ]
    .into();
    let err = eval.apply_updates(pul).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUTY0022);
    assert!(!err.is_fatal());
    assert_eq!(eval.host().to_xml(r), "<r><a/>t</r>");
}

#[rstest]
#[case::insert_into_text(|_, _, t| PendingUpdate::insert_into(t, vec![]), ErrorCode::XUTY0005)]
#[case::insert_before_attribute(
    |_, x, _| PendingUpdate::insert_before(x, vec![]),
    ErrorCode::XUTY0006
)]
#[case::rename_text(|_, _, t| PendingUpdate::rename(t, QName::local("n")), ErrorCode::XUTY0012)]
#[case::replace_value_of_element(
    |e, _, _| PendingUpdate::replace_value(e, "v"),
    ErrorCode::XUTY0008
)]
#[case::replace_element_content_of_text(
    |_, _, t| PendingUpdate::replace_element_content(t, None),
    ErrorCode::XUTY0008
)]
#[case::insert_attributes_into_text(
    |_, _, t| PendingUpdate::insert_attributes(t, vec![]),
    ErrorCode::XUTY0022
)]
fn target_kind_errors(
    #[case] make: fn(Pointer<NodeId>, Pointer<NodeId>, Pointer<NodeId>) -> PendingUpdate<NodeId>,
    #[case] expected: ErrorCode,
) {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e").attr(attr("x", "1")).child(text("t")));
    let x = d.attribute(&e, "x").unwrap();
    let t = d.first_child(&e, None).unwrap();
    let mut eval = Evaluation::new(&mut d);
    let pul: PendingUpdateList<NodeId> = vec![make(real(e), real(x), real(t))].into();
    let err = eval.apply_updates(pul).unwrap_err();
    assert_eq!(err.code_enum(), expected);
    assert_eq!(eval.host().to_xml(e), r#"<e x="1">t</e>"#);
}

#[rstest]
fn parentless_targets() {
    let mut d = SimpleDocument::new();
    let lone = d.build(elem("lone"));
    let mut eval = Evaluation::new(&mut d);
    let before: PendingUpdateList<NodeId> =
        vec![PendingUpdate::insert_before(real(lone), vec![])].into();
    assert_eq!(
        eval.apply_updates(before).unwrap_err().code_enum(),
        ErrorCode::XUDY0029
    );
    let replace: PendingUpdateList<NodeId> =
        vec![PendingUpdate::replace_node(real(lone), vec![])].into();
    assert_eq!(
        eval.apply_updates(replace).unwrap_err().code_enum(),
        ErrorCode::XUDY0009
    );
}

#[rstest]
fn virtual_targets_are_rejected() {
    let mut d = SimpleDocument::new();
    let mut eval = Evaluation::new(&mut d);
    let t = eval.arena_mut().text("virtual");
    let pul: PendingUpdateList<NodeId> =
        vec![PendingUpdate::replace_value(Pointer::silhouette(t), "x")].into();
    assert_eq!(
        eval.apply_updates(pul).unwrap_err().code_enum(),
        ErrorCode::UPD0001
    );
}

#[rstest]
fn put_is_not_applied() {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e"));
    let mut eval = Evaluation::new(&mut d);
    let pul: PendingUpdateList<NodeId> =
        vec![PendingUpdate::put(real(e), "file:///e.xml")].into();
    assert_eq!(
        eval.apply_updates(pul).unwrap_err().code_enum(),
        ErrorCode::NYI0000
    );
}

#[rstest]
fn replace_attribute_with_attributes() {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e").attr(attr("x", "1")).child(elem("k")));
    let x = d.attribute(&e, "x").unwrap();
    let k = d.first_child(&e, None).unwrap();
    let mut eval = Evaluation::new(&mut d);
    let y = eval.arena_mut().attribute(QName::local("y"), "2");
    let z = eval.arena_mut().attribute(QName::local("z"), "3");

    let bad: PendingUpdateList<NodeId> =
        vec![PendingUpdate::replace_node(real(x), vec![real(k)])].into();
    assert_eq!(
        eval.apply_updates(bad).unwrap_err().code_enum(),
        ErrorCode::XUTY0011
    );

    let pul: PendingUpdateList<NodeId> = vec![PendingUpdate::replace_node(
        real(x),
        vec![Pointer::silhouette(y), Pointer::silhouette(z)],
    )]
    .into();
    eval.apply_updates(pul).unwrap();
    assert_eq!(eval.host().to_xml(e), r#"<e y="2" z="3"><k/></e>"#);
}

#[rstest]
fn replacing_an_attribute_keeps_internal_errors_fatal() {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e").attr(attr("x", "1")));
    let x = d.attribute(&e, "x").unwrap();
    let mut eval = Evaluation::new(&mut d);
    let stray = eval.arena_mut().attribute(QName::local("y"), "2");
    let holder = eval.arena_mut().element(QName::local("h"), vec![], vec![]);
    // the holder has no child at slot 0, so the pointer cannot be resolved
    let broken = Pointer::new(
        NodeRef::Silhouette(stray),
        Some(Arc::new(GraftPoint::new(holder, Offset::Index(0), None))),
    );

    let pul: PendingUpdateList<NodeId> =
        vec![PendingUpdate::replace_node(real(x), vec![broken])].into();
    let err = eval.apply_updates(pul).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::INT0000);
    assert!(err.is_fatal());
    assert_eq!(eval.host().to_xml(e), r#"<e x="1"/>"#);
}

#[rstest]
fn replace_child_node() {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e").child(elem("old")).child(text("tail")));
    let old = d.first_child(&e, None).unwrap();
    let mut eval = Evaluation::new(&mut d);
    let a = eval.arena_mut().attribute(QName::local("a"), "1");
    let bad: PendingUpdateList<NodeId> =
        vec![PendingUpdate::replace_node(real(old), vec![Pointer::silhouette(a)])].into();
    assert_eq!(
        eval.apply_updates(bad).unwrap_err().code_enum(),
        ErrorCode::XUTY0010
    );

    let n1 = eval.arena_mut().element(QName::local("n1"), vec![], vec![]);
    let n2 = eval.arena_mut().comment("n2");
    let pul: PendingUpdateList<NodeId> = vec![PendingUpdate::replace_node(
        real(old),
        vec![Pointer::silhouette(n1), Pointer::silhouette(n2)],
    )]
    .into();
    eval.apply_updates(pul).unwrap();
    assert_eq!(eval.host().to_xml(e), "<e><n1/><!--n2-->tail</e>");
}

#[rstest]
#[case::with_text(Some("new".to_string()), "<e>new</e>")]
#[case::emptied(None, "<e/>")]
#[case::empty_text(Some(String::new()), "<e/>")]
fn replace_element_content(#[case] replacement: Option<String>, #[case] expected: &str) {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e").attr(attr("keep", "1")).child(elem("a")).child(text("old")));
    let mut eval = Evaluation::new(&mut d);
    let pul: PendingUpdateList<NodeId> =
        vec![PendingUpdate::replace_element_content(real(e), replacement)].into();
    eval.apply_updates(pul).unwrap();
    let xml = eval.host().to_xml(e);
    assert_eq!(xml.replace(r#" keep="1""#, ""), expected);
    assert!(xml.contains(r#"keep="1""#));
}

#[rstest]
fn inserted_document_contributes_its_children() {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e").child(elem("last")));
    let mut eval = Evaluation::new(&mut d);
    let t = eval.arena_mut().text("x");
    let c = eval.arena_mut().comment("y");
    let document = eval
        .arena_mut()
        .document(vec![NodeRef::Silhouette(t), NodeRef::Silhouette(c)]);
    let pul: PendingUpdateList<NodeId> = vec![PendingUpdate::insert_into_as_first(
        real(e),
        vec![Pointer::silhouette(document)],
    )]
    .into();
    eval.apply_updates(pul).unwrap();
    assert_eq!(eval.host().to_xml(e), "<e>x<!--y--><last/></e>");
}

#[rstest]
fn attribute_cannot_be_inserted_as_a_child() {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e"));
    let mut eval = Evaluation::new(&mut d);
    let a = eval.arena_mut().attribute(QName::local("a"), "1");
    let pul: PendingUpdateList<NodeId> =
        vec![PendingUpdate::insert_into_as_last(real(e), vec![Pointer::silhouette(a)])].into();
    assert_eq!(
        eval.apply_updates(pul).unwrap_err().code_enum(),
        ErrorCode::XUTY0004
    );
}

#[rstest]
fn real_content_is_copied_by_default() {
    let mut d = SimpleDocument::new();
    let src = d.build(elem("src").child(elem("item")));
    let dst = d.build(elem("dst"));
    let item = d.first_child(&src, None).unwrap();
    let mut eval = Evaluation::new(&mut d);
    let pul: PendingUpdateList<NodeId> = vec![
        PendingUpdate::insert_into(real(dst), vec![real(item)]),
        PendingUpdate::insert_into(real(dst), vec![real(item)]),
    ]
    .into();
    eval.apply_updates(pul).unwrap();
    let host = eval.host();
    assert_eq!(host.to_xml(dst), "<dst><item/><item/></dst>");
    assert_eq!(host.to_xml(src), "<src><item/></src>");
    assert_ne!(host.first_child(&dst, None), Some(item));
}

#[rstest]
fn real_content_moves_when_copying_is_disabled() {
    let mut d = SimpleDocument::new();
    let src = d.build(elem("src").child(elem("item")));
    let dst = d.build(elem("dst"));
    let item = d.first_child(&src, None).unwrap();
    let options = EvaluationOptionsBuilder::new()
        .with_copy_inserted_content(false)
        .build();
    let mut eval = Evaluation::with_options(&mut d, options);
    let pul: PendingUpdateList<NodeId> =
        vec![PendingUpdate::insert_into(real(dst), vec![real(item)])].into();
    eval.apply_updates(pul).unwrap();
    let host = eval.host();
    assert_eq!(host.to_xml(dst), "<dst><item/></dst>");
    assert_eq!(host.to_xml(src), "<src/>");
    assert_eq!(host.first_child(&dst, None), Some(item));
}

#[rstest]
fn host_failure_midway_is_internal() {
    let mut d = SimpleDocument::new();
    let r = d.build(elem("r").child(elem("a")));
    let a = d.first_child(&r, None).unwrap();
    let options = EvaluationOptionsBuilder::new()
        .with_copy_inserted_content(false)
        .build();
    let mut eval = Evaluation::with_options(&mut d, options);
    let pul: PendingUpdateList<NodeId> =
        vec![PendingUpdate::insert_into(real(a), vec![real(r)])].into();
    let err = eval.apply_updates(pul).unwrap_err();
    assert!(err.is_fatal());
    let cause = std::error::Error::source(&err).expect("host error is kept as the source");
    assert!(cause.to_string().contains("own subtree"));
}

#[rstest]
fn empty_list_is_a_no_op() {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e"));
    let mut eval = Evaluation::new(&mut d);
    eval.apply_updates(PendingUpdateList::new()).unwrap();
    assert_eq!(eval.host().to_xml(e), "<e/>");
}
