use core::cmp::Ordering;

use graftpath::{
    Evaluation, HostTree, NodeRef, Pointer, QName, SimpleDocument, attr, attr_ns, elem, text,
};
use rstest::rstest;

#[rstest]
fn attributes_sort_between_owner_and_children() {
    let mut d = SimpleDocument::new();
    let e = d.build(
        elem("E")
            .attr(attr("b", "2"))
            .attr(attr("a", "1"))
            .child(elem("C")),
    );
    let mut eval = Evaluation::new(&mut d);
    let facade = eval.facade();
    let owner = Pointer::real(e);
    let c = facade.first_child(&owner, None).unwrap();
    let b = facade.attribute_node(&owner, "b").unwrap();
    let a = facade.attribute_node(&owner, "a").unwrap();

    let sorted = eval
        .sort_and_dedup(vec![c.clone(), b.clone(), a.clone(), owner.clone()])
        .unwrap();
    assert_eq!(sorted, vec![owner, a, b, c]);
}

#[rstest]
fn attributes_with_equal_local_names_order_by_namespace_then_prefix() {
    let mut d = SimpleDocument::new();
    let e = d.build(
        elem("e")
            .attr(attr_ns("z", "id", "urn:b", "1"))
            .attr(attr_ns("y", "id", "urn:a", "2"))
            .attr(attr("id", "3")),
    );
    let mut eval = Evaluation::new(&mut d);
    let facade = eval.facade();
    let owner = Pointer::real(e);
    let plain = facade.attribute_node(&owner, "id").unwrap();
    let in_a = facade.attribute_node(&owner, "y:id").unwrap();
    let in_b = facade.attribute_node(&owner, "z:id").unwrap();

    let sorted = eval
        .sort_and_dedup(vec![in_b.clone(), plain.clone(), in_a.clone()])
        .unwrap();
    // no namespace sorts first
    assert_eq!(sorted, vec![plain, in_a, in_b]);
}

#[rstest]
fn same_tree_comparison_is_antisymmetric() {
    let mut d = SimpleDocument::new();
    let root = d.build(
        elem("r")
            .attr(attr("k", "v"))
            .child(elem("a").child(text("x")))
            .child(elem("b").child(elem("c"))),
    );
    let mut eval = Evaluation::new(&mut d);
    let facade = eval.facade();
    let r = Pointer::real(root);
    let mut all = vec![r.clone()];
    let mut stack = vec![r];
    while let Some(p) = stack.pop() {
        all.extend(facade.all_attributes(&p, None));
        for child in facade.child_nodes(&p, None) {
            all.push(child.clone());
            stack.push(child);
        }
    }
    assert_eq!(all.len(), 6);

    for x in &all {
        for y in &all {
            let forward = eval.compare(x, y).unwrap();
            let backward = eval.compare(y, x).unwrap();
            assert_eq!(forward, backward.reverse());
            assert_eq!(forward == Ordering::Equal, x == y);
        }
    }
    assert!(eval.tie_breakers().is_empty());
}

#[rstest]
fn unrelated_trees_keep_their_first_relative_order() {
    let mut d = SimpleDocument::new();
    let x = d.build(elem("x").child(elem("x1")));
    let y = d.build(elem("y"));
    let z = d.build(elem("z"));
    let x1 = d.first_child(&x, None).unwrap();
    let mut eval = Evaluation::new(&mut d);
    let (px, px1, py, pz) = (
        Pointer::real(x),
        Pointer::real(x1),
        Pointer::real(y),
        Pointer::real(z),
    );

    let first = eval.compare(&py, &px1).unwrap();
    assert_ne!(first, Ordering::Equal);
    assert_eq!(eval.compare(&pz, &py).unwrap(), Ordering::Greater);
    assert_eq!(eval.compare(&py, &px1).unwrap(), first);
    assert_eq!(eval.compare(&px1, &py).unwrap(), first.reverse());
    // the whole tree of x1 shares its root's ordinal
    assert_eq!(eval.compare(&py, &px).unwrap(), first);
    assert_eq!(eval.tie_breakers().len(), 3);
}

#[rstest]
fn virtual_and_real_content_share_one_order() {
    let mut d = SimpleDocument::new();
    let real = d.build(elem("r").child(text("t")));
    let mut eval = Evaluation::new(&mut d);
    let before = eval.arena_mut().text("before");
    let wrapper = eval.arena_mut().element(
        QName::local("w"),
        vec![],
        vec![NodeRef::Silhouette(before), NodeRef::Real(real)],
    );
    let facade = eval.facade();
    let w = Pointer::silhouette(wrapper);
    let kids = facade.child_nodes(&w, None);
    let t = facade.first_child(&kids[1], None).unwrap();

    let sorted = eval
        .sort_and_dedup(vec![t.clone(), kids[1].clone(), w.clone(), kids[0].clone()])
        .unwrap();
    assert_eq!(sorted, vec![w, kids[0].clone(), kids[1].clone(), t]);
    // the spliced node and the host node are different positions
    assert_eq!(eval.compare(&Pointer::real(real), &kids[1]).unwrap(), Ordering::Less);
}

#[rstest]
fn duplicates_collapse_even_when_built_separately() {
    let mut d = SimpleDocument::new();
    let root = d.build(elem("r").child(elem("a")).child(elem("b")));
    let mut eval = Evaluation::new(&mut d);
    let facade = eval.facade();
    let r = Pointer::real(root);
    let a = facade.first_child(&r, None).unwrap();
    let b = facade.last_child(&r, None).unwrap();
    let a_again = facade.previous_sibling(&b, None).unwrap().unwrap();

    let sorted = eval
        .sort_and_dedup(vec![b.clone(), a.clone(), a_again, b.clone(), r.clone()])
        .unwrap();
    assert_eq!(sorted, vec![r, a, b]);
}

#[rstest]
fn broken_pointer_fails_the_sort() {
    let mut d = SimpleDocument::new();
    let e = d.build(elem("e"));
    let mut eval = Evaluation::new(&mut d);
    let stray = eval.arena_mut().text("stray");
    let holder = eval.arena_mut().element(QName::local("h"), vec![], vec![]);
    let broken = Pointer::new(
        NodeRef::Silhouette(stray),
        Some(std::sync::Arc::new(graftpath::GraftPoint::new(
            holder,
            graftpath::Offset::Index(0),
            None,
        ))),
    );
    let err = eval
        .sort_and_dedup(vec![Pointer::real(e), broken])
        .unwrap_err();
    assert!(err.is_fatal());
}
