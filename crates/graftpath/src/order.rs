//! Document order over pointers.
//!
//! Nodes sharing a root are ordered by tree position. Nodes from unrelated trees are
//! ordered by the position of their roots in a [`TieBreakers`] table, which only grows,
//! so the relative order of two trees never flips during one evaluation.
use core::cmp::Ordering;

use smallvec::SmallVec;

use crate::facade::NodeFacade;
use crate::model::{HostTree, NodeKind};
use crate::pointer::Pointer;
use crate::runtime::Error;

type Ptr<H> = Pointer<<H as HostTree>::Node>;
type Chain<N> = SmallVec<[Pointer<N>; 16]>;

/// Append-only list of tree roots seen while ordering unrelated nodes.
#[derive(Debug, Clone)]
pub struct TieBreakers<N> {
    roots: Vec<Pointer<N>>,
}

impl<N> Default for TieBreakers<N> {
    fn default() -> Self {
        Self { roots: Vec::new() }
    }
}

impl<N: Clone + PartialEq> TieBreakers<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordinal of `root`, assigning the next one on first sight.
    pub fn ordinal(&mut self, root: &Pointer<N>) -> usize {
        match self.roots.iter().position(|r| r == root) {
            Some(i) => i,
            None => {
                self.roots.push(root.clone());
                self.roots.len() - 1
            }
        }
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Ancestor-or-self chain, root first. Document nodes always end the upward walk.
fn ancestors<H: HostTree>(facade: &NodeFacade<'_, H>, ptr: &Ptr<H>) -> Result<Chain<H::Node>, Error> {
    let mut chain: Chain<H::Node> = SmallVec::new();
    chain.push(ptr.clone());
    let mut cur = ptr.clone();
    while facade.node_kind(&cur) != NodeKind::Document {
        match facade.parent_node(&cur, None)? {
            Some(parent) => {
                chain.push(parent.clone());
                cur = parent;
            }
            None => break,
        }
    }
    chain.reverse();
    Ok(chain)
}

/// Tree order without the attribute rule: attributes of a parent precede its children.
pub fn compare_positions<H: HostTree>(
    facade: &NodeFacade<'_, H>,
    tie_breakers: &mut TieBreakers<H::Node>,
    a: &Ptr<H>,
    b: &Ptr<H>,
) -> Result<Ordering, Error> {
    if a == b {
        return Ok(Ordering::Equal);
    }
    let pa = ancestors(facade, a)?;
    let pb = ancestors(facade, b)?;
    if pa[0] != pb[0] {
        let oa = tie_breakers.ordinal(&pa[0]);
        let ob = tie_breakers.ordinal(&pb[0]);
        return Ok(oa.cmp(&ob));
    }
    let len = pa.len().min(pb.len());
    let mut i = 1usize;
    while i < len && pa[i] == pb[i] {
        i += 1;
    }
    if i == len {
        // shorter chain is the ancestor
        return Ok(pa.len().cmp(&pb.len()));
    }
    let parent = &pa[i - 1];
    let (na, nb) = (&pa[i], &pb[i]);
    let siblings = facade
        .all_attributes(parent, None)
        .into_iter()
        .chain(facade.child_nodes(parent, None));
    for sibling in siblings {
        if &sibling == na {
            return Ok(Ordering::Less);
        }
        if &sibling == nb {
            return Ok(Ordering::Greater);
        }
    }
    Err(Error::internal("nodes are not in the same tree"))
}

/// Order used for sequences. An attribute sorts right after its owner element and before
/// that element's children; attributes of one element sort by local name, namespace URI
/// and prefix.
pub fn compare<H: HostTree>(
    facade: &NodeFacade<'_, H>,
    tie_breakers: &mut TieBreakers<H::Node>,
    a: &Ptr<H>,
    b: &Ptr<H>,
) -> Result<Ordering, Error> {
    if a == b {
        return Ok(Ordering::Equal);
    }
    let a_attr = facade.node_kind(a) == NodeKind::Attribute;
    let b_attr = facade.node_kind(b) == NodeKind::Attribute;
    if !a_attr && !b_attr {
        return compare_positions(facade, tie_breakers, a, b);
    }
    let subject_a = if a_attr {
        facade.parent_node(a, None)?.unwrap_or_else(|| a.clone())
    } else {
        a.clone()
    };
    let subject_b = if b_attr {
        facade.parent_node(b, None)?.unwrap_or_else(|| b.clone())
    } else {
        b.clone()
    };
    let ord = compare_positions(facade, tie_breakers, &subject_a, &subject_b)?;
    if ord != Ordering::Equal {
        return Ok(ord);
    }
    match (a_attr, b_attr) {
        (true, false) => Ok(Ordering::Greater),
        (false, true) => Ok(Ordering::Less),
        _ => {
            let (qa, qb) = (facade.qname(a), facade.qname(b));
            let by_name = match (&qa, &qb) {
                (Some(x), Some(y)) => x
                    .local
                    .cmp(&y.local)
                    .then_with(|| x.ns_uri.cmp(&y.ns_uri))
                    .then_with(|| x.prefix.cmp(&y.prefix)),
                _ => Ordering::Equal,
            };
            if by_name != Ordering::Equal {
                return Ok(by_name);
            }
            compare_positions(facade, tie_breakers, a, b)
        }
    }
}

/// Stable sort by [`compare`], then drop adjacent pointers denoting the same node.
pub fn sort_and_dedup<H: HostTree>(
    facade: &NodeFacade<'_, H>,
    tie_breakers: &mut TieBreakers<H::Node>,
    mut pointers: Vec<Ptr<H>>,
) -> Result<Vec<Ptr<H>>, Error> {
    let mut first_err: Option<Error> = None;
    pointers.sort_by(|x, y| match compare(facade, tie_breakers, x, y) {
        Ok(ord) => ord,
        Err(e) => {
            first_err.get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = first_err {
        return Err(e);
    }
    pointers.dedup();
    Ok(pointers)
}
