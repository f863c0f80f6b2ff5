use crate::facade::NodeFacade;
use crate::model::{HostTree, NodeKind, QName};
use crate::pointer::Pointer;
use crate::runtime::{Error, ErrorCode};

use super::primitive::{PendingUpdate, UpdateKind};

/// Ordered list of pending updates. Order matters to the compatibility check and to
/// application order within one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdateList<N> {
    updates: Vec<PendingUpdate<N>>,
}

impl<N> Default for PendingUpdateList<N> {
    fn default() -> Self {
        Self {
            updates: Vec::new(),
        }
    }
}

impl<N> PendingUpdateList<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, update: PendingUpdate<N>) {
        self.updates.push(update);
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, PendingUpdate<N>> {
        self.updates.iter()
    }

    pub fn as_slice(&self) -> &[PendingUpdate<N>] {
        &self.updates
    }
}

impl<N> From<Vec<PendingUpdate<N>>> for PendingUpdateList<N> {
    fn from(updates: Vec<PendingUpdate<N>>) -> Self {
        Self { updates }
    }
}

impl<N> FromIterator<PendingUpdate<N>> for PendingUpdateList<N> {
    fn from_iter<I: IntoIterator<Item = PendingUpdate<N>>>(iter: I) -> Self {
        Self {
            updates: iter.into_iter().collect(),
        }
    }
}

impl<N> IntoIterator for PendingUpdateList<N> {
    type Item = PendingUpdate<N>;
    type IntoIter = std::vec::IntoIter<PendingUpdate<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.updates.into_iter()
    }
}

impl<'a, N> IntoIterator for &'a PendingUpdateList<N> {
    type Item = &'a PendingUpdate<N>;
    type IntoIter = core::slice::Iter<'a, PendingUpdate<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.updates.iter()
    }
}

/// Concatenate update lists in argument order. Nothing is dropped or reordered.
pub fn merge_updates<N>(
    first: PendingUpdateList<N>,
    others: impl IntoIterator<Item = PendingUpdateList<N>>,
) -> PendingUpdateList<N> {
    let mut merged = first;
    for other in others {
        merged.updates.extend(other.updates);
    }
    merged
}

fn duplicate_target<'p, N: PartialEq>(
    pul: &'p PendingUpdateList<N>,
    kinds: &[UpdateKind],
) -> Option<&'p Pointer<N>> {
    let mut seen: Vec<&Pointer<N>> = Vec::new();
    for update in pul.iter().filter(|u| kinds.contains(&u.kind())) {
        let target = update.target();
        if seen.contains(&target) {
            return Some(target);
        }
        seen.push(target);
    }
    None
}

/// Reject update lists whose primitives cannot be applied together.
///
/// Duplicate targets are checked kind by kind (rename, replace node, replace value and
/// replace element content, put), each in primitive order; namespace bindings last.
pub fn compatibility_check<H: HostTree>(
    pul: &PendingUpdateList<H::Node>,
    facade: &NodeFacade<'_, H>,
) -> Result<(), Error> {
    let describe = |p: &Pointer<H::Node>| {
        facade
            .node_name(p)
            .unwrap_or_else(|| format!("{:?}", facade.node_kind(p)))
    };

    if let Some(t) = duplicate_target(pul, &[UpdateKind::Rename]) {
        return Err(Error::from_code(
            ErrorCode::XUDY0015,
            format!("node {} is the target of more than one rename", describe(t)),
        ));
    }
    if let Some(t) = duplicate_target(pul, &[UpdateKind::ReplaceNode]) {
        return Err(Error::from_code(
            ErrorCode::XUDY0016,
            format!("node {} is the target of more than one replace node", describe(t)),
        ));
    }
    if let Some(t) = duplicate_target(pul, &[UpdateKind::ReplaceValue]) {
        return Err(Error::from_code(
            ErrorCode::XUDY0017,
            format!("node {} is the target of more than one replace value", describe(t)),
        ));
    }
    if let Some(t) = duplicate_target(pul, &[UpdateKind::ReplaceElementContent]) {
        return Err(Error::from_code(
            ErrorCode::XUDY0017,
            format!(
                "node {} is the target of more than one replace element content",
                describe(t)
            ),
        ));
    }
    let mut uris: Vec<&str> = Vec::new();
    for update in pul {
        if let PendingUpdate::Put { uri, .. } = update {
            if uris.contains(&uri.as_str()) {
                return Err(Error::from_code(
                    ErrorCode::XUDY0031,
                    format!("more than one put to {}", uri),
                ));
            }
            uris.push(uri);
        }
    }

    check_namespace_bindings(pul, facade)
}

/// Namespace bindings introduced by insert attributes, replace node (of an attribute)
/// and rename. Insert-into style content is not inspected.
fn check_namespace_bindings<H: HostTree>(
    pul: &PendingUpdateList<H::Node>,
    facade: &NodeFacade<'_, H>,
) -> Result<(), Error> {
    let mut by_element: Vec<(Pointer<H::Node>, Vec<(String, String)>)> = Vec::new();
    let mut add = |element: Pointer<H::Node>, name: &QName, is_attribute: bool| {
        let Some(binding) = name.implied_binding(is_attribute) else {
            return;
        };
        match by_element.iter_mut().find(|(e, _)| *e == element) {
            Some((_, bindings)) => bindings.push(binding),
            None => by_element.push((element, vec![binding])),
        }
    };

    for update in pul {
        match update {
            PendingUpdate::InsertAttributes { target, content } => {
                for attribute in content {
                    if let Some(name) = facade.qname(attribute) {
                        add(target.clone(), &name, true);
                    }
                }
            }
            PendingUpdate::ReplaceNode {
                target,
                replacement,
            } if facade.node_kind(target) == NodeKind::Attribute => {
                let Some(element) = facade.parent_node(target, None)? else {
                    continue;
                };
                for attribute in replacement {
                    if facade.node_kind(attribute) != NodeKind::Attribute {
                        continue;
                    }
                    if let Some(name) = facade.qname(attribute) {
                        add(element.clone(), &name, true);
                    }
                }
            }
            PendingUpdate::Rename { target, new_name } => match facade.node_kind(target) {
                NodeKind::Element => add(target.clone(), new_name, false),
                NodeKind::Attribute => {
                    if let Some(element) = facade.parent_node(target, None)? {
                        add(element, new_name, true);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    for (element, bindings) in &by_element {
        let mut bound: Vec<(&str, &str)> = Vec::new();
        for (prefix, uri) in bindings {
            match bound.iter().find(|(p, _)| p == prefix) {
                Some((_, existing)) if existing != uri => {
                    return Err(Error::from_code(
                        ErrorCode::XUDY0024,
                        format!(
                            "prefix '{}' bound to both '{}' and '{}' on element {}",
                            prefix,
                            existing,
                            uri,
                            facade.node_name(element).unwrap_or_default()
                        ),
                    ));
                }
                Some(_) => {}
                None => bound.push((prefix.as_str(), uri.as_str())),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::{SimpleDocument, elem};
    use crate::pointer::SilhouetteArena;

    #[test]
    fn merge_keeps_argument_order() {
        let a: PendingUpdateList<u32> = vec![PendingUpdate::delete(Pointer::real(1))].into();
        let b: PendingUpdateList<u32> = vec![PendingUpdate::delete(Pointer::real(2))].into();
        let c: PendingUpdateList<u32> = vec![PendingUpdate::delete(Pointer::real(1))].into();
        let merged = merge_updates(a, [b, c]);
        let targets: Vec<_> = merged.iter().map(|u| *u.target().real_node().unwrap()).collect();
        assert_eq!(targets, vec![1, 2, 1]);
    }

    #[test]
    fn duplicate_put_uri() {
        let mut d = SimpleDocument::new();
        let e = d.build(elem("e"));
        let arena = SilhouetteArena::new();
        let facade = NodeFacade::new(&d, &arena);
        let pul: PendingUpdateList<_> = vec![
            PendingUpdate::put(Pointer::real(e), "file:///a.xml"),
            PendingUpdate::put(Pointer::real(e), "file:///a.xml"),
        ]
        .into();
        let err = compatibility_check(&pul, &facade).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XUDY0031);
    }
}
