//! Property tests for tree mutation and node flags

use fos_dom::{ConstructionType, Document, FlagSet, NodeId, StateFlag};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::select;

const POOL: usize = 8;

#[derive(Clone, Debug)]
enum Op {
    Append(usize, usize),
    InsertBefore(usize, usize, usize),
    Remove(usize),
    Replace(usize, usize, usize),
    Collect,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..=POOL, 0..POOL).prop_map(|(p, c)| Op::Append(p, c)),
        3 => (0..=POOL, 0..POOL, 0..POOL).prop_map(|(p, c, r)| Op::InsertBefore(p, c, r)),
        2 => (0..POOL).prop_map(Op::Remove),
        2 => (0..=POOL, 0..POOL, 0..POOL).prop_map(|(p, n, o)| Op::Replace(p, n, o)),
        1 => Just(Op::Collect),
    ]
}

/// Index `POOL` names `<body>`; lower indices name pooled elements and text
fn resolve(pool: &[NodeId], body: NodeId, index: usize) -> NodeId {
    pool.get(index).copied().unwrap_or(body)
}

fn check_links(doc: &Document, parent: NodeId) -> Result<(), TestCaseError> {
    let Some(node) = doc.node(parent) else { return Ok(()) };
    let children = doc.child_nodes(parent);
    prop_assert_eq!(node.first_child(), children.first().copied());
    prop_assert_eq!(node.last_child(), children.last().copied());
    let mut previous = None;
    for &child in &children {
        let c = doc.get(child).unwrap();
        prop_assert_eq!(c.parent(), Some(parent));
        prop_assert_eq!(c.previous_sibling(), previous);
        prop_assert_eq!(c.is_connected(), node.is_connected());
        prop_assert_eq!(c.tree_scope(), node.tree_scope());
        prop_assert!(!doc.contains(child, parent));
        previous = Some(child);
        check_links(doc, child)?;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn mutations_preserve_tree_invariants(ops in vec(op_strategy(), 1..40)) {
        let mut doc = Document::new("test://fuzz");
        let body = doc.create_element("body").unwrap();
        doc.append_child(doc.root(), body).unwrap();
        let mut pool: Vec<NodeId> = (0..POOL)
            .map(|i| if i % 3 == 2 { doc.create_text_node("t") } else { doc.create_element("div").unwrap() })
            .collect();
        for &node in &pool {
            doc.retain(node).unwrap();
        }

        for op in ops {
            let before: Vec<NodeId> = doc.descendants(doc.root()).collect();
            let result = match op {
                Op::Append(p, c) => {
                    let (p, c) = (resolve(&pool, body, p), pool[c]);
                    doc.append_child(p, c).map(|_| ())
                }
                Op::InsertBefore(p, c, r) => {
                    let (p, c, r) = (resolve(&pool, body, p), pool[c], pool[r]);
                    doc.insert_before(p, c, Some(r)).map(|_| ())
                }
                Op::Remove(c) => doc.remove(pool[c]),
                Op::Replace(p, n, o) => {
                    let (p, n, o) = (resolve(&pool, body, p), pool[n], pool[o]);
                    doc.replace_child(p, n, o).map(|_| ())
                }
                Op::Collect => {
                    doc.collect_garbage();
                    Ok(())
                }
            };
            if result.is_err() {
                let after: Vec<NodeId> = doc.descendants(doc.root()).collect();
                prop_assert_eq!(before, after);
            }
            check_links(&doc, doc.root())?;
            for &node in &pool {
                check_links(&doc, node)?;
                prop_assert!(doc.node(node).is_some());
                let flags = doc.get(node).unwrap().flags();
                prop_assert!(flags.get(StateFlag::IsFinishedParsingChildren));
            }
        }

        for node in pool.drain(..) {
            doc.release(node).unwrap();
        }
        doc.remove(body).unwrap();
        doc.collect_garbage();
        prop_assert_eq!(doc.len(), 1);
    }
}

const CONSTRUCTIONS: [ConstructionType; 10] = [
    ConstructionType::CreateOther,
    ConstructionType::CreateText,
    ConstructionType::CreateContainer,
    ConstructionType::CreateElement,
    ConstructionType::CreateDocumentFragment,
    ConstructionType::CreateShadowRoot,
    ConstructionType::CreateHtmlElement,
    ConstructionType::CreateMathMlElement,
    ConstructionType::CreateSvgElement,
    ConstructionType::CreateDocument,
];

proptest! {
    #[test]
    fn flag_writes_stay_in_their_bits(
        construction in select(CONSTRUCTIONS.to_vec()),
        writes in vec((0..StateFlag::ALL.len(), any::<bool>()), 0..32),
    ) {
        let mut flags = FlagSet::new(construction);
        let kind_bits = flags.bits() & FlagSet::KIND_MASK;
        let custom_state = flags.custom_element_state();
        let mut model: Vec<bool> = StateFlag::ALL.iter().map(|f| flags.get(*f)).collect();

        for (index, on) in writes {
            flags.set(StateFlag::ALL[index], on);
            model[index] = on;
            prop_assert_eq!(flags.bits() & FlagSet::KIND_MASK, kind_bits);
            prop_assert_eq!(flags.custom_element_state(), custom_state);
            for (flag, expected) in StateFlag::ALL.iter().zip(&model) {
                prop_assert_eq!(flags.get(*flag), *expected);
            }
        }
    }
}
