//! Tests for the CSR graph source.

use super::*;
use crate::collections::huge::HugeArray;
use crate::error::Error;

fn targets_of(g: &dyn Graph, node: u64) -> Vec<(u64, f64)> {
    let mut out = Vec::new();
    g.for_each_relationship(node, &mut |t, w| {
        out.push((t, w));
        true
    });
    out
}

#[test]
fn from_adjacency_basic() {
    // 0 -> 1, 2 ; 1 -> 2 ; 2 -> ; 3 -> 1
    let g = CsrGraph::from_adjacency(&[vec![1, 2], vec![2], vec![], vec![1]]).unwrap();
    assert_eq!(g.node_count(), 4);
    assert_eq!(g.relationship_count(), 4);
    assert_eq!(g.degree(0), 2);
    assert_eq!(g.degree(2), 0);
    assert_eq!(g.neighbors(3).collect::<Vec<_>>(), vec![1]);
    assert_eq!(targets_of(&g, 0), vec![(1, DEFAULT_WEIGHT), (2, DEFAULT_WEIGHT)]);
    assert!(!g.has_relationship_weights());
}

#[test]
fn from_adjacency_rejects_dangling_target() {
    let err = CsrGraph::from_adjacency(&[vec![1], vec![5]]).unwrap_err();
    assert!(matches!(err, Error::IndexOutOfRange { index: 5, len: 2 }));
}

#[test]
fn from_edges_orientations() {
    let edges = [(0, 1), (1, 2)];
    let natural = CsrGraph::from_edges(3, &edges, Orientation::Natural).unwrap();
    assert_eq!(natural.neighbors(0).collect::<Vec<_>>(), vec![1]);
    assert_eq!(natural.degree(2), 0);

    let reverse = CsrGraph::from_edges(3, &edges, Orientation::Reverse).unwrap();
    assert_eq!(reverse.neighbors(2).collect::<Vec<_>>(), vec![1]);
    assert_eq!(reverse.degree(0), 0);

    let undirected = CsrGraph::from_edges(3, &edges, Orientation::Undirected).unwrap();
    assert_eq!(undirected.relationship_count(), 4);
    let mut n1: Vec<_> = undirected.neighbors(1).collect();
    n1.sort_unstable();
    assert_eq!(n1, vec![0, 2]);
}

#[test]
fn from_edges_rejects_unknown_node() {
    let err = CsrGraph::from_edges(2, &[(0, 2)], Orientation::Natural).unwrap_err();
    assert!(matches!(err, Error::IndexOutOfRange { index: 2, len: 2 }));
}

#[test]
fn weighted_edges_report_weights() {
    let g = CsrGraph::from_weighted_edges(3, &[(0, 1, 0.5), (0, 2, 2.0)], Orientation::Natural)
        .unwrap();
    assert!(g.has_relationship_weights());
    assert_eq!(targets_of(&g, 0), vec![(1, 0.5), (2, 2.0)]);
}

#[test]
fn consumer_can_stop_early() {
    let g = CsrGraph::from_adjacency(&[vec![1, 2, 3], vec![], vec![], vec![]]).unwrap();
    let mut seen = 0;
    g.for_each_relationship(0, &mut |_, _| {
        seen += 1;
        seen < 2
    });
    assert_eq!(seen, 2);
}

#[test]
fn high_degree_node_spans_target_pages() {
    // more targets than one page of u64 holds
    let fan_out = 5_000u64;
    let n = fan_out + 1;
    let edges: Vec<(u64, u64)> = (1..n).map(|t| (0, t)).collect();
    let g = CsrGraph::from_edges(n, &edges, Orientation::Natural).unwrap();
    assert_eq!(g.degree(0), fan_out);
    let got: Vec<u64> = targets_of(&g, 0).into_iter().map(|(t, _)| t).collect();
    assert_eq!(got, (1..n).collect::<Vec<_>>());
}

#[test]
fn from_csr_parts_validates() {
    let offsets = HugeArray::from_fn(3, |i| [0, 1, 2][i as usize]).unwrap();
    let targets = HugeArray::from_fn(2, |i| [1, 0][i as usize]).unwrap();
    let g = CsrGraph::from_csr_parts(offsets, targets, None).unwrap();
    assert_eq!(g.neighbors(1).collect::<Vec<_>>(), vec![0]);

    let bad_offsets = HugeArray::from_fn(3, |i| [0, 2, 1][i as usize]).unwrap();
    let targets = HugeArray::from_fn(1, |_| 0).unwrap();
    assert!(matches!(
        CsrGraph::from_csr_parts(bad_offsets, targets, None),
        Err(Error::InvalidConfig(_))
    ));

    let empty: HugeArray<u64> = HugeArray::new(0).unwrap();
    let none: HugeArray<u64> = HugeArray::new(0).unwrap();
    assert!(CsrGraph::from_csr_parts(empty, none, None).is_err());
}

#[test]
fn from_csr_parts_rejects_a_nonzero_first_offset() {
    // node 0 would skip target 0 entirely
    let offsets = HugeArray::from_fn(3, |i| [1, 2, 3][i as usize]).unwrap();
    let targets = HugeArray::from_fn(3, |i| [1, 0, 1][i as usize]).unwrap();
    let err = CsrGraph::from_csr_parts(offsets, targets, None).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(message) if message.contains("first offset")));
}

#[test]
fn unaddressable_node_count_is_an_allocation_error() {
    let err = CsrGraph::from_edges(u64::MAX, &[], Orientation::Natural).unwrap_err();
    assert!(matches!(err, Error::Allocation { .. }));
}
