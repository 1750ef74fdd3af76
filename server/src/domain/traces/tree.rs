//! Span tree reconstruction
//!
//! Turns a flat, possibly incomplete span list into a forest for display.
//! Orphans (declared parent absent from the input) become roots, so a tree
//! can always be rendered from whatever subset of a trace has arrived.
//!
//! Nodes live in one flat arena and refer to each other by index. Every
//! traversal runs on an explicit stack, so arbitrarily deep parent chains
//! cost heap, never call-stack depth.

use std::collections::HashMap;

use crate::data::types::Span;

#[derive(Debug)]
struct ArenaNode {
    span: Span,
    depth: usize,
    children: Vec<usize>,
}

/// Forest built by [`SpanTreeBuilder::build`]. Built per read, never stored.
#[derive(Debug, Default)]
pub struct SpanForest {
    nodes: Vec<ArenaNode>,
    roots: Vec<usize>,
}

/// Borrowed handle to one node of a [`SpanForest`]
#[derive(Debug, Clone, Copy)]
pub struct SpanTreeNode<'a> {
    forest: &'a SpanForest,
    index: usize,
}

impl<'a> SpanTreeNode<'a> {
    pub fn span(&self) -> &'a Span {
        &self.forest.nodes[self.index].span
    }

    /// Distance from the root; roots are at 0
    pub fn depth(&self) -> usize {
        self.forest.nodes[self.index].depth
    }

    /// Children ordered by start time
    pub fn children(self) -> impl ExactSizeIterator<Item = SpanTreeNode<'a>> + 'a {
        let forest = self.forest;
        forest.nodes[self.index]
            .children
            .iter()
            .map(move |&index| SpanTreeNode { forest, index })
    }

    /// Number of nodes in this subtree, including self
    pub fn size(&self) -> usize {
        let mut size = 0;
        let mut stack = vec![self.index];
        while let Some(i) = stack.pop() {
            size += 1;
            stack.extend(self.forest.nodes[i].children.iter().copied());
        }
        size
    }

    /// This node and its descendants in depth-first display order
    pub fn descendants(&self) -> Vec<SpanTreeNode<'a>> {
        self.forest.walk(&[self.index])
    }
}

impl SpanForest {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Roots ordered by start time
    pub fn roots(&self) -> impl ExactSizeIterator<Item = SpanTreeNode<'_>> {
        self.roots.iter().map(move |&index| SpanTreeNode {
            forest: self,
            index,
        })
    }

    /// Every node in depth-first display order: each parent is followed by
    /// its subtree, siblings by start time
    pub fn preorder(&self) -> Vec<SpanTreeNode<'_>> {
        self.walk(&self.roots)
    }

    fn walk(&self, from: &[usize]) -> Vec<SpanTreeNode<'_>> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = from.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            out.push(SpanTreeNode {
                forest: self,
                index,
            });
            stack.extend(self.nodes[index].children.iter().rev().copied());
        }
        out
    }
}

pub struct SpanTreeBuilder;

impl SpanTreeBuilder {
    /// Build the forest for `spans`.
    ///
    /// Spans are keyed by `(trace_id, span_id)`; when the same key appears
    /// twice only the first occurrence is kept. Siblings (and roots) are
    /// stably sorted by `start_time`, so ties keep input order.
    pub fn build(spans: Vec<Span>) -> SpanForest {
        let mut index: HashMap<(String, String), usize> = HashMap::with_capacity(spans.len());
        let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
        for span in spans {
            let key = (span.trace_id.clone(), span.span_id.clone());
            if index.contains_key(&key) {
                tracing::debug!(
                    trace_id = %span.trace_id,
                    span_id = %span.span_id,
                    "Duplicate span in tree input, keeping first"
                );
                continue;
            }
            index.insert(key, kept.len());
            kept.push(span);
        }

        let len = kept.len();

        // Resolve parents present in the input
        let mut parent: Vec<Option<usize>> = vec![None; len];
        for (i, span) in kept.iter().enumerate() {
            if let Some(parent_id) = &span.parent_span_id
                && let Some(&p) = index.get(&(span.trace_id.clone(), parent_id.clone()))
                && p != i
            {
                parent[i] = Some(p);
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); len];
        for (i, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(i);
            }
        }

        let mut roots: Vec<usize> = (0..len).filter(|&i| parent[i].is_none()).collect();

        // Anything unreachable from a root sits on a parent cycle. Promote the
        // earliest such span to a root until every span is reachable.
        let mut visited = vec![false; len];
        for &r in &roots {
            mark_reachable(r, &children, &mut visited);
        }
        loop {
            let next = (0..len)
                .filter(|&i| !visited[i])
                .min_by_key(|&i| (kept[i].start_time, i));
            let Some(promoted) = next else { break };
            if let Some(p) = parent[promoted].take() {
                children[p].retain(|&c| c != promoted);
            }
            tracing::debug!(
                span_id = %kept[promoted].span_id,
                "Parent cycle detected, promoting span to root"
            );
            roots.push(promoted);
            mark_reachable(promoted, &children, &mut visited);
        }

        sort_by_start(&mut roots, &kept);
        for list in children.iter_mut() {
            sort_by_start(list, &kept);
        }

        let mut depth = vec![0usize; len];
        let mut stack = roots.clone();
        while let Some(i) = stack.pop() {
            for &c in &children[i] {
                depth[c] = depth[i] + 1;
                stack.push(c);
            }
        }

        let nodes = kept
            .into_iter()
            .zip(children)
            .zip(depth)
            .map(|((span, children), depth)| ArenaNode {
                span,
                depth,
                children,
            })
            .collect();
        SpanForest { nodes, roots }
    }

    /// Total number of nodes in the forest
    pub fn count(forest: &SpanForest) -> usize {
        forest.roots().map(|root| root.size()).sum()
    }

    /// Depth-first search for a span id anywhere in the forest
    pub fn find<'a>(forest: &'a SpanForest, span_id: &str) -> Option<SpanTreeNode<'a>> {
        let mut stack: Vec<usize> = forest.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            let node = &forest.nodes[index];
            if node.span.span_id == span_id {
                return Some(SpanTreeNode { forest, index });
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }
}

fn mark_reachable(start: usize, children: &[Vec<usize>], visited: &mut [bool]) {
    let mut stack = vec![start];
    while let Some(i) = stack.pop() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        stack.extend(children[i].iter().copied());
    }
}

/// Stable: equal start times keep their current relative order
fn sort_by_start(ids: &mut [usize], spans: &[Span]) {
    ids.sort_by_key(|&i| spans[i].start_time);
}
