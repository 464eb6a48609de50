//! Sequence, dict and comprehension values.
//!
//! Literal-backed sequences iterate lazily over their element nodes in
//! source order. Comprehensions evaluate their `for` chain per iteration,
//! binding targets through the predefined-names stack so the entry
//! expression sees one iteration's values at a time.

use crate::arena::{
    ArrayType, ComprehensionData, FakeSequenceData, Literal, SequenceData, ValueData,
};
use crate::context::{ContextData, ContextId};
use crate::lazy::LazyValue;
use crate::state::InferenceState;
use crate::value_set::{NO_VALUES, ValueSet};
use pysense_common::error::ItemNotFound;
use pysense_common::interner::Atom;
use pysense_syntax::kind::SyntaxKind;
use pysense_syntax::scope;
use pysense_syntax::tree::{NodeIndex, Tree};
use rustc_hash::FxHashMap;

impl InferenceState {
    // -----------------------------------------------------------------------
    // Literal sequences
    // -----------------------------------------------------------------------

    /// The element expression nodes of a literal sequence, in order.
    /// StarExpr elements are returned as-is and expanded by the caller.
    fn sequence_element_nodes(&self, data: &SequenceData) -> Vec<NodeIndex> {
        let Some(tree) = self.context_tree(data.context) else {
            return Vec::new();
        };
        let node = data.atom_node;
        match tree.kind(node) {
            SyntaxKind::TestList => tree.children(node).to_vec(),
            SyntaxKind::Atom => {
                let inner: Vec<NodeIndex> = tree
                    .children(node)
                    .iter()
                    .copied()
                    .filter(|&c| tree.kind(c) != SyntaxKind::Operator)
                    .collect();
                match inner.first() {
                    Some(&content) => match tree.kind(content) {
                        SyntaxKind::TestList => tree.children(content).to_vec(),
                        SyntaxKind::DictMaker => Vec::new(), // handled separately
                        _ => vec![content],
                    },
                    // Empty brackets have no content children.
                    None => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    pub(crate) fn iterate_sequence_literal(&mut self, data: &SequenceData) -> Vec<LazyValue> {
        let Some(tree) = self.context_tree(data.context) else {
            return Vec::new();
        };
        // `x = [*x]` would otherwise re-enter through the starred element.
        let Some(module) = self.context_module(data.context) else {
            return Vec::new();
        };
        let key = (module, data.atom_node);
        if !self.statement_guard.enter(key).is_entered() {
            return Vec::new();
        }
        let result = self.iterate_sequence_literal_inner(data, &tree);
        self.statement_guard.leave(key);
        result
    }

    fn iterate_sequence_literal_inner(
        &mut self,
        data: &SequenceData,
        tree: &Tree,
    ) -> Vec<LazyValue> {
        if data.array_type == ArrayType::Dict {
            return self.iterate_dict_literal(data, tree);
        }
        let mut lazies = Vec::new();
        for element in self.sequence_element_nodes(data) {
            if tree.kind(element) == SyntaxKind::StarExpr {
                // `[1, *x]`: splice x's elements in.
                let Some(&inner) = tree.children(element).get(1) else {
                    continue;
                };
                let sources = self.infer_node(data.context, inner);
                let mut spliced: Vec<LazyValue> = Vec::new();
                for v in sources.iter() {
                    spliced.extend(self.iterate(v));
                }
                let exact = spliced.iter().all(|l| l.min == 1 && l.max == 1);
                if exact {
                    lazies.extend(spliced);
                } else {
                    lazies.push(LazyValue::merged(spliced).with_cardinality(0, u32::MAX));
                }
            } else {
                lazies.push(LazyValue::tree(data.context, element));
            }
        }
        lazies
    }

    fn iterate_dict_literal(&mut self, data: &SequenceData, tree: &Tree) -> Vec<LazyValue> {
        let Some(maker) = crate::arguments::dict_maker_of(tree, data.atom_node) else {
            return Vec::new();
        };
        let children = tree.children(maker).to_vec();
        let mut lazies = Vec::new();
        let mut i = 0;
        while i + 1 < children.len() {
            if tree.leaf_is(children[i], "**") {
                let inner = self.infer_node(data.context, children[i + 1]);
                for v in inner.iter() {
                    lazies.extend(self.iterate(v));
                }
            } else {
                lazies.push(LazyValue::tree(data.context, children[i]));
            }
            i += 2;
        }
        lazies
    }

    pub(crate) fn sequence_simple_getitem(
        &mut self,
        data: &SequenceData,
        index: &Literal,
    ) -> Result<ValueSet, ItemNotFound> {
        let Some(tree) = self.context_tree(data.context) else {
            return Err(ItemNotFound);
        };
        match data.array_type {
            ArrayType::Dict => {
                let maker = crate::arguments::dict_maker_of(&tree, data.atom_node)
                    .ok_or(ItemNotFound)?;
                let children = tree.children(maker).to_vec();
                let mut i = 0;
                while i + 1 < children.len() {
                    if !tree.leaf_is(children[i], "**") {
                        if self.literal_of_node(&tree, children[i]).as_ref() == Some(index) {
                            return Ok(self.infer_node(data.context, children[i + 1]));
                        }
                    }
                    i += 2;
                }
                Err(ItemNotFound)
            }
            ArrayType::Set => Err(ItemNotFound),
            _ => {
                let elements = self.sequence_element_nodes(data);
                if elements
                    .iter()
                    .any(|&e| tree.kind(e) == SyntaxKind::StarExpr)
                {
                    // Splices make positions unreliable.
                    return Err(ItemNotFound);
                }
                let i = index.as_index().ok_or(ItemNotFound)?;
                let len = elements.len() as i64;
                let position = if i < 0 { len + i } else { i };
                if position < 0 || position >= len {
                    return Err(ItemNotFound);
                }
                Ok(self.infer_node(data.context, elements[position as usize]))
            }
        }
    }

    /// Literal constant of a leaf-ish expression node, if it is one.
    pub(crate) fn literal_of_node(&self, tree: &Tree, node: NodeIndex) -> Option<Literal> {
        match tree.kind(node) {
            SyntaxKind::Number => parse_number_literal(&tree.text(node)),
            SyntaxKind::Str => Some(Literal::Str(
                scope::clean_string_literal(&tree.text(node)).into(),
            )),
            SyntaxKind::Keyword => match &*tree.text(node) {
                "True" => Some(Literal::Bool(true)),
                "False" => Some(Literal::Bool(false)),
                "None" => Some(Literal::None),
                _ => None,
            },
            SyntaxKind::Factor => {
                let children = tree.children(node);
                if children.len() == 2 && tree.leaf_is(children[0], "-") {
                    match self.literal_of_node(tree, children[1])? {
                        Literal::Int(i) => Some(Literal::Int(-i)),
                        Literal::Float(bits) => Some(Literal::float(-f64::from_bits(bits))),
                        _ => None,
                    }
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Comprehensions
    // -----------------------------------------------------------------------

    /// Per-iteration values of a comprehension.
    pub(crate) fn iterate_comprehension(&mut self, data: &ComprehensionData) -> Vec<LazyValue> {
        let Some(tree) = self.context_tree(data.context) else {
            return Vec::new();
        };
        // A comprehension iterating something defined in terms of itself
        // must not loop.
        let Some(module) = self.context_module(data.context) else {
            return Vec::new();
        };
        let key = (module, data.comp_node);
        if !self.statement_guard.enter(key).is_entered() {
            return Vec::new();
        }
        let result = self.iterate_comprehension_inner(data, &tree);
        self.statement_guard.leave(key);
        result
    }

    fn iterate_comprehension_inner(
        &mut self,
        data: &ComprehensionData,
        tree: &Tree,
    ) -> Vec<LazyValue> {
        let children = tree.children(data.comp_node).to_vec();
        let (entry, comp_for) = match tree.kind(data.comp_node) {
            SyntaxKind::Comprehension => (children[0], children[1]),
            // Dict comprehensions iterate their keys.
            SyntaxKind::DictComp => (children[0], children[2]),
            _ => return Vec::new(),
        };
        let mut results = Vec::new();
        self.comp_iterate(data.context, comp_for, entry, &mut results);
        results
    }

    /// Dict-comprehension value sets for a known key are out of scope of
    /// `simple_getitem`; the values side is reachable through `.values()`
    /// level inference only when iterated, so a dict comprehension's value
    /// entry is evaluated the same per-iteration way.
    pub(crate) fn comprehension_value_entry(
        &mut self,
        data: &ComprehensionData,
    ) -> Vec<LazyValue> {
        let Some(tree) = self.context_tree(data.context) else {
            return Vec::new();
        };
        if tree.kind(data.comp_node) != SyntaxKind::DictComp {
            return Vec::new();
        }
        let children = tree.children(data.comp_node).to_vec();
        let mut results = Vec::new();
        self.comp_iterate(data.context, children[2], children[1], &mut results);
        results
    }

    /// Walk one `for` clause: iterate the source, bind targets per
    /// iteration, recurse into nested clauses, evaluate the entry.
    fn comp_iterate(
        &mut self,
        parent_ctx: ContextId,
        comp_for: NodeIndex,
        entry: NodeIndex,
        results: &mut Vec<LazyValue>,
    ) {
        let Some(tree) = self.context_tree(parent_ctx) else {
            return;
        };
        let children = tree.children(comp_for).to_vec();
        if children.len() < 2 {
            return;
        }
        let targets = children[0];
        let iterated = children[1];
        let comp_ctx = self.alloc_context(ContextData::CompFor {
            parent: parent_ctx,
            comp_for,
        });
        // The outermost iterated expression evaluates outside the
        // comprehension scope; our parent_ctx is exactly that scope.
        let source = self.infer_node(parent_ctx, iterated);
        let lazies: Vec<LazyValue> = source.iter().flat_map(|v| self.iterate(v)).collect();
        for lazy in lazies {
            let per_iteration = lazy.infer(self);
            let bindings = self.unpack_tuple_to_bindings(&tree, targets, &per_iteration);
            self.predefined.push((comp_ctx, bindings));
            match children.get(2) {
                Some(&next) => {
                    let next = skip_comp_ifs(&tree, next);
                    match next {
                        Some(nested) => {
                            self.comp_iterate(comp_ctx, nested, entry, results);
                        }
                        None => {
                            let set = self.infer_node_uncached(comp_ctx, entry);
                            results.push(LazyValue::known(set));
                        }
                    }
                }
                None => {
                    let set = self.infer_node_uncached(comp_ctx, entry);
                    results.push(LazyValue::known(set));
                }
            }
            self.predefined.pop();
        }
    }

    /// Bind a (possibly nested tuple) target pattern against one
    /// iteration's value set.
    pub(crate) fn unpack_tuple_to_bindings(
        &mut self,
        tree: &Tree,
        targets: NodeIndex,
        values: &ValueSet,
    ) -> FxHashMap<Atom, ValueSet> {
        let mut bindings = FxHashMap::default();
        self.unpack_target_into(tree, targets, values, &mut bindings);
        bindings
    }

    fn unpack_target_into(
        &mut self,
        tree: &Tree,
        target: NodeIndex,
        values: &ValueSet,
        bindings: &mut FxHashMap<Atom, ValueSet>,
    ) {
        match tree.kind(target) {
            SyntaxKind::Name => {
                bindings.insert(tree.atom(target), values.clone());
            }
            SyntaxKind::Atom => {
                let inner: Vec<NodeIndex> = tree
                    .children(target)
                    .iter()
                    .copied()
                    .filter(|&c| tree.kind(c) != SyntaxKind::Operator)
                    .collect();
                if let Some(&content) = inner.first() {
                    self.unpack_target_into(tree, content, values, bindings);
                }
            }
            SyntaxKind::TestList => {
                let items = tree.children(target).to_vec();
                let star_at = items
                    .iter()
                    .position(|&c| tree.kind(c) == SyntaxKind::StarExpr);
                for (i, &item) in items.iter().enumerate() {
                    let element_values = match star_at {
                        Some(star) if i == star => {
                            self.unpacked_middle(values, star, items.len() - star - 1)
                        }
                        Some(star) if i > star => {
                            let from_end = items.len() - i;
                            self.element_at(values, ElementIndex::FromEnd(from_end as i64))
                        }
                        _ => self.element_at(values, ElementIndex::Nth(i as i64)),
                    };
                    let item = match tree.kind(item) {
                        SyntaxKind::StarExpr => match tree.children(item).get(1) {
                            Some(&inner) => inner,
                            None => continue,
                        },
                        _ => item,
                    };
                    self.unpack_target_into(tree, item, &element_values, bindings);
                }
            }
            _ => {}
        }
    }

    /// Element `index` of everything in `values`, via `simple_getitem`
    /// with a fall back to positional iteration.
    pub(crate) fn element_at(&mut self, values: &ValueSet, index: ElementIndex) -> ValueSet {
        values.map_union(|v| {
            let literal = match index {
                ElementIndex::Nth(i) => Literal::Int(i),
                ElementIndex::FromEnd(i) => Literal::Int(-i),
            };
            match self.simple_getitem(v, &literal) {
                Ok(set) => set,
                Err(ItemNotFound) => {
                    // Fall back to iterating and indexing the lazy list.
                    let lazies = self.iterate(v);
                    let signed = match index {
                        ElementIndex::Nth(i) => i,
                        ElementIndex::FromEnd(i) => -i,
                    };
                    match crate::value::nth_signed(&lazies, signed) {
                        Some(lazy) => lazy.infer(self),
                        None => NO_VALUES,
                    }
                }
            }
        })
    }

    /// The synthetic "middle slice" a starred target receives.
    pub(crate) fn unpacked_middle(
        &mut self,
        values: &ValueSet,
        before: usize,
        after: usize,
    ) -> ValueSet {
        let mut middles = Vec::new();
        for v in values.iter() {
            let lazies = self.iterate(v);
            if lazies.len() >= before + after {
                let middle: Vec<LazyValue> =
                    lazies[before..lazies.len() - after].to_vec();
                let fake = self.alloc_value(ValueData::FakeSequence(FakeSequenceData {
                    array_type: ArrayType::List,
                    lazy: middle.into(),
                }));
                middles.push(ValueSet::single(fake));
            }
        }
        ValueSet::from_sets(middles)
    }
}

/// Step over CompIf filters to the next CompFor (condition narrowing is
/// not modeled).
fn skip_comp_ifs(tree: &Tree, mut node: NodeIndex) -> Option<NodeIndex> {
    loop {
        match tree.kind(node) {
            SyntaxKind::CompFor => return Some(node),
            SyntaxKind::CompIf => {
                node = *tree.children(node).last()?;
                if tree.kind(node) == SyntaxKind::CompIf || tree.kind(node) == SyntaxKind::CompFor
                {
                    continue;
                }
                return None;
            }
            _ => return None,
        }
    }
}

fn parse_number_literal(text: &str) -> Option<Literal> {
    let cleaned = text.replace('_', "");
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(Literal::Int);
    }
    if let Some(oct) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        return i64::from_str_radix(oct, 8).ok().map(Literal::Int);
    }
    if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        return i64::from_str_radix(bin, 2).ok().map(Literal::Int);
    }
    if cleaned.contains('.') || cleaned.contains('e') || cleaned.contains('E') {
        return cleaned.parse::<f64>().ok().map(Literal::float);
    }
    if cleaned.ends_with('j') || cleaned.ends_with('J') {
        return None; // complex literals stay untyped
    }
    cleaned.parse::<i64>().ok().map(Literal::Int)
}

/// Index direction for element extraction.
#[derive(Copy, Clone, Debug)]
pub enum ElementIndex {
    Nth(i64),
    FromEnd(i64),
}
