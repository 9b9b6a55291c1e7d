//! Path querying over the arena DOM.
//!
//! Two backends behind one contract: a fast backend for paths in a
//! restricted "simple" grammar (single axis, index / attribute-equality
//! predicates only) that can be answered from the document's tag and
//! position-id indexes, and a general evaluator for the full supported
//! grammar (unions, `@*`, `contains`/`starts-with`/`string-length`,
//! `and`/`or`/`not`). A pure-syntax classifier picks the backend; callers
//! never branch on it. Both backends return document order.

use std::collections::{HashMap, HashSet};

use crate::dom::{Arena, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    Any,
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Attr(String),
    AnyAttr,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pred {
    Index(usize),
    AttrExists(String),
    AttrEq(String, String),
    AnyAttrEq(String),
    Contains(Arg, String),
    StartsWith(Arg, String),
    StringLengthGt(String, usize),
    Not(Box<Pred>),
    And(Vec<Pred>),
    Or(Vec<Pred>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub axis: Axis,
    pub test: NameTest,
    pub preds: Vec<Pred>,
}

/// One parsed path expression, possibly a union of alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub alts: Vec<Vec<Step>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Simple,
    General,
}

/// Syntax-only backend selection: simple means every alternative uses only
/// child/descendant steps with name tests and at most index or plain
/// attribute-equality predicates.
pub fn select_backend(expr: &PathExpr) -> Backend {
    let simple = expr.alts.iter().all(|steps| {
        steps.iter().all(|step| {
            step.preds.iter().all(|p| {
                matches!(p, Pred::Index(_)) || matches!(p, Pred::AttrEq(name, _) if name != "*")
            }) && step.preds.len() <= 2
        })
    });
    if simple { Backend::Simple } else { Backend::General }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    src: &'a str,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            src,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, s: &str) -> bool {
        let mut end = self.pos;
        for want in s.chars() {
            match self.chars.get(end) {
                Some(&c) if c == want => end += 1,
                _ => return false,
            }
        }
        self.pos = end;
        true
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-' || c == ':')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    fn number(&mut self) -> Option<usize> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn string_lit(&mut self) -> Option<String> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return None,
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let s: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Some(s);
            }
            self.pos += 1;
        }
        None
    }

    fn steps(&mut self) -> Option<Vec<Step>> {
        let mut steps = Vec::new();
        self.skip_ws();
        // Relative paths start with '.'
        if self.peek() == Some('.') {
            self.pos += 1;
        }
        loop {
            self.skip_ws();
            let axis = if self.eat("//") {
                Axis::Descendant
            } else if self.eat("/") {
                Axis::Child
            } else {
                break;
            };
            let test = if self.eat("*") {
                NameTest::Any
            } else {
                NameTest::Tag(self.ident()?)
            };
            let mut preds = Vec::new();
            while self.peek() == Some('[') {
                self.pos += 1;
                let pred = self.or_expr()?;
                self.skip_ws();
                if self.bump() != Some(']') {
                    return None;
                }
                preds.push(pred);
            }
            steps.push(Step { axis, test, preds });
        }
        if steps.is_empty() { None } else { Some(steps) }
    }

    fn or_expr(&mut self) -> Option<Pred> {
        let mut terms = vec![self.and_expr()?];
        loop {
            self.skip_ws();
            if self.eat("or ") || self.eat("or\t") || self.eat("or\n") {
                terms.push(self.and_expr()?);
            } else {
                break;
            }
        }
        if terms.len() == 1 {
            terms.pop()
        } else {
            Some(Pred::Or(terms))
        }
    }

    fn and_expr(&mut self) -> Option<Pred> {
        let mut terms = vec![self.not_expr()?];
        loop {
            self.skip_ws();
            if self.eat("and ") || self.eat("and\t") || self.eat("and\n") {
                terms.push(self.not_expr()?);
            } else {
                break;
            }
        }
        if terms.len() == 1 {
            terms.pop()
        } else {
            Some(Pred::And(terms))
        }
    }

    fn not_expr(&mut self) -> Option<Pred> {
        self.skip_ws();
        if self.eat("not") {
            self.skip_ws();
            if self.bump() != Some('(') {
                return None;
            }
            let inner = self.or_expr()?;
            self.skip_ws();
            if self.bump() != Some(')') {
                return None;
            }
            return Some(Pred::Not(Box::new(inner)));
        }
        if self.eat("(") {
            let inner = self.or_expr()?;
            self.skip_ws();
            if self.bump() != Some(')') {
                return None;
            }
            return Some(inner);
        }
        self.atom()
    }

    fn arg(&mut self) -> Option<Arg> {
        self.skip_ws();
        if self.eat("@*") {
            return Some(Arg::AnyAttr);
        }
        if self.eat("@") {
            return Some(Arg::Attr(self.ident()?));
        }
        if self.eat("text()") {
            return Some(Arg::Text);
        }
        None
    }

    fn atom(&mut self) -> Option<Pred> {
        self.skip_ws();
        if let Some(n) = self.number() {
            return Some(Pred::Index(n));
        }
        if self.eat("contains") {
            return self.two_arg_fn(true);
        }
        if self.eat("starts-with") {
            return self.two_arg_fn(false);
        }
        if self.eat("string-length") {
            self.skip_ws();
            if self.bump() != Some('(') {
                return None;
            }
            self.skip_ws();
            if !self.eat("@") {
                return None;
            }
            let name = self.ident()?;
            self.skip_ws();
            if self.bump() != Some(')') {
                return None;
            }
            self.skip_ws();
            if self.bump() != Some('>') {
                return None;
            }
            self.skip_ws();
            let n = self.number()?;
            return Some(Pred::StringLengthGt(name, n));
        }
        if self.eat("@*") {
            self.skip_ws();
            if self.eat("=") {
                self.skip_ws();
                let lit = self.string_lit()?;
                return Some(Pred::AnyAttrEq(lit));
            }
            return None;
        }
        if self.eat("@") {
            let name = self.ident()?;
            self.skip_ws();
            if self.eat("=") {
                self.skip_ws();
                let lit = self.string_lit()?;
                return Some(Pred::AttrEq(name, lit));
            }
            return Some(Pred::AttrExists(name));
        }
        None
    }

    fn two_arg_fn(&mut self, contains: bool) -> Option<Pred> {
        self.skip_ws();
        if self.bump() != Some('(') {
            return None;
        }
        let arg = self.arg()?;
        self.skip_ws();
        if self.bump() != Some(',') {
            return None;
        }
        self.skip_ws();
        let lit = self.string_lit()?;
        self.skip_ws();
        if self.bump() != Some(')') {
            return None;
        }
        Some(if contains {
            Pred::Contains(arg, lit)
        } else {
            Pred::StartsWith(arg, lit)
        })
    }
}

impl PathExpr {
    /// Parse a path expression; `None` on any syntax the grammar does not
    /// cover. Unions may be separated by `|` with or without spaces.
    pub fn parse(src: &str) -> Option<PathExpr> {
        let mut alts = Vec::new();
        for part in split_union(src) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut parser = Parser::new(part);
            let steps = parser.steps()?;
            parser.skip_ws();
            if parser.pos != parser.chars.len() {
                tracing::debug!(path = parser.src, "unparsed path suffix");
                return None;
            }
            alts.push(steps);
        }
        if alts.is_empty() { None } else { Some(PathExpr { alts }) }
    }
}

/// Split on top-level `|`, ignoring any inside quotes or brackets.
fn split_union(src: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in src.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => depth = depth.saturating_sub(1),
                '|' if depth == 0 => {
                    parts.push(&src[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&src[start..]);
    parts
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Direct text of an element: its leading text plus the tails of its
/// children, which is what `text()` selects.
fn direct_text(arena: &Arena, id: NodeId) -> String {
    let mut out = String::from(arena.text(id));
    for child in arena.children(id) {
        out.push_str(arena.tail(child));
    }
    out
}

fn descendant_elements(arena: &Arena, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<NodeId> = arena.children(root).collect();
    stack.reverse();
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if arena.is_element(id) {
            out.push(id);
        }
        let mut children: Vec<_> = arena.children(id).collect();
        children.reverse();
        stack.extend(children);
    }
    out
}

fn pred_matches(arena: &Arena, id: NodeId, pred: &Pred) -> bool {
    match pred {
        // Positional predicates are applied during step evaluation.
        Pred::Index(_) => true,
        Pred::AttrExists(name) => arena.attr(id, name).is_some(),
        Pred::AttrEq(name, value) => arena.attr(id, name) == Some(value.as_str()),
        Pred::AnyAttrEq(value) => arena
            .element(id)
            .is_some_and(|e| e.attrs.iter().any(|a| a.value == *value)),
        Pred::Contains(arg, lit) => arg_values(arena, id, arg).iter().any(|v| v.contains(lit)),
        Pred::StartsWith(arg, lit) => {
            arg_values(arena, id, arg).iter().any(|v| v.starts_with(lit))
        }
        Pred::StringLengthGt(name, n) => {
            arena.attr(id, name).map(|v| v.chars().count()).unwrap_or(0) > *n
        }
        Pred::Not(inner) => !pred_matches(arena, id, inner),
        Pred::And(terms) => terms.iter().all(|t| pred_matches(arena, id, t)),
        Pred::Or(terms) => terms.iter().any(|t| pred_matches(arena, id, t)),
    }
}

fn arg_values(arena: &Arena, id: NodeId, arg: &Arg) -> Vec<String> {
    match arg {
        Arg::Attr(name) => arena
            .attr(id, name)
            .map(|v| vec![v.to_string()])
            .unwrap_or_default(),
        Arg::AnyAttr => arena
            .element(id)
            .map(|e| e.attrs.iter().map(|a| a.value.clone()).collect())
            .unwrap_or_default(),
        Arg::Text => vec![direct_text(arena, id)],
    }
}

fn name_matches(arena: &Arena, id: NodeId, test: &NameTest) -> bool {
    match test {
        NameTest::Any => true,
        NameTest::Tag(tag) => arena.tag(id) == tag,
    }
}

fn eval_steps(arena: &Arena, start: NodeId, steps: &[Step]) -> Vec<NodeId> {
    let mut context = vec![start];
    for step in steps {
        let mut next = Vec::new();
        let mut seen = HashSet::new();
        for &ctx in &context {
            let candidates: Vec<NodeId> = match step.axis {
                Axis::Child => arena
                    .children(ctx)
                    .filter(|&c| arena.is_element(c))
                    .collect(),
                Axis::Descendant => descendant_elements(arena, ctx),
            };
            let mut matched: Vec<NodeId> = candidates
                .into_iter()
                .filter(|&c| name_matches(arena, c, &step.test))
                .collect();
            for pred in &step.preds {
                if let Pred::Index(n) = pred {
                    matched = match matched.get(n.wrapping_sub(1)) {
                        Some(&only) => vec![only],
                        None => Vec::new(),
                    };
                } else {
                    matched.retain(|&c| pred_matches(arena, c, pred));
                }
            }
            for m in matched {
                if seen.insert(m) {
                    next.push(m);
                }
            }
        }
        context = next;
    }
    context
}

/// General evaluator: full grammar, stepwise node-set evaluation.
pub fn evaluate_general(
    arena: &Arena,
    start: NodeId,
    expr: &PathExpr,
    order: &HashMap<NodeId, u32>,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for steps in &expr.alts {
        for id in eval_steps(arena, start, steps) {
            if seen.insert(id) {
                out.push(id);
            }
        }
    }
    sort_document_order(&mut out, order);
    out
}

/// Simple backend: answers single-step descendant queries straight from the
/// document's tag index when one is supplied; everything else falls back to
/// the same stepwise walk restricted to the simple grammar.
pub fn evaluate_simple(
    arena: &Arena,
    start: NodeId,
    expr: &PathExpr,
    order: &HashMap<NodeId, u32>,
    tag_index: Option<&HashMap<String, Vec<NodeId>>>,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for steps in &expr.alts {
        let fast = match (steps.len(), steps.first(), tag_index) {
            (1, Some(step), Some(index))
                if step.axis == Axis::Descendant && step.preds.is_empty() =>
            {
                match &step.test {
                    NameTest::Tag(tag) => Some(index.get(tag).cloned().unwrap_or_default()),
                    NameTest::Any => None,
                }
            }
            _ => None,
        };
        let ids = match fast {
            Some(ids) => ids
                .into_iter()
                .filter(|&id| is_attached(arena, id, start))
                .collect(),
            None => eval_steps(arena, start, steps),
        };
        for id in ids {
            if seen.insert(id) {
                out.push(id);
            }
        }
    }
    sort_document_order(&mut out, order);
    out
}

/// Whether `id` still hangs off `root`; index entries can be stale after
/// tree surgery.
fn is_attached(arena: &Arena, id: NodeId, root: NodeId) -> bool {
    let mut cur = id;
    let mut hops = 0;
    while cur.is_some() {
        if cur == root {
            return true;
        }
        cur = arena.parent(cur);
        hops += 1;
        if hops > arena.len() {
            return false;
        }
    }
    false
}

fn sort_document_order(ids: &mut [NodeId], order: &HashMap<NodeId, u32>) {
    ids.sort_by_key(|id| order.get(id).copied().unwrap_or(u32::MAX));
}
