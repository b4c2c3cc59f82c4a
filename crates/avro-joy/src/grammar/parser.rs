//! Pushdown automaton over a [`Grammar`].

use std::sync::Arc;

use super::{Grammar, Symbol, SymbolKind, Terminal};
use crate::error::{AvroError, Result};

/// Outcome of a single [`Parser::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The input matched; carries the symbol that matched it.
    Matched(Symbol),
    /// An implicit action was popped and must be handled before retrying.
    Action(Symbol),
}

/// Symbol stack driven by codec calls.
///
/// The parser itself never touches data. Implicit actions are returned to
/// the owning codec (see [`ActionHandler`]) which may push or pop symbols
/// before advancing again.
#[derive(Debug, Clone)]
pub struct Parser {
    grammar: Arc<Grammar>,
    stack: Vec<Symbol>,
}

impl Parser {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        let mut stack = Vec::with_capacity(16);
        stack.push(Symbol::Root);
        Self { grammar, stack }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn shared_grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn top_symbol(&self) -> Option<Symbol> {
        self.stack.last().copied()
    }

    pub fn pop_symbol(&mut self) -> Result<Symbol> {
        self.stack
            .pop()
            .ok_or_else(|| AvroError::malformed("parser stack underflow"))
    }

    pub fn push_symbol(&mut self, symbol: Symbol) {
        self.stack.push(symbol);
    }

    /// Pushes the expansion of `symbol`. Repeaters and the root push
    /// themselves first so they survive their own body.
    pub fn push_production(&mut self, symbol: Symbol) -> Result<()> {
        match self.grammar.kind(symbol) {
            SymbolKind::Sequence => {}
            SymbolKind::Repeater | SymbolKind::Root => self.stack.push(symbol),
            _ => {
                return Err(AvroError::mismatch(
                    "expandable symbol",
                    self.grammar.describe(symbol),
                ))
            }
        }
        self.stack
            .extend(self.grammar.production(symbol).iter().rev().copied());
        Ok(())
    }

    /// Pops symbols until `input` is matched or an implicit action surfaces.
    pub fn step(&mut self, input: Terminal) -> Result<Step> {
        loop {
            let top = self.pop_symbol()?;
            match top {
                Symbol::Terminal(t) if t == input => return Ok(Step::Matched(top)),
                Symbol::Terminal(t) => return Err(AvroError::mismatch(t.name(), input.name())),
                Symbol::Repeater(id) if self.grammar.repeater(id).end == input => {
                    return Ok(Step::Matched(top))
                }
                _ => {}
            }
            match self.grammar.kind(top) {
                SymbolKind::ImplicitAction { .. } => return Ok(Step::Action(top)),
                SymbolKind::ExplicitAction | SymbolKind::Alternative => {
                    return Err(AvroError::mismatch(
                        self.grammar.describe(top),
                        input.name(),
                    ))
                }
                _ => self.push_production(top)?,
            }
        }
    }

    /// Pops the next implicit action before the next terminal, expanding
    /// non-terminals on the way. Stops at the root.
    pub fn next_implicit_action(&mut self) -> Result<Option<Symbol>> {
        while self.stack.len() > 1 {
            let Some(top) = self.top_symbol() else { break };
            match self.grammar.kind(top) {
                SymbolKind::ImplicitAction { .. } => {
                    self.stack.pop();
                    return Ok(Some(top));
                }
                SymbolKind::Terminal | SymbolKind::ExplicitAction | SymbolKind::Alternative => {
                    break
                }
                _ => {
                    self.stack.pop();
                    self.push_production(top)?;
                }
            }
        }
        Ok(None)
    }

    /// Pops the top symbol if it is a trailing implicit action.
    pub fn next_trailing_action(&mut self) -> Option<Symbol> {
        let top = self.top_symbol()?;
        match self.grammar.kind(top) {
            SymbolKind::ImplicitAction { trailing: true } => self.stack.pop(),
            _ => None,
        }
    }

    /// Drops all state and starts over at the root.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(Symbol::Root);
    }
}

/// Codec side of the automaton. Implementors own a [`Parser`] and react to
/// the implicit actions it surfaces.
pub trait ActionHandler {
    fn parser(&mut self) -> &mut Parser;

    /// Handles an implicit action popped while advancing towards `input`
    /// (`None` when flushing). Returning a symbol ends the advance with it.
    fn do_action(&mut self, input: Option<Terminal>, top: Symbol) -> Result<Option<Symbol>>;

    fn advance(&mut self, input: Terminal) -> Result<Symbol> {
        loop {
            match self.parser().step(input)? {
                Step::Matched(symbol) => return Ok(symbol),
                Step::Action(top) => {
                    if let Some(symbol) = self.do_action(Some(input), top)? {
                        return Ok(symbol);
                    }
                }
            }
        }
    }

    /// Runs every implicit action that precedes the next terminal.
    fn process_implicit_actions(&mut self) -> Result<()> {
        while let Some(top) = self.parser().next_implicit_action()? {
            self.do_action(None, top)?;
        }
        Ok(())
    }

    fn process_trailing_implicit_actions(&mut self) -> Result<()> {
        while let Some(top) = self.parser().next_trailing_action() {
            self.do_action(None, top)?;
        }
        Ok(())
    }
}

/// Decoders that can discard values by walking the grammar.
pub trait SkipHandler: ActionHandler {
    /// Consumes the action on top of the stack without producing a value.
    fn skip_action(&mut self) -> Result<()>;

    /// Consumes the value described by the terminal on top of the stack.
    fn skip_top_symbol(&mut self) -> Result<()>;

    /// Skips until the stack is back to `target` depth.
    fn skip_to(&mut self, target: usize) -> Result<()> {
        while self.parser().depth() > target {
            let Some(top) = self.parser().top_symbol() else { break };
            match self.parser().grammar().kind(top) {
                SymbolKind::Terminal => self.skip_top_symbol()?,
                SymbolKind::ImplicitAction { .. } | SymbolKind::ExplicitAction => {
                    self.skip_action()?
                }
                SymbolKind::Alternative => {
                    return Err(AvroError::mismatch("union", "union branches"));
                }
                _ => {
                    self.parser().pop_symbol()?;
                    self.parser().push_production(top)?;
                }
            }
        }
        Ok(())
    }

    /// Skips one iteration of the repeater on top of the stack.
    fn skip_repeater(&mut self) -> Result<()> {
        let target = self.parser().depth();
        let repeater = self.parser().pop_symbol()?;
        self.parser().push_production(repeater)?;
        self.skip_to(target)
    }

    /// Skips a whole value described by `symbol`.
    fn skip_symbol(&mut self, symbol: Symbol) -> Result<()> {
        let target = self.parser().depth();
        self.parser().push_symbol(symbol);
        self.skip_to(target)
    }
}
