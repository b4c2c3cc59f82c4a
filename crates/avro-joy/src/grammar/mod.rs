//! Grammar symbols and the arena that holds generated productions.
//!
//! A grammar is the pushdown automaton's view of a schema: every value the
//! codecs read or write is a walk over these symbols. Productions are stored
//! in processing order; the [`Parser`] pushes them reversed so the first
//! symbol ends up on top of its stack.
//!
//! Grammars are generated once per schema (or writer/reader pair), frozen
//! behind an `Arc` and shared by every codec instance built from them.

mod json;
mod parser;
mod resolving;

use std::fmt;
use std::sync::Arc;

use crate::error::{AvroError, Result};
use crate::schema::Field;

pub use json::json_grammar;
pub use parser::{ActionHandler, Parser, SkipHandler, Step};
pub use resolving::{resolving_grammar, union_equiv};

/// Input symbols consumed by the codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    Fixed,
    Enum,
    Union,
    ArrayStart,
    ArrayEnd,
    MapStart,
    MapEnd,
    ItemEnd,
    /// Asks a resolving decoder for the reader field order.
    FieldAction,
    MapKeyMarker,
}

impl Terminal {
    pub fn name(self) -> &'static str {
        match self {
            Terminal::Null => "null",
            Terminal::Boolean => "boolean",
            Terminal::Int => "int",
            Terminal::Long => "long",
            Terminal::Float => "float",
            Terminal::Double => "double",
            Terminal::String => "string",
            Terminal::Bytes => "bytes",
            Terminal::Fixed => "fixed",
            Terminal::Enum => "enum",
            Terminal::Union => "union",
            Terminal::ArrayStart => "array-start",
            Terminal::ArrayEnd => "array-end",
            Terminal::MapStart => "map-start",
            Terminal::MapEnd => "map-end",
            Terminal::ItemEnd => "item-end",
            Terminal::FieldAction => "field-action",
            Terminal::MapKeyMarker => "map-key-marker",
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A grammar symbol. Compound symbols index into the owning [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(Terminal),
    RecordStart,
    RecordEnd,
    UnionEnd,
    FieldEnd,
    DefaultEnd,
    WriterUnion,
    Sequence(usize),
    Repeater(usize),
    Alternative(usize),
    Action(usize),
    /// Bottom of every parser stack; re-pushes itself when expanded.
    Root,
}

impl Symbol {
    pub const NULL: Symbol = Symbol::Terminal(Terminal::Null);

    pub fn terminal(self) -> Option<Terminal> {
        match self {
            Symbol::Terminal(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Terminal> for Symbol {
    fn from(t: Terminal) -> Self {
        Symbol::Terminal(t)
    }
}

/// How the parser treats a symbol it finds on top of its stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Terminal,
    /// Handed to the action handler while advancing. Trailing actions are
    /// also flushed eagerly once the value before them is complete.
    ImplicitAction { trailing: bool },
    /// Popped by the codec operation that precedes it.
    ExplicitAction,
    Sequence,
    Repeater,
    Alternative,
    Root,
}

/// Payload of [`Symbol::Action`].
#[derive(Debug, Clone)]
pub enum Action {
    /// Record field boundary for JSON codecs.
    FieldAdjust { pos: usize, name: String },
    /// Reader fields in the order their values arrive.
    FieldOrder(Arc<[Field]>),
    /// A writer value read under a different reader type.
    Resolving { writer: Terminal, reader: Terminal },
    /// A writer value with no reader counterpart.
    Skip(Symbol),
    EnumLabels(Vec<String>),
    /// Writer ordinal → reader ordinal, or the error for symbols the reader
    /// cannot represent. `None` when no remapping is needed.
    EnumAdjust {
        reader_size: usize,
        adjustments: Option<Vec<Result<usize, String>>>,
    },
    IntCheck(usize),
    /// Reader union branch chosen for a non-union writer.
    UnionAdjust { index: usize, symbol: Symbol },
    /// Binary encoding of a reader field default.
    DefaultStart(Arc<[u8]>),
    /// Resolution failure, raised only if the data reaches it.
    Error(String),
}

impl Action {
    fn kind(&self) -> SymbolKind {
        match self {
            Action::IntCheck(_) | Action::EnumLabels(_) | Action::EnumAdjust { .. } => {
                SymbolKind::ExplicitAction
            }
            Action::Skip(_) => SymbolKind::ImplicitAction { trailing: true },
            _ => SymbolKind::ImplicitAction { trailing: false },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Repeater {
    /// Terminal that ends the repetition.
    pub end: Terminal,
    pub body: Vec<Symbol>,
}

#[derive(Debug, Clone)]
pub struct Alternative {
    pub symbols: Vec<Symbol>,
    pub labels: Vec<String>,
}

impl Alternative {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, index: usize) -> Result<Symbol> {
        self.symbols.get(index).copied().ok_or_else(|| {
            AvroError::malformed(format!(
                "union index {index} out of range for {} branches",
                self.symbols.len()
            ))
        })
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn find_label(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// Immutable symbol arena.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    root: Vec<Symbol>,
    sequences: Vec<Vec<Symbol>>,
    repeaters: Vec<Repeater>,
    alternatives: Vec<Alternative>,
    actions: Vec<Action>,
}

impl Grammar {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self, symbol: Symbol) -> SymbolKind {
        match symbol {
            Symbol::Terminal(_) => SymbolKind::Terminal,
            Symbol::RecordEnd | Symbol::UnionEnd | Symbol::FieldEnd | Symbol::DefaultEnd => {
                SymbolKind::ImplicitAction { trailing: true }
            }
            Symbol::RecordStart | Symbol::WriterUnion => {
                SymbolKind::ImplicitAction { trailing: false }
            }
            Symbol::Sequence(_) => SymbolKind::Sequence,
            Symbol::Repeater(_) => SymbolKind::Repeater,
            Symbol::Alternative(_) => SymbolKind::Alternative,
            Symbol::Action(id) => self.actions[id].kind(),
            Symbol::Root => SymbolKind::Root,
        }
    }

    /// Symbols a non-terminal expands to, in processing order.
    pub fn production(&self, symbol: Symbol) -> &[Symbol] {
        match symbol {
            Symbol::Root => &self.root,
            Symbol::Sequence(id) => &self.sequences[id],
            Symbol::Repeater(id) => &self.repeaters[id].body,
            _ => &[],
        }
    }

    pub fn repeater(&self, id: usize) -> &Repeater {
        &self.repeaters[id]
    }

    pub fn alternative(&self, id: usize) -> &Alternative {
        &self.alternatives[id]
    }

    pub fn action(&self, id: usize) -> &Action {
        &self.actions[id]
    }

    pub fn action_of(&self, symbol: Symbol) -> Option<&Action> {
        match symbol {
            Symbol::Action(id) => self.actions.get(id),
            _ => None,
        }
    }

    /// Resolves `symbol` to its alternative, failing for anything else.
    pub fn expect_alternative(&self, symbol: Symbol) -> Result<&Alternative> {
        match symbol {
            Symbol::Alternative(id) => Ok(&self.alternatives[id]),
            other => Err(AvroError::mismatch("union branches", self.describe(other))),
        }
    }

    /// Resolves `symbol` to its action payload, failing for anything else.
    pub fn expect_action(&self, symbol: Symbol) -> Result<&Action> {
        match symbol {
            Symbol::Action(id) => Ok(&self.actions[id]),
            other => Err(AvroError::mismatch("action", self.describe(other))),
        }
    }

    /// Human-readable name of a symbol for error messages.
    pub fn describe(&self, symbol: Symbol) -> String {
        match symbol {
            Symbol::Terminal(t) => t.name().to_string(),
            Symbol::RecordStart => "record-start".into(),
            Symbol::RecordEnd => "record-end".into(),
            Symbol::UnionEnd => "union-end".into(),
            Symbol::FieldEnd => "field-end".into(),
            Symbol::DefaultEnd => "default-end".into(),
            Symbol::WriterUnion => "writer-union".into(),
            Symbol::Sequence(_) => "sequence".into(),
            Symbol::Repeater(id) => format!("repeat until {}", self.repeaters[id].end),
            Symbol::Alternative(_) => "union branches".into(),
            Symbol::Root => "end of datum".into(),
            Symbol::Action(id) => match &self.actions[id] {
                Action::FieldAdjust { name, .. } => format!("field {name}"),
                Action::FieldOrder(_) => "field-order".into(),
                Action::Resolving { writer, reader } => format!("{writer} read as {reader}"),
                Action::Skip(_) => "skip".into(),
                Action::EnumLabels(_) => "enum-labels".into(),
                Action::EnumAdjust { .. } => "enum-adjust".into(),
                Action::IntCheck(size) => format!("fixed size {size}"),
                Action::UnionAdjust { index, .. } => format!("union branch {index}"),
                Action::DefaultStart(_) => "default-start".into(),
                Action::Error(msg) => format!("error: {msg}"),
            },
        }
    }

    // ---------------------------------------------------------------- building

    pub(crate) fn set_root(&mut self, body: Vec<Symbol>) {
        self.root = body;
    }

    /// Reserves a sequence slot so that recursive types can refer to it
    /// before its production is known.
    pub(crate) fn reserve_sequence(&mut self) -> usize {
        self.sequences.push(Vec::new());
        self.sequences.len() - 1
    }

    pub(crate) fn fill_sequence(&mut self, id: usize, production: Vec<Symbol>) {
        self.sequences[id] = production;
    }

    pub(crate) fn seq(&mut self, production: Vec<Symbol>) -> Symbol {
        let id = self.reserve_sequence();
        self.fill_sequence(id, production);
        Symbol::Sequence(id)
    }

    pub(crate) fn repeat(&mut self, end: Terminal, body: Vec<Symbol>) -> Symbol {
        self.repeaters.push(Repeater { end, body });
        Symbol::Repeater(self.repeaters.len() - 1)
    }

    pub(crate) fn alt(&mut self, symbols: Vec<Symbol>, labels: Vec<String>) -> Symbol {
        self.alternatives.push(Alternative { symbols, labels });
        Symbol::Alternative(self.alternatives.len() - 1)
    }

    pub(crate) fn push_action(&mut self, action: Action) -> Symbol {
        self.actions.push(action);
        Symbol::Action(self.actions.len() - 1)
    }

    pub(crate) fn error(&mut self, msg: impl Into<String>) -> Symbol {
        self.push_action(Action::Error(msg.into()))
    }
}
