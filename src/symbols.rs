use rustc_hash::FxHashMap;

use crate::ast::{EventKind, WidgetKind};
use crate::eval::{RandomKind, Reference, Resolver, variable_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Variable,
    Widget(WidgetKind),
    Random,
}

/// Load-time namespace shared by variables, widgets and random generators.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: FxHashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing symbol when the name is already taken.
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> Result<(), Symbol> {
        if let Some(existing) = self.symbols.get(name) {
            return Err(*existing);
        }
        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.get(name) == Some(Symbol::Variable)
    }

    pub fn widget_kind(&self, name: &str) -> Option<WidgetKind> {
        match self.get(name) {
            Some(Symbol::Widget(kind)) => Some(kind),
            _ => None,
        }
    }

    /// `name` or `name_value` naming a variable.
    pub fn variable<'n>(&self, name: &'n str) -> Option<&'n str> {
        variable_name(name, |candidate| self.is_variable(candidate))
    }

    /// Splits `widget_event` into a declared widget and one of its events.
    pub fn event(&self, name: &str) -> Option<(String, EventKind)> {
        let (widget, suffix) = name.rsplit_once('_')?;
        let kind = self.widget_kind(widget)?;
        let event = EventKind::from_suffix(suffix)?;
        kind.events().contains(&event).then(|| (widget.to_string(), event))
    }
}

impl Resolver for SymbolTable {
    fn resolve(&self, name: &str) -> Option<Reference> {
        if let Some(variable) = self.variable(name) {
            return Some(Reference::Variable(variable.to_string()));
        }

        let (head, suffix) = name.rsplit_once('_')?;
        match self.get(head)? {
            Symbol::Widget(kind) if kind.has_property(suffix) => Some(Reference::Property {
                widget: head.to_string(),
                property: suffix.to_string(),
            }),
            Symbol::Random => {
                let kind = match suffix {
                    "random" => RandomKind::Integer,
                    "float" => RandomKind::Float,
                    _ => return None,
                };
                Some(Reference::Random {
                    generator: head.to_string(),
                    kind,
                })
            }
            _ => None,
        }
    }
}
