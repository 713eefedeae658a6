use rustc_hash::FxHashMap;

use crate::ast::Node;
use crate::eval::{EvalError, Expr, ValueExpr};
use crate::parser::ParseError;
use crate::parser::attrs::{AttrError, AttrValue, Attributes, ScannedTag, TagForm};
use crate::symbols::{Symbol, SymbolTable};
use crate::token::Span;

mod builtins;

pub type NodeConstructor = fn(&mut TagContext<'_>) -> Result<Node, ParseError>;
pub type Validator = fn(&TagContext<'_>) -> Result<(), ParseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagShape {
    /// Self-closing
    Single,
    /// Consumes children up to the matching close tag
    Block,
}

#[derive(Clone, Copy)]
pub struct TagEntry {
    pub shape: TagShape,
    pub constructor: NodeConstructor,
    pub validator: Option<Validator>,
}

impl TagEntry {
    pub fn build(&self, context: &mut TagContext<'_>) -> Result<Node, ParseError> {
        if let Some(validator) = self.validator {
            validator(context)?;
        }
        (self.constructor)(context)
    }
}

#[derive(Clone, Copy)]
pub enum Resolution<'r> {
    Exact(&'r TagEntry),
    /// `<identifier>_<suffix>` or `<variable><operator>`; `target` is the
    /// identifier part of the head.
    Pattern {
        entry: &'r TagEntry,
        target: &'r str,
        suffix: Option<&'r str>,
    },
    NoMatch,
    Unresolved {
        name: &'r str,
    },
}

/// Maps tag names and `_suffix` patterns to node constructors.
#[derive(Clone)]
pub struct TagRegistry {
    tags: FxHashMap<String, TagEntry>,
    suffixes: FxHashMap<String, TagEntry>,
    assignment: TagEntry,
}

impl TagRegistry {
    /// A registry holding no tags beyond variable assignment.
    pub fn empty() -> Self {
        Self {
            tags: FxHashMap::default(),
            suffixes: FxHashMap::default(),
            assignment: TagEntry {
                shape: TagShape::Single,
                constructor: builtins::assignment,
                validator: None,
            },
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        builtins::install(&mut registry);
        registry
    }

    pub fn register_tag(
        &mut self,
        name: &str,
        constructor: NodeConstructor,
        validator: Option<Validator>,
    ) {
        self.insert_tag(name, TagShape::Single, constructor, validator);
    }

    pub fn register_block(
        &mut self,
        name: &str,
        constructor: NodeConstructor,
        validator: Option<Validator>,
    ) {
        self.insert_tag(name, TagShape::Block, constructor, validator);
    }

    pub fn register_suffix(
        &mut self,
        suffix: &str,
        constructor: NodeConstructor,
        validator: Option<Validator>,
    ) {
        self.suffixes.insert(
            suffix.to_string(),
            TagEntry {
                shape: TagShape::Single,
                constructor,
                validator,
            },
        );
    }

    fn insert_tag(
        &mut self,
        name: &str,
        shape: TagShape,
        constructor: NodeConstructor,
        validator: Option<Validator>,
    ) {
        self.tags.insert(
            name.to_string(),
            TagEntry {
                shape,
                constructor,
                validator,
            },
        );
    }

    /// Exact names first, then assignment to a declared variable, then
    /// `<identifier>_<suffix>` patterns.
    pub fn resolve<'r>(&'r self, tag: &'r ScannedTag<'_>, symbols: &SymbolTable) -> Resolution<'r> {
        let head = tag.head;
        if let Some(entry) = self.tags.get(head) {
            return Resolution::Exact(entry);
        }

        let is_operator = matches!(tag.form, TagForm::Operator { .. });
        if is_operator && symbols.is_variable(head) {
            return Resolution::Pattern {
                entry: &self.assignment,
                target: head,
                suffix: None,
            };
        }

        if let Some((target, suffix)) = head.rsplit_once('_')
            && let Some(entry) = self.suffixes.get(suffix)
        {
            if symbols.get(target).is_none() {
                return Resolution::Unresolved { name: target };
            }
            return Resolution::Pattern {
                entry,
                target,
                suffix: Some(suffix),
            };
        }

        if is_operator {
            return Resolution::Unresolved { name: head };
        }
        Resolution::NoMatch
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Where a tag appears in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Top level, possibly inside `<gui>`
    TopLevel,
    /// Inside an `if` or `forever` body
    Nested,
}

/// Everything a constructor may inspect or declare while building a node.
pub struct TagContext<'a> {
    pub tag: &'a ScannedTag<'a>,
    pub target: Option<&'a str>,
    pub suffix: Option<&'a str>,
    pub span: Span,
    pub placement: Placement,
    pub symbols: &'a mut SymbolTable,
}

static NO_ATTRIBUTES: Attributes = Attributes::EMPTY;

impl<'a> TagContext<'a> {
    pub fn name(&self) -> &str {
        self.tag.head
    }

    pub fn attributes(&self) -> Result<&'a Attributes, ParseError> {
        let tag: &'a ScannedTag<'a> = self.tag;
        match &tag.form {
            TagForm::Plain(attributes) => Ok(attributes),
            TagForm::Operator { symbol, .. } => Err(self.malformed(format!(
                "'<{}>' does not take '{symbol}'",
                self.name()
            ))),
        }
    }

    /// Attributes of a plain tag, or none for an operator tag.
    pub fn attributes_or_empty(&self) -> &'a Attributes {
        let tag: &'a ScannedTag<'a> = self.tag;
        match &tag.form {
            TagForm::Plain(attributes) => attributes,
            TagForm::Operator { .. } => &NO_ATTRIBUTES,
        }
    }

    pub fn operator(&self) -> Option<(&'static str, Option<&'a AttrValue>)> {
        let tag: &'a ScannedTag<'a> = self.tag;
        match &tag.form {
            TagForm::Operator { symbol, value } => Some((*symbol, value.as_ref())),
            TagForm::Plain(_) => None,
        }
    }

    pub fn target(&self) -> Result<&'a str, ParseError> {
        self.target
            .ok_or_else(|| self.malformed("missing target identifier".to_string()))
    }

    pub fn attr(&self, name: &str) -> Option<&'a AttrValue> {
        self.attributes_or_empty().get(name)
    }

    pub fn required(&self, name: &str) -> Result<&'a AttrValue, ParseError> {
        self.attr(name).ok_or_else(|| self.missing(name))
    }

    /// A quoted or bare identifier such as `name="counter"`.
    pub fn identifier(&self, name: &str) -> Result<String, ParseError> {
        let value = self.required(name)?;
        let text = match value {
            AttrValue::Text(text) | AttrValue::Bare(text) => text.trim(),
            AttrValue::Span(_) | AttrValue::Stack(_) => "",
        };
        let valid = text.starts_with(|c: char| c.is_alphabetic() || c == '_')
            && text.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !valid {
            return Err(self.invalid(name, format!("'{}' is not an identifier", value.source())));
        }
        Ok(text.to_string())
    }

    pub fn value_expr(&self, attribute: &str, value: &AttrValue) -> Result<ValueExpr, ParseError> {
        let source = value.source();
        ValueExpr::parse(&source, &*self.symbols)
            .map_err(|error| self.eval_error(attribute, &source, error))
    }

    pub fn condition(&self, attribute: &str, source: &str) -> Result<Expr, ParseError> {
        Expr::parse(source, &*self.symbols)
            .map_err(|error| self.eval_error(attribute, source, error))
    }

    pub fn unsigned(&self, name: &str) -> Result<Option<u64>, ParseError> {
        let Some(value) = self.attr(name) else {
            return Ok(None);
        };
        let source = value.source();
        source
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| self.invalid(name, format!("'{source}' is not a non-negative integer")))
    }

    pub fn declare(&mut self, name: &str, symbol: Symbol) -> Result<(), ParseError> {
        self.symbols
            .declare(name, symbol)
            .map_err(|_| ParseError::DuplicateName {
                name: name.to_string(),
                span: self.span,
            })
    }

    /// Fails on named attributes outside `allowed` and on positional values.
    pub fn expect_only(&self, allowed: &[&str]) -> Result<(), ParseError> {
        let attributes = self.attributes()?;
        if let Some((name, _)) = attributes.named().find(|(name, _)| !allowed.contains(name)) {
            return Err(self.unexpected(name));
        }
        if let Some(value) = attributes.positional().next() {
            return Err(self.unexpected(&value.source()));
        }
        Ok(())
    }

    pub fn expect_top_level(&self, what: &str) -> Result<(), ParseError> {
        if self.placement == Placement::TopLevel {
            return Ok(());
        }
        Err(ParseError::Misplaced {
            tag: self.name().to_string(),
            message: format!("{what} must appear at the top level or inside <gui>"),
            span: self.span,
        })
    }

    pub fn missing(&self, attribute: &str) -> ParseError {
        ParseError::MissingAttribute {
            tag: self.name().to_string(),
            attribute: attribute.to_string(),
            span: self.span,
        }
    }

    pub fn unresolved(&self, name: &str) -> ParseError {
        ParseError::UnresolvedReference {
            tag: self.name().to_string(),
            name: name.to_string(),
            span: self.span,
        }
    }

    pub fn unknown_tag(&self) -> ParseError {
        ParseError::UnknownTag {
            tag: self.name().to_string(),
            span: self.span,
        }
    }

    pub fn unexpected(&self, attribute: &str) -> ParseError {
        ParseError::UnexpectedAttribute {
            tag: self.name().to_string(),
            attribute: attribute.to_string(),
            span: self.span,
        }
    }

    pub fn invalid(&self, attribute: &str, message: String) -> ParseError {
        ParseError::InvalidAttribute {
            tag: self.name().to_string(),
            attribute: attribute.to_string(),
            message,
            span: self.span,
        }
    }

    pub fn malformed(&self, message: String) -> ParseError {
        ParseError::MalformedTag {
            message,
            span: self.span,
        }
    }

    pub fn malformed_attributes(&self, source: AttrError) -> ParseError {
        ParseError::MalformedAttributes {
            source,
            span: self.span,
        }
    }

    fn eval_error(&self, attribute: &str, source: &str, error: EvalError) -> ParseError {
        match error {
            EvalError::UnresolvedReference { name } => self.unresolved(&name),
            other => ParseError::InvalidExpression {
                tag: self.name().to_string(),
                message: format!("{attribute}=\"{source}\": {other}"),
                span: self.span,
            },
        }
    }
}
