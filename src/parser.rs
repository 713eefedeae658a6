use tracing::debug;

use crate::ast::{Node, NodeKind, Program};
use crate::lexer::Lexer;
use crate::registry::{Placement, Resolution, TagContext, TagRegistry, TagShape};
use crate::symbols::SymbolTable;
use crate::token::{Span, Token, TokenKind};

pub mod attrs;
pub mod error;

pub use error::{ParseError, ParseResult};

use attrs::{ScannedTag, TagForm, scan_tag};

/// Block that is waiting for its close tag.
struct OpenBlock<'a> {
    name: &'a str,
    span: Span,
}

pub struct Parser<'a, 'r> {
    lexer: Lexer<'a>,
    current: Token<'a>,
    registry: &'r TagRegistry,
    symbols: SymbolTable,
}

impl<'a, 'r> Parser<'a, 'r> {
    pub fn new(input: &'a str, registry: &'r TagRegistry) -> ParseResult<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            registry,
            symbols: SymbolTable::new(),
        })
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let nodes = self.parse_sequence(Placement::TopLevel, None)?;
        check_tail(&nodes)?;
        Ok(Program { nodes })
    }

    fn parse_sequence(
        &mut self,
        placement: Placement,
        open: Option<OpenBlock<'a>>,
    ) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            let span = self.current.span;
            match self.current.kind {
                TokenKind::EOF => {
                    return match open {
                        Some(block) => Err(ParseError::UnclosedBlock {
                            tag: block.name.to_string(),
                            span: block.span,
                        }),
                        None => Ok(nodes),
                    };
                }
                TokenKind::Text(text) => {
                    debug!(%span, text, "discarding text between tags");
                    self.advance()?;
                }
                TokenKind::CloseTag(name) => {
                    return match &open {
                        Some(block) if block.name == name => {
                            self.advance()?;
                            Ok(nodes)
                        }
                        _ => Err(ParseError::UnmatchedCloseTag {
                            tag: name.to_string(),
                            span,
                        }),
                    };
                }
                TokenKind::Tag(body) => {
                    let scanned = scan_tag(body)
                        .map_err(|source| ParseError::MalformedAttributes { source, span })?;
                    self.advance()?;
                    if scanned.head == "gui" && matches!(scanned.form, TagForm::Plain(_)) {
                        // Transparent grouping
                        let block = OpenBlock {
                            name: scanned.head,
                            span,
                        };
                        nodes.extend(self.parse_sequence(placement, Some(block))?);
                        continue;
                    }
                    nodes.push(self.parse_tag(&scanned, span, placement)?);
                }
            }
        }
    }

    fn parse_tag(
        &mut self,
        scanned: &ScannedTag<'a>,
        span: Span,
        placement: Placement,
    ) -> ParseResult<Node> {
        let registry = self.registry;
        let (entry, target, suffix) = match registry.resolve(scanned, &self.symbols) {
            Resolution::Exact(entry) => (entry, None, None),
            Resolution::Pattern {
                entry,
                target,
                suffix,
            } => (entry, Some(target), suffix),
            Resolution::NoMatch => {
                return Err(ParseError::UnknownTag {
                    tag: scanned.head.to_string(),
                    span,
                });
            }
            Resolution::Unresolved { name } => {
                return Err(ParseError::UnresolvedReference {
                    tag: scanned.head.to_string(),
                    name: name.to_string(),
                    span,
                });
            }
        };

        let mut context = TagContext {
            tag: scanned,
            target,
            suffix,
            span,
            placement,
            symbols: &mut self.symbols,
        };
        let mut node = entry.build(&mut context)?;

        if entry.shape == TagShape::Block {
            let block = OpenBlock {
                name: scanned.head,
                span,
            };
            let children = self.parse_sequence(Placement::Nested, Some(block))?;
            if !node.attach_body(children) {
                return Err(ParseError::Misplaced {
                    tag: scanned.head.to_string(),
                    message: format!("'{}' cannot hold a body", node.kind.tag()),
                    span,
                });
            }
        }
        Ok(node)
    }

    fn advance(&mut self) -> ParseResult<Token<'a>> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }
}

// Once the first forever block starts, control never returns, so only
// further forever blocks and hold-open flags may follow it.
fn check_tail(nodes: &[Node]) -> ParseResult<()> {
    let Some(first) = nodes
        .iter()
        .position(|node| matches!(node.kind, NodeKind::Forever { .. }))
    else {
        return Ok(());
    };
    for node in &nodes[first..] {
        if !matches!(node.kind, NodeKind::Forever { .. } | NodeKind::NoTerminate) {
            return Err(ParseError::UnreachableAfterForever {
                tag: node.kind.tag().to_string(),
                span: node.span,
            });
        }
    }
    Ok(())
}

pub fn parse(input: &str) -> ParseResult<Program> {
    parse_with(input, &TagRegistry::with_builtins())
}

pub fn parse_with(input: &str, registry: &TagRegistry) -> ParseResult<Program> {
    Parser::new(input, registry)?.parse_program()
}
