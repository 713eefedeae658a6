use std::fmt;

use crate::eval::{Expr, ValueExpr};
use crate::token::Span;

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub nodes: Vec<Node>,
}

impl Program {
    /// Top-level nodes that run once, followed by the trailing `forever`
    /// section (forever blocks and hold-open flags).
    pub fn split_tail(&self) -> (&[Node], &[Node]) {
        let tail_start = self
            .nodes
            .iter()
            .position(|node| matches!(node.kind, NodeKind::Forever { .. }))
            .unwrap_or(self.nodes.len());
        self.nodes.split_at(tail_start)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, NodeKind::If { .. } | NodeKind::Forever { .. })
    }

    /// Hands the parsed children to a block node; returns false for leaves.
    pub fn attach_body(&mut self, children: Vec<Node>) -> bool {
        match &mut self.kind {
            NodeKind::If { body, .. } | NodeKind::Forever { body, .. } => {
                *body = children;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum NodeKind {
    VarDecl {
        name: String,
        initial: Initial,
    },
    WidgetDecl {
        kind: WidgetKind,
        name: String,
        parent: Option<String>,
        attributes: Vec<(String, ValueExpr)>,
    },
    WidgetAction {
        widget: String,
        action: WidgetAction,
    },
    PropertyUpdate {
        widget: String,
        property: String,
        value: ValueExpr,
    },
    Resize {
        widget: String,
        width: ValueExpr,
        height: ValueExpr,
    },
    MathOp {
        target: String,
        operator: MathOperator,
        operand: Option<ValueExpr>,
    },
    MathExpr {
        target: String,
        expression: ValueExpr,
    },
    If {
        condition: Condition,
        body: Vec<Node>,
    },
    /// `interval_ms` is `None` when the tag leaves it to the engine.
    Forever {
        interval_ms: Option<u64>,
        body: Vec<Node>,
    },
    Output {
        value: ValueExpr,
    },
    Input {
        prompt: Option<ValueExpr>,
        target: Option<String>,
    },
    RandomDecl {
        name: String,
        min: ValueExpr,
        max: ValueExpr,
        seed: Option<u64>,
    },
    NoTerminate,
}

impl NodeKind {
    /// Tag name used in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::VarDecl { .. } => "var",
            NodeKind::WidgetDecl { kind, .. } => kind.tag(),
            NodeKind::WidgetAction { action, .. } => match action {
                WidgetAction::Show => "_show",
                WidgetAction::Hide => "_hide",
                WidgetAction::Close => "_close",
                WidgetAction::Exit => "_exit",
            },
            NodeKind::PropertyUpdate { .. } => "_property=",
            NodeKind::Resize { .. } => "_size=",
            NodeKind::MathOp { .. } | NodeKind::MathExpr { .. } => "math",
            NodeKind::If { .. } => "if",
            NodeKind::Forever { .. } => "forever",
            NodeKind::Output { .. } => "output",
            NodeKind::Input { .. } => "input",
            NodeKind::RandomDecl { .. } => "random",
            NodeKind::NoTerminate => "noterminate",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Initial {
    Value(ValueExpr),
    Input { prompt: Option<ValueExpr> },
}

#[derive(Debug, PartialEq, Clone)]
pub enum Condition {
    Event { widget: String, event: EventKind },
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetAction {
    Show,
    Hide,
    Close,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOperator {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    FloorDivAssign,
    RemAssign,
    PowAssign,
    Increment,
    Decrement,
}

impl MathOperator {
    /// Accepts the operator symbols and their word spellings.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let operator = match symbol {
            "=" | ":=" => MathOperator::Assign,
            "+=" | "add" => MathOperator::AddAssign,
            "-=" | "sub" => MathOperator::SubAssign,
            "*=" | "mul" => MathOperator::MulAssign,
            "/=" | "div" => MathOperator::DivAssign,
            "//=" | "floordiv" => MathOperator::FloorDivAssign,
            "%=" | "mod" => MathOperator::RemAssign,
            "**=" | "pow" => MathOperator::PowAssign,
            "++" | "inc" => MathOperator::Increment,
            "--" | "dec" => MathOperator::Decrement,
            _ => return None,
        };
        Some(operator)
    }

    pub fn takes_operand(self) -> bool {
        !matches!(self, MathOperator::Increment | MathOperator::Decrement)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Window,
    Button,
    Label,
    Entry,
}

const WINDOW_PROPERTIES: &[&str] = &["title", "width", "height", "visible"];
const BUTTON_PROPERTIES: &[&str] = &["text", "x", "y", "width", "height", "enabled", "visible"];
const LABEL_PROPERTIES: &[&str] = &["text", "x", "y", "visible"];
const ENTRY_PROPERTIES: &[&str] = &[
    "value",
    "placeholder",
    "readonly",
    "x",
    "y",
    "width",
    "height",
    "enabled",
    "visible",
];

impl WidgetKind {
    pub fn tag(self) -> &'static str {
        match self {
            WidgetKind::Window => "window",
            WidgetKind::Button => "button",
            WidgetKind::Label => "label",
            WidgetKind::Entry => "entry",
        }
    }

    pub fn properties(self) -> &'static [&'static str] {
        match self {
            WidgetKind::Window => WINDOW_PROPERTIES,
            WidgetKind::Button => BUTTON_PROPERTIES,
            WidgetKind::Label => LABEL_PROPERTIES,
            WidgetKind::Entry => ENTRY_PROPERTIES,
        }
    }

    pub fn has_property(self, property: &str) -> bool {
        self.properties().contains(&property)
    }

    pub fn events(self) -> &'static [EventKind] {
        match self {
            WidgetKind::Window => &[EventKind::Closed],
            WidgetKind::Button => &[EventKind::Click],
            WidgetKind::Label => &[],
            WidgetKind::Entry => &[EventKind::Changed],
        }
    }

    pub fn is_resizable(self) -> bool {
        !matches!(self, WidgetKind::Label)
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Click,
    Changed,
    Closed,
}

impl EventKind {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "click" => Some(EventKind::Click),
            "changed" => Some(EventKind::Changed),
            "closed" => Some(EventKind::Closed),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Changed => "changed",
            EventKind::Closed => "closed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: NodeKind) -> Node {
        Node::new(kind, Span::default())
    }

    #[test]
    fn splits_program_at_first_forever() {
        let program = Program {
            nodes: vec![
                node(NodeKind::NoTerminate),
                node(NodeKind::Forever {
                    interval_ms: Some(100),
                    body: Vec::new(),
                }),
                node(NodeKind::NoTerminate),
            ],
        };
        let (head, tail) = program.split_tail();
        assert_eq!(head.len(), 1);
        assert_eq!(tail.len(), 2);
    }

    #[test]
    fn attaches_bodies_only_to_blocks() {
        let mut forever = node(NodeKind::Forever {
            interval_ms: None,
            body: Vec::new(),
        });
        assert!(forever.attach_body(vec![node(NodeKind::NoTerminate)]));
        assert!(matches!(&forever.kind, NodeKind::Forever { body, .. } if body.len() == 1));

        let mut leaf = node(NodeKind::NoTerminate);
        assert!(!leaf.attach_body(Vec::new()));
    }

    #[test]
    fn widget_kinds_expose_properties_and_events() {
        assert!(WidgetKind::Entry.has_property("value"));
        assert!(!WidgetKind::Label.has_property("value"));
        assert_eq!(WidgetKind::Button.events(), &[EventKind::Click]);
        assert_eq!(MathOperator::from_symbol("inc"), Some(MathOperator::Increment));
        assert!(!MathOperator::Decrement.takes_operand());
    }

    #[test]
    fn math_operators_accept_word_spellings() {
        for (word, symbol) in [
            ("add", "+="),
            ("sub", "-="),
            ("mul", "*="),
            ("div", "/="),
            ("floordiv", "//="),
            ("mod", "%="),
            ("pow", "**="),
            (":=", "="),
        ] {
            assert_eq!(
                MathOperator::from_symbol(word),
                MathOperator::from_symbol(symbol),
                "{word} should match {symbol}"
            );
            assert!(MathOperator::from_symbol(word).is_some());
        }
        assert_eq!(MathOperator::from_symbol("xor"), None);
    }
}
