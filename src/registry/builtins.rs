use crate::ast::{Condition, Initial, MathOperator, Node, NodeKind, WidgetAction, WidgetKind};
use crate::eval::ValueExpr;
use crate::parser::ParseError;
use crate::parser::attrs::{AttrValue, TagForm, scan_tag};
use crate::symbols::Symbol;

use super::{TagContext, TagRegistry};

const PROPERTY_SUFFIXES: &[&str] = &[
    "text",
    "title",
    "enabled",
    "placeholder",
    "readonly",
    "visible",
    "x",
    "y",
    "width",
    "height",
];

pub(super) fn install(registry: &mut TagRegistry) {
    for name in ["var", "variable"] {
        registry.register_tag(name, variable, Some(validate_variable));
    }
    registry.register_tag("window", window, None);
    registry.register_tag("button", button, None);
    registry.register_tag("label", label, None);
    registry.register_tag("entry", entry, None);
    registry.register_block("if", if_block, Some(validate_if));
    registry.register_block("forever", forever, Some(validate_forever));
    registry.register_tag("math", math, Some(validate_math));
    registry.register_tag("output", output, None);
    registry.register_tag("input", input, None);
    for name in ["noterminate", "noquit"] {
        registry.register_tag(name, no_terminate, Some(validate_bare));
    }
    registry.register_tag("random", random, Some(validate_random));

    registry.register_suffix("show", show, Some(validate_bare));
    registry.register_suffix("hide", hide, Some(validate_bare));
    registry.register_suffix("close", close, Some(validate_bare));
    registry.register_suffix("exit", exit, Some(validate_bare));
    registry.register_suffix("value", value_suffix, None);
    registry.register_suffix("size", resize, None);
    for suffix in PROPERTY_SUFFIXES {
        registry.register_suffix(suffix, property_update, None);
    }
}

fn node(context: &TagContext<'_>, kind: NodeKind) -> Node {
    Node::new(kind, context.span)
}

fn validate_bare(context: &TagContext<'_>) -> Result<(), ParseError> {
    context.expect_only(&[])
}

fn validate_variable(context: &TagContext<'_>) -> Result<(), ParseError> {
    context.expect_only(&["name", "value"])?;
    context.expect_top_level("variable declarations")
}

fn variable(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let name = context.identifier("name")?;
    let initial = match context.attr("value") {
        None => Initial::Value(ValueExpr::literal(0)),
        Some(AttrValue::Span(span)) if is_input_span(span) => Initial::Input {
            prompt: input_span_prompt(context, span)?,
        },
        Some(value) => Initial::Value(context.value_expr("value", value)?),
    };
    // Declared after the initial value so it cannot refer to itself
    context.declare(&name, Symbol::Variable)?;
    Ok(node(context, NodeKind::VarDecl { name, initial }))
}

fn is_input_span(span: &str) -> bool {
    span.strip_prefix('<')
        .and_then(|inner| inner.trim_start().strip_prefix("input"))
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

// `<input>`, `<input prompt="...">` or `<input "...">` used as a value.
fn input_span_prompt(
    context: &TagContext<'_>,
    span: &str,
) -> Result<Option<ValueExpr>, ParseError> {
    let inner = span
        .strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(span);
    let scanned = scan_tag(inner.trim()).map_err(|source| context.malformed_attributes(source))?;
    let TagForm::Plain(attributes) = &scanned.form else {
        return Err(context.invalid("value", format!("'{span}' is not an input request")));
    };
    if scanned.head != "input" {
        return Err(context.invalid("value", format!("'{span}' is not an input request")));
    }
    let prompt = attributes
        .get("prompt")
        .or_else(|| attributes.positional().next());
    prompt
        .map(|value| context.value_expr("prompt", value))
        .transpose()
}

fn window(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    widget(context, WidgetKind::Window)
}

fn button(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    widget(context, WidgetKind::Button)
}

fn label(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    widget(context, WidgetKind::Label)
}

fn entry(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    widget(context, WidgetKind::Entry)
}

fn widget_defaults(kind: WidgetKind) -> &'static [(&'static str, WidgetDefault)] {
    match kind {
        WidgetKind::Window => &[
            ("title", WidgetDefault::Text("Window")),
            ("width", WidgetDefault::Integer(300)),
            ("height", WidgetDefault::Integer(300)),
        ],
        WidgetKind::Button => &[
            ("text", WidgetDefault::Text("Button")),
            ("x", WidgetDefault::Integer(0)),
            ("y", WidgetDefault::Integer(0)),
            ("width", WidgetDefault::Integer(100)),
            ("height", WidgetDefault::Integer(30)),
            ("enabled", WidgetDefault::Boolean(true)),
        ],
        WidgetKind::Label => &[
            ("text", WidgetDefault::Text("")),
            ("x", WidgetDefault::Integer(0)),
            ("y", WidgetDefault::Integer(0)),
        ],
        WidgetKind::Entry => &[
            ("value", WidgetDefault::Text("")),
            ("placeholder", WidgetDefault::Text("")),
            ("x", WidgetDefault::Integer(0)),
            ("y", WidgetDefault::Integer(0)),
            ("width", WidgetDefault::Integer(150)),
            ("height", WidgetDefault::Integer(25)),
            ("readonly", WidgetDefault::Boolean(false)),
            ("enabled", WidgetDefault::Boolean(true)),
        ],
    }
}

#[derive(Clone, Copy)]
enum WidgetDefault {
    Text(&'static str),
    Integer(i64),
    Boolean(bool),
}

fn widget(context: &mut TagContext<'_>, kind: WidgetKind) -> Result<Node, ParseError> {
    context.expect_top_level("widget declarations")?;
    let name = context.identifier("name")?;
    let attributes = context.attributes()?;
    if let Some(value) = attributes.positional().next() {
        return Err(context.unexpected(&value.source()));
    }

    let parent = match attributes.get("parent") {
        None => None,
        Some(_) if kind == WidgetKind::Window => {
            return Err(context.invalid("parent", "windows cannot have a parent".to_string()));
        }
        Some(_) => {
            let parent = context.identifier("parent")?;
            match context.symbols.widget_kind(&parent) {
                Some(WidgetKind::Window) => Some(parent),
                Some(other) => {
                    return Err(context.invalid(
                        "parent",
                        format!("'{parent}' is a {other}, not a window"),
                    ));
                }
                None => return Err(context.unresolved(&parent)),
            }
        }
    };

    let mut resolved = Vec::new();
    for (attribute, value) in attributes.named() {
        match attribute {
            "name" | "parent" => {}
            "size" => {
                let (width, height) = size_pair(context, value)?;
                resolved.push(("width".to_string(), width));
                resolved.push(("height".to_string(), height));
            }
            _ => resolved.push((attribute.to_string(), context.value_expr(attribute, value)?)),
        }
    }
    for (attribute, default) in widget_defaults(kind) {
        if resolved.iter().any(|(name, _)| name.as_str() == *attribute) {
            continue;
        }
        let value = match default {
            WidgetDefault::Text(text) => ValueExpr::literal(*text),
            WidgetDefault::Integer(number) => ValueExpr::literal(*number),
            WidgetDefault::Boolean(flag) => ValueExpr::literal(*flag),
        };
        resolved.push((attribute.to_string(), value));
    }

    context.declare(&name, Symbol::Widget(kind))?;
    Ok(node(
        context,
        NodeKind::WidgetDecl {
            kind,
            name,
            parent,
            attributes: resolved,
        },
    ))
}

// `"300","350"` sets both dimensions; a single value makes a square.
fn size_pair(
    context: &TagContext<'_>,
    value: &AttrValue,
) -> Result<(ValueExpr, ValueExpr), ParseError> {
    match value {
        AttrValue::Stack(items) if items.len() == 2 => {
            let width = context.value_expr("size", &AttrValue::Text(items[0].clone()))?;
            let height = context.value_expr("size", &AttrValue::Text(items[1].clone()))?;
            Ok((width, height))
        }
        AttrValue::Stack(items) => Err(context.invalid(
            "size",
            format!("expected width and height, found {} values", items.len()),
        )),
        single => {
            let side = context.value_expr("size", single)?;
            Ok((side.clone(), side))
        }
    }
}

fn validate_if(context: &TagContext<'_>) -> Result<(), ParseError> {
    context.expect_only(&["event", "condition"])?;
    match (context.attr("event"), context.attr("condition")) {
        (Some(_), Some(_)) => Err(context.unexpected("condition")),
        (None, None) => Err(context.missing("condition")),
        _ => Ok(()),
    }
}

fn if_block(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let condition = if let Some(event) = context.attr("event") {
        let source = event.source();
        let name = source
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim();
        match context.symbols.event(name) {
            Some((widget, event)) => Condition::Event { widget, event },
            None => return Err(event_error(context, name)),
        }
    } else {
        let source = context.required("condition")?.source();
        Condition::Expr(context.condition("condition", &source)?)
    };
    Ok(node(
        context,
        NodeKind::If {
            condition,
            body: Vec::new(),
        },
    ))
}

fn event_error(context: &TagContext<'_>, name: &str) -> ParseError {
    let Some((widget, suffix)) = name.rsplit_once('_') else {
        return context.invalid("event", format!("'{name}' is not a widget event"));
    };
    match context.symbols.widget_kind(widget) {
        Some(kind) => context.invalid(
            "event",
            format!("{kind} '{widget}' has no '{suffix}' event"),
        ),
        None => context.unresolved(widget),
    }
}

fn validate_forever(context: &TagContext<'_>) -> Result<(), ParseError> {
    context.expect_only(&["interval"])?;
    context.expect_top_level("forever blocks")
}

fn forever(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let interval_ms = context.unsigned("interval")?;
    if interval_ms == Some(0) {
        return Err(context.invalid("interval", "interval must be positive".to_string()));
    }
    Ok(node(
        context,
        NodeKind::Forever {
            interval_ms,
            body: Vec::new(),
        },
    ))
}

fn validate_math(context: &TagContext<'_>) -> Result<(), ParseError> {
    context.expect_only(&["var", "op", "value", "result", "expr"])
}

fn math(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    if context.attr("result").is_some() {
        let target = context.identifier("result")?;
        let target = declared_variable(context, &target)?;
        let expression = context.value_expr("expr", context.required("expr")?)?;
        return Ok(node(context, NodeKind::MathExpr { target, expression }));
    }

    let target = context.identifier("var")?;
    let target = declared_variable(context, &target)?;
    let symbol = context.required("op")?.source();
    let operator = MathOperator::from_symbol(symbol.trim())
        .ok_or_else(|| context.invalid("op", format!("unknown operator '{symbol}'")))?;
    let operand = if operator.takes_operand() {
        Some(context.value_expr("value", context.required("value")?)?)
    } else {
        if context.attr("value").is_some() {
            return Err(context.unexpected("value"));
        }
        None
    };
    Ok(node(
        context,
        NodeKind::MathOp {
            target,
            operator,
            operand,
        },
    ))
}

fn declared_variable(context: &TagContext<'_>, name: &str) -> Result<String, ParseError> {
    context
        .symbols
        .variable(name)
        .map(str::to_string)
        .ok_or_else(|| context.unresolved(name))
}

// `<x += 1>`, `<x++>`, `<x = "text">` on a declared variable
pub(super) fn assignment(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let target = context.target()?.to_string();
    math_operator_node(context, target)
}

fn math_operator_node(context: &TagContext<'_>, target: String) -> Result<Node, ParseError> {
    let Some((symbol, value)) = context.operator() else {
        return Err(context.malformed(format!(
            "expected an operator after '{}'",
            context.name()
        )));
    };
    let operator = MathOperator::from_symbol(symbol)
        .ok_or_else(|| context.malformed(format!("unknown operator '{symbol}'")))?;
    let operand = value
        .map(|value| context.value_expr(symbol, value))
        .transpose()?;
    Ok(node(
        context,
        NodeKind::MathOp {
            target,
            operator,
            operand,
        },
    ))
}

fn output(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let attributes = context.attributes()?;
    let mut positional = attributes.positional();
    let value = match (attributes.get("value"), positional.next()) {
        (Some(value), None) => context.value_expr("value", value)?,
        (None, Some(value)) => {
            if let Some(extra) = positional.next() {
                return Err(context.unexpected(&extra.source()));
            }
            context.value_expr("value", value)?
        }
        (Some(_), Some(extra)) => return Err(context.unexpected(&extra.source())),
        (None, None) => return Err(context.missing("value")),
    };
    if let Some((name, _)) = attributes.named().find(|(name, _)| *name != "value") {
        return Err(context.unexpected(name));
    }
    Ok(node(context, NodeKind::Output { value }))
}

fn input(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let attributes = context.attributes()?;
    if let Some((name, _)) = attributes
        .named()
        .find(|(name, _)| !matches!(*name, "prompt" | "var"))
    {
        return Err(context.unexpected(name));
    }
    let prompt = attributes
        .get("prompt")
        .or_else(|| attributes.positional().next())
        .map(|value| context.value_expr("prompt", value))
        .transpose()?;
    let target = match attributes.get("var") {
        Some(_) => {
            let name = context.identifier("var")?;
            Some(declared_variable(context, &name)?)
        }
        None => None,
    };
    Ok(node(context, NodeKind::Input { prompt, target }))
}

fn no_terminate(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    Ok(node(context, NodeKind::NoTerminate))
}

fn validate_random(context: &TagContext<'_>) -> Result<(), ParseError> {
    context.expect_only(&["name", "min", "max", "seed"])?;
    context.expect_top_level("random generators")
}

fn random(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let name = context.identifier("name")?;
    let min = match context.attr("min") {
        Some(value) => context.value_expr("min", value)?,
        None => ValueExpr::literal(0),
    };
    let max = match context.attr("max") {
        Some(value) => context.value_expr("max", value)?,
        None => ValueExpr::literal(100),
    };
    let seed = context.unsigned("seed")?;
    context.declare(&name, Symbol::Random)?;
    Ok(node(
        context,
        NodeKind::RandomDecl {
            name,
            min,
            max,
            seed,
        },
    ))
}

fn widget_target(context: &TagContext<'_>) -> Result<(String, WidgetKind), ParseError> {
    let target = context.target()?;
    context
        .symbols
        .widget_kind(target)
        .map(|kind| (target.to_string(), kind))
        .ok_or_else(|| context.unknown_tag())
}

fn widget_action(context: &TagContext<'_>, action: WidgetAction) -> Result<Node, ParseError> {
    let (widget, _) = widget_target(context)?;
    Ok(node(context, NodeKind::WidgetAction { widget, action }))
}

fn show(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    widget_action(context, WidgetAction::Show)
}

fn hide(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    widget_action(context, WidgetAction::Hide)
}

fn close(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    widget_action(context, WidgetAction::Close)
}

fn exit(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    widget_action(context, WidgetAction::Exit)
}

fn assigned_value<'c>(context: &'c TagContext<'_>) -> Result<&'c AttrValue, ParseError> {
    match context.operator() {
        Some(("=", Some(value))) => Ok(value),
        Some((symbol, _)) => Err(context.malformed(format!(
            "'<{}>' only supports '=', found '{symbol}'",
            context.name()
        ))),
        None => Err(context.malformed(format!("expected '<{}=\"...\">'", context.name()))),
    }
}

// `<x_value ...>` mutates a variable; on an entry it sets the entry's text.
fn value_suffix(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let target = context.target()?;
    if context.symbols.is_variable(target) {
        return math_operator_node(context, target.to_string());
    }
    let (widget, kind) = widget_target(context)?;
    if !kind.has_property("value") {
        return Err(context.unknown_tag());
    }
    let value = context.value_expr("value", assigned_value(context)?)?;
    Ok(node(
        context,
        NodeKind::PropertyUpdate {
            widget,
            property: "value".to_string(),
            value,
        },
    ))
}

fn property_update(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let (widget, kind) = widget_target(context)?;
    let property = context.suffix.unwrap_or_default().to_string();
    if !kind.has_property(&property) {
        return Err(context.invalid(
            &property,
            format!("{kind} '{widget}' has no '{property}' property"),
        ));
    }
    let value = context.value_expr(&property, assigned_value(context)?)?;
    Ok(node(
        context,
        NodeKind::PropertyUpdate {
            widget,
            property,
            value,
        },
    ))
}

fn resize(context: &mut TagContext<'_>) -> Result<Node, ParseError> {
    let (widget, kind) = widget_target(context)?;
    if !kind.is_resizable() {
        return Err(context.invalid("size", format!("{kind} '{widget}' cannot be resized")));
    }
    let (width, height) = size_pair(context, assigned_value(context)?)?;
    Ok(node(
        context,
        NodeKind::Resize {
            widget,
            width,
            height,
        },
    ))
}
