use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::ast::{Condition, Initial, MathOperator, Node, NodeKind, Program, WidgetAction};
use crate::console::Console;
use crate::error::CollaboratorError;
use crate::eval::{EvalError, EvalResult, RandomKind, Reference, Scope, ValueExpr};
use crate::proxy::{EventSet, WidgetHandle, WidgetProxy};
use crate::store::{StoreOp, VariableStore};
use crate::value::Value;

pub mod clock;
pub mod error;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use error::RuntimeError;

pub const DEFAULT_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on `forever` body executions; `None` polls until exit.
    pub max_ticks: Option<u64>,
    pub default_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_ticks: None,
            default_interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    RunningTopLevel,
    Polling,
    Terminated,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Init => "init",
            EngineState::RunningTopLevel => "running-top-level",
            EngineState::Polling => "polling",
            EngineState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// What a finished run left behind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunSummary {
    /// Final variable values in declaration order.
    pub variables: Vec<(String, Value)>,
    /// Number of `forever` bodies executed.
    pub ticks: u64,
    /// Errors that aborted a tick without stopping the loop.
    pub errors: Vec<RuntimeError>,
    /// True when a `_exit` action ended the program.
    pub exited: bool,
}

impl RunSummary {
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| value)
    }
}

/// Runs a loaded program against its collaborators.
pub struct Engine<P, C, K> {
    program: Program,
    machine: Machine<P, C>,
    clock: K,
    config: EngineConfig,
    state: EngineState,
    ticks: u64,
    errors: Vec<RuntimeError>,
}

impl<P: WidgetProxy, C: Console, K: Clock> Engine<P, C, K> {
    pub fn new(program: Program, proxy: P, console: C, clock: K, config: EngineConfig) -> Self {
        Self {
            program,
            machine: Machine::new(proxy, console),
            clock,
            config,
            state: EngineState::Init,
            ticks: 0,
            errors: Vec::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn proxy(&self) -> &P {
        &self.machine.proxy
    }

    pub fn proxy_mut(&mut self) -> &mut P {
        &mut self.machine.proxy
    }

    pub fn console(&self) -> &C {
        &self.machine.console
    }

    pub fn store(&self) -> &VariableStore {
        &self.machine.store
    }

    pub fn into_parts(self) -> (P, C, K) {
        (self.machine.proxy, self.machine.console, self.clock)
    }

    /// Executes the program to termination. Errors in top-level nodes and
    /// collaborator failures are returned; other errors inside the polling
    /// loop abort their tick and are collected in the summary.
    pub fn run(&mut self) -> Result<RunSummary, RuntimeError> {
        if self.state != EngineState::Init {
            warn!(state = %self.state, "engine already ran");
            return Ok(self.summary());
        }

        let program = std::mem::take(&mut self.program);
        let result = self.execute(&program);
        self.program = program;
        result
    }

    // Widgets are torn down on every way out, including fatal errors.
    fn execute(&mut self, program: &Program) -> Result<RunSummary, RuntimeError> {
        let outcome = self.drive(program);
        self.transition(EngineState::Terminated);
        let teardown = self.machine.proxy.destroy_all();
        if let Err(error) = outcome {
            if let Err(teardown_error) = teardown {
                warn!(%teardown_error, "widget teardown failed after a fatal error");
            }
            return Err(error);
        }
        teardown?;
        if self.machine.hold_open {
            self.machine.console.hold_open()?;
        }
        Ok(self.summary())
    }

    fn drive(&mut self, program: &Program) -> Result<(), RuntimeError> {
        self.transition(EngineState::RunningTopLevel);
        let (head, tail) = program.split_tail();
        self.machine
            .exec_block(head, Block::TopLevel)
            .inspect_err(|error| info!(%error, "top-level execution failed"))?;

        if !self.machine.terminated && !tail.is_empty() {
            self.transition(EngineState::Polling);
            self.poll(tail)
                .inspect_err(|error| info!(%error, "polling stopped by a fatal error"))?;
        }
        Ok(())
    }

    fn poll(&mut self, tail: &[Node]) -> Result<(), RuntimeError> {
        let start = self.clock.now_ms();
        let mut schedules = Vec::new();
        for node in tail {
            match &node.kind {
                NodeKind::Forever { interval_ms, body } => schedules.push(Schedule {
                    body,
                    interval_ms: interval_ms.unwrap_or(self.config.default_interval_ms),
                    next_due: start,
                }),
                NodeKind::NoTerminate => self.machine.hold_open = true,
                other => debug!(tag = other.tag(), "ignoring node after forever"),
            }
        }

        loop {
            if self.tick_budget_spent() {
                info!(ticks = self.ticks, "tick budget reached");
                return Ok(());
            }
            if !self.machine.proxy.is_alive() {
                info!("every window was closed");
                return Ok(());
            }
            let Some(due) = schedules.iter().map(|schedule| schedule.next_due).min() else {
                return Ok(());
            };

            self.clock.sleep_until(due);
            let now = self.clock.now_ms();
            self.machine.proxy.pump()?;
            self.machine.poll_events()?;

            for schedule in schedules.iter_mut().filter(|schedule| schedule.next_due <= now) {
                self.ticks += 1;
                debug!(
                    tick = self.ticks,
                    now,
                    interval_ms = schedule.interval_ms,
                    "running forever body"
                );
                match self.machine.exec_block(schedule.body, Block::Forever) {
                    Ok(()) => {}
                    Err(error) if error.is_fatal() => return Err(error),
                    Err(error) => {
                        warn!(tick = self.ticks, %error, "tick aborted");
                        self.errors.push(error);
                    }
                }
                schedule.next_due = self.clock.now_ms().max(now) + schedule.interval_ms;

                if self.machine.terminated || self.tick_budget_spent() {
                    break;
                }
            }

            if self.machine.terminated {
                return Ok(());
            }
        }
    }

    fn tick_budget_spent(&self) -> bool {
        self.config.max_ticks.is_some_and(|max| self.ticks >= max)
    }

    fn transition(&mut self, state: EngineState) {
        self.state = state;
        info!(state = %state, "engine state changed");
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            variables: self.machine.store.snapshot(),
            ticks: self.ticks,
            errors: self.errors.clone(),
            exited: self.machine.terminated,
        }
    }
}

struct Schedule<'p> {
    body: &'p [Node],
    interval_ms: u64,
    next_due: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    TopLevel,
    Forever,
    If,
}

struct Generator {
    rng: StdRng,
    low: f64,
    high: f64,
}

impl Generator {
    fn draw(&mut self, kind: RandomKind) -> Value {
        match kind {
            RandomKind::Integer => {
                let low = self.low.ceil() as i64;
                let high = self.high.floor() as i64;
                if low >= high {
                    Value::Integer(low)
                } else {
                    Value::Integer(self.rng.gen_range(low..=high))
                }
            }
            RandomKind::Float => {
                if self.low < self.high {
                    Value::Float(self.rng.gen_range(self.low..self.high))
                } else {
                    Value::Float(self.low)
                }
            }
        }
    }
}

/// Execution context shared by top-level nodes and every tick.
struct Machine<P, C> {
    proxy: P,
    console: C,
    store: VariableStore,
    widgets: FxHashMap<String, WidgetHandle>,
    widget_order: Vec<String>,
    generators: FxHashMap<String, Generator>,
    events: FxHashMap<String, EventSet>,
    terminated: bool,
    hold_open: bool,
}

impl<P: WidgetProxy, C: Console> Machine<P, C> {
    fn new(proxy: P, console: C) -> Self {
        Self {
            proxy,
            console,
            store: VariableStore::new(),
            widgets: FxHashMap::default(),
            widget_order: Vec::new(),
            generators: FxHashMap::default(),
            events: FxHashMap::default(),
            terminated: false,
            hold_open: false,
        }
    }

    /// Replaces the previous wake-up's events; anything unconsumed is gone.
    fn poll_events(&mut self) -> Result<(), RuntimeError> {
        self.events.clear();
        for name in &self.widget_order {
            let Some(handle) = self.widgets.get(name) else {
                continue;
            };
            let events = self.proxy.poll_events(*handle)?;
            if !events.is_empty() {
                debug!(widget = %name, ?events, "events polled");
                self.events.insert(name.clone(), events);
            }
        }
        Ok(())
    }

    // Inside an `if` body the exit flag is honoured at the end of the
    // innermost enclosing `if`; elsewhere after every node.
    fn exec_block(&mut self, nodes: &[Node], block: Block) -> Result<(), RuntimeError> {
        for node in nodes {
            self.exec(node)
                .map_err(|error| error.at(node.kind.tag(), node.span))?;
            if self.terminated && (block != Block::If || node.is_block()) {
                break;
            }
        }
        Ok(())
    }

    fn exec(&mut self, node: &Node) -> Result<(), RuntimeError> {
        match &node.kind {
            NodeKind::VarDecl { name, initial } => {
                let value = match initial {
                    Initial::Value(expr) => self.eval(expr)?,
                    Initial::Input { prompt } => {
                        let prompt = match prompt {
                            Some(prompt) => self.eval(prompt)?.to_output(),
                            None => format!("Enter value for {name}: "),
                        };
                        Value::infer(&self.console.read_line(&prompt)?)
                    }
                };
                self.store.declare(name, value)?;
            }
            NodeKind::WidgetDecl {
                kind,
                name,
                parent,
                attributes,
            } => {
                let parent = parent
                    .as_deref()
                    .map(|parent| self.widget(parent))
                    .transpose()?;
                let mut values = Vec::with_capacity(attributes.len());
                for (attribute, expr) in attributes {
                    values.push((attribute.clone(), self.eval(expr)?));
                }
                let handle = self.proxy.create(*kind, name, parent, &values)?;
                debug!(widget = %name, %kind, "widget created");
                self.widgets.insert(name.clone(), handle);
                self.widget_order.push(name.clone());
            }
            NodeKind::WidgetAction { widget, action } => {
                let handle = self.widget(widget)?;
                match action {
                    WidgetAction::Show => self.proxy.show(handle)?,
                    WidgetAction::Hide => self.proxy.hide(handle)?,
                    WidgetAction::Close => self.proxy.close(handle)?,
                    WidgetAction::Exit => {
                        info!(widget = %widget, "exit requested");
                        self.terminated = true;
                    }
                }
            }
            NodeKind::PropertyUpdate {
                widget,
                property,
                value,
            } => {
                let value = self.eval(value)?;
                let handle = self.widget(widget)?;
                self.proxy.set_property(handle, property, &value)?;
            }
            NodeKind::Resize {
                widget,
                width,
                height,
            } => {
                let width = self.eval(width)?;
                let height = self.eval(height)?;
                let handle = self.widget(widget)?;
                self.proxy.set_property(handle, "width", &width)?;
                self.proxy.set_property(handle, "height", &height)?;
            }
            NodeKind::MathOp {
                target,
                operator,
                operand,
            } => {
                let operand = operand
                    .as_ref()
                    .map(|operand| self.eval(operand))
                    .transpose()?
                    .unwrap_or(Value::Integer(1));
                let op = match operator {
                    MathOperator::Assign => {
                        self.store.set(target, operand)?;
                        return Ok(());
                    }
                    MathOperator::AddAssign => StoreOp::Add(operand),
                    MathOperator::SubAssign => StoreOp::Sub(operand),
                    MathOperator::MulAssign => StoreOp::Mul(operand),
                    MathOperator::DivAssign => StoreOp::Div(operand),
                    MathOperator::FloorDivAssign => StoreOp::FloorDiv(operand),
                    MathOperator::RemAssign => StoreOp::Rem(operand),
                    MathOperator::PowAssign => StoreOp::Pow(operand),
                    MathOperator::Increment => StoreOp::Increment,
                    MathOperator::Decrement => StoreOp::Decrement,
                };
                self.store.apply(target, op)?;
            }
            NodeKind::MathExpr { target, expression } => {
                let value = self.eval(expression)?;
                self.store.set(target, value)?;
            }
            NodeKind::If { condition, body } => {
                if self.condition(condition)? {
                    self.exec_block(body, Block::If)?;
                }
            }
            NodeKind::Forever { .. } => {
                debug!("forever blocks are driven by the scheduler");
            }
            NodeKind::Output { value } => {
                let line = self.eval(value)?.to_output();
                self.console.write_line(&line)?;
            }
            NodeKind::Input { prompt, target } => {
                let prompt = match prompt {
                    Some(prompt) => format!("{} ", self.eval(prompt)?.to_output()),
                    None => String::new(),
                };
                let line = self.console.read_line(&prompt)?;
                if let Some(target) = target {
                    self.store.set(target, Value::infer(&line))?;
                }
            }
            NodeKind::RandomDecl {
                name,
                min,
                max,
                seed,
            } => {
                let min = self.eval(min)?;
                let max = self.eval(max)?;
                let (Some(low), Some(high)) = (number(&min), number(&max)) else {
                    return Err(RuntimeError::RandomBounds {
                        name: name.clone(),
                        min,
                        max,
                    });
                };
                if low > high {
                    return Err(RuntimeError::EmptyRange {
                        name: name.clone(),
                        min,
                        max,
                    });
                }
                let rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(*seed),
                    None => StdRng::from_entropy(),
                };
                self.generators.insert(name.clone(), Generator { rng, low, high });
            }
            NodeKind::NoTerminate => self.hold_open = true,
        }
        Ok(())
    }

    fn condition(&mut self, condition: &Condition) -> Result<bool, RuntimeError> {
        match condition {
            Condition::Event { widget, event } => Ok(self
                .events
                .get(widget)
                .is_some_and(|events| events.contains(event))),
            Condition::Expr(expr) => Ok(expr.evaluate(self)?.is_truthy()),
        }
    }

    fn eval(&mut self, expr: &ValueExpr) -> Result<Value, RuntimeError> {
        Ok(expr.evaluate(self)?)
    }

    fn widget(&self, name: &str) -> Result<WidgetHandle, CollaboratorError> {
        self.widgets
            .get(name)
            .copied()
            .ok_or_else(|| CollaboratorError::UnknownWidget {
                name: name.to_string(),
            })
    }
}

impl<P: WidgetProxy, C: Console> Scope for Machine<P, C> {
    fn lookup(&mut self, reference: &Reference) -> EvalResult<Value> {
        match reference {
            Reference::Variable(name) => {
                self.store
                    .get(name)
                    .cloned()
                    .map_err(|_| EvalError::UnknownVariable { name: name.clone() })
            }
            Reference::Property { widget, property } => {
                let handle = self.widget(widget)?;
                match self.proxy.get_property(handle, property)? {
                    Value::String(text) => Ok(Value::infer(&text)),
                    value => Ok(value),
                }
            }
            Reference::Random { generator, kind } => self
                .generators
                .get_mut(generator)
                .map(|generator| generator.draw(*kind))
                .ok_or_else(|| EvalError::UnresolvedReference {
                    name: generator.clone(),
                }),
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(value) => Some(*value as f64),
        Value::Float(value) => Some(*value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::ast::WidgetKind;
    use crate::console::BufferConsole;
    use crate::error::ErrorKind;
    use crate::parser::parse;
    use crate::proxy::{HeadlessProxy, ProxyCall, ScriptedInput};

    type TestEngine = Engine<HeadlessProxy, BufferConsole, VirtualClock>;

    fn engine(
        source: &str,
        proxy: HeadlessProxy,
        inputs: &[&str],
        max_ticks: Option<u64>,
    ) -> TestEngine {
        let program = parse(source).expect("program should load");
        Engine::new(
            program,
            proxy,
            BufferConsole::with_inputs(inputs.iter().copied()),
            VirtualClock::new(),
            EngineConfig {
                max_ticks,
                ..EngineConfig::default()
            },
        )
    }

    fn clicks(widget: &str, rounds: &[u64]) -> HeadlessProxy {
        let mut proxy = HeadlessProxy::new();
        for round in rounds {
            proxy.schedule(
                *round,
                ScriptedInput::Click {
                    widget: widget.to_string(),
                },
            );
        }
        proxy
    }

    const COUNTER: &str = indoc! {r#"
        <var name="counter" value="0">
        <window name="wnd" title="Counter">
        <button name="btn_plus" parent="wnd" text="+">
        <forever interval="100">
            <if event=<btn_plus_click>>
                <counter += 1>
            </if>
        </forever>
    "#};

    #[test]
    fn runs_top_level_in_file_order_once() {
        let source = indoc! {r#"
            <var name="a" value="1">
            <output "first">
            <a += 1>
            <output <a_value>>
            <var name="b" value="<a> * 10">
            <output <b>>
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &[], None);
        let summary = engine.run().expect("program should run");

        assert_eq!(engine.console().output(), &["first", "2", "20"]);
        assert_eq!(
            summary.variables,
            vec![
                ("a".to_string(), Value::Integer(2)),
                ("b".to_string(), Value::Integer(20)),
            ]
        );
        assert_eq!(summary.ticks, 0);
        assert_eq!(engine.state(), EngineState::Terminated);
    }

    #[test]
    fn three_clicks_count_to_three() {
        let mut engine = engine(COUNTER, clicks("btn_plus", &[1, 2, 3]), &[], Some(5));
        let summary = engine.run().expect("program should run");

        assert_eq!(summary.variable("counter"), Some(&Value::Integer(3)));
        assert_eq!(summary.ticks, 5);
        assert!(summary.errors.is_empty());
        assert!(engine.proxy().pending("btn_plus").is_empty());
    }

    #[test]
    fn events_do_not_survive_their_tick() {
        let source = indoc! {r#"
            <var name="seen" value="0">
            <window name="wnd">
            <button name="btn" parent="wnd">
            <entry name="ent" parent="wnd">
            <forever>
                <if event=<ent_changed>>
                    <seen += 1>
                </if>
            </forever>
        "#};
        let mut proxy = clicks("btn", &[1]);
        proxy.schedule(
            1,
            ScriptedInput::Type {
                widget: "ent".to_string(),
                text: "x".to_string(),
            },
        );
        let mut engine = engine(source, proxy, &[], Some(4));
        let summary = engine.run().expect("program should run");

        assert_eq!(summary.variable("seen"), Some(&Value::Integer(1)));
        assert!(engine.proxy().pending("btn").is_empty());
    }

    #[test]
    fn matching_ifs_run_in_declaration_order() {
        let source = indoc! {r#"
            <window name="wnd">
            <button name="btn" parent="wnd">
            <forever>
                <if event=<btn_click>>
                    <output "one">
                </if>
                <if event=<btn_click>>
                    <output "two">
                </if>
            </forever>
        "#};
        let mut engine = engine(source, clicks("btn", &[1]), &[], Some(2));
        engine.run().expect("program should run");
        assert_eq!(engine.console().output(), &["one", "two"]);
    }

    #[test]
    fn exit_abandons_later_ifs_in_the_tick() {
        let source = indoc! {r#"
            <var name="after" value="0">
            <window name="wnd">
            <button name="btn" parent="wnd">
            <forever>
                <if event=<btn_click>>
                    <wnd_exit>
                    <output "same block still runs">
                </if>
                <if event=<btn_click>>
                    <after = 1>
                </if>
            </forever>
        "#};
        let mut engine = engine(source, clicks("btn", &[1]), &[], Some(10));
        let summary = engine.run().expect("program should run");

        assert!(summary.exited);
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.variable("after"), Some(&Value::Integer(0)));
        assert_eq!(engine.console().output(), &["same block still runs"]);
        assert_eq!(engine.proxy().journal().last(), Some(&ProxyCall::DestroyAll));
        assert_eq!(engine.state(), EngineState::Terminated);
    }

    #[test]
    fn tick_errors_are_reported_and_polling_continues() {
        let source = indoc! {r#"
            <var name="name" value="abc">
            <var name="ticks" value="0">
            <window name="wnd">
            <forever>
                <ticks++>
                <name++>
            </forever>
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &[], Some(3));
        let summary = engine.run().expect("tick errors are not fatal");

        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.variable("ticks"), Some(&Value::Integer(3)));
        assert_eq!(summary.errors.len(), 3);
        assert_eq!(summary.errors[0].kind(), ErrorKind::TypeMismatch);
        assert_eq!(summary.errors[0].span().map(|span| span.line), Some(6));
    }

    #[test]
    fn top_level_errors_are_fatal() {
        let source = indoc! {r#"
            <window name="wnd">
            <wnd_show>
            <var name="x" value="1">
            <x /= 0>
            <output "never">
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &[], None);
        let error = engine.run().expect_err("division by zero at top level");

        assert_eq!(error.kind(), ErrorKind::Arithmetic);
        assert!(engine.console().output().is_empty());
        assert_eq!(engine.state(), EngineState::Terminated);
        assert_eq!(engine.proxy().journal().last(), Some(&ProxyCall::DestroyAll));
        assert!(!engine.proxy().is_alive());
    }

    #[test]
    fn reads_console_input_into_variables() {
        let source = indoc! {r#"
            <var name="age" value=<input "Age?">>
            <var name="name" value="">
            <input "Name?" var="name">
            <age += 1>
            <output "<name> is <age>">
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &["41", "Ada"], None);
        engine.run().expect("program should run");

        assert_eq!(engine.console().output(), &["Ada is 42"]);
        assert_eq!(engine.console().prompts(), &["Age?", "Name? "]);
    }

    #[test]
    fn exhausted_console_input_is_fatal_in_ticks() {
        let source = indoc! {r#"
            <window name="wnd">
            <forever>
                <input "More?">
            </forever>
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &[], Some(3));
        let error = engine.run().expect_err("no input left");
        assert_eq!(error.kind(), ErrorKind::Collaborator);
        assert_eq!(engine.proxy().journal().last(), Some(&ProxyCall::DestroyAll));
    }

    #[test]
    fn every_declared_widget_property_is_readable() {
        let mut source = String::from(indoc! {r#"
            <window name="wnd">
            <button name="btn" parent="wnd">
            <label name="lbl" parent="wnd">
            <entry name="ent" parent="wnd">
        "#});
        let widgets = [
            ("wnd", WidgetKind::Window),
            ("btn", WidgetKind::Button),
            ("lbl", WidgetKind::Label),
            ("ent", WidgetKind::Entry),
        ];
        let mut reads = 0;
        for (name, kind) in widgets {
            for property in kind.properties() {
                source.push_str(&format!("<output <{name}_{property}>>\n"));
                reads += 1;
            }
        }
        let mut engine = engine(&source, HeadlessProxy::new(), &[], None);
        engine.run().expect("every declared property has a value");
        assert_eq!(engine.console().output().len(), reads);
    }

    #[test]
    fn widget_flags_have_defaults_in_conditions() {
        let source = indoc! {r#"
            <window name="wnd">
            <button name="btn" parent="wnd">
            <entry name="ent" parent="wnd">
            <forever>
                <if condition="<btn_enabled> == true and <ent_readonly> == false">
                    <output "ready">
                </if>
            </forever>
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &[], Some(1));
        let summary = engine.run().expect("flags resolve at tick time");
        assert!(summary.errors.is_empty());
        assert_eq!(engine.console().output(), &["ready"]);
    }

    #[test]
    fn applies_compound_and_word_operators() {
        let source = indoc! {r#"
            <var name="n" value="17">
            <n %= 5>
            <n **= 3>
            <n //= 5>
            <math var="n" op="mod" value="-4">
            <var name="m" value="7 % -3">
            <var name="big" value="-9223372036854775807 - 1">
            <var name="r" value="<big> % -1">
            <output "n=$n m=$m r=$r">
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &[], None);
        let summary = engine.run().expect("program should run");
        assert_eq!(summary.variable("n"), Some(&Value::Integer(-3)));
        assert_eq!(engine.console().output(), &["n=-3 m=-2 r=0"]);
    }

    #[test]
    fn widgets_are_created_and_updated_through_the_proxy() {
        let source = indoc! {r#"
            <window name="wnd" title="Demo" size="200","120">
            <label name="lbl" parent="wnd" text="start">
            <entry name="ent" parent="wnd">
            <wnd_show>
            <lbl_text="ready">
            <wnd_size="400","300">
            <forever>
                <if event=<ent_changed>>
                    <lbl_text="<ent_value> * 2">
                </if>
            </forever>
        "#};
        let mut proxy = HeadlessProxy::new();
        proxy.schedule(
            1,
            ScriptedInput::Type {
                widget: "ent".to_string(),
                text: "21".to_string(),
            },
        );
        let mut engine = engine(source, proxy, &[], Some(1));
        engine.run().expect("program should run");

        let proxy = engine.proxy();
        assert_eq!(proxy.parent_of("lbl"), Some("wnd"));
        assert_eq!(proxy.property("wnd", "title"), Some(&Value::from("Demo")));
        assert_eq!(proxy.property("wnd", "width"), Some(&Value::Integer(400)));
        assert_eq!(proxy.property("wnd", "height"), Some(&Value::Integer(300)));
        assert_eq!(proxy.property("lbl", "text"), Some(&Value::Integer(42)));
        assert!(proxy.journal().contains(&ProxyCall::Show {
            name: "wnd".to_string()
        }));
    }

    #[test]
    fn closing_every_window_stops_polling() {
        let mut proxy = HeadlessProxy::new();
        proxy.schedule(
            2,
            ScriptedInput::Close {
                widget: "wnd".to_string(),
            },
        );
        let source = indoc! {r#"
            <window name="wnd">
            <forever>
                <if event=<wnd_closed>>
                    <output "bye">
                </if>
            </forever>
            <noterminate>
        "#};
        let mut engine = engine(source, proxy, &[], None);
        let summary = engine.run().expect("program should run");

        assert_eq!(summary.ticks, 2);
        assert!(!summary.exited);
        assert_eq!(engine.console().output(), &["bye"]);
        assert!(engine.console().held_open());
    }

    #[test]
    fn forevers_run_at_their_own_intervals() {
        let source = indoc! {r#"
            <var name="fast" value="0">
            <var name="slow" value="0">
            <forever interval="100">
                <fast++>
            </forever>
            <forever interval="300">
                <slow++>
            </forever>
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &[], Some(8));
        let summary = engine.run().expect("program should run");

        // t=0: both, t=100, t=200, t=300: both, t=400, t=500
        assert_eq!(summary.variable("fast"), Some(&Value::Integer(6)));
        assert_eq!(summary.variable("slow"), Some(&Value::Integer(2)));
    }

    #[test]
    fn seeded_random_generators_stay_in_range() {
        let source = indoc! {r#"
            <random name="rnd" min="1" max="6" seed="7">
            <var name="roll" value="<rnd_random>">
            <var name="fraction" value="<rnd_float>">
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &[], None);
        let summary = engine.run().expect("program should run");

        let Some(Value::Integer(roll)) = summary.variable("roll") else {
            panic!("roll should be an integer");
        };
        assert!((1..=6).contains(roll));
        let Some(Value::Float(fraction)) = summary.variable("fraction") else {
            panic!("fraction should be a float");
        };
        assert!((1.0..6.0).contains(fraction));
    }

    #[test]
    fn rejects_inverted_random_bounds() {
        let source = r#"<random name="rnd" min="9" max="1">"#;
        let mut engine = engine(source, HeadlessProxy::new(), &[], None);
        let error = engine.run().expect_err("empty range");
        assert!(matches!(
            error,
            RuntimeError::At { ref source, .. } if matches!(**source, RuntimeError::EmptyRange { .. })
        ));
    }

    #[test]
    fn conditions_read_variables_and_widget_state() {
        let source = indoc! {r#"
            <var name="n" value="3">
            <window name="wnd">
            <entry name="ent" parent="wnd" value="5">
            <forever>
                <if condition="<n> < <ent_value> and not <n> == 5">
                    <output "smaller">
                </if>
                <n++>
            </forever>
        "#};
        let mut engine = engine(source, HeadlessProxy::new(), &[], Some(4));
        engine.run().expect("program should run");
        assert_eq!(engine.console().output(), &["smaller", "smaller"]);
    }
}
