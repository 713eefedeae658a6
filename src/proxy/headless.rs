use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{EventKind, WidgetKind};
use crate::error::CollaboratorError;
use crate::value::Value;

use super::{EventSet, ProxyResult, WidgetHandle, WidgetProxy};

/// User interaction replayed by the headless toolkit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptedInput {
    Click { widget: String },
    Type { widget: String, text: String },
    Close { widget: String },
}

/// Input delivered when the proxy is pumped for the `round`-th time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInput {
    pub round: u64,
    #[serde(flatten)]
    pub input: ScriptedInput,
}

/// Journal entry for every mutating call the engine made.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyCall {
    Create { kind: WidgetKind, name: String },
    Show { name: String },
    Hide { name: String },
    Close { name: String },
    SetProperty {
        name: String,
        property: String,
        value: Value,
    },
    DestroyAll,
}

#[derive(Debug)]
struct WidgetRecord {
    kind: WidgetKind,
    name: String,
    parent: Option<WidgetHandle>,
    properties: BTreeMap<String, Value>,
    visible: bool,
    closed: bool,
    pending: EventSet,
}

/// In-memory widget toolkit with scripted user input.
#[derive(Debug, Default)]
pub struct HeadlessProxy {
    widgets: Vec<WidgetRecord>,
    names: FxHashMap<String, WidgetHandle>,
    script: BTreeMap<u64, Vec<ScriptedInput>>,
    round: u64,
    journal: Vec<ProxyCall>,
    destroyed: bool,
}

impl HeadlessProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(inputs: impl IntoIterator<Item = ScheduledInput>) -> Self {
        let mut proxy = Self::new();
        for scheduled in inputs {
            proxy.schedule(scheduled.round, scheduled.input);
        }
        proxy
    }

    pub fn schedule(&mut self, round: u64, input: ScriptedInput) {
        self.script.entry(round).or_default().push(input);
    }

    /// Applies `input` immediately, as if the user had just acted.
    pub fn inject(&mut self, input: ScriptedInput) -> ProxyResult<()> {
        self.apply(input)
    }

    pub fn journal(&self) -> &[ProxyCall] {
        &self.journal
    }

    pub fn property(&self, name: &str, property: &str) -> Option<&Value> {
        let handle = self.names.get(name)?;
        self.widgets.get(handle.0)?.properties.get(property)
    }

    pub fn parent_of(&self, name: &str) -> Option<&str> {
        let record = self.widgets.get(self.names.get(name)?.0)?;
        let parent = record.parent?;
        self.widgets.get(parent.0).map(|parent| parent.name.as_str())
    }

    /// Events recorded but not yet polled for `name`.
    pub fn pending(&self, name: &str) -> EventSet {
        self.names
            .get(name)
            .and_then(|handle| self.widgets.get(handle.0))
            .map(|record| record.pending.clone())
            .unwrap_or_default()
    }

    fn apply(&mut self, input: ScriptedInput) -> ProxyResult<()> {
        let (name, event) = match &input {
            ScriptedInput::Click { widget } => (widget, EventKind::Click),
            ScriptedInput::Type { widget, .. } => (widget, EventKind::Changed),
            ScriptedInput::Close { widget } => (widget, EventKind::Closed),
        };
        let handle = *self
            .names
            .get(name)
            .ok_or_else(|| CollaboratorError::UnknownWidget { name: name.clone() })?;
        let record = self.record_mut(handle)?;
        if record.closed || !record.kind.events().contains(&event) {
            debug!(widget = %record.name, %event, "ignoring input the widget cannot receive");
            return Ok(());
        }

        match input {
            ScriptedInput::Type { text, .. } => {
                record.properties.insert("value".to_string(), Value::String(text));
            }
            ScriptedInput::Close { .. } => {
                record.closed = true;
                record.visible = false;
            }
            ScriptedInput::Click { .. } => {}
        }
        record.pending.insert(event);
        Ok(())
    }

    fn record(&self, handle: WidgetHandle) -> ProxyResult<&WidgetRecord> {
        let record = self
            .widgets
            .get(handle.0)
            .ok_or(CollaboratorError::UnknownHandle { handle: handle.0 })?;
        if self.destroyed {
            return Err(CollaboratorError::Destroyed {
                widget: record.name.clone(),
            });
        }
        Ok(record)
    }

    fn record_mut(&mut self, handle: WidgetHandle) -> ProxyResult<&mut WidgetRecord> {
        let destroyed = self.destroyed;
        let record = self
            .widgets
            .get_mut(handle.0)
            .ok_or(CollaboratorError::UnknownHandle { handle: handle.0 })?;
        if destroyed {
            return Err(CollaboratorError::Destroyed {
                widget: record.name.clone(),
            });
        }
        Ok(record)
    }
}

impl WidgetProxy for HeadlessProxy {
    fn create(
        &mut self,
        kind: WidgetKind,
        name: &str,
        parent: Option<WidgetHandle>,
        attributes: &[(String, Value)],
    ) -> ProxyResult<WidgetHandle> {
        if let Some(parent) = parent {
            self.record(parent)?;
        }
        let handle = WidgetHandle(self.widgets.len());
        self.widgets.push(WidgetRecord {
            kind,
            name: name.to_string(),
            parent,
            properties: attributes.iter().cloned().collect(),
            visible: false,
            closed: false,
            pending: EventSet::new(),
        });
        self.names.insert(name.to_string(), handle);
        self.journal.push(ProxyCall::Create {
            kind,
            name: name.to_string(),
        });
        Ok(handle)
    }

    fn show(&mut self, handle: WidgetHandle) -> ProxyResult<()> {
        let record = self.record_mut(handle)?;
        record.visible = true;
        record.closed = false;
        let name = record.name.clone();
        self.journal.push(ProxyCall::Show { name });
        Ok(())
    }

    fn hide(&mut self, handle: WidgetHandle) -> ProxyResult<()> {
        let record = self.record_mut(handle)?;
        record.visible = false;
        let name = record.name.clone();
        self.journal.push(ProxyCall::Hide { name });
        Ok(())
    }

    fn close(&mut self, handle: WidgetHandle) -> ProxyResult<()> {
        let record = self.record_mut(handle)?;
        record.visible = false;
        record.closed = true;
        let name = record.name.clone();
        self.journal.push(ProxyCall::Close { name });
        Ok(())
    }

    fn set_property(
        &mut self,
        handle: WidgetHandle,
        property: &str,
        value: &Value,
    ) -> ProxyResult<()> {
        let record = self.record_mut(handle)?;
        if property == "visible" {
            record.visible = value.is_truthy();
        }
        record.properties.insert(property.to_string(), value.clone());
        let name = record.name.clone();
        self.journal.push(ProxyCall::SetProperty {
            name,
            property: property.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn get_property(&self, handle: WidgetHandle, property: &str) -> ProxyResult<Value> {
        let record = self.record(handle)?;
        if property == "visible" {
            return Ok(Value::Boolean(record.visible));
        }
        record
            .properties
            .get(property)
            .cloned()
            .ok_or_else(|| CollaboratorError::UnknownProperty {
                widget: record.name.clone(),
                property: property.to_string(),
            })
    }

    fn poll_events(&mut self, handle: WidgetHandle) -> ProxyResult<EventSet> {
        let record = self.record_mut(handle)?;
        Ok(std::mem::take(&mut record.pending))
    }

    fn destroy_all(&mut self) -> ProxyResult<()> {
        for record in &mut self.widgets {
            record.visible = false;
            record.closed = true;
            record.pending.clear();
        }
        self.destroyed = true;
        self.journal.push(ProxyCall::DestroyAll);
        Ok(())
    }

    fn pump(&mut self) -> ProxyResult<()> {
        self.round += 1;
        let Some(inputs) = self.script.remove(&self.round) else {
            return Ok(());
        };
        for input in inputs {
            self.apply(input)?;
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        if self.destroyed {
            return false;
        }
        let mut windows = self
            .widgets
            .iter()
            .filter(|record| record.kind == WidgetKind::Window)
            .peekable();
        windows.peek().is_none() || windows.any(|record| !record.closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn window_with_button(proxy: &mut HeadlessProxy) -> (WidgetHandle, WidgetHandle) {
        let window = proxy
            .create(WidgetKind::Window, "wnd", None, &[])
            .expect("create window");
        let button = proxy
            .create(
                WidgetKind::Button,
                "btn",
                Some(window),
                &[("text".to_string(), Value::from("+"))],
            )
            .expect("create button");
        (window, button)
    }

    #[test]
    fn delivers_scripted_input_on_its_round() {
        let mut proxy = HeadlessProxy::new();
        let (_, button) = window_with_button(&mut proxy);
        proxy.schedule(2, ScriptedInput::Click { widget: "btn".to_string() });

        proxy.pump().expect("pump");
        assert!(proxy.poll_events(button).expect("poll").is_empty());

        proxy.pump().expect("pump");
        let events = proxy.poll_events(button).expect("poll");
        assert!(events.contains(&EventKind::Click));
        assert!(proxy.poll_events(button).expect("poll").is_empty());
    }

    #[test]
    fn typing_updates_entry_value() {
        let mut proxy = HeadlessProxy::new();
        let entry = proxy
            .create(WidgetKind::Entry, "ent", None, &[])
            .expect("create entry");
        proxy
            .inject(ScriptedInput::Type {
                widget: "ent".to_string(),
                text: "42".to_string(),
            })
            .expect("inject");
        assert_eq!(
            proxy.get_property(entry, "value").expect("value"),
            Value::from("42")
        );
        assert!(proxy.poll_events(entry).expect("poll").contains(&EventKind::Changed));
    }

    #[test]
    fn closing_the_last_window_ends_the_session() {
        let mut proxy = HeadlessProxy::new();
        let (window, _) = window_with_button(&mut proxy);
        assert!(proxy.is_alive());
        proxy
            .inject(ScriptedInput::Close { widget: "wnd".to_string() })
            .expect("inject");
        assert!(!proxy.is_alive());
        assert!(proxy.poll_events(window).expect("poll").contains(&EventKind::Closed));
    }

    #[test]
    fn ignores_events_a_widget_cannot_raise() {
        let mut proxy = HeadlessProxy::new();
        let (window, _) = window_with_button(&mut proxy);
        proxy
            .inject(ScriptedInput::Click { widget: "wnd".to_string() })
            .expect("inject");
        assert!(proxy.poll_events(window).expect("poll").is_empty());
        assert!(proxy.inject(ScriptedInput::Click { widget: "nope".to_string() }).is_err());
    }

    #[test]
    fn journals_calls_and_rejects_use_after_destroy() {
        let mut proxy = HeadlessProxy::new();
        let (window, button) = window_with_button(&mut proxy);
        proxy.show(window).expect("show");
        proxy
            .set_property(button, "text", &Value::Integer(3))
            .expect("set");
        proxy.destroy_all().expect("destroy");

        assert_eq!(proxy.parent_of("btn"), Some("wnd"));
        assert_eq!(
            proxy.journal().last(),
            Some(&ProxyCall::DestroyAll)
        );
        assert_eq!(proxy.property("btn", "text"), Some(&Value::Integer(3)));
        assert!(matches!(
            proxy.show(window),
            Err(CollaboratorError::Destroyed { .. })
        ));
        assert!(!proxy.is_alive());
    }

    #[test]
    fn reads_event_scripts_from_yaml() {
        let yaml = indoc! {r#"
            - round: 1
              event: click
              widget: btn_plus
            - round: 3
              event: type
              widget: ent
              text: "hello"
        "#};
        let inputs: Vec<ScheduledInput> = serde_yaml::from_str(yaml).expect("valid script");
        assert_eq!(
            inputs[1],
            ScheduledInput {
                round: 3,
                input: ScriptedInput::Type {
                    widget: "ent".to_string(),
                    text: "hello".to_string()
                }
            }
        );
    }
}
