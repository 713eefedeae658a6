use std::collections::BTreeSet;

use crate::ast::{EventKind, WidgetKind};
use crate::error::CollaboratorError;
use crate::value::Value;

pub mod headless;

pub use headless::{HeadlessProxy, ProxyCall, ScheduledInput, ScriptedInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetHandle(pub usize);

/// Events reported for one widget since the previous poll.
pub type EventSet = BTreeSet<EventKind>;

pub type ProxyResult<T> = Result<T, CollaboratorError>;

/// Boundary to the toolkit that renders widgets and reports interaction.
pub trait WidgetProxy {
    fn create(
        &mut self,
        kind: WidgetKind,
        name: &str,
        parent: Option<WidgetHandle>,
        attributes: &[(String, Value)],
    ) -> ProxyResult<WidgetHandle>;

    fn show(&mut self, handle: WidgetHandle) -> ProxyResult<()>;

    fn hide(&mut self, handle: WidgetHandle) -> ProxyResult<()>;

    fn close(&mut self, handle: WidgetHandle) -> ProxyResult<()>;

    fn set_property(&mut self, handle: WidgetHandle, property: &str, value: &Value)
    -> ProxyResult<()>;

    fn get_property(&self, handle: WidgetHandle, property: &str) -> ProxyResult<Value>;

    /// Drains the events recorded for `handle`.
    fn poll_events(&mut self, handle: WidgetHandle) -> ProxyResult<EventSet>;

    fn destroy_all(&mut self) -> ProxyResult<()>;

    /// Lets the toolkit process pending input before a scheduler wake-up.
    fn pump(&mut self) -> ProxyResult<()> {
        Ok(())
    }

    /// False once the user has closed every window.
    fn is_alive(&self) -> bool {
        true
    }
}
