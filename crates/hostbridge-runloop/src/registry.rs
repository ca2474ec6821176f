//! Command registry: names mapped to host handlers.
//!
//! Handlers are plain functions of the host. They run on the pump thread
//! only and receive the host by `&mut`, so nothing about the host needs to
//! be `Send` or `Sync`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::command::{Command, CommandArgs, CommandRequest};
use crate::context::TaskContext;
use crate::error::{BridgeError, BridgeResult};

/// Handler that only needs the host and its arguments.
pub type PlainHandler<H> = dyn Fn(&mut H, &[Value]) -> anyhow::Result<Value> + Send + Sync;

/// Handler that also receives the task context.
pub type ContextHandler<H> =
    dyn Fn(&mut H, &[Value], &TaskContext) -> anyhow::Result<Value> + Send + Sync;

/// A registered handler.
pub enum Handler<H> {
    Plain(Box<PlainHandler<H>>),
    WithContext(Box<ContextHandler<H>>),
}

impl<H> Handler<H> {
    pub fn needs_extra_context(&self) -> bool {
        matches!(self, Self::WithContext(_))
    }
}

/// One declared handler parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,

    /// Value used when the caller omits the argument. `None` = required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Public description of a registered command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub params: Vec<ParamSpec>,

    /// Accepts any arguments as given, without shaping.
    #[serde(default)]
    pub variadic: bool,

    #[serde(default)]
    pub needs_extra_context: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            params: Vec::new(),
            variadic: false,
            needs_extra_context: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> BridgeError {
        BridgeError::InvalidArguments {
            command: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Turn caller arguments into the positional list the handler gets.
    pub fn shape(&self, args: CommandArgs) -> BridgeResult<Vec<Value>> {
        if self.variadic {
            return Ok(match args {
                CommandArgs::Positional(values) => values,
                CommandArgs::Named(map) if map.is_empty() => Vec::new(),
                CommandArgs::Named(map) => vec![Value::Object(map)],
            });
        }

        match args {
            CommandArgs::Positional(values) => {
                if values.len() > self.params.len() {
                    return Err(self.invalid(format!(
                        "expected at most {} arguments, got {}",
                        self.params.len(),
                        values.len()
                    )));
                }
                let mut shaped = values;
                for param in &self.params[shaped.len()..] {
                    match &param.default {
                        Some(default) => shaped.push(default.clone()),
                        None => {
                            return Err(self.invalid(format!("missing argument '{}'", param.name)));
                        }
                    }
                }
                Ok(shaped)
            }
            CommandArgs::Named(mut map) => {
                let mut shaped = Vec::with_capacity(self.params.len());
                for param in &self.params {
                    match map.remove(&param.name).or_else(|| param.default.clone()) {
                        Some(value) => shaped.push(value),
                        None => {
                            return Err(self.invalid(format!("missing argument '{}'", param.name)));
                        }
                    }
                }
                if let Some(unexpected) = map.keys().next() {
                    return Err(self.invalid(format!("unexpected argument '{}'", unexpected)));
                }
                Ok(shaped)
            }
        }
    }
}

/// Host-independent view of a registry, used on the submission side.
pub trait CommandCatalog: Send + Sync {
    fn spec(&self, name: &str) -> Option<&CommandSpec>;

    /// All specs, sorted by name.
    fn specs(&self) -> Vec<CommandSpec>;

    fn contains(&self, name: &str) -> bool {
        self.spec(name).is_some()
    }

    /// Validate a request and shape its arguments.
    fn prepare(&self, request: CommandRequest) -> BridgeResult<Command> {
        let spec = self
            .spec(&request.name)
            .ok_or_else(|| BridgeError::UnknownCommand(request.name.clone()))?;
        let arguments = spec.shape(request.arguments)?;
        Ok(Command::new(request.name, arguments))
    }
}

/// Why a dispatch produced no value.
#[derive(Debug)]
pub enum DispatchError {
    UnknownCommand(String),
    Handler(anyhow::Error),
}

struct Entry<H> {
    spec: CommandSpec,
    handler: Handler<H>,
}

/// Registry of command handlers for host type `H`.
pub struct CommandRegistry<H> {
    entries: HashMap<String, Entry<H>>,
}

impl<H> CommandRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a handler. A second registration under the same name
    /// replaces the first.
    pub fn register<F>(&mut self, spec: CommandSpec, handler: F) -> &mut Self
    where
        F: Fn(&mut H, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.insert(spec, Handler::Plain(Box::new(handler)))
    }

    /// Register a handler that receives the [`TaskContext`].
    pub fn register_with_context<F>(&mut self, spec: CommandSpec, handler: F) -> &mut Self
    where
        F: Fn(&mut H, &[Value], &TaskContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.insert(spec, Handler::WithContext(Box::new(handler)))
    }

    fn insert(&mut self, mut spec: CommandSpec, handler: Handler<H>) -> &mut Self {
        spec.needs_extra_context = handler.needs_extra_context();
        let name = spec.name.clone();
        if self.entries.insert(name.clone(), Entry { spec, handler }).is_some() {
            warn!("Command {} registered twice, keeping the latest handler", name);
        } else {
            debug!("Registered command: {}", name);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invoke the handler for `name`. Must be called on the pump thread.
    pub fn dispatch(
        &self,
        host: &mut H,
        name: &str,
        args: &[Value],
        ctx: &TaskContext,
    ) -> Result<Value, DispatchError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| DispatchError::UnknownCommand(name.to_string()))?;
        let result = match &entry.handler {
            Handler::Plain(handler) => handler(host, args),
            Handler::WithContext(handler) => handler(host, args, ctx),
        };
        result.map_err(DispatchError::Handler)
    }
}

impl<H> Default for CommandRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: 'static> CommandCatalog for CommandRegistry<H> {
    fn spec(&self, name: &str) -> Option<&CommandSpec> {
        self.entries.get(name).map(|entry| &entry.spec)
    }

    fn specs(&self) -> Vec<CommandSpec> {
        let mut specs: Vec<CommandSpec> =
            self.entries.values().map(|entry| entry.spec.clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
