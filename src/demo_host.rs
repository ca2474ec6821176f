//! In-memory stand-in for a real single-threaded host.
//!
//! Holds a parameter table with an undo history. Like a real host it is not
//! `Send`: it is created on the pump thread and never leaves it.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use serde_json::{Value, json};

use hostbridge_runloop::{
    BridgeBuilder, BridgeConfig, CommandRegistry, CommandSpec, ParamSpec, TaskContext,
};

/// Demo host state.
pub(crate) struct DemoHost {
    parameters: BTreeMap<String, Value>,
    /// Previous value of each changed parameter, newest last.
    history: Vec<(String, Option<Value>)>,
    _thread_bound: PhantomData<Rc<()>>,
}

impl DemoHost {
    pub(crate) fn new() -> Self {
        let parameters = BTreeMap::from([
            ("width".to_string(), json!(100.0)),
            ("height".to_string(), json!(50.0)),
            ("material".to_string(), json!("steel")),
        ]);
        Self {
            parameters,
            history: Vec::new(),
            _thread_bound: PhantomData,
        }
    }

    fn set(&mut self, name: &str, value: Value) -> Option<Value> {
        let previous = self.parameters.insert(name.to_string(), value);
        self.history.push((name.to_string(), previous.clone()));
        previous
    }

    fn undo(&mut self) -> anyhow::Result<String> {
        let (name, previous) = self.history.pop().ok_or_else(|| anyhow!("Nothing to undo"))?;
        match previous {
            Some(value) => {
                self.parameters.insert(name.clone(), value);
            }
            None => {
                self.parameters.remove(&name);
            }
        }
        Ok(name)
    }

    fn snapshot(&self) -> Value {
        json!(self.parameters)
    }
}

fn number(args: &[Value], index: usize, name: &str) -> anyhow::Result<f64> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("'{}' must be a number", name))
}

fn text<'a>(args: &'a [Value], index: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("'{}' must be a string", name))
}

/// Register the demo commands.
pub(crate) fn registry() -> CommandRegistry<DemoHost> {
    let mut registry = CommandRegistry::new();
    registry
        .register(
            CommandSpec::new("add")
                .with_description("Add two numbers")
                .with_param(ParamSpec::required("a"))
                .with_param(ParamSpec::required("b")),
            |_host: &mut DemoHost, args: &[Value]| {
                let (a, b) = (&args[0], &args[1]);
                if let Some(sum) = a.as_i64().zip(b.as_i64()).and_then(|(a, b)| a.checked_add(b)) {
                    return Ok(json!(sum));
                }
                Ok(json!(number(args, 0, "a")? + number(args, 1, "b")?))
            },
        )
        .register(
            CommandSpec::new("echo")
                .with_description("Return the arguments unchanged")
                .variadic(),
            |_host: &mut DemoHost, args: &[Value]| Ok(Value::Array(args.to_vec())),
        )
        .register(
            CommandSpec::new("boom")
                .with_description("Always fail")
                .with_param(ParamSpec::optional("message", json!("boom"))),
            |_host: &mut DemoHost, args: &[Value]| bail!("{}", text(args, 0, "message")?),
        )
        .register_with_context(
            CommandSpec::new("slow")
                .with_description("Step through work, reporting progress")
                .with_param(ParamSpec::optional("steps", json!(5)))
                .with_param(ParamSpec::optional("delay_ms", json!(200))),
            |_host: &mut DemoHost, args: &[Value], ctx: &TaskContext| {
                let steps = number(args, 0, "steps")?.max(1.0) as u64;
                let delay = Duration::from_millis(number(args, 1, "delay_ms")?.max(0.0) as u64);
                for step in 1..=steps {
                    ctx.check_cancelled()?;
                    std::thread::sleep(delay);
                    let percent = step as f64 * 100.0 / steps as f64;
                    ctx.progress(percent, &format!("step {}/{}", step, steps));
                }
                Ok(json!({ "steps": steps }))
            },
        )
        .register(
            CommandSpec::new("set_parameter")
                .with_description("Set a host parameter")
                .with_param(ParamSpec::required("name"))
                .with_param(ParamSpec::required("value")),
            |host: &mut DemoHost, args: &[Value]| {
                let name = text(args, 0, "name")?;
                let previous = host.set(name, args[1].clone());
                Ok(json!({ "name": name, "previous": previous }))
            },
        )
        .register(
            CommandSpec::new("get_parameter")
                .with_description("Read a host parameter")
                .with_param(ParamSpec::required("name")),
            |host: &mut DemoHost, args: &[Value]| {
                let name = text(args, 0, "name")?;
                host.parameters
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("Unknown parameter: {}", name))
            },
        )
        .register(
            CommandSpec::new("undo").with_description("Revert the last parameter change"),
            |host: &mut DemoHost, _args: &[Value]| {
                let name = host.undo()?;
                Ok(json!({ "reverted": name }))
            },
        );
    registry
}

/// Bridge builder wired with the demo commands and snapshot.
pub(crate) fn builder(config: BridgeConfig) -> BridgeBuilder<DemoHost> {
    BridgeBuilder::new(config)
        .with_registry(registry())
        .with_snapshot_provider(|host: &DemoHost| -> anyhow::Result<Value> {
            Ok(host.snapshot())
        })
}
