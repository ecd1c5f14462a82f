//! Host functions reachable through `Op::Call`.
//!
//! `Host::with_defaults` registers the functions tests and the CLI use:
//!
//! | name              | result                                                   |
//! |-------------------|----------------------------------------------------------|
//! | `ready(v)`        | an awaitable already completed with `v`                  |
//! | `delay(v)`        | a pending awaitable, completed with `v` by `complete_pending` |
//! | `fail(kind, msg)` | an awaitable already failed with that exception          |
//! | `error(kind, msg)`| an exception value, for `throw`                          |
//! | `log(args...)`    | unit; records the arguments                              |

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::completion::Completion;
use crate::error::{Result, RuntimeError};
use crate::value::{Exception, Value};

/// A host function. A returned `Err` is thrown into the calling program.
pub type HostFn = Arc<dyn Fn(&Host, &[Value]) -> std::result::Result<Value, Exception> + Send + Sync>;

#[derive(Default)]
pub struct Host {
    functions: FxHashMap<String, HostFn>,
    pending: Mutex<Vec<(Completion, Value)>>,
    log: Mutex<Vec<Value>>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Host")
            .field("functions", &names)
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut host = Self::new();
        host.register("ready", |_, args| {
            Ok(Value::Awaitable(Completion::completed(first(args))))
        });
        host.register("delay", |host, args| {
            let completion = Completion::new();
            host.pending.lock().push((completion.clone(), first(args)));
            Ok(Value::Awaitable(completion))
        });
        host.register("fail", |_, args| {
            Ok(Value::Awaitable(Completion::failed(exception_from(args))))
        });
        host.register("error", |_, args| Ok(Value::Exception(exception_from(args))));
        host.register("log", |host, args| {
            host.log.lock().extend(args.iter().cloned());
            Ok(Value::Unit)
        });
        host
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&Host, &[Value]) -> std::result::Result<Value, Exception>
        + Send
        + Sync
        + 'static,
    ) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Invoke `name`. `Ok(Err(_))` is an exception for the program to
    /// handle; `Err(_)` is a fault of the host itself.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<std::result::Result<Value, Exception>> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: name.to_string(),
            })?;
        Ok(function(self, args))
    }

    /// Number of `delay` awaitables not yet completed.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Complete every outstanding `delay` awaitable with its value, oldest
    /// first. Continuations run on the calling thread, outside the lock.
    pub fn complete_pending(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        let count = pending.len();
        for (completion, value) in pending {
            // A test may have completed it by hand already.
            let _ = completion.complete(value);
        }
        if count > 0 {
            debug!(count, "completed pending awaitables");
        }
        count
    }

    /// Everything passed to `log` so far.
    pub fn log(&self) -> Vec<Value> {
        self.log.lock().clone()
    }
}

fn first(args: &[Value]) -> Value {
    args.first().cloned().unwrap_or_default()
}

fn exception_from(args: &[Value]) -> Exception {
    let kind = args.first().map_or_else(|| "Error".to_string(), ToString::to_string);
    let message = args.get(1).map(ToString::to_string).unwrap_or_default();
    Exception::new(kind, message)
}
