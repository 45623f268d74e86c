// src/pac/engine.rs
use super::helpers::{self, HelperEnv, PacArg};
use rquickjs::convert::Coerced;
use rquickjs::function::{IntoJsFunc, Rest};
use rquickjs::{CatchResultExt, Context, Ctx, Function, Runtime, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Why a running call was asked to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptReason {
    Timeout,
    Other(String),
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterruptReason::Timeout => f.write_str("script timeout"),
            InterruptReason::Other(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("failed to bind {name}: {reason}")]
    Bind { name: String, reason: String },
    /// The script failed to compile or raised while running.
    #[error("{0}")]
    Exception(String),
    #[error("{0} is not a function")]
    MissingFunction(String),
    #[error("interrupted: {0}")]
    Interrupted(InterruptReason),
}

/// An owned copy of a script value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Function,
    Object,
}

impl ScriptValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Function => "function",
            ScriptValue::Object => "object",
        }
    }
}

#[derive(Debug, Default)]
struct InterruptState {
    epoch: u64,
    reason: Option<InterruptReason>,
}

/// Handle used to stop whatever call is running in a script host.
///
/// Each call arms the handle and receives a token; an interrupt only lands
/// if it carries the token of the call that is still running, so a request
/// that arrives after its call finished is ignored by the next one.
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    requested: Arc<AtomicBool>,
    state: Arc<Mutex<InterruptState>>,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new call: clears any pending request and returns its token.
    pub fn arm(&self) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.epoch = state.epoch.wrapping_add(1);
        state.reason = None;
        self.requested.store(false, Ordering::SeqCst);
        state.epoch
    }

    /// Asks the call identified by `token` to stop at its next checkpoint.
    pub fn interrupt(&self, token: u64, reason: InterruptReason) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.epoch != token {
            return false;
        }
        state.reason = Some(reason);
        self.requested.store(true, Ordering::SeqCst);
        true
    }

    /// Polled by the interpreter at its checkpoints.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }

    /// Consumes the pending request, if any.
    pub fn take_reason(&self) -> Option<InterruptReason> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.requested.store(false, Ordering::SeqCst);
        state.reason.take()
    }
}

/// One loaded script instance. Implementations are not reentrant: callers
/// must serialize access, which [`super::evaluator::Evaluator`] does.
pub trait ScriptHost: Send {
    /// Runs the script's top-level code.
    fn run_top_level(&mut self, source: &str) -> Result<(), HostError>;

    /// Calls the global function `name`.
    fn call(&mut self, name: &str, args: &[String]) -> Result<ScriptValue, HostError>;

    /// Reads the global `name`.
    fn get(&mut self, name: &str) -> Result<ScriptValue, HostError>;

    /// Handle for stopping a running call from another thread.
    fn interrupter(&self) -> Interrupter;
}

const MEMORY_LIMIT: usize = 64 << 20;
const MAX_STACK_SIZE: usize = 1 << 20;

/// QuickJS-backed script host with the PAC helper functions installed as
/// globals.
pub struct QuickJsHost {
    // The context must drop before its runtime.
    context: Context,
    _runtime: Runtime,
    interrupter: Interrupter,
}

impl QuickJsHost {
    pub fn new(env: HelperEnv) -> Result<Self, HostError> {
        let runtime = Runtime::new().map_err(|e| HostError::Bind {
            name: "runtime".to_string(),
            reason: e.to_string(),
        })?;
        runtime.set_memory_limit(MEMORY_LIMIT);
        runtime.set_max_stack_size(MAX_STACK_SIZE);

        let interrupter = Interrupter::new();
        let poll = interrupter.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || poll.is_requested())));

        let context = Context::full(&runtime).map_err(|e| HostError::Bind {
            name: "context".to_string(),
            reason: e.to_string(),
        })?;
        let env = Arc::new(env);
        context.with(|ctx| register_pac_functions(&ctx, env))?;

        Ok(Self {
            context,
            _runtime: runtime,
            interrupter,
        })
    }

    /// Turns a script failure into an error, preferring a pending interrupt
    /// as the cause.
    fn failure(&self, message: String) -> HostError {
        match self.interrupter.take_reason() {
            Some(reason) => HostError::Interrupted(reason),
            None => HostError::Exception(message),
        }
    }
}

impl ScriptHost for QuickJsHost {
    fn run_top_level(&mut self, source: &str) -> Result<(), HostError> {
        let outcome = self.context.with(|ctx| {
            ctx.eval::<Value, _>(source)
                .catch(&ctx)
                .map(|_| ())
                .map_err(|e| e.to_string())
        });
        outcome.map_err(|message| self.failure(message))
    }

    fn call(&mut self, name: &str, args: &[String]) -> Result<ScriptValue, HostError> {
        let outcome = self.context.with(|ctx| {
            let value: Value = ctx
                .globals()
                .get(name)
                .catch(&ctx)
                .map_err(|e| Some(e.to_string()))?;
            let Some(function) = value.as_function() else {
                return Err(None);
            };
            function
                .call::<_, Value>((Rest(args.to_vec()),))
                .catch(&ctx)
                .map(|value| to_script_value(&value))
                .map_err(|e| Some(e.to_string()))
        });
        match outcome {
            Ok(value) => Ok(value),
            Err(Some(message)) => Err(self.failure(message)),
            Err(None) => Err(HostError::MissingFunction(name.to_string())),
        }
    }

    fn get(&mut self, name: &str) -> Result<ScriptValue, HostError> {
        let outcome = self.context.with(|ctx| {
            ctx.globals()
                .get::<_, Value>(name)
                .catch(&ctx)
                .map(|value| to_script_value(&value))
                .map_err(|e| e.to_string())
        });
        outcome.map_err(|message| self.failure(message))
    }

    fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }
}

fn to_script_value(value: &Value<'_>) -> ScriptValue {
    if let Some(s) = value.as_string() {
        ScriptValue::String(s.to_string().unwrap_or_default())
    } else if let Some(b) = value.as_bool() {
        ScriptValue::Bool(b)
    } else if let Some(n) = value.as_int() {
        ScriptValue::Number(n as f64)
    } else if let Some(n) = value.as_float() {
        ScriptValue::Number(n)
    } else if value.is_null() {
        ScriptValue::Null
    } else if value.is_function() {
        ScriptValue::Function
    } else if value.is_undefined() {
        ScriptValue::Undefined
    } else {
        ScriptValue::Object
    }
}

/// Converts a script value the way the script's `String()` would. A
/// `toString` that throws is passed back as the error.
fn to_pac_arg(value: &Value<'_>) -> rquickjs::Result<PacArg> {
    if let Some(s) = value.as_string() {
        Ok(PacArg::Str(s.to_string()?))
    } else if let Some(n) = value.as_int() {
        Ok(PacArg::Num(n as f64))
    } else if let Some(n) = value.as_float() {
        Ok(PacArg::Num(n))
    } else {
        let Coerced(text) = value.get::<Coerced<String>>()?;
        Ok(PacArg::Other(text))
    }
}

fn pac_args(args: &Rest<Value<'_>>) -> rquickjs::Result<Vec<PacArg>> {
    args.0.iter().map(to_pac_arg).collect()
}

/// Text of argument `index`; a missing argument reads as `"undefined"`.
fn text_arg(args: &Rest<Value<'_>>, index: usize) -> rquickjs::Result<String> {
    match args.0.get(index) {
        Some(value) => Ok(to_pac_arg(value)?.text()),
        None => Ok("undefined".to_string()),
    }
}

fn set_global<'js, F, P>(ctx: &Ctx<'js>, name: &str, f: F) -> Result<(), HostError>
where
    F: IntoJsFunc<'js, P> + 'js,
{
    let bind_err = |e: rquickjs::Error| HostError::Bind {
        name: name.to_string(),
        reason: e.to_string(),
    };
    let function = Function::new(ctx.clone(), f).map_err(bind_err)?;
    ctx.globals().set(name, function).map_err(bind_err)
}

fn register_pac_functions<'js>(ctx: &Ctx<'js>, env: Arc<HelperEnv>) -> Result<(), HostError> {
    // isPlainHostName(host)
    set_global(ctx, "isPlainHostName", |args: Rest<Value<'js>>| -> rquickjs::Result<bool> {
        Ok(helpers::is_plain_host_name(&text_arg(&args, 0)?))
    })?;

    // dnsDomainIs(host, domain)
    set_global(ctx, "dnsDomainIs", |args: Rest<Value<'js>>| -> rquickjs::Result<bool> {
        Ok(helpers::dns_domain_is(&text_arg(&args, 0)?, &text_arg(&args, 1)?))
    })?;

    // localHostOrDomainIs(host, hostdom)
    set_global(ctx, "localHostOrDomainIs", |args: Rest<Value<'js>>| -> rquickjs::Result<bool> {
        Ok(helpers::local_host_or_domain_is(&text_arg(&args, 0)?, &text_arg(&args, 1)?))
    })?;

    // isResolvable(host)
    let e = env.clone();
    set_global(ctx, "isResolvable", move |args: Rest<Value<'js>>| -> rquickjs::Result<bool> {
        Ok(e.is_resolvable(&text_arg(&args, 0)?))
    })?;

    // dnsResolve(host)
    let e = env.clone();
    set_global(ctx, "dnsResolve", move |args: Rest<Value<'js>>| -> rquickjs::Result<String> {
        Ok(e.dns_resolve(&text_arg(&args, 0)?))
    })?;

    // isInNet(host, pattern, mask)
    let e = env.clone();
    set_global(ctx, "isInNet", move |args: Rest<Value<'js>>| -> rquickjs::Result<bool> {
        Ok(e.is_in_net(&text_arg(&args, 0)?, &text_arg(&args, 1)?, &text_arg(&args, 2)?))
    })?;

    // myIpAddress()
    set_global(ctx, "myIpAddress", |_args: Rest<Value<'js>>| {
        helpers::my_ip_address()
    })?;

    // dnsDomainLevels(host)
    set_global(ctx, "dnsDomainLevels", |args: Rest<Value<'js>>| -> rquickjs::Result<i32> {
        Ok(helpers::dns_domain_levels(&text_arg(&args, 0)?) as i32)
    })?;

    // shExpMatch(str, pattern)
    set_global(ctx, "shExpMatch", |args: Rest<Value<'js>>| -> rquickjs::Result<bool> {
        Ok(helpers::sh_exp_match(&text_arg(&args, 0)?, &text_arg(&args, 1)?))
    })?;

    // weekdayRange(wd1, [wd2], ["GMT"])
    let e = env.clone();
    set_global(ctx, "weekdayRange", move |args: Rest<Value<'js>>| -> rquickjs::Result<bool> {
        Ok(e.weekday_range(&pac_args(&args)?))
    })?;

    // dateRange(...up to six values, ["GMT"])
    let e = env.clone();
    set_global(ctx, "dateRange", move |args: Rest<Value<'js>>| -> rquickjs::Result<bool> {
        Ok(e.date_range(&pac_args(&args)?))
    })?;

    // timeRange(...up to six values, ["GMT"])
    set_global(ctx, "timeRange", move |args: Rest<Value<'js>>| -> rquickjs::Result<bool> {
        Ok(env.time_range(&pac_args(&args)?))
    })?;

    Ok(())
}
