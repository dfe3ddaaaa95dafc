//! [`SubscriptionManager`] – change detection and glob-pattern fan-out.
//!
//! Each [`notify`](SubscriptionManager::notify) call flattens the snapshot
//! into `path → leaf` pairs, compares them with the previous call, and wakes
//! every handler whose pattern matches at least one changed path.
//!
//! # Patterns
//!
//! Shell-style wildcards, not regular expressions:
//!
//! | Pattern | Matches |
//! |---|---|
//! | `truck.speed` | exactly that path |
//! | `truck.*` | every path under `truck`, at any depth |
//! | `truck.wheel_velocity.?` | wheels 0–9 |
//!
//! # Float comparison
//!
//! Leaves are compared with [`Value::bit_eq`]: a float that differs in its
//! last bit counts as changed.  Handlers subscribed to noisy fields are woken
//! on nearly every call.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use codriver_types::{CoDriverError, TelemetrySnapshot, Value};
use regex::Regex;
use tracing::{debug, error};

/// Receiver of snapshot-change notifications.
pub trait TelemetryHandler: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &str;

    /// Called at most once per [`SubscriptionManager::notify`] call when any
    /// of the handler's patterns matched a changed path.
    fn on_change(&self, snapshot: &TelemetrySnapshot) -> Result<(), CoDriverError>;
}

/// Shared handler reference.  Identity is the allocation, not the value.
pub type HandlerRef = Arc<dyn TelemetryHandler>;

/// A compiled shell-style wildcard pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile `pattern`.  `*` matches any run of characters (dots
    /// included), `?` exactly one; everything else is literal.  The empty
    /// pattern is rejected.
    pub fn new(pattern: &str) -> Result<Self, CoDriverError> {
        if pattern.is_empty() {
            return Err(CoDriverError::InvalidPattern("empty pattern".to_string()));
        }
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr)
            .map_err(|e| CoDriverError::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

struct Subscription {
    pattern: GlobPattern,
    handlers: Vec<HandlerRef>,
}

fn same_handler(a: &HandlerRef, b: &HandlerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Pattern table plus the baseline of last-seen leaf values.
///
/// Owned by the polling loop; every mutating call takes `&mut self`.
#[derive(Default)]
pub struct SubscriptionManager {
    subscriptions: Vec<Subscription>,
    baseline: HashMap<String, Value>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to every pattern in `patterns`.
    ///
    /// # Errors
    ///
    /// [`CoDriverError::InvalidPattern`] when a pattern cannot be compiled.
    /// Nothing is registered in that case.
    pub fn subscribe<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        handler: HandlerRef,
    ) -> Result<(), CoDriverError> {
        let compiled = patterns
            .iter()
            .map(|pattern| GlobPattern::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        for pattern in compiled {
            debug!(pattern = pattern.as_str(), handler = handler.name(), "telemetry subscription added");
            match self
                .subscriptions
                .iter_mut()
                .find(|sub| sub.pattern.as_str() == pattern.as_str())
            {
                Some(sub) => sub.handlers.push(Arc::clone(&handler)),
                None => self.subscriptions.push(Subscription {
                    pattern,
                    handlers: vec![Arc::clone(&handler)],
                }),
            }
        }
        Ok(())
    }

    /// Remove `handler` from every pattern in `patterns`.  Unknown pairs are
    /// ignored; a pattern left without handlers is dropped.
    pub fn unsubscribe<S: AsRef<str>>(&mut self, patterns: &[S], handler: &HandlerRef) {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if let Some(sub) = self
                .subscriptions
                .iter_mut()
                .find(|sub| sub.pattern.as_str() == pattern)
            {
                sub.handlers.retain(|h| !same_handler(h, handler));
            }
        }
        self.subscriptions.retain(|sub| !sub.handlers.is_empty());
    }

    /// Patterns that currently have at least one handler.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(|sub| sub.pattern.as_str())
    }

    /// Diff `snapshot` against the baseline, update the baseline and wake
    /// matching handlers.  Returns the changed paths in snapshot order.
    ///
    /// Handler errors and panics are logged and never propagate.
    pub fn notify(&mut self, snapshot: &TelemetrySnapshot) -> Vec<String> {
        let changed = self.diff(snapshot);

        let mut woken: Vec<HandlerRef> = Vec::new();
        for path in &changed {
            for sub in self.subscriptions.iter().filter(|sub| sub.pattern.matches(path)) {
                for handler in &sub.handlers {
                    if !woken.iter().any(|h| same_handler(h, handler)) {
                        woken.push(Arc::clone(handler));
                    }
                }
            }
        }

        for handler in woken {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler.on_change(snapshot)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            let err = CoDriverError::HandlerFailure {
                handler: handler.name().to_string(),
                details: failure,
            };
            error!(error = %err, "telemetry handler failed");
        }

        changed
    }

    fn diff(&mut self, snapshot: &TelemetrySnapshot) -> Vec<String> {
        let mut changed = Vec::new();
        for (path, value) in snapshot.flatten() {
            let same = self
                .baseline
                .get(&path)
                .is_some_and(|previous| previous.bit_eq(&value));
            if !same {
                self.baseline.insert(path.clone(), value);
                changed.push(path);
            }
        }
        changed
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "handler panicked".to_string()
    }
}
