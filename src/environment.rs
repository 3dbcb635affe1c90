use crate::error::RuntimeFault;
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// A live name: its value, every value it has held, and the metadata that
/// decides whether it is still visible.
#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub history: Vec<Value>,
    pub deleted: bool,
    pub expires_at: Option<SystemTime>,
    pub priority: i32,
}

impl Binding {
    pub fn new(value: Value) -> Self {
        Self {
            history: vec![value.clone()],
            value,
            deleted: false,
            expires_at: None,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_expiry(mut self, expires_at: Option<SystemTime>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn set(&mut self, value: Value) {
        self.history.push(value.clone());
        self.value = value;
    }

    /// The value before the latest one, or the current value if there is none.
    pub fn previous(&self) -> Value {
        if self.history.len() >= 2 {
            self.history[self.history.len() - 2].clone()
        } else {
            self.value.clone()
        }
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expiry| now > expiry)
    }
}

pub type Scope = HashMap<String, Binding>;

/// Global constants live twice in the global scope: under their own name and
/// under a key no identifier can spell.
fn shadow_key(name: &str) -> String {
    format!("const const const {}", name)
}

/// Stack of scopes, innermost last. The bottom scope is the global one and is
/// never popped.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
    immutable: HashSet<String>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
            immutable: HashSet::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
        debug!(depth = self.scopes.len(), "pushed scope");
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            let scope = self.scopes.pop();
            debug!(depth = self.scopes.len(), "popped scope");
            scope
        } else {
            None
        }
    }

    /// Binds `name` in the innermost scope, replacing whatever was there.
    pub fn define(&mut self, name: &str, binding: Binding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), binding);
        }
    }

    pub fn define_global(&mut self, name: &str, binding: Binding) {
        self.scopes[0].insert(name.to_string(), binding);
    }

    pub fn define_global_constant(&mut self, name: &str, value: Value) {
        self.scopes[0].insert(shadow_key(name), Binding::new(value.clone()));
        self.scopes[0].insert(name.to_string(), Binding::new(value));
        self.immutable.insert(name.to_string());
    }

    pub fn is_immutable(&self, name: &str) -> bool {
        self.immutable.contains(name)
    }

    /// Index of the innermost scope holding a live binding for `name`.
    /// Expired bindings met on the way are evicted.
    fn locate(&mut self, name: &str, now: SystemTime) -> Option<usize> {
        for index in (0..self.scopes.len()).rev() {
            let expired = match self.scopes[index].get(name) {
                Some(binding) => binding.is_expired(now),
                None => continue,
            };
            if expired {
                self.scopes[index].remove(name);
                debug!(name, scope = index, "evicted expired binding");
                continue;
            }
            return Some(index);
        }
        None
    }

    pub fn resolve(&mut self, name: &str, now: SystemTime) -> Result<&mut Binding, RuntimeFault> {
        let index = self
            .locate(name, now)
            .ok_or_else(|| RuntimeFault::UndefinedVariable(name.to_string()))?;

        let key = if index == 0 && self.immutable.contains(name) {
            shadow_key(name)
        } else {
            name.to_string()
        };

        let binding = self.scopes[index]
            .get_mut(&key)
            .ok_or_else(|| RuntimeFault::UndefinedVariable(name.to_string()))?;

        if binding.deleted {
            return Err(RuntimeFault::DeletedVariable(name.to_string()));
        }
        Ok(binding)
    }

    pub fn lookup(&mut self, name: &str, now: SystemTime) -> Result<Value, RuntimeFault> {
        self.resolve(name, now).map(|binding| binding.value.clone())
    }

    /// Updates the nearest binding, recording history, or creates one in the
    /// innermost scope.
    pub fn assign(&mut self, name: &str, value: Value, now: SystemTime) -> Result<(), RuntimeFault> {
        match self.locate(name, now) {
            Some(0) if self.immutable.contains(name) => {
                Err(RuntimeFault::ImmutableGlobal(name.to_string()))
            }
            Some(index) => {
                let binding = self.scopes[index]
                    .get_mut(name)
                    .ok_or_else(|| RuntimeFault::UndefinedVariable(name.to_string()))?;
                if binding.deleted {
                    return Err(RuntimeFault::DeletedVariable(name.to_string()));
                }
                binding.set(value);
                Ok(())
            }
            None => {
                self.define(name, Binding::new(value));
                Ok(())
            }
        }
    }

    /// Marks the visible binding as deleted. Returns false when nothing was bound.
    pub fn delete(&mut self, name: &str, now: SystemTime) -> bool {
        match self.resolve(name, now) {
            Ok(binding) => {
                binding.deleted = true;
                true
            }
            Err(_) => false,
        }
    }
}

/// Turns lifetime annotation text into an absolute expiry.
///
/// `Infinity` never expires. `20s`, `5m` and `1h` count seconds, minutes and
/// hours; a bare number counts seconds. A leading `-` is accepted and counts
/// the same amount forward. Anything unreadable never expires.
pub fn parse_lifetime(text: &str, now: SystemTime) -> Option<SystemTime> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("infinity") {
        return None;
    }

    let magnitude = text.strip_prefix('-').unwrap_or(text);
    let (amount, unit_seconds) = match magnitude.chars().last() {
        Some('s') => (&magnitude[..magnitude.len() - 1], 1.0),
        Some('m') => (&magnitude[..magnitude.len() - 1], 60.0),
        Some('h') => (&magnitude[..magnitude.len() - 1], 3600.0),
        _ => (magnitude, 1.0),
    };

    let seconds = match amount.parse::<f64>() {
        Ok(amount) => amount * unit_seconds,
        Err(_) => {
            debug!(lifetime = text, "unreadable lifetime, binding never expires");
            return None;
        }
    };

    Duration::try_from_secs_f64(seconds)
        .ok()
        .and_then(|duration| now.checked_add(duration))
}
