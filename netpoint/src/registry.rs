use std::{cell::RefCell, collections::HashMap, rc::Rc};

use thiserror::Error;

use netpoint_serde::{BitRead, Serde, SerdeErr};

use crate::{
    types::ObjectPath,
    value::{ReplicatedValue, ValueEntry},
};

/// Errors that can occur while registering calls on an object
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Call names must be unique within one object's scope
    #[error("call {name} is already registered on object {path}")]
    DuplicateName { name: String, path: String },
}

/// Interned handle for a registered call. Dispatch after the initial
/// name lookup is by key, never by string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallKey(u16);

impl CallKey {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A handler invoked with the payload bits that follow the envelope.
pub type RpcHandler = Box<dyn FnMut(&mut dyn BitRead) -> Result<(), SerdeErr>>;

pub(crate) enum CallEntry {
    Value(Rc<RefCell<dyn ValueEntry>>),
    Rpc(RpcHandler),
}

/// One networked object's dispatch table: every replicated value and RPC the
/// object exposes, keyed by an interned [`CallKey`]. Entries are written once
/// at setup and only read at dispatch time.
pub struct CallRegistry {
    path: ObjectPath,
    names: Vec<String>,
    keys: HashMap<String, CallKey>,
    entries: Vec<CallEntry>,
}

impl CallRegistry {
    pub fn new(path: ObjectPath) -> Self {
        Self {
            path,
            names: Vec::new(),
            keys: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Registers an RPC handler under `name`.
    pub fn register_rpc<F>(&mut self, name: &str, handler: F) -> Result<CallKey, RegistryError>
    where
        F: FnMut(&mut dyn BitRead) -> Result<(), SerdeErr> + 'static,
    {
        let key = self.intern(name)?;
        self.entries.push(CallEntry::Rpc(Box::new(handler)));
        Ok(key)
    }

    /// Registers a replicated value under `name`, binding it to this object
    /// so its updates know where they belong. The object keeps its own clone
    /// of the handle for gameplay access.
    pub fn register_value<T>(
        &mut self,
        name: &str,
        value: &Rc<RefCell<ReplicatedValue<T>>>,
    ) -> Result<CallKey, RegistryError>
    where
        T: Serde + 'static,
    {
        let key = self.intern(name)?;
        value.borrow_mut().bind(self.path.clone(), name);
        self.entries.push(CallEntry::Value(value.clone()));
        Ok(key)
    }

    /// Resolves a wire name to its interned key.
    pub fn key_of(&self, name: &str) -> Option<CallKey> {
        self.keys.get(name).copied()
    }

    pub fn name_of(&self, key: CallKey) -> Option<&str> {
        self.names.get(key.index()).map(String::as_str)
    }

    pub(crate) fn entry_mut(&mut self, key: CallKey) -> Option<&mut CallEntry> {
        self.entries.get_mut(key.index())
    }

    fn intern(&mut self, name: &str) -> Result<CallKey, RegistryError> {
        if self.keys.contains_key(name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
                path: self.path.to_string(),
            });
        }

        let key = CallKey(self.names.len() as u16);
        self.names.push(name.to_string());
        self.keys.insert(name.to_string(), key);
        Ok(key)
    }
}
