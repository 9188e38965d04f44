//! Subtree registrations and the ordered variable registry.

use std::{
    collections::BTreeMap,
    ops::Bound::{Excluded, Included, Unbounded},
};

use crate::{
    error::{AgentXError, Result},
    oid::Oid,
    pdu::{RegisterPdu, UnregisterPdu},
    variable::Variable,
};

/// Default registration priority (RFC 2741 §6.2.3).
pub const DEFAULT_PRIORITY: u8 = 127;

/// A MIB region registered with the master agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub subtree: Oid,
    pub priority: u8,
    /// Non-zero selects a range registration over that sub-identifier.
    pub range_subid: u8,
    pub upper_bound: u32,
    /// Region timeout in seconds (0 = session default).
    pub timeout: u8,
    /// Registers a single instance rather than a subtree.
    pub instance: bool,
}

impl Registration {
    /// A simple subtree registration with default priority and timeout.
    pub fn new(subtree: Oid) -> Self {
        Registration {
            subtree,
            priority: DEFAULT_PRIORITY,
            range_subid: 0,
            upper_bound: 0,
            timeout: 0,
            instance: false,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: u8) -> Self {
        self.timeout = timeout;
        self
    }

    /// Turns this into a range registration: sub-identifier `range_subid`
    /// (1-based) of the subtree varies up to `upper_bound`.
    pub fn with_range(mut self, range_subid: u8, upper_bound: u32) -> Self {
        self.range_subid = range_subid;
        self.upper_bound = upper_bound;
        self
    }

    pub fn with_instance(mut self, instance: bool) -> Self {
        self.instance = instance;
        self
    }

    /// A plain subtree registration: neither instance nor range.
    pub fn is_simple(&self) -> bool {
        !self.instance && self.range_subid == 0
    }

    pub(crate) fn to_register_pdu(&self) -> RegisterPdu {
        RegisterPdu {
            timeout: self.timeout,
            priority: self.priority,
            range_subid: self.range_subid,
            subtree: self.subtree.clone(),
            upper_bound: (self.range_subid != 0).then_some(self.upper_bound),
        }
    }

    pub(crate) fn to_unregister_pdu(&self) -> UnregisterPdu {
        UnregisterPdu {
            priority: self.priority,
            range_subid: self.range_subid,
            subtree: self.subtree.clone(),
            upper_bound: (self.range_subid != 0).then_some(self.upper_bound),
        }
    }
}

/// True if some simple registration covers `oid`.
pub fn is_covered(registrations: &[Registration], oid: &Oid) -> bool {
    registrations
        .iter()
        .any(|r| r.is_simple() && r.subtree.contains(oid))
}

/// Variables served by the session, ordered lexicographically by OID.
#[derive(Default)]
pub struct VariableRegistry {
    variables: BTreeMap<Oid, Box<dyn Variable>>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `var` at `oid` if one of `registrations` covers it.
    ///
    /// An existing variable at the same OID is replaced.
    pub fn add(
        &mut self,
        registrations: &[Registration],
        oid: Oid,
        var: Box<dyn Variable>,
    ) -> Result<()> {
        if !is_covered(registrations, &oid) {
            return Err(AgentXError::UnknownRegistration);
        }
        self.variables.insert(oid.with_include(false), var);
        Ok(())
    }

    /// Removes the variable at `oid`, if any.
    pub fn remove(&mut self, oid: &Oid) -> Option<Box<dyn Variable>> {
        self.variables.remove(oid)
    }

    /// Drops every variable no longer covered by `registrations`.
    pub fn retain_covered(&mut self, registrations: &[Registration]) {
        self.variables
            .retain(|oid, _| is_covered(registrations, oid));
    }

    pub fn clear(&mut self) {
        self.variables.clear();
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.variables.contains_key(oid)
    }

    pub fn get_mut(&mut self, oid: &Oid) -> Option<&mut (dyn Variable + 'static)> {
        self.variables.get_mut(oid).map(|v| v.as_mut())
    }

    /// The first registered OID after `start`, or at `start` when `inclusive`.
    pub fn successor(&self, start: &Oid, inclusive: bool) -> Option<&Oid> {
        let lower = if inclusive {
            Included(start)
        } else {
            Excluded(start)
        };
        self.variables
            .range::<Oid, _>((lower, Unbounded))
            .next()
            .map(|(oid, _)| oid)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
