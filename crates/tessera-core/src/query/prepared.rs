//! Prepared statements: parse once, bind and execute many times.

use crate::{
    error::Error,
    params::{BindingError, Params},
    query::{
        descriptor::OperationDescriptor,
        executor::{Backend, QueryResult, QueryRunner},
    },
    value::{Value, ValueBox},
};
use std::{collections::BTreeSet, sync::Arc};

///
/// StatementState
///
/// `Unbound` until every placeholder has a value, `Bound` once complete,
/// `Executed` after a successful run. Binding from `Executed` starts a
/// fresh binding set.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatementState {
    Bound,
    Executed,
    Unbound,
}

///
/// PreparedStatement
///
/// Holds a shared, immutable descriptor plus the current bindings. Clones
/// share the descriptor and carry independent bindings.
///

#[derive(Clone, Debug)]
pub struct PreparedStatement {
    descriptor: Arc<OperationDescriptor>,
    placeholders: BTreeSet<String>,
    params: Params,
    state: StatementState,
}

impl PreparedStatement {
    #[must_use]
    pub fn new(descriptor: OperationDescriptor) -> Self {
        let placeholders = descriptor.placeholders();
        let state = if placeholders.is_empty() {
            StatementState::Bound
        } else {
            StatementState::Unbound
        };

        Self {
            descriptor: Arc::new(descriptor),
            placeholders,
            params: Params::new(),
            state,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub const fn placeholders(&self) -> &BTreeSet<String> {
        &self.placeholders
    }

    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub const fn state(&self) -> StatementState {
        self.state
    }

    ///
    /// BINDING
    ///

    /// Bind one placeholder. Names the statement does not declare are
    /// rejected.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self, Error> {
        self.bind_box(name, ValueBox::new(value))
    }

    pub fn bind_box(&mut self, name: &str, value: ValueBox) -> Result<&mut Self, Error> {
        let mut incoming = Params::new();
        incoming.bind_box(name, value);

        self.bind_all(&incoming)
    }

    /// Bind a whole set at once; all names are checked before any is applied.
    pub fn bind_all(&mut self, params: &Params) -> Result<&mut Self, Error> {
        params.validate_known(&self.placeholders)?;

        if self.state == StatementState::Executed {
            self.params = Params::new();
        }
        for (name, value) in params.iter() {
            self.params.bind_box(name, value.clone());
        }
        self.refresh_state();

        Ok(self)
    }

    /// Drop every binding.
    pub fn clear(&mut self) {
        self.params = Params::new();
        self.refresh_state();
    }

    fn refresh_state(&mut self) {
        self.state = if self.params.validate(&self.placeholders).is_ok() {
            StatementState::Bound
        } else {
            StatementState::Unbound
        };
    }

    ///
    /// EXECUTION
    ///

    /// Run with the current bindings. Fails with `MissingBinding` naming
    /// every unbound placeholder; re-running an executed statement reuses
    /// its last bindings.
    pub fn execute(&mut self, runner: &QueryRunner, backend: &dyn Backend) -> Result<QueryResult, Error> {
        if self.state == StatementState::Unbound {
            self.params.validate(&self.placeholders)?;
        }

        let result = runner.run(backend, &self.descriptor, &self.params)?;
        self.state = StatementState::Executed;

        Ok(result)
    }

    /// Run with a one-off binding set, leaving the statement's own bindings
    /// untouched.
    pub fn execute_with(
        &self,
        runner: &QueryRunner,
        backend: &dyn Backend,
        params: &Params,
    ) -> Result<QueryResult, Error> {
        params.validate_known(&self.placeholders)?;

        runner.run(backend, &self.descriptor, params)
    }

    /// Placeholders still lacking a value.
    #[must_use]
    pub fn missing(&self) -> Vec<String> {
        match self.params.validate(&self.placeholders) {
            Err(BindingError::Missing { names }) => names,
            _ => Vec::new(),
        }
    }
}
