//! Execution units
//!
//! A unit owns one network's generated procedure, its compiled form,
//! and a transient namespace. Lifecycle:
//! construct/regenerate → CompiledNotSetup (generated and lowered,
//! execute refuses), `setup()` → Ready (fresh namespace, entry bound),
//! `execute()` valid only in Ready, `finish()` → CompiledNotSetup
//! (namespace cleared). Regeneration discards all prior compiled state.

use tracing::{debug, instrument};
use trellis_foundation::{NetworkId, OpRegistry, SocketTypeRegistry, Value};
use trellis_graph::{CompileError, NetworkKind, Program};
use trellis_ir::{Procedure, ENTRY_SYMBOL};

use crate::error::Error;
use crate::generator::{generate_network_procedure, CompileOptions};
use crate::loop_unit::generate_loop_procedure;
use crate::lower::{lower, CompiledProcedure, ExecEnv};
use crate::namespace::{Namespace, NamespaceEntry, ProcedureFn};
use crate::script_unit::generate_script_procedure;
use crate::session::EvalSession;

/// Lifecycle state of an execution unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Generated and lowered, namespace empty; execute refuses
    CompiledNotSetup,
    /// Namespace populated, entry bound; execute is valid
    Ready,
}

/// Shared unit state and lifecycle, embedded by every variant
#[derive(Debug)]
struct UnitCore {
    name: String,
    procedure: Procedure,
    compiled: CompiledProcedure,
    namespace: Namespace,
    state: UnitState,
}

impl UnitCore {
    fn from_procedure(procedure: Procedure) -> Result<Self, CompileError> {
        let compiled = lower(&procedure)?;
        Ok(Self {
            name: procedure.name.clone(),
            procedure,
            compiled,
            namespace: Namespace::new(),
            state: UnitState::CompiledNotSetup,
        })
    }

    /// Swap in a freshly generated procedure, discarding every prior
    /// compiled artifact. The unit lands in CompiledNotSetup.
    fn replace(&mut self, procedure: Procedure) -> Result<(), CompileError> {
        let compiled = lower(&procedure)?;
        self.name = procedure.name.clone();
        self.procedure = procedure;
        self.compiled = compiled;
        self.namespace.clear();
        self.state = UnitState::CompiledNotSetup;
        debug!(unit = %self.name, "unit regenerated");
        Ok(())
    }

    fn setup(&mut self) {
        self.namespace = Namespace::new();
        self.namespace
            .insert_function(ENTRY_SYMBOL, self.compiled.bind());
        self.state = UnitState::Ready;
        debug!(unit = %self.name, "unit set up");
    }

    fn insert_subprogram_functions(
        &mut self,
        entries: impl IntoIterator<Item = (String, NamespaceEntry)>,
    ) {
        self.namespace.merge(entries);
    }

    fn finish(&mut self) {
        self.namespace.clear();
        self.state = UnitState::CompiledNotSetup;
        debug!(unit = %self.name, "unit finished");
    }

    #[instrument(skip_all, fields(unit = %self.name))]
    fn execute(
        &self,
        args: &[Value],
        ops: &OpRegistry,
        types: &SocketTypeRegistry,
        session: &mut EvalSession,
    ) -> Result<Vec<Value>, Error> {
        if self.state != UnitState::Ready {
            return Err(Error::NotSetup);
        }
        let entry = self
            .namespace
            .function(ENTRY_SYMBOL)
            .ok_or(Error::NotSetup)?;
        let mut env = ExecEnv {
            ops,
            types,
            namespace: &self.namespace,
            session,
        };
        entry(&mut env, args).map_err(Error::from)
    }

    fn bound_entry(&self) -> ProcedureFn {
        self.compiled.bind()
    }
}

macro_rules! delegate_unit_api {
    () => {
        /// Create the namespace and bind the entry point
        pub fn setup(&mut self) {
            self.core.setup()
        }

        /// Merge linked subprogram functions into the namespace
        pub fn insert_subprogram_functions(
            &mut self,
            entries: impl IntoIterator<Item = (String, NamespaceEntry)>,
        ) {
            self.core.insert_subprogram_functions(entries)
        }

        /// Clear the namespace and return to CompiledNotSetup
        pub fn finish(&mut self) {
            self.core.finish()
        }

        /// Run the compiled procedure. Valid only in Ready.
        pub fn execute(
            &self,
            args: &[Value],
            ops: &OpRegistry,
            types: &SocketTypeRegistry,
            session: &mut EvalSession,
        ) -> Result<Vec<Value>, Error> {
            self.core.execute(args, ops, types, session)
        }

        pub fn state(&self) -> UnitState {
            self.core.state
        }

        /// Diagnostic key of the unit
        pub fn name(&self) -> &str {
            &self.core.name
        }

        /// The generated procedure (the unit's "source")
        pub fn procedure(&self) -> &Procedure {
            &self.core.procedure
        }

        /// The namespace, queryable after `setup()`
        pub fn namespace(&self) -> &Namespace {
            &self.core.namespace
        }

        /// The compiled entry point, for linking this unit into a
        /// caller's namespace
        pub fn bound_entry(&self) -> ProcedureFn {
            self.core.bound_entry()
        }

        pub fn network(&self) -> &NetworkId {
            &self.network
        }
    };
}

/// Execution unit for a main network
#[derive(Debug)]
pub struct NetworkExecutionUnit {
    core: UnitCore,
    network: NetworkId,
}

impl NetworkExecutionUnit {
    pub fn new(
        program: &Program,
        network: &NetworkId,
        types: &SocketTypeRegistry,
        options: &CompileOptions,
    ) -> Result<Self, CompileError> {
        let net = program.network(network)?;
        if net.kind != NetworkKind::Main {
            return Err(CompileError::WrongNetworkKind {
                network: network.clone(),
                expected: "main",
            });
        }
        let procedure = generate_network_procedure(net, types, options)?;
        Ok(Self {
            core: UnitCore::from_procedure(procedure)?,
            network: network.clone(),
        })
    }

    /// Regenerate after a structural change, discarding prior state
    pub fn regenerate(
        &mut self,
        program: &Program,
        types: &SocketTypeRegistry,
        options: &CompileOptions,
    ) -> Result<(), CompileError> {
        let net = program.network(&self.network)?;
        self.core.replace(generate_network_procedure(net, types, options)?)
    }

    delegate_unit_api!();
}

/// Execution unit for a script network
pub struct ScriptExecutionUnit {
    core: UnitCore,
    network: NetworkId,
}

impl ScriptExecutionUnit {
    pub fn new(
        program: &Program,
        network: &NetworkId,
        ops: &OpRegistry,
    ) -> Result<Self, CompileError> {
        let net = program.network(network)?;
        if net.kind != NetworkKind::Script {
            return Err(CompileError::WrongNetworkKind {
                network: network.clone(),
                expected: "script",
            });
        }
        let procedure = generate_script_procedure(net, ops)?;
        Ok(Self {
            core: UnitCore::from_procedure(procedure)?,
            network: network.clone(),
        })
    }

    /// Regenerate after the script or its sockets changed
    pub fn regenerate(&mut self, program: &Program, ops: &OpRegistry) -> Result<(), CompileError> {
        let net = program.network(&self.network)?;
        self.core.replace(generate_script_procedure(net, ops)?)
    }

    delegate_unit_api!();
}

/// Execution unit for a loop network
pub struct LoopExecutionUnit {
    core: UnitCore,
    network: NetworkId,
}

impl LoopExecutionUnit {
    pub fn new(
        program: &Program,
        network: &NetworkId,
        types: &SocketTypeRegistry,
        options: &CompileOptions,
    ) -> Result<Self, CompileError> {
        let net = program.network(network)?;
        if net.kind != NetworkKind::Loop {
            return Err(CompileError::WrongNetworkKind {
                network: network.clone(),
                expected: "loop",
            });
        }
        let procedure = generate_loop_procedure(net, types, options)?;
        Ok(Self {
            core: UnitCore::from_procedure(procedure)?,
            network: network.clone(),
        })
    }

    /// Regenerate after a structural change, discarding prior state
    pub fn regenerate(
        &mut self,
        program: &Program,
        types: &SocketTypeRegistry,
        options: &CompileOptions,
    ) -> Result<(), CompileError> {
        let net = program.network(&self.network)?;
        self.core.replace(generate_loop_procedure(net, types, options)?)
    }

    delegate_unit_api!();
}
