/*!
 * Closure Runtime
 *
 * Service object owning the closure table, the backing function registry,
 * and guest memory. Constructed once at host start, passed by reference to
 * whatever services guest calls, and torn down explicitly with `shutdown`.
 */

use crate::closures::{ClosureStats, ClosureTable, FunctionTable};
use crate::core::limits::bytes_to_kb;
use crate::core::RuntimeConfig;
use crate::memory::GuestMemory;
use std::sync::Arc;
use tracing::info;

/// Process-wide closure runtime
#[derive(Clone)]
pub struct ClosureRuntime {
    table: Arc<ClosureTable>,
    functions: FunctionTable,
    memory: GuestMemory,
    config: RuntimeConfig,
}

impl ClosureRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self::builder().with_config(config).build()
    }

    /// Runtime configured from `CLOSURE_*` environment variables
    pub fn from_env() -> Self {
        Self::new(RuntimeConfig::from_env())
    }

    pub fn builder() -> ClosureRuntimeBuilder {
        ClosureRuntimeBuilder::default()
    }

    pub fn table(&self) -> &ClosureTable {
        &self.table
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn memory(&self) -> &GuestMemory {
        &self.memory
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn stats(&self) -> ClosureStats {
        self.table.stats()
    }

    /// Free every live closure and return how many were released
    ///
    /// Clones of the runtime share the table, so they observe the teardown.
    pub fn shutdown(self) -> usize {
        let released = self.table.clear();
        let stats = self.table.stats();
        info!(
            released,
            invocations = stats.invocations,
            prepares = stats.prepares,
            "Closure runtime shut down"
        );
        released
    }
}

impl Default for ClosureRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

/// Builder for [`ClosureRuntime`]
#[derive(Default)]
pub struct ClosureRuntimeBuilder {
    config: Option<RuntimeConfig>,
    functions: Option<FunctionTable>,
    memory: Option<GuestMemory>,
}

impl ClosureRuntimeBuilder {
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing backing function registry
    pub fn with_functions(mut self, functions: FunctionTable) -> Self {
        self.functions = Some(functions);
        self
    }

    /// Attach existing guest memory instead of allocating `memory_size` bytes
    pub fn with_memory(mut self, memory: GuestMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn build(self) -> ClosureRuntime {
        let config = self.config.unwrap_or_default();
        let memory = self
            .memory
            .unwrap_or_else(|| GuestMemory::new(config.memory_size));

        info!(
            table_capacity = config.table_capacity,
            max_user_data = config.max_user_data,
            memory_kb = bytes_to_kb(memory.size()),
            "Closure runtime initialized"
        );

        ClosureRuntime {
            table: Arc::new(ClosureTable::new(
                config.table_capacity,
                config.max_user_data,
            )),
            functions: self.functions.unwrap_or_default(),
            memory,
            config,
        }
    }
}
