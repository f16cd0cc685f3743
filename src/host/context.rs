/*!
 * Host Context
 * Owner of everything one instantiation can reach
 *
 * A context bundles the resource table, the subsystem managers, and the
 * runtime that drives native asynchronous work. Dropping it releases every
 * live resource and stops a runtime it owns.
 */

use crate::config::{ConfigError, InstanceConfig};
use crate::core::{Handle, HostResult};
use crate::filesystem::{Descriptor, DescriptorManager, HostFs, NativeFs};
use crate::http::{HttpBridge, HttpClient, ReqwestClient};
use crate::random::RandomService;
use crate::sockets::SocketManager;
use crate::table::{Reservation, ResourceTable, TableEntry};
use crate::translate::ErrorCodeTranslator;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Builder as RuntimeBuilder, Handle as RuntimeHandle, Runtime};
use tracing::info;

/// Per-instantiation host state
pub struct HostContext {
    pub(super) config: InstanceConfig,
    pub(super) table: ResourceTable,
    pub(super) filesystem: DescriptorManager,
    pub(super) sockets: SocketManager,
    pub(super) http: HttpBridge,
    pub(super) random: RandomService,
    preopens: Vec<(Handle, String)>,
    runtime_handle: RuntimeHandle,
    owned_runtime: Option<Runtime>,
}

impl HostContext {
    pub fn builder(config: InstanceConfig) -> HostContextBuilder {
        HostContextBuilder::new(config)
    }

    /// Context with the host filesystem, reqwest, and an owned runtime
    pub fn new(config: InstanceConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    #[inline]
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    #[inline]
    pub fn table(&self) -> &ResourceTable {
        &self.table
    }

    #[inline]
    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime_handle
    }

    /// Preopened directory handles with their guest paths
    ///
    /// Preopens the guest has already dropped are left out.
    pub fn get_directories(&self) -> Vec<(Handle, String)> {
        self.preopens
            .iter()
            .filter(|(handle, _)| self.table.contains(*handle))
            .cloned()
            .collect()
    }

    /// Release a handle of any kind
    pub fn drop_handle(&self, handle: Handle) -> HostResult<()> {
        self.table.drop_handle(handle)?;
        Ok(())
    }

    #[inline]
    pub(super) fn get<T: TableEntry>(&self, handle: Handle) -> HostResult<Arc<T>> {
        Ok(self.table.get_as::<T>(handle)?)
    }

    #[inline]
    pub(super) fn push<T: TableEntry>(&self, value: T) -> HostResult<Handle> {
        Ok(self.table.push(value)?)
    }

    /// Claim a table slot before producing the resource that fills it
    #[inline]
    pub(super) fn reserve(&self) -> HostResult<Reservation<'_>> {
        Ok(self.table.reserve()?)
    }
}

impl Drop for HostContext {
    fn drop(&mut self) {
        if let Some(runtime) = self.owned_runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("live_handles", &self.table.len())
            .field("preopens", &self.preopens)
            .field("owns_runtime", &self.owned_runtime.is_some())
            .finish()
    }
}

/// Builder for `HostContext`
///
/// Every collaborator has a production default; tests swap in counting
/// filesystems, fake HTTP clients, or a shared runtime.
pub struct HostContextBuilder {
    config: InstanceConfig,
    native_fs: Option<Arc<dyn NativeFs>>,
    http_client: Option<Arc<dyn HttpClient>>,
    runtime: Option<RuntimeHandle>,
    translator: Option<ErrorCodeTranslator>,
}

impl HostContextBuilder {
    pub fn new(config: InstanceConfig) -> Self {
        Self {
            config,
            native_fs: None,
            http_client: None,
            runtime: None,
            translator: None,
        }
    }

    pub fn with_native_fs(mut self, fs: Arc<dyn NativeFs>) -> Self {
        self.native_fs = Some(fs);
        self
    }

    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Drive native work on an existing runtime instead of starting one
    pub fn with_runtime_handle(mut self, handle: RuntimeHandle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn with_translator(mut self, translator: ErrorCodeTranslator) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn build(self) -> Result<HostContext, ConfigError> {
        let limits = *self.config.limits();
        let translator = self.translator.unwrap_or_else(ErrorCodeTranslator::native);

        let (runtime_handle, owned_runtime) = match self.runtime {
            Some(handle) => (handle, None),
            None => {
                let runtime = RuntimeBuilder::new_multi_thread()
                    .worker_threads(limits.worker_threads)
                    .max_blocking_threads(limits.max_blocking_threads)
                    .thread_name("wasi-host-io")
                    .enable_all()
                    .build()
                    .map_err(|e| ConfigError::Runtime(e.to_string()))?;
                (runtime.handle().clone(), Some(runtime))
            }
        };

        let http_client: Arc<dyn HttpClient> = match self.http_client {
            Some(client) => client,
            None => {
                // reqwest binds its connector to the current runtime
                let _guard = runtime_handle.enter();
                Arc::new(
                    ReqwestClient::with_connect_timeout(translator, limits.connect_timeout())
                        .map_err(ConfigError::HttpClient)?,
                )
            }
        };
        let native_fs = self.native_fs.unwrap_or_else(|| Arc::new(HostFs));

        let filesystem = DescriptorManager::new(native_fs, translator, runtime_handle.clone())
            .with_limits(limits.max_symlink_depth, limits.stream_capacity);
        let sockets = SocketManager::new(
            Arc::clone(self.config.allow_list()),
            runtime_handle.clone(),
            translator,
        )
        .with_limits(
            limits.connect_timeout(),
            limits.default_listen_backlog,
            limits.stream_capacity,
        );
        let http = HttpBridge::new(
            http_client,
            Arc::clone(self.config.allow_list()),
            Arc::clone(self.config.forbidden_headers()),
            runtime_handle.clone(),
        )
        .with_stream_capacity(limits.stream_capacity);

        let table = ResourceTable::with_capacity(limits.max_resources);
        let mut preopens = Vec::with_capacity(self.config.preopens().len());
        for preopen in self.config.preopens() {
            let handle = table
                .push(Descriptor::root(Arc::clone(preopen)))
                .map_err(|_| ConfigError::InvalidLimit {
                    name: "max_resources",
                    reason: "smaller than the number of preopens",
                })?;
            preopens.push((handle, preopen.guest_path().to_string()));
        }

        info!(
            preopens = preopens.len(),
            max_resources = limits.max_resources,
            owns_runtime = owned_runtime.is_some(),
            platform = ?translator.platform(),
            "host context instantiated"
        );

        Ok(HostContext {
            config: self.config,
            table,
            filesystem,
            sockets,
            http,
            random: RandomService::new(),
            preopens,
            runtime_handle,
            owned_runtime,
        })
    }
}
