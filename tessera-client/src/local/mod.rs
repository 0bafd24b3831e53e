//! An in-process partition service.
//!
//! Every partition of a local group is served by a [`LocalPartitionServer`], which hosts the
//! replicated services of the primitives bound to it in memory. Leadership changes are
//! published through the partition itself, and sessions opened under an older term are
//! rejected once a newer term has been observed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::counter::{CounterService, ATOMIC_COUNTER};
use crate::proto::{PartitionSnapshot, ServiceSnapshot};
use crate::utils;
use tessera_core::partition::INITIAL_TERM;
use tessera_core::{
    AppError, MemberId, Partition, PartitionDirectory, PartitionGroup, PartitionId, PartitionMetadata, PartitionService, PrimitiveOperation,
    PrimitiveType, ProxySession,
};
use tessera_core::{Snapshot, SnapshotDescriptor, SnapshotStore};
use tessera_core::{SessionProtocol, SessionTarget};


/// The replicated state machine backing a single primitive.
pub trait PrimitiveService: Send + 'static {
    /// Apply an operation, returning its encoded output.
    fn apply(&mut self, operation: &PrimitiveOperation) -> Result<Vec<u8>>;

    /// Encode the service's state.
    fn snapshot(&self) -> Result<Vec<u8>>;

    /// Replace the service's state with the given encoded state.
    fn restore(&mut self, data: &[u8]) -> Result<()>;
}

/// A constructor of fresh primitive services.
pub type ServiceFactory = Arc<dyn Fn() -> Box<dyn PrimitiveService> + Send + Sync>;

type ServersMap = BTreeMap<PartitionId, Arc<LocalPartitionServer>>;
type FactoriesMap = BTreeMap<PrimitiveType, ServiceFactory>;

/// An in-process partition service.
#[derive(Clone)]
pub struct LocalPartitionService {
    inner: Arc<LocalInner>,
}

struct LocalInner {
    directory: PartitionDirectory,
    servers: ArcSwap<ServersMap>,
    factories: ArcSwap<FactoriesMap>,
}

impl LocalPartitionService {
    /// Create a new service hosting the built-in primitive types.
    pub fn new() -> Self {
        let this = Self {
            inner: Arc::new(LocalInner {
                directory: PartitionDirectory::new(),
                servers: Default::default(),
                factories: Default::default(),
            }),
        };
        this.register_service(PrimitiveType::new(ATOMIC_COUNTER), || {
            Box::new(CounterService::default()) as Box<dyn PrimitiveService>
        });
        this
    }

    /// Register the service constructor for the given primitive type.
    pub fn register_service<F>(&self, primitive_type: PrimitiveType, factory: F)
    where
        F: Fn() -> Box<dyn PrimitiveService> + Send + Sync + 'static,
    {
        let factory: ServiceFactory = Arc::new(factory);
        self.inner.factories.rcu(|factories| {
            let mut updated = FactoriesMap::clone(factories);
            updated.insert(primitive_type.clone(), factory.clone());
            updated
        });
    }

    /// The directory of groups hosted by this service.
    pub fn directory(&self) -> &PartitionDirectory {
        &self.inner.directory
    }

    /// Create a group of `partitions` partitions replicated over the given members.
    ///
    /// Partitions are numbered from 1, and primaries are assigned round-robin over the members
    /// at the initial term.
    #[tracing::instrument(level = "debug", skip(self, members))]
    pub fn add_group(&self, name: &str, partitions: u32, members: &[&str]) -> Result<Arc<PartitionGroup>> {
        if members.is_empty() {
            bail!(AppError::InvalidInput(format!("partition group {} must have at least one member", name)));
        }
        let protocol: Arc<dyn SessionProtocol> = Arc::new(LocalProtocol {
            service: Arc::downgrade(&self.inner),
        });
        let members: Vec<MemberId> = members.iter().map(|member| MemberId::new(member)).collect();

        let mut servers = Vec::with_capacity(partitions as usize);
        for id in 1..=partitions {
            let metadata = PartitionMetadata::new(members.clone())?;
            let partition = Partition::new(PartitionId::new(name, id), metadata, protocol.clone());
            let primary = members[(id as usize - 1) % members.len()].clone();
            partition.publish_primary(INITIAL_TERM, Some(primary))?;
            servers.push(Arc::new(LocalPartitionServer::new(partition)));
        }

        let group = PartitionGroup::new(name, servers.iter().map(|server| server.partition.clone()))?;
        self.inner.servers.rcu(|current| {
            let mut updated = ServersMap::clone(current);
            updated.retain(|id, _| id.group() != name);
            for server in servers.iter() {
                updated.insert(server.partition.id().clone(), server.clone());
            }
            updated
        });
        Ok(self.inner.directory.register(group))
    }

    /// The server of the given partition, if hosted here.
    pub fn server(&self, id: &PartitionId) -> Option<Arc<LocalPartitionServer>> {
        self.inner.servers.load().get(id).cloned()
    }

    fn get_server(&self, id: &PartitionId) -> Result<Arc<LocalPartitionServer>> {
        self.server(id)
            .ok_or_else(|| anyhow!(AppError::Routing(format!("partition {} is not hosted by this service", id))))
    }

    /// Publish a leadership change for the given partition.
    pub fn elect(&self, id: &PartitionId, term: u64, primary: Option<&str>) -> Result<Arc<PartitionMetadata>> {
        let server = self.get_server(id)?;
        server.partition.publish_primary(term, primary.map(MemberId::new))
    }

    /// Snapshot the state of all services of the given partition into the store.
    #[tracing::instrument(level = "debug", skip(self, store))]
    pub async fn snapshot_partition(&self, id: &PartitionId, store: &SnapshotStore) -> Result<Snapshot> {
        let server = self.get_server(id)?;
        let (descriptor, data) = server.capture()?;
        let snapshot = store.create(descriptor, &data).await?;
        tracing::debug!(index = descriptor.index(), term = descriptor.term(), "partition snapshot taken");
        Ok(snapshot)
    }

    /// Restore the state of all services of the given partition from the store's current snapshot.
    ///
    /// Returns the descriptor of the restored snapshot, or `None` if the store holds no snapshot.
    #[tracing::instrument(level = "debug", skip(self, store))]
    pub async fn restore_partition(&self, id: &PartitionId, store: &SnapshotStore) -> Result<Option<SnapshotDescriptor>> {
        let server = self.get_server(id)?;
        let snapshot = match store.current().await? {
            Some(snapshot) => snapshot,
            None => return Ok(None),
        };
        let data = snapshot.read_data().await?;
        let state: PartitionSnapshot = utils::decode_model(&data).context("error decoding partition snapshot")?;

        let factories = self.inner.factories.load_full();
        let mut services = BTreeMap::new();
        for entry in state.services {
            let primitive_type = PrimitiveType::new(&entry.primitive_type);
            let factory = factories
                .get(&primitive_type)
                .ok_or_else(|| AppError::Configuration(format!("unknown primitive type {} in snapshot", primitive_type)))?;
            let mut service = factory();
            service
                .restore(&entry.data)
                .with_context(|| format!("error restoring service {} from snapshot", entry.name))?;
            services.insert(entry.name, ServiceEntry { primitive_type, service });
        }

        let descriptor = *snapshot.descriptor();
        server.install(descriptor.index(), services)?;
        tracing::debug!(index = descriptor.index(), term = descriptor.term(), "partition restored from snapshot");
        Ok(Some(descriptor))
    }
}

impl Default for LocalPartitionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PartitionService for LocalPartitionService {
    async fn get_partition_group(&self, name: &str) -> Result<Arc<PartitionGroup>> {
        self.inner.directory.get_partition_group(name).await
    }
}

/// The session protocol of local partitions.
struct LocalProtocol {
    service: Weak<LocalInner>,
}

#[async_trait]
impl SessionProtocol for LocalProtocol {
    async fn connect(&self, target: SessionTarget) -> Result<Arc<dyn ProxySession>> {
        let inner = self.service.upgrade().ok_or_else(|| anyhow!("local partition service has shut down"))?;
        let server = inner
            .servers
            .load()
            .get(&target.partition)
            .cloned()
            .ok_or_else(|| anyhow!("partition {} is not hosted by this service", target.partition))?;
        if target.primary.is_none() {
            bail!("partition {} has no primary at term {}", target.partition, target.term);
        }
        server.partition.check_term(target.term)?;

        let factory = inner
            .factories
            .load()
            .get(&target.primitive_type)
            .cloned()
            .ok_or_else(|| AppError::Configuration(format!("partition {} can not host primitive type {}", target.partition, target.primitive_type)))?;
        let id = server.open_session(&target, factory.as_ref())?;
        tracing::debug!(session = id, partition = %target.partition, term = target.term, primitive = %target.primitive_name, "local session opened");

        Ok(Arc::new(LocalSession {
            id,
            partition: target.partition,
            term: target.term,
            server,
            closed: AtomicBool::new(false),
        }))
    }
}

/// The server side of a local partition.
pub struct LocalPartitionServer {
    partition: Partition,
    state: Mutex<ServerState>,
    next_session_id: AtomicU64,
}

#[derive(Default)]
struct ServerState {
    /// The index of the last operation applied to this partition.
    index: u64,
    services: BTreeMap<String, ServiceEntry>,
    /// Open sessions by ID.
    sessions: BTreeMap<u64, SessionEntry>,
}

/// An open session and the name of the primitive it is bound to.
struct SessionEntry {
    name: String,
    timeout: Duration,
    last_active: Instant,
}

impl SessionEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_active) > self.timeout
    }
}

struct ServiceEntry {
    primitive_type: PrimitiveType,
    service: Box<dyn PrimitiveService>,
}

impl LocalPartitionServer {
    fn new(partition: Partition) -> Self {
        Self {
            partition,
            state: Default::default(),
            next_session_id: AtomicU64::new(0),
        }
    }

    /// The partition served.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The index of the last operation applied to this partition.
    pub fn index(&self) -> Result<u64> {
        Ok(self.state()?.index)
    }

    /// The number of open sessions.
    ///
    /// Sessions idle for longer than their timeout are expired first.
    pub fn session_count(&self) -> Result<usize> {
        let mut state = self.state()?;
        self.expire(&mut state, Instant::now());
        Ok(state.sessions.len())
    }

    /// Expire all sessions idle for longer than their timeout, returning the number expired.
    pub fn expire_sessions(&self) -> Result<usize> {
        let mut state = self.state()?;
        Ok(self.expire(&mut state, Instant::now()))
    }

    fn expire(&self, state: &mut ServerState, now: Instant) -> usize {
        let before = state.sessions.len();
        state.sessions.retain(|id, session| {
            if !session.is_expired(now) {
                return true;
            }
            tracing::debug!(session = id, partition = %self.partition.id(), primitive = %session.name, "expiring idle session");
            false
        });
        let expired = before - state.sessions.len();
        state.index += expired as u64;
        expired
    }

    fn state(&self) -> Result<MutexGuard<'_, ServerState>> {
        self.state.lock().map_err(|_| anyhow!("state of partition {} is poisoned", self.partition.id()))
    }

    fn open_session(&self, target: &SessionTarget, factory: &(dyn Fn() -> Box<dyn PrimitiveService> + Send + Sync)) -> Result<u64> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        let now = Instant::now();
        self.expire(state, now);
        match state.services.get(&target.primitive_name) {
            Some(entry) if entry.primitive_type != target.primitive_type => {
                bail!(AppError::Configuration(format!(
                    "primitive {} already exists on partition {} with type {}",
                    target.primitive_name,
                    self.partition.id(),
                    entry.primitive_type
                )));
            }
            Some(_) => (),
            None => {
                let entry = ServiceEntry {
                    primitive_type: target.primitive_type.clone(),
                    service: factory(),
                };
                state.services.insert(target.primitive_name.clone(), entry);
            }
        }
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        state.sessions.insert(
            id,
            SessionEntry {
                name: target.primitive_name.clone(),
                timeout: target.config.session_timeout(),
                last_active: now,
            },
        );
        state.index += 1;
        Ok(id)
    }

    fn apply(&self, session_id: u64, term: u64, operation: &PrimitiveOperation) -> Result<Vec<u8>> {
        self.partition.check_term(term)?;
        let mut guard = self.state()?;
        let state = &mut *guard;
        let now = Instant::now();
        self.expire(state, now);
        let session = state.sessions.get_mut(&session_id).ok_or(AppError::Closed)?;
        session.last_active = now;
        let entry = state.services.get_mut(&session.name).ok_or(AppError::Closed)?;
        let output = entry.service.apply(operation)?;
        state.index += 1;
        Ok(output)
    }

    fn close_session(&self, session_id: u64) -> Result<()> {
        let mut state = self.state()?;
        if state.sessions.remove(&session_id).is_some() {
            state.index += 1;
        }
        Ok(())
    }

    /// Capture the descriptor & encoded state of this partition.
    fn capture(&self) -> Result<(SnapshotDescriptor, Vec<u8>)> {
        let state = self.state()?;
        let mut snapshot = PartitionSnapshot::default();
        for (name, entry) in state.services.iter() {
            snapshot.services.push(ServiceSnapshot {
                name: name.clone(),
                primitive_type: entry.primitive_type.name().into(),
                data: entry.service.snapshot()?,
            });
        }
        let descriptor = SnapshotDescriptor::builder()
            .with_index(state.index)
            .with_timestamp(utils::now_millis())
            .with_term(self.partition.term())
            .build();
        Ok((descriptor, utils::encode_model(&snapshot)?))
    }

    /// Replace the services of this partition with restored ones.
    fn install(&self, index: u64, services: BTreeMap<String, ServiceEntry>) -> Result<()> {
        let mut state = self.state()?;
        state.index = index;
        state.services = services;
        let ServerState { services, sessions, .. } = &mut *state;
        sessions.retain(|id, session| {
            if services.contains_key(&session.name) {
                return true;
            }
            tracing::debug!(session = id, primitive = %session.name, "closing session of a primitive absent from the snapshot");
            false
        });
        Ok(())
    }
}

/// A session with a local partition.
struct LocalSession {
    id: u64,
    partition: PartitionId,
    term: u64,
    server: Arc<LocalPartitionServer>,
    closed: AtomicBool,
}

#[async_trait]
impl ProxySession for LocalSession {
    fn session_id(&self) -> u64 {
        self.id
    }

    fn partition_id(&self) -> &PartitionId {
        &self.partition
    }

    fn term(&self) -> u64 {
        self.term
    }

    async fn execute(&self, operation: PrimitiveOperation) -> Result<Vec<u8>> {
        if self.closed.load(Ordering::SeqCst) {
            bail!(AppError::Closed);
        }
        self.server.apply(self.id, self.term, &operation)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.server.close_session(self.id)
    }
}
