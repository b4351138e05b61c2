use std::{collections::BTreeMap, sync::Arc, time::Instant};

use futures::future::join_all;
use proto::{
    DfsError,
    types::{StorageNodeId, StorageNodeView},
};
use tokio::{task::JoinHandle, time::interval};
use utilities::logger::{debug, error, info, instrument, tracing, warn};

use crate::{
    catalog::RecordRepair,
    coordinator_state::CoordinatorState,
    storage_node::selection_policy::{LowestIdSelectionPolicy, RepairSelectionPolicy},
};

/// What one liveness sweep changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub dead: Vec<StorageNodeId>,
    pub reassigned: usize,
    pub degraded: usize,
    pub replicated: usize,
}

/// Keeps the coordinator state honest: declares silent storage nodes dead,
/// moves chunk ownership to surviving holders, tops up lost copies and expires
/// client sessions.
pub struct StateMaintainer {
    state: Arc<CoordinatorState>,
    selection_policy: Box<dyn RepairSelectionPolicy + Send + Sync>,
}

impl StateMaintainer {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        Self {
            state,
            selection_policy: Box::new(LowestIdSelectionPolicy),
        }
    }

    pub fn start(self) -> (JoinHandle<()>, JoinHandle<()>) {
        let sessions_state = self.state.clone();
        let sessions = tokio::spawn(async move {
            let mut ticker = interval(sessions_state.config.client_sweep_interval());
            loop {
                ticker.tick().await;
                sweep_client_sessions(&sessions_state, Instant::now()).await;
            }
        });
        let liveness = tokio::spawn(async move {
            let mut ticker = interval(self.state.config.sweep_interval());
            loop {
                ticker.tick().await;
                let report = self.sweep(Instant::now()).await;
                if report != SweepReport::default() {
                    info!(?report, "Liveness sweep changed the cluster state");
                }
            }
        });
        (liveness, sessions)
    }

    #[instrument(name = "coordinator_liveness_sweep", skip(self, now))]
    pub async fn sweep(&self, now: Instant) -> SweepReport {
        let config = &self.state.config;
        let dead = self
            .state
            .registry
            .lock()
            .await
            .sweep(now, config.suspect_threshold(), config.dead_threshold());
        if !dead.is_empty() {
            let mut replicas = self.state.replicas.lock().await;
            for detail in &dead {
                warn!(storage_node_id = detail.id, addrs = %detail.addrs(), "Storage node declared dead");
                replicas.forget_node(detail.id);
            }
        }
        let mut report = SweepReport {
            dead: dead.iter().map(|detail| detail.id).collect(),
            ..SweepReport::default()
        };

        // after a restart the replica index is empty until nodes report back
        if now.saturating_duration_since(self.state.started_at) < config.dead_threshold() {
            debug!("Skipping repair until storage nodes had time to re-register");
            return report;
        }
        let live = self.state.registry.lock().await.live_views();
        self.repair_records(&live, &mut report).await;
        self.top_up_replicas(&live, &mut report).await;
        report
    }

    async fn repair_records(
        &self,
        live: &BTreeMap<StorageNodeId, StorageNodeView>,
        report: &mut SweepReport,
    ) {
        let orphaned = self
            .state
            .catalog
            .orphaned_records(|id| live.contains_key(&id))
            .await;
        if orphaned.is_empty() {
            return;
        }
        let repairs: Vec<RecordRepair> = {
            let replicas = self.state.replicas.lock().await;
            orphaned
                .into_iter()
                .filter_map(|orphan| {
                    let holders = replicas.live_holders(&orphan.record.chunk_id, live);
                    match self.selection_policy.new_owner(&holders) {
                        Some(new_owner) => Some(RecordRepair::Reassign {
                            path: orphan.path,
                            expected: orphan.record,
                            new_owner,
                        }),
                        None if orphan.record.degraded => None,
                        None => Some(RecordRepair::MarkDegraded {
                            path: orphan.path,
                            expected: orphan.record,
                        }),
                    }
                })
                .collect()
        };
        match self.state.catalog.apply_repairs(repairs).await {
            Ok(applied) => {
                for repair in applied {
                    match repair {
                        RecordRepair::Reassign {
                            path,
                            expected,
                            new_owner,
                        } => {
                            info!(%path, chunk_id = %expected.chunk_id, from = expected.storage_node_id, to = new_owner, "Chunk ownership reassigned");
                            report.reassigned += 1;
                        }
                        RecordRepair::MarkDegraded { path, expected } => {
                            error!(%path, chunk_id = %expected.chunk_id, "No live copy left, chunk marked degraded");
                            report.degraded += 1;
                        }
                    }
                }
            }
            Err(e) => error!(error = %e, "Could not apply chunk record repairs"),
        }
    }

    async fn top_up_replicas(
        &self,
        live: &BTreeMap<StorageNodeId, StorageNodeView>,
        report: &mut SweepReport,
    ) {
        let replication_factor = self.state.config.replication_factor;
        let wanted = replication_factor.min(live.len());
        let mut chunk_ids: Vec<String> = self.state.catalog.referenced_chunks().await.into_iter().collect();
        chunk_ids.sort();

        let plans: Vec<(String, StorageNodeView, Vec<StorageNodeView>)> = {
            let replicas = self.state.replicas.lock().await;
            chunk_ids
                .into_iter()
                .filter_map(|chunk_id| {
                    let holders = replicas.live_holders(&chunk_id, live);
                    if holders.is_empty() || holders.len() >= wanted {
                        return None;
                    }
                    let shortfall = DfsError::ReplicationShortfall {
                        chunk_id: chunk_id.clone(),
                        live: holders.len(),
                        target: replication_factor,
                    };
                    warn!(%shortfall, "Re-replicating chunk");
                    let (source, targets) =
                        self.selection_policy
                            .repair_pair(&holders, live, wanted - holders.len())?;
                    let source = live.get(&source)?.clone();
                    let targets = targets.iter().filter_map(|id| live.get(id).cloned()).collect();
                    Some((chunk_id, source, targets))
                })
                .collect()
        };

        let copies = plans.into_iter().map(|(chunk_id, source, targets)| async move {
            let result = self
                .state
                .storage_node_service
                .replicate_to(&source, &chunk_id, targets)
                .await;
            (chunk_id, source.id, result)
        });
        for (chunk_id, source, result) in join_all(copies).await {
            match result {
                Ok(replicated) => {
                    info!(%chunk_id, source, ?replicated, "Chunk re-replicated");
                    report.replicated += replicated.len();
                    self.state.replicas.lock().await.record(&chunk_id, replicated);
                }
                Err(e) => error!(%chunk_id, source, error = %e, "Re-replication failed"),
            }
        }
    }
}

/// Forgets clients that stopped pinging.
pub async fn sweep_client_sessions(state: &CoordinatorState, now: Instant) -> Vec<String> {
    let expired = state
        .sessions
        .lock()
        .await
        .sweep(now, state.config.client_timeout());
    for client_id in &expired {
        info!(%client_id, "Client session expired");
    }
    expired
}
