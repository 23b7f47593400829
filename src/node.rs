//! Node orchestration: lifecycle state, topic channels and block production.
//!
//! Transport is in-process: [`Topics`] holds one broadcast channel per gossip
//! topic, and every node sharing a `Topics` value sees every message.

use crate::blockchain::{Block, Blockchain, Sha256Hash, SignedBlock, ValidationPolicy};
use crate::config::Config;
use crate::crypto::{sign_block, verify_block_signature, BlockSigner, KeyPair};
use crate::error::ChainError;
use crate::miner::{mine_block, CancelToken};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const BLOCK_TOPIC: &str = "blocks";
pub const TX_TOPIC: &str = "transactions";

/// Identifies a node on the topics: SHA-256 of its owner key.
pub type PeerId = Sha256Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Failed,
    Ready,
    Retrieving,
    Waiting,
    Building,
    Stopping,
}

impl NodeStatus {
    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        use NodeStatus::*;
        match (self, next) {
            (Stopping, _) => false,
            (_, Failed) => true,
            (Failed, Ready) => true,
            (Ready, Retrieving) | (Ready, Stopping) => true,
            (Retrieving, Waiting) | (Retrieving, Building) | (Retrieving, Stopping) => true,
            (Waiting, Retrieving) | (Waiting, Building) | (Waiting, Stopping) => true,
            (Building, Waiting) | (Building, Retrieving) | (Building, Stopping) => true,
            _ => false,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            NodeStatus::Failed => "failed",
            NodeStatus::Ready => "ready",
            NodeStatus::Retrieving => "retrieving blocks",
            NodeStatus::Waiting => "waiting for transaction",
            NodeStatus::Building => "building block",
            NodeStatus::Stopping => "stopping",
        };
        write!(f, "{}", s)
    }
}

/// Shared lifecycle state. Every change goes through [`NodeState::transition`].
#[derive(Debug)]
pub struct NodeState {
    status: RwLock<NodeStatus>,
}

impl NodeState {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(NodeStatus::Failed),
        }
    }

    pub async fn get(&self) -> NodeStatus {
        *self.status.read().await
    }

    pub async fn transition(&self, next: NodeStatus) -> Result<(), ChainError> {
        let mut status = self.status.write().await;
        if !status.can_transition_to(next) {
            return Err(ChainError::Node(format!(
                "invalid status transition: {} -> {}",
                *status, next
            )));
        }
        info!("Node status: {} -> {}", *status, next);
        *status = next;
        Ok(())
    }
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct GossipMessage {
    pub origin: PeerId,
    pub payload: Vec<u8>,
}

/// The two logical gossip channels.
#[derive(Debug, Clone)]
pub struct Topics {
    blocks: broadcast::Sender<GossipMessage>,
    transactions: broadcast::Sender<GossipMessage>,
}

impl Topics {
    /// Creates both topics, each buffering up to `capacity` messages.
    pub fn new(capacity: usize) -> Result<Self, ChainError> {
        if capacity == 0 {
            return Err(ChainError::Config(
                "topic capacity must be greater than 0".to_string(),
            ));
        }
        let (blocks, _) = broadcast::channel(capacity);
        let (transactions, _) = broadcast::channel(capacity);
        Ok(Self {
            blocks,
            transactions,
        })
    }

    fn sender(&self, topic: &str) -> Result<&broadcast::Sender<GossipMessage>, ChainError> {
        match topic {
            BLOCK_TOPIC => Ok(&self.blocks),
            TX_TOPIC => Ok(&self.transactions),
            other => Err(ChainError::Node(format!("unknown topic: {}", other))),
        }
    }

    /// Publishes `message` and returns how many subscribers received it.
    pub fn publish(&self, topic: &str, message: GossipMessage) -> Result<usize, ChainError> {
        // A send without subscribers is not an error for gossip.
        Ok(self.sender(topic)?.send(message).unwrap_or(0))
    }

    pub fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<GossipMessage>, ChainError> {
        Ok(self.sender(topic)?.subscribe())
    }
}

pub struct Node {
    config: Config,
    keypair: KeyPair,
    id: PeerId,
    policy: ValidationPolicy,
    chain: Arc<RwLock<Blockchain>>,
    state: Arc<NodeState>,
    topics: Topics,
    building: Mutex<Option<CancelToken>>,
    shutdown: watch::Sender<bool>,
}

impl Node {
    pub async fn new(
        config: Config,
        keypair: KeyPair,
        topics: Topics,
    ) -> Result<Arc<Self>, ChainError> {
        let id: PeerId = Sha256::digest(keypair.public_key_der()?).into();
        let policy = config.validation_policy();
        let (shutdown, _) = watch::channel(false);

        let node = Node {
            config,
            keypair,
            id,
            policy,
            chain: Arc::new(RwLock::new(Blockchain::new())),
            state: Arc::new(NodeState::new()),
            topics,
            building: Mutex::new(None),
            shutdown,
        };
        node.state.transition(NodeStatus::Ready).await?;
        info!(
            "Node {} ready (network_id = {})",
            hex::encode(&node.id[..8]),
            node.config.network.network_id
        );
        Ok(Arc::new(node))
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub async fn status(&self) -> NodeStatus {
        self.state.get().await
    }

    pub fn chain(&self) -> Arc<RwLock<Blockchain>> {
        self.chain.clone()
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Subscribes to both topics and spawns their readers.
    pub async fn start(self: &Arc<Self>) -> Result<Vec<JoinHandle<()>>, ChainError> {
        self.state.transition(NodeStatus::Retrieving).await?;

        let blocks = self.topics.subscribe(BLOCK_TOPIC)?;
        let transactions = self.topics.subscribe(TX_TOPIC)?;
        let handles = vec![
            tokio::spawn(self.clone().block_reader(blocks, self.shutdown.subscribe())),
            tokio::spawn(self.clone().tx_reader(transactions, self.shutdown.subscribe())),
        ];

        // Blocks are only learned from live gossip; nothing to fetch up front.
        self.state.transition(NodeStatus::Waiting).await?;
        Ok(handles)
    }

    pub async fn stop(&self) -> Result<(), ChainError> {
        self.state.transition(NodeStatus::Stopping).await?;
        self.stop_building();
        let _ = self.shutdown.send(true);
        Ok(())
    }

    /// Abandons the block currently being mined, if any.
    pub fn stop_building(&self) {
        if let Some(cancel) = self.building.lock().take() {
            cancel.cancel();
        }
    }

    /// Decodes, authenticates and appends a block received from a peer.
    pub async fn handle_incoming_block(&self, bytes: &[u8]) -> Result<(), ChainError> {
        let signed = SignedBlock::decode(bytes)?;
        verify_block_signature(&signed)?;

        self.chain.write().await.try_append(signed.block, &self.policy)?;
        info!("Accepted block {}", signed.block.hash_str());

        // Our candidate now extends a stale tip.
        self.stop_building();
        Ok(())
    }

    pub fn handle_incoming_transaction(&self, bytes: &[u8]) {
        warn!(
            "Dropping transaction payload of {} bytes: transaction decoding is not supported",
            bytes.len()
        );
    }

    /// Builds, signs, mines, appends and publishes a block on top of the current tip.
    pub async fn build_block(&self) -> Result<SignedBlock, ChainError> {
        self.state.transition(NodeStatus::Building).await?;
        let result = self.try_build_block().await;
        *self.building.lock() = None;

        if self.state.get().await == NodeStatus::Building {
            self.state.transition(NodeStatus::Waiting).await?;
        }
        result
    }

    /// Registers a fresh cancel token, then signs a candidate on the current tip.
    ///
    /// The token is stored before the tip is read, so a competing block
    /// accepted at any point afterwards cancels this candidate.
    async fn prepare_candidate(&self) -> Result<(SignedBlock, CancelToken), ChainError> {
        let cancel = CancelToken::new();
        *self.building.lock() = Some(cancel.clone());
        if self.state.get().await != NodeStatus::Building {
            // Stopped before the token was registered.
            cancel.cancel();
        }

        let prev = self.chain.read().await.tip_hash();
        // No transaction commitment yet: the root slot stays zeroed.
        let candidate = Block::new(prev, [0u8; 32]);

        // Owner is hashed, so stamp it before searching.
        let signed = sign_block(candidate, &self.keypair)?;
        Ok((signed, cancel))
    }

    async fn try_build_block(&self) -> Result<SignedBlock, ChainError> {
        let (signed, cancel) = self.prepare_candidate().await?;
        let block = mine_block(signed.block, self.config.miner.difficulty, cancel).await?;
        let signed = SignedBlock {
            block,
            signature: signed.signature,
        };

        self.chain.write().await.try_append(block, &self.policy)?;
        let receivers = self.topics.publish(
            BLOCK_TOPIC,
            GossipMessage {
                origin: self.id,
                payload: signed.encode().to_vec(),
            },
        )?;
        info!(
            "Built block {} (published to {} subscribers)",
            block.hash_str(),
            receivers
        );
        Ok(signed)
    }

    /// Keeps building blocks until the node stops.
    pub fn spawn_miner(self: &Arc<Self>) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            loop {
                if node.status().await == NodeStatus::Stopping {
                    break;
                }
                match node.build_block().await {
                    Ok(_) => {}
                    Err(ChainError::MiningCancelled) => {
                        debug!("Candidate abandoned, restarting on new tip");
                    }
                    Err(e) => {
                        if node.status().await == NodeStatus::Stopping {
                            break;
                        }
                        warn!("Block building failed: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        })
    }

    async fn block_reader(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<GossipMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let msg = tokio::select! {
                _ = shutdown.changed() => break,
                msg = rx.recv() => msg,
            };
            match msg {
                Ok(msg) if msg.origin == self.id => continue,
                Ok(msg) => {
                    if let Err(e) = self.handle_incoming_block(&msg.payload).await {
                        warn!("Rejected block from {}: {}", hex::encode(&msg.origin[..8]), e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Block reader lagged, {} messages skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Block reader stopped");
    }

    async fn tx_reader(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<GossipMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let msg = tokio::select! {
                _ = shutdown.changed() => break,
                msg = rx.recv() => msg,
            };
            match msg {
                Ok(msg) if msg.origin == self.id => continue,
                Ok(msg) => self.handle_incoming_transaction(&msg.payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Transaction reader lagged, {} messages skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Transaction reader stopped");
    }
}

/// Awaits every task, logging the ones that panicked or were aborted.
/// Returns how many ended abnormally.
pub async fn join_tasks(handles: Vec<JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Node task ended abnormally: {}", e);
            failed += 1;
        }
    }
    failed
}
