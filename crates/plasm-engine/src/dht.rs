//! The DHT capability: the narrow surface the engine consumes.
//!
//! The chain commit path produces put requests into a bounded channel; one
//! background handler per instance consumes them. The DHT holds a chain
//! back-reference for reads, never the instance. A synchronous drain exists
//! for the test harness.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use plasm_chain::Chain;
use plasm_core::Hash;

use crate::error::EngineError;

/// Capacity of the put-request queue.
const PUT_QUEUE_BOUND: usize = 1024;

/// Name of the DHT persistence sidecar.
pub const DHT_STORE_FILE_NAME: &str = "dht.dat";

/// A request to publish one committed entry.
#[derive(Debug, Clone)]
pub struct PutReq {
    pub entry_hash: Hash,
    pub header_hash: Hash,
}

/// The local face of the distributed hash table.
pub struct Dht {
    chain: Arc<RwLock<Chain>>,
    tx: RwLock<Option<Sender<PutReq>>>,
    rx: Receiver<PutReq>,
    held: RwLock<HashSet<String>>,
    store_path: PathBuf,
    running: RwLock<bool>,
}

impl Dht {
    /// Create a fresh DHT bound to a chain for reads.
    pub fn new(chain: Arc<RwLock<Chain>>, dir: &Path) -> Self {
        let (tx, rx) = bounded(PUT_QUEUE_BOUND);
        Self {
            chain,
            tx: RwLock::new(Some(tx)),
            rx,
            held: RwLock::new(HashSet::new()),
            store_path: dir.join(DHT_STORE_FILE_NAME),
            running: RwLock::new(false),
        }
    }

    /// Initialize after genesis: anchor the chain's DNA entry.
    pub fn setup(&self) -> Result<(), EngineError> {
        let anchor = {
            let chain = self.chain.read().unwrap();
            chain.header(0).map(|h| h.entry_link)
        };
        let anchor = anchor.ok_or(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no genesis entry to anchor",
        )))?;

        self.held.write().unwrap().insert(anchor.to_string());
        std::fs::write(&self.store_path, anchor.to_string())?;
        tracing::debug!(target: "plasm::dht", anchor = %anchor, "dht initialized");
        Ok(())
    }

    /// Start serving. Announcing to peers is the transport's concern; here
    /// it only flips the running flag.
    pub fn start(&self) -> Result<(), EngineError> {
        *self.running.write().unwrap() = true;
        tracing::info!(target: "plasm::dht", "dht started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.running.read().unwrap()
    }

    /// Enqueue a put request. Blocks if the queue is full; a closed DHT
    /// drops the request with a warning.
    pub fn enqueue_put(&self, req: PutReq) {
        let tx = self.tx.read().unwrap().clone();
        match tx {
            Some(tx) => {
                if tx.send(req).is_err() {
                    tracing::warn!(target: "plasm::dht", "put queue disconnected");
                }
            }
            None => tracing::warn!(target: "plasm::dht", "put request after dht close"),
        }
    }

    /// Long-running handler: consume put requests until the DHT closes.
    pub fn handle_put_reqs(&self) {
        while let Ok(req) = self.rx.recv() {
            self.handle_put(req);
        }
    }

    /// Spawn the handler on a background thread.
    pub fn spawn_put_handler(self: Arc<Self>) -> JoinHandle<()> {
        std::thread::spawn(move || self.handle_put_reqs())
    }

    /// Synchronously drain the queue; returns how many requests were
    /// handled. For tests.
    pub fn sim_handle_put_reqs(&self) -> usize {
        let mut handled = 0;
        loop {
            match self.rx.try_recv() {
                Ok(req) => {
                    self.handle_put(req);
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return handled,
            }
        }
    }

    /// Whether this node holds the given hash.
    pub fn holds(&self, hash: &Hash) -> bool {
        self.held.read().unwrap().contains(&hash.to_string())
    }

    /// Close the producer side; the handler exits once drained.
    pub fn close(&self) {
        self.tx.write().unwrap().take();
    }

    /// Remove the persistence sidecar (after close).
    pub fn remove_store(&self) -> Result<(), EngineError> {
        match std::fs::remove_file(&self.store_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn handle_put(&self, req: PutReq) {
        let mut held = self.held.write().unwrap();
        held.insert(req.entry_hash.to_string());
        tracing::debug!(
            target: "plasm::dht",
            entry = %req.entry_hash,
            header = %req.header_hash,
            "handled put",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasm_core::{Entry, HashSpec, Keypair};

    fn chain_with_one_entry(dir: &Path) -> Arc<RwLock<Chain>> {
        let spec = HashSpec::from_name("sha2-256").unwrap();
        let mut chain = Chain::open(spec, dir.join("chain.dat")).unwrap();
        let keypair = Keypair::from_seed(&[5; 32]);
        let entry = Entry::App("anchor".to_string());
        let (len, hash, header) = chain
            .prepare_header(1000, "someType", &entry, &keypair)
            .unwrap();
        chain.add_entry(len, hash, header, entry).unwrap();
        Arc::new(RwLock::new(chain))
    }

    #[test]
    fn test_setup_anchors_first_entry() {
        let dir = tempfile::tempdir().unwrap();
        let chain = chain_with_one_entry(dir.path());
        let anchor = chain.read().unwrap().header(0).unwrap().entry_link;

        let dht = Dht::new(chain, dir.path());
        dht.setup().unwrap();

        assert!(dht.holds(&anchor));
        assert!(dir.path().join(DHT_STORE_FILE_NAME).exists());
    }

    #[test]
    fn test_sim_drain() {
        let dir = tempfile::tempdir().unwrap();
        let chain = chain_with_one_entry(dir.path());
        let spec = HashSpec::from_name("sha2-256").unwrap();
        let entry_hash = Entry::App("x".to_string()).hash(&spec).unwrap();

        let dht = Dht::new(chain, dir.path());
        dht.enqueue_put(PutReq {
            entry_hash,
            header_hash: Hash::null(),
        });

        assert_eq!(dht.sim_handle_put_reqs(), 1);
        assert!(dht.holds(&entry_hash));
        assert_eq!(dht.sim_handle_put_reqs(), 0);
    }

    #[test]
    fn test_background_handler_exits_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let chain = chain_with_one_entry(dir.path());
        let spec = HashSpec::from_name("sha2-256").unwrap();
        let entry_hash = Entry::App("y".to_string()).hash(&spec).unwrap();

        let dht = Arc::new(Dht::new(chain, dir.path()));
        let handle = Arc::clone(&dht).spawn_put_handler();

        dht.enqueue_put(PutReq {
            entry_hash,
            header_hash: Hash::null(),
        });
        dht.close();
        handle.join().unwrap();

        assert!(dht.holds(&entry_hash));
    }
}
