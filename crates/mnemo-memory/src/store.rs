// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory store facade: single-writer write path, hybrid reads,
//! lifecycle management, and snapshot persistence.
//!
//! All writers serialize through the inner write lock so id assignment
//! never races; reads run concurrently and observe either the pre- or
//! post-write state, never a torn one (the atomic persistence layer
//! guarantees the on-disk equivalent). Disk I/O for a write runs
//! synchronously on the calling path.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use mnemo_config::MemoryConfig;
use mnemo_core::{
    ConversationTurn, EmbeddingBackend, MemoryEntry, MemoryHealth, MemoryMeta, MnemoError,
    StoreStats, WriteOutcome,
};
use mnemo_persist::{atomic_save_bytes, atomic_save_json, load_bytes_verified, load_json};

use crate::index::{IndexState, VectorIndex};
use crate::lexical::InvertedIndex;
use crate::lifecycle::ImportanceLedger;
use crate::retriever::{self, CacheEntry, CacheKey, ContextCache, Weights};

const CONVERSATION_FILE: &str = "conversation_history.json";
const METADATA_FILE: &str = "memory_metadata.json";
const VECTOR_FILE: &str = "vector_index.bin";

/// On-disk metadata snapshot, positionally aligned with the vector index.
///
/// Texts, per-item metadata, postings, and importance records travel in one
/// file so a single atomic write advances all of them together.
#[derive(Debug, Default, Deserialize)]
struct MetadataSnapshot {
    texts: Vec<String>,
    metadata: Vec<MemoryMeta>,
    inverted_index: InvertedIndex,
    #[serde(default)]
    importance: ImportanceLedger,
}

/// Borrowed serialization view of the snapshot.
#[derive(Serialize)]
struct MetadataSnapshotRef<'a> {
    texts: &'a [String],
    metadata: &'a [MemoryMeta],
    inverted_index: &'a InvertedIndex,
    importance: &'a ImportanceLedger,
}

/// Mutable store state behind the single writer lock.
struct StoreInner {
    conversation: Vec<ConversationTurn>,
    texts: Vec<String>,
    meta: Vec<MemoryMeta>,
    lexical: InvertedIndex,
    vectors: VectorIndex,
    ledger: ImportanceLedger,
    state: IndexState,
    health: MemoryHealth,
    last_write: Option<Instant>,
    writes_since_sweep: usize,
    /// Bumped by rebuilds and clear_all; guards reinforcement against
    /// renumbered ids.
    generation: u64,
    last_updated: Option<String>,
}

impl StoreInner {
    fn empty() -> Self {
        Self {
            conversation: Vec::new(),
            texts: Vec::new(),
            meta: Vec::new(),
            lexical: InvertedIndex::new(),
            vectors: VectorIndex::new(),
            ledger: ImportanceLedger::new(),
            state: IndexState::Uninitialized,
            health: MemoryHealth::Degraded,
            last_write: None,
            writes_since_sweep: 0,
            generation: 0,
            last_updated: None,
        }
    }

    fn reset_memory(&mut self) {
        self.texts.clear();
        self.meta.clear();
        self.lexical = InvertedIndex::new();
        self.vectors = VectorIndex::new();
        self.ledger = ImportanceLedger::new();
    }
}

/// Embedded hybrid memory store for one user's history.
///
/// Construct one explicit store per process and inject it into consumers;
/// there is no global instance. A store built with an embedding backend
/// runs hybrid retrieval; one built without runs lexical-only retrieval.
pub struct MemoryStore {
    config: MemoryConfig,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    inner: RwLock<StoreInner>,
    cache: Mutex<ContextCache>,
}

impl MemoryStore {
    /// Open (or create) the store rooted at `config.data_dir`.
    ///
    /// Missing or corrupt snapshots degrade to a fresh empty index; a
    /// misaligned vector/item pair is reset rather than served. Neither is
    /// fatal.
    pub fn open(
        config: MemoryConfig,
        embedder: Option<Arc<dyn EmbeddingBackend>>,
    ) -> Result<Self, MnemoError> {
        let mut inner = StoreInner::empty();
        inner.state = IndexState::Loading;

        let store = Self {
            cache: Mutex::new(ContextCache::new(config.cache_capacity)),
            config,
            embedder,
            inner: RwLock::new(StoreInner::empty()),
        };

        inner.conversation = match load_json::<Vec<ConversationTurn>>(&store.conversation_path()) {
            Ok(Some(turns)) => turns,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "conversation log unreadable, starting empty");
                Vec::new()
            }
        };

        let mut degraded = store.embedder.is_none();
        match load_json::<MetadataSnapshot>(&store.metadata_path()) {
            Ok(Some(snapshot)) => {
                degraded |= !store.install_snapshot(&mut inner, snapshot);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "metadata snapshot unreadable, starting with an empty index");
                degraded = true;
            }
        }

        inner.state = IndexState::Ready;
        inner.health = if degraded {
            MemoryHealth::Degraded
        } else {
            MemoryHealth::Healthy
        };
        info!(
            items = inner.texts.len(),
            turns = inner.conversation.len(),
            health = inner.health.as_str(),
            "memory store ready"
        );

        *store.write_inner() = inner;
        Ok(store)
    }

    /// Load a parsed snapshot into `inner`. Returns false when the snapshot
    /// had to be discarded for misalignment.
    fn install_snapshot(&self, inner: &mut StoreInner, snapshot: MetadataSnapshot) -> bool {
        let items = snapshot.texts.len();
        if snapshot.metadata.len() != items {
            warn!(
                texts = items,
                metadata = snapshot.metadata.len(),
                "metadata misaligned with texts, rebuilding empty"
            );
            return false;
        }

        let vectors = if self.embedder.is_some() {
            match load_bytes_verified(&self.vector_path()) {
                Ok(Some(bytes)) => match VectorIndex::from_bytes(&bytes) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        warn!(error = %e, "vector index blob corrupt");
                        None
                    }
                },
                Ok(None) => None,
                Err(e) => {
                    warn!(error = %e, "vector index blob unreadable");
                    None
                }
            }
        } else {
            None
        };

        if self.embedder.is_some() {
            // Misaligned ids must never be served; the whole index resets.
            // An absent blob aligns only with an empty snapshot.
            let aligned = match &vectors {
                Some(v) => v.len() == items,
                None => items == 0,
            };
            if !aligned {
                warn!(
                    items,
                    vectors = vectors.as_ref().map(|v| v.len()).unwrap_or(0),
                    "vector index misaligned with item count, rebuilding empty"
                );
                return false;
            }
            inner.vectors = vectors.unwrap_or_default();
        }

        inner.ledger = if snapshot.importance.len() == items {
            snapshot.importance
        } else {
            // Snapshots predating importance persistence: backfill defaults.
            let mut ledger = ImportanceLedger::new();
            let now = now_unix();
            for _ in 0..items {
                ledger.push_new(None, self.config.default_importance, now);
            }
            ledger
        };
        inner.texts = snapshot.texts;
        inner.meta = snapshot.metadata;
        inner.lexical = snapshot.inverted_index;
        true
    }

    /// Append a turn with the default importance.
    pub fn write(&self, text: &str, role: &str) -> Result<WriteOutcome, MnemoError> {
        self.write_with_importance(text, role, None, None)
    }

    /// Single entry point for new memory: rate gate, conversation append,
    /// dedup, then lock-step promotion into vector memory.
    ///
    /// `importance` is the upstream classifier's score (clamped to
    /// [0.1, 1.0]); `None` uses the configured default. The conversation
    /// log and vector memory have independent retention: a `Duplicate`
    /// outcome still grew the log.
    pub fn write_with_importance(
        &self,
        text: &str,
        role: &str,
        importance: Option<f64>,
        timestamp: Option<String>,
    ) -> Result<WriteOutcome, MnemoError> {
        let mut inner = self.write_inner();

        let interval = Duration::from_millis(self.config.write_interval_ms);
        if let Some(last) = inner.last_write {
            if last.elapsed() < interval {
                debug!("write rejected by rate limiter");
                return Ok(WriteOutcome::RateLimited);
            }
        }
        inner.last_write = Some(Instant::now());

        let timestamp = timestamp.unwrap_or_else(|| Utc::now().to_rfc3339());

        inner.conversation.push(ConversationTurn {
            role: role.to_string(),
            content: text.to_string(),
            timestamp: timestamp.clone(),
        });
        if let Err(e) = self.persist_conversation(&inner) {
            inner.conversation.pop();
            return Err(e);
        }
        // The recency tail changed even if promotion is skipped below.
        self.clear_cache();

        let hash = content_hash(text);
        let window = self.config.dedup_window;
        if inner.meta.iter().rev().take(window).any(|m| m.hash == hash) {
            debug!("duplicate within dedup window, promotion skipped");
            return Ok(WriteOutcome::Duplicate);
        }

        // Embed before touching the indexes so a failure needs no rollback.
        let vector = match &self.embedder {
            Some(backend) => match backend.embed(text) {
                Ok(v) => Some(v),
                Err(MnemoError::EmbeddingUnavailable(reason)) => {
                    warn!(%reason, "embedding unavailable, turn logged without promotion");
                    return Ok(WriteOutcome::Degraded);
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let id = inner.texts.len();
        inner.texts.push(text.to_string());
        inner.meta.push(MemoryMeta {
            timestamp: timestamp.clone(),
            role: role.to_string(),
            hash,
        });
        inner.lexical.index(text, id as u32);
        inner
            .ledger
            .push_new(importance, self.config.default_importance, now_unix());
        if let Some(v) = &vector {
            if let Err(e) = inner.vectors.add(v) {
                rollback_append(&mut inner, id, text);
                return Err(e);
            }
            if inner.vectors.len() != inner.texts.len() {
                rollback_append(&mut inner, id, text);
                return Err(MnemoError::Integrity(format!(
                    "vector count {} != item count {} after append",
                    inner.vectors.len(),
                    inner.texts.len()
                )));
            }
        }

        if let Err(e) = self.persist_snapshot(&inner) {
            rollback_append(&mut inner, id, text);
            return Err(e);
        }

        inner.last_updated = Some(timestamp);
        inner.writes_since_sweep += 1;
        self.clear_cache();
        debug!(id, role, "memory written");

        if inner.writes_since_sweep >= self.config.purge_interval {
            inner.writes_since_sweep = 0;
            self.run_sweep(&mut inner);
        }

        Ok(WriteOutcome::Stored(id))
    }

    /// Assemble a budget-bounded context block for a query.
    ///
    /// Never errors: embedding failures degrade the call to lexical+recency
    /// scoring. Identical `(query, k, max_chars)` calls may be served from
    /// the bounded cache, which every write invalidates. Returned memories
    /// are reinforced (cache hits included).
    pub fn get_context(&self, query: &str, k: usize, max_chars: usize) -> String {
        let key: CacheKey = (query.to_string(), k, max_chars);
        // The cache guard must drop before reinforcement takes the inner
        // lock: writers hold the inner lock while invalidating the cache,
        // so holding both here in the opposite order would deadlock.
        let cached = self.lock_cache().get(&key);
        if let Some(hit) = cached {
            self.reinforce(&hit.accepted, hit.generation);
            return hit.output;
        }

        let inner = self.read_inner();
        let generation = inner.generation;
        let tokens = retriever::query_tokens(query);

        let vector_hits = match &self.embedder {
            Some(backend) if !inner.vectors.is_empty() => match backend.embed(query) {
                Ok(q) => inner.vectors.search(&q, self.config.vector_oversample),
                Err(e) => {
                    warn!(error = %e, "query embedding failed, lexical-only for this call");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        let lexical_ids = inner.lexical.lookup(&tokens);
        let weights = Weights {
            vector: self.config.vector_weight,
            keyword: self.config.keyword_weight,
            recency: self.config.recency_weight,
        };
        let ranked = retriever::fuse(
            &vector_hits,
            &lexical_ids,
            &tokens,
            &inner.texts,
            |id| inner.ledger.is_purged(id),
            weights,
        );
        let timestamps: Vec<String> = inner.meta.iter().map(|m| m.timestamp.clone()).collect();
        let (entries, used, accepted) =
            retriever::fill_budget(&ranked, &inner.texts, &timestamps, k, max_chars);
        let tail = retriever::format_tail(
            &inner.conversation,
            self.config.recent_tail_turns,
            self.config.recent_tail_max_chars,
        );
        let output = retriever::compose(used, max_chars, &entries, &tail);
        drop(inner);

        self.reinforce(&accepted, generation);
        self.lock_cache().insert(
            key,
            CacheEntry {
                output: output.clone(),
                accepted,
                generation,
            },
        );
        output
    }

    /// Remove every memory whose text contains `keyword` (case-insensitive)
    /// via a full rebuild. The only operation that renumbers ids.
    pub fn delete_by_keyword(&self, keyword: &str) -> Result<usize, MnemoError> {
        let mut inner = self.write_inner();
        let needle = keyword.to_lowercase();
        let retained: Vec<usize> = inner
            .texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.to_lowercase().contains(&needle))
            .map(|(id, _)| id)
            .collect();
        let removed = inner.texts.len() - retained.len();
        if removed == 0 {
            return Ok(0);
        }
        self.rebuild(&mut inner, &retained)?;
        info!(removed, keyword, "memories deleted by keyword");
        Ok(removed)
    }

    /// Wipe conversation log and vector memory, persisting the empty state.
    pub fn clear_all(&self) -> Result<(), MnemoError> {
        let mut inner = self.write_inner();

        // Persist the empty state first so a failure leaves memory intact.
        let empty_turns: Vec<ConversationTurn> = Vec::new();
        atomic_save_json(&self.conversation_path(), &empty_turns)?;
        self.persist_parts(
            &VectorIndex::new(),
            &[],
            &[],
            &InvertedIndex::new(),
            &ImportanceLedger::new(),
        )?;

        inner.conversation.clear();
        inner.reset_memory();
        inner.generation += 1;
        inner.last_updated = None;
        inner.writes_since_sweep = 0;
        self.clear_cache();
        info!("memory store cleared");
        Ok(())
    }

    /// Store-level statistics.
    pub fn stats(&self) -> StoreStats {
        let inner = self.read_inner();
        let purged = inner.ledger.purged_count();
        StoreStats {
            total_memories: inner.texts.len(),
            active_memories: inner.texts.len() - purged,
            purged_memories: purged,
            health: inner.health,
            last_updated: inner.last_updated.clone(),
        }
    }

    /// The newest `limit` items joined with their importance records, for
    /// debug/viewer surfaces.
    pub fn entries(&self, limit: usize) -> Vec<MemoryEntry> {
        let inner = self.read_inner();
        let start = inner.texts.len().saturating_sub(limit);
        (start..inner.texts.len())
            .map(|id| {
                let record = inner.ledger.get(id);
                MemoryEntry {
                    id,
                    text: inner.texts[id].clone(),
                    role: inner.meta[id].role.clone(),
                    timestamp: inner.meta[id].timestamp.clone(),
                    score: record.map(|r| r.score).unwrap_or(0.0),
                    reference_count: record.map(|r| r.reference_count).unwrap_or(0),
                    purged: record.map(|r| r.purged).unwrap_or(false),
                }
            })
            .collect()
    }

    /// Full conversation log, oldest first.
    pub fn conversation(&self) -> Vec<ConversationTurn> {
        self.read_inner().conversation.clone()
    }

    /// Purge sweep plus, past the purged-fraction threshold, an automatic
    /// rebuild that physically reclaims purged vectors.
    fn run_sweep(&self, inner: &mut StoreInner) {
        let marked = inner.ledger.sweep(
            now_unix(),
            self.config.purge_threshold,
            self.config.decay_rate_per_day,
            self.config.decay_floor,
        );
        if marked == 0 {
            return;
        }
        // Purge flags ride this snapshot; a failure only delays them until
        // the next successful write.
        if let Err(e) = self.persist_snapshot(inner) {
            warn!(error = %e, "failed to persist purge flags");
        }
        self.clear_cache();

        if inner.texts.len() >= self.config.rebuild_min_items
            && inner.ledger.purged_fraction() >= self.config.rebuild_purged_fraction
        {
            let retained: Vec<usize> = (0..inner.texts.len())
                .filter(|id| !inner.ledger.is_purged(*id))
                .collect();
            if let Err(e) = self.rebuild(inner, &retained) {
                warn!(error = %e, "auto-rebuild after purge failed, purged vectors retained");
            }
        }
    }

    /// Full rebuild from the retained ids, in original relative order,
    /// re-embedding each text. Commits only after the candidate state is
    /// persisted; on failure the live state is untouched.
    fn rebuild(&self, inner: &mut StoreInner, retained: &[usize]) -> Result<(), MnemoError> {
        inner.state = IndexState::Rebuilding;
        let result = self.rebuild_inner(inner, retained);
        inner.state = IndexState::Ready;
        result
    }

    fn rebuild_inner(&self, inner: &mut StoreInner, retained: &[usize]) -> Result<(), MnemoError> {
        let mut texts = Vec::with_capacity(retained.len());
        let mut meta = Vec::with_capacity(retained.len());
        let mut lexical = InvertedIndex::new();
        let mut vectors = VectorIndex::new();

        for (new_id, old_id) in retained.iter().enumerate() {
            let text = inner.texts[*old_id].clone();
            if let Some(backend) = &self.embedder {
                let v = backend.embed(&text)?;
                vectors.add(&v)?;
            }
            lexical.index(&text, new_id as u32);
            texts.push(text);
            meta.push(inner.meta[*old_id].clone());
        }
        let ledger = inner.ledger.retain_ids(retained);

        self.persist_parts(&vectors, &texts, &meta, &lexical, &ledger)?;

        inner.texts = texts;
        inner.meta = meta;
        inner.lexical = lexical;
        inner.vectors = vectors;
        inner.ledger = ledger;
        inner.generation += 1;
        self.clear_cache();
        info!(retained = inner.texts.len(), "index rebuilt");
        Ok(())
    }

    /// Reinforce returned memories. Skipped entirely when a rebuild
    /// renumbered ids between the read and this call.
    fn reinforce(&self, ids: &[usize], generation: u64) {
        if ids.is_empty() {
            return;
        }
        let mut inner = self.write_inner();
        if inner.generation != generation {
            return;
        }
        let now = now_unix();
        for id in ids {
            inner.ledger.reinforce(*id, self.config.reinforce_boost, now);
        }
    }

    fn persist_conversation(&self, inner: &StoreInner) -> Result<(), MnemoError> {
        atomic_save_json(&self.conversation_path(), &inner.conversation)
    }

    fn persist_snapshot(&self, inner: &StoreInner) -> Result<(), MnemoError> {
        self.persist_parts(
            &inner.vectors,
            &inner.texts,
            &inner.meta,
            &inner.lexical,
            &inner.ledger,
        )
    }

    /// Persist the vector blob, then the metadata snapshot. If the second
    /// write fails the files disagree on disk; the startup alignment check
    /// catches that and resets rather than serving misaligned ids.
    fn persist_parts(
        &self,
        vectors: &VectorIndex,
        texts: &[String],
        meta: &[MemoryMeta],
        lexical: &InvertedIndex,
        ledger: &ImportanceLedger,
    ) -> Result<(), MnemoError> {
        if self.embedder.is_some() {
            atomic_save_bytes(&self.vector_path(), &vectors.to_bytes())?;
        }
        atomic_save_json(
            &self.metadata_path(),
            &MetadataSnapshotRef {
                texts,
                metadata: meta,
                inverted_index: lexical,
                importance: ledger,
            },
        )
    }

    fn conversation_path(&self) -> PathBuf {
        self.config.data_dir.join(CONVERSATION_FILE)
    }

    fn metadata_path(&self) -> PathBuf {
        self.config.data_dir.join(METADATA_FILE)
    }

    fn vector_path(&self) -> PathBuf {
        self.config.data_dir.join(VECTOR_FILE)
    }

    // Failed writes roll back via normal control flow, so a poisoned lock
    // still guards coherent state; recover instead of propagating the panic.
    fn read_inner(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_cache(&self) -> MutexGuard<'_, ContextCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_cache(&self) {
        self.lock_cache().clear();
    }
}

fn rollback_append(inner: &mut StoreInner, id: usize, text: &str) {
    inner.texts.truncate(id);
    inner.meta.truncate(id);
    inner.lexical.remove(text, id as u32);
    inner.ledger.truncate(id);
    inner.vectors.truncate(id);
}

/// Hash of the normalized text (lowercased, whitespace stripped) used by
/// the dedup window.
fn content_hash(text: &str) -> String {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
