//! Incremental synchronization between the corpus directory and the
//! vector store.
//!
//! Each run diffs the current file set against the durable snapshot,
//! deletes vectors for vanished or changed files, processes only
//! new/changed documents, and persists the updated snapshot atomically.
//! Per-item failures (one document, one upsert batch) are isolated and
//! never abort the run.
//!
//! Known gap, accepted by design: chunk IDs are recorded in the snapshot
//! before their batches are upserted, so a crash mid-run (or a skipped
//! failed batch) can leave the snapshot over-reporting IDs. The mtime diff
//! will not re-clean those, and no reconciliation sweep runs.

use std::path::Path;
use std::time::{Instant, UNIX_EPOCH};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use nlp_core::ParseProvider;
use rag_store::{DocPayload, DocPoint, Embedder, VectorIndex};
use tracing::{error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::IndexerConfig;
use crate::chunker::{self, Chunk};
use crate::convert;
use crate::errors::IndexError;
use crate::score::{SCORE_THRESHOLD, score_with};
use crate::state::{FileEntry, IndexState, load_state, persist_state};

/// How many chunks are scored concurrently against the parse engine.
const SCORE_CONCURRENCY: usize = 8;

/// Summary of one indexing run.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Files converted and chunked this run.
    pub processed_files: usize,
    /// Files whose vectors were deleted because they vanished.
    pub deleted_files: usize,
    /// Points successfully upserted.
    pub upserted_points: usize,
    /// Upsert batches that failed and were skipped.
    pub failed_batches: usize,
}

/// Runs one synchronization pass.
///
/// # Errors
/// Only run-fatal conditions propagate: unreadable/corrupt state file,
/// collection management failures, and embedding failures. Per-document
/// and per-batch failures are logged and skipped.
pub async fn run_sync(
    cfg: &IndexerConfig,
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    parser: &dyn ParseProvider,
) -> Result<SyncOutcome, IndexError> {
    let total_start = Instant::now();
    let state_path = cfg.state_path();
    let mut outcome = SyncOutcome::default();

    // 1. Load the previous snapshot. An existing collection without a
    // snapshot cannot be reconciled, so the collection is reset.
    let prev: IndexState = match load_state(&state_path)? {
        Some(state) => state,
        None => {
            if index.exists().await? {
                info!("no state snapshot found, resetting collection");
                index.reset_collection().await?;
            }
            IndexState::new()
        }
    };

    // 2. Enumerate current corpus files and mtimes.
    let current = scan_corpus(&cfg.corpus_dir)?;

    // 3. The collection must exist before deletes/upserts.
    index.ensure_collection().await?;

    // 4. Vanished files: drop their vectors. Changed files: drop the stale
    // vectors their previous version produced, so the snapshot and the
    // store stay in exact correspondence per source.
    let mut had_deletions = false;
    for (path, entry) in &prev {
        let vanished = !current.iter().any(|(p, _)| p == path);
        let changed = current
            .iter()
            .any(|(p, mtime)| p == path && *mtime != entry.mtime);
        if (vanished || changed) && !entry.chunk_ids.is_empty() {
            info!(count = entry.chunk_ids.len(), %path, vanished, "deleting chunks");
            index.delete_ids(&entry.chunk_ids).await?;
            had_deletions = true;
        }
        if vanished {
            outcome.deleted_files += 1;
        }
    }

    // Carry unchanged entries over verbatim; new/changed files start empty.
    let mut new_state = IndexState::new();
    for (path, mtime) in &current {
        match prev.get(path) {
            Some(entry) if entry.mtime == *mtime => {
                new_state.insert(path.clone(), entry.clone());
            }
            _ => {
                new_state.insert(
                    path.clone(),
                    FileEntry {
                        mtime: *mtime,
                        chunk_ids: Vec::new(),
                    },
                );
            }
        }
    }

    // Empty corpus still persists an empty snapshot: "indexed empty" is
    // different from "never indexed".
    if current.is_empty() {
        info!("no files to process");
        persist_state(&state_path, &new_state)?;
        return Ok(outcome);
    }

    let to_process: Vec<String> = current
        .iter()
        .filter(|(path, mtime)| prev.get(path).map(|e| e.mtime) != Some(*mtime))
        .map(|(path, _)| path.clone())
        .collect();

    if to_process.is_empty() {
        if had_deletions {
            persist_state(&state_path, &new_state)?;
        } else {
            info!("no changes detected");
        }
        return Ok(outcome);
    }

    // 5./6. Convert, chunk, score, filter.
    let chunks = process_files(cfg, &to_process, parser, &mut outcome).await;
    if chunks.is_empty() {
        info!("no new/changed data survived filtering");
        persist_state(&state_path, &new_state)?;
        return Ok(outcome);
    }
    log_chunk_stats(&chunks);

    // 7. Embed surviving chunks (batched inside the embedder).
    let embed_start = Instant::now();
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;
    info!(
        chunks = chunks.len(),
        elapsed_s = embed_start.elapsed().as_secs_f64(),
        "embedding generation complete"
    );

    // 8. Fresh IDs, recorded in the snapshot up front, then batched upserts.
    let mut points = Vec::with_capacity(chunks.len());
    for (chunk, vector) in chunks.into_iter().zip(vectors) {
        let id = Uuid::new_v4().to_string();
        if let Some(entry) = new_state.get_mut(&chunk.source) {
            entry.chunk_ids.push(id.clone());
        }
        points.push(DocPoint {
            id,
            vector,
            payload: DocPayload {
                source: chunk.source,
                section: chunk.section,
                content: chunk.text,
            },
        });
    }

    let batch_size = cfg.upsert_batch.max(1);
    let total_batches = points.len().div_ceil(batch_size);
    let pb = ProgressBar::new(total_batches as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap()
        .progress_chars("##-"),
    );

    for (i, batch) in points.chunks(batch_size).enumerate() {
        info!(
            "upserting batch {} of {} ({} points)",
            i + 1,
            total_batches,
            batch.len()
        );
        match index.upsert(batch.to_vec()).await {
            Ok(()) => outcome.upserted_points += batch.len(),
            Err(e) => {
                outcome.failed_batches += 1;
                error!(batch = i + 1, error = %e, "upsert failed, skipping batch");
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if outcome.failed_batches > 0 {
        warn!(
            "completed with {} failed batches out of {}",
            outcome.failed_batches, total_batches
        );
    }

    // 9. Persist the snapshot after all batches ran.
    persist_state(&state_path, &new_state)?;
    info!(
        upserted = outcome.upserted_points,
        elapsed_s = total_start.elapsed().as_secs_f64(),
        "index synchronization complete"
    );
    Ok(outcome)
}

/// Walks the corpus directory collecting supported files and their mtimes
/// (milliseconds), sorted by path for deterministic runs.
fn scan_corpus(corpus_dir: &Path) -> Result<Vec<(String, u64)>, IndexError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(corpus_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if !convert::is_supported(entry.path()) {
            continue;
        }
        let meta = entry.metadata().map_err(|e| {
            std::io::Error::other(format!("metadata for {:?}: {e}", entry.path()))
        })?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        files.push((entry.path().display().to_string(), mtime));
    }
    files.sort();
    Ok(files)
}

/// Converts, chunks, scores, and filters the given files. Failures on a
/// single document are logged and skipped.
async fn process_files(
    cfg: &IndexerConfig,
    paths: &[String],
    parser: &dyn ParseProvider,
    outcome: &mut SyncOutcome,
) -> Vec<Chunk> {
    let mut all_chunks = Vec::new();

    for path in paths {
        let markup = match convert::load_markup(Path::new(path), &cfg.cache_dir()) {
            Ok(m) => m,
            Err(e) => {
                error!(%path, error = %e, "conversion failed, skipping document");
                continue;
            }
        };

        let chunks = chunker::chunk_document(&markup, path).await;
        info!(count = chunks.len(), %path, "document chunked");
        all_chunks.extend(chunks);
        outcome.processed_files += 1;
    }

    let before = all_chunks.len();
    let scored: Vec<(Chunk, f32)> = stream::iter(all_chunks.into_iter())
        .map(|chunk| async move {
            let score = score_with(parser, &chunk.text).await;
            (chunk, score)
        })
        .buffered(SCORE_CONCURRENCY)
        .collect()
        .await;

    let kept: Vec<Chunk> = scored
        .into_iter()
        .filter(|(_, score)| *score >= SCORE_THRESHOLD)
        .map(|(chunk, _)| chunk)
        .collect();

    info!(
        filtered = before - kept.len(),
        kept = kept.len(),
        "low-score chunks discarded"
    );
    kept
}

fn log_chunk_stats(chunks: &[Chunk]) {
    let sizes: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
    let total: usize = sizes.iter().sum();
    let avg = total as f64 / sizes.len().max(1) as f64;
    info!(
        count = sizes.len(),
        avg_size = avg,
        min_size = sizes.iter().min().copied().unwrap_or(0),
        max_size = sizes.iter().max().copied().unwrap_or(0),
        "chunk statistics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nlp_core::{NlpError, ParsedDoc, SentSpan, Token};
    use rag_store::RagError;
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemIndex {
        points: Mutex<HashMap<String, DocPoint>>,
        collection_exists: Mutex<bool>,
        upsert_calls: AtomicUsize,
        delete_calls: AtomicUsize,
        resets: AtomicUsize,
    }

    impl MemIndex {
        fn ids_for_source(&self, source: &str) -> Vec<String> {
            let mut ids: Vec<String> = self
                .points
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.payload.source == source)
                .map(|p| p.id.clone())
                .collect();
            ids.sort();
            ids
        }
    }

    #[async_trait]
    impl VectorIndex for MemIndex {
        async fn exists(&self) -> Result<bool, RagError> {
            Ok(*self.collection_exists.lock().unwrap())
        }

        async fn ensure_collection(&self) -> Result<(), RagError> {
            *self.collection_exists.lock().unwrap() = true;
            Ok(())
        }

        async fn reset_collection(&self) -> Result<(), RagError> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            self.points.lock().unwrap().clear();
            *self.collection_exists.lock().unwrap() = true;
            Ok(())
        }

        async fn upsert(&self, points: Vec<DocPoint>) -> Result<(), RagError> {
            self.upsert_calls.fetch_add(1, Ordering::SeqCst);
            let mut map = self.points.lock().unwrap();
            for p in points {
                map.insert(p.id.clone(), p);
            }
            Ok(())
        }

        async fn delete_ids(&self, ids: &[String]) -> Result<(), RagError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            let mut map = self.points.lock().unwrap();
            for id in ids {
                map.remove(id);
            }
            Ok(())
        }

        async fn point_count(&self) -> Result<u64, RagError> {
            Ok(self.points.lock().unwrap().len() as u64)
        }
    }

    struct FakeEmbedder;

    impl Embedder for FakeEmbedder {
        fn embed<'a>(
            &'a self,
            _text: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>> {
            Box::pin(async { Ok(vec![0.5; 8]) })
        }

        fn embed_batch<'a>(
            &'a self,
            texts: &'a [String],
        ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>> {
            Box::pin(async move { Ok(texts.iter().map(|_| vec![0.5; 8]).collect()) })
        }
    }

    /// Parses whitespace words into alternating NOUN/VERB tokens and one
    /// sentence per period, which makes real prose score well above the
    /// discard threshold.
    struct FakeParser;

    impl ParseProvider for FakeParser {
        fn parse<'a>(
            &'a self,
            text: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<ParsedDoc, NlpError>> + Send + 'a>> {
            Box::pin(async move {
                let words: Vec<&str> = text.split_whitespace().collect();
                let tokens: Vec<Token> = words
                    .iter()
                    .enumerate()
                    .map(|(i, w)| Token {
                        text: w.to_string(),
                        lemma: w.to_lowercase(),
                        pos: if i % 2 == 0 { "NOUN" } else { "VERB" }.into(),
                        tag: String::new(),
                        dep: String::new(),
                        head: 0,
                        is_alpha: w.chars().all(|c| c.is_alphabetic()),
                        is_punct: false,
                    })
                    .collect();
                let sents = text.matches('.').count().max(1);
                let per = (tokens.len() / sents).max(1);
                let sentences = (0..sents)
                    .map(|i| SentSpan {
                        start: (i * per).min(tokens.len()),
                        end: ((i + 1) * per).min(tokens.len()),
                    })
                    .collect();
                Ok(ParsedDoc { tokens, sentences })
            })
        }
    }

    fn prose(reps: usize) -> String {
        "The quick brown fox jumps over the lazy dog near the riverbank today. "
            .repeat(reps)
            .trim_end()
            .to_string()
    }

    fn write_doc(dir: &Path, name: &str, sections: &[&str]) {
        let body: String = sections
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{} Section{}\n\n{}\n", if i == 0 { "\n#" } else { "\n##" }, i, s))
            .collect();
        std::fs::write(dir.join(name), format!("preamble{body}")).unwrap();
    }

    fn test_cfg(root: &Path) -> IndexerConfig {
        IndexerConfig {
            corpus_dir: root.join("corpus"),
            index_dir: root.join("index"),
            upsert_batch: 1000,
        }
    }

    #[tokio::test]
    async fn first_run_indexes_and_persists_consistent_state() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_cfg(tmp.path());
        std::fs::create_dir_all(&cfg.corpus_dir).unwrap();
        write_doc(&cfg.corpus_dir, "doc1.md", &[&prose(10)]);

        let index = MemIndex::default();
        let outcome = run_sync(&cfg, &index, &FakeEmbedder, &FakeParser)
            .await
            .unwrap();

        assert_eq!(outcome.processed_files, 1);
        assert!(outcome.upserted_points > 0);
        assert_eq!(outcome.failed_batches, 0);

        let state = load_state(&cfg.state_path()).unwrap().unwrap();
        assert_eq!(state.len(), 1);
        let (source, entry) = state.iter().next().unwrap();
        let mut recorded = entry.chunk_ids.clone();
        recorded.sort();
        assert_eq!(recorded, index.ids_for_source(source));
    }

    #[tokio::test]
    async fn second_run_with_no_changes_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_cfg(tmp.path());
        std::fs::create_dir_all(&cfg.corpus_dir).unwrap();
        write_doc(&cfg.corpus_dir, "doc1.md", &[&prose(10)]);

        let index = MemIndex::default();
        run_sync(&cfg, &index, &FakeEmbedder, &FakeParser)
            .await
            .unwrap();
        let upserts = index.upsert_calls.load(Ordering::SeqCst);
        let deletes = index.delete_calls.load(Ordering::SeqCst);

        let outcome = run_sync(&cfg, &index, &FakeEmbedder, &FakeParser)
            .await
            .unwrap();

        assert_eq!(outcome.upserted_points, 0);
        assert_eq!(index.upsert_calls.load(Ordering::SeqCst), upserts);
        assert_eq!(index.delete_calls.load(Ordering::SeqCst), deletes);
    }

    #[tokio::test]
    async fn deleting_a_file_removes_exactly_its_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_cfg(tmp.path());
        std::fs::create_dir_all(&cfg.corpus_dir).unwrap();
        write_doc(&cfg.corpus_dir, "keep.md", &[&prose(10)]);
        write_doc(&cfg.corpus_dir, "gone.md", &[&prose(10)]);

        let index = MemIndex::default();
        run_sync(&cfg, &index, &FakeEmbedder, &FakeParser)
            .await
            .unwrap();

        let keep_path = cfg.corpus_dir.join("keep.md").display().to_string();
        let kept_before = index.ids_for_source(&keep_path);
        assert!(!kept_before.is_empty());

        std::fs::remove_file(cfg.corpus_dir.join("gone.md")).unwrap();
        let outcome = run_sync(&cfg, &index, &FakeEmbedder, &FakeParser)
            .await
            .unwrap();

        assert_eq!(outcome.deleted_files, 1);
        assert_eq!(index.ids_for_source(&keep_path), kept_before);

        let state = load_state(&cfg.state_path()).unwrap().unwrap();
        assert_eq!(state.len(), 1);
        assert!(state.contains_key(&keep_path));
    }

    #[tokio::test]
    async fn changed_file_is_reindexed_and_old_chunks_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_cfg(tmp.path());
        std::fs::create_dir_all(&cfg.corpus_dir).unwrap();
        write_doc(&cfg.corpus_dir, "doc1.md", &[&prose(10)]);

        let index = MemIndex::default();
        run_sync(&cfg, &index, &FakeEmbedder, &FakeParser)
            .await
            .unwrap();
        let path = cfg.corpus_dir.join("doc1.md").display().to_string();
        let old_ids = index.ids_for_source(&path);

        // Ensure a distinct mtime, then rewrite with different content.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        write_doc(&cfg.corpus_dir, "doc1.md", &[&prose(14)]);

        run_sync(&cfg, &index, &FakeEmbedder, &FakeParser)
            .await
            .unwrap();

        let new_ids = index.ids_for_source(&path);
        assert!(!new_ids.is_empty());
        assert!(old_ids.iter().all(|id| !new_ids.contains(id)));

        let state = load_state(&cfg.state_path()).unwrap().unwrap();
        let mut recorded = state.get(&path).unwrap().chunk_ids.clone();
        recorded.sort();
        assert_eq!(recorded, new_ids);
    }

    #[tokio::test]
    async fn missing_state_with_existing_collection_resets() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_cfg(tmp.path());
        std::fs::create_dir_all(&cfg.corpus_dir).unwrap();

        let index = MemIndex::default();
        *index.collection_exists.lock().unwrap() = true;

        run_sync(&cfg, &index, &FakeEmbedder, &FakeParser)
            .await
            .unwrap();

        assert_eq!(index.resets.load(Ordering::SeqCst), 1);
        // Empty corpus still persists an empty snapshot.
        let state = load_state(&cfg.state_path()).unwrap().unwrap();
        assert!(state.is_empty());
    }
}
