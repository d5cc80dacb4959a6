//! Brute-force match benchmark on synthetic embeddings.
//! Measures index throughput and search QPS per metric and backend.
//!
//! Usage: cargo bench --bench brute_force

use docindex_core::{Backend, Document, IndexerConfig, Parameters, SimpleIndexer};
use serde_json::json;
use std::time::Instant;

const STORE_SIZE: usize = 20_000;
const DIM: usize = 64;
const NUM_QUERIES: usize = 200;
const K: usize = 10;

/// Deterministic xorshift generator, values in [-1, 1).
struct Xorshift(u64);

impl Xorshift {
    fn next_f32(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        ((self.0 >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    }

    fn vector(&mut self, dim: usize) -> Vec<f32> {
        (0..dim).map(|_| self.next_f32()).collect()
    }
}

fn make_docs(rng: &mut Xorshift, prefix: &str, count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| Document::with_id(format!("{prefix}{i}")).embedding(rng.vector(DIM)))
        .collect()
}

fn main() {
    println!("=== Brute-force benchmark: {STORE_SIZE} x {DIM}d, {NUM_QUERIES} queries, k={K} ===");

    let mut rng = Xorshift(0x9E37_79B9_7F4A_7C15);
    let docs = make_docs(&mut rng, "d", STORE_SIZE);
    let queries = make_docs(&mut rng, "q", NUM_QUERIES);

    for backend in [Backend::Memory, Backend::Memmap, Backend::Table] {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let mut config = IndexerConfig::new(dir.path()).with_backend(backend);
        config.sync_writes = false;
        let mut indexer = SimpleIndexer::new(config).expect("open indexer");

        println!();
        println!("--- Backend: {backend} ---");
        let t0 = Instant::now();
        indexer.index(docs.clone()).expect("index");
        let build_time = t0.elapsed();
        println!(
            "  Index time: {:.2}s ({:.0} docs/s)",
            build_time.as_secs_f64(),
            STORE_SIZE as f64 / build_time.as_secs_f64()
        );

        println!("  metric      |    QPS    | Avg latency");
        println!("  ------------+-----------+------------");
        for metric in ["cosine", "euclidean", "sqeuclidean", "dot"] {
            let params: Parameters = match json!({ "metric": metric, "limit": K }) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            };

            // Warm up
            let mut warm = queries[..5].to_vec();
            indexer.search(&mut warm, Some(&params)).expect("search");

            let mut batch = queries.clone();
            let t0 = Instant::now();
            indexer.search(&mut batch, Some(&params)).expect("search");
            let elapsed = t0.elapsed();

            assert!(batch.iter().all(|q| q.matches.len() == K));
            let qps = NUM_QUERIES as f64 / elapsed.as_secs_f64();
            let avg_latency_us = elapsed.as_micros() as f64 / NUM_QUERIES as f64;
            println!("  {:<11} | {:>9.1} | {:.0} us", metric, qps, avg_latency_us);
        }
    }

    println!();
    println!("=== Benchmark complete ===");
}
