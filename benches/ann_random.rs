//! ANN benchmark: random unit vectors, angular metric.
//! Measures Recall@10 and QPS against brute-force ground truth.
//!
//! Usage: cargo bench --bench ann_random

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rpforest::{Angular, ForestIndex, Metric};

const N_ITEMS: i32 = 20_000;
const DIMENSION: usize = 32;
const N_QUERIES: usize = 200;
const K: usize = 10;
const TREES: usize = 20;

fn random_unit_vector(rng: &mut StdRng, dimension: usize) -> Vec<f32> {
    let mut v: Vec<f32> = (0..dimension).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in &mut v {
        *x /= norm;
    }
    v
}

/// Exact top-k by linear scan, ties broken by id like the index does.
fn ground_truth(items: &[Vec<f32>], query: &[f32], k: usize) -> Vec<i32> {
    let mut scored: Vec<(f32, i32)> = items
        .iter()
        .enumerate()
        .map(|(i, v)| (Angular::distance(query, v), i as i32))
        .collect();
    scored.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(k).map(|(_, i)| i).collect()
}

fn main() {
    let mut rng = StdRng::seed_from_u64(12345);

    println!("generating {N_ITEMS} random unit vectors (dim {DIMENSION})...");
    let items: Vec<Vec<f32>> = (0..N_ITEMS)
        .map(|_| random_unit_vector(&mut rng, DIMENSION))
        .collect();
    let queries: Vec<Vec<f32>> = (0..N_QUERIES)
        .map(|_| random_unit_vector(&mut rng, DIMENSION))
        .collect();

    let mut index = ForestIndex::<Angular>::new(DIMENSION);
    index.set_seed(42);
    for (i, v) in items.iter().enumerate() {
        index.add_item(i as i32, v).unwrap();
    }

    let start = Instant::now();
    index.build(Some(TREES)).unwrap();
    println!(
        "built {TREES} trees over {N_ITEMS} items in {:.2}s ({} nodes)",
        start.elapsed().as_secs_f64(),
        index.n_nodes()
    );

    println!("computing brute-force ground truth for {N_QUERIES} queries...");
    let truth: Vec<Vec<i32>> = queries.iter().map(|q| ground_truth(&items, q, K)).collect();

    for search_k in [K * TREES, K * TREES * 5, K * TREES * 25] {
        let start = Instant::now();
        let mut hits = 0usize;
        for (q, expected) in queries.iter().zip(&truth) {
            let found = index.get_nns_by_vector(q, K, Some(search_k));
            hits += found
                .iter()
                .filter(|&&(id, _)| expected.contains(&id))
                .count();
        }
        let elapsed = start.elapsed().as_secs_f64();
        let recall = hits as f64 / (N_QUERIES * K) as f64;
        let qps = N_QUERIES as f64 / elapsed;
        println!("search_k={search_k:>6}  recall@{K}={recall:.4}  qps={qps:.0}");
    }
}
