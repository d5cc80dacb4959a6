//! Brute-force matching of query documents against a candidate set.
//!
//! Every query embedding is scored against every candidate embedding. The
//! best `limit` candidates are kept with a bounded max-heap keyed by
//! `(rank_key, candidate position)`, so ties keep the candidates' original
//! order. All results of a traversal path are computed before any query
//! document is modified: a failing run leaves the queries untouched.

/// Metric implementations.
pub mod distance;
/// Parameter parsing, merging and resolution.
pub mod params;
/// Structural projections over chunks and matches.
pub mod traversal;

pub use distance::Metric;
pub use params::{MatchArgs, MatchSettings};
pub use traversal::TraversalPath;

use crate::document::{Document, Embedding};
use crate::error::{IndexError, Result};
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// Outcome counters of one [`Matcher::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Query documents that received a fresh match list.
    pub matched: usize,
    /// Query documents skipped for lack of an embedding.
    pub skipped: usize,
}

/// Scoring view of one candidate: its id and embedding.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub id: &'a str,
    pub embedding: Option<&'a Embedding>,
}

impl<'a> From<&'a Document> for Candidate<'a> {
    fn from(doc: &'a Document) -> Self {
        Self {
            id: &doc.id,
            embedding: doc.embedding.as_ref(),
        }
    }
}

pub struct Matcher<'s> {
    settings: &'s MatchSettings,
}

impl<'s> Matcher<'s> {
    pub fn new(settings: &'s MatchSettings) -> Self {
        Self { settings }
    }

    /// Replace the matches of every query document selected by the query
    /// paths with its top candidates from `candidates` (after candidate paths).
    ///
    /// Fails with `MissingEmbedding` or `ShapeMismatch` when a candidate cannot
    /// be compared with a query.
    pub fn run(&self, queries: &mut [Document], candidates: &[Document]) -> Result<MatchStats> {
        let pool = traversal::collect_all(candidates, &self.settings.candidate_paths);
        let views: Vec<Candidate<'_>> = pool.iter().map(|doc| Candidate::from(*doc)).collect();
        self.run_with(queries, &views, |pos| Ok(pool[pos].clone()))
    }

    /// [`Matcher::run`] over an already collected candidate pool.
    ///
    /// `resolve` loads the full document at a pool position. It is called for
    /// kept matches only, and never when `only_id` is set.
    pub fn run_with<F>(
        &self,
        queries: &mut [Document],
        pool: &[Candidate<'_>],
        resolve: F,
    ) -> Result<MatchStats>
    where
        F: Fn(usize) -> Result<Document>,
    {
        let mut stats = MatchStats::default();
        if queries.is_empty() {
            return Ok(stats);
        }

        for path in &self.settings.query_paths {
            let results = path
                .collect(queries)
                .into_iter()
                .map(|query| self.match_one(query, pool, &resolve))
                .collect::<Result<Vec<_>>>()?;

            let mut results = results.into_iter();
            path.visit_mut(queries, &mut |query| {
                if let Some(Some(matches)) = results.next() {
                    query.matches = matches;
                    stats.matched += 1;
                } else {
                    stats.skipped += 1;
                }
            });
        }
        Ok(stats)
    }

    /// Ranked matches of a single query. `None` when the query has no embedding.
    pub fn match_one<F>(
        &self,
        query: &Document,
        pool: &[Candidate<'_>],
        resolve: &F,
    ) -> Result<Option<Vec<Document>>>
    where
        F: Fn(usize) -> Result<Document>,
    {
        let Some(ranked) = self.rank(query, pool)? else {
            return Ok(None);
        };
        ranked
            .into_iter()
            .map(|(pos, score)| self.to_match(pos, pool[pos].id, score, resolve))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Pool positions of the best `limit` candidates with their scores, best first.
    fn rank(&self, query: &Document, pool: &[Candidate<'_>]) -> Result<Option<Vec<(usize, f32)>>> {
        let Some(query_embedding) = query.embedding.as_ref() else {
            tracing::warn!("search - query doc {} has no embedding, skipping it", query.id);
            return Ok(None);
        };
        let settings = self.settings;
        let k = settings
            .limit
            .map_or(pool.len(), |limit| limit.min(pool.len()));

        let mut heap: BinaryHeap<(OrderedFloat<f32>, usize)> = BinaryHeap::with_capacity(k + 1);
        let mut scores = Vec::with_capacity(pool.len());
        for (pos, candidate) in pool.iter().enumerate() {
            let embedding = comparable(query_embedding, candidate)?;
            if settings.exclude_self && candidate.id == query.id {
                scores.push(f32::NAN);
                continue;
            }
            let score = settings
                .metric
                .score(query_embedding.values(), embedding.values());
            scores.push(score);
            if k == 0 {
                continue;
            }
            heap.push((OrderedFloat(settings.metric.rank_key(score)), pos));
            if heap.len() > k {
                heap.pop();
            }
        }

        let ranked = heap.into_sorted_vec();
        let mut matched: Vec<(usize, f32)> =
            ranked.into_iter().map(|(_, pos)| (pos, scores[pos])).collect();
        if let Some(range) = settings.normalization {
            normalize(&mut matched, range);
        }
        Ok(Some(matched))
    }

    fn to_match<F>(&self, pos: usize, id: &str, score: f32, resolve: &F) -> Result<Document>
    where
        F: Fn(usize) -> Result<Document>,
    {
        let mut doc = if self.settings.only_id {
            Document::with_id(id)
        } else {
            let mut doc = resolve(pos)?;
            doc.matches.clear();
            doc.scores.clear();
            doc
        };
        doc.scores.insert(self.settings.metric_name.clone(), score);
        Ok(doc)
    }
}

/// The candidate's embedding, if it can be compared with `query`.
fn comparable<'a>(query: &Embedding, candidate: &Candidate<'a>) -> Result<&'a Embedding> {
    let embedding = candidate
        .embedding
        .ok_or_else(|| IndexError::MissingEmbedding {
            id: candidate.id.to_string(),
        })?;
    if embedding.shape() != query.shape() {
        return Err(IndexError::ShapeMismatch {
            id: candidate.id.to_string(),
            expected: query.shape().clone(),
            found: embedding.shape().clone(),
        });
    }
    Ok(embedding)
}

/// Min-max rescale scores into `[a, b]`, keeping the ranking order.
fn normalize(matched: &mut [(usize, f32)], (a, b): (f32, f32)) {
    let Some(min) = matched.iter().map(|m| m.1).reduce(f32::min) else {
        return;
    };
    let max = matched.iter().map(|m| m.1).fold(min, f32::max);
    let range = max - min;
    for m in matched.iter_mut() {
        m.1 = if range < f32::EPSILON {
            a
        } else {
            a + (m.1 - min) * (b - a) / range
        };
    }
}
