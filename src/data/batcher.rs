// ============================================================
// Layer 4 — Adaptive (Token-Budget) Batcher
// ============================================================
// Groups Examples into batches bounded by a TOKEN budget rather
// than an example count.
//
// Cost of a batch = longest side in the batch × number of examples,
// i.e. the size of the padded tensor the batch will become:
//
//   cost(batch) = max(len(src), len(trg) over batch) * len(batch)
//
// An example joins the current batch only if the cost stays <= B;
// otherwise the batch closes and the example opens the next one.
// A single example larger than B still forms its own batch.
//
// To keep padding low without sorting the whole corpus, examples
// are first cut into pools of ~pool_factor × B tokens, each pool is
// sorted by the sort key, and only then sliced into batches:
//
//   examples ──► pool (≤ 100·B) ──► sort ──► batches (≤ B) ──► …
//
// Train passes shuffle the examples (and the batches of each pool)
// with a seeded StdRng, so a pass is reproducible from its seed and
// differs across epochs when the seed does. Eval passes keep corpus
// order and are fully deterministic.
//
// Batches are produced lazily: only one pool is materialised at a
// time.

use std::collections::VecDeque;
use std::iter::Peekable;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::Example;

pub const DEFAULT_POOL_FACTOR: usize = 100;

/// Token budgets of the three pass kinds plus the shuffle seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub train_budget: usize,
    pub val_budget:   usize,
    pub bleu_budget:  usize,
    pub pool_factor:  usize,
    /// Train pass of epoch `e` shuffles with `seed + e`
    pub seed:         u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            train_budget: 1408,
            val_budget:   1280,
            bleu_budget:  512,
            pool_factor:  DEFAULT_POOL_FACTOR,
            seed:         42,
        }
    }
}

/// A raw batch borrows its examples from the corpus.
pub type RawBatch<'a> = Vec<&'a Example>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pass {
    /// Shuffled, seeded ordering
    Train { seed: u64 },
    /// Corpus ordering
    Eval,
}

/// Padded token cost of a batch.
pub fn batch_cost<'a, I>(batch: I) -> usize
where
    I: IntoIterator<Item = &'a Example>,
{
    let mut acc = CostAccumulator::default();
    for ex in batch {
        acc.push(ex);
    }
    acc.cost()
}

#[derive(Debug, Default, Clone, Copy)]
struct CostAccumulator {
    count:   usize,
    longest: usize,
}

impl CostAccumulator {
    fn side(ex: &Example) -> usize {
        ex.source_len().max(ex.target_len())
    }

    fn cost(&self) -> usize {
        self.longest * self.count
    }

    fn cost_with(&self, ex: &Example) -> usize {
        self.longest.max(Self::side(ex)) * (self.count + 1)
    }

    fn push(&mut self, ex: &Example) {
        self.longest = self.longest.max(Self::side(ex));
        self.count  += 1;
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Greedy split of already-ordered examples under `budget`.
fn split_by_budget<'a>(items: Vec<&'a Example>, budget: usize) -> Vec<RawBatch<'a>> {
    let mut batches = Vec::new();
    let mut current: RawBatch<'a> = Vec::new();
    let mut acc     = CostAccumulator::default();

    for ex in items {
        if !acc.is_empty() && acc.cost_with(ex) > budget {
            batches.push(std::mem::take(&mut current));
            acc = CostAccumulator::default();
        }
        acc.push(ex);
        current.push(ex);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

// ─── AdaptiveBatcher ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AdaptiveBatcher<K> {
    budget:      usize,
    pool_factor: usize,
    sort_key:    K,
}

impl AdaptiveBatcher<fn(&Example) -> (usize, usize)> {
    /// Budget `budget` tokens per batch, sorted by `(len(src), len(trg))`.
    pub fn new(budget: usize) -> Self {
        Self {
            budget:      budget.max(1),
            pool_factor: DEFAULT_POOL_FACTOR,
            sort_key:    Example::length_key,
        }
    }
}

impl<K> AdaptiveBatcher<K> {
    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn with_pool_factor(mut self, pool_factor: usize) -> Self {
        self.pool_factor = pool_factor.max(1);
        self
    }

    pub fn with_sort_key<K2, O>(self, sort_key: K2) -> AdaptiveBatcher<K2>
    where
        K2: Fn(&Example) -> O,
        O: Ord,
    {
        AdaptiveBatcher {
            budget:      self.budget,
            pool_factor: self.pool_factor,
            sort_key,
        }
    }
}

impl<K, O> AdaptiveBatcher<K>
where
    K: Fn(&Example) -> O,
    O: Ord,
{
    /// Lazily iterate the batches of one pass over `examples`.
    pub fn batches<'a, I>(&'a self, examples: I, pass: Pass) -> Batches<'a, K>
    where
        I: IntoIterator<Item = &'a Example>,
        I::IntoIter: 'a,
    {
        let mut rng = match pass {
            Pass::Train { seed } => Some(StdRng::seed_from_u64(seed)),
            Pass::Eval => None,
        };

        let source: Box<dyn Iterator<Item = &'a Example> + 'a> = match rng.as_mut() {
            Some(rng) => {
                let mut all: Vec<&'a Example> = examples.into_iter().collect();
                all.shuffle(rng);
                Box::new(all.into_iter())
            }
            None => Box::new(examples.into_iter()),
        };

        Batches {
            batcher: self,
            source:  source.peekable(),
            ready:   VecDeque::new(),
            rng,
        }
    }

    /// Number of batches one pass would produce (for progress totals).
    pub fn count<'a, I>(&'a self, examples: I, pass: Pass) -> usize
    where
        I: IntoIterator<Item = &'a Example>,
        I::IntoIter: 'a,
    {
        self.batches(examples, pass).count()
    }
}

pub struct Batches<'a, K> {
    batcher: &'a AdaptiveBatcher<K>,
    source:  Peekable<Box<dyn Iterator<Item = &'a Example> + 'a>>,
    ready:   VecDeque<RawBatch<'a>>,
    rng:     Option<StdRng>,
}

impl<'a, K, O> Batches<'a, K>
where
    K: Fn(&Example) -> O,
    O: Ord,
{
    /// Pull the next pool from the source, sort it, and queue its
    /// batches. Returns false once the source is exhausted.
    fn fill_pool(&mut self) -> bool {
        let pool_budget = self.batcher.budget.saturating_mul(self.batcher.pool_factor);
        let mut pool: Vec<&'a Example> = Vec::new();
        let mut acc = CostAccumulator::default();

        while let Some(&ex) = self.source.peek() {
            if !acc.is_empty() && acc.cost_with(ex) > pool_budget {
                break;
            }
            acc.push(ex);
            pool.push(ex);
            self.source.next();
        }
        if pool.is_empty() {
            return false;
        }

        let key = &self.batcher.sort_key;
        pool.sort_by_key(|ex| key(*ex));

        let mut batches = split_by_budget(pool, self.batcher.budget);
        if let Some(rng) = self.rng.as_mut() {
            batches.shuffle(rng);
        }
        self.ready.extend(batches);
        true
    }
}

impl<'a, K, O> Iterator for Batches<'a, K>
where
    K: Fn(&Example) -> O,
    O: Ord,
{
    type Item = RawBatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(batch) = self.ready.pop_front() {
                return Some(batch);
            }
            if !self.fill_pool() {
                return None;
            }
        }
    }
}
