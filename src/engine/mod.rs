//! In-process stand-in for the execution engine primitives the pipelines
//! consume: `emit(key, value)`, a grouping barrier that hands each reduce
//! call every value of its key in one batch, and a one-time broadcast
//! side-load.

pub mod broadcast;
pub mod counters;

pub use broadcast::load_broadcast_file;
pub use counters::{Counter, Counters};

use crate::error::{ProcessingError, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub trait Emitter<K, V> {
    fn emit(&mut self, key: K, value: V);
}

/// Collects emitted pairs for one task.
#[derive(Debug)]
pub struct VecEmitter<K, V> {
    pairs: Vec<(K, V)>,
}

impl<K, V> VecEmitter<K, V> {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(K, V)> {
        self.pairs
    }
}

impl<K, V> Default for VecEmitter<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Emitter<K, V> for VecEmitter<K, V> {
    fn emit(&mut self, key: K, value: V) {
        self.pairs.push((key, value));
    }
}

/// The grouping barrier: every value of a key ends up in one batch.
pub fn group_by_key<K: Ord, V>(pairs: impl IntoIterator<Item = (K, V)>) -> BTreeMap<K, Vec<V>> {
    let mut groups: BTreeMap<K, Vec<V>> = BTreeMap::new();
    for (key, value) in pairs {
        groups.entry(key).or_default().push(value);
    }
    groups
}

/// A contiguous run of lines from one input file. Only the split that
/// starts at line 0 sees the file's header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSplit {
    pub source: Arc<str>,
    pub index: usize,
    pub first_line: usize,
    pub lines: Vec<String>,
}

impl InputSplit {
    pub fn has_header(&self) -> bool {
        self.first_line == 0
    }

    /// Cut file content into splits of at most `split_lines` lines.
    pub fn split_content(source: &str, content: &str, split_lines: usize) -> Vec<InputSplit> {
        let source: Arc<str> = Arc::from(source);
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let chunk = split_lines.max(1);
        lines
            .chunks(chunk)
            .enumerate()
            .map(|(index, chunk_lines)| InputSplit {
                source: source.clone(),
                index,
                first_line: index * chunk,
                lines: chunk_lines.to_vec(),
            })
            .collect()
    }
}

pub trait MapTask: Sync {
    type Input: Sync;
    type Key: Ord + Send;
    type Value: Send;

    fn map(
        &self,
        input: &Self::Input,
        out: &mut dyn Emitter<Self::Key, Self::Value>,
        counters: &mut Counters,
    ) -> Result<()>;
}

pub trait ReduceTask: Sync {
    type Key: Ord + Send;
    type Value: Send;
    type Output: Send;

    /// `values` is the complete batch for `key`, in no particular order.
    fn reduce(
        &self,
        key: &Self::Key,
        values: Vec<Self::Value>,
        out: &mut Vec<Self::Output>,
        counters: &mut Counters,
    ) -> Result<()>;
}

#[derive(Debug)]
pub struct JobOutput<O> {
    /// Reduce output in key order
    pub records: Vec<O>,
    pub counters: Counters,
}

/// Runs one map → group → reduce round on a rayon pool.
pub struct LocalEngine {
    max_workers: usize,
}

impl LocalEngine {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn run<M, R>(&self, inputs: &[M::Input], mapper: &M, reducer: &R) -> Result<JobOutput<R::Output>>
    where
        M: MapTask,
        R: ReduceTask<Key = M::Key, Value = M::Value>,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        pool.install(|| {
            let mapped: Vec<(Vec<(M::Key, M::Value)>, Counters)> = inputs
                .par_iter()
                .map(|input| {
                    let mut emitter = VecEmitter::new();
                    let mut counters = Counters::new();
                    mapper.map(input, &mut emitter, &mut counters)?;
                    Ok((emitter.into_pairs(), counters))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut counters = Counters::new();
            let mut pairs = Vec::new();
            for (task_pairs, task_counters) in mapped {
                counters.merge(task_counters);
                pairs.extend(task_pairs);
            }
            let emitted = pairs.len();

            let groups: Vec<(M::Key, Vec<M::Value>)> = group_by_key(pairs).into_iter().collect();
            debug!(inputs = inputs.len(), emitted, groups = groups.len(), "grouping complete");

            let reduced: Vec<(Vec<R::Output>, Counters)> = groups
                .into_par_iter()
                .map(|(key, values)| {
                    let mut out = Vec::new();
                    let mut task_counters = Counters::new();
                    reducer.reduce(&key, values, &mut out, &mut task_counters)?;
                    Ok((out, task_counters))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut records = Vec::new();
            for (out, task_counters) in reduced {
                counters.merge(task_counters);
                records.extend(out);
            }

            Ok(JobOutput { records, counters })
        })
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WordMapper;

    impl MapTask for WordMapper {
        type Input = String;
        type Key = String;
        type Value = u32;

        fn map(&self, input: &String, out: &mut dyn Emitter<String, u32>, _: &mut Counters) -> Result<()> {
            for word in input.split_whitespace() {
                out.emit(word.to_string(), 1);
            }
            Ok(())
        }
    }

    struct SumReducer;

    impl ReduceTask for SumReducer {
        type Key = String;
        type Value = u32;
        type Output = (String, u32);

        fn reduce(
            &self,
            key: &String,
            values: Vec<u32>,
            out: &mut Vec<(String, u32)>,
            counters: &mut Counters,
        ) -> Result<()> {
            counters.incr(Counter::JoinedRecordsEmitted);
            out.push((key.clone(), values.into_iter().sum()));
            Ok(())
        }
    }

    #[test]
    fn test_group_by_key_collects_all_values() {
        let groups = group_by_key(vec![("b", 1), ("a", 2), ("b", 3)]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["b"], vec![1, 3]);
    }

    #[test]
    fn test_engine_round() {
        let inputs = vec!["x y x".to_string(), "y z".to_string()];
        let output = LocalEngine::new(2).run(&inputs, &WordMapper, &SumReducer).unwrap();
        assert_eq!(
            output.records,
            vec![("x".to_string(), 2), ("y".to_string(), 2), ("z".to_string(), 1)]
        );
        assert_eq!(output.counters.get(Counter::JoinedRecordsEmitted), 3);
    }

    #[test]
    fn test_split_content() {
        let splits = InputSplit::split_content("f.csv", "h\n1\n2\n3\n4", 2);
        assert_eq!(splits.len(), 3);
        assert!(splits[0].has_header());
        assert!(!splits[1].has_header());
        assert_eq!(splits[1].first_line, 2);
        assert_eq!(splits[2].lines, vec!["4".to_string()]);
    }
}
