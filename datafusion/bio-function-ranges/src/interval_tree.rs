use coitrees::{COITree, Interval, IntervalTree};
use datafusion::arrow::array::RecordBatch;
use datafusion::common::Result;
use fnv::FnvHashMap;

use crate::array_utils::{ColTriple, get_coordinate_arrays};
use crate::filter_op::FilterOp;

/// Row offset into the batch the index was built from.
pub type Position = usize;

/// Per-contig interval trees over the rows of one [`RecordBatch`].
///
/// Queries report every indexed interval that contains the probe interval,
/// as a row offset into the indexed batch.
pub struct ContainmentIndex {
    trees: FnvHashMap<String, COITree<Position, u32>>,
    len: usize,
}

impl std::fmt::Debug for ContainmentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainmentIndex")
            .field("contigs", &self.trees.len())
            .field("size", &self.len)
            .finish()
    }
}

impl ContainmentIndex {
    /// Index every row of `batch` with non-null coordinates.
    pub fn from_batch(batch: &RecordBatch, columns: &ColTriple) -> Result<Self> {
        let arrays = get_coordinate_arrays(batch, columns)?;
        let mut nodes = FnvHashMap::<String, Vec<Interval<Position>>>::default();
        let mut len = 0;

        for i in 0..batch.num_rows() {
            if let Some((contig, start, end)) = arrays.row(i)? {
                nodes
                    .entry(contig.to_string())
                    .or_default()
                    .push(Interval::new(start, end, i));
                len += 1;
            }
        }

        let trees = nodes
            .into_iter()
            .map(|(contig, intervals)| (contig, COITree::new(&intervals)))
            .collect();

        Ok(Self { trees, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Calls `visit` with the row of every indexed interval on `contig` that
    /// contains `[start, end]` under `filter_op`.
    ///
    /// A containing interval always overlaps the probe, so the tree overlap
    /// query yields a superset that is narrowed here.
    pub fn for_each_container<F>(
        &self,
        contig: &str,
        start: i32,
        end: i32,
        filter_op: FilterOp,
        mut visit: F,
    ) where
        F: FnMut(Position),
    {
        let Some(tree) = self.trees.get(contig) else {
            return;
        };
        tree.query(start, end, |node| {
            let (first, last, position) = node_bounds(node);
            if filter_op.contains(first, last, start, end) {
                visit(position);
            }
        });
    }

    /// Rows of all intervals containing `[start, end]`, in ascending order.
    pub fn containers(
        &self,
        contig: &str,
        start: i32,
        end: i32,
        filter_op: FilterOp,
    ) -> Vec<Position> {
        let mut out = Vec::new();
        self.for_each_container(contig, start, end, filter_op, |p| out.push(p));
        out.sort_unstable();
        out
    }
}

// The query callback's node type depends on the SIMD backend COITree picks.

/// x86_64 without AVX: COITree hands out `IntervalNode`.
#[cfg(any(
    all(
        target_os = "linux",
        target_arch = "x86_64",
        not(target_feature = "avx")
    ),
    all(
        target_os = "macos",
        target_arch = "x86_64",
        not(target_feature = "avx")
    ),
    all(
        target_os = "windows",
        target_arch = "x86_64",
        not(target_feature = "avx")
    ),
))]
fn node_bounds(node: &coitrees::IntervalNode<Position, u32>) -> (i32, i32, Position) {
    (node.first, node.last, node.metadata)
}

/// aarch64 and x86_64 with AVX: COITree hands out `Interval<&T>`.
#[cfg(any(
    all(target_os = "macos", target_arch = "aarch64"),
    all(target_os = "macos", target_arch = "x86_64", target_feature = "avx"),
    all(target_os = "linux", target_arch = "x86_64", target_feature = "avx"),
    all(target_os = "linux", target_arch = "aarch64"),
    all(target_os = "windows", target_arch = "x86_64", target_feature = "avx"),
))]
fn node_bounds(node: &coitrees::Interval<&Position>) -> (i32, i32, Position) {
    (node.first, node.last, *node.metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Int64Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn atlas() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("chrom", DataType::Utf8, true),
            Field::new("start", DataType::Int64, false),
            Field::new("end", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![
                    Some("chr1"),
                    Some("chr1"),
                    Some("chr1"),
                    Some("chr2"),
                    None,
                ])),
                Arc::new(Int64Array::from(vec![50, 120, 900, 50, 0])),
                Arc::new(Int64Array::from(vec![300, 260, 1000, 300, 5000])),
            ],
        )
        .unwrap()
    }

    fn index() -> ContainmentIndex {
        let columns = ("chrom".to_string(), "start".to_string(), "end".to_string());
        ContainmentIndex::from_batch(&atlas(), &columns).unwrap()
    }

    #[test]
    fn null_contigs_are_not_indexed() {
        let index = index();
        assert_eq!(index.len(), 4);
        assert!(!index.is_empty());
    }

    #[test]
    fn nested_probe_finds_every_container() {
        let index = index();
        assert_eq!(index.containers("chr1", 150, 250, FilterOp::Weak), vec![0, 1]);
        assert_eq!(index.containers("chr1", 100, 200, FilterOp::Weak), vec![0]);
        assert_eq!(index.containers("chr2", 100, 200, FilterOp::Weak), vec![3]);
    }

    #[test]
    fn overlapping_but_not_nested_is_rejected() {
        let index = index();
        // overlaps [50, 300] and [120, 260] without being inside either
        assert!(index.containers("chr1", 40, 280, FilterOp::Weak).is_empty());
        assert!(index.containers("chr1", 950, 1100, FilterOp::Weak).is_empty());
    }

    #[test]
    fn unknown_contig_has_no_containers() {
        assert!(index().containers("chrX", 100, 200, FilterOp::Weak).is_empty());
    }

    #[test]
    fn strict_excludes_touching_boundaries() {
        let index = index();
        assert_eq!(index.containers("chr1", 50, 200, FilterOp::Weak), vec![0]);
        assert!(index.containers("chr1", 50, 200, FilterOp::Strict).is_empty());
    }
}
