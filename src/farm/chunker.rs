//! Splits a page request into contiguous per-worker chunks

use crate::document::PageIndex;

/// Position of a chunk within the request; also its slot when reassembling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub usize);

impl ChunkId {
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A contiguous run of requested pages assigned to one worker invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub id: ChunkId,
    pub pages: Vec<PageIndex>,
}

/// Number of pages per chunk: `ceil(len / pool_size)`
#[must_use]
pub fn chunk_size(len: usize, pool_size: usize) -> usize {
    len.div_ceil(pool_size.max(1))
}

/// Partition `pages` into at most `pool_size` contiguous chunks.
///
/// Chunks keep request order and concatenate back to `pages`. Only the last
/// chunk may be shorter. An empty request yields no chunks.
#[must_use]
pub fn chunk_pages(pages: &[PageIndex], pool_size: usize) -> Vec<Chunk> {
    if pages.is_empty() {
        return Vec::new();
    }

    pages
        .chunks(chunk_size(pages.len(), pool_size))
        .enumerate()
        .map(|(id, run)| Chunk {
            id: ChunkId::new(id),
            pages: run.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(chunks: &[Chunk]) -> Vec<usize> {
        chunks.iter().map(|c| c.pages.len()).collect()
    }

    #[test]
    fn seven_pages_over_four_workers() {
        let pages: Vec<_> = (1..=7).collect();
        let chunks = chunk_pages(&pages, 4);

        assert_eq!(chunk_size(7, 4), 2);
        assert_eq!(sizes(&chunks), vec![2, 2, 2, 1]);
        assert_eq!(chunks[3].pages, vec![7]);
    }

    #[test]
    fn empty_request_has_no_chunks() {
        assert!(chunk_pages(&[], 4).is_empty());
    }

    #[test]
    fn fewer_pages_than_workers() {
        let chunks = chunk_pages(&[5, 2], 8);
        assert_eq!(sizes(&chunks), vec![1, 1]);
    }

    #[test]
    fn zero_pool_size_is_one_chunk() {
        let chunks = chunk_pages(&[1, 2, 3], 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].pages, vec![1, 2, 3]);
    }

    #[test]
    fn uneven_split_can_use_fewer_chunks_than_workers() {
        // ceil(5 / 4) = 2, so only three chunks are needed
        let chunks = chunk_pages(&[1, 2, 3, 4, 5], 4);
        assert_eq!(sizes(&chunks), vec![2, 2, 1]);
    }

    #[test]
    fn partition_properties_hold() {
        for len in 1..40 {
            let pages: Vec<_> = (0..len).map(|i| (i * 7) % 41 + 1).collect();
            for pool_size in 1..10 {
                let chunks = chunk_pages(&pages, pool_size);

                assert!(chunks.len() <= pool_size, "len={len} pool={pool_size}");
                assert!(chunks.iter().all(|c| !c.pages.is_empty()));
                for (pos, chunk) in chunks.iter().enumerate() {
                    assert_eq!(chunk.id, ChunkId::new(pos));
                }

                let rejoined: Vec<_> = chunks.iter().flat_map(|c| c.pages.clone()).collect();
                assert_eq!(rejoined, pages, "len={len} pool={pool_size}");
            }
        }
    }
}
