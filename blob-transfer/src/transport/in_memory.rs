/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! In-memory implementation of the [`Transport`] trait.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::RwLock;

use super::{Transport, TransportError, TransportResult};
use crate::types::{
    Block, BlockId, BlockList, BlockListType, BlockState, ByteRange, ObjectLayout,
    ObjectProperties,
};

/// An in-memory storage service.
///
/// Objects, staged blocks and written ranges are kept in memory, making it suitable for testing
/// and for running the transfer engine without a remote service.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    // target -> object
    objects: RwLock<HashMap<String, StoredObject>>,
}

#[derive(Debug, Default)]
struct StoredObject {
    // `None` until the object is created (blocks may be staged before that)
    content: Option<Vec<u8>>,
    layout: ObjectLayout,
    committed: Vec<(BlockId, Bytes)>,
    uncommitted: Vec<(BlockId, Bytes)>,
    // written ranges of a file, sorted and disjoint
    ranges: Vec<ByteRange>,
}

impl StoredObject {
    fn content(&self, target: &str) -> TransportResult<&Vec<u8>> {
        self.content
            .as_ref()
            .ok_or_else(|| TransportError::not_found(format!("object `{target}` does not exist")))
    }

    fn check_bounds(&self, target: &str, range: ByteRange) -> TransportResult<()> {
        let size = self.content(target)?.len() as u64;
        if range.end() >= size {
            return Err(TransportError::invalid_range(format!(
                "{range} is out of bounds for `{target}` of size {size}"
            )));
        }
        Ok(())
    }
}

impl InMemoryTransport {
    /// Create a new, empty, in-memory service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full content of `target` if it exists
    pub async fn object(&self, target: &str) -> Option<Bytes> {
        let objects = self.objects.read().await;
        objects
            .get(target)
            .and_then(|obj| obj.content.as_deref())
            .map(Bytes::copy_from_slice)
    }
}

fn not_found(target: &str) -> TransportError {
    TransportError::not_found(format!("object `{target}` does not exist"))
}

fn find_block<'a>(blocks: &'a [(BlockId, Bytes)], id: &BlockId) -> Option<&'a Bytes> {
    blocks
        .iter()
        .find(|(block_id, _)| block_id == id)
        .map(|(_, data)| data)
}

fn catalog(blocks: &[(BlockId, Bytes)], state: BlockState) -> Vec<Block> {
    blocks
        .iter()
        .map(|(id, data)| Block::new(id.clone(), data.len() as u64, state))
        .collect()
}

/// Insert `range` and merge overlapping or adjacent ranges.
fn merge_range(ranges: &mut Vec<ByteRange>, range: ByteRange) {
    ranges.push(range);
    ranges.sort();
    let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for r in ranges.drain(..) {
        match merged.last_mut() {
            Some(last) if r.start() <= last.end().saturating_add(1) => {
                let end = last.end().max(r.end());
                *last = ByteRange::new(last.start(), end).expect("start <= end");
            }
            _ => merged.push(r),
        }
    }
    *ranges = merged;
}

/// Remove `cleared` from the written ranges.
fn subtract_range(ranges: &mut Vec<ByteRange>, cleared: ByteRange) {
    let mut remaining = Vec::with_capacity(ranges.len() + 1);
    for r in ranges.drain(..) {
        if r.end() < cleared.start() || r.start() > cleared.end() {
            remaining.push(r);
            continue;
        }
        if r.start() < cleared.start() {
            remaining.extend(ByteRange::new(r.start(), cleared.start() - 1));
        }
        if r.end() > cleared.end() {
            remaining.extend(ByteRange::new(cleared.end() + 1, r.end()));
        }
    }
    *ranges = remaining;
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn put_blob(&self, target: &str, data: Bytes) -> TransportResult<()> {
        let mut objects = self.objects.write().await;
        objects.insert(
            target.to_string(),
            StoredObject {
                content: Some(data.to_vec()),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn put_block(&self, target: &str, id: &BlockId, data: Bytes) -> TransportResult<()> {
        let mut objects = self.objects.write().await;
        let obj = objects.entry(target.to_string()).or_default();
        match obj.uncommitted.iter_mut().find(|(block_id, _)| block_id == id) {
            Some(existing) => existing.1 = data,
            None => obj.uncommitted.push((id.clone(), data)),
        }
        Ok(())
    }

    async fn commit_block_list(
        &self,
        target: &str,
        blocks: &[(BlockId, BlockState)],
    ) -> TransportResult<()> {
        let mut objects = self.objects.write().await;
        let obj = objects.entry(target.to_string()).or_default();

        let mut committed = Vec::with_capacity(blocks.len());
        for (id, state) in blocks {
            let data = match state {
                BlockState::Committed => find_block(&obj.committed, id),
                BlockState::Uncommitted => find_block(&obj.uncommitted, id),
                BlockState::Latest => {
                    find_block(&obj.uncommitted, id).or_else(|| find_block(&obj.committed, id))
                }
            };
            let data = data.ok_or_else(|| {
                TransportError::invalid_block_list(format!("block `{id}` ({state:?}) not found"))
            })?;
            committed.push((id.clone(), data.clone()));
        }

        let mut content = BytesMut::new();
        committed
            .iter()
            .for_each(|(_, data)| content.extend_from_slice(data));

        obj.content = Some(content.to_vec());
        obj.layout = ObjectLayout::Blocks;
        obj.committed = committed;
        obj.uncommitted.clear();
        obj.ranges.clear();
        Ok(())
    }

    async fn get_block_list(
        &self,
        target: &str,
        list_type: BlockListType,
    ) -> TransportResult<BlockList> {
        let objects = self.objects.read().await;
        let obj = objects.get(target).ok_or_else(|| not_found(target))?;
        let mut list = BlockList::default();
        if matches!(list_type, BlockListType::All | BlockListType::Committed) {
            list.committed_blocks = catalog(&obj.committed, BlockState::Committed);
        }
        if matches!(list_type, BlockListType::All | BlockListType::Uncommitted) {
            list.uncommitted_blocks = catalog(&obj.uncommitted, BlockState::Uncommitted);
        }
        Ok(list)
    }

    async fn create_file(&self, target: &str, size: u64) -> TransportResult<()> {
        let size = usize::try_from(size)
            .map_err(|_| TransportError::invalid_input(format!("file size {size} too large")))?;
        let mut objects = self.objects.write().await;
        objects.insert(
            target.to_string(),
            StoredObject {
                content: Some(vec![0; size]),
                layout: ObjectLayout::Ranges,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn put_range(&self, target: &str, range: ByteRange, data: Bytes) -> TransportResult<()> {
        if data.len() as u64 != range.len() {
            return Err(TransportError::invalid_input(format!(
                "{range} does not match body length {}",
                data.len()
            )));
        }
        let mut objects = self.objects.write().await;
        let obj = objects.get_mut(target).ok_or_else(|| not_found(target))?;
        obj.check_bounds(target, range)?;
        if let Some(content) = obj.content.as_mut() {
            let start = range.start() as usize;
            content[start..start + data.len()].copy_from_slice(&data);
        }
        merge_range(&mut obj.ranges, range);
        Ok(())
    }

    async fn clear_range(&self, target: &str, range: ByteRange) -> TransportResult<()> {
        let mut objects = self.objects.write().await;
        let obj = objects.get_mut(target).ok_or_else(|| not_found(target))?;
        obj.check_bounds(target, range)?;
        if let Some(content) = obj.content.as_mut() {
            content[range.start() as usize..=range.end() as usize].fill(0);
        }
        subtract_range(&mut obj.ranges, range);
        Ok(())
    }

    async fn list_ranges(&self, target: &str) -> TransportResult<Vec<ByteRange>> {
        let objects = self.objects.read().await;
        let obj = objects.get(target).ok_or_else(|| not_found(target))?;
        let size = obj.content(target)?.len() as u64;
        match obj.layout {
            ObjectLayout::Ranges => Ok(obj.ranges.clone()),
            // block blobs are fully written
            ObjectLayout::Blocks => Ok(ByteRange::with_length(0, size).into_iter().collect()),
        }
    }

    async fn get_properties(&self, target: &str) -> TransportResult<ObjectProperties> {
        let objects = self.objects.read().await;
        let obj = objects.get(target).ok_or_else(|| not_found(target))?;
        Ok(ObjectProperties {
            size: obj.content(target)?.len() as u64,
            layout: obj.layout,
        })
    }

    async fn get_range(&self, target: &str, range: ByteRange) -> TransportResult<Bytes> {
        let objects = self.objects.read().await;
        let obj = objects.get(target).ok_or_else(|| not_found(target))?;
        obj.check_bounds(target, range)?;
        let content = obj.content(target)?;
        Ok(Bytes::copy_from_slice(
            &content[range.start() as usize..=range.end() as usize],
        ))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::InMemoryTransport;
    use crate::transport::{Transport, TransportErrorKind};
    use crate::types::{BlockId, BlockListType, BlockState, ByteRange, ObjectLayout};

    fn range(start: u64, end: u64) -> ByteRange {
        ByteRange::new(start, end).unwrap()
    }

    #[tokio::test]
    async fn test_commit_orders_by_block_list() {
        let svc = InMemoryTransport::new();
        let (a, b) = (BlockId::from_sequence(0), BlockId::from_sequence(1));
        // staged out of order
        svc.put_block("t", &b, Bytes::from_static(b"world"))
            .await
            .unwrap();
        svc.put_block("t", &a, Bytes::from_static(b"hello "))
            .await
            .unwrap();

        let list = svc
            .get_block_list("t", BlockListType::All)
            .await
            .unwrap();
        assert!(list.committed_blocks.is_empty());
        let staged = list
            .uncommitted_blocks
            .iter()
            .map(|b| b.id.clone())
            .collect::<Vec<_>>();
        assert_eq!(vec![b.clone(), a.clone()], staged);

        svc.commit_block_list(
            "t",
            &[(a.clone(), BlockState::Latest), (b.clone(), BlockState::Latest)],
        )
        .await
        .unwrap();
        assert_eq!(Bytes::from_static(b"hello world"), svc.object("t").await.unwrap());

        let list = svc
            .get_block_list("t", BlockListType::Committed)
            .await
            .unwrap();
        assert_eq!(2, list.committed_blocks.len());
        assert_eq!(6, list.committed_blocks[0].size);
        assert!(list.uncommitted_blocks.is_empty());
    }

    #[tokio::test]
    async fn test_restage_block_replaces_uncommitted() {
        let svc = InMemoryTransport::new();
        let id = BlockId::from_sequence(0);
        svc.put_block("t", &id, Bytes::from_static(b"first"))
            .await
            .unwrap();
        svc.put_block("t", &id, Bytes::from_static(b"second"))
            .await
            .unwrap();
        let list = svc
            .get_block_list("t", BlockListType::Uncommitted)
            .await
            .unwrap();
        assert_eq!(1, list.uncommitted_blocks.len());
        assert_eq!(6, list.uncommitted_blocks[0].size);
    }

    #[tokio::test]
    async fn test_commit_unknown_block_is_invalid() {
        let svc = InMemoryTransport::new();
        let err = svc
            .commit_block_list("t", &[(BlockId::from("missing"), BlockState::Latest)])
            .await
            .unwrap_err();
        assert_eq!(TransportErrorKind::InvalidBlockList, err.kind());
        assert!(svc.object("t").await.is_none());
    }

    #[tokio::test]
    async fn test_committed_block_can_be_recommitted() {
        let svc = InMemoryTransport::new();
        let id = BlockId::from("a");
        svc.put_block("t", &id, Bytes::from_static(b"abc"))
            .await
            .unwrap();
        svc.commit_block_list("t", &[(id.clone(), BlockState::Uncommitted)])
            .await
            .unwrap();
        svc.commit_block_list(
            "t",
            &[(id.clone(), BlockState::Committed), (id, BlockState::Latest)],
        )
        .await
        .unwrap();
        assert_eq!(Bytes::from_static(b"abcabc"), svc.object("t").await.unwrap());
    }

    #[tokio::test]
    async fn test_ranges_merge_and_clear() {
        let svc = InMemoryTransport::new();
        svc.create_file("f", 16).await.unwrap();
        assert!(svc.list_ranges("f").await.unwrap().is_empty());

        svc.put_range("f", range(8, 11), Bytes::from_static(b"cccc"))
            .await
            .unwrap();
        svc.put_range("f", range(0, 3), Bytes::from_static(b"aaaa"))
            .await
            .unwrap();
        svc.put_range("f", range(4, 7), Bytes::from_static(b"bbbb"))
            .await
            .unwrap();
        assert_eq!(vec![range(0, 11)], svc.list_ranges("f").await.unwrap());

        svc.clear_range("f", range(2, 5)).await.unwrap();
        assert_eq!(
            vec![range(0, 1), range(6, 11)],
            svc.list_ranges("f").await.unwrap()
        );
        assert_eq!(
            Bytes::from_static(b"aa\0\0\0\0bbcccc"),
            svc.get_range("f", range(0, 11)).await.unwrap()
        );

        let props = svc.get_properties("f").await.unwrap();
        assert_eq!(16, props.size);
        assert_eq!(ObjectLayout::Ranges, props.layout);
    }

    #[tokio::test]
    async fn test_out_of_bounds_range() {
        let svc = InMemoryTransport::new();
        svc.create_file("f", 4).await.unwrap();
        let err = svc
            .put_range("f", range(2, 5), Bytes::from_static(b"xxxx"))
            .await
            .unwrap_err();
        assert_eq!(TransportErrorKind::InvalidRange, err.kind());
        let err = svc.get_range("f", range(4, 4)).await.unwrap_err();
        assert_eq!(TransportErrorKind::InvalidRange, err.kind());
    }

    #[tokio::test]
    async fn test_missing_object() {
        let svc = InMemoryTransport::new();
        let err = svc.get_properties("nope").await.unwrap_err();
        assert_eq!(TransportErrorKind::NotFound, err.kind());
    }
}
