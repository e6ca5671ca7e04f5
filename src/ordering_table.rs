use log::trace;

use crate::fragment::{FragmentId, FragmentPool, Primitive};

/// Why [`FrameSlot::insert`] dropped a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// Bucket index not below the table size.
    OutOfRange(usize),
    /// The slot's fragment pool is full.
    PoolExhausted,
    /// The id was issued before the pool's last reset.
    Stale,
}

/// Depth-bucketed list of fragment chains.
///
/// Bucket 0 is nearest to the camera. Inserting prepends to the bucket's chain,
/// so within one bucket the most recent insert is drawn first.
#[derive(Debug, Clone)]
pub struct OrderingTable {
    heads: Vec<Option<FragmentId>>,
}

impl OrderingTable {
    pub fn new(size: usize) -> Self {
        Self {
            heads: vec![None; size],
        }
    }

    pub fn size(&self) -> usize {
        self.heads.len()
    }

    pub fn clear(&mut self) {
        self.heads.iter_mut().for_each(|head| *head = None);
    }

    /// Links an already allocated fragment into `bucket`.
    pub fn insert(
        &mut self,
        pool: &mut FragmentPool,
        bucket: usize,
        id: FragmentId,
    ) -> Result<(), InsertError> {
        let head = self
            .heads
            .get_mut(bucket)
            .ok_or(InsertError::OutOfRange(bucket))?;
        if !pool.link(id, *head) {
            return Err(InsertError::Stale);
        }
        *head = Some(id);
        Ok(())
    }

    /// Walks every bucket from the farthest to the nearest.
    pub fn drain<'a>(&'a self, pool: &'a FragmentPool) -> Drain<'a> {
        Drain {
            heads: &self.heads,
            pool,
            bucket: self.heads.len(),
            cursor: None,
        }
    }
}

/// Far-to-near iterator over an [`OrderingTable`].
#[derive(Debug)]
pub struct Drain<'a> {
    heads: &'a [Option<FragmentId>],
    pool: &'a FragmentPool,
    bucket: usize,
    cursor: Option<FragmentId>,
}

impl<'a> Iterator for Drain<'a> {
    type Item = &'a Primitive;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.cursor {
                self.cursor = self.pool.next(id);
                if let Some(primitive) = self.pool.get(id) {
                    return Some(primitive);
                }
                continue;
            }
            if self.bucket == 0 {
                return None;
            }
            self.bucket -= 1;
            self.cursor = self.heads[self.bucket];
        }
    }
}

/// One of the two alternating buffers: a table plus the pool backing it.
#[derive(Debug, Clone)]
pub struct FrameSlot {
    table: OrderingTable,
    pool: FragmentPool,
}

impl FrameSlot {
    pub fn new(table_size: usize, capacity: usize) -> Self {
        Self {
            table: OrderingTable::new(table_size),
            pool: FragmentPool::with_capacity(capacity),
        }
    }

    /// Empties the table and the pool before the slot is rebuilt.
    pub fn reset(&mut self) {
        self.table.clear();
        self.pool.reset();
    }

    pub fn insert(&mut self, bucket: usize, primitive: Primitive) -> Result<FragmentId, InsertError> {
        if bucket >= self.table.size() {
            return Err(InsertError::OutOfRange(bucket));
        }
        let id = self
            .pool
            .allocate(primitive)
            .ok_or(InsertError::PoolExhausted)?;
        self.table.insert(&mut self.pool, bucket, id)?;
        trace!("fragment {} into bucket {bucket}", id.index());
        Ok(id)
    }

    pub fn table(&self) -> &OrderingTable {
        &self.table
    }

    pub fn pool(&self) -> &FragmentPool {
        &self.pool
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn drain(&self) -> Drain<'_> {
        self.table.drain(&self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Colour, LinePrimitive, ScreenPoint};

    fn tagged(tag: i16) -> Primitive {
        Primitive::Line(LinePrimitive {
            points: [ScreenPoint::new(tag, 0); 2],
            colours: [Colour::NEUTRAL; 2],
        })
    }

    fn tags(slot: &FrameSlot) -> Vec<i16> {
        slot.drain()
            .map(|primitive| match primitive {
                Primitive::Line(line) => line.points[0].x,
                Primitive::Quad(_) => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn drains_far_to_near() {
        let mut slot = FrameSlot::new(16, 8);
        slot.insert(3, tagged(3)).unwrap();
        slot.insert(15, tagged(15)).unwrap();
        slot.insert(0, tagged(0)).unwrap();
        slot.insert(7, tagged(7)).unwrap();
        assert_eq!(tags(&slot), vec![15, 7, 3, 0]);
    }

    #[test]
    fn same_bucket_drains_most_recent_first() {
        let mut slot = FrameSlot::new(4, 8);
        slot.insert(2, tagged(1)).unwrap();
        slot.insert(2, tagged(2)).unwrap();
        slot.insert(2, tagged(3)).unwrap();
        assert_eq!(tags(&slot), vec![3, 2, 1]);
    }

    #[test]
    fn out_of_range_bucket_is_refused_without_allocating() {
        let mut slot = FrameSlot::new(4, 8);
        assert_eq!(slot.insert(4, tagged(0)), Err(InsertError::OutOfRange(4)));
        assert!(slot.is_empty());
    }

    #[test]
    fn exhausted_pool_drops_fragment() {
        let mut slot = FrameSlot::new(4, 1);
        slot.insert(1, tagged(1)).unwrap();
        assert_eq!(slot.insert(1, tagged(2)), Err(InsertError::PoolExhausted));
        assert_eq!(tags(&slot), vec![1]);
    }

    #[test]
    fn reset_empties_the_slot() {
        let mut slot = FrameSlot::new(4, 4);
        slot.insert(1, tagged(1)).unwrap();
        slot.reset();
        assert!(slot.drain().next().is_none());
        slot.insert(0, tagged(9)).unwrap();
        assert_eq!(tags(&slot), vec![9]);
    }

    #[test]
    fn stale_id_is_not_linked() {
        let mut table = OrderingTable::new(4);
        let mut pool = FragmentPool::with_capacity(4);
        let stale = pool.allocate(tagged(5)).unwrap();
        pool.reset();
        assert_eq!(table.insert(&mut pool, 1, stale), Err(InsertError::Stale));
        assert!(table.drain(&pool).next().is_none());

        let fresh = pool.allocate(tagged(6)).unwrap();
        table.insert(&mut pool, 1, fresh).unwrap();
        assert_eq!(table.drain(&pool).count(), 1);
    }
}
