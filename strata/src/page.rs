//! The slotted heap page layout.
//!
//! A page is `page_size` bytes: a header bitmap with one bit per slot
//! (LSB-first within each byte, bit i set iff slot i is occupied),
//! followed by fixed-width tuple slots packed back-to-back. Bytes after
//! the last slot are unused padding.

use crate::error::{StorageError, StorageResult};
use crate::transaction::TransactionId;
use crate::tuple::{RecordId, Schema, Tuple};
use crate::PageId;

/// The in-memory image of a single disk page.
///
/// Tuples are deserialized eagerly on construction; the slot bitmap is
/// authoritative for occupancy. The page also remembers which
/// transaction dirtied it, which the buffer pool consults for its
/// no-steal/force discipline.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    schema: Schema,
    num_slots: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty_by: Option<TransactionId>,
}

/// Slots on a page of `page_size` bytes: each slot costs its tuple width
/// in the body plus one bit in the header.
fn slots_per_page(schema: &Schema, page_size: usize) -> usize {
    (page_size * 8) / (schema.tuple_width() * 8 + 1)
}

fn header_bytes(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

impl HeapPage {
    /// Parses a page image read from disk. `data` must be exactly the
    /// process-wide page size.
    pub fn parse(pid: PageId, data: &[u8], schema: Schema) -> StorageResult<HeapPage> {
        let page_size = crate::page_size();
        if data.len() != page_size {
            return Err(StorageError::Db(format!(
                "page image is {} bytes, expected {}",
                data.len(),
                page_size
            )));
        }
        let num_slots = slots_per_page(&schema, page_size);
        let header_len = header_bytes(num_slots);
        let width = schema.tuple_width();
        let header = data[..header_len].to_vec();

        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if header[slot / 8] & (1 << (slot % 8)) == 0 {
                tuples.push(None);
                continue;
            }
            let offset = header_len + slot * width;
            let mut tuple = Tuple::parse(&data[offset..offset + width], &schema)?;
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            tuples.push(Some(tuple));
        }

        Ok(HeapPage {
            pid,
            schema,
            num_slots,
            header,
            tuples,
            dirty_by: None,
        })
    }

    /// A fresh page with every slot empty.
    pub fn empty(pid: PageId, schema: Schema) -> HeapPage {
        let num_slots = slots_per_page(&schema, crate::page_size());
        HeapPage {
            pid,
            schema,
            header: vec![0u8; header_bytes(num_slots)],
            tuples: vec![None; num_slots],
            num_slots,
            dirty_by: None,
        }
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    pub fn empty_slot_count(&self) -> usize {
        (0..self.num_slots)
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    /// Places `tuple` in the lowest-indexed empty slot and stamps its
    /// record id. Fails when the schema does not match or no slot is free.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> StorageResult<()> {
        if *tuple.schema() != self.schema {
            return Err(StorageError::Db(
                "tuple schema does not match page schema".to_string(),
            ));
        }
        let slot = (0..self.num_slots)
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or_else(|| StorageError::Db("no empty slot on page".to_string()))?;
        self.set_slot(slot, true);
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        self.tuples[slot] = Some(tuple);
        Ok(())
    }

    /// Clears the slot named by the tuple's record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> StorageResult<()> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| StorageError::Db("tuple has no record id".to_string()))?;
        if rid.page_id != self.pid {
            return Err(StorageError::Db(format!(
                "tuple lives on page {:?}, not on page {:?}",
                rid.page_id, self.pid
            )));
        }
        if rid.slot >= self.num_slots || !self.is_slot_used(rid.slot) {
            return Err(StorageError::Db(format!(
                "slot {} is already empty",
                rid.slot
            )));
        }
        self.set_slot(rid.slot, false);
        self.tuples[rid.slot] = None;
        Ok(())
    }

    /// The occupied tuples in slot order. Obtain a fresh iterator for
    /// every pass.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter_map(|t| t.as_ref())
    }

    /// Records which transaction dirtied the page, or marks it clean.
    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirty_by = tid;
    }

    pub fn dirty_by(&self) -> Option<TransactionId> {
        self.dirty_by
    }

    /// Serializes the page to exactly `page_size` bytes. Empty slots are
    /// zero-filled; occupied slots round-trip bit-exactly.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; crate::page_size()];
        out[..self.header.len()].copy_from_slice(&self.header);
        let width = self.schema.tuple_width();
        for (slot, tuple) in self.tuples.iter().enumerate() {
            if let Some(tuple) = tuple {
                let offset = self.header.len() + slot * width;
                out[offset..offset + width].copy_from_slice(&tuple.to_bytes());
            }
        }
        out
    }
}
