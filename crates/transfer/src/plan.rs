use oseh_protocol::{PartSpec, UploadPart, UploadPartRange};

use crate::TransferError;

/// Resolves part `number` against a compact part list.
///
/// Ranges are scanned in order and the first one containing `number` wins.
pub fn expand_part(parts: &[PartSpec], number: u32) -> Result<UploadPart, TransferError> {
    for spec in parts {
        let range = spec.as_range();
        if number < range.start_number || number - range.start_number >= range.number_of_parts {
            continue;
        }
        return range.part(number).ok_or_else(|| {
            TransferError::InvalidPlan(format!("byte offsets of part {number} overflow"))
        });
    }
    Err(TransferError::PartNotFound(number))
}

/// A server part list checked against the file it will be read from.
///
/// Construction guarantees that part numbers run from 1 without gaps and
/// that the parts tile `[0, file_size)` exactly. An empty file has no parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPlan {
    parts: Vec<PartSpec>,
    total_parts: u32,
    total_bytes: u64,
}

impl PartPlan {
    pub fn new(parts: &[PartSpec], file_size: u64) -> Result<Self, TransferError> {
        let mut ranges: Vec<UploadPartRange> = parts.iter().map(PartSpec::as_range).collect();
        ranges.sort_by_key(|r| r.start_number);

        let mut next_number: u32 = 1;
        let mut next_byte: u64 = 0;
        for range in &ranges {
            if range.start_number != next_number {
                return Err(TransferError::InvalidPlan(format!(
                    "expected part {next_number}, found range starting at {}",
                    range.start_number
                )));
            }
            if range.start_byte != next_byte {
                return Err(TransferError::InvalidPlan(format!(
                    "part {} starts at byte {} but previous part ends at {next_byte}",
                    range.start_number, range.start_byte
                )));
            }
            next_number = range.start_number.checked_add(range.number_of_parts).ok_or_else(|| {
                TransferError::InvalidPlan("part numbers overflow".into())
            })?;
            next_byte = range
                .end_byte()
                .ok_or_else(|| TransferError::InvalidPlan("byte offsets overflow".into()))?;
        }

        if next_byte != file_size {
            return Err(TransferError::PlanMismatch {
                planned: next_byte,
                actual: file_size,
            });
        }

        Ok(Self {
            parts: parts.to_vec(),
            total_parts: next_number - 1,
            total_bytes: next_byte,
        })
    }

    /// Byte range of part `number`.
    pub fn part(&self, number: u32) -> Result<UploadPart, TransferError> {
        expand_part(&self.parts, number)
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// All parts in increasing number order.
    pub fn iter(&self) -> impl Iterator<Item = UploadPart> + '_ {
        (1..=self.total_parts).filter_map(|n| self.part(n).ok())
    }
}
