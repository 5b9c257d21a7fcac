use crate::blocks::CanonicalBlock;
use crate::decode::{decode_block, DecodeContext, DecodedBlock};
use serde_json::Value;

/// Decodes a sequence of records into a linked stack. Records that fail to
/// decode are skipped and their successor links to the last kept block.
pub fn decode_block_list(records: &[Value], cx: &mut DecodeContext<'_>) -> Vec<DecodedBlock> {
    let mut out: Vec<DecodedBlock> = Vec::with_capacity(records.len());
    for record in records {
        let Some(items) = record.as_array() else {
            continue;
        };
        let Some(mut decoded) = decode_block(items, cx) else {
            continue;
        };
        if let Some(previous) = out.last_mut() {
            decoded.block.parent = Some(previous.block.id.clone());
            previous.block.next = Some(decoded.block.id.clone());
        }
        out.push(decoded);
    }
    out
}

/// Pre-order: every block precedes the blocks it produced.
pub fn flatten(decoded: Vec<DecodedBlock>) -> Vec<CanonicalBlock> {
    let mut out = Vec::new();
    let mut stack: Vec<DecodedBlock> = decoded.into_iter().rev().collect();
    while let Some(DecodedBlock { block, children }) = stack.pop() {
        out.push(block);
        stack.extend(children.into_iter().rev());
    }
    out
}
