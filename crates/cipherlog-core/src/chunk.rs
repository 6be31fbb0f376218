//! Chunking and reassembly of oversized event payloads.
//!
//! The feed enforces a hard size ceiling per message. Payloads whose
//! serialized form exceeds the budget are split into ordered part records
//! that share the event's sequence number; readers merge a contiguous run
//! of parts back into one logical event.
//!
//! Splitting sizes each slice by its *JSON-escaped* length: the payload
//! slice is embedded as a JSON string on the wire, so quotes, backslashes
//! and control characters inflate.

use crate::error::CoreError;
use crate::record::{Event, Payload, WireRecord};

/// The byte length of `c` once JSON string escaping is applied.
fn escaped_char_len(c: char) -> usize {
    match c {
        '"' | '\\' => 2,
        // Control characters with two-byte short escapes.
        '\n' | '\r' | '\t' | '\u{08}' | '\u{0C}' => 2,
        // Remaining control characters become \u00XX.
        c if (c as u32) < 0x20 => 6,
        c => c.len_utf8(),
    }
}

/// The byte length of `s` once JSON string escaping is applied
/// (exclusive of the surrounding quotes).
pub fn escaped_len(s: &str) -> usize {
    s.chars().map(escaped_char_len).sum()
}

/// Split a serialized payload into slices whose escaped length never
/// exceeds `limit`.
///
/// Greedy: each slice takes as many characters as fit within the escaped
/// budget, shrinking below the raw character count whenever the slice
/// contains escape-inducing characters. Slices always fall on UTF-8
/// character boundaries.
pub fn split_payload(serialized: &str, limit: usize) -> Vec<String> {
    debug_assert!(limit >= 6, "limit below a single escaped character");

    if escaped_len(serialized) <= limit {
        return vec![serialized.to_string()];
    }

    let mut slices = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for c in serialized.chars() {
        let cost = escaped_char_len(c);
        if current_len + cost > limit && !current.is_empty() {
            slices.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(c);
        current_len += cost;
    }

    if !current.is_empty() {
        slices.push(current);
    }

    slices
}

/// Split a record into part records if its payload exceeds `limit`.
///
/// Records within the budget pass through untouched (structured payloads
/// stay structured). Oversized records are serialized, sliced, and emitted
/// as `of` part records carrying string slices, `part` ascending from 1.
pub fn chunk_record(record: &WireRecord, limit: usize) -> Result<Vec<WireRecord>, CoreError> {
    let serialized = match &record.payload {
        serde_json::Value::String(text) if record.encrypted => text.clone(),
        other => serde_json::to_string(other)?,
    };

    if escaped_len(&serialized) <= limit {
        return Ok(vec![record.clone()]);
    }

    let slices = split_payload(&serialized, limit);
    let total = slices.len() as u32;

    Ok(slices
        .into_iter()
        .enumerate()
        .map(|(i, slice)| {
            let mut part = record.clone();
            part.payload = serde_json::Value::String(slice);
            part.part = Some(i as u32 + 1);
            part.of = Some(total);
            part
        })
        .collect())
}

/// Single-window reassembler over a composite-key-ordered raw stream.
///
/// The underlying ordering (author, persistence ID, sequence number, part)
/// guarantees parts for one event are contiguous, so one buffered run at a
/// time is sufficient; interleaved parts from different events cannot
/// occur.
#[derive(Debug, Default)]
pub struct Reassembler {
    parts: Vec<WireRecord>,
    /// Run currently being skipped because its leading parts are missing.
    skipping: Option<(crate::types::PersistenceId, u64)>,
}

impl Reassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one raw record in key order.
    ///
    /// Returns the reassembled event when the record completes a run (or
    /// is itself an unchunked event). A run observed without its leading
    /// parts is dropped entirely, never surfaced partially.
    pub fn push(&mut self, record: WireRecord) -> Result<Option<Event>, CoreError> {
        if !record.is_part() {
            // A new unchunked event; anything still buffered is an
            // incomplete run superseded in key order.
            self.parts.clear();
            self.skipping = None;
            return Event::from_record(record).map(Some);
        }

        let run = (record.persistence_id.clone(), record.sequence_nr);

        if self.skipping.as_ref() == Some(&run) {
            return Ok(None);
        }
        self.skipping = None;

        if let Some(first) = self.parts.first() {
            let buffered_run = (first.persistence_id.clone(), first.sequence_nr);
            if buffered_run != run {
                // Key order moved on; the buffered run never completed.
                self.parts.clear();
            }
        }

        let expected = self.parts.len() as u32 + 1;
        if record.part != Some(expected) {
            // Out-of-order or missing leading parts: discard the whole run.
            self.parts.clear();
            self.skipping = Some(run);
            return Ok(None);
        }

        let complete = record.is_final_part();
        self.parts.push(record);

        if complete {
            let parts = std::mem::take(&mut self.parts);
            assemble_parts(parts).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Finish a finite stream.
    ///
    /// An incomplete buffered run is dropped: with only some of the parts
    /// replicated we act as though we have none of the event.
    pub fn finish(mut self) -> Result<Option<Event>, CoreError> {
        match self.parts.last() {
            Some(last) if last.is_final_part() => {
                let parts = std::mem::take(&mut self.parts);
                assemble_parts(parts).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Number of parts currently buffered.
    pub fn buffered(&self) -> usize {
        self.parts.len()
    }
}

/// Merge a complete run of parts into one event.
///
/// Payload strings are concatenated in part order. Encrypted payloads stay
/// opaque base64 for the decrypt pipeline; plain payloads are parsed back
/// into structured form.
fn assemble_parts(parts: Vec<WireRecord>) -> Result<Event, CoreError> {
    let mut joined = String::new();
    for part in &parts {
        match &part.payload {
            serde_json::Value::String(slice) => joined.push_str(slice),
            other => {
                return Err(CoreError::MalformedPartRun(format!(
                    "part payload must be a string, got {}",
                    crate::record::value_kind(other)
                )))
            }
        }
    }

    let last = parts.into_iter().last().expect("assemble of empty run");

    let payload = if last.encrypted {
        Payload::Cipher(joined)
    } else {
        Payload::Plain(serde_json::from_str(&joined)?)
    };

    Ok(Event {
        persistence_id: last.persistence_id,
        sequence_nr: last.sequence_nr,
        manifest: last.manifest,
        payload,
        encrypted: last.encrypted,
    })
}
