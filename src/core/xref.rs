//! Cross-reference table: locating, materializing and caching indirect
//! objects.
//!
//! A healthy file is read tail-first: `startxref` gives the newest xref
//! section, `/Prev` links walk back through incremental updates, and the
//! first definition of an object number wins. Both classic tables and
//! cross-reference streams are understood, including entries that live
//! inside object streams. When none of that works the table is rebuilt by
//! scanning the whole byte stream for `N G obj` markers — non-conformant
//! files are common enough that recovery is part of the contract, not an
//! afterthought.

use rustc_hash::FxHashMap;
use std::collections::HashSet;

use crate::core::decode;
use crate::core::encryption::EncryptionState;
use crate::core::error::{PdfError, PdfResult};
use crate::core::lexer::Lexer;
use crate::core::parser::{Dict, Object, ObjectRef, Parser, StreamObject};
use crate::core::stream::{BaseStream, Stream};

/// Hard ceiling on table size so a forged /Size cannot balloon memory.
const MAX_OBJECTS: usize = 1 << 22;

/// How far a Reference → Reference chain may go before it reads as a cycle.
const MAX_RESOLVE_DEPTH: usize = 32;

/// One slot in the cross-reference table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XRefEntry {
    /// Object number is unused; `next_free` links the free list.
    Free { next_free: u64, gen: u32 },

    /// Object stored directly in the file at `offset`.
    Uncompressed { offset: u64, gen: u32 },

    /// Object stored inside object stream `stream_num` at position `index`.
    InStream { stream_num: u32, index: u32 },
}

/// Decoded object stream (/Type /ObjStm) kept around so sibling objects
/// parse without re-inflating the container.
struct ObjStmCache {
    data: Vec<u8>,
    first: usize,
    /// (object number, byte offset relative to `first`) pairs.
    offsets: Vec<(u32, usize)>,
}

/// The cross-reference table plus the object cache built on top of it.
pub struct XRef {
    stream: Stream,
    entries: Vec<Option<XRefEntry>>,
    trailer: Dict,
    cache: FxHashMap<(u32, u32), Object>,
    objstm_cache: FxHashMap<u32, ObjStmCache>,
    /// Set once when table parsing falls back to (or is verified by) a full
    /// scan; the scan runs at most once per document.
    scanned: bool,
    /// Objects currently being materialized; re-entry means the object
    /// graph loops through itself (e.g. an ObjStm containing its own
    /// container) and resolves to null instead of recursing forever.
    in_flight: HashSet<(u32, u32)>,
    /// Encryption state; decryption applies inside `fetch` once unlocked.
    pub encryption: Option<EncryptionState>,
}

impl XRef {
    /// Builds the table for a complete document buffer.
    ///
    /// Primary strategy: `startxref` → xref chain. Fallback: full scan.
    /// Fails with `DocumentCorrupt` only when both produce nothing usable.
    pub fn parse(data: Vec<u8>) -> PdfResult<XRef> {
        let mut xref = XRef {
            stream: Stream::from_bytes(data),
            entries: Vec::new(),
            trailer: Dict::default(),
            cache: FxHashMap::default(),
            objstm_cache: FxHashMap::default(),
            scanned: false,
            in_flight: HashSet::new(),
            encryption: None,
        };

        let parsed = match Self::find_startxref(xref.stream.bytes()) {
            Some(start) => match xref.parse_chain(start) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("xref chain unusable ({e}), rebuilding by scan");
                    false
                }
            },
            None => {
                log::warn!("no startxref keyword, rebuilding by scan");
                false
            }
        };

        if !parsed {
            xref.rebuild_by_scanning()?;
        }

        if xref.entries.iter().all(Option::is_none) {
            return Err(PdfError::corrupt("no cross-reference entries found"));
        }
        Ok(xref)
    }

    /// Locates the last `startxref` keyword near the end of the file and
    /// reads the decimal offset after it.
    fn find_startxref(data: &[u8]) -> Option<usize> {
        const KEYWORD: &[u8] = b"startxref";
        let window_start = data.len().saturating_sub(2048);
        let window = &data[window_start..];

        let pos = window
            .windows(KEYWORD.len())
            .rposition(|w| w == KEYWORD)?;

        let mut i = window_start + pos + KEYWORD.len();
        while i < data.len() && data[i].is_ascii_whitespace() {
            i += 1;
        }
        let digits_start = i;
        while i < data.len() && data[i].is_ascii_digit() {
            i += 1;
        }
        if digits_start == i {
            return None;
        }
        std::str::from_utf8(&data[digits_start..i])
            .ok()?
            .parse()
            .ok()
    }

    /// Walks the section at `start` and every `/Prev` (and hybrid-file
    /// `/XRefStm`) it leads to. Offsets already visited are skipped so a
    /// looped chain terminates.
    fn parse_chain(&mut self, start: usize) -> PdfResult<()> {
        let mut visited: HashSet<usize> = HashSet::new();
        let mut pending = vec![start];
        let mut first_section = true;

        while let Some(offset) = pending.pop() {
            if !visited.insert(offset) {
                continue;
            }
            if offset >= self.stream.length() {
                if first_section {
                    return Err(PdfError::corrupt(format!(
                        "startxref offset {offset} outside file"
                    )));
                }
                log::warn!("ignoring out-of-file xref offset {offset}");
                continue;
            }

            // A damaged older section only loses its own entries; the
            // newest section must parse or the whole chain is unusable.
            let section_trailer = match self.parse_section(offset) {
                Ok(d) => d,
                Err(e) if !first_section => {
                    log::warn!("skipping damaged xref section at {offset}: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            for key in ["Prev", "XRefStm"] {
                if let Some(prev) = section_trailer.get(key).and_then(Object::as_int) {
                    if prev >= 0 {
                        pending.push(prev as usize);
                    }
                }
            }

            // The newest trailer is authoritative; older ones only fill in
            // keys it lacks.
            if first_section {
                self.trailer = section_trailer;
                first_section = false;
            } else {
                for (k, v) in section_trailer {
                    self.trailer.entry(k).or_insert(v);
                }
            }
        }
        Ok(())
    }

    /// Parses one section, classic or stream form, returning its trailer.
    fn parse_section(&mut self, offset: usize) -> PdfResult<Dict> {
        let window = self
            .stream
            .make_sub_stream(offset, self.stream.length() - offset)?;
        let mut parser = Parser::new(Lexer::new(window))?;

        let first = parser.next_object()?;
        if first.is_keyword("xref") {
            self.parse_classic_table(&mut parser)
        } else if let Object::Number(_) = first {
            // "N G obj << /Type /XRef ... >> stream" form.
            let _gen = parser.next_object()?;
            let kw = parser.next_object()?;
            if !kw.is_keyword("obj") {
                return Err(PdfError::syntax("xref offset points at neither table nor stream"));
            }
            let obj = parser.next_object()?;
            match obj {
                Object::Stream(s) => self.parse_xref_stream(s),
                _ => Err(PdfError::syntax("xref stream object has no stream body")),
            }
        } else {
            Err(PdfError::syntax("xref offset points at neither table nor stream"))
        }
    }

    /// Classic table: subsections of `first count` headers followed by
    /// fixed-format entries, closed by `trailer << ... >>`.
    fn parse_classic_table(&mut self, parser: &mut Parser) -> PdfResult<Dict> {
        loop {
            let head = parser.next_object()?;
            if head.is_keyword("trailer") {
                break;
            }
            let first = head
                .as_number()
                .ok_or_else(|| PdfError::syntax("expected xref subsection start"))?
                as usize;
            let count = parser
                .next_object()?
                .as_number()
                .ok_or_else(|| PdfError::syntax("expected xref subsection count"))?
                as usize;

            if first + count > MAX_OBJECTS {
                return Err(PdfError::syntax("xref subsection exceeds object limit"));
            }
            self.reserve(first + count);

            for i in 0..count {
                let offset = parser
                    .next_object()?
                    .as_number()
                    .ok_or_else(|| PdfError::syntax("expected xref entry offset"))?
                    as u64;
                let gen = parser
                    .next_object()?
                    .as_number()
                    .ok_or_else(|| PdfError::syntax("expected xref entry generation"))?
                    as u32;
                let kind = parser.next_object()?;

                let entry = if kind.is_keyword("f") {
                    XRefEntry::Free {
                        next_free: offset,
                        gen,
                    }
                } else if kind.is_keyword("n") {
                    XRefEntry::Uncompressed { offset, gen }
                } else {
                    return Err(PdfError::syntax("xref entry kind is neither n nor f"));
                };

                self.insert_if_absent(first + i, entry);
            }
        }

        match parser.next_object()? {
            Object::Dictionary(d) => Ok(d),
            _ => Err(PdfError::syntax("trailer keyword not followed by dictionary")),
        }
    }

    /// Cross-reference stream: binary rows described by /W, subsection
    /// ranges in /Index, the stream dictionary doubling as trailer.
    fn parse_xref_stream(&mut self, stream: StreamObject) -> PdfResult<Dict> {
        let data = decode::decode_stream(&stream.dict, &stream.data)?;
        let dict = stream.dict;

        let widths: Vec<usize> = dict
            .get("W")
            .and_then(Object::as_array)
            .ok_or_else(|| PdfError::syntax("xref stream missing /W"))?
            .iter()
            .map(|o| o.as_int().unwrap_or(0).max(0) as usize)
            .collect();
        if widths.len() < 3 || widths.iter().sum::<usize>() == 0 {
            return Err(PdfError::syntax("xref stream /W is unusable"));
        }
        let row_len: usize = widths.iter().sum();

        let size = dict.get("Size").and_then(Object::as_int).unwrap_or(0) as usize;
        let index: Vec<usize> = match dict.get("Index").and_then(Object::as_array) {
            Some(arr) => arr
                .iter()
                .map(|o| o.as_int().unwrap_or(0).max(0) as usize)
                .collect(),
            None => vec![0, size],
        };

        let read_field = |bytes: &[u8]| -> u64 {
            bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
        };

        let mut rows = data.chunks(row_len);
        for range in index.chunks(2) {
            let (first, count) = match range {
                [f, c] => (*f, *c),
                _ => break,
            };
            if first + count > MAX_OBJECTS {
                return Err(PdfError::syntax("xref stream index exceeds object limit"));
            }
            self.reserve(first + count);

            for i in 0..count {
                let row = match rows.next() {
                    Some(r) if r.len() == row_len => r,
                    _ => {
                        log::warn!("xref stream data shorter than /Index declares");
                        return Ok(dict);
                    }
                };
                let (f1, rest) = row.split_at(widths[0]);
                let (f2, f3) = rest.split_at(widths[1]);

                // A zero-width type field defaults to type 1.
                let kind = if widths[0] == 0 { 1 } else { read_field(f1) };
                let field2 = read_field(f2);
                let field3 = read_field(f3);

                let entry = match kind {
                    0 => XRefEntry::Free {
                        next_free: field2,
                        gen: field3 as u32,
                    },
                    1 => XRefEntry::Uncompressed {
                        offset: field2,
                        gen: field3 as u32,
                    },
                    2 => XRefEntry::InStream {
                        stream_num: field2 as u32,
                        index: field3 as u32,
                    },
                    other => {
                        log::warn!("unknown xref stream entry type {other}, treating as free");
                        XRefEntry::Free {
                            next_free: 0,
                            gen: 0,
                        }
                    }
                };
                self.insert_if_absent(first + i, entry);
            }
        }

        Ok(dict)
    }

    fn reserve(&mut self, len: usize) {
        if self.entries.len() < len {
            self.entries.resize(len, None);
        }
    }

    fn insert_if_absent(&mut self, num: usize, entry: XRefEntry) {
        self.reserve(num + 1);
        if self.entries[num].is_none() {
            self.entries[num] = Some(entry);
        }
    }

    /// Rebuilds the table by scanning for `N G obj` markers.
    ///
    /// Later definitions overwrite earlier ones (a linearly appended update
    /// puts the newer object later in the file). The trailer is recovered
    /// from the last parseable `trailer` dictionary, or failing that from a
    /// scanned /Type /Catalog object.
    fn rebuild_by_scanning(&mut self) -> PdfResult<()> {
        if self.scanned {
            return Ok(());
        }
        self.scanned = true;
        log::warn!("rebuilding cross-reference table by linear scan");

        let bytes = self.stream.shared();
        let data: &[u8] = &bytes;
        self.entries.clear();

        let mut i = 0;
        while i + 3 <= data.len() {
            if &data[i..i + 3] == b"obj"
                && (i + 3 >= data.len() || !data[i + 3].is_ascii_alphanumeric())
            {
                if let Some((num, gen, start)) = Self::backtrack_obj_header(data, i) {
                    if (num as usize) < MAX_OBJECTS {
                        self.reserve(num as usize + 1);
                        // Last definition wins during a scan.
                        self.entries[num as usize] = Some(XRefEntry::Uncompressed {
                            offset: start as u64,
                            gen,
                        });
                    }
                }
                i += 3;
            } else {
                i += 1;
            }
        }

        if self.trailer.is_empty() || !self.trailer.contains_key("Root") {
            self.recover_trailer()?;
        }
        Ok(())
    }

    /// Walks backwards from an `obj` keyword over "N G " and returns
    /// (object number, generation, offset of N).
    fn backtrack_obj_header(data: &[u8], obj_pos: usize) -> Option<(u32, u32, usize)> {
        let mut i = obj_pos;
        // Whitespace before "obj".
        let mut seen_ws = false;
        while i > 0 && data[i - 1].is_ascii_whitespace() {
            i -= 1;
            seen_ws = true;
        }
        if !seen_ws {
            return None;
        }
        // Generation digits.
        let gen_end = i;
        while i > 0 && data[i - 1].is_ascii_digit() {
            i -= 1;
        }
        if i == gen_end {
            return None;
        }
        let gen: u32 = std::str::from_utf8(&data[i..gen_end]).ok()?.parse().ok()?;
        // Whitespace between N and G.
        seen_ws = false;
        while i > 0 && data[i - 1].is_ascii_whitespace() {
            i -= 1;
            seen_ws = true;
        }
        if !seen_ws {
            return None;
        }
        // Object number digits.
        let num_end = i;
        while i > 0 && data[i - 1].is_ascii_digit() {
            i -= 1;
        }
        if i == num_end {
            return None;
        }
        let num: u32 = std::str::from_utf8(&data[i..num_end]).ok()?.parse().ok()?;
        Some((num, gen, i))
    }

    fn recover_trailer(&mut self) -> PdfResult<()> {
        let bytes = self.stream.shared();
        let data: &[u8] = &bytes;

        // Prefer an explicit trailer dictionary, last one first.
        const KEYWORD: &[u8] = b"trailer";
        let mut search_end = data.len();
        while let Some(pos) = data[..search_end]
            .windows(KEYWORD.len())
            .rposition(|w| w == KEYWORD)
        {
            let after = pos + KEYWORD.len();
            if let Ok(window) = self.stream.make_sub_stream(after, data.len() - after) {
                if let Ok(mut parser) = Parser::new(Lexer::new(window)) {
                    if let Ok(Object::Dictionary(d)) = parser.next_object() {
                        if d.contains_key("Root") {
                            for (k, v) in d {
                                self.trailer.entry(k).or_insert(v);
                            }
                            return Ok(());
                        }
                    }
                }
            }
            search_end = pos;
        }

        // No trailer: look for a catalog among the scanned objects.
        let numbers: Vec<u32> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(n, e)| {
                matches!(e, Some(XRefEntry::Uncompressed { .. })).then_some(n as u32)
            })
            .collect();
        for num in numbers {
            let r = ObjectRef::new(num, 0);
            if let Ok(obj) = self.fetch(r) {
                let is_catalog = obj
                    .as_dict()
                    .and_then(|d| d.get("Type"))
                    .and_then(Object::as_name)
                    == Some("Catalog");
                if is_catalog {
                    self.trailer.insert("Root".into(), Object::Reference(r));
                    return Ok(());
                }
            }
        }

        Err(PdfError::corrupt(
            "no trailer and no catalog recoverable from scan",
        ))
    }

    // -- object access ------------------------------------------------------

    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    pub fn entry(&self, num: u32) -> Option<XRefEntry> {
        self.entries.get(num as usize).copied().flatten()
    }

    /// Materializes the object behind a reference.
    ///
    /// Cached by (number, generation); repeat calls are O(1) clones. A
    /// reference to a free or absent object yields `Object::Null`.
    pub fn fetch(&mut self, r: ObjectRef) -> PdfResult<Object> {
        if let Some(cached) = self.cache.get(&(r.num, r.gen)) {
            return Ok(cached.clone());
        }
        if !self.in_flight.insert((r.num, r.gen)) {
            log::warn!("object graph cycle through {} {} R", r.num, r.gen);
            return Ok(Object::Null);
        }
        let result = self.fetch_uncached(r);
        self.in_flight.remove(&(r.num, r.gen));
        result
    }

    fn fetch_uncached(&mut self, r: ObjectRef) -> PdfResult<Object> {
        let entry = match self.entry(r.num) {
            Some(e) => e,
            None => {
                // Unknown object numbers read as null; a damaged table gets
                // one scan-and-retry before we give up on the number.
                if !self.scanned {
                    self.rebuild_by_scanning()?;
                    return self.fetch_uncached(r);
                }
                return Ok(Object::Null);
            }
        };

        let object = match entry {
            XRefEntry::Free { .. } => Object::Null,
            XRefEntry::Uncompressed { offset, gen } => {
                if gen != r.gen {
                    log::warn!(
                        "generation mismatch for object {}: table {}, requested {}",
                        r.num,
                        gen,
                        r.gen
                    );
                }
                match self.parse_object_at(offset as usize, r, None) {
                    Ok(obj) => obj,
                    Err(e) => {
                        if !self.scanned {
                            log::warn!("bad object at offset {offset} ({e}), rescanning");
                            self.rebuild_by_scanning()?;
                            self.cache.remove(&(r.num, r.gen));
                            return self.fetch_uncached(r);
                        }
                        return Err(PdfError::corrupt(format!(
                            "object {} {} unreadable after scan recovery: {e}",
                            r.num, r.gen
                        )));
                    }
                }
            }
            XRefEntry::InStream { stream_num, index } => {
                self.fetch_from_object_stream(stream_num, index, r)?
            }
        };

        let object = self.decrypt_fetched(object, r, matches!(entry, XRefEntry::Uncompressed { .. }));
        self.cache.insert((r.num, r.gen), object.clone());
        Ok(object)
    }

    /// Resolves an object if it is a reference, following chains with a
    /// depth cap so reference cycles terminate at null.
    pub fn resolve(&mut self, obj: &Object) -> PdfResult<Object> {
        let mut current = obj.clone();
        let mut seen: HashSet<ObjectRef> = HashSet::new();
        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Reference(r) => {
                    if !seen.insert(r) {
                        log::warn!("reference cycle at {} {} R", r.num, r.gen);
                        return Ok(Object::Null);
                    }
                    current = self.fetch(r)?;
                }
                other => return Ok(other),
            }
        }
        log::warn!("reference chain exceeded depth limit");
        Ok(Object::Null)
    }

    /// Parses `N G obj <object> endobj` at a byte offset.
    fn parse_object_at(
        &mut self,
        offset: usize,
        expected: ObjectRef,
        length_override: Option<usize>,
    ) -> PdfResult<Object> {
        if offset >= self.stream.length() {
            return Err(PdfError::syntax(format!("object offset {offset} outside file")));
        }
        let window = self
            .stream
            .make_sub_stream(offset, self.stream.length() - offset)?;
        let mut parser =
            Parser::new(Lexer::new(window))?.with_length_override(length_override);

        let num = parser
            .next_object()?
            .as_number()
            .ok_or_else(|| PdfError::syntax("expected object number"))? as u32;
        let _gen = parser
            .next_object()?
            .as_number()
            .ok_or_else(|| PdfError::syntax("expected generation number"))?;
        if !parser.next_object()?.is_keyword("obj") {
            return Err(PdfError::syntax("missing obj keyword"));
        }
        if num != expected.num {
            return Err(PdfError::syntax(format!(
                "object number mismatch: found {num}, expected {}",
                expected.num
            )));
        }

        let object = parser.next_object()?;

        // An indirect /Length forces a second pass once the real value is
        // known; /Length stays authoritative over the endstream scan.
        if length_override.is_none() {
            if let Object::Stream(ref s) = object {
                if let Some(Object::Reference(len_ref)) = s.dict.get("Length") {
                    let len_ref = *len_ref;
                    if len_ref.num != expected.num {
                        if let Some(len) = self.fetch(len_ref)?.as_int() {
                            if len >= 0 && (len as usize) <= self.stream.length() {
                                return self.parse_object_at(
                                    offset,
                                    expected,
                                    Some(len as usize),
                                );
                            }
                        }
                    }
                }
            }
        }

        Ok(object)
    }

    /// Materializes an object stored in an object stream.
    fn fetch_from_object_stream(
        &mut self,
        stream_num: u32,
        index: u32,
        expected: ObjectRef,
    ) -> PdfResult<Object> {
        if !self.objstm_cache.contains_key(&stream_num) {
            let container = self.fetch(ObjectRef::new(stream_num, 0))?;
            let stream = match container {
                Object::Stream(s) => s,
                _ => {
                    return Err(PdfError::corrupt(format!(
                        "object stream {stream_num} is not a stream"
                    )));
                }
            };
            let n = stream.dict.get("N").and_then(Object::as_int).unwrap_or(0) as usize;
            let first = stream
                .dict
                .get("First")
                .and_then(Object::as_int)
                .unwrap_or(0) as usize;
            let data = decode::decode_stream(&stream.dict, &stream.data)?;

            // Header: n pairs of "objnum offset".
            let header = Stream::from_bytes(data[..first.min(data.len())].to_vec());
            let mut parser = Parser::new(Lexer::new(Box::new(header)))?;
            let mut offsets = Vec::with_capacity(n);
            for _ in 0..n {
                let num = parser.next_object()?.as_number();
                let off = parser.next_object()?.as_number();
                match (num, off) {
                    (Some(num), Some(off)) if num >= 0.0 && off >= 0.0 => {
                        offsets.push((num as u32, off as usize));
                    }
                    _ => break,
                }
            }

            self.objstm_cache.insert(
                stream_num,
                ObjStmCache {
                    data,
                    first,
                    offsets,
                },
            );
        }

        let cached = &self.objstm_cache[&stream_num];
        let (num, rel_offset) = match cached.offsets.get(index as usize) {
            Some(pair) => *pair,
            None => {
                log::warn!(
                    "object stream {stream_num} has no slot {index}, resolving to null"
                );
                return Ok(Object::Null);
            }
        };
        if num != expected.num {
            log::warn!(
                "object stream slot {index} holds object {num}, expected {}",
                expected.num
            );
        }

        let abs = cached.first + rel_offset;
        if abs >= cached.data.len() {
            return Ok(Object::Null);
        }
        let body = Stream::from_bytes(cached.data[abs..].to_vec());
        let mut parser = Parser::new(Lexer::new(Box::new(body)))?;
        parser.next_object()
    }

    /// Applies decryption to a freshly parsed object. Objects inside object
    /// streams are already covered by their container's decryption.
    fn decrypt_fetched(&self, object: Object, r: ObjectRef, directly_stored: bool) -> Object {
        let enc = match &self.encryption {
            Some(e) if e.is_unlocked() && directly_stored => e,
            _ => return object,
        };
        Self::decrypt_tree(enc, object, r)
    }

    fn decrypt_tree(enc: &EncryptionState, object: Object, r: ObjectRef) -> Object {
        match object {
            Object::String(s) => Object::String(enc.decrypt_string(&s, r)),
            Object::HexString(s) => Object::HexString(enc.decrypt_string(&s, r)),
            Object::Array(items) => Object::Array(
                items
                    .into_iter()
                    .map(|o| Self::decrypt_tree(enc, o, r))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(
                dict.into_iter()
                    .map(|(k, v)| (k, Self::decrypt_tree(enc, v, r)))
                    .collect(),
            ),
            Object::Stream(s) => {
                let dict = s
                    .dict
                    .into_iter()
                    .map(|(k, v)| (k, Self::decrypt_tree(enc, v, r)))
                    .collect();
                let data = enc.decrypt_stream(&s.data, r);
                Object::Stream(StreamObject { dict, data })
            }
            other => other,
        }
    }

    /// Decodes a stream body through its filter pipeline, resolving any
    /// indirect /Filter or /DecodeParms values first.
    pub fn decoded_stream_data(&mut self, stream: &StreamObject) -> PdfResult<Vec<u8>> {
        let mut dict = stream.dict.clone();
        for key in ["Filter", "DecodeParms", "DP"] {
            let indirect = match dict.get(key) {
                Some(Object::Reference(_)) => dict.get(key).cloned(),
                _ => None,
            };
            if let Some(value) = indirect {
                let resolved = self.resolve(&value)?;
                dict.insert(key.to_string(), resolved);
            }
        }
        decode::decode_stream(&dict, &stream.data)
    }

    /// The catalog (root) dictionary from the trailer.
    pub fn catalog(&mut self) -> PdfResult<Dict> {
        let root = self
            .trailer
            .get("Root")
            .cloned()
            .ok_or_else(|| PdfError::corrupt("trailer has no /Root"))?;
        match self.resolve(&root)? {
            Object::Dictionary(d) => Ok(d),
            _ => Err(PdfError::corrupt("/Root is not a dictionary")),
        }
    }

    /// First element of the trailer /ID as raw bytes, used in legacy key
    /// derivation. Missing /ID derives with an empty id.
    pub fn file_id(&self) -> Vec<u8> {
        self.trailer
            .get("ID")
            .and_then(Object::as_array)
            .and_then(|a| a.first())
            .and_then(Object::as_string_bytes)
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal classic-xref document: catalog, pages node, one page.
    pub(crate) fn minimal_pdf() -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let o1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let o2 = pdf.len();
        pdf.extend_from_slice(
            b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n",
        );
        let o3 = pdf.len();
        pdf.extend_from_slice(
            b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n",
        );
        let xref_at = pdf.len();
        pdf.extend_from_slice(b"xref\n0 4\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for o in [o1, o2, o3] {
            pdf.extend_from_slice(format!("{o:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(b"trailer\n<< /Size 4 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());
        pdf
    }

    #[test]
    fn parses_classic_table() {
        let mut xref = XRef::parse(minimal_pdf()).unwrap();
        assert!(matches!(
            xref.entry(0),
            Some(XRefEntry::Free { gen: 65535, .. })
        ));
        assert!(matches!(xref.entry(1), Some(XRefEntry::Uncompressed { .. })));

        let catalog = xref.catalog().unwrap();
        assert_eq!(catalog.get("Type").unwrap().as_name(), Some("Catalog"));
    }

    #[test]
    fn fetch_is_cached_and_idempotent() {
        let mut xref = XRef::parse(minimal_pdf()).unwrap();
        let r = ObjectRef::new(2, 0);
        let first = xref.fetch(r).unwrap();
        let second = xref.fetch(r).unwrap();
        assert_eq!(first, second);
        assert!(xref.cache.contains_key(&(2, 0)));
    }

    #[test]
    fn missing_object_resolves_to_null() {
        let mut xref = XRef::parse(minimal_pdf()).unwrap();
        assert!(xref.fetch(ObjectRef::new(99, 0)).unwrap().is_null());
    }

    #[test]
    fn reference_cycle_resolves_to_null() {
        // Object 1 references 2, which references 1 again.
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let o1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n2 0 R\nendobj\n");
        let o2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n1 0 R\nendobj\n");
        let xref_at = pdf.len();
        pdf.extend_from_slice(b"xref\n0 3\n0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{o1:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(format!("{o2:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());

        let mut xref = XRef::parse(pdf).unwrap();
        let resolved = xref
            .resolve(&Object::Reference(ObjectRef::new(1, 0)))
            .unwrap();
        assert!(resolved.is_null());
    }

    #[test]
    fn recovery_scan_handles_garbage_startxref() {
        let mut pdf = minimal_pdf();
        // Corrupt the startxref offset.
        let pos = pdf.windows(9).rposition(|w| w == b"startxref").unwrap();
        pdf[pos + 10..pos + 13].copy_from_slice(b"999");
        for b in pdf[pos + 13..].iter_mut() {
            if b.is_ascii_digit() {
                *b = b'9';
            }
        }

        let mut xref = XRef::parse(pdf).unwrap();
        let catalog = xref.catalog().unwrap();
        assert_eq!(catalog.get("Type").unwrap().as_name(), Some("Catalog"));
    }

    #[test]
    fn recovery_scan_without_any_xref() {
        let pdf = b"%PDF-1.4\n\
            1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
            2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n"
            .to_vec();
        let mut xref = XRef::parse(pdf).unwrap();
        let catalog = xref.catalog().unwrap();
        assert_eq!(catalog.get("Type").unwrap().as_name(), Some("Catalog"));
    }

    #[test]
    fn indirect_stream_length_is_resolved() {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let o1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Length 2 0 R >>\nstream\nHELLO WORLD\nendstream\nendobj\n");
        let o2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n11\nendobj\n");
        let xref_at = pdf.len();
        pdf.extend_from_slice(b"xref\n0 3\n0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{o1:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(format!("{o2:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());

        let mut xref = XRef::parse(pdf).unwrap();
        let obj = xref.fetch(ObjectRef::new(1, 0)).unwrap();
        assert_eq!(obj.as_stream().unwrap().data, b"HELLO WORLD");
    }

    #[test]
    fn object_streams_resolve() {
        // Container stream holding two small objects, addressed through an
        // xref stream.
        let inner = b"4 0 5 11 << /A 1 >> (text)";
        let first = 9; // "4 0 5 11 " is 9 bytes; offsets 0 and 11 follow
        let mut container = Vec::new();
        container.extend_from_slice(inner);

        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.5\n");
        let o1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let o2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let o3 = pdf.len();
        pdf.extend_from_slice(
            format!(
                "3 0 obj\n<< /Type /ObjStm /N 2 /First {first} /Length {} >>\nstream\n",
                container.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&container);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");

        // Xref stream: entries for objects 0-5, W [1 2 1].
        let xref_at = pdf.len();
        let mut rows: Vec<u8> = Vec::new();
        let mut push_row = |t: u8, mid: u16, last: u8| {
            rows.push(t);
            rows.extend_from_slice(&mid.to_be_bytes());
            rows.push(last);
        };
        push_row(0, 0, 0); // 0: free
        push_row(1, o1 as u16, 0); // 1
        push_row(1, o2 as u16, 0); // 2
        push_row(1, o3 as u16, 0); // 3: the ObjStm container
        push_row(2, 3, 0); // 4: in stream 3, index 0
        push_row(2, 3, 1); // 5: in stream 3, index 1
        push_row(1, xref_at as u16, 0); // 6: this xref stream

        pdf.extend_from_slice(
            format!(
                "6 0 obj\n<< /Type /XRef /Size 7 /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
                rows.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&rows);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        pdf.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());

        let mut xref = XRef::parse(pdf).unwrap();
        let obj4 = xref.fetch(ObjectRef::new(4, 0)).unwrap();
        assert_eq!(obj4.as_dict().unwrap().get("A").unwrap().as_int(), Some(1));
        let obj5 = xref.fetch(ObjectRef::new(5, 0)).unwrap();
        assert_eq!(obj5.as_string_bytes(), Some(&b"text"[..]));
    }

    #[test]
    fn prev_chain_prefers_newest_definition() {
        // Base file defines object 1; an incremental update redefines it.
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let o1_old = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n(old)\nendobj\n");
        let xref1 = pdf.len();
        pdf.extend_from_slice(b"xref\n0 2\n0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{o1_old:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 2 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{xref1}\n%%EOF\n").as_bytes());

        let o1_new = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n(new)\nendobj\n");
        let xref2 = pdf.len();
        pdf.extend_from_slice(b"xref\n1 1\n");
        pdf.extend_from_slice(format!("{o1_new:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(
            format!("trailer\n<< /Size 2 /Root 1 0 R /Prev {xref1} >>\n").as_bytes(),
        );
        pdf.extend_from_slice(format!("startxref\n{xref2}\n%%EOF\n").as_bytes());

        let mut xref = XRef::parse(pdf).unwrap();
        let obj = xref.fetch(ObjectRef::new(1, 0)).unwrap();
        assert_eq!(obj.as_string_bytes(), Some(&b"new"[..]));
    }
}
