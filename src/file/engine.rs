//! FileEngine: append, flush policy, read, seek, append-reopen, concatenated
//! file handling, trailer management (spec.md §4.5).

use crate::block::{BlockCodec, BlockIndexEntry, Record};
use crate::config::Config;
use crate::error::{ErrorKind, Result};
use crate::expr;
use crate::file::header::FileHeader;
use crate::file::trailer::FileTrailer;
use crate::frame::{Frame, BLOCK_DATA, BLOCK_HEADER, FILE_HEADER, FILE_TRAILER};
use crate::io::{SeekStream, Sink, Source};
use crate::schema::{AliasDescriptor, FieldDescriptor, FieldType, LengthKind, Schema, Value};
use crate::store::FieldGlobals;
use crate::xcdf_err;

/// High-water mark (bytes) past which staging buffers are shrunk back down
/// between blocks (spec.md §5).
const SHRINK_THRESHOLD: usize = 150 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Write,
    Read,
    Append,
}

/// Per-field global min/max/byte totals alongside the human-readable field
/// name, returned by [`FileEngine::check_globals`].
#[derive(Debug, Clone)]
pub struct GlobalsReport {
    pub field_name: String,
    pub globals: FieldGlobals,
}

pub struct FileEngine {
    mode: FileMode,
    schema: Schema,
    cfg: Config,

    sink: Option<Box<dyn Sink>>,
    source: Option<Box<dyn Source>>,
    seek_stream: Option<Box<dyn SeekStream>>,

    header_written: bool,
    total_events: u64,
    events_consumed: u64,
    block_count: u64,

    staged_records: Vec<Record>,
    staged_bytes_estimate: u64,

    block_entries: Vec<BlockIndexEntry>,
    globals: Vec<FieldGlobals>,
    comments: Vec<String>,

    block_table_complete: bool,
    header_end_offset: u64,
    end_of_blocks_offset: u64,

    // read-side current-block cursor
    current_block_records: Vec<Record>,
    current_block_pos: usize,
    current_block_start_event: u64,

    closed: bool,
}

impl FileEngine {
    fn blank(mode: FileMode, cfg: Config) -> Self {
        FileEngine {
            mode,
            schema: Schema::new(),
            cfg,
            sink: None,
            source: None,
            seek_stream: None,
            header_written: false,
            total_events: 0,
            events_consumed: 0,
            block_count: 0,
            staged_records: Vec::new(),
            staged_bytes_estimate: 0,
            block_entries: Vec::new(),
            globals: Vec::new(),
            comments: Vec::new(),
            block_table_complete: false,
            header_end_offset: 0,
            end_of_blocks_offset: 0,
            current_block_records: Vec::new(),
            current_block_pos: 0,
            current_block_start_event: 0,
            closed: false,
        }
    }

    fn as_sink(&mut self) -> &mut dyn Sink {
        if let Some(s) = &mut self.sink {
            return s.as_mut();
        }
        if let Some(s) = &mut self.seek_stream {
            return s.as_mut();
        }
        panic!("FileEngine: not in a write-capable mode");
    }

    fn as_source(&mut self) -> &mut dyn Source {
        if let Some(s) = &mut self.source {
            return s.as_mut();
        }
        if let Some(s) = &mut self.seek_stream {
            return s.as_mut();
        }
        panic!("FileEngine: not in a read-capable mode");
    }

    fn io_is_seekable(&self) -> bool {
        if let Some(s) = &self.sink {
            return s.is_seekable();
        }
        if let Some(s) = &self.source {
            return s.is_seekable();
        }
        self.seek_stream.is_some()
    }

    // ---- write path (spec.md §4.5.1) ----------------------------------

    pub fn create_write<W: Sink + 'static>(sink: W, cfg: Config) -> Self {
        let mut e = FileEngine::blank(FileMode::Write, cfg);
        e.sink = Some(Box::new(sink));
        e
    }

    pub fn allocate_u64_field(
        &mut self,
        name: impl Into<String>,
        resolution: u64,
        parent: impl Into<String>,
    ) -> Result<usize> {
        self.check_mutable_schema()?;
        self.schema.allocate_field(FieldDescriptor::vector(name, FieldType::U64, Value::U64(resolution), parent))
    }

    pub fn allocate_i64_field(
        &mut self,
        name: impl Into<String>,
        resolution: i64,
        parent: impl Into<String>,
    ) -> Result<usize> {
        self.check_mutable_schema()?;
        self.schema.allocate_field(FieldDescriptor::vector(name, FieldType::I64, Value::I64(resolution), parent))
    }

    pub fn allocate_f64_field(
        &mut self,
        name: impl Into<String>,
        resolution: f64,
        parent: impl Into<String>,
    ) -> Result<usize> {
        self.check_mutable_schema()?;
        self.schema.allocate_field(FieldDescriptor::vector(name, FieldType::F64, Value::F64(resolution), parent))
    }

    fn check_mutable_schema(&self) -> Result<()> {
        if self.schema.is_frozen() {
            return Err(xcdf_err!(ErrorKind::SchemaViolation(
                "schema is frozen: fields cannot be allocated after the first write/read".into()
            )));
        }
        Ok(())
    }

    pub fn add_alias(&mut self, name: impl Into<String>, expression: impl Into<String>) -> Result<()> {
        self.check_mutable_schema()?;
        let expression = expression.into();
        let ast = expr::parse(&expression, &self.schema)?;
        let ftype = ast.result_type();
        self.schema.add_alias(AliasDescriptor::new(name, expression, ftype))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn add_comment(&mut self, text: impl Into<String>) {
        self.comments.push(text.into());
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// `current_event_number` per spec.md §4.5.2: the index of the next
    /// event to be written while in write mode, or the index of the last
    /// event consumed while reading.
    pub fn current_event_number(&self) -> i64 {
        match self.mode {
            FileMode::Write => self.total_events as i64,
            _ => self.events_consumed as i64 - 1,
        }
    }

    /// File-wide event count. In write mode this is the number of events
    /// written so far. In read mode it is the trailer-derived total when a
    /// block table was found, else the number of events consumed so far
    /// (the true total is unknown until EOF without a trailer).
    pub fn total_events(&self) -> u64 {
        match self.mode {
            FileMode::Write => self.total_events,
            _ => {
                if self.block_table_complete {
                    self.total_events
                } else {
                    self.events_consumed
                }
            }
        }
    }

    fn ensure_header_written(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.schema.freeze();
        if self.globals.is_empty() {
            self.globals = vec![FieldGlobals::new(); self.schema.fields().len()];
        }
        let header = FileHeader {
            version: self.cfg.version,
            file_trailer_ptr: 0,
            fields: self.schema.fields().to_vec(),
            aliases: self.schema.aliases().to_vec(),
        };
        let frame = Frame::new(FILE_HEADER, header.pack());
        frame.write(self.as_sink(), self.cfg.deflate)?;
        self.header_end_offset = self.as_sink().tell()?;
        self.header_written = true;
        Ok(())
    }

    /// Validates and stages one record. `record[i]` holds field `i`'s raw
    /// values, in schema order.
    pub fn write(&mut self, record: Record) -> Result<()> {
        self.ensure_header_written()?;
        if record.len() != self.schema.fields().len() {
            return Err(xcdf_err!(ErrorKind::SchemaViolation(format!(
                "record has {} fields, schema declares {}",
                record.len(),
                self.schema.fields().len()
            ))));
        }
        for (i, fd) in self.schema.fields().iter().enumerate() {
            let expected = match self.schema.length_kind(i) {
                LengthKind::Scalar => 1,
                LengthKind::Vector1D(p) => record[p][0] as usize,
                LengthKind::VectorRecursive(p) => record[p].iter().sum::<u64>() as usize,
            };
            if record[i].len() != expected {
                return Err(xcdf_err!(ErrorKind::SchemaViolation(format!(
                    "field \"{}\" has {} entries, expected {}",
                    fd.name,
                    record[i].len(),
                    expected
                ))));
            }
            for v in &record[i] {
                self.globals[i].observe(fd.ftype, *v);
            }
        }

        self.staged_bytes_estimate += record.iter().map(|f| f.len() as u64 * 8).sum::<u64>();
        self.staged_records.push(record);
        self.total_events += 1;

        if BlockCodec::should_flush(&self.staged_records, self.staged_bytes_estimate, &self.cfg) {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.staged_records.is_empty() {
            return Ok(());
        }
        let fields = self.schema.fields().to_vec();
        let plans = BlockCodec::plan_fields(&fields, &self.staged_records, self.cfg.zero_align);
        let event_count = self.staged_records.len() as u32;
        let header = BlockCodec::header(&plans, event_count);
        let data = BlockCodec::pack_data(&fields, &plans, &self.staged_records);

        for (i, fd) in fields.iter().enumerate() {
            let bits = plans[i].active_size as u64;
            let n_values: usize = self.staged_records.iter().map(|r| r[i].len()).sum();
            self.globals[i].add_bytes((bits * n_values as u64 + 7) / 8);
            let _ = fd;
        }

        let file_ptr = self.as_sink().tell()?;
        let next_event_number = self.total_events - event_count as u64;

        Frame::new(BLOCK_HEADER, header.pack()).write(self.as_sink(), self.cfg.deflate)?;
        let mut data_fb = crate::frame::FrameBuffer::new();
        data_fb.append(&data);
        Frame::new(BLOCK_DATA, data_fb).write(self.as_sink(), self.cfg.deflate)?;

        self.block_entries.push(BlockIndexEntry { next_event_number, file_ptr });
        self.block_count += 1;

        self.staged_records.clear();
        self.staged_bytes_estimate = 0;
        if self.staged_records.capacity() * 64 > SHRINK_THRESHOLD {
            self.staged_records.shrink_to_fit();
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        match self.mode {
            FileMode::Write | FileMode::Append => {
                self.ensure_header_written()?;
                self.flush_block()?;
                let trailer_ptr = self.as_sink().tell()?;
                let mut trailer = FileTrailer::new();
                trailer.total_event_count = self.total_events;
                trailer.block_entries = self.block_entries.clone();
                trailer.comments = self.comments.clone();
                trailer.globals = self.globals.clone();
                trailer.aliases = self.schema.aliases().to_vec();
                Frame::new(FILE_TRAILER, trailer.pack(self.cfg.version)).write(self.as_sink(), self.cfg.deflate)?;

                if self.io_is_seekable() {
                    self.write_pos(0)?;
                    let header = FileHeader {
                        version: self.cfg.version,
                        file_trailer_ptr: trailer_ptr,
                        fields: self.schema.fields().to_vec(),
                        aliases: self.schema.aliases().to_vec(),
                    };
                    Frame::new(FILE_HEADER, header.pack()).write(self.as_sink(), self.cfg.deflate)?;
                }
            }
            FileMode::Read => {}
        }
        self.closed = true;
        Ok(())
    }

    fn write_pos(&mut self, pos: u64) -> Result<()> {
        if let Some(s) = &mut self.sink {
            return s.seek_to(pos);
        }
        if let Some(s) = &mut self.seek_stream {
            return Sink::seek_to(s.as_mut(), pos);
        }
        Err(xcdf_err!(ErrorKind::SeekUnsupported))
    }

    fn read_pos(&mut self, pos: u64) -> Result<()> {
        if let Some(s) = &mut self.source {
            return s.seek_to(pos);
        }
        if let Some(s) = &mut self.seek_stream {
            return Source::seek_to(s.as_mut(), pos);
        }
        Err(xcdf_err!(ErrorKind::SeekUnsupported))
    }

    fn read_tell(&mut self) -> Result<u64> {
        if let Some(s) = &mut self.source {
            return Ok(s.tell()?);
        }
        if let Some(s) = &mut self.seek_stream {
            return Ok(Source::tell(s.as_mut())?);
        }
        Err(xcdf_err!(ErrorKind::SeekUnsupported))
    }

    // ---- read path (spec.md §4.5.2) -----------------------------------

    pub fn open_read<R: Source + 'static>(source: R, cfg: Config) -> Result<Self> {
        let mut e = FileEngine::blank(FileMode::Read, cfg);
        e.source = Some(Box::new(source));
        e.open_read_common()?;
        Ok(e)
    }

    fn open_read_common(&mut self) -> Result<()> {
        let first_header = self.read_header_frame()?;
        self.header_end_offset = self.read_tell()?;
        self.load_schema_from_header(&first_header);
        self.schema.freeze();
        self.header_written = true;

        if first_header.file_trailer_ptr != 0 && self.io_is_seekable() {
            self.load_trailer_and_concat_segments(&first_header)?;
        }
        self.rewind_internal()?;
        Ok(())
    }

    fn read_header_frame(&mut self) -> Result<FileHeader> {
        let frame = Frame::read(self.as_source())?;
        if frame.frame_type != FILE_HEADER {
            return Err(xcdf_err!(ErrorKind::CorruptFrame("expected file header frame".into())));
        }
        FileHeader::unpack(frame.payload)
    }

    fn load_schema_from_header(&mut self, header: &FileHeader) {
        self.schema = Schema::new();
        for f in &header.fields {
            let _ = self.schema.allocate_field(f.clone());
        }
        for a in &header.aliases {
            let _ = self.schema.add_alias(a.clone());
        }
    }

    fn load_trailer_and_concat_segments(&mut self, first_header: &FileHeader) -> Result<()> {
        self.read_pos(first_header.file_trailer_ptr)?;
        let frame = Frame::read(self.as_source())?;
        if frame.frame_type != FILE_TRAILER {
            return Err(xcdf_err!(ErrorKind::CorruptFrame("expected file trailer frame".into())));
        }
        let trailer = FileTrailer::unpack(frame.payload, first_header.version)?;

        self.total_events = trailer.total_event_count;
        self.block_entries = trailer.block_entries;
        self.comments = trailer.comments;
        self.globals = trailer.globals;
        self.block_table_complete = true;
        self.end_of_blocks_offset = first_header.file_trailer_ptr;

        let mut running_event_count = self.total_events;
        let mut segment_base = self.read_tell()?;

        loop {
            if !Frame::peek_next_exists(self.as_source())? {
                break;
            }
            let candidate_start = self.read_tell()?;
            let frame = match Frame::read(self.as_source()) {
                Ok(f) => f,
                Err(_) => break,
            };
            if frame.frame_type != FILE_HEADER {
                self.read_pos(candidate_start)?;
                break;
            }
            let seg_header = FileHeader::unpack(frame.payload)?;
            if !self.schema.schema_equivalent(&{
                let mut s = Schema::new();
                for f in &seg_header.fields {
                    let _ = s.allocate_field(f.clone());
                }
                s
            }) {
                return Err(xcdf_err!(ErrorKind::SchemaViolation(
                    "concatenated segment header does not match the first segment's schema".into()
                )));
            }
            if seg_header.file_trailer_ptr == 0 {
                break;
            }
            self.read_pos(segment_base + seg_header.file_trailer_ptr)?;
            let trailer_frame = Frame::read(self.as_source())?;
            if trailer_frame.frame_type != FILE_TRAILER {
                return Err(xcdf_err!(ErrorKind::CorruptFrame("expected file trailer frame in segment".into())));
            }
            let seg_trailer = FileTrailer::unpack(trailer_frame.payload, seg_header.version)?;

            for entry in &seg_trailer.block_entries {
                self.block_entries.push(BlockIndexEntry {
                    next_event_number: entry.next_event_number + running_event_count,
                    file_ptr: entry.file_ptr + segment_base,
                });
            }
            running_event_count += seg_trailer.total_event_count;
            self.total_events = running_event_count;
            self.comments.extend(seg_trailer.comments);
            self.end_of_blocks_offset = segment_base + seg_header.file_trailer_ptr;

            segment_base = self.read_tell()?;
        }
        Ok(())
    }

    fn rewind_internal(&mut self) -> Result<()> {
        self.current_block_records.clear();
        self.current_block_pos = 0;
        self.current_block_start_event = 0;
        self.events_consumed = 0;
        if self.io_is_seekable() {
            self.read_pos(self.header_end_offset)?;
        }
        Ok(())
    }

    pub fn rewind(&mut self) -> Result<()> {
        if !self.io_is_seekable() {
            return Err(xcdf_err!(ErrorKind::SeekUnsupported));
        }
        self.rewind_internal()
    }

    fn load_next_block(&mut self) -> Result<bool> {
        loop {
            if !Frame::peek_next_exists(self.as_source())? {
                return Ok(false);
            }
            let frame = Frame::read(self.as_source())?;
            if frame.frame_type == FILE_TRAILER {
                // Sequential (non-seekable) read: a trailer just means this
                // segment is done. Loop around to see whether a
                // concatenated segment's header follows, or true EOF.
                continue;
            }
            if frame.frame_type == FILE_HEADER {
                // concatenated segment body with no discoverable trailer
                // (non-seekable source): schema must match; skip it.
                let seg_header = FileHeader::unpack(frame.payload)?;
                if !self.schema.fields().iter().eq(seg_header.fields.iter()) {
                    return Err(xcdf_err!(ErrorKind::SchemaViolation(
                        "concatenated segment header does not match the first segment's schema".into()
                    )));
                }
                continue;
            }
            if frame.frame_type != BLOCK_HEADER {
                return Err(xcdf_err!(ErrorKind::CorruptFrame("expected block header frame".into())));
            }
            let header = crate::block::BlockHeader::unpack(frame.payload, self.schema.fields().len())?;
            let data_frame = Frame::read(self.as_source())?;
            if data_frame.frame_type != BLOCK_DATA {
                return Err(xcdf_err!(ErrorKind::CorruptFrame("expected block data frame".into())));
            }
            let plans: Vec<_> = header
                .field_headers
                .iter()
                .map(|fh| crate::block::FieldPlan {
                    active_min: fh.raw_active_min,
                    active_size: fh.active_size,
                    passthrough: fh.active_size == 64,
                })
                .collect();
            let records =
                BlockCodec::unpack_data(&self.schema, &plans, header.event_count, data_frame.payload.into_bytes())?;
            self.current_block_start_event = self.events_consumed;
            self.current_block_records = records;
            self.current_block_pos = 0;
            if header.event_count > 0 {
                return Ok(true);
            }
        }
    }

    /// Decodes and returns the next record, or `None` at end of file.
    pub fn read(&mut self) -> Result<Option<Record>> {
        if self.current_block_pos >= self.current_block_records.len() {
            if !self.load_next_block()? {
                return Ok(None);
            }
        }
        let rec = self.current_block_records[self.current_block_pos].clone();
        self.current_block_pos += 1;
        self.events_consumed += 1;
        Ok(Some(rec))
    }

    // ---- seek (spec.md §4.5.3) -----------------------------------------

    pub fn seek(&mut self, absolute_event: u64) -> Result<()> {
        if absolute_event == self.events_consumed.saturating_sub(1) && self.events_consumed > 0 {
            return Ok(());
        }
        let block_start = self.current_block_start_event;
        let block_end = block_start + self.current_block_records.len() as u64;
        if absolute_event >= block_start
            && absolute_event < block_end
            && !self.current_block_records.is_empty()
        {
            self.current_block_pos = (absolute_event - block_start) as usize;
            self.events_consumed = absolute_event;
            let _ = self.read()?;
            return Ok(());
        }

        if self.block_table_complete {
            let mut best: Option<&BlockIndexEntry> = None;
            for e in &self.block_entries {
                if e.next_event_number <= absolute_event {
                    if best.map(|b| e.next_event_number > b.next_event_number).unwrap_or(true) {
                        best = Some(e);
                    }
                }
            }
            let entry = best.ok_or_else(|| {
                xcdf_err!(ErrorKind::SchemaViolation(format!("seek target {absolute_event} out of range")))
            })?;
            if absolute_event >= self.total_events {
                return Err(xcdf_err!(ErrorKind::SchemaViolation(format!(
                    "seek target {absolute_event} beyond end of file ({} events)",
                    self.total_events
                ))));
            }
            self.read_pos(entry.file_ptr)?;
            self.current_block_records.clear();
            self.current_block_pos = 0;
            self.events_consumed = entry.next_event_number;
            if !self.load_next_block()? {
                return Err(xcdf_err!(ErrorKind::SchemaViolation("seek target not found".into())));
            }
        } else {
            self.rewind()?;
        }

        while self.events_consumed <= absolute_event {
            if self.events_consumed == absolute_event {
                let _ = self.read()?;
                return Ok(());
            }
            if self.read()?.is_none() {
                return Err(xcdf_err!(ErrorKind::SchemaViolation(format!(
                    "seek target {absolute_event} out of range"
                ))));
            }
        }
        Ok(())
    }

    // ---- append (spec.md §4.5.4) ---------------------------------------

    /// Opens an existing file for append. Requires a seekable stream and a
    /// discoverable trailer pointer; the "scan the whole file" fallback the
    /// spec allows for a missing trailer pointer is not implemented (see
    /// DESIGN.md).
    pub fn open_append<T: SeekStream + 'static>(stream: T, cfg: Config) -> Result<Self> {
        let mut e = FileEngine::blank(FileMode::Read, cfg);
        e.seek_stream = Some(Box::new(stream));
        e.open_read_common()?;
        e.mode = FileMode::Append;

        if e.total_events == 0 {
            e.write_pos(e.header_end_offset)?;
            return Ok(e);
        }
        if !e.block_table_complete || e.end_of_blocks_offset == 0 {
            return Err(xcdf_err!(ErrorKind::SchemaViolation(
                "append requires a discoverable trailer pointer".into()
            )));
        }

        let last_entry = *e
            .block_entries
            .last()
            .ok_or_else(|| xcdf_err!(ErrorKind::CorruptBlock("trailer reports events but no blocks".into())))?;
        let last_block_count = e.total_events - last_entry.next_event_number;

        if last_block_count < e.cfg.block_size as u64 {
            e.block_entries.pop();
            e.read_pos(last_entry.file_ptr)?;
            e.current_block_records.clear();
            e.current_block_pos = 0;
            e.events_consumed = last_entry.next_event_number;
            e.load_next_block()?;
            let replay = std::mem::take(&mut e.current_block_records);

            e.write_pos(last_entry.file_ptr)?;
            e.total_events = last_entry.next_event_number;
            // Globals already reflect these events from the trailer we just
            // read; re-stage them for the next flush without re-observing,
            // so total_bytes_written/min/max are not double-counted.
            for rec in replay {
                e.staged_bytes_estimate += rec.iter().map(|f| f.len() as u64 * 8).sum::<u64>();
                e.staged_records.push(rec);
                e.total_events += 1;
            }
        } else {
            e.write_pos(e.end_of_blocks_offset)?;
        }

        e.current_block_records.clear();
        e.current_block_pos = 0;
        Ok(e)
    }

    // ---- globals (spec.md §4.5.5) --------------------------------------

    pub fn check_globals(&mut self) -> Result<Vec<GlobalsReport>> {
        let mut recomputed = vec![FieldGlobals::new(); self.schema.fields().len()];
        self.rewind()?;
        while let Some(rec) = self.read()? {
            for (i, fd) in self.schema.fields().iter().enumerate() {
                for v in &rec[i] {
                    recomputed[i].observe(fd.ftype, *v);
                }
            }
        }
        self.rewind()?;
        Ok(self
            .schema
            .fields()
            .iter()
            .zip(recomputed)
            .map(|(fd, g)| GlobalsReport { field_name: fd.name.clone(), globals: g })
            .collect())
    }
}
