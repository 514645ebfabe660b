// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The RLE/bit-packed hybrid encoding used for levels and dictionary
//! indices.
//!
//! The stream is a sequence of runs, each preceded by a ULEB128 header:
//! `header = run_length << 1` for a repeated run (the value follows once, in
//! `ceil(bit_width / 8)` little-endian bytes), and
//! `header = num_groups << 1 | 1` for a bit-packed run of `num_groups * 8`
//! values at `bit_width` bits each, LSB-first.

use crate::util::bit_util::{ceil, pack8_le, unpack8_le};

/// Bit-packed runs use a single reserved header byte, which caps the run at
/// 63 groups of 8 values.
const MAX_GROUPS_PER_BIT_PACKED_RUN: usize = 63;

/// Streaming encoder for the hybrid format. Values must fit in `bit_width`
/// bits.
pub struct RleEncoder {
    bit_width: u8,
    buffer: Vec<u8>,
    /// Candidate values for the next bit-packed group.
    buffered: [u64; 8],
    num_buffered: usize,
    /// Value and length of the current trailing run of equal values.
    current_value: u64,
    repeat_count: usize,
    /// State of the open bit-packed run, if any: position of its header byte
    /// and number of groups written so far.
    indicator_pos: usize,
    open_groups: usize,
    run_open: bool,
}

impl RleEncoder {
    pub fn new(bit_width: u8) -> Self {
        Self::new_from_buf(bit_width, Vec::new())
    }

    /// Continues encoding into `buffer`, which may already hold a prefix
    /// (e.g. a length placeholder).
    pub fn new_from_buf(bit_width: u8, buffer: Vec<u8>) -> Self {
        assert!(bit_width <= 32, "bit width {bit_width} out of range");
        Self {
            bit_width,
            buffer,
            buffered: [0; 8],
            num_buffered: 0,
            current_value: 0,
            repeat_count: 0,
            indicator_pos: 0,
            open_groups: 0,
            run_open: false,
        }
    }

    /// Size in bytes the encoding can reach for `num_values` values: all
    /// minimal bit-packed runs, each with a one-byte header.
    pub fn max_buffer_size(bit_width: u8, num_values: usize) -> usize {
        ceil(num_values, 8) * (1 + bit_width as usize)
    }

    // Invariants: `repeat_count` counts only pending (unwritten) trailing
    // values equal to `current_value`. Once it reaches 8 the buffered group
    // is surrendered to an in-progress repeated run and `num_buffered` stays
    // 0 until the run breaks.
    pub fn put(&mut self, value: u64) {
        debug_assert!(self.bit_width == 32 || value < (1u64 << self.bit_width));
        if self.repeat_count >= 8 {
            if value == self.current_value {
                self.repeat_count += 1;
                return;
            }
            self.flush_repeated_run();
        }

        if value == self.current_value && (self.repeat_count > 0 || self.num_buffered > 0) {
            self.repeat_count += 1;
        } else {
            self.repeat_count = 1;
            self.current_value = value;
        }

        self.buffered[self.num_buffered] = value;
        self.num_buffered += 1;
        if self.num_buffered == 8 {
            if self.repeat_count == 8 {
                // a whole group of one value: hold it back for a repeated run
                self.close_bit_packed_run();
                self.num_buffered = 0;
            } else {
                self.flush_group();
                // the group's values are written; trailing equals no longer
                // count towards a run
                self.repeat_count = 0;
                self.current_value = self.buffered[7];
            }
        }
    }

    /// Number of encoded bytes, were the stream flushed now.
    pub fn len(&self) -> usize {
        let pending = if self.num_buffered > 0 || self.repeat_count > 0 {
            // worst case: one more header plus one group or run value
            1 + (self.bit_width as usize).max(ceil(self.bit_width as usize, 8))
        } else {
            0
        };
        self.buffer.len() + pending
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Terminates all open runs. The encoder remains usable; new values
    /// start fresh runs.
    pub fn flush(&mut self) {
        if self.repeat_count >= 8 || (!self.run_open && self.repeat_count == self.num_buffered && self.repeat_count > 0)
        {
            // either an in-progress repeated run, or all pending values are
            // one value: a short repeated run beats a padded group
            self.flush_repeated_run();
        } else if self.num_buffered > 0 {
            // zero-pad the trailing partial group; the value count in the
            // page header tells readers where real values end
            for i in self.num_buffered..8 {
                self.buffered[i] = 0;
            }
            self.num_buffered = 8;
            self.flush_group();
        }
        self.close_bit_packed_run();
        self.repeat_count = 0;
        self.num_buffered = 0;
    }

    /// Flushes and returns the encoded bytes.
    pub fn consume(mut self) -> Vec<u8> {
        self.flush();
        self.buffer
    }

    fn flush_repeated_run(&mut self) {
        debug_assert!(self.repeat_count > 0);
        self.close_bit_packed_run();
        write_vlq(&mut self.buffer, (self.repeat_count as u64) << 1);
        let value_bytes = ceil(self.bit_width as usize, 8);
        self.buffer
            .extend_from_slice(&self.current_value.to_le_bytes()[..value_bytes]);
        self.repeat_count = 0;
        self.num_buffered = 0;
    }

    fn flush_group(&mut self) {
        debug_assert_eq!(self.num_buffered, 8);
        if !self.run_open {
            self.indicator_pos = self.buffer.len();
            self.buffer.push(0);
            self.open_groups = 0;
            self.run_open = true;
        }
        let width = self.bit_width as usize;
        let mut packed = [0u8; 32];
        pack8_le(width, &self.buffered, &mut packed[..width]);
        self.buffer.extend_from_slice(&packed[..width]);
        self.open_groups += 1;
        self.num_buffered = 0;
        if self.open_groups == MAX_GROUPS_PER_BIT_PACKED_RUN {
            self.close_bit_packed_run();
        }
    }

    fn close_bit_packed_run(&mut self) {
        if self.run_open {
            self.buffer[self.indicator_pos] = ((self.open_groups as u8) << 1) | 1;
            self.run_open = false;
            self.open_groups = 0;
        }
    }
}

fn write_vlq(buffer: &mut Vec<u8>, mut v: u64) {
    while v > 0x7f {
        buffer.push(v as u8 | 0x80);
        v >>= 7;
    }
    buffer.push(v as u8);
}

/// Decoder for the hybrid format; exercised by tests to prove the encoder's
/// streams read back exactly.
pub struct RleDecoder<'a> {
    bit_width: u8,
    data: &'a [u8],
    pos: usize,
    // current run
    rle_value: u64,
    rle_left: usize,
    packed: [u64; 8],
    packed_pos: usize,
    packed_left: usize,
    packed_groups_left: usize,
}

impl<'a> RleDecoder<'a> {
    pub fn new(bit_width: u8, data: &'a [u8]) -> Self {
        Self {
            bit_width,
            data,
            pos: 0,
            rle_value: 0,
            rle_left: 0,
            packed: [0; 8],
            packed_pos: 0,
            packed_left: 0,
            packed_groups_left: 0,
        }
    }

    /// Decodes the next `count` values; fails if the stream ends early.
    pub fn decode(&mut self, count: usize) -> Option<Vec<u64>> {
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            if self.rle_left > 0 {
                out.push(self.rle_value);
                self.rle_left -= 1;
            } else if self.packed_left > 0 {
                out.push(self.packed[self.packed_pos]);
                self.packed_pos += 1;
                self.packed_left -= 1;
            } else if self.packed_groups_left > 0 {
                self.read_group()?;
            } else {
                self.read_run_header()?;
            }
        }
        Some(out)
    }

    fn read_run_header(&mut self) -> Option<()> {
        let mut header = 0u64;
        let mut shift = 0;
        loop {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            header |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        if header & 1 == 1 {
            self.packed_groups_left = (header >> 1) as usize;
        } else {
            let value_bytes = ceil(self.bit_width as usize, 8);
            let mut value = [0u8; 8];
            value[..value_bytes].copy_from_slice(self.data.get(self.pos..self.pos + value_bytes)?);
            self.pos += value_bytes;
            self.rle_value = u64::from_le_bytes(value);
            self.rle_left = (header >> 1) as usize;
        }
        Some(())
    }

    fn read_group(&mut self) -> Option<()> {
        let width = self.bit_width as usize;
        let bytes = self.data.get(self.pos..self.pos + width)?;
        unpack8_le(width, bytes, &mut self.packed);
        self.pos += width;
        self.packed_pos = 0;
        self.packed_left = 8;
        self.packed_groups_left -= 1;
        Some(())
    }
}
