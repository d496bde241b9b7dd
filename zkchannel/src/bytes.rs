//{{ Liquid }}
//Copyright (C) {{ 2015,2016,2017,2018 }}  {{ Blockstream }}

//This program is free software: you can redistribute it and/or modify
//it under the terms of the GNU Affero General Public License as published by
//the Free Software Foundation, either version 3 of the License, or
//(at your option) any later version.

//This program is distributed in the hope that it will be useful,
//but WITHOUT ANY WARRANTY; without even the implied warranty of
//MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//GNU Affero General Public License for more details.

//You should have received a copy of the GNU Affero General Public License
//along with this program.  If not, see <http://www.gnu.org/licenses/>.


//! # Byte and Hash Primitives
//! Hashes, Bitcoin varints and a small writer/reader pair for
//! little-endian wire data
//!

use std::io::{self, Read, Write};

use bitcoin::hashes::{hash160, sha256, sha256d, Hash};
use bitcoin::opcodes;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use common::util::build_scriptint;
use Error;

/// Single SHA256
pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha256::Hash::hash(data).to_byte_array()
}

/// Double SHA256, as used for txids and signature hashes
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// Number of bytes the varint encoding of `n` takes.
pub fn varint_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Append-only buffer for transaction and script bytes.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// An empty writer
    pub fn new() -> ByteWriter {
        ByteWriter { buf: vec![] }
    }

    /// An empty writer with room for `n` bytes
    pub fn with_capacity(n: usize) -> ByteWriter {
        ByteWriter { buf: Vec::with_capacity(n) }
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Append one byte
    pub fn push_u8(&mut self, n: u8) -> &mut Self {
        self.buf.push(n);
        self
    }

    /// Append a little-endian u16
    pub fn push_u16(&mut self, n: u16) -> &mut Self {
        let mut b = [0; 2];
        LittleEndian::write_u16(&mut b, n);
        self.push_slice(&b)
    }

    /// Append a little-endian u32
    pub fn push_u32(&mut self, n: u32) -> &mut Self {
        let mut b = [0; 4];
        LittleEndian::write_u32(&mut b, n);
        self.push_slice(&b)
    }

    /// Append a little-endian u64
    pub fn push_u64(&mut self, n: u64) -> &mut Self {
        let mut b = [0; 8];
        LittleEndian::write_u64(&mut b, n);
        self.push_slice(&b)
    }

    /// Append raw bytes
    pub fn push_slice(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Append a Bitcoin compact-size integer
    pub fn push_varint(&mut self, n: u64) -> &mut Self {
        match varint_len(n) {
            1 => self.push_u8(n as u8),
            3 => self.push_u8(0xfd).push_u16(n as u16),
            5 => self.push_u8(0xfe).push_u32(n as u32),
            _ => self.push_u8(0xff).push_u64(n),
        }
    }

    /// Append a varint length prefix followed by the bytes
    pub fn push_var_slice(&mut self, data: &[u8]) -> &mut Self {
        self.push_varint(data.len() as u64).push_slice(data)
    }

    /// Append a script opcode
    pub fn push_opcode(&mut self, op: opcodes::Opcode) -> &mut Self {
        self.push_u8(op.to_u8())
    }

    /// Append a minimal script data push
    pub fn push_data(&mut self, data: &[u8]) -> &mut Self {
        let n = data.len();
        if n < opcodes::all::OP_PUSHDATA1.to_u8() as usize {
            self.push_u8(n as u8);
        } else if n <= 0xff {
            self.push_opcode(opcodes::all::OP_PUSHDATA1).push_u8(n as u8);
        } else if n <= 0xffff {
            self.push_opcode(opcodes::all::OP_PUSHDATA2).push_u16(n as u16);
        } else {
            self.push_opcode(opcodes::all::OP_PUSHDATA4).push_u32(n as u32);
        }
        self.push_slice(data)
    }

    /// Append a script number, using the small-integer opcodes where possible
    pub fn push_int(&mut self, n: i64) -> &mut Self {
        if n == 0 {
            self.push_opcode(opcodes::OP_0)
        } else if n == -1 {
            self.push_opcode(opcodes::all::OP_PUSHNUM_NEG1)
        } else if n >= 1 && n <= 16 {
            self.push_u8(opcodes::all::OP_PUSHNUM_1.to_u8() + n as u8 - 1)
        } else {
            self.push_data(&build_scriptint(n))
        }
    }
}

/// Write a varint to an `io::Write`, returning the number of bytes written.
pub fn write_varint<W: Write>(mut w: W, n: u64) -> Result<usize, Error> {
    let mut bw = ByteWriter::with_capacity(9);
    bw.push_varint(n);
    w.write_all(bw.as_bytes())?;
    Ok(bw.len())
}

/// Read a varint from an `io::Read`, rejecting non-minimal encodings.
pub fn read_varint<R: Read>(mut r: R) -> Result<u64, Error> {
    let n = match r.read_u8()? {
        0xff => {
            let n = r.read_u64::<LittleEndian>()?;
            if n <= 0xffff_ffff {
                return Err(Error::Parse("non-minimal varint"));
            }
            n
        }
        0xfe => {
            let n = u64::from(r.read_u32::<LittleEndian>()?);
            if n <= 0xffff {
                return Err(Error::Parse("non-minimal varint"));
            }
            n
        }
        0xfd => {
            let n = u64::from(r.read_u16::<LittleEndian>()?);
            if n < 0xfd {
                return Err(Error::Parse("non-minimal varint"));
            }
            n
        }
        n => u64::from(n),
    };
    Ok(n)
}

/// Cursor over a byte slice, for parsing the structures we serialize.
pub struct ByteReader<'a> {
    cursor: io::Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    /// Start reading at the beginning of `data`
    pub fn new(data: &'a [u8]) -> ByteReader<'a> {
        ByteReader { cursor: io::Cursor::new(data) }
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        let total = self.cursor.get_ref().len();
        total - (self.cursor.position() as usize).min(total)
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Option<u8> {
        let pos = self.cursor.position() as usize;
        self.cursor.get_ref().get(pos).cloned()
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.cursor.read_u8()?)
    }

    /// Read a little-endian u32
    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(self.cursor.read_u32::<LittleEndian>()?)
    }

    /// Read a little-endian u64
    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(self.cursor.read_u64::<LittleEndian>()?)
    }

    /// Read a varint
    pub fn read_varint(&mut self) -> Result<u64, Error> {
        read_varint(&mut self.cursor)
    }

    /// Read exactly `n` bytes
    pub fn read_slice(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        if n > self.remaining() {
            return Err(Error::Parse("unexpected end of data"));
        }
        let mut ret = vec![0; n];
        self.cursor.read_exact(&mut ret)?;
        Ok(ret)
    }

    /// Read a fixed 32-byte field
    pub fn read_hash(&mut self) -> Result<[u8; 32], Error> {
        let mut ret = [0; 32];
        if self.remaining() < 32 {
            return Err(Error::Parse("unexpected end of data"));
        }
        self.cursor.read_exact(&mut ret)?;
        Ok(ret)
    }

    /// Read a varint length followed by that many bytes
    pub fn read_var_slice(&mut self) -> Result<Vec<u8>, Error> {
        let n = self.read_varint()?;
        if n > self.remaining() as u64 {
            return Err(Error::Parse("length prefix exceeds data"));
        }
        self.read_slice(n as usize)
    }
}
