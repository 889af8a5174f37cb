//! Linear memory access (spec §4.1).
//!
//! `GuestMemory` is the concrete shape of the "external WASM engine" that
//! spec.md §1 assumes: something that exposes a growable byte buffer the
//! host can read/write by offset. [`WasmerMemory`] adapts a real
//! `wasmer::Memory` (following the `read_guest_bytes`/`write_guest_bytes`
//! helpers in the teacher's `host.rs`); [`VecMemory`] backs the same trait
//! with a plain `Vec<u8>` so intrinsics can be exercised without an actual
//! compiled guest module.

use crate::error::MemoryError;

pub trait GuestMemory {
    fn size(&self) -> u64;
    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>, MemoryError>;
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), MemoryError>;
}

/// In-memory `GuestMemory`, used by tests and by any embedder that isn't
/// driving a real wasmer instance.
#[derive(Debug, Default)]
pub struct VecMemory(pub Vec<u8>);

impl VecMemory {
    pub fn new(size: usize) -> Self {
        VecMemory(vec![0u8; size])
    }
}

impl GuestMemory for VecMemory {
    fn size(&self) -> u64 {
        self.0.len() as u64
    }

    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>, MemoryError> {
        let end = offset.checked_add(len).ok_or(MemoryError {
            offset,
            len,
            memory_size: self.size(),
        })?;
        if end > self.size() {
            return Err(MemoryError {
                offset,
                len,
                memory_size: self.size(),
            });
        }
        Ok(self.0[offset as usize..end as usize].to_vec())
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), MemoryError> {
        let len = data.len() as u64;
        let end = offset.checked_add(len).ok_or(MemoryError {
            offset,
            len,
            memory_size: self.size(),
        })?;
        if end > self.size() {
            return Err(MemoryError {
                offset,
                len,
                memory_size: self.size(),
            });
        }
        self.0[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }
}

/// Adapts a real wasmer guest instance's exported `"memory"` to
/// [`GuestMemory`]. Mirrors the teacher's `HostState { memory: Option<Memory>, .. }`
/// plus its `read_guest_bytes`/`write_guest_bytes` pair, generalized behind
/// the trait so `HostEnv` never needs to know it's talking to wasmer.
pub struct WasmerMemory<'a> {
    pub memory: &'a wasmer::Memory,
    pub store: &'a wasmer::StoreRef<'a>,
}

impl<'a> GuestMemory for WasmerMemory<'a> {
    fn size(&self) -> u64 {
        self.memory.view(self.store).data_size()
    }

    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>, MemoryError> {
        let view = self.memory.view(self.store);
        let mut buf = vec![0u8; len as usize];
        view.read(offset, &mut buf).map_err(|_| MemoryError {
            offset,
            len,
            memory_size: view.data_size(),
        })?;
        Ok(buf)
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), MemoryError> {
        let view = self.memory.view(self.store);
        let len = data.len() as u64;
        view.write(offset, data).map_err(|_| MemoryError {
            offset,
            len,
            memory_size: view.data_size(),
        })
    }
}

/// Bounded, typed access to a [`GuestMemory`] (spec §4.1: u32/u64
/// little-endian, signed/unsigned 128-bit, UTF-8/C-string, hex).
pub struct LinearMemoryView<'a> {
    mem: &'a mut dyn GuestMemory,
}

impl<'a> LinearMemoryView<'a> {
    pub fn new(mem: &'a mut dyn GuestMemory) -> Self {
        LinearMemoryView { mem }
    }

    pub fn slice(&self, ptr: u32, len: u32) -> Result<Vec<u8>, MemoryError> {
        self.mem.read(ptr as u64, len as u64)
    }

    pub fn write_slice(&mut self, ptr: u32, data: &[u8]) -> Result<(), MemoryError> {
        self.mem.write(ptr as u64, data)
    }

    pub fn read_u32(&self, ptr: u32) -> Result<u32, MemoryError> {
        let bytes = self.slice(ptr, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn write_u32(&mut self, ptr: u32, value: u32) -> Result<(), MemoryError> {
        self.write_slice(ptr, &value.to_le_bytes())
    }

    pub fn read_u64(&self, ptr: u32) -> Result<u64, MemoryError> {
        let bytes = self.slice(ptr, 8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn write_u64(&mut self, ptr: u32, value: u64) -> Result<(), MemoryError> {
        self.write_slice(ptr, &value.to_le_bytes())
    }

    pub fn read_u128(&self, ptr: u32) -> Result<u128, MemoryError> {
        let bytes = self.slice(ptr, 16)?;
        Ok(u128::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_i128(&self, ptr: u32) -> Result<i128, MemoryError> {
        let bytes = self.slice(ptr, 16)?;
        Ok(i128::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn write_u128(&mut self, ptr: u32, value: u128) -> Result<(), MemoryError> {
        self.write_slice(ptr, &value.to_le_bytes())
    }

    /// Reads a UTF-8 string of exactly `len` bytes.
    pub fn read_str(&self, ptr: u32, len: u32) -> Result<String, MemoryError> {
        let bytes = self.slice(ptr, len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads a NUL-terminated C string starting at `ptr`, scanning up to
    /// `max_len` bytes (unbounded if `None`, capped at the memory size).
    pub fn read_cstr(&self, ptr: u32, max_len: Option<u32>) -> Result<String, MemoryError> {
        let cap = max_len.unwrap_or(self.mem.size().saturating_sub(ptr as u64) as u32);
        let bytes = self.slice(ptr, cap)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Reads `len` bytes and hex-decodes them.
    pub fn read_hex(&self, ptr: u32, len: u32) -> Result<Vec<u8>, MemoryError> {
        let bytes = self.slice(ptr, len)?;
        hex::decode(&bytes).map_err(|_| MemoryError {
            offset: ptr as u64,
            len: len as u64,
            memory_size: self.mem.size(),
        })
    }

    pub fn size(&self) -> u64 {
        self.mem.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_roundtrip() {
        let mut backing = VecMemory::new(64);
        let mut view = LinearMemoryView::new(&mut backing);
        view.write_u64(0, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(view.read_u64(0).unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn u128_is_little_endian_low_high() {
        let mut backing = VecMemory::new(32);
        let mut view = LinearMemoryView::new(&mut backing);
        let value: u128 = (7u128 << 64) | 3u128;
        view.write_u128(0, value).unwrap();
        let lo = view.read_u64(0).unwrap();
        let hi = view.read_u64(8).unwrap();
        assert_eq!(lo, 3);
        assert_eq!(hi, 7);
    }

    #[test]
    fn out_of_bounds_is_fatal() {
        let mut backing = VecMemory::new(4);
        let view = LinearMemoryView::new(&mut backing);
        assert!(view.read_u64(0).is_err());
    }

    #[test]
    fn cstr_stops_at_nul() {
        let mut backing = VecMemory::new(16);
        let mut view = LinearMemoryView::new(&mut backing);
        view.write_slice(0, b"hi\0garbage").unwrap();
        assert_eq!(view.read_cstr(0, None).unwrap(), "hi");
    }

    #[test]
    fn hex_read_decodes() {
        let mut backing = VecMemory::new(16);
        let mut view = LinearMemoryView::new(&mut backing);
        view.write_slice(0, b"deadbeef").unwrap();
        assert_eq!(view.read_hex(0, 8).unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }
}
