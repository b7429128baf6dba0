//! Host-side aliases for the virtual machine's value widths.
//!
//! The VM is a 64-bit stack machine; these aliases pin the exact host type
//! backing each atomic master type so literal payloads, constant folding,
//! and instruction arguments all agree on widths.

/// Boolean cell.
pub type CpuBol = bool;
/// Character cell (unsigned byte).
pub type CpuChr = u8;
/// Short integer cell.
pub type CpuShr = i16;
/// Integer cell.
pub type CpuInt = i32;
/// Long integer cell.
pub type CpuLon = i64;
/// Floating point cell.
pub type CpuFlo = f64;
/// Machine word: array indexes, sizes and offsets.
pub type CpuWrd = i64;
/// Address into the binary's global/string space.
pub type CpuAdr = u64;
