//! Save stream framing.
//!
//! A save starts with the magic `GLB2` and one byte-order flag. Sections
//! are bincode with fixed-width integers in the recorded byte order, each
//! major section followed by a four-byte signature.

use std::io::{Read, Write};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{GameError, Result};

/// Stream magic.
pub const MAGIC: [u8; 4] = *b"GLB2";

/// Signature after the headers.
pub const SIG_BEGIN: [u8; 4] = *b"GaBe";
/// Signature after the step counter and seeds.
pub const SIG_SYNC: [u8; 4] = *b"GaSy";
/// Signature after the teams.
pub const SIG_TEAMS: [u8; 4] = *b"GaTe";
/// Signature after the map.
pub const SIG_MAP: [u8; 4] = *b"GaMa";
/// Signature after the players.
pub const SIG_PLAYERS: [u8; 4] = *b"GaPl";

/// Integer byte order of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    /// Byte order of the running platform.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Flag byte recorded after the magic.
    #[must_use]
    pub const fn flag(self) -> u8 {
        match self {
            Self::Little => 0,
            Self::Big => 1,
        }
    }

    /// Parse a flag byte.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::BadByteOrder`] for unknown flags.
    pub fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            0 => Ok(Self::Little),
            1 => Ok(Self::Big),
            other => Err(GameError::BadByteOrder(other)),
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

/// Write `value` as one section.
pub fn write_section<W: Write, T: Serialize + ?Sized>(
    w: &mut W,
    order: ByteOrder,
    value: &T,
) -> Result<()> {
    let base = bincode::DefaultOptions::new().with_fixint_encoding();
    match order {
        ByteOrder::Little => base.with_little_endian().serialize_into(w, value)?,
        ByteOrder::Big => base.with_big_endian().serialize_into(w, value)?,
    }
    Ok(())
}

/// Largest section a stream may declare, in bytes.
///
/// Bounds allocations driven by corrupted length prefixes.
pub const MAX_SECTION_BYTES: u64 = 256 * 1024 * 1024;

/// Read one section.
///
/// # Errors
///
/// Fails on malformed data, including any section whose declared
/// lengths exceed [`MAX_SECTION_BYTES`].
pub fn read_section<R: Read, T: DeserializeOwned>(r: &mut R, order: ByteOrder) -> Result<T> {
    let base = bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_SECTION_BYTES);
    let value = match order {
        ByteOrder::Little => base.with_little_endian().deserialize_from(r)?,
        ByteOrder::Big => base.with_big_endian().deserialize_from(r)?,
    };
    Ok(value)
}

/// Write a signature.
pub fn write_signature<W: Write>(w: &mut W, signature: [u8; 4]) -> Result<()> {
    w.write_all(&signature)?;
    Ok(())
}

/// Read a signature and compare it with the expected one.
///
/// # Errors
///
/// Returns [`GameError::SignatureMismatch`] naming `section` on mismatch.
pub fn expect_signature<R: Read>(r: &mut R, section: &'static str, expected: [u8; 4]) -> Result<()> {
    let mut found = [0u8; 4];
    r.read_exact(&mut found)?;
    if found == expected {
        Ok(())
    } else {
        Err(GameError::signature(section, expected, found))
    }
}

/// Write the magic and byte-order flag.
pub fn write_preamble<W: Write>(w: &mut W, order: ByteOrder) -> Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&[order.flag()])?;
    Ok(())
}

/// Read the magic and byte-order flag.
///
/// # Errors
///
/// Returns [`GameError::BadMagic`] if the stream is not a save.
pub fn read_preamble<R: Read>(r: &mut R) -> Result<ByteOrder> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(GameError::BadMagic);
    }
    let mut flag = [0u8; 1];
    r.read_exact(&mut flag)?;
    ByteOrder::from_flag(flag[0])
}
