//! The redundant byte store: every logical byte is written twice, once at its
//! own offset and once mirrored at `capacity - 1 - offset`, so a disagreement
//! between the halves exposes interrupted or decayed writes at the next boot.

use crate::SIGNATURE;
use crate::error::Error;
use crate::platform::Platform;
#[cfg(feature = "defmt")]
use defmt::trace;
#[cfg(feature = "defmt")]
use defmt::warn;

/// Verdict of [`MirrorStore::verify`]. Anything but `Valid` means the region
/// was never initialized by this firmware or has lost integrity, and must be
/// reset before any field in it is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Integrity {
    Valid,

    /// The signature block does not match [`SIGNATURE`]. `offset` is the first
    /// disagreeing byte.
    MissingSignature { offset: u32, expected: u8, found: u8 },

    /// A logical byte disagrees with its mirror. `offset` is the logical side,
    /// `mirror_offset` its complement.
    MirrorMismatch {
        offset: u32,
        mirror_offset: u32,
        value: u8,
        mirror_value: u8,
    },
}

impl Integrity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Integrity::Valid)
    }
}

/// Integrity-checked persistence of raw bytes over a [`Platform`] medium.
///
/// Only offsets below `capacity / 2` hold logical data; the upper half mirrors
/// the lower one byte for byte, in reverse order. The store never commits on
/// its own: callers batch writes and decide when to [`MirrorStore::commit`].
pub struct MirrorStore<T: Platform> {
    hal: T,
    size: usize,
}

impl<T: Platform> MirrorStore<T> {
    /// Takes ownership of the medium. The capacity must be even and the
    /// logical half must at least fit the signature block.
    pub fn new(hal: T) -> Result<Self, Error> {
        let size = hal.capacity();
        if !size.is_multiple_of(2) || size / 2 < SIGNATURE.len() {
            return Err(Error::InvalidCapacity);
        }

        Ok(Self { hal, size })
    }

    /// Total size of the region in bytes.
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Size of the half that holds logical data.
    pub fn logical_capacity(&self) -> usize {
        self.size / 2
    }

    fn mirror_of(&self, offset: u32) -> u32 {
        self.size as u32 - 1 - offset
    }

    /// Writes `value` at `offset` and, for offsets in the logical half, at the
    /// mirror offset as well. A write aimed directly into the mirror half is
    /// an addressing mistake by the caller: it still happens, but unmirrored
    /// and with a warning, and `verify` will flag the region unless the caller
    /// knew exactly what it was doing.
    pub fn write_byte(&mut self, offset: u32, value: u8) -> Result<(), Error> {
        if offset as usize >= self.size {
            return Err(Error::EepromError);
        }

        self.hal
            .write(offset, &[value])
            .map_err(|_| Error::EepromError)?;

        if (offset as usize) < self.size / 2 {
            self.hal
                .write(self.mirror_of(offset), &[value])
                .map_err(|_| Error::EepromError)?;
        } else {
            #[cfg(feature = "defmt")]
            warn!("write at {} lands in the mirror half, not mirrored", offset);

            #[cfg(feature = "debug-logs")]
            println!("  MirrorStore: unmirrored write at {offset}");
        }

        Ok(())
    }

    /// Writes the text at consecutive offsets followed by one terminating zero
    /// byte, occupying `value.len() + 1` logical bytes.
    pub fn write_str(&mut self, offset: u32, value: &str) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write_str: @{} len {}", offset, value.len());

        for (i, byte) in value.bytes().enumerate() {
            self.write_byte(offset + i as u32, byte)?;
        }
        self.write_byte(offset + value.len() as u32, 0)
    }

    /// Reads up to `N` bytes starting at `offset`, stopping at the first zero
    /// byte. Values shorter than `N` are the expected case, not an error.
    pub fn read_str<const N: usize>(&mut self, offset: u32) -> Result<heapless::String<N>, Error> {
        let mut buf = [0u8; N];
        let len = N.min(self.size.saturating_sub(offset as usize));
        self.hal
            .read(offset, &mut buf[..len])
            .map_err(|_| Error::EepromError)?;

        let text = &buf[..len];
        let text = match text.iter().position(|&byte| byte == 0) {
            Some(nul) => &text[..nul],
            None => text,
        };

        let text = core::str::from_utf8(text).map_err(|_| Error::CorruptedData)?;
        // cannot exceed the capacity N it was just read into
        heapless::String::try_from(text).map_err(|_| Error::CorruptedData)
    }

    /// Checks that the signature block is present and that every logical byte
    /// agrees with its mirror. Stops at the first disagreement and reports it.
    pub fn verify(&mut self) -> Result<Integrity, Error> {
        let mut sig = [0u8; SIGNATURE.len()];
        self.hal.read(0, &mut sig).map_err(|_| Error::EepromError)?;

        for (i, &expected) in SIGNATURE.iter().enumerate() {
            if sig[i] != expected {
                #[cfg(feature = "defmt")]
                warn!(
                    "signature mismatch at {}: expected {}, found {}",
                    i as u32, expected, sig[i]
                );

                return Ok(Integrity::MissingSignature {
                    offset: i as u32,
                    expected,
                    found: sig[i],
                });
            }
        }

        for offset in 0..self.logical_capacity() as u32 {
            let mirror_offset = self.mirror_of(offset);

            let mut value = [0u8; 1];
            let mut mirror_value = [0u8; 1];
            self.hal
                .read(offset, &mut value)
                .map_err(|_| Error::EepromError)?;
            self.hal
                .read(mirror_offset, &mut mirror_value)
                .map_err(|_| Error::EepromError)?;

            if value[0] != mirror_value[0] {
                #[cfg(feature = "defmt")]
                warn!(
                    "value {} at {} doesn't match {} at {}",
                    value[0], offset, mirror_value[0], mirror_offset
                );

                #[cfg(feature = "debug-logs")]
                println!(
                    "  MirrorStore: value {} at {offset} doesn't match {} at {mirror_offset}",
                    value[0], mirror_value[0]
                );

                return Ok(Integrity::MirrorMismatch {
                    offset,
                    mirror_offset,
                    value: value[0],
                    mirror_value: mirror_value[0],
                });
            }
        }

        Ok(Integrity::Valid)
    }

    /// Rewrites the signature block and zero-fills the rest of the logical
    /// half, all mirrored. Does not commit and does not re-create any field
    /// owned by the settings codec; the codec re-persists its defaults
    /// afterwards through the ordinary save path.
    pub fn reset(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("reset: signature plus zero-fill of {} bytes", self.size / 2);

        for (i, &byte) in SIGNATURE.iter().enumerate() {
            self.write_byte(i as u32, byte)?;
        }
        for offset in SIGNATURE.len()..self.logical_capacity() {
            self.write_byte(offset as u32, 0)?;
        }

        Ok(())
    }

    /// Flushes buffered writes to the physical medium. On failure everything
    /// written since the last successful commit may be lost on power-off.
    pub fn commit(&mut self) -> Result<(), Error> {
        self.hal.commit().map_err(|_| Error::CommitFailed)
    }

    /// Hex dump of the whole region, mirror half included.
    #[cfg(feature = "debug-logs")]
    pub fn dump(&mut self) -> Result<(), Error> {
        for offset in 0..self.size as u32 {
            let mut byte = [0u8; 1];
            self.hal
                .read(offset, &mut byte)
                .map_err(|_| Error::EepromError)?;

            print!("{:02X} ", byte[0]);
            if (offset + 1).is_multiple_of(16) {
                println!();
            }
        }

        Ok(())
    }
}
