use embedded_storage::Storage;

/// Byte-addressed non-volatile medium with buffered writes, in the shape of the
/// Arduino EEPROM emulation: reads and writes are cheap and infallible in
/// practice, `commit` makes them durable. Offsets count from the start of the
/// region, `capacity` is its total size in bytes.
///
/// See README.md for an example implementation.
pub trait Platform {
    type Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error>;

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Flushes everything written so far to the physical medium.
    fn commit(&mut self) -> Result<(), Self::Error>;

    fn capacity(&self) -> usize;
}

impl<T: Platform> Platform for &mut T {
    type Error = T::Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(offset, bytes)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(offset, bytes)
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        (**self).commit()
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }
}

/// EEPROM emulation over any [`embedded_storage::Storage`], the way the ESP
/// Arduino core emulates EEPROM in flash: a RAM shadow of the region is loaded
/// once at construction, reads and writes touch only the shadow, and
/// [`Platform::commit`] writes the whole shadow back to the backing storage.
///
/// `N` is the region size in bytes and becomes [`Platform::capacity`].
pub struct ShadowEeprom<T, const N: usize> {
    inner: T,
    base: u32,
    shadow: [u8; N],
}

impl<T: Storage, const N: usize> ShadowEeprom<T, N> {
    /// Loads the shadow from `base` in the backing storage. Equivalent of
    /// `EEPROM.begin(N)`.
    pub fn new(mut inner: T, base: u32) -> Result<Self, T::Error> {
        let mut shadow = [0u8; N];
        inner.read(base, &mut shadow)?;
        Ok(Self {
            inner,
            base,
            shadow,
        })
    }

    /// Consumes the adapter and hands the backing storage back. Uncommitted
    /// shadow writes are lost, as they would be on power-off.
    pub fn free(self) -> T {
        self.inner
    }
}

impl<T: Storage, const N: usize> Platform for ShadowEeprom<T, N> {
    type Error = T::Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;

        // accesses past the region are clipped, like the Arduino EEPROM class
        let end = N.min(offset.saturating_add(bytes.len()));
        if offset < end {
            bytes[..end - offset].copy_from_slice(&self.shadow[offset..end]);
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;

        let end = N.min(offset.saturating_add(bytes.len()));
        if offset < end {
            self.shadow[offset..end].copy_from_slice(&bytes[..end - offset]);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        self.inner.write(self.base, &self.shadow)
    }

    fn capacity(&self) -> usize {
        N
    }
}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
mod chip {
    use esp_storage::FlashStorage;

    use super::ShadowEeprom;
    use crate::EEPROM_SIZE;

    /// The on-device medium: the canonical 128-byte settings region shadowed
    /// from main flash. Pick a `base` in a sector the bootloader and
    /// application images leave alone.
    pub type EspEeprom<'d> = ShadowEeprom<FlashStorage<'d>, EEPROM_SIZE>;
}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
pub use chip::*;
