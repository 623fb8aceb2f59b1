#![doc = include_str!("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod error;
mod mirror;
pub mod platform;
mod portal;

/// Bytes claimed from the emulated EEPROM. Only the lower half holds logical
/// data; the upper half mirrors it byte for byte in reverse order.
pub const EEPROM_SIZE: usize = 128;

/// Marker written at the start of the region so a boot can tell its own data
/// from an uninitialized or foreign medium.
pub const SIGNATURE: &[u8] = b"TMPSENS";

/// Offset of the config field, one past the signature block.
pub const CONFIG_OFFSET: u32 = SIGNATURE.len() as u32;

/// Longest config value that is persisted, in bytes, not counting the null
/// terminator.
pub const CONFIG_MAX_LENGTH: usize = 32;

/// Channels parsed past this count are dropped.
pub const MAX_CHANNELS: usize = 5;

/// Value the config field is seeded with when the region is reset.
pub const DEFAULT_CHANNEL: &str = "livingroom";

const _: () = assert!(SIGNATURE.len() + CONFIG_MAX_LENGTH + 1 <= EEPROM_SIZE / 2);
const _: () = assert!(DEFAULT_CHANNEL.len() <= CONFIG_MAX_LENGTH);

/// Owned text of the config field.
pub type ConfigValue = heapless::String<CONFIG_MAX_LENGTH>;

/// One channel name parsed out of the config field.
pub type Channel = heapless::String<CONFIG_MAX_LENGTH>;

/// Channels in config-field order.
pub type ChannelList = heapless::Vec<Channel, MAX_CHANNELS>;

pub use mirror::{Integrity, MirrorStore};
pub use portal::{PortalParam, TextParam};

use crate::error::Error;
use crate::platform::Platform;
#[cfg(feature = "defmt")]
use defmt::trace;
#[cfg(feature = "defmt")]
use defmt::warn;

/// What [`Settings::save`] did with the submitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SaveOutcome {
    /// The value was cut to [`CONFIG_MAX_LENGTH`] bytes before persisting.
    pub truncated: bool,

    /// How many channels past [`MAX_CHANNELS`] were dropped from the list.
    pub dropped: usize,

    /// The commit reached the medium. When false the new value is live in RAM
    /// but may not survive a power cycle.
    pub durable: bool,
}

/// Settings of one sensor node, loaded at construction and kept in RAM.
///
/// The constructor runs the boot check: a region that fails verification is
/// wiped and re-seeded with [`DEFAULT_CHANNEL`] before anything is read from
/// it. Afterwards the store is trusted for the rest of the power cycle.
pub struct Settings<T: Platform> {
    store: MirrorStore<T>,
    value: ConfigValue,
    channels: ChannelList,
    changed: bool,
}

impl<T: Platform> Settings<T> {
    /// Brings up the store over `hal`, verifies it, loads the config field
    /// and pushes its value into `param` so the portal shows what the node
    /// will actually use.
    ///
    /// A failed verification resets the region to defaults and marks the
    /// settings changed, the same as a save does.
    pub fn new(hal: T, param: &mut impl PortalParam) -> Result<Settings<T>, Error> {
        let store = MirrorStore::new(hal)?;
        if CONFIG_OFFSET as usize + CONFIG_MAX_LENGTH + 1 > store.logical_capacity() {
            return Err(Error::InvalidCapacity);
        }

        let mut settings = Settings {
            store,
            value: ConfigValue::new(),
            channels: ChannelList::new(),
            changed: false,
        };

        let verdict = settings.store.verify()?;
        if !verdict.is_valid() {
            #[cfg(feature = "defmt")]
            warn!("boot check failed, resetting to defaults: {}", verdict);

            #[cfg(feature = "debug-logs")]
            println!("  Settings: boot check failed: {verdict:?}");

            settings.reseed()?;
        }

        match settings.load(param) {
            Ok(()) => Ok(settings),
            Err(Error::CorruptedData) => {
                // both halves agree, but the bytes never were text
                settings.reseed()?;
                settings.load(param)?;
                Ok(settings)
            }
            Err(e) => Err(e),
        }
    }

    /// Persists the portal's current text as the new config field and rebuilds
    /// the channel list from it.
    ///
    /// The settings count as changed no matter what: even when the commit
    /// fails, the RAM copy has diverged from whatever was last confirmed
    /// durable, and restarting into a reload is the safe way out.
    pub fn save(&mut self, param: &impl PortalParam) -> SaveOutcome {
        let submitted = param.value();
        let clipped = clip_to_boundary(submitted, CONFIG_MAX_LENGTH);
        let truncated = clipped.len() != submitted.len();

        // fits by construction after clipping
        self.value = ConfigValue::try_from(clipped).unwrap_or_default();
        let (channels, dropped) = split_channels(&self.value);
        self.channels = channels;
        self.changed = true;

        if dropped > 0 {
            #[cfg(feature = "defmt")]
            warn!("channel list capped, {} dropped", dropped);

            #[cfg(feature = "debug-logs")]
            println!("  Settings: channel list capped, {dropped} dropped");
        }

        let durable = self.persist();

        #[cfg(feature = "defmt")]
        trace!(
            "save: \"{}\" truncated={} dropped={} durable={}",
            self.value.as_str(),
            truncated,
            dropped,
            durable
        );

        SaveOutcome {
            truncated,
            dropped,
            durable,
        }
    }

    /// Wipes the region and re-seeds it with [`DEFAULT_CHANNEL`], then loads
    /// the result back as [`Settings::new`] would. Pushes the default into
    /// `param` as part of the load.
    ///
    /// Like a save, this counts as a change even when the flush to the medium
    /// fails: the defaults are live in RAM and in the shadow either way.
    pub fn reset_to_defaults(&mut self, param: &mut impl PortalParam) -> Result<(), Error> {
        self.reseed()?;
        self.load(param)
    }

    /// Current raw text of the config field.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Channels parsed from the config field, in order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// True once anything rewrote the stored config in this power cycle: a
    /// save, a reset, or the boot check falling back to defaults. The main
    /// loop restarts the node when it sees this after the portal closes, and
    /// nothing clears it short of that restart.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Verdict on the mirrored region as it is right now. The boot check runs
    /// this once before the first load; later calls are diagnostic only.
    pub fn verify(&mut self) -> Result<Integrity, Error> {
        self.store.verify()
    }

    fn load(&mut self, param: &mut impl PortalParam) -> Result<(), Error> {
        self.value = self.store.read_str(CONFIG_OFFSET)?;
        let (channels, _) = split_channels(&self.value);
        self.channels = channels;
        param.set_value(&self.value);

        #[cfg(feature = "defmt")]
        trace!("loaded config: \"{}\"", self.value.as_str());

        Ok(())
    }

    fn reseed(&mut self) -> Result<(), Error> {
        self.store.reset()?;
        self.store.write_str(CONFIG_OFFSET, DEFAULT_CHANNEL)?;

        // a rejected flush is not fatal here either: the defaults live on in
        // the shadow and the next boot's verify sees the stale flash and
        // reseeds again
        if self.store.commit().is_err() {
            #[cfg(feature = "defmt")]
            warn!("reseed commit failed, defaults are not durable yet");

            #[cfg(feature = "debug-logs")]
            println!("  Settings: reseed commit failed, defaults are not durable yet");
        }

        self.changed = true;
        Ok(())
    }

    fn persist(&mut self) -> bool {
        let written = self
            .store
            .write_str(CONFIG_OFFSET, &self.value)
            .and_then(|()| self.store.commit());

        if written.is_err() {
            #[cfg(feature = "defmt")]
            warn!("persist failed, keeping the RAM copy");

            #[cfg(feature = "debug-logs")]
            println!("  Settings: persist failed, keeping the RAM copy");
        }

        written.is_ok()
    }
}

/// Splits the config field at commas, skipping empty tokens, into at most
/// [`MAX_CHANNELS`] channels. Returns the list and how many channels past the
/// cap were dropped.
fn split_channels(value: &str) -> (ChannelList, usize) {
    let mut channels = ChannelList::new();
    let mut dropped = 0;

    for token in value.split(',').filter(|token| !token.is_empty()) {
        // a token is never longer than the field it came from
        let channel = Channel::try_from(token).unwrap_or_default();
        if channels.push(channel).is_err() {
            dropped += 1;
        }
    }

    (channels, dropped)
}

/// Longest prefix of `value` no longer than `max` bytes that ends on a
/// character boundary.
pub(crate) fn clip_to_boundary(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }

    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
