use thiserror::Error;

/// Errors that can occur while talking to the settings store. The list is likely to stay as is
/// but marked as non-exhaustive to allow for future additions without breaking the API. On the
/// device none of these is fatal: the worst outcome anywhere in this crate is a fallback to the
/// default configuration.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The medium cannot hold the mirrored layout: the capacity must be even
    /// and its logical half must fit the signature block plus the
    /// null-terminated config field.
    #[error("eeprom capacity too small for the mirrored layout")]
    InvalidCapacity,

    /// The underlying medium rejected a read or write. The original error value
    /// comes from the provided `impl Platform`.
    #[error("internal eeprom error")]
    EepromError,

    /// The medium rejected the flush. Writes made since the last successful
    /// commit are not guaranteed durable.
    #[error("eeprom commit failed")]
    CommitFailed,

    /// The stored config field is not valid UTF-8. Either the flash decayed in
    /// both mirror halves at once or something else wrote into our region.
    #[error("corrupted data")]
    CorruptedData,
}
