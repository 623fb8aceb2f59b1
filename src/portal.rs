//! Bridge to the configuration portal the node brings up when it cannot join
//! a network. The settings codec never talks to the portal directly, only to
//! a [`PortalParam`] it pushes the stored value into at boot and reads back
//! on save.

use crate::{CONFIG_MAX_LENGTH, ConfigValue};

/// A text field shared with the configuration portal.
pub trait PortalParam {
    /// Current text of the field.
    fn value(&self) -> &str;

    /// Replaces the text of the field. Implementations with bounded backing
    /// storage keep the longest prefix that fits whole characters.
    fn set_value(&mut self, value: &str);
}

impl<T: PortalParam> PortalParam for &mut T {
    fn value(&self) -> &str {
        (**self).value()
    }

    fn set_value(&mut self, value: &str) {
        (**self).set_value(value)
    }
}

/// Plain in-memory parameter for firmware builds without a portal and for
/// host-side tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextParam {
    value: ConfigValue,
}

impl TextParam {
    pub fn new(value: &str) -> Self {
        let mut param = Self::default();
        param.set_value(value);
        param
    }
}

impl PortalParam for TextParam {
    fn value(&self) -> &str {
        &self.value
    }

    fn set_value(&mut self, value: &str) {
        let clipped = crate::clip_to_boundary(value, CONFIG_MAX_LENGTH);
        // fits by construction after clipping
        self.value = ConfigValue::try_from(clipped).unwrap_or_default();
    }
}
