//! Conversion-chain resolution.
//!
//! Raw channel data in a JPK archive is stored as encoded integers in a
//! base calibration slot (typically volts). The property file describes a
//! directed chain of affine transforms from the base slot to the physical
//! slots: each named slot carries a `(multiplier, offset)` pair and a
//! `base-calibration-slot` link pointing one step closer to the base. To
//! reach a slot, the chain is walked from the target back to the base and
//! then applied in base-to-target order.

use std::collections::HashSet;

use crate::errors::FormatError;

use super::properties::PropertyStore;

/// A resolved conversion chain for one channel and slot.
///
/// Resolution is deterministic: the same (store, channel, slot) triple
/// always yields identical transform parameters and unit string.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTransform {
    /// Affine steps in base-to-target application order.
    pub steps: Vec<(f64, f64)>,
    /// Unit of the resolved slot.
    pub unit: String,
    /// Human-readable channel label, e.g. "vDeflection (Force)".
    pub label: String,
}

impl ChannelTransform {
    /// Apply the chain to decoded base-slot values in place.
    pub fn apply(&self, data: &mut [f64]) {
        for (multiplier, offset) in &self.steps {
            for v in data.iter_mut() {
                *v = *v * multiplier + *offset;
            }
        }
    }
}

/// Resolve the conversion chain for `channel` to the requested `slot`.
///
/// `"default"` resolves the channel's declared default slot. The walk
/// tracks visited slots and fails on a revisit, so a broken
/// `base-calibration-slot` graph cannot loop forever.
pub fn resolve(
    store: &PropertyStore,
    channel: &str,
    slot: &str,
) -> Result<ChannelTransform, FormatError> {
    let conv = format!("channel.{channel}.conversion-set");
    let base = store.get_text(&format!("{conv}.conversions.base"))?;
    let target = if slot == "default" {
        store.get_text(&format!("{conv}.conversions.default"))?
    } else {
        slot.to_string()
    };

    let mut steps = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut current = target.clone();
    while current != base {
        if !visited.insert(current.clone()) {
            return Err(FormatError::FormatMetadata(format!(
                "conversion chain of channel '{channel}' revisits slot '{current}'"
            )));
        }
        let offset = store.get_f64(&format!("{conv}.conversion.{current}.scaling.offset"))?;
        let multiplier =
            store.get_f64(&format!("{conv}.conversion.{current}.scaling.multiplier"))?;
        steps.push((multiplier, offset));
        current = store.get_text(&format!(
            "{conv}.conversion.{current}.base-calibration-slot"
        ))?;
    }
    // collected target-to-base; apply base-to-target
    steps.reverse();

    // Two historical spellings of the unit key must both be tried.
    let unit = if base == target {
        let data_key = format!("channel.{channel}.data.encoder.scaling.unit.unit");
        let plain_key = format!("channel.{channel}.encoder.scaling.unit.unit");
        store.get_first_text(&[data_key.as_str(), plain_key.as_str()])?
    } else {
        let short_key = format!("{conv}.conversion.{target}.scaling.unit");
        let long_key = format!("{conv}.conversion.{target}.scaling.unit.unit");
        store.get_first_text(&[short_key.as_str(), long_key.as_str()])?
    };

    let name = store
        .get_text(&format!("{conv}.conversion.{target}.name"))
        .unwrap_or_else(|_| target.clone());

    Ok(ChannelTransform {
        steps,
        unit,
        label: format!("{channel} ({name})"),
    })
}
