//! Property schema and the diff-and-notify cache for one receiver.
//!
//! Each tracked property is described by an extractor over a poll snapshot.
//! [`PropertyTable::apply_snapshot`] runs every extractor for that snapshot
//! and reports only the values that actually changed.

use std::collections::BTreeMap;

use super::client::{Features, PlayInfo, Status, MAIN_ZONE};
use crate::bus::{PropertyDescription, PropertyKind, PropertyName, PropertyState, PropertyValue};

/// Reads one property out of a poll snapshot
pub type Extractor<S> = fn(&S) -> PropertyValue;

fn power_of(status: &Status) -> PropertyValue {
    PropertyValue::Boolean(status.power == "on")
}

fn volume_of(status: &Status) -> PropertyValue {
    PropertyValue::Integer(status.volume)
}

fn input_of(status: &Status) -> PropertyValue {
    PropertyValue::Text(status.input.clone())
}

fn track_of(info: &PlayInfo) -> PropertyValue {
    PropertyValue::Text(info.track.clone())
}

fn album_of(info: &PlayInfo) -> PropertyValue {
    PropertyValue::Text(info.album.clone())
}

fn artist_of(info: &PlayInfo) -> PropertyValue {
    PropertyValue::Text(info.artist.clone())
}

pub const STATUS_PROPERTIES: [(PropertyName, Extractor<Status>); 3] = [
    (PropertyName::Power, power_of),
    (PropertyName::Volume, volume_of),
    (PropertyName::Input, input_of),
];

pub const PLAY_INFO_PROPERTIES: [(PropertyName, Extractor<PlayInfo>); 3] = [
    (PropertyName::Track, track_of),
    (PropertyName::Album, album_of),
    (PropertyName::Artist, artist_of),
];

// =============================================================================
// Schema derived from device features
// =============================================================================

/// Volume bounds of the main zone. Always `step > 0` and `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeRange {
    pub min: i64,
    pub max: i64,
    pub step: i64,
}

impl VolumeRange {
    pub const FALLBACK: VolumeRange = VolumeRange {
        min: 0,
        max: 600,
        step: 1,
    };

    pub fn from_features(features: &Features) -> Self {
        let Some(range) = features
            .zone(MAIN_ZONE)
            .and_then(|zone| zone.range_step("volume"))
        else {
            return Self::FALLBACK;
        };

        // Zero means "not reported" for every field
        let min = range.min as i64;
        let max = match range.max as i64 {
            0 => Self::FALLBACK.max,
            max => max,
        };
        let step = match range.step as i64 {
            s if s <= 0 => Self::FALLBACK.step,
            s => s,
        };

        if min > max {
            return Self::FALLBACK;
        }
        Self { min, max, step }
    }
}

/// Build the property schema published to the host for one receiver.
pub fn describe_properties(volume: VolumeRange, inputs: &[String]) -> Vec<PropertyDescription> {
    let plain = |name: PropertyName, description: &str, kind: PropertyKind, read_only: bool| {
        PropertyDescription {
            name,
            title: name.as_str().to_string(),
            description: description.to_string(),
            semantic_type: None,
            kind,
            read_only,
        }
    };

    vec![
        plain(
            PropertyName::Power,
            "Whether the device is powered on",
            PropertyKind::Boolean,
            false,
        ),
        PropertyDescription {
            semantic_type: Some("LevelProperty".to_string()),
            ..plain(
                PropertyName::Volume,
                "The volume",
                PropertyKind::Integer {
                    minimum: volume.min,
                    maximum: volume.max,
                    multiple_of: volume.step,
                },
                false,
            )
        },
        plain(
            PropertyName::Input,
            "The input",
            PropertyKind::String {
                allowed: inputs.to_vec(),
            },
            false,
        ),
        plain(
            PropertyName::Track,
            "The track which is currently played",
            PropertyKind::String { allowed: vec![] },
            true,
        ),
        plain(
            PropertyName::Album,
            "The album which is currently played",
            PropertyKind::String { allowed: vec![] },
            true,
        ),
        plain(
            PropertyName::Artist,
            "The artist which is currently played",
            PropertyKind::String { allowed: vec![] },
            true,
        ),
    ]
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug, Clone, Default)]
struct PropertyCell {
    value: Option<PropertyValue>,
    confirmed: bool,
}

/// Cached values for all tracked properties of one receiver.
///
/// Every property starts stale (`None`); after the first successful poll it
/// always holds a concrete value.
#[derive(Debug, Default)]
pub struct PropertyTable {
    cells: BTreeMap<PropertyName, PropertyCell>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: PropertyName) -> Option<&PropertyValue> {
        self.cells.get(&name).and_then(|c| c.value.as_ref())
    }

    pub fn is_confirmed(&self, name: PropertyName) -> bool {
        self.cells.get(&name).is_some_and(|c| c.confirmed)
    }

    /// Apply an authoritative value from a poll. Returns true if it changed.
    pub fn apply_remote(&mut self, name: PropertyName, value: PropertyValue) -> bool {
        let cell = self.cells.entry(name).or_default();
        cell.confirmed = true;
        if cell.value.as_ref() == Some(&value) {
            return false;
        }
        cell.value = Some(value);
        true
    }

    /// Apply an optimistic value from a host write. Returns true if it changed.
    ///
    /// The value stays unconfirmed until a poll reports the same value.
    pub fn apply_local(&mut self, name: PropertyName, value: PropertyValue) -> bool {
        let cell = self.cells.entry(name).or_default();
        if cell.value.as_ref() == Some(&value) {
            return false;
        }
        cell.value = Some(value);
        cell.confirmed = false;
        true
    }

    /// Run every extractor against `snapshot`; return the properties that changed.
    pub fn apply_snapshot<S>(
        &mut self,
        snapshot: &S,
        extractors: &[(PropertyName, Extractor<S>)],
    ) -> Vec<(PropertyName, PropertyValue)> {
        extractors
            .iter()
            .filter_map(|(name, extract)| {
                let value = extract(snapshot);
                self.apply_remote(*name, value.clone())
                    .then_some((*name, value))
            })
            .collect()
    }

    pub fn states(&self) -> Vec<PropertyState> {
        PropertyName::ALL
            .into_iter()
            .map(|name| {
                let cell = self.cells.get(&name).cloned().unwrap_or_default();
                PropertyState {
                    name,
                    value: cell.value,
                    confirmed: cell.confirmed,
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::adapters::yamaha::client::{RangeStep, ZoneFeatures};

    fn status(power: &str, volume: i64, input: &str) -> Status {
        Status {
            power: power.to_string(),
            volume,
            input: input.to_string(),
            ..Default::default()
        }
    }

    fn features_with_volume(range: Option<RangeStep>) -> Features {
        Features {
            zone: vec![ZoneFeatures {
                id: "main".to_string(),
                range_step: range.into_iter().collect(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn first_snapshot_reports_every_property() {
        let mut table = PropertyTable::new();
        let changes = table.apply_snapshot(&status("on", 120, "hdmi1"), &STATUS_PROPERTIES);
        assert_eq!(
            changes,
            vec![
                (PropertyName::Power, PropertyValue::Boolean(true)),
                (PropertyName::Volume, PropertyValue::Integer(120)),
                (PropertyName::Input, PropertyValue::Text("hdmi1".into())),
            ]
        );
    }

    #[test]
    fn identical_snapshot_is_idempotent() {
        let mut table = PropertyTable::new();
        let snapshot = status("on", 120, "hdmi1");
        assert_eq!(table.apply_snapshot(&snapshot, &STATUS_PROPERTIES).len(), 3);
        assert!(table.apply_snapshot(&snapshot, &STATUS_PROPERTIES).is_empty());
    }

    #[test]
    fn untracked_field_change_is_silent() {
        let mut table = PropertyTable::new();
        table.apply_snapshot(&status("on", 120, "hdmi1"), &STATUS_PROPERTIES);

        let mut changed = status("on", 120, "hdmi1");
        changed.mute = true;
        changed.sleep = 30;
        assert!(table.apply_snapshot(&changed, &STATUS_PROPERTIES).is_empty());
    }

    #[test]
    fn power_flip_reports_once_as_boolean() {
        let mut table = PropertyTable::new();
        table.apply_snapshot(&status("on", 120, "hdmi1"), &STATUS_PROPERTIES);

        let changes = table.apply_snapshot(&status("standby", 120, "hdmi1"), &STATUS_PROPERTIES);
        assert_eq!(
            changes,
            vec![(PropertyName::Power, PropertyValue::Boolean(false))]
        );
        assert_eq!(
            table.get(PropertyName::Power),
            Some(&PropertyValue::Boolean(false))
        );
    }

    #[test]
    fn play_info_extractors_track_metadata() {
        let mut table = PropertyTable::new();
        let info = PlayInfo {
            track: "So What".into(),
            album: "Kind of Blue".into(),
            artist: "Miles Davis".into(),
            playback: "play".into(),
            ..Default::default()
        };
        assert_eq!(table.apply_snapshot(&info, &PLAY_INFO_PROPERTIES).len(), 3);

        let next = PlayInfo {
            track: "Freddie Freeloader".into(),
            play_time: 12,
            ..info
        };
        assert_eq!(
            table.apply_snapshot(&next, &PLAY_INFO_PROPERTIES),
            vec![(PropertyName::Track, PropertyValue::Text("Freddie Freeloader".into()))]
        );
    }

    #[test]
    fn local_write_is_unconfirmed_until_polled() {
        let mut table = PropertyTable::new();
        table.apply_snapshot(&status("on", 120, "hdmi1"), &STATUS_PROPERTIES);
        assert!(table.is_confirmed(PropertyName::Volume));

        assert!(table.apply_local(PropertyName::Volume, PropertyValue::Integer(200)));
        assert!(!table.is_confirmed(PropertyName::Volume));

        // Device applied it: confirmation without a second notification
        let changes = table.apply_snapshot(&status("on", 200, "hdmi1"), &STATUS_PROPERTIES);
        assert!(changes.is_empty());
        assert!(table.is_confirmed(PropertyName::Volume));
    }

    #[test]
    fn poll_overwrites_rejected_local_write() {
        let mut table = PropertyTable::new();
        table.apply_snapshot(&status("on", 120, "hdmi1"), &STATUS_PROPERTIES);
        table.apply_local(PropertyName::Input, PropertyValue::Text("tuner".into()));

        let changes = table.apply_snapshot(&status("on", 120, "hdmi1"), &STATUS_PROPERTIES);
        assert_eq!(
            changes,
            vec![(PropertyName::Input, PropertyValue::Text("hdmi1".into()))]
        );
    }

    #[test]
    fn states_start_stale() {
        let table = PropertyTable::new();
        let states = table.states();
        assert_eq!(states.len(), PropertyName::ALL.len());
        assert!(states.iter().all(|s| s.value.is_none() && !s.confirmed));
    }

    #[test]
    fn volume_range_from_main_zone() {
        let features = features_with_volume(Some(RangeStep {
            id: "volume".into(),
            min: 0.0,
            max: 161.0,
            step: 1.0,
        }));
        assert_eq!(
            VolumeRange::from_features(&features),
            VolumeRange {
                min: 0,
                max: 161,
                step: 1
            }
        );
    }

    #[test]
    fn volume_range_falls_back_when_missing_or_invalid() {
        assert_eq!(
            VolumeRange::from_features(&Features::default()),
            VolumeRange::FALLBACK
        );
        assert_eq!(
            VolumeRange::from_features(&features_with_volume(None)),
            VolumeRange::FALLBACK
        );

        let zero_step = features_with_volume(Some(RangeStep {
            id: "volume".into(),
            min: 0.0,
            max: 100.0,
            step: 0.0,
        }));
        assert_eq!(VolumeRange::from_features(&zero_step).step, 1);

        let inverted = features_with_volume(Some(RangeStep {
            id: "volume".into(),
            min: 50.0,
            max: 10.0,
            step: 1.0,
        }));
        assert_eq!(VolumeRange::from_features(&inverted), VolumeRange::FALLBACK);
    }

    #[test]
    fn schema_marks_metadata_read_only() {
        let props = describe_properties(VolumeRange::FALLBACK, &["hdmi1".to_string()]);
        let read_only: Vec<_> = props
            .iter()
            .filter(|p| p.read_only)
            .map(|p| p.name)
            .collect();
        assert_eq!(
            read_only,
            vec![PropertyName::Track, PropertyName::Album, PropertyName::Artist]
        );

        let input = props.iter().find(|p| p.name == PropertyName::Input).unwrap();
        assert_eq!(
            input.kind,
            PropertyKind::String {
                allowed: vec!["hdmi1".to_string()]
            }
        );
    }
}
