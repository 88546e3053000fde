//! Identification strategies, tried in a fixed order.

use std::collections::{BTreeMap, HashMap};

use crate::models::profile::{IdentificationMethod, SignalBundle, UserProfile, UserType};

/// Pitch above which a voice is treated as a child's.
pub const CHILD_PITCH_HZ: f64 = 200.0;

/// One way of matching signals to a stored profile.
pub trait IdentificationStrategy: Send + Sync {
    fn method(&self) -> IdentificationMethod;

    /// Id of the matched profile, if any.
    fn identify(
        &self,
        signals: &SignalBundle,
        profiles: &BTreeMap<String, UserProfile>,
    ) -> Option<String>;
}

/// Pitch heuristic: picks the first profile (by id) of the inferred type.
pub struct VoiceStrategy;

impl IdentificationStrategy for VoiceStrategy {
    fn method(&self) -> IdentificationMethod {
        IdentificationMethod::Voice
    }

    fn identify(
        &self,
        signals: &SignalBundle,
        profiles: &BTreeMap<String, UserProfile>,
    ) -> Option<String> {
        let voice = signals.voice_features.as_ref()?;
        let inferred = if voice.pitch > CHILD_PITCH_HZ {
            UserType::Child
        } else {
            UserType::Adult
        };
        profiles
            .values()
            .find(|profile| profile.user_type == inferred)
            .map(|profile| profile.id.clone())
    }
}

pub struct FaceStrategy;

impl IdentificationStrategy for FaceStrategy {
    fn method(&self) -> IdentificationMethod {
        IdentificationMethod::Face
    }

    fn identify(
        &self,
        signals: &SignalBundle,
        profiles: &BTreeMap<String, UserProfile>,
    ) -> Option<String> {
        let face_id = signals.face_id.as_deref()?;
        profiles
            .values()
            .find(|profile| profile.face_id.as_deref() == Some(face_id))
            .map(|profile| profile.id.clone())
    }
}

/// Case-insensitive phrase → profile id lookup.
pub struct SpokenCodeStrategy {
    phrases: HashMap<String, String>,
}

impl SpokenCodeStrategy {
    pub fn new<'a>(phrases: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        Self {
            phrases: phrases
                .into_iter()
                .map(|(phrase, id)| (phrase.trim().to_lowercase(), id.clone()))
                .collect(),
        }
    }
}

impl IdentificationStrategy for SpokenCodeStrategy {
    fn method(&self) -> IdentificationMethod {
        IdentificationMethod::SpokenCode
    }

    fn identify(
        &self,
        signals: &SignalBundle,
        profiles: &BTreeMap<String, UserProfile>,
    ) -> Option<String> {
        let code = signals.spoken_code.as_deref()?.trim().to_lowercase();
        let id = self.phrases.get(&code)?;
        profiles.contains_key(id).then(|| id.clone())
    }
}

pub struct DirectIdStrategy;

impl IdentificationStrategy for DirectIdStrategy {
    fn method(&self) -> IdentificationMethod {
        IdentificationMethod::DirectId
    }

    fn identify(
        &self,
        signals: &SignalBundle,
        profiles: &BTreeMap<String, UserProfile>,
    ) -> Option<String> {
        let id = signals.user_id.as_deref()?;
        profiles.contains_key(id).then(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::VoiceFeatures;

    fn profiles() -> BTreeMap<String, UserProfile> {
        [
            UserProfile::new("adult_1".into(), "Alice", UserType::Adult, None, None),
            UserProfile::new("child_2".into(), "Bo", UserType::Child, None, Some("face-bo".into())),
        ]
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect()
    }

    fn voice(pitch: f64) -> SignalBundle {
        SignalBundle {
            voice_features: Some(VoiceFeatures {
                pitch,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_voice_pitch_threshold() {
        let profiles = profiles();
        assert_eq!(VoiceStrategy.identify(&voice(250.0), &profiles).as_deref(), Some("child_2"));
        assert_eq!(VoiceStrategy.identify(&voice(200.0), &profiles).as_deref(), Some("adult_1"));
        assert_eq!(VoiceStrategy.identify(&SignalBundle::default(), &profiles), None);
    }

    #[test]
    fn test_spoken_code_is_case_insensitive() {
        let table: BTreeMap<String, String> =
            [("Blue Unicorn".to_string(), "child_2".to_string())].into_iter().collect();
        let strategy = SpokenCodeStrategy::new(&table);
        let signals = SignalBundle {
            spoken_code: Some("  BLUE unicorn ".into()),
            ..Default::default()
        };
        assert_eq!(strategy.identify(&signals, &profiles()).as_deref(), Some("child_2"));
    }

    #[test]
    fn test_code_for_missing_profile_misses() {
        let table: BTreeMap<String, String> =
            [("red dragon".to_string(), "adult_9".to_string())].into_iter().collect();
        let signals = SignalBundle {
            spoken_code: Some("red dragon".into()),
            ..Default::default()
        };
        assert_eq!(SpokenCodeStrategy::new(&table).identify(&signals, &profiles()), None);
    }

    #[test]
    fn test_face_and_direct_id() {
        let profiles = profiles();
        let face = SignalBundle {
            face_id: Some("face-bo".into()),
            ..Default::default()
        };
        assert_eq!(FaceStrategy.identify(&face, &profiles).as_deref(), Some("child_2"));

        let direct = SignalBundle {
            user_id: Some("adult_1".into()),
            ..Default::default()
        };
        assert_eq!(DirectIdStrategy.identify(&direct, &profiles).as_deref(), Some("adult_1"));
    }
}
