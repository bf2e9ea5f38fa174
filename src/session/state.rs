//! Session state record and its value types.

/// Label attached to captured frames by the two labeling actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureLabel {
    Upright,
    Slouched,
}

impl PostureLabel {
    /// Class index fed to the trainer.
    pub fn class_index(self) -> usize {
        match self {
            PostureLabel::Upright => 0,
            PostureLabel::Slouched => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PostureLabel::Upright => "upright",
            PostureLabel::Slouched => "slouched",
        }
    }

    /// Class names indexed by class id.
    pub fn class_names() -> Vec<String> {
        vec![
            PostureLabel::Upright.name().to_string(),
            PostureLabel::Slouched.name().to_string(),
        ]
    }
}

/// Most recent inference outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Prediction {
    #[default]
    None,
    Upright,
    Slouched,
}

impl Prediction {
    pub fn from_class_index(index: usize) -> Self {
        match index {
            0 => Prediction::Upright,
            1 => Prediction::Slouched,
            _ => Prediction::None,
        }
    }

    /// Display text; an absent prediction renders as the empty string.
    pub fn label(self) -> &'static str {
        match self {
            Prediction::None => "",
            Prediction::Upright => "upright",
            Prediction::Slouched => "slouched",
        }
    }
}

/// Mutable session record owned by the controller.
///
/// The derived sample count is intentionally absent; it is recomputed from
/// the training set on every render.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub is_training: bool,
    pub is_trained: bool,
    pub epoch: Option<usize>,
    pub accuracy: Option<f32>,
    pub is_predicting: bool,
    pub prediction: Prediction,
    pub audio_playing: bool,
    pub front_camera: bool,
    pub can_switch_camera: bool,
    /// Visible status line; device and track errors are appended here.
    pub status: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            is_training: false,
            is_trained: false,
            epoch: None,
            accuracy: None,
            is_predicting: false,
            prediction: Prediction::None,
            audio_playing: false,
            front_camera: true,
            can_switch_camera: false,
            status: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_to_stable_class_indices() {
        assert_eq!(PostureLabel::Upright.class_index(), 0);
        assert_eq!(PostureLabel::Slouched.class_index(), 1);
        assert_eq!(PostureLabel::class_names(), vec!["upright", "slouched"]);
    }

    #[test]
    fn prediction_round_trips_class_indices() {
        assert_eq!(Prediction::from_class_index(0), Prediction::Upright);
        assert_eq!(Prediction::from_class_index(1), Prediction::Slouched);
        assert_eq!(Prediction::from_class_index(9), Prediction::None);
        assert_eq!(Prediction::None.label(), "");
    }
}
