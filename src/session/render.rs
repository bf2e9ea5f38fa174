//! Pure projection from session state to UI labels and control visibility.

use super::state::SessionState;

/// Render-ready view of the session, recomputed after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct UiSnapshot {
    pub training_label: String,
    pub train_visible: bool,
    pub epoch_label: String,
    pub accuracy_label: String,
    pub predict_visible: bool,
    pub predict_label: String,
    pub samples_label: String,
    pub clear_visible: bool,
    pub prediction_label: String,
    pub switch_camera_visible: bool,
    pub status: String,
}

impl UiSnapshot {
    /// Project the state record plus the derived sample count.
    pub fn project(state: &SessionState, samples: usize) -> Self {
        Self {
            training_label: if state.is_training { "Yes" } else { "No" }.to_string(),
            train_visible: !state.is_training,
            epoch_label: state
                .epoch
                .map(|epoch| epoch.to_string())
                .unwrap_or_else(|| "0".to_string()),
            accuracy_label: state
                .accuracy
                .map(|accuracy| accuracy.to_string())
                .unwrap_or_else(|| "0".to_string()),
            predict_visible: state.is_trained,
            predict_label: if state.is_predicting {
                "Stop Predicting"
            } else {
                "Start Predicting"
            }
            .to_string(),
            samples_label: samples.to_string(),
            clear_visible: samples > 0,
            prediction_label: state.prediction.label().to_string(),
            switch_camera_visible: state.can_switch_camera,
            status: state.status.clone(),
        }
    }
}
