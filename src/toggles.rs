use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Overlay layers whose visibility the host can control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Heatmap,
    LiveConditions,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heatmap => "heatmap",
            Self::LiveConditions => "live_conditions",
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleState {
    pub heatmap_enabled: bool,
    pub traffic_enabled: bool,
}

impl Default for ToggleState {
    fn default() -> Self {
        Self {
            heatmap_enabled: true,
            traffic_enabled: false,
        }
    }
}

impl ToggleState {
    pub fn new(heatmap_enabled: bool, traffic_enabled: bool) -> Self {
        Self {
            heatmap_enabled,
            traffic_enabled,
        }
    }

    pub fn is_visible(self, layer: Layer) -> bool {
        match layer {
            Layer::Heatmap => self.heatmap_enabled,
            Layer::LiveConditions => self.traffic_enabled,
        }
    }

    pub fn with_visibility(mut self, layer: Layer, visible: bool) -> Self {
        self.set(layer, visible);
        self
    }

    fn set(&mut self, layer: Layer, visible: bool) {
        match layer {
            Layer::Heatmap => self.heatmap_enabled = visible,
            Layer::LiveConditions => self.traffic_enabled = visible,
        }
    }
}

/// A flip recorded by the controller. The owning bridge turns each one into
/// a fresh document (or a layer message under the incremental policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleChange {
    pub layer: Layer,
    pub state: ToggleState,
}

/// Host-owned visibility flags for one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleController {
    state: ToggleState,
    flips: u64,
}

impl ToggleController {
    pub fn new(defaults: ToggleState) -> Self {
        Self {
            state: defaults,
            flips: 0,
        }
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    pub fn flips(&self) -> u64 {
        self.flips
    }

    pub fn toggle_heatmap(&mut self) -> ToggleChange {
        self.flip(Layer::Heatmap)
    }

    pub fn toggle_live_conditions(&mut self) -> ToggleChange {
        self.flip(Layer::LiveConditions)
    }

    /// Adopts a visibility reported by the embedded controls. Returns `true`
    /// when the host flag actually changed. Not counted as a flip.
    pub fn reconcile(&mut self, layer: Layer, visible: bool) -> bool {
        if self.state.is_visible(layer) == visible {
            return false;
        }
        self.state.set(layer, visible);
        true
    }

    fn flip(&mut self, layer: Layer) -> ToggleChange {
        let visible = !self.state.is_visible(layer);
        self.state.set(layer, visible);
        self.flips = self.flips.saturating_add(1);
        ToggleChange {
            layer,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Layer, ToggleController, ToggleState};

    #[test]
    fn each_toggle_flips_only_its_own_flag() {
        let mut controller = ToggleController::new(ToggleState::new(true, false));

        let change = controller.toggle_heatmap();
        assert_eq!(change.layer, Layer::Heatmap);
        assert_eq!(change.state, ToggleState::new(false, false));

        let change = controller.toggle_live_conditions();
        assert_eq!(change.layer, Layer::LiveConditions);
        assert_eq!(change.state, ToggleState::new(false, true));
        assert_eq!(controller.flips(), 2);
    }

    #[test]
    fn reconcile_reports_whether_host_state_moved() {
        let mut controller = ToggleController::new(ToggleState::new(true, false));
        assert!(!controller.reconcile(Layer::Heatmap, true));
        assert!(controller.reconcile(Layer::LiveConditions, true));
        assert_eq!(controller.state(), ToggleState::new(true, true));
        assert_eq!(controller.flips(), 0);
    }
}
