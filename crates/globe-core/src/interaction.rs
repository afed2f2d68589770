//! Hover state and the reducer that drives it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::markers::{Marker, MarkerObjectId};

#[derive(Clone, Debug, PartialEq)]
struct ActiveMarker {
    marker: Marker,
    object: MarkerObjectId,
}

/// The currently hovered marker, if any. Marker and object are always set
/// or cleared together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HoverState {
    active: Option<ActiveMarker>,
}

impl HoverState {
    pub fn active_marker(&self) -> Option<&Marker> {
        self.active.as_ref().map(|a| &a.marker)
    }

    pub fn active_marker_object(&self) -> Option<MarkerObjectId> {
        self.active.as_ref().map(|a| a.object)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HoverAction {
    SetActiveMarker {
        marker: Marker,
        object: MarkerObjectId,
    },
    ClearActiveMarker,
}

pub fn reduce(state: &HoverState, action: HoverAction) -> HoverState {
    match action {
        HoverAction::SetActiveMarker { marker, object } => HoverState {
            active: Some(ActiveMarker { marker, object }),
        },
        HoverAction::ClearActiveMarker => {
            if state.active.is_none() {
                return state.clone();
            }
            HoverState::default()
        }
    }
}

/// Which objects need to animate after a hover change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HoverTransition {
    pub scale_down: Option<MarkerObjectId>,
    pub scale_up: Option<MarkerObjectId>,
}

impl HoverTransition {
    /// Compare the hovered object before and after a state change. An
    /// unchanged object produces no transition.
    pub fn between(prev: &HoverState, next: &HoverState) -> Self {
        let before = prev.active_marker_object();
        let after = next.active_marker_object();
        if before == after {
            return Self::default();
        }
        Self {
            scale_down: before,
            scale_up: after,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scale_down.is_none() && self.scale_up.is_none()
    }
}

/// Queue that pointer-over handlers dispatch into. Drained by the globe after
/// picking so handlers never need a borrow of the globe itself.
#[derive(Clone, Default)]
pub struct HoverSink {
    queue: Rc<RefCell<VecDeque<HoverAction>>>,
}

impl HoverSink {
    pub fn push(&self, action: HoverAction) {
        self.queue.borrow_mut().push_back(action);
    }

    pub fn drain(&self) -> Vec<HoverAction> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}
