use crate::hover::FocusedState;
use crate::models::Rect;

/// How the panel is currently sized inside its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    Hide,
    #[default]
    Resizable,
    MaxHeight,
}

/// Embedder state that decides whether the popover shows.
#[derive(Debug, Clone, Default)]
pub struct PopoverInputs {
    pub resize_mode: ResizeMode,
    pub panel_resizing: bool,
    /// Tooltip configured to display on hover.
    pub tooltip_display: bool,
    /// Container bounds; the anchor is expressed relative to it when set.
    pub container: Option<Rect>,
}

/// What the external popover component should render.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopoverState {
    pub open: bool,
    pub anchor: Option<Rect>,
}

impl PopoverState {
    pub fn derive(
        inputs: &PopoverInputs,
        focused: &FocusedState,
        display_rect: Option<Rect>,
    ) -> Self {
        let open = inputs.resize_mode != ResizeMode::MaxHeight
            && !inputs.panel_resizing
            && (inputs.tooltip_display || focused.active);
        let anchor = display_rect.map(|rect| match &inputs.container {
            Some(container) => rect.relative_to(container),
            None => rect,
        });
        Self { open, anchor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PopoverInputs {
        PopoverInputs {
            tooltip_display: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_with_tooltip() {
        let state = PopoverState::derive(&inputs(), &FocusedState::default(), None);
        assert!(state.open);
        assert_eq!(state.anchor, None);
    }

    #[test]
    fn test_closed_while_resizing_or_maximized() {
        let mut resizing = inputs();
        resizing.panel_resizing = true;
        assert!(!PopoverState::derive(&resizing, &FocusedState::default(), None).open);

        let mut maxed = inputs();
        maxed.resize_mode = ResizeMode::MaxHeight;
        assert!(!PopoverState::derive(&maxed, &FocusedState::pinned("a"), None).open);
    }

    #[test]
    fn test_focus_opens_without_tooltip() {
        let quiet = PopoverInputs::default();
        assert!(!PopoverState::derive(&quiet, &FocusedState::default(), None).open);
        assert!(PopoverState::derive(&quiet, &FocusedState::pinned("a"), None).open);
    }

    #[test]
    fn test_anchor_relative_to_container() {
        let mut with_container = inputs();
        with_container.container = Some(Rect::from_origin(10.0, 20.0, 500.0, 500.0));
        let item = Rect::from_origin(60.0, 120.0, 50.0, 50.0);

        let state = PopoverState::derive(&with_container, &FocusedState::default(), Some(item));
        assert_eq!(state.anchor, Some(Rect::from_origin(50.0, 100.0, 50.0, 50.0)));
    }
}
