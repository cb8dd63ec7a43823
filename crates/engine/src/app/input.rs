#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Accelerate,
    Reverse,
    SteerLeft,
    SteerRight,
    Brake,
    ToggleDebugDraw,
    Quit,
}

const ACTION_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::Accelerate => 0,
            InputAction::Reverse => 1,
            InputAction::SteerLeft => 2,
            InputAction::SteerRight => 3,
            InputAction::Brake => 4,
            InputAction::ToggleDebugDraw => 5,
            InputAction::Quit => 6,
        }
    }
}

/// Input state sampled once per real frame and handed to every tick of that
/// frame. Pressed/released edges are true only on the first tick after the
/// transition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions_down: ActionStates,
    actions_pressed: ActionStates,
    actions_released: ActionStates,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        quit_requested: bool,
        actions_down: ActionStates,
        actions_pressed: ActionStates,
        actions_released: ActionStates,
        window_size: (u32, u32),
    ) -> Self {
        Self {
            quit_requested,
            actions_down,
            actions_pressed,
            actions_released,
            window_width: window_size.0,
            window_height: window_size.1,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions_down.is_down(action)
    }

    pub fn was_pressed(&self, action: InputAction) -> bool {
        self.actions_pressed.is_down(action)
    }

    pub fn was_released(&self, action: InputAction) -> bool {
        self.actions_released.is_down(action)
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions_down.set(action, is_down);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.actions_down.set(action, true);
        self.actions_pressed.set(action, true);
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }
}
