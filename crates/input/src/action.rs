/// A request from game logic to the window layer.
///
/// The game never touches the window; it returns actions from its update and
/// the host applies them after the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the main loop.
    Quit,
    SetFullscreen(bool),
    /// Hide the cursor and report relative motion.
    SetMouseCapture(bool),
}

impl Action {
    /// Whether the host should leave its loop after applying this action.
    pub fn ends_loop(self) -> bool {
        matches!(self, Action::Quit)
    }
}
