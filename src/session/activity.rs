/// User-interaction signal reported by the host.
///
/// The manager treats every variant the same way (it is evidence the user
/// is present); the variant is kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    Click,
    KeyPress,
    PointerMove,
    Touch,
    VisibilityChange,
}

impl ActivitySignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivitySignal::Click => "click",
            ActivitySignal::KeyPress => "key_press",
            ActivitySignal::PointerMove => "pointer_move",
            ActivitySignal::Touch => "touch",
            ActivitySignal::VisibilityChange => "visibility_change",
        }
    }
}
