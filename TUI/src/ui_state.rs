#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    Chat,
    #[default]
    Input,
    Admin,
}

#[derive(Default)]
pub struct UIState {
    pub input: String,
    pub scroll_offset: usize,
    pub status_message: Option<String>,

    // Which panel is focused
    pub focus: Focus,

    // Admin panel visibility
    pub show_admin: bool,

    // Lines scrolled away from the top of the admin panel
    pub admin_scroll: usize,
}

impl UIState {
    pub fn new() -> Self {
        Self {
            show_admin: true,
            ..Self::default()
        }
    }
}
