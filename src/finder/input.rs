use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Abort,
    Confirm,
    DeleteLeft,
    DeleteRight,
    CaretLeft,
    CaretRight,
    CaretHome,
    CaretEnd,
    DeletePrevWord,
    DeleteToStart,
    CursorUp,
    CursorDown,
    ToggleSelection,
    Insert(char),
    Resize(u16, u16),
}

pub fn map_event(event: &Event, multi: bool) -> Option<Intent> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => map_key(*key, multi),
        Event::Resize(width, height) => Some(Intent::Resize(*width, *height)),
        _ => None,
    }
}

fn map_key(key: KeyEvent, multi: bool) -> Option<Intent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return map_control_key(key.code);
    }

    match key.code {
        KeyCode::Esc => Some(Intent::Abort),
        KeyCode::Enter => Some(Intent::Confirm),
        KeyCode::Backspace => Some(Intent::DeleteLeft),
        KeyCode::Delete => Some(Intent::DeleteRight),
        KeyCode::Left => Some(Intent::CaretLeft),
        KeyCode::Right => Some(Intent::CaretRight),
        KeyCode::Home => Some(Intent::CaretHome),
        KeyCode::End => Some(Intent::CaretEnd),
        KeyCode::Up => Some(Intent::CursorUp),
        KeyCode::Down => Some(Intent::CursorDown),
        KeyCode::Tab if multi => Some(Intent::ToggleSelection),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::ALT) && !c.is_control() => {
            Some(Intent::Insert(c))
        }
        _ => None,
    }
}

fn map_control_key(code: KeyCode) -> Option<Intent> {
    let KeyCode::Char(c) = code else {
        return match code {
            KeyCode::Backspace => Some(Intent::DeleteLeft),
            KeyCode::Enter => Some(Intent::Confirm),
            _ => None,
        };
    };
    match c.to_ascii_lowercase() {
        'c' | 'd' => Some(Intent::Abort),
        // terminals send ^H for the second backspace variant
        'h' => Some(Intent::DeleteLeft),
        'b' => Some(Intent::CaretLeft),
        'f' => Some(Intent::CaretRight),
        'a' => Some(Intent::CaretHome),
        'e' => Some(Intent::CaretEnd),
        'w' => Some(Intent::DeletePrevWord),
        'u' => Some(Intent::DeleteToStart),
        'k' | 'p' => Some(Intent::CursorUp),
        'j' | 'n' => Some(Intent::CursorDown),
        _ => None,
    }
}
