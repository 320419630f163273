//! Maps egui key events to X11 keysyms for RFB `KeyEvent` messages.

use eframe::egui;

/// X11 keysym values used by the RFB wire protocol.
pub mod keysyms {
    pub const XK_BACK_SPACE: u32 = 0xff08;
    pub const XK_TAB: u32 = 0xff09;
    pub const XK_RETURN: u32 = 0xff0d;
    pub const XK_ESCAPE: u32 = 0xff1b;
    pub const XK_INSERT: u32 = 0xff63;
    pub const XK_DELETE: u32 = 0xffff;
    pub const XK_HOME: u32 = 0xff50;
    pub const XK_END: u32 = 0xff57;
    pub const XK_PAGE_UP: u32 = 0xff55;
    pub const XK_PAGE_DOWN: u32 = 0xff56;
    pub const XK_LEFT: u32 = 0xff51;
    pub const XK_UP: u32 = 0xff52;
    pub const XK_RIGHT: u32 = 0xff53;
    pub const XK_DOWN: u32 = 0xff54;
    pub const XK_F1: u32 = 0xffbe;
    pub const XK_F12: u32 = 0xffc9;
    pub const XK_SHIFT_L: u32 = 0xffe1;
    pub const XK_SHIFT_R: u32 = 0xffe2;
    pub const XK_CONTROL_L: u32 = 0xffe3;
    pub const XK_CONTROL_R: u32 = 0xffe4;
    pub const XK_ALT_L: u32 = 0xffe9;
    pub const XK_ALT_R: u32 = 0xffea;
    pub const XK_SUPER_L: u32 = 0xffeb;
    pub const XK_SUPER_R: u32 = 0xffec;
    pub const XK_MENU: u32 = 0xff67;
    pub const XK_NUM_LOCK: u32 = 0xff7f;
    pub const XK_CAPS_LOCK: u32 = 0xffe5;
    pub const XK_SCROLL_LOCK: u32 = 0xff14;
    pub const XK_PRINT: u32 = 0xff61;
}
use keysyms::*;

/// Maps an [`egui::Key`] to its X11 keysym.
///
/// Function keys beyond F12 and keys with no RFB-meaningful equivalent return `None`;
/// callers should drop the event rather than forward a bogus keysym.
#[must_use]
pub fn key_to_keysym(key: egui::Key) -> Option<u32> {
    use egui::Key as K;
    Some(match key {
        K::A => 'a' as u32,
        K::B => 'b' as u32,
        K::C => 'c' as u32,
        K::D => 'd' as u32,
        K::E => 'e' as u32,
        K::F => 'f' as u32,
        K::G => 'g' as u32,
        K::H => 'h' as u32,
        K::I => 'i' as u32,
        K::J => 'j' as u32,
        K::K => 'k' as u32,
        K::L => 'l' as u32,
        K::M => 'm' as u32,
        K::N => 'n' as u32,
        K::O => 'o' as u32,
        K::P => 'p' as u32,
        K::Q => 'q' as u32,
        K::R => 'r' as u32,
        K::S => 's' as u32,
        K::T => 't' as u32,
        K::U => 'u' as u32,
        K::V => 'v' as u32,
        K::W => 'w' as u32,
        K::X => 'x' as u32,
        K::Y => 'y' as u32,
        K::Z => 'z' as u32,

        K::Num0 => '0' as u32,
        K::Num1 => '1' as u32,
        K::Num2 => '2' as u32,
        K::Num3 => '3' as u32,
        K::Num4 => '4' as u32,
        K::Num5 => '5' as u32,
        K::Num6 => '6' as u32,
        K::Num7 => '7' as u32,
        K::Num8 => '8' as u32,
        K::Num9 => '9' as u32,

        K::Space => 0x0020,
        K::Enter => XK_RETURN,
        K::Escape => XK_ESCAPE,
        K::Backspace => XK_BACK_SPACE,
        K::Tab => XK_TAB,
        K::Delete => XK_DELETE,
        K::Insert => XK_INSERT,
        K::Home => XK_HOME,
        K::End => XK_END,
        K::PageUp => XK_PAGE_UP,
        K::PageDown => XK_PAGE_DOWN,

        K::ArrowLeft => XK_LEFT,
        K::ArrowUp => XK_UP,
        K::ArrowRight => XK_RIGHT,
        K::ArrowDown => XK_DOWN,

        K::Minus => '-' as u32,
        K::Equals => '=' as u32,
        K::Comma => ',' as u32,
        K::Period => '.' as u32,
        K::Slash => '/' as u32,
        K::Backslash => '\\' as u32,
        K::Semicolon => ';' as u32,
        K::Colon => ':' as u32,
        K::Backtick => '`' as u32,
        K::OpenBracket => '[' as u32,
        K::CloseBracket => ']' as u32,
        K::Pipe => '|' as u32,
        K::Questionmark => '?' as u32,
        K::Plus => '+' as u32,

        K::F1 => XK_F1,
        K::F2 => XK_F1 + 1,
        K::F3 => XK_F1 + 2,
        K::F4 => XK_F1 + 3,
        K::F5 => XK_F1 + 4,
        K::F6 => XK_F1 + 5,
        K::F7 => XK_F1 + 6,
        K::F8 => XK_F1 + 7,
        K::F9 => XK_F1 + 8,
        K::F10 => XK_F1 + 9,
        K::F11 => XK_F1 + 10,
        K::F12 => XK_F1 + 11,

        _ => return None,
    })
}

/// Maps egui's current modifier state to the X11 keysym for the left variant
/// of each held modifier. Used to synthesize modifier key events since egui
/// reports modifiers as booleans rather than discrete key-down events.
#[must_use]
pub fn modifier_keysyms(modifiers: &egui::Modifiers) -> Vec<u32> {
    let mut keysyms = Vec::new();
    if modifiers.shift {
        keysyms.push(XK_SHIFT_L);
    }
    if modifiers.ctrl {
        keysyms.push(XK_CONTROL_L);
    }
    if modifiers.alt {
        keysyms.push(XK_ALT_L);
    }
    if modifiers.mac_cmd || modifiers.command {
        keysyms.push(XK_SUPER_L);
    }
    keysyms
}
