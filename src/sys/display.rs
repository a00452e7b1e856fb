//! The capability set the window manager needs from a display server.
//!
//! Every request is modeled as a message to an external collaborator. Most of
//! them are fire-and-forget: implementations log failures instead of
//! returning them. Only the queries and the root registration report errors.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sys::geometry::Rect;
use crate::sys::hotkey::Modifiers;

/// Opaque handle of a window on the display server.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u32);

impl fmt::Debug for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "WindowId(0x{:x})", self.0) }
}

/// An allocated color value, ready to be used as a border pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pixel(pub u32);

/// An 8-bit per channel color, written as `#rrggbb` in the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self { Rgb { r, g, b } }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("Invalid color `{s}`, expected #rrggbb"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| format!("Invalid color `{s}`, expected #rrggbb"))
        };
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self { value.to_string() }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

bitflags! {
    /// Event selection bits, using the X11 core protocol values.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const ENTER_WINDOW = 1 << 4;
        const SUBSTRUCTURE_NOTIFY = 1 << 19;
        const SUBSTRUCTURE_REDIRECT = 1 << 20;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowAttributes {
    pub override_redirect: bool,
}

/// Raw keyboard mapping as returned by the server: `keysyms_per_keycode`
/// consecutive keysyms for every keycode starting at `min_keycode`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyboardMapping {
    pub min_keycode: u8,
    pub keysyms_per_keycode: u8,
    pub keysyms: Vec<u32>,
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Connection to the display server failed: {0}")]
    Connection(String),
    #[error("Request was rejected by the display server: {0}")]
    Request(String),
    #[error("Window {0:?} does not exist")]
    NoSuchWindow(WindowId),
}

pub trait Display {
    fn map(&mut self, window: WindowId);
    fn unmap(&mut self, window: WindowId);
    fn move_resize(&mut self, window: WindowId, rect: Rect);
    fn configure(&mut self, window: WindowId, rect: Rect, border_width: u32);
    fn set_border_color(&mut self, window: WindowId, color: Pixel);
    fn destroy(&mut self, window: WindowId);
    fn set_input_focus(&mut self, window: WindowId);
    fn grab_key(&mut self, root: WindowId, modifiers: Modifiers, keycode: u8);
    fn change_attributes(&mut self, window: WindowId, mask: EventMask);

    /// Selects events on a root window. Fails when another client already
    /// holds substructure redirection.
    fn change_root_attributes(&mut self, root: WindowId, mask: EventMask)
    -> Result<(), DisplayError>;

    fn get_window_attributes(&mut self, window: WindowId) -> Result<WindowAttributes, DisplayError>;
    fn alloc_color(&mut self, colormap: u32, color: Rgb) -> Result<Pixel, DisplayError>;
    fn get_keyboard_mapping(&mut self, min: u8, count: u8)
    -> Result<KeyboardMapping, DisplayError>;

    /// Pushes out buffered requests. Called once an event has been handled.
    fn flush(&mut self) {}
}


#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::common::collections::{HashMap, HashSet};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Request {
        Map(WindowId),
        Unmap(WindowId),
        MoveResize(WindowId, Rect),
        Configure(WindowId, Rect, u32),
        SetBorderColor(WindowId, Pixel),
        Destroy(WindowId),
        SetInputFocus(WindowId),
        GrabKey(WindowId, Modifiers, u8),
        ChangeAttributes(WindowId, EventMask),
        ChangeRootAttributes(WindowId, EventMask),
    }

    /// A display that records every request instead of talking to a server.
    #[derive(Default)]
    pub struct RecordingDisplay {
        requests: Vec<Request>,
        pub override_redirect: HashSet<WindowId>,
        pub gone: HashSet<WindowId>,
        pub root_taken: bool,
        pub mapping: KeyboardMapping,
        pub colors: HashMap<(u8, u8, u8), Pixel>,
    }

    impl RecordingDisplay {
        pub fn new() -> Self { Self::default() }

        /// Drains and returns the requests recorded so far.
        pub fn requests(&mut self) -> Vec<Request> { std::mem::take(&mut self.requests) }

        /// The last geometry configured for each window, in request order.
        pub fn last_geometry(requests: &[Request]) -> HashMap<WindowId, Rect> {
            let mut out = HashMap::default();
            for request in requests {
                if let Request::Configure(wid, rect, _) = request {
                    out.insert(*wid, *rect);
                }
            }
            out
        }
    }

    impl Display for RecordingDisplay {
        fn map(&mut self, window: WindowId) { self.requests.push(Request::Map(window)) }

        fn unmap(&mut self, window: WindowId) { self.requests.push(Request::Unmap(window)) }

        fn move_resize(&mut self, window: WindowId, rect: Rect) {
            self.requests.push(Request::MoveResize(window, rect))
        }

        fn configure(&mut self, window: WindowId, rect: Rect, border_width: u32) {
            self.requests.push(Request::Configure(window, rect, border_width))
        }

        fn set_border_color(&mut self, window: WindowId, color: Pixel) {
            self.requests.push(Request::SetBorderColor(window, color))
        }

        fn destroy(&mut self, window: WindowId) {
            self.gone.insert(window);
            self.requests.push(Request::Destroy(window))
        }

        fn set_input_focus(&mut self, window: WindowId) {
            self.requests.push(Request::SetInputFocus(window))
        }

        fn grab_key(&mut self, root: WindowId, modifiers: Modifiers, keycode: u8) {
            self.requests.push(Request::GrabKey(root, modifiers, keycode))
        }

        fn change_attributes(&mut self, window: WindowId, mask: EventMask) {
            self.requests.push(Request::ChangeAttributes(window, mask))
        }

        fn change_root_attributes(
            &mut self,
            root: WindowId,
            mask: EventMask,
        ) -> Result<(), DisplayError> {
            self.requests.push(Request::ChangeRootAttributes(root, mask));
            if self.root_taken {
                return Err(DisplayError::Request("BadAccess".into()));
            }
            Ok(())
        }

        fn get_window_attributes(
            &mut self,
            window: WindowId,
        ) -> Result<WindowAttributes, DisplayError> {
            if self.gone.contains(&window) {
                return Err(DisplayError::NoSuchWindow(window));
            }
            Ok(WindowAttributes {
                override_redirect: self.override_redirect.contains(&window),
            })
        }

        fn alloc_color(&mut self, _colormap: u32, color: Rgb) -> Result<Pixel, DisplayError> {
            let key = (color.r, color.g, color.b);
            let next = Pixel(
                (u32::from(color.r) << 16) | (u32::from(color.g) << 8) | u32::from(color.b),
            );
            Ok(*self.colors.entry(key).or_insert(next))
        }

        fn get_keyboard_mapping(
            &mut self,
            _min: u8,
            _count: u8,
        ) -> Result<KeyboardMapping, DisplayError> {
            Ok(self.mapping.clone())
        }
    }
}
