//! The display adapter for a real X server, built on x11rb.
//!
//! Requests are sent unchecked; any errors they cause come back through the
//! event stream and are logged by the reader thread.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, trace, warn};
use x11rb::connection::Connection;
use x11rb::cookie::VoidCookie;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::xproto::{
    self, ChangeWindowAttributesAux, ConfigureWindowAux, ConnectionExt as _, GrabMode, InputFocus,
    ModMask,
};
use x11rb::protocol::{ErrorKind, Event as XEvent};
use x11rb::rust_connection::RustConnection;

use crate::actor::reactor::{self, Event};
use crate::model::screen::{ScreenInfo, Setup};
use crate::sys::display::{
    Display, DisplayError, EventMask, KeyboardMapping, Pixel, Rgb, WindowAttributes, WindowId,
};
use crate::sys::geometry::Rect;
use crate::sys::hotkey::Modifiers;

impl From<ConnectionError> for DisplayError {
    fn from(e: ConnectionError) -> Self { DisplayError::Connection(e.to_string()) }
}

impl From<ReplyError> for DisplayError {
    fn from(e: ReplyError) -> Self {
        match e {
            ReplyError::ConnectionError(e) => e.into(),
            ReplyError::X11Error(e) => DisplayError::Request(format!("{:?}", e.error_kind)),
        }
    }
}

pub struct X11Display {
    conn: Arc<RustConnection>,
}

/// Opens a connection to `display_name`, or to `$DISPLAY` when `None`.
pub fn connect(display_name: Option<&str>) -> Result<(X11Display, Setup), DisplayError> {
    let (conn, _) =
        x11rb::connect(display_name).map_err(|e| DisplayError::Connection(e.to_string()))?;
    let server = conn.setup();
    let screens = server
        .roots
        .iter()
        .map(|screen| ScreenInfo {
            root: WindowId(screen.root),
            colormap: screen.default_colormap,
            width: i32::from(screen.width_in_pixels),
            height: i32::from(screen.height_in_pixels),
            mm_width: i32::from(screen.width_in_millimeters),
            mm_height: i32::from(screen.height_in_millimeters),
        })
        .collect();
    let setup = Setup {
        screens,
        min_keycode: server.min_keycode,
        max_keycode: server.max_keycode,
    };
    debug!(?setup, "Connected to display server");
    Ok((X11Display { conn: Arc::new(conn) }, setup))
}

impl X11Display {
    /// Starts the thread that turns protocol events into reactor events.
    /// The thread ends when the connection breaks or the reactor is gone.
    pub fn spawn_event_reader(&self, events: reactor::Sender) -> io::Result<JoinHandle<()>> {
        let conn = Arc::clone(&self.conn);
        thread::Builder::new()
            .name("x11-events".to_owned())
            .spawn(move || read_events(&conn, &events))
    }

    fn check(
        &self,
        what: &str,
        result: Result<VoidCookie<'_, Arc<RustConnection>>, ConnectionError>,
    ) {
        if let Err(e) = result {
            warn!("{what} failed: {e}");
        }
    }
}

fn read_events(conn: &RustConnection, events: &reactor::Sender) {
    loop {
        let event = match conn.wait_for_event() {
            Ok(event) => event,
            Err(e) => {
                error!("Lost the connection to the display server: {e}");
                events.send(Event::Exit);
                return;
            }
        };
        let Some(event) = translate(event) else { continue };
        if events.try_send(event).is_err() {
            debug!("Reactor is gone, stopping event reader");
            return;
        }
    }
}

fn translate(event: XEvent) -> Option<Event> {
    let event = match event {
        XEvent::MapRequest(e) => Event::MapRequest(WindowId(e.window)),
        XEvent::DestroyNotify(e) => Event::WindowDestroyed(WindowId(e.window)),
        XEvent::ConfigureRequest(e) => Event::ConfigureRequest {
            window: WindowId(e.window),
            rect: Rect::new(
                i32::from(e.x),
                i32::from(e.y),
                i32::from(e.width),
                i32::from(e.height),
            ),
        },
        XEvent::EnterNotify(e) => Event::PointerEntered(WindowId(e.event)),
        XEvent::KeyPress(e) => Event::KeyPress {
            keycode: e.detail,
            state: u16::from(e.state),
        },
        XEvent::KeyRelease(e) => Event::KeyRelease {
            keycode: e.detail,
            state: u16::from(e.state),
        },
        XEvent::Error(e) if e.error_kind == ErrorKind::Window => {
            debug!(?e, "Request for a window that is already gone");
            return None;
        }
        XEvent::Error(e) => {
            warn!(?e, "Display server reported an error");
            return None;
        }
        other => {
            trace!(?other, "Ignoring event");
            return None;
        }
    };
    Some(event)
}

fn window_size(value: i32) -> u32 { value.max(1).unsigned_abs() }

impl Display for X11Display {
    fn map(&mut self, window: WindowId) { self.check("MapWindow", self.conn.map_window(window.0)) }

    fn unmap(&mut self, window: WindowId) {
        self.check("UnmapWindow", self.conn.unmap_window(window.0))
    }

    fn move_resize(&mut self, window: WindowId, rect: Rect) {
        let aux = ConfigureWindowAux::new()
            .x(rect.x)
            .y(rect.y)
            .width(window_size(rect.width))
            .height(window_size(rect.height));
        self.check("ConfigureWindow", self.conn.configure_window(window.0, &aux))
    }

    fn configure(&mut self, window: WindowId, rect: Rect, border_width: u32) {
        let aux = ConfigureWindowAux::new()
            .x(rect.x)
            .y(rect.y)
            .width(window_size(rect.width))
            .height(window_size(rect.height))
            .border_width(border_width);
        self.check("ConfigureWindow", self.conn.configure_window(window.0, &aux))
    }

    fn set_border_color(&mut self, window: WindowId, color: Pixel) {
        let aux = ChangeWindowAttributesAux::new().border_pixel(color.0);
        self.check("ChangeWindowAttributes", self.conn.change_window_attributes(window.0, &aux))
    }

    fn destroy(&mut self, window: WindowId) {
        self.check("DestroyWindow", self.conn.destroy_window(window.0))
    }

    fn set_input_focus(&mut self, window: WindowId) {
        self.check(
            "SetInputFocus",
            self.conn.set_input_focus(InputFocus::POINTER_ROOT, window.0, x11rb::CURRENT_TIME),
        )
    }

    fn grab_key(&mut self, root: WindowId, modifiers: Modifiers, keycode: u8) {
        self.check(
            "GrabKey",
            self.conn.grab_key(
                false,
                root.0,
                ModMask::from(modifiers.bits()),
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            ),
        )
    }

    fn change_attributes(&mut self, window: WindowId, mask: EventMask) {
        let aux = ChangeWindowAttributesAux::new().event_mask(xproto::EventMask::from(mask.bits()));
        self.check("ChangeWindowAttributes", self.conn.change_window_attributes(window.0, &aux))
    }

    fn change_root_attributes(
        &mut self,
        root: WindowId,
        mask: EventMask,
    ) -> Result<(), DisplayError> {
        let aux = ChangeWindowAttributesAux::new().event_mask(xproto::EventMask::from(mask.bits()));
        self.conn.change_window_attributes(root.0, &aux)?.check()?;
        Ok(())
    }

    fn get_window_attributes(&mut self, window: WindowId) -> Result<WindowAttributes, DisplayError> {
        let reply = self.conn.get_window_attributes(window.0)?.reply().map_err(|e| match e {
            ReplyError::X11Error(ref x) if x.error_kind == ErrorKind::Window => {
                DisplayError::NoSuchWindow(window)
            }
            other => other.into(),
        })?;
        Ok(WindowAttributes { override_redirect: reply.override_redirect })
    }

    fn alloc_color(&mut self, colormap: u32, color: Rgb) -> Result<Pixel, DisplayError> {
        let channel = |c: u8| u16::from(c) * 257;
        let reply = self
            .conn
            .alloc_color(colormap, channel(color.r), channel(color.g), channel(color.b))?
            .reply()?;
        Ok(Pixel(reply.pixel))
    }

    fn get_keyboard_mapping(
        &mut self,
        min: u8,
        count: u8,
    ) -> Result<KeyboardMapping, DisplayError> {
        let reply = self.conn.get_keyboard_mapping(min, count)?.reply()?;
        Ok(KeyboardMapping {
            min_keycode: min,
            keysyms_per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        })
    }

    fn flush(&mut self) {
        if let Err(e) = self.conn.flush() {
            warn!("Flushing requests failed: {e}");
        }
    }
}
