//! X11 window backend using x11rb
//!
//! Windows are discovered through the EWMH client lists maintained by the
//! window manager and attributed to processes through `_NET_WM_PID`.

use std::collections::HashSet;

use async_trait::async_trait;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

use super::{Geometry, WindowBackend, WindowRef};

/// `_NET_WM_STATE` client message action
const NET_WM_STATE_REMOVE: u32 = 0;
/// Source indication for EWMH client messages: 1 = application
const SOURCE_APPLICATION: u32 = 1;

/// X11 window backend
pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    atoms: X11Atoms,
}

/// Cached X11 atoms for efficiency
struct X11Atoms {
    net_client_list: Atom,
    net_client_list_stacking: Atom,
    net_wm_name: Atom,
    net_wm_pid: Atom,
    net_active_window: Atom,
    wm_name: Atom,
    utf8_string: Atom,
    net_wm_state: Atom,
    net_wm_state_maximized_vert: Atom,
    net_wm_state_maximized_horz: Atom,
}

impl X11Backend {
    /// Create a new X11 backend
    pub fn new() -> anyhow::Result<Self> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;

        let atoms = Self::intern_atoms(&conn)?;

        Ok(Self { conn, root, atoms })
    }

    fn intern_atoms(conn: &RustConnection) -> anyhow::Result<X11Atoms> {
        let intern = |name: &[u8]| -> anyhow::Result<Atom> {
            Ok(conn.intern_atom(false, name)?.reply()?.atom)
        };

        Ok(X11Atoms {
            net_client_list: intern(b"_NET_CLIENT_LIST")?,
            net_client_list_stacking: intern(b"_NET_CLIENT_LIST_STACKING")?,
            net_wm_name: intern(b"_NET_WM_NAME")?,
            net_wm_pid: intern(b"_NET_WM_PID")?,
            net_active_window: intern(b"_NET_ACTIVE_WINDOW")?,
            wm_name: intern(b"WM_NAME")?,
            utf8_string: intern(b"UTF8_STRING")?,
            net_wm_state: intern(b"_NET_WM_STATE")?,
            net_wm_state_maximized_vert: intern(b"_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: intern(b"_NET_WM_STATE_MAXIMIZED_HORZ")?,
        })
    }

    fn get_window_property(
        &self,
        window: Window,
        property: Atom,
        type_: Atom,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let reply = self.conn.get_property(
            false,
            window,
            property,
            type_,
            0,
            u32::MAX,
        )?.reply()?;

        if reply.value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(reply.value))
        }
    }

    /// Read a 32-bit list property (window lists, atom lists, cardinals)
    fn get_u32_list(
        &self,
        window: Window,
        property: Atom,
        type_: Atom,
    ) -> anyhow::Result<Vec<u32>> {
        Ok(self
            .get_window_property(window, property, type_)?
            .map(|data| parse_u32_list(&data))
            .unwrap_or_default())
    }

    /// Managed client windows, bottom-to-top when read from the stacking list
    fn client_windows(&self, property: Atom) -> anyhow::Result<Vec<Window>> {
        self.get_u32_list(self.root, property, AtomEnum::WINDOW.into())
    }

    /// Client windows in the window manager's enumeration order
    fn all_client_windows(&self) -> anyhow::Result<Vec<Window>> {
        let windows = self.client_windows(self.atoms.net_client_list)?;
        if !windows.is_empty() {
            return Ok(windows);
        }
        self.client_windows(self.atoms.net_client_list_stacking)
    }

    fn get_window_pid(&self, window: Window) -> Option<u32> {
        self.get_u32_list(window, self.atoms.net_wm_pid, AtomEnum::CARDINAL.into())
            .ok()?
            .first()
            .copied()
    }

    fn belongs_to(&self, window: Window, pid: i32) -> bool {
        u32::try_from(pid).is_ok_and(|pid| self.get_window_pid(window) == Some(pid))
    }

    /// `_NET_WM_PID` of `window`, if the client set one
    pub fn window_pid(&self, window: &WindowRef) -> Option<u32> {
        let WindowRef::X11(id) = *window;
        self.get_window_pid(id)
    }

    fn get_window_title(&self, window: Window) -> String {
        // Try _NET_WM_NAME first (UTF-8)
        let utf8 = self.atoms.utf8_string;
        if let Ok(Some(data)) = self.get_window_property(window, self.atoms.net_wm_name, utf8) {
            if let Ok(s) = String::from_utf8(data) {
                return s;
            }
        }

        // Fall back to WM_NAME
        let latin1: Atom = AtomEnum::STRING.into();
        if let Ok(Some(data)) = self.get_window_property(window, self.atoms.wm_name, latin1) {
            if let Ok(s) = String::from_utf8(data) {
                return s;
            }
        }

        String::new()
    }

    fn get_active_window(&self) -> Option<Window> {
        let windows = self
            .get_u32_list(self.root, self.atoms.net_active_window, AtomEnum::WINDOW.into())
            .ok()?;
        windows.first().copied().filter(|&w| w != 0)
    }

    fn is_window_viewable(&self, window: Window) -> bool {
        match self.conn.get_window_attributes(window) {
            Ok(cookie) => cookie
                .reply()
                .is_ok_and(|reply| reply.map_state == xproto::MapState::VIEWABLE),
            Err(_) => false,
        }
    }

    fn is_maximized(&self, window: Window) -> bool {
        self.get_u32_list(window, self.atoms.net_wm_state, AtomEnum::ATOM.into())
            .unwrap_or_default()
            .iter()
            .any(|&atom| {
                atom == self.atoms.net_wm_state_maximized_vert
                    || atom == self.atoms.net_wm_state_maximized_horz
            })
    }

    /// Ask the window manager to drop the maximized state so a new geometry sticks
    fn unmaximize(&self, window: Window) -> anyhow::Result<()> {
        let event = xproto::ClientMessageEvent::new(
            32,
            window,
            self.atoms.net_wm_state,
            [
                NET_WM_STATE_REMOVE,
                self.atoms.net_wm_state_maximized_vert,
                self.atoms.net_wm_state_maximized_horz,
                SOURCE_APPLICATION,
                0,
            ],
        );
        self.send_root_message(event)
    }

    fn send_root_message(&self, event: xproto::ClientMessageEvent) -> anyhow::Result<()> {
        self.conn.send_event(
            false,
            self.root,
            xproto::EventMask::SUBSTRUCTURE_REDIRECT | xproto::EventMask::SUBSTRUCTURE_NOTIFY,
            event,
        )?;
        self.conn.flush()?;
        Ok(())
    }
}

fn parse_u32_list(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[async_trait]
impl WindowBackend for X11Backend {
    async fn list_windows(&self, pid: i32) -> anyhow::Result<Vec<WindowRef>> {
        let mut seen = HashSet::new();
        let windows = self
            .all_client_windows()?
            .into_iter()
            .filter(|&w| seen.insert(w))
            .filter(|&w| self.belongs_to(w, pid) && self.is_window_viewable(w))
            .map(WindowRef::X11)
            .collect::<Vec<_>>();

        tracing::debug!("Found {} windows for pid {}", windows.len(), pid);
        Ok(windows)
    }

    async fn window_title(&self, window: &WindowRef) -> anyhow::Result<String> {
        let WindowRef::X11(window_id) = *window;
        Ok(self.get_window_title(window_id))
    }

    async fn focused_window(&self, pid: i32) -> anyhow::Result<Option<WindowRef>> {
        if let Some(active) = self.get_active_window() {
            if self.belongs_to(active, pid) {
                return Ok(Some(WindowRef::X11(active)));
            }
        }

        // Not the active application: use its top-most window instead
        let stacking = self.client_windows(self.atoms.net_client_list_stacking)?;
        Ok(stacking
            .into_iter()
            .rev()
            .find(|&w| self.belongs_to(w, pid) && self.is_window_viewable(w))
            .map(WindowRef::X11))
    }

    async fn set_geometry(&self, window: &WindowRef, geometry: Geometry) -> anyhow::Result<()> {
        let WindowRef::X11(window_id) = *window;

        if self.is_maximized(window_id) {
            tracing::debug!("Unmaximizing window {} first", window_id);
            self.unmaximize(window_id)?;
        }

        let values = xproto::ConfigureWindowAux::new()
            .x(geometry.x)
            .y(geometry.y)
            .width(geometry.width)
            .height(geometry.height);

        self.conn.configure_window(window_id, &values)?;
        self.conn.flush()?;
        Ok(())
    }

    async fn set_main(&self, window: &WindowRef) -> anyhow::Result<()> {
        let WindowRef::X11(window_id) = *window;

        // Use _NET_ACTIVE_WINDOW client message
        let event = xproto::ClientMessageEvent::new(
            32,
            window_id,
            self.atoms.net_active_window,
            [SOURCE_APPLICATION, 0, 0, 0, 0],
        );
        self.send_root_message(event)
    }

    async fn raise(&self, window: &WindowRef) -> anyhow::Result<()> {
        let WindowRef::X11(window_id) = *window;

        let values = xproto::ConfigureWindowAux::new().stack_mode(xproto::StackMode::ABOVE);
        self.conn.configure_window(window_id, &values)?;
        self.conn.flush()?;
        Ok(())
    }
}

// Safety: RustConnection is Send + Sync
unsafe impl Send for X11Backend {}
unsafe impl Sync for X11Backend {}
