//! In-memory window backend for tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Geometry, WindowBackend, WindowRef};

/// One window in the fake desktop
#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub pid: i32,
    pub title: String,
    pub geometry: Geometry,
}

/// Operations observed by the fake, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(i32),
    Focused(i32),
    SetGeometry(u32, Geometry),
    SetMain(u32),
    Raise(u32),
}

#[derive(Default)]
struct State {
    windows: Vec<FakeWindow>,
    focused: HashMap<i32, u32>,
    calls: Vec<Call>,
    failing_geometry: Vec<u32>,
    failing_set_main: bool,
    failing_raise: bool,
    unreadable: bool,
}

/// Backend whose windows live in a vector; window ids are vector indices
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a window and return its handle
    pub fn add_window(&self, pid: i32, title: &str) -> WindowRef {
        let mut state = self.state.lock().unwrap();
        state.windows.push(FakeWindow {
            pid,
            title: title.to_string(),
            geometry: Geometry::default(),
        });
        WindowRef::X11((state.windows.len() - 1) as u32)
    }

    pub fn set_focused(&self, pid: i32, window: &WindowRef) {
        let WindowRef::X11(id) = *window;
        self.state.lock().unwrap().focused.insert(pid, id);
    }

    /// Make `set_geometry` fail for this window
    pub fn fail_geometry(&self, window: &WindowRef) {
        let WindowRef::X11(id) = *window;
        self.state.lock().unwrap().failing_geometry.push(id);
    }

    /// Make every `set_main` fail
    pub fn fail_set_main(&self) {
        self.state.lock().unwrap().failing_set_main = true;
    }

    /// Make every `raise` fail
    pub fn fail_raise(&self) {
        self.state.lock().unwrap().failing_raise = true;
    }

    /// Make window enumeration fail, as when accessibility access is denied
    pub fn deny_access(&self) {
        self.state.lock().unwrap().unreadable = true;
    }

    pub fn geometry(&self, window: &WindowRef) -> Geometry {
        let WindowRef::X11(id) = *window;
        self.state.lock().unwrap().windows[id as usize].geometry
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Only the mutating calls, in order
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SetGeometry(..) | Call::SetMain(_) | Call::Raise(_)))
            .collect()
    }
}

#[async_trait]
impl WindowBackend for FakeBackend {
    async fn list_windows(&self, pid: i32) -> anyhow::Result<Vec<WindowRef>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List(pid));
        if state.unreadable {
            anyhow::bail!("accessibility access denied");
        }
        Ok(state
            .windows
            .iter()
            .enumerate()
            .filter(|(_, w)| w.pid == pid)
            .map(|(i, _)| WindowRef::X11(i as u32))
            .collect())
    }

    async fn window_title(&self, window: &WindowRef) -> anyhow::Result<String> {
        let WindowRef::X11(id) = *window;
        let state = self.state.lock().unwrap();
        Ok(state.windows[id as usize].title.clone())
    }

    async fn focused_window(&self, pid: i32) -> anyhow::Result<Option<WindowRef>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Focused(pid));
        if state.unreadable {
            anyhow::bail!("accessibility access denied");
        }
        Ok(state.focused.get(&pid).map(|&id| WindowRef::X11(id)))
    }

    async fn set_geometry(&self, window: &WindowRef, geometry: Geometry) -> anyhow::Result<()> {
        let WindowRef::X11(id) = *window;
        let mut state = self.state.lock().unwrap();
        if state.failing_geometry.contains(&id) {
            anyhow::bail!("window {} rejected geometry", id);
        }
        state.calls.push(Call::SetGeometry(id, geometry));
        state.windows[id as usize].geometry = geometry;
        Ok(())
    }

    async fn set_main(&self, window: &WindowRef) -> anyhow::Result<()> {
        let WindowRef::X11(id) = *window;
        let mut state = self.state.lock().unwrap();
        if state.failing_set_main {
            anyhow::bail!("window {} cannot become main", id);
        }
        state.calls.push(Call::SetMain(id));
        Ok(())
    }

    async fn raise(&self, window: &WindowRef) -> anyhow::Result<()> {
        let WindowRef::X11(id) = *window;
        let mut state = self.state.lock().unwrap();
        if state.failing_raise {
            anyhow::bail!("window {} cannot be raised", id);
        }
        state.calls.push(Call::Raise(id));
        Ok(())
    }
}
