//! KWin backend for KDE Plasma on Wayland
//!
//! This backend wraps the X11 backend for enumeration and geometry (via XWayland)
//! but uses KWin's D-Bus scripting API to raise windows, which properly
//! activates them on Wayland instead of just requesting attention.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use zbus::Connection;
use zbus::zvariant::ObjectPath;

use super::x11::X11Backend;
use super::{Geometry, WindowBackend, WindowRef};

/// Distinguishes script files of raises running at the same time
static SCRIPT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Temp file for one activation script; never shared between calls
fn next_script_path() -> PathBuf {
    let seq = SCRIPT_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("winman_raise_{}_{}.js", std::process::id(), seq))
}

/// KWin backend that uses D-Bus for raise operations
pub struct KWinBackend {
    /// Wrapped X11 backend for listing/geometry operations
    x11_backend: Arc<X11Backend>,
    /// D-Bus connection
    dbus: Connection,
}

impl KWinBackend {
    /// Create a new KWin backend
    pub async fn new(x11_backend: Arc<X11Backend>) -> anyhow::Result<Self> {
        let dbus = Connection::session().await?;
        Ok(Self { x11_backend, dbus })
    }

    /// Activate the window of `pid` with caption `title` using KWin's scripting API
    async fn raise_via_kwin(&self, pid: u32, title: &str) -> anyhow::Result<()> {
        let script = activation_script(pid, title);

        // KWin requires a file path
        let script_path = next_script_path();
        tokio::fs::write(&script_path, &script).await?;

        let result = self.run_script(&script_path).await;

        let _ = tokio::fs::remove_file(&script_path).await;
        result
    }

    async fn run_script(&self, script_path: &std::path::Path) -> anyhow::Result<()> {
        let Some(script_path_str) = script_path.to_str() else {
            anyhow::bail!("Script path is not valid UTF-8: {}", script_path.display());
        };

        let reply = self.dbus
            .call_method(
                Some("org.kde.KWin"),
                "/Scripting",
                Some("org.kde.kwin.Scripting"),
                "loadScript",
                &(script_path_str,),
            )
            .await?;

        let script_id: i32 = reply.body().deserialize()?;
        if script_id < 0 {
            anyhow::bail!("KWin refused to load script (id {})", script_id);
        }

        let script_obj_path = format!("/{}", script_id);
        let script_obj_path = ObjectPath::try_from(script_obj_path.as_str())?;

        self.dbus
            .call_method(
                Some("org.kde.KWin"),
                script_obj_path.clone(),
                Some("org.kde.kwin.Script"),
                "run",
                &(),
            )
            .await?;

        // Small delay to let the script execute
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        // Stop/unload the script (ignore errors)
        let _ = self.dbus
            .call_method(
                Some("org.kde.KWin"),
                script_obj_path,
                Some("org.kde.kwin.Script"),
                "stop",
                &(),
            )
            .await;

        Ok(())
    }
}

/// Build a KWin script that activates the first window of `pid` with the given caption
fn activation_script(pid: u32, title: &str) -> String {
    format!(
        r#"
        (function() {{
            // Try KDE 6 API first, fall back to KDE 5
            var windows = typeof workspace.windowList === 'function'
                ? workspace.windowList()
                : workspace.clientList();
            for (var i = 0; i < windows.length; i++) {{
                var w = windows[i];
                var title = w.caption || w.title || '';
                if (w.pid === {} && title === '{}') {{
                    workspace.activeWindow = w;  // KDE 6
                    workspace.activeClient = w;  // KDE 5 fallback
                    break;
                }}
            }}
        }})();
        "#,
        pid,
        escape_js(title)
    )
}

fn escape_js(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[async_trait]
impl WindowBackend for KWinBackend {
    async fn list_windows(&self, pid: i32) -> anyhow::Result<Vec<WindowRef>> {
        // Delegate to X11 backend - this works via XWayland
        self.x11_backend.list_windows(pid).await
    }

    async fn window_title(&self, window: &WindowRef) -> anyhow::Result<String> {
        self.x11_backend.window_title(window).await
    }

    async fn focused_window(&self, pid: i32) -> anyhow::Result<Option<WindowRef>> {
        self.x11_backend.focused_window(pid).await
    }

    async fn set_geometry(&self, window: &WindowRef, geometry: Geometry) -> anyhow::Result<()> {
        // Delegate to X11 backend - this usually works for XWayland windows
        self.x11_backend.set_geometry(window, geometry).await
    }

    async fn set_main(&self, window: &WindowRef) -> anyhow::Result<()> {
        self.x11_backend.set_main(window).await
    }

    async fn raise(&self, window: &WindowRef) -> anyhow::Result<()> {
        // KWin matches by owner and caption, so look both up through X11 first
        let Some(pid) = self.x11_backend.window_pid(window) else {
            tracing::debug!("Window has no _NET_WM_PID, raising via X11");
            return self.x11_backend.raise(window).await;
        };
        let title = self.x11_backend.window_title(window).await?;

        match self.raise_via_kwin(pid, &title).await {
            Ok(()) => {
                tracing::debug!("Raised window via KWin D-Bus: {}", title);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("KWin D-Bus raise failed, falling back to X11: {}", e);
                // Fall back to X11 (may only request attention, but better than nothing)
                self.x11_backend.raise(window).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_escapes_quotes_in_title() {
        let script = activation_script(1, r#"it's "quoted""#);
        assert!(script.contains(r#"title === 'it\'s \"quoted\"'"#));
    }

    #[test]
    fn script_escapes_newlines_in_title() {
        let script = activation_script(1, "line one\nline two");
        assert!(script.contains(r"title === 'line one\nline two'"));
    }

    #[test]
    fn script_only_matches_windows_of_the_pid() {
        let script = activation_script(4242, "Main");
        assert!(script.contains("w.pid === 4242 && title === 'Main'"));
    }

    #[test]
    fn each_raise_gets_its_own_script_file() {
        let first = next_script_path();
        let second = next_script_path();
        assert_ne!(first, second);
        assert!(first.starts_with(std::env::temp_dir()));
    }
}
