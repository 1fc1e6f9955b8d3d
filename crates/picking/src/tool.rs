//! Cancelable point and polygon picking sessions.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use foundation::math::Ecef;
use runtime::CancelToken;
use tokio::sync::mpsc;
use tracing::debug;

use crate::input::{CursorStyle, InputEvent, InputSurface, Key, ListenerId};
use crate::ray::Camera;
use crate::terrain::{TerrainSurface, sample_terrain};

pub const DEFAULT_MAX_TERRAIN_LEVEL: u32 = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickError {
    /// Escape, outside click or programmatic cancel.
    Aborted,
    /// Another session is already armed.
    Busy,
    /// The input surface detached the session's listener.
    InputClosed,
}

impl fmt::Display for PickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickError::Aborted => write!(f, "Aborted by user!"),
            PickError::Busy => write!(f, "a picking session is already active"),
            PickError::InputClosed => write!(f, "input surface closed during picking"),
        }
    }
}

impl std::error::Error for PickError {}

/// Live preview passed to the caller while a session is armed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickPreview<'a> {
    /// Terrain point under the pointer.
    pub hover: Ecef,
    /// Points committed so far (empty when picking a single point).
    pub ring: &'a [Ecef],
}

/// Armed session. Dropping it detaches the listener, restores the cursor and
/// frees the single picking slot, whichever way the session ends.
struct Session<'a> {
    input: &'a InputSurface,
    armed: &'a AtomicBool,
    listener: ListenerId,
    previous_cursor: CursorStyle,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.input.unlisten(self.listener);
        self.input.set_cursor(self.previous_cursor);
        self.armed.store(false, Ordering::Release);
        debug!("picking: session closed");
    }
}

/// Turns canvas input into terrain points.
pub struct Picker {
    input: Arc<InputSurface>,
    camera: Arc<dyn Camera>,
    terrain: Arc<dyn TerrainSurface>,
    max_level: u32,
    armed: AtomicBool,
}

impl Picker {
    pub fn new(input: Arc<InputSurface>, camera: Arc<dyn Camera>, terrain: Arc<dyn TerrainSurface>) -> Self {
        Self {
            input,
            camera,
            terrain,
            max_level: DEFAULT_MAX_TERRAIN_LEVEL,
            armed: AtomicBool::new(false),
        }
    }

    /// Finest fixed level the terrain fallback starts from.
    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn input(&self) -> &Arc<InputSurface> {
        &self.input
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    fn arm(&self) -> Result<(Session<'_>, mpsc::UnboundedReceiver<InputEvent>), PickError> {
        if self.armed.swap(true, Ordering::AcqRel) {
            return Err(PickError::Busy);
        }
        let (listener, rx) = self.input.listen();
        let previous_cursor = self.input.cursor();
        self.input.set_cursor(CursorStyle::Crosshair);
        debug!("picking: session armed");
        Ok((
            Session {
                input: &self.input,
                armed: &self.armed,
                listener,
                previous_cursor,
            },
            rx,
        ))
    }

    async fn sample(&self, x: f64, y: f64) -> Option<Ecef> {
        sample_terrain(self.camera.as_ref(), self.terrain.as_ref(), x, y, self.max_level).await
    }

    /// Resolves with the terrain point under the next resolvable click.
    pub async fn pick_point(&self, cancel: &CancelToken) -> Result<Ecef, PickError> {
        self.pick_point_with(cancel, |_| {}).await
    }

    pub async fn pick_point_with<F>(&self, cancel: &CancelToken, mut preview: F) -> Result<Ecef, PickError>
    where
        F: FnMut(PickPreview<'_>) + Send,
    {
        let (_session, mut rx) = self.arm()?;
        loop {
            match next_event(cancel, &mut rx).await? {
                InputEvent::OutsideClick | InputEvent::KeyDown(Key::Escape) => {
                    debug!("picking: aborted by user");
                    return Err(PickError::Aborted);
                }
                InputEvent::PointerMove { x, y } => {
                    if let Some(hover) = until_cancelled(cancel, self.sample(x, y)).await? {
                        preview(PickPreview { hover, ring: &[] });
                    }
                }
                InputEvent::Click { x, y } => match until_cancelled(cancel, self.sample(x, y)).await? {
                    Some(point) => {
                        debug!(?point, "picking: point resolved");
                        return Ok(point);
                    }
                    None => debug!(x, y, "picking: click did not resolve to terrain"),
                },
                InputEvent::ContextMenu { .. } | InputEvent::KeyDown(_) => {}
            }
        }
    }

    /// Accumulates clicked points; a right click closes the ring once it has
    /// at least three points.
    pub async fn pick_polygon(&self, cancel: &CancelToken) -> Result<Vec<Ecef>, PickError> {
        self.pick_polygon_with(cancel, |_| {}).await
    }

    pub async fn pick_polygon_with<F>(&self, cancel: &CancelToken, mut preview: F) -> Result<Vec<Ecef>, PickError>
    where
        F: FnMut(PickPreview<'_>) + Send,
    {
        let (_session, mut rx) = self.arm()?;
        let mut ring: Vec<Ecef> = Vec::new();
        loop {
            match next_event(cancel, &mut rx).await? {
                InputEvent::OutsideClick | InputEvent::KeyDown(Key::Escape) => {
                    debug!(points = ring.len(), "picking: polygon aborted by user");
                    return Err(PickError::Aborted);
                }
                InputEvent::PointerMove { x, y } => {
                    if let Some(hover) = until_cancelled(cancel, self.sample(x, y)).await? {
                        preview(PickPreview { hover, ring: &ring });
                    }
                }
                InputEvent::Click { x, y } => {
                    if let Some(point) = until_cancelled(cancel, self.sample(x, y)).await? {
                        ring.push(point);
                        preview(PickPreview { hover: point, ring: &ring });
                    }
                }
                InputEvent::ContextMenu { .. } => {
                    if ring.len() >= 3 {
                        debug!(points = ring.len(), "picking: polygon closed");
                        return Ok(ring);
                    }
                    debug!(points = ring.len(), "picking: ring too short to close");
                }
                InputEvent::KeyDown(_) => {}
            }
        }
    }
}

impl fmt::Debug for Picker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Picker")
            .field("max_level", &self.max_level)
            .field("armed", &self.is_armed())
            .finish()
    }
}

async fn next_event(
    cancel: &CancelToken,
    rx: &mut mpsc::UnboundedReceiver<InputEvent>,
) -> Result<InputEvent, PickError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PickError::Aborted),
        event = rx.recv() => event.ok_or(PickError::InputClosed),
    }
}

async fn until_cancelled<F: Future>(cancel: &CancelToken, fut: F) -> Result<F::Output, PickError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PickError::Aborted),
        out = fut => Ok(out),
    }
}
