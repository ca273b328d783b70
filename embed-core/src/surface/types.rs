//! Shared value types for the surface tree.
//!
//! These are plain identifiers and descriptors passed between the
//! service, the platform collaborators and the host. None of them own
//! a kernel resource by themselves; ownership lives in the tree.

use std::fmt;

// ── Identifiers ──────────────────────────────────────────────────

/// Identifier of a physical or virtual display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayId(pub u32);

impl DisplayId {
    /// The built-in display every service binds its remote views to.
    pub const DEFAULT: DisplayId = DisplayId(0);
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a surface in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque host-issued identity that correlates input events with the
/// host window across the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputRoutingToken(pub u64);

impl fmt::Display for InputRoutingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{:#x}", self.0)
    }
}

// ── Display ──────────────────────────────────────────────────────

/// A resolved display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Display {
    pub id: DisplayId,
    /// Width in device pixels.
    pub width: u32,
    /// Height in device pixels.
    pub height: u32,
}

// ── Geometry ─────────────────────────────────────────────────────

/// Size of an embedded window in device pixels.
///
/// Signed so that hostile or buggy input (zero, negative) can be
/// represented and rejected instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Both dimensions are strictly positive.
    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── Content ──────────────────────────────────────────────────────

/// 32-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const BLUE: Color = Color::rgb(0x00, 0x00, 0xFF);
    pub const CYAN: Color = Color::rgb(0x00, 0xFF, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => None,
        }
    }
}

/// A run of text drawn into a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub size: u16,
    pub color: Color,
}

/// What a surface currently displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceContent {
    pub background: Color,
    pub text: Option<TextRun>,
}

impl SurfaceContent {
    pub fn solid(background: Color) -> Self {
        Self {
            background,
            text: None,
        }
    }

    pub fn with_text(mut self, text: TextRun) -> Self {
        self.text = Some(text);
        self
    }
}

// ── Input ────────────────────────────────────────────────────────

/// An input event routed to an embedded surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Motion { x: i32, y: i32 },
    Key { code: u32, pressed: bool },
}

/// Callback invoked for every input event delivered to a surface.
/// Returns `true` if the event was consumed.
pub type InputReceiver = Box<dyn FnMut(&InputEvent) -> bool + Send>;

// ── Surface handle ───────────────────────────────────────────────

/// Lifecycle of a surface as seen through its handle.
///
/// ```text
/// Unbound → Hidden → Shown ⇄ Hidden → Removed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceState {
    /// Allocated but never committed through a transaction.
    Unbound,
    Hidden,
    Shown,
    Removed,
}

impl SurfaceState {
    /// Whether the handle may still be used in a transaction.
    pub const fn is_live(self) -> bool {
        !matches!(self, SurfaceState::Removed)
    }
}

/// Transferable reference to a surface in the tree.
///
/// Cloning a handle clones the reference, not the surface. The state
/// of the surface lives in the tree and is queried through the
/// platform, never cached on the handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    id: SurfaceId,
}

impl SurfaceHandle {
    pub const fn from_id(id: SurfaceId) -> Self {
        Self { id }
    }

    pub const fn id(&self) -> SurfaceId {
        self.id
    }
}

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface{}", self.id)
    }
}

/// Parameters for allocating a new surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub name: String,
    /// Parent at creation time; `None` creates a detached root.
    pub parent: Option<SurfaceHandle>,
    pub width: i32,
    pub height: i32,
}

impl SurfaceSpec {
    pub fn new(name: impl Into<String>, width: i32, height: i32) -> Self {
        Self {
            name: name.into(),
            parent: None,
            width,
            height,
        }
    }

    pub fn with_parent(mut self, parent: &SurfaceHandle) -> Self {
        self.parent = Some(parent.clone());
        self
    }
}
