//! Configuration for the embedding service.

use std::path::Path;

use serde::{Deserialize, Serialize};

use embed_core::embed::{ChildSurfaceConfig, ContentRoot, EmbeddingServiceConfig};
use embed_core::surface::{Color, Display, DisplayId, MirrorPolicy};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Display settings.
    pub display: DisplayConfig,
    /// Remote view content.
    pub content: ContentConfig,
    /// Child surface drawn for surface-control requests.
    pub surface: SurfaceConfig,
    /// Host session driven by the runner.
    pub host: HostConfig,
    /// Request queue.
    pub queue: QueueConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Displays known to the compositor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display the service binds remote views to.
    pub own_display: u32,
    /// Display table.
    pub displays: Vec<DisplayEntry>,
}

/// One display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayEntry {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    /// Whether the platform allows mirroring this display.
    #[serde(default)]
    pub mirrorable: bool,
}

/// Remote view content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub label: String,
    /// `#RRGGBB` or `#RRGGBBAA`.
    pub background: String,
    pub foreground: String,
    pub text_size: u16,
}

/// Child surface for surface-control requests on the own display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: i32,
    pub height: i32,
    pub background: String,
    pub label: String,
    pub label_color: String,
}

/// Scripted host session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Initial remote view size.
    pub width: i32,
    pub height: i32,
    /// Size applied by the relayout step.
    pub relayout_width: i32,
    pub relayout_height: i32,
}

/// Request queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            content: ContentConfig::default(),
            surface: SurfaceConfig::default(),
            host: HostConfig::default(),
            queue: QueueConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            own_display: 0,
            displays: vec![
                DisplayEntry {
                    id: 0,
                    width: 1080,
                    height: 2400,
                    mirrorable: true,
                },
                DisplayEntry {
                    id: 2,
                    width: 1920,
                    height: 1080,
                    mirrorable: true,
                },
            ],
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            label: "INSIDE TEXT".into(),
            background: "#00FFFF".into(),
            foreground: "#000000".into(),
            text_size: 40,
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1000,
            background: "#0000FF".into(),
            label: "Remote".into(),
            label_color: "#FFFFFF".into(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1000,
            relayout_width: 800,
            relayout_height: 1600,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServiceConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Displays for the compositor, with their mirror policy. Sizes are
    /// clamped to `1..=i32::MAX` so they fit a surface buffer.
    pub fn displays(&self) -> Vec<(Display, MirrorPolicy)> {
        const MAX_SIDE: u32 = i32::MAX as u32;
        self.display
            .displays
            .iter()
            .map(|d| {
                let policy = if d.mirrorable {
                    MirrorPolicy::Allow
                } else {
                    MirrorPolicy::Deny
                };
                (
                    Display {
                        id: DisplayId(d.id),
                        width: d.width.clamp(1, MAX_SIDE),
                        height: d.height.clamp(1, MAX_SIDE),
                    },
                    policy,
                )
            })
            .collect()
    }

    /// Convert into an `EmbeddingServiceConfig`. Unparseable colours
    /// fall back to the defaults; sizes are clamped to at least 1.
    pub fn to_service_config(&self) -> EmbeddingServiceConfig {
        let content_default = ContentRoot::default();
        let child_default = ChildSurfaceConfig::default();
        let color = |s: &str, fallback: Color| Color::from_hex(s).unwrap_or(fallback);

        EmbeddingServiceConfig {
            own_display: DisplayId(self.display.own_display),
            content: ContentRoot {
                label: self.content.label.clone(),
                background: color(&self.content.background, content_default.background),
                foreground: color(&self.content.foreground, content_default.foreground),
                text_size: self.content.text_size.max(1),
            },
            child_surface: ChildSurfaceConfig {
                width: self.surface.width.max(1),
                height: self.surface.height.max(1),
                background: color(&self.surface.background, child_default.background),
                label: self.surface.label.clone(),
                label_color: color(&self.surface.label_color, child_default.label_color),
                ..child_default
            },
            queue_capacity: self.queue.capacity.clamp(1, 4096),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ServiceConfig::default()).unwrap();
        assert!(text.contains("own_display"));
        assert!(text.contains("mirrorable"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ServiceConfig::default()).unwrap();
        let parsed: ServiceConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.display.displays.len(), 2);
        assert_eq!(parsed.surface.width, 1080);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let parsed: ServiceConfig = toml::from_str(
            r#"
            [display]
            own_display = 1
            displays = [{ id = 1, width = 640, height = 480 }]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.display.own_display, 1);
        assert!(!parsed.display.displays[0].mirrorable);
        assert_eq!(parsed.content.label, "INSIDE TEXT");
        assert_eq!(parsed.displays()[0].1, MirrorPolicy::Deny);
    }

    #[test]
    fn display_sizes_are_clamped() {
        let parsed: ServiceConfig = toml::from_str(
            r#"
            [display]
            displays = [{ id = 3, width = 4294967295, height = 0, mirrorable = true }]
            "#,
        )
        .unwrap();
        let (display, policy) = parsed.displays()[0];
        assert_eq!(display.width, i32::MAX as u32);
        assert_eq!(display.height, 1);
        assert_eq!(policy, MirrorPolicy::Allow);
    }

    #[test]
    fn to_service_config_clamps() {
        let mut cfg = ServiceConfig::default();
        cfg.queue.capacity = 0;
        cfg.surface.width = -10;
        cfg.content.background = "not a colour".into();
        let svc = cfg.to_service_config();
        assert_eq!(svc.queue_capacity, 1);
        assert_eq!(svc.child_surface.width, 1);
        assert_eq!(svc.content.background, Color::CYAN);
        assert_eq!(svc.child_surface.background, Color::BLUE);
    }
}
