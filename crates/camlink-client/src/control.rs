//! Camera catalog and out-of-band camera selection.
//!
//! The frame server streams whichever physical camera it was last told to
//! use. Selection travels over the control plane (a pub/sub broker), not
//! over the frame socket, so it is modelled here as a [`CommandPublisher`].

use serde::{Deserialize, Serialize};
use tracing::info;

/// Topic the frame server listens on for camera selection.
pub const DEFAULT_SELECT_TOPIC: &str = "avr/camera/select";

/// Static description of one selectable camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub name: String,
    pub resolution: String,
    /// Field of view in degrees.
    pub fov: u32,
    pub model: String,
    /// Index understood by the frame server; negative means not selectable.
    pub index: i32,
}

impl CameraInfo {
    fn new(name: &str, resolution: &str, fov: u32, model: &str, index: i32) -> Self {
        CameraInfo {
            name: name.into(),
            resolution: resolution.into(),
            fov,
            model: model.into(),
            index,
        }
    }

    /// Placeholder shown for names the catalog does not know.
    pub fn unknown() -> Self {
        CameraInfo::new("Unknown", "0x0", 0, "Unknown", -1)
    }

    pub fn is_selectable(&self) -> bool {
        self.index >= 0
    }
}

/// Ordered list of cameras the operator can pick from.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraCatalog {
    cameras: Vec<CameraInfo>,
}

impl CameraCatalog {
    pub fn new(cameras: Vec<CameraInfo>) -> Self {
        CameraCatalog { cameras }
    }

    pub fn get(&self, name: &str) -> Option<&CameraInfo> {
        self.cameras.iter().find(|c| c.name == name)
    }

    /// Look a camera up, falling back to [`CameraInfo::unknown`].
    pub fn lookup(&self, name: &str) -> CameraInfo {
        self.get(name).cloned().unwrap_or_else(CameraInfo::unknown)
    }

    /// The camera shown before the operator picks one.
    pub fn first(&self) -> Option<&CameraInfo> {
        self.cameras.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CameraInfo> {
        self.cameras.iter()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

impl Default for CameraCatalog {
    fn default() -> Self {
        CameraCatalog::new(vec![
            CameraInfo::new("CSI Camera", "3840x2160", 160, "SeeedStudio IMX219-160", 0),
            CameraInfo::new("Stereoscopic Camera Right", "4416x1242", 90, "Zed Mini", 1),
            CameraInfo::new("Stereoscopic Camera Left", "4416x1242", 90, "Zed Mini", 2),
            CameraInfo::new("Stereoscopic Camera Depth", "?", 100, "Zed Mini", 3),
        ])
    }
}

// ─── Publishing ─────────────────────────────────────────────────────────────

/// Out-of-band command channel to the vehicle.
pub trait CommandPublisher {
    fn send_command(&self, topic: &str, payload: &str) -> anyhow::Result<()>;
}

/// Publisher that only logs, for running without a broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl CommandPublisher for LogPublisher {
    fn send_command(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
        info!(topic, payload, "control command");
        Ok(())
    }
}

/// Ask the frame server to stream the camera called `name`.
///
/// Returns the selected camera, or `None` (publishing nothing) when the name
/// is not a selectable catalog entry.
pub fn select_camera(
    catalog: &CameraCatalog,
    publisher: &dyn CommandPublisher,
    topic: &str,
    name: &str,
) -> anyhow::Result<Option<CameraInfo>> {
    let camera = catalog.lookup(name);
    if !camera.is_selectable() {
        return Ok(None);
    }
    let payload = serde_json::to_string(&camera.index)?;
    publisher.send_command(topic, &payload)?;
    Ok(Some(camera))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, String)>>);

    impl CommandPublisher for Recording {
        fn send_command(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().push((topic.into(), payload.into()));
            Ok(())
        }
    }

    #[test]
    fn default_catalog_has_four_cameras() {
        let catalog = CameraCatalog::default();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.first().unwrap().name, "CSI Camera");
        assert_eq!(catalog.get("Stereoscopic Camera Depth").unwrap().index, 3);
    }

    #[test]
    fn selecting_known_camera_publishes_index() {
        let catalog = CameraCatalog::default();
        let publisher = Recording::default();
        let picked = select_camera(
            &catalog,
            &publisher,
            DEFAULT_SELECT_TOPIC,
            "Stereoscopic Camera Left",
        )
        .unwrap()
        .unwrap();
        assert_eq!(picked.model, "Zed Mini");
        assert_eq!(
            *publisher.0.lock().unwrap(),
            vec![("avr/camera/select".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn selecting_unknown_camera_publishes_nothing() {
        let catalog = CameraCatalog::default();
        let publisher = Recording::default();
        let picked = select_camera(&catalog, &publisher, DEFAULT_SELECT_TOPIC, "Thermal").unwrap();
        assert!(picked.is_none());
        assert!(publisher.0.lock().unwrap().is_empty());
        assert_eq!(catalog.lookup("Thermal"), CameraInfo::unknown());
    }
}
