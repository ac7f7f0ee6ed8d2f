//! Rerun.io renderer for the node field.
//!
//! Streams every frame to a Rerun viewer (or an `.rrd` file):
//! - nodes as colored points (white / red anchor / green hover)
//! - the starfield, once, as static data
//! - camera eye and look-at target
//! - warp progress scalars and phase transitions
//!
//! Enable with the `visualization` feature flag.

use crate::error::WarpError;
use crate::scene::{FrameView, Renderer, BACKGROUND_COLOR};
use crate::warp::Phase;
use nalgebra::Vector3;
use rerun::{RecordingStream, RecordingStreamBuilder};

fn point(v: &Vector3<f64>) -> [f32; 3] {
    [v.x as f32, v.y as f32, v.z as f32]
}

/// Streams frames to Rerun.
pub struct RerunRenderer {
    rec: RecordingStream,
    stars_logged: bool,
    last_phase: Option<Phase>,
}

impl RerunRenderer {
    /// Spawns a Rerun viewer and streams to it.
    pub fn spawn(app_id: &str) -> Result<Self, WarpError> {
        let rec = RecordingStreamBuilder::new(app_id)
            .spawn()
            .map_err(WarpError::render)?;
        Self::with_stream(rec)
    }

    /// Records to an `.rrd` file instead of a live viewer.
    pub fn to_file(app_id: &str, path: &str) -> Result<Self, WarpError> {
        let rec = RecordingStreamBuilder::new(app_id)
            .save(path)
            .map_err(WarpError::render)?;
        Self::with_stream(rec)
    }

    fn with_stream(rec: RecordingStream) -> Result<Self, WarpError> {
        rec.log_static("world", &rerun::ViewCoordinates::RIGHT_HAND_Y_UP())
            .map_err(WarpError::render)?;
        rec.log_static(
            "logs/setup",
            &rerun::TextLog::new(format!("background #{:06x}", BACKGROUND_COLOR)),
        )
        .map_err(WarpError::render)?;

        Ok(Self {
            rec,
            stars_logged: false,
            last_phase: None,
        })
    }

    fn log_frame(&mut self, view: &FrameView<'_>) -> Result<(), rerun::RecordingStreamError> {
        self.rec.set_time_sequence("frame", view.frame as i64);
        self.rec.set_duration_secs("time", view.time.as_secs_f64());

        if !self.stars_logged {
            self.rec.log_static(
                "world/stars",
                &rerun::Points3D::new(view.scene.stars().iter().map(point))
                    .with_colors([[255, 255, 255, 160]])
                    .with_radii([0.5]),
            )?;
            self.stars_logged = true;
        }

        let handles = view.scene.handles();
        self.rec.log(
            "world/nodes",
            &rerun::Points3D::new(handles.iter().map(|h| point(&h.position)))
                .with_colors(handles.iter().map(|h| {
                    let [r, g, b] = h.style.rgb();
                    rerun::Color::from_rgb(r, g, b)
                }))
                .with_radii([view.scene.node_radius() as f32]),
        )?;

        self.rec.log(
            "world/camera/eye",
            &rerun::Points3D::new([point(&view.camera.position)])
                .with_colors([[255, 200, 0, 255]])
                .with_radii([0.3]),
        )?;
        self.rec.log(
            "world/camera/target",
            &rerun::Points3D::new([point(&view.look_at)])
                .with_colors([[0, 212, 255, 255]])
                .with_radii([0.2]),
        )?;

        if let Some(warp) = view.warp {
            self.rec
                .log("warp/node_progress", &rerun::Scalars::new([warp.node_progress]))?;
            self.rec
                .log("warp/camera_progress", &rerun::Scalars::new([warp.camera_progress]))?;

            if self.last_phase != Some(warp.sample.phase) {
                self.rec.log(
                    "logs/warp",
                    &rerun::TextLog::new(format!("phase: {}", warp.sample.phase)),
                )?;
                self.last_phase = Some(warp.sample.phase);
            }
            if warp.finished {
                self.last_phase = None;
            }
        }

        Ok(())
    }
}

impl Renderer for RerunRenderer {
    fn render(&mut self, view: &FrameView<'_>) -> Result<(), WarpError> {
        self.log_frame(view).map_err(WarpError::render)
    }
}
