//! Configuration of sensors.
use crate::base::{Transform, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a sensor mounted on a vehicle.
///
/// The order of the variants is the order in which sensors are processed and
/// listed in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// RGB camera.
    Rgb,

    /// Depth camera.
    Depth,

    /// Semantic segmentation camera.
    Segmentation,

    /// Collision detector.
    Collisions,
}

impl SensorKind {
    /// All sensor kinds.
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Rgb,
        SensorKind::Depth,
        SensorKind::Segmentation,
        SensorKind::Collisions,
    ];

    /// Name used in state keys and file names.
    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Rgb => "rgb",
            SensorKind::Depth => "depth",
            SensorKind::Segmentation => "segmentation",
            SensorKind::Collisions => "collisions",
        }
    }

    /// Returns `true` for sensors whose frames are consumed into state snapshots.
    ///
    /// The collision sensor is read directly as an accumulator.
    pub fn is_retrieval(&self) -> bool {
        !matches!(self, SensorKind::Collisions)
    }

    /// Blueprint used when the configuration does not name one.
    pub fn default_blueprint(&self) -> &'static str {
        match self {
            SensorKind::Rgb => "sensor.camera.rgb",
            SensorKind::Depth => "sensor.camera.depth",
            SensorKind::Segmentation => "sensor.camera.semantic_segmentation",
            SensorKind::Collisions => "sensor.other.collision",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conversion applied by the simulator to raw camera images before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorConverter {
    /// No conversion.
    Raw,

    /// Linear depth encoded as grayscale.
    Depth,

    /// Logarithmic depth encoded as grayscale.
    LogarithmicDepth,

    /// Segmentation tags mapped to the CityScapes palette.
    CityScapesPalette,
}

/// Configuration of a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Kind of the sensor.
    pub kind: SensorKind,

    /// Blueprint name.
    pub blueprint: String,

    /// Mounting point relative to the vehicle.
    pub transform: Transform,

    /// Image width in pixels, ignored by the collision sensor.
    pub image_size_x: u32,

    /// Image height in pixels, ignored by the collision sensor.
    pub image_size_y: u32,

    /// Horizontal field of view in degrees.
    pub fov: f64,

    /// Conversion applied to images.
    pub color_converter: ColorConverter,
}

impl SensorConfig {
    /// Default configuration of a sensor of the given kind.
    pub fn new(kind: SensorKind) -> Self {
        let (transform, color_converter) = match kind {
            SensorKind::Rgb => (Self::hood_mount(), ColorConverter::Raw),
            SensorKind::Depth => (Self::hood_mount(), ColorConverter::LogarithmicDepth),
            SensorKind::Segmentation => (Self::hood_mount(), ColorConverter::CityScapesPalette),
            SensorKind::Collisions => (Transform::default(), ColorConverter::Raw),
        };
        Self {
            kind,
            blueprint: kind.default_blueprint().to_string(),
            transform,
            image_size_x: 80,
            image_size_y: 60,
            fov: 90.0,
            color_converter,
        }
    }

    fn hood_mount() -> Transform {
        Transform::from_location_yaw(Vector3::new(1.5, 0.0, 2.4), 0.0)
    }

    /// Sets the mounting point.
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the image size.
    pub fn image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size_x = width;
        self.image_size_y = height;
        self
    }

    /// Sets the field of view.
    pub fn fov(mut self, fov: f64) -> Self {
        self.fov = fov;
        self
    }
}
