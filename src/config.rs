use crate::detection::DetectionFilter;
use crate::filters::particle::ParticleOptions;
use crate::filters::{MotionModel, MotionModelKind, DEFAULT_GH_G, DEFAULT_GH_H};
use crate::trackers::options::{
    TrackerOptions, DEFAULT_MAX_STALENESS, DEFAULT_MIN_IOU, DEFAULT_MIN_STEPS_ALIVE,
    DEFAULT_MULTI_MATCH_MIN_IOU,
};
use crate::utils::kalman::kalman_cv_box::CvNoise;
use crate::zones::grid::{CellId, SpatialGrid};
use crate::zones::roi::RoiZone;
use ini::{Ini, Properties};
use log::info;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to load configuration {path}: {source}")]
    Load { path: String, source: ini::Error },
    #[error("Unable to parse configuration: {0}")]
    Parse(#[from] ini::ParseError),
    #[error("Missing required key `{section}.{key}`")]
    Missing {
        section: &'static str,
        key: &'static str,
    },
    #[error("Invalid value `{value}` of `{section}.{key}`: {reason}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralConfig {
    /// frame source (JSON lines replay file)
    pub source: PathBuf,
    /// JSON lines store, records are kept in memory when unset
    pub store: Option<PathBuf>,
    pub frame_width: u32,
    pub frame_height: u32,
    pub fps: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub model: MotionModelKind,
    pub min_iou: f32,
    pub multi_match_min_iou: f32,
    pub min_steps_alive: u32,
    pub max_staleness: u32,
    pub detection_rate: u32,
    pub remove_invalid: bool,
    pub seed: u64,
    pub gh_g: f32,
    pub gh_h: f32,
    pub particles: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub min_confidence: f32,
    /// accepted classes, empty accepts every class
    pub classes: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ZoneSelection {
    /// every cell of the grid
    All,
    Cells(Vec<CellId>),
    /// two corners of the selection rectangle
    Rect((u32, u32), (u32, u32)),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneConfig {
    pub cell_size: u32,
    pub selection: ZoneSelection,
}

/// Application configuration, immutable after loading
///
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub general: GeneralConfig,
    pub tracker: TrackerConfig,
    pub detector: DetectorConfig,
    pub zone: ZoneConfig,
}

struct Section<'a> {
    name: &'static str,
    props: Option<&'a Properties>,
}

impl<'a> Section<'a> {
    fn new(ini: &'a Ini, name: &'static str) -> Self {
        Self {
            name,
            props: ini.section(Some(name)),
        }
    }

    fn raw(&self, key: &'static str) -> Option<&'a str> {
        self.props
            .and_then(|p| p.get(key))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn invalid(&self, key: &'static str, value: &str, reason: impl Display) -> ConfigError {
        ConfigError::Invalid {
            section: self.name,
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse<T>(&self, key: &'static str, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        value.parse::<T>().map_err(|e| self.invalid(key, value, e))
    }

    fn required<T>(&self, key: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.raw(key).ok_or(ConfigError::Missing {
            section: self.name,
            key,
        })?;
        self.parse(key, value)
    }

    fn get_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.raw(key) {
            Some(value) => self.parse(key, value),
            None => Ok(default),
        }
    }

    fn list<T>(&self, key: &'static str) -> Result<Option<Vec<T>>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.raw(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| self.parse(key, v))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
    }

    fn check<T: Display>(
        &self,
        key: &'static str,
        value: T,
        valid: bool,
        reason: &str,
    ) -> Result<T, ConfigError> {
        if valid {
            Ok(value)
        } else {
            Err(self.invalid(key, &value.to_string(), reason))
        }
    }
}

fn unit_interval(v: f32) -> bool {
    v > 0.0 && v <= 1.0
}

impl Config {
    /// Loads and validates the INI file
    ///
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_ini(&ini)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let general = Section::new(ini, "general");
        let tracker = Section::new(ini, "tracker");
        let detector = Section::new(ini, "detector");
        let zone = Section::new(ini, "zone");

        let fps: f32 = general.get_or("fps", 30.0)?;
        let frame_width: u32 = general.required("frame_width")?;
        let frame_height: u32 = general.required("frame_height")?;
        let general_config = GeneralConfig {
            source: general.required("source")?,
            store: general.raw("store").map(PathBuf::from),
            frame_width: general.check("frame_width", frame_width, frame_width > 0, "must be positive")?,
            frame_height: general.check(
                "frame_height",
                frame_height,
                frame_height > 0,
                "must be positive",
            )?,
            fps: general.check("fps", fps, fps.is_finite() && fps > 0.0, "must be positive")?,
        };

        let min_iou: f32 = tracker.get_or("min_iou", DEFAULT_MIN_IOU)?;
        let multi_match_min_iou: f32 =
            tracker.get_or("multi_match_min_iou", DEFAULT_MULTI_MATCH_MIN_IOU)?;
        let detection_rate: u32 = tracker.get_or("detection_rate", 1)?;
        let gh_g: f32 = tracker.get_or("gh_g", DEFAULT_GH_G)?;
        let gh_h: f32 = tracker.get_or("gh_h", DEFAULT_GH_H)?;
        let particles: usize = tracker.get_or("particles", ParticleOptions::default().particles)?;
        let tracker_config = TrackerConfig {
            model: tracker.get_or("model", MotionModelKind::Kalman)?,
            min_iou: tracker.check("min_iou", min_iou, unit_interval(min_iou), "must be in (0, 1]")?,
            multi_match_min_iou: tracker.check(
                "multi_match_min_iou",
                multi_match_min_iou,
                unit_interval(multi_match_min_iou),
                "must be in (0, 1]",
            )?,
            min_steps_alive: tracker.get_or("min_steps_alive", DEFAULT_MIN_STEPS_ALIVE)?,
            max_staleness: tracker.get_or("max_staleness", DEFAULT_MAX_STALENESS)?,
            detection_rate: tracker.check(
                "detection_rate",
                detection_rate,
                detection_rate > 0,
                "must be positive",
            )?,
            remove_invalid: tracker.get_or("remove_invalid", false)?,
            seed: tracker.get_or("seed", 0)?,
            gh_g: tracker.check("gh_g", gh_g, unit_interval(gh_g), "must be in (0, 1]")?,
            gh_h: tracker.check("gh_h", gh_h, unit_interval(gh_h), "must be in (0, 1]")?,
            particles: tracker.check("particles", particles, particles > 0, "must be positive")?,
        };

        let min_confidence: f32 = detector.get_or("min_confidence", 0.5)?;
        let detector_config = DetectorConfig {
            min_confidence: detector.check(
                "min_confidence",
                min_confidence,
                (0.0..=1.0).contains(&min_confidence),
                "must be in [0, 1]",
            )?,
            classes: detector.list("classes")?.unwrap_or_default(),
        };

        let cell_size: u32 = zone.required("cell_size")?;
        let selection = match (zone.list::<CellId>("cells")?, zone.list::<u32>("rect")?) {
            (Some(cells), None) => ZoneSelection::Cells(cells),
            (None, Some(rect)) => match rect[..] {
                [x1, y1, x2, y2] => ZoneSelection::Rect((x1, y1), (x2, y2)),
                _ => {
                    return Err(zone.invalid(
                        "rect",
                        zone.raw("rect").unwrap_or_default(),
                        "expected x1, y1, x2, y2",
                    ))
                }
            },
            (None, None) => ZoneSelection::All,
            (Some(_), Some(_)) => {
                return Err(zone.invalid(
                    "rect",
                    zone.raw("rect").unwrap_or_default(),
                    "`cells` and `rect` are mutually exclusive",
                ))
            }
        };
        let zone_config = ZoneConfig {
            cell_size: zone.check("cell_size", cell_size, cell_size > 0, "must be positive")?,
            selection,
        };

        Ok(Self {
            general: general_config,
            tracker: tracker_config,
            detector: detector_config,
            zone: zone_config,
        })
    }

    pub fn motion_model(&self) -> MotionModel {
        match self.tracker.model {
            MotionModelKind::Kalman => MotionModel::Kalman(CvNoise::default()),
            MotionModelKind::Gh => MotionModel::Gh {
                g: self.tracker.gh_g,
                h: self.tracker.gh_h,
            },
            MotionModelKind::Particle => MotionModel::Particle(ParticleOptions {
                particles: self.tracker.particles,
                ..ParticleOptions::default()
            }),
        }
    }

    /// Tracker options, the time step is the frame period
    ///
    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions::default()
            .dt(1.0 / self.general.fps)
            .model(self.motion_model())
            .min_iou(self.tracker.min_iou)
            .multi_match_min_iou(self.tracker.multi_match_min_iou)
            .min_steps_alive(self.tracker.min_steps_alive)
            .max_staleness(self.tracker.max_staleness)
            .remove_invalid(self.tracker.remove_invalid)
            .seed(self.tracker.seed)
    }

    pub fn detection_filter(&self) -> DetectionFilter {
        DetectionFilter::new(
            self.detector.classes.iter().copied(),
            self.detector.min_confidence,
        )
    }

    pub fn grid(&self) -> anyhow::Result<SpatialGrid> {
        SpatialGrid::divided(
            self.zone.cell_size,
            self.general.frame_width,
            self.general.frame_height,
        )
    }

    pub fn roi_zone(&self, grid: &SpatialGrid) -> anyhow::Result<RoiZone> {
        Ok(match &self.zone.selection {
            ZoneSelection::All => RoiZone::new(grid.cells().iter().map(|c| c.id)),
            ZoneSelection::Cells(cells) => RoiZone::new(cells.iter().copied()),
            ZoneSelection::Rect(c1, c2) => RoiZone::from_rect(grid, *c1, *c2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, ConfigError, ZoneSelection};
    use crate::filters::MotionModelKind;
    use ini::Ini;
    use std::io::Write;
    use std::path::Path;

    const FULL: &str = r#"
[general]
source = frames.jsonl
store = store.jsonl
frame_width = 640
frame_height = 480
fps = 25

[tracker]
model = particle
min_iou = 0.25
min_steps_alive = 2
max_staleness = 8
detection_rate = 3
remove_invalid = true
seed = 42
particles = 200

[detector]
min_confidence = 0.6
classes = 0, 2

[zone]
cell_size = 80
rect = 0, 0, 200, 100
"#;

    fn parse(s: &str) -> Result<Config, ConfigError> {
        Config::from_ini(&Ini::load_from_str(s)?)
    }

    #[test]
    fn full() {
        let c = parse(FULL).unwrap();
        assert_eq!(c.general.store.as_deref(), Some(Path::new("store.jsonl")));
        assert_eq!(c.tracker.model, MotionModelKind::Particle);
        assert_eq!(c.tracker.multi_match_min_iou, 0.93);
        assert_eq!(c.tracker.detection_rate, 3);
        assert_eq!(c.detector.classes, vec![0, 2]);
        assert_eq!(c.zone.selection, ZoneSelection::Rect((0, 0), (200, 100)));

        let opts = c.tracker_options();
        assert!((opts.dt - 0.04).abs() < 1e-6);
        assert_eq!(opts.model.kind(), MotionModelKind::Particle);
        assert_eq!(opts.max_staleness, 8);
        assert!(opts.remove_invalid);

        let grid = c.grid().unwrap();
        assert_eq!(grid.cells().len(), 8 * 6);
        let zone = c.roi_zone(&grid).unwrap();
        assert_eq!(zone.cells().iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 8, 9, 10]);
    }

    #[test]
    fn defaults() {
        let c = parse(
            "[general]\nsource = a\nframe_width = 10\nframe_height = 10\n[zone]\ncell_size = 5\n",
        )
        .unwrap();
        assert_eq!(c.general.fps, 30.0);
        assert_eq!(c.general.store, None);
        assert_eq!(c.tracker.model, MotionModelKind::Kalman);
        assert_eq!(c.tracker.max_staleness, 5);
        assert!(c.detector.classes.is_empty());
        assert_eq!(c.zone.selection, ZoneSelection::All);
        let grid = c.grid().unwrap();
        assert_eq!(c.roi_zone(&grid).unwrap().cells().len(), 4);
    }

    #[test]
    fn validation() {
        let base = "[general]\nsource = a\nframe_width = 10\nframe_height = 10\n";
        assert!(matches!(
            parse(base),
            Err(ConfigError::Missing {
                section: "zone",
                key: "cell_size"
            })
        ));
        for bad in [
            "[zone]\ncell_size = 0\n",
            "[zone]\ncell_size = x\n",
            "[zone]\ncell_size = 5\n[tracker]\nmin_iou = 0\n",
            "[zone]\ncell_size = 5\n[tracker]\nmulti_match_min_iou = 1.5\n",
            "[zone]\ncell_size = 5\n[tracker]\ndetection_rate = 0\n",
            "[zone]\ncell_size = 5\n[tracker]\nmodel = ukf\n",
            "[zone]\ncell_size = 5\nrect = 1, 2, 3\n",
            "[zone]\ncell_size = 5\nrect = 1, 2, 3, 4\ncells = 1\n",
        ] {
            let res = parse(&format!("{}{}", base, bad));
            assert!(
                matches!(res, Err(ConfigError::Invalid { .. })),
                "{} -> {:?}",
                bad,
                res
            );
        }
    }

    #[test]
    fn load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", FULL).unwrap();
        let c = Config::load(file.path()).unwrap();
        assert_eq!(c.zone.cell_size, 80);
        assert!(matches!(
            Config::load("/nonexistent/config.ini"),
            Err(ConfigError::Load { .. })
        ));
    }
}
