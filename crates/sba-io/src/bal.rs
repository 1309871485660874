//! Bundle Adjustment in the Large (BAL) dataset loader.
//!
//! ## Format
//!
//! BAL files contain bundle adjustment problems with the following sequential structure:
//! 1. **Header line**: `<num_cameras> <num_points> <num_observations>`
//! 2. **Observations block**: One observation per line with format `<camera_idx> <point_idx> <x> <y>`
//! 3. **Cameras block**: 9 values per camera
//! 4. **Points block**: 3 values per point
//!
//! Camera and point values are read as a whitespace separated stream, so both the
//! one-value-per-line layout of the published datasets and denser layouts are accepted.
//!
//! ## Camera Model
//!
//! Snavely's 9-parameter camera model from the Bundler structure-from-motion system:
//! - **Rotation**: Rodrigues vector (rx, ry, rz), world to camera
//! - **Translation**: (tx, ty, tz), world to camera
//! - **Focal length**: f
//! - **Radial distortion**: k1, k2
//!
//! For more details, see: <https://grail.cs.washington.edu/projects/bal/>
//!
//! ## Example
//!
//! ```no_run
//! use sba_io::BalLoader;
//!
//! let dataset = BalLoader::load("data/problem-21-11315-pre.txt")?;
//! println!("Loaded {} cameras, {} points, {} observations",
//!          dataset.cameras.len(),
//!          dataset.points.len(),
//!          dataset.observations.len());
//! # Ok::<(), sba_io::IoError>(())
//! ```

use crate::IoError;
use nalgebra::{Vector2, Vector3};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Represents a camera using Snavely's 9-parameter camera model.
#[derive(Debug, Clone, PartialEq)]
pub struct BalCamera {
    /// Rotation as a Rodrigues vector (rx, ry, rz)
    pub rotation: Vector3<f64>,
    /// Translation vector (tx, ty, tz)
    pub translation: Vector3<f64>,
    /// Focal length
    pub focal_length: f64,
    /// First radial distortion coefficient
    pub k1: f64,
    /// Second radial distortion coefficient
    pub k2: f64,
}

/// Represents a 3D point (landmark) in the bundle adjustment problem.
#[derive(Debug, Clone, PartialEq)]
pub struct BalPoint {
    /// 3D position (x, y, z)
    pub position: Vector3<f64>,
}

/// Represents an observation of a 3D point by a camera.
#[derive(Debug, Clone, PartialEq)]
pub struct BalObservation {
    /// Index of the observing camera
    pub camera_index: usize,
    /// Index of the observed 3D point
    pub point_index: usize,
    /// Pixel coordinates, centered on the principal point
    pub pixel: Vector2<f64>,
}

/// Complete bundle adjustment dataset loaded from a BAL file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalDataset {
    /// All cameras in the dataset
    pub cameras: Vec<BalCamera>,
    /// All 3D points (landmarks) in the dataset
    pub points: Vec<BalPoint>,
    /// All observations in file order
    pub observations: Vec<BalObservation>,
}

#[derive(Debug, Clone, Copy)]
struct Header {
    num_cameras: usize,
    num_points: usize,
    num_observations: usize,
}

/// Loader for BAL (Bundle Adjustment in the Large) dataset files.
pub struct BalLoader;

impl BalLoader {
    /// Loads a BAL dataset from a file.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError`] if the file cannot be read, a value cannot be parsed, the file
    /// ends early, or an observation references a camera or point that does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<BalDataset, IoError> {
        let file = File::open(path.as_ref()).map_err(|e| {
            IoError::Io(e).log_with_source(format!("Failed to open BAL file: {:?}", path.as_ref()))
        })?;

        // SAFETY: the map is read-only and dropped before this function returns.
        let mmap = unsafe {
            memmap2::Mmap::map(&file).map_err(|e| {
                IoError::Io(e).log_with_source("Failed to memory-map BAL file".to_string())
            })?
        };

        let content = std::str::from_utf8(&mmap).map_err(|_| {
            IoError::Parse {
                line: 0,
                message: "File is not valid UTF-8".to_string(),
            }
            .log()
        })?;

        let dataset = Self::parse(content)?;
        debug!(
            cameras = dataset.cameras.len(),
            points = dataset.points.len(),
            observations = dataset.observations.len(),
            "loaded BAL dataset {:?}",
            path.as_ref()
        );
        Ok(dataset)
    }

    /// Parses the contents of a BAL file.
    pub fn parse(content: &str) -> Result<BalDataset, IoError> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let header = Self::parse_header(&mut lines)?;
        let observations = Self::parse_observations(&mut lines, header)?;

        let mut values = lines.flat_map(|(line_num, line)| {
            line.split_whitespace().map(move |token| (line_num, token))
        });

        let cameras = Self::parse_cameras(&mut values, header.num_cameras)?;
        let points = Self::parse_points(&mut values, header.num_points)?;

        if let Some((line, token)) = values.next() {
            return Err(IoError::Parse {
                line,
                message: format!("Unexpected trailing value '{token}'"),
            });
        }

        Ok(BalDataset {
            cameras,
            points,
            observations,
        })
    }

    /// Parses the header line containing dataset dimensions.
    fn parse_header<'a>(
        lines: &mut impl Iterator<Item = (usize, &'a str)>,
    ) -> Result<Header, IoError> {
        let (line_num, header_line) = lines.next().ok_or(IoError::Parse {
            line: 1,
            message: "Missing header line".to_string(),
        })?;

        let parts: Vec<&str> = header_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(IoError::MissingFields { line: line_num });
        }

        Ok(Header {
            num_cameras: parse_number(line_num, parts[0])?,
            num_points: parse_number(line_num, parts[1])?,
            num_observations: parse_number(line_num, parts[2])?,
        })
    }

    /// Parses the observations block, one observation per line.
    fn parse_observations<'a>(
        lines: &mut impl Iterator<Item = (usize, &'a str)>,
        header: Header,
    ) -> Result<Vec<BalObservation>, IoError> {
        let mut observations = Vec::with_capacity(header.num_observations);

        for observation_idx in 0..header.num_observations {
            let (line_num, line) = lines.next().ok_or_else(|| IoError::Parse {
                line: 0,
                message: format!(
                    "Unexpected end of file in observation {observation_idx} of {}",
                    header.num_observations
                ),
            })?;

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 4 {
                return Err(IoError::MissingFields { line: line_num });
            }

            let camera_index: usize = parse_number(line_num, parts[0])?;
            let point_index: usize = parse_number(line_num, parts[1])?;
            check_index("camera", line_num, camera_index, header.num_cameras)?;
            check_index("point", line_num, point_index, header.num_points)?;

            observations.push(BalObservation {
                camera_index,
                point_index,
                pixel: Vector2::new(
                    parse_number(line_num, parts[2])?,
                    parse_number(line_num, parts[3])?,
                ),
            });
        }

        Ok(observations)
    }

    /// Parses the cameras block: rotation (3), translation (3), f, k1, k2.
    fn parse_cameras<'a>(
        values: &mut impl Iterator<Item = (usize, &'a str)>,
        num_cameras: usize,
    ) -> Result<Vec<BalCamera>, IoError> {
        (0..num_cameras)
            .map(|camera_idx| {
                let p: [f64; 9] = next_values(values, "camera", camera_idx)?;
                Ok(BalCamera {
                    rotation: Vector3::new(p[0], p[1], p[2]),
                    translation: Vector3::new(p[3], p[4], p[5]),
                    focal_length: p[6],
                    k1: p[7],
                    k2: p[8],
                })
            })
            .collect()
    }

    /// Parses the points block: x, y, z per point.
    fn parse_points<'a>(
        values: &mut impl Iterator<Item = (usize, &'a str)>,
        num_points: usize,
    ) -> Result<Vec<BalPoint>, IoError> {
        (0..num_points)
            .map(|point_idx| {
                let [x, y, z]: [f64; 3] = next_values(values, "point", point_idx)?;
                Ok(BalPoint {
                    position: Vector3::new(x, y, z),
                })
            })
            .collect()
    }
}

fn parse_number<T: FromStr>(line: usize, token: &str) -> Result<T, IoError> {
    token.parse::<T>().map_err(|_| IoError::InvalidNumber {
        line,
        value: token.to_string(),
    })
}

fn check_index(kind: &'static str, line: usize, index: usize, count: usize) -> Result<(), IoError> {
    if index >= count {
        return Err(IoError::IndexOutOfRange {
            kind,
            line,
            index,
            count,
        });
    }
    Ok(())
}

fn next_values<'a, const N: usize>(
    values: &mut impl Iterator<Item = (usize, &'a str)>,
    kind: &str,
    index: usize,
) -> Result<[f64; N], IoError> {
    let mut out = [0.0; N];
    for (value_idx, slot) in out.iter_mut().enumerate() {
        let (line_num, token) = values.next().ok_or_else(|| IoError::Parse {
            line: 0,
            message: format!("Unexpected end of file in {kind} {index} value {value_idx}"),
        })?;
        *slot = parse_number(line_num, token)?;
    }
    Ok(out)
}
