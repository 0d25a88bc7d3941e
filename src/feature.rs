//! Feature vector streams consumed by the accumulators.
//!
//! A [`FeatureSource`] is pull-based and restartable: each read yields one
//! fixed-size vector with a validity flag, or `None` at end of stream.

use crate::errors::{validate_dimension, MixtureResult};

/// One frame produced by a feature source.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature values
    pub data: Vec<f64>,
    /// Whether the frame should be used (e.g. speech vs. silence label)
    pub valid: bool,
}

impl Feature {
    /// Valid frame holding `data`.
    pub fn new(data: Vec<f64>) -> Self {
        Self { data, valid: true }
    }

    /// Vector dimension.
    pub fn vect_size(&self) -> usize {
        self.data.len()
    }
}

/// Restartable sequence of fixed-dimension feature vectors.
pub trait FeatureSource {
    /// Dimension of every vector in the stream, known before iteration.
    fn vect_size(&self) -> usize;

    /// Rewind to the first frame.
    fn reset(&mut self);

    /// Next frame, or `None` at end of stream.
    fn read_feature(&mut self) -> Option<&Feature>;
}

/// In-memory feature stream.
#[derive(Debug, Clone)]
pub struct FeatureBuffer {
    vect_size: usize,
    frames: Vec<Feature>,
    position: usize,
}

impl FeatureBuffer {
    /// Empty stream of `vect_size`-dimensional vectors.
    pub fn new(vect_size: usize) -> Self {
        Self {
            vect_size,
            frames: Vec::new(),
            position: 0,
        }
    }

    /// Stream of valid frames built from rows.
    pub fn from_rows(vect_size: usize, rows: Vec<Vec<f64>>) -> MixtureResult<Self> {
        let mut buffer = Self::new(vect_size);
        for row in rows {
            buffer.push(Feature::new(row))?;
        }
        Ok(buffer)
    }

    /// Append a frame; its dimension must match the stream.
    pub fn push(&mut self, feature: Feature) -> MixtureResult<()> {
        validate_dimension(self.vect_size, feature.vect_size(), "FeatureBuffer::push")?;
        self.frames.push(feature);
        Ok(())
    }

    /// Number of frames, valid or not.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the stream holds no frame.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// All frames.
    pub fn frames(&self) -> &[Feature] {
        &self.frames
    }
}

impl FeatureSource for FeatureBuffer {
    fn vect_size(&self) -> usize {
        self.vect_size
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    fn read_feature(&mut self) -> Option<&Feature> {
        let feature = self.frames.get(self.position)?;
        self.position += 1;
        Some(feature)
    }
}
