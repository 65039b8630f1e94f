use bytes::Bytes;
use serde::{Serialize, Serializer};
use strum_macros::{EnumIter, IntoStaticStr};

use crate::error::ErrorCode;

/// Rendered in place of any metric the client did not send.
pub const PLACEHOLDER: &str = "not available";

// ============================================================================
// Region metrics
// ============================================================================

/// The fixed set of environmental indicators describing one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum MetricField {
    #[strum(serialize = "lat")]
    Latitude,
    #[strum(serialize = "lon")]
    Longitude,
    #[strum(serialize = "ndvi")]
    Ndvi,
    #[strum(serialize = "lst")]
    LandSurfaceTemperature,
    #[strum(serialize = "rainfall")]
    Rainfall,
    #[strum(serialize = "waterFreq")]
    WaterFrequency,
    #[strum(serialize = "popDensity")]
    PopulationDensity,
}

impl MetricField {
    /// JSON key in the `metrics` form field.
    pub fn key(&self) -> &'static str {
        self.into()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Latitude => "Latitude",
            Self::Longitude => "Longitude",
            Self::Ndvi => "NDVI (Vegetation Index)",
            Self::LandSurfaceTemperature => "Land Surface Temperature (LST)",
            Self::Rainfall => "Rainfall (Annual)",
            Self::WaterFrequency => "Water Frequency (1984–2021)",
            Self::PopulationDensity => "Population Density",
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Self::LandSurfaceTemperature => Some("°C"),
            Self::Rainfall => Some("mm"),
            Self::WaterFrequency => Some("%"),
            Self::PopulationDensity => Some("people / 100 sq. meters"),
            Self::Latitude | Self::Longitude | Self::Ndvi => None,
        }
    }
}

/// Values are kept as display text; interpretation is left to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionMetrics {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub ndvi: Option<String>,
    pub lst: Option<String>,
    pub rainfall: Option<String>,
    pub water_freq: Option<String>,
    pub pop_density: Option<String>,
}

impl RegionMetrics {
    pub fn get(&self, field: MetricField) -> Option<&str> {
        let value = match field {
            MetricField::Latitude => &self.lat,
            MetricField::Longitude => &self.lon,
            MetricField::Ndvi => &self.ndvi,
            MetricField::LandSurfaceTemperature => &self.lst,
            MetricField::Rainfall => &self.rainfall,
            MetricField::WaterFrequency => &self.water_freq,
            MetricField::PopulationDensity => &self.pop_density,
        };
        value.as_deref()
    }

    pub(crate) fn slot_mut(&mut self, field: MetricField) -> &mut Option<String> {
        match field {
            MetricField::Latitude => &mut self.lat,
            MetricField::Longitude => &mut self.lon,
            MetricField::Ndvi => &mut self.ndvi,
            MetricField::LandSurfaceTemperature => &mut self.lst,
            MetricField::Rainfall => &mut self.rainfall,
            MetricField::WaterFrequency => &mut self.water_freq,
            MetricField::PopulationDensity => &mut self.pop_density,
        }
    }

    /// Value as it appears in the prompt, placeholder included.
    pub fn display(&self, field: MetricField) -> &str {
        self.get(field).unwrap_or(PLACEHOLDER)
    }
}

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// Multipart fields exactly as received, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawPayload {
    pub prompt: Option<String>,
    pub metrics: Option<String>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub question: String,
    pub metrics: RegionMetrics,
    pub image: Option<ImageUpload>,
}

// ============================================================================
// Response envelope
// ============================================================================

/// Outcome of one request. The variant alone decides `success` and the public
/// `error` text, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
    Success {
        model: String,
        image_used: Option<String>,
        answer: String,
    },
    Failure {
        code: ErrorCode,
        details: String,
    },
}

impl PipelineResult {
    pub fn success(model: impl Into<String>, image_used: Option<String>, answer: String) -> Self {
        Self::Success {
            model: model.into(),
            image_used,
            answer,
        }
    }

    pub fn failure(code: ErrorCode, details: impl Into<String>) -> Self {
        Self::Failure {
            code,
            details: details.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::Failure { code, .. } => code.http_status(),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Envelope<'a> {
    Success {
        success: bool,
        model: &'a str,
        #[serde(rename = "imageUsed")]
        image_used: Option<&'a str>,
        answer: &'a str,
    },
    Failure {
        success: bool,
        error: &'static str,
        details: &'a str,
    },
}

impl Serialize for PipelineResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let envelope = match self {
            Self::Success { model, image_used, answer } => Envelope::Success {
                success: true,
                model,
                image_used: image_used.as_deref(),
                answer,
            },
            Self::Failure { code, details } => Envelope::Failure {
                success: false,
                error: code.user_message(),
                details,
            },
        };
        envelope.serialize(serializer)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
}
