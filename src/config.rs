// Analysis profiles: column mapping, prompt templates and the commentary
// credential.
//
// The three upload conventions (services ledger, revenue forecast, generic
// revenue) differ only in header names and wording, so each is a preset
// profile rather than its own pipeline.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::util::DecimalSeparator;

/// Placeholder substituted with the serialized data block.
pub const DATA_PLACEHOLDER: &str = "{data}";

/// Forecast horizon used when a profile does not set one.
pub const DEFAULT_HORIZON: usize = 30;

/// Maps a source header onto an internal categorical field name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoricalColumn {
    pub source: String,
    pub field: String,
}

impl CategoricalColumn {
    pub fn new(source: &str, field: &str) -> Self {
        Self {
            source: source.to_string(),
            field: field.to_string(),
        }
    }
}

/// Which source headers feed the timestamp, the value and the optional
/// categorical attributes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnMapping {
    pub timestamp: String,
    pub value: String,
    #[serde(default)]
    pub categorical: Vec<CategoricalColumn>,
    /// Decimal separator of the value column; `,` exports read `45.000` as
    /// forty-five thousand.
    #[serde(default)]
    pub decimal_separator: DecimalSeparator,
}

impl ColumnMapping {
    pub fn new(timestamp: &str, value: &str) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            value: value.to_string(),
            categorical: Vec::new(),
            decimal_separator: DecimalSeparator::Dot,
        }
    }

    pub fn with_decimal_separator(mut self, separator: DecimalSeparator) -> Self {
        self.decimal_separator = separator;
        self
    }

    pub fn with_categorical(mut self, source: &str, field: &str) -> Self {
        self.categorical.push(CategoricalColumn::new(source, field));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.categorical.iter().map(|c| c.field.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timestamp.trim().is_empty() || self.value.trim().is_empty() {
            return Err(PipelineError::Config(
                "timestamp and value columns must be named".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for col in &self.categorical {
            if col.field.trim().is_empty() || !seen.insert(col.field.as_str()) {
                return Err(PipelineError::Config(format!(
                    "categorical field '{}' is blank or duplicated",
                    col.field
                )));
            }
        }
        Ok(())
    }
}

/// A system instruction plus a user template containing [`DATA_PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn new(system: &str, user: &str) -> Self {
        Self {
            system: system.to_string(),
            user: user.to_string(),
        }
    }

    pub fn render(&self, data: &str) -> String {
        self.user.replace(DATA_PLACEHOLDER, data)
    }

    fn validate(&self, which: &str) -> Result<()> {
        if !self.user.contains(DATA_PLACEHOLDER) {
            return Err(PipelineError::Config(format!(
                "{} prompt must contain {}",
                which, DATA_PLACEHOLDER
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisProfile {
    pub name: String,
    pub mapping: ColumnMapping,
    pub seasonal_prompt: PromptTemplate,
    pub forecast_prompt: PromptTemplate,
    /// Selector label meaning "no constraint".
    #[serde(default = "default_all_label")]
    pub all_label: String,
    pub model: String,
    #[serde(default = "default_horizon")]
    pub horizon: usize,
}

fn default_all_label() -> String {
    "All".to_string()
}

fn default_horizon() -> usize {
    DEFAULT_HORIZON
}

impl AnalysisProfile {
    /// Look up a built-in profile by name.
    pub fn preset(name: &str) -> Result<Self> {
        PRESETS
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::Config(format!("unknown profile '{}'", name)))
    }

    pub fn preset_names() -> Vec<&'static str> {
        PRESETS.keys().copied().collect()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.mapping.validate()?;
        self.seasonal_prompt.validate("seasonal")?;
        self.forecast_prompt.validate("forecast")?;
        if self.horizon == 0 {
            return Err(PipelineError::Config("horizon must be positive".to_string()));
        }
        Ok(())
    }
}

/// Credential for the commentary service. `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// `source` names where the key came from, for the error message.
    pub fn new(key: Option<String>, source: &str) -> Result<Self> {
        match key {
            Some(k) if !k.trim().is_empty() => Ok(Self(k.trim().to_string())),
            _ => Err(PipelineError::MissingCredential(source.to_string())),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

const SERVICES_SEASONAL_USER: &str = "Eres un analista experto en servicios de belleza y comportamiento estacional.

Analiza el comportamiento de ingresos según el siguiente resumen estadístico:

{data}

Incluye:
- Tendencias generales
- Patrones estacionales (meses, días)
- Sedes o manicuristas destacadas
- Cambios relevantes en el comportamiento
- Recomendaciones para optimizar horarios o promociones";

const SERVICES_FORECAST_USER: &str = "Eres un analista financiero especializado en proyección de ingresos. Con base en el siguiente pronóstico, entrega:
- Resumen de las tendencias esperadas
- Fluctuaciones o anomalías clave
- Riesgos o incertidumbres que puedan afectar el pronóstico
- Resumen ejecutivo conciso

Datos del pronóstico en JSON:
{data}";

const REVENUE_SEASONAL_USER: &str = "You are a revenue analyst specializing in seasonal behaviour.

Analyze revenue based on the following statistical summary:

{data}

Include:
- Overall trends
- Seasonal patterns (months, weekdays)
- Notable categories or locations
- Anomalies or relevant changes
- Recommendations for scheduling and promotions";

const FORECAST_USER: &str = "You are a Financial Analyst specializing in revenue forecasting. Based on the following forecast data, provide:
- Summary of expected trends.
- Key fluctuations or anomalies.
- Risks or uncertainties that could affect the forecast.
- Executive summary in a concise style.

Here is the forecast data in JSON:
{data}";

static PRESETS: Lazy<BTreeMap<&'static str, AnalysisProfile>> = Lazy::new(|| {
    let forecast_prompt = PromptTemplate::new(
        "You are a forecasting expert for financial planning.",
        FORECAST_USER,
    );
    let revenue_seasonal = PromptTemplate::new(
        "You are an expert analyst of revenue seasonality.",
        REVENUE_SEASONAL_USER,
    );

    let services = AnalysisProfile {
        name: "services".to_string(),
        mapping: ColumnMapping::new("FECHA", "VALOR SERVICIO ($)")
            .with_categorical("CATEGORIA SERVICIO", "categoria")
            .with_categorical("MANICURISTA", "manicurista")
            .with_categorical("SEDE", "sede")
            .with_categorical("FORMA DE PAGO", "pago"),
        seasonal_prompt: PromptTemplate::new(
            "Eres un analista experto en negocios de belleza y servicios.",
            SERVICES_SEASONAL_USER,
        ),
        forecast_prompt: PromptTemplate::new(
            "Eres un experto en pronósticos para planeación financiera.",
            SERVICES_FORECAST_USER,
        ),
        all_label: "Todas".to_string(),
        model: "llama-3.3-70b-versatile".to_string(),
        horizon: DEFAULT_HORIZON,
    };

    let forecast = AnalysisProfile {
        name: "forecast".to_string(),
        mapping: ColumnMapping::new("Date", "Revenue"),
        seasonal_prompt: revenue_seasonal.clone(),
        forecast_prompt: forecast_prompt.clone(),
        all_label: default_all_label(),
        model: "llama3-8b-8192".to_string(),
        horizon: DEFAULT_HORIZON,
    };

    let revenue = AnalysisProfile {
        name: "revenue".to_string(),
        mapping: ColumnMapping::new("Date", "Revenue")
            .with_categorical("Category", "category")
            .with_categorical("Location", "location"),
        seasonal_prompt: revenue_seasonal,
        forecast_prompt,
        all_label: default_all_label(),
        model: "llama-3.3-70b-versatile".to_string(),
        horizon: DEFAULT_HORIZON,
    };

    BTreeMap::from([
        ("services", services),
        ("forecast", forecast),
        ("revenue", revenue),
    ])
});
