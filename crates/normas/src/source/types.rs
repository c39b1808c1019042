use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::errors::{Result, SourceError};

/// Public web origin of the SAIJ corpus, used for document links.
pub const WEB_BASE_URL: &str = "https://www.saij.gob.ar";

/// JSON pointer to the document identifier within the canonical payload.
pub const ID_POINTER: &str = "/document/metadata/uuid";

/// JSON pointer to the document timestamp within the canonical payload.
pub const TIMESTAMP_POINTER: &str = "/document/metadata/timestamp";

/// Failed to parse a domain enum from its textual form.
#[derive(Debug, Error)]
#[error("unrecognized value '{0}'")]
pub struct ParseValueError(pub String);

/// Kind of norm tracked by the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipoNorma {
    Ley,
    Decreto,
    Resolucion,
    Disposicion,
    Decision,
    Acordada,
}

impl TipoNorma {
    /// The display form used in search URLs and reports.
    pub fn display(&self) -> &'static str {
        match self {
            Self::Ley => "Ley",
            Self::Decreto => "Decreto",
            Self::Resolucion => "Resolución",
            Self::Disposicion => "Disposición",
            Self::Decision => "Decisión",
            Self::Acordada => "Acordada",
        }
    }
}

impl fmt::Display for TipoNorma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

impl FromStr for TipoNorma {
    type Err = ParseValueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ley" => Ok(Self::Ley),
            "decreto" => Ok(Self::Decreto),
            "resolucion" | "resolución" => Ok(Self::Resolucion),
            "disposicion" | "disposición" => Ok(Self::Disposicion),
            "decision" | "decisión" => Ok(Self::Decision),
            "acordada" => Ok(Self::Acordada),
            _ => Err(ParseValueError(s.to_string())),
        }
    }
}

/// Jurisdiction scope of a norm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Jurisdiccion {
    Nacional,
    /// Applies only to [`TipoNorma::Ley`] and [`TipoNorma::Decreto`].
    Internacional,
    Provincial,
    /// Applies exclusively to [`TipoNorma::Acordada`].
    Federal,
}

impl Jurisdiccion {
    /// The display form used in search URLs. Provincial norms are filed
    /// under "Local" by the source.
    pub fn display(&self) -> &'static str {
        match self {
            Self::Nacional => "Nacional",
            Self::Internacional => "Internacional",
            Self::Provincial => "Local",
            Self::Federal => "Federal",
        }
    }
}

impl fmt::Display for Jurisdiccion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

impl FromStr for Jurisdiccion {
    type Err = ParseValueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nacional" => Ok(Self::Nacional),
            "internacional" => Ok(Self::Internacional),
            "provincial" | "local" => Ok(Self::Provincial),
            "federal" => Ok(Self::Federal),
            _ => Err(ParseValueError(s.to_string())),
        }
    }
}

/// Argentine provinces, for provincial-jurisdiction searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provincia {
    BuenosAires,
    Catamarca,
    Chaco,
    Chubut,
    CiudadAutonomaDeBuenosAires,
    Cordoba,
    Corrientes,
    EntreRios,
    Formosa,
    Jujuy,
    LaPampa,
    LaRioja,
    Mendoza,
    Misiones,
    Neuquen,
    RioNegro,
    Salta,
    SanJuan,
    SanLuis,
    SantaCruz,
    SantaFe,
    SantiagoDelEstero,
    TierraDelFuego,
    Tucuman,
}

impl Provincia {
    /// The display form used in search URLs.
    pub fn display(&self) -> &'static str {
        match self {
            Self::BuenosAires => "Buenos Aires",
            Self::Catamarca => "Catamarca",
            Self::Chaco => "Chaco",
            Self::Chubut => "Chubut",
            Self::CiudadAutonomaDeBuenosAires => "Ciudad Autónoma de Buenos Aires",
            Self::Cordoba => "Córdoba",
            Self::Corrientes => "Corrientes",
            Self::EntreRios => "Entre Ríos",
            Self::Formosa => "Formosa",
            Self::Jujuy => "Jujuy",
            Self::LaPampa => "La Pampa",
            Self::LaRioja => "La Rioja",
            Self::Mendoza => "Mendoza",
            Self::Misiones => "Misiones",
            Self::Neuquen => "Neuquén",
            Self::RioNegro => "Río Negro",
            Self::Salta => "Salta",
            Self::SanJuan => "San Juan",
            Self::SanLuis => "San Luis",
            Self::SantaCruz => "Santa Cruz",
            Self::SantaFe => "Santa Fe",
            Self::SantiagoDelEstero => "Santiago del Estero",
            Self::TierraDelFuego => "Tierra del Fuego",
            Self::Tucuman => "Tucumán",
        }
    }
}

impl fmt::Display for Provincia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

impl FromStr for Provincia {
    type Err = ParseValueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Accept both accented and plain spellings, ignoring case and spaces.
        let key: String = s
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                'á' => 'a',
                'é' => 'e',
                'í' => 'i',
                'ó' => 'o',
                'ú' => 'u',
                other => other,
            })
            .collect();

        match key.as_str() {
            "buenosaires" => Ok(Self::BuenosAires),
            "catamarca" => Ok(Self::Catamarca),
            "chaco" => Ok(Self::Chaco),
            "chubut" => Ok(Self::Chubut),
            "ciudadautonomadebuenosaires" | "caba" => Ok(Self::CiudadAutonomaDeBuenosAires),
            "cordoba" => Ok(Self::Cordoba),
            "corrientes" => Ok(Self::Corrientes),
            "entrerios" => Ok(Self::EntreRios),
            "formosa" => Ok(Self::Formosa),
            "jujuy" => Ok(Self::Jujuy),
            "lapampa" => Ok(Self::LaPampa),
            "larioja" => Ok(Self::LaRioja),
            "mendoza" => Ok(Self::Mendoza),
            "misiones" => Ok(Self::Misiones),
            "neuquen" => Ok(Self::Neuquen),
            "rionegro" => Ok(Self::RioNegro),
            "salta" => Ok(Self::Salta),
            "sanjuan" => Ok(Self::SanJuan),
            "sanluis" => Ok(Self::SanLuis),
            "santacruz" => Ok(Self::SantaCruz),
            "santafe" => Ok(Self::SantaFe),
            "santiagodelestero" => Ok(Self::SantiagoDelEstero),
            "tierradelfuego" => Ok(Self::TierraDelFuego),
            "tucuman" => Ok(Self::Tucuman),
            _ => Err(ParseValueError(s.to_string())),
        }
    }
}

/// Content types the mirror knows how to persist and render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Legislacion,
}

impl ContentType {
    /// The display form used in search URLs.
    pub fn display(&self) -> &'static str {
        match self {
            Self::Legislacion => "Legislación",
        }
    }

    /// Parse the raw content-type string found in source payloads.
    /// Returns `None` for content types the mirror does not handle.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "legislacion" | "legislación" => Some(Self::Legislacion),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// The parameters used to perform a search against the corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Search {
    pub tipo: Option<TipoNorma>,
    pub jurisdiccion: Option<Jurisdiccion>,
    pub provincia: Option<Provincia>,
    /// Additional facet filters as name/value pairs, appended verbatim to
    /// the search expression.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl Search {
    /// Human-readable label for progress and report headings.
    pub fn label(&self) -> String {
        let tipo = self
            .tipo
            .map(|t| t.display().to_string())
            .unwrap_or_else(|| "Legislación".to_string());
        match (self.jurisdiccion, self.provincia) {
            (_, Some(provincia)) => format!("{} (Provincial, {})", tipo, provincia),
            (Some(jurisdiccion), None) => format!("{} ({})", tipo, jurisdiccion),
            (None, None) => tipo,
        }
    }
}

/// Norm kind as reported by the source (code plus display text).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kind {
    #[serde(rename = "codigo", default)]
    pub code: String,
    #[serde(rename = "texto", default)]
    pub text: String,
}

/// Official publication reference of a norm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    #[serde(rename = "organismo", default)]
    pub organization: String,
    #[serde(rename = "fecha", default)]
    pub date: String,
}

/// A lightweight search hit: just enough to decide whether the full
/// document needs to be fetched. Serialized into sync checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    /// `None` when the source reported a content type the mirror does not
    /// handle; such items are filtered out during discovery.
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub kind: Kind,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub date: String,
    pub timestamp: Option<i64>,
    /// The search that produced this hit.
    #[serde(default)]
    pub query: Search,
}

impl DocumentSummary {
    /// Public page for this document.
    pub fn web_url(&self) -> String {
        format!("{}/{}", WEB_BASE_URL, self.id)
    }

    /// Raw JSON endpoint for this document.
    pub fn data_url(&self) -> String {
        format!("{}/view-document?guid={}", WEB_BASE_URL, self.id)
    }
}

/// A full document: the normalized fields plus the canonical JSON payload
/// it was projected from. The payload is the unit of storage and diffing.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Friendly URL segment, used as the rendered file name.
    pub alias: String,
    pub content_type: ContentType,
    pub kind: Kind,
    pub name: String,
    pub title: String,
    pub summary: String,
    pub status: String,
    pub date: String,
    pub modified: String,
    pub timestamp: i64,
    pub terms: Vec<String>,
    pub publication: Option<Publication>,
    /// Canonical JSON payload as received from the source.
    pub payload: Value,
    /// The search that produced this document, if any.
    pub query: Search,
}

impl Document {
    /// Project a document from its canonical JSON payload.
    ///
    /// The identifier, alias and timestamp are required; everything else
    /// degrades to empty fields so partially-populated norms still render.
    pub fn from_payload(payload: Value) -> Result<Self> {
        let id = pointer_str(&payload, ID_POINTER)
            .ok_or_else(|| SourceError::invalid("missing document identifier"))?
            .to_string();

        let raw_type = pointer_str(&payload, "/document/metadata/document-content-type")
            .ok_or_else(|| SourceError::invalid("missing document content type"))?;
        let content_type = ContentType::parse(raw_type)
            .ok_or_else(|| SourceError::unsupported(format!("content type '{}'", raw_type)))?;

        let alias = pointer_str(&payload, "/document/metadata/friendly-url")
            .ok_or_else(|| SourceError::invalid("missing document friendly-url"))?
            .to_string();

        let timestamp = payload
            .pointer(TIMESTAMP_POINTER)
            .and_then(value_as_i64)
            .ok_or_else(|| SourceError::invalid("missing document timestamp"))?;

        let kind = payload
            .pointer("/document/content/tipo-norma")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let terms = payload
            .pointer("/document/content/descriptores")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let publication = payload
            .pointer("/document/content/publicacion")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        Ok(Self {
            id,
            alias,
            content_type,
            kind,
            name: pointer_string(&payload, "/document/content/nombre"),
            title: pointer_string(&payload, "/document/content/titulo-norma"),
            summary: pointer_string(&payload, "/document/content/sintesis"),
            status: pointer_string(&payload, "/document/content/estado"),
            date: pointer_string(&payload, "/document/content/fecha"),
            modified: pointer_string(&payload, "/document/content/fecha-umod"),
            timestamp,
            terms,
            publication,
            payload,
            query: Search::default(),
        })
    }

    /// Public page for this document, keyed by alias.
    pub fn web_url(&self) -> String {
        format!("{}/{}", WEB_BASE_URL, self.alias)
    }

    /// Raw JSON endpoint for this document.
    pub fn data_url(&self) -> String {
        format!("{}/view-document?guid={}", WEB_BASE_URL, self.id)
    }

    /// Render this document as Markdown with a YAML front matter block.
    pub fn to_markdown(&self) -> String {
        #[derive(Serialize)]
        struct FrontMatter<'a> {
            #[serde(rename = "Fecha")]
            date: &'a str,
            #[serde(rename = "Título")]
            name: &'a str,
            #[serde(rename = "Publicación", skip_serializing_if = "Option::is_none")]
            publication: Option<FrontMatterPublication<'a>>,
            #[serde(rename = "SAIJ")]
            web_url: String,
        }

        #[derive(Serialize)]
        struct FrontMatterPublication<'a> {
            #[serde(rename = "Organismo")]
            organization: &'a str,
            #[serde(rename = "Fecha")]
            date: &'a str,
        }

        let front = FrontMatter {
            date: &self.date,
            name: if self.name.is_empty() {
                &self.alias
            } else {
                &self.name
            },
            publication: self.publication.as_ref().map(|p| FrontMatterPublication {
                organization: &p.organization,
                date: &p.date,
            }),
            web_url: self.web_url(),
        };

        // serde_yaml appends a trailing newline to the mapping.
        let front = serde_yaml::to_string(&front).unwrap_or_default();

        let body = pointer_string(&self.payload, "/document/content/texto");
        let mut markdown = format!("---\n{}---\n# {}\n", front, self.title);
        if !self.summary.is_empty() {
            markdown.push_str(&format!("\n{}\n", self.summary));
        }
        if !body.is_empty() {
            markdown.push_str(&format!("\n{}\n", body));
        }
        markdown
    }
}

fn pointer_str<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn pointer_string(value: &Value, pointer: &str) -> String {
    pointer_str(value, pointer).unwrap_or_default().to_string()
}

/// Timestamps arrive either as JSON numbers or numeric strings.
pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// One page of search results.
///
/// `raw_count` is the number of hits the source returned for the page
/// before any filtering, so callers can tell an exhausted partition
/// (`raw_count == 0`) apart from a page where every hit was filtered out.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub raw_count: usize,
    /// Total matches reported by the source, when known.
    pub total: Option<u64>,
    pub items: Vec<DocumentSummary>,
}

/// Unified interface to a paginated document source.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch one page of search results.
    async fn search(&self, query: &Search, skip: u64, take: u64) -> Result<SearchPage>;

    /// Load the full document behind a search hit.
    async fn load(&self, summary: &DocumentSummary) -> Result<Document>;

    /// Fetch a document by identifier. Accepts either the internal UUID or
    /// the natural key, resolving the latter through a single-result search.
    async fn fetch(&self, id: &str) -> Result<Document>;
}
