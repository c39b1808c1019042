use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde_json::Value;
use url::Url;

use crate::source::{
    Document, DocumentSummary, Result, Search, SearchPage, SourceClient, SourceError,
};

use super::convert;

/// Default SAIJ service origin.
pub const DEFAULT_BASE_URL: &str = "https://www.saij.gob.ar";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("normas/", env!("CARGO_PKG_VERSION"));

const RETRY_MIN_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);
const RETRY_MAX_TIMES: usize = 5;

/// Jittered exponential backoff applied to every SAIJ request.
fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(RETRY_MIN_DELAY)
        .with_max_delay(RETRY_MAX_DELAY)
        .with_max_times(RETRY_MAX_TIMES)
        .with_jitter()
}

/// HTTP client for the SAIJ search and document endpoints.
///
/// Every request goes through a shared exponential backoff so transient
/// failures are retried here, below the sync engine's own attempt budget.
pub struct SaijClient {
    http: reqwest::Client,
    base: Url,
    backoff: ExponentialBuilder,
}

impl SaijClient {
    /// Create a client against the given service origin.
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| SourceError::invalid(format!("invalid base URL '{}': {}", base_url, e)))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::network(e.to_string()))?;

        Ok(Self {
            http,
            base,
            backoff: retry_policy(),
        })
    }

    /// Build the search expression for one result page.
    ///
    /// The service takes a single faceted expression: offset, page size,
    /// the facet path (content type, extra filters, jurisdiction), newest
    /// first, collapsed view.
    fn search_expression(query: &Search, skip: u64, take: u64) -> String {
        let tipo = match query.tipo {
            Some(tipo) => format!("|Tipo+de+Documento/Legislación/{}", tipo.display()),
            None => "|Tipo+de+Documento/Legislación".to_string(),
        };

        let filters = if query.filters.is_empty() {
            String::new()
        } else {
            let joined = query
                .filters
                .iter()
                .map(|(name, value)| {
                    format!("{}/{}", name.replace(' ', "+"), value.replace(' ', "+"))
                })
                .collect::<Vec<_>>()
                .join("|");
            format!("|{}", joined)
        };

        let jurisdiccion = match (query.provincia, query.jurisdiccion) {
            (Some(provincia), _) => {
                format!("|Jurisdicción/Local/{}", provincia.display().replace(' ', "+"))
            }
            (None, Some(jurisdiccion)) => format!("|Jurisdicción/{}", jurisdiccion.display()),
            (None, None) => String::new(),
        };

        format!(
            "o={}&p={}&f=Total{}{}{}&s=fecha-rango|DESC&v=colapsada",
            skip, take, tipo, filters, jurisdiccion
        )
    }

    fn endpoint(&self, path: &str, query: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(Some(query));
        url
    }

    /// GET a JSON endpoint, retrying transient failures.
    async fn get_json(&self, url: Url) -> Result<Value> {
        let fetch = || async {
            let response = self
                .http
                .get(url.clone())
                .send()
                .await
                .map_err(request_error)?;

            let status = response.status();
            if status.as_u16() == 429 {
                return Err(SourceError::RateLimited);
            }
            if !status.is_success() {
                return Err(SourceError::api(
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("request failed"),
                ));
            }

            response.json().await.map_err(request_error)
        };

        fetch
            .retry(self.backoff)
            .when(SourceError::is_transient)
            .notify(|err, delay| {
                tracing::debug!(error = %err, delay_ms = delay.as_millis(), "Retrying request");
            })
            .await
    }

    /// Resolve a natural key (e.g. a boletín identifier without dashes) to
    /// the internal UUID through a single-result search.
    async fn resolve_id(&self, id: &str) -> Result<String> {
        let url = self.endpoint("/busqueda", &format!("r=(id-infojus:{})&f=Total", id));
        let envelope = self.get_json(url).await?;
        let page = convert::parse_search(envelope, &Search::default())?;

        if page.total == Some(1) {
            if let Some(hit) = page.items.first() {
                return Ok(hit.id.clone());
            }
        }
        Err(SourceError::not_found(id))
    }
}

fn request_error(e: reqwest::Error) -> SourceError {
    if e.is_decode() {
        SourceError::invalid(e.to_string())
    } else {
        SourceError::network(e.to_string())
    }
}

#[async_trait]
impl SourceClient for SaijClient {
    async fn search(&self, query: &Search, skip: u64, take: u64) -> Result<SearchPage> {
        let url = self.endpoint("/busqueda", &Self::search_expression(query, skip, take));
        let envelope = self.get_json(url).await?;
        convert::parse_search(envelope, query)
    }

    async fn load(&self, summary: &DocumentSummary) -> Result<Document> {
        let mut document = self.fetch(&summary.id).await?;
        document.query = summary.query.clone();
        Ok(document)
    }

    async fn fetch(&self, id: &str) -> Result<Document> {
        // UUIDs are dashed; anything else is a natural key to resolve first.
        let id = if id.contains('-') {
            id.to_string()
        } else {
            self.resolve_id(id).await?
        };

        let url = self.endpoint("/view-document", &format!("guid={}", id));
        let envelope = self.get_json(url).await?;
        let payload = convert::parse_document_envelope(&envelope)
            .ok_or_else(|| SourceError::not_found(&id))?;

        Document::from_payload(payload)
    }
}

#[cfg(test)]
mod tests {
    use crate::source::{Jurisdiccion, Provincia, TipoNorma};

    use super::*;

    #[test]
    fn test_search_expression_defaults() {
        let expression = SaijClient::search_expression(&Search::default(), 0, 100);

        assert_eq!(
            expression,
            "o=0&p=100&f=Total|Tipo+de+Documento/Legislación&s=fecha-rango|DESC&v=colapsada"
        );
    }

    #[test]
    fn test_search_expression_with_tipo_and_jurisdiccion() {
        let search = Search {
            tipo: Some(TipoNorma::Ley),
            jurisdiccion: Some(Jurisdiccion::Nacional),
            ..Search::default()
        };

        let expression = SaijClient::search_expression(&search, 200, 100);

        assert_eq!(
            expression,
            "o=200&p=100&f=Total|Tipo+de+Documento/Legislación/Ley\
             |Jurisdicción/Nacional&s=fecha-rango|DESC&v=colapsada"
        );
    }

    #[test]
    fn test_search_expression_provincial() {
        let search = Search {
            tipo: Some(TipoNorma::Decreto),
            jurisdiccion: Some(Jurisdiccion::Provincial),
            provincia: Some(Provincia::SantaFe),
            ..Search::default()
        };

        let expression = SaijClient::search_expression(&search, 0, 50);

        assert_eq!(
            expression,
            "o=0&p=50&f=Total|Tipo+de+Documento/Legislación/Decreto\
             |Jurisdicción/Local/Santa+Fe&s=fecha-rango|DESC&v=colapsada"
        );
    }

    #[test]
    fn test_search_expression_with_filters() {
        let mut search = Search {
            tipo: Some(TipoNorma::Ley),
            ..Search::default()
        };
        search.filters.insert(
            "Estado de Vigencia".to_string(),
            "Vigente, de alcance general".to_string(),
        );

        let expression = SaijClient::search_expression(&search, 0, 100);

        assert_eq!(
            expression,
            "o=0&p=100&f=Total|Tipo+de+Documento/Legislación/Ley\
             |Estado+de+Vigencia/Vigente,+de+alcance+general&s=fecha-rango|DESC&v=colapsada"
        );
    }

    #[test]
    fn test_new_rejects_bad_base_url() {
        assert!(matches!(
            SaijClient::new("not a url"),
            Err(SourceError::Invalid { .. })
        ));
        assert!(SaijClient::new(DEFAULT_BASE_URL).is_ok());
    }

    #[tokio::test]
    async fn test_get_json_retries_transient_responses() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // One 503, then a good response on the retried connection.
        tokio::spawn(async move {
            let responses = [
                "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 11\r\nconnection: close\r\n\r\n{\"total\":1}",
            ];
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buffer = [0u8; 1024];
                let _ = stream.read(&mut buffer).await;
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        let client = SaijClient::new(&format!("http://{}", addr)).unwrap();
        let url = client.endpoint("/busqueda", "f=Total");
        let value = client.get_json(url).await.unwrap();

        assert_eq!(value["total"], 1);
    }
}
