//! Layout partitioning of PDF files into text elements.
//!
//! Two [`Partitioner`] implementations:
//! - **[`UnstructuredPartitioner`]**: posts the file to an Unstructured
//!   partition API (`/general/v0/general`) with the high-resolution strategy,
//!   title-boundary chunking, and table structure inference.
//! - **[`PdfExtractPartitioner`]**: local fallback built on `pdf-extract`;
//!   one pass per page, split on paragraph boundaries.
//!
//! Partitioners report elements as the service returns them, including
//! empty ones. Filtering and provenance are the ingestor's job.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::chunk::split_paragraphs;
use crate::config::PartitionerConfig;

pub const MIME_PDF: &str = "application/pdf";

/// A structural unit extracted from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub text: String,
    pub page_number: Option<u32>,
    /// Element category as reported by the partitioner (e.g. `Table`).
    pub kind: Option<String>,
}

#[async_trait]
pub trait Partitioner: Send + Sync {
    fn name(&self) -> &str;
    async fn partition(&self, path: &Path) -> Result<Vec<Element>>;
}

// ============ Unstructured API ============

pub struct UnstructuredPartitioner {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    strategy: String,
    chunking_strategy: String,
    infer_table_structure: bool,
}

impl UnstructuredPartitioner {
    pub fn new(config: &PartitionerConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build partition HTTP client")?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key,
            strategy: config.strategy.clone(),
            chunking_strategy: config.chunking_strategy.clone(),
            infer_table_structure: config.infer_table_structure,
        })
    }
}

#[async_trait]
impl Partitioner for UnstructuredPartitioner {
    fn name(&self) -> &str {
        "unstructured"
    }

    async fn partition(&self, path: &Path) -> Result<Vec<Element>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(MIME_PDF)?;
        let form = reqwest::multipart::Form::new()
            .part("files", part)
            .text("strategy", self.strategy.clone())
            .text("chunking_strategy", self.chunking_strategy.clone())
            .text(
                "pdf_infer_table_structure",
                self.infer_table_structure.to_string(),
            );

        let mut request = self
            .client
            .post(&self.url)
            .header("accept", "application/json")
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("unstructured-api-key", key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("failed to call partition API at {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("partition API error {}: {}", status, body);
        }

        let json: serde_json::Value = response.json().await?;
        parse_elements(&json)
    }
}

/// Parse the partition API's element array.
fn parse_elements(json: &serde_json::Value) -> Result<Vec<Element>> {
    let items = json
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid partition response: expected an array"))?;

    Ok(items
        .iter()
        .map(|item| {
            let metadata = item.get("metadata");
            Element {
                text: item
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string(),
                page_number: metadata
                    .and_then(|m| m.get("page_number"))
                    .and_then(|p| p.as_u64())
                    .map(|p| p as u32),
                kind: item
                    .get("type")
                    .and_then(|t| t.as_str())
                    .map(|t| t.to_string()),
            }
        })
        .collect())
}

// ============ Local pdf-extract ============

pub struct PdfExtractPartitioner {
    max_tokens: usize,
}

impl PdfExtractPartitioner {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }
}

#[async_trait]
impl Partitioner for PdfExtractPartitioner {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    async fn partition(&self, path: &Path) -> Result<Vec<Element>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await?
        .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))?;

        Ok(pages_to_elements(&pages, self.max_tokens))
    }
}

fn pages_to_elements(pages: &[String], max_tokens: usize) -> Vec<Element> {
    let mut elements = Vec::new();
    for (i, page) in pages.iter().enumerate() {
        for piece in split_paragraphs(page, max_tokens) {
            elements.push(Element {
                text: piece,
                page_number: Some(i as u32 + 1),
                kind: Some("NarrativeText".to_string()),
            });
        }
    }
    elements
}

/// Create the configured [`Partitioner`].
pub fn create_partitioner(config: &PartitionerConfig) -> Result<Arc<dyn Partitioner>> {
    match config.provider.as_str() {
        "unstructured" => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty());
            Ok(Arc::new(UnstructuredPartitioner::new(config, api_key)?))
        }
        "pdf-extract" => Ok(Arc::new(PdfExtractPartitioner::new(config.max_tokens))),
        other => bail!("Unknown partitioner: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_elements_reads_page_and_type() {
        let json = serde_json::json!([
            {
                "type": "CompositeElement",
                "element_id": "a1",
                "text": "Writing and city life in Mesopotamia.",
                "metadata": { "page_number": 3, "filename": "ch2.pdf" }
            },
            {
                "type": "Table",
                "element_id": "a2",
                "text": "Year | Event",
                "metadata": { "text_as_html": "<table></table>" }
            }
        ]);
        let elements = parse_elements(&json).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].page_number, Some(3));
        assert_eq!(elements[0].kind.as_deref(), Some("CompositeElement"));
        assert_eq!(elements[1].page_number, None);
        assert_eq!(elements[1].kind.as_deref(), Some("Table"));
    }

    #[test]
    fn test_parse_elements_rejects_object() {
        let err = parse_elements(&serde_json::json!({ "detail": "bad" })).unwrap_err();
        assert!(err.to_string().contains("expected an array"));
    }

    #[test]
    fn test_pages_to_elements_numbers_pages_from_one() {
        let pages = vec![
            "Early societies.\n\nFrom the beginning of time.".to_string(),
            "   ".to_string(),
            "Empires.".to_string(),
        ];
        let elements = pages_to_elements(&pages, 500);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].page_number, Some(1));
        assert_eq!(elements[1].page_number, Some(3));
        assert_eq!(elements[1].text, "Empires.");
    }

    #[tokio::test]
    async fn test_pdf_extract_rejects_garbage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let partitioner = PdfExtractPartitioner::new(500);
        assert!(partitioner.partition(&path).await.is_err());
    }
}
