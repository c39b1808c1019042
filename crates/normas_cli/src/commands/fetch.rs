//! The fetch command: download a single document into the mirror.

use std::path::PathBuf;

use normas::repository::{ContentAction, FileDocumentRepository};
use normas::saij::SaijClient;
use normas::source::SourceClient;

use crate::config::Config;

pub async fn handle_fetch(
    id: &str,
    dir: Option<PathBuf>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = dir.unwrap_or_else(|| config.directory());
    let client = SaijClient::new(&config.base_url())?;
    let repository = FileDocumentRepository::new(&dir)?;

    let document = client.fetch(id).await?;
    let action = repository.set_document(&document)?;
    let location = repository.location(&document);

    let verb = match action {
        ContentAction::Created => "Creado",
        _ => "Actualizado",
    };
    println!("{}: {}", verb, location.text.display());
    println!("SAIJ: {}", document.web_url());

    Ok(())
}
