use anyhow::{Context, Result};
use std::path::PathBuf;

use super::{HttpClient, fetch_bytes};
use crate::model::Table;

/// Where the raw payloads of one run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A directory holding one `<table>.json` file per table.
    Directory(PathBuf),
    /// Base URL of the upstream API, e.g. `https://disease.sh/v3/covid-19`.
    Api(String),
}

impl Source {
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            Source::Api(source.trim_end_matches('/').to_string())
        } else {
            Source::Directory(PathBuf::from(source))
        }
    }

    /// File path or URL holding the payload for `table`.
    pub fn location(&self, table: Table, lastdays: u32) -> String {
        match self {
            Source::Directory(dir) => dir.join(file_name(table)).display().to_string(),
            Source::Api(base) => format!("{base}/{}", endpoint(table, lastdays)),
        }
    }

    /// Loads the raw payload for `table`.
    #[tracing::instrument(skip(self, client))]
    pub async fn load<C: HttpClient>(
        &self,
        client: &C,
        table: Table,
        lastdays: u32,
    ) -> Result<Vec<u8>> {
        let location = self.location(table, lastdays);
        match self {
            Source::Directory(_) => tokio::fs::read(&location)
                .await
                .with_context(|| format!("reading {location}")),
            Source::Api(_) => fetch_bytes(client, &location)
                .await
                .with_context(|| format!("fetching {location}")),
        }
    }
}

fn file_name(table: Table) -> &'static str {
    match table {
        Table::Global => "global.json",
        Table::Countries => "countries.json",
        Table::Continents => "continents.json",
        Table::States => "states.json",
        Table::Historical => "historical.json",
    }
}

fn endpoint(table: Table, lastdays: u32) -> String {
    match table {
        Table::Global => "all".to_string(),
        Table::Countries => "countries".to_string(),
        Table::Continents => "continents".to_string(),
        Table::States => "states".to_string(),
        Table::Historical => format!("historical?lastdays={lastdays}"),
    }
}
