use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

use super::CompileError;

/// Global the compiled bundles register their translations on
pub const LOCALE_GLOBAL: &str = "LOADER_I18N";

const LOCALE_FILE_SUFFIX: &str = ".l10n.js";

/// Compiles every `<module>.l10n.js` table of one locale into a single bundle.
///
/// Each table holds a JSON object of key -> translated text. Invocations for
/// different locales are independent of each other.
#[derive(Debug, Clone)]
pub struct LocaleCompiler {
    locales_dir: Utf8PathBuf,
    locale: String,
}

impl LocaleCompiler {
    pub fn new(locales_dir: impl Into<Utf8PathBuf>, locale: impl Into<String>) -> Self {
        Self {
            locales_dir: locales_dir.into(),
            locale: locale.into(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub async fn parse(&self) -> anyhow::Result<String> {
        let tables = self.load_tables().await?;
        let json = serde_json::to_string(&tables)?;
        let locale = serde_json::to_string(&self.locale)?;
        Ok(format!(
            "{global}=window.{global}||{{}};{global}[{locale}]={json};\n",
            global = LOCALE_GLOBAL,
        ))
    }

    async fn load_tables(&self) -> Result<IndexMap<String, serde_json::Value>, CompileError> {
        let dir = self.locales_dir.join(&self.locale);
        let mut tables = IndexMap::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "No translations found for locale {} (missing {})",
                    self.locale,
                    dir
                );
                return Ok(tables);
            }
            Err(source) => return Err(CompileError::Read { path: dir, source }),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| CompileError::Read {
                path: dir.clone(),
                source,
            })?
        {
            let name = entry.file_name();
            let Some(module) = name
                .to_str()
                .and_then(|name| name.strip_suffix(LOCALE_FILE_SUFFIX))
            else {
                continue;
            };
            let path = dir.join(format!("{}{}", module, LOCALE_FILE_SUFFIX));
            let table = read_table(&path).await?;
            tables.insert(module.to_string(), table);
        }

        tables.sort_keys();
        tracing::debug!(
            "Locale {}: {} translation tables",
            self.locale,
            tables.len()
        );
        Ok(tables)
    }
}

async fn read_table(path: &Utf8Path) -> Result<serde_json::Value, CompileError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CompileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| CompileError::InvalidLocaleFile {
        path: path.to_path_buf(),
        source,
    })
}
