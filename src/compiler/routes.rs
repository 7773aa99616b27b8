use super::Source;

/// Single-pass compaction of routing tables: drops blank lines and
/// whole-line `//` comments. No path-token substitution.
#[derive(Debug, Clone)]
pub struct RoutesCompiler {
    source: Source,
}

impl RoutesCompiler {
    pub fn new(source: Source) -> Self {
        Self { source }
    }

    pub async fn parse(&self) -> anyhow::Result<String> {
        let content = self.source.load().await?;
        let mut compiled = content
            .lines()
            .filter(|line| {
                let trimmed = line.trim();
                !trimmed.is_empty() && !trimmed.starts_with("//")
            })
            .collect::<Vec<_>>()
            .join("\n");
        compiled.push('\n');
        Ok(compiled)
    }
}
