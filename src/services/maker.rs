use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;

use super::classify::FileKind;
use super::copyright;
use super::exclusion::ExclusionRules;
use crate::models::{
    AppDescriptor, BuildContext, BuildSettings, CORE_GROUP, CoreDescriptor, LoaderConfig,
    LoaderGroup, Manifest, ModuleDescriptor, ModuleEntry,
};
use crate::walker::{FileHandler, SourceTree, TreeWalker};

const ASSETS_SEGMENT: &str = "assets";
const PLUGINS_ROOT: &str = "plugins";
const LOCALES_ROOT: &str = "locales";
const LOCALE_SUFFIX: &str = ".l10n.js";

/// Errors raised while extracting module metadata
#[derive(Error, Debug)]
pub enum MakeError {
    #[error("style file outside an assets directory: {0}")]
    StylePathWithoutAssets(Utf8PathBuf),

    #[error("malformed @requires annotation: {0}")]
    MalformedRequires(String),

    #[error("failed to serialize loader config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Module name and dependencies declared in a script header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptHeader {
    pub module: String,
    pub requires: Option<Vec<String>>,
}

/// Extracts [`ScriptHeader`]s from script text
#[derive(Debug, Clone)]
pub struct HeaderParser {
    /// `@module <name>`
    module_pattern: Regex,

    /// `@requires` up to the end of its line
    requires_pattern: Regex,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self {
            module_pattern: Regex::new(r"@module\s+(\S+)").expect("Invalid @module regex"),
            requires_pattern: Regex::new(r"@requires\b[ \t]*([^\r\n]*)")
                .expect("Invalid @requires regex"),
        }
    }

    /// Read `@module <name>` and an optional `@requires [a, b]`.
    ///
    /// `Ok(None)` when the script declares no module.
    pub fn parse(&self, script: &str) -> Result<Option<ScriptHeader>, MakeError> {
        let Some(module) = self
            .module_pattern
            .captures(script)
            .and_then(|captures| captures.get(1))
        else {
            return Ok(None);
        };

        let requires = match self
            .requires_pattern
            .captures(script)
            .and_then(|captures| captures.get(1))
        {
            Some(list) => Some(parse_requires(list.as_str())?),
            None => None,
        };

        Ok(Some(ScriptHeader {
            module: module.as_str().to_string(),
            requires,
        }))
    }
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_requires(annotation: &str) -> Result<Vec<String>, MakeError> {
    // Single-line doc comments may close on the same line
    let list = annotation.trim();
    let list = list.strip_suffix("*/").unwrap_or(list).trim_end();

    let list = match (list.strip_prefix('['), list.ends_with(']')) {
        (Some(inner), true) => &inner[..inner.len() - 1],
        (None, false) => list,
        _ => return Err(MakeError::MalformedRequires(annotation.trim().to_string())),
    };
    if list.contains(['[', ']']) {
        return Err(MakeError::MalformedRequires(annotation.trim().to_string()));
    }

    Ok(list
        .split(',')
        .map(|name| name.trim().trim_matches(['"', '\'']).trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect())
}

/// `css_<group>_<stem>`, or `css_plugins_<group>_<stem>` below `plugins/`.
///
/// The group is the directory holding the `assets/` directory.
pub fn style_module_name(path: &Utf8Path) -> Result<String, MakeError> {
    let segments: Vec<&str> = path.iter().collect();
    let group = segments
        .windows(2)
        .find(|pair| pair[1] == ASSETS_SEGMENT)
        .map(|pair| pair[0])
        // The assets directory must hold the file, not be the file
        .filter(|_| segments.last() != Some(&ASSETS_SEGMENT))
        .ok_or_else(|| MakeError::StylePathWithoutAssets(path.to_path_buf()))?;

    let stem = path
        .file_name()
        .and_then(|name| name.split('.').next())
        .unwrap_or_default();

    let plugin = if segments.first() == Some(&PLUGINS_ROOT) {
        "plugins_"
    } else {
        ""
    };

    Ok(format!("css_{}{}_{}", plugin, group, stem))
}

/// `l10n_<locale>_<name>` for `locales/<locale>/<name>.l10n.js`
pub fn locale_module_name(path: &Utf8Path) -> Option<String> {
    let segments: Vec<&str> = path.iter().collect();
    let locale = segments
        .windows(2)
        .find(|pair| pair[0] == LOCALES_ROOT)
        .map(|pair| pair[1])?;
    let name = path.file_name()?.strip_suffix(LOCALE_SUFFIX)?;
    Some(format!("l10n_{}_{}", locale, name))
}

/// Walker hook turning source files into module descriptors
#[derive(Debug, Clone)]
pub struct ModuleScanner {
    project_root: Utf8PathBuf,
    exclusions: ExclusionRules,
    headers: HeaderParser,
}

impl ModuleScanner {
    pub fn new(project_root: impl Into<Utf8PathBuf>, exclusions: ExclusionRules) -> Self {
        Self {
            project_root: project_root.into(),
            exclusions,
            headers: HeaderParser::new(),
        }
    }

    async fn scan_script(&self, path: Utf8PathBuf) -> Result<Option<ModuleDescriptor>> {
        let absolute = self.project_root.join(&path);
        let script = tokio::fs::read_to_string(&absolute)
            .await
            .with_context(|| format!("Failed to read script {}", absolute))?;

        let header = self
            .headers
            .parse(&script)
            .with_context(|| format!("Invalid module header in {}", path))?;

        let Some(header) = header else {
            tracing::warn!("No @module annotation in {}, not registered", path);
            return Ok(None);
        };

        let descriptor = ModuleDescriptor::script(header.module, path);
        Ok(Some(match header.requires {
            Some(requires) => descriptor.with_dependencies(requires),
            None => descriptor,
        }))
    }
}

impl FileHandler for ModuleScanner {
    type Output = ModuleDescriptor;

    async fn handle(&self, path: Utf8PathBuf) -> Result<Option<ModuleDescriptor>> {
        if self.exclusions.is_excluded(&path) {
            tracing::debug!("Excluded {}", path);
            return Ok(None);
        }

        match FileKind::classify(&path) {
            FileKind::Script | FileKind::Routes => self.scan_script(path).await,
            FileKind::Style => {
                let name = style_module_name(&path)?;
                Ok(Some(ModuleDescriptor::style(name, path)))
            }
            FileKind::Locale => match locale_module_name(&path) {
                Some(name) => Ok(Some(ModuleDescriptor::script(name, path))),
                None => {
                    tracing::warn!("Locale file {} is not below locales/<locale>/", path);
                    Ok(None)
                }
            },
            FileKind::Test | FileKind::Markup | FileKind::Partial | FileKind::Static => Ok(None),
        }
    }
}

/// Assembles the module manifest and writes the loader document
#[derive(Debug, Clone)]
pub struct ModuleMaker {
    walker: TreeWalker<ModuleScanner>,
}

impl ModuleMaker {
    pub fn new(project_root: impl Into<Utf8PathBuf>, exclusions: ExclusionRules) -> Self {
        let project_root = project_root.into();
        let scanner = ModuleScanner::new(project_root.clone(), exclusions);
        Self {
            walker: TreeWalker::new(project_root, scanner),
        }
    }

    pub fn project_root(&self) -> &Utf8Path {
        self.walker.project_root()
    }

    /// Traverse `tree` and collect every module it declares
    pub async fn make(&self, tree: &SourceTree) -> Result<Manifest> {
        let traversal = self.walker.fetch(tree).await?;
        let manifest: Manifest = traversal.outputs.into_iter().collect();
        tracing::info!(
            "Manifest assembled: {} modules from {} branches",
            manifest.len(),
            traversal.stats.completed
        );
        Ok(manifest)
    }

    /// Merge the core modules and `manifest` into the loader document and
    /// write it below the context's output root.
    ///
    /// Returns the absolute path of the written document.
    pub async fn write_config(
        &self,
        manifest: &Manifest,
        ctx: &BuildContext,
        settings: &BuildSettings,
        app: &AppDescriptor,
        core: &CoreDescriptor,
    ) -> Result<Utf8PathBuf> {
        let document = loader_config(manifest, ctx, app, core);
        let script = document.to_script().map_err(MakeError::from)?;
        let script = copyright::stamp(&script, app.copyright.as_ref());

        let dir = ctx.output_root.join(&settings.config_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create config directory {}", dir))?;

        let path = dir.join(ctx.variant.loader_config_file());
        tokio::fs::write(&path, script)
            .await
            .with_context(|| format!("Failed to write loader config {}", path))?;

        tracing::info!("Loader config written to {}", path);
        Ok(path)
    }
}

/// Build the loader document with a `core` group and the application group
pub fn loader_config(
    manifest: &Manifest,
    ctx: &BuildContext,
    app: &AppDescriptor,
    core: &CoreDescriptor,
) -> LoaderConfig {
    let base = ctx.group_base();

    let mut core_modules: IndexMap<String, ModuleEntry> = core.modules.clone();
    core_modules.sort_keys();

    let mut groups = IndexMap::new();
    groups.insert(
        CORE_GROUP.to_string(),
        LoaderGroup {
            base: base.clone(),
            modules: core_modules,
        },
    );
    groups.insert(
        app.app.clone(),
        LoaderGroup {
            base,
            modules: manifest.entries(),
        },
    );

    LoaderConfig {
        app: app.app.clone(),
        appmainview: app.appmainview.clone(),
        locales: app.locales.clone(),
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildVariant, Copyright, ModuleKind};
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(script: &str) -> Result<Option<ScriptHeader>, MakeError> {
        HeaderParser::new().parse(script)
    }

    #[test]
    fn test_header_with_requires() {
        let script = "/**\n * @module foo/bar\n * @requires [a, b]\n */\nvar x;";
        let header = parse(script).unwrap().unwrap();
        assert_eq!(header.module, "foo/bar");
        assert_eq!(header.requires, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_header_without_brackets_or_requires() {
        let header = parse("// @module solo\n// @requires a ,b\n")
            .unwrap()
            .unwrap();
        assert_eq!(header.requires, Some(vec!["a".to_string(), "b".to_string()]));

        let header = parse("/* @module solo */").unwrap().unwrap();
        assert_eq!(header.module, "solo");
        assert_eq!(header.requires, None);
    }

    #[test]
    fn test_header_quoted_and_inline_comment() {
        let header = parse("/** @module q @requires ['x', \"y\"] */")
            .unwrap()
            .unwrap();
        assert_eq!(header.requires, Some(vec!["x".to_string(), "y".to_string()]));
    }

    #[test]
    fn test_missing_module_is_none() {
        assert_eq!(parse("var a = 1;\n// @requires [a]").unwrap(), None);
    }

    #[test]
    fn test_unbalanced_requires_is_an_error() {
        let err = parse("@module m\n@requires [a, b\n").unwrap_err();
        assert!(matches!(err, MakeError::MalformedRequires(_)));

        let err = parse("@module m\n@requires a]\n").unwrap_err();
        assert!(matches!(err, MakeError::MalformedRequires(_)));
    }

    #[test]
    fn test_empty_requires_list() {
        let header = parse("@module m\n@requires []\n").unwrap().unwrap();
        assert_eq!(header.requires, Some(Vec::new()));
    }

    #[test]
    fn test_style_names() {
        assert_eq!(
            style_module_name(Utf8Path::new("widgets/assets/button.css")).unwrap(),
            "css_widgets_button"
        );
        assert_eq!(
            style_module_name(Utf8Path::new("views/widgets/assets/button.min.css")).unwrap(),
            "css_widgets_button"
        );
        assert_eq!(
            style_module_name(Utf8Path::new("plugins/widgets/assets/button.css")).unwrap(),
            "css_plugins_widgets_button"
        );
    }

    #[test]
    fn test_style_without_assets_is_an_error() {
        let err = style_module_name(Utf8Path::new("views/widgets/button.css")).unwrap_err();
        assert!(matches!(
            err,
            MakeError::StylePathWithoutAssets(p) if p == "views/widgets/button.css"
        ));

        assert!(style_module_name(Utf8Path::new("assets/button.css")).is_err());
    }

    #[test]
    fn test_locale_names() {
        assert_eq!(
            locale_module_name(Utf8Path::new("locales/fr_FR/main.l10n.js")).as_deref(),
            Some("l10n_fr_FR_main")
        );
        assert_eq!(locale_module_name(Utf8Path::new("views/main.l10n.js")), None);
    }

    proptest! {
        #[test]
        fn prop_whitespace_around_commas_is_ignored(
            before in "[ \t]{0,3}",
            after in "[ \t]{0,3}",
            bracketed in any::<bool>(),
        ) {
            let list = format!("a{}, {}b", before, after);
            let list = if bracketed { format!("[{}]", list) } else { list };
            let script = format!("/**\n * @module foo/bar\n * @requires {}\n */", list);

            let header = parse(&script).unwrap().unwrap();
            prop_assert_eq!(header.module, "foo/bar");
            prop_assert_eq!(header.requires, Some(vec!["a".to_string(), "b".to_string()]));
        }
    }

    fn create_project() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        fs::create_dir_all(root.join("views/main/assets")).unwrap();
        fs::create_dir_all(root.join("plugins/widgets/assets")).unwrap();
        fs::create_dir_all(root.join("locales/fr_FR")).unwrap();
        fs::create_dir_all(root.join("config")).unwrap();

        fs::write(
            root.join("views/main/main.js"),
            "/**\n * @module main\n * @requires [base, widgets]\n */\n",
        )
        .unwrap();
        fs::write(root.join("views/main/helper.js"), "var helper = 1;\n").unwrap();
        fs::write(root.join("views/main/main_test.js"), "// @module main_test\n").unwrap();
        fs::write(root.join("views/main/assets/main.css"), "p{}").unwrap();
        fs::write(root.join("views/main/index.html"), "<p/>").unwrap();
        fs::write(root.join("plugins/widgets/assets/button.css"), "b{}").unwrap();
        fs::write(root.join("locales/fr_FR/main.l10n.js"), "{}").unwrap();
        fs::write(root.join("config/app_config.js"), "// @module app_config\n").unwrap();

        (temp_dir, root)
    }

    #[tokio::test]
    async fn test_make_collects_manifest() {
        let (_temp_dir, root) = create_project();
        let rules = ExclusionRules::new(["config/*_config.js"]).unwrap();
        let maker = ModuleMaker::new(&root, rules);

        let manifest = maker
            .make(&SourceTree::from_dirs(["locales", "plugins", "views", "config"]))
            .await
            .unwrap();

        let mut names: Vec<&str> = manifest.iter().map(|m| m.name.as_str()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["css_main_main", "css_plugins_widgets_button", "l10n_fr_FR_main", "main"]
        );

        let main = manifest.get("main").unwrap();
        assert_eq!(main.path, "views/main/main.js");
        assert_eq!(
            main.dependencies,
            Some(vec!["base".to_string(), "widgets".to_string()])
        );
        assert_eq!(manifest.get("css_main_main").unwrap().kind, ModuleKind::Style);
    }

    #[tokio::test]
    async fn test_style_outside_assets_aborts_make() {
        let (_temp_dir, root) = create_project();
        fs::write(root.join("views/main/loose.css"), "p{}").unwrap();

        let maker = ModuleMaker::new(&root, ExclusionRules::default());
        let err = maker
            .make(&SourceTree::from_dirs(["views"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MakeError>(),
            Some(MakeError::StylePathWithoutAssets(_))
        ));
    }

    #[tokio::test]
    async fn test_write_config_document() {
        let (_temp_dir, root) = create_project();
        let maker = ModuleMaker::new(&root, ExclusionRules::default());
        let manifest: Manifest = vec![
            ModuleDescriptor::script("zeta", "views/zeta.js"),
            ModuleDescriptor::script("alpha", "views/alpha.js")
                .with_dependencies(vec!["zeta".to_string()]),
        ]
        .into_iter()
        .collect();

        let mut core = CoreDescriptor::default();
        core.modules.insert(
            "loader-core".to_string(),
            ModuleEntry {
                path: "runtime/core/loader-core.js".to_string(),
                requires: None,
                kind: None,
            },
        );
        let app = AppDescriptor {
            app: "demo".to_string(),
            copyright: Some(Copyright {
                name: "Demo".to_string(),
                version: "2.0".to_string(),
                text: "(c)".to_string(),
            }),
            ..AppDescriptor::default()
        };
        let ctx = BuildContext::new("42", root.join("build"), BuildVariant::Test, "/static");

        let path = maker
            .write_config(&manifest, &ctx, &BuildSettings::default(), &app, &core)
            .await
            .unwrap();
        assert_eq!(path, root.join("build/42/config/tconfig.js"));

        let written = fs::read_to_string(&path).unwrap();
        let body = written
            .strip_prefix("/*\nDemo 2.0\n(c)\n*/\nLOADER_CONFIG=")
            .unwrap()
            .strip_suffix(';')
            .unwrap();
        let document: LoaderConfig = serde_json::from_str(body).unwrap();

        assert_eq!(document.app, "demo");
        assert_eq!(document.appmainview, "main");
        let groups: Vec<&String> = document.groups.keys().collect();
        assert_eq!(groups, vec!["core", "demo"]);
        assert_eq!(document.groups["core"].base, "/static/42/");
        let modules: Vec<&String> = document.groups["demo"].modules.keys().collect();
        assert_eq!(modules, vec!["alpha", "zeta"]);
        assert_eq!(
            document.groups["demo"].modules["alpha"].requires,
            Some(vec!["zeta".to_string()])
        );
    }

    #[tokio::test]
    async fn test_development_config_goes_to_project() {
        let (_temp_dir, root) = create_project();
        let maker = ModuleMaker::new(&root, ExclusionRules::default());
        let ctx = BuildContext::development(&root);

        let path = maker
            .write_config(
                &Manifest::new(),
                &ctx,
                &BuildSettings::default(),
                &AppDescriptor::default(),
                &CoreDescriptor::default(),
            )
            .await
            .unwrap();

        assert_eq!(path, root.join("config/config.js"));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("LOADER_CONFIG={\"app\":\"app\""));
        assert!(written.contains("\"base\":\"/\""));
    }
}
