//! Shared fixture: a small project with views, plugins, a relocated legacy
//! bundle, two locales and the runtime framework files.

#![allow(dead_code)]

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

pub const APP_CONFIG: &str = r#"{
    "app": "demo",
    "basepath": "/static",
    "bundles": [
        {"path": "views"},
        {"path": "plugins"},
        {"path": "legacy", "destination": "archive"}
    ],
    "locales": [
        {"locale": "en_US", "default": true},
        {"locale": "fr_FR"}
    ],
    "exclude": ["views/*/drafts/*"],
    "copyright": {"name": "Demo", "version": "3.1.0", "text": "Demo authors"}
}"#;

pub const CORE_CONFIG: &str = r#"{
    "modules": {
        "loader-core": {"path": "runtime/core/loader-core.js"},
        "loader-i18n": {"path": "runtime/core/loader-i18n.js", "requires": ["loader-core"]}
    },
    "copyright": {"name": "Runtime", "version": "1.0.0", "text": "MIT"}
}"#;

/// Files the build traversal reports back for [`create_project`]
pub const TRAVERSED_FILES: usize = 12;

/// Modules the loader document registers for [`create_project`]
pub const REGISTERED_MODULES: usize = 6;

fn write(root: &Utf8PathBuf, path: &str, content: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub fn create_project() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

    write(
        &root,
        "index.html",
        "<script src=\"{$basepath}/config/config.js\"></script>\n<style>{css}\nbody {\n  margin: 0;\n}\n{/css}</style>\n",
    );

    write(&root, "config/app_config.json", APP_CONFIG);
    write(&root, "config/dev_config.json", r#"{"basepath": ""}"#);
    write(
        &root,
        "config/routes.js",
        "// routes\nROUTES = {\n\n    '/': 'main'\n};\n",
    );

    write(
        &root,
        "views/main/main.js",
        "/**\n * @module main\n * @requires [loader-core, widgets]\n */\nload('{$basepath}/views/main/assets/main.css');\n",
    );
    write(&root, "views/main/main_test.js", "// @module main_test\n");
    write(&root, "views/main/row.tpl.html", "<tr>{$basepath}</tr>\n");
    write(
        &root,
        "views/main/assets/main.css",
        "/* main */\n.main {\n    color: red;\n}\n",
    );
    write(&root, "views/main/drafts/wip.js", "// @module wip\n");

    write(
        &root,
        "plugins/widgets/widgets.js",
        "// @module widgets\n// @requires loader-core\n",
    );
    write(&root, "plugins/widgets/assets/button.css", "button { border: 0; }\n");

    write(&root, "legacy/old.js", "// @module old\nvar old = true;\n");

    write(&root, "locales/en_US/main.l10n.js", r#"{"hello": "Hello"}"#);
    write(&root, "locales/fr_FR/main.l10n.js", r#"{"hello": "Bonjour"}"#);

    write(&root, "runtime/core/core_config.json", CORE_CONFIG);
    write(&root, "runtime/build/loader.js", "loader();\n");
    write(&root, "runtime/build/init.js", "init();\n");

    // Output of an earlier build and hand-placed files
    write(&root, "build/1600000000000/views/main/main.js", "stale");
    write(&root, "build/index.html", "stale");
    write(&root, "build/robots.txt", "keep");

    (temp_dir, root)
}

/// JSON body of a written loader document
pub fn loader_json(document: &str) -> serde_json::Value {
    let start = document
        .find("LOADER_CONFIG=")
        .expect("document assigns LOADER_CONFIG")
        + "LOADER_CONFIG=".len();
    let body = document[start..].trim_end().trim_end_matches(';');
    serde_json::from_str(body).unwrap()
}
