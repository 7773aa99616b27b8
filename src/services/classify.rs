use camino::Utf8Path;

/// Closed set of source file kinds, decided once per path from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// `*.js` module source
    Script,
    /// `*routes.js` routing table
    Routes,
    /// `<module>.l10n.js` translation table below `locales/<locale>/`
    Locale,
    /// `*test.js` unit test, never shipped
    Test,
    /// `*.css`
    Style,
    /// `*.html` page
    Markup,
    /// `*.tpl.html` template partial, inlined elsewhere and never shipped
    Partial,
    /// Anything else, copied verbatim
    Static,
}

impl FileKind {
    pub fn classify(path: &Utf8Path) -> Self {
        let Some(name) = path.file_name() else {
            return FileKind::Static;
        };

        // Suffix conventions first, extensions second
        if name.ends_with(".l10n.js") {
            FileKind::Locale
        } else if name.ends_with("test.js") {
            FileKind::Test
        } else if name.ends_with("routes.js") {
            FileKind::Routes
        } else if name.ends_with(".tpl.html") {
            FileKind::Partial
        } else {
            match path.extension() {
                Some("js") => FileKind::Script,
                Some("css") => FileKind::Style,
                Some("html") | Some("htm") => FileKind::Markup,
                _ => FileKind::Static,
            }
        }
    }
}
