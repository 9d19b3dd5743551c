//! Template engine service over minijinja.
//!
//! Project templates shadow theme templates by name. The engine contract:
//! render, render_string, template_exists, structured errors with position
//! info. Template-to-template edges (`extends`/`include`/`import`/`from`)
//! are resolved statically so every page records its full template closure
//! as dependencies.

use std::path::PathBuf;
use std::sync::LazyLock;

use minijinja::Environment;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::config::SiteConfig;
use crate::core::ErrorKind;
use crate::utils::hash;

/// Structured template failure: file, line, short context.
#[derive(Debug, Clone)]
pub struct TemplateError {
    pub kind: ErrorKind,
    pub name: Option<String>,
    pub line: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, self.line) {
            (Some(name), Some(line)) => write!(f, "{name}:{line}: {}", self.message),
            (Some(name), None) => write!(f, "{name}: {}", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for TemplateError {}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        let kind = if matches!(err.kind(), minijinja::ErrorKind::SyntaxError) {
            ErrorKind::TemplateSyntax
        } else {
            ErrorKind::TemplateRender
        };
        Self {
            kind,
            name: err.name().map(str::to_string),
            line: err.line(),
            message: err.to_string(),
        }
    }
}

/// Reference patterns that create template → template edges.
static REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*(?:extends|include|import|from)\s+["']([^"']+)["']"#)
        .expect("template reference regex")
});

/// Thread-safe template service; compiled templates are cached inside the
/// environment after first load and shared read-only afterwards.
pub struct TemplateService {
    env: Environment<'static>,
    project_dir: PathBuf,
    theme_dir: Option<PathBuf>,
}

impl TemplateService {
    pub fn new(config: &SiteConfig) -> Self {
        let project_dir = config.templates_dir();
        let theme_dir = config.theme_templates_dir();

        let mut env = Environment::new();
        minijinja_contrib::add_to_environment(&mut env);

        let loader_project = project_dir.clone();
        let loader_theme = theme_dir.clone();
        env.set_loader(move |name: &str| {
            match resolve_source(&loader_project, loader_theme.as_deref(), name) {
                Some(source) => Ok(Some(source)),
                None => Ok(None),
            }
        });

        // URL values must not have their slashes entity-escaped.
        env.add_filter("url", |value: &str| {
            minijinja::Value::from_safe_string(value.to_string())
        });

        Self {
            env,
            project_dir,
            theme_dir,
        }
    }

    /// Mutable access for registering site-scoped functions before rendering.
    pub fn env_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    pub fn render(
        &self,
        name: &str,
        ctx: minijinja::Value,
    ) -> Result<String, TemplateError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }

    /// Render an inline template body (redirect stubs, scaffolds).
    pub fn render_string(
        &self,
        body: &str,
        ctx: minijinja::Value,
    ) -> Result<String, TemplateError> {
        Ok(self.env.render_str(body, ctx)?)
    }

    pub fn template_exists(&self, name: &str) -> bool {
        self.source_of(name).is_some()
    }

    /// First existing template from a candidate chain.
    pub fn first_existing(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .find(|name| self.template_exists(name))
            .map(|s| (*s).to_string())
    }

    /// Raw source of a template (project shadows theme).
    pub fn source_of(&self, name: &str) -> Option<String> {
        resolve_source(&self.project_dir, self.theme_dir.as_deref(), name)
    }

    /// Transitive closure of templates reachable from `name`, `name`
    /// included. Cycle-safe.
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(source) = self.source_of(&current) else {
                continue;
            };
            for captures in REF_RE.captures_iter(&source) {
                stack.push(captures[1].to_string());
            }
        }
        let mut out: Vec<_> = seen.into_iter().collect();
        out.sort();
        out
    }

    /// Digest over the sources of the given templates, order-insensitive.
    pub fn digest_of(&self, names: &[String]) -> String {
        let mut sorted = names.to_vec();
        sorted.sort();
        let parts: Vec<String> = sorted
            .iter()
            .map(|name| {
                let source = self.source_of(name).unwrap_or_default();
                format!("{name}\u{0}{source}")
            })
            .collect();
        hash::hash_strs(parts).to_hex()
    }
}

fn resolve_source(project: &std::path::Path, theme: Option<&std::path::Path>, name: &str) -> Option<String> {
    // Reject traversal outside the template roots.
    if name.contains("..") {
        return None;
    }
    let candidate = project.join(name);
    if let Ok(source) = std::fs::read_to_string(&candidate) {
        return Some(source);
    }
    if let Some(theme) = theme {
        if let Ok(source) = std::fs::read_to_string(theme.join(name)) {
            return Some(source);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use std::fs;
    use tempfile::TempDir;

    fn service_with(templates: &[(&str, &str)]) -> (TemplateService, TempDir) {
        let dir = TempDir::new().unwrap();
        for (name, body) in templates {
            let path = dir.path().join("templates").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, body).unwrap();
        }
        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        (TemplateService::new(&config), dir)
    }

    #[test]
    fn renders_with_context() {
        let (service, _dir) = service_with(&[("page.html", "<h1>{{ title }}</h1>")]);
        let html = service
            .render("page.html", context! { title => "Hello" })
            .unwrap();
        assert_eq!(html, "<h1>Hello</h1>");
    }

    #[test]
    fn missing_template_is_render_error() {
        let (service, _dir) = service_with(&[]);
        let err = service.render("nope.html", context! {}).unwrap_err();
        assert!(err.message.contains("nope.html"));
    }

    #[test]
    fn syntax_error_reports_line() {
        let (service, _dir) = service_with(&[("bad.html", "line one\n{% if %}")]);
        let err = service.render("bad.html", context! {}).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TemplateSyntax);
        assert_eq!(err.line, Some(2));
        assert_eq!(err.name.as_deref(), Some("bad.html"));
    }

    #[test]
    fn project_shadows_theme() {
        let dir = TempDir::new().unwrap();
        let theme = dir.path().join("themes/basic/templates");
        fs::create_dir_all(&theme).unwrap();
        fs::write(theme.join("page.html"), "theme version").unwrap();
        let project = dir.path().join("templates");
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("page.html"), "project version").unwrap();

        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        config.theme.name = Some("basic".to_string());
        let service = TemplateService::new(&config);

        assert_eq!(service.source_of("page.html").unwrap(), "project version");
    }

    #[test]
    fn dependency_closure_includes_partials() {
        let (service, _dir) = service_with(&[
            ("page.html", "{% extends \"base.html\" %}"),
            ("base.html", "{% include \"partials/nav.html\" %}{% block c %}{% endblock %}"),
            ("partials/nav.html", "<nav></nav>"),
            ("unrelated.html", "x"),
        ]);
        let deps = service.dependencies_of("page.html");
        assert!(deps.contains(&"page.html".to_string()));
        assert!(deps.contains(&"base.html".to_string()));
        assert!(deps.contains(&"partials/nav.html".to_string()));
        assert!(!deps.contains(&"unrelated.html".to_string()));
    }

    #[test]
    fn dependency_cycle_terminates() {
        let (service, _dir) = service_with(&[
            ("a.html", "{% include \"b.html\" %}"),
            ("b.html", "{% include \"a.html\" %}"),
        ]);
        let deps = service.dependencies_of("a.html");
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn digest_changes_with_source() {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("t.html"), "one").unwrap();

        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        let service = TemplateService::new(&config);
        let names = vec!["t.html".to_string()];
        let first = service.digest_of(&names);

        fs::write(templates.join("t.html"), "two").unwrap();
        let second = service.digest_of(&names);
        assert_ne!(first, second);
    }

    #[test]
    fn first_existing_walks_chain() {
        let (service, _dir) = service_with(&[("page.html", "x")]);
        assert_eq!(
            service.first_existing(&["single.html", "page.html"]),
            Some("page.html".to_string())
        );
        assert_eq!(service.first_existing(&["nope.html"]), None);
    }

    #[test]
    fn traversal_rejected() {
        let (service, _dir) = service_with(&[("page.html", "x")]);
        assert!(!service.template_exists("../secrets.txt"));
    }
}
